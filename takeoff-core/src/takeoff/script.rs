//! Sandboxed evaluation of takeoff model scripts.
//!
//! Scripts are Lua chunks evaluated in a fresh interpreter per run. The chunk
//! environment holds nothing but the `api` table, a captured `print`/`log`,
//! and a handful of pure builtins, so a script cannot reach the host's
//! filesystem, network, or storage. An instruction hook enforces the
//! instruction and wall-clock budgets and the allocator enforces the memory
//! limit; any breach fails the run. Builtins that loop inside C never reach
//! the hook, so their cost is checked before they start.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Instant;

use mlua::{
    ChunkMode, FromLua, Function, HookTriggers, Lua, LuaOptions, MultiValue, StdLib, Table, Value,
};
use serde::Serialize;
use tracing::debug;

use crate::config::SandboxSection;
use crate::lookup::{LookupTable, LookupValue, PriceItem};

use super::api::{NewPart, TakeOffApi};
use super::error::{TakeoffError, TakeoffResult};

const SAFE_GLOBALS: &[&str] = &[
    "math", "string", "table", "pairs", "ipairs", "next", "select", "type", "tostring",
    "tonumber", "error", "assert",
];

const MAX_LOG_LINES: usize = 500;

/// Pattern functions that run to completion inside C, out of the hook's reach.
const PATTERN_FUNCTIONS: &[&str] = &["find", "match", "gmatch", "gsub"];

/// Upper bound on backtracking steps a single pattern call may need.
const MAX_PATTERN_STEPS: f64 = 1e7;

const MAX_REPEAT_BYTES: f64 = 64.0 * 1024.0 * 1024.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Breach {
    Instructions,
    Deadline,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct ScriptOutcome {
    pub logs: Vec<String>,
    /// Instructions executed, rounded to the hook interval.
    pub instructions: u64,
}

#[derive(Debug, Clone)]
pub struct ScriptSandbox {
    limits: SandboxSection,
}

impl Default for ScriptSandbox {
    fn default() -> Self {
        Self::new(SandboxSection::default())
    }
}

impl ScriptSandbox {
    pub fn new(limits: SandboxSection) -> Self {
        Self { limits }
    }

    pub fn limits(&self) -> &SandboxSection {
        &self.limits
    }

    /// Evaluates `code` against `api`. The API is only reachable through the
    /// `api` global while the chunk runs.
    pub fn execute(&self, code: &str, api: &mut TakeOffApi) -> TakeoffResult<ScriptOutcome> {
        let lua = Lua::new_with(
            StdLib::MATH | StdLib::STRING | StdLib::TABLE,
            LuaOptions::default(),
        )
        .map_err(|err| script_failure(err.to_string(), Vec::new()))?;

        let memory_limit = self.limits.memory_limit_bytes();
        if memory_limit > 0 {
            lua.set_memory_limit(memory_limit)
                .map_err(|err| script_failure(err.to_string(), Vec::new()))?;
        }

        let breach = Rc::new(Cell::new(None::<Breach>));
        let executed = Rc::new(Cell::new(0u64));
        {
            let breach = Rc::clone(&breach);
            let executed = Rc::clone(&executed);
            let interval = self.limits.hook_interval.max(1);
            let max_instructions = self.limits.max_instructions;
            let deadline = Instant::now() + self.limits.timeout();
            lua.set_hook(
                HookTriggers::new().every_nth_instruction(interval),
                move |_lua, _debug| {
                    let count = executed.get() + u64::from(interval);
                    executed.set(count);
                    if count > max_instructions {
                        breach.set(Some(Breach::Instructions));
                        return Err(mlua::Error::RuntimeError(
                            "instruction budget exceeded".to_string(),
                        ));
                    }
                    if Instant::now() >= deadline {
                        breach.set(Some(Breach::Deadline));
                        return Err(mlua::Error::RuntimeError(
                            "time budget exceeded".to_string(),
                        ));
                    }
                    Ok(())
                },
            );
        }

        let logs = RefCell::new(Vec::<String>::new());
        let api = RefCell::new(api);

        let result = lua.scope(|scope| {
            let api = &api;
            let logs = &logs;
            let breached = &breach;
            let tostring: Function = lua.globals().get("tostring")?;
            let pcall: Function = lua.globals().get("pcall")?;
            let env = lua.create_table()?;
            for name in SAFE_GLOBALS {
                env.set(*name, lua.globals().get::<_, Value>(*name)?)?;
            }

            // The string table is also the string metatable's __index, so
            // method calls like `s:find(p)` go through the guards too.
            let string_lib: Table = lua.globals().get("string")?;
            for name in PATTERN_FUNCTIONS {
                let original: Function = string_lib.get(*name)?;
                let guarded = scope.create_function(move |_, args: MultiValue| {
                    check_pattern_cost(name, &args)?;
                    original.call::<_, MultiValue>(args)
                })?;
                string_lib.set(*name, guarded)?;
            }
            let repeat: Function = string_lib.get("rep")?;
            let guarded_repeat = scope.create_function(move |_, args: MultiValue| {
                check_repeat_size(&args)?;
                repeat.call::<_, MultiValue>(args)
            })?;
            string_lib.set("rep", guarded_repeat)?;
            string_lib.set("dump", Value::Nil)?;
            let table_lib: Table = lua.globals().get("table")?;
            table_lib.set("move", Value::Nil)?;

            // A budget breach must unwind through every protected call.
            let guarded_pcall = scope.create_function(move |_, args: MultiValue| {
                let results = pcall.call::<_, MultiValue>(args)?;
                if breached.get().is_some() {
                    return Err(mlua::Error::RuntimeError(
                        "script budget exceeded".to_string(),
                    ));
                }
                Ok(results)
            })?;
            env.set("pcall", guarded_pcall)?;

            let print = scope.create_function(move |_, args: MultiValue| {
                let mut parts = Vec::new();
                for value in args {
                    parts.push(tostring.call::<_, String>(value)?);
                }
                let mut logs = logs.borrow_mut();
                if logs.len() < MAX_LOG_LINES {
                    logs.push(parts.join("\t"));
                }
                Ok(())
            })?;
            env.set("print", print.clone())?;
            env.set("log", print)?;

            let api_table = lua.create_table()?;
            {
                let api_ref = api.borrow();
                api_table.set("id", api_ref.id.as_str())?;
                let bd = lua.create_table()?;
                for (name, value) in api_ref.bd.iter() {
                    bd.set(name, number_value(value))?;
                }
                api_table.set("bd", bd)?;
            }

            let variables = lua.create_table()?;
            variables.set(
                "get",
                scope.create_function(move |lua, args: MultiValue| {
                    let (name, default) = key_and_default(args)?;
                    let value = api
                        .borrow_mut()
                        .variables
                        .get(&name, default)
                        .map_err(|err| mlua::Error::RuntimeError(err.to_string()))?;
                    to_lua_value(lua, value)
                })?,
            )?;
            api_table.set("variables", variables)?;

            let inputs = lua.create_table()?;
            inputs.set(
                "get",
                scope.create_function(move |lua, args: MultiValue| {
                    let (name, default) = key_and_default(args)?;
                    let value = api
                        .borrow_mut()
                        .inputs
                        .get(&name, default)
                        .map_err(|err| mlua::Error::RuntimeError(err.to_string()))?;
                    to_lua_value(lua, value)
                })?,
            )?;
            api_table.set("inputs", inputs)?;

            let prices = lua.create_table()?;
            prices.set(
                "get",
                scope.create_function(move |lua, args: MultiValue| {
                    let name = leading_string(args, "prices.get")?;
                    let item = api.borrow_mut().prices.price(&name);
                    price_table(lua, &item)
                })?,
            )?;
            prices.set(
                "getCategoryItems",
                scope.create_function(move |lua, args: MultiValue| {
                    let category = leading_string(args, "prices.getCategoryItems")?;
                    let items = api.borrow_mut().prices.category_items(&category);
                    let tables = items
                        .iter()
                        .map(|item| price_table(lua, item))
                        .collect::<mlua::Result<Vec<_>>>()?;
                    lua.create_sequence_from(tables)
                })?,
            )?;
            api_table.set("prices", prices)?;

            let section_methods = lua.create_table()?;
            section_methods.set(
                "addPart",
                scope.create_function(move |_, (section, fields): (Table, Table)| {
                    let index: usize = section.raw_get("_section")?;
                    let part = NewPart {
                        name: part_field(&fields, "name")?,
                        qty: part_field(&fields, "qty")?,
                        price_lookup_key: part_field(&fields, "priceLookupKey")?,
                    };
                    if !part.qty.is_finite() {
                        return Err(mlua::Error::RuntimeError(format!(
                            "addPart: qty of {} must be a finite number, got {}",
                            part.name, part.qty
                        )));
                    }
                    let mut api = api.borrow_mut();
                    let handle = api.section(index).ok_or_else(|| {
                        mlua::Error::RuntimeError(format!("unknown section handle {index}"))
                    })?;
                    let handle = handle.add_part(part);
                    if let Some(item) = handle.parts().last() {
                        if !item.total.is_finite() {
                            return Err(mlua::Error::RuntimeError(format!(
                                "addPart: total of {} overflowed",
                                item.name
                            )));
                        }
                    }
                    Ok(section)
                })?,
            )?;
            let section_meta = lua.create_table()?;
            section_meta.set("__index", section_methods)?;

            api_table.set(
                "createSection",
                scope.create_function(move |lua, args: MultiValue| {
                    let name = leading_string(args, "createSection")?;
                    let index = {
                        let mut api = api.borrow_mut();
                        api.create_section(name.clone());
                        api.section_count() - 1
                    };
                    let section = lua.create_table()?;
                    section.raw_set("name", name)?;
                    section.raw_set("_section", index)?;
                    section.set_metatable(Some(section_meta.clone()));
                    Ok(section)
                })?,
            )?;
            env.set("api", api_table)?;

            lua.load(code)
                .set_name("takeoff model")
                .set_mode(ChunkMode::Text)
                .set_environment(env)
                .exec()
        });

        lua.remove_hook();
        let logs = logs.into_inner();
        let instructions = executed.get();

        let failure = match (breach.get(), result) {
            (Some(Breach::Instructions), _) => Some(format!(
                "script exceeded the instruction budget of {}",
                self.limits.max_instructions
            )),
            (Some(Breach::Deadline), _) => Some(format!(
                "script exceeded the time budget of {} ms",
                self.limits.timeout_ms
            )),
            (None, Err(mlua::Error::MemoryError(_))) => Some(format!(
                "script exceeded the memory limit of {} MB",
                self.limits.memory_limit_mb
            )),
            (None, Err(err)) => Some(describe(&err)),
            (None, Ok(())) => None,
        };

        if let Some(message) = failure {
            debug!(%message, log_lines = logs.len(), "script failed");
            return Err(script_failure(message, logs));
        }

        debug!(instructions, log_lines = logs.len(), "script finished");
        Ok(ScriptOutcome { logs, instructions })
    }
}

fn script_failure(message: String, logs: Vec<String>) -> TakeoffError {
    TakeoffError::Script { message, logs }
}

fn describe(err: &mlua::Error) -> String {
    match err {
        mlua::Error::CallbackError { cause, .. } => describe(cause),
        other => other.to_string(),
    }
}

/// Accepts both `tbl.get(k, d)` and `tbl:get(k, d)`.
fn strip_receiver(args: MultiValue<'_>) -> Vec<Value<'_>> {
    let mut values: Vec<Value<'_>> = args.into_iter().collect();
    if matches!(values.first(), Some(Value::Table(_))) {
        values.remove(0);
    }
    values
}

fn leading_string(args: MultiValue<'_>, call: &str) -> mlua::Result<String> {
    match strip_receiver(args).into_iter().next() {
        Some(Value::String(value)) => Ok(value.to_str()?.to_string()),
        Some(Value::Integer(value)) => Ok(value.to_string()),
        Some(Value::Number(value)) => Ok(value.to_string()),
        _ => Err(mlua::Error::RuntimeError(format!(
            "{call} expects a string argument"
        ))),
    }
}

fn key_and_default(args: MultiValue<'_>) -> mlua::Result<(String, LookupValue)> {
    let mut values = strip_receiver(args).into_iter();
    let name = match values.next() {
        Some(Value::String(value)) => value.to_str()?.to_string(),
        _ => {
            return Err(mlua::Error::RuntimeError(
                "get expects a string key".to_string(),
            ))
        }
    };
    let default = from_lua_value(&name, values.next().unwrap_or(Value::Nil))?;
    Ok((name, default))
}

/// Rejects a pattern call whose worst-case backtracking would outrun the
/// budgets. Each unbounded repetition can retry every remaining position.
fn check_pattern_cost(call: &str, args: &MultiValue<'_>) -> mlua::Result<()> {
    let mut values = args.iter();
    let subject = match values.next() {
        Some(Value::String(subject)) => subject.as_bytes().len(),
        _ => return Ok(()),
    };
    let pattern = match values.next() {
        Some(Value::String(pattern)) => pattern.as_bytes().to_vec(),
        _ => return Ok(()),
    };
    if call == "find" {
        let plain = args.iter().nth(3);
        if matches!(plain, Some(value) if !matches!(value, Value::Nil | Value::Boolean(false))) {
            return Ok(());
        }
    }
    let repetitions = unbounded_repetitions(&pattern);
    let steps =
        (subject as f64 + 1.0).powi(repetitions as i32 + 1) * pattern.len().max(1) as f64;
    if steps > MAX_PATTERN_STEPS {
        return Err(mlua::Error::RuntimeError(format!(
            "string.{call}: pattern with {repetitions} open-ended repetitions is too costly \
             for a {subject}-byte subject"
        )));
    }
    Ok(())
}

/// Counts `*`, `+` and `-` quantifiers applied to a character class.
fn unbounded_repetitions(pattern: &[u8]) -> u32 {
    let mut count = 0;
    let mut after_class = false;
    let mut index = 0;
    while index < pattern.len() {
        match pattern[index] {
            b'%' => {
                index += 2;
                after_class = true;
                continue;
            }
            b'[' => {
                index += 1;
                if pattern.get(index) == Some(&b'^') {
                    index += 1;
                }
                if pattern.get(index) == Some(&b']') {
                    index += 1;
                }
                while index < pattern.len() && pattern[index] != b']' {
                    if pattern[index] == b'%' {
                        index += 1;
                    }
                    index += 1;
                }
                index += 1;
                after_class = true;
                continue;
            }
            b'*' | b'+' | b'-' if after_class => {
                count += 1;
                after_class = false;
            }
            b'(' | b')' | b'^' | b'$' => after_class = false,
            _ => after_class = true,
        }
        index += 1;
    }
    count
}

/// `string.rep` loops in C once per copy, even for an empty string.
fn check_repeat_size(args: &MultiValue<'_>) -> mlua::Result<()> {
    let mut values = args.iter();
    let unit = coerced_len(values.next());
    let count = match values.next() {
        Some(Value::Integer(count)) => *count as f64,
        Some(Value::Number(count)) => *count,
        Some(Value::String(count)) => {
            match count.to_str().ok().and_then(|raw| raw.trim().parse().ok()) {
                Some(count) => count,
                None => return Ok(()),
            }
        }
        _ => return Ok(()),
    };
    let separator = coerced_len(values.next());
    let bytes = count * (unit + separator).max(1) as f64;
    if count > 0.0 && bytes > MAX_REPEAT_BYTES {
        return Err(mlua::Error::RuntimeError(format!(
            "string.rep would produce more than {MAX_REPEAT_BYTES} bytes"
        )));
    }
    Ok(())
}

fn coerced_len(value: Option<&Value<'_>>) -> usize {
    match value {
        Some(Value::String(value)) => value.as_bytes().len(),
        Some(Value::Integer(value)) => value.to_string().len(),
        Some(Value::Number(value)) => value.to_string().len(),
        _ => 0,
    }
}

fn from_lua_value(name: &str, value: Value<'_>) -> mlua::Result<LookupValue> {
    match value {
        Value::Integer(value) => Ok(LookupValue::Number(value as f64)),
        Value::Number(value) => Ok(LookupValue::Number(value)),
        Value::Boolean(value) => Ok(LookupValue::Flag(value)),
        Value::String(value) => Ok(LookupValue::Text(value.to_str()?.to_string())),
        other => Err(mlua::Error::RuntimeError(format!(
            "default for {name} must be a number, string or boolean, got {}",
            other.type_name()
        ))),
    }
}

fn to_lua_value(lua: &Lua, value: LookupValue) -> mlua::Result<Value<'_>> {
    Ok(match value {
        LookupValue::Number(value) => number_value(value),
        LookupValue::Flag(value) => Value::Boolean(value),
        LookupValue::Text(value) => Value::String(lua.create_string(&value)?),
    })
}

/// Integral numbers cross as Lua integers so they print without a trailing `.0`.
fn number_value<'lua>(value: f64) -> Value<'lua> {
    const EXACT: f64 = 9_007_199_254_740_992.0;
    if value.fract() == 0.0 && value.abs() < EXACT {
        Value::Integer(value as i64)
    } else {
        Value::Number(value)
    }
}

fn price_table<'lua>(lua: &'lua Lua, item: &PriceItem) -> mlua::Result<Table<'lua>> {
    let table = lua.create_table()?;
    table.set("name", item.name.as_str())?;
    table.set("unitType", item.unit_type.as_str())?;
    table.set("pricePerUnit", item.price_per_unit)?;
    table.set("currency", item.currency.as_str())?;
    table.set("category", item.category.as_str())?;
    table.set("width", item.width)?;
    table.set("height", item.height)?;
    table.set("length", item.length)?;
    Ok(table)
}

fn part_field<'lua, T: FromLua<'lua>>(part: &Table<'lua>, key: &str) -> mlua::Result<T> {
    part.get::<_, T>(key).map_err(|err| {
        mlua::Error::RuntimeError(format!("addPart: invalid field {key}: {}", describe(&err)))
    })
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::lookup::{CustomLookupTable, LookupValue, PriceLookupTable};
    use crate::takeoff::models::BuildingDimensions;

    fn api() -> TakeOffApi {
        TakeOffApi::new(
            "tm-1",
            BuildingDimensions::new().with("width", 10.0).with("length", 4.0),
            PriceLookupTable::new(vec![
                PriceItem::new("panel", 5.0, "USD", "Walls"),
                PriceItem::new("trim", 2.0, "USD", "Walls"),
            ]),
            CustomLookupTable::inputs(Vec::new()),
            CustomLookupTable::variables(Vec::new()),
        )
    }

    fn sandbox() -> ScriptSandbox {
        ScriptSandbox::new(SandboxSection {
            max_instructions: 200_000,
            timeout_ms: 1_000,
            memory_limit_mb: 16,
            hook_interval: 100,
        })
    }

    #[test]
    fn script_builds_sections_through_the_api() {
        let mut api = api();
        let code = r#"
            local width = api.inputs.get("width", 10)
            local waste = api.variables.get("wasteFactor", 1.1)
            local walls = api.createSection("Walls")
            walls:addPart({ name = "Panels", qty = width * waste, priceLookupKey = "panel" })
                 :addPart({ name = "Trim", qty = api.bd.length, priceLookupKey = "trim" })
            print("walls", #api.prices.getCategoryItems("Walls"))
        "#;
        let outcome = sandbox().execute(code, &mut api).unwrap();

        let sections = api.get_sections();
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].parts.len(), 2);
        assert!((sections[0].parts[0].qty - 11.0).abs() < 1e-9);
        assert!((sections[0].parts[0].total - 55.0).abs() < 1e-9);
        assert_eq!(sections[0].parts[1].total, 8.0);
        assert_eq!(outcome.logs, vec!["walls\t2"]);
    }

    #[test]
    fn method_call_syntax_is_accepted_for_get() {
        let mut api = api();
        sandbox()
            .execute(r#"assert(api.variables:get("coats", 2) == 2)"#, &mut api)
            .unwrap();
        assert_eq!(
            api.variables.lookup_history()[0].name,
            "coats".to_string()
        );
    }

    #[test]
    fn host_globals_are_not_reachable() {
        for code in [
            "os.exit(1)",
            "io.write('x')",
            "require('os')",
            "load('return 1')()",
            "dofile('/etc/passwd')",
        ] {
            let mut api = api();
            let err = sandbox().execute(code, &mut api).unwrap_err();
            assert!(matches!(err, TakeoffError::Script { .. }), "{code} should fail");
        }
    }

    #[test]
    fn runtime_error_is_reported_with_logs() {
        let mut api = api();
        let err = sandbox()
            .execute("print('before'); error('boom')", &mut api)
            .unwrap_err();
        match err {
            TakeoffError::Script { message, logs } => {
                assert!(message.contains("boom"));
                assert_eq!(logs, vec!["before"]);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn infinite_loop_hits_the_instruction_budget() {
        let mut api = api();
        let err = sandbox().execute("while true do end", &mut api).unwrap_err();
        assert!(err.to_string().contains("instruction budget"));
    }

    #[test]
    fn backtracking_pattern_is_rejected_before_it_runs() {
        let sandbox = ScriptSandbox::new(SandboxSection {
            max_instructions: 200_000,
            timeout_ms: 200,
            memory_limit_mb: 16,
            hook_interval: 100,
        });
        for code in [
            r#"local s = string.rep("a", 600); string.find(s, ".-.-.-b")"#,
            r#"local s = string.rep("a", 600); s:match(".*.*.*b")"#,
            r#"local s = string.rep("a", 600); string.gsub(s, "a-a-a-b", "")"#,
            r#"for _ in string.gmatch(string.rep("a", 600), ".-.-b") do end"#,
        ] {
            let mut api = api();
            let started = Instant::now();
            let err = sandbox.execute(code, &mut api).unwrap_err();
            assert!(started.elapsed() < Duration::from_secs(5), "{code} ran too long");
            assert!(err.to_string().contains("too costly"), "{code}: {err}");
        }
    }

    #[test]
    fn ordinary_patterns_still_work() {
        let mut api = api();
        let code = r#"
            local w, h = ("2x4 stud"):match("^(%d+)x(%d+)")
            assert(w == "2" and h == "4")
            assert(string.find("drywall-12", "-", 1, true) == 8)
            local trimmed = string.gsub("  panel  ", "^%s*(.-)%s*$", "%1")
            print(trimmed)
            for word in string.gmatch("a b c", "%a+") do print(word) end
        "#;
        let outcome = sandbox().execute(code, &mut api).unwrap();
        assert_eq!(outcome.logs, vec!["panel", "a", "b", "c"]);
    }

    #[test]
    fn oversized_repeats_are_rejected() {
        for code in [
            r#"string.rep("", 1e12)"#,
            r#"("x"):rep(1e9)"#,
            "table.move({}, 1, 1e12, 2)",
        ] {
            let mut api = api();
            let started = Instant::now();
            let err = sandbox().execute(code, &mut api).unwrap_err();
            assert!(started.elapsed() < Duration::from_secs(5), "{code} ran too long");
            assert!(matches!(err, TakeoffError::Script { .. }), "{code} should fail");
        }
    }

    #[test]
    fn repetitions_are_counted_per_character_class() {
        assert_eq!(unbounded_repetitions(b".-.-.-b"), 3);
        assert_eq!(unbounded_repetitions(b"^(%d+)x(%d+)"), 2);
        assert_eq!(unbounded_repetitions(b"[a-z]+"), 1);
        assert_eq!(unbounded_repetitions(b"a%-b"), 0);
        assert_eq!(unbounded_repetitions(b"2x4"), 0);
    }

    #[test]
    fn non_finite_quantities_are_rejected() {
        for qty in ["0/0", "1/0", "-1/0"] {
            let mut api = api();
            let code = format!(
                r#"api.createSection("S"):addPart({{ name = "x", qty = {qty}, priceLookupKey = "panel" }})"#
            );
            let err = sandbox().execute(&code, &mut api).unwrap_err();
            assert!(err.to_string().contains("finite"), "{qty}: {err}");
        }
    }

    #[test]
    fn caught_budget_breach_still_fails_the_run() {
        let mut api = api();
        let code = r#"
            while true do
                pcall(function() while true do end end)
            end
        "#;
        let err = sandbox().execute(code, &mut api).unwrap_err();
        assert!(err.to_string().contains("instruction budget"));
    }

    #[test]
    fn pcall_still_catches_ordinary_errors() {
        let mut api = api();
        let code = r#"
            local ok, err = pcall(error, "soft failure")
            assert(not ok)
            print(err)
        "#;
        let outcome = sandbox().execute(code, &mut api).unwrap();
        assert_eq!(outcome.logs, vec!["soft failure"]);
    }

    #[test]
    fn type_mismatch_on_stored_variable_fails_the_run() {
        let mut api = api();
        api.variables.get("coats", LookupValue::Number(2.0)).unwrap();
        let err = sandbox()
            .execute(r#"api.variables.get("coats", "two")"#, &mut api)
            .unwrap_err();
        assert!(err.to_string().contains("coats"));
    }

    #[test]
    fn unknown_price_resolves_to_fallback_table() {
        let mut api = api();
        sandbox()
            .execute(
                r#"
                local item = api.prices.get("nope")
                assert(item.pricePerUnit == 0)
                assert(item.currency == "MXN")
                assert(item.category == "Other")
                "#,
                &mut api,
            )
            .unwrap();
        assert!(!api.prices.lookup_history()[0].was_found);
    }
}
