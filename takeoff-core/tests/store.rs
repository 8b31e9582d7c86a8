use serde_json::json;
use takeoff_core::takeoff::PriceListSummary;
use takeoff_core::{
    BuildingDimensions, CustomKind, ErrorKind, EstimateStatus, LookupValue, PriceItem,
    SqliteTakeoffStore, TakeoffError,
};
use tempfile::TempDir;

fn setup_store() -> (TempDir, SqliteTakeoffStore) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("takeoff.sqlite");
    let store = SqliteTakeoffStore::builder()
        .path(&path)
        .create_if_missing(true)
        .build()
        .unwrap();
    store.initialize().unwrap();
    (dir, store)
}

#[test]
fn test_model_crud() {
    let (_dir, store) = setup_store();
    let model = store.create_model("Shed", "-- empty").unwrap();
    assert!(model.id.starts_with("tm-"));
    assert!(model.variables.is_empty());
    assert!(model.created_at.is_some());

    store
        .update_model_code(&model.id, "api.createSection('Roof')")
        .unwrap();
    let fetched = store.fetch_model(&model.id).unwrap().unwrap();
    assert_eq!(fetched.code, "api.createSection('Roof')");

    let summaries = store.list_models().unwrap();
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].variable_count, 0);

    let err = store.update_model_code("tm-missing", "").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert!(store.fetch_model("tm-missing").unwrap().is_none());
}

#[test]
fn test_price_list_import_and_merge_order() {
    let (_dir, store) = setup_store();
    let base = store
        .import_price_list(
            "Base",
            Some("Lumber Co"),
            &[
                json!({"name": "stud", "unitType": "piece", "pricePerUnit": "3.5",
                       "currency": "USD", "category": "Framing", "length": 96}),
                json!({"name": "nail", "unitType": "box", "pricePerUnit": 12,
                       "currency": "USD", "category": "Fasteners"}),
            ],
        )
        .unwrap();
    let promo = store
        .create_price_list(
            "Promo",
            None,
            &[PriceItem::new("stud", 3.0, "USD", "Framing")],
        )
        .unwrap();

    let fetched = store.fetch_price_list(&base.id).unwrap().unwrap();
    assert_eq!(fetched.supplier.as_deref(), Some("Lumber Co"));
    assert_eq!(fetched.items.len(), 2);
    assert_eq!(fetched.items[0].price_per_unit, 3.5);
    assert_eq!(fetched.items[0].length, Some(96.0));
    assert_eq!(fetched.items[1].width, None);

    let items = store
        .fetch_price_items(&[base.id.clone(), promo.id.clone()])
        .unwrap();
    let names: Vec<_> = items.iter().map(|item| item.name.as_str()).collect();
    assert_eq!(names, vec!["stud", "nail", "stud"]);

    let lists: Vec<PriceListSummary> = store.list_price_lists().unwrap();
    assert_eq!(lists.len(), 2);
    assert_eq!(lists[0].name, "Base");
    assert_eq!(lists[0].item_count, 2);

    let err = store
        .fetch_price_items(&["pl-missing".to_string()])
        .unwrap_err();
    assert!(matches!(err, TakeoffError::PriceListNotFound { .. }));
}

#[test]
fn test_price_list_import_rejects_bad_rows() {
    let (_dir, store) = setup_store();
    let err = store
        .import_price_list(
            "Broken",
            None,
            &[json!({"name": "stud", "unitType": "piece", "pricePerUnit": "cheap",
                     "currency": "USD", "category": "Framing"})],
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ValidationFailure);
    assert!(err.to_string().contains("items[0].pricePerUnit"));
    assert!(store.list_price_lists().unwrap().is_empty());
}

#[test]
fn test_estimate_configuration() {
    let (_dir, store) = setup_store();
    let model = store.create_model("Deck", "").unwrap();
    let first = store.create_price_list("A", None, &[]).unwrap();
    let second = store.create_price_list("B", None, &[]).unwrap();

    let estimate = store
        .create_estimate("Backyard", &BuildingDimensions::new().with("width", 12.0))
        .unwrap();
    assert!(estimate.id.starts_with("est-"));
    assert_eq!(estimate.status, EstimateStatus::Draft);
    assert_eq!(estimate.dimensions.get("width"), Some(12.0));
    assert!(estimate.takeoff_model_id.is_none());

    store
        .configure_estimate(
            &estimate.id,
            Some(&model.id),
            &[second.id.clone(), first.id.clone()],
        )
        .unwrap();
    store.rename_estimate(&estimate.id, "Backyard deck").unwrap();
    store
        .update_dimensions(&estimate.id, &BuildingDimensions::new().with("width", 14.0))
        .unwrap();

    let fetched = store.fetch_estimate(&estimate.id).unwrap().unwrap();
    assert_eq!(fetched.name, "Backyard deck");
    assert_eq!(fetched.takeoff_model_id.as_deref(), Some(model.id.as_str()));
    assert_eq!(fetched.price_list_ids, vec![second.id.clone(), first.id.clone()]);
    assert_eq!(fetched.dimensions.get("width"), Some(14.0));

    store
        .configure_estimate(&estimate.id, Some(&model.id), &[first.id.clone()])
        .unwrap();
    let fetched = store.fetch_estimate(&estimate.id).unwrap().unwrap();
    assert_eq!(fetched.price_list_ids, vec![first.id.clone()]);

    let err = store
        .configure_estimate(&estimate.id, Some("tm-missing"), &[])
        .unwrap_err();
    assert!(matches!(err, TakeoffError::ModelNotFound { .. }));
    let err = store
        .configure_estimate(&estimate.id, None, &["pl-missing".to_string()])
        .unwrap_err();
    assert!(matches!(err, TakeoffError::PriceListNotFound { .. }));
    // failed configuration leaves the previous selection intact
    let fetched = store.fetch_estimate(&estimate.id).unwrap().unwrap();
    assert_eq!(fetched.price_list_ids, vec![first.id]);
    assert!(fetched.takeoff_model_id.is_some());

    let err = store.rename_estimate("est-missing", "x").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[test]
fn test_update_custom_value_keeps_type() {
    let (_dir, store) = setup_store();
    let model = store.create_model("Fence", "").unwrap();
    let conn = rusqlite::Connection::open(store.path()).unwrap();
    conn.execute(
        "INSERT INTO custom_values (takeoff_model_id, kind, name, value_type, value)
         VALUES (?1, 'variable', 'postSpacing', 'number', '8')",
        [&model.id],
    )
    .unwrap();
    drop(conn);

    let updated = store
        .update_custom_value(
            &model.id,
            CustomKind::Variable,
            "postSpacing",
            &LookupValue::Number(6.0),
        )
        .unwrap();
    assert_eq!(updated.value, LookupValue::Number(6.0));

    let values = store
        .fetch_custom_values(&model.id, CustomKind::Variable)
        .unwrap();
    assert_eq!(values.len(), 1);
    assert_eq!(values[0].value, LookupValue::Number(6.0));

    let err = store
        .update_custom_value(
            &model.id,
            CustomKind::Variable,
            "postSpacing",
            &LookupValue::Text("six".into()),
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ValidationFailure);

    let err = store
        .update_custom_value(
            &model.id,
            CustomKind::Input,
            "postSpacing",
            &LookupValue::Number(6.0),
        )
        .unwrap_err();
    assert!(matches!(err, TakeoffError::CustomValueNotFound { .. }));
}
