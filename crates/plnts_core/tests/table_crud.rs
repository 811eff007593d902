use plnts_core::db::open_store_in_memory;
use plnts_core::model::alert::{Alert, AlertType};
use plnts_core::model::mix::{Mix, SoilPart};
use plnts_core::model::plant::{CareKind, CarePlan, Plant, PlantCareEvent};
use plnts_core::model::system::{Light, System};
use plnts_core::model::todo::Todo;
use plnts_core::{Filter, Lifecycle, ManualClock, RepoError, Table, ValidationError};
use uuid::Uuid;

#[test]
fn create_and_get_roundtrip() {
    let conn = open_store_in_memory().unwrap();
    let plants = Table::<Plant>::new(&conn);

    let mut plant = Plant::new("Monstera", 1_000);
    plant.cost = 24.5;
    plant.size = 6;
    plant.watered_on = Some(900);
    let id = plants.create(&plant).unwrap();

    let loaded = plants.get_one(id).unwrap().unwrap();
    assert_eq!(loaded, plant);
    assert!(plants.get_one(Uuid::new_v4()).unwrap().is_none());
}

#[test]
fn find_distinguishes_malformed_and_missing_ids() {
    let conn = open_store_in_memory().unwrap();
    let plants = Table::<Plant>::new(&conn);
    let id = plants.create(&Plant::new("Pothos", 1)).unwrap();

    assert_eq!(plants.find(&id.to_string()).unwrap().name, "Pothos");
    assert!(matches!(
        plants.find("not-a-uuid").unwrap_err(),
        RepoError::InvalidIdentifier(raw) if raw == "not-a-uuid"
    ));
    assert!(matches!(
        plants.find(&Uuid::new_v4().to_string()).unwrap_err(),
        RepoError::NotFound { collection: "plant", .. }
    ));
}

#[test]
fn write_paths_validate_entities() {
    let conn = open_store_in_memory().unwrap();

    let err = Table::<Plant>::new(&conn)
        .create(&Plant::new("   ", 1))
        .unwrap_err();
    assert!(matches!(
        err,
        RepoError::Validation(ValidationError::BlankField { field: "name", .. })
    ));

    let mut plan = CarePlan::new(1);
    plan.watering = Some(0);
    let err = Table::<CarePlan>::new(&conn).create(&plan).unwrap_err();
    assert!(matches!(
        err,
        RepoError::Validation(ValidationError::NonPositive { field: "watering", .. })
    ));

    let mut mix = Mix::new("Aroid mix", 1);
    mix.soil_parts.push(SoilPart::new(Uuid::new_v4(), 0, 1));
    let err = Table::<Mix>::new(&conn).create(&mix).unwrap_err();
    assert!(matches!(
        err,
        RepoError::Validation(ValidationError::NonPositive { field: "parts", .. })
    ));

    let mut plant = Plant::new("Nil", 1);
    plant.meta.id = Uuid::nil();
    let err = Table::<Plant>::new(&conn).create(&plant).unwrap_err();
    assert!(matches!(err, RepoError::Validation(ValidationError::NilId)));
}

#[test]
fn get_many_respects_limit_and_insertion_order() {
    let conn = open_store_in_memory().unwrap();
    let plants = Table::<Plant>::new(&conn);
    for index in 0..5 {
        plants.create(&Plant::new(format!("plant-{index}"), index)).unwrap();
    }

    let page = plants.get_many(&Filter::new(), 3).unwrap();
    let names: Vec<_> = page.iter().map(|plant| plant.name.as_str()).collect();
    assert_eq!(names, ["plant-0", "plant-1", "plant-2"]);
    assert_eq!(plants.count(&Filter::new()).unwrap(), 5);
}

#[test]
fn filters_match_document_fields() {
    let conn = open_store_in_memory().unwrap();
    let plants = Table::<Plant>::new(&conn);
    let plan_id = Uuid::new_v4();

    let mut cheap = Plant::new("cheap", 1);
    cheap.cost = 5.0;
    cheap.size = 2;
    let mut pricey = Plant::new("pricey", 2);
    pricey.cost = 80.0;
    pricey.size = 10;
    pricey.care_plan_id = Some(plan_id);
    let mut middle = Plant::new("middle", 3);
    middle.cost = 20.0;
    middle.size = 4;
    for plant in [&cheap, &pricey, &middle] {
        plants.create(plant).unwrap();
    }

    let names = |filter: Filter| -> Vec<String> {
        plants
            .get_many(&filter, 10)
            .unwrap()
            .into_iter()
            .map(|plant| plant.name)
            .collect()
    };

    assert_eq!(names(Filter::new().gte("cost", 20)), ["pricey", "middle"]);
    assert_eq!(names(Filter::new().lt("size", 4)), ["cheap"]);
    assert_eq!(names(Filter::new().ne("name", "cheap")), ["pricey", "middle"]);
    assert_eq!(names(Filter::new().in_("size", [2, 4])), ["cheap", "middle"]);
    assert_eq!(names(Filter::new().not_in("size", [2, 4])), ["pricey"]);
    assert_eq!(
        names(Filter::new().eq("care_plan_id", plan_id.to_string())),
        ["pricey"]
    );
    assert_eq!(
        names(Filter::new().eq("care_plan_id", serde_json::Value::Null)),
        ["cheap", "middle"]
    );
    assert_eq!(
        names(Filter::new().any(vec![
            Filter::new().eq("name", "cheap"),
            Filter::new().gt("cost", 50),
        ])),
        ["cheap", "pricey"]
    );
    assert_eq!(names(Filter::new().exists("legacy_id", true)), Vec::<String>::new());
    assert_eq!(names(Filter::live()).len(), 3);

    let err = plants
        .count(&Filter::new().eq("cost; DROP TABLE documents", 1))
        .unwrap_err();
    assert!(matches!(err, RepoError::InvalidFilter(_)));
}

#[test]
fn update_reports_whether_anything_changed() {
    let conn = open_store_in_memory().unwrap();
    let clock = ManualClock::new(10_000);
    let plants = Table::<Plant>::with_clock(&conn, &clock);

    let mut plant = Plant::new("Calathea", 1_000);
    let id = plants.create(&plant).unwrap();

    assert!(!plants.update(id, &plant).unwrap());

    plant.size = 8;
    assert!(plants.update(id, &plant).unwrap());
    let stored = plants.get_one(id).unwrap().unwrap();
    assert_eq!(stored.size, 8);
    assert_eq!(stored.meta.updated_on, 10_000);
    assert_eq!(stored.meta.created_on, 1_000);

    let missing = Uuid::new_v4();
    assert!(matches!(
        plants.update(missing, &plant).unwrap_err(),
        RepoError::NotFound { .. }
    ));
}

#[test]
fn update_keeps_stored_identity() {
    let conn = open_store_in_memory().unwrap();
    let plants = Table::<Plant>::new(&conn);
    let original = Plant::new("Fern", 1);
    let id = plants.create(&original).unwrap();

    let mut impostor = Plant::new("Fern II", 2);
    impostor.size = 3;
    assert!(plants.update(id, &impostor).unwrap());

    let stored = plants.get_one(id).unwrap().unwrap();
    assert_eq!(stored.meta.id, id);
    assert_eq!(stored.name, "Fern II");
    assert!(plants.get_one(impostor.meta.id).unwrap().is_none());
}

#[test]
fn upsert_creates_once_then_modifies_in_place() {
    let conn = open_store_in_memory().unwrap();
    let plants = Table::<Plant>::new(&conn);
    let id = Uuid::new_v4();

    let mut plant = Plant::new("Hoya", 1);
    assert!(plants.upsert(id, &plant).unwrap());
    assert_eq!(plants.count(&Filter::new()).unwrap(), 1);

    plant.size = 12;
    assert!(plants.upsert(id, &plant).unwrap());
    assert_eq!(plants.count(&Filter::new()).unwrap(), 1);
    assert_eq!(plants.get_one(id).unwrap().unwrap().size, 12);
    assert!(!plants.upsert(id, &plant).unwrap());
}

#[test]
fn delete_is_hard_and_reports_absence() {
    let conn = open_store_in_memory().unwrap();
    let plants = Table::<Plant>::new(&conn);
    let id = plants.create(&Plant::new("Ficus", 1)).unwrap();

    assert!(plants.delete(id).unwrap());
    assert!(!plants.delete(id).unwrap());
    assert!(plants.get_one(id).unwrap().is_none());
    assert!(plants.get_archived(id).unwrap().is_none());
}

#[test]
fn banish_moves_entity_into_history() {
    let conn = open_store_in_memory().unwrap();
    let clock = ManualClock::new(42_000);
    let plants = Table::<Plant>::with_clock(&conn, &clock);
    let id = plants.create(&Plant::new("Alocasia", 1)).unwrap();

    assert!(plants.banish(id, Some("root rot")).unwrap());

    assert!(plants.get_one(id).unwrap().is_none());
    let archived = plants.get_archived(id).unwrap().unwrap();
    assert_eq!(archived.meta.banished_on(), Some(42_000));
    assert_eq!(
        archived.meta.lifecycle,
        Lifecycle::Archived {
            on: 42_000,
            cause: Some("root rot".to_string())
        }
    );
    assert_eq!(plants.count_archived(&Filter::new().eq("banished", true)).unwrap(), 1);

    let raw: String = conn
        .query_row(
            "SELECT body FROM history.documents WHERE collection = 'plant' AND id = ?1;",
            [id.to_string()],
            |row| row.get(0),
        )
        .unwrap();
    let raw: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(raw["banished"], true);
    assert_eq!(raw["banished_on"], 42_000);
}

#[test]
fn banish_of_missing_entity_is_not_found() {
    let conn = open_store_in_memory().unwrap();
    let plants = Table::<Plant>::new(&conn);

    let err = plants.banish(Uuid::new_v4(), None).unwrap_err();
    assert!(matches!(err, RepoError::NotFound { collection: "plant", .. }));
    assert_eq!(plants.count_archived(&Filter::new()).unwrap(), 0);
}

#[test]
fn banish_failure_rolls_back_the_live_delete() {
    let conn = open_store_in_memory().unwrap();
    let plants = Table::<Plant>::new(&conn);
    let id = plants.create(&Plant::new("Peperomia", 1)).unwrap();
    conn.execute_batch("DROP TABLE history.documents;").unwrap();

    let err = plants.banish(id, None).unwrap_err();
    assert!(matches!(
        err,
        RepoError::PartialArchive {
            stage: plnts_core::ArchiveStage::HistoryWrite,
            ..
        }
    ));
    assert!(plants.get_one(id).unwrap().is_some());
}

#[test]
fn deprecate_archives_in_place() {
    let conn = open_store_in_memory().unwrap();
    let clock = ManualClock::new(7_000);
    let todos = Table::<Todo>::with_clock(&conn, &clock);
    let id = todos.create(&Todo::new("fertilize everything", 1)).unwrap();

    assert!(todos.deprecate(id, Some("superseded")).unwrap());
    assert!(!todos.deprecate(id, Some("again")).unwrap());

    let todo = todos.get_one(id).unwrap().unwrap();
    assert_eq!(todo.meta.banished_on(), Some(7_000));
    assert_eq!(todos.count(&Filter::live()).unwrap(), 0);
    assert_eq!(todos.count_archived(&Filter::new()).unwrap(), 0);

    let err = todos.deprecate(Uuid::new_v4(), None).unwrap_err();
    assert!(matches!(err, RepoError::NotFound { .. }));
}

#[test]
fn store_rejects_duplicate_live_alerts() {
    let conn = open_store_in_memory().unwrap();
    let alerts = Table::<Alert>::new(&conn);
    let plant_id = Uuid::new_v4();

    let first = Alert::new(plant_id, AlertType::Water, 1);
    alerts.create(&first).unwrap();
    let err = alerts
        .create(&Alert::new(plant_id, AlertType::Water, 2))
        .unwrap_err();
    assert!(matches!(err, RepoError::Duplicate { collection: "alert", .. }));

    alerts.create(&Alert::new(plant_id, AlertType::Repot, 3)).unwrap();

    alerts.banish(first.meta.id, Some("watered")).unwrap();
    alerts
        .create(&Alert::new(plant_id, AlertType::Water, 4))
        .unwrap();
    assert_eq!(alerts.count(&Filter::new()).unwrap(), 2);
}

#[test]
fn store_rejects_duplicate_care_events() {
    let conn = open_store_in_memory().unwrap();
    let events = Table::<PlantCareEvent>::new(&conn);
    let plant_id = Uuid::new_v4();

    events
        .create(&PlantCareEvent::new(plant_id, CareKind::Water, 500, None, 1))
        .unwrap();
    let err = events
        .create(&PlantCareEvent::new(plant_id, CareKind::Water, 500, None, 2))
        .unwrap_err();
    assert!(matches!(err, RepoError::Duplicate { .. }));

    events
        .create(&PlantCareEvent::new(plant_id, CareKind::Fertilize, 500, None, 3))
        .unwrap();
}

#[test]
fn create_with_existing_id_is_duplicate() {
    let conn = open_store_in_memory().unwrap();
    let plants = Table::<Plant>::new(&conn);
    let plant = Plant::new("Twin", 1);
    plants.create(&plant).unwrap();

    let err = plants.create(&plant).unwrap_err();
    assert!(matches!(err, RepoError::Duplicate { collection: "plant", .. }));
}

#[test]
fn systems_and_lights_have_their_own_collections() {
    let conn = open_store_in_memory().unwrap();
    let clock = ManualClock::new(7_000);
    let systems = Table::<System>::with_clock(&conn, &clock);
    let lights = Table::<Light>::with_clock(&conn, &clock);

    let mut tent = System::new("Grow tent", 1);
    tent.target_humidity = 60.0;
    tent.duration = Some(14);
    tent.url = Some("http://10.0.0.4".to_string());
    let tent_id = systems.create(&tent).unwrap();
    let lamp_id = lights.create(&Light::new("LED bar", Some(tent_id), 1)).unwrap();
    lights.create(&Light::new("Spare", None, 1)).unwrap();

    let mut plant = Plant::new("Calathea", 1);
    plant.system_id = Some(tent_id);
    Table::<Plant>::new(&conn).create(&plant).unwrap();

    assert_eq!(systems.get_one(tent_id).unwrap().unwrap(), tent);
    let attached = lights
        .get_many(&Filter::live().eq("system_id", tent_id.to_string()), 10)
        .unwrap();
    assert_eq!(attached.len(), 1);
    assert_eq!(attached[0].meta.id, lamp_id);

    assert!(systems.banish(tent_id, Some("dismantled")).unwrap());
    assert!(systems.get_one(tent_id).unwrap().is_none());
    let archived = systems.get_archived(tent_id).unwrap().unwrap();
    assert_eq!(archived.meta.banished_on(), Some(7_000));
    assert_eq!(archived.url.as_deref(), Some("http://10.0.0.4"));
    assert_eq!(lights.count(&Filter::live()).unwrap(), 2);
}
