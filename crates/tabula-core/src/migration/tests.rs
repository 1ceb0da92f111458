use super::*;
use crate::{
    config::Config,
    db::{Database, sql::emit, storage::Storage},
    error::{ErrorClass, ErrorOrigin, InternalError},
    model::SqlType,
    outcome::Outcome,
    test_fixtures::{Person, Tag, memory_storage},
    value::Value,
};
use proptest::prelude::*;
use std::sync::Arc;

struct Unit {
    name: &'static str,
    up: fn(&mut MigrationPlan),
}

impl Migration for Unit {
    fn name(&self) -> &str {
        self.name
    }

    fn up(&self, plan: &mut MigrationPlan) {
        (self.up)(plan);
    }
}

fn unit(name: &'static str, up: fn(&mut MigrationPlan)) -> Box<dyn Migration> {
    Box::new(Unit { name, up })
}

fn create_person(plan: &mut MigrationPlan) {
    plan.create_model::<Person>();
}

fn create_tag(plan: &mut MigrationPlan) {
    plan.create_model::<Tag>();
}

fn count(storage: &Storage, sql: &str) -> u64 {
    let statement = emit::ddl(storage.dialect(), sql.to_string())
        .into_statement()
        .unwrap();
    storage.count(&statement).unwrap()
}

fn run_sql(storage: &Storage, sql: &str) {
    storage
        .execute_template(emit::ddl(storage.dialect(), sql.to_string()))
        .unwrap();
}

fn single_storage_db() -> (Database, Arc<Storage>) {
    let db = Database::new();
    let storage = memory_storage();
    db.register::<Person>(&storage).unwrap();
    db.register::<Tag>(&storage).unwrap();

    (db, storage)
}

fn migrate(db: &Database, units: Vec<Box<dyn Migration>>) -> Outcome<Vec<String>> {
    MigrationManager::new(db).run(db, units)
}

// ----------------------------------------------------------------------
// Plan
// ----------------------------------------------------------------------

fn action() -> impl Strategy<Value = Action> {
    prop_oneof![Just(Action::Create), Just(Action::Update), Just(Action::Delete)]
}

proptest! {
    #[test]
    fn delete_absorbs_later_requests(next in action()) {
        prop_assert_eq!(Action::merge(Some(Action::Delete), next), Some(Action::Delete));
    }

    #[test]
    fn first_request_is_kept_unless_deleted(first in action(), next in action()) {
        let merged = Action::merge(Some(first), next);
        match (first, next) {
            (Action::Create, Action::Delete) => prop_assert_eq!(merged, None),
            (Action::Update, Action::Delete) => prop_assert_eq!(merged, Some(Action::Delete)),
            _ => prop_assert_eq!(merged, Some(first)),
        }
    }

    #[test]
    fn first_request_on_empty_is_taken(next in action()) {
        prop_assert_eq!(Action::merge(None, next), Some(next));
    }
}

#[test]
fn created_then_deleted_model_leaves_nothing_pending() {
    let mut plan = MigrationPlan::new();
    plan.create_model::<Person>();
    plan.delete_model::<Person>();

    assert!(plan.is_empty());
    assert_eq!(plan.models().len(), 1);
    assert_eq!(plan.models()[0].action(), None);
}

#[test]
fn renamed_then_deleted_property_becomes_delete() {
    let mut plan = MigrationPlan::new();
    plan.select_model::<Person>()
        .rename_property("nick", "alias")
        .remove_property("alias");

    let property = &plan.models()[0].properties()[0];
    assert_eq!(property.name(), "alias");
    assert_eq!(property.action(), Some(Action::Delete));
    assert_eq!(plan.models()[0].action(), None);
    assert!(!plan.is_empty());
}

#[test]
fn models_keep_declaration_priority() {
    let mut plan = MigrationPlan::new();
    plan.create_model::<Tag>();
    plan.create_model::<Person>();
    plan.select_model::<Tag>().add_primary("id");

    let tables: Vec<_> = plan.models().iter().map(|m| (m.table(), m.priority())).collect();
    assert_eq!(tables, [("tag", 0), ("person", 1)]);
}

// ----------------------------------------------------------------------
// Runs
// ----------------------------------------------------------------------

#[test]
fn applied_units_are_tracked_and_skipped() {
    let (db, storage) = single_storage_db();

    let first = migrate(&db, vec![unit("001_person", create_person)]);
    assert!(first.is_success());
    assert_eq!(first.into_value().unwrap(), ["001_person"]);
    assert!(storage.table_exists("person").unwrap());
    assert_eq!(
        count(&storage, r#"SELECT COUNT(*) AS nb FROM "_migrations" WHERE "name" = '001_person'"#),
        1
    );

    let second = migrate(
        &db,
        vec![unit("001_person", create_person), unit("002_tag", create_tag)],
    );
    assert!(second.is_success());
    assert_eq!(second.into_value().unwrap(), ["002_tag"]);
}

#[test]
fn units_run_in_name_order() {
    let (db, _) = single_storage_db();

    let outcome = migrate(
        &db,
        vec![unit("b_tag", create_tag), unit("a_person", create_person)],
    );

    assert_eq!(outcome.into_value().unwrap(), ["a_person", "b_tag"]);
}

#[test]
fn property_changes_alter_the_table() {
    let (db, storage) = single_storage_db();
    migrate(&db, vec![unit("001", create_person)]);

    let outcome = migrate(
        &db,
        vec![unit("002", |plan| {
            plan.select_model::<Person>()
                .add_property("nickname", SqlType::Text, PropertyOptions::default().nullable())
                .add_property(
                    "score",
                    SqlType::Int,
                    PropertyOptions::default().default_value(Value::Int(7)),
                );
        })],
    );
    assert!(outcome.is_success(), "{:?}", outcome.errors());

    run_sql(&storage, r#"INSERT INTO "person" ("name", "nickname") VALUES ('Al', 'al')"#);
    assert_eq!(
        count(&storage, r#"SELECT COUNT(*) AS nb FROM "person" WHERE "score" = 7 AND "nickname" = 'al'"#),
        1
    );

    let outcome = migrate(
        &db,
        vec![
            unit("003", |plan| {
                plan.select_model::<Person>().rename_property("nickname", "alias");
            }),
            unit("004", |plan| {
                plan.select_model::<Person>().remove_property("score");
            }),
        ],
    );
    assert!(outcome.is_success(), "{:?}", outcome.errors());
    assert_eq!(
        count(&storage, r#"SELECT COUNT(*) AS nb FROM "person" WHERE "alias" = 'al'"#),
        1
    );
    assert_eq!(
        count(&storage, "SELECT COUNT(*) AS nb FROM pragma_table_info('person') WHERE name = 'score'"),
        0
    );
}

#[test]
fn declared_properties_shape_a_new_table() {
    let (db, storage) = single_storage_db();

    let outcome = migrate(
        &db,
        vec![unit("001", |plan| {
            plan.create_model::<Tag>()
                .add_primary("id")
                .add_property("label", SqlType::Text, PropertyOptions::default().indexed());
        })],
    );
    assert!(outcome.is_success(), "{:?}", outcome.errors());

    assert_eq!(
        count(&storage, "SELECT COUNT(*) AS nb FROM pragma_table_info('tag')"),
        2
    );
    assert_eq!(
        count(&storage, "SELECT COUNT(*) AS nb FROM sqlite_master WHERE type = 'index' AND name = 'IX_tag_label'"),
        1
    );
}

#[test]
fn model_rename_and_delete() {
    let (db, storage) = single_storage_db();
    run_sql(&storage, r#"CREATE TABLE "old_tag" ("id" INTEGER PRIMARY KEY, "label" TEXT)"#);

    let renamed = migrate(
        &db,
        vec![unit("001", |plan| {
            plan.rename_model::<Tag>("old_tag");
        })],
    );
    assert!(renamed.is_success(), "{:?}", renamed.errors());
    assert!(storage.table_exists("tag").unwrap());
    assert!(!storage.table_exists("old_tag").unwrap());

    let dropped = migrate(
        &db,
        vec![unit("002", |plan| {
            plan.delete_model::<Tag>();
        })],
    );
    assert!(dropped.is_success(), "{:?}", dropped.errors());
    assert!(!storage.table_exists("tag").unwrap());
}

#[test]
fn failed_unit_rolls_back_and_stops_the_run() {
    let (db, storage) = single_storage_db();

    let outcome = migrate(
        &db,
        vec![
            unit("001_broken", |plan| {
                plan.create_model::<Person>();
                plan.select_model::<Tag>().remove_property("missing");
            }),
            unit("002_tag", create_tag),
        ],
    );

    assert_eq!(outcome.errors().len(), 1);
    assert_eq!(outcome.value(), Some(&Vec::new()));
    assert!(!storage.table_exists("person").unwrap());
    assert!(!storage.table_exists("tag").unwrap());
    assert_eq!(count(&storage, r#"SELECT COUNT(*) AS nb FROM "_migrations""#), 0);
    assert!(!storage.coordinator().is_active());
}

#[test]
fn duplicate_names_are_rejected() {
    let (db, storage) = single_storage_db();

    let outcome = migrate(
        &db,
        vec![unit("001", create_person), unit("001", create_tag)],
    );

    assert_eq!(outcome.errors()[0].class, ErrorClass::Conflict);
    assert!(!storage.table_exists("person").unwrap());
}

// ----------------------------------------------------------------------
// Several storages
// ----------------------------------------------------------------------

fn two_storage_db(config: Config) -> (Database, Arc<Storage>, Arc<Storage>) {
    let db = Database::with_config(config);
    let people = memory_storage();
    let tags = memory_storage();
    db.register::<Person>(&people).unwrap();
    db.register::<Tag>(&tags).unwrap();

    (db, people, tags)
}

fn multiple_providers() -> Config {
    let mut config = Config::default();
    config.migration.multiple_providers = true;
    config
}

#[test]
fn several_storages_need_opt_in() {
    let (db, people, _) = two_storage_db(Config::default());

    let outcome = migrate(&db, vec![unit("001", create_person)]);

    assert_eq!(outcome.errors()[0].class, ErrorClass::Unsupported);
    assert!(!people.table_exists("person").unwrap());
}

#[test]
fn unit_only_involves_the_storages_it_touches() {
    let (db, people, tags) = two_storage_db(multiple_providers());

    let outcome = migrate(&db, vec![unit("001", create_tag)]);
    assert!(outcome.is_success(), "{:?}", outcome.errors());

    assert!(tags.table_exists("tag").unwrap());
    assert!(!people.table_exists("tag").unwrap());
    assert!(StorageMigrationProvider::new(people, "_migrations").can("001").unwrap());
    assert!(!StorageMigrationProvider::new(tags, "_migrations").can("001").unwrap());
}

#[test]
fn partially_applied_unit_is_refused() {
    let (db, people, _) = two_storage_db(multiple_providers());
    let manager = MigrationManager::new(&db);
    assert_eq!(manager.provider_count(), 2);

    let provider = StorageMigrationProvider::new(people, "_migrations");
    provider.init().unwrap();
    provider.save("001_shared").unwrap();

    let outcome = manager.run(&db, vec![unit("001_shared", |_| {})]);

    assert_eq!(outcome.errors()[0].class, ErrorClass::Conflict);
}

#[test]
fn configured_table_name_is_used() {
    let mut config = Config::default();
    config.migration.table = "schema_history".to_string();
    let db = Database::with_config(config);
    let storage = memory_storage();
    db.register::<Person>(&storage).unwrap();

    let outcome = migrate(&db, vec![unit("001", create_person)]);

    assert!(outcome.is_success(), "{:?}", outcome.errors());
    assert!(storage.table_exists("schema_history").unwrap());
    assert!(!storage.table_exists("_migrations").unwrap());
}

struct FailingBeforeUp;

impl MigrationProvider for FailingBeforeUp {
    fn name(&self) -> &str {
        "failing"
    }

    fn init(&self) -> Result<(), InternalError> {
        Ok(())
    }

    fn can(&self, _migration: &str) -> Result<bool, InternalError> {
        Ok(true)
    }

    fn save(&self, _migration: &str) -> Result<(), InternalError> {
        Ok(())
    }

    fn before_up(&self) -> Result<(), InternalError> {
        Err(InternalError::new(
            ErrorClass::Internal,
            ErrorOrigin::Migration,
            "cannot open unit",
        ))
    }

    fn after_up(&self, _success: bool) -> Result<(), InternalError> {
        Ok(())
    }

    fn apply(&self, _model: &MigrationModel) -> Result<(), InternalError> {
        Ok(())
    }
}

#[test]
fn failed_open_closes_the_providers_already_opened() {
    let (db, people, tags) = two_storage_db(multiple_providers());
    let manager = MigrationManager::new(&db).with_provider(&tags, FailingBeforeUp);

    let outcome = manager.run(&db, vec![unit("001_shared", |_| {})]);

    assert_eq!(outcome.errors().len(), 1);
    assert_eq!(outcome.errors()[0].message, "cannot open unit");
    assert!(!people.coordinator().is_active());
    assert!(StorageMigrationProvider::new(people, "_migrations").can("001_shared").unwrap());
}
