use super::*;
use crate::{
    db::sql::{ParamWriter, emit},
    test_fixtures::{ARTICLE_MODEL, EMPLOYEE_MODEL, PERSON_MODEL, TAG_MODEL},
    value::Value,
};

fn storage_with(models: &[&'static EntityModel]) -> Storage {
    let storage = Storage::sqlite_memory().unwrap();
    for model in models {
        storage.add_model(model);
    }
    storage
}

fn statement(storage: &Storage, sql: &str, values: Vec<Value>) -> Statement {
    let mut writer = ParamWriter::new(storage.dialect());
    let mut sql = sql.to_string();
    for value in values {
        let placeholder = writer.literal(value);
        sql = sql.replacen('?', &placeholder, 1);
    }
    writer.finish(sql).into_statement().unwrap()
}

#[test]
fn create_tables_orders_dependencies_first() {
    // article references person; employee extends person
    let storage = storage_with(&[&ARTICLE_MODEL, &EMPLOYEE_MODEL, &TAG_MODEL, &PERSON_MODEL]);

    let created = storage.create_tables().unwrap();

    let position = |table: &str| created.iter().position(|t| t == table).unwrap();
    assert!(position("person") < position("article"));
    assert!(position("person") < position("employee"));
    assert_eq!(created.last().map(String::as_str), Some("article_tag"));
    assert_eq!(created.len(), 5);
}

#[test]
fn create_tables_skips_existing_tables() {
    let storage = storage_with(&[&PERSON_MODEL]);

    assert_eq!(storage.create_tables().unwrap(), vec!["person".to_string()]);
    assert!(storage.create_tables().unwrap().is_empty());
    assert!(storage.table_exists("person").unwrap());
    assert!(!storage.table_exists("missing").unwrap());
}

#[test]
fn add_model_is_idempotent() {
    let storage = storage_with(&[&PERSON_MODEL, &PERSON_MODEL]);

    assert_eq!(storage.models().len(), 1);
    assert!(storage.has_model(&PERSON_MODEL));
    assert!(!storage.has_model(&TAG_MODEL));
}

#[test]
fn insert_returns_generated_keys_in_order() {
    let storage = storage_with(&[&TAG_MODEL]);
    storage.create_tables().unwrap();

    let first = emit::insert(
        storage.dialect(),
        "tag",
        &["label"],
        &[vec![Value::Text("a".into())]],
    );
    let second = emit::insert(
        storage.dialect(),
        "tag",
        &["label"],
        &[vec![Value::Text("b".into())]],
    );

    let a = storage.insert(&first.into_statement().unwrap()).unwrap();
    let b = storage.insert(&second.into_statement().unwrap()).unwrap();
    assert!(b > a);
}

#[test]
fn query_decodes_column_values() {
    let storage = storage_with(&[&PERSON_MODEL]);
    storage.create_tables().unwrap();

    let insert = statement(
        &storage,
        "INSERT INTO person (name, age) VALUES (?, ?)",
        vec![Value::Text("Ada".into()), Value::Null],
    );
    storage.execute(&insert).unwrap();

    let rows = storage
        .query(&statement(
            &storage,
            "SELECT id, name, age FROM person WHERE name = ?",
            vec![Value::Text("Ada".into())],
        ))
        .unwrap();

    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].value("name"), Some(&Value::Text("Ada".into())));
    assert_eq!(rows[0].value("age"), Some(&Value::Null));
    assert!(matches!(rows[0].value("id"), Some(Value::Int(_))));
}

#[test]
fn dates_and_bools_round_trip_as_text_and_integers() {
    let storage = Storage::sqlite_memory().unwrap();
    storage
        .execute_template(emit::ddl(
            storage.dialect(),
            "CREATE TABLE probe (d TEXT, b INTEGER)".to_string(),
        ))
        .unwrap();

    let date = chrono::NaiveDate::from_ymd_opt(2024, 2, 29).unwrap();
    storage
        .execute(&statement(
            &storage,
            "INSERT INTO probe (d, b) VALUES (?, ?)",
            vec![Value::Date(date), Value::Bool(true)],
        ))
        .unwrap();

    let rows = storage
        .query(&statement(&storage, "SELECT d, b FROM probe", vec![]))
        .unwrap();
    let decoded: chrono::NaiveDate = rows[0].get("d").unwrap();
    let flag: bool = rows[0].get("b").unwrap();

    assert_eq!(decoded, date);
    assert!(flag);
}

#[test]
fn list_values_are_rejected_at_bind_time() {
    let storage = Storage::sqlite_memory().unwrap();
    let stmt = statement(&storage, "SELECT ?", vec![Value::List(vec![Value::Int(1)])]);

    let err = storage.query(&stmt).unwrap_err();
    assert_eq!(err.class, ErrorClass::Unsupported);
}

#[test]
fn constraint_violations_classify_as_conflict() {
    let storage = storage_with(&[&TAG_MODEL]);
    storage.create_tables().unwrap();

    let insert = || {
        emit::insert(
            storage.dialect(),
            "tag",
            &["label"],
            &[vec![Value::Text("dup".into())]],
        )
        .into_statement()
        .unwrap()
    };
    storage.insert(&insert()).unwrap();
    let err = storage.insert(&insert()).unwrap_err();

    assert_eq!(err.class, ErrorClass::Conflict);
}

#[test]
fn invalid_sql_reports_the_statement() {
    let storage = Storage::sqlite_memory().unwrap();
    let stmt = statement(&storage, "SELEC nonsense", vec![]);

    let err = storage.query(&stmt).unwrap_err();
    assert!(err.message.contains("SELEC nonsense"));
}

#[test]
fn file_storage_persists_between_connections() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("people.db");

    {
        let storage = Storage::sqlite_file(&path).unwrap();
        storage.add_model(&PERSON_MODEL);
        storage.create_tables().unwrap();
        assert_eq!(storage.name(), "people");
    }

    let reopened = Storage::sqlite_file(&path).unwrap();
    assert!(reopened.table_exists("person").unwrap());
}

#[test]
fn rollback_discards_rows() {
    let storage = storage_with(&[&TAG_MODEL]);
    storage.create_tables().unwrap();

    let tx = storage.begin().unwrap();
    storage
        .execute_template(emit::insert(
            storage.dialect(),
            "tag",
            &["label"],
            &[vec![Value::Text("gone".into())]],
        ))
        .unwrap();
    tx.rollback().unwrap();

    let rows = storage
        .query(&statement(&storage, "SELECT COUNT(*) AS nb FROM tag", vec![]))
        .unwrap();
    assert_eq!(rows[0].get::<i64>("nb").unwrap(), 0);
}
