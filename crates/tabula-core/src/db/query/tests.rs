use super::*;
use crate::{
    db::{
        predicate::{CompareOp, FieldRef},
        sql::Direction,
    },
    error::ErrorClass,
    test_fixtures::{
        ARTICLE_MODEL, Article, EMPLOYEE_MODEL, Employee, PERSON_MODEL, Person, TAG_MODEL, Tag,
        memory_storage,
    },
    traits::Entity,
};
use std::sync::Arc;

fn storage() -> Arc<Storage> {
    let storage = memory_storage();
    for model in [&PERSON_MODEL, &EMPLOYEE_MODEL, &TAG_MODEL, &ARTICLE_MODEL] {
        storage.add_model(model);
    }
    storage.create_tables().unwrap();
    storage
}

fn create<E: Entity>(storage: &Storage, items: Vec<E>) -> Vec<E> {
    let outcome = Create::new(storage, items).run_with_error();
    assert!(outcome.is_success(), "{:?}", outcome.errors());
    outcome.into_value().unwrap()
}

fn names(people: &[Person]) -> Vec<&str> {
    people.iter().map(|p| p.name.as_str()).collect()
}

#[test]
fn create_then_filter_round_trips() {
    let storage = storage();
    let created = create(
        &storage,
        vec![Person::aged("Alice", 30), Person::aged("Bob", 45)],
    );
    assert!(created.iter().all(|p| p.id > 0));

    let found = Query::<Person>::new(&storage)
        .filter(FieldRef::new("name").eq("Alice"))
        .filter(FieldRef::new("age").gte(18_i64))
        .run();

    assert_eq!(found, vec![created[0].clone()]);
}

#[test]
fn relation_path_filters_through_join() {
    let storage = storage();
    let boss = create(&storage, vec![Person::new("Bob")]).remove(0);
    create(
        &storage,
        vec![
            Person::managed_by("Alice", boss.id),
            Person::new("Carol"),
        ],
    );

    let found = Query::<Person>::new(&storage)
        .filter(FieldRef::new("manager.name").eq("Bob"))
        .run();

    assert_eq!(names(&found), ["Alice"]);
}

#[test]
fn order_limit_and_offset_page_results() {
    let storage = storage();
    create(
        &storage,
        ["d", "a", "c", "b"].iter().map(|n| Person::new(n)).collect(),
    );

    let page = Query::<Person>::new(&storage)
        .order_by("name", Direction::Desc)
        .limit(2)
        .offset(1)
        .run();

    assert_eq!(names(&page), ["c", "b"]);
}

#[test]
fn single_returns_first_match_or_none() {
    let storage = storage();
    create(&storage, vec![Person::new("Alice")]);

    let hit = Query::<Person>::new(&storage)
        .filter(FieldRef::new("name").eq("Alice"))
        .single();
    let miss = Query::<Person>::new(&storage)
        .filter(FieldRef::new("name").eq("Nobody"))
        .single_with_error();

    assert_eq!(hit.map(|p| p.name), Some("Alice".to_string()));
    assert!(miss.is_success());
    assert!(miss.into_value().flatten().is_none());
}

#[test]
fn projected_rows_keep_only_listed_columns() {
    let storage = storage();
    create(&storage, vec![Person::aged("Alice", 30)]);

    let rows = Query::<Person>::new(&storage)
        .field("name")
        .rows_with_error()
        .into_value()
        .unwrap();

    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get::<String>("name").unwrap(), "Alice");
    assert!(rows[0].value("age").is_none());
}

#[test]
fn unknown_field_is_reported_not_panicked() {
    let storage = storage();

    let outcome = Query::<Person>::new(&storage)
        .filter(FieldRef::new("nope").eq(1_i64))
        .run_with_error();

    assert!(!outcome.is_success());
    assert!(outcome.value().is_none());
}

#[test]
fn prepared_query_rebinds_variables_per_run() {
    let storage = storage();
    create(
        &storage,
        vec![Person::aged("Alice", 30), Person::aged("Bob", 45)],
    );

    let prepared = Query::<Person>::new(&storage)
        .filter(FieldRef::new("name").eq_var("who"))
        .prepare()
        .unwrap();
    assert_eq!(prepared.variables(), ["who"]);

    let alice = prepared.new_run().set_variable("who", "Alice").run();
    let bob = prepared.new_run().set_variable("who", "Bob").run();

    assert_eq!(names(&alice), ["Alice"]);
    assert_eq!(names(&bob), ["Bob"]);
}

#[test]
fn prepared_membership_rebinds_lists_of_any_length() {
    let storage = storage();
    create(
        &storage,
        vec![
            Person::aged("Alice", 30),
            Person::aged("Bob", 45),
            Person::aged("Carol", 52),
        ],
    );

    let prepared = Query::<Person>::new(&storage)
        .filter(FieldRef::new("name").in_var("names"))
        .order_by("name", Direction::Asc)
        .prepare()
        .unwrap();
    assert_eq!(prepared.variables(), ["names"]);

    let two = prepared
        .new_run()
        .set_variable("names", vec!["Carol", "Alice"])
        .run();
    let one = prepared.new_run().set_variable("names", vec!["Bob"]).run();
    let none = prepared
        .new_run()
        .set_variable("names", Vec::<&str>::new())
        .run_with_error();

    assert_eq!(names(&two), ["Alice", "Carol"]);
    assert_eq!(names(&one), ["Bob"]);
    assert!(none.is_success(), "{:?}", none.errors());
    assert_eq!(none.into_value(), Some(Vec::new()));

    let excluded = Query::<Person>::new(&storage)
        .filter(FieldRef::new("name").compare_var(CompareOp::NotIn, "names"))
        .order_by("name", Direction::Asc)
        .prepare()
        .unwrap();
    let all = excluded
        .new_run()
        .set_variable("names", Vec::<&str>::new())
        .run();
    assert_eq!(names(&all), ["Alice", "Bob", "Carol"]);
}

#[test]
fn prepared_membership_rejects_a_scalar_binding() {
    let storage = storage();
    let prepared = Query::<Person>::new(&storage)
        .filter(FieldRef::new("name").in_var("names"))
        .prepare()
        .unwrap();

    let outcome = prepared.new_run().set_variable("names", "Alice").run_with_error();

    assert_eq!(outcome.errors().len(), 1);
    assert_eq!(outcome.errors()[0].class, ErrorClass::Unsupported);
}

#[test]
fn prepared_query_reports_unbound_variable() {
    let storage = storage();
    let prepared = Query::<Person>::new(&storage)
        .filter(FieldRef::new("name").eq_var("who"))
        .prepare()
        .unwrap();

    let outcome = prepared.new_run().run_with_error();

    assert_eq!(outcome.errors().len(), 1);
    assert_eq!(outcome.errors()[0].class, ErrorClass::Unsupported);
    assert!(outcome.errors()[0].message.contains("who"));
}

#[test]
fn new_run_starts_clean_after_previous_run() {
    let storage = storage();
    let prepared = Query::<Person>::new(&storage)
        .filter(FieldRef::new("name").eq_var("who"))
        .prepare()
        .unwrap();

    {
        let mut run = prepared.new_run();
        run.set_variable("who", "Alice");
        assert!(run.run_with_error().is_success());
    }

    assert!(!prepared.new_run().run_with_error().is_success());
}

#[test]
fn only_one_prepared_run_in_flight() {
    let storage = storage();
    let prepared = Exist::<Person>::new(&storage).prepare().unwrap();

    let held = prepared.new_run();
    assert!(prepared.try_new_run().is_none());
    drop(held);

    assert!(prepared.try_new_run().is_some());
}

#[test]
fn prepared_run_blocks_other_threads_until_dropped() {
    let storage = storage();
    let prepared = Exist::<Person>::new(&storage).prepare().unwrap();

    let held = prepared.new_run();
    std::thread::scope(|scope| {
        let waiter = scope.spawn(|| prepared.new_run().run());
        std::thread::sleep(std::time::Duration::from_millis(20));
        assert!(!waiter.is_finished());
        drop(held);
        assert!(!waiter.join().unwrap());
    });
}

#[test]
fn exist_counts_matches() {
    let storage = storage();
    create(
        &storage,
        vec![
            Person::aged("Alice", 30),
            Person::aged("Bob", 45),
            Person::aged("Carol", 12),
        ],
    );

    let adults = Exist::<Person>::new(&storage).filter(FieldRef::new("age").gte(18_i64));

    assert_eq!(adults.count(), 2);
    assert!(adults.run());
    assert!(
        !Exist::<Person>::new(&storage)
            .filter(FieldRef::new("name").eq("Dave"))
            .run()
    );
}

#[test]
fn bulk_create_assigns_increasing_ids() {
    let storage = storage();
    let people: Vec<Person> = (0..5).map(|i| Person::new(&format!("p{i}"))).collect();

    let created = Create::new(&storage, people).bulk(true).run();

    let ids: Vec<i64> = created.iter().map(|p| p.id).collect();
    assert_eq!(ids.len(), 5);
    assert!(ids.windows(2).all(|w| w[1] == w[0] + 1));
    assert_eq!(Query::<Person>::new(&storage).run(), created);
}

#[test]
fn create_with_id_keeps_supplied_keys() {
    let storage = storage();
    let mut person = Person::new("Alice");
    person.id = 42;

    let created = Create::one(&storage, person).with_id(true).run();

    assert_eq!(created[0].id, 42);
}

#[test]
fn inherited_entity_spans_both_tables() {
    let storage = storage();
    let created = create(&storage, vec![Employee::new("Eve", 1200.0)]).remove(0);

    let as_person = Query::<Person>::new(&storage).run();
    let as_employee = Query::<Employee>::new(&storage)
        .filter(FieldRef::new("salary").gt(1000.0))
        .run();

    assert_eq!(as_person.len(), 1);
    assert_eq!(as_person[0].id, created.id());
    assert_eq!(as_employee, vec![created]);
}

#[test]
fn update_writes_listed_fields_only() {
    let storage = storage();
    let mut alice = create(&storage, vec![Person::aged("Alice", 30)]).remove(0);
    alice.name = "Alicia".to_string();
    alice.age = Some(31);

    let affected = Update::one(&storage, alice.clone()).field("age").run();

    let stored = Query::<Person>::new(&storage).single().unwrap();
    assert_eq!(affected, 1);
    assert_eq!(stored.name, "Alice");
    assert_eq!(stored.age, Some(31));
}

#[test]
fn update_with_filter_writes_every_match() {
    let storage = storage();
    create(
        &storage,
        vec![
            Person::aged("Alice", 30),
            Person::aged("Bob", 45),
            Person::aged("Carol", 12),
        ],
    );

    let affected = Update::one(&storage, Person::aged("ignored", 99))
        .field("age")
        .filter(FieldRef::new("age").gte(18_i64))
        .run();

    let ages: Vec<Option<i64>> = Query::<Person>::new(&storage)
        .order_by("name", Direction::Asc)
        .run()
        .into_iter()
        .map(|p| p.age)
        .collect();
    assert_eq!(affected, 2);
    assert_eq!(ages, [Some(99), Some(99), Some(12)]);
}

#[test]
fn update_rejects_missing_and_key_fields() {
    let storage = storage();
    let alice = create(&storage, vec![Person::new("Alice")]).remove(0);

    let no_fields = Update::one(&storage, alice.clone()).run_with_error();
    let key_field = Update::one(&storage, alice.clone()).field("id").run_with_error();
    let unsaved = Update::one(&storage, Person::new("x")).field("name").run_with_error();

    assert!(no_fields.errors()[0].message.contains("at least one field"));
    assert!(key_field.errors()[0].message.contains("primary key"));
    assert!(unsaved.errors()[0].message.contains("not been stored"));
}

#[test]
fn links_are_written_reloaded_and_rewritten() {
    let storage = storage();
    let author = create(&storage, vec![Person::new("Alice")]).remove(0);
    let tags = create(&storage, vec![Tag::new("rust"), Tag::new("sql"), Tag::new("orm")]);

    let mut article = Article::new("Hello", author.id);
    article.tags = vec![tags[2].id, tags[0].id, tags[0].id];
    let article = create(&storage, vec![article]).remove(0);

    let loaded = Query::<Article>::new(&storage).single().unwrap();
    let mut expected = vec![tags[0].id, tags[2].id];
    expected.sort_unstable();
    assert_eq!(loaded.tags, expected);

    let mut changed = article;
    changed.tags = vec![tags[1].id];
    Update::one(&storage, changed).field("tags").run();

    let reloaded = Query::<Article>::new(&storage).single().unwrap();
    assert_eq!(reloaded.tags, [tags[1].id]);
    assert_eq!(reloaded.title, "Hello");
}

#[test]
fn link_rows_beyond_one_statement_are_all_written() {
    let storage = storage();
    let author = create(&storage, vec![Person::new("Alice")]).remove(0);
    let tags = create(
        &storage,
        (0..600).map(|i| Tag::new(&format!("tag{i}"))).collect(),
    );

    let mut article = Article::new("Tagged", author.id);
    article.tags = tags.iter().map(|t| t.id).collect();
    create(&storage, vec![article]);

    let loaded = Query::<Article>::new(&storage).single().unwrap();
    let mut expected: Vec<i64> = tags.iter().map(|t| t.id).collect();
    expected.sort_unstable();
    assert_eq!(loaded.tags.len(), 600);
    assert_eq!(loaded.tags, expected);
}

#[test]
fn filter_through_many_relation() {
    let storage = storage();
    let author = create(&storage, vec![Person::new("Alice")]).remove(0);
    let tags = create(&storage, vec![Tag::new("rust"), Tag::new("sql")]);
    let mut tagged = Article::new("Tagged", author.id);
    tagged.tags = vec![tags[0].id];
    create(&storage, vec![tagged, Article::new("Plain", author.id)]);

    let exists = Exist::<Article>::new(&storage)
        .filter(FieldRef::new("tags.label").eq("rust"))
        .run();
    let missing = Exist::<Article>::new(&storage)
        .filter(FieldRef::new("tags.label").eq("sql"))
        .run();

    assert!(exists);
    assert!(!missing);
}

#[test]
fn delete_applies_relation_policies() {
    let storage = storage();
    let boss = create(&storage, vec![Person::new("Bob")]).remove(0);
    let alice = create(&storage, vec![Person::managed_by("Alice", boss.id)]).remove(0);
    let tag = create(&storage, vec![Tag::new("rust")]).remove(0);
    let mut article = Article::new("By Bob", boss.id);
    article.tags = vec![tag.id];
    create(&storage, vec![article]);

    let deleted = Delete::items(&storage, &[boss]).run();

    assert_eq!(deleted, 1);
    // author cascade
    assert!(Query::<Article>::new(&storage).run().is_empty());
    // manager set null
    let remaining = Query::<Person>::new(&storage).run();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].id, alice.id);
    assert_eq!(remaining[0].manager_id, None);
    // intermediate rows gone, tag kept
    let links = storage
        .query_template(emit::select_where_in(
            storage.dialect(),
            "article_tag",
            &["tag_id"],
            "tag_id",
            &[tag.id],
        ))
        .unwrap();
    assert!(links.is_empty());
    assert_eq!(Query::<Tag>::new(&storage).run().len(), 1);
}

#[test]
fn deleting_a_subtype_follows_relations_declared_on_its_ancestor() {
    let storage = storage();
    let eve = create(&storage, vec![Employee::new("Eve", 10.0)]).remove(0);
    let report = create(&storage, vec![Person::managed_by("Ann", eve.id())]).remove(0);
    create(&storage, vec![Article::new("By Eve", eve.id())]);

    let deleted = Delete::items(&storage, &[eve]).run();

    assert_eq!(deleted, 1);
    assert!(Query::<Article>::new(&storage).run().is_empty());
    let remaining = Query::<Person>::new(&storage).run();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].id, report.id);
    assert_eq!(remaining[0].manager_id, None);
}

#[test]
fn deleting_a_parent_removes_descendant_rows() {
    let storage = storage();
    let eve = create(&storage, vec![Employee::new("Eve", 10.0)]).remove(0);

    let deleted = Delete::<Person>::new(&storage)
        .filter(FieldRef::new("id").eq(eve.id()))
        .run();

    assert_eq!(deleted, 1);
    assert!(Query::<Employee>::new(&storage).run().is_empty());
    let employee_rows = storage
        .query_template(emit::select_where_in(
            storage.dialect(),
            "employee",
            &["id"],
            "id",
            &[eve.id()],
        ))
        .unwrap();
    assert!(employee_rows.is_empty());
}

#[test]
fn prepared_delete_uses_bound_variable() {
    let storage = storage();
    create(
        &storage,
        vec![Person::new("Alice"), Person::new("Bob")],
    );

    let prepared = Delete::<Person>::new(&storage)
        .filter(FieldRef::new("name").eq_var("who"))
        .prepare()
        .unwrap();
    let deleted = prepared.new_run().set_variable("who", "Bob").run();

    assert_eq!(deleted, 1);
    assert_eq!(names(&Query::<Person>::new(&storage).run()), ["Alice"]);
}

#[test]
fn failed_create_rolls_back_the_batch() {
    let storage = storage();
    create(&storage, vec![Tag::new("rust")]);

    let outcome = Create::new(&storage, vec![Tag::new("sql"), Tag::new("rust")]).run_with_error();

    assert_eq!(outcome.errors()[0].class, ErrorClass::Conflict);
    let labels: Vec<String> = Query::<Tag>::new(&storage)
        .run()
        .into_iter()
        .map(|t| t.label)
        .collect();
    assert_eq!(labels, ["rust"]);
}
