use super::*;
use crate::{
    db::registry::RegistryError,
    test_fixtures::{ARTICLE_MODEL, EMPLOYEE_MODEL, PERSON_MODEL, TAG_MODEL},
};

#[test]
fn levels_are_root_first() {
    let levels: Vec<_> = EMPLOYEE_MODEL.levels().iter().map(|m| m.table).collect();

    assert_eq!(levels, ["person", "employee"]);
    assert!(EMPLOYEE_MODEL.root().same(&PERSON_MODEL));
    assert!(EMPLOYEE_MODEL.descends_from(&PERSON_MODEL));
    assert!(!PERSON_MODEL.descends_from(&EMPLOYEE_MODEL));
}

#[test]
fn find_column_walks_ancestors_and_field_names() {
    let (level, column) = EMPLOYEE_MODEL.find_column("name").expect("inherited column");
    assert_eq!(level.table, "person");
    assert_eq!(column.name, "name");

    let (_, relation) = PERSON_MODEL.find_column("manager").expect("relation field");
    assert_eq!(relation.name, "manager_id");
    assert!(matches!(relation.kind, ColumnKind::Relation { .. }));

    assert!(PERSON_MODEL.find_column("salary").is_none());
}

#[test]
fn intermediate_model_derives_column_names() {
    let link = ARTICLE_MODEL.intermediate("tags").expect("many relation");

    assert_eq!(link.table, "article_tag");
    assert_eq!(link.owner_column, "article_id");
    assert_eq!(link.target_column, "tag_id");
    assert!(link.target.same(&TAG_MODEL));
    assert!(ARTICLE_MODEL.intermediate("title").is_none());
}

#[test]
fn many_columns_are_not_physical() {
    let physical: Vec<_> = ARTICLE_MODEL.own_columns().map(|c| c.name).collect();

    assert_eq!(physical, ["id", "title", "published", "author_id"]);
    assert_eq!(ARTICLE_MODEL.many_columns().len(), 1);
}

#[test]
fn coalesce_defaults_exist_for_non_text_types() {
    assert_eq!(
        SqlType::Int.coalesce_default(),
        Some(crate::value::Value::Int(0))
    );
    assert!(SqlType::Date.coalesce_default().is_some());
    assert!(SqlType::Text.coalesce_default().is_none());
}

#[test]
fn related_members_match_the_target_and_its_ancestors() {
    let members = |model: &'static EntityModel, related: &'static EntityModel| -> Vec<&'static str> {
        model
            .related_members(related)
            .iter()
            .map(|(_, column)| column.name)
            .collect()
    };

    assert_eq!(members(&PERSON_MODEL, &PERSON_MODEL), ["manager_id"]);
    assert_eq!(members(&ARTICLE_MODEL, &EMPLOYEE_MODEL), ["author_id"]);
    assert_eq!(members(&ARTICLE_MODEL, &TAG_MODEL), ["tags"]);
    assert!(members(&TAG_MODEL, &PERSON_MODEL).is_empty());

    let inherited = EMPLOYEE_MODEL.related_members(&EMPLOYEE_MODEL);
    assert_eq!(inherited.len(), 1);
    assert_eq!(inherited[0].0.table, "person");
}

#[test]
fn pyramid_fixes_root_at_insertion() {
    let mut pyramid = Pyramid::new();
    let person = pyramid.insert(&PERSON_MODEL, Some("Person")).expect("person");
    let employee = pyramid.insert(&EMPLOYEE_MODEL, None).expect("employee");

    let node = pyramid.get(employee).expect("employee node");
    assert_eq!(node.parent, Some(person));
    assert_eq!(node.root(), person);
    assert_eq!(pyramid.ancestors(employee), [person]);
    assert_eq!(pyramid.descendants(person), [employee]);
    assert_eq!(pyramid.find("Person"), Some(person));
}

#[test]
fn pyramid_rejects_orphans_and_duplicates() {
    let mut pyramid = Pyramid::new();

    let orphan = pyramid.insert(&EMPLOYEE_MODEL, None).expect_err("parent missing");
    assert!(matches!(orphan, RegistryError::ParentNotRegistered { .. }));

    pyramid.insert(&PERSON_MODEL, None).expect("person");
    let dup = pyramid.insert(&PERSON_MODEL, None).expect_err("duplicate");
    assert!(matches!(dup, RegistryError::AlreadyRegistered { .. }));

    let shadow = pyramid
        .insert(&TAG_MODEL, Some(PERSON_MODEL.path))
        .expect_err("alias taken");
    assert!(matches!(shadow, RegistryError::AlreadyRegistered { ref path } if path == PERSON_MODEL.path));
    assert_eq!(pyramid.len(), 1);
    assert_eq!(pyramid.find(TAG_MODEL.path), None);
}
