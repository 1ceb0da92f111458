//! Hand-written entities shared by the unit tests.
//!
//! `Person` references itself through `manager`, `Employee` inherits from
//! `Person`, and `Article` links to many `Tag`s through `article_tag`.

use crate::{
    db::{Database, storage::Storage},
    error::InternalError,
    model::{ColumnModel, EntityModel, OnDelete, RelationTarget, SizeClass, SqlType},
    traits::Entity,
    value::{Row, Value},
};
use std::sync::Arc;

///
/// Person
///

pub static PERSON_MODEL: EntityModel = EntityModel {
    path: "test_fixtures::Person",
    table: "person",
    primary_key: "id",
    columns: &[
        ColumnModel::primary("id"),
        ColumnModel::text("name", SizeClass::Bounded(100)),
        ColumnModel::scalar("age", SqlType::Int).nullable(),
        ColumnModel::relation(
            "manager_id",
            "manager",
            RelationTarget(person_model),
            OnDelete::SetNull,
        )
        .nullable(),
    ],
    parent: None,
};

fn person_model() -> &'static EntityModel {
    &PERSON_MODEL
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Person {
    pub id: i64,
    pub name: String,
    pub age: Option<i64>,
    pub manager_id: Option<i64>,
}

impl Person {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }

    pub fn aged(name: &str, age: i64) -> Self {
        Self {
            age: Some(age),
            ..Self::new(name)
        }
    }

    pub fn managed_by(name: &str, manager: i64) -> Self {
        Self {
            manager_id: Some(manager),
            ..Self::new(name)
        }
    }
}

impl Entity for Person {
    const MODEL: &'static EntityModel = &PERSON_MODEL;

    fn id(&self) -> i64 {
        self.id
    }

    fn set_id(&mut self, id: i64) {
        self.id = id;
    }

    fn to_values(&self) -> Vec<(&'static str, Value)> {
        vec![
            ("id", Value::Int(self.id)),
            ("name", Value::Text(self.name.clone())),
            ("age", self.age.map_or(Value::Null, Value::Int)),
            ("manager_id", self.manager_id.map_or(Value::Null, Value::Int)),
        ]
    }

    fn from_row(row: &Row) -> Result<Self, InternalError> {
        Ok(Self {
            id: row.get("id")?,
            name: row.get("name")?,
            age: row.get("age")?,
            manager_id: row.get("manager_id")?,
        })
    }
}

///
/// Employee
///

pub static EMPLOYEE_MODEL: EntityModel = EntityModel {
    path: "test_fixtures::Employee",
    table: "employee",
    primary_key: "id",
    columns: &[
        ColumnModel::inherited_primary("id"),
        ColumnModel::scalar("salary", SqlType::Float),
    ],
    parent: Some(&PERSON_MODEL),
};

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Employee {
    pub person: Person,
    pub salary: f64,
}

impl Employee {
    pub fn new(name: &str, salary: f64) -> Self {
        Self {
            person: Person::new(name),
            salary,
        }
    }
}

impl Entity for Employee {
    const MODEL: &'static EntityModel = &EMPLOYEE_MODEL;

    fn id(&self) -> i64 {
        self.person.id
    }

    fn set_id(&mut self, id: i64) {
        self.person.id = id;
    }

    fn to_values(&self) -> Vec<(&'static str, Value)> {
        let mut values = self.person.to_values();
        values.push(("salary", Value::Float(self.salary)));
        values
    }

    fn from_row(row: &Row) -> Result<Self, InternalError> {
        Ok(Self {
            person: Person::from_row(row)?,
            salary: row.get("salary")?,
        })
    }
}

///
/// Tag
///

pub static TAG_MODEL: EntityModel = EntityModel {
    path: "test_fixtures::Tag",
    table: "tag",
    primary_key: "id",
    columns: &[
        ColumnModel::primary("id"),
        ColumnModel::text("label", SizeClass::Bounded(40)).unique(),
    ],
    parent: None,
};

fn tag_model() -> &'static EntityModel {
    &TAG_MODEL
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Tag {
    pub id: i64,
    pub label: String,
}

impl Tag {
    pub fn new(label: &str) -> Self {
        Self {
            id: 0,
            label: label.to_string(),
        }
    }
}

impl Entity for Tag {
    const MODEL: &'static EntityModel = &TAG_MODEL;

    fn id(&self) -> i64 {
        self.id
    }

    fn set_id(&mut self, id: i64) {
        self.id = id;
    }

    fn to_values(&self) -> Vec<(&'static str, Value)> {
        vec![
            ("id", Value::Int(self.id)),
            ("label", Value::Text(self.label.clone())),
        ]
    }

    fn from_row(row: &Row) -> Result<Self, InternalError> {
        Ok(Self {
            id: row.get("id")?,
            label: row.get("label")?,
        })
    }
}

///
/// Article
///

pub static ARTICLE_MODEL: EntityModel = EntityModel {
    path: "test_fixtures::Article",
    table: "article",
    primary_key: "id",
    columns: &[
        ColumnModel::primary("id"),
        ColumnModel::text("title", SizeClass::Bounded(200)).indexed(),
        ColumnModel::scalar("published", SqlType::Bool),
        ColumnModel::relation(
            "author_id",
            "author",
            RelationTarget(person_model),
            OnDelete::Cascade,
        )
        .nullable(),
        ColumnModel::many("tags", RelationTarget(tag_model), "article_tag"),
    ],
    parent: None,
};

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Article {
    pub id: i64,
    pub title: String,
    pub published: bool,
    pub author_id: Option<i64>,
    pub tags: Vec<i64>,
}

impl Article {
    pub fn new(title: &str, author: i64) -> Self {
        Self {
            title: title.to_string(),
            author_id: Some(author),
            ..Self::default()
        }
    }
}

impl Entity for Article {
    const MODEL: &'static EntityModel = &ARTICLE_MODEL;

    fn id(&self) -> i64 {
        self.id
    }

    fn set_id(&mut self, id: i64) {
        self.id = id;
    }

    fn to_values(&self) -> Vec<(&'static str, Value)> {
        vec![
            ("id", Value::Int(self.id)),
            ("title", Value::Text(self.title.clone())),
            ("published", Value::Bool(self.published)),
            ("author_id", self.author_id.map_or(Value::Null, Value::Int)),
        ]
    }

    fn from_row(row: &Row) -> Result<Self, InternalError> {
        Ok(Self {
            id: row.get("id")?,
            title: row.get("title")?,
            published: row.get("published")?,
            author_id: row.get("author_id")?,
            tags: Vec::new(),
        })
    }

    fn links(&self, field: &str) -> Vec<i64> {
        match field {
            "tags" => self.tags.clone(),
            _ => Vec::new(),
        }
    }

    fn set_links(&mut self, field: &str, ids: Vec<i64>) {
        if field == "tags" {
            self.tags = ids;
        }
    }
}

///
/// Helpers
///

/// In-memory SQLite storage with no registered models.
pub fn memory_storage() -> Arc<Storage> {
    Arc::new(Storage::sqlite_memory().expect("in-memory sqlite opens"))
}

/// Database with every fixture registered on one in-memory storage and
/// tables created.
pub fn fixture_db() -> Database {
    let db = Database::new();
    let storage = memory_storage();

    db.register::<Person>(&storage).expect("register person");
    db.register::<Employee>(&storage).expect("register employee");
    db.register::<Tag>(&storage).expect("register tag");
    db.register::<Article>(&storage).expect("register article");
    db.init().expect("create tables");

    db
}
