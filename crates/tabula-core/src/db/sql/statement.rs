use crate::{
    db::{
        query::QueryError,
        sql::{Dialect, Placeholders},
    },
    value::Value,
};
use std::collections::HashMap;

/// Values for the named variables of a prepared statement.
pub type Bindings = HashMap<String, Value>;

///
/// PatternKind
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PatternKind {
    Contains,
    StartsWith,
    EndsWith,
}

impl PatternKind {
    /// Escape wildcard characters in `text` and wrap it for `LIKE`.
    #[must_use]
    pub fn wrap(self, text: &str) -> String {
        let escaped = escape_like(text);
        match self {
            Self::Contains => format!("%{escaped}%"),
            Self::StartsWith => format!("{escaped}%"),
            Self::EndsWith => format!("%{escaped}"),
        }
    }
}

/// Escape `\`, `%` and `_` with a backslash.
#[must_use]
pub fn escape_like(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

///
/// SlotSource
///

#[derive(Clone, Debug, PartialEq)]
pub enum SlotSource {
    Literal(Value),
    Variable {
        name: String,
        pattern: Option<PatternKind>,
    },
    /// Membership against a bound list. The slot stands for the whole
    /// `column [NOT] IN (...)` expression and expands to one parameter per
    /// item when bound.
    List {
        name: String,
        column: String,
        negated: bool,
    },
}

///
/// ParamSlot
///

#[derive(Clone, Debug, PartialEq)]
pub struct ParamSlot {
    pub name: String,
    pub placeholder: String,
    pub source: SlotSource,
}

impl ParamSlot {
    fn render(&self) -> String {
        match &self.source {
            SlotSource::List {
                column, negated, ..
            } => format!("{column} {} ({})", membership_keyword(*negated), self.placeholder),
            _ => self.placeholder.clone(),
        }
    }
}

const fn membership_keyword(negated: bool) -> &'static str {
    if negated { "NOT IN" } else { "IN" }
}

// Marks a slot position inside SQL text until `ParamWriter::finish`.
const SLOT_MARK: char = '\u{1}';

#[derive(Clone, Debug, PartialEq)]
enum Piece {
    Text(String),
    Slot(usize),
}

fn split_pieces(sql: &str, slots: usize) -> Vec<Piece> {
    let mut pieces = Vec::new();
    for (i, part) in sql.split(SLOT_MARK).enumerate() {
        match part.parse::<usize>() {
            Ok(index) if i % 2 == 1 && index < slots => pieces.push(Piece::Slot(index)),
            _ if part.is_empty() => {}
            _ => pieces.push(Piece::Text(part.to_string())),
        }
    }

    pieces
}

///
/// StatementTemplate
///
/// SQL text with named parameter slots. Literal slots already carry their
/// value; variable slots are filled by `bind`.
///

#[derive(Clone, Debug, PartialEq)]
pub struct StatementTemplate {
    pub sql: String,
    pub slots: Vec<ParamSlot>,
    pieces: Vec<Piece>,
    placeholders: Placeholders,
}

impl StatementTemplate {
    /// Names of the variables this template needs, in slot order.
    #[must_use]
    pub fn variables(&self) -> Vec<&str> {
        self.slots
            .iter()
            .filter_map(|slot| match &slot.source {
                SlotSource::Variable { name, .. } | SlotSource::List { name, .. } => {
                    Some(name.as_str())
                }
                SlotSource::Literal(_) => None,
            })
            .collect()
    }

    /// Resolve every slot against `bindings`. List slots expand to one
    /// parameter per item, so placeholders are renumbered in slot order.
    pub fn bind(&self, bindings: &Bindings) -> Result<Statement, QueryError> {
        let mut params = Vec::with_capacity(self.slots.len());
        let mut rendered = Vec::with_capacity(self.slots.len());

        for slot in &self.slots {
            let text = match &slot.source {
                SlotSource::Literal(value) => self.param(&mut params, &slot.name, value.clone()),
                SlotSource::Variable { name, pattern } => {
                    let value = scalar(name, *pattern, lookup(bindings, name)?)?;
                    self.param(&mut params, &slot.name, value)
                }
                SlotSource::List {
                    name,
                    column,
                    negated,
                } => {
                    let items = match lookup(bindings, name)? {
                        Value::List(items) => items,
                        other => {
                            return Err(QueryError::VariableType {
                                name: name.clone(),
                                found: other.kind_name(),
                            });
                        }
                    };
                    if let Some(bad) = items.iter().find(|v| v.is_null() || v.is_list()) {
                        return Err(QueryError::VariableType {
                            name: name.clone(),
                            found: bad.kind_name(),
                        });
                    }

                    if items.is_empty() {
                        let constant = if *negated { "1 = 1" } else { "1 = 0" };
                        constant.to_string()
                    } else {
                        let list = items
                            .iter()
                            .enumerate()
                            .map(|(i, item)| {
                                self.param(&mut params, &format!("{}_{i}", slot.name), item.clone())
                            })
                            .collect::<Vec<_>>()
                            .join(", ");
                        format!("{column} {} ({list})", membership_keyword(*negated))
                    }
                }
            };
            rendered.push(text);
        }

        let sql = self
            .pieces
            .iter()
            .map(|piece| match piece {
                Piece::Text(text) => text.as_str(),
                Piece::Slot(index) => rendered[*index].as_str(),
            })
            .collect();

        Ok(Statement { sql, params })
    }

    fn param(&self, params: &mut Vec<BoundParam>, name: &str, value: Value) -> String {
        let placeholder = self.placeholders.render(name, params.len() + 1);
        params.push(BoundParam {
            name: name.to_string(),
            placeholder: placeholder.clone(),
            value,
        });

        placeholder
    }

    /// Bind a template that has no variables.
    pub fn into_statement(self) -> Result<Statement, QueryError> {
        self.bind(&Bindings::new())
    }
}

fn lookup<'b>(bindings: &'b Bindings, name: &str) -> Result<&'b Value, QueryError> {
    bindings
        .get(name)
        .ok_or_else(|| QueryError::UnboundVariable {
            name: name.to_string(),
        })
}

fn scalar(name: &str, pattern: Option<PatternKind>, value: &Value) -> Result<Value, QueryError> {
    match (pattern, value) {
        (Some(kind), Value::Text(text)) => Ok(Value::Text(kind.wrap(text))),
        (_, Value::List(_)) | (Some(_), _) => Err(QueryError::VariableType {
            name: name.to_string(),
            found: value.kind_name(),
        }),
        (None, value) => Ok(value.clone()),
    }
}

///
/// BoundParam
///

#[derive(Clone, Debug, PartialEq)]
pub struct BoundParam {
    pub name: String,
    pub placeholder: String,
    pub value: Value,
}

///
/// Statement
///
/// Executable SQL text plus its ordered parameters.
///

#[derive(Clone, Debug, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<BoundParam>,
}

impl Statement {
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&Value> {
        self.params.iter().find(|p| p.name == name).map(|p| &p.value)
    }

    #[must_use]
    pub fn values(&self) -> Vec<&Value> {
        self.params.iter().map(|p| &p.value).collect()
    }
}

///
/// ParamWriter
///
/// Allocates parameter names `p0`, `p1`, ... in render order.
///

pub struct ParamWriter<'a> {
    dialect: &'a dyn Dialect,
    slots: Vec<ParamSlot>,
}

impl<'a> ParamWriter<'a> {
    #[must_use]
    pub fn new(dialect: &'a dyn Dialect) -> Self {
        Self {
            dialect,
            slots: Vec::new(),
        }
    }

    #[must_use]
    pub const fn dialect(&self) -> &'a dyn Dialect {
        self.dialect
    }

    /// Add a slot and return the marker standing for it in SQL text.
    /// `finish` swaps each marker for the dialect placeholder.
    pub fn push(&mut self, source: SlotSource) -> String {
        let index = self.slots.len();
        let name = format!("p{index}");
        let placeholder = self.dialect.placeholder(&name, index + 1);
        self.slots.push(ParamSlot {
            name,
            placeholder,
            source,
        });

        format!("{SLOT_MARK}{index}{SLOT_MARK}")
    }

    pub fn literal(&mut self, value: Value) -> String {
        self.push(SlotSource::Literal(value))
    }

    /// Comma-separated placeholders for `ids`.
    pub fn id_list(&mut self, ids: &[i64]) -> String {
        ids.iter()
            .map(|id| self.literal(Value::Int(*id)))
            .collect::<Vec<_>>()
            .join(", ")
    }

    #[must_use]
    pub fn finish(self, sql: String) -> StatementTemplate {
        let pieces = split_pieces(&sql, self.slots.len());
        let sql = pieces
            .iter()
            .map(|piece| match piece {
                Piece::Text(text) => text.clone(),
                Piece::Slot(index) => self.slots[*index].render(),
            })
            .collect();

        StatementTemplate {
            sql,
            slots: self.slots,
            pieces,
            placeholders: self.dialect.placeholders(),
        }
    }
}
