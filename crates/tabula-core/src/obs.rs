//! Observability: tracing targets and the error side channel.
//!
//! All engine logging flows through these helpers so target names stay
//! stable for subscribers.

use crate::{config::LogConfig, db::sql::Statement, error::InternalError, outcome::Outcome};

pub const TARGET_SQL: &str = "tabula::sql";
pub const TARGET_TXN: &str = "tabula::txn";
pub const TARGET_MIGRATION: &str = "tabula::migration";
pub const TARGET_REGISTRY: &str = "tabula::registry";

/// Trace a statement right before it reaches the provider.
pub(crate) fn trace_statement(config: &LogConfig, statement: &Statement) {
    if config.trace_sql {
        tracing::debug!(
            target: TARGET_SQL,
            sql = %statement.sql,
            params = statement.params.len(),
            values = %serde_json::to_string(&statement.values()).unwrap_or_default(),
            "execute"
        );
    }
}

/// Report the errors of a bare-form call before they are discarded.
pub(crate) fn report_errors(config: &LogConfig, operation: &str, errors: &[InternalError]) {
    if !config.print_errors {
        return;
    }

    for err in errors {
        tracing::error!(
            target: "tabula",
            operation,
            origin = %err.origin,
            class = %err.class,
            "{}",
            err.message
        );
    }
}

/// Collapse an outcome to its bare value, reporting errors on the way.
pub(crate) fn collapse<T: Default>(config: &LogConfig, operation: &str, outcome: Outcome<T>) -> T {
    let (value, errors) = outcome.into_parts();
    report_errors(config, operation, &errors);

    value.unwrap_or_default()
}
