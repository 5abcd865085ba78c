//! Neo4j schema reset (constraints and indexes).

use std::fmt;

use tracing::{debug, info};

use ocel_core::{OcelError, OcelResult};

use crate::store::GraphStore;

/// One schema statement of the reset sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaStatement {
    DropConstraint {
        name: &'static str,
    },
    DropIndex {
        name: &'static str,
    },
    CreateUniqueConstraint {
        name: &'static str,
        label: &'static str,
        property: &'static str,
    },
    CreateIndex {
        name: &'static str,
        label: &'static str,
        property: &'static str,
    },
}

impl SchemaStatement {
    /// Cypher for this statement. Always guarded by `IF [NOT] EXISTS`.
    pub fn cypher(&self) -> String {
        match self {
            Self::DropConstraint { name } => format!("DROP CONSTRAINT {name} IF EXISTS"),
            Self::DropIndex { name } => format!("DROP INDEX {name} IF EXISTS"),
            Self::CreateUniqueConstraint { name, label, property } => format!(
                "CREATE CONSTRAINT {name} IF NOT EXISTS FOR (n:{label}) REQUIRE n.{property} IS UNIQUE"
            ),
            Self::CreateIndex { name, label, property } => {
                format!("CREATE INDEX {name} IF NOT EXISTS FOR (n:{label}) ON (n.{property})")
            }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::DropConstraint { name }
            | Self::DropIndex { name }
            | Self::CreateUniqueConstraint { name, .. }
            | Self::CreateIndex { name, .. } => *name,
        }
    }
}

impl fmt::Display for SchemaStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.cypher())
    }
}

/// Statements run before every load: drop everything, then recreate.
pub const SCHEMA_STATEMENTS: &[SchemaStatement] = &[
    SchemaStatement::DropConstraint { name: "event_id_unique" },
    SchemaStatement::DropConstraint { name: "case_unique" },
    SchemaStatement::DropIndex { name: "activity_name" },
    SchemaStatement::CreateUniqueConstraint {
        name: "event_id_unique",
        label: "Event",
        property: "id",
    },
    SchemaStatement::CreateUniqueConstraint {
        name: "case_unique",
        label: "Case",
        property: "case_id",
    },
    SchemaStatement::CreateIndex {
        name: "activity_name",
        label: "Activity",
        property: "name",
    },
];

/// Drop and recreate the loader's constraints and indexes.
///
/// Safe on an empty store and across repeated runs. Stops at the first failing
/// statement.
pub async fn reset_schema(store: &dyn GraphStore) -> OcelResult<usize> {
    info!("Resetting Neo4j schema...");

    for statement in SCHEMA_STATEMENTS {
        debug!(statement = %statement, "Applying schema statement");
        store
            .apply_schema(statement)
            .await
            .map_err(|e| OcelError::Schema {
                statement: statement.cypher(),
                message: format!("{:#}", e),
            })?;
    }

    info!("Neo4j schema reset ({} statements)", SCHEMA_STATEMENTS.len());
    Ok(SCHEMA_STATEMENTS.len())
}
