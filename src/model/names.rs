//! Strongly-typed identifier wrappers for the physical model.

use std::fmt;

use serde::Serialize;

/// A physical schema name (normalized, lowercase).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct DbSchemaName(String);

impl DbSchemaName {
    pub fn new(value: impl Into<String>) -> Self {
        DbSchemaName(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DbSchemaName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A schema-qualified table (or view) name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct DbTableName {
    schema: DbSchemaName,
    name: String,
}

impl DbTableName {
    pub fn new(schema: DbSchemaName, name: impl Into<String>) -> Self {
        DbTableName {
            schema,
            name: name.into(),
        }
    }

    pub fn schema(&self) -> &DbSchemaName {
        &self.schema
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The same table with a different object name, keeping the schema.
    pub fn renamed(&self, name: impl Into<String>) -> Self {
        DbTableName {
            schema: self.schema.clone(),
            name: name.into(),
        }
    }
}

impl fmt::Display for DbTableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.schema, self.name)
    }
}

/// A column name within a table.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct DbColumnName(String);

impl DbColumnName {
    pub fn new(value: impl Into<String>) -> Self {
        DbColumnName(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DbColumnName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An index name (schema-scoped on Pgsql, table-scoped on Mssql; unique per
/// schema here to satisfy both).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct DbIndexName(String);

impl DbIndexName {
    pub fn new(value: impl Into<String>) -> Self {
        DbIndexName(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DbIndexName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A trigger name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct DbTriggerName(String);

impl DbTriggerName {
    pub fn new(value: impl Into<String>) -> Self {
        DbTriggerName(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DbTriggerName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A project-qualified resource name, e.g. `Ed-Fi:School`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct QualifiedResourceName {
    pub project_name: String,
    pub resource_name: String,
}

impl QualifiedResourceName {
    pub fn new(project_name: impl Into<String>, resource_name: impl Into<String>) -> Self {
        QualifiedResourceName {
            project_name: project_name.into(),
            resource_name: resource_name.into(),
        }
    }
}

impl fmt::Display for QualifiedResourceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.project_name, self.resource_name)
    }
}
