// Copyright 2025 Cowboy AI, LLC.

//! Object-graph mapping sessions over the driver

use neo4rs::{Query, Row};
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

use crate::driver::Driver;
use crate::error::{BootstrapError, Result};

/// An entity stored as a labeled node.
///
/// Implementors describe their label and identity and reconstruct
/// themselves from a returned row; property serialization rides on
/// serde.
pub trait GraphEntity: Serialize + Sized {
    /// The node label for this entity type
    const LABEL: &'static str;

    /// The node identity, stored in the `id` property
    fn entity_id(&self) -> String;

    /// Rebuild the entity from a `RETURN n` row
    fn from_row(row: &Row) -> Result<Self>;
}

/// A node property value the bolt protocol can carry directly
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    /// Text property
    String(String),
    /// Integer property
    Integer(i64),
    /// Float property
    Float(f64),
    /// Boolean property
    Bool(bool),
}

/// Flatten an entity into sorted `(name, value)` property pairs.
///
/// `None` fields are skipped; nested structures are rejected, node
/// properties are flat by design.
pub fn to_properties<T: Serialize>(entity: &T) -> Result<Vec<(String, PropertyValue)>> {
    let value = serde_json::to_value(entity).map_err(|e| {
        BootstrapError::invalid_configuration("mapping.entity", "<entity>", e.to_string())
    })?;

    let serde_json::Value::Object(map) = value else {
        return Err(BootstrapError::invalid_configuration(
            "mapping.entity",
            "<entity>",
            "entities must serialize to an object",
        ));
    };

    let mut properties = Vec::with_capacity(map.len());
    for (name, value) in map {
        let property = match value {
            serde_json::Value::Null => continue,
            serde_json::Value::String(s) => PropertyValue::String(s),
            serde_json::Value::Bool(b) => PropertyValue::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => PropertyValue::Integer(i),
                None => PropertyValue::Float(n.as_f64().unwrap_or_default()),
            },
            serde_json::Value::Array(_) | serde_json::Value::Object(_) => {
                return Err(BootstrapError::invalid_configuration(
                    "mapping.entity",
                    name,
                    "nested values are not supported as node properties",
                ));
            }
        };
        properties.push((name, property));
    }
    properties.sort_by(|(a, _), (b, _)| a.cmp(b));
    Ok(properties)
}

fn apply_param(query: Query, key: &str, value: &PropertyValue) -> Query {
    match value {
        PropertyValue::String(s) => query.param(key, s.clone()),
        PropertyValue::Integer(i) => query.param(key, *i),
        PropertyValue::Float(f) => query.param(key, *f),
        PropertyValue::Bool(b) => query.param(key, *b),
    }
}

fn merge_statement(label: &str, properties: &[(String, PropertyValue)]) -> String {
    let assignments: Vec<String> = properties
        .iter()
        .map(|(name, _)| format!("n.`{name}` = ${name}"))
        .collect();
    if assignments.is_empty() {
        format!("MERGE (n:`{label}` {{id: $id}})")
    } else {
        format!(
            "MERGE (n:`{label}` {{id: $id}}) SET {}",
            assignments.join(", ")
        )
    }
}

/// Creates mapping sessions bound to the wired driver
#[derive(Clone)]
pub struct SessionFactory {
    driver: Arc<Driver>,
}

impl SessionFactory {
    /// Create a factory over the given driver
    pub fn new(driver: Arc<Driver>) -> Self {
        Self { driver }
    }

    /// Open a new mapping session
    pub fn session(&self) -> MappingSession {
        MappingSession {
            driver: Arc::clone(&self.driver),
        }
    }
}

/// A unit of object-mapping work against the graph
pub struct MappingSession {
    driver: Arc<Driver>,
}

impl MappingSession {
    /// Create or update the node backing the entity
    pub async fn save<T: GraphEntity>(&self, entity: &T) -> Result<()> {
        let properties = to_properties(entity)?;
        debug!("Saving {} '{}'", T::LABEL, entity.entity_id());

        let mut query = Query::new(merge_statement(T::LABEL, &properties))
            .param("id", entity.entity_id());
        for (name, value) in &properties {
            query = apply_param(query, name, value);
        }

        self.driver.run(query).await
    }

    /// Load an entity by id, `None` when no such node exists
    pub async fn load<T: GraphEntity>(&self, id: &str) -> Result<Option<T>> {
        let query = Query::new(format!("MATCH (n:`{}` {{id: $id}}) RETURN n", T::LABEL))
            .param("id", id.to_string());

        match self.driver.execute(query).await? {
            Some(row) => Ok(Some(T::from_row(&row)?)),
            None => Ok(None),
        }
    }

    /// Detach-delete the node backing the entity id
    pub async fn delete<T: GraphEntity>(&self, id: &str) -> Result<()> {
        debug!("Deleting {} '{}'", T::LABEL, id);
        let query = Query::new(format!(
            "MATCH (n:`{}` {{id: $id}}) DETACH DELETE n",
            T::LABEL
        ))
        .param("id", id.to_string());

        self.driver.run(query).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde::Serialize;

    #[derive(Serialize)]
    struct Movie {
        id: String,
        title: String,
        released: i64,
        rating: f64,
        watched: bool,
        tagline: Option<String>,
    }

    fn movie() -> Movie {
        Movie {
            id: "m1".into(),
            title: "The Matrix".into(),
            released: 1999,
            rating: 8.7,
            watched: true,
            tagline: None,
        }
    }

    #[test]
    fn properties_are_flattened_and_sorted() {
        let properties = to_properties(&movie()).unwrap();
        let names: Vec<&str> = properties.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["id", "rating", "released", "title", "watched"]);
        assert!(properties
            .iter()
            .any(|(n, v)| n == "released" && *v == PropertyValue::Integer(1999)));
        assert!(properties
            .iter()
            .any(|(n, v)| n == "watched" && *v == PropertyValue::Bool(true)));
    }

    #[test]
    fn none_fields_are_skipped() {
        let properties = to_properties(&movie()).unwrap();
        assert!(!properties.iter().any(|(n, _)| n == "tagline"));
    }

    #[test]
    fn nested_values_are_rejected() {
        #[derive(Serialize)]
        struct Nested {
            id: String,
            tags: Vec<String>,
        }
        let result = to_properties(&Nested {
            id: "x".into(),
            tags: vec!["a".into()],
        });
        assert!(matches!(
            result,
            Err(BootstrapError::InvalidConfiguration { .. })
        ));
    }

    #[test]
    fn merge_statement_lists_every_property() {
        let properties = to_properties(&movie()).unwrap();
        let statement = merge_statement("Movie", &properties);
        assert!(statement.starts_with("MERGE (n:`Movie` {id: $id}) SET "));
        assert!(statement.contains("n.`title` = $title"));
        assert!(statement.contains("n.`released` = $released"));
    }

    #[test]
    fn merge_statement_without_properties_has_no_set_clause() {
        let statement = merge_statement("Marker", &[]);
        assert_eq!(statement, "MERGE (n:`Marker` {id: $id})");
    }
}
