//! Schema catalog - entities, columns, and relationships.
//!
//! The catalog is a read-only description of the relational schema the
//! planner works against: per entity, its table name, primary key, column
//! set, and named relationships. It is built in code or loaded from JSON
//! and never mutated afterwards, so it is safe to share across threads.

use std::collections::HashMap;

use inflector::Inflector;
use serde::{Deserialize, Serialize};

use crate::error::{AggregateError, TallyResult};

/// Column data types, as declared by the schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    Integer,
    BigInt,
    Float,
    Decimal,
    Text,
    Uuid,
    Boolean,
    Date,
    Timestamp,
}

/// A column descriptor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub column_type: ColumnType,
    #[serde(default)]
    pub limit: Option<u32>,
    #[serde(default)]
    pub precision: Option<u32>,
    #[serde(default)]
    pub scale: Option<u32>,
}

impl Column {
    pub fn new(name: &str, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
            limit: None,
            precision: None,
            scale: None,
        }
    }
}

/// Relationship macro.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipKind {
    BelongsTo,
    HasOne,
    HasMany,
    HasManyThrough,
}

/// The intermediate hop of a many-to-many relationship.
///
/// For `A has_many C through B`: `entity` is B, `source_key` is B's foreign
/// key to A, `target_key` is B's foreign key to C.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Through {
    pub entity: String,
    pub source_key: String,
    pub target_key: String,
}

/// A named relationship from one entity to another.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Relationship {
    pub kind: RelationshipKind,
    pub target: String,
    /// For `belongs_to`: the FK on the owning entity. For `has_many` /
    /// `has_one`: the FK on the target entity. Absent for through
    /// relationships, whose keys live on [`Through`].
    #[serde(default)]
    pub foreign_key: Option<String>,
    #[serde(default)]
    pub through: Option<Through>,
}

/// An entity: table, primary key, columns, and relationships.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    pub name: String,
    /// Defaults to the pluralized snake case of `name`.
    #[serde(default)]
    pub table: String,
    #[serde(default = "default_primary_key")]
    pub primary_key: String,
    #[serde(default)]
    pub columns: Vec<Column>,
    #[serde(default)]
    pub relationships: HashMap<String, Relationship>,
}

fn default_primary_key() -> String {
    "id".into()
}

impl Entity {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.into(),
            table: name.to_table_case(),
            primary_key: default_primary_key(),
            columns: vec![Column::new("id", ColumnType::Integer)],
            relationships: HashMap::new(),
        }
    }

    pub fn with_table(mut self, table: &str) -> Self {
        self.table = table.into();
        self
    }

    pub fn with_primary_key(mut self, name: &str, column_type: ColumnType) -> Self {
        let old_pk = std::mem::replace(&mut self.primary_key, name.into());
        self.columns.retain(|c| c.name != old_pk);
        self.columns.insert(0, Column::new(name, column_type));
        self
    }

    pub fn with_column(mut self, name: &str, column_type: ColumnType) -> Self {
        self.columns.push(Column::new(name, column_type));
        self
    }

    pub fn with_belongs_to(mut self, name: &str, target: &str, foreign_key: &str) -> Self {
        self.relationships.insert(
            name.into(),
            Relationship {
                kind: RelationshipKind::BelongsTo,
                target: target.into(),
                foreign_key: Some(foreign_key.into()),
                through: None,
            },
        );
        self
    }

    pub fn with_has_one(mut self, name: &str, target: &str, foreign_key: &str) -> Self {
        self.relationships.insert(
            name.into(),
            Relationship {
                kind: RelationshipKind::HasOne,
                target: target.into(),
                foreign_key: Some(foreign_key.into()),
                through: None,
            },
        );
        self
    }

    pub fn with_has_many(mut self, name: &str, target: &str, foreign_key: &str) -> Self {
        self.relationships.insert(
            name.into(),
            Relationship {
                kind: RelationshipKind::HasMany,
                target: target.into(),
                foreign_key: Some(foreign_key.into()),
                through: None,
            },
        );
        self
    }

    /// `A has_many C through B`. `through` names the join entity B;
    /// `source_key`/`target_key` are B's foreign keys to A and C.
    pub fn with_has_many_through(
        mut self,
        name: &str,
        target: &str,
        through: &str,
        source_key: &str,
        target_key: &str,
    ) -> Self {
        self.relationships.insert(
            name.into(),
            Relationship {
                kind: RelationshipKind::HasManyThrough,
                target: target.into(),
                foreign_key: None,
                through: Some(Through {
                    entity: through.into(),
                    source_key: source_key.into(),
                    target_key: target_key.into(),
                }),
            },
        );
        self
    }

    /// The primary-key column descriptor.
    pub fn pk_column(&self) -> &Column {
        self.columns
            .iter()
            .find(|c| c.name == self.primary_key)
            .expect("primary key column missing; catalog validation should have caught this")
    }

    pub fn column(&self, name: &str) -> TallyResult<&Column> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .ok_or_else(|| AggregateError::UnknownColumn {
                entity: self.name.clone(),
                column: name.into(),
            })
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name == name)
    }

    /// Look up a relationship by name. Unknown names are an error, kept
    /// distinct from pass-through scope refinement (which never goes
    /// through this lookup).
    pub fn relationship(&self, name: &str) -> TallyResult<&Relationship> {
        self.relationships
            .get(name)
            .ok_or_else(|| AggregateError::UnknownRelationship {
                entity: self.name.clone(),
                relationship: name.into(),
            })
    }
}

/// The schema catalog: entity name -> entity.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Catalog {
    entities: HashMap<String, Entity>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_entity(mut self, entity: Entity) -> Self {
        self.entities.insert(entity.name.clone(), entity);
        self
    }

    pub fn entity(&self, name: &str) -> TallyResult<&Entity> {
        self.entities
            .get(name)
            .ok_or_else(|| AggregateError::UnknownEntity(name.into()))
    }

    /// Load a catalog from its JSON representation.
    ///
    /// Missing table names are filled from the entity name; the result is
    /// validated before being returned.
    pub fn from_json(json: &str) -> TallyResult<Catalog> {
        let mut catalog: Catalog = serde_json::from_str(json)
            .map_err(|e| AggregateError::InvalidCatalog(e.to_string()))?;
        for entity in catalog.entities.values_mut() {
            if entity.table.is_empty() {
                entity.table = entity.name.to_table_case();
            }
            if entity.columns.is_empty() {
                entity.columns = vec![Column::new(&entity.primary_key, ColumnType::Integer)];
            }
        }
        catalog.validate()?;
        Ok(catalog)
    }

    /// Structural validation: primary keys exist, relationship targets are
    /// known, through relationships carry their keys.
    pub fn validate(&self) -> TallyResult<()> {
        for entity in self.entities.values() {
            if !entity.has_column(&entity.primary_key) {
                return Err(AggregateError::InvalidCatalog(format!(
                    "entity '{}' has no primary key column '{}'",
                    entity.name, entity.primary_key
                )));
            }
            for (name, rel) in &entity.relationships {
                if !self.entities.contains_key(&rel.target) {
                    return Err(AggregateError::InvalidCatalog(format!(
                        "relationship '{}' on '{}' targets unknown entity '{}'",
                        name, entity.name, rel.target
                    )));
                }
                match rel.kind {
                    RelationshipKind::HasManyThrough => {
                        let through = rel.through.as_ref().ok_or_else(|| {
                            AggregateError::InvalidCatalog(format!(
                                "through relationship '{}' on '{}' is missing its join entity",
                                name, entity.name
                            ))
                        })?;
                        if !self.entities.contains_key(&through.entity) {
                            return Err(AggregateError::InvalidCatalog(format!(
                                "relationship '{}' on '{}' goes through unknown entity '{}'",
                                name, entity.name, through.entity
                            )));
                        }
                    }
                    _ => {
                        if rel.foreign_key.is_none() {
                            return Err(AggregateError::InvalidCatalog(format!(
                                "relationship '{}' on '{}' is missing a foreign key",
                                name, entity.name
                            )));
                        }
                    }
                }
            }
        }
        Ok(())
    }
}
