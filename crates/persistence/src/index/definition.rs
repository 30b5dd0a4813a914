use std::fmt;
use std::sync::Arc;

use crate::key::TypeTag;

/// Projection from an entity to its derived lookup key.
pub type Projection<E> = Arc<dyn Fn(&E) -> String + Send + Sync>;

/// Declares a secondary index: a name, the entity type it covers, and the
/// projection that computes each entity's derived key.
///
/// # Examples
///
/// ```
/// use helios_kv_persistence::index::IndexDefinition;
///
/// struct Encounter {
///     status: String,
/// }
///
/// let by_status = IndexDefinition::new("encounter-status", "Encounter", |e: &Encounter| {
///     e.status.clone()
/// });
/// assert_eq!(by_status.keyspace(), "index/encounter-status");
/// ```
pub struct IndexDefinition<E> {
    name: String,
    type_tag: TypeTag,
    projection: Projection<E>,
}

impl<E> IndexDefinition<E> {
    /// Creates an index definition.
    pub fn new<F>(name: impl Into<String>, type_tag: impl Into<TypeTag>, projection: F) -> Self
    where
        F: Fn(&E) -> String + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            type_tag: type_tag.into(),
            projection: Arc::new(projection),
        }
    }

    /// Returns the index name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the covered entity type.
    pub fn type_tag(&self) -> &TypeTag {
        &self.type_tag
    }

    /// Computes the derived key of `entity`.
    pub fn project(&self, entity: &E) -> String {
        (self.projection)(entity)
    }

    /// Returns the keyspace holding this index's entries.
    pub fn keyspace(&self) -> String {
        format!("index/{}", self.name)
    }
}

impl<E> Clone for IndexDefinition<E> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            type_tag: self.type_tag.clone(),
            projection: Arc::clone(&self.projection),
        }
    }
}

impl<E> fmt::Debug for IndexDefinition<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IndexDefinition")
            .field("name", &self.name)
            .field("type_tag", &self.type_tag)
            .finish_non_exhaustive()
    }
}
