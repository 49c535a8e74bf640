//! Factory registry for definition lookup.
//!
//! Holds [`FactoryDefinition`]s by factory name and [`ModelSchema`]s by model
//! class. A process-wide registry is available through the free functions and
//! [`FactoryRegistry::global`]; independent registries can be created with
//! [`FactoryRegistry::new`].

use std::collections::HashMap;
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use serde_json::Value;

use crate::association::{AssociationKind, ModelSchema};
use crate::definition::FactoryDefinition;
use crate::error::{FactoryError, FactoryResult};
use crate::persistence::{Persistence, Record};

#[derive(Debug, Default)]
struct RegistryInner {
	factories: HashMap<String, Arc<FactoryDefinition>>,
	schemas: HashMap<String, Arc<ModelSchema>>,
}

/// Global factory registry.
static GLOBAL_REGISTRY: Lazy<FactoryRegistry> = Lazy::new(FactoryRegistry::new);

/// Registers a factory in the global registry.
///
/// # Example
///
/// ```ignore
/// register_factory(
///     FactoryDefinition::builder("user", "User")
///         .sequence("email", "user{n}@tut.by")
///         .build(),
/// );
/// ```
pub fn register_factory(definition: FactoryDefinition) {
	GLOBAL_REGISTRY.register(definition);
}

/// Registers model association metadata in the global registry.
pub fn register_model(schema: ModelSchema) {
	GLOBAL_REGISTRY.register_model(schema);
}

/// Gets a factory from the global registry.
pub fn get_factory(name: &str) -> Option<Arc<FactoryDefinition>> {
	GLOBAL_REGISTRY.get(name)
}

/// Checks if a factory is registered globally.
pub fn has_factory(name: &str) -> bool {
	GLOBAL_REGISTRY.has(name)
}

/// Returns all globally registered factory names.
pub fn factory_names() -> Vec<String> {
	GLOBAL_REGISTRY.names()
}

/// Clears the global registry.
///
/// This is primarily useful for testing.
pub fn clear_factories() {
	GLOBAL_REGISTRY.clear();
}

/// Shared handle to a set of factory definitions and model schemas.
///
/// Cloning the handle shares the underlying storage.
#[derive(Debug, Clone, Default)]
pub struct FactoryRegistry {
	inner: Arc<RwLock<RegistryInner>>,
}

impl FactoryRegistry {
	/// Creates an empty, independent registry.
	pub fn new() -> Self {
		Self::default()
	}

	/// Returns a handle to the process-wide registry.
	pub fn global() -> Self {
		GLOBAL_REGISTRY.clone()
	}

	/// Registers or replaces a factory definition.
	pub fn register(&self, definition: FactoryDefinition) {
		tracing::debug!(
			factory = definition.name(),
			model = definition.model_class(),
			"registering factory"
		);
		self.inner
			.write()
			.factories
			.insert(definition.name().to_string(), Arc::new(definition));
	}

	/// Registers or replaces the association metadata of a model.
	pub fn register_model(&self, schema: ModelSchema) {
		self.inner
			.write()
			.schemas
			.insert(schema.model().to_string(), Arc::new(schema));
	}

	/// Returns the definition for `name`, or [`FactoryError::UnknownFactory`].
	pub fn definition(&self, name: &str) -> FactoryResult<Arc<FactoryDefinition>> {
		self.get(name)
			.ok_or_else(|| FactoryError::UnknownFactory(name.to_string()))
	}

	/// Gets a factory by name.
	pub fn get(&self, name: &str) -> Option<Arc<FactoryDefinition>> {
		self.inner.read().factories.get(name).cloned()
	}

	/// Gets the association metadata of a model class.
	pub fn schema(&self, model: &str) -> Option<Arc<ModelSchema>> {
		self.inner.read().schemas.get(model).cloned()
	}

	/// Checks if a factory is registered.
	pub fn has(&self, name: &str) -> bool {
		self.inner.read().factories.contains_key(name)
	}

	/// Returns all registered factory names, sorted.
	pub fn names(&self) -> Vec<String> {
		let mut names: Vec<String> = self.inner.read().factories.keys().cloned().collect();
		names.sort();
		names
	}

	/// Returns the number of registered factories.
	pub fn len(&self) -> usize {
		self.inner.read().factories.len()
	}

	/// Returns true if no factories are registered.
	pub fn is_empty(&self) -> bool {
		self.inner.read().factories.is_empty()
	}

	/// Clears all factories and schemas (primarily for testing).
	pub fn clear(&self) {
		let mut inner = self.inner.write();
		inner.factories.clear();
		inner.schemas.clear();
	}

	/// Reads the records reachable from `record` through `association`.
	///
	/// # Examples
	///
	/// ```ignore
	/// let followed = registry.related(&store, &follower, "following")?;
	/// assert_eq!(followed, vec![user]);
	/// ```
	pub fn related(
		&self,
		store: &dyn Persistence,
		record: &Record,
		association: &str,
	) -> FactoryResult<Vec<Record>> {
		let schema = self.schema(&record.model);
		let association = schema
			.as_deref()
			.and_then(|schema| schema.association(association))
			.ok_or_else(|| FactoryError::LinkResolution {
				source_factory: record.model.clone(),
				target_factory: association.to_string(),
				reason: format!("model '{}' has no such association", record.model),
			})?;

		let own_id = Value::from(record.id);
		let related = match &association.kind {
			AssociationKind::BelongsTo => record
				.field(&association.foreign_key)
				.filter(|key| !key.is_null())
				.and_then(|key| store.find_by(&association.target_model, "id", &key))
				.into_iter()
				.collect(),
			AssociationKind::HasOne => store
				.find_by(&association.target_model, &association.foreign_key, &own_id)
				.into_iter()
				.collect(),
			AssociationKind::HasMany => {
				store.filter(&association.target_model, &association.foreign_key, &own_id)
			}
			AssociationKind::ManyToMany {
				through,
				source_key,
				target_key,
			} => store
				.filter(through, source_key, &own_id)
				.iter()
				.filter_map(|join| join.field(target_key))
				.filter_map(|key| store.find_by(&association.target_model, "id", &key))
				.collect(),
		};
		Ok(related)
	}
}
