//! Block execution.
//!
//! [`Factories`] ties a registry, a sequence evaluator and settings together
//! and runs `models` blocks against a store.

use std::sync::Arc;

use crate::context::ModelsContext;
use crate::definition::AttributeMap;
use crate::error::{FactoryError, FactoryResult};
use crate::naming::{AccessorForm, AccessorNames};
use crate::persistence::Persistence;
use crate::registry::FactoryRegistry;
use crate::scope::ModelsScope;
use crate::sequence::SequenceEvaluator;
use crate::settings::FactorySettings;

/// Entry point for declaring models.
///
/// # Examples
///
/// ```
/// use active_factory_core::prelude::*;
///
/// let registry = FactoryRegistry::new();
/// registry.register(
///     FactoryDefinition::builder("user", "User")
///         .sequence("email", "user{n}@tut.by")
///         .build(),
/// );
/// let store = MemoryStore::new();
/// let factories = Factories::new(registry)
///     .with_sequences(std::sync::Arc::new(SequenceEvaluator::new()));
///
/// let ctx = factories
///     .models(&store, |m| {
///         m.many("users", 2)?;
///         Ok(())
///     })
///     .unwrap();
///
/// let users = ctx.get_all("users").unwrap();
/// assert_eq!(users[1].str("email"), Some("user1@tut.by"));
/// ```
#[derive(Debug, Clone)]
pub struct Factories {
	registry: FactoryRegistry,
	sequences: Arc<SequenceEvaluator>,
	settings: FactorySettings,
}

impl Factories {
	/// Creates an engine over `registry` using the global sequence counters.
	pub fn new(registry: FactoryRegistry) -> Self {
		Self {
			registry,
			sequences: SequenceEvaluator::global(),
			settings: FactorySettings::default(),
		}
	}

	/// Engine over the global registry and global sequence counters.
	pub fn global() -> Self {
		Self::new(FactoryRegistry::global())
	}

	/// Uses a dedicated sequence evaluator.
	pub fn with_sequences(mut self, sequences: Arc<SequenceEvaluator>) -> Self {
		self.sequences = sequences;
		self
	}

	/// Replaces the settings.
	pub fn with_settings(mut self, settings: FactorySettings) -> Self {
		self.settings = settings;
		self
	}

	/// Registry used for definitions and schemas.
	pub fn registry(&self) -> &FactoryRegistry {
		&self.registry
	}

	/// Sequence evaluator used for new entries.
	pub fn sequences(&self) -> &SequenceEvaluator {
		&self.sequences
	}

	/// Active settings.
	pub fn settings(&self) -> &FactorySettings {
		&self.settings
	}

	/// Runs a declaration block and returns its accessors.
	///
	/// The first failing statement aborts the block. Records persisted before
	/// the failure stay in the store.
	pub fn models<F>(&self, store: &dyn Persistence, block: F) -> FactoryResult<ModelsContext>
	where
		F: FnOnce(&mut ModelsScope<'_>) -> FactoryResult<()>,
	{
		if self.settings.reset_sequences_per_block {
			self.sequences.reset_all();
		}
		let span = tracing::info_span!("models");
		let _guard = span.enter();

		let mut scope = ModelsScope::new(self, store);
		if let Err(error) = block(&mut scope) {
			tracing::debug!(%error, "models block aborted");
			return Err(error);
		}
		let context = ModelsContext::new(scope.into_sets(), &self.settings);
		tracing::debug!(accessors = context.accessors().count(), "models block finished");
		Ok(context)
	}

	/// Maps a statement or accessor name to its factory and form.
	///
	/// A registered factory name is always the singleton form.
	pub fn resolve_accessor(&self, name: &str) -> FactoryResult<(String, AccessorForm)> {
		if self.registry.has(name) {
			return Ok((name.to_string(), AccessorForm::Singleton));
		}
		self.registry
			.names()
			.into_iter()
			.find_map(|factory| {
				AccessorNames::for_factory(&factory, &self.settings)
					.form_of(name)
					.map(|form| (factory, form))
			})
			.ok_or_else(|| FactoryError::UnknownAccessor(name.to_string()))
	}

	/// Accessor names of a registered factory.
	pub fn accessor_names(&self, factory: &str) -> FactoryResult<AccessorNames> {
		self.registry.definition(factory)?;
		Ok(AccessorNames::for_factory(factory, &self.settings))
	}

	/// Attributes `factory` produces for sequence index `index`.
	///
	/// Does not touch the sequence counters or run hooks.
	pub fn factory_attributes(&self, factory: &str, index: u64) -> FactoryResult<AttributeMap> {
		self.registry.definition(factory)?.attributes_for(index)
	}
}

impl Default for Factories {
	fn default() -> Self {
		Self::global()
	}
}

/// Runs a declaration block with the global engine.
pub fn models<F>(store: &dyn Persistence, block: F) -> FactoryResult<ModelsContext>
where
	F: FnOnce(&mut ModelsScope<'_>) -> FactoryResult<()>,
{
	Factories::global().models(store, block)
}

/// Attributes of a globally registered factory at `index`.
pub fn factory_attributes(factory: &str, index: u64) -> FactoryResult<AttributeMap> {
	Factories::global().factory_attributes(factory, index)
}
