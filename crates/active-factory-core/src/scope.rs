//! The declaration scope of a `models` block.

use std::collections::HashMap;

use crate::declaration::{DeclArgs, FactoryRef, LinkDecl};
use crate::definition::AttributeMap;
use crate::engine::Factories;
use crate::error::{FactoryError, FactoryResult};
use crate::instance::{EntryFactory, InstanceSet};
use crate::linker::Linker;
use crate::persistence::Persistence;

/// Statements available inside a `models` block.
///
/// Each statement name is an accessor name: `user`, `user_`, `users`,
/// `users_`. Record forms persist immediately, hash forms only build.
pub struct ModelsScope<'a> {
	engine: &'a Factories,
	store: &'a dyn Persistence,
	sets: HashMap<String, InstanceSet>,
}

impl<'a> ModelsScope<'a> {
	pub(crate) fn new(engine: &'a Factories, store: &'a dyn Persistence) -> Self {
		Self {
			engine,
			store,
			sets: HashMap::new(),
		}
	}

	/// Runs one declaration statement.
	///
	/// | statement             | args                     |
	/// |-----------------------|--------------------------|
	/// | `user`, `user_`       | none or one override map |
	/// | `users`, `users_`     | none, a count, or maps   |
	pub fn declare(&mut self, name: &str, args: impl Into<DeclArgs>) -> FactoryResult<FactoryRef> {
		let args = args.into();
		let (factory, form) = self.engine.resolve_accessor(name)?;
		let definition = self.engine.registry().definition(&factory)?;
		let entries = EntryFactory {
			definition: &definition,
			sequences: self.engine.sequences(),
			store: self.store,
		};
		let persist = !form.is_hash();
		let set = self
			.sets
			.entry(factory.clone())
			.or_insert_with(|| InstanceSet::new(factory.clone()));

		let positions: Vec<usize> = match (form.is_collection(), args) {
			(false, DeclArgs::None) => vec![set.declare_singleton(&entries, None, persist)?],
			(false, DeclArgs::Overrides(maps)) => match maps.as_slice() {
				[overrides] => vec![set.declare_singleton(&entries, Some(overrides), persist)?],
				_ => {
					return Err(FactoryError::InvalidDeclaration {
						name: name.to_string(),
						reason: format!("a singleton takes one override map, got {}", maps.len()),
					});
				}
			},
			(false, DeclArgs::Count(count)) => {
				return Err(FactoryError::InvalidDeclaration {
					name: name.to_string(),
					reason: format!("a singleton cannot be declared with a count ({count})"),
				});
			}
			(true, DeclArgs::None) => set.reference_collection().collect(),
			(true, DeclArgs::Count(count)) => set.declare_collection(&entries, count, persist)?.collect(),
			(true, DeclArgs::Overrides(maps)) => {
				set.declare_collection_with(&entries, &maps, persist)?.collect()
			}
		};

		tracing::debug!(
			statement = name,
			factory = factory.as_str(),
			form = %form,
			positions = ?positions,
			"declared"
		);
		Ok(FactoryRef::new(factory, form, positions))
	}

	/// `user` / `user_`
	pub fn one(&mut self, name: &str) -> FactoryResult<FactoryRef> {
		self.declare(name, DeclArgs::None)
	}

	/// `users(n)` / `users_(n)`
	pub fn many(&mut self, name: &str, count: usize) -> FactoryResult<FactoryRef> {
		self.declare(name, DeclArgs::Count(count))
	}

	/// `user({..})` / `users({..}, {..})`
	pub fn with(&mut self, name: &str, overrides: Vec<AttributeMap>) -> FactoryResult<FactoryRef> {
		self.declare(name, DeclArgs::Overrides(overrides))
	}

	/// Applies a link expression.
	pub fn link(&mut self, decl: LinkDecl) -> FactoryResult<usize> {
		let registry = self.engine.registry();
		Linker::new(registry, self.store).link(&mut self.sets, &decl)
	}

	/// Declares both sides with default arguments and links them.
	///
	/// `m.link_names("post", "simple_user")` is `post - simple_user`.
	pub fn link_names(&mut self, source: &str, target: &str) -> FactoryResult<usize> {
		let source = self.one(source)?;
		let target = self.one(target)?;
		self.link(source.to(&target))
	}

	/// Instance set of a factory declared so far.
	pub fn instance_set(&self, factory: &str) -> Option<&InstanceSet> {
		self.sets.get(factory)
	}

	pub(crate) fn into_sets(self) -> HashMap<String, InstanceSet> {
		self.sets
	}
}

