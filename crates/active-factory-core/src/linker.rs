//! Association linking between two declarations.
//!
//! The linker picks an association from registered metadata, works out which
//! side owns it, and writes foreign keys (or join records) for every pair of
//! entries the link expression covers. Resolution depends only on metadata,
//! so `post - user` and `user - post` store the same relationship.

use std::collections::{HashMap, HashSet};

use serde_json::Value;

use crate::association::{Association, AssociationKind};
use crate::declaration::LinkDecl;
use crate::definition::{AttributeMap, FactoryDefinition};
use crate::error::{FactoryError, FactoryResult};
use crate::instance::InstanceSet;
use crate::persistence::Persistence;
use crate::registry::FactoryRegistry;

/// Side of a link expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
	/// Left-hand side.
	Source,
	/// Right-hand side.
	Target,
}

/// Association chosen for a link and the side that declares it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedAssociation {
	/// Side whose model declares the association.
	pub owner: Side,
	/// The association metadata.
	pub association: Association,
}

/// Resolves and applies link expressions.
pub struct Linker<'a> {
	registry: &'a FactoryRegistry,
	store: &'a dyn Persistence,
}

impl<'a> Linker<'a> {
	/// Creates a linker over a registry and a store.
	pub fn new(registry: &'a FactoryRegistry, store: &'a dyn Persistence) -> Self {
		Self { registry, store }
	}

	/// Chooses the association between two factories.
	///
	/// An explicit name wins; otherwise the source's preference for the target
	/// factory, then the target's preference for the source factory. Without
	/// any name, the single association between the two models is used.
	pub fn resolve(
		&self,
		source: &FactoryDefinition,
		target: &FactoryDefinition,
		explicit: Option<&str>,
	) -> FactoryResult<ResolvedAssociation> {
		let fail = |reason: String| FactoryError::LinkResolution {
			source_factory: source.name().to_string(),
			target_factory: target.name().to_string(),
			reason,
		};
		let source_model = source.model_class();
		let target_model = target.model_class();
		let source_schema = self.registry.schema(source_model);
		let target_schema = self.registry.schema(target_model);

		let named = |side: Side, name: &str| -> Option<ResolvedAssociation> {
			let (schema, other_model) = match side {
				Side::Source => (source_schema.as_deref(), target_model),
				Side::Target => (target_schema.as_deref(), source_model),
			};
			schema
				.and_then(|schema| schema.association(name))
				.filter(|association| association.target_model == other_model)
				.map(|association| ResolvedAssociation {
					owner: side,
					association: association.clone(),
				})
		};

		let preferred = match explicit {
			Some(name) => Some((name, Side::Source)),
			None => source
				.preferred_association(target.name())
				.map(|name| (name, Side::Source))
				.or_else(|| {
					target
						.preferred_association(source.name())
						.map(|name| (name, Side::Target))
				}),
		};

		if let Some((name, first)) = preferred {
			let second = match first {
				Side::Source => Side::Target,
				Side::Target => Side::Source,
			};
			return named(first, name)
				.or_else(|| named(second, name))
				.ok_or_else(|| {
					fail(format!(
						"no association '{name}' between {source_model} and {target_model}"
					))
				});
		}

		for (side, schema, other_model) in [
			(Side::Source, source_schema.as_deref(), target_model),
			(Side::Target, target_schema.as_deref(), source_model),
		] {
			let Some(schema) = schema else {
				continue;
			};
			let candidates: Vec<&Association> = schema.associations_to(other_model).collect();
			match candidates.as_slice() {
				[] => continue,
				[association] => {
					return Ok(ResolvedAssociation {
						owner: side,
						association: (*association).clone(),
					});
				}
				several => {
					let names: Vec<&str> = several.iter().map(|a| a.name.as_str()).collect();
					return Err(fail(format!(
						"ambiguous associations from {} to {other_model}: {}",
						schema.model(),
						names.join(", ")
					)));
				}
			}
		}

		Err(fail(format!(
			"no association metadata between {source_model} and {target_model}"
		)))
	}

	/// Applies a link expression to the block's instance sets.
	///
	/// Returns the number of links written. An entry holding a foreign key
	/// receives it once per link: when a singleton holds the key and the other
	/// side is a collection, only the first pair is linked.
	pub fn link(
		&self,
		sets: &mut HashMap<String, InstanceSet>,
		decl: &LinkDecl,
	) -> FactoryResult<usize> {
		let source = self.registry.definition(decl.source.factory())?;
		let target = self.registry.definition(decl.target.factory())?;
		let resolved = self.resolve(&source, &target, decl.association.as_deref())?;
		let association = &resolved.association;

		let (owner_factory, other_factory) = match resolved.owner {
			Side::Source => (source.name(), target.name()),
			Side::Target => (target.name(), source.name()),
		};

		let pairs = decl.pairs();
		let mut keyed = HashSet::new();
		let mut written = 0;

		for (source_position, target_position) in &pairs {
			let (owner_position, other_position) = match resolved.owner {
				Side::Source => (*source_position, *target_position),
				Side::Target => (*target_position, *source_position),
			};

			match &association.kind {
				AssociationKind::BelongsTo => {
					if !keyed.insert(owner_position) {
						continue;
					}
					let id = self.record_id(sets, decl, other_factory, other_position)?;
					self.assign_key(sets, owner_factory, owner_position, &association.foreign_key, id)?;
				}
				AssociationKind::HasOne | AssociationKind::HasMany => {
					if !keyed.insert(other_position) {
						continue;
					}
					let id = self.record_id(sets, decl, owner_factory, owner_position)?;
					self.assign_key(sets, other_factory, other_position, &association.foreign_key, id)?;
				}
				AssociationKind::ManyToMany {
					through,
					source_key,
					target_key,
				} => {
					let owner_id = self.record_id(sets, decl, owner_factory, owner_position)?;
					let other_id = self.record_id(sets, decl, other_factory, other_position)?;
					let mut join = AttributeMap::new();
					join.insert(source_key.clone(), Value::from(owner_id));
					join.insert(target_key.clone(), Value::from(other_id));
					self.store.persist(through, &join)?;
				}
			}
			written += 1;
		}

		tracing::debug!(
			source = source.name(),
			target = target.name(),
			association = association.name.as_str(),
			pairs = pairs.len(),
			written,
			"linked"
		);
		Ok(written)
	}

	fn record_id(
		&self,
		sets: &HashMap<String, InstanceSet>,
		decl: &LinkDecl,
		factory: &str,
		position: usize,
	) -> FactoryResult<i64> {
		sets.get(factory)
			.and_then(|set| set.entry(position))
			.and_then(|entry| entry.record())
			.map(|record| record.id)
			.ok_or_else(|| FactoryError::LinkResolution {
				source_factory: decl.source.factory().to_string(),
				target_factory: decl.target.factory().to_string(),
				reason: format!("'{factory}' entry {position} is not persisted"),
			})
	}

	fn assign_key(
		&self,
		sets: &mut HashMap<String, InstanceSet>,
		factory: &str,
		position: usize,
		foreign_key: &str,
		id: i64,
	) -> FactoryResult<()> {
		let entry = sets
			.get_mut(factory)
			.and_then(|set| set.entry_mut(position))
			.ok_or_else(|| FactoryError::NoSuchAccessor(format!("{factory}[{position}]")))?;
		let mut changes = AttributeMap::new();
		changes.insert(foreign_key.to_string(), Value::from(id));
		entry.apply_changes(self.store, &changes)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::association::{ForeignKeyOwner, ModelSchema};
	use rstest::{fixture, rstest};

	#[fixture]
	fn registry() -> FactoryRegistry {
		let registry = FactoryRegistry::new();
		registry.register(FactoryDefinition::builder("post", "Post").build());
		registry.register(FactoryDefinition::builder("user", "User").build());
		registry.register(FactoryDefinition::builder("simple_user", "User").build());
		registry.register(
			FactoryDefinition::builder("follower", "User")
				.prefer_association("user", "following")
				.build(),
		);
		registry.register(FactoryDefinition::builder("tag", "Tag").build());
		registry.register_model(
			ModelSchema::new("User")
				.has_many("posts", "Post", "user_id")
				.many_to_many("following", "User", "Following", "follower_id", "followed_id")
				.many_to_many("followers", "User", "Following", "followed_id", "follower_id"),
		);
		registry.register_model(ModelSchema::new("Post").belongs_to("user", "User", "user_id"));
		registry
	}

	fn resolve(
		registry: &FactoryRegistry,
		source: &str,
		target: &str,
		explicit: Option<&str>,
	) -> FactoryResult<ResolvedAssociation> {
		let store = crate::persistence::MemoryStore::new();
		let linker = Linker::new(registry, &store);
		linker.resolve(
			&registry.definition(source).unwrap(),
			&registry.definition(target).unwrap(),
			explicit,
		)
	}

	#[rstest]
	fn test_belongs_to_from_source(registry: FactoryRegistry) {
		let resolved = resolve(&registry, "post", "simple_user", None).unwrap();
		assert_eq!(resolved.owner, Side::Source);
		assert_eq!(resolved.association.name, "user");
	}

	#[rstest]
	fn test_has_many_from_source(registry: FactoryRegistry) {
		let resolved = resolve(&registry, "simple_user", "post", None).unwrap();
		assert_eq!(resolved.owner, Side::Source);
		assert_eq!(resolved.association.name, "posts");
		assert_eq!(
			resolved.association.foreign_key_owner(),
			ForeignKeyOwner::Target
		);
	}

	#[rstest]
	fn test_source_preference(registry: FactoryRegistry) {
		let resolved = resolve(&registry, "follower", "user", None).unwrap();
		assert_eq!(resolved.owner, Side::Source);
		assert_eq!(resolved.association.name, "following");
	}

	#[rstest]
	fn test_target_preference_keeps_owner(registry: FactoryRegistry) {
		let resolved = resolve(&registry, "user", "follower", None).unwrap();
		assert_eq!(resolved.owner, Side::Target);
		assert_eq!(resolved.association.name, "following");
	}

	#[rstest]
	fn test_explicit_association_wins(registry: FactoryRegistry) {
		let resolved = resolve(&registry, "follower", "user", Some("followers")).unwrap();
		assert_eq!(resolved.association.name, "followers");
	}

	#[rstest]
	fn test_ambiguous_self_association(registry: FactoryRegistry) {
		let error = resolve(&registry, "simple_user", "user", None).unwrap_err();
		assert!(matches!(error, FactoryError::LinkResolution { ref reason, .. } if reason.contains("ambiguous")));
	}

	#[rstest]
	fn test_missing_metadata(registry: FactoryRegistry) {
		let error = resolve(&registry, "tag", "post", None).unwrap_err();
		assert!(matches!(error, FactoryError::LinkResolution { .. }));
	}

	#[rstest]
	fn test_unknown_explicit_association(registry: FactoryRegistry) {
		let error = resolve(&registry, "post", "user", Some("author")).unwrap_err();
		assert!(matches!(error, FactoryError::LinkResolution { ref reason, .. } if reason.contains("author")));
	}
}
