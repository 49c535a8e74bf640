//! Model association metadata.
//!
//! Associations are declared per model and tagged with their kind, so the
//! linker never has to guess which side of a relationship holds the foreign
//! key.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Relationship shape of an association.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssociationKind {
	/// The declaring model holds the foreign key.
	BelongsTo,
	/// The target model holds the foreign key; at most one target.
	HasOne,
	/// The target model holds the foreign key; any number of targets.
	HasMany,
	/// A join model holds both keys.
	ManyToMany {
		/// Join model class.
		through: String,
		/// Join column pointing at the declaring model.
		source_key: String,
		/// Join column pointing at the target model.
		target_key: String,
	},
}

/// Which record receives the key when an association is linked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForeignKeyOwner {
	/// The model declaring the association.
	Source,
	/// The associated model.
	Target,
	/// A separate join record.
	Through,
}

/// A named association from one model to another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Association {
	/// Accessor name on the declaring model, e.g. `posts`.
	pub name: String,
	/// Relationship shape.
	pub kind: AssociationKind,
	/// Model class on the other end.
	pub target_model: String,
	/// Column holding the key. Unused for [`AssociationKind::ManyToMany`].
	pub foreign_key: String,
}

impl Association {
	/// Where the foreign key lives for this association.
	pub fn foreign_key_owner(&self) -> ForeignKeyOwner {
		match self.kind {
			AssociationKind::BelongsTo => ForeignKeyOwner::Source,
			AssociationKind::HasOne | AssociationKind::HasMany => ForeignKeyOwner::Target,
			AssociationKind::ManyToMany { .. } => ForeignKeyOwner::Through,
		}
	}

	/// Whether reading the association yields several records.
	pub fn is_collection(&self) -> bool {
		matches!(
			self.kind,
			AssociationKind::HasMany | AssociationKind::ManyToMany { .. }
		)
	}
}

/// Association metadata of one model class.
///
/// # Examples
///
/// ```
/// use active_factory_core::association::{ForeignKeyOwner, ModelSchema};
///
/// let post = ModelSchema::new("Post").belongs_to("user", "User", "user_id");
/// let association = post.association("user").unwrap();
/// assert_eq!(association.foreign_key_owner(), ForeignKeyOwner::Source);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ModelSchema {
	model: String,
	associations: BTreeMap<String, Association>,
}

impl ModelSchema {
	/// Creates a schema without associations.
	pub fn new(model: impl Into<String>) -> Self {
		Self {
			model: model.into(),
			associations: BTreeMap::new(),
		}
	}

	/// Model class name.
	pub fn model(&self) -> &str {
		&self.model
	}

	/// Adds an association.
	pub fn with_association(mut self, association: Association) -> Self {
		self.associations
			.insert(association.name.clone(), association);
		self
	}

	/// Declares `name` as a belongs-to association keyed by `foreign_key` on this model.
	pub fn belongs_to(
		self,
		name: impl Into<String>,
		target_model: impl Into<String>,
		foreign_key: impl Into<String>,
	) -> Self {
		self.with_association(Association {
			name: name.into(),
			kind: AssociationKind::BelongsTo,
			target_model: target_model.into(),
			foreign_key: foreign_key.into(),
		})
	}

	/// Declares `name` as a has-one association keyed by `foreign_key` on the target.
	pub fn has_one(
		self,
		name: impl Into<String>,
		target_model: impl Into<String>,
		foreign_key: impl Into<String>,
	) -> Self {
		self.with_association(Association {
			name: name.into(),
			kind: AssociationKind::HasOne,
			target_model: target_model.into(),
			foreign_key: foreign_key.into(),
		})
	}

	/// Declares `name` as a has-many association keyed by `foreign_key` on the target.
	pub fn has_many(
		self,
		name: impl Into<String>,
		target_model: impl Into<String>,
		foreign_key: impl Into<String>,
	) -> Self {
		self.with_association(Association {
			name: name.into(),
			kind: AssociationKind::HasMany,
			target_model: target_model.into(),
			foreign_key: foreign_key.into(),
		})
	}

	/// Declares `name` as a many-to-many association through a join model.
	pub fn many_to_many(
		self,
		name: impl Into<String>,
		target_model: impl Into<String>,
		through: impl Into<String>,
		source_key: impl Into<String>,
		target_key: impl Into<String>,
	) -> Self {
		self.with_association(Association {
			name: name.into(),
			kind: AssociationKind::ManyToMany {
				through: through.into(),
				source_key: source_key.into(),
				target_key: target_key.into(),
			},
			target_model: target_model.into(),
			foreign_key: String::new(),
		})
	}

	/// Looks up an association by name.
	pub fn association(&self, name: &str) -> Option<&Association> {
		self.associations.get(name)
	}

	/// Associations pointing at `target_model`, in name order.
	pub fn associations_to<'a>(
		&'a self,
		target_model: &'a str,
	) -> impl Iterator<Item = &'a Association> + 'a {
		self.associations
			.values()
			.filter(move |association| association.target_model == target_model)
	}
}
