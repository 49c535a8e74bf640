//! Declaration arguments, declaration handles and link expressions.
//!
//! A statement inside a `models` block returns a [`FactoryRef`] naming the
//! entries it produced. Two refs combine into a [`LinkDecl`], optionally
//! through an explicit association name:
//!
//! ```ignore
//! m.link(post.to(&simple_user))?;                      // post - simple_user
//! m.link(follower.via("followers").to(&user))?;        // follower - :followers - user
//! ```

use crate::definition::AttributeMap;
use crate::naming::AccessorForm;

/// Arguments of a declaration statement.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum DeclArgs {
	/// `user`, `users`
	#[default]
	None,
	/// `users(2)`
	Count(usize),
	/// `user({..})`, `users({..}, {..})`
	Overrides(Vec<AttributeMap>),
}

impl From<()> for DeclArgs {
	fn from(_: ()) -> Self {
		Self::None
	}
}

impl From<usize> for DeclArgs {
	fn from(count: usize) -> Self {
		Self::Count(count)
	}
}

impl From<AttributeMap> for DeclArgs {
	fn from(overrides: AttributeMap) -> Self {
		Self::Overrides(vec![overrides])
	}
}

impl From<Vec<AttributeMap>> for DeclArgs {
	fn from(overrides: Vec<AttributeMap>) -> Self {
		Self::Overrides(overrides)
	}
}

/// Handle to the entries produced by one declaration statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FactoryRef {
	factory: String,
	form: AccessorForm,
	positions: Vec<usize>,
}

impl FactoryRef {
	pub(crate) fn new(factory: impl Into<String>, form: AccessorForm, positions: Vec<usize>) -> Self {
		Self {
			factory: factory.into(),
			form,
			positions,
		}
	}

	/// Factory name.
	pub fn factory(&self) -> &str {
		&self.factory
	}

	/// Accessor form used by the statement.
	pub fn form(&self) -> AccessorForm {
		self.form
	}

	/// Positions of the produced entries in the factory's instance set.
	pub fn positions(&self) -> &[usize] {
		&self.positions
	}

	/// Whether the statement used the collection name.
	pub fn is_collection(&self) -> bool {
		self.form.is_collection()
	}

	/// Number of referenced entries.
	pub fn len(&self) -> usize {
		self.positions.len()
	}

	/// Whether no entry is referenced.
	pub fn is_empty(&self) -> bool {
		self.positions.is_empty()
	}

	/// Links this declaration to `target` using the default association.
	pub fn to(&self, target: &FactoryRef) -> LinkDecl {
		LinkDecl::new(self.clone(), target.clone())
	}

	/// Starts a link through an explicit association name.
	pub fn via(&self, association: impl Into<String>) -> PendingLink {
		PendingLink {
			source: self.clone(),
			association: association.into(),
		}
	}
}

/// Left half of `source - :association - target`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingLink {
	source: FactoryRef,
	association: String,
}

impl PendingLink {
	/// Completes the link expression.
	pub fn to(self, target: &FactoryRef) -> LinkDecl {
		LinkDecl::new(self.source, target.clone()).association(self.association)
	}
}

/// A link expression between two declarations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkDecl {
	/// Left-hand declaration.
	pub source: FactoryRef,
	/// Right-hand declaration.
	pub target: FactoryRef,
	/// Explicit association name; wins over every default.
	pub association: Option<String>,
}

impl LinkDecl {
	/// Creates a link using the default association.
	pub fn new(source: FactoryRef, target: FactoryRef) -> Self {
		Self {
			source,
			target,
			association: None,
		}
	}

	/// Overrides the association name.
	pub fn association(mut self, name: impl Into<String>) -> Self {
		self.association = Some(name.into());
		self
	}

	/// Pairs of `(source position, target position)` to link.
	///
	/// A singleton side is broadcast over the other side; two collections are
	/// zipped and the longer side's tail stays unlinked.
	pub fn pairs(&self) -> Vec<(usize, usize)> {
		let source = &self.source;
		let target = &self.target;
		if source.is_collection() && target.is_collection() {
			return source
				.positions
				.iter()
				.copied()
				.zip(target.positions.iter().copied())
				.collect();
		}
		source
			.positions
			.iter()
			.flat_map(|s| target.positions.iter().map(move |t| (*s, *t)))
			.collect()
	}
}
