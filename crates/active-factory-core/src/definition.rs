//! Static factory definitions.
//!
//! A [`FactoryDefinition`] describes how to build attribute sets for one model:
//! the model class, one [`AttributeExpr`] per field, preferred association
//! names towards other factories, and optional lifecycle hooks.
//!
//! # Example
//!
//! ```
//! use active_factory_core::definition::FactoryDefinition;
//! use serde_json::json;
//!
//! let user = FactoryDefinition::builder("user", "User")
//!     .sequence("email", "user{n}@tut.by")
//!     .sequence("password", "password0{n}")
//!     .build();
//!
//! let attrs = user.attributes_for(1).unwrap();
//! assert_eq!(attrs["email"], json!("user1@tut.by"));
//! ```

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::error::{FactoryError, FactoryResult};
use crate::persistence::Record;

/// Attribute hash of a single instance.
pub type AttributeMap = Map<String, Value>;

/// Placeholder replaced by the sequence index in [`AttributeExpr::Sequence`].
pub const SEQUENCE_PLACEHOLDER: &str = "{n}";

type ComputedFn = dyn Fn(u64) -> Result<Value, String> + Send + Sync;
type AfterBuildFn = dyn Fn(&mut AttributeMap) + Send + Sync;
type AfterCreateFn = dyn Fn(&mut Record) + Send + Sync;

/// Expression producing one attribute value from a sequence index.
#[derive(Clone)]
pub enum AttributeExpr {
	/// The same value for every instance.
	Constant(Value),
	/// A string template where `{n}` is replaced by the index.
	Sequence(String),
	/// Arbitrary pure function of the index.
	Computed(Arc<ComputedFn>),
}

impl AttributeExpr {
	/// Wraps a closure as a computed expression.
	pub fn computed<F>(f: F) -> Self
	where
		F: Fn(u64) -> Result<Value, String> + Send + Sync + 'static,
	{
		Self::Computed(Arc::new(f))
	}

	/// Evaluates the expression for `index`.
	pub fn evaluate(&self, index: u64) -> Result<Value, String> {
		match self {
			Self::Constant(value) => Ok(value.clone()),
			Self::Sequence(template) => Ok(Value::String(
				template.replace(SEQUENCE_PLACEHOLDER, &index.to_string()),
			)),
			Self::Computed(f) => f(index),
		}
	}
}

impl fmt::Debug for AttributeExpr {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Constant(value) => f.debug_tuple("Constant").field(value).finish(),
			Self::Sequence(template) => f.debug_tuple("Sequence").field(template).finish(),
			Self::Computed(_) => f.write_str("Computed(..)"),
		}
	}
}

/// Lifecycle callbacks of a factory.
#[derive(Clone, Default)]
pub struct FactoryHooks {
	/// Runs on the attribute hash once expressions and overrides are applied.
	pub after_build: Option<Arc<AfterBuildFn>>,
	/// Runs once on the record right after the store created it.
	pub after_create: Option<Arc<AfterCreateFn>>,
}

impl fmt::Debug for FactoryHooks {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("FactoryHooks")
			.field("after_build", &self.after_build.is_some())
			.field("after_create", &self.after_create.is_some())
			.finish()
	}
}

/// Registered template for one factory name.
#[derive(Debug, Clone)]
pub struct FactoryDefinition {
	name: String,
	model_class: String,
	attribute_expressions: BTreeMap<String, AttributeExpr>,
	association_defaults: HashMap<String, String>,
	hooks: FactoryHooks,
}

impl FactoryDefinition {
	/// Starts a definition for `name` building instances of `model_class`.
	pub fn builder(name: impl Into<String>, model_class: impl Into<String>) -> FactoryDefinitionBuilder {
		FactoryDefinitionBuilder {
			definition: Self {
				name: name.into(),
				model_class: model_class.into(),
				attribute_expressions: BTreeMap::new(),
				association_defaults: HashMap::new(),
				hooks: FactoryHooks::default(),
			},
		}
	}

	/// Factory name.
	pub fn name(&self) -> &str {
		&self.name
	}

	/// Model class passed to the persistence layer.
	pub fn model_class(&self) -> &str {
		&self.model_class
	}

	/// Expressions keyed by field.
	pub fn attribute_expressions(&self) -> &BTreeMap<String, AttributeExpr> {
		&self.attribute_expressions
	}

	/// Preferred association name when linking to `other_factory`.
	pub fn preferred_association(&self, other_factory: &str) -> Option<&str> {
		self.association_defaults
			.get(other_factory)
			.map(String::as_str)
	}

	/// Lifecycle hooks.
	pub fn hooks(&self) -> &FactoryHooks {
		&self.hooks
	}

	/// Evaluates every expression at `index` without touching any counter.
	pub fn attributes_for(&self, index: u64) -> FactoryResult<AttributeMap> {
		let mut attributes = AttributeMap::new();
		for (field, expr) in &self.attribute_expressions {
			let value = expr
				.evaluate(index)
				.map_err(|message| FactoryError::AttributeExpression {
					factory: self.name.clone(),
					index,
					field: field.clone(),
					message,
				})?;
			attributes.insert(field.clone(), value);
		}
		Ok(attributes)
	}
}

/// Fluent builder for [`FactoryDefinition`].
#[derive(Debug)]
pub struct FactoryDefinitionBuilder {
	definition: FactoryDefinition,
}

impl FactoryDefinitionBuilder {
	/// Adds an expression for `field`.
	pub fn attribute(mut self, field: impl Into<String>, expr: AttributeExpr) -> Self {
		self.definition
			.attribute_expressions
			.insert(field.into(), expr);
		self
	}

	/// Adds a constant attribute.
	pub fn constant(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
		self.attribute(field, AttributeExpr::Constant(value.into()))
	}

	/// Adds a `{n}` template attribute.
	pub fn sequence(self, field: impl Into<String>, template: impl Into<String>) -> Self {
		self.attribute(field, AttributeExpr::Sequence(template.into()))
	}

	/// Adds a computed attribute.
	pub fn computed<F>(self, field: impl Into<String>, f: F) -> Self
	where
		F: Fn(u64) -> Result<Value, String> + Send + Sync + 'static,
	{
		self.attribute(field, AttributeExpr::computed(f))
	}

	/// Uses `association` by default when linked with `other_factory`.
	pub fn prefer_association(
		mut self,
		other_factory: impl Into<String>,
		association: impl Into<String>,
	) -> Self {
		self.definition
			.association_defaults
			.insert(other_factory.into(), association.into());
		self
	}

	/// Sets the after-build hook.
	pub fn after_build<F>(mut self, f: F) -> Self
	where
		F: Fn(&mut AttributeMap) + Send + Sync + 'static,
	{
		self.definition.hooks.after_build = Some(Arc::new(f));
		self
	}

	/// Sets the after-create hook.
	pub fn after_create<F>(mut self, f: F) -> Self
	where
		F: Fn(&mut Record) + Send + Sync + 'static,
	{
		self.definition.hooks.after_create = Some(Arc::new(f));
		self
	}

	/// Finishes the definition.
	pub fn build(self) -> FactoryDefinition {
		self.definition
	}
}
