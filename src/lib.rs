//! # Active Factory
//!
//! Declarative factories for building related test records.
//!
//! Factories are registered once with their attribute expressions, and a
//! `models` block then declares which instances a test needs and how they
//! relate. Each declared factory name becomes an accessor on the returned
//! context.
//!
//! ## Quick Example
//!
//! ```ignore
//! use active_factory::prelude::*;
//!
//! register_factory(
//!     FactoryDefinition::builder("user", "User")
//!         .sequence("email", "user{n}@tut.by")
//!         .build(),
//! );
//! register_factory(FactoryDefinition::builder("post", "Post").sequence("text", "TTT{n}").build());
//! register_model(ModelSchema::new("Post").belongs_to("user", "User", "user_id"));
//!
//! let store = MemoryStore::new();
//! let ctx = models(&store, |m| {
//!     let post = m.one("post")?;
//!     let user = m.one("user")?;
//!     m.link(post.to(&user))?;
//!     Ok(())
//! })?;
//!
//! assert_eq!(ctx.get("post")?.int("user_id"), Some(ctx.get("user")?.id));
//! ```
//!
//! See [`active_factory_core`] for the engine itself.

#![warn(missing_docs)]

pub use active_factory_core::{
	Accessed, AttributeExpr, AttributeMap, DeclArgs, Factories, FactoryDefinition, FactoryError,
	FactoryRef, FactoryRegistry, FactoryResult, LinkDecl, MemoryStore, ModelsContext, ModelsScope,
	Persistence, PersistenceError, Record, factory_attributes, models,
};

// Module re-exports
pub use active_factory_core::{
	association, context, declaration, definition, engine, error, instance, linker, naming,
	persistence, registry, scope, sequence, settings,
};

/// Convenience re-exports for common usage.
pub mod prelude {
	pub use active_factory_core::prelude::*;
}
