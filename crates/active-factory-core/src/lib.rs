//! Factory resolution and association linking for active-factory.
//!
//! This crate provides a declarative way to build related test records:
//!
//! - **Definitions**: named factories with constant, sequence and computed attributes
//! - **Model blocks**: declare singletons, collections and hash-only instances by accessor name
//! - **Linking**: wire associations between declarations from model metadata
//!
//! # Quick Start
//!
//! ```
//! use active_factory_core::prelude::*;
//!
//! let registry = FactoryRegistry::new();
//! registry.register(
//!     FactoryDefinition::builder("user", "User")
//!         .sequence("email", "user{n}@tut.by")
//!         .build(),
//! );
//! registry.register(
//!     FactoryDefinition::builder("post", "Post")
//!         .sequence("text", "TTT{n}")
//!         .build(),
//! );
//! registry.register_model(ModelSchema::new("User").has_many("posts", "Post", "user_id"));
//! registry.register_model(ModelSchema::new("Post").belongs_to("user", "User", "user_id"));
//!
//! let store = MemoryStore::new();
//! let factories = Factories::new(registry)
//!     .with_sequences(std::sync::Arc::new(SequenceEvaluator::new()));
//!
//! let ctx = factories
//!     .models(&store, |m| {
//!         let user = m.one("user")?;
//!         let posts = m.many("posts", 2)?;
//!         m.link(user.to(&posts))?;
//!         Ok(())
//!     })
//!     .unwrap();
//!
//! let user = ctx.get("user").unwrap();
//! for post in ctx.get_all("posts").unwrap() {
//!     assert_eq!(post.int("user_id"), Some(user.id));
//! }
//! ```
//!
//! # Accessor names
//!
//! Every factory name `user` yields four names, used both as statements inside
//! a block and as lookups on the returned [`ModelsContext`]:
//!
//! | name     | form              |
//! |----------|-------------------|
//! | `user`   | persisted record  |
//! | `user_`  | attribute hash    |
//! | `users`  | persisted records |
//! | `users_` | attribute hashes  |
//!
//! # Architecture
//!
//! - [`FactoryRegistry`](registry::FactoryRegistry) - Definitions and model schemas
//! - [`SequenceEvaluator`](sequence::SequenceEvaluator) - Per-factory sequence counters
//! - [`InstanceSet`](instance::InstanceSet) - Entries of one factory inside a block
//! - [`Linker`](linker::Linker) - Association resolution and foreign-key assignment
//! - [`Factories`](engine::Factories) - Block execution
//! - [`Persistence`](persistence::Persistence) - Store seam, with [`MemoryStore`](persistence::MemoryStore)

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod association;
pub mod context;
pub mod declaration;
pub mod definition;
pub mod engine;
pub mod error;
pub mod instance;
pub mod linker;
pub mod naming;
pub mod persistence;
pub mod prelude;
pub mod registry;
pub mod scope;
pub mod sequence;
pub mod settings;

// Re-export commonly used types at crate root
pub use context::{Accessed, ModelsContext};
pub use declaration::{DeclArgs, FactoryRef, LinkDecl};
pub use definition::{AttributeExpr, AttributeMap, FactoryDefinition};
pub use engine::{Factories, factory_attributes, models};
pub use error::{FactoryError, FactoryResult};
pub use persistence::{MemoryStore, Persistence, PersistenceError, Record};
pub use registry::FactoryRegistry;
pub use scope::ModelsScope;
