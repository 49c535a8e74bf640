//! Convenience re-exports for common usage.
//!
//! ```ignore
//! use active_factory_core::prelude::*;
//! ```

// Error types
pub use crate::error::{FactoryError, FactoryResult};
pub use crate::persistence::PersistenceError;

// Definitions and metadata
pub use crate::association::{Association, AssociationKind, ForeignKeyOwner, ModelSchema};
pub use crate::definition::{AttributeExpr, AttributeMap, FactoryDefinition, FactoryHooks};

// Registry
pub use crate::registry::{
	FactoryRegistry, clear_factories, factory_names, get_factory, has_factory, register_factory,
	register_model,
};

// Block execution
pub use crate::context::{Accessed, ModelsContext};
pub use crate::declaration::{DeclArgs, FactoryRef, LinkDecl};
pub use crate::engine::{Factories, factory_attributes, models};
pub use crate::instance::{Entry, InstanceSet, SetKind};
pub use crate::naming::{AccessorForm, AccessorNames};
pub use crate::scope::ModelsScope;
pub use crate::sequence::SequenceEvaluator;
pub use crate::settings::FactorySettings;

// Persistence
pub use crate::persistence::{MemoryStore, Persistence, Record};
