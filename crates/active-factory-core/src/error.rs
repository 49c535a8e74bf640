//! Error types for the factory engine.
//!
//! Persistence failures are carried through unchanged so callers can match on
//! the store's own error type.

use thiserror::Error;

use crate::instance::SetKind;
use crate::persistence::PersistenceError;

/// Errors that can occur while resolving, persisting, or linking factories.
#[derive(Debug, Error)]
pub enum FactoryError {
	/// No factory definition is registered under this name.
	#[error("Unknown factory: {0}")]
	UnknownFactory(String),

	/// A statement name could not be mapped to any registered factory.
	#[error("Unknown factory accessor: {0}")]
	UnknownAccessor(String),

	/// The statement arguments do not fit the accessor form.
	#[error("Invalid declaration '{name}': {reason}")]
	InvalidDeclaration {
		/// Statement name.
		name: String,
		/// What is wrong with the arguments.
		reason: String,
	},

	/// A singleton was declared for a name that already holds several instances.
	#[error("Uniqueness violation: factory '{factory}' already has {count} instances")]
	UniquenessViolation {
		/// Factory name.
		factory: String,
		/// Number of instances already declared.
		count: usize,
	},

	/// The accessor form does not match how the name was declared.
	#[error("No method '{name}': factory was declared as {declared}")]
	AmbiguousAccess {
		/// Accessor name that was requested.
		name: String,
		/// How the factory was actually declared.
		declared: SetKind,
	},

	/// The accessor was not bound by the current block.
	#[error("No method '{0}' in models context")]
	NoSuchAccessor(String),

	/// A record accessor was used on an entry that only exists as a hash.
	#[error("'{0}' was declared in hash form and has no persisted record")]
	NotPersisted(String),

	/// No association could be resolved between two factories.
	#[error("Cannot link '{source_factory}' to '{target_factory}': {reason}")]
	LinkResolution {
		/// Left-hand factory of the link expression.
		source_factory: String,
		/// Right-hand factory of the link expression.
		target_factory: String,
		/// Why resolution failed.
		reason: String,
	},

	/// An attribute expression failed to evaluate.
	#[error("Attribute expression failed for factory {factory} at index {index} ({field}): {message}")]
	AttributeExpression {
		/// Factory name.
		factory: String,
		/// Sequence index being evaluated.
		index: u64,
		/// Field whose expression failed.
		field: String,
		/// Message returned by the expression.
		message: String,
	},

	/// The persistence layer rejected an operation.
	#[error(transparent)]
	Persistence(#[from] PersistenceError),

	/// Settings could not be loaded.
	#[error("Settings error: {0}")]
	Settings(String),

	/// I/O operation failed.
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),
}

impl FactoryError {
	/// Returns true for errors that mean "this accessor does not exist here".
	///
	/// Lets callers tell missing-method style failures apart from store or
	/// definition errors.
	pub fn is_missing_accessor(&self) -> bool {
		matches!(
			self,
			Self::NoSuchAccessor(_) | Self::AmbiguousAccess { .. }
		)
	}
}

/// Result type alias for factory operations.
pub type FactoryResult<T> = Result<T, FactoryError>;

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	#[rstest]
	fn test_unknown_factory_error() {
		let error = FactoryError::UnknownFactory("ghost".to_string());
		assert_eq!(error.to_string(), "Unknown factory: ghost");
	}

	#[rstest]
	fn test_uniqueness_violation_message() {
		let error = FactoryError::UniquenessViolation {
			factory: "user".to_string(),
			count: 2,
		};
		assert_eq!(
			error.to_string(),
			"Uniqueness violation: factory 'user' already has 2 instances"
		);
	}

	#[rstest]
	fn test_missing_accessor_classification() {
		let ambiguous = FactoryError::AmbiguousAccess {
			name: "user".to_string(),
			declared: SetKind::Collection,
		};
		assert!(ambiguous.is_missing_accessor());
		assert!(FactoryError::NoSuchAccessor("post".to_string()).is_missing_accessor());
		assert!(!FactoryError::UnknownFactory("post".to_string()).is_missing_accessor());
	}

	#[rstest]
	fn test_persistence_error_is_transparent() {
		let inner = PersistenceError::Validation {
			model: "User".to_string(),
			field: "email".to_string(),
			message: "has already been taken".to_string(),
		};
		let expected = inner.to_string();
		let error: FactoryError = inner.into();
		assert!(matches!(error, FactoryError::Persistence(_)));
		assert_eq!(error.to_string(), expected);
	}

	#[rstest]
	fn test_io_error_from() {
		let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
		let error: FactoryError = io_error.into();
		assert!(matches!(error, FactoryError::Io(_)));
	}
}
