//! Engine settings.
//!
//! Settings are plain serde data and can be loaded from TOML:
//!
//! ```toml
//! hash_suffix = "_"
//! reset_sequences_per_block = true
//!
//! [irregular_plurals]
//! person = "people"
//! ```

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{FactoryError, FactoryResult};

/// Configuration of accessor naming and block behaviour.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FactorySettings {
	/// Suffix marking the hash form of an accessor (`user_`, `users_`).
	pub hash_suffix: String,
	/// Reset all sequence counters when a `models` block starts.
	pub reset_sequences_per_block: bool,
	/// Plural forms that the default English rules get wrong.
	pub irregular_plurals: HashMap<String, String>,
}

impl Default for FactorySettings {
	fn default() -> Self {
		Self {
			hash_suffix: "_".to_string(),
			reset_sequences_per_block: true,
			irregular_plurals: HashMap::new(),
		}
	}
}

impl FactorySettings {
	/// Creates default settings.
	pub fn new() -> Self {
		Self::default()
	}

	/// Parses settings from a TOML document; missing keys keep their defaults.
	pub fn from_toml_str(source: &str) -> FactoryResult<Self> {
		let settings: Self =
			toml::from_str(source).map_err(|e| FactoryError::Settings(e.to_string()))?;
		settings.validate()?;
		Ok(settings)
	}

	/// Reads settings from a TOML file.
	pub fn from_path(path: impl AsRef<Path>) -> FactoryResult<Self> {
		let source = std::fs::read_to_string(path.as_ref())?;
		Self::from_toml_str(&source)
	}

	/// Sets the hash-form suffix.
	pub fn with_hash_suffix(mut self, suffix: impl Into<String>) -> Self {
		self.hash_suffix = suffix.into();
		self
	}

	/// Enables or disables the block-start sequence reset.
	pub fn with_sequence_reset(mut self, reset: bool) -> Self {
		self.reset_sequences_per_block = reset;
		self
	}

	/// Registers an irregular plural.
	pub fn with_plural(mut self, singular: impl Into<String>, plural: impl Into<String>) -> Self {
		self.irregular_plurals.insert(singular.into(), plural.into());
		self
	}

	fn validate(&self) -> FactoryResult<()> {
		if self.hash_suffix.is_empty() {
			return Err(FactoryError::Settings(
				"hash_suffix must not be empty".to_string(),
			));
		}
		Ok(())
	}
}
