//! Persistence interface consumed by the factory engine.
//!
//! The engine only ever calls [`Persistence::persist`] and
//! [`Persistence::update`]. Lookups exist for callers and for reading
//! associations back through [`FactoryRegistry::related`](crate::registry::FactoryRegistry::related).
//!
//! [`MemoryStore`] is an in-process implementation with auto-increment ids and
//! simple unique/required constraints, enough to drive factory tests without a
//! database.

use std::collections::{HashMap, HashSet};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::definition::AttributeMap;

/// Errors raised by a persistence backend.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PersistenceError {
	/// The store rejected the attributes.
	#[error("Validation failed for {model}: {field} {message}")]
	Validation {
		/// Model being written.
		model: String,
		/// Offending field.
		field: String,
		/// Constraint message.
		message: String,
	},

	/// The record to update does not exist.
	#[error("Record not found: {model}#{id}")]
	RecordNotFound {
		/// Model name.
		model: String,
		/// Primary key.
		id: i64,
	},

	/// Backend specific failure.
	#[error("Backend error: {0}")]
	Backend(String),
}

/// A persisted model instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
	/// Model class the record belongs to.
	pub model: String,
	/// Primary key assigned by the store.
	pub id: i64,
	/// Stored column values, excluding the primary key.
	pub attributes: AttributeMap,
}

impl Record {
	/// Returns a field value, treating `id` as the primary key.
	pub fn field(&self, name: &str) -> Option<Value> {
		if name == "id" {
			return Some(Value::from(self.id));
		}
		self.attributes.get(name).cloned()
	}

	/// Returns a string field.
	pub fn str(&self, name: &str) -> Option<&str> {
		self.attributes.get(name).and_then(Value::as_str)
	}

	/// Returns an integer field, treating `id` as the primary key.
	pub fn int(&self, name: &str) -> Option<i64> {
		if name == "id" {
			return Some(self.id);
		}
		self.attributes.get(name).and_then(Value::as_i64)
	}
}

/// Storage backend used to create and update records.
pub trait Persistence: Send + Sync {
	/// Inserts a new record and returns it with its assigned id.
	fn persist(&self, model: &str, attributes: &AttributeMap) -> Result<Record, PersistenceError>;

	/// Replaces the stored attributes of an existing record.
	fn update(&self, record: &Record, attributes: &AttributeMap)
	-> Result<Record, PersistenceError>;

	/// Returns every record of `model` whose `field` equals `value`.
	fn filter(&self, model: &str, field: &str, value: &Value) -> Vec<Record>;

	/// Returns the first record of `model` whose `field` equals `value`.
	fn find_by(&self, model: &str, field: &str, value: &Value) -> Option<Record> {
		self.filter(model, field, value).into_iter().next()
	}
}

#[derive(Debug, Default)]
struct Table {
	next_id: i64,
	rows: Vec<Record>,
}

/// In-memory [`Persistence`] implementation.
///
/// # Examples
///
/// ```
/// use active_factory_core::persistence::{MemoryStore, Persistence};
/// use serde_json::{json, Map};
///
/// let store = MemoryStore::new().unique("User", "email");
/// let mut attrs = Map::new();
/// attrs.insert("email".to_string(), json!("a@b.c"));
///
/// let record = store.persist("User", &attrs).unwrap();
/// assert_eq!(record.id, 1);
/// assert!(store.persist("User", &attrs).is_err());
/// ```
#[derive(Debug, Default)]
pub struct MemoryStore {
	tables: RwLock<HashMap<String, Table>>,
	unique: HashSet<(String, String)>,
	required: HashSet<(String, String)>,
}

impl MemoryStore {
	/// Creates an empty store without constraints.
	pub fn new() -> Self {
		Self::default()
	}

	/// Adds a uniqueness constraint on `model.field`.
	pub fn unique(mut self, model: impl Into<String>, field: impl Into<String>) -> Self {
		self.unique.insert((model.into(), field.into()));
		self
	}

	/// Adds a presence constraint on `model.field`.
	pub fn required(mut self, model: impl Into<String>, field: impl Into<String>) -> Self {
		self.required.insert((model.into(), field.into()));
		self
	}

	/// Returns all records of a model in insertion order.
	pub fn all(&self, model: &str) -> Vec<Record> {
		self.tables
			.read()
			.get(model)
			.map(|table| table.rows.clone())
			.unwrap_or_default()
	}

	/// Returns a record by primary key.
	pub fn find(&self, model: &str, id: i64) -> Option<Record> {
		self.tables
			.read()
			.get(model)
			.and_then(|table| table.rows.iter().find(|row| row.id == id).cloned())
	}

	/// Returns the number of records stored for a model.
	pub fn count(&self, model: &str) -> usize {
		self.tables
			.read()
			.get(model)
			.map_or(0, |table| table.rows.len())
	}

	/// Removes every record. Id counters restart at 1.
	pub fn clear(&self) {
		self.tables.write().clear();
	}

	fn validate(
		&self,
		table: Option<&Table>,
		model: &str,
		attributes: &AttributeMap,
		skip_id: Option<i64>,
	) -> Result<(), PersistenceError> {
		for (constraint_model, field) in &self.required {
			if constraint_model != model {
				continue;
			}
			if attributes.get(field).is_none_or(Value::is_null) {
				return Err(PersistenceError::Validation {
					model: model.to_string(),
					field: field.clone(),
					message: "can't be blank".to_string(),
				});
			}
		}

		let Some(table) = table else {
			return Ok(());
		};
		for (constraint_model, field) in &self.unique {
			if constraint_model != model {
				continue;
			}
			let Some(value) = attributes.get(field) else {
				continue;
			};
			let taken = table
				.rows
				.iter()
				.filter(|row| Some(row.id) != skip_id)
				.any(|row| row.attributes.get(field) == Some(value));
			if taken {
				return Err(PersistenceError::Validation {
					model: model.to_string(),
					field: field.clone(),
					message: "has already been taken".to_string(),
				});
			}
		}
		Ok(())
	}
}

impl Persistence for MemoryStore {
	fn persist(&self, model: &str, attributes: &AttributeMap) -> Result<Record, PersistenceError> {
		let mut tables = self.tables.write();
		self.validate(tables.get(model), model, attributes, None)?;

		let table = tables.entry(model.to_string()).or_default();
		table.next_id += 1;
		let record = Record {
			model: model.to_string(),
			id: table.next_id,
			attributes: attributes.clone(),
		};
		table.rows.push(record.clone());
		Ok(record)
	}

	fn update(
		&self,
		record: &Record,
		attributes: &AttributeMap,
	) -> Result<Record, PersistenceError> {
		let mut tables = self.tables.write();
		self.validate(
			tables.get(&record.model),
			&record.model,
			attributes,
			Some(record.id),
		)?;

		let row = tables
			.get_mut(&record.model)
			.and_then(|table| table.rows.iter_mut().find(|row| row.id == record.id))
			.ok_or_else(|| PersistenceError::RecordNotFound {
				model: record.model.clone(),
				id: record.id,
			})?;
		row.attributes = attributes.clone();
		Ok(row.clone())
	}

	fn filter(&self, model: &str, field: &str, value: &Value) -> Vec<Record> {
		self.tables
			.read()
			.get(model)
			.map(|table| {
				table
					.rows
					.iter()
					.filter(|row| row.field(field).as_ref() == Some(value))
					.cloned()
					.collect()
			})
			.unwrap_or_default()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::{fixture, rstest};
	use serde_json::json;

	fn attrs(pairs: &[(&str, Value)]) -> AttributeMap {
		pairs
			.iter()
			.map(|(key, value)| (key.to_string(), value.clone()))
			.collect()
	}

	#[fixture]
	fn store() -> MemoryStore {
		MemoryStore::new()
			.unique("User", "email")
			.required("Post", "text")
	}

	#[rstest]
	fn test_persist_assigns_incrementing_ids(store: MemoryStore) {
		let first = store
			.persist("User", &attrs(&[("email", json!("a@tut.by"))]))
			.unwrap();
		let second = store
			.persist("User", &attrs(&[("email", json!("b@tut.by"))]))
			.unwrap();

		assert_eq!(first.id, 1);
		assert_eq!(second.id, 2);
		assert_eq!(store.count("User"), 2);
	}

	#[rstest]
	fn test_unique_constraint_rejects_duplicate(store: MemoryStore) {
		store
			.persist("User", &attrs(&[("email", json!("a@tut.by"))]))
			.unwrap();

		let result = store.persist("User", &attrs(&[("email", json!("a@tut.by"))]));

		assert!(matches!(
			result,
			Err(PersistenceError::Validation { ref field, .. }) if field == "email"
		));
	}

	#[rstest]
	fn test_required_constraint_rejects_missing_field(store: MemoryStore) {
		let result = store.persist("Post", &attrs(&[("text", Value::Null)]));
		assert!(result.is_err());
		assert_eq!(store.count("Post"), 0);
	}

	#[rstest]
	fn test_update_replaces_attributes(store: MemoryStore) {
		let record = store
			.persist("User", &attrs(&[("email", json!("a@tut.by"))]))
			.unwrap();

		let updated = store
			.update(&record, &attrs(&[("email", json!("z@tut.by"))]))
			.unwrap();

		assert_eq!(updated.id, record.id);
		assert_eq!(updated.str("email"), Some("z@tut.by"));
		assert_eq!(
			store.find("User", record.id).unwrap().str("email"),
			Some("z@tut.by")
		);
	}

	#[rstest]
	fn test_update_may_keep_own_unique_value(store: MemoryStore) {
		let record = store
			.persist("User", &attrs(&[("email", json!("a@tut.by"))]))
			.unwrap();

		let result = store.update(
			&record,
			&attrs(&[("email", json!("a@tut.by")), ("name", json!("A"))]),
		);

		assert!(result.is_ok());
	}

	#[rstest]
	fn test_update_missing_record(store: MemoryStore) {
		let ghost = Record {
			model: "User".to_string(),
			id: 42,
			attributes: AttributeMap::new(),
		};
		let result = store.update(&ghost, &AttributeMap::new());
		assert_eq!(
			result,
			Err(PersistenceError::RecordNotFound {
				model: "User".to_string(),
				id: 42
			})
		);
	}

	#[rstest]
	fn test_find_by_and_filter(store: MemoryStore) {
		store
			.persist("Post", &attrs(&[("text", json!("T0")), ("user_id", json!(1))]))
			.unwrap();
		store
			.persist("Post", &attrs(&[("text", json!("T1")), ("user_id", json!(1))]))
			.unwrap();

		assert_eq!(store.filter("Post", "user_id", &json!(1)).len(), 2);
		assert_eq!(
			store.find_by("Post", "text", &json!("T1")).unwrap().id,
			2
		);
		assert_eq!(store.find_by("Post", "id", &json!(1)).unwrap().str("text"), Some("T0"));
		assert!(store.find_by("Post", "text", &json!("T2")).is_none());
	}

	#[rstest]
	fn test_clear_resets_tables(store: MemoryStore) {
		store
			.persist("User", &attrs(&[("email", json!("a@tut.by"))]))
			.unwrap();
		store.clear();

		assert_eq!(store.count("User"), 0);
		let record = store
			.persist("User", &attrs(&[("email", json!("a@tut.by"))]))
			.unwrap();
		assert_eq!(record.id, 1);
	}
}
