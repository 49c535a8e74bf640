//! Instance sets: the materialized state of one factory name inside a block.
//!
//! A set tracks its entries in creation order, which entry (if any) is the
//! singleton, and how many positions collection declarations have claimed.
//! The claim counters are what let `user; users(1)` share one entry while
//! `users(1); users(1)` produces two. Record and hash forms claim separately,
//! so `users_(1); users(1)` persists the entry the hash form built.

use std::fmt;
use std::ops::Range;

use crate::definition::{AttributeMap, FactoryDefinition};
use crate::error::{FactoryError, FactoryResult};
use crate::persistence::{Persistence, Record};
use crate::sequence::SequenceEvaluator;

/// How a factory name was declared in a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetKind {
	/// Only ever referenced through the singleton name.
	Singleton,
	/// Referenced through the collection name at least once.
	Collection,
}

impl fmt::Display for SetKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Singleton => f.write_str("singleton"),
			Self::Collection => f.write_str("collection"),
		}
	}
}

/// One instance produced by a factory.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
	index: u64,
	attributes: AttributeMap,
	overrides: AttributeMap,
	record: Option<Record>,
}

impl Entry {
	/// Sequence index the attributes were evaluated with.
	pub fn index(&self) -> u64 {
		self.index
	}

	/// Hash form of the instance.
	pub fn attributes(&self) -> &AttributeMap {
		&self.attributes
	}

	/// Overrides applied on top of the evaluated expressions.
	pub fn overrides(&self) -> &AttributeMap {
		&self.overrides
	}

	/// Persisted record, if the entry has been saved.
	pub fn record(&self) -> Option<&Record> {
		self.record.as_ref()
	}

	/// Whether the entry has been saved.
	pub fn is_persisted(&self) -> bool {
		self.record.is_some()
	}

	/// Writes `changes` into the hash and, when persisted, into the store.
	///
	/// Only the changed fields are sent on top of the stored attributes, so
	/// values written by hooks survive.
	pub(crate) fn apply_changes(
		&mut self,
		store: &dyn Persistence,
		changes: &AttributeMap,
	) -> FactoryResult<()> {
		for (field, value) in changes {
			self.attributes.insert(field.clone(), value.clone());
		}
		if let Some(record) = &self.record {
			let mut stored = record.attributes.clone();
			for (field, value) in changes {
				stored.insert(field.clone(), value.clone());
			}
			self.record = Some(store.update(record, &stored)?);
		}
		Ok(())
	}

	fn merge_overrides(
		&mut self,
		store: &dyn Persistence,
		overrides: &AttributeMap,
	) -> FactoryResult<()> {
		for (field, value) in overrides {
			self.overrides.insert(field.clone(), value.clone());
		}
		self.apply_changes(store, overrides)
	}
}

/// Builds and persists entries for one factory.
pub(crate) struct EntryFactory<'a> {
	pub(crate) definition: &'a FactoryDefinition,
	pub(crate) sequences: &'a SequenceEvaluator,
	pub(crate) store: &'a dyn Persistence,
}

impl EntryFactory<'_> {
	/// Evaluates a fresh entry: expressions, then overrides, then after-build.
	fn build(&self, overrides: Option<&AttributeMap>) -> FactoryResult<Entry> {
		let name = self.definition.name();
		let (index, mut attributes) = self
			.sequences
			.next_attributes(self.definition, 1)?
			.into_iter()
			.next()
			.ok_or_else(|| FactoryError::AttributeExpression {
				factory: name.to_string(),
				index: self.sequences.current(name),
				field: String::new(),
				message: "no attributes were produced".to_string(),
			})?;
		let overrides = overrides.cloned().unwrap_or_default();
		for (field, value) in &overrides {
			attributes.insert(field.clone(), value.clone());
		}
		if let Some(after_build) = &self.definition.hooks().after_build {
			after_build(&mut attributes);
		}
		Ok(Entry {
			index,
			attributes,
			overrides,
			record: None,
		})
	}

	/// Saves the entry unless it already is, running after-create once.
	fn persist(&self, entry: &mut Entry) -> FactoryResult<()> {
		if entry.record.is_some() {
			return Ok(());
		}
		let model = self.definition.model_class();
		let mut record = self.store.persist(model, &entry.attributes)?;
		tracing::debug!(
			factory = self.definition.name(),
			model,
			id = record.id,
			index = entry.index,
			"persisted entry"
		);

		if let Some(after_create) = &self.definition.hooks().after_create {
			let before = record.attributes.clone();
			after_create(&mut record);
			if record.attributes != before {
				record = self.store.update(&record, &record.attributes)?;
			}
		}
		entry.record = Some(record);
		Ok(())
	}
}

/// Entries declared for one factory name inside a block.
#[derive(Debug, Clone, PartialEq)]
pub struct InstanceSet {
	factory: String,
	entries: Vec<Entry>,
	singleton: Option<usize>,
	record_claimed: usize,
	hash_claimed: usize,
	collection_declared: bool,
}

impl InstanceSet {
	/// Creates an undeclared set.
	pub fn new(factory: impl Into<String>) -> Self {
		Self {
			factory: factory.into(),
			entries: Vec::new(),
			singleton: None,
			record_claimed: 0,
			hash_claimed: 0,
			collection_declared: false,
		}
	}

	/// Factory name.
	pub fn factory(&self) -> &str {
		&self.factory
	}

	/// Declared kind.
	pub fn kind(&self) -> SetKind {
		if self.collection_declared {
			SetKind::Collection
		} else {
			SetKind::Singleton
		}
	}

	/// Whether the singleton name was declared.
	pub fn has_singleton(&self) -> bool {
		self.singleton.is_some()
	}

	/// Whether the collection name was declared.
	pub fn has_collection(&self) -> bool {
		self.collection_declared
	}

	/// All entries in creation order.
	pub fn entries(&self) -> &[Entry] {
		&self.entries
	}

	/// Entry at `position`.
	pub fn entry(&self, position: usize) -> Option<&Entry> {
		self.entries.get(position)
	}

	pub(crate) fn entry_mut(&mut self, position: usize) -> Option<&mut Entry> {
		self.entries.get_mut(position)
	}

	/// Position of the singleton entry.
	pub fn singleton_position(&self) -> Option<usize> {
		self.singleton
	}

	/// The singleton entry.
	pub fn singleton_entry(&self) -> Option<&Entry> {
		self.singleton.and_then(|position| self.entries.get(position))
	}

	/// Number of entries.
	pub fn len(&self) -> usize {
		self.entries.len()
	}

	/// Whether no entry exists.
	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	/// Declares the singleton and returns its position.
	///
	/// Reuses the existing singleton, or the only entry of a one-element
	/// collection. Fails when the collection already holds several entries.
	pub(crate) fn declare_singleton(
		&mut self,
		factory: &EntryFactory<'_>,
		overrides: Option<&AttributeMap>,
		persist: bool,
	) -> FactoryResult<usize> {
		let position = match self.singleton {
			Some(position) => {
				self.merge_existing(factory.store, position, overrides)?;
				position
			}
			None => match self.entries.len() {
				0 => {
					self.entries.push(factory.build(overrides)?);
					0
				}
				1 => {
					self.merge_existing(factory.store, 0, overrides)?;
					0
				}
				count => {
					return Err(FactoryError::UniquenessViolation {
						factory: self.factory.clone(),
						count,
					});
				}
			},
		};
		self.singleton = Some(position);
		if persist {
			factory.persist(&mut self.entries[position])?;
		}
		Ok(position)
	}

	/// Claims `count` more collection positions and returns them.
	pub(crate) fn declare_collection(
		&mut self,
		factory: &EntryFactory<'_>,
		count: usize,
		persist: bool,
	) -> FactoryResult<Range<usize>> {
		let overrides = vec![None; count];
		self.claim(factory, &overrides, persist)
	}

	/// Claims one collection position per override map.
	pub(crate) fn declare_collection_with(
		&mut self,
		factory: &EntryFactory<'_>,
		overrides: &[AttributeMap],
		persist: bool,
	) -> FactoryResult<Range<usize>> {
		let overrides: Vec<Option<&AttributeMap>> = overrides.iter().map(Some).collect();
		self.claim(factory, &overrides, persist)
	}

	/// Marks the collection as declared without creating anything.
	pub(crate) fn reference_collection(&mut self) -> Range<usize> {
		self.collection_declared = true;
		0..self.entries.len()
	}

	/// Applies `overrides` to the entry at `position` and returns its hash.
	pub fn merge_overrides(
		&mut self,
		store: &dyn Persistence,
		position: usize,
		overrides: &AttributeMap,
	) -> FactoryResult<AttributeMap> {
		let entry = self
			.entries
			.get_mut(position)
			.ok_or_else(|| FactoryError::NoSuchAccessor(format!("{}[{position}]", self.factory)))?;
		entry.merge_overrides(store, overrides)?;
		Ok(entry.attributes.clone())
	}

	fn merge_existing(
		&mut self,
		store: &dyn Persistence,
		position: usize,
		overrides: Option<&AttributeMap>,
	) -> FactoryResult<()> {
		if let Some(overrides) = overrides {
			self.merge_overrides(store, position, overrides)?;
		}
		Ok(())
	}

	fn claim(
		&mut self,
		factory: &EntryFactory<'_>,
		overrides: &[Option<&AttributeMap>],
		persist: bool,
	) -> FactoryResult<Range<usize>> {
		let start = if persist {
			self.record_claimed
		} else {
			self.hash_claimed
		};
		let end = start + overrides.len();
		self.collection_declared = true;

		for (position, entry_overrides) in (start..end).zip(overrides) {
			if position < self.entries.len() {
				self.merge_existing(factory.store, position, *entry_overrides)?;
			} else {
				self.entries.push(factory.build(*entry_overrides)?);
			}
			if persist {
				self.record_claimed = position + 1;
				factory.persist(&mut self.entries[position])?;
			} else {
				self.hash_claimed = position + 1;
			}
		}
		Ok(start..end)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::persistence::MemoryStore;
	use rstest::{fixture, rstest};
	use serde_json::json;
	use std::sync::Arc;
	use std::sync::atomic::{AtomicUsize, Ordering};

	struct Harness {
		definition: FactoryDefinition,
		sequences: SequenceEvaluator,
		store: MemoryStore,
	}

	impl Harness {
		fn factory(&self) -> EntryFactory<'_> {
			EntryFactory {
				definition: &self.definition,
				sequences: &self.sequences,
				store: &self.store,
			}
		}
	}

	#[fixture]
	fn harness() -> Harness {
		Harness {
			definition: FactoryDefinition::builder("user", "User")
				.sequence("email", "user{n}@tut.by")
				.build(),
			sequences: SequenceEvaluator::new(),
			store: MemoryStore::new().unique("User", "email"),
		}
	}

	fn overrides(pairs: &[(&str, serde_json::Value)]) -> AttributeMap {
		pairs
			.iter()
			.map(|(key, value)| (key.to_string(), value.clone()))
			.collect()
	}

	#[rstest]
	fn test_singleton_is_idempotent(harness: Harness) {
		let mut set = InstanceSet::new("user");

		let first = set.declare_singleton(&harness.factory(), None, true).unwrap();
		let second = set.declare_singleton(&harness.factory(), None, true).unwrap();

		assert_eq!(first, second);
		assert_eq!(set.len(), 1);
		assert_eq!(harness.store.count("User"), 1);
		assert_eq!(set.kind(), SetKind::Singleton);
	}

	#[rstest]
	fn test_singleton_then_collection_of_one_shares_entry(harness: Harness) {
		let mut set = InstanceSet::new("user");

		set.declare_singleton(&harness.factory(), None, true).unwrap();
		let range = set.declare_collection(&harness.factory(), 1, true).unwrap();

		assert_eq!(range, 0..1);
		assert_eq!(set.len(), 1);
		assert_eq!(harness.store.count("User"), 1);
		assert_eq!(set.kind(), SetKind::Collection);
	}

	#[rstest]
	fn test_collection_of_one_then_singleton_shares_entry(harness: Harness) {
		let mut set = InstanceSet::new("user");

		set.declare_collection(&harness.factory(), 1, true).unwrap();
		let position = set.declare_singleton(&harness.factory(), None, true).unwrap();

		assert_eq!(position, 0);
		assert_eq!(harness.store.count("User"), 1);
		assert!(set.has_singleton());
		assert!(set.has_collection());
	}

	#[rstest]
	fn test_collection_of_two_then_singleton_fails(harness: Harness) {
		let mut set = InstanceSet::new("user");
		set.declare_collection(&harness.factory(), 2, true).unwrap();

		let error = set
			.declare_singleton(&harness.factory(), None, true)
			.unwrap_err();

		assert!(matches!(
			error,
			FactoryError::UniquenessViolation { count: 2, .. }
		));
	}

	#[rstest]
	fn test_collections_append(harness: Harness) {
		let mut set = InstanceSet::new("user");

		let first = set.declare_collection(&harness.factory(), 1, true).unwrap();
		let second = set.declare_collection(&harness.factory(), 1, true).unwrap();

		assert_eq!(first, 0..1);
		assert_eq!(second, 1..2);
		let emails: Vec<_> = set
			.entries()
			.iter()
			.map(|entry| entry.record().unwrap().str("email").unwrap().to_string())
			.collect();
		assert_eq!(emails, vec!["user0@tut.by", "user1@tut.by"]);
	}

	#[rstest]
	fn test_singleton_then_collection_of_two_adds_one(harness: Harness) {
		let mut set = InstanceSet::new("user");

		set.declare_singleton(&harness.factory(), None, true).unwrap();
		let range = set.declare_collection(&harness.factory(), 2, true).unwrap();

		assert_eq!(range, 0..2);
		assert_eq!(set.len(), 2);
		assert_eq!(set.singleton_position(), Some(0));
	}

	#[rstest]
	fn test_hash_form_does_not_persist(harness: Harness) {
		let mut set = InstanceSet::new("user");

		set.declare_collection(&harness.factory(), 2, false).unwrap();

		assert_eq!(harness.store.count("User"), 0);
		assert!(set.entries().iter().all(|entry| !entry.is_persisted()));
		assert_eq!(set.entries()[1].attributes()["email"], json!("user1@tut.by"));
	}

	#[rstest]
	fn test_record_form_persists_earlier_hash_entry(harness: Harness) {
		let mut set = InstanceSet::new("user");

		set.declare_singleton(&harness.factory(), None, false).unwrap();
		assert_eq!(harness.store.count("User"), 0);
		set.declare_singleton(&harness.factory(), None, true).unwrap();

		assert_eq!(harness.store.count("User"), 1);
		assert_eq!(set.entries()[0].index(), 0);
	}

	#[rstest]
	fn test_overrides_applied_before_persist(harness: Harness) {
		let mut set = InstanceSet::new("user");
		let changes = overrides(&[("email", json!("modified@email.com"))]);

		set.declare_singleton(&harness.factory(), Some(&changes), true)
			.unwrap();

		let entry = set.singleton_entry().unwrap();
		assert_eq!(entry.record().unwrap().str("email"), Some("modified@email.com"));
		assert_eq!(entry.overrides(), &changes);
	}

	#[rstest]
	fn test_merge_overrides_updates_persisted_record(harness: Harness) {
		let mut set = InstanceSet::new("user");
		let position = set.declare_singleton(&harness.factory(), None, true).unwrap();

		let merged = set
			.merge_overrides(
				&harness.store,
				position,
				&overrides(&[("name", json!("Alice"))]),
			)
			.unwrap();

		assert_eq!(merged["name"], json!("Alice"));
		assert_eq!(merged["email"], json!("user0@tut.by"));
		let id = set.singleton_entry().unwrap().record().unwrap().id;
		assert_eq!(harness.store.find("User", id).unwrap().str("name"), Some("Alice"));
	}

	#[rstest]
	fn test_collection_with_overrides(harness: Harness) {
		let mut set = InstanceSet::new("user");
		let maps = vec![
			overrides(&[("email", json!("1st@email.com"))]),
			overrides(&[("email", json!("2nd@email.com"))]),
		];

		let range = set
			.declare_collection_with(&harness.factory(), &maps, true)
			.unwrap();

		assert_eq!(range, 0..2);
		assert_eq!(set.entries()[0].record().unwrap().str("email"), Some("1st@email.com"));
		assert_eq!(set.entries()[1].record().unwrap().str("email"), Some("2nd@email.com"));
	}

	#[rstest]
	fn test_persistence_failure_propagates(harness: Harness) {
		let mut set = InstanceSet::new("user");
		let duplicate = overrides(&[("email", json!("same@tut.by"))]);

		let result = set.declare_collection_with(
			&harness.factory(),
			&[duplicate.clone(), duplicate],
			true,
		);

		assert!(matches!(result, Err(FactoryError::Persistence(_))));
		assert_eq!(harness.store.count("User"), 1);
	}

	#[rstest]
	fn test_after_hooks(harness: Harness) {
		let definition = FactoryDefinition::builder("post", "Post")
			.sequence("text", "TTT{n}")
			.after_build(|attrs| {
				attrs.insert("text".to_string(), json!("YYY"));
			})
			.after_create(|record| {
				record.attributes.insert("text".to_string(), json!("ZZZ"));
			})
			.build();
		let factory = EntryFactory {
			definition: &definition,
			sequences: &harness.sequences,
			store: &harness.store,
		};
		let mut set = InstanceSet::new("post");

		set.declare_singleton(&factory, None, true).unwrap();

		let entry = set.singleton_entry().unwrap();
		assert_eq!(entry.attributes()["text"], json!("YYY"));
		assert_eq!(entry.record().unwrap().str("text"), Some("ZZZ"));
		assert_eq!(harness.store.find("Post", 1).unwrap().str("text"), Some("ZZZ"));
	}

	#[rstest]
	fn test_record_collection_persists_earlier_hash_collection(harness: Harness) {
		let mut set = InstanceSet::new("user");

		let hashes = set.declare_collection(&harness.factory(), 1, false).unwrap();
		let records = set.declare_collection(&harness.factory(), 1, true).unwrap();

		assert_eq!(hashes, 0..1);
		assert_eq!(records, 0..1);
		assert_eq!(set.len(), 1);
		assert_eq!(harness.store.count("User"), 1);
		assert!(set.entries()[0].is_persisted());
	}

	#[rstest]
	fn test_record_claim_shorter_than_hash_claim(harness: Harness) {
		let mut set = InstanceSet::new("user");

		set.declare_collection(&harness.factory(), 2, false).unwrap();
		set.declare_collection(&harness.factory(), 1, true).unwrap();

		assert_eq!(set.len(), 2);
		assert_eq!(harness.store.count("User"), 1);
		assert!(set.entries()[0].is_persisted());
		assert!(!set.entries()[1].is_persisted());
	}

	#[rstest]
	fn test_after_create_runs_once_per_entry(harness: Harness) {
		let created = Arc::new(AtomicUsize::new(0));
		let counter = Arc::clone(&created);
		let definition = FactoryDefinition::builder("user", "User")
			.sequence("email", "user{n}@tut.by")
			.after_create(move |_| {
				counter.fetch_add(1, Ordering::SeqCst);
			})
			.build();
		let factory = EntryFactory {
			definition: &definition,
			sequences: &harness.sequences,
			store: &harness.store,
		};
		let mut set = InstanceSet::new("user");

		set.declare_singleton(&factory, None, true).unwrap();
		set.declare_singleton(&factory, None, true).unwrap();
		set.declare_collection(&factory, 1, true).unwrap();
		set.declare_collection(&factory, 1, false).unwrap();

		assert_eq!(set.len(), 1);
		assert_eq!(created.load(Ordering::SeqCst), 1);
	}

	#[rstest]
	fn test_build_consumes_sequence_indices(harness: Harness) {
		let mut set = InstanceSet::new("user");

		set.declare_collection(&harness.factory(), 3, false).unwrap();

		assert_eq!(harness.sequences.current("user"), 3);
		let indices: Vec<u64> = set.entries().iter().map(Entry::index).collect();
		assert_eq!(indices, vec![0, 1, 2]);
	}

	#[rstest]
	fn test_reference_collection_marks_kind() {
		let mut set = InstanceSet::new("user");
		assert_eq!(set.reference_collection(), 0..0);
		assert_eq!(set.kind(), SetKind::Collection);
	}
}
