//! The result of a `models` block.
//!
//! A [`ModelsContext`] owns the instance sets of one block and answers
//! accessor queries by name. Only names derived from factories declared in
//! that block are bound; everything else is [`FactoryError::NoSuchAccessor`].

use std::collections::{BTreeMap, HashMap};

use crate::definition::AttributeMap;
use crate::error::{FactoryError, FactoryResult};
use crate::instance::{Entry, InstanceSet, SetKind};
use crate::naming::{AccessorForm, AccessorNames};
use crate::persistence::{Persistence, Record};
use crate::settings::FactorySettings;

/// Value returned by [`ModelsContext::access`].
#[derive(Debug, Clone, PartialEq)]
pub enum Accessed {
	/// `user`
	Record(Record),
	/// `user_`
	Hash(AttributeMap),
	/// `users`
	Records(Vec<Record>),
	/// `users_`
	Hashes(Vec<AttributeMap>),
}

/// Accessors bound by one `models` block.
#[derive(Debug, Clone)]
pub struct ModelsContext {
	sets: HashMap<String, InstanceSet>,
	bindings: BTreeMap<String, (String, AccessorForm)>,
}

impl ModelsContext {
	pub(crate) fn new(sets: HashMap<String, InstanceSet>, settings: &FactorySettings) -> Self {
		let mut bindings = BTreeMap::new();
		for factory in sets.keys() {
			let names = AccessorNames::for_factory(factory, settings);
			for (form, name) in names.iter() {
				// A plural equal to the singular keeps the singleton binding.
				bindings
					.entry(name.to_string())
					.or_insert_with(|| (factory.clone(), form));
			}
		}
		Self { sets, bindings }
	}

	/// Bound accessor names, sorted.
	pub fn accessors(&self) -> impl Iterator<Item = &str> {
		self.bindings.keys().map(String::as_str)
	}

	/// Whether `name` is bound in this context.
	pub fn is_bound(&self, name: &str) -> bool {
		self.bindings.contains_key(name)
	}

	/// Instance set of a declared factory.
	pub fn instance_set(&self, factory: &str) -> Option<&InstanceSet> {
		self.sets.get(factory)
	}

	/// Resolves any bound accessor name to the value its form selects.
	pub fn access(&self, name: &str) -> FactoryResult<Accessed> {
		let (_, form) = self.binding(name)?;
		match form {
			AccessorForm::Singleton => self.get(name).map(Accessed::Record),
			AccessorForm::SingletonHash => self.get_hash(name).map(Accessed::Hash),
			AccessorForm::Collection => self.get_all(name).map(Accessed::Records),
			AccessorForm::CollectionHash => self.get_all_hash(name).map(Accessed::Hashes),
		}
	}

	/// Persisted record of the singleton (`user`).
	pub fn get(&self, name: &str) -> FactoryResult<Record> {
		let entry = self.singleton(name, AccessorForm::Singleton)?;
		entry
			.record()
			.cloned()
			.ok_or_else(|| FactoryError::NotPersisted(name.to_string()))
	}

	/// Attribute hash of the singleton (`user_`).
	pub fn get_hash(&self, name: &str) -> FactoryResult<AttributeMap> {
		let entry = self.singleton(name, AccessorForm::SingletonHash)?;
		Ok(entry.attributes().clone())
	}

	/// Singleton hash merged with `overrides` (`user_(..)`).
	///
	/// Returns a copy; the entry and the store are left untouched.
	pub fn get_hash_with(&self, name: &str, overrides: &AttributeMap) -> FactoryResult<AttributeMap> {
		let mut hash = self.get_hash(name)?;
		for (field, value) in overrides {
			hash.insert(field.clone(), value.clone());
		}
		Ok(hash)
	}

	/// Persisted records of the collection (`users`).
	pub fn get_all(&self, name: &str) -> FactoryResult<Vec<Record>> {
		self.collection(name, AccessorForm::Collection)?
			.iter()
			.map(|entry| {
				entry
					.record()
					.cloned()
					.ok_or_else(|| FactoryError::NotPersisted(name.to_string()))
			})
			.collect()
	}

	/// Attribute hashes of the collection (`users_`).
	pub fn get_all_hash(&self, name: &str) -> FactoryResult<Vec<AttributeMap>> {
		let entries = self.collection(name, AccessorForm::CollectionHash)?;
		Ok(entries.iter().map(|entry| entry.attributes().clone()).collect())
	}

	/// Collection hashes with the i-th map applied to the i-th hash.
	///
	/// Hashes without a matching map are returned unchanged.
	pub fn get_all_hash_with(
		&self,
		name: &str,
		overrides: &[AttributeMap],
	) -> FactoryResult<Vec<AttributeMap>> {
		let mut hashes = self.get_all_hash(name)?;
		for (hash, map) in hashes.iter_mut().zip(overrides) {
			for (field, value) in map {
				hash.insert(field.clone(), value.clone());
			}
		}
		Ok(hashes)
	}

	/// Merges `overrides` into the singleton and returns the new hash.
	///
	/// A persisted singleton is updated in the store as well.
	pub fn merge(
		&mut self,
		store: &dyn Persistence,
		name: &str,
		overrides: &AttributeMap,
	) -> FactoryResult<AttributeMap> {
		let (factory, form) = self.binding(name)?;
		if form.is_collection() {
			return Err(FactoryError::NoSuchAccessor(name.to_string()));
		}
		let factory = factory.to_string();
		let set = self
			.sets
			.get_mut(&factory)
			.ok_or_else(|| FactoryError::NoSuchAccessor(name.to_string()))?;
		let position = set.singleton_position().ok_or_else(|| FactoryError::AmbiguousAccess {
			name: name.to_string(),
			declared: SetKind::Collection,
		})?;
		let merged = set.merge_overrides(store, position, overrides)?;
		tracing::debug!(factory = factory.as_str(), position, "merged overrides");
		Ok(merged)
	}

	fn binding(&self, name: &str) -> FactoryResult<(&str, AccessorForm)> {
		self.bindings
			.get(name)
			.map(|(factory, form)| (factory.as_str(), *form))
			.ok_or_else(|| FactoryError::NoSuchAccessor(name.to_string()))
	}

	fn set_for(&self, name: &str, expected: AccessorForm) -> FactoryResult<&InstanceSet> {
		let (factory, form) = self.binding(name)?;
		if form != expected {
			return Err(FactoryError::NoSuchAccessor(name.to_string()));
		}
		self.sets
			.get(factory)
			.ok_or_else(|| FactoryError::NoSuchAccessor(name.to_string()))
	}

	fn singleton(&self, name: &str, expected: AccessorForm) -> FactoryResult<&Entry> {
		self.set_for(name, expected)?
			.singleton_entry()
			.ok_or_else(|| FactoryError::AmbiguousAccess {
				name: name.to_string(),
				declared: SetKind::Collection,
			})
	}

	fn collection(&self, name: &str, expected: AccessorForm) -> FactoryResult<&[Entry]> {
		let set = self.set_for(name, expected)?;
		if !set.has_collection() {
			return Err(FactoryError::AmbiguousAccess {
				name: name.to_string(),
				declared: SetKind::Singleton,
			});
		}
		Ok(set.entries())
	}
}
