//! Accessor name synthesis.
//!
//! Each factory name yields four accessor names: the singleton (`user`), its
//! hash form (`user_`), the collection (`users`) and the collection hash form
//! (`users_`). The same names are used for statements inside a `models`
//! block and for lookups on the resulting context.

use std::collections::HashMap;
use std::fmt;

use crate::settings::FactorySettings;

/// Which view of a factory an accessor name selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccessorForm {
	/// Persisted record of the singleton.
	Singleton,
	/// Attribute hash of the singleton.
	SingletonHash,
	/// Persisted records of the collection.
	Collection,
	/// Attribute hashes of the collection.
	CollectionHash,
}

impl AccessorForm {
	/// Whether the form addresses the collection.
	pub fn is_collection(self) -> bool {
		matches!(self, Self::Collection | Self::CollectionHash)
	}

	/// Whether the form reads attribute hashes instead of records.
	pub fn is_hash(self) -> bool {
		matches!(self, Self::SingletonHash | Self::CollectionHash)
	}
}

impl fmt::Display for AccessorForm {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let label = match self {
			Self::Singleton => "singleton",
			Self::SingletonHash => "singleton hash",
			Self::Collection => "collection",
			Self::CollectionHash => "collection hash",
		};
		f.write_str(label)
	}
}

/// The four accessor names of one factory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessorNames {
	/// Factory the names were derived from.
	pub factory: String,
	/// `user`
	pub singleton: String,
	/// `user_`
	pub singleton_hash: String,
	/// `users`
	pub collection: String,
	/// `users_`
	pub collection_hash: String,
}

impl AccessorNames {
	/// Derives the accessor names of `factory`.
	///
	/// # Examples
	///
	/// ```
	/// use active_factory_core::naming::AccessorNames;
	/// use active_factory_core::settings::FactorySettings;
	///
	/// let names = AccessorNames::for_factory("simple_user", &FactorySettings::default());
	/// assert_eq!(names.collection, "simple_users");
	/// assert_eq!(names.collection_hash, "simple_users_");
	/// ```
	pub fn for_factory(factory: &str, settings: &FactorySettings) -> Self {
		let plural = pluralize(factory, &settings.irregular_plurals);
		Self {
			factory: factory.to_string(),
			singleton: factory.to_string(),
			singleton_hash: format!("{factory}{}", settings.hash_suffix),
			collection_hash: format!("{plural}{}", settings.hash_suffix),
			collection: plural,
		}
	}

	/// Returns the form `name` selects, if it is one of these names.
	///
	/// The singleton wins when a factory's plural equals its own name.
	pub fn form_of(&self, name: &str) -> Option<AccessorForm> {
		self.iter()
			.find(|(_, candidate)| *candidate == name)
			.map(|(form, _)| form)
	}

	/// Iterates over `(form, name)` pairs.
	pub fn iter(&self) -> impl Iterator<Item = (AccessorForm, &str)> {
		[
			(AccessorForm::Singleton, self.singleton.as_str()),
			(AccessorForm::SingletonHash, self.singleton_hash.as_str()),
			(AccessorForm::Collection, self.collection.as_str()),
			(AccessorForm::CollectionHash, self.collection_hash.as_str()),
		]
		.into_iter()
	}
}

/// Pluralizes the last word of a snake_case identifier using English rules.
///
/// `irregular` maps a singular word (or the whole identifier) to its plural.
pub fn pluralize(word: &str, irregular: &HashMap<String, String>) -> String {
	if let Some(plural) = irregular.get(word) {
		return plural.clone();
	}
	let (prefix, last) = match word.rfind('_') {
		Some(pos) => word.split_at(pos + 1),
		None => ("", word),
	};
	if let Some(plural) = irregular.get(last) {
		return format!("{prefix}{plural}");
	}
	if last.is_empty() {
		return word.to_string();
	}

	let lower = last.to_ascii_lowercase();
	let plural = if lower.ends_with("ss")
		|| lower.ends_with('x')
		|| lower.ends_with('z')
		|| lower.ends_with("ch")
		|| lower.ends_with("sh")
	{
		format!("{last}es")
	} else if lower.ends_with('y') && !ends_with_vowel_y(&lower) {
		format!("{}ies", &last[..last.len() - 1])
	} else if lower.ends_with('s') {
		last.to_string()
	} else {
		format!("{last}s")
	};
	format!("{prefix}{plural}")
}

fn ends_with_vowel_y(word: &str) -> bool {
	let mut chars = word.chars().rev();
	chars.next();
	matches!(chars.next(), Some('a' | 'e' | 'i' | 'o' | 'u'))
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	#[rstest]
	#[case("user", "users")]
	#[case("simple_user", "simple_users")]
	#[case("post_with_after_build", "post_with_after_builds")]
	#[case("category", "categories")]
	#[case("day", "days")]
	#[case("box", "boxes")]
	#[case("match", "matches")]
	#[case("address", "addresses")]
	#[case("news", "news")]
	fn test_pluralize_default_rules(#[case] singular: &str, #[case] expected: &str) {
		assert_eq!(pluralize(singular, &HashMap::new()), expected);
	}

	#[rstest]
	fn test_pluralize_irregular_last_word() {
		let irregular = HashMap::from([("person".to_string(), "people".to_string())]);
		assert_eq!(pluralize("admin_person", &irregular), "admin_people");
		assert_eq!(pluralize("person", &irregular), "people");
	}

	#[rstest]
	fn test_accessor_names_with_custom_suffix() {
		let settings = FactorySettings::default().with_hash_suffix("_attrs");

		let names = AccessorNames::for_factory("post", &settings);

		assert_eq!(names.singleton, "post");
		assert_eq!(names.singleton_hash, "post_attrs");
		assert_eq!(names.collection, "posts");
		assert_eq!(names.collection_hash, "posts_attrs");
	}

	#[rstest]
	#[case("user", Some(AccessorForm::Singleton))]
	#[case("user_", Some(AccessorForm::SingletonHash))]
	#[case("users", Some(AccessorForm::Collection))]
	#[case("users_", Some(AccessorForm::CollectionHash))]
	#[case("userss", None)]
	fn test_form_of(#[case] name: &str, #[case] expected: Option<AccessorForm>) {
		let names = AccessorNames::for_factory("user", &FactorySettings::default());
		assert_eq!(names.form_of(name), expected);
	}

	#[rstest]
	fn test_singleton_wins_for_uncountable_names() {
		let names = AccessorNames::for_factory("news", &FactorySettings::default());
		assert_eq!(names.form_of("news"), Some(AccessorForm::Singleton));
	}

	#[rstest]
	fn test_form_flags() {
		assert!(AccessorForm::CollectionHash.is_collection());
		assert!(AccessorForm::CollectionHash.is_hash());
		assert!(!AccessorForm::Singleton.is_hash());
		assert!(!AccessorForm::SingletonHash.is_collection());
	}
}
