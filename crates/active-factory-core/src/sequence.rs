//! Per-factory sequence counters.
//!
//! Every produced instance consumes one index from the counter of its factory
//! name. Counters start at 0 and only move forward until reset.

use std::collections::HashMap;
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::Mutex;

use crate::definition::{AttributeMap, FactoryDefinition};
use crate::error::FactoryResult;

static GLOBAL_SEQUENCES: Lazy<Arc<SequenceEvaluator>> =
	Lazy::new(|| Arc::new(SequenceEvaluator::new()));

/// Issues sequence indices and evaluates definitions against them.
///
/// # Examples
///
/// ```
/// use active_factory_core::definition::FactoryDefinition;
/// use active_factory_core::sequence::SequenceEvaluator;
///
/// let user = FactoryDefinition::builder("user", "User")
///     .sequence("email", "user{n}@tut.by")
///     .build();
/// let sequences = SequenceEvaluator::new();
///
/// let first = sequences.next_attributes(&user, 1).unwrap();
/// let second = sequences.next_attributes(&user, 1).unwrap();
/// assert_eq!(first[0].0, 0);
/// assert_eq!(second[0].0, 1);
/// ```
#[derive(Debug, Default)]
pub struct SequenceEvaluator {
	counters: Mutex<HashMap<String, u64>>,
}

impl SequenceEvaluator {
	/// Creates an evaluator with all counters at 0.
	pub fn new() -> Self {
		Self::default()
	}

	/// Returns the process-wide evaluator.
	pub fn global() -> Arc<Self> {
		Arc::clone(&GLOBAL_SEQUENCES)
	}

	/// Reserves `count` consecutive indices for `factory`.
	pub fn next_indices(&self, factory: &str, count: usize) -> std::ops::Range<u64> {
		let mut counters = self.counters.lock();
		let counter = counters.entry(factory.to_string()).or_insert(0);
		let start = *counter;
		*counter += count as u64;
		start..*counter
	}

	/// Produces `count` attribute maps with fresh indices, in ascending order.
	pub fn next_attributes(
		&self,
		definition: &FactoryDefinition,
		count: usize,
	) -> FactoryResult<Vec<(u64, AttributeMap)>> {
		let indices = self.next_indices(definition.name(), count);
		tracing::trace!(
			factory = definition.name(),
			start = indices.start,
			end = indices.end,
			"evaluating attribute expressions"
		);
		indices
			.map(|index| Ok((index, definition.attributes_for(index)?)))
			.collect()
	}

	/// Next index that `factory` would receive.
	pub fn current(&self, factory: &str) -> u64 {
		self.counters.lock().get(factory).copied().unwrap_or(0)
	}

	/// Restarts the counter of one factory at 0.
	pub fn reset(&self, factory: &str) {
		self.counters.lock().remove(factory);
	}

	/// Restarts every counter at 0.
	pub fn reset_all(&self) {
		self.counters.lock().clear();
	}
}
