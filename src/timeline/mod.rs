//! The slot table for one image sequence: every canonical timestamp gets a short ordinal key and a
//! data path, and arbitrary query times resolve to the nearest slot.
//! Created 2025-3-14

use serde::{Serialize, Deserialize};

use crate::prelude::*;

// Mods
pub mod sequence;

/// One discrete time point in a periodic sequence. `key` is the join key between the slot table and
/// the resource identifiers; `data_path` is where the image for this time point lives.
#[derive(Serialize, Deserialize, Clone, PartialEq, Debug)]
pub struct Slot {
	pub timestamp: Timestamp,
	/// Zero-padded ordinal ("00", "01", ..., unpadded past two digits), unique within one index
	pub key: String,
	/// `base_path + key + ".png"`
	pub data_path: String
}

/// Ordered collection of `(timestamp, key, data_path)` records for one sequence. Slots are always
/// timestamp-ascending; they are generated eagerly and exactly once per expected count.
#[derive(Clone, Debug, Default)]
pub struct TimeSlotIndex {
	slots: Vec<Slot>
}

impl TimeSlotIndex {
	pub fn new() -> Self {
		Self {
			slots: Vec::new()
		}
	}
	/// Generates the slot table from the sequence. Idempotent: when the table already holds the
	/// expected `interval_count() + 1` slots this is a no-op, otherwise it clears and regenerates.
	pub fn build(&mut self, sequence: &mut PeriodicTimeSequence, base_path: &str) {
		let expected = sequence.interval_count() as usize + 1;
		if self.slots.len() == expected {
			return;
		}
		self.slots.clear();
		sequence.reset();
		for i in 0..expected {
			let key = format!("{:02}", i);
			self.slots.push(Slot {
				timestamp: sequence.current(),
				data_path: format!("{}{}.png", base_path, &key),
				key
			});
			sequence.advance();
		}
		// The final advance() wrapped the sequence back to its start, so a later rebuild starts clean
	}
	pub fn is_built(&self) -> bool {
		!self.slots.is_empty()
	}
	pub fn len(&self) -> usize {
		self.slots.len()
	}
	pub fn is_empty(&self) -> bool {
		self.slots.is_empty()
	}
	pub fn slots(&self) -> &[Slot] {
		&self.slots
	}
	/// Resolves an arbitrary query time to the nearest slot. Queries at or before the first slot
	/// return the first slot, at or past the last return the last; in between, the bracketing slot
	/// with the smaller absolute delta wins and exact ties go to the EARLIER slot so repeated
	/// renders of the same time are reproducible.
	pub fn nearest(&self, query: Timestamp) -> Result<&Slot, LayerError> {
		let first = match self.slots.first() {
			Some(first) => first,
			None => return Err(LayerError::EmptyIndex)
		};
		if query <= first.timestamp {
			return Ok(first);
		}
		let last = &self.slots[self.slots.len() - 1];
		if query >= last.timestamp {
			return Ok(last);
		}
		for pair in self.slots.windows(2) {
			let (left, right) = (&pair[0], &pair[1]);
			if left.timestamp <= query && query <= right.timestamp {
				return Ok(if query - left.timestamp <= right.timestamp - query {
					left
				}
				else {
					right
				});
			}
		}
		// Slots are ascending, so one window always brackets a query strictly inside the range
		Ok(last)
	}
}
