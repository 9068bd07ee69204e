//! Sequence generation and nearest-time resolution

use chrono::Duration;
use rand::Rng;

use crate::prelude::*;
use super::ts;

fn three_hourly_week() -> PeriodicTimeSequence {
	// 6 days at 3-hour steps: 48 intervals, 49 slots
	PeriodicTimeSequence::new(ts("2016-07-12T00:00"), ts("2016-07-18T00:00"), Duration::hours(3)).unwrap()
}

fn built_index(sequence: &mut PeriodicTimeSequence) -> TimeSlotIndex {
	let mut index = TimeSlotIndex::new();
	index.build(sequence, "images/weather/");
	index
}

#[test]
fn sequence_advances_and_wraps() {
	let mut sequence = PeriodicTimeSequence::new(ts("2016-07-12T00:00"), ts("2016-07-12T06:00"), Duration::hours(3)).unwrap();
	assert_eq!(sequence.current(), ts("2016-07-12T00:00"));
	sequence.advance();
	assert_eq!(sequence.current(), ts("2016-07-12T03:00"));
	sequence.advance();
	assert_eq!(sequence.current(), ts("2016-07-12T06:00"));
	// Past the end: wraps to the start
	sequence.advance();
	assert_eq!(sequence.current(), ts("2016-07-12T00:00"));
}

#[test]
fn uneven_interval_rejected() {
	let result = PeriodicTimeSequence::new(ts("2016-07-12T00:00"), ts("2016-07-12T05:00"), Duration::hours(3));
	assert!(matches!(result, Err(LayerError::InvalidRange(_))));
}

#[test]
fn backwards_range_rejected() {
	let result = PeriodicTimeSequence::new(ts("2016-07-18T00:00"), ts("2016-07-12T00:00"), Duration::hours(3));
	assert!(matches!(result, Err(LayerError::InvalidRange(_))));
}

#[test]
fn non_positive_interval_rejected() {
	let result = PeriodicTimeSequence::new(ts("2016-07-12T00:00"), ts("2016-07-18T00:00"), Duration::zero());
	assert!(matches!(result, Err(LayerError::InvalidRange(_))));
	let result = PeriodicTimeSequence::new(ts("2016-07-12T00:00"), ts("2016-07-18T00:00"), Duration::hours(-3));
	assert!(matches!(result, Err(LayerError::InvalidRange(_))));
}

#[test]
fn interval_count_matches_range() {
	assert_eq!(three_hourly_week().interval_count(), 48);
}

#[test]
fn build_produces_ascending_keyed_slots() {
	let mut sequence = three_hourly_week();
	let index = built_index(&mut sequence);
	assert_eq!(index.len(), 49);
	let slots = index.slots();
	assert_eq!(slots[0].key, "00");
	assert_eq!(slots[0].timestamp, ts("2016-07-12T00:00"));
	assert_eq!(slots[0].data_path, "images/weather/00.png");
	assert_eq!(slots[1].key, "01");
	assert_eq!(slots[48].key, "48");
	assert_eq!(slots[48].timestamp, ts("2016-07-18T00:00"));
	for pair in slots.windows(2) {
		assert!(pair[0].timestamp < pair[1].timestamp);
	}
}

#[test]
fn build_is_idempotent() {
	let mut sequence = three_hourly_week();
	let mut index = built_index(&mut sequence);
	let before = index.slots().to_vec();
	index.build(&mut sequence, "images/weather/");
	assert_eq!(index.slots(), &before[..]);
}

#[test]
fn keys_unpad_past_two_digits() {
	// 200 one-minute intervals: 201 slots
	let mut sequence = PeriodicTimeSequence::new(ts("2016-07-12T00:00"), ts("2016-07-12T03:20"), Duration::minutes(1)).unwrap();
	let index = built_index(&mut sequence);
	assert_eq!(index.len(), 201);
	assert_eq!(index.slots()[5].key, "05");
	assert_eq!(index.slots()[99].key, "99");
	assert_eq!(index.slots()[100].key, "100");
	assert_eq!(index.slots()[200].key, "200");
}

#[test]
fn nearest_clamps_to_ends() {
	let mut sequence = three_hourly_week();
	let index = built_index(&mut sequence);
	assert_eq!(index.nearest(ts("2016-07-12T00:00")).unwrap().key, "00");
	assert_eq!(index.nearest(ts("2016-07-18T00:00")).unwrap().key, "48");
	assert_eq!(index.nearest(ts("1999-01-01T00:00")).unwrap().key, "00");
	assert_eq!(index.nearest(ts("2030-01-01T00:00")).unwrap().key, "48");
}

#[test]
fn nearest_picks_smaller_delta() {
	let mut sequence = three_hourly_week();
	let index = built_index(&mut sequence);
	// 01:00 is 1h from slot "00" and 2h from slot "01"
	assert_eq!(index.nearest(ts("2016-07-12T01:00")).unwrap().key, "00");
	assert_eq!(index.nearest(ts("2016-07-12T02:00")).unwrap().key, "01");
}

#[test]
fn nearest_tie_goes_to_earlier_slot() {
	let mut sequence = three_hourly_week();
	let index = built_index(&mut sequence);
	// Exactly equidistant between 00:00 and 03:00
	assert_eq!(index.nearest(ts("2016-07-12T01:30")).unwrap().key, "00");
	// And between later neighbors too
	assert_eq!(index.nearest(ts("2016-07-12T04:30")).unwrap().key, "01");
}

#[test]
fn nearest_is_total_over_random_queries() {
	let mut sequence = three_hourly_week();
	let index = built_index(&mut sequence);
	let mut rng = rand::thread_rng();
	for _ in 0..200 {
		let offset_minutes: i64 = rng.gen_range(-20_000..20_000);
		let query = ts("2016-07-12T00:00") + Duration::minutes(offset_minutes);
		let slot = index.nearest(query).unwrap();
		assert!(index.slots().contains(slot));
		// Idempotent
		assert_eq!(index.nearest(query).unwrap(), slot);
	}
}

#[test]
fn nearest_on_empty_index_fails() {
	let index = TimeSlotIndex::new();
	assert_eq!(index.nearest(ts("2016-07-12T00:00")).err(), Some(LayerError::EmptyIndex));
}

#[test]
fn sequence_spec_round_trip() {
	let spec = SequenceSpec {
		start: "2016-07-12T00:00".to_owned(),
		end: "2016-07-18T00:00".to_owned(),
		interval: "PT3H".to_owned()
	};
	let sequence = PeriodicTimeSequence::from_spec(&spec).unwrap();
	assert_eq!(sequence, three_hourly_week());
	// Bad interval strings surface as InvalidRange
	let bad = SequenceSpec {
		interval: "3 hours".to_owned(),
		..spec
	};
	assert!(matches!(PeriodicTimeSequence::from_spec(&bad), Err(LayerError::InvalidRange(_))));
}
