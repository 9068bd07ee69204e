//! Periodic time sequence: pure value generator stepping from a start timestamp to an end timestamp
//! by a fixed interval, wrapping back to the start when it passes the end. No I/O anywhere in here.

use chrono::{Duration, NaiveDateTime, DateTime, Utc};
use serde::{Serialize, Deserialize};

use crate::prelude::*;

/// Range-and-interval specification as it appears in config files, e.g.
/// `{"start": "2016-07-12T00:00", "end": "2016-07-18T00:00", "interval": "PT3H"}`
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct SequenceSpec {
	pub start: String,
	pub end: String,
	pub interval: String
}

/// Parses an ISO-8601-like duration. Supported designators: days, hours, minutes, seconds
/// (`PnDTnHnMnS`, any subset, in order). Calendar-variable units (months, years) are not fixed
/// durations and are rejected.
/// ```
/// use globe_timelapse::prelude::parse_interval;
/// use chrono::Duration;
/// assert_eq!(parse_interval("PT3H"), Ok(Duration::hours(3)));
/// assert_eq!(parse_interval("P1D"), Ok(Duration::days(1)));
/// assert_eq!(parse_interval("P1DT6H30M"), Ok(Duration::hours(30) + Duration::minutes(30)));
/// assert_eq!(parse_interval("PT90S"), Ok(Duration::seconds(90)));
/// assert!(parse_interval("3 hours").is_err());
/// assert!(parse_interval("P").is_err());
/// assert!(parse_interval("PT3H6").is_err());
/// assert!(parse_interval("P1M").is_err());
/// ```
pub fn parse_interval(s: &str) -> Result<Duration, String> {
	let rest = match s.strip_prefix('P') {
		Some(rest) => rest,
		None => return Err(format!("Interval \"{}\" does not start with 'P'", s))
	};
	let (date_part, time_part) = match rest.split_once('T') {
		Some((date_part, time_part)) => (date_part, time_part),
		None => (rest, "")
	};
	let total = parse_interval_components(date_part, &[('D', 86_400)])?
		+ parse_interval_components(time_part, &[('H', 3_600), ('M', 60), ('S', 1)])?;
	if total <= Duration::zero() {
		return Err(format!("Interval \"{}\" must be greater than zero", s));
	}
	Ok(total)
}

/// One side of the 'T' separator: digits followed by a unit designator, designators in declared order
fn parse_interval_components(part: &str, units: &[(char, i64)]) -> Result<Duration, String> {
	let mut seconds: i64 = 0;
	let mut number = String::new();
	let mut next_unit: usize = 0;
	for c in part.chars() {
		if c.is_ascii_digit() {
			number.push(c);
			continue;
		}
		let position = match units.iter().position(|(designator, _)| *designator == c) {
			Some(position) => position,
			None => return Err(format!("Unexpected character '{}' in interval", c))
		};
		if position < next_unit {
			return Err(format!("Interval component '{}' is out of order or repeated", c));
		}
		if number.is_empty() {
			return Err(format!("Missing number before '{}' in interval", c));
		}
		seconds += to_string_err(number.parse::<i64>())? * units[position].1;
		number.clear();
		next_unit = position + 1;
	}
	if !number.is_empty() {
		return Err(format!("Trailing number \"{}\" without a unit designator", number));
	}
	Ok(Duration::seconds(seconds))
}

/// Parses a timestamp, accepting RFC 3339 as well as the shorter `2016-07-12T00:00[:00]` forms
/// (interpreted as UTC).
/// ```
/// use globe_timelapse::prelude::parse_timestamp;
/// assert_eq!(parse_timestamp("2016-07-12T00:00").unwrap(), parse_timestamp("2016-07-12T00:00:00Z").unwrap());
/// assert!(parse_timestamp("July 12th").is_err());
/// ```
pub fn parse_timestamp(s: &str) -> Result<Timestamp, String> {
	if let Ok(t) = DateTime::parse_from_rfc3339(s) {
		return Ok(t.with_timezone(&Utc));
	}
	for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"] {
		if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
			return Ok(naive.and_utc());
		}
	}
	Err(format!("Unable to parse timestamp \"{}\"", s))
}

#[derive(Clone, Debug, PartialEq)]
pub struct PeriodicTimeSequence {
	start: Timestamp,
	end: Timestamp,
	interval: Duration,
	current: Timestamp
}

impl PeriodicTimeSequence {
	/// Validates the range up front: `start <= end`, interval > 0, and the interval must evenly
	/// divide the range (a partial final slot would wrap into a duplicate of the start, so uneven
	/// ranges are rejected rather than rounded).
	pub fn new(start: Timestamp, end: Timestamp, interval: Duration) -> Result<Self, LayerError> {
		if interval <= Duration::zero() {
			return Err(LayerError::InvalidRange(format!("interval {} is not positive", interval)));
		}
		if start > end {
			return Err(LayerError::InvalidRange(format!("start {} is after end {}", start, end)));
		}
		let remainder_ms = (end - start).num_milliseconds() % interval.num_milliseconds();
		if remainder_ms != 0 {
			return Err(LayerError::InvalidRange(format!("interval {} does not evenly divide the range {} / {} (remainder {} ms)", interval, start, end, remainder_ms)));
		}
		Ok(Self {
			start,
			end,
			interval,
			current: start
		})
	}
	pub fn from_spec(spec: &SequenceSpec) -> Result<Self, LayerError> {
		let start = parse_timestamp(&spec.start).map_err(LayerError::InvalidRange)?;
		let end = parse_timestamp(&spec.end).map_err(LayerError::InvalidRange)?;
		let interval = parse_interval(&spec.interval).map_err(LayerError::InvalidRange)?;
		Self::new(start, end, interval)
	}
	pub fn current(&self) -> Timestamp {
		self.current
	}
	/// Steps to `current + interval`; past the end it wraps back to the start (periodic)
	pub fn advance(&mut self) {
		let next = self.current + self.interval;
		self.current = if next > self.end {
			self.start
		}
		else {
			next
		};
	}
	pub fn reset(&mut self) {
		self.current = self.start;
	}
	/// `(end - start) / interval`. Infallible because even division is checked in `new()`.
	pub fn interval_count(&self) -> UInt {
		((self.end - self.start).num_milliseconds() / self.interval.num_milliseconds()) as UInt
	}
	pub fn start(&self) -> Timestamp {
		self.start
	}
	pub fn end(&self) -> Timestamp {
		self.end
	}
	pub fn interval(&self) -> Duration {
		self.interval
	}
}
