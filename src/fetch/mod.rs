//! Asynchronous image fetch/cache/dedup. Fetches run on detached worker threads; all bookkeeping
//! (cache, in-flight set, absent tracker) is mutated only on the driving thread, inside
//! `ensure_fetch_started()` and `update()`.
//! Created 2025-3-16

use std::{sync::{Arc, Mutex}, collections::HashMap, time::{Instant, Duration as StdDuration}, thread, mem, fs};
use chrono::{Duration, Utc};
use image::RgbaImage;

use crate::prelude::*;

// Mods
#[cfg(feature = "http_fetch")]
pub mod http;

/// The opaque byte-fetch primitive. `fetch()` is called on a worker thread and may block there;
/// it must yield either a decodable image payload or a failure.
pub trait ImageFetcher: Send + Sync {
	fn fetch(&self, locator: &str) -> Result<Vec<u8>, String>;
}

/// Reads the locator as a filesystem path
pub struct FileImageFetcher;

impl ImageFetcher for FileImageFetcher {
	fn fetch(&self, locator: &str) -> Result<Vec<u8>, String> {
		to_string_err_with_message(fs::read(locator), &format!("Attempt to load \"{}\"", locator))
	}
}

/// Picks a fetch strategy from the locator: `http(s)://...` goes over the network, anything else is
/// read as a file path
pub struct AutoFetcher {
	#[cfg(feature = "http_fetch")]
	http: http::HttpImageFetcher,
	file: FileImageFetcher
}

impl AutoFetcher {
	pub fn new(http_timeout: StdDuration) -> Self {
		#[cfg(not(feature = "http_fetch"))]
		let _ = http_timeout;
		Self {
			#[cfg(feature = "http_fetch")]
			http: http::HttpImageFetcher::new(http_timeout),
			file: FileImageFetcher
		}
	}
}

impl ImageFetcher for AutoFetcher {
	fn fetch(&self, locator: &str) -> Result<Vec<u8>, String> {
		if locator.starts_with("http://") || locator.starts_with("https://") {
			#[cfg(feature = "http_fetch")]
			return self.http.fetch(locator);
			#[cfg(not(feature = "http_fetch"))]
			return Err(format!("\"{}\" needs the `http_fetch` feature", locator));
		}
		self.file.fetch(locator)
	}
}

/// Whether a successful fetch should emit a resource-ready notification. Bulk prefetch suppresses
/// so 49 completions don't trigger 49 redraws.
#[derive(Clone, Copy, PartialEq, Debug)]
pub enum NotifyMode {
	Notify,
	Suppress
}

/// Where one identifier currently is in its `NotRequested -> InFlight -> {Ready | Failed}` lifecycle.
/// `Failed` can only go back to `InFlight` via a new `ensure_fetch_started()` after the cool-down.
#[derive(Clone, PartialEq, Debug)]
pub enum ResourceState {
	NotRequested,
	InFlight,
	Ready(UInt),
	Failed(Timestamp)
}

/// Decoded, renderer-consumable image plus its memory footprint
pub struct CachedImage {
	pub image: RgbaImage,
	pub size_bytes: UInt
}

impl CachedImage {
	pub fn decode(payload: &[u8]) -> Result<Self, String> {
		let decoded = to_string_err_with_message(image::load_from_memory(payload), "Image decode")?;
		let image = decoded.to_rgba8();
		let size_bytes = image.as_raw().len() as UInt;
		Ok(Self {
			image,
			size_bytes
		})
	}
}

/// Process-wide keyed store of loaded images with size accounting. Entries live for the process
/// lifetime; eviction under a memory budget belongs to the host, which can watch `total_size_bytes`.
#[derive(Default)]
pub struct ResourceCache {
	entries: HashMap<String, CachedImage>,
	total_size_bytes: UInt
}

impl ResourceCache {
	pub fn new() -> Self {
		Self {
			entries: HashMap::new(),
			total_size_bytes: 0
		}
	}
	pub fn contains(&self, identifier: &str) -> bool {
		self.entries.contains_key(identifier)
	}
	pub fn get(&self, identifier: &str) -> Option<&CachedImage> {
		self.entries.get(identifier)
	}
	pub fn insert(&mut self, identifier: &str, image: CachedImage) {
		self.total_size_bytes += image.size_bytes;
		if let Some(replaced) = self.entries.insert(identifier.to_owned(), image) {
			self.total_size_bytes -= replaced.size_bytes;
		}
	}
	pub fn resident_count(&self) -> usize {
		self.entries.len()
	}
	pub fn total_size_bytes(&self) -> UInt {
		self.total_size_bytes
	}
}

/// Records identifiers that failed to load so they are not re-fetched until the cool-down expires.
/// Same shape as a request-timeout map: identifier -> when it was marked.
pub struct AbsentResourceTracker {
	marked: HashMap<String, Timestamp>,
	cool_down: Duration
}

impl AbsentResourceTracker {
	pub fn new(cool_down: Duration) -> Self {
		Self {
			marked: HashMap::new(),
			cool_down
		}
	}
	pub fn mark(&mut self, identifier: &str) {
		self.marked.insert(identifier.to_owned(), Utc::now());
	}
	/// Whether the identifier has an unexpired mark (expired marks stay in the map but no longer
	/// suppress anything)
	pub fn is_absent(&self, identifier: &str) -> bool {
		match self.marked.get(identifier) {
			Some(marked_at) => Utc::now() - *marked_at < self.cool_down,
			None => false
		}
	}
	pub fn marked_at(&self, identifier: &str) -> Option<Timestamp> {
		self.marked.get(identifier).copied()
	}
	pub fn clear(&mut self, identifier: &str) {
		self.marked.remove(identifier);
	}
	pub fn cool_down(&self) -> Duration {
		self.cool_down
	}
}

/// What `update()` observed for one identifier
#[derive(Clone, Debug)]
pub enum FetchEvent {
	Ready {
		identifier: String,
		size_bytes: UInt,
		/// False when the fetch was issued in suppress-notify mode
		notify: bool
	},
	Failed {
		identifier: String,
		reason: String
	}
}

/// One outstanding fetch: the worker thread writes into `result_cell`, the driving thread polls it
struct InFlightFetch {
	started: Instant,
	suppress_notify: bool,
	result_cell: Arc<Mutex<Option<Result<Vec<u8>, String>>>>
}

/// Owns the fetch lifecycle for every identifier: dedup, issue, completion, failure cool-down.
/// At most one outstanding fetch per identifier at any time.
pub struct ImageFetchManager {
	fetcher: Arc<dyn ImageFetcher>,
	cache: ResourceCache,
	absent: AbsentResourceTracker,
	in_flight: HashMap<String, InFlightFetch>,
	fetch_timeout: StdDuration
}

impl ImageFetchManager {
	pub fn new(fetcher: Arc<dyn ImageFetcher>, cool_down: Duration, fetch_timeout: StdDuration) -> Self {
		Self {
			fetcher,
			cache: ResourceCache::new(),
			absent: AbsentResourceTracker::new(cool_down),
			in_flight: HashMap::new(),
			fetch_timeout
		}
	}
	/// Issues an asynchronous fetch for `identifier` unless it is already resident, already in
	/// flight, or absent-marked within the cool-down. Returns whether a new fetch was issued.
	/// Never blocks.
	pub fn ensure_fetch_started(&mut self, identifier: &str, locator: &str, notify: NotifyMode) -> bool {
		if self.cache.contains(identifier) {
			return false;
		}
		if self.in_flight.contains_key(identifier) {
			return false;
		}
		if self.absent.is_absent(identifier) {
			return false;
		}
		// Register before spawning so a second call in the same tick is already a duplicate
		let result_cell: Arc<Mutex<Option<Result<Vec<u8>, String>>>> = Arc::new(Mutex::new(None));
		self.in_flight.insert(identifier.to_owned(), InFlightFetch {
			started: Instant::now(),
			suppress_notify: notify == NotifyMode::Suppress,
			result_cell: result_cell.clone()
		});
		let fetcher = self.fetcher.clone();
		let locator_owned = locator.to_owned();
		thread::spawn(move || {
			let result = fetcher.fetch(&locator_owned);
			*result_cell.lock().unwrap() = Some(result);
		});
		// Done
		true
	}
	/// Polls every outstanding fetch once. Successes are decoded and inserted into the cache (and
	/// any stale absent mark cleared), failures are absent-marked with the current time, in-flight
	/// entries older than the fetch timeout are swept to failure. Call this from the host's frame
	/// loop; completion callbacks are delivered as the returned events.
	pub fn update(&mut self) -> Vec<FetchEvent> {
		let mut finished = Vec::<(String, Result<Vec<u8>, String>, bool)>::new();
		let mut timed_out = Vec::<String>::new();
		for (identifier, fetch) in self.in_flight.iter() {
			match mem::replace(&mut *fetch.result_cell.lock().unwrap(), None) {
				Some(result) => finished.push((identifier.clone(), result, fetch.suppress_notify)),
				None => {
					if fetch.started.elapsed() >= self.fetch_timeout {
						timed_out.push(identifier.clone());
					}
				}
			}
		}
		let mut events = Vec::<FetchEvent>::new();
		for (identifier, result, suppress_notify) in finished {
			self.in_flight.remove(&identifier);
			match result.and_then(|payload| CachedImage::decode(&payload)) {
				Ok(cached) => {
					let size_bytes = cached.size_bytes;
					self.cache.insert(&identifier, cached);
					self.absent.clear(&identifier);
					events.push(FetchEvent::Ready {
						identifier,
						size_bytes,
						notify: !suppress_notify
					});
				},
				Err(reason) => {
					self.absent.mark(&identifier);
					events.push(FetchEvent::Failed {
						identifier,
						reason
					});
				}
			}
		}
		// A timed-out worker may still write to its (now disconnected) cell; that late result is
		// discarded, and a retry after the cool-down gets a fresh cell
		for identifier in timed_out {
			self.in_flight.remove(&identifier);
			self.absent.mark(&identifier);
			events.push(FetchEvent::Failed {
				identifier,
				reason: format!("No response within {:?}", self.fetch_timeout)
			});
		}
		// Done
		events
	}
	/// True iff the cache currently holds the identifier. Pure query.
	pub fn is_ready(&self, identifier: &str) -> bool {
		self.cache.contains(identifier)
	}
	pub fn state_of(&self, identifier: &str) -> ResourceState {
		if let Some(entry) = self.cache.get(identifier) {
			return ResourceState::Ready(entry.size_bytes);
		}
		if self.in_flight.contains_key(identifier) {
			return ResourceState::InFlight;
		}
		if let Some(marked_at) = self.absent.marked_at(identifier) {
			return ResourceState::Failed(marked_at);
		}
		ResourceState::NotRequested
	}
	pub fn in_flight_count(&self) -> usize {
		self.in_flight.len()
	}
	pub fn cache(&self) -> &ResourceCache {
		&self.cache
	}
	pub fn absent(&self) -> &AbsentResourceTracker {
		&self.absent
	}
}
