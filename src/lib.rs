//! Time-series globe imagery: one logical layer backed by a periodic sequence of full-globe images,
//! selected by a current timestamp and fetched/cached asynchronously.
//! Created 2025-3-14

use std::{fmt, env, error::Error, thread, time::Duration};
use colored::Colorize;

// Modules
pub mod timeline;
pub mod fetch;
pub mod layer;
pub mod resource_interface;

// Tests
#[cfg(test)]
mod tests;

// Prelude
#[allow(unused)]
pub mod prelude {
	use super::*;
	// Name of this app
	pub const APP_NAME: &str = "Globe Timelapse";
	// Types
	pub type Float = f32;
	pub type Int = i64;
	pub type UInt = u64;
	/// Absolute point in time, millisecond precision, totally ordered
	pub type Timestamp = chrono::DateTime<chrono::Utc>;
	// Misc
	pub use crate::{
		timeline::{Slot, TimeSlotIndex, sequence::{PeriodicTimeSequence, SequenceSpec, parse_interval, parse_timestamp}},
		fetch::{ImageFetcher, ImageFetchManager, ResourceCache, AbsentResourceTracker, CachedImage, ResourceState, NotifyMode, FetchEvent, FileImageFetcher, AutoFetcher},
		layer::{TimeSeriesLayer, RenderContext, GlobeRenderer, RedrawNotifier, DrawCommand, DrawParams},
		resource_interface::{PrefetchConfig, LayerConfig},
		LayerError
	};
	#[cfg(feature = "http_fetch")] pub use crate::fetch::http::HttpImageFetcher;
	// Copied from extras
	pub fn to_string_err<T, E: ToString>(result: Result<T, E>) -> Result<T, String> {
		match result {
			Ok(t) => Ok(t),
			Err(e) => Err(e.to_string())
		}
	}
	pub fn to_string_err_with_message<T, E: ToString>(result: Result<T, E>, message: &str) -> Result<T, String> {
		match result {
			Ok(t) => Ok(t),
			Err(e) => Err(format!("Message: {}, Error: {}", message, e.to_string()))
		}
	}
	pub fn prompt(s: &str) -> String {
		dialoguer::Input::new()
			.with_prompt(s)
			.interact_text()
			.unwrap()
	}
}

use prelude::*;

/// Everything that can go wrong while setting up or querying a layer. Transient fetch failures are
/// NOT represented here; those are absorbed by the absent-resource tracker and never surface as errors.
#[derive(Debug, Clone, PartialEq)]
pub enum LayerError {
	/// Interval/range misconfiguration at sequence-build time
	InvalidRange(String),
	/// Nearest-time query issued before any slots exist
	EmptyIndex,
	/// Required external context (config field, renderer handle) is absent
	MissingContext(String)
}

impl fmt::Display for LayerError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::InvalidRange(message) => write!(f, "Invalid time range: {}", message),
			Self::EmptyIndex => write!(f, "Time slot index is empty, it must be built before nearest-time queries"),
			Self::MissingContext(what) => write!(f, "Missing required context: {}", what)
		}
	}
}

impl Error for LayerError {}

pub fn ui_main() {
	// Parse arguments
	let args: Vec<String> = env::args().collect();
	if args.len() < 2 {
		panic!("Not enough arguments, see globe_timelapse::ui_main()");
	}
	else {
		match &args[1][..] {
			"-prefetch" => {
				assert!(args.len() >= 3, "Not enough arguments");
				prefetch_main(&args[2]);
			},
			"-slots" => {
				assert!(args.len() >= 3, "Not enough arguments");
				print_slot_tables(&args[2]);
			},
			"-new-config" => {
				let path = prompt("Config file path");
				resource_interface::save_starter_config(&path).unwrap();
				println!("Wrote starter config to \"{}\"", &path);
			},
			_ => panic!("Invalid arguments")
		}
	}
}

/// Warms the cache for every layer in the given config file, polling until every slot is either
/// resident or marked absent. Does not retry failures; run it again after the cool-down for that.
fn prefetch_main(config_path: &str) {
	let config = resource_interface::load_prefetch_config(config_path).unwrap();
	let mut ctx = RenderContext::new(ImageFetchManager::new(
		std::sync::Arc::new(AutoFetcher::new(config.fetch_timeout())),
		config.cool_down(),
		config.fetch_timeout()
	));
	let mut layers = Vec::<TimeSeriesLayer>::new();
	for layer_config in &config.layers {
		layers.push(TimeSeriesLayer::from_config(layer_config).unwrap());
	}
	let mut total_slots: usize = 0;
	for layer in layers.iter_mut() {
		layer.pre_populate(&mut ctx);
		total_slots += layer.slot_count();
	}
	println!("Prefetching {} slots across {} layer(s)", total_slots, layers.len());
	// Poll until nothing is left in flight
	let mut n_ready: usize = 0;
	let mut n_failed: usize = 0;
	loop {
		for event in ctx.update() {
			match event {
				FetchEvent::Ready{identifier, size_bytes, ..} => {
					n_ready += 1;
					println!("{} {} ({} bytes)", "Ready ".green(), identifier, size_bytes);
				},
				FetchEvent::Failed{identifier, reason} => {
					n_failed += 1;
					println!("{} {}: {}", "Failed".red(), identifier, reason);
				}
			}
		}
		if layers.iter().all(|layer| layer.is_pre_populated(&ctx)) {
			println!("{}", "All slots resident".green());
			break;
		}
		if ctx.fetch_manager.in_flight_count() == 0 {
			println!("{}", format!("Done with {} slot(s) unavailable, retry after the cool-down expires", total_slots - n_ready).yellow());
			break;
		}
		thread::sleep(Duration::from_millis(100));
	}
	let cache = ctx.fetch_manager.cache();
	println!("Cache: {} image(s), {} bytes; {} fetch failure(s)", cache.resident_count(), cache.total_size_bytes(), n_failed);
}

fn print_slot_tables(config_path: &str) {
	let config = resource_interface::load_prefetch_config(config_path).unwrap();
	for layer_config in &config.layers {
		let mut layer = TimeSeriesLayer::from_config(layer_config).unwrap();
		println!("Layer \"{}\"", layer.title);
		for slot in layer.build_slot_table() {
			println!("  {}  {}  {}", slot.key, slot.timestamp.to_rfc3339(), slot.data_path);
		}
	}
}
