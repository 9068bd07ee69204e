//! For loading & saving resources (layer configuration files)

use std::{error::Error, fs, time::Duration as StdDuration};
use std::io::Error as IoError;
use chrono::Duration;
use serde::{Serialize, Deserialize};
use serde_json;

use crate::prelude::*;
use crate::timeline::sequence::SequenceSpec;

// STATICS
pub static LAYER_CONFIGS_FILE: &str = "resources/layers.json";

fn default_opacity() -> Float {
	1.0
}

fn default_cool_down_secs() -> Float {
	60.0
}

fn default_fetch_timeout_secs() -> Float {
	30.0
}

/// One layer entry in a config file. Required fields are `Option` so a missing one surfaces as a
/// descriptive `MissingContext` from `TimeSeriesLayer::from_config` instead of a serde type error.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct LayerConfig {
	pub title: Option<String>,
	/// Prefix for per-slot data paths: `base_path + key + ".png"`. May be a URL or directory path.
	pub base_path: Option<String>,
	pub sequence: Option<SequenceSpec>,
	#[serde(default = "default_opacity")]
	pub opacity: Float,
	#[serde(default)]
	pub detail_control: Option<Float>,
	#[serde(default)]
	pub suppress_redraw: bool
}

/// Whole config file: process-wide fetch settings plus the layer list
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct PrefetchConfig {
	#[serde(default = "default_cool_down_secs")]
	pub cool_down_secs: Float,
	#[serde(default = "default_fetch_timeout_secs")]
	pub fetch_timeout_secs: Float,
	pub layers: Vec<LayerConfig>
}

impl PrefetchConfig {
	pub fn cool_down(&self) -> Duration {
		Duration::milliseconds((self.cool_down_secs * 1000.0) as i64)
	}
	pub fn fetch_timeout(&self) -> StdDuration {
		StdDuration::from_secs_f32(self.fetch_timeout_secs)
	}
}

// Load
pub fn load_prefetch_config(path: &str) -> Result<PrefetchConfig, Box<dyn Error>> {
	let raw_string: String = load_file_with_better_error(path)?;
	let config: PrefetchConfig = serde_json::from_str(&raw_string)?;
	Ok(config)
}

pub fn load_prefetch_config_str(raw_string: &str) -> Result<PrefetchConfig, Box<dyn Error>> {
	let config: PrefetchConfig = serde_json::from_str(raw_string)?;
	Ok(config)
}

// Save
/// Writes an example config to start from
pub fn save_starter_config(path: &str) -> Result<(), Box<dyn Error>> {
	let config = PrefetchConfig {
		cool_down_secs: default_cool_down_secs(),
		fetch_timeout_secs: default_fetch_timeout_secs(),
		layers: vec![LayerConfig {
			title: Some("Weather composite".to_owned()),
			base_path: Some("https://example.com/weather/".to_owned()),
			sequence: Some(SequenceSpec {
				start: "2016-07-12T00:00".to_owned(),
				end: "2016-07-18T00:00".to_owned(),
				interval: "PT3H".to_owned()
			}),
			opacity: default_opacity(),
			detail_control: None,
			suppress_redraw: false
		}]
	};
	let raw_string = serde_json::to_string_pretty(&config)?;
	fs::write(path, &raw_string)?;
	Ok(())
}

// Misc
pub fn load_file_with_better_error(path: &str) -> Result<String, Box<dyn Error>> {
	match fs::read_to_string(path) {
		Ok(contents) => Ok(contents),
		Err(err) => {
			// Combine the error with the path information
			Err(Box::new(IoError::new(err.kind(), format!("Error reading file '{}': {}", path, err))))
		}
	}
}
