//! For fetching image payloads from an HTTP image server

use std::time::Duration;
use reqwest;

use crate::prelude::*;
use super::ImageFetcher;

pub struct HttpImageFetcher {
	client: reqwest::blocking::Client
}

impl HttpImageFetcher {
	pub fn new(timeout: Duration) -> Self {
		Self {
			client: reqwest::blocking::Client::builder()
				.timeout(timeout)
				.build()
				.expect("Unable to build blocking HTTP client")
		}
	}
}

impl ImageFetcher for HttpImageFetcher {
	/// Runs on a worker thread, so blocking here is fine; the driving thread never waits on this
	fn fetch(&self, locator: &str) -> Result<Vec<u8>, String> {
		let response = to_string_err(self.client.get(locator).send())?;
		if !response.status().is_success() {
			return Err(format!("HTTP status {} for \"{}\"", response.status(), locator));
		}
		let raw_data: Vec<u8> = to_string_err(response.bytes())?.into_iter().collect();
		// Done
		Ok(raw_data)
	}
}
