//! Shared test fixtures: scripted fetchers, a recording renderer, and in-memory PNG payloads

use std::{sync::{Arc, atomic::{AtomicUsize, Ordering}}, thread, time::Duration, io::Cursor};
use crate::prelude::*;

mod timing;

/// Small valid PNG payload, encoded in memory
pub fn test_png_bytes() -> Vec<u8> {
	let image = image::RgbaImage::from_pixel(2, 2, image::Rgba([0, 128, 255, 255]));
	let mut bytes = Vec::<u8>::new();
	image::DynamicImage::ImageRgba8(image)
		.write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
		.unwrap();
	bytes
}

/// Bytes of the decoded 2x2 RGBA test image
pub const TEST_IMAGE_SIZE_BYTES: UInt = 2 * 2 * 4;

pub fn ts(s: &str) -> Timestamp {
	parse_timestamp(s).unwrap()
}

/// Counts calls and answers each locator with whatever the script says, after an optional delay
pub struct ScriptedFetcher {
	calls: AtomicUsize,
	delay: Duration,
	script: Box<dyn Fn(&str) -> Result<Vec<u8>, String> + Send + Sync>
}

impl ScriptedFetcher {
	pub fn new<F: Fn(&str) -> Result<Vec<u8>, String> + Send + Sync + 'static>(delay: Duration, script: F) -> Arc<Self> {
		Arc::new(Self {
			calls: AtomicUsize::new(0),
			delay,
			script: Box::new(script)
		})
	}
	/// Succeeds immediately with a valid PNG for every locator
	pub fn ok() -> Arc<Self> {
		Self::new(Duration::ZERO, |_| Ok(test_png_bytes()))
	}
	pub fn call_count(&self) -> usize {
		self.calls.load(Ordering::SeqCst)
	}
}

impl ImageFetcher for ScriptedFetcher {
	fn fetch(&self, locator: &str) -> Result<Vec<u8>, String> {
		self.calls.fetch_add(1, Ordering::SeqCst);
		if self.delay > Duration::ZERO {
			thread::sleep(self.delay);
		}
		(self.script)(locator)
	}
}

/// Polls the manager until nothing is left in flight, collecting every event on the way
pub fn drain_manager(manager: &mut ImageFetchManager) -> Vec<FetchEvent> {
	let mut events = Vec::<FetchEvent>::new();
	while manager.in_flight_count() > 0 {
		events.extend(manager.update());
		thread::sleep(Duration::from_millis(5));
	}
	events
}

pub fn drain_ctx(ctx: &mut RenderContext) -> Vec<FetchEvent> {
	let mut events = Vec::<FetchEvent>::new();
	while ctx.fetch_manager.in_flight_count() > 0 {
		events.extend(ctx.update());
		thread::sleep(Duration::from_millis(5));
	}
	events
}

/// Records every draw handoff instead of touching a GPU
#[derive(Default)]
pub struct TestRenderer {
	/// (slot key, opacity) per draw
	pub drawn: Vec<(String, Float)>
}

impl GlobeRenderer for TestRenderer {
	fn draw_layer(&mut self, command: DrawCommand) {
		self.drawn.push((command.key.to_owned(), command.params.opacity));
	}
}

pub struct CountingNotifier {
	pub redraws: Arc<AtomicUsize>
}

impl RedrawNotifier for CountingNotifier {
	fn request_redraw(&mut self) {
		self.redraws.fetch_add(1, Ordering::SeqCst);
	}
}
