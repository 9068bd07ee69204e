//! The time-series layer itself: owns one slot table and display parameters, resolves the current
//! time to a slot, and hands ready images to the external renderer. All the shared fetch state
//! lives in `RenderContext` so several layers can share one cache.
//! Created 2025-3-18

use image::RgbaImage;

use crate::prelude::*;
use crate::resource_interface::LayerConfig;

/// Layer-level display parameters handed to the renderer with every image
#[derive(Clone, Copy, PartialEq, Debug)]
pub struct DrawParams {
	/// In [0, 1], clamped on construction
	pub opacity: Float,
	pub detail_control: Option<Float>
}

impl DrawParams {
	pub fn new(opacity: Float, detail_control: Option<Float>) -> Self {
		Self {
			opacity: opacity.clamp(0.0, 1.0),
			detail_control
		}
	}
}

impl Default for DrawParams {
	fn default() -> Self {
		Self {
			opacity: 1.0,
			detail_control: None
		}
	}
}

/// Everything the external draw routine needs for one frame of one layer
pub struct DrawCommand<'a> {
	pub image: &'a RgbaImage,
	pub params: DrawParams,
	/// Slot key of the image being drawn
	pub key: &'a str
}

/// The external renderer. This crate decides WHAT to draw; scene graph and GPU calls stay on the
/// other side of this trait.
pub trait GlobeRenderer {
	fn draw_layer(&mut self, command: DrawCommand);
}

/// Fire-and-forget redraw-request signal, invoked once per unsuppressed fetch success
pub trait RedrawNotifier {
	fn request_redraw(&mut self);
}

/// Process-wide shared state: the fetch manager (cache + absent tracker + in-flight set) and the
/// optional redraw notifier. Conceptually owned by the rendering context; layers only borrow it.
pub struct RenderContext {
	pub fetch_manager: ImageFetchManager,
	notifier: Option<Box<dyn RedrawNotifier>>
}

impl RenderContext {
	pub fn new(fetch_manager: ImageFetchManager) -> Self {
		Self {
			fetch_manager,
			notifier: None
		}
	}
	pub fn set_redraw_notifier(&mut self, notifier: Box<dyn RedrawNotifier>) {
		self.notifier = Some(notifier);
	}
	/// Polls fetch completions and fires the redraw signal for each unsuppressed success. Call once
	/// per host frame.
	pub fn update(&mut self) -> Vec<FetchEvent> {
		let events = self.fetch_manager.update();
		for event in &events {
			if let FetchEvent::Ready{notify: true, ..} = event {
				if let Some(notifier) = &mut self.notifier {
					notifier.request_redraw();
				}
			}
		}
		events
	}
}

/// One logical layer displaying a temporal sequence of full-globe images, the displayed image
/// selected by the current timestamp
pub struct TimeSeriesLayer {
	pub title: String,
	base_path: String,
	sequence: PeriodicTimeSequence,
	index: TimeSlotIndex,
	current_time: Timestamp,
	params: DrawParams,
	/// When set, even this layer's on-demand render fetches skip the redraw signal
	suppress_redraw: bool
}

impl TimeSeriesLayer {
	pub fn new(title: &str, base_path: &str, sequence: PeriodicTimeSequence, params: DrawParams) -> Self {
		Self {
			title: title.to_owned(),
			base_path: base_path.to_owned(),
			current_time: sequence.start(),
			sequence,
			index: TimeSlotIndex::new(),
			params,
			suppress_redraw: false
		}
	}
	/// Fails with `MissingContext` when a required field is absent and `InvalidRange` when the
	/// sequence spec is bad, both before any fetch state exists
	pub fn from_config(config: &LayerConfig) -> Result<Self, LayerError> {
		let title = config.title.as_ref().ok_or(LayerError::MissingContext("layer `title`".to_owned()))?;
		let base_path = config.base_path.as_ref().ok_or(LayerError::MissingContext("layer `base_path`".to_owned()))?;
		let spec = config.sequence.as_ref().ok_or(LayerError::MissingContext("layer `sequence`".to_owned()))?;
		let sequence = PeriodicTimeSequence::from_spec(spec)?;
		let mut out = Self::new(title, base_path, sequence, DrawParams::new(config.opacity, config.detail_control));
		out.suppress_redraw = config.suppress_redraw;
		// Done
		Ok(out)
	}
	/// `build` is idempotent, so calling this on every operation is cheap
	fn ensure_index(&mut self) {
		self.index.build(&mut self.sequence, &self.base_path);
	}
	/// Issues a fetch for every slot, in suppress-notify mode so bulk completion doesn't spam the
	/// redraw signal. Never blocks; this only guarantees fetches have been ISSUED, not completed.
	pub fn pre_populate(&mut self, ctx: &mut RenderContext) {
		self.ensure_index();
		for slot in self.index.slots() {
			ctx.fetch_manager.ensure_fetch_started(&slot.data_path, &slot.data_path, NotifyMode::Suppress);
		}
	}
	/// True iff every slot's image is resident. Returns false before the slot table exists so a
	/// poller can never observe "complete" ahead of `pre_populate()`. Pure query.
	pub fn is_pre_populated(&self, ctx: &RenderContext) -> bool {
		if self.index.is_empty() {
			return false;
		}
		self.index.slots().iter().all(|slot| ctx.fetch_manager.is_ready(&slot.data_path))
	}
	pub fn set_time(&mut self, time: Timestamp) {
		self.current_time = time;
	}
	pub fn current_time(&self) -> Timestamp {
		self.current_time
	}
	pub fn params(&self) -> DrawParams {
		self.params
	}
	pub fn slot_count(&self) -> usize {
		self.index.len()
	}
	/// Builds the slot table if needed and returns it (for display/debugging)
	pub fn build_slot_table(&mut self) -> &[Slot] {
		self.ensure_index();
		self.index.slots()
	}
	/// Renders the frame for `query`: resolves the nearest slot, lazily starts its fetch if it was
	/// never pre-populated (on-demand fetches DO notify unless the layer is configured otherwise),
	/// and hands the image to the renderer when it is ready. Returns whether anything was drawn;
	/// a not-yet-ready image just skips the frame, it is not an error.
	pub fn render(&mut self, query: Timestamp, ctx: &mut RenderContext, renderer: &mut dyn GlobeRenderer) -> Result<bool, LayerError> {
		self.set_time(query);
		self.render_current(ctx, renderer)
	}
	pub fn render_current(&mut self, ctx: &mut RenderContext, renderer: &mut dyn GlobeRenderer) -> Result<bool, LayerError> {
		self.ensure_index();
		let slot = self.index.nearest(self.current_time)?;
		let notify = if self.suppress_redraw {
			NotifyMode::Suppress
		}
		else {
			NotifyMode::Notify
		};
		ctx.fetch_manager.ensure_fetch_started(&slot.data_path, &slot.data_path, notify);
		match ctx.fetch_manager.cache().get(&slot.data_path) {
			Some(cached) => {
				renderer.draw_layer(DrawCommand {
					image: &cached.image,
					params: self.params,
					key: &slot.key
				});
				Ok(true)
			},
			None => Ok(false)
		}
	}
}
