//! Browser canvas as a layout surface.

use std::time::Duration;

use wasm_bindgen::prelude::*;
use web_sys::{CanvasRenderingContext2d, HtmlCanvasElement, MouseEvent, Window};

use super::engine::{Subscription, Surface};
use super::state::ForceGraphState;
use super::types::EngineData;
use crate::config::PhysicsConfig;
use crate::error::{LifecycleInitError, TeardownError};

/// A `<canvas>` element plus the window it listens on.
pub struct CanvasSurface {
	canvas: HtmlCanvasElement,
	window: Window,
	ctx: CanvasRenderingContext2d,
	fullscreen: bool,
	width: Option<f64>,
	height: Option<f64>,
	physics: PhysicsConfig,
}

impl CanvasSurface {
	pub fn new(
		canvas: HtmlCanvasElement,
		fullscreen: bool,
		width: Option<f64>,
		height: Option<f64>,
		physics: PhysicsConfig,
	) -> Result<Self, LifecycleInitError> {
		let window = web_sys::window()
			.ok_or_else(|| LifecycleInitError::SurfaceUnavailable("no window".into()))?;
		let ctx = canvas
			.get_context("2d")
			.map_err(|e| LifecycleInitError::SurfaceUnavailable(format!("{:?}", e)))?
			.ok_or_else(|| LifecycleInitError::SurfaceUnavailable("no 2d context".into()))?
			.dyn_into::<CanvasRenderingContext2d>()
			.map_err(|_| LifecycleInitError::SurfaceUnavailable("not a 2d context".into()))?;
		Ok(Self {
			canvas,
			window,
			ctx,
			fullscreen,
			width,
			height,
			physics,
		})
	}

	pub fn context(&self) -> &CanvasRenderingContext2d {
		&self.ctx
	}

	fn window_size(&self) -> (f64, f64) {
		let dim = |v: Result<JsValue, JsValue>| v.ok().and_then(|v| v.as_f64()).unwrap_or(0.0);
		(
			dim(self.window.inner_width()),
			dim(self.window.inner_height()),
		)
	}
}

impl Surface for CanvasSurface {
	type Engine = ForceGraphState;

	fn measure(&self) -> (f64, f64) {
		let (w, h) = if self.fullscreen {
			self.window_size()
		} else {
			(
				self.width.unwrap_or_else(|| {
					self.canvas
						.parent_element()
						.map(|p| p.client_width() as f64)
						.unwrap_or(800.0)
				}),
				self.height.unwrap_or_else(|| {
					self.canvas
						.parent_element()
						.map(|p| p.client_height() as f64)
						.unwrap_or(600.0)
				}),
			)
		};
		self.canvas.set_width(w as u32);
		self.canvas.set_height(h as u32);
		(w, h)
	}

	fn create_engine(&self, data: &EngineData) -> Result<ForceGraphState, LifecycleInitError> {
		let (w, h) = self.measure();
		if w < 1.0 || h < 1.0 {
			return Err(LifecycleInitError::SurfaceUnavailable(format!(
				"canvas is {w}x{h}"
			)));
		}
		Ok(ForceGraphState::new(data, w, h, &self.physics))
	}

	fn on_resize(&self, handler: Box<dyn FnMut()>) -> Result<Subscription, LifecycleInitError> {
		let mut handler = handler;
		let cb = Closure::<dyn FnMut()>::new(move || handler());
		self.window
			.add_event_listener_with_callback("resize", cb.as_ref().unchecked_ref())
			.map_err(|_| LifecycleInitError::Listener("resize"))?;
		let window = self.window.clone();
		Ok(Subscription::new("resize listener", move || {
			window
				.remove_event_listener_with_callback("resize", cb.as_ref().unchecked_ref())
				.map_err(|e| TeardownError::new("resize listener", format!("{:?}", e)))
		}))
	}

	fn on_click(
		&self,
		handler: Box<dyn FnMut(f64, f64)>,
	) -> Result<Subscription, LifecycleInitError> {
		let mut handler = handler;
		let canvas = self.canvas.clone();
		let cb = Closure::<dyn FnMut(MouseEvent)>::new(move |ev: MouseEvent| {
			let rect = canvas.get_bounding_client_rect();
			handler(
				ev.client_x() as f64 - rect.left(),
				ev.client_y() as f64 - rect.top(),
			);
		});
		self.canvas
			.add_event_listener_with_callback("click", cb.as_ref().unchecked_ref())
			.map_err(|_| LifecycleInitError::Listener("click"))?;
		let canvas = self.canvas.clone();
		Ok(Subscription::new("click listener", move || {
			canvas
				.remove_event_listener_with_callback("click", cb.as_ref().unchecked_ref())
				.map_err(|e| TeardownError::new("click listener", format!("{:?}", e)))
		}))
	}

	fn set_timeout(
		&self,
		delay: Duration,
		callback: Box<dyn FnOnce()>,
	) -> Result<Subscription, LifecycleInitError> {
		let cb = Closure::once(move || callback());
		let handle = self
			.window
			.set_timeout_with_callback_and_timeout_and_arguments_0(
				cb.as_ref().unchecked_ref(),
				delay.as_millis().min(i32::MAX as u128) as i32,
			)
			.map_err(|_| LifecycleInitError::Listener("stabilization timeout"))?;
		let window = self.window.clone();
		// Clearing an already-fired handle is a no-op.
		Ok(Subscription::new("stabilization timeout", move || {
			window.clear_timeout_with_handle(handle);
			drop(cb);
			Ok(())
		}))
	}
}
