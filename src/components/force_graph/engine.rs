//! Seams between the render lifecycle, the layout engine and the display
//! surface it draws into.

use std::time::Duration;

use log::warn;

use super::types::EngineData;
use crate::error::{LifecycleInitError, TeardownError};
use crate::graph::NodeId;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StepOutcome {
	/// Physics is running and positions are still moving.
	Settling,
	/// The simulation reports its positions have settled.
	Stabilized,
	/// Physics is off; only view animation advanced.
	Frozen,
}

/// Pointer input in surface coordinates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PointerInput {
	Down { x: f64, y: f64 },
	Move { x: f64, y: f64 },
	Up,
	Leave,
	Wheel { x: f64, y: f64, delta_y: f64 },
}

pub trait LayoutEngine {
	/// Advance the simulation and any view animation by `dt` seconds.
	fn step(&mut self, dt: f32) -> StepOutcome;
	fn set_physics(&mut self, enabled: bool);
	/// Fit the view to the node extents, animating over `animation`.
	fn fit(&mut self, animation: Duration);
	fn resize(&mut self, width: f64, height: f64);
	fn node_at(&self, x: f64, y: f64) -> Option<NodeId>;
	fn pointer(&mut self, input: PointerInput);
	/// True when the last press turned into a drag or pan, so the click that
	/// follows its release is not a selection.
	fn click_suppressed(&self) -> bool {
		false
	}
	fn destroy(&mut self) -> Result<(), TeardownError>;
}

/// A display region that can host one layout engine at a time.
pub trait Surface {
	type Engine: LayoutEngine;

	/// Current size, applied to the underlying region.
	fn measure(&self) -> (f64, f64);
	fn create_engine(&self, data: &EngineData) -> Result<Self::Engine, LifecycleInitError>;
	fn on_resize(&self, handler: Box<dyn FnMut()>) -> Result<Subscription, LifecycleInitError>;
	/// `handler` receives click positions in surface coordinates.
	fn on_click(
		&self,
		handler: Box<dyn FnMut(f64, f64)>,
	) -> Result<Subscription, LifecycleInitError>;
	fn set_timeout(
		&self,
		delay: Duration,
		callback: Box<dyn FnOnce()>,
	) -> Result<Subscription, LifecycleInitError>;
}

type Release = Box<dyn FnOnce() -> Result<(), TeardownError>>;

/// A registered listener or timer. Released on drop if not released
/// explicitly.
pub struct Subscription {
	name: &'static str,
	release: Option<Release>,
}

impl Subscription {
	pub fn new(
		name: &'static str,
		release: impl FnOnce() -> Result<(), TeardownError> + 'static,
	) -> Self {
		Self {
			name,
			release: Some(Box::new(release)),
		}
	}

	pub fn release(mut self) -> Result<(), TeardownError> {
		match self.release.take() {
			Some(release) => release(),
			None => Ok(()),
		}
	}
}

impl Drop for Subscription {
	fn drop(&mut self) {
		if let Some(release) = self.release.take() {
			if let Err(err) = release() {
				warn!("{} released on drop: {err}", self.name);
			}
		}
	}
}

impl std::fmt::Debug for Subscription {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Subscription")
			.field("name", &self.name)
			.field("active", &self.release.is_some())
			.finish()
	}
}
