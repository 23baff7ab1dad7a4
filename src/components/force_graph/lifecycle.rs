//! Layout engine lifecycle on one display surface.
//!
//! `Uninitialized -> Initializing -> Stabilizing -> Interactive -> Destroyed`.
//! A new model always tears the current engine down and creates a fresh one
//! on the same surface. Stabilization ends on whichever of the engine's own
//! signal or the backstop timeout arrives first.

use std::cell::RefCell;
use std::rc::{Rc, Weak};
use std::time::Duration;

use log::{debug, error, warn};

use super::engine::{LayoutEngine, PointerInput, StepOutcome, Subscription, Surface};
use super::types::EngineData;
use crate::config::PanelConfig;
use crate::error::{LifecycleInitError, TeardownError};
use crate::graph::GraphModel;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LifecycleState {
	Uninitialized,
	Initializing,
	Stabilizing,
	Interactive,
	Destroyed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum SettleTrigger {
	Engine,
	Timeout,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LifecycleSettings {
	pub stabilization_timeout: Duration,
	pub fit_animation: Duration,
}

impl Default for LifecycleSettings {
	fn default() -> Self {
		Self::from(&PanelConfig::default())
	}
}

impl From<&PanelConfig> for LifecycleSettings {
	fn from(config: &PanelConfig) -> Self {
		Self {
			stabilization_timeout: config.stabilization_timeout(),
			fit_animation: config.fit_animation(),
		}
	}
}

/// Armed once per engine instance; taking it is what ends stabilization.
#[derive(Debug)]
struct SettleGuard {
	epoch: u64,
}

type NodeClickHandler = Rc<dyn Fn(&str)>;

struct Inner<E> {
	state: LifecycleState,
	engine: Option<E>,
	listeners: Vec<Subscription>,
	timeout: Option<Subscription>,
	guard: Option<SettleGuard>,
	epoch: u64,
	detached: bool,
	settings: LifecycleSettings,
	on_node_click: NodeClickHandler,
}

impl<E: LayoutEngine> Inner<E> {
	fn transition(&mut self, to: LifecycleState) {
		debug!("render lifecycle {:?} -> {:?}", self.state, to);
		self.state = to;
	}

	fn settle(&mut self, epoch: u64, trigger: SettleTrigger) -> bool {
		if !self.guard.as_ref().is_some_and(|guard| guard.epoch == epoch) {
			return false;
		}
		self.guard = None;
		// A fired timeout is still on the stack; teardown releases it.
		if trigger == SettleTrigger::Engine {
			if let Some(timeout) = self.timeout.take() {
				if let Err(err) = timeout.release() {
					warn!("{err}");
				}
			}
		}
		let Some(engine) = self.engine.as_mut() else {
			return false;
		};
		engine.set_physics(false);
		engine.fit(self.settings.fit_animation);
		debug!("layout settled by {trigger:?}");
		self.transition(LifecycleState::Interactive);
		true
	}

	fn refit(&mut self, size: (f64, f64)) {
		let fit_animation = self.settings.fit_animation;
		if let Some(engine) = self.engine.as_mut() {
			engine.resize(size.0, size.1);
			engine.fit(fit_animation);
		}
	}

	/// Best effort: every step runs even when an earlier one fails.
	fn teardown(&mut self) -> Vec<TeardownError> {
		let mut failures = Vec::new();
		self.guard = None;
		if let Some(timeout) = self.timeout.take() {
			failures.extend(timeout.release().err());
		}
		for listener in self.listeners.drain(..) {
			failures.extend(listener.release().err());
		}
		if let Some(mut engine) = self.engine.take() {
			failures.extend(engine.destroy().err());
		}
		for failure in &failures {
			warn!("{failure}");
		}
		if self.state != LifecycleState::Destroyed {
			self.transition(LifecycleState::Destroyed);
		}
		failures
	}
}

/// Exclusive owner of the layout engine bound to a surface.
pub struct RenderLifecycle<S: Surface> {
	surface: Rc<S>,
	inner: Rc<RefCell<Inner<S::Engine>>>,
}

impl<S> RenderLifecycle<S>
where
	S: Surface + 'static,
	S::Engine: 'static,
{
	pub fn new(
		surface: Rc<S>,
		settings: LifecycleSettings,
		on_node_click: impl Fn(&str) + 'static,
	) -> Self {
		Self {
			surface,
			inner: Rc::new(RefCell::new(Inner {
				state: LifecycleState::Uninitialized,
				engine: None,
				listeners: Vec::new(),
				timeout: None,
				guard: None,
				epoch: 0,
				detached: false,
				settings,
				on_node_click: Rc::new(on_node_click),
			})),
		}
	}

	pub fn state(&self) -> LifecycleState {
		self.inner.borrow().state
	}

	/// Tear down whatever is running and start a fresh engine for `model`.
	pub fn initialize(&self, model: &GraphModel) -> Result<(), LifecycleInitError> {
		{
			let mut inner = self.inner.borrow_mut();
			if inner.detached {
				return Err(LifecycleInitError::SurfaceDetached);
			}
			if inner.state != LifecycleState::Uninitialized {
				inner.teardown();
			}
			inner.transition(LifecycleState::Initializing);
		}

		if let Err(err) = self.start(model) {
			error!("render lifecycle failed to initialize: {err}");
			self.inner.borrow_mut().teardown();
			return Err(err);
		}
		Ok(())
	}

	fn start(&self, model: &GraphModel) -> Result<(), LifecycleInitError> {
		let data = EngineData::from(model);
		let mut engine = self.surface.create_engine(&data)?;
		engine.set_physics(true);

		let epoch = {
			let mut inner = self.inner.borrow_mut();
			inner.epoch += 1;
			inner.engine = Some(engine);
			inner.epoch
		};

		let resize = self.surface.on_resize(self.resize_handler())?;
		self.inner.borrow_mut().listeners.push(resize);
		let click = self.surface.on_click(self.click_handler())?;
		self.inner.borrow_mut().listeners.push(click);

		let weak = Rc::downgrade(&self.inner);
		let delay = self.inner.borrow().settings.stabilization_timeout;
		let timeout = self.surface.set_timeout(
			delay,
			Box::new(move || {
				if let Some(inner) = weak.upgrade() {
					inner.borrow_mut().settle(epoch, SettleTrigger::Timeout);
				}
			}),
		)?;

		let mut inner = self.inner.borrow_mut();
		inner.timeout = Some(timeout);
		inner.guard = Some(SettleGuard { epoch });
		inner.transition(LifecycleState::Stabilizing);
		Ok(())
	}

	fn resize_handler(&self) -> Box<dyn FnMut()> {
		let (inner, surface) = (Rc::downgrade(&self.inner), Rc::downgrade(&self.surface));
		Box::new(move || {
			if let (Some(inner), Some(surface)) = (inner.upgrade(), surface.upgrade()) {
				let size = surface.measure();
				inner.borrow_mut().refit(size);
			}
		})
	}

	fn click_handler(&self) -> Box<dyn FnMut(f64, f64)> {
		let inner: Weak<RefCell<Inner<S::Engine>>> = Rc::downgrade(&self.inner);
		Box::new(move |x, y| {
			let Some(inner) = inner.upgrade() else {
				return;
			};
			let hit = {
				let inner = inner.borrow();
				if inner.state != LifecycleState::Interactive {
					return;
				}
				let id = inner
					.engine
					.as_ref()
					.filter(|engine| !engine.click_suppressed())
					.and_then(|engine| engine.node_at(x, y));
				id.map(|id| (id, inner.on_node_click.clone()))
			};
			// Notify outside the borrow; the owner may call back in.
			if let Some((id, notify)) = hit {
				notify(&id);
			}
		})
	}

	/// Advance one frame. An engine stabilization signal settles the layout.
	pub fn tick(&self, dt: f32) {
		let mut inner = self.inner.borrow_mut();
		let epoch = inner.epoch;
		let Some(engine) = inner.engine.as_mut() else {
			return;
		};
		if engine.step(dt) == StepOutcome::Stabilized && inner.state == LifecycleState::Stabilizing {
			inner.settle(epoch, SettleTrigger::Engine);
		}
	}

	/// Pointer navigation; ignored once destroyed.
	pub fn pointer(&self, input: PointerInput) {
		if self.state() == LifecycleState::Destroyed {
			return;
		}
		if let Some(engine) = self.inner.borrow_mut().engine.as_mut() {
			engine.pointer(input);
		}
	}

	/// Read-only access for drawing.
	pub fn with_engine<R>(&self, f: impl FnOnce(&S::Engine) -> R) -> Option<R> {
		self.inner.borrow().engine.as_ref().map(f)
	}

	/// Tear down the current engine. The surface can host a new one.
	pub fn destroy(&self) -> Vec<TeardownError> {
		self.inner.borrow_mut().teardown()
	}

	/// The surface is gone: tear down and refuse further initialization.
	pub fn unmount(&self) -> Vec<TeardownError> {
		self.inner.borrow_mut().detached = true;
		self.destroy()
	}
}

#[cfg(test)]
mod tests {
	use std::cell::{Cell, RefCell};

	use serde_json::json;

	use super::*;
	use crate::graph::{NodeId, build};

	#[derive(Default)]
	struct Recorder {
		fits: Cell<u32>,
		physics: Cell<bool>,
		destroyed: Cell<u32>,
		created: Cell<u32>,
		resize_listeners: Cell<i32>,
		click_listeners: Cell<i32>,
		timeouts_cleared: Cell<u32>,
		fail_create: Cell<bool>,
		fail_destroy: Cell<bool>,
		fail_listener_release: Cell<bool>,
		suppress_click: Cell<bool>,
		stabilize_after: Cell<Option<u32>>,
	}

	struct FakeEngine {
		recorder: Rc<Recorder>,
		steps: u32,
		nodes: Vec<NodeId>,
	}

	impl LayoutEngine for FakeEngine {
		fn step(&mut self, _dt: f32) -> StepOutcome {
			if !self.recorder.physics.get() {
				return StepOutcome::Frozen;
			}
			self.steps += 1;
			match self.recorder.stabilize_after.get() {
				Some(n) if self.steps >= n => StepOutcome::Stabilized,
				_ => StepOutcome::Settling,
			}
		}

		fn set_physics(&mut self, enabled: bool) {
			self.recorder.physics.set(enabled);
		}

		fn fit(&mut self, _animation: Duration) {
			self.recorder.fits.set(self.recorder.fits.get() + 1);
		}

		fn resize(&mut self, _width: f64, _height: f64) {}

		// Node n sits at (n * 10, 0).
		fn node_at(&self, x: f64, _y: f64) -> Option<NodeId> {
			self.nodes.get((x / 10.0) as usize).cloned()
		}

		fn pointer(&mut self, _input: PointerInput) {}

		fn click_suppressed(&self) -> bool {
			self.recorder.suppress_click.get()
		}

		fn destroy(&mut self) -> Result<(), TeardownError> {
			self.recorder.destroyed.set(self.recorder.destroyed.get() + 1);
			if self.recorder.fail_destroy.get() {
				return Err(TeardownError::new("layout engine", "already released"));
			}
			Ok(())
		}
	}

	#[derive(Default)]
	struct FakeSurface {
		recorder: Rc<Recorder>,
		resize: RefCell<Option<Box<dyn FnMut()>>>,
		click: RefCell<Option<Box<dyn FnMut(f64, f64)>>>,
		timeouts: RefCell<Vec<(Duration, Box<dyn FnOnce()>)>>,
	}

	impl FakeSurface {
		fn fire_resize(&self) {
			let handler = self.resize.borrow_mut().take();
			if let Some(mut handler) = handler {
				handler();
				*self.resize.borrow_mut() = Some(handler);
			}
		}

		fn fire_click(&self, x: f64) {
			let handler = self.click.borrow_mut().take();
			if let Some(mut handler) = handler {
				handler(x, 0.0);
				*self.click.borrow_mut() = Some(handler);
			}
		}

		fn fire_timeouts(&self) {
			let pending: Vec<_> = self.timeouts.borrow_mut().drain(..).collect();
			for (_, callback) in pending {
				callback();
			}
		}
	}

	impl Surface for FakeSurface {
		type Engine = FakeEngine;

		fn measure(&self) -> (f64, f64) {
			(800.0, 600.0)
		}

		fn create_engine(&self, data: &EngineData) -> Result<FakeEngine, LifecycleInitError> {
			if self.recorder.fail_create.get() {
				return Err(LifecycleInitError::SurfaceUnavailable("zero-sized canvas".into()));
			}
			self.recorder.created.set(self.recorder.created.get() + 1);
			Ok(FakeEngine {
				recorder: self.recorder.clone(),
				steps: 0,
				nodes: data.nodes.iter().map(|n| n.id.clone()).collect(),
			})
		}

		fn on_resize(&self, handler: Box<dyn FnMut()>) -> Result<Subscription, LifecycleInitError> {
			*self.resize.borrow_mut() = Some(handler);
			let recorder = self.recorder.clone();
			recorder.resize_listeners.set(recorder.resize_listeners.get() + 1);
			Ok(Subscription::new("resize listener", move || {
				recorder.resize_listeners.set(recorder.resize_listeners.get() - 1);
				if recorder.fail_listener_release.get() {
					return Err(TeardownError::new("resize listener", "not registered"));
				}
				Ok(())
			}))
		}

		fn on_click(
			&self,
			handler: Box<dyn FnMut(f64, f64)>,
		) -> Result<Subscription, LifecycleInitError> {
			*self.click.borrow_mut() = Some(handler);
			let recorder = self.recorder.clone();
			recorder.click_listeners.set(recorder.click_listeners.get() + 1);
			Ok(Subscription::new("click listener", move || {
				recorder.click_listeners.set(recorder.click_listeners.get() - 1);
				Ok(())
			}))
		}

		fn set_timeout(
			&self,
			delay: Duration,
			callback: Box<dyn FnOnce()>,
		) -> Result<Subscription, LifecycleInitError> {
			self.timeouts.borrow_mut().push((delay, callback));
			let recorder = self.recorder.clone();
			Ok(Subscription::new("stabilization timeout", move || {
				recorder.timeouts_cleared.set(recorder.timeouts_cleared.get() + 1);
				Ok(())
			}))
		}
	}

	fn model() -> GraphModel {
		build(
			&[
				json!({"id": "a", "name": "Ada", "labels": ["Person"]}),
				json!({"id": "b", "name": "Babbage", "labels": ["Person"]}),
			],
			&[json!({"fromId": "a", "toId": "b", "type": "WORKS_WITH"})],
		)
	}

	fn setup() -> (Rc<FakeSurface>, Rc<RefCell<Vec<String>>>, RenderLifecycle<FakeSurface>) {
		let surface = Rc::new(FakeSurface::default());
		let clicks = Rc::new(RefCell::new(Vec::new()));
		let sink = clicks.clone();
		let lifecycle = RenderLifecycle::new(
			surface.clone(),
			LifecycleSettings::default(),
			move |id: &str| sink.borrow_mut().push(id.to_string()),
		);
		(surface, clicks, lifecycle)
	}

	#[test]
	fn initialize_starts_stabilizing_with_physics() {
		let (surface, _, lifecycle) = setup();
		assert_eq!(lifecycle.state(), LifecycleState::Uninitialized);
		lifecycle.initialize(&model()).unwrap();
		assert_eq!(lifecycle.state(), LifecycleState::Stabilizing);
		assert!(surface.recorder.physics.get());
		let timeouts = surface.timeouts.borrow();
		assert_eq!(timeouts.len(), 1);
		assert_eq!(timeouts[0].0, Duration::from_secs(2));
	}

	#[test]
	fn timeout_settles_when_engine_never_signals() {
		let (surface, _, lifecycle) = setup();
		lifecycle.initialize(&model()).unwrap();
		for _ in 0..100 {
			lifecycle.tick(0.016);
		}
		assert_eq!(lifecycle.state(), LifecycleState::Stabilizing);

		surface.fire_timeouts();
		assert_eq!(lifecycle.state(), LifecycleState::Interactive);
		assert!(!surface.recorder.physics.get());
		assert_eq!(surface.recorder.fits.get(), 1);
	}

	#[test]
	fn fired_timeout_is_released_at_teardown() {
		let (surface, _, lifecycle) = setup();
		lifecycle.initialize(&model()).unwrap();
		surface.fire_timeouts();
		assert_eq!(lifecycle.state(), LifecycleState::Interactive);
		assert_eq!(surface.recorder.timeouts_cleared.get(), 0);

		assert!(lifecycle.destroy().is_empty());
		assert_eq!(surface.recorder.timeouts_cleared.get(), 1);
	}

	#[test]
	fn engine_signal_wins_and_late_timeout_is_ignored() {
		let (surface, _, lifecycle) = setup();
		surface.recorder.stabilize_after.set(Some(3));
		lifecycle.initialize(&model()).unwrap();
		for _ in 0..5 {
			lifecycle.tick(0.016);
		}
		assert_eq!(lifecycle.state(), LifecycleState::Interactive);
		assert_eq!(surface.recorder.timeouts_cleared.get(), 1);

		surface.fire_timeouts();
		assert_eq!(surface.recorder.fits.get(), 1);
		assert_eq!(lifecycle.state(), LifecycleState::Interactive);
	}

	#[test]
	fn clicks_notify_only_when_interactive_and_on_a_node() {
		let (surface, clicks, lifecycle) = setup();
		lifecycle.initialize(&model()).unwrap();
		surface.fire_click(15.0);
		assert!(clicks.borrow().is_empty());

		surface.fire_timeouts();
		surface.fire_click(15.0);
		surface.fire_click(500.0);
		assert_eq!(*clicks.borrow(), vec!["b".to_string()]);
	}

	#[test]
	fn click_after_a_drag_is_not_a_selection() {
		let (surface, clicks, lifecycle) = setup();
		lifecycle.initialize(&model()).unwrap();
		surface.fire_timeouts();

		surface.recorder.suppress_click.set(true);
		surface.fire_click(5.0);
		assert!(clicks.borrow().is_empty());

		surface.recorder.suppress_click.set(false);
		surface.fire_click(5.0);
		assert_eq!(*clicks.borrow(), vec!["a".to_string()]);
	}

	#[test]
	fn resize_refits_without_changing_state() {
		let (surface, _, lifecycle) = setup();
		lifecycle.initialize(&model()).unwrap();
		surface.fire_resize();
		assert_eq!(lifecycle.state(), LifecycleState::Stabilizing);
		assert_eq!(surface.recorder.fits.get(), 1);

		surface.fire_timeouts();
		surface.fire_resize();
		assert_eq!(lifecycle.state(), LifecycleState::Interactive);
		assert_eq!(surface.recorder.fits.get(), 3);
	}

	#[test]
	fn teardown_completes_even_if_engine_destroy_fails() {
		let (surface, _, lifecycle) = setup();
		surface.recorder.fail_destroy.set(true);
		lifecycle.initialize(&model()).unwrap();

		let failures = lifecycle.destroy();
		assert_eq!(failures.len(), 1);
		assert_eq!(failures[0].step, "layout engine");
		assert_eq!(lifecycle.state(), LifecycleState::Destroyed);
		assert_eq!(surface.recorder.resize_listeners.get(), 0);
		assert_eq!(surface.recorder.click_listeners.get(), 0);
		assert_eq!(surface.recorder.timeouts_cleared.get(), 1);
		assert!(lifecycle.with_engine(|_| ()).is_none());
	}

	#[test]
	fn teardown_destroys_engine_even_if_a_listener_release_fails() {
		let (surface, _, lifecycle) = setup();
		surface.recorder.fail_listener_release.set(true);
		lifecycle.initialize(&model()).unwrap();

		let failures = lifecycle.destroy();
		assert_eq!(failures.len(), 1);
		assert_eq!(failures[0].step, "resize listener");
		assert_eq!(surface.recorder.destroyed.get(), 1);
		assert_eq!(surface.recorder.click_listeners.get(), 0);
		assert_eq!(surface.recorder.timeouts_cleared.get(), 1);
		assert_eq!(lifecycle.state(), LifecycleState::Destroyed);
		assert!(lifecycle.with_engine(|_| ()).is_none());
	}

	#[test]
	fn new_model_tears_down_before_recreating() {
		let (surface, _, lifecycle) = setup();
		lifecycle.initialize(&model()).unwrap();
		surface.fire_timeouts();
		lifecycle.initialize(&model()).unwrap();

		assert_eq!(lifecycle.state(), LifecycleState::Stabilizing);
		assert_eq!(surface.recorder.created.get(), 2);
		assert_eq!(surface.recorder.destroyed.get(), 1);
		assert_eq!(surface.recorder.resize_listeners.get(), 1);
		assert_eq!(surface.recorder.click_listeners.get(), 1);
		assert!(surface.recorder.physics.get());
	}

	#[test]
	fn stale_timeout_from_previous_engine_is_ignored() {
		let (surface, _, lifecycle) = setup();
		lifecycle.initialize(&model()).unwrap();
		let stale: Vec<_> = surface.timeouts.borrow_mut().drain(..).collect();
		lifecycle.initialize(&model()).unwrap();

		for (_, callback) in stale {
			callback();
		}
		assert_eq!(lifecycle.state(), LifecycleState::Stabilizing);
		assert_eq!(surface.recorder.fits.get(), 0);
	}

	#[test]
	fn failed_creation_reports_and_stays_destroyed() {
		let (surface, _, lifecycle) = setup();
		surface.recorder.fail_create.set(true);
		let err = lifecycle.initialize(&model()).unwrap_err();
		assert!(matches!(err, LifecycleInitError::SurfaceUnavailable(_)));
		assert_eq!(lifecycle.state(), LifecycleState::Destroyed);
		assert_eq!(surface.recorder.resize_listeners.get(), 0);
		assert!(surface.timeouts.borrow().is_empty());
	}

	#[test]
	fn unmount_is_final() {
		let (surface, _, lifecycle) = setup();
		lifecycle.initialize(&model()).unwrap();
		assert!(lifecycle.unmount().is_empty());
		assert_eq!(lifecycle.state(), LifecycleState::Destroyed);
		assert_eq!(
			lifecycle.initialize(&model()),
			Err(LifecycleInitError::SurfaceDetached)
		);
		assert_eq!(surface.recorder.created.get(), 1);

		surface.fire_timeouts();
		assert_eq!(lifecycle.state(), LifecycleState::Destroyed);
	}
}
