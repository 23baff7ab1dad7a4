use std::cell::{Cell, RefCell};
use std::rc::Rc;

use leptos::prelude::*;
use send_wrapper::SendWrapper;
use wasm_bindgen::prelude::*;
use web_sys::{HtmlCanvasElement, MouseEvent, WheelEvent};

use super::engine::PointerInput;
use super::lifecycle::{LifecycleSettings, RenderLifecycle};
use super::render;
use super::surface::CanvasSurface;
use crate::config::PhysicsConfig;
use crate::error::LifecycleInitError;
use crate::graph::GraphModel;

type Lifecycle = Rc<RefCell<Option<RenderLifecycle<CanvasSurface>>>>;
type Frame = Rc<RefCell<Option<Closure<dyn FnMut()>>>>;

/// Canvas hosting the force layout for the current model.
///
/// Every model the signal yields rebuilds the layout from scratch; callers
/// are expected to only push models that actually changed.
#[component]
pub fn ForceGraphCanvas(
	#[prop(into)] model: Signal<Option<GraphModel>>,
	#[prop(optional)] on_node_click: Option<Callback<String>>,
	#[prop(optional)] on_init_error: Option<Callback<LifecycleInitError>>,
	#[prop(default = LifecycleSettings::default())] settings: LifecycleSettings,
	#[prop(default = PhysicsConfig::default())] physics: PhysicsConfig,
	#[prop(default = false)] fullscreen: bool,
	#[prop(default = None)] width: Option<f64>,
	#[prop(default = None)] height: Option<f64>,
) -> impl IntoView {
	let canvas_ref = NodeRef::<leptos::html::Canvas>::new();
	let lifecycle: Lifecycle = Rc::new(RefCell::new(None));
	let animate: Frame = Rc::new(RefCell::new(None));
	let frame_id = Rc::new(Cell::new(None::<i32>));
	let (lifecycle_init, animate_init, frame_init) =
		(lifecycle.clone(), animate.clone(), frame_id.clone());

	let report = move |err: LifecycleInitError| {
		if let Some(cb) = on_init_error {
			cb.run(err);
		}
	};

	Effect::new(move |_| {
		let model = model.get();
		let Some(canvas) = canvas_ref.get() else {
			return;
		};

		if lifecycle_init.borrow().is_none() {
			let canvas: HtmlCanvasElement = canvas.into();
			let surface =
				match CanvasSurface::new(canvas, fullscreen, width, height, physics.clone()) {
					Ok(surface) => Rc::new(surface),
					Err(err) => {
						log::error!("{err}");
						report(err);
						return;
					}
				};
			*lifecycle_init.borrow_mut() = Some(RenderLifecycle::new(
				surface.clone(),
				settings,
				move |id: &str| {
					if let Some(cb) = on_node_click {
						cb.run(id.to_string());
					}
				},
			));
			start_animation(
				lifecycle_init.clone(),
				surface,
				animate_init.clone(),
				frame_init.clone(),
			);
		}

		let Some(model) = model else {
			return;
		};
		let result = match lifecycle_init.borrow().as_ref() {
			Some(lifecycle) => lifecycle.initialize(&model),
			None => return,
		};
		if let Err(err) = result {
			report(err);
		}
	});

	let cleanup = SendWrapper::new((lifecycle.clone(), animate, frame_id));
	on_cleanup(move || {
		let (lifecycle, animate, frame_id) = cleanup.take();
		if let Some(id) = frame_id.take() {
			if let Some(window) = web_sys::window() {
				let _ = window.cancel_animation_frame(id);
			}
		}
		animate.borrow_mut().take();
		if let Some(lifecycle) = lifecycle.borrow_mut().take() {
			lifecycle.unmount();
		}
	});

	let position = move |ev: &MouseEvent| -> Option<(f64, f64)> {
		let canvas: HtmlCanvasElement = canvas_ref.get()?.into();
		let rect = canvas.get_bounding_client_rect();
		Some((
			ev.client_x() as f64 - rect.left(),
			ev.client_y() as f64 - rect.top(),
		))
	};
	let forward = {
		let lifecycle = lifecycle.clone();
		move |input: PointerInput| {
			if let Some(ref lifecycle) = *lifecycle.borrow() {
				lifecycle.pointer(input);
			}
		}
	};

	let forward_md = forward.clone();
	let on_mousedown = move |ev: MouseEvent| {
		if let Some((x, y)) = position(&ev) {
			forward_md(PointerInput::Down { x, y });
		}
	};
	let forward_mm = forward.clone();
	let on_mousemove = move |ev: MouseEvent| {
		if let Some((x, y)) = position(&ev) {
			forward_mm(PointerInput::Move { x, y });
		}
	};
	let forward_mu = forward.clone();
	let on_mouseup = move |_: MouseEvent| forward_mu(PointerInput::Up);
	let forward_ml = forward.clone();
	let on_mouseleave = move |_: MouseEvent| forward_ml(PointerInput::Leave);
	let on_wheel = move |ev: WheelEvent| {
		ev.prevent_default();
		if let Some((x, y)) = position(&ev) {
			forward(PointerInput::Wheel {
				x,
				y,
				delta_y: ev.delta_y(),
			});
		}
	};

	view! {
		<canvas
			node_ref=canvas_ref
			class="force-graph-canvas"
			on:mousedown=on_mousedown
			on:mousemove=on_mousemove
			on:mouseup=on_mouseup
			on:mouseleave=on_mouseleave
			on:wheel=on_wheel
			style="display: block; cursor: grab;"
		/>
	}
}

/// Drive ticks and drawing from `requestAnimationFrame` until cleanup.
fn start_animation(
	lifecycle: Lifecycle,
	surface: Rc<CanvasSurface>,
	animate: Frame,
	frame_id: Rc<Cell<Option<i32>>>,
) {
	let (animate_inner, frame_inner) = (animate.clone(), frame_id.clone());
	*animate.borrow_mut() = Some(Closure::new(move || {
		if let Some(ref lifecycle) = *lifecycle.borrow() {
			lifecycle.tick(0.016);
			lifecycle.with_engine(|engine| render::render(engine, surface.context()));
		}
		if let Some(ref cb) = *animate_inner.borrow() {
			frame_inner.set(
				web_sys::window()
					.and_then(|w| w.request_animation_frame(cb.as_ref().unchecked_ref()).ok()),
			);
		}
	}));
	if let Some(ref cb) = *animate.borrow() {
		frame_id.set(
			web_sys::window()
				.and_then(|w| w.request_animation_frame(cb.as_ref().unchecked_ref()).ok()),
		);
	}
}
