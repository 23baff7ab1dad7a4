//! Query -> model -> canvas wiring with its controls.

use std::rc::Rc;

use leptos::prelude::*;
use leptos::task::spawn_local;
use send_wrapper::SendWrapper;

use super::force_graph::{ForceGraphCanvas, LifecycleSettings};
use crate::config::PanelConfig;
use crate::error::LifecycleInitError;
use crate::graph::{
	CanonicalEdge, CanonicalNode, GraphModel, GraphPanelController, GraphQuerySource, NodeLimit,
	Resolution,
};

/// Nodes and edges of a model that was just accepted.
pub type GraphUpdate = (Vec<CanonicalNode>, Vec<CanonicalEdge>);

#[derive(Clone, Debug, PartialEq)]
enum PanelView {
	Graph,
	Failed(String),
	RenderFailed(String),
}

/// Graph panel: queries `source`, renders the accepted model and reports
/// changes and node clicks to its owner.
#[component]
pub fn GraphPanel(
	source: Rc<dyn GraphQuerySource>,
	#[prop(default = PanelConfig::default())] config: PanelConfig,
	/// Called only when the model actually changed.
	#[prop(optional)]
	on_graph_update: Option<Callback<GraphUpdate>>,
	#[prop(optional)] on_node_click: Option<Callback<String>>,
	#[prop(default = false)] fullscreen: bool,
) -> impl IntoView {
	let initial = NodeLimit::new(config.default_node_limit).unwrap_or_default();
	let controller = Rc::new(GraphPanelController::new(source, initial));

	let model = RwSignal::new(None::<GraphModel>);
	let loading = RwSignal::new(false);
	let error = RwSignal::new(None::<String>);
	let render_error = RwSignal::new(None::<String>);
	let limit = RwSignal::new(initial.get());
	let refresh_requests = RwSignal::new(0u64);

	let apply = move |resolution: Resolution| {
		match resolution {
			Resolution::Stale => return,
			Resolution::Failed(err) => {
				// Keep the model: the canvas remounts from it once the error clears.
				error.set(Some(err.public_message().to_string()));
			}
			Resolution::Unchanged => {
				if error.get_untracked().is_some() {
					error.set(None);
				}
			}
			Resolution::Changed(next) => {
				if error.get_untracked().is_some() {
					error.set(None);
				}
				if let Some(cb) = on_graph_update {
					cb.run((next.nodes().to_vec(), next.edges().to_vec()));
				}
				model.set(Some(next));
			}
		}
		loading.set(false);
	};

	// Initial mount and every manual refresh
	let controller_refresh = controller.clone();
	Effect::new(move |_| {
		refresh_requests.track();
		let controller = controller_refresh.clone();
		loading.set(true);
		spawn_local(async move { apply(controller.refresh().await) });
	});

	let controller_limit = controller.clone();
	Effect::new(move |prev: Option<u32>| {
		let value = limit.get();
		if prev.is_some_and(|prev| prev != value) {
			if let Some(next) = NodeLimit::new(value) {
				let controller = controller_limit.clone();
				loading.set(true);
				spawn_local(async move { apply(controller.change_limit(next).await) });
			}
		}
		value
	});

	let cleanup = SendWrapper::new(controller);
	on_cleanup(move || cleanup.take().unmount());

	let view_mode = Memo::new(move |_| match (error.get(), render_error.get()) {
		(Some(message), _) => PanelView::Failed(message),
		(None, Some(message)) => PanelView::RenderFailed(message),
		(None, None) => PanelView::Graph,
	});

	let node_click = Callback::new(move |id: String| {
		if let Some(cb) = on_node_click {
			cb.run(id);
		}
	});
	let init_error = Callback::new(move |err: LifecycleInitError| {
		render_error.set(Some(err.to_string()));
	});
	let settings = LifecycleSettings::from(&config);
	let physics = config.physics.clone();
	let options = config
		.node_limits
		.iter()
		.map(|&n| view! { <option value={n.to_string()} selected={n == initial.get()}>{n}</option> })
		.collect_view();

	view! {
		<div class="graph-panel">
			<div class="graph-toolbar">
				<label>
					"Nodes "
					<select on:change=move |ev| {
						if let Ok(value) = event_target_value(&ev).parse::<u32>() {
							limit.set(value);
						}
					}>{options}</select>
				</label>
				<button
					on:click=move |_| refresh_requests.update(|n| *n += 1)
					disabled=move || loading.get()
				>
					"Refresh"
				</button>
				{move || loading.get().then(|| view! { <span class="graph-loading">"Loading…"</span> })}
			</div>
			{move || match view_mode.get() {
				PanelView::Graph => {
					view! {
						<ForceGraphCanvas
							model=model
							on_node_click=node_click
							on_init_error=init_error
							settings=settings
							physics=physics.clone()
							fullscreen=fullscreen
						/>
					}
						.into_any()
				}
				PanelView::Failed(message) => {
					view! {
						<div class="graph-error">
							<p>{message}</p>
							<button on:click=move |_| refresh_requests.update(|n| *n += 1)>
								"Retry"
							</button>
						</div>
					}
						.into_any()
				}
				PanelView::RenderFailed(message) => {
					view! {
						<div class="graph-error">
							<p>"The graph could not be displayed."</p>
							<p class="graph-error-detail">{message}</p>
							<button on:click=move |_| render_error.set(None)>"Retry"</button>
						</div>
					}
						.into_any()
				}
			}}
		</div>
	}
}
