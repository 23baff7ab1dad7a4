use std::rc::Rc;

use leptos::prelude::*;
use send_wrapper::SendWrapper;
use serde_json::json;

use crate::components::graph_panel::{GraphPanel, GraphUpdate};
use crate::config::PanelConfig;
use crate::graph::{GraphQuerySource, HttpQuerySource, RawGraph, StaticQuerySource};

const SAMPLE_CATEGORIES: &[&str] = &["Person", "Organization", "Document", "Topic", "Project"];
const SAMPLE_RELATIONSHIPS: &[&str] = &["WORKS_WITH", "MENTIONS", "PART_OF", "RELATED_TO"];

/// Sample graph served when no query endpoint is configured (random tree).
fn generate_sample_data(n: usize) -> RawGraph {
	let nodes = (0..n)
		.map(|i| {
			let category = SAMPLE_CATEGORIES[i % SAMPLE_CATEGORIES.len()];
			if i < 10 {
				json!({ "id": i.to_string(), "name": format!("{category} {i}"), "labels": [category] })
			} else {
				json!({ "id": i.to_string(), "labels": [category] })
			}
		})
		.collect();

	let relationships = (1..n)
		.map(|i| {
			let target = (rand_simple(i) * (i as f64)) as usize;
			json!({
				"fromId": i.to_string(),
				"toId": target.to_string(),
				"type": SAMPLE_RELATIONSHIPS[i % SAMPLE_RELATIONSHIPS.len()],
			})
		})
		.collect();

	RawGraph {
		nodes,
		relationships,
	}
}

/// Simple pseudo-random number generator (deterministic for consistency).
fn rand_simple(seed: usize) -> f64 {
	let x = ((seed + 1) * 9301 + 49297) % 233280;
	(x as f64) / 233280.0
}

fn query_source(config: &PanelConfig) -> Rc<dyn GraphQuerySource> {
	match &config.query_endpoint {
		Some(endpoint) => Rc::new(HttpQuerySource::new(endpoint.clone())),
		None => Rc::new(StaticQuerySource::new(generate_sample_data(200))),
	}
}

/// Default Home Page
#[component]
pub fn Home() -> impl IntoView {
	let config = PanelConfig::from_build_env();
	// Error boundary children must be Send.
	let source = SendWrapper::new(query_source(&config));

	let counts = RwSignal::new((0usize, 0usize));
	let selected = RwSignal::new(None::<String>);
	let on_graph_update = Callback::new(move |(nodes, edges): GraphUpdate| {
		counts.set((nodes.len(), edges.len()));
	});
	let on_node_click = Callback::new(move |id: String| selected.set(Some(id)));

	view! {
		<ErrorBoundary fallback=|errors| {
			view! {
				<h1>"Uh oh! Something went wrong!"</h1>

				<p>"Errors: "</p>
				<ul>
					{move || {
						errors
							.get()
							.into_iter()
							.map(|(_, e)| view! { <li>{e.to_string()}</li> })
							.collect_view()
					}}
				</ul>
			}
		}>

			<div class="fullscreen-graph">
				<GraphPanel
					source=source.take()
					config=config
					on_graph_update=on_graph_update
					on_node_click=on_node_click
					fullscreen=true
				/>
				<div class="graph-overlay">
					<h1>"Knowledge Graph"</h1>
					<p class="subtitle">
						{move || {
							let (nodes, edges) = counts.get();
							format!("{nodes} nodes, {edges} relationships")
						}}
					</p>
					<p class="selection">
						{move || match selected.get() {
							Some(id) => format!("Selected: {id}"),
							None => "Click a node to select it.".to_string(),
						}}
					</p>
				</div>
			</div>
		</ErrorBoundary>
	}
}
