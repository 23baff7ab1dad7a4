use knowledge_graph_canvas::{App, init_logging};
use leptos::mount::mount_to_body;
use leptos::prelude::*;

fn main() {
	init_logging();
	mount_to_body(|| {
		view! { <App /> }
	})
}
