use crate::graph::GraphModel;

/// Canonical size to on-canvas radius.
const RADIUS_PER_SIZE: f64 = 0.3;

#[derive(Clone, Debug, PartialEq)]
pub struct EngineNode {
	pub id: String,
	pub label: String,
	pub radius: f64,
	pub fill: String,
	pub border: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct EngineEdge {
	pub id: String,
	pub source: String,
	pub target: String,
	pub label: String,
	pub color: String,
	pub arrow: bool,
}

/// Nodes and edges in the shape the layout engine consumes. One engine
/// node/edge per canonical node/edge, under the same id.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EngineData {
	pub nodes: Vec<EngineNode>,
	pub edges: Vec<EngineEdge>,
}

impl From<&GraphModel> for EngineData {
	fn from(model: &GraphModel) -> Self {
		let nodes = model
			.nodes()
			.iter()
			.map(|node| EngineNode {
				id: node.id.clone(),
				label: node.label.clone(),
				radius: node.size * RADIUS_PER_SIZE,
				fill: node.style.fill.clone(),
				border: node.style.border.clone(),
			})
			.collect();
		let edges = model
			.edges()
			.iter()
			.map(|edge| EngineEdge {
				id: edge.id.clone(),
				source: edge.from.clone(),
				target: edge.to.clone(),
				label: edge.label.clone(),
				color: edge.style.color.clone(),
				arrow: edge.style.arrow,
			})
			.collect();
		Self { nodes, edges }
	}
}
