//! Canonical visualization model.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Stable identity of a node, as reported by the query source.
pub type NodeId = String;

/// Node colours, as CSS colour strings.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeStyle {
	/// Fill colour.
	pub fill: String,
	/// Outline colour.
	pub border: String,
}

impl NodeStyle {
	/// Style from a fill and a border colour.
	pub fn new(fill: impl Into<String>, border: impl Into<String>) -> Self {
		Self {
			fill: fill.into(),
			border: border.into(),
		}
	}
}

/// Edge stroke colour and whether it is drawn directed.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EdgeStyle {
	/// Stroke colour.
	pub color: String,
	/// Draw an arrowhead at the target end.
	pub arrow: bool,
}

impl Default for EdgeStyle {
	fn default() -> Self {
		Self {
			color: "#64b4ff".into(),
			arrow: true,
		}
	}
}

/// A node as displayed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CanonicalNode {
	/// Unique within a model.
	pub id: NodeId,
	/// Display name. Not unique.
	pub label: String,
	/// Grows with degree.
	pub size: f64,
	/// Colours derived from the first category.
	pub style: NodeStyle,
	/// `labels` (category tokens) and `properties` of the source record.
	pub metadata: BTreeMap<String, Value>,
}

/// A relationship between two nodes of the same model.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CanonicalEdge {
	/// Source relationship id, or `from-TYPE->to` when it has none.
	pub id: String,
	/// Start node.
	pub from: NodeId,
	/// End node.
	pub to: NodeId,
	/// Readable relationship type.
	pub label: String,
	/// Stroke style.
	pub style: EdgeStyle,
	/// Raw `type` and `properties`.
	pub metadata: BTreeMap<String, Value>,
}

/// A snapshot of nodes and edges, kept sorted by id.
///
/// Equality is defined over the canonical serialization, which is what the
/// panel's dedup check relies on.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct GraphModel {
	nodes: Vec<CanonicalNode>,
	edges: Vec<CanonicalEdge>,
}

impl GraphModel {
	/// Sorts both lists by id.
	pub fn new(mut nodes: Vec<CanonicalNode>, mut edges: Vec<CanonicalEdge>) -> Self {
		nodes.sort_by(|a, b| a.id.cmp(&b.id));
		edges.sort_by(|a, b| a.id.cmp(&b.id));
		Self { nodes, edges }
	}

	/// Nodes, sorted by id.
	pub fn nodes(&self) -> &[CanonicalNode] {
		&self.nodes
	}

	/// Edges, sorted by id.
	pub fn edges(&self) -> &[CanonicalEdge] {
		&self.edges
	}

	/// Look a node up by id.
	pub fn node(&self, id: &str) -> Option<&CanonicalNode> {
		self.nodes
			.binary_search_by(|node| node.id.as_str().cmp(id))
			.ok()
			.map(|idx| &self.nodes[idx])
	}

	/// True when there is nothing to draw.
	pub fn is_empty(&self) -> bool {
		self.nodes.is_empty()
	}

	/// Stable JSON encoding: nodes and edges by id, object keys sorted.
	pub fn canonical_json(&self) -> serde_json::Result<String> {
		serde_json::to_string(self)
	}
}

impl PartialEq for GraphModel {
	fn eq(&self, other: &Self) -> bool {
		match (self.canonical_json(), other.canonical_json()) {
			(Ok(a), Ok(b)) => a == b,
			_ => false,
		}
	}
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;

	fn node(id: &str, label: &str) -> CanonicalNode {
		CanonicalNode {
			id: id.into(),
			label: label.into(),
			size: 16.0,
			style: NodeStyle::new("#fff", "#000"),
			metadata: BTreeMap::from([("labels".to_string(), json!(["Person"]))]),
		}
	}

	#[test]
	fn insertion_order_does_not_matter() {
		let a = GraphModel::new(vec![node("2", "Bob"), node("1", "Ada")], vec![]);
		let b = GraphModel::new(vec![node("1", "Ada"), node("2", "Bob")], vec![]);
		assert_eq!(a, b);
		assert_eq!(a.canonical_json().unwrap(), b.canonical_json().unwrap());
		assert_eq!(a.nodes()[0].id, "1");
	}

	#[test]
	fn labels_take_part_in_equality() {
		let a = GraphModel::new(vec![node("1", "Ada")], vec![]);
		let b = GraphModel::new(vec![node("1", "Ada Lovelace")], vec![]);
		assert_ne!(a, b);
	}

	#[test]
	fn node_lookup_by_id() {
		let model = GraphModel::new(vec![node("b", "B"), node("a", "A")], vec![]);
		assert_eq!(model.node("b").map(|n| n.label.as_str()), Some("B"));
		assert!(model.node("c").is_none());
	}
}
