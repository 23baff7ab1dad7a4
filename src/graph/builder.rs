//! Raw query records to canonical model.
//!
//! Records are arbitrary JSON objects. Each one is first parsed into a strict
//! intermediate form; records that fail that step are skipped and logged, never
//! forced into the model.

use std::collections::BTreeMap;

use log::debug;
use serde_json::{Map, Value};

use super::color;
use super::model::{CanonicalEdge, CanonicalNode, EdgeStyle, GraphModel, NodeId};
use crate::error::BuildError;

/// One record as returned by the query source.
pub type RawRecord = Value;

const ID_FIELDS: &[&str] = &["id", "elementId", "identity", "uid"];
const NAME_FIELDS: &[&str] = &["name", "title"];
const FROM_FIELDS: &[&str] = &["fromId", "from", "source", "start"];
const TO_FIELDS: &[&str] = &["toId", "to", "target", "end"];
const TYPE_FIELDS: &[&str] = &["type", "relationship"];

const NODE_BASE_SIZE: f64 = 16.0;
const NODE_SIZE_PER_EDGE: f64 = 2.0;
const MAX_SIZED_DEGREE: usize = 8;

struct ParsedNode {
	id: NodeId,
	label: String,
	labels: Vec<String>,
	properties: Value,
}

struct ParsedEdge {
	id: String,
	from: NodeId,
	to: NodeId,
	kind: String,
	properties: Value,
}

/// Build the canonical model. Pure and deterministic.
pub fn build(raw_nodes: &[RawRecord], raw_edges: &[RawRecord]) -> GraphModel {
	let mut nodes: BTreeMap<NodeId, ParsedNode> = BTreeMap::new();
	for (index, raw) in raw_nodes.iter().enumerate() {
		match parse_node(index, raw) {
			Ok(node) => {
				if nodes.contains_key(&node.id) {
					debug!("duplicate node {} at record #{index} ignored", node.id);
					continue;
				}
				nodes.insert(node.id.clone(), node);
			}
			Err(err) => debug!("skipping record: {err}"),
		}
	}

	let mut edges: BTreeMap<String, ParsedEdge> = BTreeMap::new();
	let mut degree: BTreeMap<&str, usize> = BTreeMap::new();
	for (index, raw) in raw_edges.iter().enumerate() {
		let edge = match parse_edge(index, raw) {
			Ok(edge) => edge,
			Err(err) => {
				debug!("skipping record: {err}");
				continue;
			}
		};
		// Relationships reaching outside the node window are expected.
		let (Some((from, _)), Some((to, _))) =
			(nodes.get_key_value(&edge.from), nodes.get_key_value(&edge.to))
		else {
			continue;
		};
		if edges.contains_key(&edge.id) {
			continue;
		}
		*degree.entry(from.as_str()).or_default() += 1;
		*degree.entry(to.as_str()).or_default() += 1;
		edges.insert(edge.id.clone(), edge);
	}

	let canonical_nodes = nodes
		.values()
		.map(|node| {
			let degree = degree.get(node.id.as_str()).copied().unwrap_or(0);
			canonical_node(node, degree)
		})
		.collect();
	let canonical_edges = edges.into_values().map(canonical_edge).collect();
	GraphModel::new(canonical_nodes, canonical_edges)
}

fn parse_node(index: usize, raw: &RawRecord) -> Result<ParsedNode, BuildError> {
	let record = raw
		.as_object()
		.ok_or(BuildError::NotAnObject { kind: "node", index })?;
	let id = first_identity(record, ID_FIELDS).ok_or(BuildError::MissingIdentity { index })?;
	// Records already in canonical shape carry categories and properties
	// under `metadata`, and `label` is the resolved display name.
	let metadata = record.get("metadata").and_then(Value::as_object);
	let properties = record
		.get("properties")
		.or_else(|| metadata.and_then(|m| m.get("properties")))
		.and_then(Value::as_object);
	let label = NAME_FIELDS
		.iter()
		.find_map(|field| {
			text_field(record, field).or_else(|| properties.and_then(|p| text_field(p, field)))
		})
		.or_else(|| metadata.and_then(|_| text_field(record, "label")))
		.unwrap_or_else(|| id.clone());

	Ok(ParsedNode {
		labels: category_labels(metadata.unwrap_or(record)),
		properties: properties
			.map(|p| sorted(&Value::Object(p.clone())))
			.unwrap_or_else(|| Value::Object(Map::new())),
		id,
		label,
	})
}

fn parse_edge(index: usize, raw: &RawRecord) -> Result<ParsedEdge, BuildError> {
	let record = raw.as_object().ok_or(BuildError::NotAnObject {
		kind: "relationship",
		index,
	})?;
	let from = first_identity(record, FROM_FIELDS)
		.ok_or(BuildError::MissingEndpoint { index, end: "start" })?;
	let to = first_identity(record, TO_FIELDS)
		.ok_or(BuildError::MissingEndpoint { index, end: "end" })?;
	let metadata = record.get("metadata").and_then(Value::as_object);
	let kind = TYPE_FIELDS
		.iter()
		.find_map(|field| text_field(record, field))
		.or_else(|| metadata.and_then(|m| text_field(m, "type")))
		.ok_or(BuildError::MissingType { index })?;
	let id = first_identity(record, ID_FIELDS).unwrap_or_else(|| format!("{from}-{kind}->{to}"));
	let properties = record
		.get("properties")
		.or_else(|| metadata.and_then(|m| m.get("properties")))
		.filter(|p| p.is_object())
		.map(sorted)
		.unwrap_or_else(|| Value::Object(Map::new()));

	Ok(ParsedEdge {
		id,
		from,
		to,
		kind,
		properties,
	})
}

fn canonical_node(node: &ParsedNode, degree: usize) -> CanonicalNode {
	let style = color::style_for(node.labels.first().map(String::as_str));
	let labels = node.labels.iter().cloned().map(Value::String).collect();
	CanonicalNode {
		id: node.id.clone(),
		label: node.label.clone(),
		size: NODE_BASE_SIZE + NODE_SIZE_PER_EDGE * degree.min(MAX_SIZED_DEGREE) as f64,
		style,
		metadata: BTreeMap::from([
			("labels".to_string(), Value::Array(labels)),
			("properties".to_string(), node.properties.clone()),
		]),
	}
}

fn canonical_edge(edge: ParsedEdge) -> CanonicalEdge {
	CanonicalEdge {
		label: readable_type(&edge.kind),
		metadata: BTreeMap::from([
			("type".to_string(), Value::String(edge.kind)),
			("properties".to_string(), edge.properties),
		]),
		id: edge.id,
		from: edge.from,
		to: edge.to,
		style: EdgeStyle::default(),
	}
}

/// `WORKS_WITH` -> `works with`
pub fn readable_type(kind: &str) -> String {
	kind.replace('_', " ").to_lowercase()
}

fn first_identity(record: &Map<String, Value>, fields: &[&str]) -> Option<String> {
	fields.iter().find_map(|field| match record.get(*field)? {
		Value::String(s) if !s.is_empty() => Some(s.clone()),
		Value::Number(n) if n.is_i64() || n.is_u64() => Some(n.to_string()),
		_ => None,
	})
}

fn text_field(record: &Map<String, Value>, field: &str) -> Option<String> {
	match record.get(field)? {
		Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
		_ => None,
	}
}

fn category_labels(record: &Map<String, Value>) -> Vec<String> {
	if let Some(Value::Array(labels)) = record.get("labels") {
		return labels
			.iter()
			.filter_map(Value::as_str)
			.filter(|label| !label.trim().is_empty())
			.map(str::to_string)
			.collect();
	}
	["label", "category"]
		.iter()
		.find_map(|field| text_field(record, field))
		.into_iter()
		.collect()
}

// Rebuilds objects with sorted keys so the encoding never depends on the
// order fields arrived in.
fn sorted(value: &Value) -> Value {
	match value {
		Value::Object(map) => {
			let ordered: BTreeMap<&String, Value> =
				map.iter().map(|(k, v)| (k, sorted(v))).collect();
			Value::Object(ordered.into_iter().map(|(k, v)| (k.clone(), v)).collect())
		}
		Value::Array(items) => Value::Array(items.iter().map(sorted).collect()),
		other => other.clone(),
	}
}
