use std::collections::{HashMap, HashSet};
use std::f64::consts::PI;
use std::time::Duration;

use force_graph::{DefaultNodeIdx, EdgeData, ForceGraph, NodeData, SimulationParameters};
use log::debug;

use super::engine::{LayoutEngine, PointerInput, StepOutcome};
use super::types::EngineData;
use crate::config::PhysicsConfig;
use crate::error::TeardownError;
use crate::graph::NodeId;

/// Extra hit radius around a node, in world units.
pub const HIT_PADDING: f64 = 4.0;
const SEED_RADIUS: f64 = 100.0;
const MIN_ZOOM: f64 = 0.1;
const MAX_ZOOM: f64 = 10.0;
const MAX_FIT_ZOOM: f64 = 2.0;
const FIT_MARGIN: f64 = 0.9;
/// Pointer travel (screen px) after which a press is a drag, not a click.
const CLICK_SLOP: f64 = 4.0;

pub(super) fn ease_out_cubic(t: f64) -> f64 {
	1.0 - (1.0 - t).powi(3)
}

#[derive(Clone, Debug, Default)]
pub struct NodeInfo {
	pub id: NodeId,
	pub label: String,
	pub radius: f64,
	pub fill: String,
	pub border: String,
}

#[derive(Clone, Debug)]
pub struct EdgeInfo {
	pub source: DefaultNodeIdx,
	pub target: DefaultNodeIdx,
	pub source_radius: f64,
	pub target_radius: f64,
	pub label: String,
	pub color: String,
	pub arrow: bool,
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ViewTransform {
	pub x: f64,
	pub y: f64,
	pub k: f64,
}

impl ViewTransform {
	fn lerp(&self, to: &Self, t: f64) -> Self {
		Self {
			x: self.x + (to.x - self.x) * t,
			y: self.y + (to.y - self.y) * t,
			k: self.k + (to.k - self.k) * t,
		}
	}
}

#[derive(Clone, Debug, Default)]
pub struct DragState {
	pub active: bool,
	pub node_idx: Option<DefaultNodeIdx>,
	pub start_x: f64,
	pub start_y: f64,
	pub node_start_x: f32,
	pub node_start_y: f32,
}

#[derive(Clone, Debug, Default)]
pub struct PanState {
	pub active: bool,
	pub start_x: f64,
	pub start_y: f64,
	pub transform_start_x: f64,
	pub transform_start_y: f64,
}

#[derive(Clone, Debug, Default)]
pub struct HoverState {
	pub node: Option<DefaultNodeIdx>,
	pub neighbors: HashSet<DefaultNodeIdx>,
	pub highlight_t: f64,
	pub prev_node: Option<DefaultNodeIdx>,
	pub prev_neighbors: HashSet<DefaultNodeIdx>,
	delay_t: f64,
}

#[derive(Clone, Debug)]
struct FitAnimation {
	from: ViewTransform,
	to: ViewTransform,
	elapsed: f64,
	duration: f64,
}

#[derive(Clone, Debug, Default)]
struct Settling {
	iterations: u32,
	calm: u32,
}

/// Layout engine backed by the `force_graph` simulation.
pub struct ForceGraphState {
	pub graph: ForceGraph<NodeInfo, ()>,
	pub transform: ViewTransform,
	pub drag: DragState,
	pub pan: PanState,
	pub hover: HoverState,
	pub width: f64,
	pub height: f64,
	pub physics: bool,
	pub flow_time: f64,
	gesture_moved: bool,
	edges: Vec<EdgeInfo>,
	positions: HashMap<DefaultNodeIdx, (f32, f32)>,
	params: PhysicsConfig,
	settling: Settling,
	fit: Option<FitAnimation>,
}

fn simulation(params: &PhysicsConfig) -> ForceGraph<NodeInfo, ()> {
	ForceGraph::new(SimulationParameters {
		force_charge: params.force_charge,
		force_spring: params.force_spring,
		force_max: params.force_max,
		node_speed: params.node_speed,
		damping_factor: params.damping_factor,
	})
}

impl ForceGraphState {
	pub fn new(data: &EngineData, width: f64, height: f64, params: &PhysicsConfig) -> Self {
		let mut graph = simulation(params);
		let mut id_to_idx = HashMap::new();
		let mut positions = HashMap::new();
		let mut edges = Vec::new();

		for (i, node) in data.nodes.iter().enumerate() {
			let angle = (i as f64) * 2.0 * PI / data.nodes.len() as f64;
			let (x, y) = (
				(SEED_RADIUS * angle.cos()) as f32,
				(SEED_RADIUS * angle.sin()) as f32,
			);

			let idx = graph.add_node(NodeData {
				x,
				y,
				mass: 10.0,
				is_anchor: false,
				user_data: NodeInfo {
					id: node.id.clone(),
					label: node.label.clone(),
					radius: node.radius,
					fill: node.fill.clone(),
					border: node.border.clone(),
				},
			});
			id_to_idx.insert(node.id.as_str(), (idx, node.radius));
			positions.insert(idx, (x, y));
		}

		for edge in &data.edges {
			let (Some(&(source, source_radius)), Some(&(target, target_radius))) = (
				id_to_idx.get(edge.source.as_str()),
				id_to_idx.get(edge.target.as_str()),
			) else {
				debug!("edge {} has no engine endpoints", edge.id);
				continue;
			};
			graph.add_edge(source, target, EdgeData::default());
			edges.push(EdgeInfo {
				source,
				target,
				source_radius,
				target_radius,
				label: edge.label.clone(),
				color: edge.color.clone(),
				arrow: edge.arrow,
			});
		}

		Self {
			graph,
			edges,
			positions,
			transform: ViewTransform {
				x: width / 2.0,
				y: height / 2.0,
				k: 1.0,
			},
			drag: DragState::default(),
			pan: PanState::default(),
			hover: HoverState::default(),
			width,
			height,
			physics: false,
			flow_time: 0.0,
			gesture_moved: false,
			params: params.clone(),
			settling: Settling::default(),
			fit: None,
		}
	}

	pub fn edges(&self) -> &[EdgeInfo] {
		&self.edges
	}

	/// Current world positions, gathered in one pass over the simulation.
	pub fn node_positions(&self) -> HashMap<DefaultNodeIdx, (f64, f64)> {
		let mut positions = HashMap::with_capacity(self.positions.len());
		self.graph.visit_nodes(|node| {
			positions.insert(node.index(), (node.x() as f64, node.y() as f64));
		});
		positions
	}

	pub fn screen_to_graph(&self, sx: f64, sy: f64) -> (f64, f64) {
		(
			(sx - self.transform.x) / self.transform.k,
			(sy - self.transform.y) / self.transform.k,
		)
	}

	fn node_idx_at(&self, sx: f64, sy: f64) -> Option<DefaultNodeIdx> {
		let (gx, gy) = self.screen_to_graph(sx, sy);
		let mut found: Option<(DefaultNodeIdx, f64)> = None;
		self.graph.visit_nodes(|node| {
			let (dx, dy) = (node.x() as f64 - gx, node.y() as f64 - gy);
			let dist = (dx * dx + dy * dy).sqrt();
			if dist < node.data.user_data.radius + HIT_PADDING
				&& found.is_none_or(|(_, best)| dist < best)
			{
				found = Some((node.index(), dist));
			}
		});
		found.map(|(idx, _)| idx)
	}

	pub fn set_hover(&mut self, node: Option<DefaultNodeIdx>) {
		if self.hover.node == node {
			return;
		}
		let was_hovering = self.hover.node.is_some();

		// Keep the previous highlight around while it fades out
		if was_hovering && node.is_none() {
			self.hover.prev_node = self.hover.node.take();
			self.hover.prev_neighbors = std::mem::take(&mut self.hover.neighbors);
		} else {
			self.hover.prev_node = None;
			self.hover.prev_neighbors.clear();
		}

		self.hover.node = node;
		self.hover.neighbors.clear();

		if let Some(idx) = node {
			if !was_hovering {
				self.hover.delay_t = 0.0;
			}
			for edge in &self.edges {
				if edge.source == idx {
					self.hover.neighbors.insert(edge.target);
				} else if edge.target == idx {
					self.hover.neighbors.insert(edge.source);
				}
			}
		}
	}

	pub fn is_highlighted(&self, idx: DefaultNodeIdx) -> bool {
		self.hover.node == Some(idx)
			|| self.hover.neighbors.contains(&idx)
			|| self.hover.prev_node == Some(idx)
			|| self.hover.prev_neighbors.contains(&idx)
	}

	pub fn is_hovered(&self, idx: DefaultNodeIdx) -> bool {
		self.hover.node == Some(idx) || self.hover.prev_node == Some(idx)
	}

	pub fn has_active_highlight(&self) -> bool {
		self.hover.node.is_some() || self.hover.prev_node.is_some()
	}

	fn advance_hover(&mut self, dt: f64) {
		let (target, delay, speed) = if self.hover.node.is_some() {
			(1.0, 0.08, 1.8)
		} else {
			(0.0, 0.0, 1.26)
		};

		if self.hover.node.is_some() {
			self.hover.delay_t = (self.hover.delay_t + dt).min(delay);
			if self.hover.delay_t >= delay {
				self.hover.highlight_t += (target - self.hover.highlight_t) * speed * dt;
			}
		} else {
			self.hover.highlight_t += (target - self.hover.highlight_t) * speed * dt;
			if self.hover.highlight_t < 0.01 {
				self.hover.highlight_t = 0.0;
				self.hover.prev_node = None;
				self.hover.prev_neighbors.clear();
			}
		}
	}

	fn advance_fit(&mut self, dt: f64) {
		let Some(fit) = self.fit.as_mut() else {
			return;
		};
		fit.elapsed = (fit.elapsed + dt).min(fit.duration);
		if fit.elapsed >= fit.duration {
			self.transform = fit.to;
			self.fit = None;
		} else {
			self.transform = fit.from.lerp(&fit.to, ease_out_cubic(fit.elapsed / fit.duration));
		}
	}

	/// Transform that centers the node extents in the surface.
	fn fitted_transform(&self) -> ViewTransform {
		let mut bounds: Option<(f64, f64, f64, f64)> = None;
		self.graph.visit_nodes(|node| {
			let r = node.data.user_data.radius;
			let (x, y) = (node.x() as f64, node.y() as f64);
			bounds = Some(match bounds {
				None => (x - r, y - r, x + r, y + r),
				Some((x0, y0, x1, y1)) => (x0.min(x - r), y0.min(y - r), x1.max(x + r), y1.max(y + r)),
			});
		});
		let Some((x0, y0, x1, y1)) = bounds else {
			return ViewTransform {
				x: self.width / 2.0,
				y: self.height / 2.0,
				k: 1.0,
			};
		};

		let (bw, bh) = ((x1 - x0).max(1.0), (y1 - y0).max(1.0));
		let k = ((self.width / bw).min(self.height / bh) * FIT_MARGIN).clamp(MIN_ZOOM, MAX_FIT_ZOOM);
		let (cx, cy) = ((x0 + x1) / 2.0, (y0 + y1) / 2.0);
		ViewTransform {
			x: self.width / 2.0 - cx * k,
			y: self.height / 2.0 - cy * k,
			k,
		}
	}

	fn simulate(&mut self, dt: f32) -> StepOutcome {
		self.graph.update(dt);

		let mut max_shift = 0.0f32;
		let positions = &mut self.positions;
		self.graph.visit_nodes(|node| {
			let (x, y) = (node.x(), node.y());
			if let Some((px, py)) = positions.insert(node.index(), (x, y)) {
				max_shift = max_shift.max(((x - px).powi(2) + (y - py).powi(2)).sqrt());
			}
		});

		self.settling.iterations += 1;
		if max_shift < self.params.settle_threshold {
			self.settling.calm += 1;
		} else {
			self.settling.calm = 0;
		}

		if self.positions.is_empty()
			|| self.settling.calm >= self.params.calm_frames
			|| self.settling.iterations >= self.params.max_iterations
		{
			StepOutcome::Stabilized
		} else {
			StepOutcome::Settling
		}
	}
}

impl LayoutEngine for ForceGraphState {
	fn step(&mut self, dt: f32) -> StepOutcome {
		self.flow_time += dt as f64;
		self.advance_hover(dt as f64);
		self.advance_fit(dt as f64);
		if !self.physics {
			return StepOutcome::Frozen;
		}
		self.simulate(dt)
	}

	fn set_physics(&mut self, enabled: bool) {
		if enabled && !self.physics {
			self.settling = Settling::default();
		}
		self.physics = enabled;
	}

	fn fit(&mut self, animation: Duration) {
		let to = self.fitted_transform();
		let duration = animation.as_secs_f64();
		if duration <= 0.0 {
			self.transform = to;
			self.fit = None;
		} else {
			self.fit = Some(FitAnimation {
				from: self.transform,
				to,
				elapsed: 0.0,
				duration,
			});
		}
	}

	fn resize(&mut self, width: f64, height: f64) {
		self.width = width;
		self.height = height;
	}

	fn node_at(&self, x: f64, y: f64) -> Option<NodeId> {
		let idx = self.node_idx_at(x, y)?;
		let mut id = None;
		self.graph.visit_nodes(|node| {
			if node.index() == idx {
				id = Some(node.data.user_data.id.clone());
			}
		});
		id
	}

	fn pointer(&mut self, input: PointerInput) {
		match input {
			PointerInput::Down { x, y } => {
				self.gesture_moved = false;
				if let Some(idx) = self.node_idx_at(x, y) {
					self.drag.active = true;
					self.drag.node_idx = Some(idx);
					self.drag.start_x = x;
					self.drag.start_y = y;
					let drag = &mut self.drag;
					self.graph.visit_nodes(|node| {
						if node.index() == idx {
							drag.node_start_x = node.x();
							drag.node_start_y = node.y();
						}
					});
				} else {
					self.fit = None;
					self.pan.active = true;
					self.pan.start_x = x;
					self.pan.start_y = y;
					self.pan.transform_start_x = self.transform.x;
					self.pan.transform_start_y = self.transform.y;
				}
			}
			PointerInput::Move { x, y } => {
				if !self.drag.active {
					let hovered = self.node_idx_at(x, y);
					self.set_hover(hovered);
				}

				let origin = if self.drag.active {
					Some((self.drag.start_x, self.drag.start_y))
				} else if self.pan.active {
					Some((self.pan.start_x, self.pan.start_y))
				} else {
					None
				};
				if let Some((sx, sy)) = origin {
					if (x - sx).hypot(y - sy) > CLICK_SLOP {
						self.gesture_moved = true;
					}
				}

				if self.drag.active {
					if let Some(idx) = self.drag.node_idx {
						let (dx, dy) = (
							(x - self.drag.start_x) / self.transform.k,
							(y - self.drag.start_y) / self.transform.k,
						);
						let (nx, ny) = (
							self.drag.node_start_x + dx as f32,
							self.drag.node_start_y + dy as f32,
						);
						self.graph.visit_nodes_mut(|node| {
							if node.index() == idx {
								node.data.x = nx;
								node.data.y = ny;
								node.data.is_anchor = true;
							}
						});
					}
				} else if self.pan.active {
					self.transform.x = self.pan.transform_start_x + (x - self.pan.start_x);
					self.transform.y = self.pan.transform_start_y + (y - self.pan.start_y);
				}
			}
			PointerInput::Up => {
				self.drag.active = false;
				self.drag.node_idx = None;
				self.pan.active = false;
			}
			PointerInput::Leave => {
				self.drag.active = false;
				self.drag.node_idx = None;
				self.pan.active = false;
				self.set_hover(None);
			}
			PointerInput::Wheel { x, y, delta_y } => {
				self.fit = None;
				let factor = if delta_y > 0.0 { 0.9 } else { 1.1 };
				let new_k = (self.transform.k * factor).clamp(MIN_ZOOM, MAX_ZOOM);
				let ratio = new_k / self.transform.k;
				self.transform.x = x - (x - self.transform.x) * ratio;
				self.transform.y = y - (y - self.transform.y) * ratio;
				self.transform.k = new_k;
			}
		}
	}

	fn click_suppressed(&self) -> bool {
		self.gesture_moved
	}

	fn destroy(&mut self) -> Result<(), TeardownError> {
		self.physics = false;
		self.gesture_moved = false;
		self.fit = None;
		self.graph = simulation(&self.params);
		self.edges.clear();
		self.positions.clear();
		self.drag = DragState::default();
		self.pan = PanState::default();
		self.hover = HoverState::default();
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::components::force_graph::types::{EngineEdge, EngineNode};

	fn node(id: &str) -> EngineNode {
		EngineNode {
			id: id.into(),
			label: id.to_uppercase(),
			radius: 5.0,
			fill: "#fff".into(),
			border: "#000".into(),
		}
	}

	fn pair() -> EngineData {
		EngineData {
			nodes: vec![node("a"), node("b")],
			edges: vec![
				EngineEdge {
					id: "a-LINK->b".into(),
					source: "a".into(),
					target: "b".into(),
					label: "link".into(),
					color: "#64b4ff".into(),
					arrow: true,
				},
				EngineEdge {
					id: "a-LINK->zz".into(),
					source: "a".into(),
					target: "zz".into(),
					label: "link".into(),
					color: "#64b4ff".into(),
					arrow: true,
				},
			],
		}
	}

	#[test]
	fn edges_without_endpoints_are_not_added() {
		let state = ForceGraphState::new(&pair(), 800.0, 600.0, &PhysicsConfig::default());
		assert_eq!(state.edges().len(), 1);
		assert_eq!(state.node_positions().len(), 2);
	}

	#[test]
	fn dragging_a_node_suppresses_the_following_click() {
		let data = EngineData {
			nodes: vec![node("solo")],
			edges: vec![],
		};
		let mut state = ForceGraphState::new(&data, 800.0, 600.0, &PhysicsConfig::default());
		let (x, y) = (400.0 + SEED_RADIUS, 300.0);

		state.pointer(PointerInput::Down { x, y });
		state.pointer(PointerInput::Move { x: x + 1.0, y });
		state.pointer(PointerInput::Up);
		assert!(!state.click_suppressed());

		state.pointer(PointerInput::Down { x, y });
		state.pointer(PointerInput::Move { x: x + 30.0, y: y + 10.0 });
		state.pointer(PointerInput::Up);
		assert!(state.click_suppressed());

		// background pan
		state.pointer(PointerInput::Down { x: 10.0, y: 10.0 });
		assert!(!state.click_suppressed());
		state.pointer(PointerInput::Move { x: 60.0, y: 10.0 });
		state.pointer(PointerInput::Up);
		assert!(state.click_suppressed());
	}

	#[test]
	fn edges_carry_endpoint_radii() {
		let mut data = pair();
		data.nodes[1].radius = 9.0;
		let state = ForceGraphState::new(&data, 800.0, 600.0, &PhysicsConfig::default());
		let edge = &state.edges()[0];
		assert_eq!((edge.source_radius, edge.target_radius), (5.0, 9.0));
	}

	#[test]
	fn empty_graph_stabilizes_immediately() {
		let mut state =
			ForceGraphState::new(&EngineData::default(), 800.0, 600.0, &PhysicsConfig::default());
		state.set_physics(true);
		assert_eq!(state.step(0.016), StepOutcome::Stabilized);
	}

	#[test]
	fn iteration_cap_reports_stabilized() {
		let params = PhysicsConfig {
			max_iterations: 3,
			settle_threshold: 0.0,
			calm_frames: u32::MAX,
			..PhysicsConfig::default()
		};
		let mut state = ForceGraphState::new(&pair(), 800.0, 600.0, &params);
		state.set_physics(true);
		assert_eq!(state.step(0.016), StepOutcome::Settling);
		assert_eq!(state.step(0.016), StepOutcome::Settling);
		assert_eq!(state.step(0.016), StepOutcome::Stabilized);

		state.set_physics(false);
		assert_eq!(state.step(0.016), StepOutcome::Frozen);
	}

	#[test]
	fn hit_test_uses_screen_coordinates() {
		let data = EngineData {
			nodes: vec![node("solo")],
			edges: vec![],
		};
		let state = ForceGraphState::new(&data, 800.0, 600.0, &PhysicsConfig::default());
		// seeded at (SEED_RADIUS, 0), view centered on the origin
		assert_eq!(state.node_at(400.0 + SEED_RADIUS, 300.0), Some("solo".to_string()));
		assert_eq!(state.node_at(10.0, 10.0), None);
	}

	#[test]
	fn instant_fit_centers_the_extents() {
		let data = EngineData {
			nodes: vec![node("solo")],
			edges: vec![],
		};
		let mut state = ForceGraphState::new(&data, 800.0, 600.0, &PhysicsConfig::default());
		state.fit(Duration::ZERO);
		assert_eq!(state.transform.k, MAX_FIT_ZOOM);
		let screen_x = state.transform.x + SEED_RADIUS * state.transform.k;
		assert!((screen_x - 400.0).abs() < 1e-6);
		assert!((state.transform.y - 300.0).abs() < 1e-6);
	}

	#[test]
	fn animated_fit_finishes_within_its_duration() {
		let mut state = ForceGraphState::new(&pair(), 800.0, 600.0, &PhysicsConfig::default());
		let target = state.fitted_transform();
		state.fit(Duration::from_millis(100));
		state.step(0.05);
		assert_ne!(state.transform, target);
		state.step(0.05);
		state.step(0.05);
		assert_eq!(state.transform, target);
	}

	#[test]
	fn wheel_zooms_around_the_cursor() {
		let mut state = ForceGraphState::new(&pair(), 800.0, 600.0, &PhysicsConfig::default());
		let before = state.screen_to_graph(200.0, 150.0);
		state.pointer(PointerInput::Wheel {
			x: 200.0,
			y: 150.0,
			delta_y: -1.0,
		});
		assert!(state.transform.k > 1.0);
		let after = state.screen_to_graph(200.0, 150.0);
		assert!((before.0 - after.0).abs() < 1e-9 && (before.1 - after.1).abs() < 1e-9);
	}

	#[test]
	fn destroy_releases_the_graph() {
		let mut state = ForceGraphState::new(&pair(), 800.0, 600.0, &PhysicsConfig::default());
		assert!(state.destroy().is_ok());
		assert!(state.edges().is_empty());
		assert_eq!(state.node_at(400.0 + SEED_RADIUS, 300.0), None);
	}
}
