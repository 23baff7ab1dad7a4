use std::f64::consts::PI;

use wasm_bindgen::JsValue;
use web_sys::CanvasRenderingContext2d;

use super::state::{ForceGraphState, ease_out_cubic};

const BACKGROUND: &str = "#1a1a2e";

pub fn render(state: &ForceGraphState, ctx: &CanvasRenderingContext2d) {
	ctx.set_fill_style_str(BACKGROUND);
	ctx.fill_rect(0.0, 0.0, state.width, state.height);
	ctx.save();
	let _ = ctx.translate(state.transform.x, state.transform.y);
	let _ = ctx.scale(state.transform.k, state.transform.k);
	draw_edges(state, ctx);
	draw_nodes(state, ctx);
	ctx.restore();
}

fn draw_edges(state: &ForceGraphState, ctx: &CanvasRenderingContext2d) {
	let k = state.transform.k;
	let (line_width, dash, gap, arrow_size) = (1.5 / k, 8.0 / k, 4.0 / k, 8.0 / k);
	// Dashes only flow while the layout is still moving
	let dash_offset = if state.physics {
		-(state.flow_time * 30.0) % (dash + gap)
	} else {
		0.0
	};
	let t = ease_out_cubic(state.hover.highlight_t);
	let positions = state.node_positions();

	for edge in state.edges() {
		let (Some(&(x1, y1)), Some(&(x2, y2))) =
			(positions.get(&edge.source), positions.get(&edge.target))
		else {
			continue;
		};
		let (dx, dy) = (x2 - x1, y2 - y1);
		let dist = (dx * dx + dy * dy).sqrt();
		if dist < 0.001 {
			continue;
		}

		let is_highlighted =
			state.is_highlighted(edge.source) && state.is_highlighted(edge.target);
		// t=0: all edges at base alpha, t=1: highlighted brighten, others dim
		let (edge_alpha, width) = if is_highlighted {
			(0.6 + 0.3 * t, line_width * (1.0 + 0.3 * t))
		} else {
			(0.6 - 0.45 * t, line_width * (1.0 - 0.3 * t))
		};
		let (r1, r2) = (edge.source_radius, edge.target_radius);
		let tip_gap = if edge.arrow { r2 + arrow_size } else { r2 };

		ctx.set_global_alpha(edge_alpha);
		ctx.set_stroke_style_str(&edge.color);
		ctx.set_line_width(width);
		let _ = ctx.set_line_dash(&js_sys::Array::of2(
			&JsValue::from_f64(dash),
			&JsValue::from_f64(gap),
		));
		ctx.set_line_dash_offset(dash_offset);

		let (ux, uy) = (dx / dist, dy / dist);
		ctx.begin_path();
		ctx.move_to(x1 + ux * r1, y1 + uy * r1);
		ctx.line_to(x2 - ux * tip_gap, y2 - uy * tip_gap);
		ctx.stroke();
		let _ = ctx.set_line_dash(&js_sys::Array::new());

		if edge.arrow {
			ctx.set_fill_style_str(&edge.color);
			let (tip_x, tip_y) = (x2 - ux * r2, y2 - uy * r2);
			let (back_x, back_y) = (tip_x - ux * arrow_size, tip_y - uy * arrow_size);
			let (px, py) = (-uy * arrow_size * 0.5, ux * arrow_size * 0.5);
			ctx.begin_path();
			ctx.move_to(tip_x, tip_y);
			ctx.line_to(back_x + px, back_y + py);
			ctx.line_to(back_x - px, back_y - py);
			ctx.close_path();
			ctx.fill();
		}

		if !edge.label.is_empty() && k > 0.6 {
			ctx.set_fill_style_str("rgba(200, 220, 255, 0.9)");
			ctx.set_font(&format!("{}px sans-serif", 8.0 / k.max(0.5)));
			ctx.set_text_align("center");
			let _ = ctx.fill_text(&edge.label, (x1 + x2) / 2.0, (y1 + y2) / 2.0 - 2.0 / k);
			ctx.set_text_align("start");
		}
		ctx.set_global_alpha(1.0);
	}
}

fn draw_node(
	ctx: &CanvasRenderingContext2d,
	(x, y): (f64, f64),
	radius: f64,
	fill: &str,
	border: &str,
	k: f64,
) {
	ctx.begin_path();
	let _ = ctx.arc(x, y, radius, 0.0, 2.0 * PI);
	ctx.set_fill_style_str(fill);
	ctx.fill();
	ctx.set_stroke_style_str(border);
	ctx.set_line_width(1.5 / k);
	ctx.stroke();
}

fn draw_nodes(state: &ForceGraphState, ctx: &CanvasRenderingContext2d) {
	let (has_highlight, t, k) = (
		state.has_active_highlight(),
		ease_out_cubic(state.hover.highlight_t),
		state.transform.k,
	);
	let font = format!("{}px sans-serif", 10.0 / k.max(0.5));

	state.graph.visit_nodes(|node| {
		let idx = node.index();
		if has_highlight && state.is_highlighted(idx) {
			return;
		}
		let info = &node.data.user_data;
		let pos = (node.x() as f64, node.y() as f64);
		let (alpha, radius) = (1.0 - 0.7 * t, info.radius * (1.0 - 0.15 * t));

		ctx.set_global_alpha(alpha);
		draw_node(ctx, pos, radius, &info.fill, &info.border, k);
		ctx.set_global_alpha(1.0);

		ctx.set_fill_style_str(&format!("rgba(255, 255, 255, {})", alpha * 0.8));
		ctx.set_font(&font);
		let _ = ctx.fill_text(&info.label, pos.0 + radius + 3.0, pos.1 + 3.0);
	});

	if !has_highlight {
		return;
	}

	state.graph.visit_nodes(|node| {
		let idx = node.index();
		if !state.is_highlighted(idx) {
			return;
		}
		let info = &node.data.user_data;
		let (x, y) = (node.x() as f64, node.y() as f64);
		let radius = if state.is_hovered(idx) {
			info.radius * (1.0 + 0.35 * t)
		} else {
			info.radius * (1.0 + 0.2 * t)
		};

		draw_node(ctx, (x, y), radius, &info.fill, &info.border, k);
		if state.is_hovered(idx) && t > 0.01 {
			ctx.begin_path();
			let _ = ctx.arc(x, y, radius + 2.0 / k, 0.0, 2.0 * PI);
			ctx.set_stroke_style_str(&format!("rgba(255, 255, 255, {})", 0.7 * t));
			ctx.set_line_width(1.5 / k);
			ctx.stroke();
		}

		ctx.set_fill_style_str("white");
		ctx.set_font(&font);
		let _ = ctx.fill_text(&info.label, x + radius + 3.0, y + 3.0);
	});
}
