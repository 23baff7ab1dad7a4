//! Category label to node style mapping.

use super::model::NodeStyle;

/// Fallback palette for categories without a fixed style.
const PALETTE: &[&str] = &[
	"#1f77b4", "#ff7f0e", "#2ca02c", "#d62728", "#9467bd", "#8c564b", "#e377c2", "#7f7f7f",
	"#bcbd22", "#17becf",
];

/// (category, fill, border)
const CATEGORY_STYLES: &[(&str, &str, &str)] = &[
	("person", "#4f9dde", "#2b6ca3"),
	("organization", "#f2a541", "#b3741c"),
	("company", "#f2a541", "#b3741c"),
	("document", "#7cc47f", "#4a8a4d"),
	("topic", "#c58ce0", "#8a55a6"),
	("concept", "#c58ce0", "#8a55a6"),
	("location", "#e36b6b", "#a33c3c"),
	("event", "#5ccfc7", "#2f8f88"),
	("project", "#e0c34f", "#a38a26"),
];

const DEFAULT_FILL: &str = "#97a3b4";
const DEFAULT_BORDER: &str = "#5d6878";

/// Style for a category token, case-insensitive. Total: unknown categories get
/// a stable palette entry and a missing category gets the default style.
pub fn style_for(category: Option<&str>) -> NodeStyle {
	let Some(category) = category.map(|c| c.trim().to_lowercase()) else {
		return default_style();
	};
	if category.is_empty() {
		return default_style();
	}
	if let Some((_, fill, border)) = CATEGORY_STYLES.iter().find(|(name, ..)| *name == category)
	{
		return NodeStyle::new(*fill, *border);
	}
	let fill = PALETTE[stable_hash(&category) as usize % PALETTE.len()];
	NodeStyle::new(fill, DEFAULT_BORDER)
}

/// Style of a node without any category.
pub fn default_style() -> NodeStyle {
	NodeStyle::new(DEFAULT_FILL, DEFAULT_BORDER)
}

// FNV-1a; std's hasher is randomly seeded per process.
fn stable_hash(value: &str) -> u64 {
	value.bytes().fold(0xcbf2_9ce4_8422_2325, |hash, byte| {
		(hash ^ byte as u64).wrapping_mul(0x0100_0000_01b3)
	})
}
