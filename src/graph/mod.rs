//! Query results to canonical graph model, independent of any display.

pub mod builder;
pub mod color;
pub mod model;
pub mod panel;
pub mod query;

pub use builder::build;
pub use model::{CanonicalEdge, CanonicalNode, EdgeStyle, GraphModel, NodeId, NodeStyle};
pub use panel::{GraphPanelController, GraphPanelState, Resolution};
pub use query::{
	GraphQuerySource, HttpQuerySource, NodeLimit, RawGraph, RefreshRequest, StaticQuerySource,
};
