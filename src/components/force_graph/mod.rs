mod component;
mod engine;
mod lifecycle;
mod render;
mod state;
mod surface;
mod types;

pub use component::ForceGraphCanvas;
pub use lifecycle::LifecycleSettings;
