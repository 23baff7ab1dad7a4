//! Panel configuration.
//!
//! A CSR bundle has no process environment, so overrides are baked in at
//! build time from `GRAPH_PANEL_CONFIG` (a JSON document) and
//! `GRAPH_QUERY_ENDPOINT`.

use std::time::Duration;

use log::warn;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Force simulation and stabilization parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PhysicsConfig {
	/// Node repulsion.
	pub force_charge: f32,
	/// Edge attraction.
	pub force_spring: f32,
	/// Cap on the force applied to one node per step.
	pub force_max: f32,
	/// Cap on node velocity.
	pub node_speed: f32,
	/// Velocity kept between steps, 0..1.
	pub damping_factor: f32,
	/// Steps after which the layout counts as settled no matter what.
	pub max_iterations: u32,
	/// Largest per-node displacement (world units) still considered calm.
	pub settle_threshold: f32,
	/// Consecutive calm steps needed to report stabilization.
	pub calm_frames: u32,
}

impl Default for PhysicsConfig {
	fn default() -> Self {
		Self {
			force_charge: 150.0,
			force_spring: 0.05,
			force_max: 100.0,
			node_speed: 3000.0,
			damping_factor: 0.9,
			max_iterations: 1000,
			settle_threshold: 0.05,
			calm_frames: 30,
		}
	}
}

/// Everything the graph panel can be tuned with.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PanelConfig {
	/// Graph query endpoint. `None` serves the bundled sample graph.
	pub query_endpoint: Option<String>,
	/// Selected node limit on mount.
	pub default_node_limit: u32,
	/// Values offered by the node-limit selector.
	pub node_limits: Vec<u32>,
	/// Backstop after which the layout is frozen even if still moving.
	pub stabilization_timeout_ms: u64,
	/// Duration of the fit-to-view animation. 0 snaps.
	pub fit_animation_ms: u64,
	/// Layout simulation parameters.
	pub physics: PhysicsConfig,
}

impl Default for PanelConfig {
	fn default() -> Self {
		Self {
			query_endpoint: None,
			default_node_limit: 50,
			node_limits: vec![25, 50, 100, 200],
			stabilization_timeout_ms: 2000,
			fit_animation_ms: 500,
			physics: PhysicsConfig::default(),
		}
	}
}

impl PanelConfig {
	/// Parse and validate a JSON document. Missing fields take defaults.
	pub fn from_json(json: &str) -> Result<Self, ConfigError> {
		let config: Self = serde_json::from_str(json)?;
		config.validate()?;
		Ok(config)
	}

	/// Defaults overlaid with whatever was baked in at build time. An invalid
	/// baked-in document falls back to the defaults.
	pub fn from_build_env() -> Self {
		let mut config = match option_env!("GRAPH_PANEL_CONFIG") {
			Some(json) => Self::from_json(json).unwrap_or_else(|err| {
				warn!("ignoring GRAPH_PANEL_CONFIG: {err}");
				Self::default()
			}),
			None => Self::default(),
		};
		if let Some(endpoint) = option_env!("GRAPH_QUERY_ENDPOINT") {
			config.query_endpoint = Some(endpoint.to_string());
		}
		config
	}

	/// Reject configs the panel cannot honour.
	pub fn validate(&self) -> Result<(), ConfigError> {
		if self.node_limits.is_empty() {
			return Err(ConfigError::Invalid("nodeLimits must not be empty".into()));
		}
		if self.node_limits.contains(&0) {
			return Err(ConfigError::Invalid("node limits must be > 0".into()));
		}
		if !self.node_limits.contains(&self.default_node_limit) {
			return Err(ConfigError::Invalid(format!(
				"defaultNodeLimit {} is not one of {:?}",
				self.default_node_limit, self.node_limits
			)));
		}
		if self.stabilization_timeout_ms == 0 {
			return Err(ConfigError::Invalid(
				"stabilizationTimeoutMs must be > 0".into(),
			));
		}
		Ok(())
	}

	/// `stabilization_timeout_ms` as a duration.
	pub fn stabilization_timeout(&self) -> Duration {
		Duration::from_millis(self.stabilization_timeout_ms)
	}

	/// `fit_animation_ms` as a duration.
	pub fn fit_animation(&self) -> Duration {
		Duration::from_millis(self.fit_animation_ms)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn defaults_are_valid() {
		let config = PanelConfig::default();
		assert!(config.validate().is_ok());
		assert_eq!(config.stabilization_timeout(), Duration::from_secs(2));
		assert_eq!(config.node_limits, vec![25, 50, 100, 200]);
	}

	#[test]
	fn partial_json_keeps_defaults() {
		let config = PanelConfig::from_json(
			r#"{"queryEndpoint":"http://localhost:7474/graph","physics":{"calmFrames":5}}"#,
		)
		.unwrap();
		assert_eq!(
			config.query_endpoint.as_deref(),
			Some("http://localhost:7474/graph")
		);
		assert_eq!(config.physics.calm_frames, 5);
		assert_eq!(config.physics.max_iterations, 1000);
		assert_eq!(config.default_node_limit, 50);
	}

	#[test]
	fn default_limit_must_be_offered() {
		let err = PanelConfig::from_json(r#"{"defaultNodeLimit":75}"#).unwrap_err();
		assert!(matches!(err, ConfigError::Invalid(_)));
	}

	#[test]
	fn zero_limit_is_rejected() {
		let err = PanelConfig::from_json(r#"{"nodeLimits":[0,25],"defaultNodeLimit":25}"#)
			.unwrap_err();
		assert!(err.to_string().contains("> 0"));
	}

	#[test]
	fn malformed_json_is_a_parse_error() {
		assert!(matches!(
			PanelConfig::from_json("{"),
			Err(ConfigError::Parse(_))
		));
	}
}
