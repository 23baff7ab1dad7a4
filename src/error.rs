//! Error taxonomy for the query, build and render stages.

use serde::Serialize;
use thiserror::Error;

/// Which side of the query transport failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum ConnectivityKind {
	/// The transport itself could not be constructed.
	DriverUnavailable,
	/// The transport was reachable but the query was rejected or errored.
	QueryFailed,
}

/// A failed refresh. Recoverable by a manual refresh.
#[derive(Clone, Debug, Error, PartialEq)]
#[error("{kind:?}: {message}")]
pub struct ConnectivityError {
	/// Which side failed.
	pub kind: ConnectivityKind,
	/// Transport detail, for logs only.
	pub message: String,
}

impl ConnectivityError {
	/// The transport could not be set up.
	pub fn driver_unavailable(message: impl Into<String>) -> Self {
		Self {
			kind: ConnectivityKind::DriverUnavailable,
			message: message.into(),
		}
	}

	/// The query was sent and failed.
	pub fn query_failed(message: impl Into<String>) -> Self {
		Self {
			kind: ConnectivityKind::QueryFailed,
			message: message.into(),
		}
	}

	/// Message shown inline in place of the graph.
	pub const fn public_message(&self) -> &'static str {
		match self.kind {
			ConnectivityKind::DriverUnavailable => "The graph database is not available.",
			ConnectivityKind::QueryFailed => "The graph query failed.",
		}
	}
}

/// Reason a raw record was left out of the canonical model.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub(crate) enum BuildError {
	/// The record is not a JSON object.
	#[error("{kind} record #{index} is not an object")]
	NotAnObject { kind: &'static str, index: usize },
	/// None of the id fields holds a usable value.
	#[error("node record #{index} has no identity")]
	MissingIdentity { index: usize },
	/// A relationship without a start or end id.
	#[error("relationship record #{index} is missing its {end} endpoint")]
	MissingEndpoint { index: usize, end: &'static str },
	/// A relationship without a type.
	#[error("relationship record #{index} has no type")]
	MissingType { index: usize },
}

/// The layout engine could not be bound to the display surface.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum LifecycleInitError {
	/// No drawing context, or the region has no size.
	#[error("display surface unavailable: {0}")]
	SurfaceUnavailable(String),
	/// The surface was unmounted; it cannot host another engine.
	#[error("display surface was removed")]
	SurfaceDetached,
	/// The engine rejected the data it was given.
	#[error("layout engine could not be created: {0}")]
	Engine(String),
	/// A resize, click or timer registration failed.
	#[error("could not register {0} listener")]
	Listener(&'static str),
}

/// One step of a best-effort teardown that did not complete cleanly.
#[derive(Clone, Debug, Error, PartialEq)]
#[error("{step} failed during teardown: {message}")]
pub struct TeardownError {
	/// Name of the released resource.
	pub step: &'static str,
	/// What went wrong.
	pub message: String,
}

impl TeardownError {
	/// Failure releasing `step`.
	pub fn new(step: &'static str, message: impl Into<String>) -> Self {
		Self {
			step,
			message: message.into(),
		}
	}
}

/// Invalid panel configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
	/// Not JSON, or the wrong shape.
	#[error("config is not valid JSON: {0}")]
	Parse(#[from] serde_json::Error),
	/// Well-formed but inconsistent.
	#[error("invalid config: {0}")]
	Invalid(String),
}
