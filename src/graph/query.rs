//! Graph query sources.
//!
//! Uses web-sys fetch for WASM, reqwest for native.

use async_trait::async_trait;
use log::debug;
use serde::{Deserialize, Serialize};

use super::builder::RawRecord;
use crate::error::ConnectivityError;

/// Upper bound on the number of nodes a query may return. Always > 0.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct NodeLimit(u32);

impl NodeLimit {
	/// `None` for 0.
	pub const fn new(limit: u32) -> Option<Self> {
		if limit == 0 { None } else { Some(Self(limit)) }
	}

	/// Always > 0.
	pub const fn get(self) -> u32 {
		self.0
	}
}

impl Default for NodeLimit {
	fn default() -> Self {
		Self(50)
	}
}

impl TryFrom<u32> for NodeLimit {
	type Error = String;

	fn try_from(value: u32) -> Result<Self, Self::Error> {
		Self::new(value).ok_or_else(|| "node limit must be > 0".to_string())
	}
}

impl From<NodeLimit> for u32 {
	fn from(value: NodeLimit) -> Self {
		value.0
	}
}

/// Parameters of one query.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RefreshRequest {
	/// Maximum number of nodes to return.
	pub limit: NodeLimit,
}

/// Records as returned by the query transport.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RawGraph {
	/// Node records.
	#[serde(default)]
	pub nodes: Vec<RawRecord>,
	/// Relationship records. Also accepted as `edges`.
	#[serde(default, alias = "edges")]
	pub relationships: Vec<RawRecord>,
}

/// Issues one query per refresh.
#[async_trait(?Send)]
pub trait GraphQuerySource {
	/// Run the query once. Never retried.
	async fn run_query(&self, request: RefreshRequest) -> Result<RawGraph, ConnectivityError>;
}

/// In-memory graph. The limit truncates the node list only; relationships are
/// returned as-is, like a query that matched edges beyond the node window.
#[derive(Clone, Debug, Default)]
pub struct StaticQuerySource {
	graph: RawGraph,
}

impl StaticQuerySource {
	/// Serve `graph` for every query.
	pub fn new(graph: RawGraph) -> Self {
		Self { graph }
	}
}

#[async_trait(?Send)]
impl GraphQuerySource for StaticQuerySource {
	async fn run_query(&self, request: RefreshRequest) -> Result<RawGraph, ConnectivityError> {
		let limit = request.limit.get() as usize;
		Ok(RawGraph {
			nodes: self.graph.nodes.iter().take(limit).cloned().collect(),
			relationships: self.graph.relationships.clone(),
		})
	}
}

/// `GET {endpoint}?limit=N` returning `{nodes, relationships}`.
#[derive(Clone, Debug)]
pub struct HttpQuerySource {
	endpoint: String,
}

impl HttpQuerySource {
	/// Query `endpoint`. An empty endpoint fails every query as unavailable.
	pub fn new(endpoint: impl Into<String>) -> Self {
		Self {
			endpoint: endpoint.into(),
		}
	}

	fn url(&self, request: RefreshRequest) -> Result<String, ConnectivityError> {
		let endpoint = self.endpoint.trim();
		if endpoint.is_empty() {
			return Err(ConnectivityError::driver_unavailable(
				"no query endpoint configured",
			));
		}
		let separator = if endpoint.contains('?') { '&' } else { '?' };
		Ok(format!("{endpoint}{separator}limit={}", request.limit.get()))
	}

	#[cfg(target_arch = "wasm32")]
	async fn fetch(&self, url: &str) -> Result<RawGraph, ConnectivityError> {
		use wasm_bindgen::JsCast;
		use wasm_bindgen_futures::JsFuture;
		use web_sys::{Request, RequestInit, RequestMode, Response};

		let opts = RequestInit::new();
		opts.set_method("GET");
		opts.set_mode(RequestMode::Cors);

		let request = Request::new_with_str_and_init(url, &opts).map_err(|e| {
			ConnectivityError::driver_unavailable(format!("request error: {:?}", e))
		})?;
		let window =
			web_sys::window().ok_or_else(|| ConnectivityError::driver_unavailable("no window"))?;

		let resp_value = JsFuture::from(window.fetch_with_request(&request))
			.await
			.map_err(|e| ConnectivityError::query_failed(format!("fetch error: {:?}", e)))?;
		let resp: Response = resp_value
			.dyn_into()
			.map_err(|_| ConnectivityError::query_failed("response is not a Response"))?;
		if !resp.ok() {
			return Err(ConnectivityError::query_failed(format!(
				"HTTP {}",
				resp.status()
			)));
		}

		let text = JsFuture::from(resp.text().map_err(|e| {
			ConnectivityError::query_failed(format!("body promise error: {:?}", e))
		})?)
		.await
		.map_err(|e| ConnectivityError::query_failed(format!("body error: {:?}", e)))?
		.as_string()
		.unwrap_or_default();

		serde_json::from_str(&text)
			.map_err(|e| ConnectivityError::query_failed(format!("deserialize error: {}", e)))
	}

	#[cfg(not(target_arch = "wasm32"))]
	async fn fetch(&self, url: &str) -> Result<RawGraph, ConnectivityError> {
		let url = reqwest::Url::parse(url)
			.map_err(|e| ConnectivityError::driver_unavailable(format!("invalid endpoint: {e}")))?;
		let client = reqwest::Client::builder()
			.build()
			.map_err(|e| ConnectivityError::driver_unavailable(e.to_string()))?;

		let response = client
			.get(url)
			.send()
			.await
			.map_err(|e| ConnectivityError::query_failed(e.to_string()))?;
		if !response.status().is_success() {
			return Err(ConnectivityError::query_failed(format!(
				"HTTP {}",
				response.status()
			)));
		}

		response
			.json::<RawGraph>()
			.await
			.map_err(|e| ConnectivityError::query_failed(e.to_string()))
	}
}

#[async_trait(?Send)]
impl GraphQuerySource for HttpQuerySource {
	async fn run_query(&self, request: RefreshRequest) -> Result<RawGraph, ConnectivityError> {
		let url = self.url(request)?;
		debug!("querying {url}");
		self.fetch(&url).await
	}
}
