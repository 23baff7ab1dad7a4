//! Panel state: refresh sequencing and model dedup.
//!
//! Every refresh gets a ticket carrying a monotonic sequence number. A result
//! is accepted only if its ticket is still the latest one issued, so a slow
//! superseded query can never overwrite a newer model.

use std::cell::RefCell;
use std::rc::Rc;

use log::{debug, warn};

use super::builder;
use super::model::GraphModel;
use super::query::{GraphQuerySource, NodeLimit, RawGraph, RefreshRequest};
use crate::error::ConnectivityError;

/// One issued refresh. Only the latest ticket resolves.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RefreshTicket {
	seq: u64,
	/// What to ask the query source for.
	pub request: RefreshRequest,
}

/// What a resolved query means for the panel.
#[derive(Clone, Debug, PartialEq)]
pub enum Resolution {
	/// A newer refresh was issued, or the panel was unmounted.
	Stale,
	/// The query failed; the previous model is kept.
	Failed(ConnectivityError),
	/// Same model as the one already shown.
	Unchanged,
	/// New current model, to be rendered and reported to the owner.
	Changed(GraphModel),
}

/// Refresh bookkeeping and the last accepted model.
#[derive(Debug)]
pub struct GraphPanelState {
	limit: NodeLimit,
	issued: u64,
	in_flight: bool,
	force_next: bool,
	current: Option<GraphModel>,
	error: Option<ConnectivityError>,
	unmounted: bool,
}

impl GraphPanelState {
	/// Nothing issued yet; the first accepted result is always emitted.
	pub fn new(limit: NodeLimit) -> Self {
		Self {
			limit,
			issued: 0,
			in_flight: false,
			force_next: true,
			current: None,
			error: None,
			unmounted: false,
		}
	}

	/// Limit used by the next refresh.
	pub fn limit(&self) -> NodeLimit {
		self.limit
	}

	/// Last accepted model. Kept across failures.
	pub fn current(&self) -> Option<&GraphModel> {
		self.current.as_ref()
	}

	/// Error of the latest resolved refresh, if it failed.
	pub fn error(&self) -> Option<&ConnectivityError> {
		self.error.as_ref()
	}

	/// A non-superseded refresh has not resolved yet.
	pub fn is_loading(&self) -> bool {
		self.in_flight
	}

	/// Issue a ticket, superseding any refresh still in flight.
	pub fn begin_refresh(&mut self) -> RefreshTicket {
		self.issued += 1;
		self.in_flight = true;
		RefreshTicket {
			seq: self.issued,
			request: RefreshRequest { limit: self.limit },
		}
	}

	/// Change the node limit. The next accepted result is emitted even when it
	/// equals the current model.
	pub fn set_limit(&mut self, limit: NodeLimit) -> RefreshTicket {
		self.limit = limit;
		self.force_next = true;
		self.begin_refresh()
	}

	/// Apply a query result to the panel.
	pub fn resolve(
		&mut self,
		ticket: RefreshTicket,
		result: Result<RawGraph, ConnectivityError>,
	) -> Resolution {
		if self.unmounted || ticket.seq != self.issued {
			debug!(
				"discarding result of refresh #{} (latest #{})",
				ticket.seq, self.issued
			);
			return Resolution::Stale;
		}
		self.in_flight = false;

		let raw = match result {
			Ok(raw) => raw,
			Err(err) => {
				warn!("graph query failed ({:?}): {}", err.kind, err.message);
				// The last good model stays the dedup baseline.
				self.error = Some(err.clone());
				return Resolution::Failed(err);
			}
		};
		self.error = None;

		let model = builder::build(&raw.nodes, &raw.relationships);
		if !self.force_next && self.current.as_ref() == Some(&model) {
			return Resolution::Unchanged;
		}
		self.force_next = false;
		self.current = Some(model.clone());
		Resolution::Changed(model)
	}

	/// Invalidate everything in flight. Later resolutions are all stale.
	pub fn unmount(&mut self) {
		self.unmounted = true;
		self.in_flight = false;
		self.issued += 1;
	}
}

/// Drives a [`GraphQuerySource`] against a shared [`GraphPanelState`].
pub struct GraphPanelController {
	state: Rc<RefCell<GraphPanelState>>,
	source: Rc<dyn GraphQuerySource>,
}

impl GraphPanelController {
	/// Controller querying `source` with `limit` until changed.
	pub fn new(source: Rc<dyn GraphQuerySource>, limit: NodeLimit) -> Self {
		Self {
			state: Rc::new(RefCell::new(GraphPanelState::new(limit))),
			source,
		}
	}

	/// Shared panel state.
	pub fn state(&self) -> &Rc<RefCell<GraphPanelState>> {
		&self.state
	}

	/// Query again with the current limit.
	pub async fn refresh(&self) -> Resolution {
		let ticket = self.state.borrow_mut().begin_refresh();
		self.run(ticket).await
	}

	/// Query with a new limit. The result is emitted even if unchanged.
	pub async fn change_limit(&self, limit: NodeLimit) -> Resolution {
		let ticket = self.state.borrow_mut().set_limit(limit);
		self.run(ticket).await
	}

	/// Discard every pending result.
	pub fn unmount(&self) {
		self.state.borrow_mut().unmount();
	}

	async fn run(&self, ticket: RefreshTicket) -> Resolution {
		let result = self.source.run_query(ticket.request).await;
		self.state.borrow_mut().resolve(ticket, result)
	}
}
