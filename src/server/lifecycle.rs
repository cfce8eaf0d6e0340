//! Single-terminal-response contract
//!
//! A [`RequestLifecycle`] is created when a request arrives and consumed by
//! exactly one of [`RequestLifecycle::complete`] or
//! [`RequestLifecycle::abort`]. Both take `self` by value, so a second
//! response cannot be produced. Dropping it unsettled counts as an abort.

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use super::body::CancellationFlag;
use super::response::ApiError;
use crate::registry::{BroadcastEvent, TodoEvent};
use crate::worker::BroadcastDispatcher;

/// Successful result of a route, plus the event it triggers
#[derive(Debug)]
pub struct Reply {
    status: StatusCode,
    body: String,
    event: Option<BroadcastEvent>,
}

impl Reply {
    /// JSON reply with the given status
    pub fn json<T: Serialize>(status: StatusCode, value: &T) -> Result<Self, ApiError> {
        Ok(Self {
            status,
            body: serde_json::to_string(value)?,
            event: None,
        })
    }

    /// Broadcast `event` once the reply has been turned into a response
    pub fn with_event(mut self, event: &TodoEvent) -> Result<Self, ApiError> {
        self.event = Some(event.to_broadcast()?);
        Ok(self)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

/// Terminal action taken for a request
#[derive(Debug)]
pub enum Outcome {
    /// A response was produced
    Responded(Response),
    /// The client went away; no record response is written
    Aborted,
}

impl Outcome {
    pub fn is_aborted(&self) -> bool {
        matches!(self, Outcome::Aborted)
    }
}

impl IntoResponse for Outcome {
    fn into_response(self) -> Response {
        match self {
            Outcome::Responded(response) => response,
            // axum must hand hyper a response. Only reachable after the request
            // body failed mid-stream: a departed peer never sees it, and a peer
            // that is still there gets a bare status and a closed connection.
            Outcome::Aborted => (
                StatusCode::from_u16(499).unwrap_or(StatusCode::BAD_REQUEST),
                [(header::CONNECTION, "close")],
            )
                .into_response(),
        }
    }
}

/// Tracks one request until its single terminal action
#[derive(Debug)]
pub struct RequestLifecycle {
    route: &'static str,
    cancel: CancellationFlag,
    settled: bool,
}

impl RequestLifecycle {
    pub fn new(route: &'static str) -> Self {
        Self {
            route,
            cancel: CancellationFlag::new(),
            settled: false,
        }
    }

    /// Flag shared with the body aggregator
    pub fn cancellation(&self) -> CancellationFlag {
        self.cancel.clone()
    }

    pub fn is_aborted(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Produce the response, then broadcast the reply's event
    ///
    /// If the request was aborted in the meantime neither happens.
    pub fn complete(
        mut self,
        result: Result<Reply, ApiError>,
        dispatcher: &BroadcastDispatcher,
    ) -> Outcome {
        self.settled = true;

        if self.cancel.is_cancelled() {
            tracing::debug!(route = self.route, "Request aborted, response dropped");
            return Outcome::Aborted;
        }

        match result {
            Ok(Reply {
                status,
                body,
                event,
            }) => {
                let response =
                    (status, [(header::CONTENT_TYPE, "application/json")], body).into_response();

                if let Some(event) = event {
                    dispatcher.broadcast(event);
                }

                Outcome::Responded(response)
            }
            Err(err) => {
                match &err {
                    ApiError::Internal(detail) => {
                        tracing::error!(route = self.route, error = %detail, "Request failed");
                    }
                    other => {
                        tracing::debug!(route = self.route, error = %other, "Request rejected");
                    }
                }
                Outcome::Responded(err.into_response())
            }
        }
    }

    /// Acknowledge that the client aborted
    pub fn abort(mut self) -> Outcome {
        self.settled = true;
        self.cancel.cancel();
        tracing::debug!(route = self.route, "Request aborted");
        Outcome::Aborted
    }
}

impl Drop for RequestLifecycle {
    fn drop(&mut self) {
        if !self.settled {
            self.cancel.cancel();
            tracing::debug!(route = self.route, "Request dropped before completion");
        }
    }
}
