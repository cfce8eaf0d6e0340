//! HTTP routes
//!
//! | Method | Path        | Success | Broadcast                |
//! |--------|-------------|---------|--------------------------|
//! | GET    | `/todos`    | 200     | `listed` on `query`      |
//! | GET    | `/todo/:id` | 200     | `fetched` on `query`     |
//! | POST   | `/todo`     | 201     | `created` on `mutation`  |
//! | PUT    | `/todo/:id` | 200     | `updated` on `mutation`  |
//! | DELETE | `/todo/:id` | 200     | `deleted` on `mutation`  |
//!
//! Anything else falls through to the WebSocket upgrade.
//!
//! Every route runs inside a [`RequestLifecycle`]; the broadcast is issued
//! only after the response has been produced, and never for aborted or
//! failed requests. A panic anywhere in a route is answered with a 500.

use std::any::Any;
use std::fmt::Display;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::Router;
use bytes::Bytes;
use futures::{FutureExt, Stream};
use serde::de::DeserializeOwned;

use super::body::RequestBodyAggregator;
use super::handler::TodoHandler;
use super::lifecycle::{Outcome, Reply, RequestLifecycle};
use super::response::{parse_id, ApiError};
use super::ws;
use crate::registry::{ConnectionId, TodoEvent};
use crate::store::{NewTodo, TodoPatch};
use crate::worker::{BroadcastDispatcher, LoopHandle};

/// Per-worker state shared by every request that worker serves
pub struct AppState<H: TodoHandler> {
    pub handler: Arc<H>,
    pub dispatcher: BroadcastDispatcher,
    /// Loop owning this worker's subscription registry
    pub local: LoopHandle,
    pub max_body_size: usize,
    connection_ids: Arc<AtomicU64>,
}

impl<H: TodoHandler> AppState<H> {
    pub fn new(
        handler: Arc<H>,
        dispatcher: BroadcastDispatcher,
        local: LoopHandle,
        max_body_size: usize,
        connection_ids: Arc<AtomicU64>,
    ) -> Self {
        Self {
            handler,
            dispatcher,
            local,
            max_body_size,
            connection_ids,
        }
    }

    /// Index of the worker serving this state
    pub fn worker(&self) -> usize {
        self.local.index()
    }

    /// Allocate a process-wide unique connection id
    pub fn next_connection_id(&self) -> ConnectionId {
        self.connection_ids.fetch_add(1, Ordering::Relaxed)
    }

    /// GET /todos
    pub fn list(&self) -> Outcome {
        let lifecycle = RequestLifecycle::new("list_todos");
        let result = self.handler.list().map_err(ApiError::from).and_then(|todos| {
            let event = TodoEvent::Listed {
                worker: self.worker(),
                todos: todos.clone(),
            };
            Reply::json(StatusCode::OK, &todos)?.with_event(&event)
        });
        lifecycle.complete(result, &self.dispatcher)
    }

    /// GET /todo/:id
    pub fn fetch(&self, raw_id: &str) -> Outcome {
        let lifecycle = RequestLifecycle::new("get_todo");
        let result = parse_id(raw_id).and_then(|id| {
            let todo = self.handler.get(id)?.ok_or(ApiError::NotFound(id))?;
            let event = TodoEvent::Fetched {
                worker: self.worker(),
                todo: todo.clone(),
            };
            Reply::json(StatusCode::OK, &todo)?.with_event(&event)
        });
        lifecycle.complete(result, &self.dispatcher)
    }

    /// POST /todo
    pub async fn create<S, E>(&self, body: S) -> Outcome
    where
        S: Stream<Item = Result<Bytes, E>>,
        E: Display,
    {
        let lifecycle = RequestLifecycle::new("create_todo");
        let bytes = match self.read_body(&lifecycle, body).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return lifecycle.abort(),
            Err(err) => return lifecycle.complete(Err(err), &self.dispatcher),
        };

        let result = parse_json::<NewTodo>(&bytes).and_then(|new| {
            let todo = self.handler.create(new)?;
            let event = TodoEvent::Created {
                worker: self.worker(),
                todo: todo.clone(),
            };
            Reply::json(StatusCode::CREATED, &todo)?.with_event(&event)
        });
        lifecycle.complete(result, &self.dispatcher)
    }

    /// PUT /todo/:id
    pub async fn update<S, E>(&self, raw_id: &str, body: S) -> Outcome
    where
        S: Stream<Item = Result<Bytes, E>>,
        E: Display,
    {
        let lifecycle = RequestLifecycle::new("update_todo");
        let id = match parse_id(raw_id) {
            Ok(id) => id,
            Err(err) => return lifecycle.complete(Err(err), &self.dispatcher),
        };

        let bytes = match self.read_body(&lifecycle, body).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return lifecycle.abort(),
            Err(err) => return lifecycle.complete(Err(err), &self.dispatcher),
        };

        let result = parse_json::<TodoPatch>(&bytes).and_then(|patch| {
            let todo = self.handler.update(id, patch)?;
            let event = TodoEvent::Updated {
                worker: self.worker(),
                todo: todo.clone(),
            };
            Reply::json(StatusCode::OK, &todo)?.with_event(&event)
        });
        lifecycle.complete(result, &self.dispatcher)
    }

    /// DELETE /todo/:id
    pub fn remove(&self, raw_id: &str) -> Outcome {
        let lifecycle = RequestLifecycle::new("delete_todo");
        let result = parse_id(raw_id).and_then(|id| {
            let todo = self.handler.delete(id)?.ok_or(ApiError::NotFound(id))?;
            let event = TodoEvent::Deleted {
                worker: self.worker(),
                todo: todo.clone(),
            };
            Reply::json(StatusCode::OK, &todo)?.with_event(&event)
        });
        lifecycle.complete(result, &self.dispatcher)
    }

    async fn read_body<S, E>(
        &self,
        lifecycle: &RequestLifecycle,
        body: S,
    ) -> Result<Option<Bytes>, ApiError>
    where
        S: Stream<Item = Result<Bytes, E>>,
        E: Display,
    {
        let aggregator = RequestBodyAggregator::new(self.max_body_size, lifecycle.cancellation());
        let bytes = aggregator.collect(body).await?;

        // Raised after the last chunk but before the store was touched
        if lifecycle.is_aborted() {
            return Ok(None);
        }
        Ok(bytes)
    }
}

impl<H: TodoHandler> Clone for AppState<H> {
    fn clone(&self) -> Self {
        Self {
            handler: Arc::clone(&self.handler),
            dispatcher: self.dispatcher.clone(),
            local: self.local.clone(),
            max_body_size: self.max_body_size,
            connection_ids: Arc::clone(&self.connection_ids),
        }
    }
}

fn parse_json<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, ApiError> {
    serde_json::from_slice(bytes).map_err(|e| ApiError::InvalidPayload(e.to_string()))
}

/// Build the router for one worker
pub fn router<H: TodoHandler>(state: AppState<H>) -> Router {
    Router::new()
        .route("/todos", get(list_todos::<H>))
        .route("/todo", post(create_todo::<H>))
        .route(
            "/todo/:id",
            get(get_todo::<H>)
                .put(update_todo::<H>)
                .delete(delete_todo::<H>),
        )
        .fallback(ws::upgrade::<H>)
        .with_state(state)
}

async fn list_todos<H: TodoHandler>(State(state): State<AppState<H>>) -> Outcome {
    catch_panic("list_todos", async move { state.list() }).await
}

async fn get_todo<H: TodoHandler>(
    State(state): State<AppState<H>>,
    Path(id): Path<String>,
) -> Outcome {
    catch_panic("get_todo", async move { state.fetch(&id) }).await
}

async fn create_todo<H: TodoHandler>(State(state): State<AppState<H>>, body: Body) -> Outcome {
    catch_panic("create_todo", async move {
        state.create(body.into_data_stream()).await
    })
    .await
}

async fn update_todo<H: TodoHandler>(
    State(state): State<AppState<H>>,
    Path(id): Path<String>,
    body: Body,
) -> Outcome {
    catch_panic("update_todo", async move {
        state.update(&id, body.into_data_stream()).await
    })
    .await
}

async fn delete_todo<H: TodoHandler>(
    State(state): State<AppState<H>>,
    Path(id): Path<String>,
) -> Outcome {
    catch_panic("delete_todo", async move { state.remove(&id) }).await
}

/// Run a route, answering a panic with the generic 500
async fn catch_panic<F>(route: &'static str, route_future: F) -> Outcome
where
    F: Future<Output = Outcome>,
{
    match AssertUnwindSafe(route_future).catch_unwind().await {
        Ok(outcome) => outcome,
        Err(panic) => {
            let detail = panic_message(panic.as_ref());
            tracing::error!(route, error = %detail, "Route panicked");
            Outcome::Responded(ApiError::Internal(detail).into_response())
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
