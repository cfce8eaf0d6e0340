//! Todo server startup
//!
//! Builds one event loop per worker, the dispatcher that reaches all of
//! them, and then starts the worker threads one after another. Each worker
//! binds its own socket on the shared port.

use std::net::SocketAddr;
use std::sync::atomic::AtomicU64;
use std::sync::Arc;

use crate::error::Result;
use crate::server::config::ServerConfig;
use crate::server::handler::TodoHandler;
use crate::server::routes::AppState;
use crate::worker::{BroadcastDispatcher, EventLoop, LoopHandle, Worker};

/// Multi-worker todo server
pub struct TodoServer<H: TodoHandler> {
    config: ServerConfig,
    handler: Arc<H>,
}

impl<H: TodoHandler> TodoServer<H> {
    /// Create a new server with the given configuration and handler
    pub fn new(config: ServerConfig, handler: H) -> Self {
        Self::with_shared_handler(config, Arc::new(handler))
    }

    /// Create a server around a handler the caller keeps a reference to
    pub fn with_shared_handler(config: ServerConfig, handler: Arc<H>) -> Self {
        Self { config, handler }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn handler(&self) -> &Arc<H> {
        &self.handler
    }

    /// Start every worker and return once all of them are listening
    ///
    /// Workers start in index order. If the configured port is 0, the port
    /// picked for worker 0 is reused by the others. The first worker that
    /// fails to bind aborts startup with its error.
    pub fn start(self) -> Result<RunningServer> {
        let workers = self.config.workers.max(1);

        let (loops, handles): (Vec<EventLoop>, Vec<LoopHandle>) =
            (0..workers).map(EventLoop::new).unzip();
        let dispatcher = BroadcastDispatcher::new(handles.clone());
        let connection_ids = Arc::new(AtomicU64::new(1));

        let mut bind_addr = self.config.bind_addr;
        let mut started = Vec::with_capacity(workers);

        for (event_loop, local) in loops.into_iter().zip(handles) {
            let state = AppState::new(
                Arc::clone(&self.handler),
                dispatcher.clone(),
                local,
                self.config.max_body_size,
                Arc::clone(&connection_ids),
            );

            let worker = Worker::spawn(event_loop, bind_addr, self.config.listen_backlog, state)
                .map_err(|e| {
                    tracing::error!(error = %e, "Worker failed to start");
                    e
                })?;

            bind_addr = worker.local_addr();
            started.push(worker);
        }

        tracing::info!(workers, addr = %bind_addr, "Todo server started");

        Ok(RunningServer {
            local_addr: bind_addr,
            dispatcher,
            workers: started,
        })
    }

    /// Start the server and block the calling thread while it runs
    pub fn run(self) -> Result<()> {
        self.start()?.wait();
        Ok(())
    }

    /// Get the bind address
    pub fn bind_addr(&self) -> SocketAddr {
        self.config.bind_addr
    }
}

/// Handle to a started server
#[derive(Debug)]
pub struct RunningServer {
    local_addr: SocketAddr,
    dispatcher: BroadcastDispatcher,
    workers: Vec<Worker>,
}

impl RunningServer {
    /// Address every worker is listening on
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Dispatcher reaching every worker's loop
    pub fn dispatcher(&self) -> &BroadcastDispatcher {
        &self.dispatcher
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Block until every worker thread has exited
    pub fn wait(self) {
        for worker in self.workers {
            let index = worker.index();
            if worker.join().is_err() {
                tracing::error!(worker = index, "Worker thread panicked");
            }
        }
    }
}
