//! Worker threads
//!
//! A worker is an OS thread with its own current-thread tokio runtime. The
//! runtime drives the worker's [`EventLoop`] and an axum server on a
//! listening socket bound with `SO_REUSEPORT`, so the kernel spreads incoming
//! connections across every worker sharing the port.

use std::net::SocketAddr;
use std::sync::mpsc;
use std::thread::JoinHandle;

use tokio::net::{TcpListener, TcpSocket};

use super::event_loop::EventLoop;
use crate::error::{Error, Result};
use crate::server::handler::TodoHandler;
use crate::server::routes::{router, AppState};

/// A running worker thread
#[derive(Debug)]
pub struct Worker {
    index: usize,
    local_addr: SocketAddr,
    thread: JoinHandle<()>,
}

impl Worker {
    /// Start a worker and wait until it is listening
    ///
    /// Returns the bind error if the worker could not claim `bind_addr`.
    pub fn spawn<H: TodoHandler>(
        event_loop: EventLoop,
        bind_addr: SocketAddr,
        backlog: u32,
        state: AppState<H>,
    ) -> Result<Self> {
        let index = event_loop.index();
        let (ready_tx, ready_rx) = mpsc::channel::<Result<SocketAddr>>();

        let thread = std::thread::Builder::new()
            .name(format!("todos-worker-{index}"))
            .spawn(move || {
                let runtime = match tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                {
                    Ok(runtime) => runtime,
                    Err(e) => {
                        let _ = ready_tx.send(Err(Error::Io(e)));
                        return;
                    }
                };

                runtime.block_on(async move {
                    let listener = match bind_listener(bind_addr, backlog) {
                        Ok(listener) => listener,
                        Err(source) => {
                            let _ = ready_tx.send(Err(Error::Bind {
                                worker: index,
                                addr: bind_addr,
                                source,
                            }));
                            return;
                        }
                    };

                    let local_addr = match listener.local_addr() {
                        Ok(addr) => addr,
                        Err(e) => {
                            let _ = ready_tx.send(Err(Error::Io(e)));
                            return;
                        }
                    };

                    tokio::spawn(event_loop.run());

                    tracing::info!(worker = index, addr = %local_addr, "Worker listening");
                    let _ = ready_tx.send(Ok(local_addr));

                    let app = router(state).into_make_service_with_connect_info::<SocketAddr>();
                    if let Err(e) = axum::serve(listener, app).await {
                        tracing::error!(worker = index, error = %e, "Worker server stopped");
                    }
                });
            })?;

        match ready_rx.recv() {
            Ok(Ok(local_addr)) => Ok(Self {
                index,
                local_addr,
                thread,
            }),
            Ok(Err(e)) => {
                let _ = thread.join();
                Err(e)
            }
            Err(_) => {
                let _ = thread.join();
                Err(Error::WorkerStartup(format!(
                    "worker {index} exited before listening"
                )))
            }
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// Address the worker is actually listening on
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Block until the worker thread exits
    pub fn join(self) -> std::thread::Result<()> {
        self.thread.join()
    }
}

/// Bind a listening socket that other workers can share
pub fn bind_listener(addr: SocketAddr, backlog: u32) -> std::io::Result<TcpListener> {
    let socket = if addr.is_ipv4() {
        TcpSocket::new_v4()?
    } else {
        TcpSocket::new_v6()?
    };

    socket.set_reuseaddr(true)?;
    #[cfg(all(unix, not(target_os = "solaris"), not(target_os = "illumos")))]
    socket.set_reuseport(true)?;

    socket.bind(addr)?;
    socket.listen(backlog)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_bind_ephemeral_port() {
        let listener = bind_listener("127.0.0.1:0".parse().unwrap(), 16).unwrap();
        let addr = listener.local_addr().unwrap();

        assert_ne!(addr.port(), 0);
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_two_listeners_share_port() {
        let first = bind_listener("127.0.0.1:0".parse().unwrap(), 16).unwrap();
        let addr = first.local_addr().unwrap();

        let second = bind_listener(addr, 16).unwrap();
        assert_eq!(second.local_addr().unwrap(), addr);
    }
}
