//! Server configuration

use std::net::SocketAddr;
use std::time::Duration;

/// Legacy fixed listening port
pub const DEFAULT_PORT: u16 = 9001;

/// Server configuration options
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address every worker binds to
    pub bind_addr: SocketAddr,

    /// Number of worker threads (at least 1)
    pub workers: usize,

    /// Listen backlog for each worker socket
    pub listen_backlog: u32,

    /// Maximum accepted request body size in bytes
    pub max_body_size: usize,

    /// Random message producer settings
    pub random: RandomConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
            workers: 1,
            listen_backlog: 1024,
            max_body_size: 1024 * 1024, // 1MB
            random: RandomConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Create a new config with custom bind address
    pub fn with_addr(addr: SocketAddr) -> Self {
        Self {
            bind_addr: addr,
            ..Default::default()
        }
    }

    /// Set the bind address
    pub fn bind(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Set the number of workers (clamped to at least 1)
    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Set the listen backlog
    pub fn listen_backlog(mut self, backlog: u32) -> Self {
        self.listen_backlog = backlog;
        self
    }

    /// Set the maximum request body size
    pub fn max_body_size(mut self, size: usize) -> Self {
        self.max_body_size = size;
        self
    }

    /// Disable the random message producer
    pub fn disable_random(mut self) -> Self {
        self.random.enabled = false;
        self
    }

    /// Set the random producer's interval bounds
    pub fn random_interval(mut self, min: Duration, max: Duration) -> Self {
        self.random.min_interval = min.min(max);
        self.random.max_interval = max.max(min);
        self
    }
}

/// Settings for the periodic random message producer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RandomConfig {
    /// Whether the producer runs at all
    pub enabled: bool,

    /// Shortest pause between messages
    pub min_interval: Duration,

    /// Longest pause between messages
    pub max_interval: Duration,
}

impl Default for RandomConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_interval: Duration::from_secs(1),
            max_interval: Duration::from_secs(5),
        }
    }
}
