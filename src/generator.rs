//! Random message producer
//!
//! A plain thread that sleeps for a random interval and then broadcasts a
//! timestamped line on the `random` topic. It only talks to the server
//! through the [`BroadcastDispatcher`].

use std::fmt::Display;
use std::thread::JoinHandle;
use std::time::Duration;

use chrono::{DateTime, Local, TimeZone};
use rand::Rng;

use crate::registry::BroadcastEvent;
use crate::server::RandomConfig;
use crate::worker::BroadcastDispatcher;

const MESSAGE_PREFIX: &str = "Random todo update from mock server: ";

/// Start the producer thread
///
/// The thread exits once no worker loop accepts its broadcasts anymore.
pub fn spawn(dispatcher: BroadcastDispatcher, config: RandomConfig) -> std::io::Result<JoinHandle<()>> {
    std::thread::Builder::new()
        .name("todos-random".to_string())
        .spawn(move || run(dispatcher, config))
}

fn run(dispatcher: BroadcastDispatcher, config: RandomConfig) {
    let mut rng = rand::thread_rng();
    let min = config.min_interval.as_millis() as u64;
    let max = (config.max_interval.as_millis() as u64).max(min);

    tracing::debug!(min_ms = min, max_ms = max, "Random producer started");

    loop {
        std::thread::sleep(Duration::from_millis(rng.gen_range(min..=max)));

        let message = random_message(&Local::now());
        let reached = dispatcher.broadcast(BroadcastEvent::random(message));
        tracing::trace!(reached, "Random message broadcast");

        if reached == 0 && dispatcher.worker_count() > 0 {
            break;
        }
    }

    tracing::debug!("Random producer stopped");
}

/// Message text for the given instant, with a ctime-style timestamp
pub fn random_message<Tz>(now: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    format!("{MESSAGE_PREFIX}{}", now.format("%a %b %e %H:%M:%S %Y"))
}
