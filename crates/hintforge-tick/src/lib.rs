//! Keepalive interval scheduler for Hintforge.
//!
//! The connection supervisor checks its socket on a fixed interval: ping
//! if a session exists, reconnect if not. [`KeepaliveScheduler`] produces
//! those check instants.
//!
//! # Disabled mode
//!
//! When `interval` is zero the scheduler is disabled and
//! [`KeepaliveScheduler::wait_for_tick`] pends forever.
//!
//! # Integration
//!
//! The scheduler sits inside the supervisor actor's `tokio::select!` loop:
//!
//! ```ignore
//! loop {
//!     tokio::select! {
//!         Some(cmd) = cmd_rx.recv() => { /* handle commands */ }
//!         _ = keepalive.wait_for_tick() => {
//!             /* ping or reconnect */
//!         }
//!     }
//! }
//! ```
//!
//! The supervisor pauses the scheduler on an explicit disconnect and
//! resumes it on the next connect.

use std::time::Duration;

use tokio::time::{self, Instant};
use tracing::{debug, trace};

pub struct KeepaliveScheduler {
    interval: Duration,
    next_tick: Option<Instant>,
    paused: bool,
}

impl KeepaliveScheduler {
    pub fn with_interval(interval: Duration) -> Self {
        if interval.is_zero() {
            debug!("keepalive scheduler created disabled");
        } else {
            debug!(?interval, "keepalive scheduler created");
        }
        Self {
            interval,
            next_tick: (!interval.is_zero()).then(|| Instant::now() + interval),
            paused: false,
        }
    }

    /// Waits until the next check is due.
    ///
    /// Pends forever while paused or disabled. A check that fires late
    /// does not trigger catch-up checks: the next one is scheduled a full
    /// interval after now.
    pub async fn wait_for_tick(&mut self) {
        let next = match self.next_tick {
            Some(next) if !self.paused => next,
            _ => return std::future::pending().await,
        };

        time::sleep_until(next).await;
        self.next_tick = Some(Instant::now() + self.interval);
        trace!("keepalive tick");
    }

    /// Stops checks until [`resume`](Self::resume). Idempotent.
    pub fn pause(&mut self) {
        if !self.paused {
            self.paused = true;
            debug!("keepalive paused");
        }
    }

    /// Restarts checks one full interval from now. Idempotent.
    pub fn resume(&mut self) {
        if self.paused {
            self.paused = false;
            if !self.interval.is_zero() {
                self.next_tick = Some(Instant::now() + self.interval);
            }
            debug!("keepalive resumed");
        }
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}
