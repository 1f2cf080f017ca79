//! Process-wide database readiness signal.
//!
//! # Responsibility
//! - Publish whether the persistence layer came up during startup.
//! - Let consumers gate their work on `ready` and show `message` otherwise.
//!
//! # Invariants
//! - Starts as `loading`; settles exactly once to ready or failed.
//! - Later publications are ignored; there is no retry loop here.

use crate::connection::ConnectionManager;
use log::{error, info, warn};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

/// User-facing text published when the database cannot be brought up.
pub const DATABASE_UNAVAILABLE_MESSAGE: &str =
    "The database failed to load. Reload the application to try again.";

static GLOBAL_SIGNAL: Lazy<ReadinessSignal> = Lazy::new(ReadinessSignal::new);

/// Snapshot consumed by UI components.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DbStatus {
    pub loading: bool,
    pub ready: bool,
    pub message: Option<String>,
}

impl DbStatus {
    pub fn loading() -> Self {
        Self {
            loading: true,
            ready: false,
            message: None,
        }
    }

    pub fn ready() -> Self {
        Self {
            loading: false,
            ready: true,
            message: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            loading: false,
            ready: false,
            message: Some(message.into()),
        }
    }
}

impl Default for DbStatus {
    fn default() -> Self {
        Self::loading()
    }
}

/// Observable, settle-once readiness state.
#[derive(Debug)]
pub struct ReadinessSignal {
    status: watch::Sender<DbStatus>,
}

impl Default for ReadinessSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl ReadinessSignal {
    pub fn new() -> Self {
        let (status, _) = watch::channel(DbStatus::loading());
        Self { status }
    }

    /// Process-wide signal shared by all consumers.
    pub fn global() -> &'static ReadinessSignal {
        &GLOBAL_SIGNAL
    }

    pub fn current(&self) -> DbStatus {
        self.status.borrow().clone()
    }

    pub fn is_ready(&self) -> bool {
        self.status.borrow().ready
    }

    /// Receiver notified when the signal settles.
    pub fn subscribe(&self) -> watch::Receiver<DbStatus> {
        self.status.subscribe()
    }

    /// Waits until the signal leaves `loading`.
    pub async fn wait_settled(&self) -> DbStatus {
        let mut receiver = self.subscribe();
        let settled = match receiver.wait_for(|status| !status.loading).await {
            Ok(status) => status.clone(),
            Err(_) => self.current(),
        };
        settled
    }

    /// Marks the database ready. Returns `false` when already settled.
    pub fn publish_ready(&self) -> bool {
        self.settle(DbStatus::ready())
    }

    /// Marks the database failed. Returns `false` when already settled.
    pub fn publish_failure(&self, message: impl Into<String>) -> bool {
        self.settle(DbStatus::failed(message))
    }

    fn settle(&self, next: DbStatus) -> bool {
        let ready = next.ready;
        let applied = self.status.send_if_modified(|current| {
            if !current.loading {
                return false;
            }
            *current = next;
            true
        });

        if applied {
            info!("event=readiness module=readiness status=settled ready={ready}");
        } else {
            warn!("event=readiness module=readiness status=ignored ready={ready} reason=already_settled");
        }
        applied
    }
}

/// Brings the database up once and records the outcome in `signal`.
///
/// Returns the status visible after the attempt. A connection failure is
/// reported through the signal, not as an error.
pub async fn startup(manager: &ConnectionManager, signal: &ReadinessSignal) -> DbStatus {
    match manager.connection().await {
        Ok(_) => {
            signal.publish_ready();
        }
        Err(err) => {
            error!("event=readiness module=readiness status=error error={err}");
            signal.publish_failure(DATABASE_UNAVAILABLE_MESSAGE);
        }
    }
    signal.current()
}

#[cfg(test)]
mod tests {
    use super::{DbStatus, ReadinessSignal};

    #[test]
    fn starts_loading() {
        let signal = ReadinessSignal::new();
        assert_eq!(signal.current(), DbStatus::loading());
        assert!(!signal.is_ready());
    }

    #[test]
    fn settles_exactly_once() {
        let signal = ReadinessSignal::new();
        assert!(signal.publish_failure("down"));
        assert!(!signal.publish_ready());
        assert_eq!(signal.current(), DbStatus::failed("down"));
    }

    #[tokio::test]
    async fn subscribers_observe_settlement() {
        let signal = ReadinessSignal::new();
        let mut receiver = signal.subscribe();
        assert!(signal.publish_ready());
        receiver.changed().await.unwrap();
        assert_eq!(*receiver.borrow(), DbStatus::ready());
        assert_eq!(signal.wait_settled().await, DbStatus::ready());
    }
}
