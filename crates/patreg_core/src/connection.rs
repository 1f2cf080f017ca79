//! Process-wide connection ownership.
//!
//! # Responsibility
//! - Own the single engine handle and its lifecycle.
//! - Coalesce concurrent first-time callers onto one construction attempt.
//! - Run the schema bootstrap exactly once per successful construction.
//!
//! # Invariants
//! - The slot moves `Absent -> Constructing -> Ready`, or back to `Absent`
//!   when construction fails. `Ready` is never left.
//! - At most one construction is in flight at any time.
//! - Failures are handed to every waiter of that attempt and never cached.

use crate::config::DbConfig;
use crate::db::DbError;
use crate::engine::{Engine, EngineHandle, QueryOutcome, SqlValue};
use futures::future::{BoxFuture, FutureExt, Shared};
use log::{error, info};
use once_cell::sync::OnceCell;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

static GLOBAL_MANAGER: OnceCell<ConnectionManager> = OnceCell::new();

type ConnectAttempt = Shared<BoxFuture<'static, Result<EngineHandle, ConnectionError>>>;

/// Fatal failure to bring the engine up (start or schema bootstrap).
///
/// Cloneable so one failed attempt can be reported to every waiter.
#[derive(Debug, Clone)]
pub struct ConnectionError {
    source: Arc<DbError>,
}

impl ConnectionError {
    /// Underlying storage error that aborted construction.
    pub fn db_error(&self) -> &DbError {
        &self.source
    }
}

impl Display for ConnectionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "database connection failed: {}", self.source)
    }
}

impl Error for ConnectionError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(self.source.as_ref())
    }
}

impl From<DbError> for ConnectionError {
    fn from(value: DbError) -> Self {
        Self {
            source: Arc::new(value),
        }
    }
}

/// Construction counters, mainly for diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConnectionStats {
    /// Engine start attempts.
    pub constructions: u64,
    /// Schema bootstrap runs.
    pub bootstraps: u64,
}

enum Slot {
    Absent,
    Constructing {
        generation: u64,
        attempt: ConnectAttempt,
    },
    Ready(EngineHandle),
}

#[derive(Default)]
struct Counters {
    constructions: AtomicU64,
    bootstraps: AtomicU64,
}

struct Inner {
    config: DbConfig,
    slot: Mutex<Slot>,
    generations: AtomicU64,
    counters: Arc<Counters>,
}

/// Owner of the single engine handle.
///
/// Clones share the same slot; hand clones to every component that queries.
#[derive(Clone)]
pub struct ConnectionManager {
    inner: Arc<Inner>,
}

impl ConnectionManager {
    pub fn new(config: DbConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                slot: Mutex::new(Slot::Absent),
                generations: AtomicU64::new(0),
                counters: Arc::new(Counters::default()),
            }),
        }
    }

    /// Installs the process-wide manager.
    ///
    /// Repeating the call with the same config is a no-op; a different
    /// config after installation is rejected.
    pub fn install_global(config: DbConfig) -> Result<(), String> {
        let manager = GLOBAL_MANAGER.get_or_init(|| Self::new(config.clone()));
        if manager.config() != &config {
            return Err(format!(
                "connection manager already installed with {:?}; refusing to switch to {:?}",
                manager.config().location,
                config.location
            ));
        }
        Ok(())
    }

    /// Returns the process-wide manager, configured from the environment
    /// when `install_global` was never called.
    pub fn global() -> &'static ConnectionManager {
        GLOBAL_MANAGER.get_or_init(|| Self::new(DbConfig::from_env()))
    }

    pub fn config(&self) -> &DbConfig {
        &self.inner.config
    }

    /// Returns the live engine handle, constructing it on first use.
    ///
    /// Concurrent callers during construction await the same attempt.
    ///
    /// # Errors
    /// - `ConnectionError` when the engine fails to start or the schema
    ///   bootstrap fails. The slot is cleared so a later call retries.
    pub async fn connection(&self) -> Result<EngineHandle, ConnectionError> {
        let (generation, attempt) = {
            let mut slot = self.lock_slot();
            let in_flight = match &*slot {
                Slot::Ready(handle) => return Ok(handle.clone()),
                Slot::Constructing {
                    generation,
                    attempt,
                } => Some((*generation, attempt.clone())),
                Slot::Absent => None,
            };
            match in_flight {
                Some(pending) => pending,
                None => {
                    let generation = self.inner.generations.fetch_add(1, Ordering::SeqCst) + 1;
                    let attempt = construct(
                        self.inner.config.clone(),
                        Arc::clone(&self.inner.counters),
                        generation,
                    )
                    .boxed()
                    .shared();
                    *slot = Slot::Constructing {
                        generation,
                        attempt: attempt.clone(),
                    };
                    (generation, attempt)
                }
            }
        };

        let result = attempt.await;
        self.settle(generation, &result);
        result
    }

    /// Runs a free-text statement with positional bind values.
    ///
    /// Never returns an error: connection and statement failures both come
    /// back as `success == false` with a readable message.
    pub async fn execute(&self, sql: impl Into<String>, params: Vec<SqlValue>) -> QueryOutcome {
        match self.connection().await {
            Ok(engine) => engine.execute(sql, params).await,
            Err(err) => QueryOutcome::failure(err.to_string()),
        }
    }

    /// Returns whether a ready handle is cached.
    pub fn is_ready(&self) -> bool {
        matches!(&*self.lock_slot(), Slot::Ready(_))
    }

    pub fn stats(&self) -> ConnectionStats {
        let counters = &self.inner.counters;
        ConnectionStats {
            constructions: counters.constructions.load(Ordering::SeqCst),
            bootstraps: counters.bootstraps.load(Ordering::SeqCst),
        }
    }

    fn settle(&self, generation: u64, result: &Result<EngineHandle, ConnectionError>) {
        let mut slot = self.lock_slot();
        let owns_slot = matches!(
            &*slot,
            Slot::Constructing { generation: current, .. } if *current == generation
        );
        if !owns_slot {
            return;
        }

        *slot = match result {
            Ok(handle) => Slot::Ready(handle.clone()),
            Err(_) => Slot::Absent,
        };
    }

    fn lock_slot(&self) -> MutexGuard<'_, Slot> {
        self.inner
            .slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

async fn construct(
    config: DbConfig,
    counters: Arc<Counters>,
    generation: u64,
) -> Result<EngineHandle, ConnectionError> {
    let started_at = Instant::now();
    counters.constructions.fetch_add(1, Ordering::SeqCst);
    info!(
        "event=db_connect module=connection status=start generation={} mode={}",
        generation,
        config.location.mode()
    );

    let result = async {
        let handle = Engine::start(&config).await?;
        counters.bootstraps.fetch_add(1, Ordering::SeqCst);
        handle.bootstrap().await?;
        Ok::<_, DbError>(handle)
    }
    .await;

    match result {
        Ok(handle) => {
            info!(
                "event=db_connect module=connection status=ok generation={} duration_ms={}",
                generation,
                started_at.elapsed().as_millis()
            );
            Ok(handle)
        }
        Err(err) => {
            error!(
                "event=db_connect module=connection status=error generation={} duration_ms={} error={}",
                generation,
                started_at.elapsed().as_millis(),
                err
            );
            Err(err.into())
        }
    }
}
