//! The process-wide upstream session and its single-flight initialization.
//!
//! ```text
//! Empty ──ensure_session──► Pending(shared attempt) ──ok──► Ready(session)
//!   ▲                              │
//!   └───────────── err ────────────┘
//! ```
//!
//! Every caller that arrives while an attempt is `Pending` awaits that same
//! attempt. The attempt runs in its own task and settles the slot itself, so
//! it completes even if every caller that was waiting on it goes away.

use chrono::{DateTime, Utc};
use futures::future::{BoxFuture, FutureExt, Shared};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use super::{Upstream, UpstreamConnector};
use crate::catalog::{CatalogMirror, ToolDispatcher};
use crate::paths::{FileUploader, PathVirtualizer};
use crate::types::{Error, Result, UpstreamConfig};

/// The one outbound session plus the tool catalog snapshot taken when it opened.
#[derive(Debug)]
pub struct UpstreamSession {
    upstream: Arc<dyn Upstream>,
    authorization: String,
    dispatcher: ToolDispatcher,
    created_at: DateTime<Utc>,
}

impl UpstreamSession {
    pub fn upstream(&self) -> &Arc<dyn Upstream> {
        &self.upstream
    }

    /// The `Authorization` value the session was opened with.
    pub fn authorization(&self) -> &str {
        &self.authorization
    }

    pub fn dispatcher(&self) -> &ToolDispatcher {
        &self.dispatcher
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

type Attempt = Shared<BoxFuture<'static, std::result::Result<Arc<UpstreamSession>, String>>>;

enum Slot {
    Empty,
    Pending { attempt: u64, future: Attempt },
    Ready(Arc<UpstreamSession>),
}

impl fmt::Debug for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Slot::Empty => f.write_str("Empty"),
            Slot::Pending { attempt, .. } => write!(f, "Pending({})", attempt),
            Slot::Ready(_) => f.write_str("Ready"),
        }
    }
}

#[derive(Debug)]
struct SlotState {
    slot: Slot,
    attempts: u64,
}

/// Everything an initialization attempt needs, cloned into its task.
#[derive(Debug, Clone)]
struct SessionFactory {
    connector: Arc<dyn UpstreamConnector>,
    mirror: CatalogMirror,
    uploader: Arc<dyn FileUploader>,
    paths: Arc<PathVirtualizer>,
    filepath_field: String,
    call_timeout: Duration,
}

impl SessionFactory {
    async fn open(&self, authorization: String) -> Result<UpstreamSession> {
        let upstream = self.connector.connect(&authorization).await?;
        let registry = self.mirror.mirror(upstream.as_ref()).await?;
        let dispatcher = ToolDispatcher::new(
            Arc::new(registry),
            upstream.clone(),
            self.uploader.clone(),
            self.paths.clone(),
            self.filepath_field.clone(),
            self.call_timeout,
        );
        Ok(UpstreamSession {
            upstream,
            authorization,
            dispatcher,
            created_at: Utc::now(),
        })
    }
}

/// Guards the session slot. Cheap to share behind an `Arc`.
#[derive(Debug)]
pub struct SessionManager {
    state: Arc<Mutex<SlotState>>,
    factory: SessionFactory,
}

impl SessionManager {
    pub fn new(
        connector: Arc<dyn UpstreamConnector>,
        uploader: Arc<dyn FileUploader>,
        paths: Arc<PathVirtualizer>,
        config: &UpstreamConfig,
    ) -> Self {
        Self {
            state: Arc::new(Mutex::new(SlotState {
                slot: Slot::Empty,
                attempts: 0,
            })),
            factory: SessionFactory {
                connector,
                mirror: CatalogMirror::from_config(config),
                uploader,
                paths,
                filepath_field: config.filepath_field.clone(),
                call_timeout: config.tool_call_timeout,
            },
        }
    }

    /// Return the session, opening it with `authorization` if none exists.
    ///
    /// A failed attempt is reported to all of its waiters as
    /// `Error::UpstreamUnavailable` and leaves the slot empty.
    pub async fn ensure_session(&self, authorization: &str) -> Result<Arc<UpstreamSession>> {
        let future = {
            let mut state = self.state.lock().await;
            match &state.slot {
                Slot::Ready(session) => return Ok(session.clone()),
                Slot::Pending { future, .. } => future.clone(),
                Slot::Empty => {
                    state.attempts += 1;
                    let attempt = state.attempts;
                    let future = self.start_attempt(attempt, authorization.to_string());
                    state.slot = Slot::Pending {
                        attempt,
                        future: future.clone(),
                    };
                    future
                }
            }
        };

        future.await.map_err(Error::upstream_unavailable)
    }

    /// The session if it is already open.
    pub async fn current(&self) -> Option<Arc<UpstreamSession>> {
        match &self.state.lock().await.slot {
            Slot::Ready(session) => Some(session.clone()),
            _ => None,
        }
    }

    /// Number of initialization attempts started so far.
    pub async fn attempts(&self) -> u64 {
        self.state.lock().await.attempts
    }

    fn start_attempt(&self, attempt: u64, authorization: String) -> Attempt {
        let factory = self.factory.clone();
        let state = self.state.clone();

        let handle = tokio::spawn(async move {
            tracing::info!(attempt, "opening upstream session");
            let outcome = factory.open(authorization).await.map(Arc::new);

            let mut state = state.lock().await;
            let current = matches!(&state.slot, Slot::Pending { attempt: a, .. } if *a == attempt);
            match &outcome {
                Ok(session) => {
                    tracing::info!(
                        attempt,
                        tools = session.dispatcher().registry().len(),
                        "upstream session ready"
                    );
                    if current {
                        state.slot = Slot::Ready(session.clone());
                    }
                }
                Err(err) => {
                    tracing::error!(attempt, error = %err, "upstream session initialization failed");
                    if current {
                        state.slot = Slot::Empty;
                    }
                }
            }
            outcome.map_err(|e| e.to_string())
        });

        async move {
            match handle.await {
                Ok(outcome) => outcome,
                Err(join_err) => Err(format!("session initialization task failed: {}", join_err)),
            }
        }
        .boxed()
        .shared()
    }
}
