//! Server process start/stop state machine.
//!
//! # States
//! ```text
//! NotStarted → Running → ShuttingDown → Stopped
//!                                     ↘ ForceStopped
//! ```
//!
//! `start` binds, spawns the accept loop and registers one stop hook. The
//! hook signals drain and races the accept loop against the graceful
//! deadline. When the deadline wins, the accept loop is aborted, which drops
//! every connection task it owns, and the aborted task is awaited so nothing
//! outlives the hook.

use std::fmt;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use axum::Router;
use tokio::sync::watch;
use tokio::task::{JoinHandle, JoinSet};

use crate::config::ListenerConfig;
use crate::lifecycle::coordinator::{Coordinator, ShutdownHook};
use crate::lifecycle::error::{HookError, StartError};
use crate::net::connection::{serve_connection, ConnectionTracker};
use crate::net::listener::{Listener, ListenerError};
use crate::observability::metrics;

/// Which protocol a process serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProcessKind {
    /// Plain request/response handlers.
    Http,
    /// Remote-procedure server.
    Rpc,
    /// REST-to-RPC gateway, static docs and health probes.
    Gateway,
}

impl ProcessKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessKind::Http => "http",
            ProcessKind::Rpc => "rpc",
            ProcessKind::Gateway => "gateway",
        }
    }
}

impl fmt::Display for ProcessKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle state of a server process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    NotStarted,
    Running,
    ShuttingDown,
    Stopped,
    ForceStopped,
}

impl ProcessState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ProcessState::Stopped | ProcessState::ForceStopped)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessState::NotStarted => "not_started",
            ProcessState::Running => "running",
            ProcessState::ShuttingDown => "shutting_down",
            ProcessState::Stopped => "stopped",
            ProcessState::ForceStopped => "force_stopped",
        }
    }
}

impl fmt::Display for ProcessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A configured, not yet started server.
pub struct ServerProcess {
    kind: ProcessKind,
    listener: ListenerConfig,
    router: Router,
    deadline: Duration,
}

impl ServerProcess {
    pub fn new(kind: ProcessKind, listener: ListenerConfig, router: Router, deadline: Duration) -> Self {
        Self {
            kind,
            listener,
            router,
            deadline,
        }
    }

    pub fn kind(&self) -> ProcessKind {
        self.kind
    }

    /// Bind, start accepting in the background and register the stop hook.
    pub async fn start(self, coordinator: &Coordinator) -> Result<ProcessHandle, StartError> {
        let (state_tx, state_rx) = watch::channel(ProcessState::NotStarted);
        let state = Arc::new(state_tx);

        let listener = Listener::bind(&self.listener)
            .await
            .map_err(|source| StartError::Bind {
                process: self.kind.to_string(),
                address: self.listener.bind_address.clone(),
                source,
            })?;
        let local_addr = listener.local_addr().map_err(|e| StartError::Bind {
            process: self.kind.to_string(),
            address: self.listener.bind_address.clone(),
            source: ListenerError::Bind(e),
        })?;

        let (drain_tx, drain_rx) = watch::channel(false);
        let tracker = ConnectionTracker::new();
        let task = tokio::spawn(accept_loop(
            self.kind,
            listener,
            self.router,
            drain_rx,
            tracker.clone(),
        ));
        set_state(self.kind, &state, ProcessState::Running);

        let stopper = Arc::new(Stopper {
            kind: self.kind,
            deadline: self.deadline,
            drain: drain_tx,
            task: Mutex::new(Some(task)),
            state: Arc::clone(&state),
        });

        let hook_stopper = Arc::clone(&stopper);
        let hook = ShutdownHook::new(self.kind.as_str(), move || Arc::clone(&hook_stopper).stop());
        if let Err(e) = coordinator.add(hook) {
            stopper.abort();
            set_state(self.kind, &state, ProcessState::ForceStopped);
            return Err(e.into());
        }

        tracing::info!(
            process = %self.kind,
            address = %local_addr,
            deadline = ?self.deadline,
            "Server started"
        );

        Ok(ProcessHandle {
            kind: self.kind,
            local_addr,
            state: state_rx,
            tracker,
        })
    }
}

/// Observer for a started process.
#[derive(Debug, Clone)]
pub struct ProcessHandle {
    kind: ProcessKind,
    local_addr: SocketAddr,
    state: watch::Receiver<ProcessState>,
    tracker: ConnectionTracker,
}

impl ProcessHandle {
    pub fn kind(&self) -> ProcessKind {
        self.kind
    }

    /// Address the listener actually bound (resolves port 0).
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn state(&self) -> ProcessState {
        *self.state.borrow()
    }

    pub fn active_connections(&self) -> u64 {
        self.tracker.active_count()
    }

    /// Wait for `Stopped` or `ForceStopped`.
    pub async fn wait_stopped(&self) -> ProcessState {
        let mut rx = self.state.clone();
        let waited = rx.wait_for(ProcessState::is_terminal).await.map(|state| *state);
        waited.unwrap_or_else(|_| *rx.borrow())
    }
}

struct Stopper {
    kind: ProcessKind,
    deadline: Duration,
    drain: watch::Sender<bool>,
    task: Mutex<Option<JoinHandle<()>>>,
    state: Arc<watch::Sender<ProcessState>>,
}

impl Stopper {
    fn take_task(&self) -> Option<JoinHandle<()>> {
        self.task.lock().unwrap_or_else(PoisonError::into_inner).take()
    }

    fn abort(&self) {
        if let Some(task) = self.take_task() {
            task.abort();
        }
    }

    async fn stop(self: Arc<Self>) -> Result<(), HookError> {
        let Some(mut task) = self.take_task() else {
            tracing::debug!(process = %self.kind, "Stop already requested");
            return Ok(());
        };

        tracing::info!(process = %self.kind, "Stopping server");
        set_state(self.kind, &self.state, ProcessState::ShuttingDown);
        self.drain.send_replace(true);

        let result = match tokio::time::timeout(self.deadline, &mut task).await {
            Ok(joined) => {
                if let Err(e) = joined {
                    tracing::warn!(process = %self.kind, error = %e, "Accept loop ended abnormally");
                }
                tracing::info!(process = %self.kind, "Server gracefully stopped");
                Ok(ProcessState::Stopped)
            }
            Err(elapsed) => {
                task.abort();
                // Wait for the aborted loop and its connections to be dropped.
                let _ = task.await;
                tracing::warn!(
                    process = %self.kind,
                    deadline = ?self.deadline,
                    "Graceful stop deadline exceeded, server force stopped"
                );
                Err(HookError::Timeout {
                    process: self.kind.to_string(),
                    deadline: self.deadline,
                    source: elapsed,
                })
            }
        };

        let terminal = match &result {
            Ok(state) => *state,
            Err(_) => ProcessState::ForceStopped,
        };
        set_state(self.kind, &self.state, terminal);
        result.map(|_| ())
    }
}

fn set_state(kind: ProcessKind, state: &watch::Sender<ProcessState>, next: ProcessState) {
    let previous = state.send_replace(next);
    tracing::debug!(process = %kind, from = %previous, to = %next, "Process state changed");
    metrics::record_process_state(kind.as_str(), next.as_str());
}

async fn accept_loop(
    kind: ProcessKind,
    listener: Listener,
    router: Router,
    mut drain: watch::Receiver<bool>,
    tracker: ConnectionTracker,
) {
    let mut connections = JoinSet::new();

    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, peer, permit)) => {
                    let guard = tracker.track();
                    tracing::trace!(process = %kind, peer_addr = %peer, connection_id = %guard.id(), "Serving connection");
                    metrics::record_active_connections(kind.as_str(), tracker.active_count());
                    connections.spawn(serve_connection(stream, router.clone(), drain.clone(), guard, permit));
                }
                Err(e) => {
                    tracing::warn!(process = %kind, error = %e, "Accept failed");
                    tokio::time::sleep(Duration::from_millis(50)).await;
                }
            },
            _ = drain.changed() => break,
            Some(_) = connections.join_next(), if !connections.is_empty() => {
                metrics::record_active_connections(kind.as_str(), tracker.active_count());
            }
        }
    }

    drop(listener);
    tracing::info!(
        process = %kind,
        active_connections = tracker.active_count(),
        "Stopped accepting, draining connections"
    );

    while connections.join_next().await.is_some() {}
    metrics::record_active_connections(kind.as_str(), 0);
}
