// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Embeddable runtime for the syllabus HTTP API.
//!
//! # Example
//!
//! ```rust,ignore
//! use syllabus_server::runtime::SyllabusRuntime;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let store = syllabus_core::store::connect("sqlite:syllabus.db").await?;
//!
//!     let runtime = SyllabusRuntime::builder()
//!         .store(store)
//!         .bind_addr("127.0.0.1:8080".parse()?)
//!         .build()?
//!         .start()
//!         .await?;
//!
//!     // ... run your application ...
//!
//!     runtime.shutdown().await?;
//!     Ok(())
//! }
//! ```

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info};

use syllabus_core::{BulkCreator, IdentityPolicy, RecordStore};

use crate::http::{self, AppState};

/// Builder for creating a [`SyllabusRuntime`].
pub struct SyllabusRuntimeBuilder {
    store: Option<Arc<dyn RecordStore>>,
    bind_addr: SocketAddr,
    policy: IdentityPolicy,
    api_keys: Vec<String>,
    max_batch_size: Option<usize>,
}

impl std::fmt::Debug for SyllabusRuntimeBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyllabusRuntimeBuilder")
            .field("store", &self.store.as_ref().map(|s| s.backend()))
            .field("bind_addr", &self.bind_addr)
            .field("policy", &self.policy)
            .field("max_batch_size", &self.max_batch_size)
            .finish()
    }
}

impl Default for SyllabusRuntimeBuilder {
    fn default() -> Self {
        Self {
            store: None,
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            policy: IdentityPolicy::require_subject(),
            api_keys: Vec::new(),
            max_batch_size: None,
        }
    }
}

impl SyllabusRuntimeBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the record store (required).
    pub fn store(mut self, store: Arc<dyn RecordStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Set the HTTP bind address.
    ///
    /// Default: `0.0.0.0:8080`. Port 0 picks a free port; read it back with
    /// [`SyllabusRuntime::bind_addr`].
    pub fn bind_addr(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Set the identity policy for writes.
    pub fn policy(mut self, policy: IdentityPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Keys accepted on the guest path.
    pub fn api_keys(mut self, keys: Vec<String>) -> Self {
        self.api_keys = keys;
        self
    }

    /// Reject batches larger than `max`.
    pub fn max_batch_size(mut self, max: usize) -> Self {
        self.max_batch_size = Some(max);
        self
    }

    /// Build the runtime configuration.
    ///
    /// Returns an error if required fields are missing.
    pub fn build(self) -> Result<SyllabusRuntimeConfig> {
        let store = self
            .store
            .ok_or_else(|| anyhow::anyhow!("store is required"))?;

        let mut creator = BulkCreator::new(store).with_policy(self.policy);
        if let Some(max) = self.max_batch_size {
            creator = creator.with_max_batch_size(max);
        }

        Ok(SyllabusRuntimeConfig {
            state: AppState::new(creator, self.api_keys),
            bind_addr: self.bind_addr,
        })
    }
}

/// Configuration for a [`SyllabusRuntime`].
#[derive(Debug)]
pub struct SyllabusRuntimeConfig {
    state: AppState,
    bind_addr: SocketAddr,
}

impl SyllabusRuntimeConfig {
    /// Bind the listener and spawn the HTTP server task.
    pub async fn start(self) -> Result<SyllabusRuntime> {
        let listener = TcpListener::bind(self.bind_addr).await?;
        let bind_addr = listener.local_addr()?;
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let app = http::router(self.state.clone());
        let server_handle = tokio::spawn(serve_with_shutdown(listener, app, shutdown_rx));

        info!(
            addr = %bind_addr,
            backend = self.state.creator().store().backend(),
            "SyllabusRuntime started"
        );

        Ok(SyllabusRuntime {
            server_handle,
            shutdown_tx,
            state: self.state,
            bind_addr,
        })
    }
}

/// A running HTTP API that can be embedded in an application.
///
/// Call [`shutdown`](Self::shutdown) for graceful termination.
pub struct SyllabusRuntime {
    server_handle: JoinHandle<Result<()>>,
    shutdown_tx: watch::Sender<bool>,
    state: AppState,
    bind_addr: SocketAddr,
}

impl std::fmt::Debug for SyllabusRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyllabusRuntime")
            .field("bind_addr", &self.bind_addr)
            .field("running", &self.is_running())
            .finish()
    }
}

impl SyllabusRuntime {
    /// Create a new builder for configuring the runtime.
    pub fn builder() -> SyllabusRuntimeBuilder {
        SyllabusRuntimeBuilder::new()
    }

    /// Address the HTTP server is listening on.
    pub fn bind_addr(&self) -> SocketAddr {
        self.bind_addr
    }

    /// Shared handler state.
    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Gracefully shut down the runtime.
    ///
    /// Stops accepting connections, lets in-flight requests finish and waits
    /// for the server task.
    pub async fn shutdown(self) -> Result<()> {
        info!("SyllabusRuntime shutting down...");

        let _ = self.shutdown_tx.send(true);

        match self.server_handle.await {
            Ok(Ok(())) => {
                info!("SyllabusRuntime shutdown complete");
                Ok(())
            }
            Ok(Err(e)) => {
                error!("SyllabusRuntime server error during shutdown: {}", e);
                Err(e)
            }
            Err(e) => {
                error!("SyllabusRuntime server task panicked: {}", e);
                Err(anyhow::anyhow!("server task panicked: {}", e))
            }
        }
    }

    /// Check if the runtime is still running.
    pub fn is_running(&self) -> bool {
        !self.server_handle.is_finished()
    }
}

async fn serve_with_shutdown(
    listener: TcpListener,
    app: axum::Router,
    mut shutdown_rx: watch::Receiver<bool>,
) -> Result<()> {
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            while shutdown_rx.changed().await.is_ok() {
                if *shutdown_rx.borrow() {
                    break;
                }
            }
            info!("HTTP server received shutdown signal");
        })
        .await?;

    info!("HTTP server stopped");
    Ok(())
}
