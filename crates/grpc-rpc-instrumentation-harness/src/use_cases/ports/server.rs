use async_trait::async_trait;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use super::Collector;
use crate::agent::Agent;
use crate::entities::Service;
use crate::error::HarnessError;

/// Trait for gRPC server implementations
#[async_trait]
pub trait Server: Send + Sync + Clone {
    /// Bind and start serving `services`.
    ///
    /// Every routed call is recorded as a transaction on `agent`, and every
    /// inbound request message is passed to `collector`. Returns once the
    /// listener is bound; the server keeps running until the handle is shut
    /// down or dropped.
    async fn start<C>(
        &self,
        services: Vec<Service>,
        collector: C,
        agent: Agent,
    ) -> Result<ServerHandle<C>, HarnessError>
    where
        C: Collector + 'static;
}

/// A running server
pub struct ServerHandle<C: Collector> {
    addr: SocketAddr,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
    collector: Arc<Mutex<Option<C>>>,
}

impl<C: Collector> ServerHandle<C> {
    pub fn new(
        addr: SocketAddr,
        shutdown_tx: oneshot::Sender<()>,
        task: JoinHandle<()>,
        collector: Arc<Mutex<Option<C>>>,
    ) -> Self {
        Self {
            addr,
            shutdown_tx: Some(shutdown_tx),
            task: Some(task),
            collector,
        }
    }

    /// The address the server actually bound to
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Stop accepting connections and return the collector's output
    pub async fn shutdown(mut self) -> Result<C::Output, HarnessError> {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(task) = self.task.take() {
            task.await
                .map_err(|e| HarnessError::ServerError(e.to_string()))?;
        }

        let collector = self
            .collector
            .lock()
            .map_err(|e| HarnessError::ServerError(e.to_string()))?
            .take()
            .ok_or_else(|| HarnessError::ServerError("Collector already taken".to_string()))?;

        Ok(collector.into_output())
    }
}

impl<C: Collector> Drop for ServerHandle<C> {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}
