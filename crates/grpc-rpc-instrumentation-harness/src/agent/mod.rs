//! In-memory recording agent.
//!
//! Server and client gateways report into an [`Agent`]; tests read back
//! finished transactions, the metrics table and traced errors.

mod active;
mod context;
mod instrument;
pub mod naming;

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::broadcast;

use crate::config::AgentConfig;
use crate::entities::{
    ApdexZone, MetricsTable, TracedError, Transaction, TransactionKind,
};

pub use active::{SegmentId, TransactionHandle};
pub use context::current_transaction;
pub use instrument::{ExternalCallRecorder, ServerCallRecorder};

const FINISHED_CHANNEL_CAPACITY: usize = 256;

#[derive(Default)]
struct AgentState {
    transactions: Vec<Transaction>,
    metrics: MetricsTable,
    errors: Vec<TracedError>,
}

struct AgentInner {
    config: AgentConfig,
    state: Mutex<AgentState>,
    finished: broadcast::Sender<Transaction>,
}

/// Records finished transactions and rolls their metrics up
#[derive(Clone)]
pub struct Agent {
    inner: Arc<AgentInner>,
}

impl Default for Agent {
    fn default() -> Self {
        Self::new(AgentConfig::default())
    }
}

impl Agent {
    pub fn new(config: AgentConfig) -> Self {
        let (finished, _) = broadcast::channel(FINISHED_CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(AgentInner {
                config,
                state: Mutex::new(AgentState::default()),
                finished,
            }),
        }
    }

    pub fn config(&self) -> &AgentConfig {
        &self.inner.config
    }

    fn state(&self) -> MutexGuard<'_, AgentState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Start a transaction with an exact name
    pub fn start_transaction(&self, name: impl Into<String>, kind: TransactionKind) -> TransactionHandle {
        TransactionHandle::start(self.clone(), name.into(), kind)
    }

    /// Run `fut` inside a web transaction named `WebTransaction/Custom/<name>`.
    ///
    /// Calls made by `fut` through an instrumented client are recorded as
    /// external segments of this transaction.
    pub async fn in_transaction<F: Future>(&self, name: &str, fut: F) -> (F::Output, Transaction) {
        self.run_in(name, TransactionKind::Web, fut).await
    }

    /// Like [`Agent::in_transaction`], with `OtherTransaction/Custom/<name>`
    pub async fn in_background_transaction<F: Future>(
        &self,
        name: &str,
        fut: F,
    ) -> (F::Output, Transaction) {
        self.run_in(name, TransactionKind::Background, fut).await
    }

    async fn run_in<F: Future>(&self, name: &str, kind: TransactionKind, fut: F) -> (F::Output, Transaction) {
        let handle = self.start_transaction(naming::custom_transaction_name(name, kind), kind);
        let output = context::scope(handle.clone(), fut).await;
        (output, handle.finish())
    }

    /// Receiver of every transaction finished after this call
    pub fn subscribe(&self) -> broadcast::Receiver<Transaction> {
        self.inner.finished.subscribe()
    }

    pub fn transactions(&self) -> Vec<Transaction> {
        self.state().transactions.clone()
    }

    /// Most recently finished transaction with this name
    pub fn find_transaction(&self, name: &str) -> Option<Transaction> {
        self.state()
            .transactions
            .iter()
            .rev()
            .find(|tx| tx.name == name)
            .cloned()
    }

    pub fn metrics(&self) -> MetricsTable {
        self.state().metrics.clone()
    }

    pub fn errors(&self) -> Vec<TracedError> {
        self.state().errors.clone()
    }

    pub(crate) fn transaction_finished(&self, transaction: &Transaction) {
        let apdex_t = self.config().apdex_threshold();
        {
            let mut state = self.state();
            record_metrics(&mut state.metrics, transaction, apdex_t);
            state.errors.extend(transaction.errors.iter().cloned());
            state.transactions.push(transaction.clone());
        }

        tracing::debug!(
            name = %transaction.name,
            id = %transaction.id,
            trace_id = %transaction.trace_id,
            errors = transaction.errors.len(),
            "transaction finished"
        );

        // No receivers is fine
        let _ = self.inner.finished.send(transaction.clone());
    }
}

fn record_metrics(table: &mut MetricsTable, tx: &Transaction, apdex_t: std::time::Duration) {
    let zone = if tx.errors.is_empty() {
        ApdexZone::classify(tx.duration, apdex_t)
    } else {
        ApdexZone::Frustrating
    };

    for spec in naming::transaction_metric_names(&tx.name, tx.kind) {
        let stats = table.entry(&spec.name, None);
        if spec.name.starts_with("Apdex") {
            stats.record_apdex(zone);
        } else {
            stats.record(tx.duration);
        }
    }

    if !tx.errors.is_empty() {
        for spec in naming::error_metric_names(&tx.name, tx.kind) {
            for _ in &tx.errors {
                table.entry(&spec.name, None).call_count += 1;
            }
        }
    }

    for segment in tx.trace.descendants() {
        if !segment.name.starts_with(naming::EXTERNAL_PREFIX) {
            continue;
        }
        for spec in naming::external_metric_names(&segment.name, &tx.name, tx.kind) {
            table.record(&spec.name, spec.scope.as_deref(), segment.duration);
        }
    }
}
