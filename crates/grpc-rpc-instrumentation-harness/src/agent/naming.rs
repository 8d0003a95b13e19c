//! Transaction, segment and metric names produced by the instrumentation.
//!
//! The assertion helpers build their expectations from the same functions,
//! so the two sides cannot drift apart.

use crate::entities::{MethodPath, MetricSpec, TransactionKind};

pub const SERVER_TRANSACTION_PREFIX: &str = "WebTransaction/WebFrameworkUri/gRPC/";
pub const WEB_TRANSACTION_PREFIX: &str = "WebTransaction/";
pub const OTHER_TRANSACTION_PREFIX: &str = "OtherTransaction/";
pub const EXTERNAL_PREFIX: &str = "External/";
pub const COMPONENT: &str = "gRPC";

/// `WebTransaction/WebFrameworkUri/gRPC//<service>/<method>`
pub fn server_transaction_name(path: &MethodPath) -> String {
    format!("{SERVER_TRANSACTION_PREFIX}{path}")
}

pub fn custom_transaction_name(name: &str, kind: TransactionKind) -> String {
    match kind {
        TransactionKind::Web => format!("{WEB_TRANSACTION_PREFIX}Custom/{name}"),
        TransactionKind::Background => format!("{OTHER_TRANSACTION_PREFIX}Custom/{name}"),
    }
}

/// `External/<host>:<port>/<service>/<method>`
pub fn external_segment_name(host: &str, port: u16, path: &MethodPath) -> String {
    format!("{EXTERNAL_PREFIX}{host}:{port}{path}")
}

/// `grpc://<host>:<port>/<service>/<method>`
pub fn external_url(host: &str, port: u16, path: &MethodPath) -> String {
    format!("grpc://{host}:{port}{path}")
}

/// Transaction name without its `WebTransaction/` or `OtherTransaction/` prefix
pub fn partial_name(transaction_name: &str) -> &str {
    transaction_name
        .split_once('/')
        .map(|(_, rest)| rest)
        .unwrap_or(transaction_name)
}

/// Rows rolled up for every finished transaction of the given kind
pub fn transaction_metric_names(transaction_name: &str, kind: TransactionKind) -> Vec<MetricSpec> {
    let partial = partial_name(transaction_name);
    match kind {
        TransactionKind::Web => vec![
            MetricSpec::unscoped("WebTransaction"),
            MetricSpec::unscoped("WebTransactionTotalTime"),
            MetricSpec::unscoped("HttpDispatcher"),
            MetricSpec::unscoped(transaction_name),
            MetricSpec::unscoped(format!("WebTransactionTotalTime/{partial}")),
            MetricSpec::unscoped(format!("Apdex/{partial}")),
            MetricSpec::unscoped("Apdex"),
        ],
        TransactionKind::Background => vec![
            MetricSpec::unscoped("OtherTransaction/all"),
            MetricSpec::unscoped("OtherTransactionTotalTime"),
            MetricSpec::unscoped(transaction_name),
            MetricSpec::unscoped(format!("OtherTransactionTotalTime/{partial}")),
        ],
    }
}

/// Rows for a server-side gRPC transaction
pub fn server_metric_names(path: &MethodPath) -> Vec<MetricSpec> {
    transaction_metric_names(&server_transaction_name(path), TransactionKind::Web)
}

/// Rows added when a transaction carries at least one traced error
pub fn error_metric_names(transaction_name: &str, kind: TransactionKind) -> Vec<MetricSpec> {
    let rollup = match kind {
        TransactionKind::Web => "Errors/allWeb",
        TransactionKind::Background => "Errors/allOther",
    };
    vec![
        MetricSpec::unscoped("Errors/all"),
        MetricSpec::unscoped(rollup),
        MetricSpec::unscoped(format!("Errors/{transaction_name}")),
    ]
}

/// Rows for one external segment: per method (scoped and unscoped), per host
/// and the global rollups
pub fn external_metric_names(
    segment_name: &str,
    scope: &str,
    kind: TransactionKind,
) -> Vec<MetricSpec> {
    let host = segment_name
        .strip_prefix(EXTERNAL_PREFIX)
        .and_then(|rest| rest.split_once('/'))
        .map(|(host, _)| host)
        .unwrap_or_default();
    let rollup = match kind {
        TransactionKind::Web => "External/allWeb",
        TransactionKind::Background => "External/allOther",
    };
    vec![
        MetricSpec::scoped(segment_name, scope),
        MetricSpec::unscoped(segment_name),
        MetricSpec::unscoped(format!("{EXTERNAL_PREFIX}{host}/all")),
        MetricSpec::unscoped(rollup),
        MetricSpec::unscoped("External/all"),
    ]
}
