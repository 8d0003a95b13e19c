//! Assertion helpers over agent state.
//!
//! Each helper panics with an expected-vs-actual message, failing only the
//! test that called it.

use serde_json::{json, Value};
use tonic::Code;

use crate::agent::naming;
use crate::entities::{
    is_traceparent_shaped, Destinations, MethodPath, MetricSpec, MetricsTable, Transaction,
};

/// Destination mask the transaction attribute checks read through
pub const ATTRIBUTE_DESTINATIONS: Destinations = Destinations::TRANS_EVENT.union(Destinations::ERROR_EVENT);

/// Name, status, method and URI of a server-side gRPC transaction
#[track_caller]
pub fn assert_server_transaction(transaction: &Transaction, path: &MethodPath, expected_status: Code) {
    let expected_name = naming::server_transaction_name(path);
    assert_eq!(
        transaction.name, expected_name,
        "server transaction should be named {expected_name}"
    );

    let attributes = transaction.attributes.get(ATTRIBUTE_DESTINATIONS);
    let uri = path.path();
    assert_eq!(
        attributes.get("response.status"),
        Some(&json!(i32::from(expected_status))),
        "response.status should be {expected_status:?}"
    );
    assert_eq!(
        attributes.get("request.method"),
        Some(&Value::from(uri.clone())),
        "request.method should be {uri}"
    );
    assert_eq!(
        attributes.get("request.uri"),
        Some(&Value::from(uri.clone())),
        "request.uri should be {uri}"
    );
}

/// Every row in `expected` is present; values are not checked
#[track_caller]
pub fn assert_metrics_exist(metrics: &MetricsTable, expected: &[MetricSpec]) {
    let missing: Vec<String> = expected
        .iter()
        .filter(|spec| metrics.lookup(spec).is_none())
        .map(ToString::to_string)
        .collect();
    assert!(
        missing.is_empty(),
        "expected metrics to exist: {missing:?}; recorded: {:?}",
        metrics.names().collect::<Vec<_>>()
    );
}

/// None of the rows in `unexpected` is present
#[track_caller]
pub fn assert_metrics_absent(metrics: &MetricsTable, unexpected: &[MetricSpec]) {
    let present: Vec<String> = unexpected
        .iter()
        .filter(|spec| metrics.lookup(spec).is_some())
        .map(ToString::to_string)
        .collect();
    assert!(
        present.is_empty(),
        "expected metrics to be absent: {present:?}"
    );
}

/// Web transaction rollups for a server call, plus error rollups when
/// `expected_status` is not OK
#[track_caller]
pub fn assert_server_metrics(metrics: &MetricsTable, path: &MethodPath, expected_status: Code) {
    let mut expected = naming::server_metric_names(path);
    if expected_status != Code::Ok {
        expected.extend(naming::error_metric_names(
            &naming::server_transaction_name(path),
            crate::entities::TransactionKind::Web,
        ));
    }
    assert_metrics_exist(metrics, &expected);
}

/// External segment of a client call and its rollup metrics
#[track_caller]
pub fn assert_external_segment(
    transaction: &Transaction,
    metrics: &MetricsTable,
    host: &str,
    port: u16,
    path: &MethodPath,
    expected_status: Code,
    expected_status_text: &str,
) {
    let segment_name = naming::external_segment_name(host, port, path);
    let segment = transaction.segment(&segment_name).unwrap_or_else(|| {
        let recorded: Vec<&str> = transaction
            .trace
            .descendants()
            .into_iter()
            .map(|s| s.name.as_str())
            .collect();
        panic!("expected segment {segment_name} in {}; found {recorded:?}", transaction.name)
    });

    let attributes = segment.attributes.get(Destinations::SPAN_EVENT);
    let expected = [
        ("http.url", Value::from(naming::external_url(host, port, path))),
        ("procedure", Value::from(path.path())),
        ("grpc.statusCode", json!(i32::from(expected_status))),
        ("grpc.statusText", Value::from(expected_status_text)),
        ("component", Value::from(naming::COMPONENT)),
    ];
    for (key, value) in expected {
        assert_eq!(
            attributes.get(key),
            Some(&value),
            "segment attribute {key} should be {value}"
        );
    }

    assert_metrics_exist(
        metrics,
        &naming::external_metric_names(&segment_name, &transaction.name, transaction.kind),
    );
}

/// The client's external metrics for `path` were not recorded at all
#[track_caller]
pub fn assert_external_metrics_absent(metrics: &MetricsTable, host: &str, port: u16, path: &MethodPath) {
    let segment_name = naming::external_segment_name(host, port, path);
    let host_rollup = format!("{}{host}:{port}/all", naming::EXTERNAL_PREFIX);
    assert_metrics_absent(
        metrics,
        &[
            MetricSpec::unscoped(segment_name),
            MetricSpec::unscoped(host_rollup),
            MetricSpec::unscoped("External/allWeb"),
            MetricSpec::unscoped("External/allOther"),
            MetricSpec::unscoped("External/all"),
        ],
    );
}

/// Client and server transactions belong to one distributed trace
#[track_caller]
pub fn assert_distributed_trace(client: &Transaction, server: &Transaction) {
    assert_ne!(
        client.id, server.id,
        "client and server transactions should have different ids"
    );

    let attributes = server.attributes.get(ATTRIBUTE_DESTINATIONS);
    let traceparent = attributes
        .get("request.headers.traceparent")
        .and_then(Value::as_str)
        .unwrap_or_default();
    assert!(
        is_traceparent_shaped(traceparent),
        "request.headers.traceparent should be a traceparent, got {traceparent:?}"
    );
    assert_eq!(
        attributes.get("request.headers.newrelic"),
        Some(&Value::from("")),
        "request.headers.newrelic should be empty"
    );

    assert_eq!(
        client.trace_id, server.trace_id,
        "client and server should share a trace id"
    );
}

/// No distributed-trace headers reached the server
#[track_caller]
pub fn assert_no_distributed_trace(server: &Transaction) {
    let attributes = server.attributes.get(ATTRIBUTE_DESTINATIONS);
    for key in ["request.headers.traceparent", "request.headers.newrelic"] {
        assert!(
            !attributes.contains_key(key),
            "{key} should not be recorded, got {:?}",
            attributes.get(key)
        );
    }
}
