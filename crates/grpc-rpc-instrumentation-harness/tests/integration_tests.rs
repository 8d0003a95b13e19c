//! Integration tests for grpc-rpc-instrumentation-harness
//!
//! Every test starts a real server on an ephemeral port and talks to it
//! through the instrumented client.

use grpc_rpc_instrumentation_harness::entities::MetricSpec;
use grpc_rpc_instrumentation_harness::prelude::*;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

async fn start(agent: &Agent) -> RunningScenario<DefaultCollector> {
    init_tracing();
    ScenarioBuilder::new()
        .server(Tonic::default())
        .collector(DefaultCollector::new())
        .agent(agent.clone())
        .service(greeter::service())
        .start()
        .await
        .unwrap()
}

fn server_transaction(agent: &Agent, method: &str) -> Transaction {
    let name = server_transaction_name(&greeter::path(method));
    agent
        .find_transaction(&name)
        .unwrap_or_else(|| panic!("no transaction named {name}"))
}

fn names(names: &[&str]) -> Vec<HelloRequest> {
    names.iter().map(|n| HelloRequest::new(*n)).collect()
}

fn messages(replies: &[HelloReply]) -> Vec<&str> {
    replies.iter().map(|r| r.message.as_str()).collect()
}

fn expect_status(err: RpcError) -> Status {
    match err {
        RpcError::Status(status) => status,
        other => panic!("expected a status, got {other:?}"),
    }
}

#[tokio::test]
async fn test_unary_transaction_and_metrics() {
    let agent = Agent::default();
    let scenario = start(&agent).await;
    let client = scenario.client(greeter::SERVICE_NAME);

    let reply: HelloReply = make_unary_request(&client, "SayHello", &HelloRequest::new("Bob"))
        .await
        .unwrap();
    assert_eq!(reply.message, "Hello Bob");

    let path = greeter::path("SayHello");
    let tx = server_transaction(&agent, "SayHello");
    assert_server_transaction(&tx, &path, Code::Ok);
    assert_server_metrics(&agent.metrics(), &path, Code::Ok);
    assert!(agent.errors().is_empty());

    let collected = scenario.shutdown().await.unwrap();
    assert_eq!(collected.len(), 1);
    assert_eq!(collected[0].service, greeter::SERVICE_NAME);
    assert_eq!(collected[0].method, "SayHello");
}

#[tokio::test]
async fn test_client_streaming_joins_names() {
    let agent = Agent::default();
    let scenario = start(&agent).await;
    let client = scenario.client(greeter::SERVICE_NAME);

    let reply: HelloReply = make_client_streaming_request(
        &client,
        "SayHelloClientStream",
        &names(&["a", "b", "c"]),
        true,
    )
    .await
    .unwrap();
    assert_eq!(reply.message, "Hello a, b, c");

    let path = greeter::path("SayHelloClientStream");
    assert_server_transaction(&server_transaction(&agent, "SayHelloClientStream"), &path, Code::Ok);
    assert_server_metrics(&agent.metrics(), &path, Code::Ok);

    // Requests reach the collector in write order
    let collected = scenario.shutdown().await.unwrap();
    let order: Vec<(usize, String)> = collected
        .iter()
        .map(|c| (c.index, c.message.decode::<HelloRequest>().unwrap().name))
        .collect();
    assert_eq!(
        order,
        vec![(0, "a".to_string()), (1, "b".to_string()), (2, "c".to_string())]
    );
}

#[tokio::test]
async fn test_server_streaming_replies_in_order() {
    let agent = Agent::default();
    let scenario = start(&agent).await;
    let client = scenario.client(greeter::SERVICE_NAME);

    let request = HelloStreamRequest {
        name: vec!["Bob".into(), "Jordi".into(), "Corey".into()],
    };
    let replies: Vec<HelloReply> =
        make_server_streaming_request(&client, "SayHelloServerStream", &request)
            .await
            .unwrap();
    assert_eq!(messages(&replies), vec!["Hello Bob", "Hello Jordi", "Hello Corey"]);

    let path = greeter::path("SayHelloServerStream");
    assert_server_transaction(&server_transaction(&agent, "SayHelloServerStream"), &path, Code::Ok);
    assert_server_metrics(&agent.metrics(), &path, Code::Ok);
}

#[tokio::test]
async fn test_bidi_streaming_answers_each_message() {
    let agent = Agent::default();
    let scenario = start(&agent).await;
    let client = scenario.client(greeter::SERVICE_NAME);

    let replies: Vec<HelloReply> = make_bidi_streaming_request(
        &client,
        "SayHelloBidiStream",
        &names(&["Bob", "Jordi", "Corey"]),
    )
    .await
    .unwrap();
    assert_eq!(messages(&replies), vec!["Hello Bob", "Hello Jordi", "Hello Corey"]);

    let path = greeter::path("SayHelloBidiStream");
    assert_server_transaction(&server_transaction(&agent, "SayHelloBidiStream"), &path, Code::Ok);
    assert_server_metrics(&agent.metrics(), &path, Code::Ok);
}

#[tokio::test]
async fn test_empty_server_stream_settles_with_no_replies() {
    let agent = Agent::default();
    let scenario = start(&agent).await;
    let client = scenario.client(greeter::SERVICE_NAME);

    let replies: Vec<HelloReply> = make_server_streaming_request(
        &client,
        "SayHelloServerStream",
        &HelloStreamRequest::default(),
    )
    .await
    .unwrap();
    assert!(replies.is_empty());
}

#[tokio::test]
async fn test_error_methods_record_one_error_each() {
    let cases = [
        ("SayError", CallShapeCase::Unary),
        ("SayErrorClientStream", CallShapeCase::ClientStream),
        ("SayErrorServerStream", CallShapeCase::ServerStream),
        ("SayErrorBidiStream", CallShapeCase::Bidi),
    ];

    for (method, shape) in cases {
        let agent = Agent::default();
        let scenario = start(&agent).await;
        let client = scenario.client(greeter::SERVICE_NAME);

        let status = shape.call(&client, method).await;
        assert_eq!(status.code(), greeter::ERR_CODE, "{method}");
        assert_eq!(status.message(), greeter::ERR_MSG, "{method}");

        let path = greeter::path(method);
        let tx = server_transaction(&agent, method);
        assert_server_transaction(&tx, &path, greeter::ERR_CODE);
        assert_server_metrics(&agent.metrics(), &path, greeter::ERR_CODE);

        let errors = agent.errors();
        assert_eq!(errors.len(), 1, "{method}");
        assert_eq!(errors[0].message, greeter::ERR_MSG);
        assert_eq!(errors[0].code, 9);
        assert_eq!(errors[0].transaction_name, tx.name);
    }
}

#[derive(Clone, Copy)]
enum CallShapeCase {
    Unary,
    ClientStream,
    ServerStream,
    Bidi,
}

impl CallShapeCase {
    async fn call(self, client: &ServiceClient<TonicChannel>, method: &str) -> Status {
        let noes = names(&["noes"]);
        let result = match self {
            CallShapeCase::Unary => {
                make_unary_request::<_, _, HelloReply>(client, method, &noes[0])
                    .await
                    .map(|_| ())
            }
            // Input is left open; the server fails on the first message
            CallShapeCase::ClientStream => {
                make_client_streaming_request::<_, _, HelloReply>(client, method, &noes, false)
                    .await
                    .map(|_| ())
            }
            CallShapeCase::ServerStream => make_server_streaming_request::<_, _, HelloReply>(
                client,
                method,
                &HelloStreamRequest {
                    name: vec!["noes".into()],
                },
            )
            .await
            .map(|_| ()),
            CallShapeCase::Bidi => {
                make_bidi_streaming_request::<_, _, HelloReply>(client, method, &noes)
                    .await
                    .map(|_| ())
            }
        };
        expect_status(result.expect_err("error method should fail"))
    }
}

#[tokio::test]
async fn test_record_errors_disabled_keeps_status() {
    let configs = [
        AgentConfig::default().with_grpc_record_errors(false),
        AgentConfig::default().with_error_collector(false),
        AgentConfig::default().with_ignored_status_codes([greeter::ERR_CODE]),
    ];

    for config in configs {
        let agent = Agent::new(config);
        let scenario = start(&agent).await;
        let client = scenario.client(greeter::SERVICE_NAME);

        let err = make_unary_request::<_, _, HelloReply>(&client, "SayError", &HelloRequest::new("noes"))
            .await
            .unwrap_err();
        assert_eq!(expect_status(err).code(), greeter::ERR_CODE);

        let path = greeter::path("SayError");
        assert_server_transaction(&server_transaction(&agent, "SayError"), &path, greeter::ERR_CODE);
        assert!(agent.errors().is_empty());
        assert_metrics_absent(&agent.metrics(), &[MetricSpec::unscoped("Errors/all")]);
    }
}

#[tokio::test]
async fn test_distributed_trace_links_client_and_server() {
    let agent = Agent::default();
    let scenario = start(&agent).await;
    let client = scenario.client(greeter::SERVICE_NAME);

    let (reply, client_tx) = agent
        .in_transaction("greet", async {
            make_unary_request::<_, _, HelloReply>(&client, "SayHello", &HelloRequest::new("Bob")).await
        })
        .await;
    assert_eq!(reply.unwrap().message, "Hello Bob");

    let server_tx = server_transaction(&agent, "SayHello");
    assert_distributed_trace(&client_tx, &server_tx);

    let path = greeter::path("SayHello");
    let segment = client_tx
        .segment(&external_segment_name("127.0.0.1", scenario.addr().port(), &path))
        .unwrap();
    assert_eq!(server_tx.parent_span_id.as_deref(), Some(segment.span_id.as_str()));
}

#[tokio::test]
async fn test_distributed_tracing_disabled_sends_no_headers() {
    let agent = Agent::new(AgentConfig::default().with_distributed_tracing(false));
    let scenario = start(&agent).await;
    let client = scenario.client(greeter::SERVICE_NAME);

    let (reply, client_tx) = agent
        .in_transaction("greet", async {
            make_unary_request::<_, _, HelloReply>(&client, "SayHello", &HelloRequest::new("Bob")).await
        })
        .await;
    reply.unwrap();

    let server_tx = server_transaction(&agent, "SayHello");
    assert_no_distributed_trace(&server_tx);
    assert_ne!(client_tx.trace_id, server_tx.trace_id);
    assert!(server_tx.parent_span_id.is_none());

    // Everything unrelated to trace propagation is recorded as usual
    let path = greeter::path("SayHello");
    let metrics = agent.metrics();
    assert_server_transaction(&server_tx, &path, Code::Ok);
    assert_server_metrics(&metrics, &path, Code::Ok);
    assert_external_segment(
        &client_tx,
        &metrics,
        "127.0.0.1",
        scenario.addr().port(),
        &path,
        Code::Ok,
        "OK",
    );
}

#[tokio::test]
async fn test_external_segment_for_every_shape() {
    let agent = Agent::default();
    let scenario = start(&agent).await;
    let client = scenario.client(greeter::SERVICE_NAME);
    let port = scenario.addr().port();

    let (_, tx) = agent
        .in_transaction("all-shapes", async {
            let _: HelloReply = make_unary_request(&client, "SayHello", &HelloRequest::new("a"))
                .await
                .unwrap();
            let _: HelloReply =
                make_client_streaming_request(&client, "SayHelloClientStream", &names(&["a"]), true)
                    .await
                    .unwrap();
            let _: Vec<HelloReply> = make_server_streaming_request(
                &client,
                "SayHelloServerStream",
                &HelloStreamRequest {
                    name: vec!["a".into()],
                },
            )
            .await
            .unwrap();
            let _: Vec<HelloReply> =
                make_bidi_streaming_request(&client, "SayHelloBidiStream", &names(&["a", "b"]))
                    .await
                    .unwrap();
        })
        .await;

    assert_eq!(tx.name, custom_transaction_name("all-shapes", TransactionKind::Web));
    let metrics = agent.metrics();
    for method in [
        "SayHello",
        "SayHelloClientStream",
        "SayHelloServerStream",
        "SayHelloBidiStream",
    ] {
        let path = greeter::path(method);
        assert_external_segment(&tx, &metrics, "127.0.0.1", port, &path, Code::Ok, "OK");
    }
}

#[tokio::test]
async fn test_external_segment_records_error_status_text() {
    let agent = Agent::default();
    let scenario = start(&agent).await;
    let client = scenario.client(greeter::SERVICE_NAME);

    let (result, tx) = agent
        .in_background_transaction("failing", async {
            make_unary_request::<_, _, HelloReply>(&client, "SayError", &HelloRequest::new("noes"))
                .await
        })
        .await;
    assert!(result.is_err());

    assert!(!tx.is_web());
    assert_external_segment(
        &tx,
        &agent.metrics(),
        "127.0.0.1",
        scenario.addr().port(),
        &greeter::path("SayError"),
        greeter::ERR_CODE,
        greeter::ERR_MSG,
    );
}

#[tokio::test]
async fn test_no_external_metrics_outside_transaction() {
    let agent = Agent::default();
    let scenario = start(&agent).await;
    let client = scenario.client(greeter::SERVICE_NAME);

    let _: HelloReply = make_unary_request(&client, "SayHello", &HelloRequest::new("Bob"))
        .await
        .unwrap();

    let path = greeter::path("SayHello");
    assert_external_metrics_absent(&agent.metrics(), "127.0.0.1", scenario.addr().port(), &path);
    assert_no_distributed_trace(&server_transaction(&agent, "SayHello"));
}

#[tokio::test]
async fn test_unknown_method_is_unimplemented() {
    let agent = Agent::default();
    let scenario = start(&agent).await;
    let client = scenario.client(greeter::SERVICE_NAME);

    let err = make_unary_request::<_, _, HelloReply>(&client, "SayGoodbye", &HelloRequest::new("Bob"))
        .await
        .unwrap_err();
    assert_eq!(expect_status(err).code(), Code::Unimplemented);

    let collected = scenario.shutdown().await.unwrap();
    assert!(collected.is_empty());
}

#[tokio::test]
async fn test_subscribe_sees_finished_server_transaction() {
    let agent = Agent::default();
    let mut finished = agent.subscribe();
    let scenario = start(&agent).await;
    let client = scenario.client(greeter::SERVICE_NAME);

    let _: HelloReply = make_unary_request(&client, "SayHello", &HelloRequest::new("Bob"))
        .await
        .unwrap();

    let tx = tokio::time::timeout(Duration::from_secs(5), finished.recv())
        .await
        .expect("transaction event")
        .unwrap();
    assert_eq!(tx.name, server_transaction_name(&greeter::path("SayHello")));
}

#[tokio::test]
async fn test_metadata_is_recorded_as_request_headers() {
    let agent = Agent::default();
    let scenario = start(&agent).await;
    let client = scenario
        .client(greeter::SERVICE_NAME)
        .with_metadata("x-request-id", "abc-123");

    let _: HelloReply = make_unary_request(&client, "SayHello", &HelloRequest::new("Bob"))
        .await
        .unwrap();

    let tx = server_transaction(&agent, "SayHello");
    assert_eq!(
        tx.attributes.value("request.headers.x-request-id"),
        Some(&serde_json::Value::from("abc-123"))
    );
}
