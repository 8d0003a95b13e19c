//! Simple example demonstrating basic usage of grpc-rpc-instrumentation-harness
//!
//! This example shows how to:
//! - Start the greeter service on an ephemeral port with an instrumented server
//! - Make one call of each shape from inside a custom transaction
//! - Read back the transactions, segments and metrics the agent recorded
//!
//! Run with `RUST_LOG=debug` to see every finished transaction.

use grpc_rpc_instrumentation_harness::prelude::*;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let agent = Agent::new(AgentConfig::default());
    let scenario = ScenarioBuilder::new()
        .server(Tonic::default())
        .collector(DefaultCollector::new())
        .agent(agent.clone())
        .service(greeter::service())
        .start()
        .await?;
    println!("Server is ready at http://{}\n", scenario.addr());

    let client = scenario.client(greeter::SERVICE_NAME);
    let (result, client_tx) = agent
        .in_transaction("greetings", async {
            let reply: HelloReply =
                make_unary_request(&client, "SayHello", &HelloRequest::new("Bob")).await?;
            println!("unary:          {}", reply.message);

            let reply: HelloReply = make_client_streaming_request(
                &client,
                "SayHelloClientStream",
                &[HelloRequest::new("a"), HelloRequest::new("b")],
                true,
            )
            .await?;
            println!("client stream:  {}", reply.message);

            let replies: Vec<HelloReply> = make_server_streaming_request(
                &client,
                "SayHelloServerStream",
                &HelloStreamRequest {
                    name: vec!["Jordi".into(), "Corey".into()],
                },
            )
            .await?;
            for reply in &replies {
                println!("server stream:  {}", reply.message);
            }

            let replies: Vec<HelloReply> = make_bidi_streaming_request(
                &client,
                "SayHelloBidiStream",
                &[HelloRequest::new("x"), HelloRequest::new("y")],
            )
            .await?;
            for reply in &replies {
                println!("bidi stream:    {}", reply.message);
            }

            let err = make_unary_request::<_, _, HelloReply>(&client, "SayError", &HelloRequest::new("noes"))
                .await
                .err();
            println!("error:          {err:?}");

            Ok::<_, RpcError>(())
        })
        .await;
    result?;

    println!("\n=== Client transaction: {} ===", client_tx.name);
    for segment in client_tx.trace.descendants() {
        println!("  segment {} ({:?})", segment.name, segment.duration);
    }

    println!("\n=== Server transactions ===");
    for tx in agent.transactions().iter().filter(|tx| tx.trace_id == client_tx.trace_id) {
        if tx.id != client_tx.id {
            println!("  {} parent span {:?}", tx.name, tx.parent_span_id);
        }
    }

    println!("\n=== Metrics ===");
    for name in agent.metrics().names() {
        println!("  {name}");
    }

    let collected = scenario.shutdown().await?;
    println!("\nServer received {} request messages", collected.len());
    Ok(())
}
