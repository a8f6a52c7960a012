//! Runs decoded broker payloads through the pipeline into a mock graph store.

use ja3_gaffer::{GafferClient, GafferConfig, EXECUTE_PATH};
use ja3_loader::{build_submitter, MessageReceiver, Pipeline, PipelineConfig, ReceiveOutcome, ServiceConfig};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing_test::traced_test;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn payload(entries: &[(&str, &str, &[i64])]) -> Vec<u8> {
    let observations: Vec<Value> = entries
        .iter()
        .map(|(device, descriptor, times)| {
            json!([[device, descriptor], {"times": times, "count": times.len()}])
        })
        .collect();
    serde_json::to_vec(&json!([1_700_000_000.0, observations])).unwrap()
}

fn descriptor(digest: &str) -> String {
    json!({"src": "1.2.3.4:443", "ja3digest": digest}).to_string()
}

fn pipeline_config() -> PipelineConfig {
    PipelineConfig {
        queue_capacity: 4,
        workers: 2,
        submission_depth: 1,
    }
}

async fn gaffer_pipeline(server: &MockServer) -> (Pipeline, MessageReceiver) {
    let client = GafferClient::new(&GafferConfig::new(server.uri(), Duration::from_secs(5)))
        .expect("client");
    let (pipeline, queue) = Pipeline::new(pipeline_config(), Arc::new(client));
    (pipeline, MessageReceiver::new(queue))
}

async fn request_bodies(server: &MockServer) -> Vec<Value> {
    server
        .received_requests()
        .await
        .expect("recording enabled")
        .iter()
        .map(|request| serde_json::from_slice(&request.body).unwrap())
        .collect()
}

#[tokio::test]
async fn test_message_becomes_entity_and_edge() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(EXECUTE_PATH))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let (pipeline, receiver) = gaffer_pipeline(&server).await;
    let digest = descriptor("abc123");
    let outcome = receiver
        .receive(&payload(&[("deviceA", digest.as_str(), &[100, 50, 75])]))
        .await;
    assert_eq!(outcome, ReceiveOutcome::Enqueued);
    drop(receiver);

    pipeline.run(CancellationToken::new()).await.unwrap();

    let bodies = request_bodies(&server).await;
    assert_eq!(bodies.len(), 1);
    let input = bodies[0]["input"].as_array().unwrap();
    assert_eq!(input.len(), 2);

    assert_eq!(input[0]["class"], "uk.gov.gchq.gaffer.data.element.Entity");
    assert_eq!(input[0]["vertex"], "abc123");
    assert_eq!(input[0]["group"], "ja3");
    assert_eq!(
        input[0]["properties"]["time"]["uk.gov.gchq.gaffer.time.RBMBackedTimestampSet"]
            ["timestamps"],
        json!([50])
    );

    assert_eq!(input[1]["class"], "uk.gov.gchq.gaffer.data.element.Edge");
    assert_eq!(input[1]["group"], "isemitting");
    assert_eq!(input[1]["source"], "deviceA");
    assert_eq!(input[1]["destination"], "abc123");
    assert_eq!(input[1]["directed"], true);
    assert_eq!(input[1]["properties"]["count"], 3);
}

#[tokio::test]
#[traced_test]
async fn test_rejected_batch_is_logged_and_processing_continues() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(EXECUTE_PATH))
        .respond_with(ResponseTemplate::new(500).set_body_string("server error"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(EXECUTE_PATH))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let client = GafferClient::new(&GafferConfig::new(server.uri(), Duration::from_secs(5)))
        .expect("client");
    // One worker keeps the two submissions in order.
    let (pipeline, queue) = Pipeline::new(
        PipelineConfig {
            workers: 1,
            ..pipeline_config()
        },
        Arc::new(client),
    );
    let receiver = MessageReceiver::new(queue);

    let first = descriptor("abc123");
    let second = descriptor("def456");
    receiver
        .receive(&payload(&[("deviceA", first.as_str(), &[10])]))
        .await;
    receiver
        .receive(&payload(&[("deviceB", second.as_str(), &[20])]))
        .await;
    drop(receiver);

    pipeline.run(CancellationToken::new()).await.unwrap();

    assert!(logs_contain("Gaffer error, dropping batch"));
    assert!(logs_contain("server error"));

    let bodies = request_bodies(&server).await;
    assert_eq!(bodies.len(), 2);
    assert_eq!(bodies[1]["input"][0]["vertex"], "def456");
}

#[tokio::test]
async fn test_malformed_descriptor_only_drops_its_key() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(EXECUTE_PATH))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let (pipeline, receiver) = gaffer_pipeline(&server).await;
    let good_a = descriptor("aaa");
    let good_b = descriptor("bbb");
    receiver
        .receive(&payload(&[
            ("deviceA", good_a.as_str(), &[5]),
            ("deviceB", "not json", &[6]),
            ("deviceC", good_b.as_str(), &[7]),
        ]))
        .await;
    drop(receiver);

    pipeline.run(CancellationToken::new()).await.unwrap();

    let bodies = request_bodies(&server).await;
    let input = bodies[0]["input"].as_array().unwrap();
    assert_eq!(input.len(), 4);
    assert_eq!(input[0]["vertex"], "aaa");
    assert_eq!(input[3]["source"], "deviceC");
}

#[tokio::test]
async fn test_undecodable_payload_is_dropped() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let (pipeline, receiver) = gaffer_pipeline(&server).await;
    assert_eq!(
        receiver.receive(b"\x00\x01garbage").await,
        ReceiveOutcome::Dropped
    );
    drop(receiver);

    pipeline.run(CancellationToken::new()).await.unwrap();
}

#[tokio::test]
#[traced_test]
async fn test_transform_only_mode_without_gaffer_url() {
    let config: ServiceConfig = serde_json::from_value(json!({})).unwrap();
    let submitter = build_submitter(&config).unwrap();
    assert!(logs_contain("transform-only mode"));

    let (pipeline, queue) = Pipeline::new(config.pipeline_config(), submitter);
    let receiver = MessageReceiver::new(queue);
    let digest = descriptor("abc123");
    let outcome = receiver
        .receive(&payload(&[("deviceA", digest.as_str(), &[1, 2])]))
        .await;
    assert_eq!(outcome, ReceiveOutcome::Enqueued);
    drop(receiver);

    pipeline.run(CancellationToken::new()).await.unwrap();
    assert!(logs_contain("Transform-only mode, discarding batch"));
}

#[tokio::test]
async fn test_cancelled_pipeline_drains_queue() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(EXECUTE_PATH))
        .respond_with(ResponseTemplate::new(200))
        .expect(3)
        .mount(&server)
        .await;

    let (pipeline, receiver) = gaffer_pipeline(&server).await;
    for digest in ["d1", "d2", "d3"] {
        let descriptor = descriptor(digest);
        receiver
            .receive(&payload(&[("deviceA", descriptor.as_str(), &[1])]))
            .await;
    }

    let ctx = CancellationToken::new();
    ctx.cancel();
    pipeline.run(ctx).await.unwrap();
    drop(receiver);

    assert_eq!(request_bodies(&server).await.len(), 3);
}
