use crate::test_utilities::*;
use kbalance::{
    ClientError, PartitionReassignment, ReassignmentRequest, ReassignmentStatus,
    ReassignmentTool, compute_throttles,
};
use kbalance_cluster::kafka::KafkaReassignTool;
use std::sync::Arc;
use test_log::test;

fn request() -> ReassignmentRequest {
    ReassignmentRequest {
        version: 1,
        partitions: vec![PartitionReassignment {
            topic: "orders".to_string(),
            partition: 0,
            replicas: vec![3, 2],
            log_dirs: vec!["/kafka/0".to_string(), "any".to_string()],
        }],
    }
}

fn tool(runner: &Arc<FakeRunner>) -> KafkaReassignTool {
    KafkaReassignTool::new(runner.clone(), "/opt/kafka/bin", "kafka-1:9092")
}

#[test(tokio::test)]
async fn test_in_progress_uses_list() {
    let runner = Arc::new(FakeRunner::new("kafka-1"));
    runner.respond(
        "--list",
        vec![
            ok("No partition reassignments found.\n"),
            ok("Current partition reassignments:\norders-0: replicas: 1,2,3. removing: 1.\n"),
        ],
    );
    let tool = tool(&runner);

    assert!(!tool.in_progress().await.unwrap());
    assert!(tool.in_progress().await.unwrap());
    assert_eq!(
        runner.commands()[0],
        "/opt/kafka/bin/kafka-reassign-partitions.sh --bootstrap-server kafka-1:9092 --list"
    );
}

#[test(tokio::test)]
async fn test_execute_uploads_request_and_passes_throttles() {
    let runner = Arc::new(FakeRunner::new("kafka-1"));
    runner.respond(
        "--execute",
        vec![ok("Successfully started partition reassignment for orders-0\n")],
    );
    let tool = tool(&runner).with_zookeeper("zk-1:2181");

    tool.execute(&request(), &compute_throttles(1_000, 2_000))
        .await
        .unwrap();

    let commands = runner.commands();
    assert_eq!(commands.len(), 2);
    let path = commands[0].strip_prefix("cat > ").unwrap().to_string();
    assert!(path.starts_with("/tmp/kafka-reassignment-"));

    let uploaded: ReassignmentRequest =
        serde_json::from_str(&runner.file(&path).unwrap()).unwrap();
    assert_eq!(uploaded, request());

    assert_eq!(
        commands[1],
        format!(
            "/opt/kafka/bin/kafka-reassign-partitions.sh --bootstrap-server kafka-1:9092 \
             --zookeeper zk-1:2181 --reassignment-json-file {path} --throttle 1000 \
             --replica-alter-log-dirs-throttle 2000 --execute"
        )
    );
}

#[test(tokio::test)]
async fn test_execute_rejection_is_an_error() {
    let runner = Arc::new(FakeRunner::new("kafka-1"));
    runner.respond(
        "--execute",
        vec![failed(
            1,
            "",
            "There is an existing assignment running.",
        )],
    );

    let error = tool(&runner)
        .execute(&request(), &compute_throttles(1_000, 2_000))
        .await
        .unwrap_err();

    match error {
        ClientError::CommandFailed { stderr, .. } => {
            assert_eq!(stderr, "There is an existing assignment running.");
        }
        other => panic!("expected command failure, got {other:?}"),
    }
}

#[test(tokio::test)]
async fn test_verify_reuses_the_uploaded_file() {
    let runner = Arc::new(FakeRunner::new("kafka-1"));
    runner.respond("--execute", vec![ok("")]);
    runner.respond(
        "--verify",
        vec![
            ok("Reassignment of partition orders-0 is still in progress.\n"),
            failed(1, "Reassignment of partition orders-0 failed\n", ""),
            ok("Reassignment of partition orders-0 is complete.\n"),
        ],
    );
    let tool = tool(&runner);
    let request = request();

    tool.execute(&request, &compute_throttles(1, 1)).await.unwrap();
    let statuses = [
        tool.verify(&request).await.unwrap().status(),
        tool.verify(&request).await.unwrap().status(),
        tool.verify(&request).await.unwrap().status(),
    ];

    assert_eq!(
        statuses,
        [
            ReassignmentStatus::InProgress,
            ReassignmentStatus::Failed,
            ReassignmentStatus::Completed
        ]
    );
    let uploads = runner
        .commands()
        .iter()
        .filter(|command| command.starts_with("cat > "))
        .count();
    assert_eq!(uploads, 1);
}

#[test(tokio::test)]
async fn test_verify_without_output_is_an_error() {
    let runner = Arc::new(FakeRunner::new("kafka-1"));
    runner.respond(
        "--verify",
        vec![failed(127, "", "kafka-reassign-partitions.sh: not found")],
    );

    let error = tool(&runner).verify(&request()).await.unwrap_err();
    assert!(matches!(error, ClientError::CommandFailed { .. }));
}
