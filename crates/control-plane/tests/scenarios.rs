//! The six literal end-to-end scenarios from spec §8, plus the
//! concurrency property test from §9.

mod common;

use queue_message::{Action, QueueMessage, ServiceDefinition, TaskDefinition, TaskResult, TaskStream};
use serde_json::{json, Map};

use common::{publish_from_service, settle, Harness};

#[tokio::test]
async fn register_submit_complete() {
    let harness = Harness::spawn().await;
    let client = harness.client();

    client
        .post(harness.url("/services/register"))
        .json(&ServiceDefinition {
            service_name: "sum".into(),
            description: String::new(),
            host: "127.0.0.1".into(),
            port: Some(9100),
        })
        .send()
        .await
        .unwrap();

    let session_id: String = client
        .post(harness.url("/sessions/create"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    let sum_topic = harness.app.topic("sum");
    let mut sum_consumer = harness.app.message_queue().get_messages(&sum_topic);

    let task_id = "t1".to_string();
    let response = client
        .post(harness.url(&format!("/sessions/{session_id}/tasks")))
        .json(&TaskDefinition {
            task_id: task_id.clone(),
            session_id: None,
            input: r#"{"a":1,"b":2}"#.into(),
            service_id: Some("sum".into()),
        })
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);

    use futures::StreamExt;
    let routed = tokio::time::timeout(std::time::Duration::from_secs(1), sum_consumer.next())
        .await
        .expect("a NEW_TASK message should have been routed to the sum topic")
        .unwrap();
    assert_eq!(routed.action, Action::NewTask);
    assert_eq!(routed.data.get("task_id").and_then(|v| v.as_str()), Some("t1"));

    publish_from_service(
        &harness,
        QueueMessage::new(
            "control_plane",
            Action::CompletedTask,
            serde_json::to_value(&TaskResult {
                task_id: task_id.clone(),
                history: String::new(),
                result: "3".into(),
                data: Map::new(),
            })
            .unwrap()
            .as_object()
            .cloned()
            .unwrap(),
        ),
    )
    .await;
    settle().await;

    let result: Option<TaskResult> = client
        .get(harness.url(&format!("/sessions/{session_id}/tasks/{task_id}/result")))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let result = result.expect("result should be recorded");
    assert_eq!(result.task_id, "t1");
    assert_eq!(result.result, "3");
}

#[tokio::test]
async fn streaming_sorts_by_index_and_terminates_on_result() {
    let harness = Harness::spawn().await;
    let client = harness.client();

    let session_id: String = client
        .post(harness.url("/sessions/create"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    let task_id = "t2".to_string();
    client
        .post(harness.url(&format!("/sessions/{session_id}/tasks")))
        .json(&TaskDefinition {
            task_id: task_id.clone(),
            session_id: Some(session_id.clone()),
            input: "{}".into(),
            service_id: Some("sum".into()),
        })
        .send()
        .await
        .unwrap();

    for (index, value) in [(2, "b"), (0, "a"), (1, "ab")] {
        publish_from_service(
            &harness,
            QueueMessage::new(
                "control_plane",
                Action::TaskStream,
                serde_json::to_value(&TaskStream {
                    task_id: task_id.clone(),
                    session_id: session_id.clone(),
                    index,
                    data: {
                        let mut m = Map::new();
                        m.insert("v".into(), json!(value));
                        m
                    },
                })
                .unwrap()
                .as_object()
                .cloned()
                .unwrap(),
            ),
        )
        .await;
    }
    settle().await;

    use futures::StreamExt;
    let response = client
        .get(harness.url(&format!("/sessions/{session_id}/tasks/{task_id}/result_stream")))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);

    let mut byte_stream = response.bytes_stream();
    let mut pending = String::new();
    let mut lines = Vec::new();

    // Drain full lines until we have collected the first three
    // ("a","ab","b"), reassembling any line split across transport chunks.
    while lines.len() < 3 {
        let chunk = tokio::time::timeout(std::time::Duration::from_secs(2), byte_stream.next())
            .await
            .expect("stream should not stall")
            .expect("stream should not end before three records")
            .unwrap();
        pending.push_str(std::str::from_utf8(&chunk).unwrap());
        while let Some(newline_at) = pending.find('\n') {
            let line = pending[..newline_at].to_string();
            pending = pending[newline_at + 1..].to_string();
            if !line.is_empty() {
                lines.push(line);
            }
        }
    }

    assert_eq!(lines, vec![r#"{"v":"a"}"#, r#"{"v":"ab"}"#, r#"{"v":"b"}"#]);

    publish_from_service(
        &harness,
        QueueMessage::new(
            "control_plane",
            Action::CompletedTask,
            serde_json::to_value(&TaskResult {
                task_id: task_id.clone(),
                history: String::new(),
                result: "done".into(),
                data: Map::new(),
            })
            .unwrap()
            .as_object()
            .cloned()
            .unwrap(),
        ),
    )
    .await;

    // The stream must end shortly after the result is recorded.
    let ended = tokio::time::timeout(std::time::Duration::from_secs(2), async {
        while byte_stream.next().await.is_some() {}
    })
    .await;
    assert!(ended.is_ok(), "stream did not terminate after the final result");
}

#[tokio::test]
async fn implicit_session_created_from_bus_new_task() {
    let harness = Harness::spawn().await;

    publish_from_service(
        &harness,
        QueueMessage::new(
            "control_plane",
            Action::NewTask,
            serde_json::to_value(&TaskDefinition {
                task_id: "t9".into(),
                session_id: None,
                input: "{}".into(),
                service_id: Some("sum".into()),
            })
            .unwrap()
            .as_object()
            .cloned()
            .unwrap(),
        ),
    )
    .await;
    settle().await;

    let client = harness.client();
    let sessions: Map<String, serde_json::Value> = client
        .get(harness.url("/sessions"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(sessions.len(), 1);
    let (_, session) = sessions.into_iter().next().unwrap();
    let task_ids = session["task_ids"].as_array().unwrap();
    assert_eq!(task_ids, &vec![serde_json::Value::String("t9".into())]);
}

#[tokio::test]
async fn task_with_no_service_id_is_not_routable() {
    let harness = Harness::spawn().await;
    let client = harness.client();

    let session_id: String = client
        .post(harness.url("/sessions/create"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    let response = client
        .post(harness.url(&format!("/sessions/{session_id}/tasks")))
        .json(&TaskDefinition {
            task_id: "t2".into(),
            session_id: None,
            input: "{}".into(),
            service_id: None,
        })
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::INTERNAL_SERVER_ERROR);

    let session: serde_json::Value = client
        .get(harness.url(&format!("/sessions/{session_id}")))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let task_ids: Vec<&str> = session["task_ids"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_str().unwrap())
        .collect();
    // The append-before-route implementation records the task id, but the
    // stored TaskDefinition has no service_id, so it is flagged unroutable
    // rather than silently lost (spec §8 scenario 4, alternate clause).
    assert_eq!(task_ids, vec!["t2"]);
    let stored_task = harness.app.get_task("t2").await.unwrap();
    assert!(stored_task.service_id.is_none());
}

#[tokio::test]
async fn session_mismatch_is_rejected() {
    let harness = Harness::spawn().await;
    let client = harness.client();

    let s1: String = client.post(harness.url("/sessions/create")).send().await.unwrap().json().await.unwrap();
    let s2: String = client.post(harness.url("/sessions/create")).send().await.unwrap().json().await.unwrap();

    let response = client
        .post(harness.url(&format!("/sessions/{s1}/tasks")))
        .json(&TaskDefinition {
            task_id: "t3".into(),
            session_id: Some(s2.clone()),
            input: "{}".into(),
            service_id: Some("sum".into()),
        })
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);

    for sid in [&s1, &s2] {
        let session: serde_json::Value = client
            .get(harness.url(&format!("/sessions/{sid}")))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert!(session["task_ids"].as_array().unwrap().is_empty());
    }
}

#[tokio::test]
async fn deregister_is_idempotent() {
    let harness = Harness::spawn().await;
    let client = harness.client();

    let service = ServiceDefinition {
        service_name: "sum".into(),
        description: String::new(),
        host: "127.0.0.1".into(),
        port: Some(9100),
    };

    client.post(harness.url("/services/register")).json(&service).send().await.unwrap();
    client.post(harness.url("/services/register")).json(&service).send().await.unwrap();

    client
        .post(harness.url("/services/deregister"))
        .query(&[("service_name", "sum")])
        .send()
        .await
        .unwrap();
    let second = client
        .post(harness.url("/services/deregister"))
        .query(&[("service_name", "sum")])
        .send()
        .await
        .unwrap();
    assert!(second.status().is_success());

    let missing = client.get(harness.url("/services/sum")).send().await.unwrap();
    assert_eq!(missing.status(), reqwest::StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn concurrent_task_appends_are_not_lost() {
    let harness = std::sync::Arc::new(Harness::spawn().await);
    let client = harness.client();

    let session_id: String = client
        .post(harness.url("/sessions/create"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    let mut handles = Vec::new();
    for i in 0..100 {
        let app = harness.app.clone();
        let session_id = session_id.clone();
        handles.push(tokio::spawn(async move {
            let task = TaskDefinition {
                task_id: format!("t{i}"),
                session_id: Some(session_id.clone()),
                input: "{}".into(),
                service_id: Some("sum".into()),
            };
            app.add_task_to_session(&session_id, task).await.unwrap();
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let session = harness.app.get_session(&session_id).await.unwrap();
    assert_eq!(session.task_ids.len(), 100);
    let unique: std::collections::HashSet<_> = session.task_ids.iter().collect();
    assert_eq!(unique.len(), 100);
}
