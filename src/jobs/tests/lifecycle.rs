use super::*;
use std::time::Duration;

#[tokio::test]
async fn submit_explain_uses_self_link() {
    let server = MockServer::start().await;
    let self_link = format!("{}/alpha/extractions/documents/abc123-explain/_explain", server.uri());
    Mock::given(method("POST"))
        .and(path("/alpha/extractions/documents/_explain"))
        .and(header("user-key", TEST_KEY))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "data": {"id": "abc123-explain", "type": "_explain",
                     "attributes": {"current_state": "JOB_CREATED"}},
            "links": {"self": self_link}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let (client, _tmp) = test_client(&server);
    let mut job = client.explain_job();
    client
        .submit_job(&mut job, Some(&json!({"query": {"where": "x"}})))
        .await
        .unwrap();

    assert_eq!(job.identifier(), Some("abc123-explain"));
    assert_eq!(job.resource_link(), Some(self_link.as_str()));
    assert_eq!(job.status(), JobStatus::Submitted);
}

#[tokio::test]
async fn submit_extraction_derives_link_from_short_id() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/alpha/extractions/documents"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "data": {"id": "dj-synhub-extraction-TESTKEY-snap123", "type": "snapshot"},
            "links": {"self": "https://elsewhere.example.com/ignored"}
        })))
        .mount(&server)
        .await;

    let (client, _tmp) = test_client(&server);
    let mut job = client.extraction_job();
    client.submit_job(&mut job, None).await.unwrap();

    assert_eq!(job.identifier(), Some("snap123"));
    assert_eq!(
        job.resource_link().unwrap(),
        format!(
            "{}/alpha/extractions/documents/dj-synhub-extraction-TESTKEY-snap123",
            server.uri()
        )
    );
}

#[tokio::test]
async fn submit_update_targets_snapshot_and_type() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/alpha/extractions/dj-synhub-extraction-TESTKEY-snap1/deletes"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "data": {"id": "dj-synhub-extraction-TESTKEY-snap1-deletes-20210101T120000"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let (client, _tmp) = test_client(&server);
    let mut job = client
        .update_job(UpdateRequest::new("snap1", UpdateType::Deletes))
        .unwrap();
    client.submit_job(&mut job, None).await.unwrap();

    assert_eq!(job.identifier(), Some("snap1-deletes-20210101T120000"));
    assert!(
        job.resource_link()
            .unwrap()
            .ends_with("/alpha/extractions/documents/dj-synhub-extraction-TESTKEY-snap1-deletes-20210101T120000")
    );
}

#[tokio::test]
async fn rejected_submission_leaves_job_untouched() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/alpha/analytics"))
        .respond_with(ResponseTemplate::new(400).set_body_string("bad query"))
        .mount(&server)
        .await;

    let (client, _tmp) = test_client(&server);
    let mut job = client.analytics_job();
    let err = client.submit_job(&mut job, None).await.unwrap_err();

    match err {
        Error::Submission { status, body } => {
            assert_eq!(status, 400);
            assert_eq!(body, "bad query");
        }
        other => panic!("expected submission error, got {other:?}"),
    }
    assert!(job.identifier().is_none());
    assert_eq!(job.status(), JobStatus::Created);
}

#[tokio::test]
async fn second_submission_is_refused_without_a_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/alpha/analytics"))
        .respond_with(
            ResponseTemplate::new(201).set_body_json(json!({"data": {"id": "an-1"}})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let (client, _tmp) = test_client(&server);
    let mut job = client.analytics_job();
    client.submit_job(&mut job, None).await.unwrap();
    let err = client.submit_job(&mut job, None).await.unwrap_err();
    assert!(matches!(err, Error::InvalidArgument(_)));
    assert_eq!(job.identifier(), Some("an-1"));
}

#[tokio::test]
async fn poll_without_link_makes_no_request() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let (client, _tmp) = test_client(&server);
    let mut job = client.explain_job();
    let err = client.poll_job(&mut job).await.unwrap_err();
    assert!(matches!(
        err,
        Error::Poll {
            link: None,
            status: None,
            ..
        }
    ));
}

#[tokio::test]
async fn poll_failure_carries_status_and_link() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .mount(&server)
        .await;

    let (client, _tmp) = test_client(&server);
    let err = client.load_extraction("snap9").await.unwrap_err();
    assert!(matches!(err, Error::Poll { status: Some(503), .. }));

    let mut rebuilt = Job::extraction_from_snapshot(
        "snap9",
        client.auth().clone(),
        client.api().endpoints(),
    );
    match client.poll_job(&mut rebuilt).await.unwrap_err() {
        Error::Poll { link, message, .. } => {
            assert!(link.unwrap().ends_with("dj-synhub-extraction-TESTKEY-snap9"));
            assert_eq!(message, "maintenance");
        }
        other => panic!("expected poll error, got {other:?}"),
    }
}

#[tokio::test]
async fn wait_stops_at_first_terminal_status() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/alpha/extractions/documents/_explain"))
        .respond_with(
            ResponseTemplate::new(201).set_body_json(json!({"data": {"id": "ex-1"}})),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/alpha/extractions/documents/_explain/ex-1"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(status_body("JOB_STATE_RUNNING", json!({}))),
        )
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/alpha/extractions/documents/_explain/ex-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(status_body(
            "JOB_STATE_DONE",
            json!({"counts": 5_749_124}),
        )))
        .expect(1)
        .mount(&server)
        .await;

    let (client, _tmp) = test_client(&server);
    let mut job = client.explain_job();
    client.submit_job(&mut job, None).await.unwrap();
    let status = client
        .wait_for_job(&mut job, Some(Duration::from_millis(5)))
        .await
        .unwrap();

    assert_eq!(status, JobStatus::Done);
    assert_eq!(
        job.result().and_then(JobResult::document_volume),
        Some(5_749_124)
    );
}

#[tokio::test]
async fn unknown_platform_state_keeps_waiting() {
    let server = MockServer::start().await;
    let link = format!(
        "/alpha/extractions/documents/dj-synhub-extraction-{TEST_KEY}-snapX"
    );
    Mock::given(method("GET"))
        .and(path(link.as_str()))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(status_body("JOB_STATE_REPLICATING", json!({}))),
        )
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(link.as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(status_body(
            "JOB_STATE_DONE",
            json!({"format": "json", "files": []}),
        )))
        .mount(&server)
        .await;

    let (client, _tmp) = test_client(&server);
    let mut job = client.load_extraction("snapX").await.unwrap();
    assert_eq!(job.status(), JobStatus::Running);
    assert!(job.result().is_none());

    let status = client.wait_for_job(&mut job, None).await.unwrap();
    assert_eq!(status, JobStatus::Done);
    assert_eq!(job.result().and_then(JobResult::files).unwrap().format, "json");
}

#[tokio::test]
async fn analytics_result_is_stored_on_done() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/alpha/analytics"))
        .respond_with(
            ResponseTemplate::new(201).set_body_json(json!({"data": {"id": "an-7"}})),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/alpha/analytics/an-7"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"id": "an-7", "attributes": {
                "job_status": "JOB_STATE_DONE",
                "results": [
                    {"publication_datetime": "2020-01", "count": 3},
                    {"publication_datetime": "2020-02", "count": 4}
                ]
            }}
        })))
        .mount(&server)
        .await;

    let (client, _tmp) = test_client(&server);
    let mut job = client.analytics_job();
    let files = client.process_job(&mut job, None, None).await.unwrap();

    assert!(files.is_empty());
    let table = job.result().and_then(JobResult::analytics).unwrap();
    assert_eq!(table.len(), 2);
    assert_eq!(table.rows[0]["publication_datetime"], "2020-01");
}

#[tokio::test]
async fn load_update_polls_rebuilt_job_once() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(
            "/alpha/extractions/documents/dj-synhub-extraction-TESTKEY-snap1-additions-20210101T120000",
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(status_body(
            "JOB_STATE_DONE",
            json!({"format": "avro", "files": [{"uri": "https://files.example.com/u/part-0.avro"}]}),
        )))
        .expect(1)
        .mount(&server)
        .await;

    let (client, _tmp) = test_client(&server);
    let job = client
        .load_update("snap1-additions-20210101T120000")
        .await
        .unwrap();

    assert_eq!(job.kind(), JobKind::Update);
    assert_eq!(job.status(), JobStatus::Done);
    let files = job.result().and_then(JobResult::files).unwrap();
    assert_eq!(files.uris, vec!["https://files.example.com/u/part-0.avro"]);
}
