use super::*;
use crate::endpoints::Endpoints;

fn auth() -> AuthContext {
    AuthContext::api_key(TEST_KEY).unwrap()
}

#[test]
fn new_jobs_start_created_without_identity() {
    let job = Job::explain(auth());
    assert_eq!(job.kind(), JobKind::Explain);
    assert_eq!(job.status(), JobStatus::Created);
    assert!(job.identifier().is_none());
    assert!(job.resource_link().is_none());
    assert!(job.result().is_none());
}

#[test]
fn update_request_rejects_mixed_identity_forms() {
    let request = UpdateRequest {
        update_id: Some("snap1-additions-20210101T120000".into()),
        snapshot_id: Some("snap1".into()),
        update_type: None,
    };
    assert!(matches!(request.resolve(), Err(Error::Construction(_))));

    let request = UpdateRequest {
        update_id: Some("snap1-additions-20210101T120000".into()),
        snapshot_id: None,
        update_type: Some("additions".into()),
    };
    assert!(matches!(request.resolve(), Err(Error::Construction(_))));
}

#[test]
fn update_request_requires_snapshot_and_type_together() {
    let request = UpdateRequest {
        snapshot_id: Some("snap1".into()),
        ..Default::default()
    };
    assert!(matches!(request.resolve(), Err(Error::Construction(_))));
    assert!(matches!(
        UpdateRequest::default().resolve(),
        Err(Error::Construction(_))
    ));
}

#[test]
fn update_request_rejects_unknown_type() {
    let request = UpdateRequest {
        snapshot_id: Some("snap1".into()),
        update_type: Some("removals".into()),
        ..Default::default()
    };
    assert!(matches!(request.resolve(), Err(Error::Construction(_))));
}

#[test]
fn update_id_is_parsed_into_target() {
    let target = UpdateRequest::existing("snap1-replacements-20210315T083000")
        .resolve()
        .unwrap();
    assert_eq!(target.snapshot_id(), "snap1");
    assert_eq!(target.update_type(), UpdateType::Replacements);
    assert_eq!(target.update_id(), Some("snap1-replacements-20210315T083000"));

    let created = target.created_at().unwrap();
    assert_eq!(created.to_string(), "2021-03-15 08:30:00");
}

#[test]
fn malformed_update_ids_are_rejected() {
    assert!(UpdateTarget::from_update_id("snap1-additions").is_err());
    assert!(UpdateTarget::from_update_id("snap1-additions-2021-extra").is_err());
    assert!(UpdateTarget::from_update_id("-additions-20210101T000000").is_err());
}

#[test]
fn rebuilt_update_job_is_ready_to_poll() {
    let endpoints = Endpoints::new("https://api.example.com");
    let target = UpdateRequest::existing("snap1-deletes-20210101T000000")
        .resolve()
        .unwrap();
    let job = Job::update(target, auth(), &endpoints);

    assert_eq!(job.identifier(), Some("snap1-deletes-20210101T000000"));
    assert_eq!(
        job.resource_link(),
        Some(
            "https://api.example.com/alpha/extractions/documents/dj-synhub-extraction-TESTKEY-snap1-deletes-20210101T000000"
        )
    );
    assert_eq!(job.status(), JobStatus::Created);
}

#[test]
fn new_update_job_awaits_submission() {
    let endpoints = Endpoints::new("https://api.example.com");
    let target = UpdateRequest::new("snap1", UpdateType::Additions)
        .resolve()
        .unwrap();
    let job = Job::update(target, auth(), &endpoints);
    assert!(job.identifier().is_none());
    assert_eq!(job.update_target().unwrap().snapshot_id(), "snap1");
    assert!(job.update_target().unwrap().created_at().is_none());
}

#[test]
fn extraction_rebuilt_from_snapshot_id() {
    let endpoints = Endpoints::new("https://api.example.com");
    let job = Job::extraction_from_snapshot("ab12cd", auth(), &endpoints);
    assert_eq!(job.identifier(), Some("ab12cd"));
    assert_eq!(
        job.resource_link(),
        Some("https://api.example.com/alpha/extractions/documents/dj-synhub-extraction-TESTKEY-ab12cd")
    );
}

#[test]
fn identifier_is_assigned_once() {
    let mut job = Job::analytics(auth());
    job.mark_submitted("a1".into(), "https://x/a1".into())
        .unwrap();
    assert_eq!(job.status(), JobStatus::Submitted);

    let err = job
        .mark_submitted("a2".into(), "https://x/a2".into())
        .unwrap_err();
    assert!(matches!(err, Error::Construction(_)));
    assert_eq!(job.identifier(), Some("a1"));
}
