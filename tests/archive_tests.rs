mod common;

use atlasrest::archive::DateRangeFilter;
use atlasrest::{Client, Error, IssueArchivalExportPayload, RequestContext};
use common::{MockTransport, Reply};
use std::sync::Arc;

fn client_with(mock: &Arc<MockTransport>) -> Client {
    let client = Client::builder("https://x.atlassian.net")
        .transport(mock.clone())
        .build()
        .unwrap();
    client.auth().set_basic_auth("user@example.com", "api-token");
    client
}

fn keys(keys: &[&str]) -> Vec<String> {
    keys.iter().map(|k| k.to_string()).collect()
}

#[test]
fn test_preserve_returns_report() {
    let mock = Arc::new(MockTransport::new().reply(Reply::new(
        200,
        r#"{"errors":{"issueIsSubtask":{"count":1,"issueIdsOrKeys":["PR-2"],"message":"Subtasks cannot be archived."}},"numberOfIssuesUpdated":1}"#,
    )));
    let client = client_with(&mock);

    let (report, response) = client
        .archive()
        .preserve(&RequestContext::background(), &keys(&["PR-1", "PR-2"]))
        .unwrap();

    assert_eq!(report.number_of_issues_updated, 1);
    let subtask = report.errors.unwrap().issue_is_subtask.unwrap();
    assert_eq!(subtask.count, 1);
    assert_eq!(response.code.as_u16(), 200);

    let sent = mock.last();
    assert_eq!(sent.method, "PUT");
    assert_eq!(sent.url, "https://x.atlassian.net/rest/api/3/issue/archive");
    assert_eq!(sent.json(), serde_json::json!({"issueIdsOrKeys": ["PR-1", "PR-2"]}));
}

#[test]
fn test_restore_uses_unarchive_endpoint() {
    let mock = Arc::new(MockTransport::new().reply(Reply::new(200, r#"{"numberOfIssuesUpdated":3}"#)));
    let client = client_with(&mock);

    let (report, _) = client
        .archive()
        .restore(&RequestContext::background(), &keys(&["PR-1", "PR-2", "PR-3"]))
        .unwrap();

    assert_eq!(report.number_of_issues_updated, 3);
    assert!(report.errors.is_none());
    assert_eq!(mock.last().url, "https://x.atlassian.net/rest/api/3/issue/unarchive");
}

#[test]
fn test_empty_keys_are_rejected_before_sending() {
    let mock = Arc::new(MockTransport::new());
    let client = client_with(&mock);
    let ctx = RequestContext::background();

    assert!(matches!(client.archive().preserve(&ctx, &[]), Err(Error::NoIssueKeys)));
    assert!(matches!(client.archive().restore(&ctx, &[]), Err(Error::NoIssueKeys)));
    assert!(matches!(client.archive().preserve_by_jql(&ctx, ""), Err(Error::NoJql)));
    assert!(mock.requests().is_empty());
}

#[test]
fn test_preserve_by_jql_returns_task_id() {
    let mock = Arc::new(
        MockTransport::new().reply(Reply::new(204, "").at("https://x.atlassian.net/rest/api/3/task/10042")),
    );
    let client = client_with(&mock);

    let (task_id, response) = client
        .archive()
        .preserve_by_jql(&RequestContext::background(), "project = PR AND resolution = Done")
        .unwrap();

    assert_eq!(task_id, "10042");
    assert!(response.bytes.is_empty());

    let sent = mock.last();
    assert_eq!(sent.method, "POST");
    assert_eq!(sent.json()["jql"], "project = PR AND resolution = Done");
}

#[test]
fn test_export_task_id_from_location() {
    let mock = Arc::new(
        MockTransport::new()
            .reply(Reply::new(202, "").header("location", "https://x.atlassian.net/rest/api/3/task/20077")),
    );
    let client = client_with(&mock);

    let payload = IssueArchivalExportPayload {
        projects: vec!["PR".to_string()],
        archived_date_range: Some(DateRangeFilter {
            date_after: Some("2024-01-01".to_string()),
            date_before: Some("2024-06-30".to_string()),
        }),
        ..Default::default()
    };
    let (task_id, _) = client
        .archive()
        .export(&RequestContext::background(), &payload)
        .unwrap();

    assert_eq!(task_id, "20077");
    let sent = mock.last();
    assert_eq!(sent.url, "https://x.atlassian.net/rest/api/3/issues/archive/export");
    assert_eq!(sent.json()["archivedDateRange"]["dateBefore"], "2024-06-30");
}

#[test]
fn test_async_shape_keeps_status_errors() {
    let mock = Arc::new(MockTransport::new().reply(Reply::new(
        400,
        r#"{"errorMessages":["The JQL query is invalid."]}"#,
    )));
    let client = client_with(&mock);

    let err = client
        .archive()
        .preserve_by_jql(&RequestContext::background(), "project = ")
        .unwrap_err();

    assert!(matches!(err, Error::BadRequest(_)));
    assert!(err.response().unwrap().body_str().contains("invalid"));
}
