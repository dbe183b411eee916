use jambda_client::HttpResourceClient;
use jambda_console::{build_console, execute, Cli};
use jambda_control::{Console, FormFlow, Modal};
use jambda_models::{ConsoleConfig, FieldEdit, FunctionResource, SubmissionErrorKind};
use serde_json::json;
use std::sync::Arc;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn hello_body() -> serde_json::Value {
    json!({
        "id": 4,
        "external_id": "abc",
        "name": "hello",
        "state": "ACTIVE",
        "configuration": {
            "trigger": "http",
            "image": "golang:1.22",
            "type": "REST",
            "port": 8080,
            "envVars": {}
        },
        "created_at": "2024-05-01T10:00:00Z",
        "updated_at": "2024-05-01T10:00:00Z"
    })
}

fn console_for(server: &MockServer) -> Console {
    let mut config = ConsoleConfig::default();
    config.api.base_url = server.uri();
    let client = HttpResourceClient::new(&config.api).unwrap();
    build_console(&config, Arc::new(client)).unwrap()
}

#[tokio::test]
async fn create_hello_becomes_first_snapshot_entry() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/api/function"))
        .respond_with(ResponseTemplate::new(201).set_body_json(hello_body()))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/api/function"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([hello_body()])))
        .mount(&server)
        .await;

    let archive = tempfile::Builder::new().suffix(".zip").tempfile().unwrap();
    std::fs::write(archive.path(), b"PK\x03\x04payload").unwrap();

    let mut console = console_for(&server);
    let cli = <Cli as clap::Parser>::try_parse_from([
        "jambda-console",
        "create",
        "--name",
        "hello",
        "--trigger",
        "http",
        "--image",
        "golang:1.22",
        "--type",
        "REST",
        "--port",
        "8080",
        "--zip",
        archive.path().to_str().unwrap(),
    ])
    .unwrap();
    let mut out = Vec::new();
    execute(cli.command, &mut console, &mut out).await.unwrap();

    let expected: FunctionResource = serde_json::from_value(hello_body()).unwrap();
    assert_eq!(console.registry_snapshot()[0], expected);

    let requests = server.received_requests().await.unwrap();
    let posts: Vec<_> = requests
        .iter()
        .filter(|request| request.method.as_str() == "POST")
        .collect();
    assert_eq!(posts.len(), 1);
    let body = String::from_utf8_lossy(&posts[0].body);
    assert!(body.contains(r#"name="zip""#));
    assert!(body.contains(r#"name="config""#));
    assert!(body.contains(r#"name="name""#));
}

#[tokio::test]
async fn edit_of_vanished_function_shows_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/api/function"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([hello_body()])))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/v1/api/function/abc"))
        .respond_with(
            ResponseTemplate::new(404)
                .set_body_json(json!({"error": "NOT_FOUND", "message": "not found"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let mut console = console_for(&server);
    console.refresh();
    console.settle().await;
    let before = console.registry_snapshot();

    assert!(console.select_function("abc"));
    assert!(console.open_edit());
    console.edit_existing(FieldEdit::Port("9000".into()));
    console.submit_edit().unwrap();
    console.settle().await;

    let error = console.submission_error(FormFlow::Edit).unwrap();
    assert_eq!(error.detail, "not found");
    assert_eq!(error.kind, SubmissionErrorKind::Remote { status_code: 404 });
    assert_eq!(console.modal(), Modal::Edit);
    assert_eq!(console.registry_snapshot(), before);
}

#[tokio::test]
async fn unreachable_control_plane_fails_list() {
    let mut config = ConsoleConfig::default();
    config.api.base_url = "http://127.0.0.1:1".to_string();
    config.api.timeout_ms = 2000;
    let client = HttpResourceClient::new(&config.api).unwrap();
    let mut console = build_console(&config, Arc::new(client)).unwrap();

    let cli = <Cli as clap::Parser>::try_parse_from(["jambda-console", "list"]).unwrap();
    let mut out = Vec::new();
    let err = execute(cli.command, &mut console, &mut out)
        .await
        .unwrap_err();

    assert!(err
        .to_string()
        .contains("could not reach the function control plane"));
    assert!(out.is_empty());
}
