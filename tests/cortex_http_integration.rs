//! End-to-end test over HTTP
//!
//! Login, Cortex Search and Cortex completions are served by a local mock
//! server; the filtered pipeline runs unchanged against it.

use serde_json::json;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use cortexrag::{
    bootstrap::Bootstrap,
    cli::{config::ConnectionConfig, Config},
    session::Credentials,
    RagError,
};

const SEARCH_PATH: &str =
    "/api/v2/databases/DOCS/schemas/PUBLIC/cortex-search-services/DOCS_SEARCH:query";
const COMPLETE_PATH: &str = "/api/v2/cortex/inference:complete";

fn credentials() -> Credentials {
    Credentials::from_lookup(|key| {
        let value = match key {
            "SNOWFLAKE_ACCOUNT" => "myorg_myacct",
            "SNOWFLAKE_USER" => "analyst",
            "SNOWFLAKE_USER_PASSWORD" => "hunter2",
            "SNOWFLAKE_ROLE" => "ANALYST",
            "SNOWFLAKE_DATABASE" => "DOCS",
            "SNOWFLAKE_SCHEMA" => "PUBLIC",
            "SNOWFLAKE_WAREHOUSE" => "COMPUTE_WH",
            "SNOWFLAKE_CORTEX_SEARCH_SERVICE" => "DOCS_SEARCH",
            _ => return None,
        };
        Some(value.to_string())
    })
    .unwrap()
}

fn config_for(server: &MockServer) -> Config {
    Config {
        connection: ConnectionConfig {
            base_url: Some(server.uri()),
            request_timeout_secs: 5,
        },
        ..Config::default()
    }
}

async fn mount_login(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/session/v1/login-request"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": { "token": "session-token" }
        })))
        .mount(server)
        .await;
}

fn json_answer(text: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "choices": [{ "message": { "content": text } }]
    }))
}

#[tokio::test]
async fn test_filtered_question_over_http() {
    let server = MockServer::start().await;
    mount_login(&server).await;

    Mock::given(method("POST"))
        .and(path(SEARCH_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [
                { "SUMMARY": "X is a widget." },
                { "SUMMARY": "Unrelated text." }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    // Judge calls
    Mock::given(method("POST"))
        .and(path(COMPLETE_PATH))
        .and(body_string_contains("CONTEXT: X is a widget."))
        .respond_with(json_answer("3"))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(COMPLETE_PATH))
        .and(body_string_contains("CONTEXT: Unrelated text."))
        .respond_with(json_answer("0"))
        .mount(&server)
        .await;

    // Answer call
    Mock::given(method("POST"))
        .and(path(COMPLETE_PATH))
        .and(body_string_contains("[INST]"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            concat!(
                "data: {\"choices\":[{\"delta\":{\"content\":\"X is \"}}]}\n\n",
                "data: {\"choices\":[{\"delta\":{\"content\":\"a widget.\"}}]}\n\n",
            ),
            "text/event-stream",
        ))
        .expect(1)
        .mount(&server)
        .await;

    let bootstrap = Bootstrap::connect(config_for(&server), &credentials())
        .await
        .unwrap();
    let record = bootstrap.recorded_app(true).record("What is X?").await.unwrap();

    assert_eq!(record.trace.context, vec!["X is a widget."]);
    assert!(!record.trace.prompt.contains("Unrelated text."));
    assert_eq!(record.trace.answer, "X is a widget.");
}

#[tokio::test]
async fn test_search_failure_surfaces_as_search_error() {
    let server = MockServer::start().await;
    mount_login(&server).await;

    Mock::given(method("POST"))
        .and(path(SEARCH_PATH))
        .respond_with(ResponseTemplate::new(403).set_body_string("insufficient privileges"))
        .mount(&server)
        .await;

    let bootstrap = Bootstrap::connect(config_for(&server), &credentials())
        .await
        .unwrap();
    let result = bootstrap.pipeline(false).query("What is X?").await;

    assert!(matches!(
        result,
        Err(RagError::SearchError { status: 403, ref message }) if message.contains("privileges")
    ));
}
