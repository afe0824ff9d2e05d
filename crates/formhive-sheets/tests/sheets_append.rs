use std::path::PathBuf;

use chrono::Utc;
use formhive_core::{SheetsAuthConfig, SheetsConfig, SinkConfig, SinkError, SubmissionSink};
use formhive_schema::{ChatId, Submission};
use formhive_sheets::{build_sink, SheetsSink, TokenSource};
use wiremock::matchers::{body_json, body_string_contains, header, method, path, path_regex, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn sheets_config(api_base: String, auth: SheetsAuthConfig) -> SheetsConfig {
    SheetsConfig {
        spreadsheet_id: "sheet-1".into(),
        range: "Основная!A:O".into(),
        api_base,
        auth,
    }
}

fn submission() -> Submission {
    Submission {
        chat_id: ChatId(42),
        answers: vec!["costa79".into(), "Ivan".into(), "photos/photo_42.jpg".into()],
        photo_path: Some(PathBuf::from("photos/photo_42.jpg")),
        submitted_at: Utc::now(),
    }
}

#[tokio::test]
async fn append_posts_row_with_bearer_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path_regex(r"^/v4/spreadsheets/sheet-1/values/.+:append$"))
        .and(query_param("valueInputOption", "RAW"))
        .and(query_param("insertDataOption", "INSERT_ROWS"))
        .and(header("authorization", "Bearer ya29.static"))
        .and(body_json(serde_json::json!({
            "values": [[42, "costa79", "Ivan", "photos/photo_42.jpg", "photos/photo_42.jpg"]]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "spreadsheetId": "sheet-1",
            "updates": { "updatedRows": 1 }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let config = sheets_config(
        server.uri(),
        SheetsAuthConfig::Static {
            access_token: "ya29.static".into(),
        },
    );
    let sink =
        SheetsSink::from_config(reqwest::Client::new(), &config, TokenSource::fixed("ya29.static"))
            .unwrap();

    sink.append(&submission()).await.unwrap();
}

#[tokio::test]
async fn rejected_append_maps_to_sink_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path_regex(r":append$"))
        .respond_with(ResponseTemplate::new(403).set_body_string("PERMISSION_DENIED"))
        .mount(&server)
        .await;

    let config = sheets_config(
        server.uri(),
        SheetsAuthConfig::Static {
            access_token: "t".into(),
        },
    );
    let sink = SheetsSink::from_config(reqwest::Client::new(), &config, TokenSource::fixed("t"))
        .unwrap();

    let err = sink.append(&submission()).await.unwrap_err();
    match err {
        SinkError::Rejected { status, body } => {
            assert_eq!(status, 403);
            assert_eq!(body, "PERMISSION_DENIED");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn build_sink_refreshes_authorized_user_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("grant_type=refresh_token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "ya29.refreshed",
            "expires_in": 3600
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path_regex(r":append$"))
        .and(header("authorization", "Bearer ya29.refreshed"))
        .respond_with(ResponseTemplate::new(200))
        .expect(2)
        .mount(&server)
        .await;

    let tmp = tempfile::tempdir().unwrap();
    std::fs::write(
        tmp.path().join("credentials.json"),
        serde_json::json!({
            "type": "authorized_user",
            "client_id": "c",
            "client_secret": "s",
            "refresh_token": "r",
            "token_uri": format!("{}/token", server.uri()),
        })
        .to_string(),
    )
    .unwrap();

    let config = SinkConfig::Sheets(sheets_config(
        server.uri(),
        SheetsAuthConfig::AuthorizedUser {
            credentials_path: PathBuf::from("credentials.json"),
        },
    ));
    let sink = build_sink(&config, tmp.path()).unwrap();

    sink.append(&submission()).await.unwrap();
    sink.append(&submission()).await.unwrap();
}

#[tokio::test]
async fn build_sink_exchanges_service_account_key() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("jwt-bearer"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "ya29.service",
            "expires_in": 3600
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path_regex(r":append$"))
        .and(header("authorization", "Bearer ya29.service"))
        .respond_with(ResponseTemplate::new(200))
        .expect(2)
        .mount(&server)
        .await;

    let tmp = tempfile::tempdir().unwrap();
    std::fs::write(
        tmp.path().join("service-account.json"),
        serde_json::json!({
            "type": "service_account",
            "private_key_id": "key-1",
            "private_key": include_str!("fixtures/service_account_key.pem"),
            "client_email": "formhive@survey-project.iam.gserviceaccount.com",
            "token_uri": format!("{}/token", server.uri()),
        })
        .to_string(),
    )
    .unwrap();

    let config = SinkConfig::Sheets(sheets_config(
        server.uri(),
        SheetsAuthConfig::ServiceAccount {
            key_path: PathBuf::from("service-account.json"),
        },
    ));
    let sink = build_sink(&config, tmp.path()).unwrap();

    sink.append(&submission()).await.unwrap();
    sink.append(&submission()).await.unwrap();
}

#[tokio::test]
async fn auth_failure_maps_to_auth_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(401).set_body_string("invalid_client"))
        .mount(&server)
        .await;

    let tmp = tempfile::tempdir().unwrap();
    std::fs::write(
        tmp.path().join("credentials.json"),
        serde_json::json!({
            "client_id": "c",
            "client_secret": "s",
            "refresh_token": "r",
            "token_uri": format!("{}/token", server.uri()),
        })
        .to_string(),
    )
    .unwrap();

    let config = SinkConfig::Sheets(sheets_config(
        server.uri(),
        SheetsAuthConfig::AuthorizedUser {
            credentials_path: PathBuf::from("credentials.json"),
        },
    ));
    let sink = build_sink(&config, tmp.path()).unwrap();

    let err = sink.append(&submission()).await.unwrap_err();
    assert!(matches!(err, SinkError::Auth(message) if message.contains("invalid_client")));
}

#[tokio::test]
async fn build_sink_writes_jsonl_relative_to_base() {
    let tmp = tempfile::tempdir().unwrap();
    let config = SinkConfig::Jsonl {
        path: PathBuf::from("data/submissions.jsonl"),
    };
    let sink = build_sink(&config, tmp.path()).unwrap();
    sink.append(&submission()).await.unwrap();

    let content = std::fs::read_to_string(tmp.path().join("data/submissions.jsonl")).unwrap();
    assert_eq!(content.lines().count(), 1);
    assert!(content.contains("\"chat_id\":42"));
}
