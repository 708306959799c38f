//! Integration tests for the Tushare HTTP client against a mock server.

use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use tushare_reports::api::tushare_client::TushareError;
use tushare_reports::api::{ReportDataProvider, ReportQuery, TushareClient};
use tushare_reports::models::Config;
use tushare_reports::resolver::fetch_latest_report;

fn test_config(api_url: String) -> Config {
    Config {
        tushare_token: "test-token".to_string(),
        api_url,
        // Effectively no delay so the suite stays fast.
        rate_limit_per_minute: 60_000,
        request_timeout_secs: 5,
    }
}

async fn server_replying_with(reply: serde_json::Value) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(reply))
        .mount(&server)
        .await;
    server
}

#[tokio::test]
async fn decodes_a_tabular_reply_into_records() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/"))
        .and(body_partial_json(json!({
            "api_name": "income",
            "token": "test-token",
            "params": {"ts_code": "600348.SH", "period": "20231231"}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 0,
            "msg": null,
            "data": {
                "fields": ["ts_code", "ann_date", "end_date", "n_income_attr_p"],
                "items": [
                    ["600348.SH", "20240315", "20231231", 110.5],
                    ["600348.SH", "20240301", "20231231", null]
                ]
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = TushareClient::new(&test_config(server.uri())).unwrap();
    let query = ReportQuery::new("income")
        .param("ts_code", "600348.SH")
        .param("period", "20231231")
        .fields(["ts_code", "ann_date", "end_date", "n_income_attr_p"]);

    let records = client.fetch_report(&query).await.unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(
        records.get(0, "n_income_attr_p").as_f64(),
        Some(110.5)
    );
    assert!(records.get(1, "n_income_attr_p").value().is_none());
}

#[tokio::test]
async fn non_zero_reply_code_surfaces_as_typed_error() {
    let server = server_replying_with(json!({
        "code": 2002,
        "msg": "token mismatch",
        "data": null
    }))
    .await;

    let client = TushareClient::new(&test_config(server.uri())).unwrap();
    let err = client
        .fetch_report(&ReportQuery::new("income"))
        .await
        .unwrap_err();

    match err.downcast_ref::<TushareError>() {
        Some(TushareError::Api { code, msg }) => {
            assert_eq!(*code, 2002);
            assert_eq!(msg, "token mismatch");
        }
        other => panic!("expected TushareError::Api, got {:?}", other),
    }
}

#[tokio::test]
async fn reply_without_data_section_is_an_error() {
    let server = server_replying_with(json!({ "code": 0, "msg": null })).await;

    let client = TushareClient::new(&test_config(server.uri())).unwrap();
    let err = client
        .fetch_report(&ReportQuery::new("income"))
        .await
        .unwrap_err();

    assert!(matches!(
        err.downcast_ref::<TushareError>(),
        Some(TushareError::MissingData)
    ));
}

#[tokio::test]
async fn http_failure_propagates_to_the_caller() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream exploded"))
        .mount(&server)
        .await;

    let client = TushareClient::new(&test_config(server.uri())).unwrap();
    let err = client
        .fetch_report(&ReportQuery::new("income"))
        .await
        .unwrap_err();

    assert!(err.to_string().contains("500"));
}

#[tokio::test]
async fn fetch_and_resolve_end_to_end() {
    let server = server_replying_with(json!({
        "code": 0,
        "msg": null,
        "data": {
            "fields": ["end_date", "ann_date", "n_income_attr_p"],
            "items": [
                ["20231231", "20240301", 100.0],
                ["20231231", "20240315", 110.0],
                ["20221231", "20230301", 90.0]
            ]
        }
    }))
    .await;

    let client = TushareClient::new(&test_config(server.uri())).unwrap();
    let query = ReportQuery::new("income").param("ts_code", "600348.SH");

    let result = fetch_latest_report(&client, &query, "end_date", "20231231", false)
        .await
        .unwrap()
        .expect("a disclosure should resolve");

    assert_eq!(result.len(), 1);
    assert_eq!(
        result.get(0, "ann_date").canonical_text(),
        Some("20240315".to_string())
    );
    assert_eq!(result.get(0, "n_income_attr_p").as_f64(), Some(110.0));
}
