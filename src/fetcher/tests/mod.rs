use super::*;
use crate::retry::IsRetryable;
use serde_json::json;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[derive(Debug, Deserialize, PartialEq)]
struct Item {
    id: u32,
}

fn fast_retry() -> RetryConfig {
    RetryConfig {
        max_attempts: 3,
        initial_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(20),
        backoff_multiplier: 2.0,
        jitter: false,
    }
}

fn fetcher_for(server: &MockServer) -> PagedFetcher {
    let config = ClientConfig {
        base_url: server.uri(),
        token: Some("test-token".to_string()),
        ..ClientConfig::default()
    };
    PagedFetcher::new(&config, fast_retry(), RequestPacer::unpaced())
        .expect("fetcher should build")
}

fn items(range: std::ops::Range<u32>) -> serde_json::Value {
    json!(range.map(|id| json!({ "id": id })).collect::<Vec<_>>())
}

async fn mount_page(server: &MockServer, endpoint: &str, page: u32, body: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path(endpoint))
        .and(query_param("page", page.to_string()))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .expect(1)
        .mount(server)
        .await;
}

#[tokio::test]
async fn page_number_walk_stops_on_short_page() {
    let server = MockServer::start().await;
    mount_page(&server, "/repos/o/r/commits", 1, items(0..100)).await;
    mount_page(&server, "/repos/o/r/commits", 2, items(100..200)).await;
    mount_page(&server, "/repos/o/r/commits", 3, items(200..237)).await;
    Mock::given(method("GET"))
        .and(path("/repos/o/r/commits"))
        .and(query_param("page", "4"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(0)
        .mount(&server)
        .await;

    let fetcher = fetcher_for(&server);
    let request = PageRequest::new("/repos/o/r/commits").param("author", "alice");
    let records: Vec<Item> = fetcher.fetch_all(&request).await.unwrap();

    assert_eq!(records.len(), 237);
    assert!(
        records.iter().enumerate().all(|(i, item)| item.id == i as u32),
        "pages must be concatenated in request order"
    );
    assert_eq!(server.received_requests().await.unwrap().len(), 3);
}

#[tokio::test]
async fn page_number_walk_stops_on_empty_page() {
    let server = MockServer::start().await;
    mount_page(&server, "/repos/o/r/pulls", 1, items(0..2)).await;

    let fetcher = fetcher_for(&server);
    let request = PageRequest::new("/repos/o/r/pulls").per_page(2);

    // Page 1 is full, so page 2 is requested and comes back empty
    Mock::given(method("GET"))
        .and(path("/repos/o/r/pulls"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let records: Vec<Item> = fetcher.fetch_all(&request).await.unwrap();
    assert_eq!(records, vec![Item { id: 0 }, Item { id: 1 }]);
}

#[tokio::test]
async fn max_pages_caps_the_walk() {
    let server = MockServer::start().await;
    mount_page(&server, "/repos/o/r/contributors", 1, items(0..2)).await;
    mount_page(&server, "/repos/o/r/contributors", 2, items(2..4)).await;
    Mock::given(method("GET"))
        .and(path("/repos/o/r/contributors"))
        .and(query_param("page", "3"))
        .respond_with(ResponseTemplate::new(200).set_body_json(items(4..6)))
        .expect(0)
        .mount(&server)
        .await;

    let fetcher = fetcher_for(&server);
    let request = PageRequest::new("/repos/o/r/contributors")
        .per_page(2)
        .max_pages(2);
    let records: Vec<Item> = fetcher.fetch_all(&request).await.unwrap();

    assert_eq!(records.len(), 4);
}

#[tokio::test]
async fn total_count_walk_stops_at_total() {
    let server = MockServer::start().await;
    mount_page(
        &server,
        "/search/issues",
        1,
        json!({ "total_count": 3, "items": items(0..2) }),
    )
    .await;
    mount_page(
        &server,
        "/search/issues",
        2,
        json!({ "total_count": 3, "items": items(2..3) }),
    )
    .await;

    let fetcher = fetcher_for(&server);
    let request = PageRequest::new("/search/issues")
        .param("q", "type:pr author:alice")
        .total_count()
        .per_page(2);
    let records: Vec<Item> = fetcher.fetch_all(&request).await.unwrap();

    assert_eq!(records.len(), 3);
    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 2);
    assert!(
        requests[0]
            .url
            .query_pairs()
            .any(|(k, v)| k == "q" && v == "type:pr author:alice")
    );
}

#[tokio::test]
async fn total_count_walk_stops_on_empty_items() {
    let server = MockServer::start().await;
    mount_page(
        &server,
        "/search/issues",
        1,
        json!({ "total_count": 50, "items": [] }),
    )
    .await;

    let fetcher = fetcher_for(&server);
    let request = PageRequest::new("/search/issues").total_count();
    let records: Vec<Item> = fetcher.fetch_all(&request).await.unwrap();

    assert!(records.is_empty());
}

#[tokio::test]
async fn oversized_page_size_is_clamped_to_api_maximum() {
    let server = MockServer::start().await;
    for (page, body) in [(1, items(0..100)), (2, items(100..137))] {
        Mock::given(method("GET"))
            .and(path("/repos/o/r/pulls"))
            .and(query_param("per_page", "100"))
            .and(query_param("page", page.to_string()))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .expect(1)
            .mount(&server)
            .await;
    }

    let fetcher = fetcher_for(&server);
    let request = PageRequest::new("/repos/o/r/pulls").per_page(200);
    let records: Vec<Item> = fetcher.fetch_all(&request).await.unwrap();

    assert_eq!(records.len(), 137);
}

#[tokio::test]
async fn no_content_listing_is_an_empty_page() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/o/empty/contributors"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let fetcher = fetcher_for(&server);
    let request = PageRequest::new("/repos/o/empty/contributors");
    let records: Vec<Item> = fetcher.fetch_all(&request).await.unwrap();

    assert!(records.is_empty());
}

#[tokio::test]
async fn blank_listing_body_is_an_empty_page() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/o/r/commits"))
        .respond_with(ResponseTemplate::new(200).set_body_string("  \n"))
        .expect(1)
        .mount(&server)
        .await;

    let fetcher = fetcher_for(&server);
    let records: Vec<Item> = fetcher
        .fetch_all(&PageRequest::new("/repos/o/r/commits"))
        .await
        .unwrap();

    assert!(records.is_empty());
}

#[tokio::test]
async fn no_content_object_is_a_decode_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users/ghost"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let fetcher = fetcher_for(&server);
    let err = fetcher
        .fetch_object::<Item>("/users/ghost", &[])
        .await
        .unwrap_err();

    assert!(matches!(err.cause, FetchCause::Decode(_)), "{err}");
}

#[tokio::test]
async fn transient_failures_are_retried_until_success() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users/alice"))
        .respond_with(ResponseTemplate::new(502))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/users/alice"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": 7 })))
        .expect(1)
        .mount(&server)
        .await;

    let fetcher = fetcher_for(&server);
    let item: Item = fetcher.fetch_object("/users/alice", &[]).await.unwrap();

    assert_eq!(item, Item { id: 7 });
    assert_eq!(server.received_requests().await.unwrap().len(), 3);
}

#[tokio::test]
async fn exhausted_retries_report_last_attempt() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/o/r/pulls"))
        .respond_with(ResponseTemplate::new(503).set_body_string("try later"))
        .expect(3)
        .mount(&server)
        .await;

    let fetcher = fetcher_for(&server);
    let err = fetcher
        .fetch_all::<Item>(&PageRequest::new("/repos/o/r/pulls"))
        .await
        .unwrap_err();

    assert_eq!(err.attempt, 3);
    assert_eq!(err.status(), Some(503));
    assert_eq!(err.endpoint, "/repos/o/r/pulls?page=1");
    assert!(err.to_string().contains("try later"));
    assert_eq!(server.received_requests().await.unwrap().len(), 3);
}

#[tokio::test]
async fn not_found_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/o/missing"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({ "message": "Not Found" })))
        .expect(1)
        .mount(&server)
        .await;

    let fetcher = fetcher_for(&server);
    let err = fetcher
        .fetch_object::<Item>("/repos/o/missing", &[])
        .await
        .unwrap_err();

    assert_eq!(err.attempt, 1);
    assert_eq!(err.status(), Some(404));
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn malformed_body_is_retried_as_decode_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users/bob"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{\"id\": "))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/users/bob"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": 2 })))
        .mount(&server)
        .await;

    let fetcher = fetcher_for(&server);
    let item: Item = fetcher.fetch_object("/users/bob", &[]).await.unwrap();
    assert_eq!(item.id, 2);
    assert_eq!(server.received_requests().await.unwrap().len(), 2);
}

#[tokio::test]
async fn requests_carry_github_headers() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users/alice"))
        .and(header("authorization", "Bearer test-token"))
        .and(header("accept", GITHUB_MEDIA_TYPE))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": 1 })))
        .expect(1)
        .mount(&server)
        .await;

    let fetcher = fetcher_for(&server);
    let _: Item = fetcher.fetch_object("/users/alice", &[]).await.unwrap();

    let requests = server.received_requests().await.unwrap();
    let user_agent = requests[0]
        .headers
        .get("user-agent")
        .and_then(|v| v.to_str().ok())
        .unwrap();
    assert!(user_agent.starts_with("contrib-report/"), "{user_agent}");
}

#[tokio::test]
async fn anonymous_requests_omit_authorization() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users/alice"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": 1 })))
        .mount(&server)
        .await;

    let config = ClientConfig {
        base_url: format!("{}/", server.uri()),
        ..ClientConfig::default()
    };
    let fetcher = PagedFetcher::new(&config, fast_retry(), RequestPacer::unpaced()).unwrap();
    let _: Item = fetcher.fetch_object("/users/alice", &[]).await.unwrap();

    let requests = server.received_requests().await.unwrap();
    assert!(requests[0].headers.get("authorization").is_none());
}

#[test]
fn invalid_base_url_is_a_config_error() {
    let config = ClientConfig {
        base_url: "not a url".to_string(),
        ..ClientConfig::default()
    };
    let err = PagedFetcher::new(&config, fast_retry(), RequestPacer::unpaced()).unwrap_err();
    assert!(matches!(err, Error::Config { key: Some(ref k), .. } if k == "base_url"));
}

#[test]
fn retry_after_header_in_seconds() {
    let mut headers = HeaderMap::new();
    assert_eq!(parse_retry_after(&headers), None);

    headers.insert(RETRY_AFTER, HeaderValue::from_static("12"));
    assert_eq!(parse_retry_after(&headers), Some(Duration::from_secs(12)));

    headers.insert(
        RETRY_AFTER,
        HeaderValue::from_static("Wed, 21 Oct 2015 07:28:00 GMT"),
    );
    assert_eq!(parse_retry_after(&headers), None);
}

#[test]
fn long_error_bodies_are_truncated() {
    let body = "x".repeat(2_000);
    let truncated = truncate_body(&body);
    assert_eq!(truncated.chars().count(), MAX_ERROR_BODY_CHARS + 1);
    assert!(truncated.ends_with('…'));
    assert_eq!(truncate_body("  short  "), "short");
}
