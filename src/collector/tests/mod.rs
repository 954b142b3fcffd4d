use super::*;
use crate::config::{ClientConfig, RetryConfig};
use crate::fetcher::PagedFetcher;
use crate::pacing::RequestPacer;
use chrono::NaiveDate;
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn collector_for(server: &MockServer, config: CollectorConfig) -> ContributionCollector {
    let client = ClientConfig {
        base_url: server.uri(),
        ..ClientConfig::default()
    };
    let retry = RetryConfig {
        max_attempts: 2,
        initial_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(5),
        ..RetryConfig::default()
    };
    let fetcher = PagedFetcher::new(&client, retry, RequestPacer::unpaced()).unwrap();
    let per_page = config.per_page;
    ContributionCollector::new(GitHubApi::new(fetcher, per_page), config)
}

/// `projects` lists (project, repository) pairs; `None` triggers discovery
fn report_input(users: &[&str], projects: Option<Vec<(&str, &str)>>) -> ReportInput {
    ReportInput {
        start_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        users: users.iter().map(|u| u.to_string()).collect(),
        projects: projects.map(|pairs| {
            let mut projects = ProjectMap::new();
            for (key, repo) in pairs {
                projects
                    .entry(key.to_string())
                    .or_default()
                    .push(repo.parse().unwrap());
            }
            projects
        }),
    }
}

fn start() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2024-01-01T00:00:00Z")
        .unwrap()
        .with_timezone(&Utc)
}

async fn mount_json(server: &MockServer, endpoint: &str, body: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path(endpoint))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

async fn mount_user(server: &MockServer, login: &str, name: Option<&str>) {
    mount_json(
        server,
        &format!("/users/{login}"),
        json!({
            "login": login,
            "name": name,
            "avatar_url": format!("https://avatars.test/{login}"),
            "html_url": format!("https://github.test/{login}")
        }),
    )
    .await;
}

async fn mount_repository(server: &MockServer, repo: &str) {
    Mock::given(method("GET"))
        .and(path(format!("/repos/{repo}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "full_name": repo,
            "description": "A test repository",
            "html_url": format!("https://github.test/{repo}"),
            "owner": { "avatar_url": "https://avatars.test/owner" }
        })))
        .expect(1)
        .mount(server)
        .await;
}

async fn mount_commits(server: &MockServer, repo: &str, author: &str, count: usize) {
    let commits: Vec<_> = (0..count).map(|i| json!({ "sha": format!("{i:040}") })).collect();
    Mock::given(method("GET"))
        .and(path(format!("/repos/{repo}/commits")))
        .and(query_param("author", author))
        .and(query_param("since", "2024-01-01T00:00:00Z"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!(commits)))
        .mount(server)
        .await;
}

/// o/r1 with contributors [bob, Alice], three commits by alice and one matching PR
async fn mount_single_repository_scenario(server: &MockServer) {
    mount_user(server, "alice", Some("Alice Liddell")).await;
    mount_repository(server, "o/r1").await;
    mount_json(
        server,
        "/repos/o/r1/contributors",
        json!([{ "login": "bob" }, { "login": "Alice" }]),
    )
    .await;
    mount_json(
        server,
        "/repos/o/r1/pulls",
        json!([
            { "user": { "login": "Alice " }, "created_at": "2024-03-01T12:00:00Z" },
            { "user": { "login": "alice" }, "created_at": "2023-12-31T23:59:59Z" },
            { "user": { "login": "bob" }, "created_at": "2024-03-02T12:00:00Z" }
        ]),
    )
    .await;
    mount_commits(server, "o/r1", "alice", 3).await;
}

#[tokio::test]
async fn collects_one_record_per_triple() {
    let server = MockServer::start().await;
    mount_single_repository_scenario(&server).await;

    let collector = collector_for(&server, CollectorConfig::default());
    let input = report_input(&["alice"], Some(vec![("P1", "o/r1")]));
    let records = collector.collect(&input).await.unwrap();

    assert_eq!(records.len(), 1);
    let record = &records[0];
    assert_eq!(record.project(), "P1");
    assert_eq!(record.repository(), "o/r1");
    assert_eq!(record.user(), "alice");
    assert_eq!(record.commit_count(), 3);
    assert_eq!(record.open_pull_request_count(), 1);
    assert_eq!(record.overall_contribution(), 4);
    assert_eq!(record.rank(), ContributorRank::from_position(2));
    assert_eq!(record.user_meta().display_name, "Alice Liddell");
    assert_eq!(record.repository_meta().description.as_deref(), Some("A test repository"));
    assert_eq!(
        record.repository_meta().avatar_url.as_deref(),
        Some("https://avatars.test/owner")
    );
}

#[tokio::test]
async fn zero_activity_still_produces_a_record() {
    let server = MockServer::start().await;
    mount_single_repository_scenario(&server).await;
    mount_user(&server, "carol", None).await;
    mount_commits(&server, "o/r1", "carol", 0).await;

    let collector = collector_for(&server, CollectorConfig::default());
    let input = report_input(&["alice", "carol"], Some(vec![("P1", "o/r1")]));
    let records = collector.collect(&input).await.unwrap();

    assert_eq!(records.len(), 2);
    let carol = &records[1];
    assert_eq!(carol.user(), "carol");
    assert_eq!(carol.overall_contribution(), 0);
    assert_eq!(carol.rank(), ContributorRank::Unranked);
    assert_eq!(carol.user_meta().display_name, "carol", "name falls back to login");
}

#[tokio::test]
async fn shared_repository_is_fetched_once() {
    let server = MockServer::start().await;
    mount_single_repository_scenario(&server).await;

    let collector = collector_for(&server, CollectorConfig::default());
    let input = report_input(&["alice"], Some(vec![("P1", "o/r1"), ("P2", "o/r1")]));
    let records = collector.collect(&input).await.unwrap();

    let projects: Vec<_> = records.iter().map(|r| r.project()).collect();
    assert_eq!(projects, vec!["P1", "P2"]);
    assert_eq!(records[0].overall_contribution(), records[1].overall_contribution());

    // users, repository, contributors, pulls, commits
    assert_eq!(server.received_requests().await.unwrap().len(), 5);
}

#[tokio::test]
async fn concurrent_commit_fetches_keep_user_order() {
    let server = MockServer::start().await;
    mount_repository(&server, "o/r1").await;
    mount_json(&server, "/repos/o/r1/contributors", json!([])).await;
    mount_json(&server, "/repos/o/r1/pulls", json!([])).await;
    for (i, user) in ["u1", "u2", "u3", "u4"].iter().enumerate() {
        mount_user(&server, user, None).await;
        mount_commits(&server, "o/r1", user, i + 1).await;
    }

    let config = CollectorConfig {
        max_concurrent_requests: 3,
        ..CollectorConfig::default()
    };
    let collector = collector_for(&server, config);
    let input = report_input(&["u1", "u2", "u3", "u4"], Some(vec![("P", "o/r1")]));
    let records = collector.collect(&input).await.unwrap();

    let counts: Vec<_> = records
        .iter()
        .map(|r| (r.user(), r.commit_count()))
        .collect();
    assert_eq!(counts, vec![("u1", 1), ("u2", 2), ("u3", 3), ("u4", 4)]);
}

#[tokio::test]
async fn discovery_creates_one_project_per_repository() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search/issues"))
        .and(query_param("q", "type:pr author:alice"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "total_count": 3,
            "items": [
                { "repository_url": "https://api.github.com/repos/o/r1" },
                { "repository_url": "https://api.github.com/repos/x/y" },
                { "repository_url": "https://api.github.com/repos/o/r1" }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let collector = collector_for(&server, CollectorConfig::default());
    let input = report_input(&["alice"], None);
    let projects = collector.resolve_projects(&input).await.unwrap();

    let keys: Vec<_> = projects.keys().map(String::as_str).collect();
    assert_eq!(keys, vec!["o/r1", "x/y"]);
    assert_eq!(projects["x/y"], vec![RepositoryId::new("x", "y")]);
}

#[tokio::test]
async fn explicit_projects_skip_discovery() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search/issues"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let collector = collector_for(&server, CollectorConfig::default());
    let input = report_input(&["alice"], Some(vec![("P1", "o/r1")]));
    let projects = collector.resolve_projects(&input).await.unwrap();

    assert_eq!(projects.len(), 1);
}

#[tokio::test]
async fn failed_commit_listing_aborts_with_stage_and_entity() {
    let server = MockServer::start().await;
    mount_user(&server, "alice", None).await;
    mount_repository(&server, "o/r1").await;
    mount_json(&server, "/repos/o/r1/contributors", json!([])).await;
    mount_json(&server, "/repos/o/r1/pulls", json!([])).await;
    Mock::given(method("GET"))
        .and(path("/repos/o/r1/commits"))
        .respond_with(ResponseTemplate::new(500))
        .expect(2)
        .mount(&server)
        .await;

    let collector = collector_for(&server, CollectorConfig::default());
    let input = report_input(&["alice"], Some(vec![("P1", "o/r1")]));
    let err = collector.collect(&input).await.unwrap_err();

    assert_eq!(err.stage, CollectionStage::Commits);
    assert_eq!(err.entity, "o/r1 (alice)");
    assert_eq!(err.source.attempt, 2);
    assert_eq!(err.source.status(), Some(500));
}

#[tokio::test]
async fn unknown_user_fails_before_any_repository_fetch() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users/ghost"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/repos/o/r1"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let collector = collector_for(&server, CollectorConfig::default());
    let input = report_input(&["ghost"], Some(vec![("P1", "o/r1")]));
    let err = collector.collect(&input).await.unwrap_err();

    assert_eq!(err.stage, CollectionStage::UserMetadata);
    assert_eq!(err.entity, "ghost");
}

#[test]
fn pull_requests_are_bucketed_by_normalized_author() {
    let pulls: Vec<PullRequest> = serde_json::from_value(json!([
        { "user": { "login": " Alice" }, "created_at": "2024-01-01T00:00:00Z" },
        { "user": { "login": "ALICE" }, "created_at": "2024-06-01T08:30:00+02:00" },
        { "user": { "login": "alice" }, "created_at": "2023-06-01T00:00:00Z" },
        { "user": null, "created_at": "2024-06-01T00:00:00Z" }
    ]))
    .unwrap();

    let buckets = bucket_pull_requests(&pulls, start());
    assert_eq!(buckets.len(), 1);
    assert_eq!(buckets["alice"], 2);
}

#[test]
fn created_at_boundary_is_inclusive() {
    assert!(created_on_or_after("2024-01-01T00:00:00Z", start()));
    assert!(!created_on_or_after("2023-12-31T23:59:59Z", start()));
    // 2024-01-01T01:00+02:00 is still 2023-12-31 in UTC
    assert!(!created_on_or_after("2024-01-01T01:00:00+02:00", start()));
}

#[test]
fn unparseable_created_at_falls_back_to_text_comparison() {
    assert!(created_on_or_after("2024-01-01 garbage", start()));
    assert!(!created_on_or_after("2023-12-31 garbage", start()));
}
