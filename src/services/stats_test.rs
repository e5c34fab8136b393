use super::*;
use std::time::Duration as StdDuration;

use crate::oauth::build_http_client_with;
use crate::repo::AccountUpsert;
use crate::state::test_helpers::{seed_account, test_app_state};
use serde_json::json;
use time::Duration;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn seed_history(state: &AppState, profile: &str, provider: &str, count: i64) {
    state
        .repo
        .append_follower_count(FollowerHistoryEntry {
            profile_id: profile.into(),
            provider: provider.into(),
            follower_count: count,
            recorded_at: OffsetDateTime::now_utc() - Duration::hours(1),
        })
        .await
        .unwrap();
}

// =============================================================================
// compute_growth
// =============================================================================

#[test]
fn measured_growth_against_previous() {
    assert_eq!(compute_growth(110, Some(100), Duration::DAY), (10.0, GrowthBasis::Measured));
    assert_eq!(compute_growth(90, Some(100), Duration::DAY), (-10.0, GrowthBasis::Measured));
    assert_eq!(compute_growth(1003, Some(3), Duration::ZERO), (33333.3, GrowthBasis::Measured));
}

#[test]
fn growth_rounds_to_one_decimal() {
    let (growth, _) = compute_growth(1001, Some(3000), Duration::DAY);
    assert!((growth - -66.6).abs() < f64::EPSILON);
}

#[test]
fn previous_zero_does_not_divide() {
    let (growth, basis) = compute_growth(50, Some(0), Duration::days(3));
    assert!(growth.is_finite());
    assert_eq!((growth, basis), (5.0, GrowthBasis::Estimated));
    assert_eq!(compute_growth(0, Some(0), Duration::days(3)), (0.0, GrowthBasis::None));
}

#[test]
fn estimate_tiers_by_size() {
    let week = Duration::days(7);
    assert_eq!(compute_growth(99, None, week).0, 5.0);
    assert_eq!(compute_growth(100, None, week).0, 3.0);
    assert_eq!(compute_growth(9_999, None, week).0, 2.0);
    assert_eq!(compute_growth(10_000, None, week).0, 1.0);
}

#[test]
fn fresh_accounts_get_fixed_estimate() {
    assert_eq!(compute_growth(12_000, None, Duration::hours(2)), (2.5, GrowthBasis::Estimated));
    assert_eq!(compute_growth(0, None, Duration::hours(2)), (0.0, GrowthBasis::None));
}

#[test]
fn basis_serializes_lowercase() {
    let stats = ProviderStats { count: 3, growth: 2.5, basis: GrowthBasis::Estimated };
    assert_eq!(serde_json::to_value(stats).unwrap(), json!({"count": 3, "growth": 2.5, "basis": "estimated"}));
}

// =============================================================================
// refresh_stats
// =============================================================================

#[tokio::test]
async fn slow_provider_does_not_block_others() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/user"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"followers": 120})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/2/users/me"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"data": {"public_metrics": {"followers_count": 9}}}))
                .set_delay(StdDuration::from_secs(5)),
        )
        .mount(&server)
        .await;

    let mut state = test_app_state(&server.uri());
    state.http = build_http_client_with(StdDuration::from_millis(300), StdDuration::from_millis(300)).unwrap();
    seed_account(&state, "p1", "github", "gho").await;
    seed_account(&state, "p1", "twitter", "tw").await;
    seed_history(&state, "p1", "github", 100).await;
    seed_history(&state, "p1", "twitter", 50).await;

    let stats = refresh_stats(&state, "p1").await.unwrap();
    assert_eq!(stats["twitter"], ProviderStats { count: 0, growth: 0.0, basis: GrowthBasis::None });
    assert_eq!(stats["github"], ProviderStats { count: 120, growth: 20.0, basis: GrowthBasis::Measured });
}

#[tokio::test]
async fn failed_fetch_is_not_measured_against_history() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/user"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&server)
        .await;
    let state = test_app_state(&server.uri());
    seed_account(&state, "p1", "github", "gho").await;
    seed_history(&state, "p1", "github", 80).await;

    let stats = refresh_stats(&state, "p1").await.unwrap();
    assert_eq!(stats["github"], ProviderStats { count: 0, growth: 0.0, basis: GrowthBasis::None });

    let history = state.repo.recent_follower_counts("p1", "github", 10).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].follower_count, 0);
}

#[tokio::test]
async fn every_run_appends_history_even_for_zero() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/user"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;
    let state = test_app_state(&server.uri());
    seed_account(&state, "p1", "github", "gho").await;

    refresh_stats(&state, "p1").await.unwrap();
    refresh_stats(&state, "p1").await.unwrap();

    let history = state.repo.recent_follower_counts("p1", "github", 10).await.unwrap();
    assert_eq!(history.len(), 2);
    assert!(history.iter().all(|e| e.follower_count == 0));
}

#[tokio::test]
async fn second_run_measures_against_first() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/youtube/v3/channels"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"items": [{"statistics": {"subscriberCount": "200"}}]})),
        )
        .mount(&server)
        .await;
    let state = test_app_state(&server.uri());
    seed_account(&state, "p1", "youtube", "ya29").await;

    let first = refresh_stats(&state, "p1").await.unwrap();
    assert_eq!(first["youtube"].basis, GrowthBasis::Estimated);
    assert_eq!(first["youtube"].growth, 2.5);

    let second = refresh_stats(&state, "p1").await.unwrap();
    assert_eq!(second["youtube"], ProviderStats { count: 200, growth: 0.0, basis: GrowthBasis::Measured });
}

#[tokio::test]
async fn linkedin_reports_zero_and_is_hidden_from_summary() {
    let server = MockServer::start().await;
    let state = test_app_state(&server.uri());
    seed_account(&state, "p1", "linkedin", "li").await;
    seed_account(&state, "p1", "instagram", "ig").await;

    let stats = refresh_stats(&state, "p1").await.unwrap();
    assert_eq!(stats["linkedin"].count, 0);
    assert_eq!(stats["instagram"].count, 0);

    let visible = visible_stats(&state.providers, stats);
    assert!(!visible.contains_key("linkedin"));
    assert!(visible.contains_key("instagram"));
}

#[tokio::test]
async fn no_accounts_yields_empty_map() {
    let server = MockServer::start().await;
    let state = test_app_state(&server.uri());
    assert!(refresh_stats(&state, "nobody").await.unwrap().is_empty());
}

#[tokio::test]
async fn expired_token_is_refreshed_before_fetch() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/2/oauth2/token"))
        .and(body_string_contains("grant_type=refresh_token"))
        .and(body_string_contains("refresh_token=tw_rt"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"access_token": "tw_new", "expires_in": 7200})),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/2/users/me"))
        .and(header("authorization", "Bearer tw_new"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"data": {"public_metrics": {"followers_count": 42}}})),
        )
        .mount(&server)
        .await;

    let state = test_app_state(&server.uri());
    state
        .repo
        .upsert_connected_account(AccountUpsert {
            profile_id: "p1".into(),
            provider: "twitter".into(),
            provider_account_id: "1".into(),
            username: "jack".into(),
            access_token: "tw_old".into(),
            refresh_token: Some("tw_rt".into()),
            token_expires_at: Some(OffsetDateTime::now_utc() - Duration::minutes(5)),
        })
        .await
        .unwrap();

    let stats = refresh_stats(&state, "p1").await.unwrap();
    assert_eq!(stats["twitter"].count, 42);

    let account = state.repo.get_connected_account("p1", "twitter").await.unwrap().unwrap();
    assert_eq!(account.access_token, "tw_new");
    assert_eq!(account.refresh_token.as_deref(), Some("tw_rt"));
    assert!(!account.token_expired_at(OffsetDateTime::now_utc()));
}

#[tokio::test]
async fn failed_refresh_falls_back_to_stored_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/2/oauth2/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({"error": "invalid_grant"})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/2/users/me"))
        .and(header("authorization", "Bearer tw_old"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"data": {"public_metrics": {"followers_count": 7}}})),
        )
        .mount(&server)
        .await;

    let state = test_app_state(&server.uri());
    state
        .repo
        .upsert_connected_account(AccountUpsert {
            profile_id: "p1".into(),
            provider: "twitter".into(),
            provider_account_id: "1".into(),
            username: "jack".into(),
            access_token: "tw_old".into(),
            refresh_token: Some("tw_rt".into()),
            token_expires_at: Some(OffsetDateTime::now_utc() - Duration::minutes(5)),
        })
        .await
        .unwrap();

    let stats = refresh_stats(&state, "p1").await.unwrap();
    assert_eq!(stats["twitter"].count, 7);
}
