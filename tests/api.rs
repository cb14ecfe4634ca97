mod common;

use callhook_dashboard::api::ApiError;
use callhook_dashboard::cache::QueryCache;
use callhook_dashboard::models::{DashboardStats, LeadStatus};
use callhook_dashboard::queries::{keys, Queries};
use callhook_dashboard::views::{format_currency, LoadState};
use common::FakeBackend;
use std::sync::Arc;
use std::time::Duration;
use tokio_test::{assert_err, assert_ok};

#[tokio::test]
async fn test_requests_carry_bearer_token() {
    let backend = FakeBackend::start().await;
    assert_ok!(backend.client().dashboard_stats().await);

    let requests = backend.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].path, "/api/dashboard/stats");
    assert_eq!(requests[0].authorization.as_deref(), Some("Bearer test-token"));
}

#[tokio::test]
async fn test_anonymous_client_sends_no_authorization() {
    let backend = FakeBackend::start().await;
    assert_ok!(backend.client().anonymous().dashboard_stats().await);
    assert!(backend.requests()[0].authorization.is_none());
}

#[tokio::test]
async fn test_stats_decode() {
    let backend = FakeBackend::start().await;
    let stats = assert_ok!(backend.client().dashboard_stats().await);
    assert_eq!(stats.today.missed_calls, 5);
    assert_eq!(format_currency(stats.this_month.estimated_revenue), "$1,234");
}

#[tokio::test]
async fn test_non_2xx_becomes_status_error() {
    let backend = FakeBackend::start().await;
    let err = assert_err!(backend.client().appointments().await);
    assert_eq!(err.status(), Some(503));
    assert_eq!(err.to_string(), "API Error: 503 Service Unavailable");
    assert!(matches!(err, ApiError::Status { .. }));
}

#[tokio::test]
async fn test_leads_filtered_by_status() {
    let backend = FakeBackend::start().await;
    let queries = Queries::new(backend.client(), QueryCache::default());

    let booked = assert_ok!(queries.leads(Some(LeadStatus::Booked)).await);
    assert_eq!(booked.data.len(), 2);
    assert!(booked.data.iter().all(|lead| lead.status == LeadStatus::Booked));

    let all = assert_ok!(queries.leads(None).await);
    assert_eq!(all.data.len(), 4);

    let queries_sent: Vec<Option<String>> =
        backend.requests().into_iter().map(|r| r.query).collect();
    assert_eq!(queries_sent, vec![Some("status=booked".to_string()), None]);
}

#[tokio::test]
async fn test_cached_reads_are_not_refetched_until_invalidated() {
    let backend = FakeBackend::start().await;
    let cache = QueryCache::default();
    let queries = Queries::new(backend.client(), cache.clone());

    assert_ok!(queries.dashboard_stats().await);
    assert_ok!(queries.dashboard_stats().await);
    assert_eq!(backend.requests_to("GET", "/dashboard/stats"), 1);

    cache.invalidate(&keys::dashboard_stats());
    let served = assert_ok!(queries.dashboard_stats().await);
    assert!(served.is_stale);

    // The stale copy was served; the refetch runs in the background
    for _ in 0..100 {
        if cache
            .peek::<DashboardStats>(&keys::dashboard_stats())
            .is_some_and(|cached| !cached.is_stale)
        {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(backend.requests_to("GET", "/dashboard/stats"), 2);
    assert!(!cache.peek::<DashboardStats>(&keys::dashboard_stats()).unwrap().is_stale);
}

#[tokio::test]
async fn test_latest_stats_refetches_after_invalidation() {
    let backend = FakeBackend::start().await;
    let cache = QueryCache::default();
    let queries = Queries::new(backend.client(), cache.clone());

    assert_ok!(queries.dashboard_stats().await);
    cache.invalidate(&keys::dashboard_stats());
    let latest = assert_ok!(queries.latest_dashboard_stats().await);
    assert!(!latest.is_stale);
    assert_eq!(backend.requests_to("GET", "/dashboard/stats"), 2);
}

#[tokio::test]
async fn test_failed_query_surfaces_as_error_state() {
    let backend = FakeBackend::start().await;
    let cache = QueryCache::default();
    let queries = Queries::new(backend.client(), cache.clone());

    assert_err!(queries.appointments().await);
    let state = LoadState::<Arc<Vec<callhook_dashboard::models::Appointment>>>::of_query(
        &cache,
        &keys::appointments(),
        |a| a.is_empty(),
    );
    assert_eq!(
        state,
        LoadState::Error("API Error: 503 Service Unavailable".to_string())
    );
}
