use bytes::Bytes;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use warden::circuit_breaker::{
    normalize_endpoint, BreakerError, CircuitBreakerService, CircuitState, Direction,
    EndpointConfig, ManualOverride,
};
use warden::store::MemoryStateStore;

#[derive(Debug, PartialEq)]
struct DownstreamError(&'static str);

impl std::fmt::Display for DownstreamError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "downstream failed: {}", self.0)
    }
}

fn setup(config: EndpointConfig, endpoint: &str) -> (CircuitBreakerService, MemoryStateStore) {
    let store = MemoryStateStore::new();
    let service = CircuitBreakerService::new(Arc::new(store.clone()));
    service.set_outbound_config(endpoint, config);
    (service, store)
}

async fn call(
    service: &CircuitBreakerService,
    endpoint: &str,
    calls: &AtomicU32,
    fail: bool,
) -> Result<Bytes, BreakerError<DownstreamError>> {
    service
        .call_outbound(endpoint, || async {
            calls.fetch_add(1, Ordering::SeqCst);
            if fail {
                Err(DownstreamError("timeout"))
            } else {
                Ok(Bytes::from_static(b"{\"ok\":true}"))
            }
        })
        .await
}

#[tokio::test]
async fn test_open_half_open_closed_scenario() {
    let endpoint = "https://inventory.internal/items/1001";
    let config = EndpointConfig {
        failure_threshold: 3,
        half_open_success_threshold: 2,
        open_timeout_ms: 1_000,
        ..Default::default()
    };
    let (service, _store) = setup(config, endpoint);
    let calls = AtomicU32::new(0);

    // Three failing calls open the circuit
    for _ in 0..3 {
        let err = call(&service, endpoint, &calls, true).await.unwrap_err();
        assert_eq!(err.into_operation(), Some(DownstreamError("timeout")));
    }
    let snapshot = service.snapshot(Direction::Outbound, endpoint).await;
    assert_eq!(snapshot.state, CircuitState::Open);
    assert_eq!(calls.load(Ordering::SeqCst), 3);

    // Before the timeout the operation is not invoked
    let err = call(&service, endpoint, &calls, false).await.unwrap_err();
    assert!(err.is_open());
    assert_eq!(calls.load(Ordering::SeqCst), 3);

    sleep(Duration::from_millis(1_200)).await;

    // After the timeout the call goes through as a half-open trial
    let body = call(&service, endpoint, &calls, false).await.unwrap();
    assert_eq!(body, Bytes::from_static(b"{\"ok\":true}"));
    assert_eq!(calls.load(Ordering::SeqCst), 4);
    let snapshot = service.snapshot(Direction::Outbound, endpoint).await;
    assert_eq!(snapshot.state, CircuitState::HalfOpen);
    assert_eq!(snapshot.success_count, 1);

    // Second success closes the circuit
    call(&service, endpoint, &calls, false).await.unwrap();
    let snapshot = service.snapshot(Direction::Outbound, endpoint).await;
    assert_eq!(snapshot.state, CircuitState::Closed);
    assert_eq!(snapshot.failure_count, 0);
    assert_eq!(snapshot.success_count, 0);
}

#[tokio::test]
async fn test_default_config_lookup() {
    let store = MemoryStateStore::new();
    let service = CircuitBreakerService::new(Arc::new(store));

    for config in [
        service.get_outbound_config("https://never-configured.example.com/a/1"),
        service.get_inbound_config("/never/configured"),
    ] {
        assert_eq!(config.failure_threshold, 20);
        assert_eq!(config.half_open_success_threshold, 10);
        assert_eq!(config.open_timeout(), Duration::from_secs(5 * 60));
    }
}

#[tokio::test]
async fn test_manual_override_restores_counters() {
    let endpoint = "https://billing.internal/invoices/7";
    let config = EndpointConfig {
        failure_threshold: 3,
        ..Default::default()
    };
    let (service, _store) = setup(config, endpoint);
    let calls = AtomicU32::new(0);

    for _ in 0..2 {
        call(&service, endpoint, &calls, true).await.unwrap_err();
    }

    service
        .set_manual_override(Direction::Outbound, endpoint, ManualOverride::ForceOpen)
        .await
        .unwrap();
    for _ in 0..5 {
        assert!(call(&service, endpoint, &calls, false).await.unwrap_err().is_open());
    }
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    let snapshot = service
        .reset_manual_override(Direction::Outbound, endpoint)
        .await
        .unwrap();
    assert_eq!(snapshot.failure_count, 2);
    assert_eq!(snapshot.effective_state, CircuitState::Closed);

    // One more failure completes the streak that started before the override
    call(&service, endpoint, &calls, true).await.unwrap_err();
    let snapshot = service.snapshot(Direction::Outbound, endpoint).await;
    assert_eq!(snapshot.state, CircuitState::Open);
}

#[tokio::test]
async fn test_parameterized_endpoints_share_state() {
    let config = EndpointConfig {
        failure_threshold: 2,
        ..Default::default()
    };
    let (service, store) = setup(config, "https://a.b/orders/{id}");
    let calls = AtomicU32::new(0);

    call(&service, "https://a.b/orders/12345?x=1", &calls, true)
        .await
        .unwrap_err();
    call(&service, "https://a.b/orders/67890", &calls, true)
        .await
        .unwrap_err();

    assert!(call(&service, "https://a.b/orders/1", &calls, false)
        .await
        .unwrap_err()
        .is_open());
    assert_eq!(store.keys(), vec!["outbound:https://a.b/orders/{param}".to_string()]);
}

#[tokio::test]
async fn test_inbound_and_outbound_are_separate() {
    let store = MemoryStateStore::new();
    let service = CircuitBreakerService::new(Arc::new(store.clone()));
    let config = EndpointConfig {
        failure_threshold: 1,
        ..Default::default()
    };
    service.set_inbound_config("/reports/1", config.clone());
    service.set_outbound_config("/reports/1", config);

    let result = service
        .call_inbound("/reports/1", || async { Err::<(), _>(DownstreamError("boom")) })
        .await;
    assert!(!result.unwrap_err().is_open());

    assert_eq!(
        service.snapshot(Direction::Inbound, "/reports/2").await.state,
        CircuitState::Open
    );
    assert_eq!(
        service.snapshot(Direction::Outbound, "/reports/2").await.state,
        CircuitState::Closed
    );
}

#[tokio::test]
async fn test_store_outage_degrades_to_closed() {
    let endpoint = "https://search.internal/q";
    let config = EndpointConfig {
        failure_threshold: 1,
        ..Default::default()
    };
    let (service, store) = setup(config, endpoint);
    let calls = AtomicU32::new(0);

    call(&service, endpoint, &calls, true).await.unwrap_err();
    assert!(call(&service, endpoint, &calls, false).await.unwrap_err().is_open());

    store.fail_loads(true);
    store.fail_saves(true);

    // Nothing can be read, so the breaker assumes a closed circuit
    let body = call(&service, endpoint, &calls, false).await.unwrap();
    assert!(!body.is_empty());
    assert!(matches!(
        call(&service, endpoint, &calls, true).await,
        Err(BreakerError::Operation(DownstreamError("timeout")))
    ));

    store.fail_loads(false);
    store.fail_saves(false);
    assert!(call(&service, endpoint, &calls, false).await.unwrap_err().is_open());
}

#[tokio::test]
async fn test_concurrent_failures_open_circuit() {
    let endpoint = "https://ledger.internal/entries/1";
    let config = EndpointConfig {
        failure_threshold: 5,
        ..Default::default()
    };
    let (service, _store) = setup(config, endpoint);
    let breaker = Arc::new(service.outbound(endpoint).await);

    let tasks: Vec<_> = (0..5)
        .map(|_| {
            let breaker = breaker.clone();
            tokio::spawn(async move {
                breaker
                    .handle_request(|| async {
                        sleep(Duration::from_millis(10)).await;
                        Err::<(), _>(DownstreamError("unavailable"))
                    })
                    .await
            })
        })
        .collect();

    for result in futures::future::join_all(tasks).await {
        assert!(!result.unwrap().unwrap_err().is_open());
    }

    assert_eq!(breaker.state().await, CircuitState::Open);
    let fresh = service.outbound(endpoint).await;
    assert_eq!(fresh.state().await, CircuitState::Open);
}

#[test]
fn test_normalization_properties() {
    assert_eq!(
        normalize_endpoint("https://a.b/orders/12345?x=1"),
        normalize_endpoint("https://a.b/orders/67890")
    );

    for raw in [
        "https://a.b/orders/12345?x=1",
        "https://api.example.com:8443/v1/users/{userId}/orders/99",
        "/inbound/path/55/details",
    ] {
        let once = normalize_endpoint(raw);
        assert_eq!(normalize_endpoint(&once), once);
    }
}
