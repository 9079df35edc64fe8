use super::backoff;
use super::endpoint::normalize_endpoint;
use super::types::{BreakerError, CircuitState, Direction, EndpointConfig, ManualOverride};
use crate::metrics;
use crate::store::{fields, StateStore, StoreError};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::future::Future;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

/// Circuit breaker for a single endpoint
///
/// The breaker is a view over state kept in a [`StateStore`]: it is hydrated
/// when built and written back after every recorded outcome, so instances in
/// other processes protecting the same endpoint observe the same circuit.
pub struct CircuitBreaker {
    /// Normalized endpoint
    endpoint: String,
    /// Inbound or outbound namespace
    direction: Direction,
    /// Thresholds and timeouts
    config: EndpointConfig,
    /// Shared state backend
    store: Arc<dyn StateStore>,
    /// Current state
    state: Mutex<State>,
}

#[derive(Debug, Clone)]
struct State {
    /// Automatic circuit state
    circuit_state: CircuitState,
    /// Consecutive failures since the last transition into Closed or HalfOpen
    failure_count: u32,
    /// Consecutive successes while HalfOpen
    success_count: u32,
    /// Time of the failure that last opened the circuit
    last_failure_time: Option<DateTime<Utc>>,
    /// Operator override
    manual_override: ManualOverride,
    /// Whether `manual_override` pre-empts `circuit_state`
    override_configured: bool,
    /// How long the circuit stays open before a trial call
    open_timeout: Duration,
}

impl State {
    fn initial(config: &EndpointConfig) -> Self {
        Self {
            circuit_state: CircuitState::Closed,
            failure_count: 0,
            success_count: 0,
            last_failure_time: None,
            manual_override: config.manual_override.unwrap_or_default(),
            override_configured: config.manual_override.is_some(),
            open_timeout: config.open_timeout(),
        }
    }

    /// State forced by the operator, if any
    fn forced(&self) -> Option<CircuitState> {
        if !self.override_configured {
            return None;
        }
        match self.manual_override {
            ManualOverride::ForceOpen => Some(CircuitState::Open),
            ManualOverride::ForceClosed => Some(CircuitState::Closed),
            ManualOverride::Normal => None,
        }
    }

    fn effective(&self) -> CircuitState {
        self.forced().unwrap_or(self.circuit_state)
    }

    /// Whether the open period has run out. A missing failure time counts as elapsed.
    fn open_timeout_elapsed(&self, now: DateTime<Utc>) -> bool {
        match self.last_failure_time {
            Some(last) => match (now - last).to_std() {
                Ok(elapsed) => elapsed > self.open_timeout,
                // failure time ahead of our clock
                Err(_) => false,
            },
            None => true,
        }
    }

    fn to_fields(&self) -> HashMap<String, String> {
        let last_failure_time = self
            .last_failure_time
            .map(|t| t.to_rfc3339_opts(SecondsFormat::Micros, true))
            .unwrap_or_default();

        HashMap::from([
            (fields::STATE.to_string(), self.circuit_state.to_string()),
            (fields::FAILURE_COUNT.to_string(), self.failure_count.to_string()),
            (fields::SUCCESS_COUNT.to_string(), self.success_count.to_string()),
            (fields::LAST_FAILURE_TIME.to_string(), last_failure_time),
            (fields::MANUAL_OVERRIDE.to_string(), self.manual_override.to_string()),
            (
                fields::OVERRIDE_CONFIGURED.to_string(),
                self.override_configured.to_string(),
            ),
        ])
    }

    /// Overlay stored fields. Unparsable values keep the current value.
    fn apply_fields(&mut self, stored: &HashMap<String, String>, key: &str) {
        if let Some(state) = parse_field(stored, fields::STATE, key) {
            self.circuit_state = state;
        }
        if let Some(count) = parse_field(stored, fields::FAILURE_COUNT, key) {
            self.failure_count = count;
        }
        if let Some(count) = parse_field(stored, fields::SUCCESS_COUNT, key) {
            self.success_count = count;
        }
        match stored.get(fields::LAST_FAILURE_TIME).map(String::as_str) {
            None => {}
            Some("") => self.last_failure_time = None,
            Some(raw) => match DateTime::parse_from_rfc3339(raw) {
                Ok(t) => self.last_failure_time = Some(t.with_timezone(&Utc)),
                Err(e) => warn!(
                    key = key,
                    field = fields::LAST_FAILURE_TIME,
                    value = raw,
                    error = %e,
                    "Ignoring invalid stored field"
                ),
            },
        }
        if let Some(value) = parse_field(stored, fields::MANUAL_OVERRIDE, key) {
            self.manual_override = value;
        }
        if let Some(configured) = parse_field(stored, fields::OVERRIDE_CONFIGURED, key) {
            self.override_configured = configured;
        }
    }
}

fn parse_field<T>(stored: &HashMap<String, String>, field: &str, key: &str) -> Option<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw = stored.get(field)?;
    match raw.parse() {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(
                key = key,
                field = field,
                value = %raw,
                error = %e,
                "Ignoring invalid stored field"
            );
            None
        }
    }
}

/// Point-in-time view of a breaker
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BreakerSnapshot {
    pub endpoint: String,
    pub direction: Direction,
    pub state: CircuitState,
    pub effective_state: CircuitState,
    pub failure_count: u32,
    pub success_count: u32,
    pub last_failure_time: Option<DateTime<Utc>>,
    pub manual_override: ManualOverride,
    pub override_configured: bool,
    pub open_timeout_ms: u64,
}

impl CircuitBreaker {
    /// Build a breaker for `endpoint` and hydrate it from `store`.
    ///
    /// A failed load is logged and leaves the breaker closed with fresh counters.
    pub async fn load(
        endpoint: &str,
        direction: Direction,
        config: EndpointConfig,
        store: Arc<dyn StateStore>,
    ) -> Self {
        let breaker = Self {
            endpoint: normalize_endpoint(endpoint),
            direction,
            state: Mutex::new(State::initial(&config)),
            config,
            store,
        };

        breaker.refresh().await;
        breaker
    }

    /// Re-read the stored state, keeping in-memory values the store lacks
    pub async fn refresh(&self) {
        let mut state = self.state.lock().await;
        let key = self.key();

        match self.store.load_fields(&key).await {
            Ok(stored) if stored.is_empty() => {
                debug!(key = %key, "No stored breaker state, using defaults");
            }
            Ok(stored) => {
                state.apply_fields(&stored, &key);
                debug!(
                    key = %key,
                    state = %state.circuit_state,
                    failure_count = state.failure_count,
                    success_count = state.success_count,
                    "Loaded breaker state"
                );
            }
            Err(e) => {
                metrics::record_store_error("load");
                error!(key = %key, error = %e, "Error loading breaker state");
            }
        }
    }

    /// Run `operation` under the breaker.
    ///
    /// Fails fast with [`BreakerError::Open`] without calling `operation` when
    /// the circuit is open. Otherwise the operation runs without the breaker
    /// lock held and its outcome is recorded and persisted. Persistence errors
    /// never reach the caller.
    pub async fn handle_request<F, Fut, T, E>(&self, operation: F) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        {
            let mut state = self.state.lock().await;

            match state.effective() {
                CircuitState::Open => {
                    if state.forced().is_some() || !state.open_timeout_elapsed(Utc::now()) {
                        metrics::record_rejection(self.direction, &self.endpoint);
                        debug!(
                            endpoint = %self.endpoint,
                            direction = %self.direction,
                            manual_override = %state.manual_override,
                            "Circuit breaker open, rejecting request"
                        );
                        return Err(BreakerError::Open {
                            endpoint: self.endpoint.clone(),
                        });
                    }
                    self.transition_to_half_open(&mut state);
                }
                CircuitState::HalfOpen => {
                    if state.success_count >= self.config.half_open_success_threshold {
                        self.transition_to_closed(&mut state);
                    }
                }
                CircuitState::Closed => {}
            }
        }

        let outcome = operation().await;

        let mut state = self.state.lock().await;

        if state.forced().is_some() {
            // the override hides the outcome from the automatic machine
            return outcome.map_err(BreakerError::Operation);
        }

        match outcome {
            Err(e) => {
                self.record_failure(&mut state).await;
                Err(BreakerError::Operation(e))
            }
            Ok(value) => {
                self.record_success(&mut state);
                let _ = self.persist(&state).await;
                Ok(value)
            }
        }
    }

    /// Whether a call made now would be let through. Does not change state.
    pub async fn admits(&self) -> bool {
        let state = self.state.lock().await;
        match state.effective() {
            CircuitState::Open => {
                state.forced().is_none() && state.open_timeout_elapsed(Utc::now())
            }
            CircuitState::Closed | CircuitState::HalfOpen => true,
        }
    }

    /// Force the effective state. Counters and the automatic state are left as they are.
    pub async fn set_manual_override(&self, value: ManualOverride) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        state.manual_override = value;
        state.override_configured = true;

        info!(
            endpoint = %self.endpoint,
            direction = %self.direction,
            manual_override = %value,
            "Manual override set"
        );
        metrics::record_state(self.direction, &self.endpoint, state.effective());
        self.persist(&state).await
    }

    /// Drop the override and resume automatic behavior from the stored counters
    pub async fn reset_manual_override(&self) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        state.manual_override = ManualOverride::Normal;
        state.override_configured = false;

        info!(
            endpoint = %self.endpoint,
            direction = %self.direction,
            "Manual override cleared"
        );
        metrics::record_state(self.direction, &self.endpoint, state.effective());
        self.persist(&state).await
    }

    /// Automatic state, ignoring any override
    pub async fn state(&self) -> CircuitState {
        self.state.lock().await.circuit_state
    }

    /// State used for decisions
    pub async fn effective_state(&self) -> CircuitState {
        self.state.lock().await.effective()
    }

    pub async fn snapshot(&self) -> BreakerSnapshot {
        let state = self.state.lock().await;
        BreakerSnapshot {
            endpoint: self.endpoint.clone(),
            direction: self.direction,
            state: state.circuit_state,
            effective_state: state.effective(),
            failure_count: state.failure_count,
            success_count: state.success_count,
            last_failure_time: state.last_failure_time,
            manual_override: state.manual_override,
            override_configured: state.override_configured,
            open_timeout_ms: state.open_timeout.as_millis() as u64,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn config(&self) -> &EndpointConfig {
        &self.config
    }

    /// Key of this breaker in the state store
    pub fn key(&self) -> String {
        format!("{}{}", self.direction.key_prefix(), self.endpoint)
    }

    async fn record_failure(&self, state: &mut State) {
        state.failure_count = state.failure_count.saturating_add(1);

        debug!(
            endpoint = %self.endpoint,
            state = %state.circuit_state,
            failure_count = state.failure_count,
            threshold = self.config.failure_threshold,
            "Request failed"
        );

        if state.failure_count >= self.config.failure_threshold {
            self.transition_to_open(state);
        }
        let _ = self.persist(state).await;
    }

    fn record_success(&self, state: &mut State) {
        if state.circuit_state != CircuitState::HalfOpen {
            return;
        }

        state.success_count = state.success_count.saturating_add(1);
        debug!(
            endpoint = %self.endpoint,
            success_count = state.success_count,
            threshold = self.config.half_open_success_threshold,
            "Half-open trial request succeeded"
        );

        if state.success_count >= self.config.half_open_success_threshold {
            self.transition_to_closed(state);
        }
    }

    /// Write the state back. Errors are logged and returned.
    async fn persist(&self, state: &State) -> Result<(), StoreError> {
        let key = self.key();
        self.store
            .save_fields(&key, &state.to_fields())
            .await
            .map_err(|e| {
                metrics::record_store_error("save");
                error!(key = %key, error = %e, "Error saving breaker state");
                e
            })
    }

    fn transition_to_open(&self, state: &mut State) {
        state.circuit_state = CircuitState::Open;
        state.last_failure_time = Some(Utc::now());
        state.open_timeout = backoff::open_timeout(
            self.config.open_timeout(),
            self.config.max_timeout(),
            state.failure_count,
        );

        error!(
            endpoint = %self.endpoint,
            direction = %self.direction,
            failure_count = state.failure_count,
            open_timeout = ?state.open_timeout,
            "Circuit breaker transitioned to OPEN"
        );
        metrics::record_transition(self.direction, &self.endpoint, CircuitState::Open);
    }

    fn transition_to_half_open(&self, state: &mut State) {
        state.circuit_state = CircuitState::HalfOpen;
        state.failure_count = 0;
        state.success_count = 0;
        state.open_timeout = self.config.open_timeout();

        info!(
            endpoint = %self.endpoint,
            direction = %self.direction,
            "Circuit breaker transitioned to HALF_OPEN"
        );
        metrics::record_transition(self.direction, &self.endpoint, CircuitState::HalfOpen);
    }

    fn transition_to_closed(&self, state: &mut State) {
        state.circuit_state = CircuitState::Closed;
        state.failure_count = 0;
        state.success_count = 0;
        state.open_timeout = self.config.open_timeout();

        info!(
            endpoint = %self.endpoint,
            direction = %self.direction,
            "Circuit breaker transitioned to CLOSED"
        );
        metrics::record_transition(self.direction, &self.endpoint, CircuitState::Closed);
    }
}

impl std::fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("endpoint", &self.endpoint)
            .field("direction", &self.direction)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
