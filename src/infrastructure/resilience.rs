//! Resilience layer: timeout, retry, and circuit breaker around external calls.
//!
//! Every external dependency of the pipeline (rule registry, knowledge core,
//! enterprise lookups) is invoked through [`ResilienceService`], which keeps
//! one circuit breaker per API name and retries transient failures with
//! exponential backoff. The service never returns an error: callers get a
//! structured [`ResilienceOutcome`] whose fields communicate failure.
//!
//! Timeouts drop the racing future. The underlying operation's side effects
//! are not guaranteed to be cancelled; providers must tolerate abandoned
//! calls.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tokio::time::{sleep, timeout};
use tracing::{debug, warn};

use crate::domain::errors::{ScoreError, ScoreResult};
use crate::domain::models::config::ResilienceConfig;

/// Base delay for exponential backoff between retries.
const BACKOFF_BASE_MS: u64 = 1_000;

/// Backoff ceiling.
const BACKOFF_CAP_MS: u64 = 10_000;

/// State of a circuit breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Calls proceed normally.
    Closed,
    /// Calls are rejected without attempting the operation.
    Open,
    /// A probe call is allowed to test recovery.
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Open => "open",
            Self::HalfOpen => "half_open",
        }
    }
}

/// Breaker bookkeeping for one API name.
///
/// Created lazily on first call, lives for the process lifetime, never
/// persisted.
#[derive(Debug, Clone)]
pub struct BreakerState {
    pub state: CircuitState,
    pub failure_count: u32,
    pub success_count: u32,
    pub last_failure_time: Option<DateTime<Utc>>,
}

impl BreakerState {
    fn new() -> Self {
        Self {
            state: CircuitState::Closed,
            failure_count: 0,
            success_count: 0,
            last_failure_time: None,
        }
    }

    fn open(&mut self) {
        self.state = CircuitState::Open;
        self.success_count = 0;
        self.last_failure_time = Some(Utc::now());
    }

    fn close(&mut self) {
        self.state = CircuitState::Closed;
        self.failure_count = 0;
        self.success_count = 0;
        self.last_failure_time = None;
    }
}

/// Per-call options for [`ResilienceService::execute_with_resilience`].
pub struct CallOptions<T> {
    /// Retries after the initial attempt.
    pub retries: u32,
    /// Per-attempt timeout.
    pub timeout: Duration,
    /// Consecutive failures before the circuit opens.
    pub failure_threshold: u32,
    /// Returned as `data` on failure so callers can proceed degraded.
    pub fallback: Option<T>,
    /// Invoked before each backoff with the upcoming retry number and the
    /// error that triggered it.
    pub on_retry: Option<Arc<dyn Fn(u32, &ScoreError) + Send + Sync>>,
    /// Backoff base, overridable for tests.
    pub backoff_base_ms: u64,
}

impl<T> Default for CallOptions<T> {
    fn default() -> Self {
        Self {
            retries: 3,
            timeout: Duration::from_millis(5_000),
            failure_threshold: 5,
            fallback: None,
            on_retry: None,
            backoff_base_ms: BACKOFF_BASE_MS,
        }
    }
}

impl<T> CallOptions<T> {
    /// Options derived from the service-level configuration.
    pub fn from_config(config: &ResilienceConfig) -> Self {
        Self {
            retries: config.max_retries,
            timeout: Duration::from_millis(config.timeout_ms),
            failure_threshold: config.failure_threshold,
            ..Default::default()
        }
    }

    pub fn with_fallback(mut self, fallback: T) -> Self {
        self.fallback = Some(fallback);
        self
    }

    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Structured result of a resilient call. Never an `Err`.
#[derive(Debug, Clone)]
pub struct ResilienceOutcome<T> {
    pub success: bool,
    /// The operation's value on success, otherwise the fallback if provided.
    pub data: Option<T>,
    /// True whenever `data` does not come from a fresh successful call.
    pub degraded: bool,
    pub circuit_breaker_state: CircuitState,
    /// Retries actually performed (0 when the first attempt succeeded).
    pub retry_count: u32,
    pub execution_time_ms: u64,
    pub error: Option<String>,
}

impl<T> ResilienceOutcome<T> {
    pub fn into_data(self) -> Option<T> {
        self.data
    }
}

/// Point-in-time view of one breaker, for health reporting.
#[derive(Debug, Clone, Serialize)]
pub struct BreakerStats {
    pub api_name: String,
    pub state: String,
    pub failure_count: u32,
    pub success_count: u32,
    pub last_failure_time: Option<DateTime<Utc>>,
}

/// Timeout + retry + circuit breaker wrapper around external calls.
///
/// Process-wide shared state: one instance is shared across concurrent
/// scoring runs, and all mutations of a given API's breaker go through the
/// write lock. State resets on process restart.
pub struct ResilienceService {
    config: ResilienceConfig,
    circuits: RwLock<HashMap<String, BreakerState>>,
}

impl ResilienceService {
    pub fn new(config: ResilienceConfig) -> Self {
        Self {
            config,
            circuits: RwLock::new(HashMap::new()),
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(ResilienceConfig::default())
    }

    /// Call options pre-filled from this service's configuration.
    pub fn call_options<T>(&self) -> CallOptions<T> {
        CallOptions::from_config(&self.config)
    }

    /// Execute `operation` with timeout, retry, and circuit breaking.
    ///
    /// The breaker for `api_name` is consulted first: an open circuit whose
    /// reset window has not elapsed fast-fails without invoking the
    /// operation. Once the window has elapsed the circuit moves to half-open
    /// and a probe attempt is allowed.
    pub async fn execute_with_resilience<T, F, Fut>(
        &self,
        api_name: &str,
        mut operation: F,
        options: CallOptions<T>,
    ) -> ResilienceOutcome<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ScoreResult<T>>,
    {
        let started = Instant::now();

        if self.recovery_check(api_name).await == CircuitState::Open {
            debug!(api_name, "circuit open, rejecting call without attempt");
            return ResilienceOutcome {
                success: false,
                data: options.fallback,
                degraded: true,
                circuit_breaker_state: CircuitState::Open,
                retry_count: 0,
                execution_time_ms: elapsed_ms(started),
                error: Some(
                    ScoreError::CircuitOpen {
                        api: api_name.to_string(),
                    }
                    .to_string(),
                ),
            };
        }

        let mut retry_count = 0;
        let mut last_error: Option<ScoreError> = None;

        for attempt in 0..=options.retries {
            let result = match timeout(options.timeout, operation()).await {
                Ok(Ok(value)) => {
                    self.record_success(api_name).await;
                    if attempt > 0 {
                        debug!(api_name, retries = attempt, "call recovered after retries");
                    }
                    return ResilienceOutcome {
                        success: true,
                        data: Some(value),
                        degraded: false,
                        circuit_breaker_state: self.current_state(api_name).await,
                        retry_count,
                        execution_time_ms: elapsed_ms(started),
                        error: None,
                    };
                }
                Ok(Err(err)) => err,
                Err(_) => ScoreError::Timeout {
                    api: api_name.to_string(),
                    timeout_ms: u64::try_from(options.timeout.as_millis()).unwrap_or(u64::MAX),
                },
            };

            warn!(api_name, attempt, error = %result, "resilient call attempt failed");
            let state = self
                .record_failure(api_name, options.failure_threshold)
                .await;
            last_error = Some(result);

            // A tripped circuit stops the retry loop: further attempts would
            // hammer a dependency already known to be down.
            if state == CircuitState::Open {
                break;
            }

            if attempt < options.retries {
                retry_count += 1;
                if let Some(ref on_retry) = options.on_retry {
                    if let Some(ref err) = last_error {
                        on_retry(retry_count, err);
                    }
                }
                sleep(backoff_delay(attempt, options.backoff_base_ms)).await;
            }
        }

        ResilienceOutcome {
            success: false,
            data: options.fallback,
            degraded: true,
            circuit_breaker_state: self.current_state(api_name).await,
            retry_count,
            execution_time_ms: elapsed_ms(started),
            error: last_error.map(|e| e.to_string()),
        }
    }

    /// Recovery check: moves an open circuit whose reset window has elapsed
    /// to half-open, and returns the state a new call should observe.
    async fn recovery_check(&self, api_name: &str) -> CircuitState {
        let mut circuits = self.circuits.write().await;
        let breaker = circuits
            .entry(api_name.to_string())
            .or_insert_with(BreakerState::new);

        if breaker.state == CircuitState::Open {
            let window = chrono::Duration::seconds(
                i64::try_from(self.config.reset_window_secs).unwrap_or(i64::MAX),
            );
            let elapsed = breaker
                .last_failure_time
                .is_some_and(|t| Utc::now() - t >= window);
            if elapsed {
                breaker.state = CircuitState::HalfOpen;
                breaker.success_count = 0;
                debug!(api_name, "circuit moved to half-open for recovery probe");
            }
        }

        breaker.state
    }

    async fn record_failure(&self, api_name: &str, threshold: u32) -> CircuitState {
        let mut circuits = self.circuits.write().await;
        let breaker = circuits
            .entry(api_name.to_string())
            .or_insert_with(BreakerState::new);

        breaker.failure_count += 1;
        breaker.last_failure_time = Some(Utc::now());

        match breaker.state {
            CircuitState::Closed if breaker.failure_count >= threshold => {
                breaker.open();
                warn!(api_name, failures = breaker.failure_count, "circuit opened");
            }
            // Any failure during a recovery probe reopens the circuit.
            CircuitState::HalfOpen => {
                breaker.open();
                warn!(api_name, "recovery probe failed, circuit reopened");
            }
            _ => {}
        }

        breaker.state
    }

    async fn record_success(&self, api_name: &str) {
        let mut circuits = self.circuits.write().await;
        let breaker = circuits
            .entry(api_name.to_string())
            .or_insert_with(BreakerState::new);

        match breaker.state {
            CircuitState::HalfOpen => {
                breaker.success_count += 1;
                if breaker.success_count >= self.config.success_threshold {
                    breaker.close();
                    debug!(api_name, "circuit closed after successful probes");
                }
            }
            _ => breaker.close(),
        }
    }

    /// Current breaker state for an API, `Closed` if never called.
    pub async fn current_state(&self, api_name: &str) -> CircuitState {
        let circuits = self.circuits.read().await;
        circuits
            .get(api_name)
            .map_or(CircuitState::Closed, |b| b.state)
    }

    /// Snapshot of one breaker, if it exists.
    pub async fn breaker_snapshot(&self, api_name: &str) -> Option<BreakerState> {
        let circuits = self.circuits.read().await;
        circuits.get(api_name).cloned()
    }

    /// Statistics for every known breaker.
    pub async fn stats(&self) -> Vec<BreakerStats> {
        let circuits = self.circuits.read().await;
        circuits
            .iter()
            .map(|(name, b)| BreakerStats {
                api_name: name.clone(),
                state: b.state.as_str().to_string(),
                failure_count: b.failure_count,
                success_count: b.success_count,
                last_failure_time: b.last_failure_time,
            })
            .collect()
    }

    /// Manually reset one breaker.
    pub async fn reset(&self, api_name: &str) {
        let mut circuits = self.circuits.write().await;
        if let Some(breaker) = circuits.get_mut(api_name) {
            breaker.close();
        }
    }

    /// Reset every breaker.
    pub async fn reset_all(&self) {
        let mut circuits = self.circuits.write().await;
        for breaker in circuits.values_mut() {
            breaker.close();
        }
    }
}

/// Exponential backoff: `min(base * 2^attempt, cap)`.
fn backoff_delay(attempt: u32, base_ms: u64) -> Duration {
    let ms = base_ms
        .saturating_mul(2_u64.saturating_pow(attempt))
        .min(BACKOFF_CAP_MS);
    Duration::from_millis(ms)
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_options<T>() -> CallOptions<T> {
        CallOptions {
            backoff_base_ms: 1,
            timeout: Duration::from_millis(200),
            ..Default::default()
        }
    }

    #[test]
    fn backoff_doubles_and_caps() {
        assert_eq!(backoff_delay(0, 1_000), Duration::from_millis(1_000));
        assert_eq!(backoff_delay(1, 1_000), Duration::from_millis(2_000));
        assert_eq!(backoff_delay(2, 1_000), Duration::from_millis(4_000));
        assert_eq!(backoff_delay(3, 1_000), Duration::from_millis(8_000));
        assert_eq!(backoff_delay(4, 1_000), Duration::from_millis(10_000));
        assert_eq!(backoff_delay(10, 1_000), Duration::from_millis(10_000));
    }

    #[tokio::test]
    async fn success_on_first_attempt() {
        let service = ResilienceService::with_defaults();
        let calls = AtomicU32::new(0);

        let outcome = service
            .execute_with_resilience(
                "registry",
                || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { Ok(42_u32) }
                },
                fast_options(),
            )
            .await;

        assert!(outcome.success);
        assert!(!outcome.degraded);
        assert_eq!(outcome.data, Some(42));
        assert_eq!(outcome.retry_count, 0);
        assert_eq!(outcome.circuit_breaker_state, CircuitState::Closed);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retries_then_recovers() {
        let service = ResilienceService::with_defaults();
        let calls = Arc::new(AtomicU32::new(0));

        let outcome = service
            .execute_with_resilience(
                "registry",
                || {
                    let calls = Arc::clone(&calls);
                    async move {
                        if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                            Err(ScoreError::External("flaky".into()))
                        } else {
                            Ok("ok")
                        }
                    }
                },
                fast_options(),
            )
            .await;

        assert!(outcome.success);
        assert_eq!(outcome.data, Some("ok"));
        assert_eq!(outcome.retry_count, 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // Success resets the breaker.
        let snapshot = service.breaker_snapshot("registry").await.unwrap();
        assert_eq!(snapshot.state, CircuitState::Closed);
        assert_eq!(snapshot.failure_count, 0);
    }

    #[tokio::test]
    async fn exhausted_retries_return_fallback() {
        let service = ResilienceService::with_defaults();

        let outcome = service
            .execute_with_resilience(
                "registry",
                || async { Err::<u32, _>(ScoreError::External("down".into())) },
                fast_options().with_fallback(7).with_retries(2),
            )
            .await;

        assert!(!outcome.success);
        assert!(outcome.degraded);
        assert_eq!(outcome.data, Some(7));
        assert_eq!(outcome.retry_count, 2);
        assert!(outcome.error.unwrap().contains("down"));
    }

    #[tokio::test]
    async fn timeout_counts_as_failure() {
        let service = ResilienceService::with_defaults();

        let outcome = service
            .execute_with_resilience(
                "slow_api",
                || async {
                    sleep(Duration::from_secs(5)).await;
                    Ok(1_u32)
                },
                CallOptions {
                    timeout: Duration::from_millis(20),
                    retries: 0,
                    backoff_base_ms: 1,
                    ..Default::default()
                },
            )
            .await;

        assert!(!outcome.success);
        assert!(outcome.error.unwrap().contains("timed out"));
        let snapshot = service.breaker_snapshot("slow_api").await.unwrap();
        assert_eq!(snapshot.failure_count, 1);
    }

    #[tokio::test]
    async fn breaker_opens_at_threshold_and_fast_fails() {
        let service = ResilienceService::with_defaults();
        let calls = Arc::new(AtomicU32::new(0));

        let options = || CallOptions::<&str> {
            retries: 0,
            failure_threshold: 5,
            backoff_base_ms: 1,
            timeout: Duration::from_millis(200),
            ..Default::default()
        };

        for _ in 0..5 {
            let calls = Arc::clone(&calls);
            let outcome = service
                .execute_with_resilience(
                    "registry",
                    move || {
                        let calls = Arc::clone(&calls);
                        async move {
                            calls.fetch_add(1, Ordering::SeqCst);
                            Err::<&str, _>(ScoreError::External("down".into()))
                        }
                    },
                    options(),
                )
                .await;
            assert!(!outcome.success);
        }

        assert_eq!(
            service.current_state("registry").await,
            CircuitState::Open
        );
        assert_eq!(calls.load(Ordering::SeqCst), 5);

        // Sixth call is rejected without a network attempt and carries the
        // fallback.
        let calls_clone = Arc::clone(&calls);
        let outcome = service
            .execute_with_resilience(
                "registry",
                move || {
                    let calls = Arc::clone(&calls_clone);
                    async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        Ok("live")
                    }
                },
                options().with_fallback("cached"),
            )
            .await;

        assert!(!outcome.success);
        assert!(outcome.degraded);
        assert_eq!(outcome.circuit_breaker_state, CircuitState::Open);
        assert_eq!(outcome.data, Some("cached"));
        assert_eq!(calls.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn half_open_recovery_closes_after_two_successes() {
        let service = ResilienceService::new(ResilienceConfig {
            reset_window_secs: 0,
            ..Default::default()
        });

        // Trip the circuit.
        for _ in 0..5 {
            service.record_failure("registry", 5).await;
        }
        assert_eq!(service.current_state("registry").await, CircuitState::Open);

        // Window elapsed (0s): recovery check moves to half-open.
        assert_eq!(
            service.recovery_check("registry").await,
            CircuitState::HalfOpen
        );

        service.record_success("registry").await;
        assert_eq!(
            service.current_state("registry").await,
            CircuitState::HalfOpen
        );

        service.record_success("registry").await;
        let snapshot = service.breaker_snapshot("registry").await.unwrap();
        assert_eq!(snapshot.state, CircuitState::Closed);
        assert_eq!(snapshot.failure_count, 0);
        assert_eq!(snapshot.success_count, 0);
    }

    #[tokio::test]
    async fn half_open_failure_reopens() {
        let service = ResilienceService::new(ResilienceConfig {
            reset_window_secs: 0,
            ..Default::default()
        });

        for _ in 0..5 {
            service.record_failure("registry", 5).await;
        }
        service.recovery_check("registry").await;
        assert_eq!(
            service.current_state("registry").await,
            CircuitState::HalfOpen
        );

        service.record_failure("registry", 5).await;
        assert_eq!(service.current_state("registry").await, CircuitState::Open);
    }

    #[tokio::test]
    async fn on_retry_callback_fires() {
        let service = ResilienceService::with_defaults();
        let notified = Arc::new(AtomicU32::new(0));
        let notified_cb = Arc::clone(&notified);

        let options = CallOptions::<u32> {
            retries: 2,
            backoff_base_ms: 1,
            timeout: Duration::from_millis(100),
            on_retry: Some(Arc::new(move |_, _| {
                notified_cb.fetch_add(1, Ordering::SeqCst);
            })),
            ..Default::default()
        };

        let _ = service
            .execute_with_resilience(
                "registry",
                || async { Err::<u32, _>(ScoreError::External("down".into())) },
                options,
            )
            .await;

        assert_eq!(notified.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn breakers_are_isolated_per_api() {
        let service = ResilienceService::with_defaults();

        for _ in 0..5 {
            service.record_failure("registry", 5).await;
        }
        assert_eq!(service.current_state("registry").await, CircuitState::Open);
        assert_eq!(
            service.current_state("geo_risk").await,
            CircuitState::Closed
        );

        let stats = service.stats().await;
        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].api_name, "registry");
    }

    #[tokio::test]
    async fn manual_reset_closes_circuit() {
        let service = ResilienceService::with_defaults();
        for _ in 0..5 {
            service.record_failure("registry", 5).await;
        }
        service.reset("registry").await;
        assert_eq!(
            service.current_state("registry").await,
            CircuitState::Closed
        );
    }
}
