//! Stub advisory gates and a timeout decorator.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use tracing::warn;

use crate::domain::advisory::{AdvisoryMode, AdvisoryRequest, AdvisoryResponse};
use crate::domain::error::AdvisoryError;
use crate::ports::advisory_port::AdvisoryGate;

/// Approves every entry with full confidence.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysApprove;

impl AdvisoryGate for AlwaysApprove {
    fn approve(&self, _request: &AdvisoryRequest) -> Result<AdvisoryResponse, AdvisoryError> {
        Ok(AdvisoryResponse::entry(100, "stub: always approve"))
    }
}

/// Declines every entry.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysPass;

impl AdvisoryGate for AlwaysPass {
    fn approve(&self, _request: &AdvisoryRequest) -> Result<AdvisoryResponse, AdvisoryError> {
        Ok(AdvisoryResponse::pass(0, "stub: always pass"))
    }
}

pub fn gate_for(mode: AdvisoryMode) -> Arc<dyn AdvisoryGate + Send + Sync> {
    match mode {
        AdvisoryMode::AlwaysApprove => Arc::new(AlwaysApprove),
        AdvisoryMode::AlwaysPass => Arc::new(AlwaysPass),
    }
}

/// Helper threads a `TimeoutGate` lets run at once by default.
pub const DEFAULT_MAX_IN_FLIGHT: usize = 4;

/// Bounds each call to the inner gate by `timeout`.
///
/// The call runs on a helper thread. If it does not answer in time the step
/// continues with `AdvisoryError::Timeout`; the helper cannot be cancelled, so
/// it keeps running until the inner gate returns and its late answer is
/// dropped. At most `max_in_flight` helpers exist at once. A call made while
/// that many are still running fails with `AdvisoryError::Failed` without
/// spawning, so a hung backend cannot pile up threads.
pub struct TimeoutGate {
    inner: Arc<dyn AdvisoryGate + Send + Sync>,
    timeout: Duration,
    max_in_flight: usize,
    in_flight: Arc<AtomicUsize>,
}

impl TimeoutGate {
    pub fn new(inner: Arc<dyn AdvisoryGate + Send + Sync>, timeout: Duration) -> Self {
        TimeoutGate::with_max_in_flight(inner, timeout, DEFAULT_MAX_IN_FLIGHT)
    }

    pub fn with_max_in_flight(
        inner: Arc<dyn AdvisoryGate + Send + Sync>,
        timeout: Duration,
        max_in_flight: usize,
    ) -> Self {
        TimeoutGate {
            inner,
            timeout,
            max_in_flight: max_in_flight.max(1),
            in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Helpers spawned and not yet finished.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    fn reserve(&self) -> Option<InFlight> {
        let max = self.max_in_flight;
        self.in_flight
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                (n < max).then_some(n + 1)
            })
            .ok()
            .map(|_| InFlight(Arc::clone(&self.in_flight)))
    }
}

/// Releases one in-flight slot when the helper ends, panics included.
struct InFlight(Arc<AtomicUsize>);

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl AdvisoryGate for TimeoutGate {
    fn approve(&self, request: &AdvisoryRequest) -> Result<AdvisoryResponse, AdvisoryError> {
        let Some(slot) = self.reserve() else {
            warn!(
                max_in_flight = self.max_in_flight,
                "advisory helpers still running, call refused"
            );
            return Err(AdvisoryError::Failed(format!(
                "{} advisory calls still in flight",
                self.max_in_flight
            )));
        };

        let (tx, rx) = mpsc::channel();
        let inner = Arc::clone(&self.inner);
        let request = request.clone();

        thread::Builder::new()
            .name("advisory-gate".to_string())
            .spawn(move || {
                let result = inner.approve(&request);
                drop(slot);
                // The receiver may already be gone after a timeout.
                let _ = tx.send(result);
            })
            .map_err(|e| AdvisoryError::Failed(format!("could not start advisory call: {}", e)))?;

        match rx.recv_timeout(self.timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => {
                warn!(timeout = ?self.timeout, "advisory call timed out");
                Err(AdvisoryError::Timeout(self.timeout))
            }
            Err(RecvTimeoutError::Disconnected) => Err(AdvisoryError::Failed(
                "advisory call ended without a response".to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::advisory::{AdvisoryDecision, MarketContext};
    use crate::domain::signal::Direction;
    use chrono::NaiveDate;

    fn request() -> AdvisoryRequest {
        AdvisoryRequest {
            direction: Direction::LongSpread,
            timestamp: NaiveDate::from_ymd_opt(2024, 1, 1)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap(),
            z: -2.4,
            ratio: 0.97,
            context: MarketContext::default(),
        }
    }

    struct Slow(Duration);
    impl AdvisoryGate for Slow {
        fn approve(&self, _: &AdvisoryRequest) -> Result<AdvisoryResponse, AdvisoryError> {
            thread::sleep(self.0);
            Ok(AdvisoryResponse::entry(100, "late"))
        }
    }

    struct Panics;
    impl AdvisoryGate for Panics {
        fn approve(&self, _: &AdvisoryRequest) -> Result<AdvisoryResponse, AdvisoryError> {
            panic!("gate blew up");
        }
    }

    #[test]
    fn stubs_answer_fixed_decisions() {
        let approve = AlwaysApprove.approve(&request()).unwrap();
        assert_eq!(approve.decision, AdvisoryDecision::Entry);
        assert_eq!(approve.confidence, 100);

        let pass = AlwaysPass.approve(&request()).unwrap();
        assert_eq!(pass.decision, AdvisoryDecision::Pass);
    }

    #[test]
    fn gate_for_mode() {
        let gate = gate_for(AdvisoryMode::AlwaysPass);
        assert_eq!(
            gate.approve(&request()).unwrap().decision,
            AdvisoryDecision::Pass
        );
    }

    #[test]
    fn timeout_gate_passes_fast_answers_through() {
        let gate = TimeoutGate::new(Arc::new(AlwaysApprove), Duration::from_secs(5));
        assert!(gate.approve(&request()).is_ok());
    }

    #[test]
    fn timeout_gate_reports_timeout() {
        let gate = TimeoutGate::new(
            Arc::new(Slow(Duration::from_millis(500))),
            Duration::from_millis(20),
        );
        assert_eq!(
            gate.approve(&request()),
            Err(AdvisoryError::Timeout(Duration::from_millis(20)))
        );
    }

    #[test]
    fn timeout_gate_reports_crashed_call() {
        let gate = TimeoutGate::new(Arc::new(Panics), Duration::from_secs(5));
        assert!(matches!(
            gate.approve(&request()),
            Err(AdvisoryError::Failed(_))
        ));
    }

    #[test]
    fn timed_out_helpers_are_capped() {
        let gate = TimeoutGate::with_max_in_flight(
            Arc::new(Slow(Duration::from_millis(300))),
            Duration::from_millis(10),
            1,
        );
        assert!(matches!(
            gate.approve(&request()),
            Err(AdvisoryError::Timeout(_))
        ));
        assert_eq!(gate.in_flight(), 1);

        // The first helper is still sleeping, so no second thread is started.
        assert!(matches!(
            gate.approve(&request()),
            Err(AdvisoryError::Failed(_))
        ));
        assert_eq!(gate.in_flight(), 1);

        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while gate.in_flight() > 0 && std::time::Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(gate.in_flight(), 0);
    }

    #[test]
    fn finished_helpers_free_their_slot() {
        let gate =
            TimeoutGate::with_max_in_flight(Arc::new(AlwaysApprove), Duration::from_secs(5), 1);
        for _ in 0..3 {
            assert!(gate.approve(&request()).is_ok());
        }
    }
}
