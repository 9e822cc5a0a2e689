//! Rate-based circuit breaker shared by every job that talks to one endpoint.
//!
//! - Closed: calls pass; outcomes are kept in a sliding window of recent calls
//! - Open: after `volume_threshold` calls with a failure rate at or above the
//!   threshold; calls are rejected until the cooldown elapses
//! - HalfOpen: a single trial call decides between Closed and Open

use crate::utils::BreakerConfig;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Opened,
    HalfOpened,
    Closed,
}

#[derive(Debug, Clone)]
pub struct CircuitState {
    pub state: BreakerState,
    pub failure_count: u32,
    pub success_count: u32,
    /// Oldest outcome still counted.
    pub window_start: Option<Instant>,
    pub last_opened_at: Option<Instant>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Admission {
    pub allowed: bool,
    pub transition: Option<Transition>,
}

struct BreakerInner {
    state: BreakerState,
    /// (recorded at, failed) for every call still inside the rolling window.
    outcomes: VecDeque<(Instant, bool)>,
    last_opened_at: Option<Instant>,
    trial_in_flight: bool,
}

impl BreakerInner {
    fn counts(&self) -> (u32, u32) {
        let failures = self.outcomes.iter().filter(|(_, failed)| *failed).count() as u32;
        (failures, self.outcomes.len() as u32 - failures)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct BreakerSettings {
    pub volume_threshold: u32,
    pub error_threshold_percentage: f32,
    pub cooldown: Duration,
    pub rolling_window: Duration,
}

impl BreakerSettings {
    /// Widens the rolling window so `volume_threshold` back-to-back calls of
    /// `longest_call` each still land in one window.
    pub fn spanning(self, longest_call: Duration) -> Self {
        let span = longest_call.saturating_mul(self.volume_threshold.max(1));
        Self {
            rolling_window: self.rolling_window.max(span),
            ..self
        }
    }
}

impl From<&BreakerConfig> for BreakerSettings {
    fn from(config: &BreakerConfig) -> Self {
        Self {
            volume_threshold: config.volume_threshold,
            error_threshold_percentage: config.error_threshold_percentage,
            cooldown: config.cooldown(),
            rolling_window: config.rolling_window(),
        }
    }
}

impl Default for BreakerSettings {
    fn default() -> Self {
        Self::from(&BreakerConfig::default())
    }
}

pub struct CircuitBreaker {
    inner: Mutex<BreakerInner>,
    settings: BreakerSettings,
}

impl CircuitBreaker {
    pub fn new(settings: BreakerSettings) -> Self {
        Self {
            inner: Mutex::new(BreakerInner {
                state: BreakerState::Closed,
                outcomes: VecDeque::new(),
                last_opened_at: None,
                trial_in_flight: false,
            }),
            settings: BreakerSettings {
                volume_threshold: settings.volume_threshold.max(1),
                ..settings
            },
        }
    }

    pub fn settings(&self) -> BreakerSettings {
        self.settings
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BreakerInner> {
        self.inner.lock().unwrap_or_else(|p| {
            warn!("Circuit breaker mutex poisoned, recovering");
            p.into_inner()
        })
    }

    fn prune(&self, inner: &mut BreakerInner, now: Instant) {
        while let Some((at, _)) = inner.outcomes.front() {
            if now.duration_since(*at) < self.settings.rolling_window {
                break;
            }
            inner.outcomes.pop_front();
        }
    }

    pub fn allow_request(&self) -> Admission {
        let mut inner = self.lock();
        let now = Instant::now();

        match inner.state {
            BreakerState::Closed => Admission {
                allowed: true,
                transition: None,
            },
            BreakerState::Open => {
                let cooled_down = inner
                    .last_opened_at
                    .map(|opened| now.duration_since(opened) >= self.settings.cooldown)
                    .unwrap_or(true);
                if cooled_down {
                    info!("Circuit cooldown elapsed, allowing trial call");
                    inner.state = BreakerState::HalfOpen;
                    inner.trial_in_flight = true;
                    Admission {
                        allowed: true,
                        transition: Some(Transition::HalfOpened),
                    }
                } else {
                    Admission {
                        allowed: false,
                        transition: None,
                    }
                }
            }
            BreakerState::HalfOpen => {
                if inner.trial_in_flight {
                    Admission {
                        allowed: false,
                        transition: None,
                    }
                } else {
                    inner.trial_in_flight = true;
                    Admission {
                        allowed: true,
                        transition: None,
                    }
                }
            }
        }
    }

    pub fn record_success(&self) -> Option<Transition> {
        let mut inner = self.lock();
        let now = Instant::now();

        match inner.state {
            BreakerState::Closed => {
                self.prune(&mut inner, now);
                inner.outcomes.push_back((now, false));
                None
            }
            BreakerState::HalfOpen => {
                info!("Trial call succeeded, closing circuit");
                inner.state = BreakerState::Closed;
                inner.outcomes.clear();
                inner.trial_in_flight = false;
                Some(Transition::Closed)
            }
            BreakerState::Open => None,
        }
    }

    pub fn record_failure(&self) -> Option<Transition> {
        let mut inner = self.lock();
        let now = Instant::now();

        match inner.state {
            BreakerState::Closed => {
                self.prune(&mut inner, now);
                inner.outcomes.push_back((now, true));

                let (failures, successes) = inner.counts();
                let total = failures + successes;
                let failure_rate = failures as f32 * 100.0 / total as f32;

                if total >= self.settings.volume_threshold
                    && failure_rate >= self.settings.error_threshold_percentage
                {
                    warn!(
                        failures,
                        calls = total,
                        failure_rate,
                        "Failure rate over threshold, opening circuit"
                    );
                    inner.state = BreakerState::Open;
                    inner.last_opened_at = Some(now);
                    Some(Transition::Opened)
                } else {
                    None
                }
            }
            BreakerState::HalfOpen => {
                warn!("Trial call failed, reopening circuit");
                inner.state = BreakerState::Open;
                inner.last_opened_at = Some(now);
                inner.trial_in_flight = false;
                Some(Transition::Opened)
            }
            BreakerState::Open => None,
        }
    }

    pub fn current_state(&self) -> BreakerState {
        self.lock().state
    }

    pub fn snapshot(&self) -> CircuitState {
        let mut inner = self.lock();
        if inner.state == BreakerState::Closed {
            self.prune(&mut inner, Instant::now());
        }
        let (failure_count, success_count) = inner.counts();
        CircuitState {
            state: inner.state,
            failure_count,
            success_count,
            window_start: inner.outcomes.front().map(|(at, _)| *at),
            last_opened_at: inner.last_opened_at,
        }
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(BreakerSettings::default())
    }
}
