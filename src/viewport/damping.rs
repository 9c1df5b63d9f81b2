use std::time::{Duration, Instant};

/// How raw zoom-gesture deltas are thinned out before they reach the zoom
/// factor. Touchpads report pinch gestures at a rate that makes the grid
/// re-layout too eagerly; each policy trades responsiveness for stability.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ZoomDamping {
    /// Apply every delta as reported.
    None,
    /// Apply every other callback of a gesture, dropping the rest.
    Alternate,
    /// Apply at most one delta per interval.
    MinInterval(Duration),
    /// Apply `delta.powf(exponent)`; 0.5 halves the zoom rate in log space.
    Smoothing { exponent: f64 },
}

impl Default for ZoomDamping {
    fn default() -> Self {
        Self::Smoothing { exponent: 0.5 }
    }
}

/// Stateful filter implementing a [`ZoomDamping`] policy.
#[derive(Debug, Clone)]
pub struct ZoomDamper {
    policy: ZoomDamping,
    accept_next: bool,
    last_accepted: Option<Instant>,
}

impl ZoomDamper {
    pub fn new(policy: ZoomDamping) -> Self {
        Self {
            policy,
            accept_next: true,
            last_accepted: None,
        }
    }

    pub fn set_policy(&mut self, policy: ZoomDamping) {
        self.policy = policy;
        self.reset();
    }

    /// Forgets gesture state; call when a gesture ends.
    pub fn reset(&mut self) {
        self.accept_next = true;
        self.last_accepted = None;
    }

    /// Returns the multiplicative delta to apply, or `None` to drop the event.
    pub fn filter(&mut self, delta: f64, now: Instant) -> Option<f64> {
        if !delta.is_finite() || delta <= 0.0 {
            return None;
        }

        match self.policy {
            ZoomDamping::None => Some(delta),
            ZoomDamping::Alternate => {
                let accepted = self.accept_next;
                self.accept_next = !self.accept_next;
                accepted.then_some(delta)
            }
            ZoomDamping::MinInterval(interval) => {
                let due = self
                    .last_accepted
                    .map_or(true, |last| now.saturating_duration_since(last) >= interval);
                if due {
                    self.last_accepted = Some(now);
                    Some(delta)
                } else {
                    None
                }
            }
            ZoomDamping::Smoothing { exponent } => {
                Some(delta.powf(exponent)).filter(|d| d.is_finite() && *d > 0.0)
            }
        }
    }
}

impl Default for ZoomDamper {
    fn default() -> Self {
        Self::new(ZoomDamping::default())
    }
}
