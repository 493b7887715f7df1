use std::time::{Duration, Instant};

pub const SHOW_DURATION: Duration = Duration::from_millis(300);
pub const HIDE_DURATION: Duration = Duration::from_millis(200);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Easing {
    EaseIn,
    EaseOut,
}

impl Easing {
    fn apply(self, t: f64) -> f64 {
        match self {
            Easing::EaseIn => t * t,
            Easing::EaseOut => 1.0 - (1.0 - t) * (1.0 - t),
        }
    }
}

/// Time-based alpha ramp, advanced cooperatively by the owner's tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OpacityAnimation {
    from: f64,
    to: f64,
    started: Instant,
    duration: Duration,
    easing: Easing,
}

impl OpacityAnimation {
    pub fn new(from: f64, to: f64, started: Instant, duration: Duration, easing: Easing) -> Self {
        Self {
            from,
            to,
            started,
            duration,
            easing,
        }
    }

    pub fn value_at(&self, now: Instant) -> f64 {
        let t = self.progress(now);
        if t >= 1.0 {
            return self.to;
        }
        self.from + (self.to - self.from) * self.easing.apply(t)
    }

    pub fn is_finished(&self, now: Instant) -> bool {
        self.progress(now) >= 1.0
    }

    pub fn target(&self) -> f64 {
        self.to
    }

    /// Move the end point, keeping the elapsed time.
    pub fn retarget(&mut self, to: f64) {
        self.to = to;
    }

    fn progress(&self, now: Instant) -> f64 {
        if self.duration.is_zero() {
            return 1.0;
        }
        let elapsed = now.saturating_duration_since(self.started);
        (elapsed.as_secs_f64() / self.duration.as_secs_f64()).min(1.0)
    }
}
