use std::time::Duration;

/// Ring buffer of recent accumulation pass times.
#[derive(Debug, Clone)]
pub struct PassTimer {
    history: Vec<Duration>,
    index: usize,
    filled: bool,
}

impl Default for PassTimer {
    fn default() -> Self {
        Self::new(64)
    }
}

impl PassTimer {
    pub fn new(capacity: usize) -> Self {
        Self {
            history: vec![Duration::ZERO; capacity.max(1)],
            index: 0,
            filled: false,
        }
    }

    pub fn record(&mut self, dt: Duration) {
        self.history[self.index] = dt;
        self.index = (self.index + 1) % self.history.len();
        if self.index == 0 {
            self.filled = true;
        }
    }

    fn recorded(&self) -> &[Duration] {
        if self.filled {
            &self.history
        } else {
            &self.history[..self.index]
        }
    }

    pub fn average(&self) -> Duration {
        let samples = self.recorded();
        if samples.is_empty() {
            return Duration::ZERO;
        }
        samples.iter().sum::<Duration>() / samples.len() as u32
    }

    pub fn max(&self) -> Duration {
        self.recorded().iter().copied().max().unwrap_or(Duration::ZERO)
    }

    pub fn reset(&mut self) {
        self.index = 0;
        self.filled = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn averages_only_recorded_samples() {
        let mut t = PassTimer::new(3);
        assert_eq!(t.average(), Duration::ZERO);
        t.record(Duration::from_millis(2));
        t.record(Duration::from_millis(4));
        assert_eq!(t.average(), Duration::from_millis(3));
        t.record(Duration::from_millis(6));
        t.record(Duration::from_millis(8));
        // Oldest sample overwritten.
        assert_eq!(t.average(), Duration::from_millis(6));
        assert_eq!(t.max(), Duration::from_millis(8));
        t.reset();
        assert_eq!(t.max(), Duration::ZERO);
    }
}
