//! Node retry policy, applied by `CompiledStateGraph` around `Node::run`.

use std::time::Duration;

#[derive(Clone, Debug, Default)]
pub enum RetryPolicy {
    #[default]
    None,
    Fixed {
        max_attempts: u32,
        delay: Duration,
    },
    Exponential {
        max_attempts: u32,
        initial_delay: Duration,
        max_delay: Duration,
        multiplier: f64,
    },
}

impl RetryPolicy {
    pub fn exponential(
        max_attempts: u32,
        initial_delay: Duration,
        max_delay: Duration,
        multiplier: f64,
    ) -> Self {
        Self::Exponential {
            max_attempts,
            initial_delay,
            max_delay,
            multiplier,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        match self {
            RetryPolicy::None => 1,
            RetryPolicy::Fixed { max_attempts, .. } => *max_attempts,
            RetryPolicy::Exponential { max_attempts, .. } => *max_attempts,
        }
    }

    /// Delay before the given (1-indexed) retry attempt.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        match self {
            RetryPolicy::None => Duration::ZERO,
            RetryPolicy::Fixed { delay, .. } => *delay,
            RetryPolicy::Exponential {
                initial_delay,
                max_delay,
                multiplier,
                ..
            } => {
                let scaled = initial_delay.as_secs_f64() * multiplier.powi(attempt as i32 - 1);
                Duration::from_secs_f64(scaled.min(max_delay.as_secs_f64()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exponential_delay_caps_at_max() {
        let p = RetryPolicy::exponential(5, Duration::from_millis(100), Duration::from_secs(1), 10.0);
        assert_eq!(p.delay_for_attempt(1), Duration::from_millis(100));
        assert_eq!(p.delay_for_attempt(3), Duration::from_secs(1));
    }
}
