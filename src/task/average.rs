//! Fixed-window rolling average.

use std::collections::VecDeque;

/// Average over the last `window` values pushed.
#[derive(Debug, Clone)]
pub struct RollingAverage {
    values: VecDeque<u64>,
    window: usize,
    sum: u128,
}

impl RollingAverage {
    /// A window of zero is treated as one.
    pub fn new(window: usize) -> Self {
        let window = window.max(1);
        Self {
            values: VecDeque::with_capacity(window),
            window,
            sum: 0,
        }
    }

    /// Push a value, evicting the oldest one when full. Returns the new average.
    pub fn push(&mut self, value: u64) -> f64 {
        if self.values.len() >= self.window
            && let Some(removed) = self.values.pop_front()
        {
            self.sum -= u128::from(removed);
        }

        self.values.push_back(value);
        self.sum += u128::from(value);
        self.average()
    }

    /// Zero until the first value is pushed.
    pub fn average(&self) -> f64 {
        if self.is_empty() {
            return 0.0;
        }
        self.sum as f64 / self.len() as f64
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evicts_oldest() {
        let mut avg = RollingAverage::new(3);
        assert_eq!(avg.push(10), 10.0);
        assert_eq!(avg.push(20), 15.0);
        assert_eq!(avg.push(30), 20.0);
        // 10 drops out
        assert_eq!(avg.push(60), 110.0 / 3.0);
        assert_eq!(avg.len(), 3);
    }

    #[test]
    fn empty_average_is_zero() {
        let avg = RollingAverage::new(2);
        assert!(avg.is_empty());
        assert_eq!(avg.average(), 0.0);
    }

    #[test]
    fn zero_window_acts_as_one() {
        let mut avg = RollingAverage::new(0);
        avg.push(4);
        assert_eq!(avg.push(8), 8.0);
    }
}
