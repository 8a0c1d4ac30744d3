//! # Rolling Display Buffer
//!
//! Bounded per-series history feeding the live display. Nothing here is
//! persisted; the log files are the record of truth.

use std::collections::{BTreeMap, VecDeque};

/// Default number of points kept per series
pub const DEFAULT_CAPACITY: usize = 100;

/// Identifies one plotted series
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SeriesId {
    /// Oscillator channel by wiring index
    Oscillator(usize),

    /// Compensated die temperature
    Temperature,
}

/// One plotted point
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DataPoint {
    /// Seconds since capture start
    pub time: f64,

    /// Value in display units (MHz or °C)
    pub value: f64,
}

/// Per-series FIFO history with a fixed capacity
#[derive(Debug, Clone)]
pub struct RollingBuffer {
    capacity: usize,
    series: BTreeMap<SeriesId, VecDeque<DataPoint>>,
}

impl RollingBuffer {
    /// Create a buffer holding at most `capacity` points per series
    ///
    /// A capacity of zero is raised to one.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            series: BTreeMap::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Append a point to `series`, evicting its oldest point when full
    pub fn push(&mut self, series: SeriesId, time: f64, value: f64) {
        let capacity = self.capacity;
        let points = self
            .series
            .entry(series)
            .or_insert_with(|| VecDeque::with_capacity(capacity + 1));

        points.push_back(DataPoint { time, value });
        if points.len() > capacity {
            points.pop_front();
        }
    }

    /// Current points of `series`, oldest first
    ///
    /// Yields nothing for a series that was never pushed.
    pub fn snapshot(&self, series: SeriesId) -> impl Iterator<Item = DataPoint> + '_ {
        self.series.get(&series).into_iter().flatten().copied()
    }

    /// Most recent point of `series`
    pub fn latest(&self, series: SeriesId) -> Option<DataPoint> {
        self.series.get(&series).and_then(|points| points.back().copied())
    }

    /// Number of points currently held for `series`
    pub fn len(&self, series: SeriesId) -> usize {
        self.series.get(&series).map_or(0, VecDeque::len)
    }

    /// Whether no series holds any point
    pub fn is_empty(&self) -> bool {
        self.series.values().all(VecDeque::is_empty)
    }

    /// Known series in stable order (oscillators by index, then temperature)
    pub fn series(&self) -> impl Iterator<Item = SeriesId> + '_ {
        self.series.keys().copied()
    }

    pub fn clear(&mut self) {
        self.series.clear();
    }
}

impl Default for RollingBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values(buffer: &RollingBuffer, series: SeriesId) -> Vec<f64> {
        buffer.snapshot(series).map(|p| p.value).collect()
    }

    #[test]
    fn test_push_under_capacity_keeps_everything() {
        let mut buffer = RollingBuffer::new(5);
        for i in 0..3 {
            buffer.push(SeriesId::Oscillator(0), i as f64, i as f64 * 10.0);
        }
        assert_eq!(buffer.len(SeriesId::Oscillator(0)), 3);
        assert_eq!(values(&buffer, SeriesId::Oscillator(0)), vec![0.0, 10.0, 20.0]);
    }

    #[test]
    fn test_overflow_evicts_oldest_in_order() {
        let capacity = 100;
        let mut buffer = RollingBuffer::new(capacity);
        for k in [1usize, 7, 250] {
            buffer.clear();
            for i in 0..capacity + k {
                buffer.push(SeriesId::Temperature, i as f64, i as f64);
            }
            let expected: Vec<f64> = (k..capacity + k).map(|i| i as f64).collect();
            assert_eq!(buffer.len(SeriesId::Temperature), capacity);
            assert_eq!(values(&buffer, SeriesId::Temperature), expected);
        }
    }

    #[test]
    fn test_series_are_independent() {
        let mut buffer = RollingBuffer::new(2);
        buffer.push(SeriesId::Oscillator(0), 0.0, 1.0);
        buffer.push(SeriesId::Oscillator(0), 1.0, 2.0);
        buffer.push(SeriesId::Oscillator(0), 2.0, 3.0);
        buffer.push(SeriesId::Oscillator(1), 2.0, 9.0);

        assert_eq!(values(&buffer, SeriesId::Oscillator(0)), vec![2.0, 3.0]);
        assert_eq!(values(&buffer, SeriesId::Oscillator(1)), vec![9.0]);
        assert_eq!(buffer.latest(SeriesId::Oscillator(0)).unwrap().time, 2.0);
    }

    #[test]
    fn test_unknown_series_snapshot_is_empty() {
        let buffer = RollingBuffer::default();
        assert_eq!(buffer.snapshot(SeriesId::Temperature).count(), 0);
        assert_eq!(buffer.latest(SeriesId::Temperature), None);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_series_order_is_stable() {
        let mut buffer = RollingBuffer::default();
        buffer.push(SeriesId::Temperature, 0.0, 28.8);
        buffer.push(SeriesId::Oscillator(2), 0.0, 18.0);
        buffer.push(SeriesId::Oscillator(0), 0.0, 36.0);
        let order: Vec<SeriesId> = buffer.series().collect();
        assert_eq!(
            order,
            vec![SeriesId::Oscillator(0), SeriesId::Oscillator(2), SeriesId::Temperature]
        );
    }

    #[test]
    fn test_zero_capacity_is_raised() {
        let mut buffer = RollingBuffer::new(0);
        buffer.push(SeriesId::Oscillator(0), 0.0, 1.0);
        buffer.push(SeriesId::Oscillator(0), 1.0, 2.0);
        assert_eq!(buffer.capacity(), 1);
        assert_eq!(values(&buffer, SeriesId::Oscillator(0)), vec![2.0]);
    }
}
