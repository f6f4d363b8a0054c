//! Bounded trend history, one ring per monitored channel.

use heapless::HistoryBuffer;
use serde::{Deserialize, Serialize};

pub const HISTORY_LEN: usize = 60;

#[derive(Debug, Default)]
pub struct TrendHistory {
    pressure: HistoryBuffer<u16, HISTORY_LEN>,
    temperature: HistoryBuffer<u16, HISTORY_LEN>,
}

impl TrendHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one reading per channel, evicting the oldest once full.
    pub fn push(&mut self, pressure: u16, temperature: u16) {
        self.pressure.write(pressure);
        self.temperature.write(temperature);
    }

    pub fn len(&self) -> usize {
        self.pressure.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Oldest first.
    pub fn pressure(&self) -> Vec<u16> {
        self.pressure.oldest_ordered().copied().collect()
    }

    /// Oldest first.
    pub fn temperature(&self) -> Vec<u16> {
        self.temperature.oldest_ordered().copied().collect()
    }

    pub fn snapshot(&self) -> TrendSnapshot {
        TrendSnapshot {
            pressure: self.pressure(),
            temperature: self.temperature(),
        }
    }
}

/// Read-only copy of the history handed to the presentation layer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrendSnapshot {
    pub pressure: Vec<u16>,
    pub temperature: Vec<u16>,
}

impl TrendSnapshot {
    pub fn len(&self) -> usize {
        self.pressure.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pressure.is_empty()
    }

    pub fn pressure_range(&self) -> Option<(u16, u16)> {
        min_max(&self.pressure)
    }

    pub fn temperature_range(&self) -> Option<(u16, u16)> {
        min_max(&self.temperature)
    }

    /// Newest (pressure, temperature) pair.
    pub fn latest(&self) -> Option<(u16, u16)> {
        Some((*self.pressure.last()?, *self.temperature.last()?))
    }
}

fn min_max(values: &[u16]) -> Option<(u16, u16)> {
    let min = values.iter().copied().min()?;
    let max = values.iter().copied().max()?;
    Some((min, max))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_history_starts_empty() {
        let history = TrendHistory::new();
        assert!(history.is_empty());
        assert!(history.snapshot().pressure_range().is_none());
    }

    #[test]
    fn test_overflow_evicts_oldest() {
        let mut history = TrendHistory::new();
        for i in 0..=HISTORY_LEN as u16 {
            history.push(i, 100 + i);
        }

        assert_eq!(history.len(), HISTORY_LEN);
        let pressure = history.pressure();
        assert_eq!(pressure.len(), HISTORY_LEN);
        assert_eq!(pressure[0], 1);
        assert_eq!(*pressure.last().unwrap(), HISTORY_LEN as u16);
        assert_eq!(history.temperature()[0], 101);
    }

    #[test]
    fn test_never_exceeds_capacity() {
        let mut history = TrendHistory::new();
        for i in 0..500u16 {
            history.push(i % 100, i % 120);
            assert!(history.len() <= HISTORY_LEN);
        }
        let snapshot = history.snapshot();
        assert_eq!(snapshot.pressure.len(), HISTORY_LEN);
        assert_eq!(snapshot.temperature.len(), HISTORY_LEN);
    }

    #[test]
    fn test_snapshot_ranges() {
        let mut history = TrendHistory::new();
        history.push(40, 75);
        history.push(55, 70);
        history.push(48, 72);
        let snapshot = history.snapshot();
        assert_eq!(snapshot.pressure_range(), Some((40, 55)));
        assert_eq!(snapshot.temperature_range(), Some((70, 75)));
        assert_eq!(snapshot.latest(), Some((48, 72)));
    }
}
