//! Per-device observation history.

/// One location ping after parsing and filtering.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Observation {
    /// Epoch seconds.
    pub timestamp: i64,
    pub latitude: f64,
    pub longitude: f64,
    /// Metres per second.
    pub speed: f64,
}

/// Timestamp-ordered observation history for one key.
///
/// Append-only while a batch is ingesting; sorted once before segmentation
/// and never mutated afterwards.
#[derive(Debug, Clone, Default)]
pub struct ObservationSeries {
    points: Vec<Observation>,
}

impl ObservationSeries {
    pub fn push(&mut self, point: Observation) {
        self.points.push(point);
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Sort in place by timestamp. Ties break arbitrarily.
    pub fn sort_by_timestamp(&mut self) {
        self.points.sort_unstable_by_key(|p| p.timestamp);
    }

    pub fn points(&self) -> &[Observation] {
        &self.points
    }
}
