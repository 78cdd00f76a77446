//! Trajectory segmentation.
//!
//! Partitions one key's sorted observation history into maximal runs whose
//! consecutive time gaps never exceed a threshold. Runs shorter than two
//! points are consumed without being emitted.

use crate::series::Observation;

/// Splits sorted observations into bounded-gap runs.
#[derive(Debug, Clone, Copy)]
pub struct TrajectorySegmenter {
    max_time_diff: i64,
}

impl TrajectorySegmenter {
    /// `max_time_diff` is the largest allowed gap between consecutive
    /// points, in seconds.
    pub fn new(max_time_diff: i64) -> Self {
        Self { max_time_diff }
    }

    /// Iterate over the maximal runs of `points`, which must already be
    /// sorted ascending by timestamp.
    pub fn runs<'a>(&self, points: &'a [Observation]) -> Runs<'a> {
        Runs {
            points,
            start: 0,
            max_time_diff: self.max_time_diff,
        }
    }
}

/// Iterator over maximal bounded-gap runs, emitted as slices of the input.
///
/// Each point is visited at most once by the inner scan, so a full sweep is
/// O(n) regardless of how the runs split.
pub struct Runs<'a> {
    points: &'a [Observation],
    start: usize,
    max_time_diff: i64,
}

impl<'a> Iterator for Runs<'a> {
    type Item = &'a [Observation];

    fn next(&mut self) -> Option<Self::Item> {
        while self.start < self.points.len() {
            let i = self.start;
            let mut j = i;
            while j + 1 < self.points.len()
                && self.points[j + 1].timestamp - self.points[j].timestamp <= self.max_time_diff
            {
                j += 1;
            }
            self.start = j + 1;
            if j > i {
                return Some(&self.points[i..=j]);
            }
            // Singleton: consumed, never emitted.
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obs(timestamp: i64) -> Observation {
        Observation {
            timestamp,
            latitude: 34.0,
            longitude: -118.0,
            speed: 1.0,
        }
    }

    fn stamps(run: &[Observation]) -> Vec<i64> {
        run.iter().map(|p| p.timestamp).collect()
    }

    #[test]
    fn single_run_when_gaps_stay_bounded() {
        let points: Vec<Observation> = [0, 100, 5000, 5100].iter().map(|&t| obs(t)).collect();
        let segmenter = TrajectorySegmenter::new(14_400);
        let runs: Vec<_> = segmenter.runs(&points).collect();
        assert_eq!(runs.len(), 1);
        assert_eq!(stamps(runs[0]), vec![0, 100, 5000, 5100]);
    }

    #[test]
    fn oversized_gap_splits_and_drops_trailing_singleton() {
        let points: Vec<Observation> = [0, 100, 20_000].iter().map(|&t| obs(t)).collect();
        let segmenter = TrajectorySegmenter::new(14_400);
        let runs: Vec<_> = segmenter.runs(&points).collect();
        // Gap 19900 > 14400: [0, 100] is a run, 20000 is a consumed singleton.
        assert_eq!(runs.len(), 1);
        assert_eq!(stamps(runs[0]), vec![0, 100]);
    }

    #[test]
    fn runs_partition_without_overlap() {
        let points: Vec<Observation> = [0, 10, 20, 100_000, 100_010, 200_000, 200_005, 200_009]
            .iter()
            .map(|&t| obs(t))
            .collect();
        let segmenter = TrajectorySegmenter::new(60);
        let runs: Vec<_> = segmenter.runs(&points).collect();
        assert_eq!(runs.len(), 3);
        assert_eq!(stamps(runs[0]), vec![0, 10, 20]);
        assert_eq!(stamps(runs[1]), vec![100_000, 100_010]);
        assert_eq!(stamps(runs[2]), vec![200_000, 200_005, 200_009]);
        let covered: usize = runs.iter().map(|r| r.len()).sum();
        assert_eq!(covered, points.len());
    }

    #[test]
    fn all_singletons_yield_nothing() {
        let points: Vec<Observation> = [0, 1000, 2000].iter().map(|&t| obs(t)).collect();
        let segmenter = TrajectorySegmenter::new(100);
        assert_eq!(segmenter.runs(&points).count(), 0);
    }

    #[test]
    fn empty_and_single_point_inputs() {
        let segmenter = TrajectorySegmenter::new(100);
        assert_eq!(segmenter.runs(&[]).count(), 0);
        let one = [obs(5)];
        assert_eq!(segmenter.runs(&one).count(), 0);
    }

    #[test]
    fn gap_exactly_at_threshold_stays_joined() {
        let points: Vec<Observation> = [0, 14_400].iter().map(|&t| obs(t)).collect();
        let segmenter = TrajectorySegmenter::new(14_400);
        let runs: Vec<_> = segmenter.runs(&points).collect();
        assert_eq!(runs.len(), 1);
        assert_eq!(stamps(runs[0]), vec![0, 14_400]);
    }
}
