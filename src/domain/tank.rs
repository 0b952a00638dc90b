// Tank buckets, groups and derived summaries
use super::error::EmptyBucketError;
use super::reading::{Reading, TankId};

/// A set of tanks stored together in one named range.
#[derive(Debug, Clone, PartialEq)]
pub struct TankGroup {
    pub name: String,
    /// Named range passed to the spreadsheet service
    pub range: String,
    /// Number of most recent rows kept from the range
    pub recent_window: usize,
    pub tanks: Vec<TankId>,
}

impl TankGroup {
    pub fn new(name: String, range: String, recent_window: usize, tanks: Vec<TankId>) -> Self {
        Self {
            name,
            range,
            recent_window,
            tanks,
        }
    }
}

/// Readings for one tank, in arrival (chronological) order.
#[derive(Debug, Clone, PartialEq)]
pub struct TankBucket {
    pub tank: TankId,
    pub readings: Vec<Reading>,
}

/// Statistics derived from a bucket. Always recomputed, never stored.
#[derive(Debug, Clone, PartialEq)]
pub struct TankSummary {
    pub last: Reading,
    pub min: f64,
    pub max: f64,
    /// Mean rounded to 2 decimals, half away from zero
    pub average: f64,
}

impl TankBucket {
    pub fn empty(tank: TankId) -> Self {
        Self {
            tank,
            readings: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.readings.len()
    }

    /// Compute last/min/max/average.
    ///
    /// NaN temperatures are not filtered: one NaN makes min, max and
    /// average NaN.
    pub fn summarize(&self) -> Result<TankSummary, EmptyBucketError> {
        let last = self.readings.last().ok_or(EmptyBucketError(self.tank))?;
        let temps = self.readings.iter().map(|r| r.temp);

        if temps.clone().any(f64::is_nan) {
            return Ok(TankSummary {
                last: last.clone(),
                min: f64::NAN,
                max: f64::NAN,
                average: f64::NAN,
            });
        }

        let min = temps.clone().fold(f64::INFINITY, f64::min);
        let max = temps.clone().fold(f64::NEG_INFINITY, f64::max);
        let mean = temps.sum::<f64>() / self.readings.len() as f64;

        Ok(TankSummary {
            last: last.clone(),
            min,
            max,
            average: round_2dp(mean),
        })
    }
}

/// Round to two decimal places, ties away from zero.
pub fn round_2dp(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Declared display order of tanks: group order, then tank order within a group.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TankOrder(Vec<TankId>);

impl TankOrder {
    pub fn from_groups(groups: &[TankGroup]) -> Self {
        let mut order = Vec::new();
        for tank in groups.iter().flat_map(|g| g.tanks.iter().copied()) {
            if !order.contains(&tank) {
                order.push(tank);
            }
        }
        Self(order)
    }

    fn rank(&self, tank: TankId) -> (usize, TankId) {
        let pos = self.0.iter().position(|t| *t == tank).unwrap_or(usize::MAX);
        (pos, tank)
    }
}

/// Ordered `(tank, bucket)` sequence; never relies on map iteration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TankBuckets {
    buckets: Vec<TankBucket>,
}

impl TankBuckets {
    /// Buckets for every tank in `tanks`, all empty.
    pub fn for_tanks(tanks: &[TankId]) -> Self {
        Self {
            buckets: tanks.iter().copied().map(TankBucket::empty).collect(),
        }
    }

    pub fn get(&self, tank: TankId) -> Option<&TankBucket> {
        self.buckets.iter().find(|b| b.tank == tank)
    }

    pub(crate) fn get_mut(&mut self, tank: TankId) -> Option<&mut TankBucket> {
        self.buckets.iter_mut().find(|b| b.tank == tank)
    }

    pub fn iter(&self) -> impl Iterator<Item = &TankBucket> {
        self.buckets.iter()
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    /// Keyed union: every bucket in `update` replaces the bucket for the same
    /// tank wholesale. The result is sorted by `order`.
    pub fn merged(&self, update: TankBuckets, order: &TankOrder) -> TankBuckets {
        let mut buckets: Vec<TankBucket> = self
            .buckets
            .iter()
            .filter(|b| update.get(b.tank).is_none())
            .cloned()
            .collect();
        buckets.extend(update.buckets);
        buckets.sort_by_key(|b| order.rank(b.tank));
        TankBuckets { buckets }
    }
}
