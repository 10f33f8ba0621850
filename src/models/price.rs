use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One daily observation of a listed stock or market index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceObservation {
    pub date: NaiveDate,
    pub close: f64,
    pub volume: Option<i64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub open: Option<f64>,
}

impl PriceObservation {
    /// Close-only observation (index values, test fixtures)
    pub fn close_only(date: NaiveDate, close: f64) -> Self {
        Self {
            date,
            close,
            volume: None,
            high: None,
            low: None,
            open: None,
        }
    }

    pub fn with_volume(mut self, volume: i64) -> Self {
        self.volume = Some(volume);
        self
    }
}

/// Closing prices of `observations`, in order
pub fn closes(observations: &[PriceObservation]) -> Vec<f64> {
    observations.iter().map(|o| o.close).collect()
}

/// Ascending, date-unique series of observations for one entity.
///
/// Observations are not necessarily daily: weekends, holidays and vendor
/// gaps are expected. Duplicate dates keep the last observation supplied,
/// mirroring upsert-by-natural-key semantics of the price table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PriceSeries {
    observations: Vec<PriceObservation>,
}

impl PriceSeries {
    pub fn new(mut observations: Vec<PriceObservation>) -> Self {
        // Stable sort keeps insertion order among equal dates, so the last one wins below
        observations.sort_by_key(|o| o.date);
        let mut deduped: Vec<PriceObservation> = Vec::with_capacity(observations.len());
        for obs in observations {
            match deduped.last_mut() {
                Some(last) if last.date == obs.date => *last = obs,
                _ => deduped.push(obs),
            }
        }
        Self {
            observations: deduped,
        }
    }

    /// Build from (date, close) pairs
    pub fn from_closes<I>(points: I) -> Self
    where
        I: IntoIterator<Item = (NaiveDate, f64)>,
    {
        Self::new(
            points
                .into_iter()
                .map(|(date, close)| PriceObservation::close_only(date, close))
                .collect(),
        )
    }

    pub fn observations(&self) -> &[PriceObservation] {
        &self.observations
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    pub fn first(&self) -> Option<&PriceObservation> {
        self.observations.first()
    }

    pub fn last(&self) -> Option<&PriceObservation> {
        self.observations.last()
    }

    /// Observations dated on or before `date`
    pub fn up_to(&self, date: NaiveDate) -> &[PriceObservation] {
        let end = self.observations.partition_point(|o| o.date <= date);
        &self.observations[..end]
    }

    /// Observations dated within `[start, end]`
    pub fn between(&self, start: NaiveDate, end: NaiveDate) -> &[PriceObservation] {
        if start > end {
            return &[];
        }
        let lo = self.observations.partition_point(|o| o.date < start);
        let hi = self.observations.partition_point(|o| o.date <= end);
        &self.observations[lo..hi]
    }

    /// Copy of the series truncated at `date` (inclusive)
    pub fn truncated(&self, date: NaiveDate) -> PriceSeries {
        PriceSeries {
            observations: self.up_to(date).to_vec(),
        }
    }
}
