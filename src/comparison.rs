//! N-way comparison series.
//!
//! Any entity holding per-month metric maps (a station, a group, a synthetic
//! "all" aggregate) is reshaped into a `ComparisonSeries` with months 1..12
//! in order. Missing values stay `None`; they are never coerced to zero.

use crate::models::{
    ComparisonMonth, ComparisonSeries, MonthMetrics, MonthlySiteAggregate, StationMonthlySeries,
};
use crate::stats::SiteMetric;
use std::collections::BTreeMap;
use tracing::debug;

pub const DEFAULT_SELECTION_LIMIT: usize = 4;

pub const METRIC_PFLEGETAGE: &str = "pflegetage";
pub const METRIC_BETTEN: &str = "betten";
pub const METRIC_VERWEILDAUER: &str = "verweildauer";
pub const METRIC_STATIONSAUSLASTUNG: &str = "stationsauslastung";

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ComparisonEntity {
    pub id: String,
    pub label: String,
    pub monthly: BTreeMap<u32, MonthMetrics>,
}

impl ComparisonEntity {
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            monthly: BTreeMap::new(),
        }
    }

    pub fn with_metric(mut self, month: u32, key: &str, value: Option<f64>) -> Self {
        self.monthly
            .entry(month)
            .or_default()
            .insert(key.to_string(), value);
        self
    }

    /// Months in which the station had no rows read as `None` for every metric.
    pub fn from_station_series(series: &StationMonthlySeries) -> Self {
        let mut entity = Self::new(series.station_name.clone(), series.station_name.clone());
        for point in &series.monthly_data {
            let present = point.rows > 0;
            let value = |v: f64| present.then_some(v);
            let metrics: MonthMetrics = [
                (METRIC_PFLEGETAGE, value(point.pflegetage)),
                (METRIC_BETTEN, value(f64::from(point.betten))),
                (METRIC_VERWEILDAUER, value(point.verweildauer)),
                (METRIC_STATIONSAUSLASTUNG, value(point.stationsauslastung)),
            ]
            .into_iter()
            .map(|(key, v)| (key.to_string(), v))
            .collect();
            entity.monthly.insert(point.month, metrics);
        }
        entity
    }

    /// Months with no station rows read as `None`.
    pub fn from_site_months(
        id: impl Into<String>,
        label: impl Into<String>,
        months: &[MonthlySiteAggregate],
    ) -> Self {
        let mut entity = Self::new(id, label);
        for month in months {
            let present = month.station_count > 0;
            let metrics: MonthMetrics = SiteMetric::ALL
                .iter()
                .map(|metric| (metric.key().to_string(), present.then(|| metric.value(month))))
                .collect();
            entity.monthly.insert(month.month, metrics);
        }
        entity
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComparisonSeriesBuilder {
    selection_limit: usize,
}

impl Default for ComparisonSeriesBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_SELECTION_LIMIT)
    }
}

impl ComparisonSeriesBuilder {
    /// A limit of zero falls back to the default.
    pub fn new(selection_limit: usize) -> Self {
        let selection_limit = if selection_limit == 0 {
            DEFAULT_SELECTION_LIMIT
        } else {
            selection_limit
        };
        Self { selection_limit }
    }

    pub fn selection_limit(&self) -> usize {
        self.selection_limit
    }

    /// One series per entity, in input order, up to the selection limit.
    pub fn build(&self, entities: &[ComparisonEntity]) -> Vec<ComparisonSeries> {
        if entities.len() > self.selection_limit {
            debug!(
                requested = entities.len(),
                limit = self.selection_limit,
                "truncating comparison selection"
            );
        }
        entities
            .iter()
            .take(self.selection_limit)
            .map(to_series)
            .collect()
    }

    /// Per month and metric, the sum over all entities. `None` contributions
    /// are skipped; the sum is `None` only when nobody contributed a value.
    ///
    /// Only additive metrics sum correctly. Occupancy, average stay and the
    /// group-deduplicated bed count of a whole site come from
    /// [`ComparisonEntity::from_site_months`] instead.
    pub fn build_all(
        &self,
        id: &str,
        label: &str,
        entities: &[ComparisonEntity],
    ) -> ComparisonSeries {
        let mut combined = ComparisonEntity::new(id, label);
        for month in 1..=12 {
            let mut sums: MonthMetrics = BTreeMap::new();
            for entity in entities {
                let Some(metrics) = entity.monthly.get(&month) else {
                    continue;
                };
                for (key, value) in metrics {
                    let slot = sums.entry(key.clone()).or_insert(None);
                    if let Some(value) = value {
                        *slot = Some(slot.unwrap_or(0.0) + value);
                    }
                }
            }
            combined.monthly.insert(month, sums);
        }
        to_series(&combined)
    }

    /// The selection followed by the "all" series. The "all" entity does not
    /// count against the selection limit.
    pub fn build_with_all(
        &self,
        selection: &[ComparisonEntity],
        all: &ComparisonEntity,
    ) -> Vec<ComparisonSeries> {
        let mut series = self.build(selection);
        series.push(to_series(all));
        series
    }
}

fn to_series(entity: &ComparisonEntity) -> ComparisonSeries {
    ComparisonSeries {
        id: entity.id.clone(),
        label: entity.label.clone(),
        monthly_data: (1..=12)
            .map(|month| ComparisonMonth {
                month,
                metrics: entity.monthly.get(&month).cloned().unwrap_or_default(),
            })
            .collect(),
    }
}
