use crate::groups::normalize;
use crate::models::{
    MonthlySiteAggregate, OccupancyReport, StationMonthPoint, StationMonthlySeries, UploadBatch,
};
use crate::rows::{MonthTag, StatisticRow};
use crate::session::Session;
use chrono::{Datelike, Local, NaiveDate};
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::{debug, warn};

const MONTHS: u32 = 12;

/// Turns monthly uploads into site-level and per-station occupancy figures.
///
/// Every call recomputes from scratch; nothing is carried between calls.
pub struct OccupancyAggregator<'a> {
    session: &'a Session,
}

impl<'a> OccupancyAggregator<'a> {
    pub fn new(session: &'a Session) -> Self {
        Self { session }
    }

    pub fn aggregate(&self, site: &str, year: i32, batches: &[UploadBatch]) -> OccupancyReport {
        self.aggregate_at(Local::now().year(), site, year, batches)
    }

    /// `current_year` is the year assumed for month tags without one.
    pub fn aggregate_at(
        &self,
        current_year: i32,
        site: &str,
        year: i32,
        batches: &[UploadBatch],
    ) -> OccupancyReport {
        let rows = rows_by_month(current_year, site, year, batches);
        self.build_report(site, year, rows)
    }

    /// Same as [`aggregate`](Self::aggregate), restricted to the stations a
    /// selection token (group name or station) stands for.
    pub fn aggregate_selection(
        &self,
        site: &str,
        year: i32,
        token: &str,
        batches: &[UploadBatch],
    ) -> OccupancyReport {
        self.aggregate_selection_at(Local::now().year(), site, year, token, batches)
    }

    pub fn aggregate_selection_at(
        &self,
        current_year: i32,
        site: &str,
        year: i32,
        token: &str,
        batches: &[UploadBatch],
    ) -> OccupancyReport {
        let selected: HashSet<String> = self
            .session
            .groups
            .station_names_for_selection(token)
            .iter()
            .map(|name| station_key(name))
            .collect();

        let mut rows = rows_by_month(current_year, site, year, batches);
        for month_rows in rows.values_mut() {
            month_rows.retain(|row| selected.contains(&station_key(&row.station)));
        }
        self.build_report(site, year, rows)
    }

    fn build_report(
        &self,
        site: &str,
        year: i32,
        rows: BTreeMap<u32, Vec<StatisticRow>>,
    ) -> OccupancyReport {
        let mut months: Vec<MonthlySiteAggregate> = (1..=MONTHS)
            .map(|month| MonthlySiteAggregate {
                month,
                ..MonthlySiteAggregate::default()
            })
            .collect();
        let mut stations: BTreeMap<String, Vec<StationMonthPoint>> = BTreeMap::new();
        let spellings = canonical_spellings(&rows);

        for (month, month_rows) in &rows {
            let (aggregate, points) =
                self.aggregate_month(site, year, *month, month_rows, &spellings);
            months[(*month - 1) as usize] = aggregate;
            for (station, point) in points {
                let series = stations.entry(station).or_insert_with(empty_station_months);
                series[(*month - 1) as usize] = point;
            }
        }

        OccupancyReport {
            site: site.to_string(),
            year,
            months,
            stations: stations
                .into_iter()
                .map(|(station_name, monthly_data)| StationMonthlySeries {
                    station_name,
                    monthly_data,
                })
                .collect(),
        }
    }

    fn aggregate_month(
        &self,
        site: &str,
        year: i32,
        month: u32,
        rows: &[StatisticRow],
        spellings: &HashMap<String, String>,
    ) -> (MonthlySiteAggregate, BTreeMap<String, StationMonthPoint>) {
        let days = days_in_month(year, month);
        let mut site_total = Accumulator::default();
        let mut station_count = 0u32;
        let mut stations: BTreeMap<String, Accumulator> = BTreeMap::new();

        let mut resolved: HashMap<String, Option<u32>> = HashMap::new();
        let mut counted_groups: HashSet<String> = HashSet::new();
        let mut counted_stations: HashSet<String> = HashSet::new();

        for row in rows {
            station_count += 1;
            site_total.add_row(row);

            let key = station_key(&row.station);
            let name = spellings
                .get(&key)
                .cloned()
                .unwrap_or_else(|| normalize(&row.station));
            let group = self.session.groups.group_for_station(&name);
            let beds = *resolved.entry(key.clone()).or_insert_with(|| {
                let beds = self.session.beds.resolve(&name, site, year, group);
                if beds.is_none() {
                    debug!(station = %name, site, year, "no bed record, counting 0 beds");
                }
                beds
            });

            if let Some(beds) = beds {
                let first = match group {
                    Some(group) => counted_groups.insert(group.name.clone()),
                    None => counted_stations.insert(key),
                };
                if first {
                    site_total.betten += beds;
                }
            }

            let station = stations.entry(name).or_default();
            station.add_row(row);
            station.betten = beds.unwrap_or(0);
        }

        let aggregate = MonthlySiteAggregate {
            month,
            pflegetage: site_total.pflegetage,
            betten: site_total.betten,
            stationsauslastung: occupancy(site_total.pflegetage, site_total.betten, days),
            verweildauer: site_total.average_stay(),
            station_count,
        };

        let points = stations
            .into_iter()
            .map(|(name, acc)| {
                let point = StationMonthPoint {
                    month,
                    pflegetage: acc.pflegetage,
                    betten: acc.betten,
                    verweildauer: acc.average_stay(),
                    stationsauslastung: occupancy(acc.pflegetage, acc.betten, days),
                    rows: acc.rows,
                };
                (name, point)
            })
            .collect();

        (aggregate, points)
    }
}

#[derive(Debug, Default)]
struct Accumulator {
    pflegetage: f64,
    verweildauer_sum: f64,
    verweildauer_count: u32,
    betten: u32,
    rows: u32,
}

impl Accumulator {
    fn add_row(&mut self, row: &StatisticRow) {
        self.rows += 1;
        if let Some(days) = row.pflegetage {
            self.pflegetage += days;
        }
        if let Some(stay) = row.verweildauer.filter(|v| *v > 0.0) {
            self.verweildauer_sum += stay;
            self.verweildauer_count += 1;
        }
    }

    fn average_stay(&self) -> f64 {
        if self.verweildauer_count == 0 {
            0.0
        } else {
            self.verweildauer_sum / f64::from(self.verweildauer_count)
        }
    }
}

fn station_key(name: &str) -> String {
    normalize(name).to_lowercase()
}

/// Stations are matched case-insensitively. Each key is reported under the
/// smallest of its spellings so the result does not depend on row order.
fn canonical_spellings(rows: &BTreeMap<u32, Vec<StatisticRow>>) -> HashMap<String, String> {
    let mut spellings: HashMap<String, String> = HashMap::new();
    for row in rows.values().flatten() {
        let name = normalize(&row.station);
        let current = spellings
            .entry(station_key(&row.station))
            .or_insert_with(|| name.clone());
        if name < *current {
            *current = name;
        }
    }
    spellings
}

fn empty_station_months() -> Vec<StationMonthPoint> {
    (1..=MONTHS)
        .map(|month| StationMonthPoint {
            month,
            ..StationMonthPoint::default()
        })
        .collect()
}

/// Rows of `site` for the requested year, grouped by calendar month.
/// Batches with an unreadable tag are skipped.
fn rows_by_month(
    current_year: i32,
    site: &str,
    year: i32,
    batches: &[UploadBatch],
) -> BTreeMap<u32, Vec<StatisticRow>> {
    let mut by_month: BTreeMap<u32, Vec<StatisticRow>> = BTreeMap::new();

    for batch in batches {
        let tag = match MonthTag::parse(&batch.month) {
            Ok(tag) => tag,
            Err(err) => {
                warn!(tag = %batch.month, "skipping upload batch: {err}");
                continue;
            }
        };
        if tag.year_or(current_year) != year {
            continue;
        }

        let month_rows = by_month.entry(tag.month).or_default();
        for raw in batch.rows_for_site(site) {
            match StatisticRow::from_raw(raw) {
                Some(row) => month_rows.push(row),
                None => debug!(month = tag.month, site, "skipping row without station"),
            }
        }
    }

    by_month
}

/// Occupancy in percent; zero whenever there is no bed capacity.
pub fn occupancy(pflegetage: f64, betten: u32, days: u32) -> f64 {
    if betten == 0 || days == 0 {
        return 0.0;
    }
    pflegetage / (f64::from(betten) * f64::from(days)) * 100.0
}

/// Calendar days in `month` of `year`, 0 for an invalid month.
pub fn days_in_month(year: i32, month: u32) -> u32 {
    let first = NaiveDate::from_ymd_opt(year, month, 1);
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    };
    match (first, next) {
        (Some(first), Some(next)) => (next - first).num_days() as u32,
        _ => 0,
    }
}

// ---------------------------------------------------------------------------
// Chart arrays
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SiteMetric {
    Pflegetage,
    Betten,
    Stationsauslastung,
    Verweildauer,
    StationCount,
}

impl SiteMetric {
    pub const ALL: [SiteMetric; 5] = [
        SiteMetric::Pflegetage,
        SiteMetric::Betten,
        SiteMetric::Stationsauslastung,
        SiteMetric::Verweildauer,
        SiteMetric::StationCount,
    ];

    pub fn key(self) -> &'static str {
        match self {
            SiteMetric::Pflegetage => "pflegetage",
            SiteMetric::Betten => "betten",
            SiteMetric::Stationsauslastung => "stationsauslastung",
            SiteMetric::Verweildauer => "verweildauer",
            SiteMetric::StationCount => "stationCount",
        }
    }

    pub fn value(self, month: &MonthlySiteAggregate) -> f64 {
        match self {
            SiteMetric::Pflegetage => month.pflegetage,
            SiteMetric::Betten => f64::from(month.betten),
            SiteMetric::Stationsauslastung => month.stationsauslastung,
            SiteMetric::Verweildauer => month.verweildauer,
            SiteMetric::StationCount => f64::from(month.station_count),
        }
    }
}

/// Jan..Dec values of one metric; months missing from `months` stay 0.
pub fn chart_series(months: &[MonthlySiteAggregate], metric: SiteMetric) -> [f64; 12] {
    let mut series = [0.0; 12];
    for month in months {
        if (1..=MONTHS).contains(&month.month) {
            series[(month.month - 1) as usize] = metric.value(month);
        }
    }
    series
}
