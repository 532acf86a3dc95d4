use crate::beds::{BedCountResolver, BedMatchRules};
use crate::groups::StationGroupResolver;
use crate::models::{BedRecord, StationGroup};
use crate::stats::OccupancyAggregator;

/// Reference data for one session: station groups and bed records.
///
/// Built once after loading and shared read-only afterwards.
#[derive(Debug, Clone, Default)]
pub struct Session {
    pub groups: StationGroupResolver,
    pub beds: BedCountResolver,
}

impl Session {
    pub fn new(groups: Vec<StationGroup>, beds: Vec<BedRecord>, rules: BedMatchRules) -> Self {
        Self {
            groups: StationGroupResolver::from_groups(groups),
            beds: BedCountResolver::new(beds, rules),
        }
    }

    /// Installed beds for a station, looking up its group first.
    pub fn bed_count(&self, station: &str, site: &str, year: i32) -> Option<u32> {
        let group = self.groups.group_for_station(station);
        self.beds.resolve(station, site, year, group)
    }

    pub fn aggregator(&self) -> OccupancyAggregator<'_> {
        OccupancyAggregator::new(self)
    }
}
