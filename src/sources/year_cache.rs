use crate::error::Result;
use crate::models::{DailySummary, StationMetadata};
use crate::readers::SummaryReader;
use crate::sources::{SampleSource, StationSample};
use chrono::{Datelike, NaiveDate};
use once_cell::sync::OnceCell;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

/// One year of summaries grouped by date.
#[derive(Debug)]
pub struct YearData {
    pub year: i32,
    by_date: BTreeMap<NaiveDate, Vec<DailySummary>>,
}

impl YearData {
    pub fn new(year: i32, summaries: Vec<DailySummary>) -> Self {
        let mut by_date: BTreeMap<NaiveDate, Vec<DailySummary>> = BTreeMap::new();
        for summary in summaries {
            by_date.entry(summary.date).or_default().push(summary);
        }
        Self { year, by_date }
    }

    pub fn summaries_for(&self, date: NaiveDate) -> &[DailySummary] {
        self.by_date.get(&date).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn dates(&self) -> impl Iterator<Item = &NaiveDate> {
        self.by_date.keys()
    }
}

type YearSlot = Arc<OnceCell<Arc<YearData>>>;

/// Summaries keyed by year, each read from disk at most once.
///
/// The map lock only guards slot lookup. The disk read happens inside the
/// year's own slot, so workers on different years load in parallel and
/// workers on the same year wait for a single read. A year is fully read
/// before it is published, so readers never see a partial year.
pub struct YearCache {
    root: PathBuf,
    stations: Arc<BTreeMap<String, StationMetadata>>,
    reader: SummaryReader,
    years: Mutex<BTreeMap<i32, YearSlot>>,
}

impl YearCache {
    pub fn new(root: impl Into<PathBuf>, stations: BTreeMap<String, StationMetadata>) -> Self {
        Self {
            root: root.into(),
            stations: Arc::new(stations),
            reader: SummaryReader::new(),
            years: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn stations(&self) -> &BTreeMap<String, StationMetadata> {
        &self.stations
    }

    fn slot(&self, year: i32) -> YearSlot {
        let mut years = self.years.lock().unwrap_or_else(|p| p.into_inner());
        Arc::clone(years.entry(year).or_default())
    }

    /// The data for `year`, reading it from disk on first request.
    /// A failed read leaves the year unloaded so a later call retries.
    pub fn load(&self, year: i32) -> Result<Arc<YearData>> {
        let slot = self.slot(year);
        let data = slot.get_or_try_init(|| -> Result<Arc<YearData>> {
            info!("Loading station summaries for {}", year);
            let summaries = self.reader.read_year(&self.root, year)?;
            Ok(Arc::new(YearData::new(year, summaries)))
        })?;
        Ok(Arc::clone(data))
    }

    /// Years currently held in memory, ascending.
    pub fn loaded_years(&self) -> Vec<i32> {
        self.years
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .iter()
            .filter(|(_, slot)| slot.get().is_some())
            .map(|(year, _)| *year)
            .collect()
    }

    /// Drop `year` so the next request rereads it from disk.
    pub fn invalidate(&self, year: i32) {
        self.years
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .remove(&year);
    }

    pub fn invalidate_all(&self) {
        self.years.lock().unwrap_or_else(|p| p.into_inner()).clear();
    }
}

impl SampleSource for YearCache {
    fn samples_for(&self, date: NaiveDate) -> Result<Vec<StationSample>> {
        let data = self.load(date.year())?;

        let mut unknown = 0usize;
        let samples: Vec<StationSample> = data
            .summaries_for(date)
            .iter()
            .filter_map(|summary| match self.stations.get(&summary.station_id) {
                Some(station) => Some(StationSample {
                    station: station.clone(),
                    summary: summary.clone(),
                }),
                None => {
                    unknown += 1;
                    None
                }
            })
            .collect();

        if unknown > 0 {
            debug!("{} summaries on {} have no station metadata", unknown, date);
        }
        Ok(samples)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::writers::SummaryWriter;
    use tempfile::TempDir;

    fn setup() -> Result<(TempDir, YearCache)> {
        let dir = TempDir::new()?;
        let writer = SummaryWriter::new(dir.path());

        let d20 = NaiveDate::from_ymd_opt(2020, 6, 1).unwrap();
        let d21 = NaiveDate::from_ymd_opt(2021, 6, 1).unwrap();
        let mut a = DailySummary::empty("A", d20);
        a.max_temperature = Some(80.0);
        let mut b = DailySummary::empty("A", d21);
        b.max_temperature = Some(81.0);
        writer.write_station("A", &[a, b])?;

        let mut orphan = DailySummary::empty("Z", d20);
        orphan.max_temperature = Some(1.0);
        writer.write_station("Z", &[orphan])?;

        let stations = BTreeMap::from([(
            "A".to_string(),
            StationMetadata::new("A", 40.0, -100.0, None, "Alpha"),
        )]);
        let cache = YearCache::new(dir.path(), stations);
        Ok((dir, cache))
    }

    #[test]
    fn test_samples_follow_requested_year() -> Result<()> {
        let (_dir, cache) = setup()?;

        let s20 = cache.samples_for(NaiveDate::from_ymd_opt(2020, 6, 1).unwrap())?;
        assert_eq!(s20.len(), 1);
        assert_eq!(s20[0].summary.max_temperature, Some(80.0));
        assert_eq!(cache.loaded_years(), vec![2020]);

        let s21 = cache.samples_for(NaiveDate::from_ymd_opt(2021, 6, 1).unwrap())?;
        assert_eq!(s21[0].summary.max_temperature, Some(81.0));
        assert_eq!(cache.loaded_years(), vec![2020, 2021]);

        assert!(cache
            .samples_for(NaiveDate::from_ymd_opt(2021, 6, 2).unwrap())?
            .is_empty());
        Ok(())
    }

    #[test]
    fn test_alternating_years_are_read_once() -> Result<()> {
        let (_dir, cache) = setup()?;
        let first20 = cache.load(2020)?;
        let first21 = cache.load(2021)?;

        for _ in 0..5 {
            assert!(Arc::ptr_eq(&first20, &cache.load(2020)?));
            assert!(Arc::ptr_eq(&first21, &cache.load(2021)?));
        }
        Ok(())
    }

    #[test]
    fn test_concurrent_year_boundary_loads_share_data() -> Result<()> {
        let (_dir, cache) = setup()?;
        let loads: Vec<Arc<YearData>> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|i| {
                    let cache = &cache;
                    scope.spawn(move || cache.load(2020 + (i % 2)))
                })
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().unwrap().unwrap())
                .collect()
        });

        for data in &loads {
            let same_year = loads.iter().find(|d| d.year == data.year).unwrap();
            assert!(Arc::ptr_eq(data, same_year));
        }
        assert_eq!(cache.loaded_years(), vec![2020, 2021]);
        Ok(())
    }

    #[test]
    fn test_invalidate_rereads() -> Result<()> {
        let (_dir, cache) = setup()?;
        let first = cache.load(2020)?;
        let other = cache.load(2021)?;
        assert!(Arc::ptr_eq(&first, &cache.load(2020)?));

        cache.invalidate(2020);
        assert_eq!(cache.loaded_years(), vec![2021]);
        assert!(!Arc::ptr_eq(&first, &cache.load(2020)?));
        assert!(Arc::ptr_eq(&other, &cache.load(2021)?));

        cache.invalidate_all();
        assert!(cache.loaded_years().is_empty());
        Ok(())
    }

    #[test]
    fn test_missing_year_is_empty() -> Result<()> {
        let (_dir, cache) = setup()?;
        assert_eq!(cache.load(1999)?.dates().count(), 0);
        Ok(())
    }
}
