//! In-memory dataset and its aggregate indices.
//!
//! A [`Dataset`] owns every raw [`Sample`] of one load together with four
//! sparse indices (hourly, daily, monthly, yearly). Indices are built in one
//! pass by [`DatasetBuilder`]; a failed pass leaves nothing behind, so a
//! consumer only ever sees an empty or a fully populated dataset.
//!
//! Missing keys mean zero steps. The `*_series` queries zero-fill for display.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use time::{Date, Month, UtcOffset};

use crate::error::{DataError, Result};
use crate::models::{DatasetSummary, MonthKey, Sample, SeriesStats};

/// Hour-of-day bucket key.
pub type HourKey = (Date, u8);

/// Samples plus hourly/daily/monthly/yearly step totals.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dataset {
    source: Option<PathBuf>,
    samples: Vec<Sample>,
    hourly: BTreeMap<HourKey, u64>,
    daily: BTreeMap<Date, u64>,
    monthly: BTreeMap<MonthKey, u64>,
    yearly: BTreeMap<i32, u64>,
    available_dates: Vec<Date>,
}

impl Dataset {
    /// Aggregate samples at a fixed offset.
    pub fn from_samples<I>(samples: I, offset: UtcOffset) -> Result<Self>
    where
        I: IntoIterator<Item = Sample>,
    {
        let mut builder = DatasetBuilder::new(offset);
        for sample in samples {
            builder.push(sample)?;
        }
        Ok(builder.finish())
    }

    /// Path this dataset was loaded from, if any.
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    pub(crate) fn with_source(mut self, path: PathBuf) -> Self {
        self.source = Some(path);
        self
    }

    /// True when no samples were loaded.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Number of raw samples.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn hourly(&self) -> &BTreeMap<HourKey, u64> {
        &self.hourly
    }

    pub fn daily(&self) -> &BTreeMap<Date, u64> {
        &self.daily
    }

    pub fn monthly(&self) -> &BTreeMap<MonthKey, u64> {
        &self.monthly
    }

    pub fn yearly(&self) -> &BTreeMap<i32, u64> {
        &self.yearly
    }

    /// Sorted dates that have at least one sample.
    pub fn available_dates(&self) -> &[Date] {
        &self.available_dates
    }

    /// Most recent date with data.
    pub fn latest_date(&self) -> Option<Date> {
        self.available_dates.last().copied()
    }

    /// Years with data, ascending.
    pub fn years(&self) -> Vec<i32> {
        self.yearly.keys().copied().collect()
    }

    /// Total steps on a date (0 if absent).
    pub fn steps_on(&self, date: Date) -> u64 {
        self.daily.get(&date).copied().unwrap_or(0)
    }

    /// Steps per hour of `date`, zero-filled.
    pub fn hourly_series(&self, date: Date) -> [u64; 24] {
        let mut series = [0u64; 24];
        for (&(_, hour), &steps) in self.hourly.range((date, 0)..=(date, 23)) {
            series[usize::from(hour)] = steps;
        }
        series
    }

    /// Steps per day for every day of a month, zero-filled.
    pub fn daily_series(&self, year: i32, month: Month) -> Result<Vec<(Date, u64)>> {
        let first = Date::from_calendar_date(year, month, 1)
            .map_err(|e| DataError::InvalidDate(format!("{year} {month}: {e}")))?;
        let days = month.length(year);
        let series = (1..=days)
            .filter_map(|day| first.replace_day(day).ok())
            .map(|date| (date, self.steps_on(date)))
            .collect();
        Ok(series)
    }

    /// Total and average-over-active-days for a month.
    pub fn month_stats(&self, year: i32, month: Month) -> Result<SeriesStats> {
        let series = self.daily_series(year, month)?;
        Ok(SeriesStats::from_values(series.into_iter().map(|(_, s)| s)))
    }

    /// Steps per month of `year` (January first), zero-filled.
    pub fn monthly_series(&self, year: i32) -> [u64; 12] {
        let mut series = [0u64; 12];
        let from = MonthKey { year, month: 1 };
        let to = MonthKey { year, month: 12 };
        for (key, &steps) in self.monthly.range(from..=to) {
            series[usize::from(key.month - 1)] = steps;
        }
        series
    }

    /// Total and average-over-active-months for a year.
    pub fn year_stats(&self, year: i32) -> SeriesStats {
        SeriesStats::from_values(self.monthly_series(year))
    }

    /// Overview of what was loaded.
    pub fn summary(&self) -> DatasetSummary {
        DatasetSummary {
            samples: self.samples.len(),
            days: self.daily.len(),
            first_date: self.available_dates.first().copied(),
            last_date: self.latest_date(),
            total_steps: self.yearly.values().fold(0u64, |acc, s| acc.saturating_add(*s)),
            yearly: self.yearly.iter().map(|(y, s)| (*y, *s)).collect(),
        }
    }
}

/// Single-pass builder for [`Dataset`].
///
/// Consumed by [`DatasetBuilder::finish`]; dropping it after an error from
/// [`DatasetBuilder::push`] discards everything accumulated so far.
#[derive(Debug)]
pub struct DatasetBuilder {
    offset: UtcOffset,
    inner: Dataset,
}

impl DatasetBuilder {
    pub fn new(offset: UtcOffset) -> Self {
        Self {
            offset,
            inner: Dataset::default(),
        }
    }

    /// Bucket one sample into every index.
    pub fn push(&mut self, sample: Sample) -> Result<()> {
        let local = sample.local_time(self.offset)?;
        let date = local.date();
        let steps = sample.steps;

        add(self.inner.hourly.entry((date, local.hour())).or_insert(0), steps)?;
        add(self.inner.daily.entry(date).or_insert(0), steps)?;
        add(self.inner.monthly.entry(MonthKey::of(date)).or_insert(0), steps)?;
        add(self.inner.yearly.entry(date.year()).or_insert(0), steps)?;

        self.inner.samples.push(sample);
        Ok(())
    }

    pub fn finish(mut self) -> Dataset {
        self.inner.available_dates = self.inner.daily.keys().copied().collect();
        self.inner
    }
}

fn add(slot: &mut u64, steps: u64) -> Result<()> {
    *slot = slot.checked_add(steps).ok_or(DataError::Overflow)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::{date, offset};

    // 2024-02-28T22:15:00Z
    const FEB_28_2215: i64 = 1_709_158_500_000;
    const HOUR_MS: i64 = 3_600_000;
    const DAY_MS: i64 = 24 * HOUR_MS;

    fn sample(timestamp_ms: i64, steps: u64) -> Sample {
        Sample {
            timestamp_ms,
            steps,
        }
    }

    fn dataset() -> Dataset {
        Dataset::from_samples(
            vec![
                sample(FEB_28_2215, 100),
                sample(FEB_28_2215 + 10 * 60_000, 50),
                sample(FEB_28_2215 + HOUR_MS, 200),
                sample(FEB_28_2215 + DAY_MS, 300),
                sample(FEB_28_2215 + 40 * DAY_MS, 400),
            ],
            offset!(UTC),
        )
        .unwrap()
    }

    #[test]
    fn test_empty_dataset() {
        let ds = Dataset::default();
        assert!(ds.is_empty());
        assert!(ds.available_dates().is_empty());
        assert_eq!(ds.latest_date(), None);
        assert_eq!(ds.summary().total_steps, 0);
        assert_eq!(ds.hourly_series(date!(2024 - 01 - 01)), [0; 24]);
    }

    #[test]
    fn test_buckets() {
        let ds = dataset();

        assert_eq!(ds.hourly()[&(date!(2024 - 02 - 28), 22)], 150);
        assert_eq!(ds.hourly()[&(date!(2024 - 02 - 28), 23)], 200);
        assert_eq!(ds.daily()[&date!(2024 - 02 - 28)], 350);
        assert_eq!(ds.daily()[&date!(2024 - 02 - 29)], 300);
        assert_eq!(
            ds.monthly()[&MonthKey {
                year: 2024,
                month: 2
            }],
            650
        );
        assert_eq!(
            ds.monthly()[&MonthKey {
                year: 2024,
                month: 4
            }],
            400
        );
        assert_eq!(ds.yearly()[&2024], 1050);
    }

    #[test]
    fn test_partition_sums() {
        let ds = dataset();

        for (date, &total) in ds.daily() {
            let hours: u64 = ds.hourly_series(*date).iter().sum();
            assert_eq!(hours, total, "hourly sum for {date}");
        }
        for (key, &total) in ds.monthly() {
            let days: u64 = ds
                .daily()
                .iter()
                .filter(|(d, _)| MonthKey::of(**d) == *key)
                .map(|(_, s)| s)
                .sum();
            assert_eq!(days, total, "daily sum for {key}");
        }
        for (year, &total) in ds.yearly() {
            let months: u64 = ds.monthly_series(*year).iter().sum();
            assert_eq!(months, total);
        }
    }

    #[test]
    fn test_sparse_keys() {
        let ds = dataset();
        assert!(!ds.daily().contains_key(&date!(2024 - 03 - 01)));
        assert_eq!(ds.steps_on(date!(2024 - 03 - 01)), 0);
        assert!(!ds.monthly().contains_key(&MonthKey {
            year: 2024,
            month: 3
        }));
    }

    #[test]
    fn test_available_dates_sorted_unique() {
        let ds = dataset();
        assert_eq!(
            ds.available_dates(),
            &[
                date!(2024 - 02 - 28),
                date!(2024 - 02 - 29),
                date!(2024 - 04 - 08)
            ]
        );
        assert_eq!(ds.latest_date(), Some(date!(2024 - 04 - 08)));
    }

    #[test]
    fn test_offset_moves_samples_across_days() {
        let ds = Dataset::from_samples(vec![sample(FEB_28_2215, 10)], offset!(+3)).unwrap();
        assert_eq!(ds.steps_on(date!(2024 - 02 - 29)), 10);
        assert_eq!(ds.hourly_series(date!(2024 - 02 - 29))[1], 10);
    }

    #[test]
    fn test_daily_series_covers_month() {
        let ds = dataset();
        let series = ds.daily_series(2024, Month::February).unwrap();
        assert_eq!(series.len(), 29);
        assert_eq!(series[27], (date!(2024 - 02 - 28), 350));
        assert_eq!(series[28], (date!(2024 - 02 - 29), 300));
        assert_eq!(series[0].1, 0);

        let stats = ds.month_stats(2024, Month::February).unwrap();
        assert_eq!(stats.total, 650);
        assert_eq!(stats.average, 325);
    }

    #[test]
    fn test_monthly_series_and_stats() {
        let ds = dataset();
        let series = ds.monthly_series(2024);
        assert_eq!(series[1], 650);
        assert_eq!(series[3], 400);
        assert_eq!(series.iter().sum::<u64>(), 1050);
        assert_eq!(ds.year_stats(2024).average, 525);
        assert_eq!(ds.monthly_series(2023), [0; 12]);
    }

    #[test]
    fn test_summary() {
        let summary = dataset().summary();
        assert_eq!(summary.samples, 5);
        assert_eq!(summary.days, 3);
        assert_eq!(summary.first_date, Some(date!(2024 - 02 - 28)));
        assert_eq!(summary.total_steps, 1050);
        assert_eq!(summary.yearly, vec![(2024, 1050)]);
    }

    #[test]
    fn test_overflow_is_an_error() {
        let result = Dataset::from_samples(
            vec![sample(FEB_28_2215, u64::MAX), sample(FEB_28_2215, 1)],
            offset!(UTC),
        );
        assert!(matches!(result, Err(DataError::Overflow)));
    }
}
