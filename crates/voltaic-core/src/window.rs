//! Archive window calculation.
//!
//! An [`ArchiveWindow`] is the UTC half-open interval covering exactly
//! one calendar day in the configured time zone. The extraction query,
//! partition key, and merge delete predicate all derive from it, so it
//! is computed once per run and handed down unchanged.

use chrono::{DateTime, Days, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;

use crate::error::{Error, Result};

/// The UTC bounds of one local calendar day, start inclusive and end
/// exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArchiveWindow {
    /// The local calendar date being archived.
    pub target_date: NaiveDate,
    /// UTC instant of local midnight at the start of `target_date`.
    pub start_utc: DateTime<Utc>,
    /// UTC instant of local midnight at the start of the next day.
    pub end_utc: DateTime<Utc>,
}

impl ArchiveWindow {
    /// Computes the window for an explicit target date.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] only when `target_date` is the last
    /// representable date, so the exclusive end bound cannot be formed.
    pub fn for_date(tz: Tz, target_date: NaiveDate) -> Result<Self> {
        let next_date = target_date
            .checked_add_days(Days::new(1))
            .ok_or_else(|| Error::config(format!("target date out of range: {target_date}")))?;
        Ok(Self {
            target_date,
            start_utc: local_midnight_utc(tz, target_date),
            end_utc: local_midnight_utc(tz, next_date),
        })
    }

    /// Computes the window for "yesterday" in `tz`, relative to
    /// `now_utc`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] under the same conditions as
    /// [`ArchiveWindow::for_date`].
    pub fn yesterday(tz: Tz, now_utc: DateTime<Utc>) -> Result<Self> {
        let today_local = now_utc.with_timezone(&tz).date_naive();
        let target_date = today_local
            .checked_sub_days(Days::new(1))
            .ok_or_else(|| Error::config("current date out of range"))?;
        Self::for_date(tz, target_date)
    }
}

/// Resolves local midnight of `date` in `tz` to a UTC instant.
///
/// Ambiguous midnights (fall-back transitions) resolve to the earlier
/// instant so the window never loses readings to the overlap. A
/// midnight erased by a spring-forward gap maps to the first valid
/// local instant after it; the local day simply starts when the clocks
/// do.
fn local_midnight_utc(tz: Tz, date: NaiveDate) -> DateTime<Utc> {
    let mut candidate = date.and_time(NaiveTime::MIN);
    loop {
        if let Some(dt) = tz.from_local_datetime(&candidate).earliest() {
            return dt.with_timezone(&Utc);
        }
        // Inside a transition gap. Gaps are bounded, so this exits.
        candidate += Duration::minutes(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_date_spans_one_local_day() {
        let tz = chrono_tz::Asia::Tokyo;
        let date = NaiveDate::from_ymd_opt(2025, 1, 10).unwrap();

        let window = ArchiveWindow::for_date(tz, date).unwrap();

        assert_eq!(window.target_date, date);
        assert_eq!(window.end_utc - window.start_utc, Duration::hours(24));
        // JST is UTC+9, so local midnight is 15:00 the previous UTC day.
        assert_eq!(
            window.start_utc,
            Utc.with_ymd_and_hms(2025, 1, 9, 15, 0, 0).unwrap()
        );
        assert_eq!(
            window.end_utc,
            Utc.with_ymd_and_hms(2025, 1, 10, 15, 0, 0).unwrap()
        );
    }

    #[test]
    fn start_is_local_midnight() {
        let tz = chrono_tz::Asia::Tokyo;
        let date = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();

        let window = ArchiveWindow::for_date(tz, date).unwrap();
        let local_start = window.start_utc.with_timezone(&tz);

        assert_eq!(local_start.date_naive(), date);
        assert_eq!(local_start.time(), NaiveTime::MIN);
    }

    #[test]
    fn yesterday_relative_to_now() {
        let tz = chrono_tz::Asia::Tokyo;
        // 2025-01-11 02:00 JST == 2025-01-10 17:00 UTC.
        let now = Utc.with_ymd_and_hms(2025, 1, 10, 17, 0, 0).unwrap();

        let window = ArchiveWindow::yesterday(tz, now).unwrap();

        assert_eq!(
            window.target_date,
            NaiveDate::from_ymd_opt(2025, 1, 10).unwrap()
        );
    }

    #[test]
    fn yesterday_straddles_utc_date_line() {
        let tz = chrono_tz::Asia::Tokyo;
        // 23:30 UTC on Jan 10 is already 08:30 JST on Jan 11.
        let now = Utc.with_ymd_and_hms(2025, 1, 10, 23, 30, 0).unwrap();

        let window = ArchiveWindow::yesterday(tz, now).unwrap();

        assert_eq!(
            window.target_date,
            NaiveDate::from_ymd_opt(2025, 1, 10).unwrap()
        );
    }

    #[test]
    fn gapped_midnight_starts_the_day_at_first_valid_instant() {
        // America/Santiago springs forward at midnight on 2025-09-07;
        // local 00:00 does not exist and clocks open the day at 01:00.
        let tz = chrono_tz::America::Santiago;
        let date = NaiveDate::from_ymd_opt(2025, 9, 7).unwrap();

        let window = ArchiveWindow::for_date(tz, date).unwrap();
        let local_start = window.start_utc.with_timezone(&tz);

        assert_eq!(local_start.date_naive(), date);
        assert_eq!(local_start.time(), NaiveTime::from_hms_opt(1, 0, 0).unwrap());
        assert_eq!(window.end_utc - window.start_utc, Duration::hours(23));
    }

    #[test]
    fn dst_day_in_europe_is_23_hours() {
        // Europe/Berlin springs forward on 2025-03-30; the local day
        // is 23 hours long and the window must reflect that.
        let tz = chrono_tz::Europe::Berlin;
        let date = NaiveDate::from_ymd_opt(2025, 3, 30).unwrap();

        let window = ArchiveWindow::for_date(tz, date).unwrap();

        assert_eq!(window.end_utc - window.start_utc, Duration::hours(23));
    }
}
