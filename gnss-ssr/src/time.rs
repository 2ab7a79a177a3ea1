//! GPS epoch arithmetic kept to the minimum the pipeline needs: a receive
//! epoch, validity checks and civil rendering for the display path.

use core::fmt;

use chrono::{NaiveDate, NaiveDateTime, TimeDelta};

pub const SECONDS_PER_WEEK: u32 = 604_800;

/// GPS-UTC offset applied when rendering civil time. Display-only; leap
/// second handling proper is the outer collaborator's business.
pub const GPS_UTC_LEAP_SECONDS: i64 = 18;

/// Receive epoch: integer GPS week and seconds of week.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GpsTime {
    pub week: u16,
    pub tow: u32,
}

impl GpsTime {
    pub fn new(week: u16, tow: u32) -> Self {
        Self { week, tow }
    }

    pub fn week_valid(&self) -> bool {
        // GPS week numbering started 1980; anything below the first rollover
        // is not a plausible broadcast epoch for the supported services.
        (1024..8192).contains(&self.week)
    }

    pub fn tow_valid(&self) -> bool {
        self.tow < SECONDS_PER_WEEK
    }

    /// One-second tick key used by the best-satellite selector.
    pub fn tick(&self) -> u64 {
        u64::from(self.week) * u64::from(SECONDS_PER_WEEK) + u64::from(self.tow)
    }

    /// UTC rendering (constant leap offset).
    pub fn to_utc(&self) -> Option<NaiveDateTime> {
        let epoch = NaiveDate::from_ymd_opt(1980, 1, 6)?.and_hms_opt(0, 0, 0)?;
        let secs = i64::from(self.week) * i64::from(SECONDS_PER_WEEK) + i64::from(self.tow)
            - GPS_UTC_LEAP_SECONDS;
        epoch.checked_add_signed(TimeDelta::seconds(secs))
    }
}

impl fmt::Display for GpsTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_utc() {
            Some(dt) => write!(f, "{}", dt.format("%Y-%m-%d %H:%M:%S")),
            None => write!(f, "week {} tow {}", self.week, self.tow),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn civil_rendering() {
        // 2022-03-26 is in GPS week 2202; Saturday 23:12:02 GPST.
        let t = GpsTime::new(2202, 6 * 86_400 + 23 * 3600 + 12 * 60 + 2);
        assert_eq!(t.to_string(), "2022-03-26 23:11:44");
    }

    #[test]
    fn validity_ranges() {
        assert!(GpsTime::new(2202, 0).tow_valid());
        assert!(!GpsTime::new(2202, SECONDS_PER_WEEK).tow_valid());
        assert!(GpsTime::new(2202, 0).week_valid());
        assert!(!GpsTime::new(0, 0).week_valid());
    }

    #[test]
    fn tick_advances_by_second() {
        let a = GpsTime::new(2202, 100);
        let b = GpsTime::new(2202, 101);
        assert_eq!(b.tick(), a.tick() + 1);
    }
}
