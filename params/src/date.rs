use std::fmt;

use chrono::{Datelike, Days, NaiveDate};

use crate::Value;

/// Start of GPS time: 1980-01-06, a Sunday.
const GPS_EPOCH: (i32, u32, u32) = (1980, 1, 6);
/// Day zero of the modified julian date.
const MJD_EPOCH: (i32, u32, u32) = (1858, 11, 17);

/// A calendar date that knows the GNSS naming fields campaign files are
/// usually built from (`{date.gpsweek}`, `{date.doy:03d}` and so on).
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct GpsDate(NaiveDate);

impl GpsDate {
    pub fn new(date: NaiveDate) -> Self {
        Self(date)
    }

    /// None if the given day doesn't exist.
    pub fn from_ymd(year: i32, month: u32, day: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, day).map(Self)
    }

    /// Every day from `beg` to `end`, inclusive. Empty if `end` is before `beg`.
    pub fn range(beg: Self, end: Self) -> Vec<Self> {
        let len = (end.0 - beg.0).num_days().max(-1) + 1;
        let mut dates = Vec::with_capacity(len as usize);
        let mut day = beg.0;
        while day <= end.0 {
            dates.push(Self(day));
            match day.checked_add_days(Days::new(1)) {
                Some(next) => day = next,
                None => break,
            }
        }
        dates
    }

    pub fn date(&self) -> NaiveDate {
        self.0
    }

    /// Day of year, starting at 1.
    pub fn doy(&self) -> u32 {
        self.0.ordinal()
    }

    pub fn gps_week(&self) -> i64 {
        days_since(self.0, GPS_EPOCH).div_euclid(7)
    }

    /// Day of the GPS week, 0 (Sunday) through 6 (Saturday).
    pub fn gps_weekday(&self) -> i64 {
        days_since(self.0, GPS_EPOCH).rem_euclid(7)
    }

    pub fn mjd(&self) -> i64 {
        days_since(self.0, MJD_EPOCH)
    }

    /// Named fields usable in `{name.attr}` placeholders.
    #[rustfmt::skip]
    pub fn attr(&self, name: &str) -> Option<Value> {
        let val = match name {
            "year"                => i64::from(self.0.year()),
            "yy"                  => i64::from(self.0.year().rem_euclid(100)),
            "month"               => i64::from(self.0.month()),
            "day"                 => i64::from(self.0.day()),
            "doy"                 => i64::from(self.doy()),
            "gpsweek"             => self.gps_week(),
            "gpsweekday" | "dow"  => self.gps_weekday(),
            "mjd"                 => self.mjd(),
            _ => return None,
        };
        Some(Value::Int(val))
    }
}

fn days_since(date: NaiveDate, (y, m, d): (i32, u32, u32)) -> i64 {
    // epochs are constant, valid dates:
    let epoch = NaiveDate::from_ymd_opt(y, m, d).unwrap_or_default();
    (date - epoch).num_days()
}

impl fmt::Display for GpsDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d"))
    }
}

impl From<NaiveDate> for GpsDate {
    fn from(date: NaiveDate) -> Self {
        Self(date)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> GpsDate {
        GpsDate::from_ymd(y, m, d).unwrap()
    }

    #[test]
    fn test_gps_fields() {
        let d = date(2024, 1, 1);
        assert_eq!(d.gps_week(), 2295);
        assert_eq!(d.gps_weekday(), 1);
        assert_eq!(d.mjd(), 60310);
        assert_eq!(d.doy(), 1);

        let epoch = date(1980, 1, 6);
        assert_eq!((epoch.gps_week(), epoch.gps_weekday()), (0, 0));

        let before = date(1980, 1, 5);
        assert_eq!((before.gps_week(), before.gps_weekday()), (-1, 6));
    }

    #[test]
    fn test_attrs() {
        let d = date(2023, 12, 31);
        assert_eq!(d.attr("yy"), Some(Value::Int(23)));
        assert_eq!(d.attr("doy"), Some(Value::Int(365)));
        assert_eq!(d.attr("dow"), Some(Value::Int(0)));
        assert_eq!(d.attr("century"), None);
        assert_eq!(d.to_string(), "2023-12-31");
    }

    #[test]
    fn test_range() {
        let days = GpsDate::range(date(2024, 2, 28), date(2024, 3, 1));
        assert_eq!(days, [date(2024, 2, 28), date(2024, 2, 29), date(2024, 3, 1)]);
        assert!(GpsDate::range(date(2024, 3, 1), date(2024, 2, 28)).is_empty());
    }
}
