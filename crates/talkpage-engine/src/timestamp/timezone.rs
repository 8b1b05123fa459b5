use chrono::{DateTime, Duration, NaiveDateTime, Offset, TimeZone, Utc};
use chrono_tz::Tz;
use std::str::FromStr;

/// The zone timestamps on a wiki are written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timezone {
    Utc,
    /// Fixed offset in minutes east of UTC.
    Offset(i32),
    /// A zone from the timezone database.
    Named(Tz),
}

impl Timezone {
    /// Parses `UTC`, a signed minute offset (`+120`, `-300`) or an IANA zone name.
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        if value.eq_ignore_ascii_case("UTC") {
            return Some(Self::Utc);
        }
        if let Ok(minutes) = value.parse::<i32>() {
            return Some(Self::Offset(minutes));
        }
        Tz::from_str(value).ok().map(Self::Named)
    }

    /// Converts wall-clock fields written in this zone to a UTC instant.
    ///
    /// For named zones the offset is looked up at the instant the wall-clock
    /// fields would denote if they were UTC.
    pub fn to_utc(self, local: NaiveDateTime) -> DateTime<Utc> {
        match self {
            Self::Utc => local.and_utc(),
            Self::Offset(minutes) => (local - Duration::minutes(i64::from(minutes))).and_utc(),
            Self::Named(tz) => {
                let offset = tz
                    .offset_from_utc_datetime(&local)
                    .fix()
                    .local_minus_utc();
                (local - Duration::seconds(i64::from(offset))).and_utc()
            }
        }
    }

    /// Wall-clock fields of `date` in this zone.
    pub fn to_local(self, date: DateTime<Utc>) -> NaiveDateTime {
        match self {
            Self::Utc => date.naive_utc(),
            Self::Offset(minutes) => date.naive_utc() + Duration::minutes(i64::from(minutes)),
            Self::Named(tz) => date.with_timezone(&tz).naive_local(),
        }
    }

    /// The label written in parentheses after a timestamp.
    pub fn label(self, date: DateTime<Utc>) -> String {
        match self {
            Self::Utc => "UTC".to_string(),
            Self::Offset(0) => "UTC".to_string(),
            Self::Offset(minutes) => {
                let sign = if minutes < 0 { '-' } else { '+' };
                let (hours, rest) = (minutes.abs() / 60, minutes.abs() % 60);
                if rest == 0 {
                    format!("UTC{sign}{hours}")
                } else {
                    format!("UTC{sign}{hours}:{rest:02}")
                }
            }
            Self::Named(tz) => date.with_timezone(&tz).format("%Z").to_string(),
        }
    }
}
