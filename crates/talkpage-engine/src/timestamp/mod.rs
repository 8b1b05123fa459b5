//! Timestamp codec.
//!
//! Parses and formats timestamps against the wiki's configured token grammar,
//! locale names and timezone. The parse regex is composed once from the
//! format string; matched groups are read back positionally.

pub mod grammar;
pub mod timezone;

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, Timelike, Utc};
use regex::{Captures, Regex};
use talkpage_config::{LocaleMessages, SiteConfig};

use crate::context::ContextError;
pub use grammar::{DateToken, FormatItem, tokenize};
pub use timezone::Timezone;

/// Years in the Thai solar calendar run this far ahead of the Gregorian ones.
const THAI_YEAR_OFFSET: i32 = 543;

/// A successfully parsed timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedTimestamp {
    pub date: DateTime<Utc>,
    /// The whole match followed by every capture group, in order.
    pub match_groups: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatStyle {
    /// The wiki's own signature format.
    Default,
    /// Today / yesterday / this year / older, each with its own pattern.
    Improved,
    /// A coarse "N units ago" duration.
    Relative,
}

#[derive(Debug, Clone)]
pub struct TimestampCodec {
    tokens: Vec<DateToken>,
    items: Vec<FormatItem>,
    parse_regex: Regex,
    content_regex: Regex,
    digits: Option<Vec<char>>,
    messages: LocaleMessages,
    timezone: Timezone,
    label: Option<String>,
}

impl TimestampCodec {
    pub fn new(config: &SiteConfig) -> Result<Self, ContextError> {
        let timezone = Timezone::parse(&config.timezone)
            .ok_or_else(|| ContextError::UnknownTimezone(config.timezone.clone()))?;

        let digits = match &config.digits {
            Some(d) => {
                let chars: Vec<char> = d.chars().collect();
                if chars.len() != 10 {
                    return Err(ContextError::InvalidDigits(d.clone()));
                }
                Some(chars)
            }
            None => None,
        };

        let messages = config.messages.clone();
        check_names(&messages)?;

        let items = tokenize(&config.date_format);
        let tokens: Vec<DateToken> = items
            .iter()
            .filter_map(|item| match item {
                FormatItem::Token(t) => Some(*t),
                FormatItem::Literal(_) => None,
            })
            .collect();
        if tokens.is_empty() {
            return Err(ContextError::InvalidDateFormat(config.date_format.clone()));
        }

        let date_pattern = date_pattern(&items, digits.as_deref(), &messages);
        let label_pattern = match (&config.timezone_label, timezone) {
            (Some(label), _) => format!("{}|UTC", regex::escape(label)),
            (None, Timezone::Utc) => "UTC".to_string(),
            (None, Timezone::Offset(_)) => r"UTC(?:[+-]\d{1,2}(?::\d{2})?)?".to_string(),
            (None, Timezone::Named(_)) => r"UTC|[A-Za-z]{2,6}|[+-]\d{2,4}".to_string(),
        };

        let parse_regex = Regex::new(&date_pattern).map_err(|source| ContextError::InvalidPattern {
            name: "timestamp",
            source,
        })?;
        let content_regex = Regex::new(&format!(r"{date_pattern} \((?:{label_pattern})\)"))
            .map_err(|source| ContextError::InvalidPattern {
                name: "content timestamp",
                source,
            })?;

        Ok(Self {
            tokens,
            items,
            parse_regex,
            content_regex,
            digits,
            messages,
            timezone,
            label: config.timezone_label.clone(),
        })
    }

    /// Matches a timestamp followed by the timezone label in parentheses, as
    /// found at the end of signatures.
    pub fn content_regex(&self) -> &Regex {
        &self.content_regex
    }

    /// Finds and parses the first timestamp in `text`.
    ///
    /// `timezone` overrides the configured zone. Field values are not range
    /// checked: a day of 32 rolls over into the next month.
    pub fn parse(&self, text: &str, timezone: Option<Timezone>) -> Option<ParsedTimestamp> {
        let caps = self.parse_regex.captures(text)?;
        let date = self.date_from_captures(&caps, timezone)?;
        let match_groups = caps
            .iter()
            .map(|m| m.map_or_else(String::new, |m| m.as_str().to_string()))
            .collect();
        Some(ParsedTimestamp { date, match_groups })
    }

    /// Builds the UTC instant from captures of [`Self::content_regex`] or the
    /// parse regex. Groups are read positionally in token order.
    pub fn date_from_captures(
        &self,
        caps: &Captures<'_>,
        timezone: Option<Timezone>,
    ) -> Option<DateTime<Utc>> {
        let mut year = None;
        let mut month = None;
        let mut day = None;
        let mut hour = None;
        let mut minute = None;

        for (i, token) in self.tokens.iter().enumerate() {
            let raw = caps.get(i + 1)?.as_str();
            match token {
                DateToken::DayPadded | DateToken::Day => day = Some(self.number(raw)?),
                DateToken::Month | DateToken::MonthPadded => month = Some(self.number(raw)?),
                DateToken::Year => year = Some(self.number(raw)?),
                DateToken::ThaiYear => year = Some(self.number(raw)? - i64::from(THAI_YEAR_OFFSET)),
                DateToken::Hour | DateToken::HourPadded => hour = Some(self.number(raw)?),
                DateToken::Minute => minute = Some(self.number(raw)?),
                DateToken::MonthName => month = name_index(&self.messages.months, raw),
                DateToken::MonthShort => month = name_index(&self.messages.months_short, raw),
                DateToken::MonthGenitive => {
                    month = name_index(&self.messages.months_genitive, raw)
                }
                DateToken::Weekday | DateToken::WeekdayShort => {}
            }
        }

        let local = lenient_datetime(year?, month?, day?, hour?, minute?)?;
        Some(timezone.unwrap_or(self.timezone).to_utc(local))
    }

    /// Formats `date` in the configured timezone.
    ///
    /// `now` anchors the improved and relative styles.
    pub fn format(
        &self,
        date: DateTime<Utc>,
        style: FormatStyle,
        add_timezone: bool,
        now: DateTime<Utc>,
    ) -> String {
        let mut out = match style {
            FormatStyle::Default => self.render(&self.items, date),
            FormatStyle::Improved => {
                let pattern = if same_day(date, now) {
                    &self.messages.improved_today
                } else if same_day(date, now - Duration::days(1)) {
                    &self.messages.improved_yesterday
                } else if date.year() == now.year() {
                    &self.messages.improved_this_year
                } else {
                    &self.messages.improved_older
                };
                self.render(&tokenize(pattern), date)
            }
            FormatStyle::Relative => return self.relative(date, now),
        };

        if add_timezone {
            out.push_str(" (");
            out.push_str(&self.timezone_label(date));
            out.push(')');
        }
        out
    }

    pub fn timezone_label(&self, date: DateTime<Utc>) -> String {
        self.label
            .clone()
            .unwrap_or_else(|| self.timezone.label(date))
    }

    fn render(&self, items: &[FormatItem], date: DateTime<Utc>) -> String {
        let local = self.timezone.to_local(date);
        let month0 = local.month0() as usize;
        let weekday0 = local.weekday().num_days_from_monday() as usize;

        let mut out = String::new();
        for item in items {
            let token = match item {
                FormatItem::Literal(text) => {
                    out.push_str(text);
                    continue;
                }
                FormatItem::Token(token) => *token,
            };
            let piece = match token {
                DateToken::DayPadded => format!("{:02}", local.day()),
                DateToken::Day => local.day().to_string(),
                DateToken::Month => local.month().to_string(),
                DateToken::MonthPadded => format!("{:02}", local.month()),
                DateToken::Year => local.year().to_string(),
                DateToken::ThaiYear => (local.year() + THAI_YEAR_OFFSET).to_string(),
                DateToken::Hour => local.hour().to_string(),
                DateToken::HourPadded => format!("{:02}", local.hour()),
                DateToken::Minute => format!("{:02}", local.minute()),
                DateToken::WeekdayShort => self.messages.weekdays_short[weekday0].clone(),
                DateToken::Weekday => self.messages.weekdays[weekday0].clone(),
                DateToken::MonthShort => self.messages.months_short[month0].clone(),
                DateToken::MonthName => self.messages.months[month0].clone(),
                DateToken::MonthGenitive => self.messages.months_genitive[month0].clone(),
            };
            if token.is_numeric() {
                out.push_str(&self.localize_digits(&piece));
            } else {
                out.push_str(&piece);
            }
        }
        out
    }

    fn relative(&self, date: DateTime<Utc>, now: DateTime<Utc>) -> String {
        let seconds = (now - date).num_seconds();
        if seconds < 60 {
            return self.messages.just_now.clone();
        }

        let minutes = seconds / 60;
        let hours = minutes / 60;
        let days = hours / 24;
        let units = &self.messages.units;
        let (count, names) = if minutes < 60 {
            (minutes, &units.minute)
        } else if hours < 24 {
            (hours, &units.hour)
        } else if days < 30 {
            (days, &units.day)
        } else if days < 365 {
            (days / 30, &units.month)
        } else {
            (days / 365, &units.year)
        };
        let unit = if count == 1 { &names.0 } else { &names.1 };
        let duration = format!("{} {unit}", self.localize_digits(&count.to_string()));
        self.messages.relative_ago.replace("{duration}", &duration)
    }

    fn localize_digits(&self, ascii: &str) -> String {
        match &self.digits {
            Some(digits) => ascii
                .chars()
                .map(|c| c.to_digit(10).map_or(c, |d| digits[d as usize]))
                .collect(),
            None => ascii.to_string(),
        }
    }

    fn number(&self, raw: &str) -> Option<i64> {
        let ascii: String = raw
            .chars()
            .map(|c| match &self.digits {
                Some(digits) => digits
                    .iter()
                    .position(|&d| d == c)
                    .and_then(|p| char::from_digit(p as u32, 10))
                    .unwrap_or(c),
                None => c,
            })
            .collect();
        ascii.parse().ok()
    }
}

fn check_names(messages: &LocaleMessages) -> Result<(), ContextError> {
    let tables = [
        ("months", &messages.months, 12),
        ("months_genitive", &messages.months_genitive, 12),
        ("months_short", &messages.months_short, 12),
        ("weekdays", &messages.weekdays, 7),
        ("weekdays_short", &messages.weekdays_short, 7),
    ];
    for (name, table, expected) in tables {
        if table.len() != expected {
            return Err(ContextError::InvalidMessages {
                name,
                expected,
                found: table.len(),
            });
        }
    }
    Ok(())
}

fn date_pattern(items: &[FormatItem], digits: Option<&[char]>, messages: &LocaleMessages) -> String {
    let digit_class = match digits {
        Some(digits) => {
            let extra: String = digits.iter().map(|d| regex::escape(&d.to_string())).collect();
            format!("[0-9{extra}]")
        }
        None => "[0-9]".to_string(),
    };

    let mut pattern = String::new();
    for item in items {
        match item {
            FormatItem::Literal(text) => pattern.push_str(&regex::escape(text)),
            FormatItem::Token(token) => {
                let group = match token {
                    DateToken::DayPadded
                    | DateToken::MonthPadded
                    | DateToken::HourPadded
                    | DateToken::Minute => format!("({digit_class}{{2}})"),
                    DateToken::Day | DateToken::Month | DateToken::Hour => {
                        format!("({digit_class}{{1,2}})")
                    }
                    DateToken::Year | DateToken::ThaiYear => format!("({digit_class}{{4}})"),
                    DateToken::MonthName => alternation(&messages.months),
                    DateToken::MonthShort => alternation(&messages.months_short),
                    DateToken::MonthGenitive => alternation(&messages.months_genitive),
                    DateToken::Weekday => alternation(&messages.weekdays),
                    DateToken::WeekdayShort => alternation(&messages.weekdays_short),
                };
                pattern.push_str(&group);
            }
        }
    }
    pattern
}

/// A capture group matching any of `names`, longest first so that a name is
/// never cut short by one of its prefixes.
fn alternation(names: &[String]) -> String {
    let mut sorted: Vec<&String> = names.iter().collect();
    sorted.sort_by_key(|name| std::cmp::Reverse(name.chars().count()));
    sorted.dedup();
    let alternatives: Vec<String> = sorted.iter().map(|name| regex::escape(name)).collect();
    format!("({})", alternatives.join("|"))
}

fn name_index(names: &[String], raw: &str) -> Option<i64> {
    names
        .iter()
        .position(|name| name == raw)
        .map(|i| i as i64 + 1)
}

/// Builds a wall-clock time, rolling overflowing fields into larger units the
/// way lenient date arithmetic does (month 13 is January of the next year,
/// day 0 is the last day of the previous month).
fn lenient_datetime(year: i64, month: i64, day: i64, hour: i64, minute: i64) -> Option<NaiveDateTime> {
    let month0 = month - 1;
    let year = i32::try_from(year + month0.div_euclid(12)).ok()?;
    let month = u32::try_from(month0.rem_euclid(12) + 1).ok()?;
    let base = NaiveDate::from_ymd_opt(year, month, 1)?.and_hms_opt(0, 0, 0)?;
    base.checked_add_signed(Duration::days(day - 1))?
        .checked_add_signed(Duration::hours(hour))?
        .checked_add_signed(Duration::minutes(minute))
}

fn same_day(a: DateTime<Utc>, b: DateTime<Utc>) -> bool {
    a.date_naive() == b.date_naive()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rstest::rstest;

    fn codec() -> TimestampCodec {
        TimestampCodec::new(&SiteConfig::default()).unwrap()
    }

    fn codec_with(edit: impl FnOnce(&mut SiteConfig)) -> TimestampCodec {
        let mut config = SiteConfig::default();
        edit(&mut config);
        TimestampCodec::new(&config).unwrap()
    }

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    // ============ Parsing ============

    #[test]
    fn parses_english_signature_timestamp_in_utc() {
        let parsed = codec()
            .parse("23:29, 10 May 2019 (UTC)", Some(Timezone::Utc))
            .unwrap();

        assert_eq!(parsed.date, utc(2019, 5, 10, 23, 29));
        assert_eq!(parsed.date.to_rfc3339(), "2019-05-10T23:29:00+00:00");
        assert_eq!(
            parsed.match_groups,
            vec!["23:29, 10 May 2019", "23", "29", "10", "May", "2019"]
        );
    }

    #[test]
    fn finds_timestamp_inside_longer_text() {
        let parsed = codec()
            .parse("Agreed. [[User:Bob|Bob]] 08:05, 3 March 2021 (UTC)", None)
            .unwrap();
        assert_eq!(parsed.date, utc(2021, 3, 3, 8, 5));
    }

    #[test]
    fn returns_none_without_timestamp() {
        assert!(codec().parse("no date here", None).is_none());
    }

    #[test]
    fn day_overflow_rolls_into_next_month() {
        let parsed = codec_with(|c| c.date_format = "H:i, j n Y".into())
            .parse("10:00, 32 1 2024", None)
            .unwrap();
        assert_eq!(parsed.date, utc(2024, 2, 1, 10, 0));
    }

    #[test]
    fn explicit_offset_is_honoured() {
        let parsed = codec().parse("12:00, 1 June 2024", Some(Timezone::Offset(-60))).unwrap();
        assert_eq!(parsed.date, utc(2024, 6, 1, 13, 0));
    }

    #[test]
    fn named_zone_resolved_at_the_instant() {
        let codec = codec_with(|c| c.timezone = "Europe/Berlin".into());
        let winter = codec.parse("12:00, 15 January 2024 (CET)", None).unwrap();
        let summer = codec.parse("12:00, 15 July 2024 (CEST)", None).unwrap();

        assert_eq!(winter.date, utc(2024, 1, 15, 11, 0));
        assert_eq!(summer.date, utc(2024, 7, 15, 10, 0));
    }

    #[test]
    fn thai_year_subtracts_offset() {
        let parsed = codec_with(|c| c.date_format = "H:i, j F xkY".into())
            .parse("09:30, 2 January 2567", None)
            .unwrap();
        assert_eq!(parsed.date, utc(2024, 1, 2, 9, 30));
    }

    #[test]
    fn genitive_month_names() {
        let codec = codec_with(|c| {
            c.date_format = "H:i, j xg Y".into();
            c.messages.months_genitive = [
                "января", "февраля", "марта", "апреля", "мая", "июня", "июля", "августа",
                "сентября", "октября", "ноября", "декабря",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect();
        });
        let parsed = codec.parse("14:07, 9 мая 2023", None).unwrap();
        assert_eq!(parsed.date, utc(2023, 5, 9, 14, 7));
    }

    #[test]
    fn transliterated_digits() {
        let codec = codec_with(|c| {
            c.date_format = "H:i, j n Y".into();
            c.digits = Some("०१२३४५६७८९".into());
        });
        let parsed = codec.parse("१०:०५, ३ ४ २०२२", None).unwrap();
        assert_eq!(parsed.date, utc(2022, 4, 3, 10, 5));
    }

    #[test]
    fn content_regex_requires_label() {
        let codec = codec();
        assert!(codec.content_regex().is_match("10:00, 1 January 2024 (UTC)"));
        assert!(!codec.content_regex().is_match("10:00, 1 January 2024"));
    }

    // ============ Formatting ============

    #[test]
    fn default_format_with_timezone() {
        let date = utc(2019, 5, 10, 23, 29);
        let out = codec().format(date, FormatStyle::Default, true, date);
        insta::assert_snapshot!(out, @"23:29, 10 May 2019 (UTC)");
    }

    #[test]
    fn default_format_round_trips_through_parse() {
        let codec = codec_with(|c| c.timezone = "America/New_York".into());
        let date = utc(2024, 3, 20, 18, 45);
        let text = codec.format(date, FormatStyle::Default, true, date);

        assert_eq!(text, "14:45, 20 March 2024 (EDT)");
        assert_eq!(codec.parse(&text, None).unwrap().date, date);
    }

    #[test]
    fn format_localizes_digits() {
        let codec = codec_with(|c| {
            c.date_format = "H:i".into();
            c.digits = Some("٠١٢٣٤٥٦٧٨٩".into());
        });
        let date = utc(2024, 1, 1, 9, 7);
        assert_eq!(codec.format(date, FormatStyle::Default, false, date), "٠٩:٠٧");
    }

    #[test]
    fn weekday_tokens() {
        let codec = codec_with(|c| c.date_format = "D, l".into());
        let date = utc(2024, 1, 1, 0, 0);
        assert_eq!(codec.format(date, FormatStyle::Default, false, date), "Mon, Monday");
    }

    #[rstest]
    #[case(utc(2024, 6, 10, 8, 0), "Today, 08:00")]
    #[case(utc(2024, 6, 9, 23, 15), "Yesterday, 23:15")]
    #[case(utc(2024, 2, 1, 12, 0), "1 February, 12:00")]
    #[case(utc(2022, 2, 1, 12, 0), "1 February 2022, 12:00")]
    fn improved_buckets(#[case] date: DateTime<Utc>, #[case] expected: &str) {
        let now = utc(2024, 6, 10, 15, 0);
        assert_eq!(codec().format(date, FormatStyle::Improved, false, now), expected);
    }

    #[rstest]
    #[case(30, "just now")]
    #[case(-5, "just now")]
    #[case(60, "1 minute ago")]
    #[case(59 * 60 + 59, "59 minutes ago")]
    #[case(2 * 3600 + 3599, "2 hours ago")]
    #[case(86400 * 3, "3 days ago")]
    #[case(86400 * 65, "2 months ago")]
    #[case(86400 * 800, "2 years ago")]
    fn relative_rounds_down(#[case] seconds_ago: i64, #[case] expected: &str) {
        let now = utc(2024, 6, 10, 15, 0);
        let date = now - Duration::seconds(seconds_ago);
        assert_eq!(codec().format(date, FormatStyle::Relative, true, now), expected);
    }

    // ============ Construction ============

    #[test]
    fn rejects_unknown_timezone() {
        let mut config = SiteConfig::default();
        config.timezone = "Nowhere/Special".into();
        assert!(matches!(
            TimestampCodec::new(&config),
            Err(ContextError::UnknownTimezone(_))
        ));
    }

    #[test]
    fn rejects_short_digit_table() {
        let mut config = SiteConfig::default();
        config.digits = Some("0123".into());
        assert!(matches!(
            TimestampCodec::new(&config),
            Err(ContextError::InvalidDigits(_))
        ));
    }
}
