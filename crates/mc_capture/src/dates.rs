//! Conversion of the date strings found on news pages into UTC timestamps.
//!
//! Shapes are tried in a fixed order, so the same input always produces the
//! same result:
//!
//! 1. structured-locale: `21 outubro 2013 | 22h 14` or `21 outubro 2013 | 22:14`,
//!    month names looked up in a [`LocaleTable`]
//! 2. offset-annotated: `Seg, 21 Out 2013 22:14:36 -0200`
//! 3. numeric: `21/10/2013 às 22h14`
//! 4. RFC 3339, as found in `article:published_time` meta tags
//!
//! Timestamps without an offset are read in the normalizer's local offset
//! (UTC unless configured otherwise). Nothing here panics or returns an
//! error to the caller: a string no shape accepts yields `None` and one
//! logged date-format failure.

use chrono::{DateTime, Duration, FixedOffset, NaiveDateTime, Offset, TimeZone, Utc};
use mc_core::{Error, Result};

use crate::logging::{ErrorKind, RunLogger};

/// Immutable lookup from localized month names to the canonical English
/// abbreviation understood by `%b`. Extend a locale by adding entries.
#[derive(Debug, Clone, Copy)]
pub struct LocaleTable {
    entries: &'static [(&'static str, &'static str)],
}

impl LocaleTable {
    pub const fn new(entries: &'static [(&'static str, &'static str)]) -> Self {
        Self { entries }
    }

    /// Case-insensitive; a trailing `.` (as in `out.`) is ignored.
    pub fn lookup(&self, name: &str) -> Option<&'static str> {
        let name = name.trim_end_matches('.').to_lowercase();
        self.entries
            .iter()
            .find(|(localized, _)| *localized == name)
            .map(|(_, canonical)| *canonical)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

pub const PT_MONTHS: LocaleTable = LocaleTable::new(&[
    ("janeiro", "Jan"),
    ("fevereiro", "Feb"),
    ("março", "Mar"),
    ("abril", "Apr"),
    ("maio", "May"),
    ("junho", "Jun"),
    ("julho", "Jul"),
    ("agosto", "Aug"),
    ("setembro", "Sep"),
    ("outubro", "Oct"),
    ("novembro", "Nov"),
    ("dezembro", "Dec"),
]);

/// Abbreviated month names seen in feed-style dates, Portuguese and English.
pub const MONTH_ABBREVIATIONS: LocaleTable = LocaleTable::new(&[
    ("jan", "Jan"),
    ("fev", "Feb"),
    ("feb", "Feb"),
    ("mar", "Mar"),
    ("abr", "Apr"),
    ("apr", "Apr"),
    ("mai", "May"),
    ("may", "May"),
    ("jun", "Jun"),
    ("jul", "Jul"),
    ("ago", "Aug"),
    ("aug", "Aug"),
    ("set", "Sep"),
    ("sep", "Sep"),
    ("out", "Oct"),
    ("oct", "Oct"),
    ("nov", "Nov"),
    ("dez", "Dec"),
    ("dec", "Dec"),
]);

const STRUCTURED_TEMPLATE: &str = "%d-%b-%Y-%H-%M";
const OFFSET_TEMPLATE: &str = "%d-%b-%Y-%H:%M:%S";
const NUMERIC_TEMPLATE: &str = "%d/%m/%Y às %Hh%M";

/// Where the clock sits in a structured-locale date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockLayout {
    /// `DD month YYYY | HHh MM`: hour from the first two characters of the
    /// fifth token, minutes from the sixth
    Split,
    /// `DD month YYYY | HH:MM`: both from the fifth token
    Joined,
}

/// A date string as extracted from a page, with the clock layout the page
/// is known to use, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawDate {
    pub text: String,
    pub layout: Option<ClockLayout>,
}

impl RawDate {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            layout: None,
        }
    }

    pub fn with_layout(text: impl Into<String>, layout: ClockLayout) -> Self {
        Self {
            text: text.into(),
            layout: Some(layout),
        }
    }
}

/// Subtract a UTC offset from a wall-clock time. Years near the edge of
/// the representable range fail instead of overflowing.
fn shift_to_utc(raw: &str, naive: NaiveDateTime, offset_seconds: i64) -> Result<DateTime<Utc>> {
    naive
        .checked_sub_signed(Duration::seconds(offset_seconds))
        .map(|utc| Utc.from_utc_datetime(&utc))
        .ok_or_else(|| Error::date_format(raw, "offset out of range"))
}

fn token<'a>(tokens: &[&'a str], index: usize) -> Result<&'a str> {
    tokens
        .get(index)
        .copied()
        .ok_or_else(|| Error::date_format(&tokens.join(" "), format!("missing token {}", index)))
}

fn slice<'a>(raw: &str, token: &'a str, range: std::ops::Range<usize>) -> Result<&'a str> {
    token
        .get(range)
        .ok_or_else(|| Error::date_format(raw, format!("token {:?} too short", token)))
}

#[derive(Debug, Clone)]
pub struct DateNormalizer {
    months: LocaleTable,
    abbreviations: LocaleTable,
    local_offset: FixedOffset,
    logger: RunLogger,
}

impl DateNormalizer {
    pub fn new(logger: RunLogger) -> Self {
        Self {
            months: PT_MONTHS,
            abbreviations: MONTH_ABBREVIATIONS,
            local_offset: Utc.fix(),
            logger,
        }
    }

    /// Offset used for timestamps that do not carry one.
    pub fn with_local_offset(mut self, offset: FixedOffset) -> Self {
        self.local_offset = offset;
        self
    }

    fn local_to_utc(&self, raw: &str, naive: NaiveDateTime) -> Result<DateTime<Utc>> {
        shift_to_utc(raw, naive, i64::from(self.local_offset.local_minus_utc()))
    }

    /// Structured-locale shape: tokenize, translate the month, reassemble
    /// into `DD-Mon-YYYY-HH-MM` and parse strictly.
    pub fn parse_structured(&self, raw: &str, layout: ClockLayout) -> Result<DateTime<Utc>> {
        let tokens: Vec<&str> = raw.split_whitespace().collect();
        let day = token(&tokens, 0)?;
        let month_name = token(&tokens, 1)?;
        let month = self
            .months
            .lookup(month_name)
            .ok_or_else(|| Error::date_format(raw, format!("unknown month {:?}", month_name)))?;
        let year = token(&tokens, 2)?;

        let (hour, minute) = match layout {
            ClockLayout::Split => (slice(raw, token(&tokens, 4)?, 0..2)?, token(&tokens, 5)?),
            ClockLayout::Joined => {
                let clock = token(&tokens, 4)?;
                (slice(raw, clock, 0..2)?, slice(raw, clock, 3..5)?)
            }
        };

        let assembled = [day, month, year, hour, minute].join("-");
        let naive = NaiveDateTime::parse_from_str(&assembled, STRUCTURED_TEMPLATE)
            .map_err(|e| Error::date_format(raw, format!("{:?} does not match template: {}", assembled, e)))?;
        self.local_to_utc(raw, naive)
    }

    /// Offset-annotated shape, e.g. `Seg, 21 Out 2013 22:14:36 -0200`. The
    /// leading weekday is optional and not checked against the date.
    pub fn parse_offset_annotated(&self, raw: &str) -> Result<DateTime<Utc>> {
        let mut tokens: Vec<&str> = raw.split_whitespace().collect();
        if tokens.first().map_or(false, |t| t.ends_with(',')) {
            tokens.remove(0);
        }
        if tokens.len() != 5 {
            return Err(Error::date_format(raw, format!("expected 5 fields, found {}", tokens.len())));
        }

        let month = self
            .abbreviations
            .lookup(tokens[1])
            .ok_or_else(|| Error::date_format(raw, format!("unknown month {:?}", tokens[1])))?;
        let assembled = format!("{}-{}-{}-{}", tokens[0], month, tokens[2], tokens[3]);
        let naive = NaiveDateTime::parse_from_str(&assembled, OFFSET_TEMPLATE)
            .map_err(|e| Error::date_format(raw, format!("{:?} does not match template: {}", assembled, e)))?;

        let offset_seconds = Self::offset_seconds(raw, tokens[4])?;
        shift_to_utc(raw, naive, offset_seconds)
    }

    /// `±HHMM` to signed seconds; `GMT`, `UTC` and `Z` are zero.
    fn offset_seconds(raw: &str, offset: &str) -> Result<i64> {
        if matches!(offset, "GMT" | "UTC" | "Z") {
            return Ok(0);
        }
        let sign = match offset.chars().next() {
            Some('+') => 1,
            Some('-') => -1,
            _ => return Err(Error::date_format(raw, format!("offset {:?} has no sign", offset))),
        };
        let digits = offset.get(1..).unwrap_or_default();
        if digits.len() != 4 || !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err(Error::date_format(raw, format!("malformed offset {:?}", offset)));
        }
        let hours: i64 = digits[0..2]
            .parse()
            .map_err(|_| Error::date_format(raw, "offset hours"))?;
        let minutes: i64 = digits[2..4]
            .parse()
            .map_err(|_| Error::date_format(raw, "offset minutes"))?;
        Ok(sign * (hours * 3600 + minutes * 60))
    }

    pub fn parse_numeric(&self, raw: &str) -> Result<DateTime<Utc>> {
        let compact = raw.split_whitespace().collect::<Vec<_>>().join(" ");
        let naive = NaiveDateTime::parse_from_str(&compact, NUMERIC_TEMPLATE)
            .map_err(|e| Error::date_format(raw, format!("numeric shape: {}", e)))?;
        self.local_to_utc(raw, naive)
    }

    pub fn parse_iso(&self, raw: &str) -> Result<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| Error::date_format(raw, format!("iso shape: {}", e)))
    }

    /// Try every shape in order, starting with `preferred` when the page's
    /// layout is known. Returns the first success or the last failure.
    pub fn try_normalize(&self, raw: &str, preferred: Option<ClockLayout>) -> Result<DateTime<Utc>> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(Error::date_format(raw, "empty date string"));
        }

        let mut layouts = vec![ClockLayout::Split, ClockLayout::Joined];
        if let Some(preferred) = preferred {
            layouts.retain(|l| *l != preferred);
            layouts.insert(0, preferred);
        }

        let mut last = None;
        for layout in layouts {
            match self.parse_structured(raw, layout) {
                Ok(ts) => return Ok(ts),
                Err(e) => last = Some(e),
            }
        }
        let others: [fn(&Self, &str) -> Result<DateTime<Utc>>; 3] = [
            Self::parse_offset_annotated,
            Self::parse_numeric,
            Self::parse_iso,
        ];
        for parse in others {
            match parse(self, raw) {
                Ok(ts) => return Ok(ts),
                Err(e) => last = Some(e),
            }
        }
        Err(last.unwrap_or_else(|| Error::date_format(raw, "no shape matched")))
    }

    pub fn normalize(&self, raw: &str) -> Option<DateTime<Utc>> {
        self.normalize_with(raw, None)
    }

    pub fn normalize_raw(&self, raw: &RawDate) -> Option<DateTime<Utc>> {
        self.normalize_with(&raw.text, raw.layout)
    }

    fn normalize_with(&self, raw: &str, preferred: Option<ClockLayout>) -> Option<DateTime<Utc>> {
        match self.try_normalize(raw, preferred) {
            Ok(ts) => Some(ts),
            Err(e) => {
                self.logger.failure(ErrorKind::DateFormat, raw, &e.to_string());
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn normalizer() -> DateNormalizer {
        DateNormalizer::new(RunLogger::new())
    }

    fn utc(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn test_offset_arithmetic() {
        let ts = normalizer().normalize("Seg, 21 Out 2013 22:14:36 -0200").unwrap();
        assert_eq!(ts, utc("2013-10-22T00:14:36Z"));
    }

    #[test]
    fn test_positive_offset_and_english_names() {
        let ts = normalizer()
            .parse_offset_annotated("Mon, 21 Oct 2013 22:14:36 +0530")
            .unwrap();
        assert_eq!(ts, utc("2013-10-21T16:44:36Z"));
        let ts = normalizer()
            .parse_offset_annotated("21 Out 2013 22:14:36 GMT")
            .unwrap();
        assert_eq!(ts, utc("2013-10-21T22:14:36Z"));
    }

    #[test]
    fn test_structured_split_clock() {
        let ts = normalizer()
            .parse_structured("21 Outubro 2013 | 22h 14", ClockLayout::Split)
            .unwrap();
        assert_eq!(ts, utc("2013-10-21T22:14:00Z"));
    }

    #[test]
    fn test_structured_joined_clock() {
        let ts = normalizer()
            .parse_structured("  05 março 2014 | 09:30 ", ClockLayout::Joined)
            .unwrap();
        assert_eq!(ts, utc("2014-03-05T09:30:00Z"));
    }

    #[test]
    fn test_all_months_resolve() {
        assert_eq!(PT_MONTHS.len(), 12);
        let names = [
            "janeiro", "fevereiro", "março", "abril", "maio", "junho", "julho", "agosto",
            "setembro", "outubro", "novembro", "dezembro",
        ];
        for (i, name) in names.iter().enumerate() {
            let raw = format!("01 {} 2013 | 10:00", name);
            let ts = normalizer().parse_structured(&raw, ClockLayout::Joined).unwrap();
            assert_eq!(ts.format("%m").to_string(), format!("{:02}", i + 1), "{}", name);
        }
    }

    #[test]
    fn test_structured_failures() {
        let n = normalizer();
        assert!(n.parse_structured("21 brumário 2013 | 22:14", ClockLayout::Joined).is_err());
        assert!(n.parse_structured("21 outubro", ClockLayout::Joined).is_err());
        assert!(n.parse_structured("21 outubro 2013 | 22:14", ClockLayout::Split).is_err());
        assert!(n.parse_structured("32 outubro 2013 | 22:14", ClockLayout::Joined).is_err());
        assert!(n.parse_structured("21 outubro 2013 | 2", ClockLayout::Joined).is_err());
    }

    #[test]
    fn test_numeric_shape() {
        let ts = normalizer().normalize("21/10/2013 às 22h14").unwrap();
        assert_eq!(ts, utc("2013-10-21T22:14:00Z"));
    }

    #[test]
    fn test_iso_shape() {
        let ts = normalizer().normalize("2013-10-21T22:14:36-02:00").unwrap();
        assert_eq!(ts, utc("2013-10-22T00:14:36Z"));
    }

    #[test]
    fn test_local_offset_applies_to_naive_shapes() {
        let n = normalizer().with_local_offset(FixedOffset::west_opt(3 * 3600).unwrap());
        let ts = n.normalize("21 outubro 2013 | 22:14").unwrap();
        assert_eq!(ts, utc("2013-10-22T01:14:00Z"));
        // explicit offsets are unaffected
        let ts = n.normalize("Seg, 21 Out 2013 22:14:36 -0200").unwrap();
        assert_eq!(ts, utc("2013-10-22T00:14:36Z"));
    }

    #[test]
    fn test_preferred_layout_first() {
        let raw = RawDate::with_layout("21 outubro 2013 | 22h 14", ClockLayout::Split);
        assert_eq!(
            normalizer().normalize_raw(&raw),
            Some(utc("2013-10-21T22:14:00Z"))
        );
    }

    #[test]
    fn test_unparseable_is_none_and_logged() {
        let logger = RunLogger::new();
        let n = DateNormalizer::new(logger.clone());
        for raw in ["", "ontem à noite", "Seg, 21 Out 2013 22:14:36 0200", "Seg, 21 Xyz 2013 22:14:36 -0200"] {
            assert!(n.normalize(raw).is_none(), "{:?}", raw);
        }
        assert_eq!(logger.stats().date_format_errors, 4);
    }

    #[test]
    fn test_deterministic() {
        let n = normalizer();
        for raw in [
            "Seg, 21 Out 2013 22:14:36 -0200",
            "21 outubro 2013 | 22h 14",
            "not a date",
            "21/10/2013 às 22h14",
        ] {
            let first = n.normalize(raw);
            for _ in 0..5 {
                assert_eq!(n.normalize(raw), first);
            }
        }
    }

    #[test]
    fn test_non_ascii_token_does_not_panic() {
        // slicing by bytes must respect char boundaries
        assert!(normalizer()
            .parse_structured("21 outubro 2013 | çç:çç", ClockLayout::Joined)
            .is_err());
    }

    #[test]
    fn test_offset_at_edge_of_range_is_unparseable() {
        let logger = RunLogger::new();
        let n = DateNormalizer::new(logger.clone());
        assert!(n.normalize("Seg, 31 Dez +262142 23:59:59 -9959").is_none());
        assert!(n.normalize("Seg, 01 Jan -262143 00:00:00 +9959").is_none());
        assert_eq!(logger.stats().date_format_errors, 2);
        assert_eq!(
            n.normalize("Seg, 21 Out 2013 22:14:36 -0200"),
            Some(Utc.with_ymd_and_hms(2013, 10, 22, 0, 14, 36).unwrap())
        );
    }

    #[test]
    fn test_local_offset_at_edge_of_range_is_unparseable() {
        let n = normalizer().with_local_offset(FixedOffset::west_opt(3 * 3600).unwrap());
        assert!(n.parse_numeric("31/12/262143 às 23h59").is_err());
    }
}
