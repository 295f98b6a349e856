use std::cmp::Ordering;
use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

use crate::record::{Auxiliary, FieldValue, Record};
use crate::schema::{FieldKind, ValueSource};

/// Missing or unparseable dates sort as the earliest possible instant.
pub const EARLIEST: i64 = i64::MIN;

const DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

impl SortDirection {
    pub fn toggled(self) -> Self {
        match self {
            SortDirection::Ascending => SortDirection::Descending,
            SortDirection::Descending => SortDirection::Ascending,
        }
    }

    pub fn apply(self, ordering: Ordering) -> Ordering {
        match self {
            SortDirection::Ascending => ordering,
            SortDirection::Descending => ordering.reverse(),
        }
    }
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SortDirection::Ascending => f.write_str("▲"),
            SortDirection::Descending => f.write_str("▼"),
        }
    }
}

/// Locale-style collation. Base letters compare case-insensitively with
/// accents folded away, then unaccented before accented, then lowercase
/// before uppercase, then by code point so the order is total.
pub fn locale_compare(a: &str, b: &str) -> Ordering {
    base_letters(a)
        .cmp(base_letters(b))
        .then_with(|| accented(a).cmp(accented(b)))
        .then_with(|| a.chars().map(case_weight).cmp(b.chars().map(case_weight)))
        .then_with(|| a.cmp(b))
}

fn base_letters(s: &str) -> impl Iterator<Item = char> + '_ {
    accented(s).filter(|c| !is_combining_mark(*c))
}

fn accented(s: &str) -> impl Iterator<Item = char> + '_ {
    s.nfd().flat_map(char::to_lowercase)
}

fn case_weight(c: char) -> u8 {
    u8::from(c.is_uppercase())
}

pub fn parse_timestamp(value: &FieldValue) -> i64 {
    match value {
        FieldValue::Number(n) if n.is_finite() => *n as i64,
        FieldValue::Text(s) => parse_timestamp_str(s).unwrap_or(EARLIEST),
        _ => EARLIEST,
    }
}

fn parse_timestamp_str(s: &str) -> Option<i64> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.timestamp_millis());
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt.and_utc().timestamp_millis());
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc().timestamp_millis())
}

/// Pre-resolved comparison key, computed once per row before sorting.
#[derive(Debug, Clone, PartialEq)]
enum SortKey {
    Collated(String),
    // rank: 0 missing, 1 number, 2 unparseable text
    Numeric(u8, f64, String),
    Timestamp(i64),
    // Text and mixed fields: numeric only when both sides are numbers.
    Plain(Option<f64>, String),
}

fn sort_key(source: &ValueSource, record: &Record, aux: &Auxiliary) -> SortKey {
    match source {
        ValueSource::Derived(resolver) => SortKey::Collated(resolver.resolve(record, aux)),
        ValueSource::Field { name, kind } => {
            let value = record.get(name);
            match kind {
                FieldKind::Date => SortKey::Timestamp(parse_timestamp(value)),
                FieldKind::Number => numeric_key(value),
                FieldKind::Text | FieldKind::Mixed => plain_key(value),
            }
        }
    }
}

fn numeric_key(value: &FieldValue) -> SortKey {
    if value.is_missing() {
        return SortKey::Numeric(0, 0.0, String::new());
    }
    match value.as_number() {
        Some(n) => SortKey::Numeric(1, n, String::new()),
        None => SortKey::Numeric(2, 0.0, value.to_string()),
    }
}

fn plain_key(value: &FieldValue) -> SortKey {
    match value {
        FieldValue::Number(n) => SortKey::Plain(Some(*n), value.to_string()),
        other => SortKey::Plain(None, other.to_string()),
    }
}

fn compare_keys(a: &SortKey, b: &SortKey) -> Ordering {
    match (a, b) {
        (SortKey::Collated(x), SortKey::Collated(y)) => locale_compare(x, y),
        (SortKey::Timestamp(x), SortKey::Timestamp(y)) => x.cmp(y),
        (SortKey::Numeric(rx, x, sx), SortKey::Numeric(ry, y, sy)) => rx
            .cmp(ry)
            .then_with(|| x.total_cmp(y))
            .then_with(|| locale_compare(sx, sy)),
        (SortKey::Plain(Some(x), _), SortKey::Plain(Some(y), _)) => x.total_cmp(y),
        (SortKey::Plain(_, x), SortKey::Plain(_, y)) => locale_compare(x, y),
        // One source always yields one key variant.
        (x, y) => key_rank(x).cmp(&key_rank(y)),
    }
}

fn key_rank(key: &SortKey) -> u8 {
    match key {
        SortKey::Timestamp(_) => 0,
        SortKey::Numeric(..) => 1,
        SortKey::Plain(..) => 2,
        SortKey::Collated(_) => 3,
    }
}

/// Numbers and text in one column do not order transitively pair by pair
/// (9 < 10 numerically, but "10" < "5a" < "9"). Such a column is compared
/// as strings throughout.
fn stringify_mixed_columns(keyed: &mut [(usize, SortKey)]) {
    let has_number = keyed
        .iter()
        .any(|(_, key)| matches!(key, SortKey::Plain(Some(_), _)));
    let has_text = keyed
        .iter()
        .any(|(_, key)| matches!(key, SortKey::Plain(None, text) if !text.is_empty()));
    if has_number && has_text {
        for (_, key) in keyed.iter_mut() {
            if let SortKey::Plain(number, _) = key {
                *number = None;
            }
        }
    }
}

/// Ascending comparison of two records under `source`.
pub fn compare(source: &ValueSource, a: &Record, b: &Record, aux: &Auxiliary) -> Ordering {
    compare_keys(&sort_key(source, a, aux), &sort_key(source, b, aux))
}

/// Stable sort of `rows` (indices into `records`). Ties keep their incoming
/// relative order in both directions.
pub fn sort_rows(
    rows: Vec<usize>,
    records: &[Record],
    aux: &Auxiliary,
    source: &ValueSource,
    direction: SortDirection,
) -> Vec<usize> {
    let mut keyed: Vec<(usize, SortKey)> = rows
        .into_iter()
        .map(|idx| (idx, sort_key(source, &records[idx], aux)))
        .collect();
    stringify_mixed_columns(&mut keyed);
    keyed.sort_by(|(_, a), (_, b)| direction.apply(compare_keys(a, b)));
    keyed.into_iter().map(|(idx, _)| idx).collect()
}
