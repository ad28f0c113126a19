//! Entity comparison predicate

use std::cmp::Ordering;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use parley_core::EntityValue;

use crate::rules::Compare;

/// Operand of an ordering comparison
#[derive(Debug, Clone, Copy, PartialEq)]
enum Ordinal {
    Number(f64),
    Date(NaiveDateTime),
}

impl Ordinal {
    fn parse(value: &EntityValue) -> Option<Self> {
        let text = match value {
            EntityValue::Number(n) if n.is_finite() => return Some(Self::Number(*n)),
            EntityValue::Number(_) => return None,
            EntityValue::Text(text) => text.trim(),
        };

        if let Ok(n) = text.parse::<f64>() {
            return n.is_finite().then_some(Self::Number(n));
        }
        parse_date(text).map(Self::Date)
    }

    /// Numbers compare with numbers, dates with dates
    fn compare(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Self::Number(a), Self::Number(b)) => a.partial_cmp(b),
            (Self::Date(a), Self::Date(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }
}

/// ISO-8601 date or date-time (`2024-05-01`, `2024-05-01T10:00:00`, RFC 3339)
fn parse_date(text: &str) -> Option<NaiveDateTime> {
    if let Ok(date_time) = DateTime::parse_from_rfc3339(text) {
        return Some(date_time.naive_utc());
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(date_time) = NaiveDateTime::parse_from_str(text, format) {
            return Some(date_time);
        }
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
}

/// Empty bound means unbounded; unparseable bound fails closed
fn bound(value: Option<&EntityValue>) -> Result<Option<Ordinal>, ()> {
    match value {
        None => Ok(None),
        Some(value) if value.is_empty() => Ok(None),
        Some(value) => Ordinal::parse(value).map(Some).ok_or(()),
    }
}

fn ordered(value: &EntityValue, compare: &[EntityValue], accept: fn(Ordering) -> bool) -> bool {
    let Some(left) = Ordinal::parse(value) else {
        return false;
    };
    let Some(right) = compare.first().and_then(Ordinal::parse) else {
        return false;
    };
    left.compare(&right).map(accept).unwrap_or(false)
}

fn in_range(value: &EntityValue, compare: &[EntityValue]) -> bool {
    let Some(value) = Ordinal::parse(value) else {
        return false;
    };
    let (Ok(lower), Ok(upper)) = (bound(compare.first()), bound(compare.get(1))) else {
        return false;
    };

    let above = match lower {
        Some(lower) => matches!(value.compare(&lower), Some(Ordering::Greater | Ordering::Equal)),
        None => true,
    };
    let below = match upper {
        Some(upper) => matches!(value.compare(&upper), Some(Ordering::Less | Ordering::Equal)),
        None => true,
    };
    above && below
}

fn equals_any(value: &EntityValue, compare: &[EntityValue]) -> bool {
    let value = value.to_string();
    compare.iter().any(|candidate| candidate.to_string() == value)
}

/// Evaluate an entity expression against a value (`None` = entity absent)
///
/// - `eq` without values accepts any present entity
/// - `ne` without values accepts only an absent entity
/// - ordering operators fail closed on values that are neither numbers nor dates
pub fn evaluate(op: Compare, value: Option<&EntityValue>, compare: &[EntityValue]) -> bool {
    let Some(value) = value else {
        return op == Compare::Ne && compare.is_empty();
    };

    match op {
        Compare::Eq => compare.is_empty() || equals_any(value, compare),
        Compare::Ne => !compare.is_empty() && !equals_any(value, compare),
        Compare::Range => in_range(value, compare),
        Compare::Gt => ordered(value, compare, |o| o == Ordering::Greater),
        Compare::Gte => ordered(value, compare, |o| o != Ordering::Less),
        Compare::Lt => ordered(value, compare, |o| o == Ordering::Less),
        Compare::Lte => ordered(value, compare, |o| o != Ordering::Greater),
    }
}
