//! Primitive scanners shared by every extraction engine: numeric coercion,
//! backward row scans for "the amount in this row", and labeled pattern
//! matches against free text.

use regex::RegexBuilder;

use crate::schema::CellValue;

/// Strip `$` and thousands separators, trim, parse as decimal. A value that
/// fails to parse becomes 0 rather than raising; parenthesized amounts are
/// treated as negatives per accounting-export convention.
pub fn coerce_str(raw: &str) -> f64 {
    let s = raw.replace(',', "").replace('$', "");
    let s = s.trim();
    if let Some(inner) = s.strip_prefix('(').and_then(|v| v.strip_suffix(')')) {
        return -inner.trim().parse::<f64>().unwrap_or(0.0);
    }
    s.parse().unwrap_or(0.0)
}

pub fn coerce_number(cell: &CellValue) -> f64 {
    match cell {
        CellValue::Number(n) => *n,
        CellValue::Text(s) => coerce_str(s),
        CellValue::Empty => 0.0,
    }
}

/// Like `coerce_number` but distinguishes "not a number" from a literal
/// zero, so positional column capture can skip label cells.
pub fn try_coerce(cell: &CellValue) -> Option<f64> {
    match cell {
        CellValue::Number(n) => Some(*n),
        CellValue::Text(s) => {
            let cleaned = s.replace(',', "").replace('$', "");
            let cleaned = cleaned.trim();
            if let Some(inner) = cleaned
                .strip_prefix('(')
                .and_then(|v| v.strip_suffix(')'))
            {
                return inner.trim().parse::<f64>().ok().map(|v| -v);
            }
            cleaned.parse().ok()
        }
        CellValue::Empty => None,
    }
}

/// Scans the row from the last cell backward and returns the first value
/// whose magnitude exceeds `floor`. The floor biases the scan away from
/// incidental small integers (column indices, line numbers). Returns 0 when
/// nothing qualifies; callers must treat that as "not found", not as a
/// legitimate zero amount.
pub fn currency_like_value(row: &[CellValue], floor: f64) -> f64 {
    for cell in row.iter().rev() {
        let value = coerce_number(cell);
        if value.abs() > floor {
            return value;
        }
    }
    0.0
}

/// Backward scan for the first strictly-positive value inside `(min, max)`.
/// Used for bounded fields like mil rate or pupil count, where an
/// out-of-range hit is almost certainly a mis-scanned total.
pub fn bounded_number(row: &[CellValue], min: f64, max: f64) -> f64 {
    for cell in row.iter().rev() {
        let value = coerce_number(cell);
        if value > 0.0 && value > min && value < max {
            return value;
        }
    }
    0.0
}

/// Flattens a row to a single text line for keyword tests.
pub fn row_text(row: &[CellValue]) -> String {
    row.iter()
        .map(|c| c.to_text())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Case-insensitive regex match; returns the capture groups as owned
/// strings (empty vec when the pattern has no groups). `None` means the
/// pattern did not match at all.
pub fn label_match(text: &str, pattern: &str) -> Option<Vec<String>> {
    let re = RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .ok()?;
    let caps = re.captures(text)?;
    Some(
        (1..caps.len())
            .map(|i| {
                caps.get(i)
                    .map(|m| m.as_str().to_string())
                    .unwrap_or_default()
            })
            .collect(),
    )
}

/// First capture group of a case-insensitive match, trimmed.
pub fn label_value(text: &str, pattern: &str) -> Option<String> {
    label_match(text, pattern)
        .and_then(|groups| groups.into_iter().next())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// First capture group coerced to a number; 0 when the pattern misses.
pub fn label_amount(text: &str, pattern: &str) -> f64 {
    label_value(text, pattern)
        .map(|s| coerce_str(&s))
        .unwrap_or(0.0)
}
