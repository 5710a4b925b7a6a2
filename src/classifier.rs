//! Report-dialect detection. Keyword and sheet-name signals are cheap, so
//! the decision order runs from exact dialect markers down to weak keyword
//! heuristics, first match wins. Evaluated once per document.

use log::debug;

use crate::error::{NormalizeError, Result};
use crate::scan::row_text;
use crate::schema::{Dialect, DialectHint, RawDocument, Sheet};

const ALLOCATION_MARKERS: &[&str] = &[
    "ed279",
    "essential programs and services",
    "eps allocation",
    "state subsidy",
    "operating allocation",
];

const STAFFING_MARKERS: &[&str] = &["fte", "staffing", "position", "employee"];

fn sheet_text_lower(sheet: &Sheet) -> String {
    sheet
        .rows
        .iter()
        .map(|row| row_text(row))
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Decides which extraction engine applies. An explicit hint bypasses
/// detection unconditionally.
pub fn detect_dialect(doc: &RawDocument, hint: DialectHint) -> Result<Dialect> {
    match hint {
        DialectHint::Allocation => return Ok(Dialect::Allocation),
        DialectHint::Comparative => return Ok(Dialect::Comparative),
        DialectHint::Staffing => return Ok(Dialect::Staffing),
        DialectHint::Auto => {}
    }

    match doc {
        // The document-text ingestion path is allocation-only.
        RawDocument::Text { .. } => Ok(Dialect::Allocation),
        RawDocument::Workbook { sheets } => {
            let first_text = sheets.first().map(sheet_text_lower).unwrap_or_default();

            if ALLOCATION_MARKERS.iter().any(|m| first_text.contains(m)) {
                debug!("classifier: allocation marker found in first sheet");
                return Ok(Dialect::Allocation);
            }

            let has_summary = sheets.iter().any(|s| s.name == "Summary");
            let has_detail = sheets.iter().any(|s| s.name == "Detail");
            if has_summary && has_detail {
                debug!("classifier: Summary/Detail sheet pair found");
                return Ok(Dialect::Comparative);
            }

            if STAFFING_MARKERS.iter().any(|m| first_text.contains(m)) {
                debug!("classifier: staffing keyword found in first sheet");
                return Ok(Dialect::Staffing);
            }

            // Generic fallback keeps the system total: an unrecognized
            // layout may still contain account-code rows.
            debug!("classifier: no dialect markers, defaulting to comparative");
            Ok(Dialect::Comparative)
        }
        RawDocument::Unrecognized { format } => Err(NormalizeError::UnsupportedFormat {
            format: format.clone(),
        }),
    }
}
