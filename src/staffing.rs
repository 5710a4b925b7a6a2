//! Staffing-roster engine. Rosters have no fixed column set; the first row
//! containing a staffing keyword becomes the header, and every subsequent
//! non-empty row becomes a loosely-typed record keyed by those headers.

use log::debug;

use crate::scan::coerce_number;
use crate::schema::{Extraction, Sheet, StaffingRecord, StaffingRoster};

const HEADER_KEYWORDS: &[&str] = &["position", "fte", "employee"];

pub fn extract(sheet: &Sheet) -> Extraction {
    let mut headers: Option<Vec<String>> = None;
    let mut records = Vec::new();

    for row in &sheet.rows {
        match &headers {
            None => {
                let lower = row
                    .iter()
                    .filter_map(|c| c.as_str())
                    .collect::<Vec<_>>()
                    .join(" ")
                    .to_lowercase();
                if HEADER_KEYWORDS.iter().any(|k| lower.contains(k)) {
                    headers = Some(
                        row.iter()
                            .enumerate()
                            .map(|(i, cell)| {
                                let name = cell.to_text().trim().to_string();
                                if name.is_empty() {
                                    format!("column{}", i + 1)
                                } else {
                                    name
                                }
                            })
                            .collect(),
                    );
                }
            }
            Some(names) => {
                if row.iter().all(|c| c.is_empty()) {
                    continue;
                }
                let fields = names
                    .iter()
                    .enumerate()
                    .map(|(i, name)| {
                        (
                            name.clone(),
                            row.get(i).cloned().unwrap_or(crate::schema::CellValue::Empty),
                        )
                    })
                    .collect();
                records.push(StaffingRecord { fields });
            }
        }
    }

    let total_fte = total_fte(&records);
    let position_count = records.len();
    debug!(
        "staffing pass: {} records, {:.2} total FTE",
        position_count, total_fte
    );

    Extraction {
        staffing: Some(StaffingRoster {
            records,
            total_fte,
            position_count,
        }),
        ..Extraction::default()
    }
}

/// Sums whichever field name contains "fte" (case-insensitive substring)
/// in each record; 0 when no such field was discovered.
fn total_fte(records: &[StaffingRecord]) -> f64 {
    records
        .iter()
        .filter_map(|record| {
            record
                .fields
                .iter()
                .find(|(name, _)| name.to_lowercase().contains("fte"))
                .map(|(_, value)| coerce_number(value))
        })
        .sum()
}
