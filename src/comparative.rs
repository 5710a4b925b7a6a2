//! Comparative budget-vs-actual engine. The well-formed export carries a
//! "Summary" sheet (category rollups behind a "Budget Category" header
//! sentinel) and a "Detail" sheet (line items behind an "Account Code"
//! header cell). Anything else falls back to a generic single-sheet scan
//! that keeps whatever account-code rows the layout contains.

use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::account_code::AccountCode;
use crate::scan::{label_value, row_text, try_coerce};
use crate::schema::{CellValue, Extraction, LineItem, Sheet, SummaryRow};

static SUMMARY_CATEGORY_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{2}\s+.+").unwrap());
static FY_LABEL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"FY\d{2}-\d{2}").unwrap());

/// Prefixes that disqualify a first cell from being a district name in the
/// generic fallback probe.
const NON_DISTRICT_PREFIXES: &[&str] = &["FY", "Cycle", "Account", "Budget"];

pub fn extract(sheets: &[Sheet]) -> Extraction {
    let summary_sheet = sheets.iter().find(|s| s.name == "Summary");
    let detail_sheet = sheets.iter().find(|s| s.name == "Detail");

    match (summary_sheet, detail_sheet) {
        (Some(summary), Some(detail)) => extract_paired(summary, detail),
        _ => extract_generic(sheets.first()),
    }
}

fn extract_paired(summary_sheet: &Sheet, detail_sheet: &Sheet) -> Extraction {
    let mut ex = Extraction::default();

    // Metadata lives at the top of the Summary sheet: district in the very
    // first cell, fiscal year and generation date anywhere in the header.
    ex.district = summary_sheet
        .rows
        .first()
        .and_then(|row| row.first())
        .and_then(|cell| cell.as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());

    let mut past_header = false;
    for row in &summary_sheet.rows {
        let text = row_text(row);

        if ex.fiscal_year.is_none() {
            if let Some(m) = FY_LABEL_RE.find(&text) {
                ex.fiscal_year = Some(m.as_str().to_string());
            }
        }
        if ex.generated_on.is_none() {
            ex.generated_on = label_value(&text, r"Created On:?\s*(.+)");
        }

        let first = row.first().map(|c| c.to_text()).unwrap_or_default();
        if !past_header {
            // Summary scanning begins only after the header sentinel.
            if first.trim() == "Budget Category" {
                past_header = true;
            }
            continue;
        }

        if SUMMARY_CATEGORY_RE.is_match(first.trim()) {
            let (budget, actual, encumbered, available) = positional_amounts(&row[1..]);
            // Negative budget marks a revenue row; summaries are
            // expenditure-only.
            if budget < 0.0 {
                continue;
            }
            ex.summary.push(SummaryRow::new(
                first.trim().to_string(),
                budget,
                actual,
                encumbered,
                available,
            ));
        }
    }

    ex.details = detail_line_items(detail_sheet);
    debug!(
        "comparative paired pass: {} summary rows, {} line items",
        ex.summary.len(),
        ex.details.len()
    );
    ex
}

fn detail_line_items(sheet: &Sheet) -> Vec<LineItem> {
    let mut items = Vec::new();
    let mut past_header = false;

    for row in &sheet.rows {
        if !past_header {
            if row
                .iter()
                .any(|c| c.as_str().map(str::trim) == Some("Account Code"))
            {
                past_header = true;
            }
            continue;
        }
        if let Some(item) = line_item_from_row(row) {
            items.push(item);
        }
    }
    items
}

/// A detail row is any row whose first cell is a valid account code; rows
/// failing the pattern are skipped, never coerced.
fn line_item_from_row(row: &[CellValue]) -> Option<LineItem> {
    let code = AccountCode::parse(&row.first()?.to_text())?;
    let description = row
        .get(1)
        .and_then(|c| c.as_str())
        .map(|s| s.trim().to_string())
        .unwrap_or_default();
    let amount_cells = if row.len() > 2 { &row[2..] } else { &[] };
    let (budget, actual, encumbered, available) = positional_amounts(amount_cells);
    Some(LineItem::new(
        code,
        description,
        budget,
        actual,
        encumbered,
        available,
    ))
}

/// Budget/actual/encumbered/available taken positionally from the numeric
/// cells of the row; when the fourth is absent, available is derived.
fn positional_amounts(cells: &[CellValue]) -> (f64, f64, f64, f64) {
    let numbers: Vec<f64> = cells.iter().filter_map(try_coerce).collect();
    let budget = numbers.first().copied().unwrap_or(0.0);
    let actual = numbers.get(1).copied().unwrap_or(0.0);
    let encumbered = numbers.get(2).copied().unwrap_or(0.0);
    let available = numbers
        .get(3)
        .copied()
        .unwrap_or(budget - actual - encumbered);
    (budget, actual, encumbered, available)
}

/// Single-sheet fallback: probe the first ten rows for metadata, then keep
/// every account-code row on the sheet.
fn extract_generic(sheet: Option<&Sheet>) -> Extraction {
    let mut ex = Extraction::default();
    let Some(sheet) = sheet else {
        return ex;
    };

    for row in sheet.rows.iter().take(10) {
        let first = row.first().map(|c| c.to_text()).unwrap_or_default();
        let first = first.trim();

        if ex.district.is_none() && looks_like_district(first) {
            ex.district = Some(first.to_string());
        }
        if ex.fiscal_year.is_none() {
            let text = row_text(row);
            if let Some(m) = FY_LABEL_RE.find(&text) {
                ex.fiscal_year = Some(m.as_str().to_string());
            }
        }
    }

    for row in &sheet.rows {
        if let Some(item) = line_item_from_row(row) {
            ex.details.push(item);
        }
    }
    debug!("comparative generic pass: {} line items", ex.details.len());
    ex
}

fn looks_like_district(first: &str) -> bool {
    if first.len() <= 5 || AccountCode::parse(first).is_some() {
        return false;
    }
    if NON_DISTRICT_PREFIXES.iter().any(|p| first.starts_with(p)) {
        return false;
    }
    first.chars().any(|c| c.is_alphabetic())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(s: &str) -> CellValue {
        CellValue::Text(s.to_string())
    }

    fn n(v: f64) -> CellValue {
        CellValue::Number(v)
    }

    fn paired_workbook() -> Vec<Sheet> {
        vec![
            Sheet::new(
                "Summary",
                vec![
                    vec![t("Coastal Ridge School District"), t("FY24-25")],
                    vec![t("Created On: 06/30/2024")],
                    vec![t("Budget Category"), t("Budget"), t("Actual")],
                    vec![t("10 Instruction"), n(500000.0), n(450000.0), n(10000.0), n(40000.0)],
                    vec![t("45 State Revenue"), n(-200000.0), n(-190000.0), n(0.0), n(-10000.0)],
                    vec![t("Notes"), t("not a category row")],
                ],
            ),
            Sheet::new(
                "Detail",
                vec![
                    vec![t("Account Code"), t("Description"), t("Budget")],
                    vec![
                        t("1000-1100-1000-1010-010"),
                        t("Teacher Salaries"),
                        n(300000.0),
                        n(290000.0),
                        n(0.0),
                        n(10000.0),
                    ],
                    vec![t("1000-1100-1000"), t("Malformed"), n(99999.0)],
                ],
            ),
        ]
    }

    #[test]
    fn test_paired_metadata() {
        let ex = extract(&paired_workbook());
        assert_eq!(ex.district.as_deref(), Some("Coastal Ridge School District"));
        assert_eq!(ex.fiscal_year.as_deref(), Some("FY24-25"));
        assert_eq!(ex.generated_on.as_deref(), Some("06/30/2024"));
    }

    #[test]
    fn test_paired_summary_rows() {
        let ex = extract(&paired_workbook());
        assert_eq!(ex.summary.len(), 1);
        let row = &ex.summary[0];
        assert_eq!(row.category, "10 Instruction");
        assert_eq!(row.budget, 500000.0);
        assert_eq!(row.actual, 450000.0);
        assert_eq!(row.percent_spent, 90.0);
    }

    #[test]
    fn test_paired_detail_rows_skip_malformed_codes() {
        let ex = extract(&paired_workbook());
        assert_eq!(ex.details.len(), 1);
        let item = &ex.details[0];
        assert_eq!(item.description, "Teacher Salaries");
        assert_eq!(item.budget, 300000.0);
        assert!((item.percent_spent - 96.666_666_666_666_67).abs() < 1e-9);
    }

    #[test]
    fn test_rows_before_sentinel_ignored() {
        let sheets = vec![
            Sheet::new(
                "Summary",
                vec![
                    // looks like a category row but precedes the sentinel
                    vec![t("10 Instruction"), n(999999.0)],
                    vec![t("Budget Category")],
                    vec![t("20 Administration"), n(80000.0), n(60000.0), n(5000.0), n(15000.0)],
                ],
            ),
            Sheet::new("Detail", vec![]),
        ];
        let ex = extract(&sheets);
        assert_eq!(ex.summary.len(), 1);
        assert_eq!(ex.summary[0].category, "20 Administration");
    }

    #[test]
    fn test_available_derived_when_missing() {
        let sheets = vec![
            Sheet::new("Summary", vec![vec![t("Budget Category")]]),
            Sheet::new(
                "Detail",
                vec![
                    vec![t("Account Code")],
                    vec![
                        t("1000-1100-2700-5000-010"),
                        t("Bus Fuel"),
                        n(10000.0),
                        n(6000.0),
                        n(1000.0),
                    ],
                ],
            ),
        ];
        let ex = extract(&sheets);
        assert_eq!(ex.details[0].available, 3000.0);
    }

    #[test]
    fn test_numeric_capture_skips_text_cells() {
        let sheets = vec![
            Sheet::new("Summary", vec![vec![t("Budget Category")]]),
            Sheet::new(
                "Detail",
                vec![
                    vec![t("Account Code")],
                    vec![
                        t("1000-1100-1000-1010-010"),
                        t("Salaries"),
                        t("see note"),
                        n(5000.0),
                        n(4000.0),
                        n(0.0),
                        n(1000.0),
                    ],
                ],
            ),
        ];
        let ex = extract(&sheets);
        assert_eq!(ex.details[0].budget, 5000.0);
        assert_eq!(ex.details[0].available, 1000.0);
    }

    #[test]
    fn test_generic_fallback() {
        let sheets = vec![Sheet::new(
            "Export",
            vec![
                vec![t("FY 2024 Expenditure Cycle")],
                vec![t("Pine Hollow CSD"), t("FY24-25")],
                vec![t("1000-1100-2700-5000-010"), t("Bus Fuel"), n(10000.0), n(6000.0), n(1000.0), n(3000.0)],
                vec![t("1000-1100-2700-5100-010"), t("Bus Parts"), n(5000.0), n(2000.0), n(0.0), n(3000.0)],
                vec![t("not a code"), n(123456.0)],
            ],
        )];
        let ex = extract(&sheets);
        assert_eq!(ex.district.as_deref(), Some("Pine Hollow CSD"));
        assert_eq!(ex.fiscal_year.as_deref(), Some("FY24-25"));
        assert_eq!(ex.details.len(), 2);
        assert!(ex.summary.is_empty());
    }

    #[test]
    fn test_generic_probe_skips_reserved_prefixes() {
        let sheets = vec![Sheet::new(
            "Export",
            vec![
                vec![t("Budget Report Export")],
                vec![t("Cycle 7 Output")],
                vec![t("Account Export Tool")],
                vec![t("Maple Grove School Department")],
            ],
        )];
        let ex = extract(&sheets);
        assert_eq!(ex.district.as_deref(), Some("Maple Grove School Department"));
    }

    #[test]
    fn test_empty_workbook_yields_empty_extraction() {
        let ex = extract(&[]);
        assert!(ex.details.is_empty());
        assert!(ex.summary.is_empty());
        assert_eq!(ex.district, None);
    }
}
