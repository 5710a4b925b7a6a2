//! ED279 allocation-report engine. Two forms of the same report exist in
//! the wild: a spreadsheet grid, and flat text extracted from the state's
//! page-oriented document. Both produce the same `AllocationReport` payload.
//!
//! Field detection is a rule table rather than cascading conditionals:
//! each rule pairs a keyword predicate with a write target, and category
//! amounts are last-match-wins (later "total" rows supersede earlier
//! subtotal mentions) while metadata is first-match-wins. The per-field
//! policy is deliberate; do not unify it.

use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::scan::{bounded_number, currency_like_value, label_amount, label_match, label_value, row_text};
use crate::schema::{AllocationReport, CellValue, Extraction, SummaryRow};
use crate::NormalizerOptions;

static FISCAL_YEAR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(FY\s?\d{2,4}[-/]?\d{0,4}|\d{4}[-/]\d{2,4})").unwrap());

const DISTRICT_KEYWORDS: &[&str] = &[
    "school",
    "district",
    "rsu",
    "sad",
    "csd",
    "department",
    "unit",
];

/// One category-detection rule: the row must contain every keyword in
/// `all` and none in `none`; on a hit the row's scanned currency value
/// overwrites the target field.
struct CategoryRule {
    all: &'static [&'static str],
    none: &'static [&'static str],
    write: fn(&mut AllocationReport, f64),
}

const CATEGORY_RULES: &[CategoryRule] = &[
    CategoryRule {
        all: &["regular", "instruction"],
        none: &[],
        write: |r, v| r.regular_instruction = v,
    },
    CategoryRule {
        all: &["special", "education"],
        none: &[],
        write: |r, v| r.special_education = v,
    },
    CategoryRule {
        all: &["career", "technical"],
        none: &[],
        write: |r, v| r.career_technical = v,
    },
    CategoryRule {
        all: &["other", "instruction"],
        none: &[],
        write: |r, v| r.other_instruction = v,
    },
    CategoryRule {
        all: &["student", "support"],
        none: &[],
        write: |r, v| r.student_staff_support = v,
    },
    CategoryRule {
        all: &["staff", "support"],
        none: &[],
        write: |r, v| r.student_staff_support = v,
    },
    CategoryRule {
        all: &["system", "admin"],
        none: &[],
        write: |r, v| r.system_admin = v,
    },
    CategoryRule {
        all: &["school", "admin"],
        none: &[],
        write: |r, v| r.school_admin = v,
    },
    CategoryRule {
        all: &["transport"],
        none: &["total"],
        write: |r, v| r.transportation = v,
    },
    CategoryRule {
        all: &["facilit"],
        none: &["total"],
        write: |r, v| r.facilities_maint = v,
    },
    CategoryRule {
        all: &["operation", "maintenance"],
        none: &["total"],
        write: |r, v| r.facilities_maint = v,
    },
    CategoryRule {
        all: &["debt", "service"],
        none: &[],
        write: |r, v| r.debt_service = v,
    },
    CategoryRule {
        all: &["all", "other"],
        none: &[],
        write: |r, v| r.all_other = v,
    },
];

fn rule_hits(rule: &CategoryRule, lower: &str) -> bool {
    rule.all.iter().all(|k| lower.contains(k)) && !rule.none.iter().any(|k| lower.contains(k))
}

pub struct AllocationEngine<'a> {
    options: &'a NormalizerOptions,
}

impl<'a> AllocationEngine<'a> {
    pub fn new(options: &'a NormalizerOptions) -> Self {
        Self { options }
    }

    /// Grid form: a single pass over every row in document order. Row order
    /// matters; the first/last-match policies below are only well-defined
    /// under the document's own traversal order.
    pub fn extract_grid(&self, rows: &[Vec<CellValue>]) -> Extraction {
        let mut alloc = AllocationReport::default();
        let mut district: Option<String> = None;
        let mut fiscal_year: Option<String> = None;

        for (index, row) in rows.iter().enumerate() {
            let text = row_text(row);
            let lower = text.to_lowercase();

            // District only from the first five rows, first match kept.
            if district.is_none() && index < 5 {
                if let Some(candidate) = district_candidate(row) {
                    district = Some(candidate);
                }
            }

            if fiscal_year.is_none() {
                if let Some(m) = FISCAL_YEAR_RE.find(&text) {
                    fiscal_year = Some(m.as_str().to_string());
                }
            }

            // Category amounts: every rule tested independently, zero scan
            // results never overwrite (0 means "not found" here).
            let amount = currency_like_value(row, self.options.monetary_floor);
            if amount != 0.0 {
                for rule in CATEGORY_RULES {
                    if rule_hits(rule, &lower) {
                        (rule.write)(&mut alloc, amount);
                    }
                }

                if lower.contains("total") && lower.contains("allocation") {
                    alloc.total_allocation = amount;
                }
                if lower.contains("state") && lower.contains("contribution") {
                    alloc.state_contribution = amount;
                }
                if lower.contains("local") && lower.contains("contribution") {
                    alloc.local_contribution = amount;
                }
            }

            if lower.contains("local") && lower.contains("share") {
                let pct = bounded_number(row, 0.0, 100.0);
                if pct != 0.0 {
                    alloc.local_share_pct = pct;
                }
            }
            if lower.contains("state") && lower.contains("share") {
                let pct = bounded_number(row, 0.0, 100.0);
                if pct != 0.0 {
                    alloc.state_share_pct = pct;
                }
            }
            if lower.contains("pupil") || lower.contains("enrollment") || lower.contains("students")
            {
                let count = bounded_number(row, 0.0, self.options.max_pupil_count);
                if count != 0.0 {
                    alloc.pupil_count = count;
                }
            }
            if lower.contains("mil rate") || lower.contains("mill") {
                let rate = bounded_number(row, 0.0, self.options.max_mil_rate);
                if rate != 0.0 {
                    alloc.mil_rate = rate;
                }
            }
            if lower.contains("valuation") {
                // Valuations are large; a high floor excludes stray small
                // numbers sharing the row.
                let v = currency_like_value(row, self.options.valuation_floor);
                if v != 0.0 {
                    alloc.adjusted_valuation = v;
                }
            }
        }

        finalize(&mut alloc);
        debug!(
            "allocation grid pass: total={}, pupils={}",
            alloc.total_allocation, alloc.pupil_count
        );

        Extraction {
            district,
            fiscal_year,
            generated_on: None,
            summary: allocation_summary(&alloc),
            details: Vec::new(),
            allocation: Some(alloc),
            staffing: None,
        }
    }

    /// Document-text form: the same semantic fields located via explicit
    /// labeled patterns against the linear text. Any pattern that fails to
    /// match leaves its field at zero; partial extraction is expected.
    pub fn extract_text(&self, text: &str) -> Extraction {
        let mut alloc = AllocationReport::default();

        let district = label_value(
            text,
            r"ORG\s*ID\s*[:\-]?\s*(?:\d{3,6}\s+)?([A-Za-z][^\r\n]{3,60})",
        );
        let fiscal_year = label_value(text, r"(\d{4}\s*-\s*\d{4})").map(|s| s.replace(' ', ""));

        alloc.operating_allocation = dollar(text, r"Operating\s+Allocation\s+Totals");
        alloc.special_education = dollar(text, r"Special\s+Education\s*[-–]?\s*EPS\s+Allocation");
        alloc.career_technical = dollar(text, r"Career\s+and\s+Technical\s+Education\s+Allocation");
        alloc.transportation = dollar(text, r"Transportation\s+(?:Operating\s+)?Allocation");
        alloc.debt_service = dollar(text, r"Debt\s+Service\s+Allocation");
        alloc.teacher_retirement = dollar(text, r"Teacher\s+Retirement\s+Amount");
        alloc.total_allocation = dollar(text, r"100%\s*EPS\s+Allocation");
        alloc.state_contribution = dollar(text, r"Adjusted\s+State\s+Contribution");
        alloc.local_contribution = dollar(text, r"Required\s+Local\s+Contribution");
        alloc.adjusted_valuation = dollar(text, r"(?:Adjusted\s+)?State\s+Valuation");
        alloc.mil_rate = label_amount(text, r"Mill?\s+(?:Rate|Expectation)\s*[=:]?\s*([\d.]+)");

        if let Some(shares) = label_match(
            text,
            r"Local\s+Share\s*%?\s*[=:]?\s*([\d.]+)\s*%?[\s\S]{0,120}?State\s+Share\s*%?\s*[=:]?\s*([\d.]+)",
        ) {
            alloc.local_share_pct = shares[0].parse().unwrap_or(0.0);
            alloc.state_share_pct = shares[1].parse().unwrap_or(0.0);
        }

        // The resident pupil total prints as e.g. "Total 450.0 100.00%".
        alloc.pupil_count =
            label_amount(text, r"Total\s+([\d,]+(?:\.\d+)?)\s+100\.00\s*%");

        finalize(&mut alloc);

        // Local contribution is not always separately labeled; derive it
        // from the state/total split when both sides are known.
        if alloc.local_contribution == 0.0
            && alloc.total_allocation > 0.0
            && alloc.state_contribution > 0.0
        {
            alloc.local_contribution = alloc.total_allocation - alloc.state_contribution;
        }

        debug!(
            "allocation text pass: total={}, pupils={}",
            alloc.total_allocation, alloc.pupil_count
        );

        Extraction {
            district,
            fiscal_year,
            generated_on: None,
            summary: allocation_summary(&alloc),
            details: Vec::new(),
            allocation: Some(alloc),
            staffing: None,
        }
    }
}

fn district_candidate(row: &[CellValue]) -> Option<String> {
    let first = row.first()?.as_str()?.trim();
    if first.len() <= 10 {
        return None;
    }
    let lower = first.to_lowercase();
    if DISTRICT_KEYWORDS.iter().any(|k| lower.contains(k)) {
        Some(first.to_string())
    } else {
        None
    }
}

fn dollar(text: &str, label: &str) -> f64 {
    label_amount(
        text,
        &format!(r"{label}[\s=:]*\$?\s*([\d,]+(?:\.\d+)?)"),
    )
}

fn finalize(alloc: &mut AllocationReport) {
    // No explicit total found: sum every labeled allocation instead.
    if alloc.total_allocation == 0.0 {
        alloc.total_allocation = alloc.labeled_amounts().iter().map(|(_, v)| v).sum();
    }
    if alloc.pupil_count > 0.0 {
        alloc.per_pupil_allocation = Some(alloc.total_allocation / alloc.pupil_count);
    }
}

/// Summary rows from nonzero allocations only, sorted descending by
/// amount, each annotated with its share of the total.
fn allocation_summary(alloc: &AllocationReport) -> Vec<SummaryRow> {
    let total = alloc.total_allocation;
    let mut rows: Vec<SummaryRow> = alloc
        .labeled_amounts()
        .into_iter()
        .filter(|(_, amount)| *amount != 0.0)
        .map(|(label, amount)| {
            let mut row = SummaryRow::new(label, amount, 0.0, 0.0, 0.0);
            if total > 0.0 {
                row.percent_of_total = Some(amount / total * 100.0);
            }
            row
        })
        .collect();
    rows.sort_by(|a, b| b.budget.partial_cmp(&a.budget).unwrap_or(std::cmp::Ordering::Equal));
    rows
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opts() -> NormalizerOptions {
        NormalizerOptions::default()
    }

    fn t(s: &str) -> CellValue {
        CellValue::Text(s.to_string())
    }

    fn n(v: f64) -> CellValue {
        CellValue::Number(v)
    }

    #[test]
    fn test_grid_district_first_match_within_five_rows() {
        let options = opts();
        let engine = AllocationEngine::new(&options);
        let rows = vec![
            vec![t("ED279 Report")],
            vec![t("Coastal Ridge School District")],
            vec![t("Another Valley School District")],
        ];
        let ex = engine.extract_grid(&rows);
        assert_eq!(ex.district.as_deref(), Some("Coastal Ridge School District"));
    }

    #[test]
    fn test_grid_district_ignored_after_fifth_row() {
        let options = opts();
        let engine = AllocationEngine::new(&options);
        let mut rows = vec![vec![t("x")]; 6];
        rows.push(vec![t("Coastal Ridge School District")]);
        let ex = engine.extract_grid(&rows);
        assert_eq!(ex.district, None);
    }

    #[test]
    fn test_grid_category_last_match_wins() {
        let options = opts();
        let engine = AllocationEngine::new(&options);
        let rows = vec![
            vec![t("Regular Instruction Subtotal"), n(200000.0)],
            vec![t("Regular Instruction"), n(410000.0)],
        ];
        let ex = engine.extract_grid(&rows);
        let alloc = ex.allocation.unwrap();
        assert_eq!(alloc.regular_instruction, 410000.0);
    }

    #[test]
    fn test_grid_zero_scan_does_not_overwrite() {
        let options = opts();
        let engine = AllocationEngine::new(&options);
        let rows = vec![
            vec![t("Special Education"), n(150000.0)],
            // trailing small number is below the monetary floor
            vec![t("Special Education"), n(3.0)],
        ];
        let ex = engine.extract_grid(&rows);
        assert_eq!(ex.allocation.unwrap().special_education, 150000.0);
    }

    #[test]
    fn test_grid_transport_total_excluded() {
        let options = opts();
        let engine = AllocationEngine::new(&options);
        let rows = vec![
            vec![t("Transportation Operating"), n(90000.0)],
            vec![t("Transportation Total with Debt"), n(999999.0)],
        ];
        let ex = engine.extract_grid(&rows);
        assert_eq!(ex.allocation.unwrap().transportation, 90000.0);
    }

    #[test]
    fn test_grid_total_fallback_is_category_sum() {
        let options = opts();
        let engine = AllocationEngine::new(&options);
        let rows = vec![
            vec![t("Regular Instruction"), n(400000.0)],
            vec![t("Special Education"), n(100000.0)],
        ];
        let ex = engine.extract_grid(&rows);
        let alloc = ex.allocation.unwrap();
        assert_eq!(alloc.total_allocation, 500000.0);
    }

    #[test]
    fn test_grid_explicit_total_preferred() {
        let options = opts();
        let engine = AllocationEngine::new(&options);
        let rows = vec![
            vec![t("Regular Instruction"), n(400000.0)],
            vec![t("Total EPS Allocation"), n(950000.0)],
        ];
        let ex = engine.extract_grid(&rows);
        assert_eq!(ex.allocation.unwrap().total_allocation, 950000.0);
    }

    #[test]
    fn test_grid_bounded_fields() {
        let options = opts();
        let engine = AllocationEngine::new(&options);
        let rows = vec![
            vec![t("Resident Pupil Count"), n(612.5)],
            vec![t("Mill Rate Expectation"), n(7.92)],
            vec![t("Adjusted State Valuation"), n(584000000.0)],
            vec![t("Local Share %"), n(42.5)],
            vec![t("State Share %"), n(57.5)],
        ];
        let ex = engine.extract_grid(&rows);
        let alloc = ex.allocation.unwrap();
        assert_eq!(alloc.pupil_count, 612.5);
        assert_eq!(alloc.mil_rate, 7.92);
        assert_eq!(alloc.adjusted_valuation, 584000000.0);
        assert_eq!(alloc.local_share_pct, 42.5);
        assert_eq!(alloc.state_share_pct, 57.5);
    }

    #[test]
    fn test_grid_valuation_floor_excludes_small_numbers() {
        let options = opts();
        let engine = AllocationEngine::new(&options);
        let rows = vec![vec![t("Adjusted State Valuation"), n(42.0), n(7300.0)]];
        let ex = engine.extract_grid(&rows);
        assert_eq!(ex.allocation.unwrap().adjusted_valuation, 0.0);
    }

    #[test]
    fn test_grid_summary_sorted_descending_with_percent() {
        let options = opts();
        let engine = AllocationEngine::new(&options);
        let rows = vec![
            vec![t("Special Education"), n(100000.0)],
            vec![t("Regular Instruction"), n(400000.0)],
        ];
        let ex = engine.extract_grid(&rows);
        assert_eq!(ex.summary.len(), 2);
        assert_eq!(ex.summary[0].category, "Regular Instruction");
        assert_eq!(ex.summary[0].budget, 400000.0);
        assert_eq!(ex.summary[0].percent_of_total, Some(80.0));
        assert_eq!(ex.summary[1].percent_of_total, Some(20.0));
    }

    #[test]
    fn test_text_form_scenario() {
        let options = opts();
        let engine = AllocationEngine::new(&options);
        let text = "\
ED279 Essential Programs and Services Funding Act
0689 ORG ID Coastal Ridge RSU 14
School Year 2024-2025
Operating Allocation Totals = $1,200,000
Total 450.0 100.00%
";
        let ex = engine.extract_text(text);
        let alloc = ex.allocation.unwrap();
        assert_eq!(alloc.operating_allocation, 1200000.0);
        assert_eq!(alloc.pupil_count, 450.0);
        assert_eq!(alloc.total_allocation, 1200000.0);
        assert_eq!(alloc.per_pupil_allocation, Some(1200000.0 / 450.0));
        assert_eq!(ex.district.as_deref(), Some("Coastal Ridge RSU 14"));
        assert_eq!(ex.fiscal_year.as_deref(), Some("2024-2025"));
    }

    #[test]
    fn test_text_form_labeled_amounts_and_shares() {
        let options = opts();
        let engine = AllocationEngine::new(&options);
        let text = "\
ORG ID 1234 Pine Hollow CSD
2023-2024
Operating Allocation Totals $8,400,000.00
Special Education - EPS Allocation $1,100,000.00
Debt Service Allocation $750,000.00
Teacher Retirement Amount $310,000.00
100% EPS Allocation $10,560,000.00
Adjusted State Contribution $6,300,000.00
Mill Expectation 6.99
Local Share % 40.34 ... State Share % 59.66
";
        let ex = engine.extract_text(text);
        let alloc = ex.allocation.unwrap();
        assert_eq!(alloc.special_education, 1100000.0);
        assert_eq!(alloc.debt_service, 750000.0);
        assert_eq!(alloc.teacher_retirement, 310000.0);
        assert_eq!(alloc.total_allocation, 10560000.0);
        assert_eq!(alloc.state_contribution, 6300000.0);
        // derived: total minus state
        assert_eq!(alloc.local_contribution, 4260000.0);
        assert_eq!(alloc.local_share_pct, 40.34);
        assert_eq!(alloc.state_share_pct, 59.66);
        assert_eq!(alloc.mil_rate, 6.99);
    }

    #[test]
    fn test_text_form_partial_extraction_never_aborts() {
        let options = opts();
        let engine = AllocationEngine::new(&options);
        let ex = engine.extract_text("no recognizable labels in here");
        let alloc = ex.allocation.unwrap();
        assert_eq!(alloc.total_allocation, 0.0);
        assert_eq!(alloc.per_pupil_allocation, None);
        assert!(ex.summary.is_empty());
    }
}
