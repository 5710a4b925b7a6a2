use schemars::JsonSchema;
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::account_code::{AccountCode, FundingCategory};

/// A single spreadsheet cell as handed over by the ingestion collaborator.
/// Mirrors the shapes a workbook decoder produces: text, number, or blank.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum CellValue {
    Text(String),
    Number(f64),
    Empty,
}

impl CellValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Self::Empty => true,
            Self::Text(s) => s.trim().is_empty(),
            Self::Number(_) => false,
        }
    }

    /// Display form used when rows are flattened to text for keyword tests.
    pub fn to_text(&self) -> String {
        match self {
            Self::Text(s) => s.clone(),
            Self::Number(n) => {
                if n.fract() == 0.0 {
                    format!("{}", *n as i64)
                } else {
                    format!("{}", n)
                }
            }
            Self::Empty => String::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Sheet {
    pub name: String,
    pub rows: Vec<Vec<CellValue>>,
}

impl Sheet {
    pub fn new(name: impl Into<String>, rows: Vec<Vec<CellValue>>) -> Self {
        Self {
            name: name.into(),
            rows,
        }
    }
}

/// The raw document as received from the upload/decoding layer. The core
/// never performs I/O; it only sees this already-decoded shape.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum RawDocument {
    /// A spreadsheet decoded into named sheets of cell rows.
    Workbook { sheets: Vec<Sheet> },
    /// Flat text extracted from a page-oriented document.
    Text { text: String },
    /// Anything the ingestion layer could not decode; normalizing this
    /// yields an `UnsupportedFormat` error.
    Unrecognized { format: String },
}

impl RawDocument {
    pub fn first_sheet(&self) -> Option<&Sheet> {
        match self {
            Self::Workbook { sheets } => sheets.first(),
            _ => None,
        }
    }

    pub fn sheet_named(&self, name: &str) -> Option<&Sheet> {
        match self {
            Self::Workbook { sheets } => sheets.iter().find(|s| s.name == name),
            _ => None,
        }
    }
}

/// Caller-supplied dialect override. `Auto` runs detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum DialectHint {
    #[default]
    Auto,
    Allocation,
    Comparative,
    Staffing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    /// ED279 state subsidy allocation report.
    Allocation,
    /// Budget-vs-actual comparative statement.
    Comparative,
    /// Staffing/FTE roster.
    Staffing,
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Allocation => "allocation",
            Self::Comparative => "comparative",
            Self::Staffing => "staffing",
        };
        f.write_str(name)
    }
}

pub(crate) fn percent_spent(budget: f64, actual: f64) -> f64 {
    if budget <= 0.0 {
        0.0
    } else {
        actual / budget * 100.0
    }
}

/// One detail expenditure row. Built once during extraction, immutable after.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct LineItem {
    pub account_code: AccountCode,
    pub description: String,
    pub budget: f64,
    pub actual: f64,
    pub encumbered: f64,
    pub available: f64,
    pub percent_spent: f64,
    pub funding_category: FundingCategory,
}

impl LineItem {
    pub fn new(
        account_code: AccountCode,
        description: String,
        budget: f64,
        actual: f64,
        encumbered: f64,
        available: f64,
    ) -> Self {
        let funding_category = account_code.funding_category();
        Self {
            account_code,
            description,
            budget,
            actual,
            encumbered,
            available,
            percent_spent: percent_spent(budget, actual),
            funding_category,
        }
    }
}

/// A category rollup row, either taken from a native summary block or
/// synthesized from detail rows grouped by function segment.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct SummaryRow {
    pub category: String,
    pub budget: f64,
    pub actual: f64,
    pub encumbered: f64,
    pub available: f64,
    pub percent_spent: f64,
    /// Only populated for allocation-dialect summaries, where rows are
    /// shares of the total allocation rather than budget-vs-actual.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub percent_of_total: Option<f64>,
}

impl SummaryRow {
    pub fn new(
        category: impl Into<String>,
        budget: f64,
        actual: f64,
        encumbered: f64,
        available: f64,
    ) -> Self {
        Self {
            category: category.into(),
            budget,
            actual,
            encumbered,
            available,
            percent_spent: percent_spent(budget, actual),
            percent_of_total: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, JsonSchema)]
pub struct ReportTotals {
    pub budget: f64,
    pub actual: f64,
    pub encumbered: f64,
    pub available: f64,
}

#[derive(Debug, Clone, Copy, Default, Serialize, JsonSchema)]
pub struct CategoryAmounts {
    pub budget: f64,
    pub actual: f64,
}

/// ED279 payload: the state's per-district funding determination. Every
/// field defaults to zero; a pattern that fails to match leaves its field
/// untouched rather than aborting the pass.
#[derive(Debug, Clone, Default, Serialize, JsonSchema)]
pub struct AllocationReport {
    pub regular_instruction: f64,
    pub special_education: f64,
    pub career_technical: f64,
    pub other_instruction: f64,
    pub student_staff_support: f64,
    pub system_admin: f64,
    pub school_admin: f64,
    pub transportation: f64,
    pub facilities_maint: f64,
    pub debt_service: f64,
    pub all_other: f64,
    pub operating_allocation: f64,
    pub teacher_retirement: f64,
    pub total_allocation: f64,
    pub state_contribution: f64,
    pub local_contribution: f64,
    pub local_share_pct: f64,
    pub state_share_pct: f64,
    #[schemars(description = "Resident pupil count; reports carry fractional counts")]
    pub pupil_count: f64,
    pub adjusted_valuation: f64,
    pub mil_rate: f64,
    /// Omitted (never divide-by-zero) when the pupil count is 0.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub per_pupil_allocation: Option<f64>,
}

impl AllocationReport {
    /// The labeled amounts that feed summary rows and the total fallback.
    pub fn labeled_amounts(&self) -> Vec<(&'static str, f64)> {
        vec![
            ("Regular Instruction", self.regular_instruction),
            ("Special Education", self.special_education),
            ("Career & Technical Education", self.career_technical),
            ("Other Instruction", self.other_instruction),
            ("Student & Staff Support", self.student_staff_support),
            ("System Administration", self.system_admin),
            ("School Administration", self.school_admin),
            ("Transportation", self.transportation),
            ("Facilities Maintenance", self.facilities_maint),
            ("Debt Service", self.debt_service),
            ("All Other", self.all_other),
            ("Operating Allocation", self.operating_allocation),
            ("Teacher Retirement", self.teacher_retirement),
        ]
    }
}

/// One roster row: an ordered mapping from discovered column name to the
/// raw cell value. The open schema stays contained to this type; typed
/// projections (FTE total) are computed by scanning the keys.
#[derive(Debug, Clone, Default)]
pub struct StaffingRecord {
    pub fields: Vec<(String, CellValue)>,
}

impl StaffingRecord {
    pub fn get(&self, name: &str) -> Option<&CellValue> {
        self.fields
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v)
    }
}

impl Serialize for StaffingRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.fields.iter().map(|(k, v)| (k, v)))
    }
}

impl JsonSchema for StaffingRecord {
    fn schema_name() -> String {
        "StaffingRecord".to_string()
    }

    fn json_schema(gen: &mut schemars::gen::SchemaGenerator) -> schemars::schema::Schema {
        <BTreeMap<String, CellValue>>::json_schema(gen)
    }
}

#[derive(Debug, Clone, Default, Serialize, JsonSchema)]
pub struct StaffingRoster {
    pub records: Vec<StaffingRecord>,
    pub total_fte: f64,
    pub position_count: usize,
}

/// The partially-filled output every extraction engine produces. The
/// assembler fills in defaults and derived sections.
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    pub district: Option<String>,
    pub fiscal_year: Option<String>,
    pub generated_on: Option<String>,
    pub summary: Vec<SummaryRow>,
    pub details: Vec<LineItem>,
    pub allocation: Option<AllocationReport>,
    pub staffing: Option<StaffingRoster>,
}

/// The assembled, normalized report handed to presentation and export
/// collaborators. Sections a dialect does not produce are omitted from the
/// serialized form rather than null-filled.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct NormalizedReport {
    pub dialect: Dialect,
    pub district: String,
    pub fiscal_year: String,
    pub generated_on: String,
    pub summary: Vec<SummaryRow>,
    pub details: Vec<LineItem>,
    /// Sums over expenditure detail rows only (budget > 0).
    pub totals: ReportTotals,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allocation: Option<AllocationReport>,
    /// Cross-taxonomy reconciliation: account-code spending rolled up into
    /// EPS funding categories.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category_breakdown: Option<BTreeMap<FundingCategory, CategoryAmounts>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub staffing: Option<StaffingRoster>,
}
