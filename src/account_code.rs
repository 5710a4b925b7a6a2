use once_cell::sync::Lazy;
use regex::Regex;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// `fund-program-function-object-location`, fixed segment widths.
static CODE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{4})-(\d{4})-(\d{4})-(\d{4})-(\d{3})$").unwrap());

/// A five-segment Maine chart-of-accounts expenditure code.
///
/// The `function` segment carries the instructional/support classification
/// and is what maps a line of spending to its EPS funding category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct AccountCode {
    pub fund: String,
    pub program: String,
    pub function: String,
    pub object: String,
    pub location: String,
}

impl AccountCode {
    /// Parses the literal `\d{4}-\d{4}-\d{4}-\d{4}-\d{3}` form. Anything
    /// else (wrong widths, missing dash, non-numeric) is rejected; callers
    /// skip the originating row rather than defaulting.
    pub fn parse(raw: &str) -> Option<Self> {
        let caps = CODE_PATTERN.captures(raw.trim())?;
        Some(Self {
            fund: caps[1].to_string(),
            program: caps[2].to_string(),
            function: caps[3].to_string(),
            object: caps[4].to_string(),
            location: caps[5].to_string(),
        })
    }

    pub fn literal(&self) -> String {
        format!(
            "{}-{}-{}-{}-{}",
            self.fund, self.program, self.function, self.object, self.location
        )
    }

    pub fn funding_category(&self) -> FundingCategory {
        FundingCategory::of_function(&self.function)
    }
}

/// The EPS funding categories used on the state side of the reconciliation.
/// Closed set; every account code maps to exactly one.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
pub enum FundingCategory {
    RegularInstruction,
    SpecialEducation,
    CareerTechnical,
    OtherInstruction,
    StudentStaffSupport,
    SystemAdmin,
    SchoolAdmin,
    Transportation,
    FacilitiesMaint,
    DebtService,
    AllOther,
}

impl FundingCategory {
    /// Total lookup over the function-segment table. Codes the table does
    /// not know fall into `AllOther`; this never fails.
    pub fn of_function(function: &str) -> Self {
        FUNCTION_TABLE
            .iter()
            .find(|(code, _, _)| *code == function)
            .map(|(_, _, category)| *category)
            .unwrap_or(FundingCategory::AllOther)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::RegularInstruction => "Regular Instruction",
            Self::SpecialEducation => "Special Education",
            Self::CareerTechnical => "Career & Technical Education",
            Self::OtherInstruction => "Other Instruction",
            Self::StudentStaffSupport => "Student & Staff Support",
            Self::SystemAdmin => "System Administration",
            Self::SchoolAdmin => "School Administration",
            Self::Transportation => "Transportation & Buses",
            Self::FacilitiesMaint => "Facilities Maintenance",
            Self::DebtService => "Debt Service",
            Self::AllOther => "All Other Expenditures",
        }
    }
}

/// Canonical name for a function code, if the table knows it.
pub fn function_name(function: &str) -> Option<&'static str> {
    FUNCTION_TABLE
        .iter()
        .find(|(code, _, _)| *code == function)
        .map(|(_, name, _)| *name)
}

// Frozen at startup; the Maine NEO function series. Loaded once, never
// mutated, shared freely across concurrent extractions.
const FUNCTION_TABLE: &[(&str, &str, FundingCategory)] = &[
    ("1000", "Regular Instruction", FundingCategory::RegularInstruction),
    ("1200", "Special Education", FundingCategory::SpecialEducation),
    ("1300", "Career & Technical Education", FundingCategory::CareerTechnical),
    ("1400", "Other Instruction", FundingCategory::OtherInstruction),
    ("9100", "Co-Curricular Activities", FundingCategory::OtherInstruction),
    ("9200", "Extra-Curricular Activities", FundingCategory::OtherInstruction),
    ("2110", "Social Work Services", FundingCategory::StudentStaffSupport),
    ("2120", "Guidance Services", FundingCategory::StudentStaffSupport),
    ("2130", "Health Services", FundingCategory::StudentStaffSupport),
    ("2140", "Psychological Services", FundingCategory::StudentStaffSupport),
    ("2150", "Speech & Audiology Services", FundingCategory::StudentStaffSupport),
    ("2210", "Improvement of Instruction", FundingCategory::StudentStaffSupport),
    ("2220", "Library & Media Services", FundingCategory::StudentStaffSupport),
    ("2230", "Instructional Technology", FundingCategory::StudentStaffSupport),
    ("2310", "School Board Services", FundingCategory::SystemAdmin),
    ("2320", "Superintendent's Office", FundingCategory::SystemAdmin),
    ("2500", "Business Services", FundingCategory::SystemAdmin),
    ("2400", "School Administration", FundingCategory::SchoolAdmin),
    ("2700", "Transportation", FundingCategory::Transportation),
    ("2600", "Facilities Maintenance", FundingCategory::FacilitiesMaint),
    ("5100", "Debt Service", FundingCategory::DebtService),
    ("3100", "Food Service", FundingCategory::AllOther),
];
