//! Final assembly: a pure merge of the classifier decision, engine output,
//! and derived rollups. No extraction logic lives here, and nothing the
//! engines produced is mutated; missing metadata is defaulted and derived
//! sections are attached.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::Serialize;

use crate::aggregate::{category_breakdown, expenditure_totals, synthesize_summary};
use crate::error::Result;
use crate::schema::{Dialect, Extraction, NormalizedReport};

const UNKNOWN: &str = "Unknown";

pub fn assemble(dialect: Dialect, extraction: Extraction) -> NormalizedReport {
    let Extraction {
        district,
        fiscal_year,
        generated_on,
        summary,
        details,
        allocation,
        staffing,
    } = extraction;

    // Aggregation fallback: only when the dialect produced detail rows but
    // no native summary.
    let summary = if summary.is_empty() && !details.is_empty() {
        synthesize_summary(&details)
    } else {
        summary
    };

    let category_breakdown = if details.is_empty() {
        None
    } else {
        Some(category_breakdown(&details))
    };

    let totals = expenditure_totals(&details);

    NormalizedReport {
        dialect,
        district: district.unwrap_or_else(|| UNKNOWN.to_string()),
        fiscal_year: fiscal_year.unwrap_or_else(|| UNKNOWN.to_string()),
        generated_on: generated_on.unwrap_or_else(|| UNKNOWN.to_string()),
        summary,
        details,
        totals,
        allocation,
        category_breakdown,
        staffing,
    }
}

/// The metadata envelope wrapped around a report for handoff to the
/// downstream budget-analysis system. This JSON form is the sole durable
/// interchange format; there is no other persisted state.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct ExportEnvelope {
    pub district: String,
    pub fiscal_year: String,
    pub dialect: Dialect,
    /// Generation date as printed on the source document.
    pub generated_on: String,
    /// When this envelope was produced.
    pub exported_at: DateTime<Utc>,
    pub tool: String,
    pub report: NormalizedReport,
}

impl ExportEnvelope {
    pub fn new(report: NormalizedReport) -> Self {
        Self {
            district: report.district.clone(),
            fiscal_year: report.fiscal_year.clone(),
            dialect: report.dialect,
            generated_on: report.generated_on.clone(),
            exported_at: Utc::now(),
            tool: concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")).to_string(),
            report,
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn schema_as_json() -> Result<String> {
        let schema = schemars::schema_for!(ExportEnvelope);
        Ok(serde_json::to_string_pretty(&schema)?)
    }
}
