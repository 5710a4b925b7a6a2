//! # EPS Report Normalizer
//!
//! A library for normalizing Maine school-district financial exports into a
//! single machine-consumable report structure. The source documents share
//! no schema: the same district's data may arrive as an ED279 state subsidy
//! allocation report, a budget-vs-actual comparative statement, or a
//! staffing roster, produced by different software in different years.
//!
//! ## Core Concepts
//!
//! - **Dialect**: which kind of report a document is; detected from sheet
//!   names and sampled text, or forced via a caller hint
//! - **Extraction engine**: a dialect-specific heuristic pass that locates
//!   semantically-named fields inside noisy tabular or free-text data
//! - **Account code**: the five-segment fund-program-function-object-location
//!   identifier on every detail row
//! - **Funding category**: the state's EPS taxonomy; every account code maps
//!   to exactly one, which is how the two accounting schemes reconcile
//!
//! The crate performs no I/O. The caller decodes the spreadsheet container
//! or runs the text-extraction pass and hands over a [`RawDocument`]; one
//! call produces one immutable [`NormalizedReport`]. Invocations share no
//! mutable state and may run concurrently.
//!
//! ## Example
//!
//! ```rust,ignore
//! use eps_report_normalizer::*;
//!
//! let doc: RawDocument = serde_json::from_str(&uploaded_json)?;
//! let report = normalize_document(&doc, DialectHint::Auto)?;
//! let envelope = ExportEnvelope::new(report);
//! println!("{}", envelope.to_json()?);
//! ```

pub mod account_code;
pub mod aggregate;
pub mod allocation;
pub mod assemble;
pub mod classifier;
pub mod comparative;
pub mod error;
pub mod scan;
pub mod schema;
pub mod staffing;

pub use account_code::{function_name, AccountCode, FundingCategory};
pub use allocation::AllocationEngine;
pub use assemble::ExportEnvelope;
pub use classifier::detect_dialect;
pub use error::{NormalizeError, Result};
pub use schema::*;

use log::{debug, info};

/// Tuning knobs for the backward-scan heuristics. The scans are explicitly
/// best-effort: any sufficiently large trailing number matches, so the
/// floors below are what keeps incidental values out of monetary fields.
#[derive(Debug, Clone)]
pub struct NormalizerOptions {
    /// Minimum magnitude for a cell to count as a monetary amount.
    pub monetary_floor: f64,
    /// Minimum magnitude for a tax-base valuation figure.
    pub valuation_floor: f64,
    /// Upper bound for a plausible resident pupil count.
    pub max_pupil_count: f64,
    /// Upper bound for a plausible mil rate.
    pub max_mil_rate: f64,
}

impl Default for NormalizerOptions {
    fn default() -> Self {
        Self {
            monetary_floor: 1000.0,
            valuation_floor: 1_000_000.0,
            max_pupil_count: 50_000.0,
            max_mil_rate: 100.0,
        }
    }
}

/// The full pipeline: classify the dialect, run the matching extraction
/// engine, and assemble the normalized report.
#[derive(Debug, Clone, Default)]
pub struct Normalizer {
    options: NormalizerOptions,
}

impl Normalizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: NormalizerOptions) -> Self {
        Self { options }
    }

    pub fn normalize(
        &self,
        doc: &RawDocument,
        hint: DialectHint,
    ) -> Result<NormalizedReport> {
        match doc {
            RawDocument::Workbook { sheets } if sheets.is_empty() => {
                return Err(NormalizeError::InputMissing)
            }
            RawDocument::Text { text } if text.trim().is_empty() => {
                return Err(NormalizeError::InputMissing)
            }
            RawDocument::Unrecognized { format } => {
                return Err(NormalizeError::UnsupportedFormat {
                    format: format.clone(),
                })
            }
            _ => {}
        }

        let dialect = detect_dialect(doc, hint)?;
        info!("normalizing document as {dialect} dialect");

        let extraction = match dialect {
            Dialect::Allocation => {
                let engine = AllocationEngine::new(&self.options);
                match doc {
                    RawDocument::Text { text } => engine.extract_text(text),
                    _ => {
                        let rows = doc
                            .first_sheet()
                            .map(|s| s.rows.as_slice())
                            .unwrap_or(&[]);
                        engine.extract_grid(rows)
                    }
                }
            }
            Dialect::Comparative => match doc {
                RawDocument::Workbook { sheets } => comparative::extract(sheets),
                _ => {
                    return Err(NormalizeError::ExtractionFailure {
                        dialect,
                        details: "comparative statements require a spreadsheet grid".to_string(),
                    })
                }
            },
            Dialect::Staffing => match doc {
                RawDocument::Workbook { sheets } => sheets
                    .first()
                    .map(staffing::extract)
                    .unwrap_or_default(),
                _ => {
                    return Err(NormalizeError::ExtractionFailure {
                        dialect,
                        details: "staffing rosters require a spreadsheet grid".to_string(),
                    })
                }
            },
        };

        debug!(
            "extraction produced {} summary rows, {} detail rows",
            extraction.summary.len(),
            extraction.details.len()
        );

        Ok(assemble::assemble(dialect, extraction))
    }
}

/// One-shot normalization with default options.
pub fn normalize_document(doc: &RawDocument, hint: DialectHint) -> Result<NormalizedReport> {
    Normalizer::new().normalize(doc, hint)
}
