//! Summary synthesis and cross-taxonomy rollups. Runs when a dialect's
//! native summary is missing: detail rows are regrouped by their function
//! segment so every report ends up with a comparable category view.
//!
//! Totals and groupings are computed strictly over expenditure rows
//! (budget > 0); revenue-flagged and non-conforming rows never contribute.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::account_code::{function_name, FundingCategory};
use crate::schema::{CategoryAmounts, LineItem, ReportTotals, SummaryRow};

/// Groups expenditure line items by function segment and synthesizes one
/// summary row per group, labeled "`<code>` – `<function name>`", sorted
/// descending by budget.
pub fn synthesize_summary(details: &[LineItem]) -> Vec<SummaryRow> {
    let mut groups: BTreeMap<&str, (f64, f64, f64)> = BTreeMap::new();
    for item in details.iter().filter(|i| i.budget > 0.0) {
        let entry = groups
            .entry(item.account_code.function.as_str())
            .or_insert((0.0, 0.0, 0.0));
        entry.0 += item.budget;
        entry.1 += item.actual;
        entry.2 += item.encumbered;
    }

    let mut rows: Vec<SummaryRow> = groups
        .into_iter()
        .map(|(function, (budget, actual, encumbered))| {
            let name = function_name(function)
                .map(str::to_string)
                .unwrap_or_else(|| format!("Function {function}"));
            SummaryRow::new(
                format!("{function} – {name}"),
                budget,
                actual,
                encumbered,
                budget - actual - encumbered,
            )
        })
        .collect();

    rows.sort_by(|a, b| b.budget.partial_cmp(&a.budget).unwrap_or(Ordering::Equal));
    rows
}

/// The funding-category reconciliation map: account-code spending summed
/// into the state's EPS categories.
pub fn category_breakdown(details: &[LineItem]) -> BTreeMap<FundingCategory, CategoryAmounts> {
    let mut map: BTreeMap<FundingCategory, CategoryAmounts> = BTreeMap::new();
    for item in details.iter().filter(|i| i.budget > 0.0) {
        let entry = map.entry(item.funding_category).or_default();
        entry.budget += item.budget;
        entry.actual += item.actual;
    }
    map
}

pub fn expenditure_totals(details: &[LineItem]) -> ReportTotals {
    let mut totals = ReportTotals::default();
    for item in details.iter().filter(|i| i.budget > 0.0) {
        totals.budget += item.budget;
        totals.actual += item.actual;
        totals.encumbered += item.encumbered;
        totals.available += item.available;
    }
    totals
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account_code::AccountCode;

    fn item(code: &str, budget: f64, actual: f64, encumbered: f64) -> LineItem {
        LineItem::new(
            AccountCode::parse(code).unwrap(),
            String::new(),
            budget,
            actual,
            encumbered,
            budget - actual - encumbered,
        )
    }

    #[test]
    fn test_synthesize_groups_by_function() {
        let details = vec![
            item("1000-1100-2700-5000-010", 10000.0, 4000.0, 1000.0),
            item("1000-1100-2700-5100-010", 5000.0, 2000.0, 0.0),
            item("1000-1100-1000-1010-010", 80000.0, 60000.0, 0.0),
        ];
        let rows = synthesize_summary(&details);
        assert_eq!(rows.len(), 2);
        // sorted descending by budget
        assert_eq!(rows[0].category, "1000 – Regular Instruction");
        assert_eq!(rows[0].budget, 80000.0);
        assert_eq!(rows[1].category, "2700 – Transportation");
        assert_eq!(rows[1].budget, 15000.0);
        assert_eq!(rows[1].actual, 6000.0);
        assert_eq!(rows[1].available, 8000.0);
    }

    #[test]
    fn test_synthesize_labels_unknown_functions() {
        let details = vec![item("1000-1100-7777-5000-010", 1000.0, 0.0, 0.0)];
        let rows = synthesize_summary(&details);
        assert_eq!(rows[0].category, "7777 – Function 7777");
    }

    #[test]
    fn test_revenue_rows_excluded_everywhere() {
        let details = vec![
            item("1000-1100-1000-1010-010", 1000.0, 500.0, 0.0),
            item("1000-1100-1000-1020-010", -400.0, -100.0, 0.0),
        ];
        assert_eq!(synthesize_summary(&details)[0].budget, 1000.0);
        assert_eq!(expenditure_totals(&details).budget, 1000.0);
        let breakdown = category_breakdown(&details);
        assert_eq!(
            breakdown
                .get(&FundingCategory::RegularInstruction)
                .unwrap()
                .budget,
            1000.0
        );
    }

    #[test]
    fn test_category_breakdown_sums_budget_and_actual() {
        let details = vec![
            item("1000-1100-1000-1010-010", 1000.0, 800.0, 0.0),
            item("1000-1200-1000-1010-020", 500.0, 200.0, 0.0),
            item("1000-1100-2700-5000-010", 300.0, 100.0, 0.0),
        ];
        let breakdown = category_breakdown(&details);
        let regular = breakdown.get(&FundingCategory::RegularInstruction).unwrap();
        assert_eq!(regular.budget, 1500.0);
        assert_eq!(regular.actual, 1000.0);
        let transport = breakdown.get(&FundingCategory::Transportation).unwrap();
        assert_eq!(transport.budget, 300.0);
    }

    #[test]
    fn test_totals_match_detail_sums() {
        let details = vec![
            item("1000-1100-1000-1010-010", 1000.0, 800.0, 100.0),
            item("1000-1100-2700-5000-010", 500.0, 200.0, 0.0),
        ];
        let totals = expenditure_totals(&details);
        assert_eq!(totals.budget, 1500.0);
        assert_eq!(totals.actual, 1000.0);
        assert_eq!(totals.encumbered, 100.0);
        assert_eq!(totals.available, 400.0);
    }
}
