//! The monthly financial summary ("resumen financiero"): totals, spending per
//! category, budget item figures and suggestions for saving money.

mod aggregation;
mod handlers;
mod suggestions;

pub use handlers::{FinancialSummary, build_summary, get_summary_endpoint};
