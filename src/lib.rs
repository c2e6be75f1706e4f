//! # DuckDB Estimate Sheet Extension
//!
//! Reads loosely structured cost estimate spreadsheets and infers their layout:
//! label/value pairs, cost sections with their line items, keyword hits and
//! named summary totals.
//!
//! ## Features
//!
//! - **Formats**: Office Open XML workbooks (`.xlsx`, `.xlsm`, `.xlam`) and
//!   OpenDocument spreadsheets (`.ods`)
//! - **Read modes**: `raw` returns formula text, `computed` returns the results
//!   cached in the file
//! - **Configurable rules**: scan ranges, offsets, keyword lists and column
//!   layouts are all table function parameters
//!
//! ## Table Functions
//!
//! - `label_values`: text labels paired with their neighbouring value cells
//! - `line_items`: cost sections, their line items and total rows
//! - `keyword_matches`: cells mentioning cost keywords, across one or many sheets
//! - `summary_totals`: named totals read from anchor cells
//! - `formula_cells`: every formula with its label and cached result
//!
//! ## Logging
//!
//! Set `ESTIMATE_SHEET_LOG` (e.g. `estimate_sheet=debug`) to log to stderr.
extern crate duckdb;
extern crate duckdb_loadable_macros;
extern crate libduckdb_sys;

pub mod error;
pub mod extraction;
pub mod spreadsheet;

mod bridge;
mod extension;
mod helpers;

use crate::extension::formula_cells::FormulaCellsTableFunction;
use crate::extension::keyword_matches::KeywordMatchesTableFunction;
use crate::extension::label_values::LabelValuesTableFunction;
use crate::extension::line_items::LineItemsTableFunction;
use crate::extension::summary_totals::SummaryTotalsTableFunction;
use anyhow::{Context, Result};
use duckdb::Connection;
use duckdb_loadable_macros::duckdb_entrypoint_c_api;
use libduckdb_sys as ffi;
use tracing_subscriber::EnvFilter;

const LOG_ENV: &str = "ESTIMATE_SHEET_LOG";

/// Installs a stderr subscriber, silent unless `ESTIMATE_SHEET_LOG` is set.
/// The host process may already own a global subscriber, so failure is ignored.
fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("off"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Extension entry point for DuckDB.
///
/// Registers the five estimate table functions on the connection.
///
/// # Errors
///
/// Returns an error if any table function fails to register with DuckDB.
#[duckdb_entrypoint_c_api()]
pub unsafe fn extension_entrypoint(connection: Connection) -> Result<()> {
    init_tracing();
    connection
        .register_table_function::<LabelValuesTableFunction>("label_values")
        .context("Failed to register label_values table function")?;
    connection
        .register_table_function::<LineItemsTableFunction>("line_items")
        .context("Failed to register line_items table function")?;
    connection
        .register_table_function::<KeywordMatchesTableFunction>("keyword_matches")
        .context("Failed to register keyword_matches table function")?;
    connection
        .register_table_function::<SummaryTotalsTableFunction>("summary_totals")
        .context("Failed to register summary_totals table function")?;
    connection
        .register_table_function::<FormulaCellsTableFunction>("formula_cells")
        .context("Failed to register formula_cells table function")?;
    tracing::debug!("registered estimate table functions");
    Ok(())
}
