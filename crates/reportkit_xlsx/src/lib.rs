//! `reportkit_xlsx` v1:
//! Hierarchical report layout kernel with an XLSX backend.
//!
//! Module layout:
//! - `conf`       : constants and default presets
//! - `spec`       : specs/models/options
//! - `error`      : crate error type
//! - `header`     : header tree checks, traversal and JSON parsing
//! - `layout`     : column/row header layout resolvers
//! - `coerce`     : value resolvers and type coercion
//! - `aggregate`  : group blocks, subtotal and grand-total planning
//! - `validation` : choice-list handles and cell bindings
//! - `emit`       : grid emitter
//! - `export`     : build pipeline facade
//! - `source`     : JSON and DataFrame record sources
//! - `util`       : pure helper functions
//! - `writer`     : pure-Rust workbook writer
pub mod aggregate;
pub mod coerce;
pub mod conf;
pub mod emit;
pub mod error;
pub mod export;
pub mod header;
pub mod layout;
pub mod source;
pub mod spec;
pub mod util;
pub mod validation;
pub mod writer;

pub use aggregate::{EnumPlannedRow, SpecAggregatePlan, aggregate};
pub use coerce::{SpecCoercedValue, resolve_raw_value};
pub use conf::{
    C_HANDLE_ID_CHOICES_PREFIX, C_HANDLE_ID_YES_NO, N_LEN_EXCEL_SHEET_NAME_MAX,
    N_NCOLS_EXCEL_MAX, N_NROWS_EXCEL_MAX, TUP_EXCEL_ILLEGAL, derive_default_report_options,
    derive_default_xlsx_formats, derive_default_xlsx_write_options,
};
pub use emit::GridEmitter;
pub use error::ReportError;
pub use export::{build_report_grid, build_report_grid_json};
pub use header::{
    collect_leaves, collect_nodes, parse_header_tree_json, parse_report_sheet_json,
    split_header_axes, validate_header_tree,
};
pub use layout::{derive_header_rect, resolve_column_layout, resolve_layout, resolve_row_layout};
pub use source::{derive_records_from_dataframe, derive_records_from_ipc_bytes, parse_records_json};
pub use spec::{
    EnumAutofitColumnsRule, EnumCellValue, EnumComputeOp, EnumHeaderType, EnumLayoutAxis,
    EnumStyleTag, EnumValueResolver, SpecAutofitCellsPolicy, SpecCellFormat, SpecDataRecord,
    SpecGridCell, SpecHeaderNode, SpecLayoutCell, SpecLayoutIndex, SpecMergeRange,
    SpecReportGrid, SpecReportOptions, SpecReportSheet, SpecRowHeightPolicy,
    SpecValidationBinding, SpecValidationHandle, SpecXlsxReport, SpecXlsxWriteOptions,
};
pub use util::{derive_cell_ref, derive_column_letters, derive_contiguous_ranges, sanitize_sheet_name};
pub use validation::ValidationRegistry;
pub use writer::XlsxWriter;
