//! Report constants and default preset factories.

use std::collections::BTreeMap;

use crate::spec::{EnumStyleTag, SpecCellFormat, SpecReportOptions, SpecXlsxWriteOptions};

/// Excel worksheet maximum row count.
pub const N_NROWS_EXCEL_MAX: usize = 1_048_576;
/// Excel worksheet maximum column count.
pub const N_NCOLS_EXCEL_MAX: usize = 16_384;
/// Excel sheet name maximum length.
pub const N_LEN_EXCEL_SHEET_NAME_MAX: usize = 31;
/// Characters not allowed in sheet names.
pub const TUP_EXCEL_ILLEGAL: [&str; 7] = ["*", ":", "?", "/", "\\", "[", "]"];
/// Excel cap on the comma-joined text of an inline list validation.
pub const N_LEN_EXCEL_LIST_VALIDATION_MAX: usize = 255;
/// Hidden sheet holding choice lists too long for inline validations.
pub const C_SHEET_NAME_LISTS: &str = "__lists__";

/// Label written in place of date-typed header labels.
pub const C_LABEL_DATE_HEADER: &str = "Date";
/// Boolean labels.
pub const C_LABEL_YES: &str = "Yes";
pub const C_LABEL_NO: &str = "No";
/// Canonical yes/no header label recognized in legacy single-axis reports.
pub const C_LABEL_YES_NO_HEADER: &str = "Yes/No";
pub const C_LABEL_SUBTOTAL: &str = "Subtotal";
pub const C_LABEL_TOTAL: &str = "Total";

/// Stable id of the shared yes/no validation handle.
pub const C_HANDLE_ID_YES_NO: &str = "boolean-yes-no";
/// Prefix of per-header choice handles (`choices:<header id>`).
pub const C_HANDLE_ID_CHOICES_PREFIX: &str = "choices:";

/// Row height defaults (points / characters).
pub const N_ROW_HEIGHT_CHARS_THRESHOLD: usize = 50;
pub const N_ROW_HEIGHT_CHARS_PER_LINE: usize = 50;
pub const N_ROW_HEIGHT_PER_LINE: f64 = 15.0;
pub const N_ROW_HEIGHT_EXCEL_MAX: f64 = 409.0;

/// Build default format presets keyed by style tag.
pub fn derive_default_xlsx_formats() -> BTreeMap<EnumStyleTag, SpecCellFormat> {
    let cfg_base_fmt_spec = SpecCellFormat {
        font_name: Some("Times New Roman".to_string()),
        font_size: Some(11),
        border: Some(1),
        align: Some("left".to_string()),
        valign: Some("vcenter".to_string()),
        ..Default::default()
    };
    let cfg_header_fmt_spec = cfg_base_fmt_spec.with_(SpecCellFormat {
        bold: Some(true),
        align: Some("center".to_string()),
        text_wrap: Some(true),
        bg_color: Some("#D9E1F2".to_string()),
        ..Default::default()
    });

    let mut dict_fmt = BTreeMap::new();
    dict_fmt.insert(EnumStyleTag::Text, cfg_base_fmt_spec.clone());
    dict_fmt.insert(EnumStyleTag::Header, cfg_header_fmt_spec.clone());
    dict_fmt.insert(
        EnumStyleTag::RowHeader,
        cfg_header_fmt_spec.with_(SpecCellFormat {
            align: Some("left".to_string()),
            ..Default::default()
        }),
    );
    dict_fmt.insert(
        EnumStyleTag::Banner,
        cfg_base_fmt_spec.with_(SpecCellFormat {
            bold: Some(true),
            bg_color: Some("#F2F2F2".to_string()),
            ..Default::default()
        }),
    );
    dict_fmt.insert(
        EnumStyleTag::Integer,
        cfg_base_fmt_spec.with_(SpecCellFormat {
            num_format: Some("0".to_string()),
            ..Default::default()
        }),
    );
    dict_fmt.insert(
        EnumStyleTag::Decimal,
        cfg_base_fmt_spec.with_(SpecCellFormat {
            num_format: Some("0.00".to_string()),
            ..Default::default()
        }),
    );
    dict_fmt.insert(
        EnumStyleTag::ReadOnly,
        cfg_base_fmt_spec.with_(SpecCellFormat {
            bg_color: Some("#BFBFBF".to_string()),
            locked: Some(true),
            ..Default::default()
        }),
    );
    dict_fmt.insert(
        EnumStyleTag::Formula,
        cfg_base_fmt_spec.with_(SpecCellFormat {
            num_format: Some("0.00".to_string()),
            italic: Some(true),
            locked: Some(true),
            ..Default::default()
        }),
    );
    dict_fmt.insert(
        EnumStyleTag::Subtotal,
        cfg_base_fmt_spec.with_(SpecCellFormat {
            bold: Some(true),
            num_format: Some("0.00".to_string()),
            ..Default::default()
        }),
    );
    dict_fmt.insert(
        EnumStyleTag::Total,
        cfg_base_fmt_spec.with_(SpecCellFormat {
            bold: Some(true),
            num_format: Some("0.00".to_string()),
            border: Some(2),
            ..Default::default()
        }),
    );

    dict_fmt
}

/// Build default write options.
pub fn derive_default_xlsx_write_options() -> SpecXlsxWriteOptions {
    SpecXlsxWriteOptions::default()
}

/// Build default per-sheet report options.
pub fn derive_default_report_options() -> SpecReportOptions {
    SpecReportOptions::default()
}
