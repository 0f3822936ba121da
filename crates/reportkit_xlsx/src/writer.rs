//! XLSX writer kernel that materializes report grids into workbook sheets.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use polars::prelude::DataFrame;
use rust_xlsxwriter::{
    DataValidation, Format, FormatAlign, FormatBorder, Formula, Note, Workbook, Worksheet,
};

use crate::conf::{
    C_SHEET_NAME_LISTS, N_LEN_EXCEL_LIST_VALIDATION_MAX, N_LEN_EXCEL_SHEET_NAME_MAX,
};
use crate::error::ReportError;
use crate::export::build_report_grid;
use crate::source::{derive_records_from_dataframe, derive_records_from_ipc_bytes};
use crate::spec::{
    EnumAutofitColumnsRule, EnumCellValue, EnumStyleTag, SpecAutofitCellsPolicy, SpecCellFormat,
    SpecDataRecord, SpecGridCell, SpecMergeRange, SpecReportGrid, SpecReportSheet,
    SpecValidationHandle, SpecXlsxReport, SpecXlsxWriteOptions,
};
use crate::util::{
    create_sheet_identifier, derive_column_letters, derive_contiguous_ranges,
    estimate_unicode_string_width, sanitize_sheet_name,
};

/// Stateful workbook writer.
pub struct XlsxWriter {
    path_file_out: PathBuf,
    workbook: Workbook,
    dict_formats: BTreeMap<EnumStyleTag, SpecCellFormat>,
    write_options: SpecXlsxWriteOptions,
    set_sheet_names_existing: BTreeSet<String>,
    /// Choice lists parked on the hidden list sheet, in column order.
    l_long_lists: Vec<Vec<String>>,
    l_reports: Vec<SpecXlsxReport>,
    if_closed: bool,
}

impl XlsxWriter {
    /// Create writer bound to output path and format/options presets.
    ///
    /// The workbook is buffered in memory until [`Self::close`] is called.
    pub fn new(
        path_file_out: PathBuf,
        dict_formats: BTreeMap<EnumStyleTag, SpecCellFormat>,
        write_options: SpecXlsxWriteOptions,
    ) -> Self {
        Self {
            path_file_out,
            workbook: Workbook::new(),
            dict_formats,
            write_options,
            set_sheet_names_existing: BTreeSet::from([C_SHEET_NAME_LISTS.to_lowercase()]),
            l_long_lists: Vec::new(),
            l_reports: Vec::new(),
            if_closed: false,
        }
    }

    /// Return output file path as string.
    pub fn file_out(&self) -> String {
        self.path_file_out.to_string_lossy().to_string()
    }

    /// Return immutable snapshot of per-sheet write reports.
    pub fn report(&self) -> Vec<SpecXlsxReport> {
        self.l_reports.clone()
    }

    /// Flush workbook to disk. Idempotent.
    pub fn close(&mut self) -> Result<(), ReportError> {
        if self.if_closed {
            return Ok(());
        }
        if !self.l_long_lists.is_empty() {
            let worksheet = self.workbook.add_worksheet();
            worksheet.set_name(C_SHEET_NAME_LISTS)?;
            worksheet.set_hidden(true);
            for (n_idx_col, l_values) in self.l_long_lists.iter().enumerate() {
                for (n_idx_row, c_value) in l_values.iter().enumerate() {
                    worksheet.write_string(
                        cast_row_num(n_idx_row)?,
                        cast_col_num(n_idx_col)?,
                        c_value,
                    )?;
                }
            }
        }
        self.workbook.save(&self.path_file_out)?;
        self.if_closed = true;
        tracing::info!(file = %self.file_out(), sheets = self.l_reports.len(), "saved workbook");
        Ok(())
    }

    /// Build and write one report sheet from in-memory records.
    pub fn write_report(
        &mut self,
        sheet_name: &str,
        sheet: &SpecReportSheet,
        records: &[SpecDataRecord],
    ) -> Result<(), ReportError> {
        if self.if_closed {
            return Err(ReportError::Closed);
        }
        let span = tracing::info_span!("write_report", sheet = sheet_name);
        let _enter = span.enter();

        let grid = build_report_grid(sheet, records)?;
        self.write_grid(sheet_name, &grid)
    }

    /// Write one report sheet whose records come from a DataFrame.
    pub fn write_report_from_dataframe(
        &mut self,
        sheet_name: &str,
        sheet: &SpecReportSheet,
        df: &DataFrame,
        group_col: Option<&str>,
        row_key_col: Option<&str>,
    ) -> Result<(), ReportError> {
        if self.if_closed {
            return Err(ReportError::Closed);
        }
        let l_records = derive_records_from_dataframe(df, group_col, row_key_col)?;
        self.write_report(sheet_name, sheet, &l_records)
    }

    /// Write one report sheet whose records come from IPC-serialized DataFrame bytes.
    pub fn write_report_from_ipc_bytes(
        &mut self,
        sheet_name: &str,
        sheet: &SpecReportSheet,
        v_ipc_df: &[u8],
        group_col: Option<&str>,
        row_key_col: Option<&str>,
    ) -> Result<(), ReportError> {
        if self.if_closed {
            return Err(ReportError::Closed);
        }
        let l_records = derive_records_from_ipc_bytes(v_ipc_df, group_col, row_key_col)?;
        self.write_report(sheet_name, sheet, &l_records)
    }

    /// Materialize an already built grid as a new worksheet.
    pub fn write_grid(&mut self, sheet_name: &str, grid: &SpecReportGrid) -> Result<(), ReportError> {
        if self.if_closed {
            return Err(ReportError::Closed);
        }
        validate_policy_autofit(&self.write_options.policy_autofit)?;

        let sheet_name_unique = self.derive_unique_sheet_name(&sanitize_sheet_name(sheet_name, "_"));
        let mut report = SpecXlsxReport {
            sheet_name: sheet_name_unique.clone(),
            n_rows: grid.n_rows,
            n_cols: grid.n_cols,
            warnings: Vec::new(),
        };
        for c_warning in &grid.warnings {
            report.warn(c_warning);
        }

        let dict_rust_formats: BTreeMap<EnumStyleTag, Format> = self
            .dict_formats
            .iter()
            .map(|(tag, spec)| {
                let spec_final = spec.merge(&self.write_options.base_format_patch);
                (*tag, derive_rust_xlsx_format(&spec_final))
            })
            .collect();
        let fmt_fallback = Format::new();

        let dict_validations = self.derive_validations(&grid.handles)?;
        let write_options = self.write_options.clone();

        let worksheet = self.workbook.add_worksheet();
        worksheet.set_name(&sheet_name_unique)?;

        // Merge anchors are written through merge_range, which fills the whole block.
        let dict_merges: BTreeMap<(usize, usize), &SpecMergeRange> = grid
            .merges
            .iter()
            .map(|merge| ((merge.row_first, merge.col_first), merge))
            .collect();

        for cell in &grid.cells {
            let format = dict_rust_formats.get(&cell.style).unwrap_or(&fmt_fallback);
            match dict_merges.get(&(cell.row, cell.col)) {
                Some(merge) => {
                    worksheet.merge_range(
                        cast_row_num(merge.row_first - 1)?,
                        cast_col_num(merge.col_first - 1)?,
                        cast_row_num(merge.row_last - 1)?,
                        cast_col_num(merge.col_last - 1)?,
                        &cell.value.display_text(),
                        format,
                    )?;
                }
                None => write_cell_with_format(worksheet, cell, format)?,
            }

            if let Some(c_note) = &cell.note {
                let note = Note::new(c_note.as_str()).add_author_prefix(false);
                worksheet.insert_note(cast_row_num(cell.row - 1)?, cast_col_num(cell.col - 1)?, &note)?;
            }
        }

        write_validations(worksheet, grid, &dict_validations)?;

        for (n_row, n_height) in &grid.row_heights {
            worksheet.set_row_height(cast_row_num(*n_row - 1)?, *n_height)?;
        }
        for (n_col, n_width) in derive_column_widths(grid, &write_options.policy_autofit) {
            worksheet.set_column_width(cast_col_num(n_col - 1)?, n_width)?;
        }

        if write_options.if_freeze_header && (grid.header_rows > 0 || grid.header_cols > 0) {
            worksheet.set_freeze_panes(
                cast_row_num(grid.header_rows)?,
                cast_col_num(grid.header_cols)?,
            )?;
        }

        tracing::debug!(
            sheet = %sheet_name_unique,
            rows = grid.n_rows,
            cols = grid.n_cols,
            "wrote report sheet"
        );
        self.l_reports.push(report);
        Ok(())
    }

    /// One list validation per handle; long lists move to the hidden list sheet.
    fn derive_validations(
        &mut self,
        handles: &[SpecValidationHandle],
    ) -> Result<BTreeMap<String, DataValidation>, ReportError> {
        let mut dict_validations = BTreeMap::new();
        for handle in handles {
            let n_len_joined = handle.values.iter().map(|v| v.chars().count() + 1).sum::<usize>();
            let validation = if n_len_joined.saturating_sub(1) <= N_LEN_EXCEL_LIST_VALIDATION_MAX {
                let l_values = handle.values.iter().map(String::as_str).collect::<Vec<_>>();
                DataValidation::new().allow_list_strings(&l_values)?
            } else {
                let n_idx_col = match self.l_long_lists.iter().position(|l| l == &handle.values) {
                    Some(n_idx) => n_idx,
                    None => {
                        self.l_long_lists.push(handle.values.clone());
                        self.l_long_lists.len() - 1
                    }
                };
                let c_col = derive_column_letters(n_idx_col + 1);
                let c_range = format!(
                    "'{C_SHEET_NAME_LISTS}'!${c_col}$1:${c_col}${}",
                    handle.values.len()
                );
                DataValidation::new().allow_list_formula(Formula::new(c_range))
            };
            let validation =
                validation.set_error_title(self.write_options.validation_error_title.as_str())?;
            dict_validations.insert(handle.id.clone(), validation);
        }
        Ok(dict_validations)
    }

    /// Excel compares sheet names case-insensitively, so the set holds
    /// lowercased names.
    fn derive_unique_sheet_name(&mut self, name: &str) -> String {
        if self.set_sheet_names_existing.insert(name.to_lowercase()) {
            return name.to_string();
        }

        let base_name: String = name
            .chars()
            .take(usize::max(1, N_LEN_EXCEL_SHEET_NAME_MAX - 3))
            .collect();

        let mut n_idx = 2usize;
        loop {
            let candidate = create_sheet_identifier(&base_name, n_idx);
            if self.set_sheet_names_existing.insert(candidate.to_lowercase()) {
                return candidate;
            }
            n_idx += 1;
        }
    }
}

fn write_cell_with_format(
    worksheet: &mut Worksheet,
    cell: &SpecGridCell,
    format: &Format,
) -> Result<(), ReportError> {
    let n_row = cast_row_num(cell.row - 1)?;
    let n_col = cast_col_num(cell.col - 1)?;
    match &cell.value {
        EnumCellValue::None => {
            worksheet.write_blank(n_row, n_col, format)?;
        }
        EnumCellValue::String(val) if val.is_empty() => {
            worksheet.write_blank(n_row, n_col, format)?;
        }
        EnumCellValue::String(val) => {
            worksheet.write_string_with_format(n_row, n_col, val, format)?;
        }
        EnumCellValue::Number(val) => {
            worksheet.write_number_with_format(n_row, n_col, *val, format)?;
        }
        EnumCellValue::Formula(val) => {
            worksheet.write_formula_with_format(n_row, n_col, val.as_str(), format)?;
        }
    }
    Ok(())
}

/// Attach validations over contiguous row runs per `(handle, column)`.
fn write_validations(
    worksheet: &mut Worksheet,
    grid: &SpecReportGrid,
    dict_validations: &BTreeMap<String, DataValidation>,
) -> Result<(), ReportError> {
    let mut dict_rows: BTreeMap<(&str, usize), Vec<usize>> = BTreeMap::new();
    for binding in &grid.bindings {
        dict_rows
            .entry((binding.handle_id.as_str(), binding.col))
            .or_default()
            .push(binding.row);
    }

    for ((handle_id, n_col), mut l_rows) in dict_rows {
        let Some(validation) = dict_validations.get(handle_id) else {
            continue;
        };
        l_rows.sort_unstable();
        l_rows.dedup();
        for (n_row_start, n_row_end) in derive_contiguous_ranges(&l_rows) {
            worksheet.add_data_validation(
                cast_row_num(n_row_start - 1)?,
                cast_col_num(n_col - 1)?,
                cast_row_num(n_row_end - 1)?,
                cast_col_num(n_col - 1)?,
                validation,
            )?;
        }
    }
    Ok(())
}

/// Final width per used column: width hints first, then the autofit rule.
fn derive_column_widths(
    grid: &SpecReportGrid,
    policy_autofit: &SpecAutofitCellsPolicy,
) -> BTreeMap<usize, f64> {
    let mut dict_widths: BTreeMap<usize, f64> = BTreeMap::new();
    if policy_autofit.rule_columns != EnumAutofitColumnsRule::None {
        let set_merged_anchors: BTreeSet<(usize, usize)> = grid
            .merges
            .iter()
            .filter(|merge| merge.col_first != merge.col_last)
            .map(|merge| (merge.row_first, merge.col_first))
            .collect();

        let mut dict_measured: BTreeMap<usize, usize> = BTreeMap::new();
        for cell in &grid.cells {
            if set_merged_anchors.contains(&(cell.row, cell.col)) {
                continue;
            }
            let if_header = matches!(cell.style, EnumStyleTag::Header | EnumStyleTag::RowHeader);
            if !if_header && policy_autofit.rule_columns == EnumAutofitColumnsRule::Header {
                continue;
            }
            let n_width = estimate_width_len(&cell.value);
            let n_prev = dict_measured.entry(cell.col).or_default();
            *n_prev = usize::max(*n_prev, n_width);
        }

        let n_min = usize::max(1, policy_autofit.width_cell_min);
        let n_max = usize::min(255, usize::max(n_min, policy_autofit.width_cell_max));
        for (n_col, n_width) in dict_measured {
            let n_width_final = usize::min(
                n_max,
                usize::max(n_min, n_width + policy_autofit.width_cell_padding),
            );
            dict_widths.insert(n_col, n_width_final as f64);
        }
    }

    for (n_col, n_width) in &grid.column_widths {
        dict_widths.insert(*n_col, *n_width);
    }
    dict_widths
}

/// Estimate displayed width units for one cell value.
pub fn estimate_width_len(value: &EnumCellValue) -> usize {
    match value {
        EnumCellValue::None => 0,
        EnumCellValue::String(s) => estimate_unicode_string_width(s),
        EnumCellValue::Number(n) => format!("{n:.2}").len(),
        // Formula text is not what the cell displays.
        EnumCellValue::Formula(_) => 0,
    }
}

fn derive_rust_xlsx_format(spec: &SpecCellFormat) -> Format {
    let mut format = Format::new();

    if let Some(val) = &spec.font_name {
        format = format.set_font_name(val.clone());
    }
    if let Some(val) = spec.font_size {
        format = format.set_font_size(val as f64);
    }
    if spec.bold.unwrap_or(false) {
        format = format.set_bold();
    }
    if spec.italic.unwrap_or(false) {
        format = format.set_italic();
    }

    if let Some(align) = spec.align.as_deref().and_then(derive_format_align) {
        format = format.set_align(align);
    }
    if let Some(valign) = spec.valign.as_deref().and_then(derive_format_valign) {
        format = format.set_align(valign);
    }

    if let Some(val) = &spec.num_format {
        format = format.set_num_format(val.clone());
    }
    if let Some(val) = &spec.bg_color {
        format = format.set_background_color(val.as_str());
    }
    if let Some(val) = &spec.font_color {
        format = format.set_font_color(val.as_str());
    }
    if let Some(border) = spec.border.and_then(derive_format_border) {
        format = format.set_border(border);
    }
    if spec.text_wrap.unwrap_or(false) {
        format = format.set_text_wrap();
    }

    match spec.locked {
        Some(true) => format = format.set_locked(),
        Some(false) => format = format.set_unlocked(),
        None => {}
    }

    format
}

/// Border styles by preset level: 0 none, 1 thin (body cells), 2 medium
/// (totals), then the remaining Excel line styles.
const L_FORMAT_BORDERS: [FormatBorder; 8] = [
    FormatBorder::None,
    FormatBorder::Thin,
    FormatBorder::Medium,
    FormatBorder::Dashed,
    FormatBorder::Dotted,
    FormatBorder::Thick,
    FormatBorder::Double,
    FormatBorder::Hair,
];

fn derive_format_border(border: i64) -> Option<FormatBorder> {
    usize::try_from(border)
        .ok()
        .and_then(|n_idx| L_FORMAT_BORDERS.get(n_idx).copied())
}

fn derive_format_align(align: &str) -> Option<FormatAlign> {
    match align.trim().to_ascii_lowercase().as_str() {
        "general" => Some(FormatAlign::General),
        "left" => Some(FormatAlign::Left),
        "center" => Some(FormatAlign::Center),
        "right" => Some(FormatAlign::Right),
        "fill" => Some(FormatAlign::Fill),
        "justify" => Some(FormatAlign::Justify),
        "center_across" => Some(FormatAlign::CenterAcross),
        _ => None,
    }
}

/// Vertical placement; `center` here means vertical center.
fn derive_format_valign(valign: &str) -> Option<FormatAlign> {
    match valign.trim().to_ascii_lowercase().as_str() {
        "top" => Some(FormatAlign::Top),
        "bottom" => Some(FormatAlign::Bottom),
        "center" | "vcenter" | "vertical_center" => Some(FormatAlign::VerticalCenter),
        "justify" => Some(FormatAlign::VerticalJustify),
        "distributed" => Some(FormatAlign::VerticalDistributed),
        _ => None,
    }
}

fn validate_policy_autofit(policy_autofit: &SpecAutofitCellsPolicy) -> Result<(), ReportError> {
    if policy_autofit.width_cell_min == 0 {
        return Err(ReportError::InvalidOption(
            "policy_autofit.width_cell_min must be >= 1".to_string(),
        ));
    }
    if policy_autofit.width_cell_max < policy_autofit.width_cell_min {
        return Err(ReportError::InvalidOption(
            "policy_autofit.width_cell_max must be >= policy_autofit.width_cell_min".to_string(),
        ));
    }
    Ok(())
}

fn cast_row_num(value: usize) -> Result<u32, ReportError> {
    u32::try_from(value).map_err(|_| ReportError::Limit(format!("row index overflow: {value}")))
}

fn cast_col_num(value: usize) -> Result<u16, ReportError> {
    u16::try_from(value).map_err(|_| ReportError::Limit(format!("column index overflow: {value}")))
}
