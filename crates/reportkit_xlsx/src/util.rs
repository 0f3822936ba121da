//! Stateless helper utilities shared by the layout, emit and writer stages.

use crate::conf::{N_LEN_EXCEL_SHEET_NAME_MAX, TUP_EXCEL_ILLEGAL};
use crate::spec::SpecRowHeightPolicy;

////////////////////////////////////////////////////////////////////////////////
// #region CellAddressing

/// Convert a 1-based column number to base-26 letters (`1 -> A`, `27 -> AA`).
///
/// Column `0` has no letter form and yields an empty string.
pub fn derive_column_letters(col: usize) -> String {
    let mut n_rest = col;
    let mut l_chars = Vec::new();
    while n_rest > 0 {
        let n_rem = (n_rest - 1) % 26;
        l_chars.push((b'A' + n_rem as u8) as char);
        n_rest = (n_rest - 1) / 26;
    }
    l_chars.iter().rev().collect()
}

/// A1-style reference for 1-based `(row, col)`.
pub fn derive_cell_ref(row: usize, col: usize) -> String {
    format!("{}{row}", derive_column_letters(col))
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region FormulaBuilders

/// `=SUM(X<row_start>:X<row_end>)` over one column.
pub fn create_column_range_sum_formula(col: usize, row_start: usize, row_end: usize) -> String {
    format!(
        "=SUM({}:{})",
        derive_cell_ref(row_start, col),
        derive_cell_ref(row_end, col)
    )
}

/// `=SUM(<ref1>,<ref2>,...)` over disjoint references.
pub fn create_refs_sum_formula(refs: &[String]) -> String {
    format!("=SUM({})", refs.join(","))
}

/// Sum of several columns within one row; contiguous runs collapse to ranges.
pub fn create_row_sum_formula(row: usize, cols: &[usize]) -> String {
    let mut l_cols = cols.to_vec();
    l_cols.sort_unstable();
    l_cols.dedup();

    let l_parts = derive_contiguous_ranges(&l_cols)
        .into_iter()
        .map(|(n_start, n_end)| {
            if n_start == n_end {
                derive_cell_ref(row, n_start)
            } else {
                format!(
                    "{}:{}",
                    derive_cell_ref(row, n_start),
                    derive_cell_ref(row, n_end)
                )
            }
        })
        .collect::<Vec<_>>();
    format!("=SUM({})", l_parts.join(","))
}

/// Sum of several rows within one column; contiguous runs collapse to ranges.
pub fn create_column_sum_formula(col: usize, rows: &[usize]) -> String {
    let mut l_rows = rows.to_vec();
    l_rows.sort_unstable();
    l_rows.dedup();

    let l_parts = derive_contiguous_ranges(&l_rows)
        .into_iter()
        .map(|(n_start, n_end)| {
            if n_start == n_end {
                derive_cell_ref(n_start, col)
            } else {
                format!(
                    "{}:{}",
                    derive_cell_ref(n_start, col),
                    derive_cell_ref(n_end, col)
                )
            }
        })
        .collect::<Vec<_>>();
    format!("=SUM({})", l_parts.join(","))
}

/// Fold sorted indices into inclusive `(first, last)` runs.
pub fn derive_contiguous_ranges(sorted_indices: &[usize]) -> Vec<(usize, usize)> {
    let mut l_ranges: Vec<(usize, usize)> = Vec::new();
    for &idx in sorted_indices {
        match l_ranges.last_mut() {
            Some((_, n_last)) if idx == *n_last + 1 => *n_last = idx,
            _ => l_ranges.push((idx, idx)),
        }
    }
    l_ranges
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region TextMetrics

/// Approximate display width; non-ASCII glyphs count as 1.6 units.
pub fn estimate_unicode_string_width(s: &str) -> usize {
    let n_ascii = s.chars().filter(|chr| chr.is_ascii()).count();
    let n_non_ascii = s.chars().count().saturating_sub(n_ascii);
    n_ascii + (n_non_ascii as f64 * 1.6).round() as usize
}

/// Row height for a cell text, or `None` when the default height suffices.
///
/// Grows with the number of wrapped lines, capped at `height_max`.
pub fn derive_row_height(text: &str, policy: &SpecRowHeightPolicy) -> Option<f64> {
    let n_len = text.chars().count();
    if n_len <= policy.chars_threshold {
        return None;
    }
    let n_chars_per_line = usize::max(1, policy.chars_per_line);
    let n_lines = n_len.div_ceil(n_chars_per_line);
    Some(f64::min(
        policy.height_max,
        n_lines as f64 * policy.height_per_line,
    ))
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region SheetNormalization

/// Make `name` acceptable to Excel: illegal chars replaced, surrounding
/// spaces and apostrophes dropped, length capped. Blank names become "Sheet".
pub fn sanitize_sheet_name(name: &str, replace_to: &str) -> String {
    let c_name = name
        .chars()
        .map(|chr| {
            if TUP_EXCEL_ILLEGAL.iter().any(|c_illegal| c_illegal.chars().eq([chr])) {
                replace_to.to_string()
            } else {
                chr.to_string()
            }
        })
        .collect::<String>();
    let c_name = c_name.trim_matches(|chr: char| chr.is_whitespace() || chr == '\'');

    if c_name.is_empty() {
        return "Sheet".to_string();
    }
    c_name.chars().take(N_LEN_EXCEL_SHEET_NAME_MAX).collect()
}

/// Create suffixed sheet name (`base__2`, `base__3`, ...), respecting length cap.
pub fn create_sheet_identifier(base_name: &str, idx_suffix: usize) -> String {
    let c_sheet_name_suffix = format!("__{idx_suffix}");
    let n_len_base_name_max = N_LEN_EXCEL_SHEET_NAME_MAX.saturating_sub(c_sheet_name_suffix.len());

    let c_sheet_name_base: String = base_name
        .chars()
        .take(usize::max(1, n_len_base_name_max))
        .collect();

    format!("{c_sheet_name_base}{c_sheet_name_suffix}")
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
