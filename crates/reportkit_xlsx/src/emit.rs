//! Grid emission: header cells with merges, value cells, subtotal rows.

use std::collections::BTreeMap;

use crate::aggregate::{EnumPlannedRow, aggregate};
use crate::coerce::resolve_raw_value;
use crate::conf::C_LABEL_DATE_HEADER;
use crate::header::collect_nodes;
use crate::layout::derive_header_rect;
use crate::spec::{
    EnumCellValue, EnumHeaderType, EnumLayoutAxis, EnumStyleTag, SpecDataRecord, SpecGridCell,
    SpecHeaderNode, SpecLayoutIndex, SpecMergeRange, SpecReportGrid, SpecReportOptions,
};
use crate::util::{create_column_sum_formula, create_row_sum_formula, derive_row_height};
use crate::validation::ValidationRegistry;

/// Leaf header with its resolved primary-axis slot and bound handle.
struct SpecPlacedLeaf<'a> {
    node: &'a SpecHeaderNode,
    slot: usize,
    handle_id: Option<String>,
}

/// Accumulates the cells of one report sheet.
///
/// Owned by a single export call; [`GridEmitter::finish`] hands the
/// immutable result back.
pub struct GridEmitter<'a> {
    options: &'a SpecReportOptions,
    registry: ValidationRegistry,
    cells: Vec<SpecGridCell>,
    merges: Vec<SpecMergeRange>,
    row_heights: BTreeMap<usize, f64>,
    column_widths: BTreeMap<usize, f64>,
    warnings: Vec<String>,
    header_rows: usize,
    header_cols: usize,
    n_rows: usize,
    n_cols: usize,
}

impl<'a> GridEmitter<'a> {
    pub fn new(options: &'a SpecReportOptions) -> Self {
        Self {
            options,
            registry: ValidationRegistry::new(),
            cells: Vec::new(),
            merges: Vec::new(),
            row_heights: BTreeMap::new(),
            column_widths: BTreeMap::new(),
            warnings: Vec::new(),
            header_rows: 0,
            header_cols: 0,
            n_rows: 0,
            n_cols: 0,
        }
    }

    ////////////////////////////////////////////////////////////////////////////
    // #region HeaderPhase

    /// Emit one header cell (plus merge) for every node of `headers`.
    pub fn write_headers(&mut self, index: &SpecLayoutIndex, headers: &[SpecHeaderNode]) {
        let style = match index.axis {
            EnumLayoutAxis::Column => EnumStyleTag::Header,
            EnumLayoutAxis::Row => EnumStyleTag::RowHeader,
        };

        for node in collect_nodes(headers) {
            let Some(cell) = index.get(&node.id) else {
                continue;
            };
            let rect = derive_header_rect(index.axis, cell);

            // Date headers show a fixed label; the real one moves to a note.
            let (c_label, note) = if node.header_type == EnumHeaderType::Date {
                (C_LABEL_DATE_HEADER.to_string(), Some(node.label.clone()))
            } else {
                (node.label.clone(), None)
            };
            self.push_cell(
                rect.row_first,
                rect.col_first,
                EnumCellValue::String(c_label),
                style,
                None,
                note,
            );
            if rect.row_first != rect.row_last || rect.col_first != rect.col_last {
                self.push_merge(rect);
            }

            if let Some(n_width) = node.width_hint
                && cell.is_leaf
            {
                let n_col = match index.axis {
                    EnumLayoutAxis::Column => cell.axis_start,
                    EnumLayoutAxis::Row => cell.depth,
                };
                let n_width_prev = self.column_widths.get(&n_col).copied().unwrap_or(0.0);
                self.column_widths.insert(n_col, f64::max(n_width_prev, n_width));
            }
        }

        if index.header_extent > 0 {
            let n_last = index.data_start() - 1;
            match index.axis {
                EnumLayoutAxis::Column => self.header_rows = usize::max(self.header_rows, n_last),
                EnumLayoutAxis::Row => self.header_cols = usize::max(self.header_cols, n_last),
            }
        }
    }

    // #endregion
    ////////////////////////////////////////////////////////////////////////////
    // #region SingleAxisBody

    /// Emit data, banner, subtotal and total rows below a column layout.
    pub fn write_body(
        &mut self,
        index: &SpecLayoutIndex,
        headers: &[SpecHeaderNode],
        records: &[SpecDataRecord],
    ) {
        let dict_handles = self
            .registry
            .bind(index, headers, self.options.if_legacy_yes_no_label);
        let l_leaves = place_leaves(index, headers, &dict_handles);
        if l_leaves.is_empty() {
            return;
        }

        let l_numeric_cols = l_leaves
            .iter()
            .filter(|leaf| leaf.node.header_type.is_numeric() || leaf.node.is_sum_function)
            .map(|leaf| leaf.slot)
            .collect::<Vec<_>>();
        let n_label_col = l_leaves
            .iter()
            .find(|leaf| !l_numeric_cols.contains(&leaf.slot))
            .map(|leaf| leaf.slot);
        let n_col_first = index.axis_origin;
        let n_col_last = index.next_axis() - 1;

        let plan = aggregate(
            records,
            &l_numeric_cols,
            index.data_start(),
            self.options.if_totals,
        );

        for planned in &plan.rows {
            match planned {
                EnumPlannedRow::Banner { row, group } => {
                    self.push_cell(
                        *row,
                        n_col_first,
                        EnumCellValue::String(group.clone()),
                        EnumStyleTag::Banner,
                        None,
                        None,
                    );
                    if n_col_last > n_col_first {
                        self.push_merge(SpecMergeRange {
                            row_first: *row,
                            col_first: n_col_first,
                            row_last: *row,
                            col_last: n_col_last,
                        });
                    }
                }
                EnumPlannedRow::Data { row, record_idx } => {
                    let record = &records[*record_idx];
                    for leaf in &l_leaves {
                        self.write_value_cell(*row, leaf, record, index);
                    }
                }
                EnumPlannedRow::Subtotal {
                    row,
                    group,
                    formulas,
                    ..
                } => {
                    let c_label = match group {
                        Some(group) => format!("{}: {group}", self.options.subtotal_label),
                        None => self.options.subtotal_label.clone(),
                    };
                    self.write_total_row(
                        *row,
                        &l_leaves,
                        n_label_col,
                        c_label,
                        formulas,
                        EnumStyleTag::Subtotal,
                    );
                }
                EnumPlannedRow::GrandTotal { row, formulas } => {
                    let c_label = self.options.total_label.clone();
                    self.write_total_row(
                        *row,
                        &l_leaves,
                        n_label_col,
                        c_label,
                        formulas,
                        EnumStyleTag::Total,
                    );
                }
            }
        }
    }

    fn write_value_cell(
        &mut self,
        row: usize,
        leaf: &SpecPlacedLeaf<'_>,
        record: &SpecDataRecord,
        index: &SpecLayoutIndex,
    ) {
        let node = leaf.node;
        if record.excluded_fields.contains(&node.id) {
            self.push_cell(
                row,
                leaf.slot,
                EnumCellValue::None,
                EnumStyleTag::ReadOnly,
                None,
                None,
            );
            return;
        }

        if node.is_sum_function {
            let l_cols = derive_operand_slots(node, index);
            self.push_cell(
                row,
                leaf.slot,
                EnumCellValue::Formula(create_row_sum_formula(row, &l_cols)),
                EnumStyleTag::Formula,
                None,
                None,
            );
            return;
        }

        let raw = resolve_raw_value(record, node);
        let coerced = node.header_type.coerce(raw.as_ref());
        if coerced.if_fallback {
            self.warn(format!(
                "row {row}, header {:?}: value {} is not a valid {:?}; wrote default",
                node.id,
                raw.map(|v| v.to_string()).unwrap_or_default(),
                node.header_type
            ));
        }
        let value = derive_choice_display(node, coerced.value);
        let style = derive_value_style(node, false);
        let handle_id = if node.is_read_only {
            None
        } else {
            leaf.handle_id.clone()
        };
        self.push_cell(row, leaf.slot, value, style, handle_id, None);
    }

    fn write_total_row(
        &mut self,
        row: usize,
        leaves: &[SpecPlacedLeaf<'_>],
        label_col: Option<usize>,
        label: String,
        formulas: &[(usize, EnumCellValue)],
        style: EnumStyleTag,
    ) {
        let dict_formulas: BTreeMap<usize, &EnumCellValue> =
            formulas.iter().map(|(col, value)| (*col, value)).collect();

        for leaf in leaves {
            let value = if let Some(value) = dict_formulas.get(&leaf.slot) {
                (*value).clone()
            } else if Some(leaf.slot) == label_col {
                EnumCellValue::String(label.clone())
            } else {
                EnumCellValue::None
            };
            self.push_cell(row, leaf.slot, value, style, None, None);
        }
    }

    // #endregion
    ////////////////////////////////////////////////////////////////////////////
    // #region DualAxisBody

    /// Emit the value matrix of a dual-axis sheet: one row per row-header
    /// leaf, one column per column-header leaf.
    ///
    /// Records are matched to rows by `row_key`. Row-header type, choices and
    /// sum rules take precedence over column-header ones.
    pub fn write_matrix(
        &mut self,
        col_index: &SpecLayoutIndex,
        col_headers: &[SpecHeaderNode],
        row_index: &SpecLayoutIndex,
        row_headers: &[SpecHeaderNode],
        records: &[SpecDataRecord],
    ) {
        let dict_col_handles =
            self.registry
                .bind(col_index, col_headers, self.options.if_legacy_yes_no_label);
        let dict_row_handles = self.registry.bind(row_index, row_headers, false);
        let l_cols = place_leaves(col_index, col_headers, &dict_col_handles);
        let l_rows = place_leaves(row_index, row_headers, &dict_row_handles);

        let mut dict_records: BTreeMap<&str, &SpecDataRecord> = BTreeMap::new();
        for record in records {
            let Some(row_key) = record.row_key.as_deref() else {
                self.warn("record without row_key ignored in a row-header sheet");
                continue;
            };
            if row_index.get(row_key).is_none_or(|cell| !cell.is_leaf) {
                self.warn(format!("record for unknown row {row_key:?} ignored"));
                continue;
            }
            if dict_records.contains_key(row_key) {
                self.warn(format!("duplicate record for row {row_key:?} ignored"));
                continue;
            }
            dict_records.insert(row_key, record);
        }

        let record_empty = SpecDataRecord::default();
        for row_leaf in &l_rows {
            let row = row_leaf.slot;
            let record = dict_records
                .get(row_leaf.node.id.as_str())
                .copied()
                .unwrap_or(&record_empty);

            for col_leaf in &l_cols {
                self.write_matrix_cell(row, row_leaf, col_leaf, record, col_index, row_index);
            }
        }
    }

    fn write_matrix_cell(
        &mut self,
        row: usize,
        row_leaf: &SpecPlacedLeaf<'_>,
        col_leaf: &SpecPlacedLeaf<'_>,
        record: &SpecDataRecord,
        col_index: &SpecLayoutIndex,
        row_index: &SpecLayoutIndex,
    ) {
        let col = col_leaf.slot;
        let (row_node, col_node) = (row_leaf.node, col_leaf.node);

        if record.excluded_fields.contains(&col_node.id)
            || record.excluded_fields.contains(&row_node.id)
        {
            self.push_cell(row, col, EnumCellValue::None, EnumStyleTag::ReadOnly, None, None);
            return;
        }
        if row_node.is_sum_function {
            let l_rows = derive_operand_slots(row_node, row_index);
            self.push_cell(
                row,
                col,
                EnumCellValue::Formula(create_column_sum_formula(col, &l_rows)),
                EnumStyleTag::Formula,
                None,
                None,
            );
            return;
        }
        if col_node.is_sum_function {
            let l_slots = derive_operand_slots(col_node, col_index);
            self.push_cell(
                row,
                col,
                EnumCellValue::Formula(create_row_sum_formula(row, &l_slots)),
                EnumStyleTag::Formula,
                None,
                None,
            );
            return;
        }

        let if_row_typed = row_node.header_type != EnumHeaderType::Text || row_node.choices.is_some();
        let type_node = if if_row_typed { row_node } else { col_node };

        let raw = resolve_raw_value(record, col_node);
        let coerced = type_node.header_type.coerce(raw.as_ref());
        if coerced.if_fallback {
            self.warn(format!(
                "row {:?}, header {:?}: value {} is not a valid {:?}; wrote default",
                row_node.id,
                col_node.id,
                raw.map(|v| v.to_string()).unwrap_or_default(),
                type_node.header_type
            ));
        }

        let choice_node = if has_choices(row_node) { row_node } else { col_node };
        let value = derive_choice_display(choice_node, coerced.value);

        let if_read_only = row_node.is_read_only || col_node.is_read_only;
        let style = derive_value_style(type_node, if_read_only);
        let handle_id = if if_read_only {
            None
        } else {
            row_leaf.handle_id.clone().or_else(|| col_leaf.handle_id.clone())
        };
        self.push_cell(row, col, value, style, handle_id, None);
    }

    // #endregion
    ////////////////////////////////////////////////////////////////////////////
    // #region Finish

    fn push_cell(
        &mut self,
        row: usize,
        col: usize,
        value: EnumCellValue,
        style: EnumStyleTag,
        validation_ref: Option<String>,
        note: Option<String>,
    ) {
        if let EnumCellValue::String(text) = &value
            && let Some(n_height) = derive_row_height(text, &self.options.row_height_policy)
        {
            let n_height_prev = self.row_heights.get(&row).copied().unwrap_or(0.0);
            self.row_heights.insert(row, f64::max(n_height_prev, n_height));
        }
        if let Some(handle_id) = &validation_ref {
            self.registry.attach(handle_id, row, col);
        }
        self.n_rows = usize::max(self.n_rows, row);
        self.n_cols = usize::max(self.n_cols, col);

        self.cells.push(SpecGridCell {
            row,
            col,
            value,
            style,
            validation_ref,
            note,
        });
    }

    fn push_merge(&mut self, merge: SpecMergeRange) {
        self.n_rows = usize::max(self.n_rows, merge.row_last);
        self.n_cols = usize::max(self.n_cols, merge.col_last);
        self.merges.push(merge);
    }

    fn warn(&mut self, msg: impl Into<String>) {
        self.warnings.push(msg.into());
    }

    /// Hand back the finished grid.
    pub fn finish(self) -> SpecReportGrid {
        if !self.warnings.is_empty() {
            tracing::warn!(
                warnings = self.warnings.len(),
                "report data recovered with type defaults"
            );
        }
        let (handles, bindings) = self.registry.into_parts();
        SpecReportGrid {
            cells: self.cells,
            merges: self.merges,
            handles,
            bindings,
            row_heights: self.row_heights,
            column_widths: self.column_widths,
            header_rows: self.header_rows,
            header_cols: self.header_cols,
            n_rows: self.n_rows,
            n_cols: self.n_cols,
            warnings: self.warnings,
        }
    }

    // #endregion
}

fn place_leaves<'h>(
    index: &SpecLayoutIndex,
    headers: &'h [SpecHeaderNode],
    handles: &BTreeMap<String, String>,
) -> Vec<SpecPlacedLeaf<'h>> {
    let dict_nodes: BTreeMap<&str, &SpecHeaderNode> = collect_nodes(headers)
        .into_iter()
        .map(|node| (node.id.as_str(), node))
        .collect();

    index
        .leaf_ids
        .iter()
        .filter_map(|id| {
            let node = *dict_nodes.get(id.as_str())?;
            let cell = index.get(id)?;
            Some(SpecPlacedLeaf {
                node,
                slot: cell.axis_start,
                handle_id: handles.get(id).cloned(),
            })
        })
        .collect()
}

fn derive_operand_slots(node: &SpecHeaderNode, index: &SpecLayoutIndex) -> Vec<usize> {
    node.sum_of
        .iter()
        .filter_map(|operand| index.get(operand).map(|cell| cell.axis_start))
        .collect()
}

fn has_choices(node: &SpecHeaderNode) -> bool {
    node.choices.as_ref().is_some_and(|choices| !choices.is_empty())
}

/// Records may store either a choice id or its display text; cells always
/// show the display text.
fn derive_choice_display(node: &SpecHeaderNode, value: EnumCellValue) -> EnumCellValue {
    if let EnumCellValue::String(text) = &value
        && let Some(choices) = &node.choices
        && let Some(display) = choices.get(text.as_str())
    {
        return EnumCellValue::String(display.clone());
    }
    value
}

fn derive_value_style(node: &SpecHeaderNode, if_read_only: bool) -> EnumStyleTag {
    if if_read_only || node.is_read_only {
        return EnumStyleTag::ReadOnly;
    }
    match node.header_type {
        EnumHeaderType::Integer => EnumStyleTag::Integer,
        EnumHeaderType::Number => EnumStyleTag::Decimal,
        EnumHeaderType::Text | EnumHeaderType::Boolean | EnumHeaderType::Date => {
            EnumStyleTag::Text
        }
    }
}
