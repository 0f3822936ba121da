//! Shared report models and options.
//!
//! Grid coordinates are 1-based throughout (`row = 1` is the first sheet
//! row, `col = 1` is column `A`); only the writer converts to the 0-based
//! indices `rust_xlsxwriter` expects.

use std::collections::{BTreeMap, BTreeSet};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::conf::{
    C_LABEL_SUBTOTAL, C_LABEL_TOTAL, N_ROW_HEIGHT_CHARS_PER_LINE, N_ROW_HEIGHT_CHARS_THRESHOLD,
    N_ROW_HEIGHT_EXCEL_MAX, N_ROW_HEIGHT_PER_LINE,
};

////////////////////////////////////////////////////////////////////////////////
// #region CellFormatSpecification

/// Cell format merged from presets and per-sheet patches.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct SpecCellFormat {
    /// Font family name.
    pub font_name: Option<String>,
    /// Font size in points.
    pub font_size: Option<i64>,
    /// Bold style.
    pub bold: Option<bool>,
    /// Italic style.
    pub italic: Option<bool>,

    /// Horizontal alignment.
    pub align: Option<String>,
    /// Vertical alignment.
    pub valign: Option<String>,
    /// Border style for all sides.
    pub border: Option<i64>,
    /// Text wrap.
    pub text_wrap: Option<bool>,

    /// Number format code.
    pub num_format: Option<String>,
    /// Background fill color.
    pub bg_color: Option<String>,
    /// Font color.
    pub font_color: Option<String>,
    /// Cell lock flag (honored when sheet protection is on).
    pub locked: Option<bool>,
}

impl SpecCellFormat {
    /// Return a new format by overlaying `patch` onto `self`.
    pub fn with_(&self, patch: SpecCellFormat) -> SpecCellFormat {
        self.merge(&patch)
    }

    /// Merge two formats with right-side non-`None` overwrite semantics.
    pub fn merge(&self, other: &SpecCellFormat) -> SpecCellFormat {
        SpecCellFormat {
            font_name: other.font_name.clone().or_else(|| self.font_name.clone()),
            font_size: other.font_size.or(self.font_size),
            bold: other.bold.or(self.bold),
            italic: other.italic.or(self.italic),
            align: other.align.clone().or_else(|| self.align.clone()),
            valign: other.valign.clone().or_else(|| self.valign.clone()),
            border: other.border.or(self.border),
            text_wrap: other.text_wrap.or(self.text_wrap),
            num_format: other.num_format.clone().or_else(|| self.num_format.clone()),
            bg_color: other.bg_color.clone().or_else(|| self.bg_color.clone()),
            font_color: other.font_color.clone().or_else(|| self.font_color.clone()),
            locked: other.locked.or(self.locked),
        }
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region HeaderTreeSpecification

/// Value type of a header; selects the coercion applied to its cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnumHeaderType {
    /// Free text (default).
    #[default]
    Text,
    /// Floating point number.
    Number,
    /// Whole number.
    Integer,
    /// Rendered as `Yes`/`No`.
    Boolean,
    /// Rendered as its text label.
    Date,
}

impl EnumHeaderType {
    /// Numeric headers take part in subtotal/total formulas.
    pub fn is_numeric(self) -> bool {
        matches!(self, Self::Number | Self::Integer)
    }
}

/// Operation for [`EnumValueResolver::Computed`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnumComputeOp {
    /// Numeric sum of the operand values.
    Sum,
    /// Non-empty operand texts joined with `", "`.
    Concat,
}

/// Strategy resolving the raw value of a leaf from one record.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EnumValueResolver {
    /// `record[header.id]`.
    #[default]
    Direct,
    /// `record[key]`.
    Field { key: String },
    /// Walk nested objects starting at `record[path[0]]`.
    Path { path: Vec<String> },
    /// Combine several record keys.
    Computed {
        op: EnumComputeOp,
        operands: Vec<String>,
    },
}

/// One node of a header tree; leaves are value-bearing columns (or rows).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SpecHeaderNode {
    pub id: String,
    pub label: String,
    pub children: Vec<SpecHeaderNode>,
    #[serde(rename = "type")]
    pub header_type: EnumHeaderType,
    pub is_row_header: bool,
    pub is_sum_function: bool,
    /// Leaf ids added up by a sum-function leaf.
    pub sum_of: Vec<String>,
    /// Ordered choice-id -> display text.
    pub choices: Option<IndexMap<String, String>>,
    pub width_hint: Option<f64>,
    pub method: Option<EnumValueResolver>,
    pub is_read_only: bool,
}

impl SpecHeaderNode {
    /// Create a text leaf.
    pub fn leaf(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            ..Default::default()
        }
    }

    /// Create an internal node over `children`.
    pub fn group(
        id: impl Into<String>,
        label: impl Into<String>,
        children: Vec<SpecHeaderNode>,
    ) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            children,
            ..Default::default()
        }
    }

    /// Builder: set the value type.
    pub fn typed(mut self, header_type: EnumHeaderType) -> Self {
        self.header_type = header_type;
        self
    }

    /// Builder: turn this leaf into a sum of `operands`.
    pub fn sum_of<I, S>(mut self, operands: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.is_sum_function = true;
        self.sum_of = operands.into_iter().map(Into::into).collect();
        self
    }

    /// Builder: attach an ordered choice list.
    pub fn with_choices<I, K, V>(mut self, choices: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.choices = Some(
            choices
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        );
        self
    }

    /// Builder: set the value resolver strategy.
    pub fn with_method(mut self, method: EnumValueResolver) -> Self {
        self.method = Some(method);
        self
    }

    /// Builder: mark as a row-axis header.
    pub fn as_row_header(mut self) -> Self {
        self.is_row_header = true;
        self
    }

    /// A node without children (an empty list counts as none).
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Resolver in effect for this node.
    pub fn resolver(&self) -> EnumValueResolver {
        self.method.clone().unwrap_or_default()
    }
}

/// One input record.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SpecDataRecord {
    /// Raw values keyed by header id (or resolver key).
    pub values: BTreeMap<String, Value>,
    /// Group key; a change starts a new subtotal block.
    pub group: Option<String>,
    /// Row-header leaf id this record fills (dual-axis sheets).
    pub row_key: Option<String>,
    /// Header ids forced blank and read-only for this record.
    pub excluded_fields: BTreeSet<String>,
}

impl SpecDataRecord {
    /// Build a record from `(key, value)` pairs.
    pub fn from_pairs<I, K>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        Self {
            values: pairs.into_iter().map(|(k, v)| (k.into(), v)).collect(),
            ..Default::default()
        }
    }

    /// Builder: set the group key.
    pub fn in_group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    /// Builder: set the row key.
    pub fn for_row(mut self, row_key: impl Into<String>) -> Self {
        self.row_key = Some(row_key.into());
        self
    }

    /// Builder: exclude one field.
    pub fn excluding(mut self, field: impl Into<String>) -> Self {
        self.excluded_fields.insert(field.into());
        self
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region LayoutSpecification

/// Axis along which a header tree is laid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnumLayoutAxis {
    /// Leaves become columns; depth runs down rows.
    Column,
    /// Leaves become rows; depth runs across columns.
    Row,
}

/// Resolved position of one header node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpecLayoutCell {
    /// First primary-axis index (inclusive).
    pub axis_start: usize,
    /// Last primary-axis index (inclusive).
    pub axis_end: usize,
    /// Secondary-axis index: own level for internal nodes, deepest level for leaves.
    pub depth: usize,
    /// Secondary-axis index of the node's own level (header cell anchor).
    pub depth_anchor: usize,
    pub is_leaf: bool,
}

impl SpecLayoutCell {
    /// Number of primary-axis slots covered.
    pub fn span(&self) -> usize {
        self.axis_end + 1 - self.axis_start
    }
}

/// Output of a layout resolver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpecLayoutIndex {
    pub axis: EnumLayoutAxis,
    pub cells: BTreeMap<String, SpecLayoutCell>,
    /// Leaf ids in primary-axis order.
    pub leaf_ids: Vec<String>,
    /// First primary-axis index handed to the resolver.
    pub axis_origin: usize,
    /// First secondary-axis index handed to the resolver.
    pub depth_origin: usize,
    /// Number of primary-axis slots consumed.
    pub max_axis_index: usize,
    /// Number of header levels consumed before data begins.
    pub header_extent: usize,
}

impl SpecLayoutIndex {
    pub fn get(&self, id: &str) -> Option<&SpecLayoutCell> {
        self.cells.get(id)
    }

    /// Primary-axis index right after the last consumed slot.
    pub fn next_axis(&self) -> usize {
        self.axis_origin + self.max_axis_index
    }

    /// First secondary-axis index available for data.
    pub fn data_start(&self) -> usize {
        self.depth_origin + self.header_extent
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region GridSpecification

/// Emitted cell content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum EnumCellValue {
    /// Blank cell.
    None,
    /// Text value.
    String(String),
    /// Numeric value.
    Number(f64),
    /// Formula text including the leading `=`.
    Formula(String),
}

impl EnumCellValue {
    /// Text view used for width/height estimation.
    pub fn display_text(&self) -> String {
        match self {
            Self::None => String::new(),
            Self::String(s) | Self::Formula(s) => s.clone(),
            Self::Number(n) => n.to_string(),
        }
    }
}

/// Style selector resolved to a concrete format by the writer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnumStyleTag {
    Header,
    RowHeader,
    Banner,
    Text,
    Integer,
    Decimal,
    ReadOnly,
    Formula,
    Subtotal,
    Total,
}

/// One emitted grid cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpecGridCell {
    pub row: usize,
    pub col: usize,
    pub value: EnumCellValue,
    pub style: EnumStyleTag,
    /// Validation handle id bound to this cell.
    pub validation_ref: Option<String>,
    /// Annotation attached to the cell.
    pub note: Option<String>,
}

/// Inclusive merge rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SpecMergeRange {
    pub row_first: usize,
    pub col_first: usize,
    pub row_last: usize,
    pub col_last: usize,
}

/// Immutable allowed-value list shared by many cells.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpecValidationHandle {
    pub id: String,
    pub values: Vec<String>,
}

/// Binding of one cell to one validation handle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpecValidationBinding {
    /// A1-style reference, e.g. `C7`.
    pub cell_ref: String,
    pub row: usize,
    pub col: usize,
    pub handle_id: String,
}

/// Fully positioned report grid.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SpecReportGrid {
    pub cells: Vec<SpecGridCell>,
    pub merges: Vec<SpecMergeRange>,
    pub handles: Vec<SpecValidationHandle>,
    pub bindings: Vec<SpecValidationBinding>,
    /// Non-default row heights (points) keyed by row.
    pub row_heights: BTreeMap<usize, f64>,
    /// Column widths (character units) from header width hints.
    pub column_widths: BTreeMap<usize, f64>,
    /// Last header row (rows above data).
    pub header_rows: usize,
    /// Last row-header column (0 for single-axis sheets).
    pub header_cols: usize,
    /// Last used row.
    pub n_rows: usize,
    /// Last used column.
    pub n_cols: usize,
    /// Non-fatal data recovery notes.
    pub warnings: Vec<String>,
}

impl SpecReportGrid {
    /// Look up the cell written at `(row, col)`.
    pub fn cell(&self, row: usize, col: usize) -> Option<&SpecGridCell> {
        self.cells.iter().find(|c| c.row == row && c.col == col)
    }

    /// Look up a handle by id.
    pub fn handle(&self, id: &str) -> Option<&SpecValidationHandle> {
        self.handles.iter().find(|h| h.id == id)
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region ReportOptions

/// Row height growth for long text cells.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpecRowHeightPolicy {
    /// Text longer than this (chars) triggers a custom height.
    pub chars_threshold: usize,
    /// Characters assumed per wrapped line.
    pub chars_per_line: usize,
    /// Height per wrapped line (points).
    pub height_per_line: f64,
    /// Upper bound (points).
    pub height_max: f64,
}

impl Default for SpecRowHeightPolicy {
    fn default() -> Self {
        Self {
            chars_threshold: N_ROW_HEIGHT_CHARS_THRESHOLD,
            chars_per_line: N_ROW_HEIGHT_CHARS_PER_LINE,
            height_per_line: N_ROW_HEIGHT_PER_LINE,
            height_max: N_ROW_HEIGHT_EXCEL_MAX,
        }
    }
}

/// Per-sheet build options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpecReportOptions {
    /// First sheet row used by the header block (1-based).
    pub start_row: usize,
    /// First sheet column used by the header block (1-based).
    pub start_col: usize,
    /// Emit subtotal/grand-total rows.
    pub if_totals: bool,
    /// Bind the yes/no handle to headers labeled like the canonical yes/no header.
    pub if_legacy_yes_no_label: bool,
    pub subtotal_label: String,
    pub total_label: String,
    pub row_height_policy: SpecRowHeightPolicy,
}

impl Default for SpecReportOptions {
    fn default() -> Self {
        Self {
            start_row: 1,
            start_col: 1,
            if_totals: true,
            if_legacy_yes_no_label: false,
            subtotal_label: C_LABEL_SUBTOTAL.to_string(),
            total_label: C_LABEL_TOTAL.to_string(),
            row_height_policy: SpecRowHeightPolicy::default(),
        }
    }
}

/// Header tree plus options for one sheet.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SpecReportSheet {
    pub headers: Vec<SpecHeaderNode>,
    pub options: SpecReportOptions,
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region WriteOptions

/// Autofit rule for column width inference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EnumAutofitColumnsRule {
    /// Only apply header width hints.
    None,
    /// Infer width from leaf header labels when no hint is given (default).
    #[default]
    Header,
    /// Infer width from header labels and body cells.
    All,
}

/// Autofit policy for per-sheet write call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecAutofitCellsPolicy {
    /// Autofit width inference rule.
    pub rule_columns: EnumAutofitColumnsRule,
    /// Minimum final width.
    pub width_cell_min: usize,
    /// Maximum final width.
    pub width_cell_max: usize,
    /// Width padding added after inference.
    pub width_cell_padding: usize,
}

impl Default for SpecAutofitCellsPolicy {
    fn default() -> Self {
        Self {
            rule_columns: EnumAutofitColumnsRule::Header,
            width_cell_min: 8,
            width_cell_max: 60,
            width_cell_padding: 2,
        }
    }
}

/// Writer-wide options.
#[derive(Debug, Clone, PartialEq)]
pub struct SpecXlsxWriteOptions {
    /// Patch merged into every style preset.
    pub base_format_patch: SpecCellFormat,
    /// Column autofit policy.
    pub policy_autofit: SpecAutofitCellsPolicy,
    /// Freeze panes below the header block (and right of row headers).
    pub if_freeze_header: bool,
    /// Error title shown when a list validation rejects input.
    pub validation_error_title: String,
}

impl Default for SpecXlsxWriteOptions {
    fn default() -> Self {
        Self {
            base_format_patch: SpecCellFormat::default(),
            policy_autofit: SpecAutofitCellsPolicy::default(),
            if_freeze_header: true,
            validation_error_title: "Invalid value".to_string(),
        }
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region ReportSpecification

/// Per-sheet write report.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SpecXlsxReport {
    /// Actual unique sheet name in workbook.
    pub sheet_name: String,
    /// Last used row (1-based).
    pub n_rows: usize,
    /// Last used column (1-based).
    pub n_cols: usize,
    /// Non-fatal warnings.
    pub warnings: Vec<String>,
}

impl SpecXlsxReport {
    /// Add a warning message.
    pub fn warn(&mut self, msg: impl AsRef<str>) {
        self.warnings.push(msg.as_ref().to_string());
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
