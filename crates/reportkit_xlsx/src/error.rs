//! Report build/write error type.

use thiserror::Error;

/// Failure raised while validating, laying out or materializing a report.
///
/// Configuration variants carry the offending header id; they are raised
/// before any grid cell is produced.
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("header id must be non-empty (label {label:?})")]
    BlankHeaderId { label: String },

    #[error("duplicate header id {id:?}")]
    DuplicateHeaderId { id: String },

    #[error("header {id:?} has children and cannot be a sum function")]
    SumFunctionOnInternalHeader { id: String },

    #[error("sum-function header {id:?} declares no operands")]
    SumFunctionWithoutOperands { id: String },

    #[error("sum-function header {id:?} references unknown leaf {operand:?}")]
    UnknownSumOperand { id: String, operand: String },

    #[error("header {id:?} has an unresolvable value method: {reason}")]
    UnresolvedMethod { id: String, reason: String },

    #[error("header {id:?} is a row header nested under a column header")]
    MisplacedRowHeader { id: String },

    #[error("sheet definition has no headers")]
    EmptyHeaderTree,

    #[error("malformed json input: {0}")]
    Json(#[from] serde_json::Error),

    #[error("record source error: {0}")]
    Source(String),

    #[error("xlsx write error: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),

    #[error("invalid write option: {0}")]
    InvalidOption(String),

    #[error("excel limit exceeded: {0}")]
    Limit(String),

    #[error("cannot write after close()")]
    Closed,
}

impl ReportError {
    /// Header id for configuration errors, `None` otherwise.
    pub fn header_id(&self) -> Option<&str> {
        match self {
            Self::DuplicateHeaderId { id }
            | Self::SumFunctionOnInternalHeader { id }
            | Self::SumFunctionWithoutOperands { id }
            | Self::UnknownSumOperand { id, .. }
            | Self::UnresolvedMethod { id, .. }
            | Self::MisplacedRowHeader { id } => Some(id),
            _ => None,
        }
    }

    /// Whether the failure stems from the header tree rather than data or I/O.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::BlankHeaderId { .. } | Self::EmptyHeaderTree)
            || self.header_id().is_some()
    }
}
