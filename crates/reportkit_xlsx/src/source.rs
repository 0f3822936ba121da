//! Record sources: JSON arrays and polars DataFrames (direct or IPC bytes).

use std::io::Cursor;

use polars::prelude::{AnyValue, DataFrame, IpcReader, SerReader};
use serde_json::{Number, Value};

use crate::error::ReportError;
use crate::spec::SpecDataRecord;

/// Parse a JSON array of records.
pub fn parse_records_json(text: &str) -> Result<Vec<SpecDataRecord>, ReportError> {
    Ok(serde_json::from_str(text)?)
}

/// Convert every DataFrame row into a record keyed by column name.
///
/// `group_col` and `row_key_col` are lifted into [`SpecDataRecord::group`] and
/// [`SpecDataRecord::row_key`] and left out of the value map. Null cells are
/// left out too, so coercion sees them as missing.
pub fn derive_records_from_dataframe(
    df: &DataFrame,
    group_col: Option<&str>,
    row_key_col: Option<&str>,
) -> Result<Vec<SpecDataRecord>, ReportError> {
    let l_cols = df.get_columns();
    for c_name in [group_col, row_key_col].into_iter().flatten() {
        if !l_cols.iter().any(|col| col.name().as_str() == c_name) {
            return Err(ReportError::Source(format!(
                "column {c_name:?} not found in DataFrame"
            )));
        }
    }

    let mut l_records = Vec::with_capacity(df.height());
    for n_idx_row in 0..df.height() {
        let mut record = SpecDataRecord::default();
        for col in l_cols {
            let c_name = col.name().as_str();
            let value = col.get(n_idx_row).map_err(|err| {
                ReportError::Source(format!(
                    "failed to read row {n_idx_row} of column {c_name:?}: {err}"
                ))
            })?;

            if Some(c_name) == group_col {
                record.group = derive_key_from_any_value(value);
            } else if Some(c_name) == row_key_col {
                record.row_key = derive_key_from_any_value(value);
            } else if let Some(json) = derive_json_from_any_value(value) {
                record.values.insert(c_name.to_string(), json);
            }
        }
        l_records.push(record);
    }

    tracing::debug!(rows = l_records.len(), cols = l_cols.len(), "read DataFrame records");
    Ok(l_records)
}

/// Same as [`derive_records_from_dataframe`] for an IPC-serialized frame.
pub fn derive_records_from_ipc_bytes(
    v_ipc_df: &[u8],
    group_col: Option<&str>,
    row_key_col: Option<&str>,
) -> Result<Vec<SpecDataRecord>, ReportError> {
    let df = derive_dataframe_from_ipc_bytes(v_ipc_df)?;
    derive_records_from_dataframe(&df, group_col, row_key_col)
}

fn derive_dataframe_from_ipc_bytes(v_ipc_df: &[u8]) -> Result<DataFrame, ReportError> {
    IpcReader::new(Cursor::new(v_ipc_df))
        .finish()
        .map_err(|err| ReportError::Source(format!("failed to read IPC DataFrame bytes: {err}")))
}

fn derive_json_from_any_value(value: AnyValue<'_>) -> Option<Value> {
    let n_float = match value {
        AnyValue::Null => return None,
        AnyValue::Boolean(val) => return Some(Value::Bool(val)),
        AnyValue::String(val) => return Some(Value::String(val.to_string())),
        AnyValue::StringOwned(val) => return Some(Value::String(val.to_string())),
        AnyValue::UInt8(val) => return Some(Value::from(val)),
        AnyValue::UInt16(val) => return Some(Value::from(val)),
        AnyValue::UInt32(val) => return Some(Value::from(val)),
        AnyValue::UInt64(val) => return Some(Value::from(val)),
        AnyValue::Int8(val) => return Some(Value::from(val)),
        AnyValue::Int16(val) => return Some(Value::from(val)),
        AnyValue::Int32(val) => return Some(Value::from(val)),
        AnyValue::Int64(val) => return Some(Value::from(val)),
        AnyValue::Float32(val) => val as f64,
        AnyValue::Float64(val) => val,
        _ => return Some(Value::String(value.to_string())),
    };
    // NaN and infinities have no JSON form; treat them as missing.
    Number::from_f64(n_float).map(Value::Number)
}

fn derive_key_from_any_value(value: AnyValue<'_>) -> Option<String> {
    match value {
        AnyValue::Null => None,
        AnyValue::String(val) => Some(val.to_string()),
        AnyValue::StringOwned(val) => Some(val.to_string()),
        _ => Some(value.to_string()),
    }
}
