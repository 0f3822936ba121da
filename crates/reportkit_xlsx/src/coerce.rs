//! Raw value resolution and type-aware coercion.
//!
//! Coercion never fails: a missing key yields the type default, a value of
//! the wrong shape yields the default and is flagged so the caller can record
//! a warning.

use serde_json::{Number, Value};

use crate::conf::{C_LABEL_NO, C_LABEL_YES};
use crate::spec::{
    EnumCellValue, EnumComputeOp, EnumHeaderType, EnumValueResolver, SpecDataRecord,
    SpecHeaderNode,
};

/// Result of coercing one raw value.
#[derive(Debug, Clone, PartialEq)]
pub struct SpecCoercedValue {
    pub value: EnumCellValue,
    /// The raw value had a shape the type could not read.
    pub if_fallback: bool,
}

impl SpecCoercedValue {
    fn ok(value: EnumCellValue) -> Self {
        Self {
            value,
            if_fallback: false,
        }
    }

    fn fallback(value: EnumCellValue) -> Self {
        Self {
            value,
            if_fallback: true,
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
// #region Resolution

/// Resolve the raw value of `header` within `record` using its strategy.
pub fn resolve_raw_value(record: &SpecDataRecord, header: &SpecHeaderNode) -> Option<Value> {
    match header.resolver() {
        EnumValueResolver::Direct => record.values.get(&header.id).cloned(),
        EnumValueResolver::Field { key } => record.values.get(&key).cloned(),
        EnumValueResolver::Path { path } => resolve_path(record, &path),
        EnumValueResolver::Computed { op, operands } => {
            Some(resolve_computed(record, op, &operands))
        }
    }
}

fn resolve_path(record: &SpecDataRecord, path: &[String]) -> Option<Value> {
    let (head, rest) = path.split_first()?;
    let mut cursor = record.values.get(head)?;
    for seg in rest {
        cursor = match cursor {
            Value::Object(map) => map.get(seg)?,
            Value::Array(items) => items.get(seg.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(cursor.clone())
}

fn resolve_computed(record: &SpecDataRecord, op: EnumComputeOp, operands: &[String]) -> Value {
    match op {
        EnumComputeOp::Sum => {
            let n_total: f64 = operands
                .iter()
                .filter_map(|key| record.values.get(key))
                .filter_map(read_f64)
                .sum();
            Number::from_f64(n_total)
                .map(Value::Number)
                .unwrap_or(Value::Null)
        }
        EnumComputeOp::Concat => {
            let l_parts = operands
                .iter()
                .filter_map(|key| record.values.get(key))
                .map(format_text)
                .filter(|s| !s.is_empty())
                .collect::<Vec<_>>();
            Value::String(l_parts.join(", "))
        }
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Coercion

impl EnumHeaderType {
    /// Coerce a raw value (or its absence) to this type's cell value.
    pub fn coerce(self, raw: Option<&Value>) -> SpecCoercedValue {
        match self {
            Self::Number => coerce_number(raw),
            Self::Integer => coerce_integer(raw),
            Self::Boolean => coerce_boolean(raw),
            Self::Date | Self::Text => coerce_text(raw),
        }
    }
}

fn coerce_number(raw: Option<&Value>) -> SpecCoercedValue {
    match raw {
        None | Some(Value::Null) => SpecCoercedValue::ok(EnumCellValue::Number(0.0)),
        Some(Value::String(s)) if s.trim().is_empty() => {
            SpecCoercedValue::ok(EnumCellValue::Number(0.0))
        }
        Some(value) => match read_f64(value) {
            Some(n) => SpecCoercedValue::ok(EnumCellValue::Number(n)),
            None => SpecCoercedValue::fallback(EnumCellValue::Number(0.0)),
        },
    }
}

fn coerce_integer(raw: Option<&Value>) -> SpecCoercedValue {
    match raw {
        None | Some(Value::Null) => SpecCoercedValue::ok(EnumCellValue::Number(0.0)),
        Some(Value::String(s)) if s.trim().is_empty() => {
            SpecCoercedValue::ok(EnumCellValue::Number(0.0))
        }
        Some(Value::String(s)) if s.trim().parse::<i64>().is_ok() => {
            let n = s.trim().parse::<i64>().unwrap_or_default();
            SpecCoercedValue::ok(EnumCellValue::Number(n as f64))
        }
        Some(Value::Number(n)) if n.as_i64().is_some() => SpecCoercedValue::ok(
            EnumCellValue::Number(n.as_i64().unwrap_or_default() as f64),
        ),
        Some(value) => match read_f64(value) {
            Some(n) => SpecCoercedValue::ok(EnumCellValue::Number(n.trunc())),
            None => SpecCoercedValue::fallback(EnumCellValue::Number(0.0)),
        },
    }
}

fn coerce_boolean(raw: Option<&Value>) -> SpecCoercedValue {
    let label = |b: bool| {
        EnumCellValue::String(if b { C_LABEL_YES } else { C_LABEL_NO }.to_string())
    };
    match raw {
        None | Some(Value::Null) => SpecCoercedValue::ok(EnumCellValue::String(String::new())),
        Some(Value::Bool(b)) => SpecCoercedValue::ok(label(*b)),
        Some(Value::Number(n)) => match n.as_f64() {
            Some(x) => SpecCoercedValue::ok(label(x != 0.0)),
            None => SpecCoercedValue::fallback(EnumCellValue::String(String::new())),
        },
        Some(Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
            "" => SpecCoercedValue::ok(EnumCellValue::String(String::new())),
            "yes" | "y" | "true" | "1" => SpecCoercedValue::ok(label(true)),
            "no" | "n" | "false" | "0" => SpecCoercedValue::ok(label(false)),
            _ => SpecCoercedValue::fallback(EnumCellValue::String(String::new())),
        },
        Some(_) => SpecCoercedValue::fallback(EnumCellValue::String(String::new())),
    }
}

fn coerce_text(raw: Option<&Value>) -> SpecCoercedValue {
    match raw {
        None => SpecCoercedValue::ok(EnumCellValue::String(String::new())),
        Some(value) => SpecCoercedValue::ok(EnumCellValue::String(format_text(value))),
    }
}

fn read_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|x| x.is_finite()),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}

fn format_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => if *b { "True" } else { "False" }.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(_) | Value::Object(_) => value.to_string(),
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_boolean_labels_and_missing_is_empty() {
        let t = EnumHeaderType::Boolean;
        assert_eq!(
            t.coerce(Some(&json!(true))).value,
            EnumCellValue::String("Yes".to_string())
        );
        assert_eq!(
            t.coerce(Some(&json!(false))).value,
            EnumCellValue::String("No".to_string())
        );
        assert_eq!(
            t.coerce(Some(&Value::Null)).value,
            EnumCellValue::String(String::new())
        );
        assert_eq!(t.coerce(None).value, EnumCellValue::String(String::new()));
        assert!(t.coerce(Some(&json!("perhaps"))).if_fallback);
    }

    #[test]
    fn test_numeric_defaults_and_fallbacks() {
        assert_eq!(
            EnumHeaderType::Number.coerce(None).value,
            EnumCellValue::Number(0.0)
        );
        assert_eq!(
            EnumHeaderType::Number.coerce(Some(&json!("2.5"))).value,
            EnumCellValue::Number(2.5)
        );
        let bad = EnumHeaderType::Number.coerce(Some(&json!("abc")));
        assert_eq!(bad.value, EnumCellValue::Number(0.0));
        assert!(bad.if_fallback);

        assert_eq!(
            EnumHeaderType::Integer.coerce(Some(&json!(7.9))).value,
            EnumCellValue::Number(7.0)
        );
        assert_eq!(
            EnumHeaderType::Integer.coerce(Some(&json!(" 12 "))).value,
            EnumCellValue::Number(12.0)
        );
        assert!(EnumHeaderType::Integer.coerce(Some(&json!([1]))).if_fallback);
    }

    #[test]
    fn test_text_and_date_render_labels() {
        assert_eq!(
            EnumHeaderType::Text.coerce(Some(&json!(3))).value,
            EnumCellValue::String("3".to_string())
        );
        assert_eq!(
            EnumHeaderType::Text.coerce(Some(&json!(true))).value,
            EnumCellValue::String("True".to_string())
        );
        assert_eq!(
            EnumHeaderType::Date.coerce(Some(&json!("2024-03-01"))).value,
            EnumCellValue::String("2024-03-01".to_string())
        );
        assert_eq!(
            EnumHeaderType::Date.coerce(None).value,
            EnumCellValue::String(String::new())
        );
    }

    #[test]
    fn test_resolver_strategies() {
        let record = SpecDataRecord::from_pairs([
            ("name", json!("Acetone")),
            ("meta", json!({"site": {"code": "S-1"}, "tags": ["a", "b"]})),
            ("u1", json!(2)),
            ("u2", json!("3.5")),
            ("first", json!("Ada")),
            ("last", json!("")),
        ]);

        let direct = SpecHeaderNode::leaf("name", "Name");
        assert_eq!(resolve_raw_value(&record, &direct), Some(json!("Acetone")));

        let field = SpecHeaderNode::leaf("label", "Label").with_method(EnumValueResolver::Field {
            key: "name".to_string(),
        });
        assert_eq!(resolve_raw_value(&record, &field), Some(json!("Acetone")));

        let path = SpecHeaderNode::leaf("site", "Site").with_method(EnumValueResolver::Path {
            path: vec!["meta".into(), "site".into(), "code".into()],
        });
        assert_eq!(resolve_raw_value(&record, &path), Some(json!("S-1")));

        let path_idx = SpecHeaderNode::leaf("tag", "Tag").with_method(EnumValueResolver::Path {
            path: vec!["meta".into(), "tags".into(), "1".into()],
        });
        assert_eq!(resolve_raw_value(&record, &path_idx), Some(json!("b")));

        let sum = SpecHeaderNode::leaf("total", "Total").with_method(EnumValueResolver::Computed {
            op: EnumComputeOp::Sum,
            operands: vec!["u1".into(), "u2".into(), "missing".into()],
        });
        assert_eq!(resolve_raw_value(&record, &sum), Some(json!(5.5)));

        let concat =
            SpecHeaderNode::leaf("who", "Who").with_method(EnumValueResolver::Computed {
                op: EnumComputeOp::Concat,
                operands: vec!["first".into(), "last".into(), "name".into()],
            });
        assert_eq!(
            resolve_raw_value(&record, &concat),
            Some(json!("Ada, Acetone"))
        );
    }
}
