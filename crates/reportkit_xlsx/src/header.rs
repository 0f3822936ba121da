//! Header tree checks and traversal helpers.

use std::collections::BTreeSet;

use serde::Deserialize;
use serde_json::Value;

use crate::error::ReportError;
use crate::spec::{EnumValueResolver, SpecHeaderNode, SpecReportSheet};

////////////////////////////////////////////////////////////////////////////////
// #region Traversal

/// Leaves of `nodes` in depth-first, left-to-right order.
pub fn collect_leaves(nodes: &[SpecHeaderNode]) -> Vec<&SpecHeaderNode> {
    let mut l_leaves = Vec::new();
    for node in nodes {
        push_leaves(node, &mut l_leaves);
    }
    l_leaves
}

fn push_leaves<'a>(node: &'a SpecHeaderNode, out: &mut Vec<&'a SpecHeaderNode>) {
    if node.is_leaf() {
        out.push(node);
        return;
    }
    for child in &node.children {
        push_leaves(child, out);
    }
}

/// Every node of `nodes`, pre-order.
pub fn collect_nodes(nodes: &[SpecHeaderNode]) -> Vec<&SpecHeaderNode> {
    let mut l_nodes = Vec::new();
    let mut l_stack: Vec<&SpecHeaderNode> = nodes.iter().rev().collect();
    while let Some(node) = l_stack.pop() {
        l_nodes.push(node);
        l_stack.extend(node.children.iter().rev());
    }
    l_nodes
}

/// Split roots into `(column_roots, row_roots)` by `is_row_header`.
pub fn split_header_axes(nodes: &[SpecHeaderNode]) -> (Vec<SpecHeaderNode>, Vec<SpecHeaderNode>) {
    nodes.iter().cloned().partition(|node| !node.is_row_header)
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Validation

/// Reject malformed header trees before any layout work starts.
pub fn validate_header_tree(nodes: &[SpecHeaderNode]) -> Result<(), ReportError> {
    let mut set_ids = BTreeSet::new();
    for node in collect_nodes(nodes) {
        if node.id.trim().is_empty() {
            return Err(ReportError::BlankHeaderId {
                label: node.label.clone(),
            });
        }
        if !set_ids.insert(node.id.as_str()) {
            return Err(ReportError::DuplicateHeaderId {
                id: node.id.clone(),
            });
        }
    }

    for root in nodes {
        for child in collect_nodes(&root.children) {
            if child.is_row_header && !root.is_row_header {
                return Err(ReportError::MisplacedRowHeader {
                    id: child.id.clone(),
                });
            }
        }
    }

    let (l_col_roots, l_row_roots) = split_header_axes(nodes);
    validate_axis(&l_col_roots)?;
    validate_axis(&l_row_roots)
}

fn validate_axis(nodes: &[SpecHeaderNode]) -> Result<(), ReportError> {
    let set_leaf_ids: BTreeSet<&str> = collect_leaves(nodes)
        .into_iter()
        .map(|node| node.id.as_str())
        .collect();

    for node in collect_nodes(nodes) {
        if node.is_sum_function {
            if !node.is_leaf() {
                return Err(ReportError::SumFunctionOnInternalHeader {
                    id: node.id.clone(),
                });
            }
            if node.sum_of.is_empty() {
                return Err(ReportError::SumFunctionWithoutOperands {
                    id: node.id.clone(),
                });
            }
            for operand in &node.sum_of {
                if operand == &node.id || !set_leaf_ids.contains(operand.as_str()) {
                    return Err(ReportError::UnknownSumOperand {
                        id: node.id.clone(),
                        operand: operand.clone(),
                    });
                }
            }
        }

        if let Some(method) = &node.method {
            validate_method(node, method)?;
        }
    }
    Ok(())
}

fn validate_method(node: &SpecHeaderNode, method: &EnumValueResolver) -> Result<(), ReportError> {
    let fail = |reason: &str| {
        Err(ReportError::UnresolvedMethod {
            id: node.id.clone(),
            reason: reason.to_string(),
        })
    };

    if !node.is_leaf() {
        return fail("internal headers carry no value");
    }
    match method {
        EnumValueResolver::Direct => Ok(()),
        EnumValueResolver::Field { key } if key.trim().is_empty() => fail("empty field key"),
        EnumValueResolver::Field { .. } => Ok(()),
        EnumValueResolver::Path { path } if path.is_empty() => fail("empty path"),
        EnumValueResolver::Path { path } if path.iter().any(|seg| seg.trim().is_empty()) => {
            fail("empty path segment")
        }
        EnumValueResolver::Path { .. } => Ok(()),
        EnumValueResolver::Computed { operands, .. } if operands.is_empty() => {
            fail("computed method without operands")
        }
        EnumValueResolver::Computed { .. } => Ok(()),
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region JsonInput

#[derive(Deserialize)]
#[serde(untagged)]
enum EnumHeaderTreeJson {
    Forest(Vec<SpecHeaderNode>),
    Root(Box<SpecHeaderNode>),
}

/// Parse a header tree given either as a list of roots or as a single root.
///
/// A method name outside the known strategy set fails here, naming the
/// serde error; callers treat it as a configuration error.
pub fn parse_header_tree_json(text: &str) -> Result<Vec<SpecHeaderNode>, ReportError> {
    let tree = match serde_json::from_str::<EnumHeaderTreeJson>(text) {
        Ok(EnumHeaderTreeJson::Forest(nodes)) => nodes,
        Ok(EnumHeaderTreeJson::Root(node)) => vec![*node],
        Err(_) => {
            // Re-parse strictly as a list so the error points at the real problem.
            serde_json::from_str::<Vec<SpecHeaderNode>>(text)?
        }
    };
    Ok(tree)
}

/// Parse a sheet definition.
///
/// Accepts a `{ "headers": [...], "options": {...} }` object, or a bare header
/// tree (list of roots or a single root node) with default options. Unknown
/// sheet keys and a tree without headers are rejected.
pub fn parse_report_sheet_json(text: &str) -> Result<SpecReportSheet, ReportError> {
    let value: Value = serde_json::from_str(text)?;
    let if_sheet_object = value
        .as_object()
        .is_some_and(|dict_obj| !dict_obj.contains_key("id"));

    let sheet = if if_sheet_object {
        serde_json::from_value::<SpecReportSheet>(value)?
    } else {
        SpecReportSheet {
            headers: parse_header_tree_json(text)?,
            ..Default::default()
        }
    };
    if sheet.headers.is_empty() {
        return Err(ReportError::EmptyHeaderTree);
    }
    Ok(sheet)
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
