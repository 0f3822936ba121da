//! Choice-list validation handles and cell bindings.
//!
//! A registry belongs to exactly one export call. Handles are appended once
//! and never changed afterwards; binding only appends `(cell, handle)` pairs.

use std::collections::BTreeMap;

use crate::conf::{C_HANDLE_ID_CHOICES_PREFIX, C_HANDLE_ID_YES_NO, C_LABEL_NO, C_LABEL_YES, C_LABEL_YES_NO_HEADER};
use crate::header::collect_nodes;
use crate::spec::{
    EnumHeaderType, SpecHeaderNode, SpecLayoutIndex, SpecValidationBinding, SpecValidationHandle,
};
use crate::util::derive_cell_ref;

/// Per-export store of validation handles and bindings.
#[derive(Debug, Default)]
pub struct ValidationRegistry {
    handles: Vec<SpecValidationHandle>,
    bindings: Vec<SpecValidationBinding>,
}

impl ValidationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build handles for every leaf of `index` that needs one.
    ///
    /// Returns leaf id -> handle id. `headers` must be the tree `index` was
    /// resolved from.
    pub fn bind(
        &mut self,
        index: &SpecLayoutIndex,
        headers: &[SpecHeaderNode],
        if_legacy_yes_no_label: bool,
    ) -> BTreeMap<String, String> {
        let dict_nodes: BTreeMap<&str, &SpecHeaderNode> = collect_nodes(headers)
            .into_iter()
            .map(|node| (node.id.as_str(), node))
            .collect();

        let mut dict_bound = BTreeMap::new();
        for leaf_id in &index.leaf_ids {
            let Some(node) = dict_nodes.get(leaf_id.as_str()) else {
                continue;
            };
            if let Some(handle_id) = self.derive_handle(node, if_legacy_yes_no_label) {
                dict_bound.insert(leaf_id.clone(), handle_id);
            }
        }
        dict_bound
    }

    fn derive_handle(
        &mut self,
        node: &SpecHeaderNode,
        if_legacy_yes_no_label: bool,
    ) -> Option<String> {
        if node.is_sum_function {
            return None;
        }
        if let Some(choices) = &node.choices
            && !choices.is_empty()
        {
            let c_handle_id = format!("{C_HANDLE_ID_CHOICES_PREFIX}{}", node.id);
            if self.handle(&c_handle_id).is_none() {
                self.handles.push(SpecValidationHandle {
                    id: c_handle_id.clone(),
                    values: choices.values().cloned().collect(),
                });
            }
            return Some(c_handle_id);
        }

        let if_yes_no_label = if_legacy_yes_no_label
            && node.label.trim().eq_ignore_ascii_case(C_LABEL_YES_NO_HEADER);
        if node.header_type == EnumHeaderType::Boolean || if_yes_no_label {
            return Some(self.ensure_yes_no());
        }
        None
    }

    /// The shared yes/no handle, created on first use.
    pub fn ensure_yes_no(&mut self) -> String {
        if self.handle(C_HANDLE_ID_YES_NO).is_none() {
            self.handles.push(SpecValidationHandle {
                id: C_HANDLE_ID_YES_NO.to_string(),
                values: vec![C_LABEL_YES.to_string(), C_LABEL_NO.to_string()],
            });
        }
        C_HANDLE_ID_YES_NO.to_string()
    }

    /// Bind the cell at `(row, col)` to `handle_id`.
    pub fn attach(&mut self, handle_id: &str, row: usize, col: usize) {
        self.bindings.push(SpecValidationBinding {
            cell_ref: derive_cell_ref(row, col),
            row,
            col,
            handle_id: handle_id.to_string(),
        });
    }

    pub fn handle(&self, id: &str) -> Option<&SpecValidationHandle> {
        self.handles.iter().find(|h| h.id == id)
    }

    /// Consume into `(handles, bindings)`.
    pub fn into_parts(self) -> (Vec<SpecValidationHandle>, Vec<SpecValidationBinding>) {
        (self.handles, self.bindings)
    }
}
