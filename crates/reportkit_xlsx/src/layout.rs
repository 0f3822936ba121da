//! Header tree layout.
//!
//! Column and row layouts share one depth-first walk; the axis only decides
//! how a resolved [`SpecLayoutCell`] maps to sheet rows and columns. Leaves
//! are pushed to the deepest header level of the whole tree so sibling
//! subtrees of different heights line up on the same data boundary.

use std::collections::BTreeMap;

use crate::spec::{EnumLayoutAxis, SpecHeaderNode, SpecLayoutCell, SpecLayoutIndex, SpecMergeRange};

/// Placement recorded during the walk, before leaf depths are known.
struct SpecPlacement {
    id: String,
    axis_start: usize,
    axis_end: usize,
    level: usize,
    is_leaf: bool,
}

/// Lay `nodes` out along `axis`.
///
/// Returns the primary-axis index right after the last consumed slot, plus
/// the resolved index. `axis_start`/`depth_start` are 1-based sheet indices.
pub fn resolve_layout(
    nodes: &[SpecHeaderNode],
    axis: EnumLayoutAxis,
    axis_start: usize,
    depth_start: usize,
) -> (usize, SpecLayoutIndex) {
    let mut l_placements = Vec::new();
    let (n_axis_next, n_level_deepest) =
        walk_nodes(nodes, axis_start, depth_start, &mut l_placements);

    let n_header_extent = if l_placements.is_empty() {
        0
    } else {
        n_level_deepest + 1 - depth_start
    };

    let mut dict_cells = BTreeMap::new();
    let mut l_leaf_ids = Vec::new();
    for placement in l_placements {
        let n_depth = if placement.is_leaf {
            l_leaf_ids.push(placement.id.clone());
            n_level_deepest
        } else {
            placement.level
        };
        dict_cells.insert(
            placement.id,
            SpecLayoutCell {
                axis_start: placement.axis_start,
                axis_end: placement.axis_end,
                depth: n_depth,
                depth_anchor: placement.level,
                is_leaf: placement.is_leaf,
            },
        );
    }

    tracing::debug!(
        ?axis,
        slots = n_axis_next - axis_start,
        header_extent = n_header_extent,
        "resolved header layout"
    );

    (
        n_axis_next,
        SpecLayoutIndex {
            axis,
            cells: dict_cells,
            leaf_ids: l_leaf_ids,
            axis_origin: axis_start,
            depth_origin: depth_start,
            max_axis_index: n_axis_next - axis_start,
            header_extent: n_header_extent,
        },
    )
}

/// Column layout: leaves become columns starting at `start_col`, header rows
/// start at `start_row`.
pub fn resolve_column_layout(
    nodes: &[SpecHeaderNode],
    start_col: usize,
    start_row: usize,
) -> (usize, SpecLayoutIndex) {
    resolve_layout(nodes, EnumLayoutAxis::Column, start_col, start_row)
}

/// Row layout: leaves become rows starting at `start_row`, header columns
/// start at `start_col`.
pub fn resolve_row_layout(
    nodes: &[SpecHeaderNode],
    start_row: usize,
    start_col: usize,
) -> (usize, SpecLayoutIndex) {
    resolve_layout(nodes, EnumLayoutAxis::Row, start_row, start_col)
}

/// Walk siblings; returns `(next axis slot, deepest level reached)`.
fn walk_nodes(
    nodes: &[SpecHeaderNode],
    axis_cursor: usize,
    level: usize,
    placements: &mut Vec<SpecPlacement>,
) -> (usize, usize) {
    let mut n_cursor = axis_cursor;
    let mut n_deepest = level;

    for node in nodes {
        let n_node_start = n_cursor;
        if node.is_leaf() {
            n_cursor += 1;
        } else {
            let (n_next, n_child_deepest) =
                walk_nodes(&node.children, n_cursor, level + 1, placements);
            n_cursor = n_next;
            n_deepest = usize::max(n_deepest, n_child_deepest);
        }

        placements.push(SpecPlacement {
            id: node.id.clone(),
            axis_start: n_node_start,
            axis_end: n_cursor - 1,
            level,
            is_leaf: node.is_leaf(),
        });
    }

    (n_cursor, n_deepest)
}

/// Sheet rectangle covered by one header cell.
///
/// The anchor is the node's own level; leaves stretch to the deepest level,
/// internal nodes stay on their level and stretch along the primary axis.
pub fn derive_header_rect(axis: EnumLayoutAxis, cell: &SpecLayoutCell) -> SpecMergeRange {
    match axis {
        EnumLayoutAxis::Column => SpecMergeRange {
            row_first: cell.depth_anchor,
            col_first: cell.axis_start,
            row_last: cell.depth,
            col_last: cell.axis_end,
        },
        EnumLayoutAxis::Row => SpecMergeRange {
            row_first: cell.axis_start,
            col_first: cell.depth_anchor,
            row_last: cell.axis_end,
            col_last: cell.depth,
        },
    }
}
