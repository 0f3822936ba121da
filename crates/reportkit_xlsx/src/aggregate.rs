//! Group detection and subtotal/grand-total row planning.
//!
//! Records are taken in caller order. Every change of group key closes the
//! open block, even when the new key was seen before; blocks are never
//! merged across gaps.

use crate::spec::{EnumCellValue, SpecDataRecord};
use crate::util::{create_column_range_sum_formula, create_refs_sum_formula, derive_cell_ref};

/// One planned output row.
#[derive(Debug, Clone, PartialEq)]
pub enum EnumPlannedRow {
    /// Full-width group label row opening a block.
    Banner { row: usize, group: String },
    /// Row holding record `record_idx`.
    Data { row: usize, record_idx: usize },
    /// Block subtotal over data rows `row_start..=row_end`.
    Subtotal {
        row: usize,
        group: Option<String>,
        row_start: usize,
        row_end: usize,
        formulas: Vec<(usize, EnumCellValue)>,
    },
    /// Sum over every subtotal row (or over all data rows when ungrouped).
    GrandTotal {
        row: usize,
        formulas: Vec<(usize, EnumCellValue)>,
    },
}

impl EnumPlannedRow {
    pub fn row(&self) -> usize {
        match self {
            Self::Banner { row, .. }
            | Self::Data { row, .. }
            | Self::Subtotal { row, .. }
            | Self::GrandTotal { row, .. } => *row,
        }
    }
}

/// Annotated row stream for one sheet body.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SpecAggregatePlan {
    pub rows: Vec<EnumPlannedRow>,
    /// First row after the plan.
    pub next_row: usize,
}

impl SpecAggregatePlan {
    /// Subtotal rows in emission order.
    pub fn subtotal_rows(&self) -> Vec<usize> {
        self.rows
            .iter()
            .filter_map(|row| match row {
                EnumPlannedRow::Subtotal { row, .. } => Some(*row),
                _ => None,
            })
            .collect()
    }
}

/// Plan the body rows for `records` starting at `first_row`.
///
/// `numeric_cols` are the sheet columns that receive sum formulas in
/// subtotal and total rows. With `if_totals == false` only banner and data
/// rows are planned.
pub fn aggregate(
    records: &[SpecDataRecord],
    numeric_cols: &[usize],
    first_row: usize,
    if_totals: bool,
) -> SpecAggregatePlan {
    let if_grouped = records.iter().any(|record| record.group.is_some());

    let mut l_rows = Vec::with_capacity(records.len() + 2);
    let mut l_subtotal_rows: Vec<usize> = Vec::new();
    let mut n_row = first_row;
    let mut block_open: Option<(Option<String>, usize)> = None;

    let mut close_block = |group: Option<String>,
                           row_start: usize,
                           n_row: &mut usize,
                           l_rows: &mut Vec<EnumPlannedRow>| {
        if !if_totals {
            return;
        }
        let row_end = *n_row - 1;
        l_rows.push(EnumPlannedRow::Subtotal {
            row: *n_row,
            group,
            row_start,
            row_end,
            formulas: numeric_cols
                .iter()
                .map(|col| {
                    (
                        *col,
                        EnumCellValue::Formula(create_column_range_sum_formula(
                            *col, row_start, row_end,
                        )),
                    )
                })
                .collect(),
        });
        l_subtotal_rows.push(*n_row);
        *n_row += 1;
    };

    for (record_idx, record) in records.iter().enumerate() {
        if if_grouped {
            let if_changed = match &block_open {
                None => true,
                Some((group, _)) => group != &record.group,
            };
            if if_changed {
                if let Some((group, row_start)) = block_open.take() {
                    close_block(group, row_start, &mut n_row, &mut l_rows);
                }
                if let Some(group) = &record.group {
                    l_rows.push(EnumPlannedRow::Banner {
                        row: n_row,
                        group: group.clone(),
                    });
                    n_row += 1;
                }
                block_open = Some((record.group.clone(), n_row));
            }
        }

        l_rows.push(EnumPlannedRow::Data {
            row: n_row,
            record_idx,
        });
        n_row += 1;
    }

    if let Some((group, row_start)) = block_open.take() {
        close_block(group, row_start, &mut n_row, &mut l_rows);
    }

    if if_totals {
        let formulas = numeric_cols
            .iter()
            .map(|col| {
                let value = if records.is_empty() {
                    EnumCellValue::Number(0.0)
                } else if if_grouped {
                    let l_refs = l_subtotal_rows
                        .iter()
                        .map(|row| derive_cell_ref(*row, *col))
                        .collect::<Vec<_>>();
                    EnumCellValue::Formula(create_refs_sum_formula(&l_refs))
                } else {
                    EnumCellValue::Formula(create_column_range_sum_formula(
                        *col,
                        first_row,
                        n_row - 1,
                    ))
                };
                (*col, value)
            })
            .collect();
        l_rows.push(EnumPlannedRow::GrandTotal {
            row: n_row,
            formulas,
        });
        n_row += 1;
    }

    tracing::debug!(
        records = records.len(),
        blocks = l_subtotal_rows.len(),
        grouped = if_grouped,
        "planned report body"
    );

    SpecAggregatePlan {
        rows: l_rows,
        next_row: n_row,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn grouped(keys: &[Option<&str>]) -> Vec<SpecDataRecord> {
        keys.iter()
            .map(|key| SpecDataRecord {
                group: key.map(str::to_string),
                ..Default::default()
            })
            .collect()
    }

    fn grand_total(plan: &SpecAggregatePlan) -> &[(usize, EnumCellValue)] {
        match plan.rows.last() {
            Some(EnumPlannedRow::GrandTotal { formulas, .. }) => formulas,
            other => panic!("expected grand total, got {other:?}"),
        }
    }

    #[test]
    fn test_non_contiguous_groups_make_separate_blocks() {
        let records = grouped(&[Some("A"), Some("A"), Some("B"), Some("B"), Some("A")]);
        let plan = aggregate(&records, &[3], 3, true);

        let l_kinds = plan
            .rows
            .iter()
            .map(|row| match row {
                EnumPlannedRow::Banner { group, .. } => format!("banner:{group}"),
                EnumPlannedRow::Data { record_idx, .. } => format!("data:{record_idx}"),
                EnumPlannedRow::Subtotal { group, .. } => {
                    format!("sub:{}", group.as_deref().unwrap_or("-"))
                }
                EnumPlannedRow::GrandTotal { .. } => "total".to_string(),
            })
            .collect::<Vec<_>>();
        assert_eq!(
            l_kinds,
            vec![
                "banner:A", "data:0", "data:1", "sub:A", "banner:B", "data:2", "data:3", "sub:B",
                "banner:A", "data:4", "sub:A", "total"
            ]
        );
        assert_eq!(plan.subtotal_rows(), vec![6, 10, 13]);

        match &plan.rows[3] {
            EnumPlannedRow::Subtotal {
                row_start,
                row_end,
                formulas,
                ..
            } => {
                assert_eq!((*row_start, *row_end), (4, 5));
                assert_eq!(
                    formulas,
                    &vec![(3, EnumCellValue::Formula("=SUM(C4:C5)".to_string()))]
                );
            }
            other => panic!("expected subtotal, got {other:?}"),
        }
        assert_eq!(
            grand_total(&plan),
            &[(3, EnumCellValue::Formula("=SUM(C6,C10,C13)".to_string()))]
        );
        assert_eq!(plan.next_row, 15);
    }

    #[test]
    fn test_ungrouped_total_spans_all_data_rows() {
        let records = grouped(&[None, None, None]);
        let plan = aggregate(&records, &[2, 4], 5, true);
        assert!(plan.subtotal_rows().is_empty());
        assert_eq!(
            grand_total(&plan),
            &[
                (2, EnumCellValue::Formula("=SUM(B5:B7)".to_string())),
                (4, EnumCellValue::Formula("=SUM(D5:D7)".to_string())),
            ]
        );
    }

    #[test]
    fn test_single_record_with_group_gets_subtotal() {
        let plan = aggregate(&grouped(&[Some("Only")]), &[2], 2, true);
        assert_eq!(plan.rows.len(), 4);
        assert!(matches!(plan.rows[0], EnumPlannedRow::Banner { row: 2, .. }));
        assert!(matches!(plan.rows[1], EnumPlannedRow::Data { row: 3, .. }));
        assert_eq!(plan.subtotal_rows(), vec![4]);
        assert_eq!(
            grand_total(&plan),
            &[(2, EnumCellValue::Formula("=SUM(B4)".to_string()))]
        );
    }

    #[test]
    fn test_transition_into_no_group_closes_block_without_banner() {
        let plan = aggregate(&grouped(&[Some("A"), None, None]), &[1], 1, true);
        let n_banners = plan
            .rows
            .iter()
            .filter(|row| matches!(row, EnumPlannedRow::Banner { .. }))
            .count();
        assert_eq!(n_banners, 1);
        assert_eq!(plan.subtotal_rows(), vec![3, 6]);
        assert_eq!(
            grand_total(&plan),
            &[(1, EnumCellValue::Formula("=SUM(A3,A6)".to_string()))]
        );
    }

    #[test]
    fn test_no_records_and_totals_disabled() {
        let plan = aggregate(&[], &[2], 4, true);
        assert_eq!(
            plan.rows,
            vec![EnumPlannedRow::GrandTotal {
                row: 4,
                formulas: vec![(2, EnumCellValue::Number(0.0))]
            }]
        );

        let plan = aggregate(&grouped(&[Some("A"), Some("B")]), &[2], 1, false);
        assert_eq!(plan.rows.len(), 4);
        assert!(plan.subtotal_rows().is_empty());
        assert_eq!(plan.next_row, 5);
    }
}
