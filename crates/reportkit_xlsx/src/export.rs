//! Report build pipeline: tree validation, layout, binding and emission.

use crate::conf::{N_NCOLS_EXCEL_MAX, N_NROWS_EXCEL_MAX};
use crate::emit::GridEmitter;
use crate::error::ReportError;
use crate::header::{parse_report_sheet_json, split_header_axes, validate_header_tree};
use crate::layout::{resolve_column_layout, resolve_row_layout};
use crate::source::parse_records_json;
use crate::spec::{SpecDataRecord, SpecReportGrid, SpecReportSheet};

/// Build the positioned grid for one sheet.
///
/// Configuration errors abort before any cell is produced; data problems are
/// recovered with type defaults and listed in `grid.warnings`.
pub fn build_report_grid(
    sheet: &SpecReportSheet,
    records: &[SpecDataRecord],
) -> Result<SpecReportGrid, ReportError> {
    let span = tracing::info_span!(
        "build_report_grid",
        headers = sheet.headers.len(),
        records = records.len()
    );
    let _enter = span.enter();

    validate_header_tree(&sheet.headers)?;
    let (l_col_roots, l_row_roots) = split_header_axes(&sheet.headers);
    let options = &sheet.options;

    let mut emitter = GridEmitter::new(options);

    if l_row_roots.is_empty() {
        let (_, index_col) =
            resolve_column_layout(&l_col_roots, options.start_col, options.start_row);
        emitter.write_headers(&index_col, &l_col_roots);
        emitter.write_body(&index_col, &l_col_roots, records);
    } else {
        // Header extents do not depend on the axis origin, so a first column
        // pass only measures how many header rows the row tree sits below.
        let (_, index_measure) =
            resolve_column_layout(&l_col_roots, options.start_col, options.start_row);
        let (_, index_row) =
            resolve_row_layout(&l_row_roots, index_measure.data_start(), options.start_col);
        let (_, index_col) =
            resolve_column_layout(&l_col_roots, index_row.data_start(), options.start_row);

        emitter.write_headers(&index_col, &l_col_roots);
        emitter.write_headers(&index_row, &l_row_roots);
        emitter.write_matrix(&index_col, &l_col_roots, &index_row, &l_row_roots, records);
    }

    let grid = emitter.finish();
    check_excel_limits(&grid)?;

    tracing::debug!(
        cells = grid.cells.len(),
        merges = grid.merges.len(),
        bindings = grid.bindings.len(),
        warnings = grid.warnings.len(),
        "built report grid"
    );
    Ok(grid)
}

/// JSON entry point: sheet (or bare header tree) plus a record array in,
/// serialized grid out.
pub fn build_report_grid_json(sheet_json: &str, records_json: &str) -> Result<String, ReportError> {
    let sheet = parse_report_sheet_json(sheet_json)?;
    let l_records = parse_records_json(records_json)?;
    let grid = build_report_grid(&sheet, &l_records)?;
    Ok(serde_json::to_string(&grid)?)
}

fn check_excel_limits(grid: &SpecReportGrid) -> Result<(), ReportError> {
    if grid.n_rows > N_NROWS_EXCEL_MAX {
        return Err(ReportError::Limit(format!(
            "report needs {} rows, excel allows {N_NROWS_EXCEL_MAX}",
            grid.n_rows
        )));
    }
    if grid.n_cols > N_NCOLS_EXCEL_MAX {
        return Err(ReportError::Limit(format!(
            "report needs {} columns, excel allows {N_NCOLS_EXCEL_MAX}",
            grid.n_cols
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::{EnumCellValue, EnumHeaderType, EnumStyleTag, SpecHeaderNode, SpecMergeRange};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn sheet(headers: Vec<SpecHeaderNode>) -> SpecReportSheet {
        SpecReportSheet {
            headers,
            ..Default::default()
        }
    }

    #[test]
    fn test_header_merges_and_date_note() {
        let headers = vec![
            SpecHeaderNode::leaf("when", "Sampled on").typed(EnumHeaderType::Date),
            SpecHeaderNode::group(
                "site",
                "Site",
                vec![
                    SpecHeaderNode::leaf("lat", "Lat").typed(EnumHeaderType::Number),
                    SpecHeaderNode::leaf("lon", "Lon").typed(EnumHeaderType::Number),
                ],
            ),
        ];
        let grid = build_report_grid(&sheet(headers), &[]).unwrap();

        let when = grid.cell(1, 1).unwrap();
        assert_eq!(when.value, EnumCellValue::String("Date".to_string()));
        assert_eq!(when.note.as_deref(), Some("Sampled on"));
        assert_eq!(when.style, EnumStyleTag::Header);
        assert_eq!(
            grid.merges,
            vec![
                SpecMergeRange {
                    row_first: 1,
                    col_first: 1,
                    row_last: 2,
                    col_last: 1
                },
                SpecMergeRange {
                    row_first: 1,
                    col_first: 2,
                    row_last: 1,
                    col_last: 3
                },
            ]
        );
        assert_eq!(grid.header_rows, 2);
        assert_eq!(grid.header_cols, 0);
    }

    #[test]
    fn test_excluded_and_read_only_cells() {
        let headers = vec![
            SpecHeaderNode::leaf("name", "Name"),
            SpecHeaderNode {
                is_read_only: true,
                ..SpecHeaderNode::leaf("code", "Code")
            },
            SpecHeaderNode::leaf("qty", "Qty").typed(EnumHeaderType::Integer),
        ];
        let records = vec![
            SpecDataRecord::from_pairs([
                ("name", json!("a")),
                ("code", json!("X1")),
                ("qty", json!(4)),
            ])
            .excluding("qty"),
        ];
        let grid = build_report_grid(&sheet(headers), &records).unwrap();

        assert_eq!(grid.cell(2, 2).unwrap().style, EnumStyleTag::ReadOnly);
        let qty = grid.cell(2, 3).unwrap();
        assert_eq!(qty.value, EnumCellValue::None);
        assert_eq!(qty.style, EnumStyleTag::ReadOnly);

        // Total row: label in the first text column, sum under qty.
        assert_eq!(
            grid.cell(3, 1).unwrap().value,
            EnumCellValue::String("Total".to_string())
        );
        assert_eq!(
            grid.cell(3, 3).unwrap().value,
            EnumCellValue::Formula("=SUM(C2:C2)".to_string())
        );
    }

    #[test]
    fn test_bad_value_becomes_warning() {
        let headers = vec![SpecHeaderNode::leaf("n", "N").typed(EnumHeaderType::Number)];
        let records = vec![SpecDataRecord::from_pairs([("n", json!("lots"))])];
        let grid = build_report_grid(&sheet(headers), &records).unwrap();
        assert_eq!(grid.cell(2, 1).unwrap().value, EnumCellValue::Number(0.0));
        assert_eq!(grid.warnings.len(), 1);
        assert!(grid.warnings[0].contains("\"n\""));
    }

    #[test]
    fn test_long_text_grows_row_height() {
        let headers = vec![SpecHeaderNode::leaf("desc", "Description")];
        let records = vec![SpecDataRecord::from_pairs([("desc", json!("x".repeat(120)))])];
        let grid = build_report_grid(&sheet(headers), &records).unwrap();
        assert_eq!(grid.row_heights.get(&2), Some(&45.0));
        assert_eq!(grid.row_heights.get(&1), None);
    }

    #[test]
    fn test_json_entry_point() {
        let sheet_json = r#"{
            "headers": [
                {"id": "name", "label": "Name"},
                {"id": "ok", "label": "Ok", "type": "boolean"}
            ],
            "options": {"if_totals": false}
        }"#;
        let records_json = r#"[{"values": {"name": "a", "ok": true}}]"#;
        let text = build_report_grid_json(sheet_json, records_json).unwrap();
        let grid: SpecReportGrid = serde_json::from_str(&text).unwrap();

        assert_eq!(grid.n_rows, 2);
        assert_eq!(grid.bindings.len(), 1);
        assert_eq!(grid.bindings[0].cell_ref, "B2");
        assert_eq!(grid.bindings[0].handle_id, "boolean-yes-no");
    }

    #[test]
    fn test_json_bare_root_and_forest_use_default_options() {
        let root_json = r#"{"id": "root", "label": "Sheet", "children": [{"id": "a", "label": "A"}]}"#;
        let text = build_report_grid_json(root_json, "[]").unwrap();
        let grid: SpecReportGrid = serde_json::from_str(&text).unwrap();
        assert_eq!(grid.cell(1, 1).unwrap().value, EnumCellValue::String("Sheet".to_string()));
        assert_eq!(grid.cell(2, 1).unwrap().value, EnumCellValue::String("A".to_string()));
        assert_eq!(grid.header_rows, 2);

        let forest_json = r#"[{"id": "a", "label": "A"}, {"id": "b", "label": "B"}]"#;
        let text = build_report_grid_json(forest_json, "[]").unwrap();
        let grid: SpecReportGrid = serde_json::from_str(&text).unwrap();
        assert_eq!(grid.cell(1, 2).unwrap().value, EnumCellValue::String("B".to_string()));
    }

    #[test]
    fn test_json_sheet_with_unknown_key_or_no_headers_fails() {
        let err = build_report_grid_json(r#"{"header": [{"id": "a", "label": "A"}]}"#, "[]")
            .unwrap_err();
        assert!(matches!(err, ReportError::Json(_)));

        for sheet_json in [r#"{"headers": []}"#, "{}", "[]"] {
            let err = build_report_grid_json(sheet_json, "[]").unwrap_err();
            assert!(matches!(err, ReportError::EmptyHeaderTree), "{sheet_json}");
            assert!(err.is_configuration());
        }
    }

    #[test]
    fn test_choice_ids_are_written_as_display_text() {
        let mut report = sheet(vec![
            SpecHeaderNode::leaf("name", "Name"),
            SpecHeaderNode::leaf("ans", "Answer").with_choices([("y", "Yes"), ("n", "No")]),
        ]);
        report.options.if_totals = false;
        let records = vec![
            SpecDataRecord::from_pairs([("name", json!("a")), ("ans", json!("y"))]),
            SpecDataRecord::from_pairs([("name", json!("b")), ("ans", json!("No"))]),
        ];
        let grid = build_report_grid(&report, &records).unwrap();

        let first = grid.cell(2, 2).unwrap();
        assert_eq!(first.value, EnumCellValue::String("Yes".to_string()));
        assert_eq!(first.validation_ref.as_deref(), Some("choices:ans"));
        assert_eq!(
            grid.cell(3, 2).unwrap().value,
            EnumCellValue::String("No".to_string())
        );
        assert_eq!(
            grid.handle("choices:ans").unwrap().values,
            vec!["Yes".to_string(), "No".to_string()]
        );
    }

    #[test]
    fn test_row_header_choice_ids_are_written_as_display_text() {
        let report = sheet(vec![
            SpecHeaderNode::leaf("v", "Value"),
            SpecHeaderNode::leaf("status", "Status")
                .with_choices([("y", "Yes"), ("n", "No")])
                .as_row_header(),
        ]);
        let records = vec![SpecDataRecord::from_pairs([("v", json!("n"))]).for_row("status")];
        let grid = build_report_grid(&report, &records).unwrap();

        let cell = grid.cell(2, 2).unwrap();
        assert_eq!(cell.value, EnumCellValue::String("No".to_string()));
        assert_eq!(cell.validation_ref.as_deref(), Some("choices:status"));
        assert!(grid.warnings.is_empty());
    }

    #[test]
    fn test_configuration_error_aborts() {
        let headers = vec![
            SpecHeaderNode::leaf("a", "A"),
            SpecHeaderNode::leaf("a", "Again"),
        ];
        let err = build_report_grid(&sheet(headers), &[]).unwrap_err();
        assert!(err.is_configuration());
        assert_eq!(err.header_id(), Some("a"));
    }
}
