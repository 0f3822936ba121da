use pretty_assertions::assert_eq;
use reportkit_xlsx::{
    C_HANDLE_ID_YES_NO, EnumCellValue, EnumHeaderType, EnumStyleTag, ReportError, SpecDataRecord,
    SpecHeaderNode, SpecMergeRange, SpecReportGrid, SpecReportSheet, XlsxWriter,
    build_report_grid, derive_default_xlsx_formats, derive_default_xlsx_write_options,
};
use serde_json::json;

fn sheet(headers: Vec<SpecHeaderNode>) -> SpecReportSheet {
    SpecReportSheet {
        headers,
        ..Default::default()
    }
}

fn value_at(grid: &SpecReportGrid, row: usize, col: usize) -> EnumCellValue {
    grid.cell(row, col)
        .map(|cell| cell.value.clone())
        .unwrap_or_else(|| panic!("no cell at ({row}, {col})"))
}

fn formula(text: &str) -> EnumCellValue {
    EnumCellValue::Formula(text.to_string())
}

fn text(text: &str) -> EnumCellValue {
    EnumCellValue::String(text.to_string())
}

#[test]
fn test_usage_tree_sum_formula() {
    let headers = vec![SpecHeaderNode::group(
        "root",
        "Substances",
        vec![
            SpecHeaderNode::leaf("name", "Name"),
            SpecHeaderNode::leaf("q1", "Quantity").sum_of(["usage1", "usage2"]),
            SpecHeaderNode::leaf("usage1", "Usage 1").typed(EnumHeaderType::Number),
            SpecHeaderNode::leaf("usage2", "Usage 2").typed(EnumHeaderType::Number),
        ],
    )];
    let records = vec![
        SpecDataRecord::from_pairs([("name", json!("Acetone")), ("usage1", json!(1.5)), ("usage2", json!(2))]),
        SpecDataRecord::from_pairs([("name", json!("Ethanol")), ("usage1", json!(4))]),
    ];
    let grid = build_report_grid(&sheet(headers), &records).unwrap();

    assert_eq!(value_at(&grid, 1, 1), text("Substances"));
    assert!(grid.merges.contains(&SpecMergeRange {
        row_first: 1,
        col_first: 1,
        row_last: 1,
        col_last: 4
    }));
    assert_eq!(value_at(&grid, 2, 3), text("Usage 1"));
    assert_eq!(value_at(&grid, 2, 4), text("Usage 2"));

    assert_eq!(value_at(&grid, 3, 2), formula("=SUM(C3:D3)"));
    assert_eq!(value_at(&grid, 4, 2), formula("=SUM(C4:D4)"));
    assert_eq!(grid.cell(3, 2).unwrap().style, EnumStyleTag::Formula);
    assert_eq!(value_at(&grid, 3, 3), EnumCellValue::Number(1.5));
    assert_eq!(value_at(&grid, 4, 4), EnumCellValue::Number(0.0));

    assert_eq!(value_at(&grid, 5, 1), text("Total"));
    assert_eq!(value_at(&grid, 5, 2), formula("=SUM(B3:B4)"));
    assert_eq!(value_at(&grid, 5, 3), formula("=SUM(C3:C4)"));
    assert_eq!(grid.n_rows, 5);
    assert_eq!(grid.n_cols, 4);
    assert!(grid.warnings.is_empty());
}

#[test]
fn test_boolean_cells_and_shared_handle() {
    let headers = vec![
        SpecHeaderNode::leaf("name", "Name"),
        SpecHeaderNode::leaf("ok", "Checked").typed(EnumHeaderType::Boolean),
    ];
    let records = vec![
        SpecDataRecord::from_pairs([("ok", json!(true))]),
        SpecDataRecord::from_pairs([("ok", json!(false))]),
        SpecDataRecord::from_pairs([("ok", json!(null))]),
        SpecDataRecord::default(),
    ];
    let mut report = sheet(headers);
    report.options.if_totals = false;
    let grid = build_report_grid(&report, &records).unwrap();

    let l_values = (2..=5).map(|row| value_at(&grid, row, 2)).collect::<Vec<_>>();
    assert_eq!(l_values, vec![text("Yes"), text("No"), text(""), text("")]);

    assert_eq!(grid.handles.len(), 1);
    assert_eq!(grid.handle(C_HANDLE_ID_YES_NO).unwrap().values, vec!["Yes", "No"]);
    let l_refs = grid
        .bindings
        .iter()
        .map(|binding| binding.cell_ref.as_str())
        .collect::<Vec<_>>();
    assert_eq!(l_refs, vec!["B2", "B3", "B4", "B5"]);
    for row in 2..=5 {
        assert_eq!(
            grid.cell(row, 2).unwrap().validation_ref.as_deref(),
            Some(C_HANDLE_ID_YES_NO)
        );
    }
}

#[test]
fn test_choices_bound_to_every_data_cell() {
    let headers = vec![
        SpecHeaderNode::leaf("name", "Name"),
        SpecHeaderNode::leaf("answer", "Answer").with_choices([
            ("y", "Yes"),
            ("n", "No"),
            ("m", "Maybe"),
        ]),
    ];
    let records = (0..3)
        .map(|idx| SpecDataRecord::from_pairs([("name", json!(format!("r{idx}")))]).in_group("G"))
        .collect::<Vec<_>>();
    let grid = build_report_grid(&sheet(headers), &records).unwrap();

    assert_eq!(
        grid.handle("choices:answer").unwrap().values,
        vec!["Yes", "No", "Maybe"]
    );
    // Banner on row 2, data rows 3..=5, subtotal 6, total 7.
    let l_rows = grid.bindings.iter().map(|b| (b.row, b.col)).collect::<Vec<_>>();
    assert_eq!(l_rows, vec![(3, 2), (4, 2), (5, 2)]);
    assert!(grid.cell(6, 2).unwrap().validation_ref.is_none());
}

#[test]
fn test_group_blocks_and_grand_total() {
    let headers = vec![
        SpecHeaderNode::leaf("name", "Name"),
        SpecHeaderNode::leaf("qty", "Qty").typed(EnumHeaderType::Number),
    ];
    let records = ["A", "A", "B", "B", "A"]
        .iter()
        .enumerate()
        .map(|(idx, group)| {
            SpecDataRecord::from_pairs([("name", json!(idx)), ("qty", json!(idx + 1))]).in_group(*group)
        })
        .collect::<Vec<_>>();
    let grid = build_report_grid(&sheet(headers), &records).unwrap();

    assert_eq!(value_at(&grid, 2, 1), text("A"));
    assert_eq!(grid.cell(2, 1).unwrap().style, EnumStyleTag::Banner);
    assert!(grid.merges.contains(&SpecMergeRange {
        row_first: 2,
        col_first: 1,
        row_last: 2,
        col_last: 2
    }));

    assert_eq!(value_at(&grid, 5, 1), text("Subtotal: A"));
    assert_eq!(value_at(&grid, 5, 2), formula("=SUM(B3:B4)"));
    assert_eq!(value_at(&grid, 6, 1), text("B"));
    assert_eq!(value_at(&grid, 9, 2), formula("=SUM(B7:B8)"));
    assert_eq!(value_at(&grid, 10, 1), text("A"));
    assert_eq!(value_at(&grid, 12, 2), formula("=SUM(B11:B11)"));

    assert_eq!(value_at(&grid, 13, 1), text("Total"));
    assert_eq!(value_at(&grid, 13, 2), formula("=SUM(B5,B9,B12)"));
    assert_eq!(grid.cell(13, 2).unwrap().style, EnumStyleTag::Total);
}

#[test]
fn test_configuration_errors_name_the_header() {
    let headers = vec![SpecHeaderNode {
        is_sum_function: true,
        sum_of: vec!["a".to_string()],
        ..SpecHeaderNode::group("grp", "Group", vec![SpecHeaderNode::leaf("a", "A")])
    }];
    let err = build_report_grid(&sheet(headers), &[]).unwrap_err();
    assert!(matches!(err, ReportError::SumFunctionOnInternalHeader { .. }));
    assert_eq!(err.header_id(), Some("grp"));

    let headers = vec![
        SpecHeaderNode::leaf("a", "A"),
        SpecHeaderNode::leaf("t", "T").sum_of(["a", "ghost"]),
    ];
    let err = build_report_grid(&sheet(headers), &[]).unwrap_err();
    assert_eq!(err.header_id(), Some("t"));
    assert!(err.to_string().contains("ghost"));
}

#[test]
fn test_dual_axis_sheet() {
    let headers = vec![
        SpecHeaderNode::leaf("a", "Site A").typed(EnumHeaderType::Number),
        SpecHeaderNode::leaf("b", "Site B").typed(EnumHeaderType::Number),
        SpecHeaderNode::group(
            "items",
            "Items",
            vec![
                SpecHeaderNode::leaf("r1", "Water"),
                SpecHeaderNode::leaf("r2", "Power"),
                SpecHeaderNode::leaf("r3", "Audited").typed(EnumHeaderType::Boolean),
                SpecHeaderNode::leaf("rsum", "Water + Power").sum_of(["r1", "r2"]),
            ],
        )
        .as_row_header(),
    ];
    let records = vec![
        SpecDataRecord::from_pairs([("a", json!(1)), ("b", json!(2))]).for_row("r1"),
        SpecDataRecord::from_pairs([("a", json!(3)), ("b", json!("x"))]).for_row("r2"),
        SpecDataRecord::from_pairs([("a", json!(true))]).for_row("r3"),
        SpecDataRecord::from_pairs([("a", json!(9))]).for_row("nope"),
    ];
    let grid = build_report_grid(&sheet(headers), &records).unwrap();

    // One header row, two row-header columns; values start at C2.
    assert_eq!((grid.header_rows, grid.header_cols), (1, 2));
    assert_eq!(value_at(&grid, 1, 3), text("Site A"));
    assert_eq!(value_at(&grid, 2, 1), text("Items"));
    assert_eq!(grid.cell(2, 1).unwrap().style, EnumStyleTag::RowHeader);
    assert!(grid.merges.contains(&SpecMergeRange {
        row_first: 2,
        col_first: 1,
        row_last: 5,
        col_last: 1
    }));

    assert_eq!(value_at(&grid, 2, 3), EnumCellValue::Number(1.0));
    assert_eq!(value_at(&grid, 3, 4), EnumCellValue::Number(0.0));
    assert_eq!(value_at(&grid, 4, 3), text("Yes"));
    assert_eq!(value_at(&grid, 4, 4), text(""));
    assert_eq!(value_at(&grid, 5, 3), formula("=SUM(C2:C3)"));
    assert_eq!(value_at(&grid, 5, 4), formula("=SUM(D2:D3)"));

    let l_bound = grid
        .bindings
        .iter()
        .map(|b| (b.cell_ref.as_str(), b.handle_id.as_str()))
        .collect::<Vec<_>>();
    assert_eq!(l_bound, vec![("C4", C_HANDLE_ID_YES_NO), ("D4", C_HANDLE_ID_YES_NO)]);
    assert_eq!(grid.warnings.len(), 2);
}

#[test]
fn test_writer_saves_dual_axis_and_grouped_sheets() {
    let dir = tempfile::tempdir().unwrap();
    let path_file_out = dir.path().join("out.xlsx");
    let mut writer = XlsxWriter::new(
        path_file_out.clone(),
        derive_default_xlsx_formats(),
        derive_default_xlsx_write_options(),
    );

    let headers = vec![
        SpecHeaderNode::leaf("name", "Name"),
        SpecHeaderNode::leaf("qty", "Qty").typed(EnumHeaderType::Integer),
    ];
    let records = vec![
        SpecDataRecord::from_pairs([("name", json!("a")), ("qty", json!(2))]).in_group("G1"),
        SpecDataRecord::from_pairs([("name", json!("b")), ("qty", json!(3))]).in_group("G2"),
    ];
    writer.write_report("Grouped", &sheet(headers), &records).unwrap();

    let headers = vec![
        SpecHeaderNode::leaf("v", "Value").typed(EnumHeaderType::Number),
        SpecHeaderNode::leaf("row", "Row").as_row_header(),
    ];
    let records = vec![SpecDataRecord::from_pairs([("v", json!(1))]).for_row("row")];
    writer.write_report("Matrix", &sheet(headers), &records).unwrap();
    writer.close().unwrap();

    assert!(std::fs::metadata(&path_file_out).unwrap().len() > 0);
    let l_names = writer
        .report()
        .into_iter()
        .map(|report| report.sheet_name)
        .collect::<Vec<_>>();
    assert_eq!(l_names, vec!["Grouped", "Matrix"]);
}
