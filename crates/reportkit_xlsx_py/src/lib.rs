use std::collections::BTreeMap;
use std::path::PathBuf;

use pyo3::exceptions::{PyRuntimeError, PyValueError};
use pyo3::prelude::*;
use pyo3::types::{PyAny, PyDict, PyList, PyTuple};
use reportkit_xlsx::conf::{derive_default_xlsx_formats, derive_default_xlsx_write_options};
use reportkit_xlsx::spec::{
    EnumAutofitColumnsRule, EnumStyleTag, SpecAutofitCellsPolicy, SpecCellFormat,
    SpecReportSheet, SpecXlsxWriteOptions,
};
use reportkit_xlsx::{
    ReportError, XlsxWriter as RsXlsxWriter, build_report_grid_json, parse_records_json,
    parse_report_sheet_json,
};

const N_BRIDGE_ABI_VERSION: u64 = 1;
const C_BRIDGE_CONTRACT_VERSION: &str = "reportkit.xlsx.report.v1";
const C_BRIDGE_TRANSPORT: &str = "json+ipc";

#[pyclass(name = "ReportWriter")]
struct PyReportWriter {
    #[pyo3(get)]
    file_out: String,
    inner: RsXlsxWriter,
}

#[pymethods]
impl PyReportWriter {
    #[new]
    #[pyo3(signature = (file_out, formats = None, write_options = None))]
    fn new(
        file_out: String,
        formats: Option<&Bound<'_, PyDict>>,
        write_options: Option<&Bound<'_, PyAny>>,
    ) -> PyResult<Self> {
        let path_file_out = PathBuf::from(&file_out);

        let mut dict_formats = derive_default_xlsx_formats();
        if let Some(formats) = formats {
            for (key, value) in formats.iter() {
                let c_tag = key.extract::<String>()?;
                let tag = parse_style_tag(&c_tag)?;
                if let Some(fmt_patch) = parse_spec_cell_format(Some(&value))? {
                    let fmt_base = dict_formats.get(&tag).cloned().unwrap_or_default();
                    dict_formats.insert(tag, fmt_base.merge(&fmt_patch));
                }
            }
        }

        let cfg_write_options = parse_spec_xlsx_write_options(write_options)?
            .unwrap_or_else(derive_default_xlsx_write_options);

        let inner = RsXlsxWriter::new(path_file_out, dict_formats, cfg_write_options);
        Ok(Self { file_out, inner })
    }

    fn __enter__(slf: PyRefMut<'_, Self>) -> PyRefMut<'_, Self> {
        slf
    }

    #[pyo3(signature = (_exc_type=None, _exc=None, _tb=None))]
    fn __exit__(
        &mut self,
        _exc_type: Option<&Bound<'_, PyAny>>,
        _exc: Option<&Bound<'_, PyAny>>,
        _tb: Option<&Bound<'_, PyAny>>,
    ) -> PyResult<()> {
        self.close()
    }

    fn close(&mut self) -> PyResult<()> {
        self.inner.close().map_err(derive_py_err)
    }

    /// Tuple of `{"sheet_name", "n_rows", "n_cols", "warnings"}` dicts.
    fn report(&self, py: Python<'_>) -> PyResult<Py<PyAny>> {
        let l_reports = self.inner.report();

        let mut l_report_obj = Vec::with_capacity(l_reports.len());
        for report in l_reports {
            let dict_report = PyDict::new(py);
            dict_report.set_item("sheet_name", report.sheet_name)?;
            dict_report.set_item("n_rows", report.n_rows)?;
            dict_report.set_item("n_cols", report.n_cols)?;
            dict_report.set_item("warnings", PyList::new(py, report.warnings)?)?;
            l_report_obj.push(dict_report.into_any().unbind());
        }

        let tup_report = PyTuple::new(py, l_report_obj)?;
        Ok(tup_report.into_any().unbind())
    }

    /// Write one sheet from a JSON sheet definition and a JSON record array.
    fn write_report_json<'py>(
        mut slf: PyRefMut<'py, Self>,
        sheet_name: &str,
        sheet_json: &str,
        records_json: &str,
    ) -> PyResult<PyRefMut<'py, Self>> {
        let sheet = parse_report_sheet_json(sheet_json).map_err(derive_py_err)?;
        let l_records = parse_records_json(records_json).map_err(derive_py_err)?;
        slf.inner
            .write_report(sheet_name, &sheet, &l_records)
            .map_err(derive_py_err)?;
        Ok(slf)
    }

    /// Write one sheet whose records come from Polars IPC bytes.
    #[pyo3(signature = (sheet_name, sheet_json, v_ipc_df, group_col = None, row_key_col = None))]
    fn write_report_ipc<'py>(
        mut slf: PyRefMut<'py, Self>,
        sheet_name: &str,
        sheet_json: &str,
        v_ipc_df: &[u8],
        group_col: Option<&str>,
        row_key_col: Option<&str>,
    ) -> PyResult<PyRefMut<'py, Self>> {
        let sheet = parse_report_sheet_json(sheet_json).map_err(derive_py_err)?;
        slf.inner
            .write_report_from_ipc_bytes(sheet_name, &sheet, v_ipc_df, group_col, row_key_col)
            .map_err(derive_py_err)?;
        Ok(slf)
    }

    /// Write one sheet from any object `polars.DataFrame(...)` accepts.
    #[pyo3(signature = (sheet_name, sheet_json, df, group_col = None, row_key_col = None))]
    fn write_report_df<'py>(
        mut slf: PyRefMut<'py, Self>,
        py: Python<'py>,
        sheet_name: &str,
        sheet_json: &str,
        df: &Bound<'py, PyAny>,
        group_col: Option<&str>,
        row_key_col: Option<&str>,
    ) -> PyResult<PyRefMut<'py, Self>> {
        let sheet: SpecReportSheet = parse_report_sheet_json(sheet_json).map_err(derive_py_err)?;
        let v_ipc_df = derive_ipc_bytes_from_any_dataframe(py, df)?;
        slf.inner
            .write_report_from_ipc_bytes(sheet_name, &sheet, &v_ipc_df, group_col, row_key_col)
            .map_err(derive_py_err)?;
        Ok(slf)
    }
}

/// Build a report grid without writing a workbook; returns the grid as JSON.
#[pyfunction(name = "build_report_grid_json")]
fn py_build_report_grid_json(sheet_json: &str, records_json: &str) -> PyResult<String> {
    build_report_grid_json(sheet_json, records_json).map_err(derive_py_err)
}

/// Tree, input-shape and option errors surface as `ValueError`; I/O as `RuntimeError`.
fn derive_py_err(err: ReportError) -> PyErr {
    match &err {
        ReportError::Json(_) | ReportError::Source(_) | ReportError::InvalidOption(_) => {
            PyValueError::new_err(err.to_string())
        }
        _ if err.is_configuration() => PyValueError::new_err(err.to_string()),
        _ => PyRuntimeError::new_err(err.to_string()),
    }
}

fn derive_ipc_bytes_from_any_dataframe(py: Python<'_>, df: &Bound<'_, PyAny>) -> PyResult<Vec<u8>> {
    let df_polars = convert_to_polars_dataframe(py, df)?;
    let obj_buffer = df_polars.call_method1("write_ipc", (py.None(),))?;
    obj_buffer.call_method0("getvalue")?.extract::<Vec<u8>>()
}

fn convert_to_polars_dataframe<'py>(
    py: Python<'py>,
    df: &Bound<'py, PyAny>,
) -> PyResult<Bound<'py, PyAny>> {
    let module_polars = py.import("polars")?;
    let cls_dataframe = module_polars.getattr("DataFrame")?;

    if df.is_instance(&cls_dataframe)? {
        return Ok(df.clone());
    }

    cls_dataframe.call1((df,))
}

fn parse_style_tag(value: &str) -> PyResult<EnumStyleTag> {
    let dict_tags = BTreeMap::from([
        ("header", EnumStyleTag::Header),
        ("row_header", EnumStyleTag::RowHeader),
        ("banner", EnumStyleTag::Banner),
        ("text", EnumStyleTag::Text),
        ("integer", EnumStyleTag::Integer),
        ("decimal", EnumStyleTag::Decimal),
        ("read_only", EnumStyleTag::ReadOnly),
        ("formula", EnumStyleTag::Formula),
        ("subtotal", EnumStyleTag::Subtotal),
        ("total", EnumStyleTag::Total),
    ]);
    dict_tags.get(value).copied().ok_or_else(|| {
        PyValueError::new_err(format!(
            "Unknown format key {value:?}; expected one of: {}.",
            dict_tags.keys().copied().collect::<Vec<_>>().join(", ")
        ))
    })
}

fn parse_spec_cell_format(obj: Option<&Bound<'_, PyAny>>) -> PyResult<Option<SpecCellFormat>> {
    let Some(obj) = obj else {
        return Ok(None);
    };
    if obj.is_none() {
        return Ok(None);
    }

    Ok(Some(SpecCellFormat {
        font_name: extract_optional_attr::<String>(obj, "font_name")?,
        font_size: extract_optional_attr::<i64>(obj, "font_size")?,
        bold: extract_optional_attr::<bool>(obj, "bold")?,
        italic: extract_optional_attr::<bool>(obj, "italic")?,
        align: extract_optional_attr::<String>(obj, "align")?,
        valign: extract_optional_attr::<String>(obj, "valign")?,
        border: extract_optional_attr::<i64>(obj, "border")?,
        text_wrap: extract_optional_attr::<bool>(obj, "text_wrap")?,
        num_format: extract_optional_attr::<String>(obj, "num_format")?,
        bg_color: extract_optional_attr::<String>(obj, "bg_color")?,
        font_color: extract_optional_attr::<String>(obj, "font_color")?,
        locked: extract_optional_attr::<bool>(obj, "locked")?,
    }))
}

fn parse_spec_xlsx_write_options(
    obj: Option<&Bound<'_, PyAny>>,
) -> PyResult<Option<SpecXlsxWriteOptions>> {
    let Some(obj) = obj else {
        return Ok(None);
    };
    if obj.is_none() {
        return Ok(None);
    }

    let mut cfg_write_options = derive_default_xlsx_write_options();

    if let Some(v) = extract_optional_attr::<bool>(obj, "if_freeze_header")? {
        cfg_write_options.if_freeze_header = v;
    }
    if let Some(v) = extract_optional_attr::<String>(obj, "validation_error_title")? {
        cfg_write_options.validation_error_title = v;
    }
    if let Some(policy_autofit_obj) = extract_optional_attr_bound(obj, "policy_autofit")?
        && let Some(policy) = parse_spec_autofit_cells_policy(Some(&policy_autofit_obj))?
    {
        cfg_write_options.policy_autofit = policy;
    }
    if let Some(base_format_patch_obj) = extract_optional_attr_bound(obj, "base_format_patch")?
        && let Some(fmt_patch) = parse_spec_cell_format(Some(&base_format_patch_obj))?
    {
        cfg_write_options.base_format_patch = fmt_patch;
    }

    Ok(Some(cfg_write_options))
}

fn parse_rule_autofit_columns(value: &str) -> PyResult<EnumAutofitColumnsRule> {
    match value {
        "none" => Ok(EnumAutofitColumnsRule::None),
        "header" => Ok(EnumAutofitColumnsRule::Header),
        "all" => Ok(EnumAutofitColumnsRule::All),
        _ => Err(PyValueError::new_err(
            "policy_autofit.rule_columns must be one of: 'none', 'header', 'all'.",
        )),
    }
}

fn parse_spec_autofit_cells_policy(
    obj: Option<&Bound<'_, PyAny>>,
) -> PyResult<Option<SpecAutofitCellsPolicy>> {
    let Some(obj) = obj else {
        return Ok(None);
    };
    if obj.is_none() {
        return Ok(None);
    }

    let mut policy = SpecAutofitCellsPolicy::default();

    if let Some(v) = extract_optional_attr::<String>(obj, "rule_columns")? {
        policy.rule_columns = parse_rule_autofit_columns(&v)?;
    }
    if let Some(v) = extract_optional_attr::<usize>(obj, "width_cell_min")? {
        policy.width_cell_min = v;
    }
    if let Some(v) = extract_optional_attr::<usize>(obj, "width_cell_max")? {
        policy.width_cell_max = v;
    }
    if let Some(v) = extract_optional_attr::<usize>(obj, "width_cell_padding")? {
        policy.width_cell_padding = v;
    }

    Ok(Some(policy))
}

fn extract_optional_attr<T>(obj: &Bound<'_, PyAny>, attr: &str) -> PyResult<Option<T>>
where
    for<'a> T: FromPyObject<'a>,
{
    if !obj.hasattr(attr)? {
        return Ok(None);
    }
    let val = obj.getattr(attr)?;
    if val.is_none() {
        return Ok(None);
    }
    Ok(Some(val.extract::<T>()?))
}

fn extract_optional_attr_bound<'py>(
    obj: &Bound<'py, PyAny>,
    attr: &str,
) -> PyResult<Option<Bound<'py, PyAny>>> {
    if !obj.hasattr(attr)? {
        return Ok(None);
    }
    let val = obj.getattr(attr)?;
    if val.is_none() {
        return Ok(None);
    }
    Ok(Some(val))
}

#[pymodule]
fn _reportkit_xlsx_rs(_py: Python<'_>, module: &Bound<'_, PyModule>) -> PyResult<()> {
    module.add_class::<PyReportWriter>()?;
    module.add_function(wrap_pyfunction!(py_build_report_grid_json, module)?)?;
    module.add("__bridge_abi__", N_BRIDGE_ABI_VERSION)?;
    module.add("__bridge_contract__", C_BRIDGE_CONTRACT_VERSION)?;
    module.add("__bridge_transport__", C_BRIDGE_TRANSPORT)?;
    Ok(())
}
