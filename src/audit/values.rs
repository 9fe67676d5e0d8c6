//! Raw value extraction from Arrow record batches.
//!
//! The accumulators operate on raw per-column string values, mirroring how
//! the file sources deliver untyped data. Batches built elsewhere (tests,
//! Parquet files) may carry typed columns; every scalar type is rendered to
//! its string form here so the rest of the engine sees one representation.

use arrow::array::{
    Array, BooleanArray, Float32Array, Float64Array, Int32Array, Int64Array, RecordBatch,
    StringArray,
};

/// Render a single cell to its raw string form, `None` for nulls.
///
/// Unsupported (non-scalar) types degrade to `"?"` rather than failing:
/// the profiler still counts them, they just carry no semantic content.
pub(crate) fn cell_string(array: &dyn Array, idx: usize) -> Option<String> {
    if array.is_null(idx) {
        return None;
    }

    let any = array.as_any();
    if let Some(arr) = any.downcast_ref::<StringArray>() {
        Some(arr.value(idx).to_string())
    } else if let Some(arr) = any.downcast_ref::<Int32Array>() {
        Some(arr.value(idx).to_string())
    } else if let Some(arr) = any.downcast_ref::<Int64Array>() {
        Some(arr.value(idx).to_string())
    } else if let Some(arr) = any.downcast_ref::<Float64Array>() {
        Some(arr.value(idx).to_string())
    } else if let Some(arr) = any.downcast_ref::<Float32Array>() {
        Some(arr.value(idx).to_string())
    } else if let Some(arr) = any.downcast_ref::<BooleanArray>() {
        Some(arr.value(idx).to_string())
    } else {
        Some("?".to_string())
    }
}

/// Extract all columns of a batch as `(name, values)` pairs in schema order.
pub(crate) fn column_strings(batch: &RecordBatch) -> Vec<(String, Vec<Option<String>>)> {
    let schema = batch.schema();
    schema
        .fields()
        .iter()
        .enumerate()
        .map(|(col_idx, field)| {
            let array = batch.column(col_idx);
            let values = (0..array.len()).map(|i| cell_string(array, i)).collect();
            (field.name().clone(), values)
        })
        .collect()
}
