//! Parquet codec over arrow record batches.

use std::sync::Arc;

use arrow_array::{
    Array, ArrayRef, BooleanArray, Float64Array, Int64Array, RecordBatch, StringArray,
    cast::AsArray,
    types::{Float64Type, Int64Type},
};
use arrow_cast::display::{ArrayFormatter, FormatOptions};
use arrow_schema::{DataType, Field, Schema};
use bytes::Bytes;
use ::parquet::arrow::{ArrowWriter, arrow_reader::ParquetRecordBatchReaderBuilder};
use ::parquet::basic::Compression;
use ::parquet::file::properties::WriterProperties;
use serde_json::Value;

use crate::{
    Result,
    error::DeltaGuardError,
    models::{Column, ColumnKind, Recordset},
    providers::helpers::{float_value, value_to_text},
};

/// Arrow type a column is stored as. Columns whose cells do not all fit
/// their declared kind fall back to text.
fn storage_type(data: &Recordset, index: usize) -> DataType {
    let cells = || data.rows().iter().map(|row| &row[index]).filter(|v| !v.is_null());
    match data.columns()[index].kind {
        ColumnKind::Integer if cells().all(Value::is_i64) => DataType::Int64,
        ColumnKind::Float if cells().all(Value::is_number) => DataType::Float64,
        ColumnKind::Boolean if cells().all(Value::is_boolean) => DataType::Boolean,
        _ => DataType::Utf8,
    }
}

fn column_array(data: &Recordset, index: usize, data_type: &DataType) -> ArrayRef {
    let cells = data.rows().iter().map(|row| &row[index]);
    match data_type {
        DataType::Int64 => Arc::new(cells.map(Value::as_i64).collect::<Int64Array>()),
        DataType::Float64 => Arc::new(cells.map(Value::as_f64).collect::<Float64Array>()),
        DataType::Boolean => Arc::new(cells.map(Value::as_bool).collect::<BooleanArray>()),
        _ => Arc::new(
            cells
                .map(|v| (!v.is_null()).then(|| value_to_text(v)))
                .collect::<StringArray>(),
        ),
    }
}

pub(super) fn encode(data: &Recordset) -> Result<Vec<u8>> {
    if data.width() == 0 {
        return Ok(Vec::new());
    }
    let write_err = |e: ::parquet::errors::ParquetError| {
        DeltaGuardError::write_failed("Parquet encoding failed", e)
    };

    let types: Vec<DataType> = (0..data.width()).map(|i| storage_type(data, i)).collect();
    let schema = Arc::new(Schema::new(
        data.columns()
            .iter()
            .zip(&types)
            .map(|(column, data_type)| Field::new(&column.name, data_type.clone(), true))
            .collect::<Vec<_>>(),
    ));
    let arrays = types
        .iter()
        .enumerate()
        .map(|(i, data_type)| column_array(data, i, data_type))
        .collect();
    let batch = RecordBatch::try_new(schema.clone(), arrays)
        .map_err(|e| DeltaGuardError::write_failed("Invalid record batch", e))?;

    let props = WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .build();
    let mut buf = Vec::new();
    let mut writer = ArrowWriter::try_new(&mut buf, schema, Some(props)).map_err(write_err)?;
    writer.write(&batch).map_err(write_err)?;
    writer.close().map_err(write_err)?;
    Ok(buf)
}

fn kind_of(data_type: &DataType) -> ColumnKind {
    match data_type {
        t if t.is_integer() => ColumnKind::Integer,
        t if t.is_floating() => ColumnKind::Float,
        DataType::Boolean => ColumnKind::Boolean,
        DataType::Utf8 | DataType::LargeUtf8 | DataType::Utf8View => ColumnKind::Text,
        DataType::Timestamp(_, _) | DataType::Date32 | DataType::Date64 => ColumnKind::Timestamp,
        _ => ColumnKind::Text,
    }
}

/// Cells of one arrow column as JSON values.
fn column_values(array: &ArrayRef, kind: ColumnKind) -> Result<Vec<Value>> {
    let read_err = |e: arrow_schema::ArrowError| {
        DeltaGuardError::read_failed("Unsupported Parquet column", e)
    };
    let values = match kind {
        ColumnKind::Integer => {
            let cast = arrow_cast::cast(array, &DataType::Int64).map_err(read_err)?;
            cast.as_primitive::<Int64Type>()
                .iter()
                .map(|v| v.map_or(Value::Null, Value::from))
                .collect()
        }
        ColumnKind::Float => {
            let cast = arrow_cast::cast(array, &DataType::Float64).map_err(read_err)?;
            cast.as_primitive::<Float64Type>()
                .iter()
                .map(|v| v.map_or(Value::Null, float_value))
                .collect()
        }
        ColumnKind::Boolean => array
            .as_boolean()
            .iter()
            .map(|v| v.map_or(Value::Null, Value::Bool))
            .collect(),
        _ => {
            let formatter =
                ArrayFormatter::try_new(array.as_ref(), &FormatOptions::default()).map_err(read_err)?;
            (0..array.len())
                .map(|i| {
                    if array.is_null(i) {
                        Value::Null
                    } else {
                        Value::String(formatter.value(i).to_string())
                    }
                })
                .collect()
        }
    };
    Ok(values)
}

pub(super) fn decode(bytes: &[u8]) -> Result<Recordset> {
    let read_err = |e: ::parquet::errors::ParquetError| {
        DeltaGuardError::read_failed("Invalid Parquet object", e)
    };
    let builder =
        ParquetRecordBatchReaderBuilder::try_new(Bytes::copy_from_slice(bytes)).map_err(read_err)?;
    let columns: Vec<Column> = builder
        .schema()
        .fields()
        .iter()
        .map(|field| Column::new(field.name().clone(), kind_of(field.data_type())))
        .collect();
    let reader = builder.build().map_err(read_err)?;

    let mut rows: Vec<Vec<Value>> = Vec::new();
    for batch in reader {
        let batch = batch.map_err(|e| DeltaGuardError::read_failed("Invalid Parquet batch", e))?;
        let decoded = batch
            .columns()
            .iter()
            .zip(&columns)
            .map(|(array, column)| column_values(array, column.kind))
            .collect::<Result<Vec<_>>>()?;
        for row in 0..batch.num_rows() {
            rows.push(decoded.iter().map(|values| values[row].clone()).collect());
        }
    }
    Recordset::new(columns, rows)
}
