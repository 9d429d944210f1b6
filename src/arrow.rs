//! Conversions between strata columns and Arrow, plus Parquet export.

use std::{
    io::{Read, Seek, Write},
    sync::Arc,
};

use arrow_array::{
    Array, ArrayRef, Float64Array, Int64Array, RecordBatch, StringArray,
    cast::AsArray,
    types::{
        Float32Type, Float64Type, Int8Type, Int16Type, Int32Type, Int64Type, UInt8Type,
        UInt16Type, UInt32Type,
    },
};
use arrow_schema::{DataType, Field, SchemaRef};
use parquet::{arrow::ArrowWriter, file::properties::WriterProperties};
use tracing::debug;

use crate::{
    error::{Result, StrataError},
    reader::ColumnarReader,
    types::{ColumnDef, ColumnType, Row, Schema, Value},
};

impl From<ColumnType> for DataType {
    fn from(column_type: ColumnType) -> Self {
        match column_type {
            ColumnType::Int64 => DataType::Int64,
            ColumnType::Float64 => DataType::Float64,
            ColumnType::Utf8 => DataType::Utf8,
        }
    }
}

impl TryFrom<&DataType> for ColumnType {
    type Error = StrataError;

    /// Narrower integers and floats widen to the 64-bit types.
    fn try_from(data_type: &DataType) -> Result<Self> {
        match data_type {
            DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32 => Ok(ColumnType::Int64),
            DataType::Float32 | DataType::Float64 => Ok(ColumnType::Float64),
            DataType::Utf8 | DataType::LargeUtf8 => Ok(ColumnType::Utf8),
            other => Err(StrataError::UnsupportedType {
                data_type: other.clone(),
            }),
        }
    }
}

/// Arrow schema with one nullable field per column.
pub fn schema_to_arrow(schema: &Schema) -> SchemaRef {
    let fields: Vec<Field> = schema
        .iter()
        .map(|column| Field::new(&column.name, column.column_type.into(), true))
        .collect();
    Arc::new(arrow_schema::Schema::new(fields))
}

pub fn schema_from_arrow(schema: &arrow_schema::Schema) -> Result<Schema> {
    schema
        .fields()
        .iter()
        .map(|field| {
            ColumnType::try_from(field.data_type())
                .map(|column_type| ColumnDef::new(field.name(), column_type))
        })
        .collect()
}

/// Transpose an Arrow batch into rows. Columns are matched to `schema` by
/// position; values are left for the writer to coerce.
pub fn batch_to_rows(batch: &RecordBatch, schema: &Schema) -> Result<Vec<Row>> {
    if batch.num_columns() != schema.len() {
        return Err(StrataError::RowWidthMismatch {
            expected: schema.len(),
            found: batch.num_columns(),
        });
    }
    let mut rows = vec![Vec::with_capacity(schema.len()); batch.num_rows()];
    for array in batch.columns() {
        for (row, value) in rows.iter_mut().zip(array_values(array)?) {
            row.push(value);
        }
    }
    Ok(rows)
}

fn array_values(array: &ArrayRef) -> Result<Vec<Value>> {
    macro_rules! ints {
        ($t:ty) => {
            array
                .as_primitive::<$t>()
                .iter()
                .map(|v| v.map(i64::from).into())
                .collect()
        };
    }
    macro_rules! floats {
        ($t:ty) => {
            array
                .as_primitive::<$t>()
                .iter()
                .map(|v| v.map(f64::from).into())
                .collect()
        };
    }
    let values: Vec<Value> = match array.data_type() {
        DataType::Int8 => ints!(Int8Type),
        DataType::Int16 => ints!(Int16Type),
        DataType::Int32 => ints!(Int32Type),
        DataType::Int64 => ints!(Int64Type),
        DataType::UInt8 => ints!(UInt8Type),
        DataType::UInt16 => ints!(UInt16Type),
        DataType::UInt32 => ints!(UInt32Type),
        DataType::Float32 => floats!(Float32Type),
        DataType::Float64 => floats!(Float64Type),
        DataType::Utf8 => array.as_string::<i32>().iter().map(Value::from).collect(),
        DataType::LargeUtf8 => array.as_string::<i64>().iter().map(Value::from).collect(),
        other => {
            return Err(StrataError::UnsupportedType {
                data_type: other.clone(),
            });
        }
    };
    Ok(values)
}

/// Build a batch from decoded columns (one `Vec<Value>` per schema column).
pub fn rows_to_batch(
    arrow_schema: &SchemaRef,
    schema: &Schema,
    columns: Vec<Vec<Value>>,
    num_rows: usize,
) -> Result<RecordBatch> {
    let arrays: Vec<ArrayRef> = schema
        .iter()
        .zip(columns)
        .map(|(column, values)| values_to_array(column.column_type, values))
        .collect();
    let options = arrow_array::RecordBatchOptions::new().with_row_count(Some(num_rows));
    Ok(RecordBatch::try_new_with_options(
        arrow_schema.clone(),
        arrays,
        &options,
    )?)
}

/// Values of another type than `column_type` become null.
pub fn values_to_array(column_type: ColumnType, values: Vec<Value>) -> ArrayRef {
    match column_type {
        ColumnType::Int64 => Arc::new(
            values
                .into_iter()
                .map(|v| match v {
                    Value::Int64(v) => Some(v),
                    _ => None,
                })
                .collect::<Int64Array>(),
        ),
        ColumnType::Float64 => Arc::new(
            values
                .into_iter()
                .map(|v| match v {
                    Value::Float64(v) => Some(v),
                    _ => None,
                })
                .collect::<Float64Array>(),
        ),
        ColumnType::Utf8 => Arc::new(
            values
                .into_iter()
                .map(|v| match v {
                    Value::Utf8(s) => Some(s),
                    _ => None,
                })
                .collect::<StringArray>(),
        ),
    }
}

/// Rewrite a strata file as Parquet, one Parquet row group per strata row
/// group. Returns the output once the Parquet footer is written.
pub fn export_parquet<R, W>(reader: &mut ColumnarReader<R>, output: W) -> Result<W>
where
    R: Read + Seek,
    W: Write + Send,
{
    let metadata = reader.metadata().clone();
    let max_rows = metadata
        .row_groups
        .iter()
        .map(|rg| rg.num_rows_in_group as usize)
        .max()
        .unwrap_or(1)
        .max(1);
    let props = WriterProperties::builder()
        .set_max_row_group_size(max_rows)
        .build();
    let mut writer = ArrowWriter::try_new(output, schema_to_arrow(metadata.schema()), Some(props))?;
    for row_group in 0..metadata.num_row_groups() {
        let batch = reader.read_record_batch(row_group, None)?;
        writer.write(&batch)?;
        writer.flush()?;
    }
    debug!(
        row_groups = metadata.num_row_groups(),
        num_rows = metadata.num_rows,
        "exported to parquet"
    );
    Ok(writer.into_inner()?)
}
