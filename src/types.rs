use std::{cmp::Ordering, collections::HashSet, fmt};

use serde::{Deserialize, Serialize};

use crate::error::{Result, StrataError};

/// Physical type of a column.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    /// 8-byte signed little-endian integer
    Int64,
    /// 8-byte IEEE-754 double
    Float64,
    /// Length-prefixed UTF-8 string
    Utf8,
}

impl ColumnType {
    /// Encoded width of every value of this type, `None` for variable width.
    pub fn fixed_width(self) -> Option<usize> {
        match self {
            ColumnType::Int64 | ColumnType::Float64 => Some(8),
            ColumnType::Utf8 => None,
        }
    }

    pub fn is_numeric(self) -> bool {
        matches!(self, ColumnType::Int64 | ColumnType::Float64)
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ColumnType::Int64 => "Int64",
            ColumnType::Float64 => "Float64",
            ColumnType::Utf8 => "Utf8",
        };
        f.write_str(name)
    }
}

/// A named, typed column.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDef {
    pub name: String,
    #[serde(rename = "type")]
    pub column_type: ColumnType,
}

impl ColumnDef {
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
        }
    }
}

/// Ordered column definitions of one file.
///
/// The order is the order values appear in each row and the order column
/// chunks are written within a row group.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Schema {
    columns: Vec<ColumnDef>,
}

impl Schema {
    pub fn new(columns: Vec<ColumnDef>) -> Self {
        Self { columns }
    }

    pub fn columns(&self) -> &[ColumnDef] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|column| column.name == name)
    }

    pub fn column(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|column| column.name == name)
    }

    /// Resolve a column by name, failing with [`StrataError::ColumnNotFound`].
    pub fn require(&self, name: &str) -> Result<&ColumnDef> {
        self.column(name).ok_or_else(|| StrataError::ColumnNotFound {
            column: name.to_string(),
        })
    }

    /// Fail with [`StrataError::DuplicateColumn`] if a name appears twice.
    /// Chunks are keyed by column name, so names must be unique.
    pub fn check_unique(&self) -> Result<()> {
        let mut seen = HashSet::with_capacity(self.columns.len());
        match self.iter().find(|column| !seen.insert(column.name.as_str())) {
            Some(column) => Err(StrataError::DuplicateColumn {
                column: column.name.clone(),
            }),
            None => Ok(()),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &ColumnDef> {
        self.columns.iter()
    }
}

impl FromIterator<ColumnDef> for Schema {
    fn from_iter<T: IntoIterator<Item = ColumnDef>>(iter: T) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

/// A single scalar cell.
///
/// Serialized untagged so statistics in the footer read as plain JSON
/// scalars; the column type disambiguates them on load.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Int64(i64),
    Float64(f64),
    Utf8(String),
}

/// One row, values in schema order.
pub type Row = Vec<Value>;

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Numeric view used by aggregation.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int64(v) => Some(*v as f64),
            Value::Float64(v) => Some(*v),
            Value::Null | Value::Utf8(_) => None,
        }
    }

    /// Convert a raw value into the representation of `column_type`.
    ///
    /// Strings are parsed into numeric columns and numbers are formatted
    /// into string columns. Floats never narrow into integers.
    pub fn coerce_to(&self, column_type: ColumnType) -> Result<Value> {
        let coerced = match (self, column_type) {
            (Value::Null, _) => Some(Value::Null),
            (Value::Int64(v), ColumnType::Int64) => Some(Value::Int64(*v)),
            (Value::Utf8(s), ColumnType::Int64) => s.trim().parse().ok().map(Value::Int64),
            (Value::Float64(v), ColumnType::Float64) => Some(Value::Float64(*v)),
            (Value::Int64(v), ColumnType::Float64) => Some(Value::Float64(*v as f64)),
            (Value::Utf8(s), ColumnType::Float64) => s.trim().parse().ok().map(Value::Float64),
            (Value::Utf8(s), ColumnType::Utf8) => Some(Value::Utf8(s.clone())),
            (Value::Int64(v), ColumnType::Utf8) => Some(Value::Utf8(v.to_string())),
            (Value::Float64(v), ColumnType::Utf8) => Some(Value::Utf8(v.to_string())),
            (Value::Float64(_), ColumnType::Int64) => None,
        };
        coerced.ok_or_else(|| StrataError::EncodingTypeMismatch {
            column_type,
            value: format!("{self:?}"),
        })
    }

    /// Order two non-null values of the same kind.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Int64(a), Value::Int64(b)) => Some(a.cmp(b)),
            (Value::Float64(a), Value::Float64(b)) => a.partial_cmp(b),
            (Value::Utf8(a), Value::Utf8(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int64(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float64(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Utf8(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Utf8(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coerces_strings_into_numeric_columns() {
        assert_eq!(
            Value::from(" 42 ").coerce_to(ColumnType::Int64).unwrap(),
            Value::Int64(42)
        );
        assert_eq!(
            Value::from("2.5").coerce_to(ColumnType::Float64).unwrap(),
            Value::Float64(2.5)
        );
        assert_eq!(
            Value::Int64(3).coerce_to(ColumnType::Float64).unwrap(),
            Value::Float64(3.0)
        );
        assert_eq!(
            Value::Float64(1.5).coerce_to(ColumnType::Utf8).unwrap(),
            Value::from("1.5")
        );
    }

    #[test]
    fn rejects_unrepresentable_values() {
        for (value, column_type) in [
            (Value::from("SEE_NOTES"), ColumnType::Float64),
            (Value::from(""), ColumnType::Int64),
            (Value::Float64(1.5), ColumnType::Int64),
        ] {
            let err = value.coerce_to(column_type).unwrap_err();
            assert!(matches!(err, StrataError::EncodingTypeMismatch { .. }));
        }
    }

    #[test]
    fn schema_lookup() {
        let schema: Schema = [
            ColumnDef::new("id", ColumnType::Int64),
            ColumnDef::new("status", ColumnType::Utf8),
        ]
        .into_iter()
        .collect();
        assert_eq!(schema.index_of("status"), Some(1));
        assert!(schema.column("missing").is_none());
        assert!(matches!(
            schema.require("missing"),
            Err(StrataError::ColumnNotFound { .. })
        ));
    }

    #[test]
    fn duplicate_column_names() {
        let unique = Schema::new(vec![
            ColumnDef::new("status", ColumnType::Utf8),
            ColumnDef::new("value", ColumnType::Float64),
        ]);
        assert!(unique.check_unique().is_ok());

        let repeated = Schema::new(vec![
            ColumnDef::new("value", ColumnType::Float64),
            ColumnDef::new("status", ColumnType::Utf8),
            ColumnDef::new("value", ColumnType::Int64),
        ]);
        let err = repeated.check_unique().unwrap_err();
        assert!(matches!(err, StrataError::DuplicateColumn { ref column } if column == "value"));
    }

    #[test]
    fn schema_serializes_as_named_fields() {
        let schema = Schema::new(vec![ColumnDef::new("value", ColumnType::Float64)]);
        let json = serde_json::to_string(&schema).unwrap();
        assert_eq!(json, r#"[{"name":"value","type":"float64"}]"#);
    }
}
