//! Plain encoding of single values.
//!
//! Every type carries its null in-band:
//!
//! | type    | layout                               | null                         |
//! |---------|--------------------------------------|------------------------------|
//! | Int64   | 8 bytes, little-endian two's compl.  | [`INT64_NULL`]               |
//! | Float64 | 8 bytes, little-endian IEEE-754      | all-zero bits                |
//! | Utf8    | `i32` LE length + UTF-8 bytes        | length [`UTF8_NULL_LENGTH`]  |
//!
//! # Limitations
//!
//! The sentinels collide with real values: an `Int64` equal to
//! [`INT64_NULL`] and the `Float64` value `0.0` both decode as null.
//! `-0.0` keeps its sign bit and round-trips.

use bytes::{Buf, BufMut, BytesMut};
use roaring::RoaringBitmap;

use crate::{
    error::{Result, StrataError},
    types::{ColumnType, Value},
};

/// Reserved `Int64` bit pattern meaning null.
pub const INT64_NULL: i64 = -999_999_999_999_999_999;

/// Length prefix of a null `Utf8` value.
pub const UTF8_NULL_LENGTH: i32 = -1;

const LENGTH_PREFIX: usize = 4;

/// Encode `value` as `column_type`, appending to `buf`.
///
/// The value is coerced first (see [`Value::coerce_to`]); on
/// [`StrataError::EncodingTypeMismatch`] nothing is written.
pub fn encode_value(value: &Value, column_type: ColumnType, buf: &mut BytesMut) -> Result<()> {
    match value.coerce_to(column_type)? {
        Value::Null => encode_null(column_type, buf),
        Value::Int64(v) => buf.put_i64_le(v),
        Value::Float64(v) => buf.put_f64_le(v),
        Value::Utf8(s) => {
            let len = i32::try_from(s.len()).map_err(|_| StrataError::EncodingTypeMismatch {
                column_type,
                value: format!("string of {} bytes", s.len()),
            })?;
            buf.put_i32_le(len);
            buf.put_slice(s.as_bytes());
        }
    }
    Ok(())
}

/// Append the null representation of `column_type`.
pub fn encode_null(column_type: ColumnType, buf: &mut BytesMut) {
    match column_type {
        ColumnType::Int64 => buf.put_i64_le(INT64_NULL),
        ColumnType::Float64 => buf.put_u64_le(0),
        ColumnType::Utf8 => buf.put_i32_le(UTF8_NULL_LENGTH),
    }
}

/// Decode one value at the cursor and advance past it.
pub fn decode_value(cursor: &mut &[u8], column_type: ColumnType) -> Result<Value> {
    match column_type {
        ColumnType::Int64 => {
            ensure(cursor, 8)?;
            let v = cursor.get_i64_le();
            Ok(if v == INT64_NULL {
                Value::Null
            } else {
                Value::Int64(v)
            })
        }
        ColumnType::Float64 => {
            ensure(cursor, 8)?;
            let bits = cursor.get_u64_le();
            Ok(if bits == 0 {
                Value::Null
            } else {
                Value::Float64(f64::from_bits(bits))
            })
        }
        ColumnType::Utf8 => match string_len(cursor)? {
            None => Ok(Value::Null),
            Some(len) => {
                ensure(cursor, len)?;
                let bytes = cursor[..len].to_vec();
                cursor.advance(len);
                Ok(Value::Utf8(String::from_utf8(bytes)?))
            }
        },
    }
}

/// Advance the cursor past one value without materializing it.
pub fn skip_value(cursor: &mut &[u8], column_type: ColumnType) -> Result<()> {
    let len = match column_type.fixed_width() {
        Some(width) => width,
        None => string_len(cursor)?.unwrap_or(0),
    };
    ensure(cursor, len)?;
    cursor.advance(len);
    Ok(())
}

/// Decode the values at `positions` (ascending) from a chunk.
///
/// Fixed-width types jump straight to `position * width`. Strings are
/// variable width, so the chunk is walked forward up to the last selected
/// position, skipping the values in between.
pub fn decode_positions(
    chunk: &[u8],
    column_type: ColumnType,
    positions: &RoaringBitmap,
) -> Result<Vec<Value>> {
    let mut values = Vec::with_capacity(positions.len() as usize);
    match column_type.fixed_width() {
        Some(width) => {
            for position in positions {
                let start = position as usize * width;
                let mut cursor = chunk.get(start..).ok_or(StrataError::TruncatedData {
                    needed: start + width,
                    available: chunk.len(),
                })?;
                values.push(decode_value(&mut cursor, column_type)?);
            }
        }
        None => {
            let mut cursor = chunk;
            let mut next = 0u32;
            for position in positions {
                while next < position {
                    skip_value(&mut cursor, column_type)?;
                    next += 1;
                }
                values.push(decode_value(&mut cursor, column_type)?);
                next += 1;
            }
        }
    }
    Ok(values)
}

/// Decode exactly `count` values from the start of a chunk.
pub fn decode_all(chunk: &[u8], column_type: ColumnType, count: usize) -> Result<Vec<Value>> {
    let mut cursor = chunk;
    (0..count)
        .map(|_| decode_value(&mut cursor, column_type))
        .collect()
}

fn string_len(cursor: &mut &[u8]) -> Result<Option<usize>> {
    ensure(cursor, LENGTH_PREFIX)?;
    let len = cursor.get_i32_le();
    match len {
        UTF8_NULL_LENGTH => Ok(None),
        len if len < 0 => Err(StrataError::CorruptChunk {
            reason: format!("negative string length {len}"),
        }),
        len => Ok(Some(len as usize)),
    }
}

fn ensure(cursor: &[u8], needed: usize) -> Result<()> {
    if cursor.len() < needed {
        return Err(StrataError::TruncatedData {
            needed,
            available: cursor.len(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(value: Value, column_type: ColumnType) -> Value {
        let mut buf = BytesMut::new();
        encode_value(&value, column_type, &mut buf).unwrap();
        let mut cursor = &buf[..];
        let decoded = decode_value(&mut cursor, column_type).unwrap();
        assert!(cursor.is_empty(), "cursor must consume the whole value");
        decoded
    }

    #[test]
    fn round_trips_every_type() {
        for v in [0i64, 1, -1, i64::MIN, i64::MAX] {
            assert_eq!(round_trip(Value::Int64(v), ColumnType::Int64), Value::Int64(v));
        }
        for v in [1.5f64, -2.25, f64::MAX, f64::MIN_POSITIVE, -0.0] {
            assert_eq!(
                round_trip(Value::Float64(v), ColumnType::Float64),
                Value::Float64(v)
            );
        }
        for s in ["", "OK", "héllo wörld"] {
            assert_eq!(round_trip(Value::from(s), ColumnType::Utf8), Value::from(s));
        }
        for column_type in [ColumnType::Int64, ColumnType::Float64, ColumnType::Utf8] {
            assert_eq!(round_trip(Value::Null, column_type), Value::Null);
        }
    }

    #[test]
    fn sentinels_collide_with_real_values() {
        assert_eq!(
            round_trip(Value::Int64(INT64_NULL), ColumnType::Int64),
            Value::Null
        );
        assert_eq!(round_trip(Value::Float64(0.0), ColumnType::Float64), Value::Null);
    }

    #[test]
    fn string_layout() {
        let mut buf = BytesMut::new();
        encode_value(&Value::from("FAIL"), ColumnType::Utf8, &mut buf).unwrap();
        encode_null(ColumnType::Utf8, &mut buf);
        assert_eq!(&buf[..], b"\x04\x00\x00\x00FAIL\xff\xff\xff\xff");
    }

    #[test]
    fn mismatch_writes_nothing() {
        let mut buf = BytesMut::new();
        let err = encode_value(&Value::from("abc"), ColumnType::Int64, &mut buf).unwrap_err();
        assert!(matches!(err, StrataError::EncodingTypeMismatch { .. }));
        assert!(buf.is_empty());
    }

    #[test]
    fn truncated_input() {
        let mut cursor: &[u8] = &[1, 2, 3];
        assert!(matches!(
            decode_value(&mut cursor, ColumnType::Float64),
            Err(StrataError::TruncatedData {
                needed: 8,
                available: 3
            })
        ));

        let mut cursor: &[u8] = b"\x05\x00\x00\x00ab";
        assert!(matches!(
            decode_value(&mut cursor, ColumnType::Utf8),
            Err(StrataError::TruncatedData {
                needed: 5,
                available: 2
            })
        ));
    }

    #[test]
    fn decode_positions_fixed_and_variable() {
        let mut ints = BytesMut::new();
        let mut strings = BytesMut::new();
        for i in 0..10i64 {
            encode_value(&Value::Int64(i * 10), ColumnType::Int64, &mut ints).unwrap();
            let s = Value::from("x".repeat(i as usize));
            encode_value(&s, ColumnType::Utf8, &mut strings).unwrap();
        }
        let positions: RoaringBitmap = [1u32, 4, 9].into_iter().collect();

        let values = decode_positions(&ints, ColumnType::Int64, &positions).unwrap();
        assert_eq!(values, vec![Value::Int64(10), Value::Int64(40), Value::Int64(90)]);

        let values = decode_positions(&strings, ColumnType::Utf8, &positions).unwrap();
        assert_eq!(
            values,
            vec![Value::from("x"), Value::from("xxxx"), Value::from("x".repeat(9))]
        );
    }

    #[test]
    fn decode_positions_past_chunk_end() {
        let mut ints = BytesMut::new();
        encode_value(&Value::Int64(1), ColumnType::Int64, &mut ints).unwrap();
        let positions: RoaringBitmap = [3u32].into_iter().collect();
        assert!(matches!(
            decode_positions(&ints, ColumnType::Int64, &positions),
            Err(StrataError::TruncatedData { .. })
        ));
    }
}
