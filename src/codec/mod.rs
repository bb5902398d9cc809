//! Payload codecs: the byte encoding of the game-data [`Table`].
//!
//! The container treats the game-data block's `data` region as opaque
//! bytes. A [`PayloadCodec`] turns those bytes into a [`Table`] on load
//! and back on save.
//!
//! # Built-in tagged encoding
//!
//! [`TaggedCodec`] is a self-describing, little-endian encoding. The block's
//! data is a table body; every value is a one-byte tag followed by its body:
//!
//! ```text
//! table body  = count:u32 (key value){count}
//! 0x00 NIL
//! 0x01 FALSE
//! 0x02 TRUE
//! 0x03 INT    i64
//! 0x04 FLOAT  f64
//! 0x05 STR    len:u32 utf8[len]
//! 0x06 BYTES  len:u32 u8[len]
//! 0x07 LIST   count:u32 value{count}
//! 0x08 TABLE  table body
//! ```
//!
//! An empty table therefore encodes as four zero bytes.

use std::io::{self, Cursor, Read, Write};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use thiserror::Error;

use crate::value::{Table, Value};

/// Maximum nesting of lists and tables accepted by [`TaggedCodec`].
pub const MAX_DEPTH: usize = 64;

pub const TAG_NIL:   u8 = 0x00;
pub const TAG_FALSE: u8 = 0x01;
pub const TAG_TRUE:  u8 = 0x02;
pub const TAG_INT:   u8 = 0x03;
pub const TAG_FLOAT: u8 = 0x04;
pub const TAG_STR:   u8 = 0x05;
pub const TAG_BYTES: u8 = 0x06;
pub const TAG_LIST:  u8 = 0x07;
pub const TAG_TABLE: u8 = 0x08;

// ── Error type ───────────────────────────────────────────────────────────────

#[derive(Error, Debug)]
pub enum PayloadError {
    #[error("Unknown value tag {tag:#04x} at offset {offset}")]
    UnknownTag { tag: u8, offset: u64 },
    #[error("Payload truncated at offset {offset}")]
    Truncated { offset: u64 },
    #[error("Invalid UTF-8 string at offset {offset}")]
    InvalidUtf8 { offset: u64 },
    #[error("Values nested deeper than {MAX_DEPTH} levels")]
    TooDeep,
    #[error("{0} trailing bytes after payload")]
    TrailingBytes(usize),
    #[error("Collection of {0} elements exceeds the u32 length field")]
    TooLarge(usize),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

// ── Codec trait ──────────────────────────────────────────────────────────────

pub trait PayloadCodec: Send + Sync {
    fn encode(&self, table: &Table) -> Result<Vec<u8>, PayloadError>;
    fn decode(&self, data: &[u8]) -> Result<Table, PayloadError>;
}

// ── Tagged codec ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default)]
pub struct TaggedCodec;

impl PayloadCodec for TaggedCodec {
    fn encode(&self, table: &Table) -> Result<Vec<u8>, PayloadError> {
        let mut out = Vec::new();
        write_table(&mut out, table, 0)?;
        Ok(out)
    }

    fn decode(&self, data: &[u8]) -> Result<Table, PayloadError> {
        let mut dec = Decoder { cur: Cursor::new(data) };
        let table = dec.table(0)?;
        let rest = dec.remaining();
        if rest != 0 {
            return Err(PayloadError::TrailingBytes(rest));
        }
        Ok(table)
    }
}

fn write_len<W: Write>(w: &mut W, len: usize) -> Result<(), PayloadError> {
    let len = u32::try_from(len).map_err(|_| PayloadError::TooLarge(len))?;
    w.write_u32::<LittleEndian>(len)?;
    Ok(())
}

fn write_table<W: Write>(w: &mut W, table: &Table, depth: usize) -> Result<(), PayloadError> {
    if depth > MAX_DEPTH {
        return Err(PayloadError::TooDeep);
    }
    write_len(w, table.len())?;
    for (k, v) in table.iter() {
        write_value(w, k, depth)?;
        write_value(w, v, depth)?;
    }
    Ok(())
}

fn write_value<W: Write>(w: &mut W, value: &Value, depth: usize) -> Result<(), PayloadError> {
    match value {
        Value::Nil         => w.write_u8(TAG_NIL)?,
        Value::Bool(false) => w.write_u8(TAG_FALSE)?,
        Value::Bool(true)  => w.write_u8(TAG_TRUE)?,
        Value::Int(i) => {
            w.write_u8(TAG_INT)?;
            w.write_i64::<LittleEndian>(*i)?;
        }
        Value::Float(f) => {
            w.write_u8(TAG_FLOAT)?;
            w.write_f64::<LittleEndian>(*f)?;
        }
        Value::Str(s) => {
            w.write_u8(TAG_STR)?;
            write_len(w, s.len())?;
            w.write_all(s.as_bytes())?;
        }
        Value::Bytes(b) => {
            w.write_u8(TAG_BYTES)?;
            write_len(w, b.len())?;
            w.write_all(b)?;
        }
        Value::List(items) => {
            if depth + 1 > MAX_DEPTH {
                return Err(PayloadError::TooDeep);
            }
            w.write_u8(TAG_LIST)?;
            write_len(w, items.len())?;
            for item in items {
                write_value(w, item, depth + 1)?;
            }
        }
        Value::Table(t) => {
            w.write_u8(TAG_TABLE)?;
            write_table(w, t, depth + 1)?;
        }
    }
    Ok(())
}

struct Decoder<'a> {
    cur: Cursor<&'a [u8]>,
}

impl<'a> Decoder<'a> {
    fn remaining(&self) -> usize {
        self.cur.get_ref().len().saturating_sub(self.cur.position() as usize)
    }

    fn truncated(&self) -> PayloadError {
        PayloadError::Truncated { offset: self.cur.position() }
    }

    fn u8(&mut self) -> Result<u8, PayloadError> {
        self.cur.read_u8().map_err(|_| self.truncated())
    }

    /// Reads a u32 length and checks that at least `len * min_item` bytes follow.
    fn len(&mut self, min_item: usize) -> Result<usize, PayloadError> {
        let len = self.cur.read_u32::<LittleEndian>().map_err(|_| self.truncated())? as usize;
        if len.saturating_mul(min_item) > self.remaining() {
            return Err(self.truncated());
        }
        Ok(len)
    }

    fn bytes(&mut self, len: usize) -> Result<Vec<u8>, PayloadError> {
        let mut buf = vec![0u8; len];
        self.cur.read_exact(&mut buf).map_err(|_| self.truncated())?;
        Ok(buf)
    }

    fn table(&mut self, depth: usize) -> Result<Table, PayloadError> {
        if depth > MAX_DEPTH {
            return Err(PayloadError::TooDeep);
        }
        // Smallest pair is two one-byte tags.
        let count = self.len(2)?;
        let mut table = Table::new();
        for _ in 0..count {
            let key = self.value(depth)?;
            let value = self.value(depth)?;
            table.insert(key, value);
        }
        Ok(table)
    }

    fn value(&mut self, depth: usize) -> Result<Value, PayloadError> {
        let offset = self.cur.position();
        let tag = self.u8()?;
        Ok(match tag {
            TAG_NIL   => Value::Nil,
            TAG_FALSE => Value::Bool(false),
            TAG_TRUE  => Value::Bool(true),
            TAG_INT   => Value::Int(self.cur.read_i64::<LittleEndian>().map_err(|_| self.truncated())?),
            TAG_FLOAT => Value::Float(self.cur.read_f64::<LittleEndian>().map_err(|_| self.truncated())?),
            TAG_STR => {
                let len = self.len(1)?;
                let raw = self.bytes(len)?;
                Value::Str(String::from_utf8(raw).map_err(|_| PayloadError::InvalidUtf8 { offset })?)
            }
            TAG_BYTES => {
                let len = self.len(1)?;
                Value::Bytes(self.bytes(len)?)
            }
            TAG_LIST => {
                if depth + 1 > MAX_DEPTH {
                    return Err(PayloadError::TooDeep);
                }
                let count = self.len(1)?;
                let mut items = Vec::with_capacity(count);
                for _ in 0..count {
                    items.push(self.value(depth + 1)?);
                }
                Value::List(items)
            }
            TAG_TABLE => Value::Table(self.table(depth + 1)?),
            other => return Err(PayloadError::UnknownTag { tag: other, offset }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_table() -> Table {
        let mut skills = Table::new();
        skills.insert("mastermind", 3);
        skills.insert("enforcer", 0);

        let mut t = Table::new();
        t.insert("money", 1_250_000i64);
        t.insert("name", "Dallas");
        t.insert("alive", true);
        t.insert("ratio", 0.75);
        t.insert("skills", skills);
        t.insert(42, Value::List(vec![Value::Nil, Value::Bytes(vec![1, 2, 3])]));
        t
    }

    #[test]
    fn empty_table_is_four_zero_bytes() {
        assert_eq!(TaggedCodec.encode(&Table::new()).unwrap(), vec![0, 0, 0, 0]);
        assert_eq!(TaggedCodec.decode(&[0, 0, 0, 0]).unwrap(), Table::new());
    }

    #[test]
    fn nested_table_roundtrip() {
        let t = sample_table();
        let bytes = TaggedCodec.encode(&t).unwrap();
        assert_eq!(TaggedCodec.decode(&bytes).unwrap(), t);
    }

    #[test]
    fn int_layout() {
        let t: Table = [("a", 1i64)].into_iter().collect();
        let bytes = TaggedCodec.encode(&t).unwrap();
        let mut expected = vec![1, 0, 0, 0, TAG_STR, 1, 0, 0, 0, b'a', TAG_INT];
        expected.extend_from_slice(&1i64.to_le_bytes());
        assert_eq!(bytes, expected);
    }

    #[test]
    fn unknown_tag_is_rejected() {
        let err = TaggedCodec.decode(&[1, 0, 0, 0, 0x7f, TAG_NIL]).unwrap_err();
        assert!(matches!(err, PayloadError::UnknownTag { tag: 0x7f, offset: 4 }));
    }

    #[test]
    fn truncated_string_is_rejected() {
        // Declares a 100-byte string with only 2 bytes present.
        let data = [1, 0, 0, 0, TAG_STR, 100, 0, 0, 0, b'h', b'i'];
        assert!(matches!(TaggedCodec.decode(&data), Err(PayloadError::Truncated { .. })));
    }

    #[test]
    fn huge_count_does_not_allocate() {
        let data = [0xff, 0xff, 0xff, 0xff];
        assert!(matches!(TaggedCodec.decode(&data), Err(PayloadError::Truncated { .. })));
    }

    #[test]
    fn trailing_bytes_are_rejected() {
        assert!(matches!(TaggedCodec.decode(&[0, 0, 0, 0, 9]), Err(PayloadError::TrailingBytes(1))));
    }

    #[test]
    fn invalid_utf8_is_rejected() {
        let data = [1, 0, 0, 0, TAG_STR, 1, 0, 0, 0, 0xff, TAG_NIL];
        assert!(matches!(TaggedCodec.decode(&data), Err(PayloadError::InvalidUtf8 { offset: 4 })));
    }

    #[test]
    fn signed_zero_keys_survive_decode() {
        let mut data = vec![2, 0, 0, 0];
        data.push(TAG_FLOAT);
        data.extend_from_slice(&0.0f64.to_le_bytes());
        data.push(TAG_INT);
        data.extend_from_slice(&1i64.to_le_bytes());
        data.push(TAG_FLOAT);
        data.extend_from_slice(&(-0.0f64).to_le_bytes());
        data.push(TAG_INT);
        data.extend_from_slice(&2i64.to_le_bytes());

        let t = TaggedCodec.decode(&data).unwrap();
        assert_eq!(t.len(), 2);
        assert_eq!(t.get(&Value::Float(-0.0)).and_then(Value::as_int), Some(2));
        assert_eq!(TaggedCodec.encode(&t).unwrap(), data);
    }

    #[test]
    fn excessive_nesting_is_rejected() {
        let mut v = Value::Nil;
        for _ in 0..(MAX_DEPTH + 2) {
            v = Value::List(vec![v]);
        }
        let t: Table = [("deep", v)].into_iter().collect();
        assert!(matches!(TaggedCodec.encode(&t), Err(PayloadError::TooDeep)));

        // Hand-built: table -> nested lists beyond the limit.
        let mut data = vec![1, 0, 0, 0, TAG_NIL];
        for _ in 0..(MAX_DEPTH + 2) {
            data.extend_from_slice(&[TAG_LIST, 1, 0, 0, 0]);
        }
        data.push(TAG_NIL);
        assert!(matches!(TaggedCodec.decode(&data), Err(PayloadError::TooDeep)));
    }
}
