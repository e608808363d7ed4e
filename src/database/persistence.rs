//! # Whole-Image Persistence
//!
//! Serializes a complete database (schema + data) to a single file and
//! reads it back. The same codec backs the durable `.qdb` image and the
//! transaction `.txsnap` snapshot.
//!
//! ## File Format
//!
//! ```text
//! Offset  Size  Description
//! 0       16    Magic: "quilldb image v1"
//! 16      4     Format version (u32 little-endian)
//! 20      8     CRC-64/ECMA of the payload (u64 little-endian)
//! 28      8     Payload length (u64 little-endian)
//! 36      ...   Payload
//! ```
//!
//! ### Payload
//!
//! ```text
//! database name: u16 len + UTF-8 bytes
//! table count: u32
//! For each table (name order):
//!   - name: u16 len + bytes
//!   - column count: u32
//!   - For each column (insertion order):
//!       - name: u16 len + bytes
//!       - data type: u8 (DataType repr)
//!       - constraint count: u16
//!       - For each constraint:
//!           - name: u16 len + bytes
//!           - rule tag: u8 (0=NOT NULL, 1=PRIMARY KEY, 2=UNIQUE,
//!                           3=FOREIGN KEY, 4=CHECK, 5=DEFAULT)
//!           - rule data: parent table / check text / default value
//!       - row count: u64
//!       - body values, column-major:
//!           - tag: u8 (0=Null, 1=Int, 2=Real, 3=Str, 4=Bool)
//!           - payload: i64 / f64 bits / u32 len + bytes / u8
//! ```
//!
//! Table order (BTreeMap) and column order (insertion) are both
//! deterministic, so `load(save(db))` reproduces `db` value-for-value and
//! byte-identical re-serialization holds.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crc::{Crc, CRC_64_ECMA_182};
use smallvec::SmallVec;
use snafu::{ensure, ResultExt};
use tracing::debug;

use crate::config::{IMAGE_FORMAT_VERSION, IMAGE_HEADER_SIZE, IMAGE_MAGIC};
use crate::constraints::{CheckRule, Constraint, ConstraintRule, ConstraintSet};
use crate::database::{Database, DatabaseState};
use crate::error::{DbError, IoSnafu, ParseSnafu, Result};
use crate::schema::{Column, Table};
use crate::sql::parse_condition;
use crate::types::{DataType, Value};

const CRC64: Crc<u64> = Crc::<u64>::new(&CRC_64_ECMA_182);

/// Writes the deterministic whole-image serialization of `db` to `path`.
pub fn save(db: &Database, path: &Path) -> Result<()> {
    let payload = encode_payload(db)?;

    let mut buf = Vec::with_capacity(IMAGE_HEADER_SIZE + payload.len());
    buf.extend_from_slice(IMAGE_MAGIC);
    buf.extend(IMAGE_FORMAT_VERSION.to_le_bytes());
    buf.extend(CRC64.checksum(&payload).to_le_bytes());
    buf.extend((payload.len() as u64).to_le_bytes());
    buf.extend(payload);

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).context(IoSnafu {
                message: format!("failed to create {}", parent.display()),
            })?;
        }
    }
    fs::write(path, &buf).context(IoSnafu {
        message: format!("failed to write database image to {}", path.display()),
    })?;
    debug!(path = %path.display(), bytes = buf.len(), "wrote database image");
    Ok(())
}

/// Reads a database image back. The returned database points at `path`
/// and is IN_WORK.
pub fn load(path: &Path) -> Result<Database> {
    let bytes = fs::read(path).context(IoSnafu {
        message: format!("failed to read database image from {}", path.display()),
    })?;

    if bytes.len() < IMAGE_HEADER_SIZE {
        return Err(DbError::corrupt_image(path, "file shorter than the header"));
    }
    if &bytes[0..16] != IMAGE_MAGIC {
        return Err(DbError::corrupt_image(path, "bad magic"));
    }
    let version = u32::from_le_bytes([bytes[16], bytes[17], bytes[18], bytes[19]]);
    if version != IMAGE_FORMAT_VERSION {
        return Err(DbError::corrupt_image(
            path,
            &format!("unsupported format version {}", version),
        ));
    }
    let crc = u64::from_le_bytes([
        bytes[20], bytes[21], bytes[22], bytes[23], bytes[24], bytes[25], bytes[26], bytes[27],
    ]);
    let payload_len = u64::from_le_bytes([
        bytes[28], bytes[29], bytes[30], bytes[31], bytes[32], bytes[33], bytes[34], bytes[35],
    ]) as usize;

    let payload = &bytes[IMAGE_HEADER_SIZE..];
    if payload.len() != payload_len {
        return Err(DbError::corrupt_image(path, "payload length mismatch"));
    }
    if CRC64.checksum(payload) != crc {
        return Err(DbError::corrupt_image(path, "payload checksum mismatch"));
    }

    let mut reader = Reader { bytes: payload, pos: 0 };
    let name = reader.read_str()?;
    let table_count = reader.read_u32()?;
    let mut tables = BTreeMap::new();
    for _ in 0..table_count {
        let table_name = reader.read_str()?;
        let table = decode_table(&mut reader)?;
        tables.insert(table_name, table);
    }
    ensure!(
        reader.pos == payload.len(),
        ParseSnafu {
            message: "trailing bytes after database payload".to_string(),
        }
    );

    debug!(path = %path.display(), tables = tables.len(), "loaded database image");
    Ok(Database::from_parts(
        name,
        path.to_path_buf(),
        tables,
        DatabaseState::InWork,
    ))
}

fn encode_payload(db: &Database) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    write_str(&mut buf, db.name())?;
    buf.extend((db.tables().len() as u32).to_le_bytes());
    for (name, table) in db.tables() {
        write_str(&mut buf, name)?;
        encode_table(table, &mut buf)?;
    }
    Ok(buf)
}

fn encode_table(table: &Table, buf: &mut Vec<u8>) -> Result<()> {
    buf.extend((table.columns().len() as u32).to_le_bytes());
    for column in table.columns() {
        write_str(buf, column.name())?;
        buf.push(column.data_type() as u8);

        buf.extend((column.constraints().len() as u16).to_le_bytes());
        for constraint in column.constraints() {
            encode_constraint(constraint, buf)?;
        }

        buf.extend((column.len() as u64).to_le_bytes());
        for value in column.body() {
            encode_value(value, buf)?;
        }
    }
    Ok(())
}

fn encode_constraint(constraint: &Constraint, buf: &mut Vec<u8>) -> Result<()> {
    write_str(buf, constraint.name())?;
    match constraint.rule() {
        ConstraintRule::NotNull => buf.push(0),
        ConstraintRule::PrimaryKey => buf.push(1),
        ConstraintRule::Unique => buf.push(2),
        ConstraintRule::ForeignKey { parent_table } => {
            buf.push(3);
            write_str(buf, parent_table)?;
        }
        ConstraintRule::Check(rule) => {
            buf.push(4);
            write_str(buf, &rule.text)?;
        }
        ConstraintRule::Default(value) => {
            buf.push(5);
            encode_value(value, buf)?;
        }
    }
    Ok(())
}

fn encode_value(value: &Value, buf: &mut Vec<u8>) -> Result<()> {
    match value {
        Value::Null => buf.push(0),
        Value::Int(i) => {
            buf.push(1);
            buf.extend(i.to_le_bytes());
        }
        Value::Real(f) => {
            buf.push(2);
            buf.extend(f.to_le_bytes());
        }
        Value::Str(s) => {
            buf.push(3);
            ensure!(
                s.len() <= u32::MAX as usize,
                ParseSnafu {
                    message: "string value too long to serialize".to_string(),
                }
            );
            buf.extend((s.len() as u32).to_le_bytes());
            buf.extend(s.as_bytes());
        }
        Value::Bool(b) => {
            buf.push(4);
            buf.push(u8::from(*b));
        }
    }
    Ok(())
}

fn decode_table(reader: &mut Reader<'_>) -> Result<Table> {
    let column_count = reader.read_u32()?;
    let mut columns = Vec::with_capacity(column_count as usize);
    let mut row_count: Option<usize> = None;

    for _ in 0..column_count {
        let name = reader.read_str()?;
        let data_type = DataType::try_from(reader.read_u8()?)?;

        let constraint_count = reader.read_u16()?;
        let mut constraints: ConstraintSet = SmallVec::new();
        for _ in 0..constraint_count {
            constraints.push(decode_constraint(reader)?);
        }

        let len = reader.read_u64()? as usize;
        match row_count {
            None => row_count = Some(len),
            Some(expected) => ensure!(
                expected == len,
                ParseSnafu {
                    message: format!(
                        "column '{}' has {} rows, expected {}",
                        name, len, expected
                    ),
                }
            ),
        }
        let mut body = Vec::with_capacity(len);
        for _ in 0..len {
            body.push(decode_value(reader)?);
        }

        columns.push(Column::from_parts(name, data_type, constraints, body));
    }

    Ok(Table::from_parts(columns, row_count.unwrap_or(0)))
}

fn decode_constraint(reader: &mut Reader<'_>) -> Result<Constraint> {
    let name = reader.read_str()?;
    let tag = reader.read_u8()?;
    let rule = match tag {
        0 => ConstraintRule::NotNull,
        1 => ConstraintRule::PrimaryKey,
        2 => ConstraintRule::Unique,
        3 => ConstraintRule::ForeignKey {
            parent_table: reader.read_str()?,
        },
        4 => {
            let text = reader.read_str()?;
            let expr = parse_condition(&text)?;
            ConstraintRule::Check(CheckRule { text, expr })
        }
        5 => ConstraintRule::Default(decode_value(reader)?),
        other => {
            return ParseSnafu {
                message: format!("unknown constraint tag: {}", other),
            }
            .fail()
        }
    };
    Ok(Constraint::named(name, rule))
}

fn decode_value(reader: &mut Reader<'_>) -> Result<Value> {
    match reader.read_u8()? {
        0 => Ok(Value::Null),
        1 => Ok(Value::Int(reader.read_i64()?)),
        2 => Ok(Value::Real(reader.read_f64()?)),
        3 => {
            let len = reader.read_u32()? as usize;
            let bytes = reader.take(len)?;
            let text = std::str::from_utf8(bytes).map_err(|e| DbError::Parse {
                message: format!("invalid UTF-8 in string value: {}", e),
            })?;
            Ok(Value::Str(text.to_string()))
        }
        4 => Ok(Value::Bool(reader.read_u8()? != 0)),
        other => ParseSnafu {
            message: format!("unknown value tag: {}", other),
        }
        .fail(),
    }
}

fn write_str(buf: &mut Vec<u8>, text: &str) -> Result<()> {
    ensure!(
        text.len() <= u16::MAX as usize,
        ParseSnafu {
            message: format!("name '{}' is too long to serialize", text),
        }
    );
    buf.extend((text.len() as u16).to_le_bytes());
    buf.extend(text.as_bytes());
    Ok(())
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        ensure!(
            self.pos + n <= self.bytes.len(),
            ParseSnafu {
                message: "unexpected end of database payload".to_string(),
            }
        );
        let slice = &self.bytes[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn read_u16(&mut self) -> Result<u16> {
        let b = self.take(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    fn read_u32(&mut self) -> Result<u32> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn read_u64(&mut self) -> Result<u64> {
        let b = self.take(8)?;
        Ok(u64::from_le_bytes([
            b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7],
        ]))
    }

    fn read_i64(&mut self) -> Result<i64> {
        Ok(self.read_u64()? as i64)
    }

    fn read_f64(&mut self) -> Result<f64> {
        Ok(f64::from_le_bytes(
            self.read_u64()?.to_le_bytes(),
        ))
    }

    fn read_str(&mut self) -> Result<String> {
        let len = self.read_u16()? as usize;
        let bytes = self.take(len)?;
        let text = std::str::from_utf8(bytes).map_err(|e| DbError::Parse {
            message: format!("invalid UTF-8 in name: {}", e),
        })?;
        Ok(text.to_string())
    }
}
