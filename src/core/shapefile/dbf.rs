//! dBASE III attribute table.
//!
//! Rows are kept as raw fixed-width records so that rewriting a table after
//! filtering leaves field descriptors and every retained value byte-identical.

use crate::utils::error::{IngestError, Result};
use chrono::{Datelike, Utc};

const HEADER_LEN: usize = 32;
const DESCRIPTOR_LEN: usize = 32;
const HEADER_TERMINATOR: u8 = 0x0D;
const FILE_TERMINATOR: u8 = 0x1A;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDef {
    pub name: String,
    /// `C`, `N`, `F`, `L`, `D` ...
    pub kind: char,
    pub length: u8,
    pub decimals: u8,
}

impl FieldDef {
    pub fn character(name: &str, length: u8) -> Self {
        Self {
            name: name.to_string(),
            kind: 'C',
            length,
            decimals: 0,
        }
    }

    pub fn numeric(name: &str, length: u8, decimals: u8) -> Self {
        Self {
            name: name.to_string(),
            kind: 'N',
            length,
            decimals,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeTable {
    header: Vec<u8>,
    fields: Vec<FieldDef>,
    record_len: usize,
    rows: Vec<Vec<u8>>,
}

impl AttributeTable {
    pub fn new(fields: &[FieldDef]) -> Result<Self> {
        let header_len = HEADER_LEN + DESCRIPTOR_LEN * fields.len() + 1;
        let record_len = 1 + fields.iter().map(|f| f.length as usize).sum::<usize>();
        if header_len > u16::MAX as usize || record_len > u16::MAX as usize {
            return Err(dbf_error("too many fields"));
        }

        let today = Utc::now();
        let mut header = vec![0u8; header_len];
        header[0] = 0x03;
        header[1] = (today.year() - 1900).clamp(0, 255) as u8;
        header[2] = today.month() as u8;
        header[3] = today.day() as u8;
        header[8..10].copy_from_slice(&(header_len as u16).to_le_bytes());
        header[10..12].copy_from_slice(&(record_len as u16).to_le_bytes());

        for (i, field) in fields.iter().enumerate() {
            let name = field.name.as_bytes();
            if name.is_empty() || name.len() > 10 {
                return Err(dbf_error(format!("invalid field name '{}'", field.name)));
            }
            let offset = HEADER_LEN + i * DESCRIPTOR_LEN;
            header[offset..offset + name.len()].copy_from_slice(name);
            header[offset + 11] = field.kind as u8;
            header[offset + 16] = field.length;
            header[offset + 17] = field.decimals;
        }
        header[header_len - 1] = HEADER_TERMINATOR;

        Ok(Self {
            header,
            fields: fields.to_vec(),
            record_len,
            rows: Vec::new(),
        })
    }

    pub fn parse(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_LEN {
            return Err(dbf_error("file shorter than header"));
        }
        let count = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]) as usize;
        let header_len = u16::from_le_bytes([bytes[8], bytes[9]]) as usize;
        let record_len = u16::from_le_bytes([bytes[10], bytes[11]]) as usize;
        if header_len < HEADER_LEN + 1 || header_len > bytes.len() || record_len == 0 {
            return Err(dbf_error("invalid header or record length"));
        }

        let mut fields = Vec::new();
        let mut offset = HEADER_LEN;
        while offset + DESCRIPTOR_LEN <= header_len && bytes[offset] != HEADER_TERMINATOR {
            let descriptor = &bytes[offset..offset + DESCRIPTOR_LEN];
            let name_end = descriptor[..11].iter().position(|b| *b == 0).unwrap_or(11);
            fields.push(FieldDef {
                name: String::from_utf8_lossy(&descriptor[..name_end]).trim().to_string(),
                kind: descriptor[11] as char,
                length: descriptor[16],
                decimals: descriptor[17],
            });
            offset += DESCRIPTOR_LEN;
        }

        let data = &bytes[header_len..];
        if data.len() < count * record_len {
            return Err(dbf_error(format!(
                "expected {} records of {} bytes, found {} bytes",
                count,
                record_len,
                data.len()
            )));
        }
        let rows = data
            .chunks_exact(record_len)
            .take(count)
            .map(|row| row.to_vec())
            .collect();

        Ok(Self {
            header: bytes[..header_len].to_vec(),
            fields,
            record_len,
            rows,
        })
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.header.len() + self.rows.len() * self.record_len + 1);
        out.extend_from_slice(&self.header);
        out[4..8].copy_from_slice(&(self.rows.len() as u32).to_le_bytes());
        for row in &self.rows {
            out.extend_from_slice(row);
        }
        out.push(FILE_TERMINATOR);
        out
    }

    /// 依欄位定義寫入一列，數值欄位靠右、文字欄位靠左
    pub fn push_row(&mut self, values: &[&str]) -> Result<()> {
        if values.len() != self.fields.len() {
            return Err(dbf_error(format!(
                "expected {} values, got {}",
                self.fields.len(),
                values.len()
            )));
        }
        let mut row = Vec::with_capacity(self.record_len);
        row.push(b' ');
        for (field, value) in self.fields.iter().zip(values) {
            let width = field.length as usize;
            let mut cell: Vec<u8> = value.bytes().take(width).collect();
            let padding = vec![b' '; width - cell.len()];
            if matches!(field.kind, 'N' | 'F') {
                let mut padded = padding;
                padded.append(&mut cell);
                cell = padded;
            } else {
                cell.extend(padding);
            }
            row.extend(cell);
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn fields(&self) -> &[FieldDef] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// 去除前後空白後的欄位值
    pub fn value(&self, row: usize, field_name: &str) -> Option<String> {
        let row = self.rows.get(row)?;
        let mut offset = 1;
        for field in &self.fields {
            let width = field.length as usize;
            if field.name.eq_ignore_ascii_case(field_name) {
                let raw = row.get(offset..offset + width)?;
                return Some(String::from_utf8_lossy(raw).trim().to_string());
            }
            offset += width;
        }
        None
    }

    /// 只保留 `keep[i]` 為 true 的列
    pub fn retain_rows(&mut self, keep: &[bool]) {
        let mut flags = keep.iter();
        self.rows.retain(|_| *flags.next().unwrap_or(&true));
    }
}

fn dbf_error(message: impl Into<String>) -> IngestError {
    IngestError::ShapefileError {
        file: ".dbf".to_string(),
        message: message.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> AttributeTable {
        let mut table = AttributeTable::new(&[
            FieldDef::numeric("fldNpdidFi", 10, 0),
            FieldDef::character("fldName", 20),
        ])
        .unwrap();
        table.push_row(&["43506", "TROLL"]).unwrap();
        table.push_row(&["43437", "OSEBERG"]).unwrap();
        table.push_row(&["1630100", "JOHAN SVERDRUP"]).unwrap();
        table
    }

    #[test]
    fn test_parse_written_table() {
        let bytes = table().to_bytes();
        assert_eq!(*bytes.last().unwrap(), FILE_TERMINATOR);

        let parsed = AttributeTable::parse(&bytes).unwrap();
        assert_eq!(parsed.len(), 3);
        assert_eq!(parsed.fields()[0].name, "fldNpdidFi");
        assert_eq!(parsed.fields()[1].kind, 'C');
        assert_eq!(parsed.value(2, "fldName").unwrap(), "JOHAN SVERDRUP");
        assert_eq!(parsed.value(0, "FLDNPDIDFI").unwrap(), "43506");
    }

    #[test]
    fn test_retain_rows_updates_count_and_keeps_schema() {
        let original = table();
        let mut filtered = original.clone();
        filtered.retain_rows(&[true, false, true]);

        let parsed = AttributeTable::parse(&filtered.to_bytes()).unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed.fields(), original.fields());
        assert_eq!(parsed.value(1, "fldName").unwrap(), "JOHAN SVERDRUP");
    }

    #[test]
    fn test_push_row_rejects_wrong_arity() {
        let mut t = table();
        assert!(t.push_row(&["1"]).is_err());
    }

    #[test]
    fn test_truncated_table_is_rejected() {
        let bytes = table().to_bytes();
        assert!(AttributeTable::parse(&bytes[..bytes.len() - 20]).is_err());
        assert!(AttributeTable::parse(&bytes[..10]).is_err());
    }
}
