//! Restricted XLSX parsing
//!
//! Reads tabular values out of an XLSX archive without a general
//! spreadsheet engine. The restrictions are the point:
//!
//! - only the first worksheet is read,
//! - only cached literal cell values are taken; formula bodies are never
//!   read or evaluated,
//! - no date coercion, number formatting, or style handling; the style
//!   index on a cell is simply never consulted,
//! - decompressed entry sizes are checked against the text limit before
//!   reading, so a crafted archive cannot balloon in memory.
//!
//! A buffer without the ZIP local-file-header signature is rejected; this
//! parser never falls back to treating the bytes as text.

use super::{normalize_header, scrub_cell, NormalizedRow, ParseError, ParseLimits, ParsedUpload};
use serde::Deserialize;
use std::io::{Cursor, Read};

/// ZIP local-file-header signature ("PK\x03\x04").
const ZIP_SIGNATURE: [u8; 4] = [0x50, 0x4B, 0x03, 0x04];

const FIRST_SHEET: &str = "xl/worksheets/sheet1.xml";
const SHARED_STRINGS: &str = "xl/sharedStrings.xml";

/// True when the buffer starts with the ZIP local-file-header signature.
pub fn has_zip_signature(bytes: &[u8]) -> bool {
    bytes.len() >= 4 && bytes[..4] == ZIP_SIGNATURE
}

// Serde mappings for the worksheet subset we accept. Unknown elements and
// attributes (styles, formats, formulas, views) are ignored by
// construction.

#[derive(Debug, Deserialize)]
struct Worksheet {
    #[serde(rename = "sheetData")]
    sheet_data: SheetData,
}

#[derive(Debug, Deserialize)]
struct SheetData {
    #[serde(rename = "row", default)]
    rows: Vec<SheetRow>,
}

#[derive(Debug, Deserialize)]
struct SheetRow {
    #[serde(rename = "c", default)]
    cells: Vec<SheetCell>,
}

#[derive(Debug, Deserialize)]
struct SheetCell {
    #[serde(rename = "@r")]
    reference: Option<String>,
    #[serde(rename = "@t")]
    cell_type: Option<String>,
    #[serde(rename = "v")]
    value: Option<String>,
    #[serde(rename = "is")]
    inline: Option<InlineString>,
}

#[derive(Debug, Deserialize)]
struct InlineString {
    #[serde(rename = "t")]
    text: Option<String>,
    #[serde(rename = "r", default)]
    runs: Vec<TextRun>,
}

#[derive(Debug, Deserialize)]
struct Sst {
    #[serde(rename = "si", default)]
    items: Vec<StringItem>,
}

#[derive(Debug, Deserialize)]
struct StringItem {
    #[serde(rename = "t")]
    text: Option<String>,
    #[serde(rename = "r", default)]
    runs: Vec<TextRun>,
}

#[derive(Debug, Deserialize)]
struct TextRun {
    #[serde(rename = "t")]
    text: Option<String>,
}

impl StringItem {
    fn resolve(&self) -> String {
        if let Some(ref text) = self.text {
            return text.clone();
        }
        self.runs
            .iter()
            .filter_map(|run| run.text.as_deref())
            .collect()
    }
}

/// Parse XLSX bytes into normalized rows.
pub fn parse_xlsx(bytes: &[u8], limits: &ParseLimits) -> Result<ParsedUpload, ParseError> {
    if bytes.is_empty() {
        return Err(ParseError::Empty);
    }
    if !has_zip_signature(bytes) {
        return Err(ParseError::SignatureMismatch("xlsx"));
    }

    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| ParseError::Malformed(format!("XLSX archive: {e}")))?;

    let shared = read_shared_strings(&mut archive, limits)?;
    let sheet_name = first_sheet_name(&mut archive)?;
    let sheet_xml = read_entry(&mut archive, &sheet_name, limits)?;

    let worksheet: Worksheet = quick_xml::de::from_str(&sheet_xml)
        .map_err(|e| ParseError::Malformed(format!("XLSX worksheet: {e}")))?;

    let mut sheet_rows = worksheet.sheet_data.rows.into_iter();

    // First present row is the header.
    let header_cells = loop {
        let Some(row) = sheet_rows.next() else {
            return Err(ParseError::NoHeader);
        };
        let cells = materialize_row(&row, &shared)?;
        if cells.iter().any(|cell| !cell.trim().is_empty()) {
            break cells;
        }
    };

    if header_cells.len() > limits.max_columns {
        return Err(ParseError::TooManyColumns {
            found: header_cells.len(),
            limit: limits.max_columns,
        });
    }

    let mut slots: Vec<Option<String>> = Vec::with_capacity(header_cells.len());
    let mut header_order: Vec<String> = Vec::new();
    for raw in &header_cells {
        let key = normalize_header(raw)?;
        if let Some(ref key) = key {
            if !header_order.contains(key) {
                header_order.push(key.clone());
            }
        }
        slots.push(key);
    }
    if header_order.is_empty() {
        return Err(ParseError::NoHeader);
    }

    let mut rows: Vec<NormalizedRow> = Vec::new();
    for sheet_row in sheet_rows {
        // rows beyond the cap are discarded, not errored
        if rows.len() >= limits.max_rows {
            break;
        }
        let cells = materialize_row(&sheet_row, &shared)?;
        if cells.iter().all(|cell| cell.trim().is_empty()) {
            continue;
        }

        let mut row = NormalizedRow::with_capacity(header_order.len());
        for (i, cell) in cells.iter().enumerate() {
            let Some(Some(key)) = slots.get(i) else {
                continue;
            };
            row.insert(key.clone(), scrub_cell(cell, limits));
        }
        rows.push(row);
    }

    Ok(ParsedUpload {
        headers: header_order,
        rows,
    })
}

/// Expand one sheet row into a dense cell vector using cell references.
fn materialize_row(row: &SheetRow, shared: &[String]) -> Result<Vec<String>, ParseError> {
    let mut cells: Vec<String> = Vec::new();

    for cell in &row.cells {
        let index = match cell.reference.as_deref().and_then(column_index) {
            Some(index) => index,
            None => cells.len(),
        };

        if index >= cells.len() {
            cells.resize(index + 1, String::new());
        }
        cells[index] = resolve_cell(cell, shared)?;
    }

    Ok(cells)
}

/// Resolve a cell's text value without any format interpretation.
fn resolve_cell(cell: &SheetCell, shared: &[String]) -> Result<String, ParseError> {
    match cell.cell_type.as_deref() {
        Some("s") => {
            let raw = cell.value.as_deref().unwrap_or_default();
            let index: usize = raw
                .trim()
                .parse()
                .map_err(|_| ParseError::Malformed(format!("shared string index '{raw}'")))?;
            shared
                .get(index)
                .cloned()
                .ok_or_else(|| ParseError::Malformed(format!("shared string index {index}")))
        }
        Some("inlineStr") => Ok(cell
            .inline
            .as_ref()
            .map(|inline| {
                inline.text.clone().unwrap_or_else(|| {
                    inline
                        .runs
                        .iter()
                        .filter_map(|run| run.text.as_deref())
                        .collect()
                })
            })
            .unwrap_or_default()),
        Some("b") => Ok(match cell.value.as_deref().map(str::trim) {
            Some("1") => "true".to_string(),
            _ => "false".to_string(),
        }),
        // "str" (formula cache), "n", and untyped cells all read the
        // literal value verbatim.
        _ => Ok(cell.value.clone().unwrap_or_default()),
    }
}

/// Convert a cell reference like "B7" into a zero-based column index.
fn column_index(reference: &str) -> Option<usize> {
    let letters: String = reference
        .chars()
        .take_while(|ch| ch.is_ascii_alphabetic())
        .collect();
    if letters.is_empty() {
        return None;
    }

    let mut index: usize = 0;
    for ch in letters.chars() {
        index = index * 26 + (ch.to_ascii_uppercase() as usize - 'A' as usize + 1);
    }
    Some(index - 1)
}

fn first_sheet_name(
    archive: &mut zip::ZipArchive<Cursor<&[u8]>>,
) -> Result<String, ParseError> {
    if archive.by_name(FIRST_SHEET).is_ok() {
        return Ok(FIRST_SHEET.to_string());
    }

    let mut candidates: Vec<String> = archive
        .file_names()
        .filter(|name| name.starts_with("xl/worksheets/") && name.ends_with(".xml"))
        .map(|name| name.to_string())
        .collect();
    candidates.sort();

    candidates
        .into_iter()
        .next()
        .ok_or_else(|| ParseError::Malformed("no worksheet in archive".to_string()))
}

fn read_shared_strings(
    archive: &mut zip::ZipArchive<Cursor<&[u8]>>,
    limits: &ParseLimits,
) -> Result<Vec<String>, ParseError> {
    if archive.by_name(SHARED_STRINGS).is_err() {
        return Ok(Vec::new());
    }

    let xml = read_entry(archive, SHARED_STRINGS, limits)?;
    let sst: Sst = quick_xml::de::from_str(&xml)
        .map_err(|e| ParseError::Malformed(format!("XLSX shared strings: {e}")))?;

    Ok(sst.items.iter().map(StringItem::resolve).collect())
}

fn read_entry(
    archive: &mut zip::ZipArchive<Cursor<&[u8]>>,
    name: &str,
    limits: &ParseLimits,
) -> Result<String, ParseError> {
    let mut file = archive
        .by_name(name)
        .map_err(|e| ParseError::Malformed(format!("XLSX entry {name}: {e}")))?;

    // Check the declared decompressed size before touching the data.
    if file.size() > limits.max_text_bytes as u64 {
        return Err(ParseError::TooLarge {
            limit_bytes: limits.max_text_bytes,
        });
    }

    let mut content = String::with_capacity(file.size() as usize);
    file.take(limits.max_text_bytes as u64 + 1)
        .read_to_string(&mut content)
        .map_err(|e| ParseError::Malformed(format!("XLSX entry {name}: {e}")))?;

    if content.len() > limits.max_text_bytes {
        return Err(ParseError::TooLarge {
            limit_bytes: limits.max_text_bytes,
        });
    }

    Ok(content)
}
