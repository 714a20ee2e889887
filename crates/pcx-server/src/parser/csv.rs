//! CSV parsing with header normalization and cell hygiene

use super::{normalize_header, scrub_cell, NormalizedRow, ParseError, ParseLimits, ParsedUpload};

/// Parse CSV bytes into normalized rows.
///
/// The first record is the header row; its cells become canonical keys.
/// Columns whose header normalizes to nothing are dropped. Data rows
/// beyond `max_rows` are silently excluded, matching the caller-visible
/// row-cap contract.
pub fn parse_csv(bytes: &[u8], limits: &ParseLimits) -> Result<ParsedUpload, ParseError> {
    if bytes.is_empty() {
        return Err(ParseError::Empty);
    }
    if bytes.len() > limits.max_text_bytes {
        return Err(ParseError::TooLarge {
            limit_bytes: limits.max_text_bytes,
        });
    }

    let mut reader = ::csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(bytes);

    // headers[i] is None for dropped columns so data cells stay aligned.
    let mut headers: Option<Vec<Option<String>>> = None;
    let mut header_order: Vec<String> = Vec::new();
    let mut rows: Vec<NormalizedRow> = Vec::new();

    for record in reader.records() {
        let record = record.map_err(|e| ParseError::Malformed(format!("CSV: {e}")))?;

        let Some(ref slots) = headers else {
            // first record is the header row
            if record.len() > limits.max_columns {
                return Err(ParseError::TooManyColumns {
                    found: record.len(),
                    limit: limits.max_columns,
                });
            }

            let mut slots = Vec::with_capacity(record.len());
            for raw in record.iter() {
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
            headers = Some(slots);
            continue;
        };

        if rows.len() >= limits.max_rows {
            break;
        }
        if record.iter().all(|cell| cell.trim().is_empty()) {
            continue;
        }

        let mut row = NormalizedRow::with_capacity(header_order.len());
        for (i, cell) in record.iter().enumerate() {
            let Some(Some(key)) = slots.get(i) else {
                // unmapped or overflow cell, no header to attach to
                continue;
            };
            row.insert(key.clone(), scrub_cell(cell, limits));
        }
        rows.push(row);
    }

    if headers.is_none() {
        return Err(ParseError::NoHeader);
    }

    Ok(ParsedUpload {
        headers: header_order,
        rows,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limits() -> ParseLimits {
        ParseLimits::default()
    }

    #[test]
    fn test_parse_basic_csv() {
        let data = b"Product Name,Price,Stock\nWidget,9.99,5\nGadget,12.50,0\n";
        let parsed = parse_csv(data, &limits()).unwrap();

        assert_eq!(parsed.headers, vec!["product_name", "price", "stock"]);
        assert_eq!(parsed.rows.len(), 2);
        assert_eq!(parsed.rows[0]["product_name"], "Widget");
        assert_eq!(parsed.rows[1]["price"], "12.50");
    }

    #[test]
    fn test_formula_cell_is_defused() {
        let data = b"name,price\n=1+1,2\n";
        let parsed = parse_csv(data, &limits()).unwrap();
        assert_eq!(parsed.rows[0]["name"], "'=1+1");
    }

    #[test]
    fn test_markup_stripped_from_cells() {
        let data = b"name,notes\nWidget,<script>alert(1)</script>\n";
        let parsed = parse_csv(data, &limits()).unwrap();
        assert_eq!(parsed.rows[0]["notes"], "scriptalert(1)/script");
    }

    #[test]
    fn test_blank_rows_skipped() {
        let data = b"name,price\nWidget,1\n,\nGadget,2\n";
        let parsed = parse_csv(data, &limits()).unwrap();
        assert_eq!(parsed.rows.len(), 2);
    }

    #[test]
    fn test_rows_beyond_cap_silently_excluded() {
        let mut data = String::from("name\n");
        for i in 0..20 {
            data.push_str(&format!("item{i}\n"));
        }
        let capped = ParseLimits {
            max_rows: 10,
            ..ParseLimits::default()
        };
        let parsed = parse_csv(data.as_bytes(), &capped).unwrap();
        assert_eq!(parsed.rows.len(), 10);
    }

    #[test]
    fn test_too_many_columns_rejected() {
        let header: Vec<String> = (0..150).map(|i| format!("col{i}")).collect();
        let data = format!("{}\n", header.join(","));
        let err = parse_csv(data.as_bytes(), &limits()).unwrap_err();
        assert!(matches!(err, ParseError::TooManyColumns { found: 150, .. }));
    }

    #[test]
    fn test_dangerous_header_rejected() {
        let data = b"__proto__,price\nx,1\n";
        let err = parse_csv(data, &limits()).unwrap_err();
        assert!(matches!(err, ParseError::ForbiddenColumn(_)));
    }

    #[test]
    fn test_header_only_file_yields_no_rows() {
        let data = b"name,price\n";
        let parsed = parse_csv(data, &limits()).unwrap();
        assert!(parsed.rows.is_empty());
    }

    #[test]
    fn test_unusable_header_rejected() {
        let data = b"***,###\nx,y\n";
        let err = parse_csv(data, &limits()).unwrap_err();
        assert!(matches!(err, ParseError::NoHeader));
    }

    #[test]
    fn test_empty_input_rejected() {
        assert!(matches!(parse_csv(b"", &limits()), Err(ParseError::Empty)));
    }

    #[test]
    fn test_ragged_rows_tolerated() {
        let data = b"name,price,stock\nWidget,1\nGadget,2,3,extra\n";
        let parsed = parse_csv(data, &limits()).unwrap();
        assert_eq!(parsed.rows.len(), 2);
        assert!(parsed.rows[0].get("stock").is_none());
        assert_eq!(parsed.rows[1]["stock"], "3");
    }
}
