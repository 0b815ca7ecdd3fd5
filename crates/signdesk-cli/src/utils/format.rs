/// Truncate a string to a maximum length in characters, adding ellipsis if needed
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else if max_len <= 3 {
        s.chars().take(max_len).collect()
    } else {
        let truncated: String = s.chars().take(max_len - 3).collect();
        format!("{}...", truncated)
    }
}

/// Format a backend timestamp to a more readable format
pub fn format_date(date: &str) -> String {
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(date) {
        dt.format("%b %d, %Y").to_string()
    } else if date.len() >= 10 && date.is_char_boundary(10) {
        // Fall back to the YYYY-MM-DD prefix
        date[..10].to_string()
    } else {
        date.to_string()
    }
}

pub fn format_optional_date(date: Option<&str>) -> String {
    date.map(format_date).unwrap_or_else(|| "-".to_string())
}

pub fn format_price(amount: f64) -> String {
    format!("${:.2}", amount)
}

pub fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

/// Render rows as left-aligned columns under a header and a rule.
pub fn table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            if let Some(width) = widths.get_mut(i) {
                *width = (*width).max(cell.chars().count());
            }
        }
    }

    let line = |cells: Vec<&str>| -> String {
        cells
            .iter()
            .zip(&widths)
            .map(|(cell, width)| format!("{:<width$}", cell, width = width))
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };

    let mut out = vec![line(headers.to_vec())];
    out.push(
        widths
            .iter()
            .map(|w| "-".repeat(*w))
            .collect::<Vec<_>>()
            .join("  "),
    );
    for row in rows {
        out.push(line(row.iter().map(String::as_str).collect()));
    }
    out.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_string() {
        assert_eq!(truncate_string("Hello", 10), "Hello");
        assert_eq!(truncate_string("Hello World", 8), "Hello...");
        assert_eq!(truncate_string("Hi", 2), "Hi");
        assert_eq!(truncate_string("Café Sign", 6), "Caf...");
    }

    #[test]
    fn test_format_date() {
        assert_eq!(format_date("2025-05-16T17:24:55.000Z"), "May 16, 2025");
        assert_eq!(format_date("2025-05-16 17:24"), "2025-05-16");
        assert_eq!(format_date("soon"), "soon");
        assert_eq!(format_optional_date(None), "-");
    }

    #[test]
    fn test_format_price() {
        assert_eq!(format_price(89.99), "$89.99");
        assert_eq!(format_price(5.0), "$5.00");
    }

    #[test]
    fn test_table_aligns_columns() {
        let rendered = table(
            &["ID", "Title"],
            &[
                vec!["1".to_string(), "Broken sign".to_string()],
                vec!["1234".to_string(), "Late".to_string()],
            ],
        );
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines[0], "ID    Title");
        assert_eq!(lines[1], "----  -----------");
        assert_eq!(lines[2], "1     Broken sign");
        assert_eq!(lines[3], "1234  Late");
    }
}
