//! Minimal comma-delimited text handling.
//!
//! Baseline files, catalog exports and snapshot ingests are two- or
//! three-column tables; this module covers exactly that much: quoted
//! fields with doubled-quote escapes, a header row, and name-based column
//! lookup. Nothing here streams; inputs are small administrative files.

/// A parsed table: one header row plus data rows.
#[derive(Debug, Clone, Default)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    /// Parse delimited text. The first non-empty line is the header row;
    /// blank lines are skipped.
    pub fn parse(text: &str) -> Self {
        let mut lines = text.lines().filter(|line| !line.trim().is_empty());

        let headers = match lines.next() {
            Some(line) => split_line(line),
            None => return Table::default(),
        };
        let rows = lines.map(split_line).collect();

        Table { headers, rows }
    }

    /// Index of a header by name, after trimming.
    pub fn column(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h.trim() == name)
    }

    /// Cell value, empty for short rows.
    pub fn cell<'a>(&'a self, row: &'a [String], column: usize) -> &'a str {
        row.get(column).map(String::as_str).unwrap_or("")
    }
}

/// Split one delimited line into fields.
///
/// Fields may be wrapped in double quotes; a doubled quote inside a quoted
/// field is a literal quote. Fields are trimmed.
pub fn split_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes => {
                if chars.peek() == Some(&'"') {
                    chars.next();
                    field.push('"');
                } else {
                    in_quotes = false;
                }
            }
            '"' => in_quotes = true,
            ',' if !in_quotes => {
                fields.push(std::mem::take(&mut field));
            }
            _ => field.push(c),
        }
    }
    fields.push(field);

    fields.into_iter().map(|f| f.trim().to_string()).collect()
}

/// Join fields into one delimited line, quoting where needed.
pub fn format_row(fields: &[&str]) -> String {
    fields
        .iter()
        .map(|f| {
            if f.contains(',') || f.contains('"') {
                format!("\"{}\"", f.replace('"', "\"\""))
            } else {
                (*f).to_string()
            }
        })
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_plain_and_quoted() {
        assert_eq!(split_line("a,b,c"), vec!["a", "b", "c"]);
        assert_eq!(
            split_line(r#""Adobe Acrobat, Reader",23.008.20458"#),
            vec!["Adobe Acrobat, Reader", "23.008.20458"]
        );
        assert_eq!(split_line(r#""say ""hi""",x"#), vec![r#"say "hi""#, "x"]);
    }

    #[test]
    fn test_split_trims_and_keeps_empty_fields() {
        assert_eq!(split_line(" a , , b "), vec!["a", "", "b"]);
        assert_eq!(split_line("only"), vec!["only"]);
    }

    #[test]
    fn test_table_header_lookup() {
        let table = Table::parse("title,min_version\nGoogle Chrome,129.0\n\nFirefox,\n");
        assert_eq!(table.column("title"), Some(0));
        assert_eq!(table.column("min_version"), Some(1));
        assert_eq!(table.column("nope"), None);
        assert_eq!(table.rows.len(), 2);

        let first = &table.rows[0];
        assert_eq!(table.cell(first, 0), "Google Chrome");
        let second = &table.rows[1];
        assert_eq!(table.cell(second, 1), "");
        assert_eq!(table.cell(second, 9), "");
    }

    #[test]
    fn test_format_row_round_trips_awkward_fields() {
        let line = format_row(&["Adobe Acrobat, Reader", r#"a "b""#, "plain"]);
        assert_eq!(
            split_line(&line),
            vec!["Adobe Acrobat, Reader", r#"a "b""#, "plain"]
        );
    }
}
