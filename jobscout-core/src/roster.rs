// Company roster: first column of a spreadsheet, a CSV/TSV export or a
// plain list of names

use crate::error::{Result, ScoutError};
use calamine::{Data, Reader, open_workbook_auto};
use std::fs;
use std::path::Path;

const SPREADSHEET_EXTENSIONS: &[&str] = &["xlsx", "xlsm", "xlsb", "xls", "ods"];

/// How a roster file is laid out, chosen from its extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RosterFormat {
    /// First column of the first sheet.
    Spreadsheet,
    /// First field of each line, split on `,` or `;`.
    Csv,
    /// First field of each line, split on tabs.
    Tsv,
    /// One name per line. Commas are part of the name.
    Lines,
}

impl RosterFormat {
    pub fn from_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();

        match ext.as_str() {
            "csv" => RosterFormat::Csv,
            "tsv" | "tab" => RosterFormat::Tsv,
            e if SPREADSHEET_EXTENSIONS.contains(&e) => RosterFormat::Spreadsheet,
            _ => RosterFormat::Lines,
        }
    }

    fn delimiters(&self) -> &'static [char] {
        match self {
            RosterFormat::Csv => &[',', ';'],
            RosterFormat::Tsv => &['\t'],
            RosterFormat::Spreadsheet | RosterFormat::Lines => &[],
        }
    }
}

/// Load company names from `path`, in file order.
pub fn load_roster(path: &Path, has_header: bool) -> Result<Vec<String>> {
    let format = RosterFormat::from_path(path);
    let names = match format {
        RosterFormat::Spreadsheet => read_spreadsheet(path, has_header)?,
        _ => {
            let content = fs::read_to_string(path).map_err(|e| {
                ScoutError::Roster(format!("Failed to read roster {}: {}", path.display(), e))
            })?;
            parse_roster(&content, format, has_header)
        }
    };

    if names.is_empty() {
        return Err(ScoutError::Roster(format!(
            "No company names found in {}",
            path.display()
        )));
    }

    Ok(names)
}

pub fn parse_roster(content: &str, format: RosterFormat, has_header: bool) -> Vec<String> {
    let content = content.trim_start_matches('\u{feff}');
    let mut lines = content.lines().filter(|line| !line.trim().is_empty());
    if has_header {
        lines.next();
    }
    lines
        .filter_map(|line| first_field(line, format.delimiters()))
        .collect()
}

/// First column of the first sheet. The header is the first row of the
/// used range; rows with an empty first cell are dropped.
fn read_spreadsheet(path: &Path, has_header: bool) -> Result<Vec<String>> {
    let roster_error =
        |e: calamine::Error| ScoutError::Roster(format!("Failed to read roster {}: {}", path.display(), e));

    let mut workbook = open_workbook_auto(path).map_err(roster_error)?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| ScoutError::Roster(format!("No sheets in {}", path.display())))?
        .map_err(roster_error)?;

    let skip = usize::from(has_header);
    Ok(range
        .rows()
        .skip(skip)
        .filter_map(|row| row.first().and_then(cell_text))
        .collect())
}

fn cell_text(cell: &Data) -> Option<String> {
    let text = match cell {
        Data::Empty | Data::Error(_) => return None,
        Data::String(s) => s.trim().to_string(),
        other => other.to_string().trim().to_string(),
    };
    if text.is_empty() { None } else { Some(text) }
}

/// First field of a line. Handles double-quoted fields with `""` escapes;
/// the field ends at whichever of `delimiters` comes first. With no
/// delimiters the whole line is the field.
pub fn first_field(line: &str, delimiters: &[char]) -> Option<String> {
    let line = line.trim();

    let field = if let Some(rest) = line.strip_prefix('"') {
        let mut field = String::new();
        let mut chars = rest.chars().peekable();
        while let Some(c) = chars.next() {
            if c == '"' {
                if chars.peek() == Some(&'"') {
                    field.push('"');
                    chars.next();
                } else {
                    break;
                }
            } else {
                field.push(c);
            }
        }
        field
    } else {
        let end = line.find(delimiters).unwrap_or(line.len());
        line[..end].to_string()
    };

    let field = field.trim();
    if field.is_empty() {
        None
    } else {
        Some(field.to_string())
    }
}
