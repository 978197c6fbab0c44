use calamine::{open_workbook_auto, Data, Range, Reader};
use std::path::Path;
use tracing::{debug, warn};

use crate::error::Result;
use crate::pipeline::processing::table::Table;

fn first_sheet(path: &Path) -> Result<Option<Range<Data>>> {
    let mut workbook = open_workbook_auto(path)?;
    match workbook.worksheet_range_at(0) {
        Some(range) => Ok(Some(range?)),
        None => Ok(None),
    }
}

/// First row of the first sheet, cells joined with a space. Unreadable
/// workbooks yield an empty string.
pub fn first_row_text(path: &Path) -> String {
    match first_sheet(path) {
        Ok(Some(range)) => range
            .rows()
            .next()
            .map(|row| row.iter().map(|c| c.to_string()).collect::<Vec<_>>().join(" "))
            .unwrap_or_default(),
        Ok(None) => {
            debug!("{} has no sheets", path.display());
            String::new()
        }
        Err(e) => {
            warn!("Could not read spreadsheet {}: {}", path.display(), e);
            String::new()
        }
    }
}

/// The first sheet as a table (first row is the header).
pub fn read_first_sheet(path: &Path) -> Result<Option<Table>> {
    let Some(range) = first_sheet(path)? else {
        return Ok(None);
    };
    let mut rows = range
        .rows()
        .map(|row| row.iter().map(|c| c.to_string()).collect::<Vec<String>>());
    let Some(headers) = rows.next() else {
        return Ok(None);
    };
    let headers = headers.into_iter().map(|h| h.trim().to_string()).collect();
    Ok(Some(Table { headers, rows: rows.collect() }))
}


#[cfg(test)]
mod tests {
    use super::fixtures::{write_workbook, Cell};
    use super::*;
    use std::io::Write;
    use tempfile::{Builder, TempDir};

    #[test]
    fn test_unreadable_workbook_degrades_to_empty_line() {
        let mut file = Builder::new().suffix(".xlsx").tempfile().unwrap();
        file.write_all(b"definitely not a workbook").unwrap();
        assert_eq!(first_row_text(file.path()), "");
        assert!(read_first_sheet(file.path()).is_err());
    }

    #[test]
    fn test_first_row_is_flattened_with_spaces() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("planilha.xlsx");
        write_workbook(
            &path,
            &[
                vec![Cell::Text("CNPJ"), Cell::Text("Despesas com Eventos")],
                vec![Cell::Text("11222333000181"), Cell::Number(10.5)],
            ],
        );
        assert_eq!(first_row_text(&path), "CNPJ Despesas com Eventos");
    }

    #[test]
    fn test_first_sheet_becomes_a_table() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("planilha.xlsx");
        write_workbook(
            &path,
            &[
                vec![Cell::Text(" CNPJ "), Cell::Text("Valor")],
                vec![Cell::Text("11222333000181"), Cell::Number(1500.5)],
            ],
        );
        let table = read_first_sheet(&path).unwrap().unwrap();
        assert_eq!(table.headers, vec!["CNPJ", "Valor"]);
        assert_eq!(table.rows, vec![vec!["11222333000181".to_string(), "1500.5".to_string()]]);
        assert_eq!(table.header_line(';'), "CNPJ;Valor");
    }
}
