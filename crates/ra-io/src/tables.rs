use std::fs::File;
use std::path::Path;

use anyhow::{Context, Result};
use csv::{ReaderBuilder, Trim, WriterBuilder};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Read every row of a headered CSV table.
///
/// Row numbers in error messages are 1-based file lines (the header is line 1).
pub fn read_table<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .trim(Trim::All)
        .from_reader(file);
    let mut rows = Vec::new();
    for (idx, result) in rdr.deserialize().enumerate() {
        let row: T =
            result.with_context(|| format!("parsing {} line {}", path.display(), idx + 2))?;
        rows.push(row);
    }
    tracing::debug!(path = %path.display(), rows = rows.len(), "read table");
    Ok(rows)
}

/// Write rows to a CSV table, replacing any existing file.
pub fn write_table<T: Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    let mut wtr = WriterBuilder::new()
        .has_headers(true)
        .from_path(path)
        .with_context(|| format!("creating CSV writer for {}", path.display()))?;
    for row in rows {
        wtr.serialize(row)
            .with_context(|| format!("writing record to {}", path.display()))?;
    }
    wtr.flush()
        .with_context(|| format!("flushing {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use std::fs;
    use tempfile::tempdir;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Row {
        name: String,
        weight: f64,
        tag: Option<u32>,
    }

    #[test]
    fn writes_and_reads_rows() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("rows.csv");
        let rows = vec![
            Row {
                name: "a".into(),
                weight: 0.5,
                tag: None,
            },
            Row {
                name: "b".into(),
                weight: 1.5,
                tag: Some(3),
            },
        ];
        write_table(&path, &rows).unwrap();
        let back: Vec<Row> = read_table(&path).unwrap();
        assert_eq!(back, rows);
    }

    #[test]
    fn parse_errors_name_the_line() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.csv");
        fs::write(&path, "name,weight,tag\na,1.0,\nb,oops,\n").unwrap();
        let err = read_table::<Row>(&path).unwrap_err();
        assert!(format!("{err:#}").contains("line 3"));
    }
}
