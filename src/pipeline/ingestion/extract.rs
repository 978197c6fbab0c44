use std::fs::{self, File};
use std::path::Path;
use tracing::{info, instrument};
use zip::ZipArchive;

use crate::error::Result;
use crate::observability::metrics;

/// Extracts every entry of `zip_path` into a fresh `out_dir`; leftovers from
/// an earlier run are removed first. Entries whose names would escape
/// `out_dir` are rejected by the zip reader.
#[instrument(fields(zip = %zip_path.display(), out = %out_dir.display()))]
pub fn extract_archive(zip_path: &Path, out_dir: &Path) -> Result<usize> {
    if out_dir.exists() {
        fs::remove_dir_all(out_dir)?;
    }
    fs::create_dir_all(out_dir)?;
    let mut archive = ZipArchive::new(File::open(zip_path)?)?;
    let entries = archive.len();
    archive.extract(out_dir)?;
    info!("Extracted {} entries into {}", entries, out_dir.display());
    metrics::ingest::archive_extracted();
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;
    use zip::write::FileOptions;
    use zip::ZipWriter;

    #[test]
    fn test_extracts_nested_entries() {
        let dir = TempDir::new().unwrap();
        let zip_path = dir.path().join("1T2025.zip");
        let mut zip = ZipWriter::new(File::create(&zip_path).unwrap());
        let options: FileOptions<'_, ()> = FileOptions::default();
        zip.start_file("1T2025.csv", options.clone()).unwrap();
        zip.write_all(b"REG_ANS;CD_CONTA_CONTABIL;VL_SALDO_FINAL\n").unwrap();
        zip.start_file("sub/leiame.txt", options).unwrap();
        zip.write_all(b"ok").unwrap();
        zip.finish().unwrap();

        let out = dir.path().join("extract_1T2025");
        assert_eq!(extract_archive(&zip_path, &out).unwrap(), 2);
        assert!(out.join("1T2025.csv").is_file());
        assert_eq!(fs::read_to_string(out.join("sub").join("leiame.txt")).unwrap(), "ok");
    }

    #[test]
    fn test_reextraction_drops_stale_files() {
        let dir = TempDir::new().unwrap();
        let zip_path = dir.path().join("2T2025.zip");
        let mut zip = ZipWriter::new(File::create(&zip_path).unwrap());
        let options: FileOptions<'_, ()> = FileOptions::default();
        zip.start_file("despesas.csv", options).unwrap();
        zip.write_all(b"CNPJ;Valor\n").unwrap();
        zip.finish().unwrap();

        let out = dir.path().join("extract_2T2025");
        fs::create_dir_all(&out).unwrap();
        fs::write(out.join("stale.csv"), "old").unwrap();

        assert_eq!(extract_archive(&zip_path, &out).unwrap(), 1);
        assert!(!out.join("stale.csv").exists());
        assert!(out.join("despesas.csv").is_file());
    }

    #[test]
    fn test_corrupt_archive_is_an_error() {
        let dir = TempDir::new().unwrap();
        let zip_path = dir.path().join("broken.zip");
        fs::write(&zip_path, b"not a zip").unwrap();
        assert!(extract_archive(&zip_path, &dir.path().join("out")).is_err());
    }
}
