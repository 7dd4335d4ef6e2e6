//! The export pipeline: rasterizes rendered receipts and writes a PNG, or a zip archive of PNGs,
//! into the output directory.
//!
//! Nothing is written unless the whole export succeeded.

mod raster;

use crate::error::ReceiptError;
use crate::model::ReceiptRecord;
use crate::render::RenderedDocument;
use crate::{utils, Result};
use anyhow::Context;
use chrono::NaiveDate;
use std::collections::HashMap;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

pub use raster::{Rasterizer, SvgRasterizer};

/// Pixel ratio for a single receipt download.
pub const SINGLE_PIXEL_RATIO: f32 = 3.0;

/// Pixel ratio for each receipt in a batch archive.
pub const BATCH_PIXEL_RATIO: f32 = 2.0;

/// Writes exports into `out_dir`.
pub struct Exporter {
    rasterizer: Box<dyn Rasterizer>,
    out_dir: PathBuf,
}

impl std::fmt::Debug for Exporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Exporter")
            .field("out_dir", &self.out_dir)
            .finish_non_exhaustive()
    }
}

impl Exporter {
    pub fn new(rasterizer: impl Rasterizer + 'static, out_dir: impl Into<PathBuf>) -> Self {
        Self {
            rasterizer: Box::new(rasterizer),
            out_dir: out_dir.into(),
        }
    }

    pub fn out_dir(&self) -> &Path {
        &self.out_dir
    }

    /// Rasterizes one receipt at `SINGLE_PIXEL_RATIO` and writes
    /// `Tuition_Receipt-<studentName>.png`. Returns the path written.
    pub async fn export_single(
        &self,
        document: &RenderedDocument,
        record: &ReceiptRecord,
    ) -> std::result::Result<PathBuf, ReceiptError> {
        let path = self.out_dir.join(single_file_name(&record.student_name));
        self.write_single(document, &path)
            .await
            .map_err(|e| export_error("Failed to create the receipt image", e))?;
        info!("Wrote {}", path.display());
        Ok(path)
    }

    async fn write_single(&self, document: &RenderedDocument, path: &Path) -> Result<()> {
        let png = self
            .rasterizer
            .rasterize(document, SINGLE_PIXEL_RATIO)
            .await?;
        utils::write(path, png).await
    }

    /// Rasterizes every receipt in order at `BATCH_PIXEL_RATIO`, bundles them into a zip archive
    /// and writes `Tuition_Receipts_Batch_<date>.zip`. Returns the path written.
    ///
    /// `documents` and `records` are paired by position. If any step fails, nothing is written.
    pub async fn export_batch(
        &self,
        documents: &[RenderedDocument],
        records: &[ReceiptRecord],
        today: NaiveDate,
    ) -> std::result::Result<PathBuf, ReceiptError> {
        if records.is_empty() {
            return Err(ReceiptError::NothingToExport);
        }
        if documents.len() != records.len() {
            error!(
                "Cannot export {} rendered documents for {} receipts",
                documents.len(),
                records.len()
            );
            return Err(ReceiptError::Export(
                "the rendered receipts do not match the receipt list".to_string(),
            ));
        }
        let path = self.out_dir.join(batch_file_name(today));
        self.write_batch(documents, records, &path)
            .await
            .map_err(|e| export_error("Failed to create the batch archive", e))?;
        info!("Wrote {} receipts to {}", records.len(), path.display());
        Ok(path)
    }

    async fn write_batch(
        &self,
        documents: &[RenderedDocument],
        records: &[ReceiptRecord],
        path: &Path,
    ) -> Result<()> {
        let mut entries = Vec::with_capacity(records.len());
        let mut names = EntryNames::default();
        for (document, record) in documents.iter().zip(records) {
            let name = names.unique(batch_entry_name(record));
            debug!("Rasterizing {name}");
            let png = self
                .rasterizer
                .rasterize(document, BATCH_PIXEL_RATIO)
                .await
                .with_context(|| format!("Unable to rasterize {name}"))?;
            entries.push((name, png));
        }
        let archive = build_archive(&entries)?;
        utils::write(path, archive).await
    }
}

fn export_error(what: &str, e: anyhow::Error) -> ReceiptError {
    error!("{what}: {e:#}");
    ReceiptError::Export(e.to_string())
}

/// `Tuition_Receipt-<studentName>.png`, or `Tuition_Receipt-receipt.png` for an empty name.
pub fn single_file_name(student_name: &str) -> String {
    let name = underscored(student_name);
    let name = if name.is_empty() { "receipt" } else { &name };
    sanitize(&format!("Tuition_Receipt-{name}.png"))
}

/// `Tuition_Receipt_<studentName>_<receiptNo>.png`.
pub fn batch_entry_name(record: &ReceiptRecord) -> String {
    sanitize(&format!(
        "Tuition_Receipt_{}_{}.png",
        underscored(&record.student_name),
        underscored(&record.receipt_no)
    ))
}

/// `Tuition_Receipts_Batch_<YYYY-MM-DD>.zip`.
pub fn batch_file_name(today: NaiveDate) -> String {
    format!("Tuition_Receipts_Batch_{}.zip", today.format("%Y-%m-%d"))
}

fn underscored(s: &str) -> String {
    s.trim()
        .chars()
        .map(|c| if c.is_whitespace() { '_' } else { c })
        .collect()
}

fn sanitize(name: &str) -> String {
    sanitize_filename::sanitize_with_options(
        name,
        sanitize_filename::Options {
            replacement: "_",
            ..Default::default()
        },
    )
}

/// Hands out archive entry names, suffixing repeats with `_<n>` before the extension.
#[derive(Debug, Default)]
struct EntryNames {
    seen: HashMap<String, usize>,
}

impl EntryNames {
    fn unique(&mut self, name: String) -> String {
        let count = self.seen.entry(name.clone()).or_insert(0);
        *count += 1;
        if *count == 1 {
            return name;
        }
        let n = *count;
        let candidate = match name.rsplit_once('.') {
            Some((stem, ext)) => format!("{stem}_{n}.{ext}"),
            None => format!("{name}_{n}"),
        };
        // A suffixed name can itself collide with a later original.
        self.unique(candidate)
    }
}

/// Builds an in-memory zip archive of `(name, bytes)` entries.
fn build_archive(entries: &[(String, Vec<u8>)]) -> Result<Vec<u8>> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    for (name, bytes) in entries {
        zip.start_file(name.as_str(), options)
            .with_context(|| format!("Unable to add {name} to the archive"))?;
        zip.write_all(bytes)
            .with_context(|| format!("Unable to write {name} to the archive"))?;
    }
    let cursor = zip.finish().context("Unable to finish the archive")?;
    Ok(cursor.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SchoolInfo;
    use anyhow::bail;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tempfile::TempDir;
    use zip::ZipArchive;

    /// Returns fake PNG bytes, optionally failing on the n-th call.
    struct FakeRasterizer {
        fail_on: Option<usize>,
        calls: Arc<AtomicUsize>,
        ratios: Arc<std::sync::Mutex<Vec<f32>>>,
    }

    impl FakeRasterizer {
        fn new(fail_on: Option<usize>) -> Self {
            Self {
                fail_on,
                calls: Arc::new(AtomicUsize::new(0)),
                ratios: Arc::new(std::sync::Mutex::new(Vec::new())),
            }
        }
    }

    #[async_trait::async_trait]
    impl Rasterizer for FakeRasterizer {
        async fn rasterize(&self, _: &RenderedDocument, pixel_ratio: f32) -> Result<Vec<u8>> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            self.ratios.lock().unwrap().push(pixel_ratio);
            if self.fail_on == Some(call) {
                bail!("boom");
            }
            Ok(b"\x89PNG fake".to_vec())
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 18).unwrap()
    }

    fn record(name: &str, receipt_no: &str) -> ReceiptRecord {
        let mut r = ReceiptRecord::initial(&SchoolInfo::new("A", "P"), today());
        r.student_name = name.to_string();
        r.receipt_no = receipt_no.to_string();
        r
    }

    fn documents(records: &[ReceiptRecord]) -> Vec<RenderedDocument> {
        records
            .iter()
            .map(|r| crate::render::render(r, None, None))
            .collect()
    }

    #[test]
    fn test_file_names() {
        assert_eq!(
            single_file_name("Sok Nea"),
            "Tuition_Receipt-Sok_Nea.png"
        );
        assert_eq!(single_file_name("  "), "Tuition_Receipt-receipt.png");
        assert_eq!(
            batch_entry_name(&record("Bora Chan", "R12345")),
            "Tuition_Receipt_Bora_Chan_R12345.png"
        );
        assert_eq!(
            batch_file_name(today()),
            "Tuition_Receipts_Batch_2026-10-18.zip"
        );
    }

    #[test]
    fn test_file_names_cannot_escape_directory() {
        let name = single_file_name("../../etc/passwd");
        assert!(!name.contains('/'));
    }

    #[test]
    fn test_entry_names_are_unique() {
        let mut names = EntryNames::default();
        assert_eq!(names.unique("a.png".to_string()), "a.png");
        assert_eq!(names.unique("a.png".to_string()), "a_2.png");
        assert_eq!(names.unique("a_2.png".to_string()), "a_2_2.png");
        assert_eq!(names.unique("a.png".to_string()), "a_3.png");
    }

    #[tokio::test]
    async fn test_export_single() {
        let dir = TempDir::new().unwrap();
        let rasterizer = FakeRasterizer::new(None);
        let ratios = rasterizer.ratios.clone();
        let exporter = Exporter::new(rasterizer, dir.path());
        let record = record("Sok Nea", "R1");
        let document = crate::render::render(&record, None, None);

        let path = exporter.export_single(&document, &record).await.unwrap();

        assert_eq!(path, dir.path().join("Tuition_Receipt-Sok_Nea.png"));
        assert!(path.is_file());
        assert_eq!(*ratios.lock().unwrap(), vec![SINGLE_PIXEL_RATIO]);
    }

    #[tokio::test]
    async fn test_export_single_failure_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let exporter = Exporter::new(FakeRasterizer::new(Some(0)), dir.path());
        let record = record("Sok Nea", "R1");
        let document = crate::render::render(&record, None, None);
        let err = exporter.export_single(&document, &record).await.unwrap_err();
        assert!(matches!(err, ReceiptError::Export(_)));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_export_batch_of_three() {
        let dir = TempDir::new().unwrap();
        let rasterizer = FakeRasterizer::new(None);
        let ratios = rasterizer.ratios.clone();
        let exporter = Exporter::new(rasterizer, dir.path());
        let records = vec![
            record("Sok Nea", "R10001"),
            record("Bora Chan", "R10002"),
            record("Ananya Rao", "R10003"),
        ];

        let path = exporter
            .export_batch(&documents(&records), &records, today())
            .await
            .unwrap();

        assert_eq!(
            path,
            dir.path().join("Tuition_Receipts_Batch_2026-10-18.zip")
        );
        let bytes = std::fs::read(&path).unwrap();
        let archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
        assert_eq!(archive.len(), 3);
        let mut names: Vec<&str> = archive.file_names().collect();
        names.sort();
        assert_eq!(
            names,
            vec![
                "Tuition_Receipt_Ananya_Rao_R10003.png",
                "Tuition_Receipt_Bora_Chan_R10002.png",
                "Tuition_Receipt_Sok_Nea_R10001.png",
            ]
        );
        assert_eq!(*ratios.lock().unwrap(), vec![BATCH_PIXEL_RATIO; 3]);
    }

    #[tokio::test]
    async fn test_export_batch_duplicate_names() {
        let dir = TempDir::new().unwrap();
        let exporter = Exporter::new(FakeRasterizer::new(None), dir.path());
        let records = vec![record("Same", "R1"), record("Same", "R1")];
        let path = exporter
            .export_batch(&documents(&records), &records, today())
            .await
            .unwrap();
        let archive = ZipArchive::new(Cursor::new(std::fs::read(&path).unwrap())).unwrap();
        assert_eq!(archive.len(), 2);
    }

    #[tokio::test]
    async fn test_export_batch_failure_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let rasterizer = FakeRasterizer::new(Some(1));
        let calls = rasterizer.calls.clone();
        let exporter = Exporter::new(rasterizer, dir.path());
        let records = vec![record("A", "R1"), record("B", "R2"), record("C", "R3")];

        let err = exporter
            .export_batch(&documents(&records), &records, today())
            .await
            .unwrap_err();

        assert!(matches!(err, ReceiptError::Export(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_export_batch_rejects_empty_and_mismatched() {
        let dir = TempDir::new().unwrap();
        let exporter = Exporter::new(FakeRasterizer::new(None), dir.path());
        assert_eq!(
            exporter.export_batch(&[], &[], today()).await.unwrap_err(),
            ReceiptError::NothingToExport
        );
        let records = vec![record("A", "R1"), record("B", "R2")];
        let docs = documents(&records[..1]);
        assert!(matches!(
            exporter.export_batch(&docs, &records, today()).await,
            Err(ReceiptError::Export(_))
        ));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
