use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

use crate::extract::Extractor;
use crate::hash;
use crate::preprocess;
use crate::recognizer::{OcrBackend, OcrError};
use crate::types::ExtractedRecord;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Image preprocessing failed: {0}")]
    Preprocess(#[from] crate::preprocess::PreprocessError),
    #[error("OCR recognition failed: {0}")]
    Ocr(#[from] OcrError),
    #[error("OCR worker failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// The result of a single receipt processing run.
#[derive(Debug)]
pub struct ProcessedReceipt {
    /// SHA-256 hex digest of the original file — used as the content-addressed key.
    pub hash_hex: String,
    /// Where the original file was stored.
    pub attachment_path: PathBuf,
    /// Public URL of the stored original (`/uploads/...`).
    pub receipt_url: String,
    /// Raw OCR text output.
    pub ocr_text: String,
    /// Structured fields extracted from the OCR text.
    pub record: ExtractedRecord,
}

/// Orchestrates: hash → content-store → preprocess → OCR → extract.
pub struct ReceiptPipeline<R: OcrBackend + ?Sized> {
    recognizer: Arc<R>,
    extractor: Extractor,
    uploads_dir: PathBuf,
}

impl<R: OcrBackend + ?Sized + 'static> ReceiptPipeline<R> {
    pub fn new(recognizer: Arc<R>, extractor: Extractor, uploads_dir: PathBuf) -> Self {
        Self { recognizer, extractor, uploads_dir }
    }

    pub fn uploads_dir(&self) -> &Path {
        &self.uploads_dir
    }

    pub fn extractor(&self) -> &Extractor {
        &self.extractor
    }

    /// Process a file on disk.
    pub async fn process_file(&self, path: &Path) -> Result<ProcessedReceipt, PipelineError> {
        let bytes = tokio::fs::read(path).await?;
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("bin");
        self.process_bytes(bytes, ext).await
    }

    /// Process raw bytes of an uploaded image.
    pub async fn process_bytes(
        &self,
        data: Vec<u8>,
        ext: &str,
    ) -> Result<ProcessedReceipt, PipelineError> {
        let ext = hash::sanitize_extension(ext);

        // 1. Hash for content addressing.
        let hash_hex = hash::to_hex(&hash::sha256_bytes(&data));

        // 2. Persist the original.
        let dest = hash::attachment_path(&self.uploads_dir, &hash_hex, &ext);
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&dest, &data).await?;

        // 3–4. Preprocess and OCR are CPU-bound; keep them off the async workers.
        let recognizer = Arc::clone(&self.recognizer);
        let ocr_text = tokio::task::spawn_blocking(move || -> Result<String, PipelineError> {
            let image_bytes = preprocess::prepare_for_ocr_from_bytes(&data)?;
            Ok(recognizer.recognize(&image_bytes)?)
        })
        .await??;
        debug!(hash = %hash_hex, text = %ocr_text, "raw OCR text");

        // 5. Extract structured fields.
        let record = self.extractor.extract(&ocr_text);
        debug!(hash = %hash_hex, ?record, "parsed receipt");

        Ok(ProcessedReceipt {
            receipt_url: hash::receipt_url(&hash_hex, &ext),
            hash_hex,
            attachment_path: dest,
            ocr_text,
            record,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recognizer::{MockRecognizer, UnavailableRecognizer};
    use image::{DynamicImage, GrayImage, ImageBuffer, Luma};
    use std::io::Cursor;

    fn tiny_png() -> Vec<u8> {
        let img: GrayImage = ImageBuffer::from_fn(4, 4, |_, _| Luma([200u8]));
        let mut buf = Vec::new();
        DynamicImage::ImageLuma8(img)
            .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
            .unwrap();
        buf
    }

    fn pipeline<R: OcrBackend + 'static>(recognizer: R, dir: &Path) -> ReceiptPipeline<R> {
        ReceiptPipeline::new(Arc::new(recognizer), Extractor::new(), dir.to_path_buf())
    }

    #[tokio::test]
    async fn process_bytes_produces_record() {
        let dir = tempfile::tempdir().unwrap();
        let p = pipeline(
            MockRecognizer::new("Acme Enterprises\n15 March 2023\nTotal: USD 42"),
            dir.path(),
        );

        let result = p.process_bytes(tiny_png(), "PNG").await.unwrap();

        assert_eq!(result.hash_hex.len(), 64);
        assert!(result.attachment_path.exists());
        assert!(result.receipt_url.starts_with("/uploads/"));
        assert!(result.receipt_url.ends_with(".png"));
        assert_eq!(result.record.amount.to_string(), "42.00");
        assert_eq!(result.record.merchant, "Acme Enterprises");
        assert_eq!(result.record.date.to_string(), "2023-03-15");
    }

    #[tokio::test]
    async fn same_bytes_same_location() {
        let dir = tempfile::tempdir().unwrap();
        let p = pipeline(MockRecognizer::new("irrelevant"), dir.path());

        let r1 = p.process_bytes(tiny_png(), "png").await.unwrap();
        let r2 = p.process_bytes(tiny_png(), "png").await.unwrap();

        assert_eq!(r1.hash_hex, r2.hash_hex);
        assert_eq!(r1.attachment_path, r2.attachment_path);
    }

    #[tokio::test]
    async fn process_file_reads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("scan.png");
        std::fs::write(&src, tiny_png()).unwrap();
        let p = pipeline(MockRecognizer::new("Total: 7"), &dir.path().join("uploads"));

        let result = p.process_file(&src).await.unwrap();
        assert_eq!(result.record.amount.to_string(), "7.00");
        assert!(result.attachment_path.starts_with(dir.path().join("uploads")));
    }

    #[tokio::test]
    async fn undecodable_image_is_a_preprocess_error() {
        let dir = tempfile::tempdir().unwrap();
        let p = pipeline(MockRecognizer::new("x"), dir.path());
        let err = p.process_bytes(b"not an image".to_vec(), "jpg").await.unwrap_err();
        assert!(matches!(err, PipelineError::Preprocess(_)));
    }

    #[tokio::test]
    async fn missing_engine_is_an_ocr_error() {
        let dir = tempfile::tempdir().unwrap();
        let p = pipeline(UnavailableRecognizer, dir.path());
        let err = p.process_bytes(tiny_png(), "png").await.unwrap_err();
        assert!(matches!(err, PipelineError::Ocr(OcrError::NotAvailable)));
    }

    #[tokio::test]
    async fn works_with_trait_objects() {
        let dir = tempfile::tempdir().unwrap();
        let backend: Arc<dyn OcrBackend> = Arc::new(MockRecognizer::new("EUR 3.10"));
        let p = ReceiptPipeline::new(backend, Extractor::new(), dir.path().to_path_buf());
        let result = p.process_bytes(tiny_png(), "png").await.unwrap();
        assert_eq!(result.record.currency.as_str(), "EUR");
    }
}
