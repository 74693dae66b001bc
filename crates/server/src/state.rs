use std::sync::Arc;

use expensa_core::CurrencyCode;
use expensa_ocr::{Extractor, OcrBackend, ReceiptPipeline};
use expensa_storage::DbPool;

use crate::config::{OcrConfig, ServerConfig};

pub struct AppState {
    pub pool: DbPool,
    pub pipeline: ReceiptPipeline<dyn OcrBackend>,
    pub default_currency: CurrencyCode,
}

impl AppState {
    pub fn new(pool: DbPool, config: &ServerConfig) -> Arc<Self> {
        Self::with_recognizer(pool, recognizer(&config.ocr), config)
    }

    pub fn with_recognizer(
        pool: DbPool,
        recognizer: Arc<dyn OcrBackend>,
        config: &ServerConfig,
    ) -> Arc<Self> {
        let extractor = Extractor::with_config(config.extraction.clone());
        Arc::new(Self {
            pool,
            pipeline: ReceiptPipeline::new(recognizer, extractor, config.uploads_dir.clone()),
            default_currency: config.extraction.default_currency.clone(),
        })
    }
}

#[cfg(feature = "tesseract")]
fn recognizer(ocr: &OcrConfig) -> Arc<dyn OcrBackend> {
    use expensa_ocr::recognizer::tesseract_backend::TesseractRecognizer;
    Arc::new(TesseractRecognizer::new(ocr.tessdata_path.clone(), &ocr.language))
}

#[cfg(not(feature = "tesseract"))]
fn recognizer(ocr: &OcrConfig) -> Arc<dyn OcrBackend> {
    tracing::warn!(
        language = %ocr.language,
        "built without the `tesseract` feature; receipt processing will fail"
    );
    Arc::new(expensa_ocr::UnavailableRecognizer)
}
