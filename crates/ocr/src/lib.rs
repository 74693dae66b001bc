pub mod extract;
pub mod hash;
pub mod pipeline;
pub mod preprocess;
pub mod recognizer;
pub mod types;

pub use extract::{ExtractionConfig, Extractor, LastTaggedAmountWins};
pub use hash::{attachment_path, receipt_url, sha256_bytes, to_hex};
pub use pipeline::{PipelineError, ProcessedReceipt, ReceiptPipeline};
pub use preprocess::{prepare_for_ocr, prepare_for_ocr_from_bytes, PreprocessError};
pub use recognizer::{MockRecognizer, OcrBackend, OcrError, UnavailableRecognizer};
pub use types::{
    Candidate, ExtractedField, ExtractedRecord, FieldSource, RawDocument, RecordField,
    NO_DESCRIPTION, UNKNOWN_MERCHANT,
};
