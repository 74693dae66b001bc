use std::path::Path;
use std::sync::Arc;

use axum::extract::multipart::MultipartRejection;
use axum::extract::rejection::JsonRejection;
use axum::extract::{DefaultBodyLimit, Multipart, Path as UrlPath, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::NaiveDate;
use expensa_core::{Amount, CurrencyCode, Expense, NewExpense};
use expensa_ocr::ExtractedRecord;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::error::ApiError;
use crate::state::AppState;

/// Multipart field that carries the receipt image.
pub const RECEIPT_FIELD: &str = "receipt";

/// Stored when a submitted expense has no description.
pub const SUBMITTED_WITHOUT_DESCRIPTION: &str = "No description";

pub fn router(state: Arc<AppState>, max_upload_bytes: usize) -> Router {
    let uploads = state.pipeline.uploads_dir().to_path_buf();
    Router::new()
        .route("/health", get(health))
        .route("/api/process-receipt", post(process_receipt))
        .route("/api/submit-receipt", post(submit_receipt))
        .route("/api/expenses/{id}", get(get_expense))
        .nest_service("/uploads", ServeDir::new(uploads))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(max_upload_bytes))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub success: bool,
    pub data: T,
}

impl<T> Envelope<T> {
    fn ok(data: T) -> Json<Self> {
        Json(Self { success: true, data })
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessedReceiptData {
    #[serde(flatten)]
    pub record: ExtractedRecord,
    pub receipt_url: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitReceiptRequest {
    /// Either a string (`"12.50"`) or a JSON number.
    pub amount: Option<Value>,
    pub date: Option<String>,
    pub description: Option<String>,
    pub merchant: Option<String>,
    pub receipt_url: Option<String>,
    pub currency: Option<String>,
    pub category: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitReceiptResponse {
    pub success: bool,
    pub message: &'static str,
    pub expense_id: String,
}

async fn health() -> &'static str {
    "ok"
}

async fn process_receipt(
    State(state): State<Arc<AppState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<Envelope<ProcessedReceiptData>>, ApiError> {
    let mut multipart = multipart.map_err(|_| ApiError::bad_request("No file uploaded"))?;

    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("Invalid upload: {e}")))?
    {
        if field.name() != Some(RECEIPT_FIELD) {
            continue;
        }
        let ext = upload_extension(field.file_name(), field.content_type());
        let data = field
            .bytes()
            .await
            .map_err(|e| ApiError::bad_request(format!("Invalid upload: {e}")))?;
        if !data.is_empty() {
            upload = Some((data, ext));
        }
        break;
    }

    let (data, ext) = upload.ok_or_else(|| ApiError::bad_request("No file uploaded"))?;

    let processed = state
        .pipeline
        .process_bytes(data.to_vec(), &ext)
        .await
        .map_err(|e| {
            warn!(error = %e, "receipt processing failed");
            ApiError::internal(format!("Failed to process receipt: {e}"))
        })?;

    info!(
        hash = %processed.hash_hex,
        amount = %processed.record.amount,
        merchant = %processed.record.merchant,
        "receipt processed"
    );

    Ok(Envelope::ok(ProcessedReceiptData {
        record: processed.record,
        receipt_url: processed.receipt_url,
    }))
}

async fn submit_receipt(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<SubmitReceiptRequest>, JsonRejection>,
) -> Result<Json<SubmitReceiptResponse>, ApiError> {
    let Json(req) = payload.map_err(|e| ApiError::bad_request(e.body_text()))?;
    let new = new_expense_from_request(req, &state.default_currency)?;

    let expense = expensa_storage::insert_expense(&state.pool, &new)
        .await
        .map_err(|e| {
            error!(error = %e, "failed to save receipt");
            ApiError::internal("Failed to save receipt")
        })?;

    info!(id = %expense.id, amount = %expense.amount, merchant = %expense.merchant, "expense stored");

    Ok(Json(SubmitReceiptResponse {
        success: true,
        message: "Receipt saved",
        expense_id: expense.id,
    }))
}

async fn get_expense(
    State(state): State<Arc<AppState>>,
    UrlPath(id): UrlPath<String>,
) -> Result<Json<Envelope<Expense>>, ApiError> {
    let expense = expensa_storage::get_expense(&state.pool, &id)
        .await
        .map_err(|e| {
            error!(error = %e, %id, "failed to load expense");
            ApiError::internal("Failed to load expense")
        })?
        .ok_or_else(|| ApiError::not_found("Expense not found"))?;

    Ok(Envelope::ok(expense))
}

/// Validate a submitted record and fill in the optional fields.
fn new_expense_from_request(
    req: SubmitReceiptRequest,
    default_currency: &CurrencyCode,
) -> Result<NewExpense, ApiError> {
    let (Some(amount), Some(date), Some(merchant)) = (
        req.amount.as_ref().and_then(amount_text),
        non_empty(req.date),
        non_empty(req.merchant),
    ) else {
        return Err(ApiError::bad_request("Missing required fields"));
    };

    let amount: Amount = amount
        .parse()
        .map_err(|e| ApiError::bad_request(format!("Invalid amount: {e}")))?;
    let date = NaiveDate::parse_from_str(&date, "%Y-%m-%d")
        .map_err(|_| ApiError::bad_request(format!("Invalid date: {date}")))?;
    let currency = match non_empty(req.currency) {
        Some(code) => CurrencyCode::new(&code)
            .map_err(|e| ApiError::bad_request(format!("Invalid currency: {e}")))?,
        None => default_currency.clone(),
    };

    Ok(NewExpense {
        amount,
        currency,
        date,
        description: non_empty(req.description)
            .unwrap_or_else(|| SUBMITTED_WITHOUT_DESCRIPTION.to_string()),
        merchant,
        receipt_url: non_empty(req.receipt_url),
        category: non_empty(req.category),
    })
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn amount_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => non_empty(Some(s.clone())),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Extension from the client file name, else from the declared content type.
fn upload_extension(file_name: Option<&str>, content_type: Option<&str>) -> String {
    let from_name = file_name
        .and_then(|name| Path::new(name).extension())
        .and_then(|ext| ext.to_str());
    if let Some(ext) = from_name {
        return ext.to_string();
    }
    match content_type {
        Some("image/jpeg") => "jpg",
        Some("image/png") => "png",
        Some("image/webp") => "webp",
        Some("image/tiff") => "tiff",
        Some("image/bmp") => "bmp",
        _ => "bin",
    }
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use expensa_ocr::{MockRecognizer, OcrBackend, UnavailableRecognizer};
    use image::{DynamicImage, GrayImage, ImageBuffer, Luma};
    use serde_json::json;
    use std::io::Cursor;
    use tower::ServiceExt;

    const RECEIPT_TEXT: &str =
        "PAYMENT RECEIPT\nAcme Enterprises\nDate: 03/04/2024\nBarrel disposal 2 USD\nTotal: USD 12.5";

    struct TestApp {
        _dir: tempfile::TempDir,
        router: Router,
    }

    async fn app_with(recognizer: Arc<dyn OcrBackend>) -> TestApp {
        let dir = tempfile::tempdir().unwrap();
        let config = ServerConfig {
            uploads_dir: dir.path().join("uploads"),
            database_path: dir.path().join("expensa.db"),
            ..ServerConfig::default()
        };
        let pool = expensa_storage::create_db(&config.database_path).await.unwrap();
        let state = AppState::with_recognizer(pool, recognizer, &config);
        TestApp { _dir: dir, router: router(state, config.max_upload_bytes) }
    }

    async fn app() -> TestApp {
        app_with(Arc::new(MockRecognizer::new(RECEIPT_TEXT))).await
    }

    fn tiny_png() -> Vec<u8> {
        let img: GrayImage = ImageBuffer::from_fn(4, 4, |_, _| Luma([200u8]));
        let mut buf = Vec::new();
        DynamicImage::ImageLuma8(img)
            .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
            .unwrap();
        buf
    }

    fn multipart_request(field: &str, file_name: &str, data: &[u8]) -> Request<Body> {
        let boundary = "expensa-test-boundary";
        let mut body = format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{file_name}\"\r\nContent-Type: image/png\r\n\r\n"
        )
        .into_bytes();
        body.extend_from_slice(data);
        body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());

        Request::builder()
            .method("POST")
            .uri("/api/process-receipt")
            .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={boundary}"))
            .body(Body::from(body))
            .unwrap()
    }

    fn json_request(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn send(router: &Router, req: Request<Body>) -> (StatusCode, Value) {
        let resp = router.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    #[tokio::test]
    async fn health_is_ok() {
        let app = app().await;
        let resp = app
            .router
            .clone()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"ok");
    }

    #[tokio::test]
    async fn process_receipt_returns_extracted_fields() {
        let app = app().await;
        let (status, body) = send(&app.router, multipart_request("receipt", "scan.png", &tiny_png())).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        let data = &body["data"];
        assert_eq!(data["amount"], "12.50");
        assert_eq!(data["currency"], "USD");
        assert_eq!(data["date"], "2024-03-04");
        assert_eq!(data["merchant"], "Acme Enterprises");
        assert_eq!(data["description"], "Barrel disposal\nBarrel disposal 2 USD");
        assert!(data["receiptUrl"].as_str().unwrap().starts_with("/uploads/"));
        assert!(data.get("defaulted").is_none());
    }

    #[tokio::test]
    async fn stored_upload_is_served() {
        let app = app().await;
        let (_, body) = send(&app.router, multipart_request("receipt", "scan.png", &tiny_png())).await;
        let url = body["data"]["receiptUrl"].as_str().unwrap().to_string();

        let resp = app
            .router
            .clone()
            .oneshot(Request::builder().uri(&url).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        assert_eq!(bytes.to_vec(), tiny_png());
    }

    #[tokio::test]
    async fn process_receipt_without_file_is_400() {
        let app = app().await;
        let (status, body) = send(&app.router, multipart_request("other", "scan.png", &tiny_png())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({ "success": false, "error": "No file uploaded" }));

        let (status, _) = send(&app.router, json_request("/api/process-receipt", json!({}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn process_receipt_engine_failure_is_500() {
        let app = app_with(Arc::new(UnavailableRecognizer)).await;
        let (status, body) = send(&app.router, multipart_request("receipt", "scan.png", &tiny_png())).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["success"], false);
        assert!(body["error"]
            .as_str()
            .unwrap()
            .starts_with("Failed to process receipt: "));
    }

    #[tokio::test]
    async fn submit_receipt_stores_draft_expense() {
        let app = app().await;
        let (status, body) = send(
            &app.router,
            json_request(
                "/api/submit-receipt",
                json!({
                    "amount": "12.50",
                    "date": "2024-03-04",
                    "merchant": "Acme Enterprises",
                    "receiptUrl": "/uploads/ab/ab.png"
                }),
            ),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["message"], "Receipt saved");
        let id = body["expenseId"].as_str().unwrap().to_string();

        let get = Request::builder()
            .uri(format!("/api/expenses/{id}"))
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(&app.router, get).await;
        assert_eq!(status, StatusCode::OK);
        let data = &body["data"];
        assert_eq!(data["id"], id.as_str());
        assert_eq!(data["amount"], "12.50");
        assert_eq!(data["currency"], "USD");
        assert_eq!(data["description"], "No description");
        assert_eq!(data["status"], "draft");
        assert_eq!(data["receiptUrl"], "/uploads/ab/ab.png");
    }

    #[tokio::test]
    async fn submit_receipt_accepts_numeric_amount_and_currency() {
        let app = app().await;
        let (status, body) = send(
            &app.router,
            json_request(
                "/api/submit-receipt",
                json!({
                    "amount": 7.5,
                    "date": "2024-01-02",
                    "merchant": "Cafe",
                    "currency": "eur",
                    "description": "Coffee"
                }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let id = body["expenseId"].as_str().unwrap();
        let get = Request::builder()
            .uri(format!("/api/expenses/{id}"))
            .body(Body::empty())
            .unwrap();
        let (_, body) = send(&app.router, get).await;
        assert_eq!(body["data"]["amount"], "7.50");
        assert_eq!(body["data"]["currency"], "EUR");
        assert_eq!(body["data"]["description"], "Coffee");
    }

    #[tokio::test]
    async fn submit_receipt_missing_fields_is_400() {
        let app = app().await;
        for payload in [
            json!({ "date": "2024-03-04", "merchant": "Acme" }),
            json!({ "amount": "1.00", "merchant": "Acme" }),
            json!({ "amount": "1.00", "date": "2024-03-04", "merchant": "  " }),
            json!({ "amount": "", "date": "2024-03-04", "merchant": "Acme" }),
        ] {
            let (status, body) = send(&app.router, json_request("/api/submit-receipt", payload)).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(body["error"], "Missing required fields");
        }
    }

    #[tokio::test]
    async fn submit_receipt_rejects_unparseable_values() {
        let app = app().await;
        let (status, _) = send(
            &app.router,
            json_request(
                "/api/submit-receipt",
                json!({ "amount": "twelve", "date": "2024-03-04", "merchant": "Acme" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(
            &app.router,
            json_request(
                "/api/submit-receipt",
                json!({ "amount": "12", "date": "03/04/2024", "merchant": "Acme" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn unknown_expense_is_404() {
        let app = app().await;
        let req = Request::builder()
            .uri("/api/expenses/does-not-exist")
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(&app.router, req).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["success"], false);
    }

    fn bare_request() -> SubmitReceiptRequest {
        SubmitReceiptRequest {
            amount: Some(json!("12.5")),
            date: Some("2024-03-04".to_string()),
            description: None,
            merchant: Some("Acme".to_string()),
            receipt_url: None,
            currency: None,
            category: None,
        }
    }

    #[test]
    fn missing_description_gets_submit_default() {
        let new = new_expense_from_request(bare_request(), &CurrencyCode::usd()).unwrap();
        assert_eq!(new.description, "No description");
        assert_ne!(new.description, expensa_ocr::NO_DESCRIPTION);

        let blank = SubmitReceiptRequest { description: Some("   ".to_string()), ..bare_request() };
        let new = new_expense_from_request(blank, &CurrencyCode::usd()).unwrap();
        assert_eq!(new.description, SUBMITTED_WITHOUT_DESCRIPTION);
    }

    #[test]
    fn extension_from_name_or_content_type() {
        assert_eq!(upload_extension(Some("scan.JPG"), None), "JPG");
        assert_eq!(upload_extension(None, Some("image/jpeg")), "jpg");
        assert_eq!(upload_extension(Some("noext"), Some("image/png")), "png");
        assert_eq!(upload_extension(None, None), "bin");
    }
}
