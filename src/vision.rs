//! Gemini receipt extraction
//!
//! Sends the receipt photo with a fixed Japanese extraction prompt and decodes
//! the model's JSON answer into `ReceiptData`.

use crate::flows::ReceiptData;
use crate::runtime::ReceiptExtractor;
use async_trait::async_trait;
use base64::Engine;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

const GEMINI_URL: &str =
    "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.0-flash:generateContent";
const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

const RECEIPT_PROMPT: &str = r#"
あなたは画像解析の専門家です。次の画像に基づいて、レシートから以下の情報を抽出し、JSON 形式で返してください。
レシートに外税と記載のある場合、アイテム名の頭に * マークが記されている場合は 8%、記されていない場合は 10% の消費税を付加した税込価格を計算して返してください。
レシートに内税と記載のある場合、表示されている価格は税込価格です。そのままの価格を返してください。
- 店舗名(merchant): レシートに記載されている店舗の名前
- アイテム(items): 各商品の名前と価格のリスト
    - 名前(name): 文字列
	- 価格(amount): 数値
	- カテゴリ(category): アイテム名と店舗名をもとに、以下のカテゴリから最も適切なものを選んでください: ぜいたくごはん, いつもごはん, 日用品, 住居費, 旅行, その他
- 日付(date): レシートの日付 (YYYY-MM-DD 形式)

なお、カテゴリの判断は以下の基準に従ってください:
- ぜいたくごはん: カフェ、レストラン、スイーツ店での購入品。または、スーパーでのジュース・お菓子・アルコール類の購入品
- いつもごはん: スーパー、コンビニでの食料品購入品
- 日用品: トイレットペーパー、洗剤、シャンプーなどの生活必需品
- 住居費: 家賃、光熱費などの住居関連費用
- 旅行: ホテル代、交通費などの旅行関連費用
- その他: 上記に該当しないもの

例:
{
	"merchant": "スーパーABC",
	"items": [
		{"name": "牛乳", "amount": 200, "category": "いつもごはん"},
		{"name": "トイレットペーパー", "amount": 400, "category": "日用品"}
	],
	"date": "2024-06-15"
}
{
	"merchant": "カフェXYZ",
	"items": [
		{"name": "コーヒー", "amount": 300, "category": "ぜいたくごはん"},
		{"name": "サンドイッチ", "amount": 500, "category": "ぜいたくごはん"}
	],
	"date": "2024-06-16"
}

必ず上記のJSON形式で返してください。
"#;

/// Vision extraction error with classification
#[derive(Debug, Error)]
#[error("{message}")]
pub struct VisionError {
    pub kind: VisionErrorKind,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisionErrorKind {
    /// Transport failure or timeout
    Network,
    /// Non-success status from the API
    Api,
    /// Response carried no candidates or no text parts
    Empty,
    /// Model output did not decode as receipt JSON
    Decode,
}

impl VisionError {
    pub fn new(kind: VisionErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(VisionErrorKind::Network, message)
    }

    pub fn api(message: impl Into<String>) -> Self {
        Self::new(VisionErrorKind::Api, message)
    }

    pub fn empty(message: impl Into<String>) -> Self {
        Self::new(VisionErrorKind::Empty, message)
    }

    pub fn decode(message: impl Into<String>) -> Self {
        Self::new(VisionErrorKind::Decode, message)
    }
}

/// Mime type inferred from the attachment filename. jpg, png and webp are
/// supported; everything else is sent as jpeg.
pub fn mime_for_filename(filename: &str) -> &'static str {
    let lower = filename.to_lowercase();
    if lower.ends_with(".png") {
        "image/png"
    } else if lower.ends_with(".webp") {
        "image/webp"
    } else {
        "image/jpeg"
    }
}

// Gemini API types

#[derive(Debug, Serialize)]
struct GenerateRequest {
    contents: Vec<RequestContent>,
}

#[derive(Debug, Serialize)]
struct RequestContent {
    parts: Vec<RequestPart>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum RequestPart {
    Text { text: String },
    InlineData { inline_data: InlineData },
}

#[derive(Debug, Serialize)]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: String,
}

/// The model wraps its JSON in a fenced code block more often than not.
fn strip_json_fences(text: &str) -> &str {
    let trimmed = text.trim();
    if let Some(inner) = trimmed
        .strip_prefix("```json")
        .and_then(|rest| rest.strip_suffix("```"))
    {
        inner.trim()
    } else {
        trimmed
    }
}

/// Gemini-backed receipt extractor.
pub struct GeminiVision {
    http: Client,
    api_key: String,
    url: String,
}

impl GeminiVision {
    pub fn new(api_key: String) -> Self {
        Self::with_url(api_key, GEMINI_URL.to_string())
    }

    pub fn with_url(api_key: String, url: String) -> Self {
        let http = Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .expect("Failed to create HTTP client");
        Self { http, api_key, url }
    }
}

#[async_trait]
impl ReceiptExtractor for GeminiVision {
    async fn extract(&self, image: &[u8], mime_type: &str) -> Result<ReceiptData, VisionError> {
        let request = GenerateRequest {
            contents: vec![RequestContent {
                parts: vec![
                    RequestPart::Text {
                        text: RECEIPT_PROMPT.to_string(),
                    },
                    RequestPart::InlineData {
                        inline_data: InlineData {
                            mime_type: mime_type.to_string(),
                            data: base64::engine::general_purpose::STANDARD.encode(image),
                        },
                    },
                ],
            }],
        };

        let response = self
            .http
            .post(&self.url)
            .header("X-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    VisionError::network(format!("Request timeout: {e}"))
                } else {
                    VisionError::network(format!("Request failed: {e}"))
                }
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| VisionError::network(format!("Failed to read response: {e}")))?;

        if !status.is_success() {
            return Err(VisionError::api(format!("HTTP {status}: {body}")));
        }

        let parsed: GenerateResponse = serde_json::from_str(&body)
            .map_err(|e| VisionError::decode(format!("Failed to parse API response: {e}")))?;

        let text = parsed
            .candidates
            .first()
            .and_then(|c| c.content.parts.first())
            .map(|p| p.text.as_str())
            .ok_or_else(|| VisionError::empty("no content in API response"))?;

        let receipt: ReceiptData = serde_json::from_str(strip_json_fences(text))
            .map_err(|e| VisionError::decode(format!("Failed to parse receipt JSON: {e}")))?;

        Ok(receipt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mime_inference_covers_supported_extensions() {
        assert_eq!(mime_for_filename("receipt.png"), "image/png");
        assert_eq!(mime_for_filename("RECEIPT.PNG"), "image/png");
        assert_eq!(mime_for_filename("photo.webp"), "image/webp");
        assert_eq!(mime_for_filename("photo.jpg"), "image/jpeg");
        assert_eq!(mime_for_filename("photo.jpeg"), "image/jpeg");
        assert_eq!(mime_for_filename("no_extension"), "image/jpeg");
    }

    #[test]
    fn fence_stripping_handles_both_shapes() {
        let fenced = "```json\n{\"merchant\": \"店\"}\n```";
        assert_eq!(strip_json_fences(fenced), "{\"merchant\": \"店\"}");

        let bare = "  {\"merchant\": \"店\"}  ";
        assert_eq!(strip_json_fences(bare), "{\"merchant\": \"店\"}");

        // an opening fence without a closing one is left alone
        let open_only = "```json\n{}";
        assert_eq!(strip_json_fences(open_only), "```json\n{}");
    }

    #[test]
    fn candidate_text_decodes_into_receipt_data() {
        let body = r#"{
            "candidates": [{
                "content": {
                    "parts": [{"text": "```json\n{\"merchant\": \"root C\", \"items\": [{\"name\": \"ブラジル セルタオ/HOT\", \"amount\": 500, \"category\": \"ぜいたくごはん\"}], \"date\": \"2025-11-29\"}\n```"}],
                    "role": "model"
                }
            }]
        }"#;
        let parsed: GenerateResponse = serde_json::from_str(body).unwrap();
        let text = &parsed.candidates[0].content.parts[0].text;
        let receipt: ReceiptData = serde_json::from_str(strip_json_fences(text)).unwrap();
        assert_eq!(receipt.merchant, "root C");
        assert_eq!(receipt.items.len(), 1);
        assert_eq!(receipt.items[0].amount, 500);
        assert_eq!(receipt.date, "2025-11-29");
    }

    #[test]
    fn empty_candidates_are_an_error_shape() {
        let parsed: GenerateResponse = serde_json::from_str(r#"{"candidates": []}"#).unwrap();
        assert!(parsed.candidates.is_empty());
    }

    #[test]
    fn prompt_names_all_six_receipt_categories() {
        for category in ["ぜいたくごはん", "いつもごはん", "日用品", "住居費", "旅行", "その他"] {
            assert!(RECEIPT_PROMPT.contains(category), "{category}");
        }
    }
}
