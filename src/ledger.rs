//! Notion ledger client
//!
//! One database holds all expense records; property names are part of the
//! database schema and must match it exactly.

use crate::flows::NewRecord;
use crate::runtime::Ledger;
use async_trait::async_trait;
use chrono::{Datelike, Local, NaiveDate};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;

const NOTION_BASE_URL: &str = "https://api.notion.com";
const NOTION_VERSION: &str = "2022-06-28";
const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Ledger error with classification
#[derive(Debug, Error)]
#[error("{message}")]
pub struct LedgerError {
    pub kind: LedgerErrorKind,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerErrorKind {
    /// Transport failure or timeout
    Network,
    /// Non-success status from the ledger API
    Api,
    /// Response body did not match the expected shape
    Decode,
}

impl LedgerError {
    pub fn new(kind: LedgerErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(LedgerErrorKind::Network, message)
    }

    pub fn api(message: impl Into<String>) -> Self {
        Self::new(LedgerErrorKind::Api, message)
    }

    pub fn decode(message: impl Into<String>) -> Self {
        Self::new(LedgerErrorKind::Decode, message)
    }
}

// Page creation wire types. Field names are serialized as the database's
// Japanese property names.

#[derive(Debug, Serialize)]
struct CreatePageRequest {
    parent: Parent,
    properties: PageProperties,
}

#[derive(Debug, Serialize)]
struct Parent {
    database_id: String,
}

#[derive(Debug, Serialize)]
struct PageProperties {
    #[serde(rename = "費目")]
    title: TitleProperty,
    #[serde(rename = "一人あたりの支払額")]
    amount_per_person: NumberProperty,
    #[serde(rename = "支払人数")]
    people: NumberProperty,
    #[serde(rename = "カテゴリ")]
    category: SelectProperty,
    #[serde(rename = "財布")]
    wallet: SelectProperty,
    #[serde(rename = "支払日時")]
    paid_on: DateProperty,
}

#[derive(Debug, Serialize)]
struct TitleProperty {
    title: Vec<RichText>,
}

#[derive(Debug, Serialize)]
struct RichText {
    text: TextContent,
}

#[derive(Debug, Serialize)]
struct TextContent {
    content: String,
}

#[derive(Debug, Serialize)]
struct NumberProperty {
    number: i64,
}

#[derive(Debug, Serialize)]
struct SelectProperty {
    select: SelectValue,
}

#[derive(Debug, Serialize)]
struct SelectValue {
    name: String,
}

#[derive(Debug, Serialize)]
struct DateProperty {
    date: DateValue,
}

#[derive(Debug, Serialize)]
struct DateValue {
    start: String,
}

// Query response types. Only the 総支払額 formula number is read; everything
// else in the page is ignored.

#[derive(Debug, Deserialize)]
struct QueryResponse {
    results: Vec<QueryPage>,
}

#[derive(Debug, Deserialize)]
struct QueryPage {
    properties: HashMap<String, PageProperty>,
}

#[derive(Debug, Deserialize)]
struct PageProperty {
    #[serde(default)]
    formula: Option<FormulaValue>,
}

#[derive(Debug, Deserialize)]
struct FormulaValue {
    #[serde(default)]
    number: Option<i64>,
}

/// Client for the Notion expenses database.
pub struct NotionLedger {
    http: Client,
    api_key: String,
    db_id: String,
    base_url: String,
}

impl NotionLedger {
    pub fn new(api_key: String, db_id: String) -> Self {
        Self::with_base_url(api_key, db_id, NOTION_BASE_URL.to_string())
    }

    pub fn with_base_url(api_key: String, db_id: String, base_url: String) -> Self {
        let http = Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .expect("Failed to create HTTP client");
        Self {
            http,
            api_key,
            db_id,
            base_url,
        }
    }

    async fn post(&self, path: &str, body: &serde_json::Value) -> Result<String, LedgerError> {
        let url = format!("{}{path}", self.base_url.trim_end_matches('/'));
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .header("Notion-Version", NOTION_VERSION)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LedgerError::network(format!("Request timeout: {e}"))
                } else {
                    LedgerError::network(format!("Request failed: {e}"))
                }
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| LedgerError::network(format!("Failed to read response: {e}")))?;

        if status.as_u16() >= 300 {
            return Err(LedgerError::api(format!("HTTP {status}: {body}")));
        }
        Ok(body)
    }
}

#[async_trait]
impl Ledger for NotionLedger {
    async fn create_record(&self, record: &NewRecord) -> Result<(), LedgerError> {
        let date = record.date.unwrap_or_else(|| Local::now().date_naive());
        let request = CreatePageRequest {
            parent: Parent {
                database_id: self.db_id.clone(),
            },
            properties: PageProperties {
                title: TitleProperty {
                    title: vec![RichText {
                        text: TextContent {
                            content: record.title.clone(),
                        },
                    }],
                },
                amount_per_person: NumberProperty {
                    number: record.amount,
                },
                people: NumberProperty {
                    number: record.people,
                },
                category: SelectProperty {
                    select: SelectValue {
                        name: record.category.clone(),
                    },
                },
                wallet: SelectProperty {
                    select: SelectValue {
                        name: record.wallet.label().to_string(),
                    },
                },
                paid_on: DateProperty {
                    date: DateValue {
                        start: date.format("%Y-%m-%d").to_string(),
                    },
                },
            },
        };

        let body = serde_json::to_value(&request)
            .map_err(|e| LedgerError::decode(format!("Failed to encode page: {e}")))?;
        self.post("/v1/pages", &body).await?;
        Ok(())
    }

    async fn monthly_total(&self, category: &str) -> Result<i64, LedgerError> {
        let today = Local::now().date_naive();
        let start_of_month = today.with_day(1).unwrap_or(today);
        let body = monthly_query(category, start_of_month);

        let path = format!("/v1/databases/{}/query", self.db_id);
        let response_body = self.post(&path, &body).await?;

        let response: QueryResponse = serde_json::from_str(&response_body)
            .map_err(|e| LedgerError::decode(format!("Failed to parse query response: {e}")))?;

        Ok(sum_totals(&response))
    }
}

fn monthly_query(category: &str, start_of_month: NaiveDate) -> serde_json::Value {
    json!({
        "filter": {
            "and": [
                {
                    "property": "支払日時",
                    "date": { "after": start_of_month.format("%Y-%m-%d").to_string() }
                },
                {
                    "property": "カテゴリ",
                    "select": { "equals": category }
                }
            ]
        }
    })
}

fn sum_totals(response: &QueryResponse) -> i64 {
    response
        .results
        .iter()
        .filter_map(|page| page.properties.get("総支払額"))
        .filter_map(|prop| prop.formula.as_ref())
        .filter_map(|formula| formula.number)
        .sum()
}
