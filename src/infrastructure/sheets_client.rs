// Google Sheets v4 values client
use crate::application::spreadsheet_source::{RawRows, SpreadsheetSource};
use crate::domain::error::FetchError;
use async_trait::async_trait;
use serde::Deserialize;

const SHEETS_BASE_URL: &str = "https://sheets.googleapis.com";

#[derive(Debug, Clone)]
pub struct SheetsClient {
    client: reqwest::Client,
    spreadsheet_id: String,
    api_key: String,
    access_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Option<Vec<Vec<serde_json::Value>>>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ServiceError,
}

#[derive(Debug, Deserialize)]
struct ServiceError {
    #[serde(default)]
    code: Option<u16>,
    message: String,
}

impl SheetsClient {
    pub fn new(spreadsheet_id: String, api_key: String, access_token: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            spreadsheet_id,
            api_key,
            access_token,
        }
    }

    fn build_values_url(&self, range: &str) -> String {
        format!(
            "{}/v4/spreadsheets/{}/values/{}?key={}",
            SHEETS_BASE_URL,
            self.spreadsheet_id,
            urlencoding::encode(range),
            urlencoding::encode(&self.api_key)
        )
    }
}

/// Rows of a `ValueRange` body as strings. A range with no data has no
/// `values` field at all.
fn parse_value_range(body: &str) -> Result<RawRows, FetchError> {
    let data: ValueRange = serde_json::from_str(body)
        .map_err(|e| FetchError::Transport(format!("invalid values response: {}", e)))?;

    let rows = data
        .values
        .unwrap_or_default()
        .into_iter()
        .map(|row| row.into_iter().map(cell_to_string).collect())
        .collect();
    Ok(rows)
}

fn cell_to_string(cell: serde_json::Value) -> String {
    match cell {
        serde_json::Value::String(s) => s,
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// The service's own error message, or the raw body when it is not JSON.
fn parse_service_error(status: reqwest::StatusCode, body: &str) -> FetchError {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => {
            tracing::debug!("Sheets error code {:?}", envelope.error.code);
            FetchError::Service(envelope.error.message)
        }
        Err(_) => FetchError::Service(format!("Sheets request failed with status {}: {}", status, body)),
    }
}

#[async_trait]
impl SpreadsheetSource for SheetsClient {
    async fn fetch_rows(&self, range: &str) -> Result<RawRows, FetchError> {
        let url = self.build_values_url(range);

        let mut request = self.client.get(&url).header("Accept", "application/json");
        if let Some(token) = &self.access_token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        if !status.is_success() {
            return Err(parse_service_error(status, &body));
        }

        let rows = parse_value_range(&body)?;
        tracing::debug!("Sheets returned {} rows for {}", rows.len(), range);
        Ok(rows)
    }
}
