//! Google Sheets v4 client: tab listing, tab creation and row append.

use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use reqwest::{Client, Url};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};

use super::auth::GoogleAuth;
use super::ensure_success;

const SHEETS_API_BASE: &str = "https://sheets.googleapis.com";
pub const DEFAULT_ROW_COUNT: u32 = 1000;
pub const DEFAULT_COLUMN_COUNT: u32 = 26;

#[derive(Clone)]
pub struct SheetsClient {
    client: Client,
    auth: Arc<GoogleAuth>,
    base_url: String,
    spreadsheet_id: String,
}

#[derive(Deserialize)]
struct SpreadsheetMetadata {
    #[serde(default)]
    sheets: Vec<SheetEntry>,
}

#[derive(Deserialize)]
struct SheetEntry {
    properties: SheetProperties,
}

#[derive(Deserialize)]
struct SheetProperties {
    title: String,
}

impl SheetsClient {
    pub fn new(client: Client, auth: Arc<GoogleAuth>, spreadsheet_id: impl Into<String>) -> Self {
        Self {
            client,
            auth,
            base_url: SHEETS_API_BASE.to_string(),
            spreadsheet_id: spreadsheet_id.into(),
        }
    }

    /// Point the client at a different API host.
    #[cfg(test)]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// `{base}/v4/spreadsheets/{id}{suffix}` plus any extra path segments,
    /// each percent-encoded.
    fn url(&self, id_suffix: &str, segments: &[&str]) -> Result<Url> {
        let mut url = Url::parse(&self.base_url).context("Invalid Sheets base URL")?;
        url.path_segments_mut()
            .map_err(|_| anyhow!("Sheets base URL cannot have a path"))?
            .pop_if_empty()
            .extend(["v4", "spreadsheets"])
            .push(&format!("{}{}", self.spreadsheet_id, id_suffix))
            .extend(segments);
        Ok(url)
    }

    /// Titles of all tabs, in spreadsheet order.
    pub async fn sheet_titles(&self) -> Result<Vec<String>> {
        let token = self.auth.access_token().await?;
        let resp = self
            .client
            .get(self.url("", &[])?)
            .query(&[("fields", "sheets.properties.title")])
            .bearer_auth(&token)
            .send()
            .await
            .context("Failed to fetch spreadsheet metadata")?;

        let metadata: SpreadsheetMetadata = ensure_success(resp, "Spreadsheet lookup")
            .await?
            .json()
            .await
            .context("Failed to parse spreadsheet metadata")?;

        Ok(metadata
            .sheets
            .into_iter()
            .map(|s| s.properties.title)
            .collect())
    }

    /// Add a tab with the default 1000 x 26 grid.
    pub async fn add_sheet(&self, title: &str) -> Result<()> {
        let token = self.auth.access_token().await?;
        let body = json!({
            "requests": [{
                "addSheet": {
                    "properties": {
                        "title": title,
                        "gridProperties": {
                            "rowCount": DEFAULT_ROW_COUNT,
                            "columnCount": DEFAULT_COLUMN_COUNT,
                        }
                    }
                }
            }]
        });

        let resp = self
            .client
            .post(self.url(":batchUpdate", &[])?)
            .bearer_auth(&token)
            .json(&body)
            .send()
            .await
            .context("Failed to send addSheet request")?;
        ensure_success(resp, "Sheet creation").await?;

        info!("Created sheet '{}'", title);
        Ok(())
    }

    /// Append one row after the last row of the tab's data table.
    pub async fn append_values(&self, title: &str, row: &[String]) -> Result<()> {
        let token = self.auth.access_token().await?;
        let range = format!("{}:append", a1_range(title));

        let resp = self
            .client
            .post(self.url("", &["values", &range])?)
            .query(&[
                ("valueInputOption", "USER_ENTERED"),
                ("insertDataOption", "INSERT_ROWS"),
            ])
            .bearer_auth(&token)
            .json(&json!({ "values": [row] }))
            .send()
            .await
            .context("Failed to send append request")?;
        ensure_success(resp, "Row append").await?;

        debug!("Appended {} cells to '{}'", row.len(), title);
        Ok(())
    }

    /// Append a row, creating the tab first when it does not exist yet.
    pub async fn append_row(&self, title: &str, row: &[String]) -> Result<()> {
        let titles = self.sheet_titles().await?;
        if !titles.iter().any(|t| t == title) {
            info!("Sheet '{}' not found, creating it", title);
            self.add_sheet(title).await?;
        }
        self.append_values(title, row).await
    }
}

/// `'Title'!A1`, with embedded quotes doubled.
fn a1_range(title: &str) -> String {
    format!("'{}'!A1", title.replace('\'', "''"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::google::auth::Credentials;
    use crate::google::mock::{self, MockGoogle};

    fn client(base: &str) -> SheetsClient {
        let http = Client::new();
        let auth = Arc::new(GoogleAuth::new(
            Credentials::AccessToken("test-token".to_string()),
            http.clone(),
        ));
        SheetsClient::new(http, auth, "sheet-123").with_base_url(base)
    }

    #[test]
    fn test_a1_range_quotes_title() {
        assert_eq!(a1_range("Complaint"), "'Complaint'!A1");
        assert_eq!(a1_range("Team's log"), "'Team''s log'!A1");
    }

    #[test]
    fn test_url_encodes_range_segment() {
        let url = client("https://sheets.example.com")
            .url("", &["values", "'Góp ý'!A1:append"])
            .unwrap();
        assert!(url
            .as_str()
            .starts_with("https://sheets.example.com/v4/spreadsheets/sheet-123/values/"));
        assert!(!url.path().contains(' '));
    }

    #[tokio::test]
    async fn test_append_to_existing_sheet() {
        let (base, state) = mock::spawn(MockGoogle {
            sheets: vec!["Complaint".to_string()],
            ..Default::default()
        })
        .await;

        let row = vec!["Nguyen Van A".to_string(), "".to_string()];
        client(&base).append_row("Complaint", &row).await.unwrap();

        let state = state.lock().unwrap();
        assert!(state.added_sheets.is_empty());
        assert_eq!(state.appended, vec![("Complaint".to_string(), row)]);
    }

    #[tokio::test]
    async fn test_missing_sheet_is_created_with_default_grid() {
        let (base, state) = mock::spawn(MockGoogle {
            sheets: vec!["Sheet1".to_string()],
            ..Default::default()
        })
        .await;

        let row = vec!["x".to_string()];
        client(&base).append_row("Warranty", &row).await.unwrap();

        let state = state.lock().unwrap();
        assert_eq!(
            state.added_sheets,
            vec![("Warranty".to_string(), 1000, 26)]
        );
        assert_eq!(state.appended, vec![("Warranty".to_string(), row)]);
    }

    #[tokio::test]
    async fn test_sheet_titles_in_order() {
        let (base, _state) = mock::spawn(MockGoogle {
            sheets: vec!["Góp ý".to_string(), "Complaint".to_string()],
            ..Default::default()
        })
        .await;

        let titles = client(&base).sheet_titles().await.unwrap();
        assert_eq!(titles, vec!["Góp ý", "Complaint"]);
    }

    #[tokio::test]
    async fn test_provider_message_is_surfaced() {
        let (base, _state) = mock::spawn(MockGoogle::default()).await;

        // Bypass the existence check so the mock rejects the range.
        let err = client(&base)
            .append_values("Nope", &["x".to_string()])
            .await
            .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("Row append failed"), "{}", msg);
        assert!(msg.contains("Unable to parse range"), "{}", msg);
    }
}
