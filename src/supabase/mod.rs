//! Supabase (PostgREST) client for screenshot metadata.
//!
//! Expected table:
//!
//! ```sql
//! CREATE TABLE screenshots (
//!   id BIGINT PRIMARY KEY GENERATED ALWAYS AS IDENTITY,
//!   created_at TIMESTAMPTZ DEFAULT NOW(),
//!   url TEXT,
//!   public_id TEXT,
//!   cloudinary_url TEXT,
//!   tags TEXT[]
//! );
//! ```

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::config::SupabaseConfig;
use crate::store::{MetadataError, MetadataStore, NewScreenshot};

#[derive(Debug, Deserialize)]
struct PostgrestError {
    message: String,
}

/// Supabase REST client wrapper.
#[derive(Clone)]
pub struct SupabaseClient {
    http: reqwest::Client,
    config: SupabaseConfig,
}

impl SupabaseClient {
    #[must_use]
    pub fn new(http: reqwest::Client, config: SupabaseConfig) -> Self {
        Self { http, config }
    }

    /// REST endpoint of the metadata table.
    #[must_use]
    pub fn table_url(&self) -> String {
        format!(
            "{}/rest/v1/{}",
            self.config.url.trim_end_matches('/'),
            self.config.table
        )
    }
}

#[async_trait]
impl MetadataStore for SupabaseClient {
    async fn insert_screenshot(&self, row: &NewScreenshot) -> Result<(), MetadataError> {
        debug!(url = %row.url, public_id = %row.public_id, table = %self.config.table, "Inserting screenshot row");

        let response = self
            .http
            .post(self.table_url())
            .header("apikey", &self.config.key)
            .bearer_auth(&self.config.key)
            .header("Prefer", "return=minimal")
            .json(row)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<PostgrestError>(&body)
                .map_or(body, |e| e.message);
            return Err(MetadataError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        Ok(())
    }
}

impl std::fmt::Debug for SupabaseClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SupabaseClient")
            .field("url", &self.config.url)
            .field("table", &self.config.table)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[test]
    fn test_table_url() {
        let mut config = Config::for_testing().supabase;
        config.url = "https://abc.supabase.co/".to_string();
        let client = SupabaseClient::new(reqwest::Client::new(), config);
        assert_eq!(client.table_url(), "https://abc.supabase.co/rest/v1/screenshots");
    }

    #[test]
    fn test_row_serialization() {
        let row = NewScreenshot {
            url: "example.com".to_string(),
            public_id: "kiosk247/example.com/2024/03/2024-03-01_14-00".to_string(),
            cloudinary_url: "https://res.cloudinary.com/demo/image/upload/v1/x.jpg".to_string(),
            tags: vec!["kiosk247".to_string(), "screenshot".to_string()],
        };
        let json = serde_json::to_value(&row).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "url": "example.com",
                "public_id": "kiosk247/example.com/2024/03/2024-03-01_14-00",
                "cloudinary_url": "https://res.cloudinary.com/demo/image/upload/v1/x.jpg",
                "tags": ["kiosk247", "screenshot"],
            })
        );
    }
}
