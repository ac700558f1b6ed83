//! PostgREST client for the hosted database, authenticated with the service-role key

use reqwest::{Client, RequestBuilder, Response};
use serde::{de::DeserializeOwned, Serialize};

/// Server-side database client. The service-role key bypasses row level
/// security, so it never leaves this process.
#[derive(Clone)]
pub struct SupabaseClient {
    client: Client,
    base_url: String,
    service_role_key: String,
}

impl SupabaseClient {
    pub fn new(base_url: impl Into<String>, service_role_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            service_role_key: service_role_key.into(),
        }
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("apikey", &self.service_role_key)
            .header("Authorization", format!("Bearer {}", self.service_role_key))
            .header("Content-Type", "application/json")
    }

    /// Turn a non-2xx response into `SupabaseError::Api`
    async fn check(response: Response) -> Result<Response, SupabaseError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        Err(SupabaseError::Api { status, body })
    }

    /// Rows of `table` matching a PostgREST filter such as `username=eq.alice`
    pub async fn select<T: DeserializeOwned>(
        &self,
        table: &str,
        filter: &str,
    ) -> Result<Vec<T>, SupabaseError> {
        let url = format!("{}?{}", self.table_url(table), filter);
        let response = self.authorized(self.client.get(&url)).send().await?;
        Self::check(response)
            .await?
            .json()
            .await
            .map_err(SupabaseError::Parse)
    }

    /// First matching row, if any
    pub async fn select_one<T: DeserializeOwned>(
        &self,
        table: &str,
        filter: &str,
    ) -> Result<Option<T>, SupabaseError> {
        let filter = format!("{filter}&limit=1");
        let rows: Vec<T> = self.select(table, &filter).await?;
        Ok(rows.into_iter().next())
    }

    /// Insert one row and return it as stored
    pub async fn insert<T: Serialize, R: DeserializeOwned>(
        &self,
        table: &str,
        row: &T,
    ) -> Result<R, SupabaseError> {
        let response = self
            .authorized(self.client.post(self.table_url(table)))
            .header("Prefer", "return=representation")
            .json(row)
            .send()
            .await?;

        // PostgREST answers inserts with an array
        let rows: Vec<R> = Self::check(response)
            .await?
            .json()
            .await
            .map_err(SupabaseError::Parse)?;
        rows.into_iter().next().ok_or(SupabaseError::NoRowReturned)
    }

    /// Patch every row matching `filter`
    pub async fn update<T: Serialize>(
        &self,
        table: &str,
        filter: &str,
        patch: &T,
    ) -> Result<(), SupabaseError> {
        let url = format!("{}?{}", self.table_url(table), filter);
        let response = self
            .authorized(self.client.patch(&url))
            .json(patch)
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    /// Insert or merge on the given conflict columns
    pub async fn upsert<T: Serialize>(
        &self,
        table: &str,
        row: &T,
        on_conflict: &str,
    ) -> Result<(), SupabaseError> {
        let url = format!("{}?on_conflict={}", self.table_url(table), on_conflict);
        let response = self
            .authorized(self.client.post(&url))
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(row)
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SupabaseError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("API error (status {status}): {body}")]
    Api { status: u16, body: String },

    #[error("Failed to parse response: {0}")]
    Parse(reqwest::Error),

    #[error("No row returned from insert")]
    NoRowReturned,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_url_drops_trailing_slash() {
        let client = SupabaseClient::new("https://db.example.com/", "key");
        assert_eq!(
            client.table_url("profiles"),
            "https://db.example.com/rest/v1/profiles"
        );
    }
}
