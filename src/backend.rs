use crate::schema::{default_tables, SchemaTable};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::time::Duration;

/// Failures talking to the NL-to-SQL backend.
///
/// Every variant ends up as user-visible feedback at the call site; nothing
/// here is fatal and nothing is retried automatically.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("backend unreachable: {0}")]
    Unreachable(String),

    #[error("backend returned status {0}")]
    Status(reqwest::StatusCode),

    #[error("malformed backend response: {0}")]
    Malformed(String),
}

/// Result of a successful translate round-trip.
///
/// The backend signals "this request cannot be answered" inside a 200
/// response, as an `Error:` prefix in the SQL field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranslateOutcome {
    Sql(String),
    Rejected(String),
}

/// Classify the SQL field of a translate response; the error marker is
/// matched case-insensitively anywhere in the text.
pub fn classify_sql(sql: &str) -> TranslateOutcome {
    if sql.to_lowercase().contains("error:") {
        TranslateOutcome::Rejected(sql.to_string())
    } else {
        TranslateOutcome::Sql(sql.to_string())
    }
}

#[derive(Debug, Serialize)]
struct TranslateRequest<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct TranslateResponse {
    sql: String,
}

#[derive(Debug, Deserialize)]
struct SchemaEnvelope {
    schema: Vec<SchemaTable>,
}

#[derive(Debug, Serialize)]
struct SchemaUpdateRequest<'a> {
    schema: &'a [SchemaTable],
    seq: u64,
}

/// Client for the backend HTTP JSON API.
#[derive(Clone)]
pub struct BackendClient {
    http: reqwest::Client,
    base_url: String,
}

impl BackendClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            http,
            base_url: base_url.into(),
        }
    }

    /// Translate natural language into SQL. A single attempt; the user
    /// re-submits manually on failure.
    pub async fn translate(&self, text: &str) -> Result<TranslateOutcome, BackendError> {
        let url = format!("{}/nl-to-sql", self.base_url);

        let response = self
            .http
            .post(&url)
            .json(&TranslateRequest { text })
            .send()
            .await
            .map_err(|e| BackendError::Unreachable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(BackendError::Status(response.status()));
        }

        let body: TranslateResponse = response
            .json()
            .await
            .map_err(|e| BackendError::Malformed(e.to_string()))?;

        Ok(classify_sql(&body.sql))
    }

    /// Fetch the schema, falling back to the fixed default on any failure.
    ///
    /// Returns the tables and whether the app is running offline against the
    /// fallback. Never fails the caller.
    pub async fn fetch_schema(&self) -> (Vec<SchemaTable>, bool) {
        match self.try_fetch_schema().await {
            Ok(tables) => (tables, false),
            Err(e) => {
                tracing::warn!("schema fetch failed, using default schema: {e}");
                (default_tables(), true)
            }
        }
    }

    async fn try_fetch_schema(&self) -> Result<Vec<SchemaTable>, BackendError> {
        let url = format!("{}/get-schema", self.base_url);

        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| BackendError::Unreachable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(BackendError::Status(response.status()));
        }

        let body: SchemaEnvelope = response
            .json()
            .await
            .map_err(|e| BackendError::Malformed(e.to_string()))?;

        Ok(body.schema)
    }

    /// Persist the whole schema, tagged with the edit sequence it represents.
    /// On failure the caller keeps the optimistic local copy, writes the local
    /// fallback file, and surfaces a warning.
    pub async fn save_schema(
        &self,
        tables: &[SchemaTable],
        seq: u64,
    ) -> Result<(), BackendError> {
        let url = format!("{}/update-schema", self.base_url);

        let response = self
            .http
            .post(&url)
            .json(&SchemaUpdateRequest { schema: tables, seq })
            .send()
            .await
            .map_err(|e| BackendError::Unreachable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(BackendError::Status(response.status()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_prefix_is_detected_case_insensitively() {
        assert_eq!(
            classify_sql("Error: Request cannot be answered with the current schema."),
            TranslateOutcome::Rejected(
                "Error: Request cannot be answered with the current schema.".to_string()
            )
        );
        assert!(matches!(classify_sql("ERROR: nope"), TranslateOutcome::Rejected(_)));
        assert!(matches!(
            classify_sql("-- note\nerror: bad request"),
            TranslateOutcome::Rejected(_)
        ));
        assert_eq!(
            classify_sql("SELECT 1;"),
            TranslateOutcome::Sql("SELECT 1;".to_string())
        );
        // A bare mention of the word without the marker is still SQL.
        assert!(matches!(
            classify_sql("SELECT * FROM errors;"),
            TranslateOutcome::Sql(_)
        ));
    }

    #[test]
    fn request_bodies_match_the_wire_contract() {
        let body = serde_json::to_value(TranslateRequest { text: "show users" }).unwrap();
        assert_eq!(body, serde_json::json!({ "text": "show users" }));

        let tables = default_tables();
        let body = serde_json::to_value(SchemaUpdateRequest {
            schema: &tables,
            seq: 7,
        })
        .unwrap();
        assert_eq!(body["seq"], 7);
        assert_eq!(body["schema"][0]["table"], "users");
        assert_eq!(body["schema"][1]["columns"][1], "user_id");
    }

    #[test]
    fn schema_envelope_parses_backend_shape() {
        let body = r#"{"schema":[{"table":"users","columns":["id","name","email"]}]}"#;
        let envelope: SchemaEnvelope = serde_json::from_str(body).unwrap();
        assert_eq!(envelope.schema.len(), 1);
        assert_eq!(envelope.schema[0].columns, vec!["id", "name", "email"]);
    }

    #[tokio::test]
    async fn unreachable_backend_falls_back_to_default_schema() {
        // Port 9 (discard) is never serving HTTP locally.
        let client = BackendClient::new("http://127.0.0.1:9");
        let (tables, offline) = client.fetch_schema().await;
        assert!(offline);
        assert_eq!(tables, default_tables());
    }

    #[tokio::test]
    async fn unreachable_backend_surfaces_translate_error() {
        let client = BackendClient::new("http://127.0.0.1:9");
        let err = client.translate("show users").await.unwrap_err();
        assert!(matches!(err, BackendError::Unreachable(_)));
    }
}
