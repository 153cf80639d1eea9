//! Typed HTTP client for the console API.
//!
//! Every failure is turned into a [`ClientError`] carrying a message fit to
//! show a user: the server's `message` field when there is one, otherwise
//! the transport error, otherwise [`FALLBACK_MESSAGE`].

mod latest;

pub use latest::LatestOnly;

use reqwest::{header, Client, RequestBuilder, Response};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::{
    domain::{AttendanceHistory, Person, ReportWeek},
    import::{ImportCsvRequest, ImportPreview, ImportResult},
    listing::{ListQuery, Page},
    service::bulk::{BulkDeleteRequest, BulkDeleteResult, ExportRequest},
};

pub const FALLBACK_MESSAGE: &str = "Something went wrong. Please try again.";

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("{message}")]
    Api { status: u16, message: String },

    #[error("{0}")]
    Transport(String),
}

impl ClientError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Api { status, .. } => Some(*status),
            ClientError::Transport(_) => None,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            ClientError::Api { message, .. } => message,
            ClientError::Transport(message) => message,
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        let text = err.to_string();
        if text.trim().is_empty() {
            ClientError::Transport(FALLBACK_MESSAGE.to_string())
        } else {
            ClientError::Transport(text)
        }
    }
}

pub type ClientResult<T> = std::result::Result<T, ClientError>;

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

/// The `message` field of an error body, if it has a usable one.
pub fn error_message(body: &str) -> Option<String> {
    serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.message)
        .map(|m| m.trim().to_string())
        .filter(|m| !m.is_empty())
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    token: String,
    person: Person,
}

/// A downloaded export.
#[derive(Debug, Clone)]
pub struct Download {
    pub filename: Option<String>,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

fn disposition_filename(value: &str) -> Option<String> {
    value
        .split(';')
        .map(str::trim)
        .find_map(|part| part.strip_prefix("filename="))
        .map(|name| name.trim_matches('"').to_string())
        .filter(|name| !name.is_empty())
}

#[derive(Clone)]
pub struct ApiClient {
    http: Client,
    base_url: String,
    token: Option<String>,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: None,
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder) -> ClientResult<Response> {
        let response = self.authorized(request).send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = error_message(&body).unwrap_or_else(|| FALLBACK_MESSAGE.to_string());
        tracing::debug!("API request failed with {}: {}", status, message);
        Err(ClientError::Api {
            status: status.as_u16(),
            message,
        })
    }

    async fn json<T: DeserializeOwned>(&self, request: RequestBuilder) -> ClientResult<T> {
        Ok(self.send(request).await?.json().await?)
    }

    pub async fn login(&mut self, username: &str, password: &str) -> ClientResult<Person> {
        let body = serde_json::json!({ "username": username, "password": password });
        let response: LoginResponse = self
            .json(self.http.post(self.url("/auth/login")).json(&body))
            .await?;
        self.token = Some(response.token);
        Ok(response.person)
    }

    pub async fn logout(&mut self) -> ClientResult<()> {
        self.send(self.http.post(self.url("/auth/logout"))).await?;
        self.token = None;
        Ok(())
    }

    pub async fn me(&self) -> ClientResult<Person> {
        self.json(self.http.get(self.url("/auth/me"))).await
    }

    pub async fn request_password_reset(
        &self,
        username: &str,
        reason: Option<&str>,
    ) -> ClientResult<()> {
        let body = serde_json::json!({ "username": username, "reason": reason });
        self.send(self.http.post(self.url("/auth/password-reset")).json(&body))
            .await?;
        Ok(())
    }

    /// One page of `/api/{resource}`.
    pub async fn list<T: DeserializeOwned>(
        &self,
        resource: &str,
        query: &ListQuery,
    ) -> ClientResult<Page<T>> {
        let request = self
            .http
            .get(self.url(&format!("/api/{}", resource)))
            .query(&query.to_params());
        self.json(request).await
    }

    pub async fn get<T: DeserializeOwned>(&self, resource: &str, id: Uuid) -> ClientResult<T> {
        self.json(self.http.get(self.url(&format!("/api/{}/{}", resource, id))))
            .await
    }

    pub async fn create<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        resource: &str,
        body: &B,
    ) -> ClientResult<T> {
        self.json(self.http.post(self.url(&format!("/api/{}", resource))).json(body))
            .await
    }

    pub async fn update<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        resource: &str,
        id: Uuid,
        body: &B,
    ) -> ClientResult<T> {
        self.json(
            self.http
                .put(self.url(&format!("/api/{}/{}", resource, id)))
                .json(body),
        )
        .await
    }

    pub async fn delete(&self, resource: &str, id: Uuid) -> ClientResult<()> {
        self.send(self.http.delete(self.url(&format!("/api/{}/{}", resource, id))))
            .await?;
        Ok(())
    }

    pub async fn bulk_delete(
        &self,
        resource: &str,
        request: &BulkDeleteRequest,
    ) -> ClientResult<BulkDeleteResult> {
        self.json(
            self.http
                .post(self.url(&format!("/api/{}/bulk-delete", resource)))
                .json(request),
        )
        .await
    }

    pub async fn export(&self, resource: &str, request: &ExportRequest) -> ClientResult<Download> {
        let response = self
            .send(
                self.http
                    .post(self.url(&format!("/api/{}/export", resource)))
                    .json(request),
            )
            .await?;

        let header_text = |name: header::HeaderName| {
            response
                .headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        let filename = header_text(header::CONTENT_DISPOSITION)
            .as_deref()
            .and_then(disposition_filename);
        let content_type = header_text(header::CONTENT_TYPE);

        Ok(Download {
            filename,
            content_type,
            bytes: response.bytes().await?.to_vec(),
        })
    }

    pub async fn attendance(
        &self,
        cluster_id: Uuid,
        before: Option<ReportWeek>,
    ) -> ClientResult<AttendanceHistory> {
        let mut request = self
            .http
            .get(self.url(&format!("/api/clusters/{}/attendance", cluster_id)));
        if let Some(week) = before {
            request = request.query(&[("year", week.year.to_string()), ("week", week.week.to_string())]);
        }
        self.json(request).await
    }

    pub async fn preview_import(&self, csv: &str) -> ClientResult<ImportPreview> {
        let body = ImportCsvRequest { csv: csv.to_string() };
        self.json(self.http.post(self.url("/api/people/import/preview")).json(&body))
            .await
    }

    pub async fn import_people(&self, csv: &str) -> ClientResult<ImportResult> {
        let body = ImportCsvRequest { csv: csv.to_string() };
        self.json(self.http.post(self.url("/api/people/import")).json(&body))
            .await
    }
}
