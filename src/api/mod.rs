//! HTTP client for the compliance backend.
//!
//! Every endpoint goes through [`ApiClient::request`], which turns non-2xx responses into
//! [`ApiError::Status`] carrying the body text and decodes JSON bodies by content type.

mod error;

pub use error::ApiError;

use crate::helpers::file::mime_for;
use crate::model::{
    CheckProgress, CheckRequest, ClientConfig, FileKind, ModuleSelection, Requirements,
    UploadedFile, VgcListRequest,
};
use anyhow::{Context, Result};
use bytes::Bytes;
use futures::{stream, StreamExt};
use reqwest::header::CONTENT_TYPE;
use reqwest::multipart::{Form, Part};
use reqwest::{Method, RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::path::{Path, PathBuf};

/// Non-2xx responses become [`ApiError::Status`] with the body text, or
/// `Request failed: <status>` when the body is empty.
async fn error_for_status(resp: Response) -> Result<Response, ApiError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let text = resp.text().await.unwrap_or_default();
    let message = if text.is_empty() {
        format!("Request failed: {}", status.as_u16())
    } else {
        text
    };
    Err(ApiError::Status {
        status: status.as_u16(),
        message,
    })
}

/// Upper bound on uploads in flight for a multi-file upload.
const UPLOAD_CONCURRENCY: usize = 4;

/// Decoded response body.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Json(Value),
    Text(String),
}

impl Payload {
    pub fn into_json(self) -> Value {
        match self {
            Payload::Json(v) => v,
            Payload::Text(s) => Value::String(s),
        }
    }

    /// Render for display: pretty JSON or the raw text.
    pub fn render(&self) -> String {
        match self {
            Payload::Json(v) => serde_json::to_string_pretty(v).unwrap_or_else(|_| v.to_string()),
            Payload::Text(s) => s.clone(),
        }
    }
}

/// A local file ready to be sent to `/uploads`.
#[derive(Debug, Clone)]
pub struct UploadSource {
    pub path: PathBuf,
    pub file_name: String,
    pub mime: &'static str,
    pub body: Bytes,
}

impl UploadSource {
    pub async fn read(path: &Path, kind: FileKind) -> Result<Self> {
        let mime = mime_for(kind, path)?;
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .map(String::from)
            .with_context(|| format!("{} has no file name", path.display()))?;
        let body = tokio::fs::read(path)
            .await
            .map_err(|source| ApiError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(Self {
            path: path.to_path_buf(),
            file_name,
            mime,
            body: Bytes::from(body),
        })
    }
}

#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: Url,
}

impl ApiClient {
    pub fn new(cfg: &ClientConfig) -> Result<Self> {
        let mut base_url = Url::parse(&cfg.base_url)
            .with_context(|| format!("invalid base URL {:?}", cfg.base_url))?;
        if base_url.cannot_be_a_base() {
            anyhow::bail!("base URL {:?} cannot carry a path", cfg.base_url);
        }
        // Segments are appended later; drop a trailing slash so `/api/` and `/api` agree.
        if let Ok(mut segs) = base_url.path_segments_mut() {
            segs.pop_if_empty();
        }
        let http = reqwest::Client::builder()
            .user_agent(cfg.user_agent.clone())
            .timeout(cfg.request_timeout)
            .build()
            .context("build HTTP client")?;
        Ok(Self { http, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Endpoint URL with each segment percent-encoded.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segs) = url.path_segments_mut() {
            segs.extend(segments);
        }
        url
    }

    async fn request(&self, req: RequestBuilder, path: &str) -> Result<Payload, ApiError> {
        let transport = |source| ApiError::Transport {
            path: path.to_string(),
            source,
        };
        let resp = req.send().await.map_err(transport)?;
        tracing::debug!(status = %resp.status(), path, "response");
        let resp = error_for_status(resp).await?;
        let is_json = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.contains("application/json"));
        if is_json {
            let body = resp.bytes().await.map_err(transport)?;
            serde_json::from_slice(&body)
                .map(Payload::Json)
                .map_err(|source| ApiError::Decode {
                    path: path.to_string(),
                    source,
                })
        } else {
            resp.text().await.map(Payload::Text).map_err(transport)
        }
    }

    async fn request_typed<T: DeserializeOwned>(
        &self,
        req: RequestBuilder,
        path: &str,
    ) -> Result<T, ApiError> {
        let value = self.request(req, path).await?.into_json();
        serde_json::from_value(value).map_err(|source| ApiError::Decode {
            path: path.to_string(),
            source,
        })
    }

    fn builder(&self, method: Method, url: Url) -> RequestBuilder {
        tracing::debug!(%method, %url, "request");
        self.http.request(method, url)
    }

    pub async fn upload_file(
        &self,
        source: UploadSource,
        kind: FileKind,
    ) -> Result<UploadedFile, ApiError> {
        let len = source.body.len() as u64;
        let part = Part::stream_with_length(reqwest::Body::from(source.body), len)
            .file_name(source.file_name.clone())
            .mime_str(source.mime)
            .map_err(|e| ApiError::Transport {
                path: "/uploads".into(),
                source: e,
            })?;
        let form = Form::new()
            .part("file", part)
            .text("document_type", kind.as_str());
        let req = self
            .builder(Method::POST, self.endpoint(&["uploads"]))
            .multipart(form);
        let uploaded: UploadedFile = self.request_typed(req, "/uploads").await?;
        tracing::info!(file = %source.file_name, key = %uploaded.object_key, %kind, "uploaded");
        Ok(uploaded)
    }

    /// Upload several files concurrently. Each file reports its own outcome.
    pub async fn upload_files(
        &self,
        sources: Vec<UploadSource>,
        kind: FileKind,
    ) -> Vec<(PathBuf, Result<UploadedFile, ApiError>)> {
        stream::iter(sources)
            .map(|source| async move {
                let path = source.path.clone();
                (path, self.upload_file(source, kind).await)
            })
            .buffer_unordered(UPLOAD_CONCURRENCY)
            .collect()
            .await
    }

    pub async fn file_status(&self, key: &str) -> Result<Payload, ApiError> {
        let mut url = self.endpoint(&["documents", "status"]);
        url.query_pairs_mut().append_pair("keys", key);
        self.request(self.builder(Method::GET, url), "/documents/status")
            .await
    }

    pub async fn download_file(&self, key: &str) -> Result<Bytes, ApiError> {
        let path = format!("/files/{key}");
        let transport = |source| ApiError::Transport {
            path: path.clone(),
            source,
        };
        let resp = self
            .builder(Method::GET, self.endpoint(&["files", key]))
            .send()
            .await
            .map_err(transport)?;
        error_for_status(resp).await?.bytes().await.map_err(transport)
    }

    pub async fn remove_file(&self, key: &str) -> Result<Payload, ApiError> {
        let req = self.builder(Method::DELETE, self.endpoint(&["files", key]));
        self.request(req, &format!("/files/{key}")).await
    }

    /// Submit a check and return its id.
    pub async fn start_check(&self, body: &CheckRequest) -> Result<String, ApiError> {
        let req = self
            .builder(Method::POST, self.endpoint(&["checks"]))
            .json(body);
        let payload = self.request(req, "/checks").await?;
        Ok(extract_check_id(&payload))
    }

    pub async fn check_progress(&self, check_id: &str) -> Result<CheckProgress, ApiError> {
        let req = self.builder(Method::GET, self.endpoint(&["checks", check_id]));
        self.request_typed(req, &format!("/checks/{check_id}")).await
    }

    pub async fn list_checks(&self) -> Result<Vec<String>, ApiError> {
        let req = self.builder(Method::GET, self.endpoint(&["checks"]));
        let payload = self.request(req, "/checks").await?;
        Ok(match payload.into_json() {
            Value::Array(items) => items.iter().filter_map(id_from_value).collect(),
            _ => Vec::new(),
        })
    }

    pub async fn requirements(&self, modules: ModuleSelection) -> Result<Requirements, ApiError> {
        let mut url = self.endpoint(&["requirements"]);
        url.query_pairs_mut()
            .append_pair("modules", &modules.requirements_query());
        self.request_typed(self.builder(Method::GET, url), "/requirements")
            .await
    }

    pub async fn start_vgc_list(&self, document_keys: Vec<String>) -> Result<String, ApiError> {
        let req = self
            .builder(Method::POST, self.endpoint(&["vgc-lists"]))
            .json(&VgcListRequest { document_keys });
        let payload = self.request(req, "/vgc-lists").await?;
        Ok(extract_check_id(&payload))
    }

    pub async fn vgc_list_progress(&self, check_id: &str) -> Result<CheckProgress, ApiError> {
        let req = self.builder(Method::GET, self.endpoint(&["vgc-lists", check_id]));
        self.request_typed(req, &format!("/vgc-lists/{check_id}"))
            .await
    }
}

fn id_from_value(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Object(map) => ["id", "checkId", "check_id"]
            .iter()
            .find_map(|k| map.get(*k))
            .and_then(id_from_value),
        _ => None,
    }
}

/// Check id from a start response: `id`, then `checkId`, then `check_id`, else the body itself.
pub fn extract_check_id(payload: &Payload) -> String {
    match payload {
        Payload::Json(v) => id_from_value(v).unwrap_or_else(|| v.to_string()),
        Payload::Text(s) => s.trim().to_string(),
    }
}
