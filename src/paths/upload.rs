//! Sandbox file upload.
//!
//! Streams a caller-local file to the backend's upload endpoint as multipart
//! field `file`, authenticated as the caller, and turns the returned
//! `pathname` into an absolute sandbox path.

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde_json::Value;
use std::path::Path;
use tokio_util::io::ReaderStream;

use crate::types::{Error, Result};

/// Longest slice of an error body echoed into an `UploadFailed` message.
const ERROR_BODY_PREVIEW: usize = 256;

/// Moves a local file into the backend sandbox.
#[async_trait]
pub trait FileUploader: Send + Sync + std::fmt::Debug {
    /// Upload `local_path` on behalf of the holder of `bearer_token` and
    /// return the sandbox path the backend assigned to it.
    async fn upload(&self, local_path: &str, bearer_token: &str) -> Result<String>;
}

/// [`FileUploader`] backed by the sandbox HTTP upload endpoint.
#[derive(Debug, Clone)]
pub struct SandboxUploader {
    http: reqwest::Client,
    upload_url: String,
    sandbox_root: String,
}

impl SandboxUploader {
    pub fn new(
        http: reqwest::Client,
        upload_url: impl Into<String>,
        sandbox_root: impl Into<String>,
    ) -> Self {
        Self {
            http,
            upload_url: upload_url.into(),
            sandbox_root: sandbox_root.into(),
        }
    }
}

#[async_trait]
impl FileUploader for SandboxUploader {
    async fn upload(&self, local_path: &str, bearer_token: &str) -> Result<String> {
        let file = tokio::fs::File::open(local_path)
            .await
            .map_err(|e| Error::upload_failed(format!("cannot open {}: {}", local_path, e)))?;
        let len = file
            .metadata()
            .await
            .map_err(|e| Error::upload_failed(format!("cannot stat {}: {}", local_path, e)))?
            .len();
        let file_name = Path::new(local_path)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("upload.bin")
            .to_string();

        let body = reqwest::Body::wrap_stream(ReaderStream::new(file));
        let part = Part::stream_with_length(body, len)
            .file_name(file_name)
            .mime_str("application/octet-stream")
            .map_err(|e| Error::upload_failed(e.to_string()))?;
        let form = Form::new().part("file", part);

        tracing::info!(local = %local_path, bytes = len, "uploading file to sandbox");

        let response = self
            .http
            .post(&self.upload_url)
            .bearer_auth(bearer_token)
            .multipart(form)
            .send()
            .await
            .map_err(|e| Error::upload_failed(format!("upload request failed: {}", e)))?;

        // Status first: error bodies are not expected to be JSON.
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let preview: String = body.chars().take(ERROR_BODY_PREVIEW).collect();
            return Err(Error::upload_failed(format!(
                "upload endpoint returned HTTP {}: {}",
                status.as_u16(),
                preview
            )));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| Error::upload_failed(format!("unparseable upload response: {}", e)))?;
        let pathname = body
            .get("pathname")
            .and_then(Value::as_str)
            .filter(|p| !p.trim_matches('/').is_empty())
            .ok_or_else(|| Error::upload_failed("upload response has no pathname"))?;

        Ok(sandbox_path(&self.sandbox_root, pathname))
    }
}

/// Absolute sandbox path for a `pathname` returned by the upload endpoint.
///
/// The endpoint may answer either relative to the sandbox root (`abc123`)
/// or with the root included (`sandbox/abc123`); both map to `/sandbox/abc123`.
pub fn sandbox_path(root: &str, pathname: &str) -> String {
    let root = format!("/{}", root.trim_matches('/'));
    let pathname = pathname.trim_start_matches('/');
    let root_prefix = format!("{}/", root.trim_start_matches('/'));

    if root == "/" || pathname.starts_with(&root_prefix) {
        format!("/{}", pathname)
    } else {
        format!("{}/{}", root, pathname)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relative_pathname_is_rooted() {
        assert_eq!(sandbox_path("/sandbox", "abc123"), "/sandbox/abc123");
    }

    #[test]
    fn test_pathname_already_under_root() {
        assert_eq!(sandbox_path("/sandbox", "sandbox/abc123"), "/sandbox/abc123");
        assert_eq!(sandbox_path("/sandbox/", "/sandbox/abc123"), "/sandbox/abc123");
    }

    #[test]
    fn test_similar_prefix_is_not_root() {
        assert_eq!(sandbox_path("/sandbox", "sandboxes/x"), "/sandbox/sandboxes/x");
    }

    #[test]
    fn test_empty_root() {
        assert_eq!(sandbox_path("/", "abc"), "/abc");
    }

    #[tokio::test]
    async fn test_missing_local_file_fails_before_any_request() {
        // Unroutable endpoint: reaching the network would error differently.
        let uploader = SandboxUploader::new(
            reqwest::Client::new(),
            "http://127.0.0.1:9/workspace/upload",
            "/sandbox",
        );
        let err = uploader
            .upload("/definitely/not/here.bin", "tok")
            .await
            .unwrap_err();
        match err {
            Error::UploadFailed(msg) => assert!(msg.starts_with("cannot open")),
            other => panic!("expected UploadFailed, got {:?}", other),
        }
    }
}
