use std::path::{Path, PathBuf};

use futures_util::StreamExt;
use reqwest::{Client, Response, StatusCode, multipart};
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;
use url::Url;
use uuid::Uuid;

use crate::models::{
    CreateFolderRequest, DeleteRequest, DocumentInfo, DocumentType, ElementInfo, FolderResponse,
    RelocateRequest, RenameRequest, SearchByMetadataRequest, UploadResponse,
};

const DEFAULT_BASE_URL: &str = "http://localhost:8081";
const API_PREFIX: &str = "/api/v1";

#[derive(Debug, Error)]
pub enum DmsError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("upload source has no file name: {0:?}")]
    InvalidSource(PathBuf),
    #[error("api returned {status}: {body}")]
    Api { status: StatusCode, body: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiErrorClass {
    Auth,
    NotFound,
    RateLimit,
    Transient,
    Permanent,
}

#[derive(Clone)]
pub struct DmsClient {
    http: Client,
    base_url: Url,
    token: String,
}

impl DmsClient {
    pub fn new(token: impl Into<String>) -> Result<Self, DmsError> {
        Self::with_base_url(DEFAULT_BASE_URL, token)
    }

    pub fn with_base_url(base_url: &str, token: impl Into<String>) -> Result<Self, DmsError> {
        Ok(Self {
            http: Client::new(),
            base_url: Url::parse(base_url)?,
            token: token.into(),
        })
    }

    pub async fn list_folder(&self, folder_id: Option<Uuid>) -> Result<Vec<ElementInfo>, DmsError> {
        let mut url = self.endpoint("/folders/list")?;
        if let Some(folder_id) = folder_id {
            url.query_pairs_mut()
                .append_pair("folderId", &folder_id.to_string());
        }
        let response = self
            .http
            .get(url)
            .header("Authorization", self.auth_header_value())
            .send()
            .await?;
        Self::handle_response(response).await
    }

    pub async fn create_folder(
        &self,
        request: &CreateFolderRequest,
    ) -> Result<FolderResponse, DmsError> {
        let url = self.endpoint("/folders")?;
        let response = self
            .http
            .post(url)
            .header("Authorization", self.auth_header_value())
            .json(request)
            .send()
            .await?;
        Self::handle_response(response).await
    }

    pub async fn rename(
        &self,
        kind: DocumentType,
        id: Uuid,
        request: &RenameRequest,
    ) -> Result<ElementInfo, DmsError> {
        let url = self.endpoint(&format!("/{}/{id}/rename", kind.collection()))?;
        let response = self
            .http
            .put(url)
            .header("Authorization", self.auth_header_value())
            .json(request)
            .send()
            .await?;
        Self::handle_response(response).await
    }

    pub async fn move_documents(
        &self,
        kind: DocumentType,
        request: &RelocateRequest,
    ) -> Result<(), DmsError> {
        let url = self.endpoint(&format!("/{}/move", kind.collection()))?;
        let response = self
            .http
            .post(url)
            .header("Authorization", self.auth_header_value())
            .json(request)
            .send()
            .await?;
        Self::handle_empty(response).await
    }

    pub async fn copy_documents(
        &self,
        kind: DocumentType,
        request: &RelocateRequest,
    ) -> Result<(), DmsError> {
        let url = self.endpoint(&format!("/{}/copy", kind.collection()))?;
        let response = self
            .http
            .post(url)
            .header("Authorization", self.auth_header_value())
            .json(request)
            .send()
            .await?;
        // File copies answer with the created copies; callers re-list instead.
        Self::handle_empty(response).await
    }

    pub async fn delete_documents(
        &self,
        kind: DocumentType,
        request: &DeleteRequest,
    ) -> Result<(), DmsError> {
        let url = self.endpoint(&format!("/{}", kind.collection()))?;
        let response = self
            .http
            .delete(url)
            .header("Authorization", self.auth_header_value())
            .json(request)
            .send()
            .await?;
        Self::handle_empty(response).await
    }

    pub async fn document_info(
        &self,
        id: Uuid,
        with_metadata: bool,
    ) -> Result<DocumentInfo, DmsError> {
        let mut url = self.endpoint(&format!("/documents/{id}/info"))?;
        url.query_pairs_mut().append_pair(
            "withMetadata",
            if with_metadata { "true" } else { "false" },
        );
        let response = self
            .http
            .get(url)
            .header("Authorization", self.auth_header_value())
            .send()
            .await?;
        Self::handle_response(response).await
    }

    pub async fn upload_document(
        &self,
        source: &Path,
        parent_folder_id: Option<Uuid>,
        allow_duplicate_file_names: bool,
    ) -> Result<UploadResponse, DmsError> {
        let file_name = source
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| DmsError::InvalidSource(source.to_path_buf()))?;
        let file = tokio::fs::File::open(source).await?;
        let length = file.metadata().await?.len();
        let body = reqwest::Body::wrap_stream(ReaderStream::new(file));
        let part = multipart::Part::stream_with_length(body, length).file_name(file_name);
        let mut form = multipart::Form::new().part("file", part);
        if let Some(parent) = parent_folder_id {
            form = form.text("parentFolderId", parent.to_string());
        }

        let mut url = self.endpoint("/documents/upload")?;
        url.query_pairs_mut().append_pair(
            "allowDuplicateFileNames",
            if allow_duplicate_file_names {
                "true"
            } else {
                "false"
            },
        );
        let response = self
            .http
            .post(url)
            .header("Authorization", self.auth_header_value())
            .multipart(form)
            .send()
            .await?;
        Self::handle_response(response).await
    }

    /// Streams one document into `target`, returning the number of bytes written.
    pub async fn download_document_to(&self, id: Uuid, target: &Path) -> Result<u64, DmsError> {
        let url = self.endpoint(&format!("/documents/{id}/download"))?;
        let response = self
            .http
            .get(url)
            .header("Authorization", self.auth_header_value())
            .send()
            .await?;
        let response = Self::check_status(response).await?;
        stream_to_path(response, target).await
    }

    /// Streams a server-built archive of `ids` into `target`.
    pub async fn download_multiple_to(&self, ids: &[Uuid], target: &Path) -> Result<u64, DmsError> {
        let url = self.endpoint("/documents/download-multiple")?;
        let response = self
            .http
            .post(url)
            .header("Authorization", self.auth_header_value())
            .json(ids)
            .send()
            .await?;
        let response = Self::check_status(response).await?;
        stream_to_path(response, target).await
    }

    pub async fn search_ids_by_metadata(
        &self,
        request: &SearchByMetadataRequest,
    ) -> Result<Vec<Uuid>, DmsError> {
        let url = self.endpoint("/documents/search/ids-by-metadata")?;
        let response = self
            .http
            .post(url)
            .header("Authorization", self.auth_header_value())
            .json(request)
            .send()
            .await?;
        Self::handle_response(response).await
    }

    fn auth_header_value(&self) -> String {
        format!("Bearer {}", self.token)
    }

    fn endpoint(&self, path: &str) -> Result<Url, DmsError> {
        Ok(self.base_url.join(&format!("{API_PREFIX}{path}"))?)
    }

    async fn handle_response<T: serde::de::DeserializeOwned>(
        response: Response,
    ) -> Result<T, DmsError> {
        let response = Self::check_status(response).await?;
        Ok(response.json::<T>().await?)
    }

    async fn handle_empty(response: Response) -> Result<(), DmsError> {
        Self::check_status(response).await.map(|_| ())
    }

    async fn check_status(response: Response) -> Result<Response, DmsError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::debug!(%status, "api request rejected");
            Err(DmsError::Api { status, body })
        }
    }
}

impl DmsError {
    pub fn classification(&self) -> Option<ApiErrorClass> {
        match self {
            DmsError::Api { status, .. } => Some(classify_api_status(*status)),
            _ => None,
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(
            self.classification(),
            Some(ApiErrorClass::RateLimit | ApiErrorClass::Transient)
        )
    }
}

fn classify_api_status(status: StatusCode) -> ApiErrorClass {
    if matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
        ApiErrorClass::Auth
    } else if status == StatusCode::NOT_FOUND {
        ApiErrorClass::NotFound
    } else if status == StatusCode::TOO_MANY_REQUESTS {
        ApiErrorClass::RateLimit
    } else if status.is_server_error()
        || matches!(
            status,
            StatusCode::REQUEST_TIMEOUT | StatusCode::CONFLICT | StatusCode::TOO_EARLY
        )
    {
        ApiErrorClass::Transient
    } else {
        ApiErrorClass::Permanent
    }
}

async fn stream_to_path(response: Response, target: &Path) -> Result<u64, DmsError> {
    if let Some(parent) = target.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let partial = partial_path(target);
    let mut file = tokio::fs::File::create(&partial).await?;
    let mut stream = response.bytes_stream();
    let mut written = 0u64;

    while let Some(chunk) = stream.next().await {
        let chunk = match chunk {
            Ok(chunk) => chunk,
            Err(err) => {
                drop(file);
                let _ = tokio::fs::remove_file(&partial).await;
                return Err(err.into());
            }
        };
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }

    file.flush().await?;
    file.sync_all().await?;
    tokio::fs::rename(partial, target).await?;
    Ok(written)
}

fn partial_path(target: &Path) -> PathBuf {
    target.with_extension(format!(
        "{}partial",
        target
            .extension()
            .map(|ext| format!("{}.", ext.to_string_lossy()))
            .unwrap_or_default()
    ))
}
