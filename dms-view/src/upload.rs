use std::path::{Path, PathBuf};
use std::sync::Arc;

use dms_core::UploadResponse;
use tokio::sync::{Semaphore, mpsc};

use crate::model::DocumentId;
use crate::namespace::NamespaceClient;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadStatus {
    Pending,
    Succeeded(UploadResponse),
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadTask {
    pub source: PathBuf,
    pub parent_folder: Option<DocumentId>,
    pub status: UploadStatus,
}

impl UploadTask {
    pub fn new(source: impl Into<PathBuf>, parent_folder: Option<DocumentId>) -> Self {
        Self {
            source: source.into(),
            parent_folder,
            status: UploadStatus::Pending,
        }
    }

    pub fn file_name(&self) -> String {
        self.source
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.source.display().to_string())
    }

    pub fn is_settled(&self) -> bool {
        !matches!(self.status, UploadStatus::Pending)
    }
}

/// Runs uploads independently of each other, at most `concurrency` at a time.
/// Each task reports on `settled` exactly once.
#[derive(Clone)]
pub struct UploadCoordinator {
    client: Arc<dyn NamespaceClient>,
    permits: Arc<Semaphore>,
    allow_duplicate_names: bool,
}

impl UploadCoordinator {
    pub fn new(
        client: Arc<dyn NamespaceClient>,
        concurrency: usize,
        allow_duplicate_names: bool,
    ) -> Self {
        Self {
            client,
            permits: Arc::new(Semaphore::new(concurrency.max(1))),
            allow_duplicate_names,
        }
    }

    /// Starts one task per file and returns immediately.
    pub fn upload(
        &self,
        files: Vec<PathBuf>,
        parent: Option<DocumentId>,
        settled: mpsc::UnboundedSender<UploadTask>,
    ) -> usize {
        let count = files.len();
        for source in files {
            let coordinator = self.clone();
            let settled = settled.clone();
            tokio::spawn(async move {
                let task = coordinator.upload_one(&source, parent).await;
                if settled.send(task).is_err() {
                    tracing::debug!(source = %source.display(), "upload settled after view closed");
                }
            });
        }
        count
    }

    pub async fn upload_one(&self, source: &Path, parent: Option<DocumentId>) -> UploadTask {
        let mut task = UploadTask::new(source, parent);
        let status = match self.permits.acquire().await {
            Ok(_permit) => {
                tracing::debug!(file = %task.file_name(), "uploading");
                match self
                    .client
                    .upload_file(source, parent, self.allow_duplicate_names)
                    .await
                {
                    Ok(response) => UploadStatus::Succeeded(response),
                    Err(err) => {
                        tracing::warn!(
                            file = %task.file_name(),
                            %err,
                            class = ?err.classification(),
                            retryable = err.is_retryable(),
                            "upload failed"
                        );
                        UploadStatus::Failed(err.to_string())
                    }
                }
            }
            Err(err) => UploadStatus::Failed(err.to_string()),
        };
        task.status = status;
        task
    }
}
