use std::path::Path;

use async_trait::async_trait;
use dms_core::{
    CreateFolderRequest, DeleteRequest, DmsClient, DmsError, DocumentInfo, ElementInfo,
    FolderResponse, RelocateRequest, RenameRequest, SearchByMetadataRequest, UploadResponse,
};

use crate::model::{DocumentId, NodeKind};

/// Remote operations the view layer consumes.
///
/// Mutations that exist per kind take the kind explicitly; implementations
/// route them to the matching endpoint family and never mix kinds in one call.
#[async_trait]
pub trait NamespaceClient: Send + Sync + 'static {
    async fn list(&self, folder: Option<DocumentId>) -> Result<Vec<ElementInfo>, DmsError>;

    async fn create_folder(
        &self,
        name: &str,
        parent: Option<DocumentId>,
    ) -> Result<FolderResponse, DmsError>;

    async fn rename(
        &self,
        id: DocumentId,
        kind: NodeKind,
        new_name: &str,
    ) -> Result<ElementInfo, DmsError>;

    async fn move_items(
        &self,
        kind: NodeKind,
        ids: &[DocumentId],
        target: Option<DocumentId>,
        allow_duplicate_names: bool,
    ) -> Result<(), DmsError>;

    async fn copy_items(
        &self,
        kind: NodeKind,
        ids: &[DocumentId],
        target: Option<DocumentId>,
        allow_duplicate_names: bool,
    ) -> Result<(), DmsError>;

    async fn delete_items(&self, kind: NodeKind, ids: &[DocumentId]) -> Result<(), DmsError>;

    async fn upload_file(
        &self,
        source: &Path,
        parent: Option<DocumentId>,
        allow_duplicate_names: bool,
    ) -> Result<UploadResponse, DmsError>;

    async fn download_file(&self, id: DocumentId, target: &Path) -> Result<u64, DmsError>;

    async fn download_many(&self, ids: &[DocumentId], target: &Path) -> Result<u64, DmsError>;

    async fn document_info(&self, id: DocumentId) -> Result<DocumentInfo, DmsError>;

    async fn search_by_metadata(
        &self,
        criteria: &SearchByMetadataRequest,
    ) -> Result<Vec<DocumentId>, DmsError>;
}

#[async_trait]
impl NamespaceClient for DmsClient {
    async fn list(&self, folder: Option<DocumentId>) -> Result<Vec<ElementInfo>, DmsError> {
        self.list_folder(folder).await
    }

    async fn create_folder(
        &self,
        name: &str,
        parent: Option<DocumentId>,
    ) -> Result<FolderResponse, DmsError> {
        DmsClient::create_folder(
            self,
            &CreateFolderRequest {
                name: name.to_string(),
                parent_id: parent,
            },
        )
        .await
    }

    async fn rename(
        &self,
        id: DocumentId,
        kind: NodeKind,
        new_name: &str,
    ) -> Result<ElementInfo, DmsError> {
        DmsClient::rename(
            self,
            kind.into(),
            id,
            &RenameRequest {
                new_name: new_name.to_string(),
            },
        )
        .await
    }

    async fn move_items(
        &self,
        kind: NodeKind,
        ids: &[DocumentId],
        target: Option<DocumentId>,
        allow_duplicate_names: bool,
    ) -> Result<(), DmsError> {
        self.move_documents(kind.into(), &relocate(ids, target, allow_duplicate_names))
            .await
    }

    async fn copy_items(
        &self,
        kind: NodeKind,
        ids: &[DocumentId],
        target: Option<DocumentId>,
        allow_duplicate_names: bool,
    ) -> Result<(), DmsError> {
        self.copy_documents(kind.into(), &relocate(ids, target, allow_duplicate_names))
            .await
    }

    async fn delete_items(&self, kind: NodeKind, ids: &[DocumentId]) -> Result<(), DmsError> {
        self.delete_documents(
            kind.into(),
            &DeleteRequest {
                document_ids: ids.to_vec(),
            },
        )
        .await
    }

    async fn upload_file(
        &self,
        source: &Path,
        parent: Option<DocumentId>,
        allow_duplicate_names: bool,
    ) -> Result<UploadResponse, DmsError> {
        self.upload_document(source, parent, allow_duplicate_names)
            .await
    }

    async fn download_file(&self, id: DocumentId, target: &Path) -> Result<u64, DmsError> {
        self.download_document_to(id, target).await
    }

    async fn download_many(&self, ids: &[DocumentId], target: &Path) -> Result<u64, DmsError> {
        self.download_multiple_to(ids, target).await
    }

    async fn document_info(&self, id: DocumentId) -> Result<DocumentInfo, DmsError> {
        DmsClient::document_info(self, id, false).await
    }

    async fn search_by_metadata(
        &self,
        criteria: &SearchByMetadataRequest,
    ) -> Result<Vec<DocumentId>, DmsError> {
        self.search_ids_by_metadata(criteria).await
    }
}

fn relocate(
    ids: &[DocumentId],
    target: Option<DocumentId>,
    allow_duplicate_names: bool,
) -> RelocateRequest {
    RelocateRequest {
        document_ids: ids.to_vec(),
        target_folder_id: target,
        allow_duplicate_file_names: allow_duplicate_names,
    }
}
