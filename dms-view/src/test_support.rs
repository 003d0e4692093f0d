//! In-memory namespace used by unit tests across the crate.

use std::collections::{HashMap, HashSet, VecDeque};
use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use dms_core::{
    DmsError, DocumentInfo, DocumentType, ElementInfo, FolderResponse, SearchByMetadataRequest,
    StatusCode, UploadResponse,
};
use tokio::sync::oneshot;
use uuid::Uuid;

use crate::model::{DocumentId, NodeKind};
use crate::namespace::NamespaceClient;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FakeOp {
    List,
    CreateFolder,
    Rename,
    Move,
    Copy,
    Delete,
    Upload,
    DownloadOne,
    DownloadArchive,
    Info,
}

#[derive(Debug, Clone)]
struct FakeDoc {
    name: String,
    kind: NodeKind,
    parent: Option<DocumentId>,
}

#[derive(Default)]
struct FakeState {
    docs: HashMap<DocumentId, FakeDoc>,
    failing: HashSet<(FakeOp, Option<NodeKind>)>,
    failing_listings: HashSet<Option<DocumentId>>,
    failing_uploads: HashSet<String>,
    holds: HashMap<Option<DocumentId>, VecDeque<oneshot::Receiver<()>>>,
    list_calls: HashMap<Option<DocumentId>, usize>,
    calls: HashMap<FakeOp, usize>,
}

#[derive(Default)]
pub struct FakeNamespace {
    state: Mutex<FakeState>,
}

fn injected(op: FakeOp) -> DmsError {
    DmsError::Api {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        body: format!("injected {op:?} failure"),
    }
}

fn not_found(id: DocumentId) -> DmsError {
    DmsError::Api {
        status: StatusCode::NOT_FOUND,
        body: format!("{id} not found"),
    }
}

impl FakeNamespace {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }

    fn insert(&self, parent: Option<DocumentId>, name: &str, kind: NodeKind) -> DocumentId {
        let id = Uuid::new_v4();
        self.lock().docs.insert(
            id,
            FakeDoc {
                name: name.to_string(),
                kind,
                parent,
            },
        );
        id
    }

    pub fn add_folder(&self, parent: Option<DocumentId>, name: &str) -> DocumentId {
        self.insert(parent, name, NodeKind::Folder)
    }

    pub fn add_file(&self, parent: Option<DocumentId>, name: &str) -> DocumentId {
        self.insert(parent, name, NodeKind::File)
    }

    pub fn reparent(&self, id: DocumentId, parent: Option<DocumentId>) {
        if let Some(doc) = self.lock().docs.get_mut(&id) {
            doc.parent = parent;
        }
    }

    pub fn contains(&self, id: DocumentId) -> bool {
        self.lock().docs.contains_key(&id)
    }

    pub fn parent_of(&self, id: DocumentId) -> Option<DocumentId> {
        self.lock().docs.get(&id).and_then(|doc| doc.parent)
    }

    pub fn name_of(&self, id: DocumentId) -> Option<String> {
        self.lock().docs.get(&id).map(|doc| doc.name.clone())
    }

    pub fn children_named(&self, parent: Option<DocumentId>) -> Vec<String> {
        let mut names: Vec<String> = self
            .lock()
            .docs
            .values()
            .filter(|doc| doc.parent == parent)
            .map(|doc| doc.name.clone())
            .collect();
        names.sort();
        names
    }

    /// Makes every `op` call for `kind` fail.
    pub fn fail(&self, op: FakeOp, kind: NodeKind) {
        self.lock().failing.insert((op, Some(kind)));
    }

    /// Makes every `op` call fail regardless of kind.
    pub fn fail_all(&self, op: FakeOp) {
        self.lock().failing.insert((op, None));
    }

    pub fn fail_listing(&self, folder: Option<DocumentId>) {
        self.lock().failing_listings.insert(folder);
    }

    pub fn fail_upload(&self, file_name: &str) {
        self.lock().failing_uploads.insert(file_name.to_string());
    }

    /// The next listing of `folder` blocks until the returned sender fires
    /// or is dropped.
    pub fn hold_listing(&self, folder: Option<DocumentId>) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.lock().holds.entry(folder).or_default().push_back(rx);
        tx
    }

    pub fn list_calls(&self, folder: Option<DocumentId>) -> usize {
        self.lock().list_calls.get(&folder).copied().unwrap_or(0)
    }

    pub fn info_calls(&self) -> usize {
        self.mutation_calls(FakeOp::Info)
    }

    pub fn mutation_calls(&self, op: FakeOp) -> usize {
        self.lock().calls.get(&op).copied().unwrap_or(0)
    }

    /// Records the call and reports whether an injected failure applies.
    fn record(&self, op: FakeOp, kind: Option<NodeKind>) -> Result<(), DmsError> {
        let mut state = self.lock();
        *state.calls.entry(op).or_default() += 1;
        if state.failing.contains(&(op, None))
            || (kind.is_some() && state.failing.contains(&(op, kind)))
        {
            return Err(injected(op));
        }
        Ok(())
    }

    fn element(id: DocumentId, doc: &FakeDoc) -> ElementInfo {
        ElementInfo {
            id,
            document_type: doc.kind.into(),
            name: doc.name.clone(),
            size: (doc.kind == NodeKind::File).then_some(3),
            modified_at: None,
        }
    }
}

#[async_trait]
impl NamespaceClient for FakeNamespace {
    async fn list(&self, folder: Option<DocumentId>) -> Result<Vec<ElementInfo>, DmsError> {
        let hold = {
            let mut state = self.lock();
            *state.list_calls.entry(folder).or_default() += 1;
            state.holds.get_mut(&folder).and_then(VecDeque::pop_front)
        };
        self.record(FakeOp::List, None)?;
        if let Some(hold) = hold {
            let _ = hold.await;
        }
        let state = self.lock();
        if state.failing_listings.contains(&folder) {
            return Err(injected(FakeOp::List));
        }
        let mut children: Vec<ElementInfo> = state
            .docs
            .iter()
            .filter(|(_, doc)| doc.parent == folder)
            .map(|(id, doc)| Self::element(*id, doc))
            .collect();
        children.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(children)
    }

    async fn create_folder(
        &self,
        name: &str,
        parent: Option<DocumentId>,
    ) -> Result<FolderResponse, DmsError> {
        self.record(FakeOp::CreateFolder, Some(NodeKind::Folder))?;
        let id = self.add_folder(parent, name);
        Ok(FolderResponse {
            id,
            name: name.to_string(),
            parent_id: parent,
        })
    }

    async fn rename(
        &self,
        id: DocumentId,
        kind: NodeKind,
        new_name: &str,
    ) -> Result<ElementInfo, DmsError> {
        self.record(FakeOp::Rename, Some(kind))?;
        let mut state = self.lock();
        let doc = state.docs.get_mut(&id).ok_or_else(|| not_found(id))?;
        doc.name = new_name.to_string();
        Ok(Self::element(id, doc))
    }

    async fn move_items(
        &self,
        kind: NodeKind,
        ids: &[DocumentId],
        target: Option<DocumentId>,
        _allow_duplicate_names: bool,
    ) -> Result<(), DmsError> {
        self.record(FakeOp::Move, Some(kind))?;
        let mut state = self.lock();
        for id in ids {
            let doc = state.docs.get_mut(id).ok_or_else(|| not_found(*id))?;
            doc.parent = target;
        }
        Ok(())
    }

    async fn copy_items(
        &self,
        kind: NodeKind,
        ids: &[DocumentId],
        target: Option<DocumentId>,
        _allow_duplicate_names: bool,
    ) -> Result<(), DmsError> {
        self.record(FakeOp::Copy, Some(kind))?;
        let mut state = self.lock();
        for id in ids {
            let mut copy = state.docs.get(id).cloned().ok_or_else(|| not_found(*id))?;
            copy.parent = target;
            state.docs.insert(Uuid::new_v4(), copy);
        }
        Ok(())
    }

    async fn delete_items(&self, kind: NodeKind, ids: &[DocumentId]) -> Result<(), DmsError> {
        self.record(FakeOp::Delete, Some(kind))?;
        let mut state = self.lock();
        for id in ids {
            state.docs.remove(id);
        }
        Ok(())
    }

    async fn upload_file(
        &self,
        source: &Path,
        parent: Option<DocumentId>,
        _allow_duplicate_names: bool,
    ) -> Result<UploadResponse, DmsError> {
        self.record(FakeOp::Upload, Some(NodeKind::File))?;
        let name = source
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| DmsError::InvalidSource(source.to_path_buf()))?;
        if self.lock().failing_uploads.contains(&name) {
            return Err(injected(FakeOp::Upload));
        }
        let id = self.add_file(parent, &name);
        Ok(UploadResponse {
            id,
            name,
            content_type: None,
            size: Some(3),
        })
    }

    async fn download_file(&self, id: DocumentId, target: &Path) -> Result<u64, DmsError> {
        self.record(FakeOp::DownloadOne, Some(NodeKind::File))?;
        if !self.contains(id) {
            return Err(not_found(id));
        }
        std::fs::write(target, b"abc")?;
        Ok(3)
    }

    async fn download_many(&self, ids: &[DocumentId], target: &Path) -> Result<u64, DmsError> {
        self.record(FakeOp::DownloadArchive, None)?;
        if let Some(missing) = ids.iter().find(|id| !self.contains(**id)) {
            return Err(not_found(*missing));
        }
        std::fs::write(target, b"PK")?;
        Ok(2)
    }

    async fn document_info(&self, id: DocumentId) -> Result<DocumentInfo, DmsError> {
        self.record(FakeOp::Info, None)?;
        let state = self.lock();
        let doc = state.docs.get(&id).ok_or_else(|| not_found(id))?;
        Ok(DocumentInfo {
            document_type: DocumentType::from(doc.kind),
            name: doc.name.clone(),
            parent_id: doc.parent,
            metadata: None,
            size: None,
        })
    }

    async fn search_by_metadata(
        &self,
        criteria: &SearchByMetadataRequest,
    ) -> Result<Vec<DocumentId>, DmsError> {
        let state = self.lock();
        let mut hits: Vec<DocumentId> = state
            .docs
            .iter()
            .filter(|(_, doc)| {
                criteria
                    .name
                    .as_deref()
                    .is_none_or(|name| doc.name == name)
                    && criteria
                        .parent_folder_id
                        .is_none_or(|parent| doc.parent == Some(parent))
            })
            .map(|(id, _)| *id)
            .collect();
        hits.sort();
        Ok(hits)
    }
}
