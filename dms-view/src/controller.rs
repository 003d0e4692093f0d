use std::path::PathBuf;
use std::sync::Arc;

use dms_core::{DmsError, ElementInfo, FolderResponse, SearchByMetadataRequest};
use futures_util::future::join;
use tokio::sync::{mpsc, oneshot, watch};

use crate::batch::{BatchOperation, BatchOperationCoordinator, BatchPlan, BatchReport};
use crate::breadcrumb::{PathResolution, complete_path};
use crate::config::ViewConfig;
use crate::error::ViewError;
use crate::model::{BreadcrumbEntry, DocumentId, LoadTicket, Node, NodeKind};
use crate::namespace::NamespaceClient;
use crate::upload::{UploadCoordinator, UploadStatus, UploadTask};
use crate::view::{FolderView, LoadOutcome, LoadedFolder};

/// Raw input from a presentation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PresentationEvent {
    Click(DocumentId),
    DoubleClick(DocumentId),
    Drop(Vec<PathBuf>),
    DragOver(bool),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewEvent {
    FolderLoaded {
        folder: Option<DocumentId>,
        generation: u64,
        entries: usize,
    },
    LoadFailed {
        folder: Option<DocumentId>,
        reason: String,
    },
    StaleLoadDiscarded {
        folder: Option<DocumentId>,
        sequence: u64,
    },
    BatchSettled(BatchReport),
    UploadSettled(UploadTask),
    FolderCreated(FolderResponse),
    Renamed {
        id: DocumentId,
        name: String,
    },
    MutationFailed {
        action: &'static str,
        reason: String,
    },
    Rejected {
        reason: String,
    },
}

impl ViewEvent {
    /// User-facing message, if the event warrants one.
    pub fn notification(&self) -> Option<String> {
        let message = match self {
            ViewEvent::FolderLoaded { .. } | ViewEvent::StaleLoadDiscarded { .. } => return None,
            ViewEvent::LoadFailed { .. } => "Failed to load folder contents".to_string(),
            ViewEvent::BatchSettled(report) => batch_notification(report),
            ViewEvent::UploadSettled(task) => match &task.status {
                UploadStatus::Succeeded(_) => format!("{} uploaded successfully", task.file_name()),
                UploadStatus::Failed(_) => format!("Failed to upload {}", task.file_name()),
                UploadStatus::Pending => return None,
            },
            ViewEvent::FolderCreated(_) => "Folder created successfully".to_string(),
            ViewEvent::Renamed { .. } => "Item renamed successfully".to_string(),
            ViewEvent::MutationFailed { action, .. } => format!("Failed to {action}"),
            ViewEvent::Rejected { reason } => reason.clone(),
        };
        Some(message)
    }
}

fn batch_notification(report: &BatchReport) -> String {
    let verb = match report.operation {
        BatchOperation::Move(_) => "moved",
        BatchOperation::Copy(_) => "copied",
        BatchOperation::Delete => "deleted",
        BatchOperation::Download => "downloaded",
    };
    if report.is_success() {
        return match &report.saved_to {
            Some(path) => format!("Items {verb} to {}", path.display()),
            None => format!("Items {verb} successfully"),
        };
    }
    let failed: Vec<&str> = report.failures.keys().map(|kind| kind.label()).collect();
    if report.is_partial() {
        format!(
            "Some items could not be {verb}: {} failed",
            failed.join(" and ")
        )
    } else {
        format!("Failed to {} items", report.operation.label())
    }
}

/// What a presentation layer renders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewSnapshot {
    pub folder: Option<DocumentId>,
    pub generation: u64,
    pub children: Vec<Node>,
    pub breadcrumbs: Vec<BreadcrumbEntry>,
    pub loading: bool,
    pub drag_over: bool,
}

impl ViewSnapshot {
    fn capture(view: &FolderView, drag_over: bool) -> Self {
        let state = view.state();
        Self {
            folder: state.current_folder(),
            generation: state.generation(),
            children: state.children().to_vec(),
            breadcrumbs: view.breadcrumbs().to_vec(),
            loading: view.is_loading(),
            drag_over,
        }
    }

    pub fn selected(&self) -> impl Iterator<Item = &Node> {
        self.children.iter().filter(|node| node.selected)
    }

    pub fn show_upload_zone(&self) -> bool {
        self.children.is_empty() || self.drag_over
    }

    pub fn find(&self, name: &str) -> Option<&Node> {
        self.children.iter().find(|node| node.name == name)
    }
}

enum Command {
    Load(Option<DocumentId>),
    Refresh,
    ToggleSelect(DocumentId),
    SelectAll(bool),
    Open(DocumentId),
    Upload(Vec<PathBuf>),
    DragOver(bool),
    Execute {
        ids: Option<Vec<DocumentId>>,
        operation: BatchOperation,
    },
    CreateFolder(String),
    Rename {
        id: DocumentId,
        name: String,
    },
    Search {
        criteria: SearchByMetadataRequest,
        reply: oneshot::Sender<Result<Vec<DocumentId>, ViewError>>,
    },
}

enum Completion {
    Load {
        ticket: LoadTicket,
        result: Result<LoadedFolder, ViewError>,
    },
    Batch(BatchReport),
    FolderCreated(Result<FolderResponse, DmsError>),
    Renamed {
        id: DocumentId,
        result: Result<ElementInfo, DmsError>,
    },
}

/// Cloneable front door to a running controller.
#[derive(Clone)]
pub struct ViewHandle {
    commands: mpsc::UnboundedSender<Command>,
    snapshots: watch::Receiver<ViewSnapshot>,
}

impl ViewHandle {
    fn send(&self, command: Command) -> Result<(), ViewError> {
        self.commands.send(command).map_err(|_| ViewError::Closed)
    }

    /// Lists `folder` (root when `None`). Only the most recently issued load
    /// is ever applied.
    pub fn load_folder(&self, folder: Option<DocumentId>) -> Result<(), ViewError> {
        self.send(Command::Load(folder))
    }

    pub fn navigate(&self, target: &BreadcrumbEntry) -> Result<(), ViewError> {
        self.load_folder(target.id)
    }

    pub fn request_refresh(&self) -> Result<(), ViewError> {
        self.send(Command::Refresh)
    }

    pub fn toggle_select(&self, id: DocumentId) -> Result<(), ViewError> {
        self.send(Command::ToggleSelect(id))
    }

    pub fn select_all(&self, selected: bool) -> Result<(), ViewError> {
        self.send(Command::SelectAll(selected))
    }

    /// Navigates into a folder or downloads a file.
    pub fn open(&self, id: DocumentId) -> Result<(), ViewError> {
        self.send(Command::Open(id))
    }

    pub fn upload(&self, files: Vec<PathBuf>) -> Result<(), ViewError> {
        self.send(Command::Upload(files))
    }

    pub fn dispatch(&self, event: PresentationEvent) -> Result<(), ViewError> {
        match event {
            PresentationEvent::Click(id) => self.toggle_select(id),
            PresentationEvent::DoubleClick(id) => self.open(id),
            PresentationEvent::Drop(files) => {
                self.send(Command::DragOver(false))?;
                self.upload(files)
            }
            PresentationEvent::DragOver(active) => self.send(Command::DragOver(active)),
        }
    }

    pub fn execute(&self, ids: Vec<DocumentId>, operation: BatchOperation) -> Result<(), ViewError> {
        self.send(Command::Execute {
            ids: Some(ids),
            operation,
        })
    }

    pub fn execute_selected(&self, operation: BatchOperation) -> Result<(), ViewError> {
        self.send(Command::Execute {
            ids: None,
            operation,
        })
    }

    pub fn create_folder(&self, name: impl Into<String>) -> Result<(), ViewError> {
        self.send(Command::CreateFolder(name.into()))
    }

    pub fn rename(&self, id: DocumentId, new_name: impl Into<String>) -> Result<(), ViewError> {
        self.send(Command::Rename {
            id,
            name: new_name.into(),
        })
    }

    pub async fn search(
        &self,
        criteria: SearchByMetadataRequest,
    ) -> Result<Vec<DocumentId>, ViewError> {
        let (reply, response) = oneshot::channel();
        self.send(Command::Search { criteria, reply })?;
        response.await.map_err(|_| ViewError::Closed)?
    }

    pub fn snapshot(&self) -> ViewSnapshot {
        self.snapshots.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ViewSnapshot> {
        self.snapshots.clone()
    }
}

struct Inbox {
    commands: mpsc::UnboundedReceiver<Command>,
    completions: mpsc::UnboundedReceiver<Completion>,
    uploads: mpsc::UnboundedReceiver<UploadTask>,
}

/// Sole owner of the [`FolderView`]. Commands and completions are handled
/// one at a time on a single task; remote calls run on spawned tasks that
/// report back through `completions`.
pub struct FolderViewController {
    client: Arc<dyn NamespaceClient>,
    config: ViewConfig,
    view: FolderView,
    drag_over: bool,
    batches: BatchOperationCoordinator,
    uploader: UploadCoordinator,
    completions: mpsc::UnboundedSender<Completion>,
    uploads: mpsc::UnboundedSender<UploadTask>,
    events: mpsc::UnboundedSender<ViewEvent>,
    snapshots: watch::Sender<ViewSnapshot>,
}

/// Starts a controller on the current tokio runtime. It runs until every
/// [`ViewHandle`] is dropped.
pub fn spawn(
    client: Arc<dyn NamespaceClient>,
    config: ViewConfig,
) -> (ViewHandle, mpsc::UnboundedReceiver<ViewEvent>) {
    let (command_tx, commands) = mpsc::unbounded_channel();
    let (completion_tx, completions) = mpsc::unbounded_channel();
    let (upload_tx, uploads) = mpsc::unbounded_channel();
    let (event_tx, events) = mpsc::unbounded_channel();

    let view = FolderView::new();
    let (snapshot_tx, snapshot_rx) = watch::channel(ViewSnapshot::capture(&view, false));

    let controller = FolderViewController {
        batches: BatchOperationCoordinator::new(Arc::clone(&client), &config.download_dir),
        uploader: UploadCoordinator::new(
            Arc::clone(&client),
            config.upload_concurrency,
            config.allow_duplicate_names,
        ),
        client,
        config,
        view,
        drag_over: false,
        completions: completion_tx,
        uploads: upload_tx,
        events: event_tx,
        snapshots: snapshot_tx,
    };
    tokio::spawn(controller.run(Inbox {
        commands,
        completions,
        uploads,
    }));

    (
        ViewHandle {
            commands: command_tx,
            snapshots: snapshot_rx,
        },
        events,
    )
}

impl FolderViewController {
    async fn run(mut self, mut inbox: Inbox) {
        loop {
            tokio::select! {
                command = inbox.commands.recv() => match command {
                    Some(command) => self.handle_command(command),
                    None => break,
                },
                Some(completion) = inbox.completions.recv() => self.handle_completion(completion),
                Some(task) = inbox.uploads.recv() => self.upload_settled(task),
            }
            self.publish();
        }
        tracing::debug!("view controller stopped");
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Load(folder) => self.load_folder(folder),
            Command::Refresh => self.request_refresh(),
            Command::ToggleSelect(id) => {
                if !self.view.toggle_select(id) {
                    tracing::debug!(%id, "ignoring selection of node outside the view");
                }
            }
            Command::SelectAll(selected) => self.view.select_all(selected),
            Command::Open(id) => self.open(id),
            Command::Upload(files) => self.upload(files),
            Command::DragOver(active) => self.drag_over = active,
            Command::Execute { ids, operation } => {
                let ids = ids.unwrap_or_else(|| self.view.selected_ids());
                self.execute(&ids, operation);
            }
            Command::CreateFolder(name) => self.create_folder(name),
            Command::Rename { id, name } => self.rename(id, name),
            Command::Search { criteria, reply } => {
                let client = Arc::clone(&self.client);
                tokio::spawn(async move {
                    let result = client
                        .search_by_metadata(&criteria)
                        .await
                        .map_err(ViewError::from);
                    let _ = reply.send(result);
                });
            }
        }
    }

    fn handle_completion(&mut self, completion: Completion) {
        match completion {
            Completion::Load { ticket, result } => self.load_settled(ticket, result),
            Completion::Batch(report) => {
                let mutates = report.operation.mutates();
                self.emit(ViewEvent::BatchSettled(report));
                if mutates {
                    self.request_refresh();
                }
            }
            Completion::FolderCreated(Ok(folder)) => {
                tracing::info!(id = %folder.id, name = %folder.name, "folder created");
                self.emit(ViewEvent::FolderCreated(folder));
                self.request_refresh();
            }
            Completion::FolderCreated(Err(err)) => {
                tracing::warn!(%err, "create folder failed");
                self.emit(ViewEvent::MutationFailed {
                    action: "create folder",
                    reason: err.to_string(),
                });
            }
            Completion::Renamed { id, result } => match result {
                Ok(info) => {
                    tracing::info!(%id, name = %info.name, "item renamed");
                    self.emit(ViewEvent::Renamed {
                        id,
                        name: info.name,
                    });
                    self.request_refresh();
                }
                Err(err) => {
                    tracing::warn!(%id, %err, "rename failed");
                    self.emit(ViewEvent::MutationFailed {
                        action: "rename item",
                        reason: err.to_string(),
                    });
                }
            },
        }
    }

    fn load_folder(&mut self, folder: Option<DocumentId>) {
        let resolution = self.view.resolve_path(folder);
        let ticket = self.view.begin_load(folder);
        tracing::debug!(?folder, sequence = ticket.sequence, "issuing load");

        let client = Arc::clone(&self.client);
        let max_depth = self.config.max_breadcrumb_depth;
        let done = self.completions.clone();
        tokio::spawn(async move {
            let result = fetch_folder(client.as_ref(), folder, resolution, max_depth).await;
            let _ = done.send(Completion::Load { ticket, result });
        });
    }

    fn request_refresh(&mut self) {
        self.load_folder(self.view.target_folder());
    }

    fn load_settled(&mut self, ticket: LoadTicket, result: Result<LoadedFolder, ViewError>) {
        let folder = ticket.folder;
        match self.view.complete_load(ticket, result) {
            LoadOutcome::Applied {
                generation,
                entries,
            } => {
                tracing::info!(?folder, generation, entries, "folder loaded");
                self.emit(ViewEvent::FolderLoaded {
                    folder,
                    generation,
                    entries,
                });
            }
            LoadOutcome::Failed(err) => {
                tracing::warn!(?folder, %err, "folder load failed");
                self.emit(ViewEvent::LoadFailed {
                    folder,
                    reason: err.to_string(),
                });
            }
            LoadOutcome::Stale { latest } => {
                tracing::debug!(
                    ?folder,
                    sequence = ticket.sequence,
                    latest,
                    "discarding stale load"
                );
                self.emit(ViewEvent::StaleLoadDiscarded {
                    folder,
                    sequence: ticket.sequence,
                });
            }
        }
    }

    fn open(&mut self, id: DocumentId) {
        match self.view.node(id).map(|node| node.kind) {
            Some(NodeKind::Folder) => self.load_folder(Some(id)),
            Some(NodeKind::File) => self.execute(&[id], BatchOperation::Download),
            None => self.reject(ViewError::InvariantViolation(format!(
                "cannot open {id}: not in the current view"
            ))),
        }
    }

    fn execute(&mut self, ids: &[DocumentId], operation: BatchOperation) {
        let plan = match BatchPlan::from_view(&self.view, ids, operation) {
            Ok(plan) => plan,
            Err(err) => return self.reject(err),
        };
        tracing::debug!(
            operation = operation.label(),
            files = plan.files().len(),
            folders = plan.folders().len(),
            "dispatching batch"
        );
        let batches = self.batches.clone();
        let done = self.completions.clone();
        tokio::spawn(async move {
            let report = batches.execute(plan).await;
            let _ = done.send(Completion::Batch(report));
        });
    }

    fn upload(&mut self, files: Vec<PathBuf>) {
        self.drag_over = false;
        if files.is_empty() {
            return;
        }
        let parent = self.view.target_folder();
        let started = self.uploader.upload(files, parent, self.uploads.clone());
        tracing::debug!(?parent, started, "uploads started");
    }

    fn upload_settled(&mut self, task: UploadTask) {
        self.emit(ViewEvent::UploadSettled(task));
        self.request_refresh();
    }

    fn create_folder(&mut self, name: String) {
        let name = name.trim().to_string();
        if name.is_empty() {
            return self.reject(ViewError::InvariantViolation(
                "folder name must not be empty".into(),
            ));
        }
        let parent = self.view.target_folder();
        let client = Arc::clone(&self.client);
        let done = self.completions.clone();
        tokio::spawn(async move {
            let result = client.create_folder(&name, parent).await;
            let _ = done.send(Completion::FolderCreated(result));
        });
    }

    fn rename(&mut self, id: DocumentId, name: String) {
        let name = name.trim().to_string();
        let kind = match self.view.node(id).map(|node| node.kind) {
            Some(kind) => kind,
            None => {
                return self.reject(ViewError::InvariantViolation(format!(
                    "cannot rename {id}: not in the current view"
                )));
            }
        };
        if name.is_empty() {
            return self.reject(ViewError::InvariantViolation(
                "new name must not be empty".into(),
            ));
        }
        let client = Arc::clone(&self.client);
        let done = self.completions.clone();
        tokio::spawn(async move {
            let result = client.rename(id, kind, &name).await;
            let _ = done.send(Completion::Renamed { id, result });
        });
    }

    fn reject(&mut self, err: ViewError) {
        tracing::warn!(%err, "rejected before dispatch");
        self.emit(ViewEvent::Rejected {
            reason: err.to_string(),
        });
    }

    fn emit(&self, event: ViewEvent) {
        if self.events.send(event).is_err() {
            tracing::debug!("view event dropped, no listener");
        }
    }

    fn publish(&self) {
        self.snapshots
            .send_replace(ViewSnapshot::capture(&self.view, self.drag_over));
    }
}

/// Lists `folder` and resolves its breadcrumb path concurrently. Either
/// failing fails the whole load.
async fn fetch_folder(
    client: &dyn NamespaceClient,
    folder: Option<DocumentId>,
    resolution: PathResolution,
    max_depth: usize,
) -> Result<LoadedFolder, ViewError> {
    let (listing, path) = join(
        client.list(folder),
        complete_path(client, resolution, folder, max_depth),
    )
    .await;
    let children = listing?.into_iter().map(Node::from_element).collect();
    Ok(LoadedFolder {
        children,
        path: path?,
    })
}

#[cfg(test)]
#[path = "controller_tests.rs"]
mod tests;
