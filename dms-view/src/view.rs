use crate::breadcrumb::{BreadcrumbTracker, PathResolution};
use crate::error::ViewError;
use crate::model::{BreadcrumbEntry, DocumentId, LoadTicket, Node, ViewState};

/// A listing plus the breadcrumb path that leads to it, ready to be applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedFolder {
    pub children: Vec<Node>,
    pub path: Vec<BreadcrumbEntry>,
}

#[derive(Debug)]
pub enum LoadOutcome {
    Applied { generation: u64, entries: usize },
    Failed(ViewError),
    Stale { latest: u64 },
}

/// Single owner of [`ViewState`], the selection and the breadcrumb stack.
/// Every mutation is a plain method call; nothing here performs I/O.
#[derive(Debug, Default)]
pub struct FolderView {
    state: ViewState,
    breadcrumbs: BreadcrumbTracker,
    issued: u64,
    settled: u64,
    pending_folder: Option<DocumentId>,
}

impl FolderView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &ViewState {
        &self.state
    }

    pub fn breadcrumbs(&self) -> &[BreadcrumbEntry] {
        self.breadcrumbs.path()
    }

    /// True while the most recently issued load has not settled.
    pub fn is_loading(&self) -> bool {
        self.settled < self.issued
    }

    /// Issues a new load; every ticket handed out earlier becomes stale.
    pub fn begin_load(&mut self, folder: Option<DocumentId>) -> LoadTicket {
        self.issued += 1;
        self.pending_folder = folder;
        LoadTicket {
            folder,
            sequence: self.issued,
        }
    }

    /// Folder that refreshes, uploads and new folders go to: the one the
    /// latest load asked for while it is in flight, the applied one otherwise.
    pub fn target_folder(&self) -> Option<DocumentId> {
        if self.is_loading() {
            self.pending_folder
        } else {
            self.state.current_folder
        }
    }

    pub fn is_latest(&self, ticket: LoadTicket) -> bool {
        ticket.sequence == self.issued
    }

    pub fn resolve_path(&self, folder: Option<DocumentId>) -> PathResolution {
        self.breadcrumbs.resolve(folder, &self.state.children)
    }

    pub fn complete_load(
        &mut self,
        ticket: LoadTicket,
        result: Result<LoadedFolder, ViewError>,
    ) -> LoadOutcome {
        if !self.is_latest(ticket) {
            return LoadOutcome::Stale {
                latest: self.issued,
            };
        }
        self.settled = ticket.sequence;
        match result {
            Ok(loaded) => {
                let mut children = loaded.children;
                for node in &mut children {
                    node.selected = false;
                }
                let entries = children.len();
                self.state = ViewState {
                    current_folder: ticket.folder,
                    children,
                    generation: self.state.generation + 1,
                };
                self.breadcrumbs.commit(loaded.path);
                LoadOutcome::Applied {
                    generation: self.state.generation,
                    entries,
                }
            }
            Err(err) => LoadOutcome::Failed(err),
        }
    }

    /// Flips selection of `id`; returns false when the node is not displayed.
    pub fn toggle_select(&mut self, id: DocumentId) -> bool {
        match self.state.children.iter_mut().find(|node| node.id == id) {
            Some(node) => {
                node.selected = !node.selected;
                true
            }
            None => false,
        }
    }

    pub fn select_all(&mut self, selected: bool) {
        for node in &mut self.state.children {
            node.selected = selected;
        }
    }

    pub fn selected_ids(&self) -> Vec<DocumentId> {
        self.state
            .children
            .iter()
            .filter(|node| node.selected)
            .map(|node| node.id)
            .collect()
    }

    pub fn node(&self, id: DocumentId) -> Option<&Node> {
        self.state.children.iter().find(|node| node.id == id)
    }

    /// Looks up every id in the displayed listing. Ids that are not shown
    /// cannot be classified by kind and are rejected.
    pub fn lookup(&self, ids: &[DocumentId]) -> Result<Vec<&Node>, ViewError> {
        ids.iter()
            .map(|id| {
                self.node(*id).ok_or_else(|| {
                    ViewError::InvariantViolation(format!("{id} is not in the current view"))
                })
            })
            .collect()
    }
}
