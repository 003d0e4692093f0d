use std::borrow::Cow;
use std::fmt;

use dms_core::{DocumentType, ElementInfo};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use uuid::Uuid;

use crate::icons::{Icon, icon_for};

pub type DocumentId = Uuid;

pub const ROOT_NAME: &str = "Root";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NodeKind {
    File,
    Folder,
}

impl NodeKind {
    pub fn label(self) -> &'static str {
        match self {
            NodeKind::File => "file",
            NodeKind::Folder => "folder",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl From<DocumentType> for NodeKind {
    fn from(value: DocumentType) -> Self {
        match value {
            DocumentType::File => NodeKind::File,
            DocumentType::Folder => NodeKind::Folder,
        }
    }
}

impl From<NodeKind> for DocumentType {
    fn from(value: NodeKind) -> Self {
        match value {
            NodeKind::File => DocumentType::File,
            NodeKind::Folder => DocumentType::Folder,
        }
    }
}

/// One listed child of the displayed folder. `selected` is view-local.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub id: DocumentId,
    pub name: String,
    pub kind: NodeKind,
    pub size: Option<u64>,
    pub modified_at: Option<OffsetDateTime>,
    pub icon: Icon,
    pub selected: bool,
}

impl Node {
    pub fn from_element(info: ElementInfo) -> Self {
        let kind = NodeKind::from(info.document_type);
        let modified_at = info.modified_at.as_deref().and_then(parse_modified);
        Self {
            id: info.id,
            icon: icon_for(&info.name, kind),
            name: info.name,
            kind,
            size: info.size,
            modified_at,
            selected: false,
        }
    }

    pub fn is_folder(&self) -> bool {
        self.kind == NodeKind::Folder
    }
}

fn parse_modified(value: &str) -> Option<OffsetDateTime> {
    match OffsetDateTime::parse(value, &Rfc3339) {
        Ok(parsed) => Some(parsed),
        Err(err) => {
            tracing::debug!(value, %err, "ignoring unparseable modification time");
            None
        }
    }
}

/// The displayed folder. Replaced wholesale by every applied load.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewState {
    pub(crate) current_folder: Option<DocumentId>,
    pub(crate) children: Vec<Node>,
    pub(crate) generation: u64,
}

impl ViewState {
    pub fn current_folder(&self) -> Option<DocumentId> {
        self.current_folder
    }

    pub fn children(&self) -> &[Node] {
        &self.children
    }

    /// Number of loads applied so far.
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BreadcrumbEntry {
    pub id: Option<DocumentId>,
    pub name: Cow<'static, str>,
}

impl BreadcrumbEntry {
    pub const ROOT: BreadcrumbEntry = BreadcrumbEntry {
        id: None,
        name: Cow::Borrowed(ROOT_NAME),
    };

    pub fn folder(id: DocumentId, name: impl Into<String>) -> Self {
        Self {
            id: Some(id),
            name: Cow::Owned(name.into()),
        }
    }

    pub fn is_root(&self) -> bool {
        self.id.is_none()
    }
}

/// Stamp attached to every issued load; only the latest one may be applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadTicket {
    pub folder: Option<DocumentId>,
    pub sequence: u64,
}
