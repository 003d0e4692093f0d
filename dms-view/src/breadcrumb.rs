use std::collections::HashSet;

use dms_core::{DmsError, DocumentType};
use thiserror::Error;

use crate::model::{BreadcrumbEntry, DocumentId, Node, NodeKind};
use crate::namespace::NamespaceClient;

#[derive(Debug, Error)]
pub enum BreadcrumbError {
    #[error("ancestor chain of {target} exceeds {max_depth} levels")]
    TooDeep {
        target: DocumentId,
        max_depth: usize,
    },
    #[error("ancestor cycle detected at {0}")]
    Cycle(DocumentId),
    #[error("{0} is not a folder")]
    NotAFolder(DocumentId),
    #[error("path does not end at {0:?}")]
    Disconnected(Option<DocumentId>),
    #[error("failed to resolve ancestor {id}: {source}")]
    Lookup {
        id: DocumentId,
        #[source]
        source: DmsError,
    },
}

/// How the path for a pending load will be obtained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathResolution {
    Known(Vec<BreadcrumbEntry>),
    Walk(DocumentId),
}

/// Root-to-current path stack. Pushed on navigate-into, truncated on
/// navigate-to-ancestor; anything else falls back to a parent walk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BreadcrumbTracker {
    stack: Vec<BreadcrumbEntry>,
}

impl Default for BreadcrumbTracker {
    fn default() -> Self {
        Self {
            stack: vec![BreadcrumbEntry::ROOT],
        }
    }
}

impl BreadcrumbTracker {
    pub fn path(&self) -> &[BreadcrumbEntry] {
        &self.stack
    }

    /// Decides locally, without I/O, how to reach `target` from the current
    /// stack. `children` is the listing currently on display.
    pub fn resolve(&self, target: Option<DocumentId>, children: &[Node]) -> PathResolution {
        let Some(id) = target else {
            return PathResolution::Known(vec![BreadcrumbEntry::ROOT]);
        };
        if let Some(pos) = self.stack.iter().position(|entry| entry.id == Some(id)) {
            return PathResolution::Known(self.stack[..=pos].to_vec());
        }
        if let Some(node) = children
            .iter()
            .find(|node| node.id == id && node.kind == NodeKind::Folder)
        {
            let mut path = self.stack.clone();
            path.push(BreadcrumbEntry::folder(id, node.name.clone()));
            return PathResolution::Known(path);
        }
        PathResolution::Walk(id)
    }

    pub fn commit(&mut self, path: Vec<BreadcrumbEntry>) {
        debug_assert!(path.first().is_some_and(BreadcrumbEntry::is_root));
        self.stack = path;
    }

    /// Root-to-`target` chain, from the stack when possible, otherwise by
    /// walking parent pointers.
    pub async fn path_for(
        &self,
        client: &dyn NamespaceClient,
        target: Option<DocumentId>,
        children: &[Node],
        max_depth: usize,
    ) -> Result<Vec<BreadcrumbEntry>, BreadcrumbError> {
        complete_path(client, self.resolve(target, children), target, max_depth).await
    }
}

/// Turns a [`PathResolution`] into a full path and checks that it ends at
/// `target`.
pub async fn complete_path(
    client: &dyn NamespaceClient,
    resolution: PathResolution,
    target: Option<DocumentId>,
    max_depth: usize,
) -> Result<Vec<BreadcrumbEntry>, BreadcrumbError> {
    let path = resolve_path(client, resolution, max_depth).await?;
    ensure_terminates_at(&path, target)?;
    Ok(path)
}

pub async fn resolve_path(
    client: &dyn NamespaceClient,
    resolution: PathResolution,
    max_depth: usize,
) -> Result<Vec<BreadcrumbEntry>, BreadcrumbError> {
    match resolution {
        PathResolution::Known(path) => Ok(path),
        PathResolution::Walk(id) => walk_ancestors(client, id, max_depth).await,
    }
}

pub async fn walk_ancestors(
    client: &dyn NamespaceClient,
    target: DocumentId,
    max_depth: usize,
) -> Result<Vec<BreadcrumbEntry>, BreadcrumbError> {
    let mut chain = Vec::new();
    let mut seen = HashSet::new();
    let mut cursor = Some(target);

    while let Some(id) = cursor {
        if !seen.insert(id) {
            return Err(BreadcrumbError::Cycle(id));
        }
        if chain.len() >= max_depth {
            return Err(BreadcrumbError::TooDeep { target, max_depth });
        }
        let info = client
            .document_info(id)
            .await
            .map_err(|source| BreadcrumbError::Lookup { id, source })?;
        if info.document_type != DocumentType::Folder {
            return Err(BreadcrumbError::NotAFolder(id));
        }
        chain.push(BreadcrumbEntry::folder(id, info.name));
        cursor = info.parent_id;
    }

    tracing::debug!(%target, depth = chain.len(), "resolved breadcrumbs by ancestor walk");
    chain.push(BreadcrumbEntry::ROOT);
    chain.reverse();
    Ok(chain)
}

pub fn ensure_terminates_at(
    path: &[BreadcrumbEntry],
    target: Option<DocumentId>,
) -> Result<(), BreadcrumbError> {
    match (path.first(), path.last()) {
        (Some(first), Some(last)) if first.is_root() && last.id == target => Ok(()),
        _ => Err(BreadcrumbError::Disconnected(target)),
    }
}
