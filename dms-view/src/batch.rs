use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use dms_core::DmsError;
use futures_util::future::join;

use crate::error::ViewError;
use crate::model::{DocumentId, NodeKind};
use crate::namespace::NamespaceClient;
use crate::view::FolderView;

pub const ARCHIVE_NAME: &str = "documents.zip";
const FALLBACK_FILE_NAME: &str = "download";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Relocation {
    pub target: Option<DocumentId>,
    pub allow_duplicate_names: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchOperation {
    Move(Relocation),
    Copy(Relocation),
    Delete,
    Download,
}

impl BatchOperation {
    pub fn label(&self) -> &'static str {
        match self {
            BatchOperation::Move(_) => "move",
            BatchOperation::Copy(_) => "copy",
            BatchOperation::Delete => "delete",
            BatchOperation::Download => "download",
        }
    }

    /// Whether the remote namespace changes and the view must be re-listed.
    pub fn mutates(&self) -> bool {
        !matches!(self, BatchOperation::Download)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchTarget {
    pub id: DocumentId,
    pub name: String,
    pub kind: NodeKind,
}

/// Targets of one batch, already split by kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchPlan {
    operation: BatchOperation,
    files: Vec<BatchTarget>,
    folders: Vec<BatchTarget>,
}

impl BatchPlan {
    pub fn new(
        operation: BatchOperation,
        targets: impl IntoIterator<Item = BatchTarget>,
    ) -> Result<Self, ViewError> {
        let mut seen = HashSet::new();
        let mut files = Vec::new();
        let mut folders = Vec::new();
        for target in targets {
            if !seen.insert(target.id) {
                continue;
            }
            match target.kind {
                NodeKind::File => files.push(target),
                NodeKind::Folder => folders.push(target),
            }
        }
        if files.is_empty() && folders.is_empty() {
            return Err(ViewError::InvariantViolation(format!(
                "{} batch has no targets",
                operation.label()
            )));
        }
        Ok(Self {
            operation,
            files,
            folders,
        })
    }

    /// Classifies `ids` by the kinds shown in `view`.
    pub fn from_view(
        view: &FolderView,
        ids: &[DocumentId],
        operation: BatchOperation,
    ) -> Result<Self, ViewError> {
        let nodes = view.lookup(ids)?;
        Self::new(
            operation,
            nodes.into_iter().map(|node| BatchTarget {
                id: node.id,
                name: node.name.clone(),
                kind: node.kind,
            }),
        )
    }

    pub fn operation(&self) -> BatchOperation {
        self.operation
    }

    pub fn files(&self) -> &[BatchTarget] {
        &self.files
    }

    pub fn folders(&self) -> &[BatchTarget] {
        &self.folders
    }

    pub fn partitions(&self) -> impl Iterator<Item = (NodeKind, &[BatchTarget])> {
        [
            (NodeKind::File, self.files.as_slice()),
            (NodeKind::Folder, self.folders.as_slice()),
        ]
        .into_iter()
        .filter(|(_, targets)| !targets.is_empty())
    }

    fn single_file(&self) -> Option<&BatchTarget> {
        match (self.files.as_slice(), self.folders.is_empty()) {
            ([file], true) => Some(file),
            _ => None,
        }
    }

    fn all_ids(&self) -> Vec<DocumentId> {
        self.files
            .iter()
            .chain(&self.folders)
            .map(|target| target.id)
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutcomeResult {
    Success,
    Failure(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationOutcome {
    pub subset: BTreeSet<DocumentId>,
    pub kind: NodeKind,
    pub result: OutcomeResult,
}

impl OperationOutcome {
    fn from_result<T>(
        kind: NodeKind,
        targets: &[BatchTarget],
        result: &Result<T, DmsError>,
    ) -> Self {
        Self {
            subset: targets.iter().map(|target| target.id).collect(),
            kind,
            result: match result {
                Ok(_) => OutcomeResult::Success,
                Err(err) => OutcomeResult::Failure(err.to_string()),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchReport {
    pub operation: BatchOperation,
    pub outcomes: Vec<OperationOutcome>,
    pub succeeded_kinds: BTreeSet<NodeKind>,
    pub failures: BTreeMap<NodeKind, String>,
    /// Where a download batch was written.
    pub saved_to: Option<PathBuf>,
}

impl BatchReport {
    pub fn from_outcomes(operation: BatchOperation, mut outcomes: Vec<OperationOutcome>) -> Self {
        outcomes.sort_by_key(|outcome| outcome.kind);
        let mut succeeded_kinds = BTreeSet::new();
        let mut failures = BTreeMap::new();
        for outcome in &outcomes {
            match &outcome.result {
                OutcomeResult::Success => {
                    succeeded_kinds.insert(outcome.kind);
                }
                OutcomeResult::Failure(reason) => {
                    failures.insert(outcome.kind, reason.clone());
                }
            }
        }
        Self {
            operation,
            outcomes,
            succeeded_kinds,
            failures,
            saved_to: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn is_partial(&self) -> bool {
        !self.failures.is_empty() && !self.succeeded_kinds.is_empty()
    }
}

/// Per-kind endpoint call for mutating operations.
#[derive(Debug, Clone, Copy)]
enum KindCall {
    Move(Relocation),
    Copy(Relocation),
    Delete,
}

impl KindCall {
    fn for_operation(operation: BatchOperation) -> Option<Self> {
        match operation {
            BatchOperation::Move(relocation) => Some(KindCall::Move(relocation)),
            BatchOperation::Copy(relocation) => Some(KindCall::Copy(relocation)),
            BatchOperation::Delete => Some(KindCall::Delete),
            BatchOperation::Download => None,
        }
    }
}

#[derive(Clone)]
pub struct BatchOperationCoordinator {
    client: Arc<dyn NamespaceClient>,
    download_dir: PathBuf,
}

impl BatchOperationCoordinator {
    pub fn new(client: Arc<dyn NamespaceClient>, download_dir: impl Into<PathBuf>) -> Self {
        Self {
            client,
            download_dir: download_dir.into(),
        }
    }

    /// Runs every kind partition of `plan` concurrently and waits for all of
    /// them. A failing partition never aborts its sibling.
    pub async fn execute(&self, plan: BatchPlan) -> BatchReport {
        let operation = plan.operation();
        let Some(call) = KindCall::for_operation(operation) else {
            return self.download(&plan).await;
        };
        let (files, folders) = join(
            self.run_partition(NodeKind::File, call, plan.files()),
            self.run_partition(NodeKind::Folder, call, plan.folders()),
        )
        .await;
        let report =
            BatchReport::from_outcomes(operation, files.into_iter().chain(folders).collect());
        tracing::info!(
            operation = operation.label(),
            succeeded = ?report.succeeded_kinds,
            failed = ?report.failures.keys().collect::<Vec<_>>(),
            "batch settled"
        );
        report
    }

    async fn run_partition(
        &self,
        kind: NodeKind,
        call: KindCall,
        targets: &[BatchTarget],
    ) -> Option<OperationOutcome> {
        if targets.is_empty() {
            return None;
        }
        let ids: Vec<DocumentId> = targets.iter().map(|target| target.id).collect();
        tracing::debug!(%kind, ?call, count = ids.len(), "dispatching batch partition");
        let result = match call {
            KindCall::Move(relocation) => {
                self.client
                    .move_items(
                        kind,
                        &ids,
                        relocation.target,
                        relocation.allow_duplicate_names,
                    )
                    .await
            }
            KindCall::Copy(relocation) => {
                self.client
                    .copy_items(
                        kind,
                        &ids,
                        relocation.target,
                        relocation.allow_duplicate_names,
                    )
                    .await
            }
            KindCall::Delete => self.client.delete_items(kind, &ids).await,
        };
        if let Err(err) = &result {
            tracing::warn!(
                %kind,
                %err,
                class = ?err.classification(),
                retryable = err.is_retryable(),
                "batch partition failed"
            );
        }
        Some(OperationOutcome::from_result(kind, targets, &result))
    }

    /// One file goes through the single-document endpoint; anything else is
    /// fetched as one archive.
    async fn download(&self, plan: &BatchPlan) -> BatchReport {
        let (target, result) = match plan.single_file() {
            Some(file) => {
                let target = self.download_dir.join(safe_file_name(&file.name));
                let result = self.client.download_file(file.id, &target).await;
                (target, result)
            }
            None => {
                let target = self.download_dir.join(ARCHIVE_NAME);
                let result = self.client.download_many(&plan.all_ids(), &target).await;
                (target, result)
            }
        };
        match &result {
            Ok(bytes) => tracing::info!(path = %target.display(), bytes, "download saved"),
            Err(err) => tracing::warn!(%err, "download failed"),
        }
        let outcomes = plan
            .partitions()
            .map(|(kind, targets)| OperationOutcome::from_result(kind, targets, &result))
            .collect();
        let mut report = BatchReport::from_outcomes(BatchOperation::Download, outcomes);
        if result.is_ok() {
            report.saved_to = Some(target);
        }
        report
    }
}

/// Last normal path component of a remote name, so it cannot escape the
/// download directory.
fn safe_file_name(name: &str) -> String {
    Path::new(name)
        .components()
        .filter_map(|component| match component {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .last()
        .filter(|part| !part.trim().is_empty())
        .unwrap_or_else(|| FALLBACK_FILE_NAME.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{FakeNamespace, FakeOp};
    use tempfile::tempdir;
    use uuid::Uuid;

    fn target(kind: NodeKind, name: &str) -> BatchTarget {
        BatchTarget {
            id: Uuid::new_v4(),
            name: name.into(),
            kind,
        }
    }

    #[test]
    fn plan_partitions_by_kind_and_dedupes() {
        let file = target(NodeKind::File, "a");
        let folder = target(NodeKind::Folder, "b");
        let plan = BatchPlan::new(
            BatchOperation::Delete,
            vec![file.clone(), folder.clone(), file.clone()],
        )
        .unwrap();

        assert_eq!(plan.files(), &[file]);
        assert_eq!(plan.folders(), &[folder]);
        assert_eq!(plan.partitions().count(), 2);
    }

    #[test]
    fn empty_plan_is_an_invariant_violation() {
        let err = BatchPlan::new(BatchOperation::Delete, Vec::new()).unwrap_err();
        assert!(err.is_invariant_violation());
    }

    #[test]
    fn report_is_independent_of_outcome_order() {
        let ok = OperationOutcome {
            subset: BTreeSet::new(),
            kind: NodeKind::File,
            result: OutcomeResult::Success,
        };
        let failed = OperationOutcome {
            subset: BTreeSet::new(),
            kind: NodeKind::Folder,
            result: OutcomeResult::Failure("denied".into()),
        };
        let forward =
            BatchReport::from_outcomes(BatchOperation::Delete, vec![ok.clone(), failed.clone()]);
        let backward = BatchReport::from_outcomes(BatchOperation::Delete, vec![failed, ok]);

        assert_eq!(forward, backward);
        assert!(forward.is_partial());
        assert_eq!(
            forward.succeeded_kinds,
            BTreeSet::from([NodeKind::File])
        );
        assert_eq!(forward.failures.get(&NodeKind::Folder).map(String::as_str), Some("denied"));
    }

    #[test]
    fn safe_file_name_strips_directories() {
        assert_eq!(safe_file_name("report.pdf"), "report.pdf");
        assert_eq!(safe_file_name("../../etc/passwd"), "passwd");
        assert_eq!(safe_file_name(".."), FALLBACK_FILE_NAME);
        assert_eq!(safe_file_name(""), FALLBACK_FILE_NAME);
    }

    #[tokio::test]
    async fn mixed_delete_reports_each_kind_separately() {
        let fake = Arc::new(FakeNamespace::new());
        let file = fake.add_file(None, "a.txt");
        let folder = fake.add_folder(None, "b");
        fake.fail(FakeOp::Delete, NodeKind::Folder);

        let dir = tempdir().unwrap();
        let coordinator = BatchOperationCoordinator::new(fake.clone(), dir.path());
        let plan = BatchPlan::new(
            BatchOperation::Delete,
            vec![
                BatchTarget {
                    id: file,
                    name: "a.txt".into(),
                    kind: NodeKind::File,
                },
                BatchTarget {
                    id: folder,
                    name: "b".into(),
                    kind: NodeKind::Folder,
                },
            ],
        )
        .unwrap();

        let report = coordinator.execute(plan).await;

        assert_eq!(report.succeeded_kinds, BTreeSet::from([NodeKind::File]));
        assert!(report.failures.contains_key(&NodeKind::Folder));
        assert!(!fake.contains(file));
        assert!(fake.contains(folder));
        assert_eq!(fake.mutation_calls(FakeOp::Delete), 2);
    }

    #[tokio::test]
    async fn single_file_download_uses_document_endpoint() {
        let fake = Arc::new(FakeNamespace::new());
        let file = fake.add_file(None, "notes.txt");
        let dir = tempdir().unwrap();
        let coordinator = BatchOperationCoordinator::new(fake.clone(), dir.path());
        let plan = BatchPlan::new(
            BatchOperation::Download,
            vec![BatchTarget {
                id: file,
                name: "notes.txt".into(),
                kind: NodeKind::File,
            }],
        )
        .unwrap();

        let report = coordinator.execute(plan).await;

        assert!(report.is_success());
        assert_eq!(report.saved_to, Some(dir.path().join("notes.txt")));
        assert!(dir.path().join("notes.txt").exists());
        assert_eq!(fake.mutation_calls(FakeOp::DownloadOne), 1);
        assert_eq!(fake.mutation_calls(FakeOp::DownloadArchive), 0);
    }

    #[tokio::test]
    async fn multi_item_download_requests_one_archive() {
        let fake = Arc::new(FakeNamespace::new());
        let a = fake.add_file(None, "a.txt");
        let b = fake.add_folder(None, "b");
        let dir = tempdir().unwrap();
        let coordinator = BatchOperationCoordinator::new(fake.clone(), dir.path());
        let plan = BatchPlan::new(
            BatchOperation::Download,
            vec![
                BatchTarget {
                    id: a,
                    name: "a.txt".into(),
                    kind: NodeKind::File,
                },
                BatchTarget {
                    id: b,
                    name: "b".into(),
                    kind: NodeKind::Folder,
                },
            ],
        )
        .unwrap();

        let report = coordinator.execute(plan).await;

        assert_eq!(
            report.succeeded_kinds,
            BTreeSet::from([NodeKind::File, NodeKind::Folder])
        );
        assert_eq!(report.saved_to, Some(dir.path().join(ARCHIVE_NAME)));
        assert_eq!(fake.mutation_calls(FakeOp::DownloadOne), 0);
        assert_eq!(fake.mutation_calls(FakeOp::DownloadArchive), 1);
    }
}
