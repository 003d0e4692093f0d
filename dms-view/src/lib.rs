pub mod batch;
pub mod breadcrumb;
pub mod config;
pub mod controller;
mod error;
pub mod icons;
pub mod model;
mod namespace;
pub mod upload;
pub mod view;

#[cfg(test)]
mod test_support;

pub use batch::{
    BatchOperation, BatchOperationCoordinator, BatchPlan, BatchReport, BatchTarget,
    OperationOutcome, OutcomeResult, Relocation,
};
pub use breadcrumb::{BreadcrumbError, BreadcrumbTracker};
pub use config::ViewConfig;
pub use controller::{
    FolderViewController, PresentationEvent, ViewEvent, ViewHandle, ViewSnapshot, spawn,
};
pub use error::ViewError;
pub use icons::{Icon, icon_for};
pub use model::{BreadcrumbEntry, DocumentId, Node, NodeKind, ViewState};
pub use namespace::NamespaceClient;
pub use upload::{UploadCoordinator, UploadStatus, UploadTask};
pub use view::FolderView;
