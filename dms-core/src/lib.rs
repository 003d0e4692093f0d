mod client;
mod models;

pub use client::{ApiErrorClass, DmsClient, DmsError};
pub use reqwest::StatusCode;
pub use models::{
    CreateFolderRequest, DeleteRequest, DocumentInfo, DocumentType, ElementInfo, FolderResponse,
    RelocateRequest, RenameRequest, SearchByMetadataRequest, UploadResponse,
};
