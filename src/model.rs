pub mod document;
pub mod network;

use crate::content::{ContentError, CursorError};

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Content(#[from] ContentError),

    #[error(transparent)]
    Document(#[from] document::DocumentError),

    #[error("template error: {0}")]
    Render(#[from] tera::Error),

    #[error("no post at {0}")]
    NotFound(String),

    #[error("invalid preview token")]
    InvalidPreviewToken,

    #[error(transparent)]
    InvalidCursor(#[from] CursorError),

    #[error("invalid query: {0}")]
    InvalidQuery(String),
}
