mod date;
pub mod home;
pub mod post;

pub use date::{format_date, format_edited};

use serde::Serialize;
use time::OffsetDateTime;

use crate::model::document::PublicationDate;

#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(transparent)]
pub struct Html(pub String);

/// Drafts that were never published print as "now".
fn published_at(date: Option<&PublicationDate>) -> OffsetDateTime {
    date.map(PublicationDate::at)
        .unwrap_or_else(OffsetDateTime::now_utc)
}
