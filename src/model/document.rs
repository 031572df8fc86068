use serde::Serialize;
use time::{format_description::well_known::Rfc3339, macros::format_description, OffsetDateTime};

use crate::model::network::{ApiDocument, ContentGroup, RichTextBlock};

/// A publication timestamp as the content API sent it.
///
/// Two timestamps are equal only when their original text is identical, so
/// `2021-03-25T19:25:28+0000` and `2021-03-25T16:25:28-0300` differ even
/// though they name the same instant.
#[derive(Clone, Debug)]
pub struct PublicationDate {
    raw: String,
    at: OffsetDateTime,
}

impl PublicationDate {
    pub fn parse(raw: &str) -> Result<Self, time::error::Parse> {
        let api_format = format_description!(
            "[year]-[month]-[day]T[hour]:[minute]:[second][offset_hour sign:mandatory][offset_minute]"
        );

        let at = OffsetDateTime::parse(raw, api_format)
            .or_else(|_| OffsetDateTime::parse(raw, &Rfc3339))?;

        Ok(PublicationDate {
            raw: raw.to_string(),
            at,
        })
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn at(&self) -> OffsetDateTime {
        self.at
    }
}

impl PartialEq for PublicationDate {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl Eq for PublicationDate {}

#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error("document {0} has no uid")]
    MissingUid(String),

    #[error("document {id} has an unreadable {field}: {source}")]
    Timestamp {
        id: String,
        field: &'static str,
        source: time::error::Parse,
    },
}

fn timestamp(
    id: &str,
    field: &'static str,
    raw: Option<&str>,
) -> Result<Option<PublicationDate>, DocumentError> {
    raw.map(PublicationDate::parse)
        .transpose()
        .map_err(|source| DocumentError::Timestamp {
            id: id.to_string(),
            field,
            source,
        })
}

#[derive(Clone, Debug, PartialEq)]
pub struct PostSummary {
    pub uid: String,
    pub first_publication_date: Option<PublicationDate>,
    pub title: String,
    pub subtitle: String,
    pub author: String,
}

impl PostSummary {
    pub fn from_document(document: &ApiDocument) -> Result<Self, DocumentError> {
        let uid = document
            .uid
            .clone()
            .ok_or_else(|| DocumentError::MissingUid(document.id.clone()))?;

        Ok(PostSummary {
            uid,
            first_publication_date: timestamp(
                &document.id,
                "first_publication_date",
                document.first_publication_date.as_deref(),
            )?,
            title: document.data.title.clone().unwrap_or_default(),
            subtitle: document.data.subtitle.clone().unwrap_or_default(),
            author: document.data.author.clone().unwrap_or_default(),
        })
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ContentBlock {
    pub heading: String,
    pub body: Vec<RichTextBlock>,
}

impl From<ContentGroup> for ContentBlock {
    fn from(group: ContentGroup) -> Self {
        ContentBlock {
            heading: group.heading.unwrap_or_default(),
            body: group.body,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Post {
    pub id: String,
    pub uid: String,
    pub first_publication_date: Option<PublicationDate>,
    pub last_publication_date: Option<PublicationDate>,
    pub title: String,
    pub subtitle: String,
    pub author: String,
    pub banner: Option<String>,
    pub content: Vec<ContentBlock>,
}

impl Post {
    pub fn from_document(document: ApiDocument) -> Result<Self, DocumentError> {
        let first_publication_date = timestamp(
            &document.id,
            "first_publication_date",
            document.first_publication_date.as_deref(),
        )?;
        let last_publication_date = timestamp(
            &document.id,
            "last_publication_date",
            document.last_publication_date.as_deref(),
        )?;

        let Some(uid) = document.uid else {
            return Err(DocumentError::MissingUid(document.id));
        };

        let data = document.data;
        Ok(Post {
            id: document.id,
            uid,
            first_publication_date,
            last_publication_date,
            title: data.title.unwrap_or_default(),
            subtitle: data.subtitle.unwrap_or_default(),
            author: data.author.unwrap_or_default(),
            banner: data.banner.and_then(|banner| banner.url),
            content: data.content.into_iter().map(ContentBlock::from).collect(),
        })
    }
}

/// One side of the previous/next links under a post.
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct PostStub {
    pub uid: String,
    pub title: String,
}

impl PostStub {
    pub fn from_document(document: &ApiDocument) -> Option<Self> {
        Some(PostStub {
            uid: document.uid.clone()?,
            title: document.data.title.clone().unwrap_or_default(),
        })
    }
}
