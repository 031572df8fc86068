//! Access to the headless content API.
//!
//! Page code talks to [`ContentApi`]; [`PrismicClient`] is the implementation
//! backed by the Prismic REST API. Every fetch takes a [`FetchContext`] that
//! decides whether the published content or a preview ref is read.

#[cfg(test)]
pub(crate) mod memory;
mod prismic;

pub use prismic::PrismicClient;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::model::network::ApiDocument;

pub const POSTS: &str = "posts";

#[derive(Debug, thiserror::Error)]
pub enum ContentError {
    #[error("content API request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("content API answered {status} for {path}")]
    Status {
        status: reqwest::StatusCode,
        path: String,
    },

    #[error("unreadable content API response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("could not encode content query: {0}")]
    Encode(#[from] serde_urlencoded::ser::Error),

    #[error("content API has no master ref")]
    NoMasterRef,

    #[error(transparent)]
    Cursor(#[from] CursorError),
}

/// Which revision of the content a request reads.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchContext {
    pub preview_ref: Option<String>,
}

impl FetchContext {
    pub fn published() -> Self {
        FetchContext { preview_ref: None }
    }

    pub fn preview(reference: impl Into<String>) -> Self {
        FetchContext {
            preview_ref: Some(reference.into()),
        }
    }

    pub fn is_preview(&self) -> bool {
        self.preview_ref.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    At { path: String, value: String },
}

impl Predicate {
    pub fn at(path: impl Into<String>, value: impl Into<String>) -> Self {
        Predicate::At {
            path: path.into(),
            value: value.into(),
        }
    }

    fn encode(&self) -> String {
        match self {
            Predicate::At { path, value } => {
                let value = value.replace('\\', "\\\\").replace('"', "\\\"");
                format!("[at({},\"{}\")]", path, value)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ordering {
    pub field: String,
    pub descending: bool,
}

impl Ordering {
    pub fn asc(field: impl Into<String>) -> Self {
        Ordering {
            field: field.into(),
            descending: false,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Ordering {
            field: field.into(),
            descending: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Query {
    pub predicates: Vec<Predicate>,
    pub orderings: Vec<Ordering>,
    pub page_size: Option<u32>,
    pub after: Option<String>,
}

impl Query {
    pub fn documents(kind: &str) -> Self {
        Query {
            predicates: vec![Predicate::at("document.type", kind)],
            ..Query::default()
        }
    }

    pub fn by_uid(kind: &str, uid: &str) -> Self {
        Query {
            predicates: vec![Predicate::at(format!("my.{}.uid", kind), uid)],
            page_size: Some(1),
            ..Query::default()
        }
    }

    pub fn by_id(id: &str) -> Self {
        Query {
            predicates: vec![Predicate::at("document.id", id)],
            page_size: Some(1),
            ..Query::default()
        }
    }

    pub fn page_size(mut self, size: u32) -> Self {
        self.page_size = Some(size);
        self
    }

    pub fn after(mut self, id: impl Into<String>) -> Self {
        self.after = Some(id.into());
        self
    }

    pub fn order_by(mut self, ordering: Ordering) -> Self {
        self.orderings.push(ordering);
        self
    }

    /// The `q` parameter, e.g. `[[at(document.type,"posts")]]`.
    pub fn encode_predicates(&self) -> String {
        let inner: String = self.predicates.iter().map(Predicate::encode).collect();
        format!("[{}]", inner)
    }

    /// The `orderings` parameter, e.g. `[document.last_publication_date desc]`.
    pub fn encode_orderings(&self) -> Option<String> {
        if self.orderings.is_empty() {
            return None;
        }

        let fields = self
            .orderings
            .iter()
            .map(|ordering| {
                if ordering.descending {
                    format!("{} desc", ordering.field)
                } else {
                    ordering.field.clone()
                }
            })
            .collect::<Vec<_>>()
            .join(",");

        Some(format!("[{}]", fields))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CursorError {
    #[error("malformed cursor: {0}")]
    Malformed(#[from] url::ParseError),

    #[error("cursor does not point at the content API")]
    Foreign,
}

/// The content API's next-page URL, without credentials.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cursor(String);

impl Cursor {
    pub fn from_next_page(next_page: &str) -> Result<Self, CursorError> {
        let mut url = Url::parse(next_page)?;

        let kept: Vec<(String, String)> = url
            .query_pairs()
            .filter(|(key, _)| key != "access_token")
            .map(|(key, value)| (key.into_owned(), value.into_owned()))
            .collect();

        if kept.is_empty() {
            url.set_query(None);
        } else {
            url.query_pairs_mut().clear().extend_pairs(kept);
        }

        Ok(Cursor(url.into()))
    }

    /// Accepts a cursor that came back from a browser, as long as it still
    /// points at the same origin as `endpoint`.
    pub fn parse_trusted(raw: &str, endpoint: &Url) -> Result<Self, CursorError> {
        let cursor = Cursor::from_next_page(raw)?;
        if cursor.url()?.origin() != endpoint.origin() {
            return Err(CursorError::Foreign);
        }
        Ok(cursor)
    }

    pub fn url(&self) -> Result<Url, CursorError> {
        Ok(Url::parse(&self.0)?)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// One page of query results.
#[derive(Debug, Clone)]
pub struct SearchPage {
    pub page: u32,
    pub next_page: Option<Cursor>,
    pub results: Vec<ApiDocument>,
}

/// Maps a document to the path it is rendered at.
pub fn link_resolver(kind: &str, uid: Option<&str>) -> String {
    match (kind, uid) {
        (POSTS, Some(uid)) => format!("/post/{}", uid),
        _ => String::from("/"),
    }
}

#[async_trait]
pub trait ContentApi: Send + Sync {
    async fn query(&self, query: &Query, ctx: &FetchContext) -> Result<SearchPage, ContentError>;

    /// Follows a cursor. The ref the first page was read with is part of
    /// the cursor.
    async fn fetch_page(&self, cursor: &Cursor) -> Result<SearchPage, ContentError>;

    async fn get_by_uid(
        &self,
        kind: &str,
        uid: &str,
        ctx: &FetchContext,
    ) -> Result<Option<ApiDocument>, ContentError> {
        let page = self.query(&Query::by_uid(kind, uid), ctx).await?;
        Ok(page.results.into_iter().next())
    }

    /// Looks the document up under the preview token and returns where it
    /// renders. A token the API rejects and an unknown document both
    /// resolve to nothing, so the preview route answers 401 for them
    /// instead of falling back to `/` with the cookie set.
    async fn resolve_preview(
        &self,
        token: &str,
        document_id: &str,
    ) -> Result<Option<String>, ContentError> {
        let ctx = FetchContext::preview(token);
        match self.query(&Query::by_id(document_id), &ctx).await {
            Ok(page) => Ok(page
                .results
                .first()
                .map(|document| link_resolver(&document.kind, document.uid.as_deref()))),

            Err(ContentError::Status { status, .. }) if status.is_client_error() => {
                tracing::debug!(%status, "preview token rejected");
                Ok(None)
            }

            Err(err) => Err(err),
        }
    }
}
