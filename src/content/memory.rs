//! In-memory content API used by the unit tests.

use std::sync::{
    atomic::{AtomicUsize, Ordering as AtomicOrdering},
    Mutex,
};

use async_trait::async_trait;
use url::Url;

use super::{ContentApi, ContentError, Cursor, FetchContext, Predicate, Query, SearchPage};
use crate::model::network::ApiDocument;

pub(crate) const ENDPOINT: &str = "https://memory.cdn.prismic.io/api/v2";
pub(crate) const PREVIEW_TOKEN: &str = "preview-token";

pub(crate) fn post(uid: &str, title: &str, first: &str, last: &str) -> ApiDocument {
    serde_json::from_value(serde_json::json!({
        "id": format!("id-{}", uid),
        "uid": uid,
        "type": "posts",
        "first_publication_date": first,
        "last_publication_date": last,
        "data": {
            "title": title,
            "subtitle": format!("{} subtitle", title),
            "author": "Joseph Oliveira",
            "banner": { "url": format!("https://images.prismic.io/{}.png", uid) },
            "content": [{
                "heading": "Proin et varius",
                "body": [{ "type": "paragraph", "text": "Lorem ipsum dolor sit amet", "spans": [] }]
            }]
        }
    }))
    .unwrap()
}

#[derive(Default)]
pub(crate) struct MemoryContent {
    published: Vec<ApiDocument>,
    drafts: Mutex<Vec<ApiDocument>>,
    requests: AtomicUsize,
}

impl MemoryContent {
    /// Posts given as `(uid, title, publication date)`, in list order.
    pub(crate) fn with_posts(posts: &[(&str, &str, &str)]) -> Self {
        MemoryContent {
            published: posts
                .iter()
                .map(|(uid, title, date)| post(uid, title, date, date))
                .collect(),
            ..MemoryContent::default()
        }
    }

    pub(crate) fn add_draft(&self, document: ApiDocument) {
        self.drafts.lock().unwrap().push(document);
    }

    pub(crate) fn id_of(&self, uid: &str) -> String {
        format!("id-{}", uid)
    }

    pub(crate) fn requests(&self) -> usize {
        self.requests.load(AtomicOrdering::SeqCst)
    }

    fn visible(&self, ctx: &FetchContext) -> Result<Vec<ApiDocument>, ContentError> {
        match ctx.preview_ref.as_deref() {
            None => Ok(self.published.clone()),
            Some(PREVIEW_TOKEN) => {
                let mut documents = self.published.clone();
                documents.extend(self.drafts.lock().unwrap().iter().cloned());
                Ok(documents)
            }
            Some(_) => Err(ContentError::Status {
                status: reqwest::StatusCode::NOT_FOUND,
                path: String::from("/api/v2/documents/search"),
            }),
        }
    }

    fn run(&self, query: &Query, ctx: &FetchContext, page: u32) -> Result<SearchPage, ContentError> {
        self.requests.fetch_add(1, AtomicOrdering::SeqCst);

        let mut documents: Vec<ApiDocument> = self
            .visible(ctx)?
            .into_iter()
            .filter(|document| query.predicates.iter().all(|p| matches(p, document)))
            .collect();

        for ordering in query.orderings.iter().rev() {
            documents.sort_by(|a, b| {
                let order = field(a, &ordering.field).cmp(&field(b, &ordering.field));
                if ordering.descending {
                    order.reverse()
                } else {
                    order
                }
            });
        }

        if let Some(after) = query.after.as_deref() {
            documents = match documents.iter().position(|document| document.id == after) {
                Some(position) => documents.split_off(position + 1),
                None => Vec::new(),
            };
        }

        let page_size = query.page_size.unwrap_or(20) as usize;
        let start = (page as usize - 1) * page_size;
        let results: Vec<ApiDocument> = documents.iter().skip(start).take(page_size).cloned().collect();

        let next_page = if start + page_size < documents.len() {
            let mut url = Url::parse(ENDPOINT).unwrap();
            url.path_segments_mut().unwrap().push("documents").push("search");
            url.query_pairs_mut()
                .append_pair("ref", ctx.preview_ref.as_deref().unwrap_or("master"))
                .append_pair("page", &(page + 1).to_string())
                .append_pair("pageSize", &page_size.to_string())
                .append_pair("access_token", "memory-secret");
            Some(Cursor::from_next_page(url.as_str())?)
        } else {
            None
        };

        Ok(SearchPage {
            page,
            next_page,
            results,
        })
    }
}

fn matches(predicate: &Predicate, document: &ApiDocument) -> bool {
    let Predicate::At { path, value } = predicate;
    match path.as_str() {
        "document.type" => &document.kind == value,
        "document.id" => &document.id == value,
        path if path.ends_with(".uid") => document.uid.as_ref() == Some(value),
        _ => false,
    }
}

fn field<'d>(document: &'d ApiDocument, name: &str) -> Option<&'d str> {
    match name {
        "document.first_publication_date" => document.first_publication_date.as_deref(),
        "document.last_publication_date" => document.last_publication_date.as_deref(),
        _ => None,
    }
}

#[async_trait]
impl ContentApi for MemoryContent {
    async fn query(&self, query: &Query, ctx: &FetchContext) -> Result<SearchPage, ContentError> {
        self.run(query, ctx, 1)
    }

    async fn fetch_page(&self, cursor: &Cursor) -> Result<SearchPage, ContentError> {
        let url = cursor.url()?;
        let param = |name: &str| {
            url.query_pairs()
                .find(|(key, _)| key == name)
                .map(|(_, value)| value.into_owned())
        };

        let ctx = match param("ref").as_deref() {
            Some("master") | None => FetchContext::published(),
            Some(reference) => FetchContext::preview(reference),
        };
        let page = param("page").and_then(|p| p.parse().ok()).unwrap_or(1);
        let page_size = param("pageSize").and_then(|p| p.parse().ok()).unwrap_or(20);

        self.run(
            &Query::documents(super::POSTS).page_size(page_size),
            &ctx,
            page,
        )
    }
}
