//! The post list and its "load more" pagination.

use serde::Serialize;

use crate::{
    content::{ContentApi, Cursor, FetchContext, Query, SearchPage, POSTS},
    model::{
        document::{DocumentError, PostSummary},
        network::ApiDocument,
        ApiError,
    },
    page::{format_date, published_at},
};

#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct PostSummaryView {
    pub uid: String,
    pub first_publication_date: String,
    pub title: String,
    pub subtitle: String,
    pub author: String,
}

impl From<&PostSummary> for PostSummaryView {
    fn from(post: &PostSummary) -> Self {
        PostSummaryView {
            uid: post.uid.clone(),
            first_publication_date: format_date(published_at(
                post.first_publication_date.as_ref(),
            )),
            title: post.title.clone(),
            subtitle: post.subtitle.clone(),
            author: post.author.clone(),
        }
    }
}

/// Posts shown so far plus the cursor to the rest.
///
/// Loading goes through [`PostList::trigger`], which hands out at most one
/// [`PendingLoad`] at a time; the load is settled with
/// [`PostList::complete`] or [`PostList::abort`].
///
/// The guard covers one `PostList` value. `GET /api/posts` builds a fresh
/// list per request with [`PostList::resume`], so across requests the
/// browser script's `loading` flag is what keeps "load more" single-flight.
#[derive(Debug, Clone, Default)]
pub struct PostList {
    posts: Vec<PostSummary>,
    next_page: Option<Cursor>,
    page: u32,
    in_flight: bool,
}

#[derive(Debug)]
pub enum Trigger {
    Start(PendingLoad),
    Exhausted,
    Busy,
}

#[derive(Debug)]
pub struct PendingLoad {
    cursor: Cursor,
}

impl PendingLoad {
    pub fn cursor(&self) -> &Cursor {
        &self.cursor
    }
}

fn summaries(results: &[ApiDocument]) -> Result<Vec<PostSummary>, DocumentError> {
    let mut posts = Vec::with_capacity(results.len());
    for document in results {
        match PostSummary::from_document(document) {
            Ok(post) => posts.push(post),
            Err(DocumentError::MissingUid(id)) => {
                tracing::warn!(%id, "skipping post without uid");
            }
            Err(err) => return Err(err),
        }
    }
    Ok(posts)
}

impl PostList {
    pub async fn load_initial(
        api: &dyn ContentApi,
        ctx: &FetchContext,
        page_size: u32,
    ) -> Result<Self, ApiError> {
        let page = api
            .query(&Query::documents(POSTS).page_size(page_size), ctx)
            .await?;

        Ok(PostList {
            posts: summaries(&page.results)?,
            next_page: page.next_page,
            page: page.page,
            in_flight: false,
        })
    }

    /// An empty list that continues from `cursor`.
    pub fn resume(cursor: Option<Cursor>) -> Self {
        PostList {
            next_page: cursor,
            ..PostList::default()
        }
    }

    pub fn posts(&self) -> &[PostSummary] {
        &self.posts
    }

    pub fn next_page(&self) -> Option<&Cursor> {
        self.next_page.as_ref()
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn has_more(&self) -> bool {
        self.next_page.is_some()
    }

    pub fn is_loading(&self) -> bool {
        self.in_flight
    }

    pub fn trigger(&mut self) -> Trigger {
        if self.in_flight {
            return Trigger::Busy;
        }

        match &self.next_page {
            None => Trigger::Exhausted,
            Some(cursor) => {
                self.in_flight = true;
                Trigger::Start(PendingLoad {
                    cursor: cursor.clone(),
                })
            }
        }
    }

    /// Appends the fetched page after the posts already shown. Returns how
    /// many posts were added.
    pub fn complete(&mut self, load: PendingLoad, page: SearchPage) -> Result<usize, ApiError> {
        let PendingLoad { cursor } = load;
        self.in_flight = false;

        let fetched = summaries(&page.results)?;
        let overlap = fetched
            .iter()
            .filter(|post| self.posts.iter().any(|seen| seen.uid == post.uid))
            .count();
        if overlap > 0 {
            tracing::warn!(overlap, cursor = cursor.as_str(), "next page repeats posts");
        }

        let added = fetched.len();
        self.posts.extend(fetched);
        self.next_page = page.next_page;
        self.page = page.page;
        Ok(added)
    }

    pub fn abort(&mut self, load: PendingLoad) {
        tracing::debug!(cursor = load.cursor.as_str(), "next page failed");
        self.in_flight = false;
    }

    /// Fetches the next page unless the list is exhausted or already
    /// loading, in which case nothing happens and `Ok(0)` is returned.
    pub async fn load_next_page(&mut self, api: &dyn ContentApi) -> Result<usize, ApiError> {
        let load = match self.trigger() {
            Trigger::Start(load) => load,
            Trigger::Exhausted | Trigger::Busy => return Ok(0),
        };

        match api.fetch_page(load.cursor()).await {
            Ok(page) => self.complete(load, page),
            Err(err) => {
                self.abort(load);
                Err(err.into())
            }
        }
    }
}

#[derive(Serialize, Debug)]
pub struct HomeView {
    pub posts: Vec<PostSummaryView>,
    pub next_page: Option<Cursor>,
    pub preview: bool,
}

impl HomeView {
    pub fn new(list: &PostList, preview: bool) -> Self {
        HomeView {
            posts: list.posts().iter().map(PostSummaryView::from).collect(),
            next_page: list.next_page().cloned(),
            preview,
        }
    }
}

/// Body of `GET /api/posts`.
#[derive(Serialize, Debug)]
pub struct NextPageView {
    pub results: Vec<PostSummaryView>,
    pub next_page: Option<Cursor>,
    pub page: u32,
}

impl NextPageView {
    pub fn new(list: &PostList) -> Self {
        NextPageView {
            results: list.posts().iter().map(PostSummaryView::from).collect(),
            next_page: list.next_page().cloned(),
            page: list.page(),
        }
    }
}
