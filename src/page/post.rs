//! A single post with its derived fields and neighbours.

use ammonia::Builder;
use serde::Serialize;

use crate::{
    comments::CommentsScript,
    content::{ContentApi, FetchContext, Ordering, Query, POSTS},
    model::{
        document::{ContentBlock, Post, PostStub, PublicationDate},
        ApiError,
    },
    page::{format_date, format_edited, published_at, Html},
    richtext,
};

pub const WORDS_PER_MINUTE: usize = 200;

const LAST_PUBLICATION_DATE: &str = "document.last_publication_date";

#[derive(Debug)]
pub enum Resolution {
    /// The route has not produced a slug yet.
    Pending,
    Missing,
    Found(Box<Post>),
}

pub async fn resolve_post(
    api: &dyn ContentApi,
    slug: Option<&str>,
    ctx: &FetchContext,
) -> Result<Resolution, ApiError> {
    let Some(slug) = slug.filter(|slug| !slug.is_empty()) else {
        return Ok(Resolution::Pending);
    };

    match api.get_by_uid(POSTS, slug, ctx).await? {
        Some(document) => Ok(Resolution::Found(Box::new(Post::from_document(document)?))),
        None => Ok(Resolution::Missing),
    }
}

/// Pieces between single spaces. Empty text is one word and a double
/// space adds an empty one.
fn count_words(text: &str) -> usize {
    text.split(' ').count()
}

/// Minutes to read every heading and body, at 200 words a minute, rounded
/// up.
pub fn compute_reading_time(content: &[ContentBlock]) -> usize {
    let words: usize = content
        .iter()
        .map(|block| count_words(&block.heading) + count_words(&richtext::as_text(&block.body)))
        .sum();

    words.div_ceil(WORDS_PER_MINUTE)
}

pub fn compute_edited_label(
    first: Option<&PublicationDate>,
    last: Option<&PublicationDate>,
) -> Option<String> {
    if first == last {
        return None;
    }

    Some(format_edited(published_at(last)))
}

#[derive(Serialize, Clone, Debug, Default, PartialEq)]
pub struct Navigation {
    pub prev_post: Option<PostStub>,
    pub next_post: Option<PostStub>,
}

/// Neighbours of document `id` by last publication date. Either side is
/// empty at the ends.
pub async fn resolve_navigation(
    api: &dyn ContentApi,
    id: &str,
    ctx: &FetchContext,
) -> Result<Navigation, ApiError> {
    let next = Query::documents(POSTS)
        .page_size(1)
        .after(id)
        .order_by(Ordering::desc(LAST_PUBLICATION_DATE));
    let prev = Query::documents(POSTS)
        .page_size(1)
        .after(id)
        .order_by(Ordering::asc(LAST_PUBLICATION_DATE));

    let (next, prev) = futures_util::try_join!(api.query(&next, ctx), api.query(&prev, ctx))?;

    Ok(Navigation {
        prev_post: prev.results.first().and_then(PostStub::from_document),
        next_post: next.results.first().and_then(PostStub::from_document),
    })
}

#[derive(Serialize, Debug)]
pub struct SectionView {
    pub heading: String,
    pub body: Html,
}

#[derive(Serialize, Debug)]
pub struct PostView {
    pub uid: String,
    pub title: String,
    pub banner: Option<String>,
    pub author: String,
    pub first_publication_date: String,
    pub reading_time: usize,
    pub edited: Option<String>,
    pub content: Vec<SectionView>,
    pub navigation: Navigation,
    pub comments: Option<CommentsScript>,
    pub preview: bool,
}

impl PostView {
    pub fn new(
        post: &Post,
        navigation: Navigation,
        comments: Option<CommentsScript>,
        preview: bool,
        sanitizer: &Builder<'_>,
    ) -> Self {
        PostView {
            uid: post.uid.clone(),
            title: post.title.clone(),
            banner: post.banner.clone(),
            author: post.author.clone(),
            first_publication_date: format_date(published_at(
                post.first_publication_date.as_ref(),
            )),
            reading_time: compute_reading_time(&post.content),
            edited: compute_edited_label(
                post.first_publication_date.as_ref(),
                post.last_publication_date.as_ref(),
            ),
            content: post
                .content
                .iter()
                .map(|block| SectionView {
                    heading: block.heading.clone(),
                    body: richtext::render_body(&block.body, sanitizer),
                })
                .collect(),
            navigation,
            comments,
            preview,
        }
    }
}
