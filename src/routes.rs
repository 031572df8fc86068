use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{header::LOCATION, StatusCode, Uri},
    response::{Html, IntoResponse},
    routing::get,
    Json, Router,
};
use axum_extra::extract::{
    cookie::{Cookie, SameSite},
    CookieJar,
};
use serde::Deserialize;
use tower_http::trace::TraceLayer;
use url::Url;

use crate::{
    comments::CommentsWidget,
    compat::{ApiQuery, PREVIEW_COOKIE},
    config::{CommentsConfig, Config},
    content::{link_resolver, ContentApi, Cursor, FetchContext, Query, POSTS},
    model::ApiError,
    page::{
        home::{HomeView, NextPageView, PostList},
        post::{resolve_navigation, resolve_post, PostView, Resolution},
    },
    render::{RenderCache, Renderer},
};

const HOME: &str = "/";

pub struct Site {
    pub endpoint: Url,
    pub page_size: u32,
    pub comments: CommentsConfig,
}

#[derive(Clone)]
pub struct AppState {
    pub api: Arc<dyn ContentApi>,
    pub renderer: Arc<Renderer>,
    pub cache: Arc<RenderCache>,
    pub site: Arc<Site>,
}

impl AppState {
    pub fn new(api: Arc<dyn ContentApi>, config: &Config) -> Result<Self, tera::Error> {
        Ok(AppState {
            api,
            renderer: Arc::new(Renderer::new()?),
            cache: Arc::new(RenderCache::new(config.render.revalidate())),
            site: Arc::new(Site {
                endpoint: config.content.endpoint.clone(),
                page_size: config.render.page_size,
                comments: config.comments.clone(),
            }),
        })
    }

    async fn cached(&self, path: &str, ctx: &FetchContext) -> Option<String> {
        if ctx.is_preview() {
            return None;
        }
        self.cache.get(path).await
    }

    async fn store(&self, path: &str, ctx: &FetchContext, html: &str) {
        if !ctx.is_preview() {
            self.cache.insert(path, html.to_string()).await;
        }
    }

    pub async fn render_home(&self, ctx: &FetchContext) -> Result<String, ApiError> {
        let list = PostList::load_initial(self.api.as_ref(), ctx, self.site.page_size).await?;
        Ok(self.renderer.home(&HomeView::new(&list, ctx.is_preview()))?)
    }

    pub async fn render_post(
        &self,
        slug: Option<&str>,
        ctx: &FetchContext,
    ) -> Result<String, ApiError> {
        let post = match resolve_post(self.api.as_ref(), slug, ctx).await? {
            Resolution::Pending => return Ok(self.renderer.loading()?),
            Resolution::Missing => {
                return Err(ApiError::NotFound(link_resolver(POSTS, slug)));
            }
            Resolution::Found(post) => post,
        };

        let navigation = resolve_navigation(self.api.as_ref(), &post.id, ctx).await?;
        let mut comments = CommentsWidget::new(&self.site.comments);
        let view = PostView::new(
            &post,
            navigation,
            comments.mount(),
            ctx.is_preview(),
            self.renderer.sanitizer(),
        );

        Ok(self.renderer.post(&view)?)
    }

    /// Renders the home page and every published post into the cache.
    /// A post that fails to render is logged and skipped.
    pub async fn prerender(&self) -> Result<usize, ApiError> {
        let ctx = FetchContext::published();

        let home = self.render_home(&ctx).await?;
        self.cache.insert(HOME, home).await;

        let mut page = self
            .api
            .query(&Query::documents(POSTS).page_size(100), &ctx)
            .await?;
        let mut rendered = 0;

        loop {
            for document in &page.results {
                let Some(uid) = document.uid.as_deref() else {
                    continue;
                };

                match self.render_post(Some(uid), &ctx).await {
                    Ok(html) => {
                        self.cache.insert(link_resolver(POSTS, Some(uid)), html).await;
                        rendered += 1;
                    }
                    Err(err) => tracing::warn!(%uid, error = %err, "could not prerender post"),
                }
            }

            let Some(cursor) = page.next_page.take() else {
                break;
            };
            page = self.api.fetch_page(&cursor).await?;
        }

        Ok(rendered)
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/post/:slug", get(post))
        .route("/api/posts", get(next_posts))
        .route("/api/preview", get(preview))
        .route("/api/exit-preview", get(exit_preview))
        .fallback(not_found)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

async fn index(State(state): State<AppState>, ctx: FetchContext) -> Result<Html<String>, ApiError> {
    if let Some(html) = state.cached(HOME, &ctx).await {
        return Ok(Html(html));
    }

    let html = state.render_home(&ctx).await?;
    state.store(HOME, &ctx, &html).await;
    Ok(Html(html))
}

async fn post(
    State(state): State<AppState>,
    ctx: FetchContext,
    Path(slug): Path<String>,
) -> Result<Html<String>, ApiError> {
    let path = link_resolver(POSTS, Some(&slug));
    if let Some(html) = state.cached(&path, &ctx).await {
        return Ok(Html(html));
    }

    let html = state.render_post(Some(&slug), &ctx).await?;
    state.store(&path, &ctx, &html).await;
    Ok(Html(html))
}

#[derive(Deserialize, Debug)]
struct NextPageParams {
    cursor: Option<String>,
}

async fn next_posts(
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<NextPageParams>,
) -> Result<Json<NextPageView>, ApiError> {
    let cursor = params
        .cursor
        .as_deref()
        .map(|raw| Cursor::parse_trusted(raw, &state.site.endpoint))
        .transpose()?;

    let mut list = PostList::resume(cursor);
    list.load_next_page(state.api.as_ref()).await?;
    Ok(Json(NextPageView::new(&list)))
}

#[derive(Deserialize, Debug)]
struct PreviewParams {
    token: Option<String>,
    #[serde(rename = "documentId")]
    document_id: Option<String>,
}

async fn preview(
    State(state): State<AppState>,
    jar: CookieJar,
    ApiQuery(params): ApiQuery<PreviewParams>,
) -> Result<impl IntoResponse, ApiError> {
    let (Some(token), Some(document_id)) = (params.token, params.document_id) else {
        return Err(ApiError::InvalidPreviewToken);
    };

    let Some(target) = state.api.resolve_preview(&token, &document_id).await? else {
        tracing::info!(%document_id, "preview token did not resolve");
        return Err(ApiError::InvalidPreviewToken);
    };

    tracing::info!(%document_id, %target, "entering preview");
    let cookie = Cookie::build((PREVIEW_COOKIE, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax);

    Ok((StatusCode::FOUND, jar.add(cookie), [(LOCATION, target)]))
}

async fn exit_preview(jar: CookieJar) -> impl IntoResponse {
    let jar = jar.remove(Cookie::build(PREVIEW_COOKIE).path("/"));
    (StatusCode::FOUND, jar, [(LOCATION, HOME)])
}

async fn not_found(uri: Uri) -> ApiError {
    ApiError::NotFound(uri.path().to_string())
}
