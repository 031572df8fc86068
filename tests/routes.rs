use std::sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering as AtomicOrdering},
    Arc,
};

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{
        header::{CONTENT_TYPE, COOKIE, LOCATION, SET_COOKIE},
        Request, StatusCode,
    },
    response::Response,
    Router,
};
use http_body_util::BodyExt;
use tower::ServiceExt;
use url::Url;

use spacetraveling::{
    config::Config,
    content::{ContentApi, ContentError, Cursor, FetchContext, Predicate, Query, SearchPage},
    model::network::ApiDocument,
    routes::{router, AppState},
};

const ENDPOINT: &str = "https://fake.cdn.prismic.io/api/v2";
const TOKEN: &str = "valid-preview";

fn document(uid: &str, title: &str, date: &str) -> ApiDocument {
    serde_json::from_value(serde_json::json!({
        "id": format!("id-{}", uid),
        "uid": uid,
        "type": "posts",
        "first_publication_date": date,
        "last_publication_date": date,
        "data": {
            "title": title,
            "subtitle": "Pensando em sincronização",
            "author": "Joseph Oliveira",
            "banner": { "url": "https://images.prismic.io/banner.png" },
            "content": [{
                "heading": "Proin et varius",
                "body": [{ "type": "paragraph", "text": "Nullam dolor sapien, vulputate eu diam at", "spans": [] }]
            }]
        }
    }))
    .unwrap()
}

#[derive(Default)]
struct FakeContent {
    published: Vec<ApiDocument>,
    drafts: Vec<ApiDocument>,
    requests: AtomicUsize,
    down: AtomicBool,
}

impl FakeContent {
    fn blog() -> Self {
        let dates = [
            ("f", "Seis"),
            ("e", "Cinco"),
            ("d", "Quatro"),
            ("c", "Três"),
            ("b", "Dois"),
            ("a", "Um"),
        ];
        let published = dates
            .iter()
            .enumerate()
            .map(|(i, (uid, title))| document(uid, title, &format!("2021-03-{:02}T10:00:00+0000", 10 - i)))
            .collect();

        FakeContent {
            published,
            drafts: vec![document("rascunho", "Rascunho", "2021-03-20T10:00:00+0000")],
            ..FakeContent::default()
        }
    }

    fn requests(&self) -> usize {
        self.requests.load(AtomicOrdering::SeqCst)
    }

    fn search(&self, query: &Query, reference: Option<&str>, page: u32) -> Result<SearchPage, ContentError> {
        self.requests.fetch_add(1, AtomicOrdering::SeqCst);

        if self.down.load(AtomicOrdering::SeqCst) {
            return Err(ContentError::NoMasterRef);
        }

        let mut documents = self.published.clone();
        match reference {
            None => {}
            Some(TOKEN) => documents.extend(self.drafts.iter().cloned()),
            Some(_) => {
                return Err(ContentError::Status {
                    status: reqwest::StatusCode::NOT_FOUND,
                    path: String::from("/api/v2/documents/search"),
                })
            }
        }

        documents.retain(|document| {
            query.predicates.iter().all(|predicate| {
                let Predicate::At { path, value } = predicate;
                match path.as_str() {
                    "document.type" => &document.kind == value,
                    "document.id" => &document.id == value,
                    _ => document.uid.as_ref() == Some(value),
                }
            })
        });

        documents.sort_by(|a, b| b.first_publication_date.cmp(&a.first_publication_date));
        if let Some(ordering) = query.orderings.first() {
            documents.sort_by(|a, b| a.last_publication_date.cmp(&b.last_publication_date));
            if ordering.descending {
                documents.reverse();
            }
        }

        if let Some(after) = &query.after {
            let position = documents.iter().position(|document| &document.id == after);
            documents = match position {
                Some(position) => documents.split_off(position + 1),
                None => Vec::new(),
            };
        }

        let size = query.page_size.unwrap_or(20) as usize;
        let start = (page as usize - 1) * size;
        let next_page = (start + size < documents.len()).then(|| {
            Cursor::from_next_page(&format!(
                "{}/documents/search?ref={}&page={}&pageSize={}&access_token=secret",
                ENDPOINT,
                reference.unwrap_or("master"),
                page + 1,
                size
            ))
            .unwrap()
        });

        Ok(SearchPage {
            page,
            next_page,
            results: documents.into_iter().skip(start).take(size).collect(),
        })
    }
}

#[async_trait]
impl ContentApi for FakeContent {
    async fn query(&self, query: &Query, ctx: &FetchContext) -> Result<SearchPage, ContentError> {
        self.search(query, ctx.preview_ref.as_deref(), 1)
    }

    async fn fetch_page(&self, cursor: &Cursor) -> Result<SearchPage, ContentError> {
        let url = cursor.url()?;
        let param = |name: &str| {
            url.query_pairs()
                .find(|(key, _)| key == name)
                .map(|(_, value)| value.into_owned())
        };

        let reference = param("ref").filter(|r| r != "master");
        let page = param("page").and_then(|p| p.parse().ok()).unwrap_or(1);
        let size = param("pageSize").and_then(|p| p.parse().ok()).unwrap_or(20);

        self.search(
            &Query::documents("posts").page_size(size),
            reference.as_deref(),
            page,
        )
    }
}

fn config() -> Config {
    Config::from_toml(&format!(
        r#"
        [content]
        endpoint = "{}"
        access_token = "secret"
        "#,
        ENDPOINT
    ))
    .unwrap()
}

fn app(content: Arc<FakeContent>) -> (Router, AppState) {
    let state = AppState::new(content, &config()).unwrap();
    (router(state.clone()), state)
}

async fn get(app: &Router, uri: &str, cookie: Option<&str>) -> Response {
    let mut request = Request::builder().uri(uri);
    if let Some(cookie) = cookie {
        request = request.header(COOKIE, cookie);
    }

    app.clone()
        .oneshot(request.body(Body::empty()).unwrap())
        .await
        .unwrap()
}

async fn body(response: Response) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

fn set_cookie(response: &Response) -> Option<String> {
    response
        .headers()
        .get(SET_COOKIE)
        .map(|value| value.to_str().unwrap().to_string())
}

#[tokio::test]
async fn preview_with_unresolvable_token_is_unauthorized() {
    let (app, _) = app(Arc::new(FakeContent::blog()));

    for uri in [
        "/api/preview?token=stale&documentId=id-a",
        "/api/preview?token=valid-preview&documentId=unknown",
        "/api/preview?documentId=id-a",
        "/api/preview",
    ] {
        let response = get(&app, uri, None).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{}", uri);
        assert!(set_cookie(&response).is_none(), "{}", uri);

        let json: serde_json::Value = serde_json::from_str(&body(response).await).unwrap();
        assert_eq!(json, serde_json::json!({ "message": "Invalid token" }));
    }
}

#[tokio::test]
async fn preview_redirects_to_the_document_and_sets_the_cookie() {
    let (app, _) = app(Arc::new(FakeContent::blog()));

    let response = get(&app, "/api/preview?token=valid-preview&documentId=id-rascunho", None).await;

    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(response.headers()[LOCATION], "/post/rascunho");

    let cookie = set_cookie(&response).unwrap();
    assert!(cookie.starts_with("spacetraveling_preview=valid-preview"), "{}", cookie);
    assert!(cookie.contains("HttpOnly"));
    assert!(cookie.contains("Path=/"));
}

#[tokio::test]
async fn exit_preview_clears_the_cookie() {
    let (app, _) = app(Arc::new(FakeContent::blog()));

    let response = get(&app, "/api/exit-preview", Some("spacetraveling_preview=valid-preview")).await;

    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(response.headers()[LOCATION], "/");

    let cookie = set_cookie(&response).unwrap();
    assert!(cookie.starts_with("spacetraveling_preview="), "{}", cookie);
    assert!(cookie.contains("Max-Age=0"), "{}", cookie);
}

#[tokio::test]
async fn home_lists_the_first_page() {
    let (app, _) = app(Arc::new(FakeContent::blog()));

    let response = get(&app, "/", None).await;
    assert_eq!(response.status(), StatusCode::OK);

    let html = body(response).await;
    for uid in ["f", "e", "d", "c", "b"] {
        assert!(html.contains(&format!("href=\"/post/{}\"", uid)), "{}", uid);
    }
    assert!(!html.contains("href=\"/post/a\""));
    assert!(html.contains("Carregar mais posts"));
    assert!(html.contains("10 mar 2021"));
    assert!(!html.contains("Rascunho"));
    assert!(!html.contains("/api/exit-preview"));
}

#[tokio::test]
async fn published_pages_are_served_from_the_cache() {
    let content = Arc::new(FakeContent::blog());
    let (app, _) = app(content.clone());

    let first = body(get(&app, "/", None).await).await;
    let requests = content.requests();

    let second = body(get(&app, "/", None).await).await;
    assert_eq!(first, second);
    assert_eq!(content.requests(), requests);
}

#[tokio::test]
async fn preview_bypasses_the_cache() {
    let content = Arc::new(FakeContent::blog());
    let (app, _) = app(content.clone());

    body(get(&app, "/", None).await).await;
    let requests = content.requests();

    let html = body(get(&app, "/", Some("spacetraveling_preview=valid-preview")).await).await;
    assert!(content.requests() > requests);
    assert!(html.contains("Rascunho"));
    assert!(html.contains("/api/exit-preview"));

    let published = body(get(&app, "/", None).await).await;
    assert!(!published.contains("Rascunho"));
}

#[tokio::test]
async fn post_page() {
    let (app, _) = app(Arc::new(FakeContent::blog()));

    let response = get(&app, "/post/c", None).await;
    assert_eq!(response.status(), StatusCode::OK);

    let html = body(response).await;
    assert!(html.contains("<title>Três | spacetraveling.</title>"));
    assert!(html.contains("<h2>Proin et varius</h2>"));
    assert!(html.contains("Nullam dolor sapien, vulputate eu diam at"));
    assert!(html.contains("1 min"));
    assert!(html.contains("07 mar 2021"));
    assert!(html.contains("href=\"/post/d\""));
    assert!(html.contains("Post anterior"));
    assert!(html.contains("href=\"/post/b\""));
    assert!(html.contains("Próximo post"));
    assert_eq!(html.matches("utteranc.es").count(), 1);
}

#[tokio::test]
async fn newest_and_oldest_posts_have_one_neighbour() {
    let (app, _) = app(Arc::new(FakeContent::blog()));

    let newest = body(get(&app, "/post/f", None).await).await;
    assert!(!newest.contains("Post anterior"));
    assert!(newest.contains("Próximo post"));

    let oldest = body(get(&app, "/post/a", None).await).await;
    assert!(oldest.contains("Post anterior"));
    assert!(!oldest.contains("Próximo post"));
}

#[tokio::test]
async fn drafts_need_the_preview_cookie() {
    let (app, _) = app(Arc::new(FakeContent::blog()));

    let response = get(&app, "/post/rascunho", None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = get(&app, "/post/rascunho", Some("spacetraveling_preview=valid-preview")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body(response).await.contains("Sair do modo Preview"));
}

#[tokio::test]
async fn unknown_paths_are_not_found() {
    let (app, _) = app(Arc::new(FakeContent::blog()));

    assert_eq!(get(&app, "/post/nope", None).await.status(), StatusCode::NOT_FOUND);
    assert_eq!(get(&app, "/about", None).await.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn next_page_endpoint() {
    let (app, _) = app(Arc::new(FakeContent::blog()));
    let cursor = format!("{}/documents/search?ref=master&page=2&pageSize=5", ENDPOINT);
    let uri = format!(
        "/api/posts?cursor={}",
        url::form_urlencoded::byte_serialize(cursor.as_bytes()).collect::<String>()
    );

    let response = get(&app, &uri, None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[CONTENT_TYPE], "application/json");

    let json: serde_json::Value = serde_json::from_str(&body(response).await).unwrap();
    assert_eq!(json["page"], 2);
    assert_eq!(json["next_page"], serde_json::Value::Null);
    assert_eq!(json["results"][0]["uid"], "a");
    assert_eq!(json["results"][0]["title"], "Um");
    assert_eq!(json["results"][0]["first_publication_date"], "05 mar 2021");
}

#[tokio::test]
async fn next_page_without_a_cursor_is_empty() {
    let content = Arc::new(FakeContent::blog());
    let (app, _) = app(content.clone());

    let response = get(&app, "/api/posts", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(content.requests(), 0);

    let json: serde_json::Value = serde_json::from_str(&body(response).await).unwrap();
    assert_eq!(json["results"], serde_json::json!([]));
    assert_eq!(json["next_page"], serde_json::Value::Null);
}

#[tokio::test]
async fn next_page_refuses_foreign_cursors() {
    let content = Arc::new(FakeContent::blog());
    let (app, _) = app(content.clone());

    let response = get(
        &app,
        "/api/posts?cursor=https%3A%2F%2Fevil.example%2Fdocuments%2Fsearch%3Fpage%3D2",
        None,
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(content.requests(), 0);
}

#[tokio::test]
async fn content_outage_is_a_bad_gateway() {
    let content = Arc::new(FakeContent::blog());
    content.down.store(true, AtomicOrdering::SeqCst);
    let (app, _) = app(content);

    assert_eq!(get(&app, "/", None).await.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(get(&app, "/post/a", None).await.status(), StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn prerender_fills_the_cache() {
    let content = Arc::new(FakeContent::blog());
    let (app, state) = app(content.clone());

    assert_eq!(state.prerender().await.unwrap(), 6);
    assert_eq!(state.cache.len().await, 7);

    let requests = content.requests();
    assert_eq!(get(&app, "/post/d", None).await.status(), StatusCode::OK);
    assert_eq!(get(&app, "/", None).await.status(), StatusCode::OK);
    assert_eq!(content.requests(), requests);
}

#[test]
fn endpoint_in_config() {
    assert_eq!(config().content.endpoint, Url::parse(ENDPOINT).unwrap());
}
