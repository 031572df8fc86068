//! HTML templates and the cache of rendered pages.

use std::{collections::HashMap, time::Duration};

use ammonia::Builder;
use serde::Serialize;
use tera::{Context, Tera};
use tokio::{sync::RwLock, time::Instant};

use crate::{
    page::{home::HomeView, post::PostView},
    richtext,
};

const TEMPLATES: [(&str, &str); 4] = [
    ("base.html", include_str!("../templates/base.html")),
    ("index.html", include_str!("../templates/index.html")),
    ("post.html", include_str!("../templates/post.html")),
    ("loading.html", include_str!("../templates/loading.html")),
];

pub struct Renderer {
    tera: Tera,
    sanitizer: Builder<'static>,
}

impl Renderer {
    pub fn new() -> Result<Self, tera::Error> {
        let mut tera = Tera::default();
        tera.add_raw_templates(TEMPLATES)?;

        Ok(Renderer {
            tera,
            sanitizer: richtext::sanitizer(),
        })
    }

    pub fn sanitizer(&self) -> &Builder<'static> {
        &self.sanitizer
    }

    pub fn home(&self, view: &HomeView) -> Result<String, tera::Error> {
        self.render("index.html", view)
    }

    pub fn post(&self, view: &PostView) -> Result<String, tera::Error> {
        self.render("post.html", view)
    }

    /// Placeholder shown while a post's slug is still unresolved.
    pub fn loading(&self) -> Result<String, tera::Error> {
        self.tera.render("loading.html", &Context::new())
    }

    fn render<T: Serialize>(&self, name: &str, view: &T) -> Result<String, tera::Error> {
        let context = Context::from_serialize(view)?;
        self.tera.render(name, &context)
    }
}

struct Rendered {
    html: String,
    rendered_at: Instant,
}

/// Rendered published pages, keyed by path, each valid for the
/// revalidation interval after it was rendered.
pub struct RenderCache {
    revalidate: Duration,
    pages: RwLock<HashMap<String, Rendered>>,
}

impl RenderCache {
    pub fn new(revalidate: Duration) -> Self {
        RenderCache {
            revalidate,
            pages: RwLock::new(HashMap::new()),
        }
    }

    pub async fn get(&self, path: &str) -> Option<String> {
        let pages = self.pages.read().await;
        pages
            .get(path)
            .filter(|page| page.rendered_at.elapsed() < self.revalidate)
            .map(|page| page.html.clone())
    }

    pub async fn insert(&self, path: impl Into<String>, html: String) {
        self.pages.write().await.insert(
            path.into(),
            Rendered {
                html,
                rendered_at: Instant::now(),
            },
        );
    }

    pub async fn len(&self) -> usize {
        self.pages.read().await.len()
    }
}
