use async_trait::async_trait;
use reqwest::Client;
use serde::{de::DeserializeOwned, Serialize};
use url::Url;

use super::{ContentApi, ContentError, Cursor, CursorError, FetchContext, Query, SearchPage};
use crate::{
    config::{AccessToken, ContentConfig},
    model::network::{ApiRoot, SearchResponse},
};

#[derive(Serialize)]
struct SearchParams<'a> {
    #[serde(rename = "ref")]
    reference: &'a str,
    q: String,
    #[serde(rename = "pageSize", skip_serializing_if = "Option::is_none")]
    page_size: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    orderings: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    after: Option<&'a str>,
    access_token: &'a str,
}

/// Client for the Prismic REST API (v2).
#[derive(Clone, Debug)]
pub struct PrismicClient {
    http: Client,
    endpoint: Url,
    access_token: AccessToken,
}

impl PrismicClient {
    pub fn from_config(config: &ContentConfig) -> Result<Self, ContentError> {
        let http = Client::builder()
            .user_agent(concat!("spacetraveling/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(PrismicClient {
            http,
            endpoint: config.endpoint.clone(),
            access_token: config.access_token.clone(),
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    async fn get<T: DeserializeOwned>(&self, url: Url) -> Result<T, ContentError> {
        tracing::debug!(path = url.path(), "content API request");

        let response = self.http.get(url.clone()).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ContentError::Status {
                status,
                path: url.path().to_string(),
            });
        }

        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    async fn master_ref(&self) -> Result<String, ContentError> {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut()
            .append_pair("access_token", &self.access_token);

        let root: ApiRoot = self.get(url).await?;
        root.master_ref()
            .map(str::to_string)
            .ok_or(ContentError::NoMasterRef)
    }

    async fn reference(&self, ctx: &FetchContext) -> Result<String, ContentError> {
        match &ctx.preview_ref {
            Some(reference) => Ok(reference.clone()),
            None => self.master_ref().await,
        }
    }

    fn search_url(&self, params: &SearchParams<'_>) -> Result<Url, ContentError> {
        let mut url = self.endpoint.clone();
        // http(s) endpoints always have path segments
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push("documents").push("search");
        }
        url.set_query(Some(&serde_urlencoded::to_string(params)?));
        Ok(url)
    }

    fn into_page(response: SearchResponse) -> Result<SearchPage, ContentError> {
        Ok(SearchPage {
            page: response.page,
            next_page: response
                .next_page
                .as_deref()
                .map(Cursor::from_next_page)
                .transpose()?,
            results: response.results,
        })
    }
}

#[async_trait]
impl ContentApi for PrismicClient {
    async fn query(&self, query: &Query, ctx: &FetchContext) -> Result<SearchPage, ContentError> {
        let reference = self.reference(ctx).await?;
        let url = self.search_url(&SearchParams {
            reference: &reference,
            q: query.encode_predicates(),
            page_size: query.page_size,
            orderings: query.encode_orderings(),
            after: query.after.as_deref(),
            access_token: &self.access_token,
        })?;

        let response: SearchResponse = self.get(url).await?;
        tracing::debug!(
            q = %query.encode_predicates(),
            page = response.page,
            results = response.results.len(),
            preview = ctx.is_preview(),
            "content query"
        );

        PrismicClient::into_page(response)
    }

    async fn fetch_page(&self, cursor: &Cursor) -> Result<SearchPage, ContentError> {
        let mut url = cursor.url()?;
        if url.origin() != self.endpoint.origin() {
            return Err(CursorError::Foreign.into());
        }
        url.query_pairs_mut()
            .append_pair("access_token", &self.access_token);

        let response: SearchResponse = self.get(url).await?;
        PrismicClient::into_page(response)
    }
}
