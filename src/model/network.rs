//! Wire types returned by the content API.

use serde::Deserialize;

#[derive(Deserialize, Debug, Clone)]
pub struct ApiRoot {
    pub refs: Vec<ApiRef>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct ApiRef {
    pub id: String,
    #[serde(rename = "ref")]
    pub reference: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(rename = "isMasterRef", default)]
    pub is_master_ref: bool,
}

impl ApiRoot {
    pub fn master_ref(&self) -> Option<&str> {
        self.refs
            .iter()
            .find(|r| r.is_master_ref)
            .map(|r| r.reference.as_str())
    }
}

fn first_page() -> u32 {
    1
}

#[derive(Deserialize, Debug, Clone)]
pub struct SearchResponse {
    #[serde(default = "first_page")]
    pub page: u32,
    pub next_page: Option<String>,
    #[serde(default)]
    pub results: Vec<ApiDocument>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct ApiDocument {
    pub id: String,
    #[serde(default)]
    pub uid: Option<String>,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub first_publication_date: Option<String>,
    #[serde(default)]
    pub last_publication_date: Option<String>,
    #[serde(default)]
    pub data: PostData,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct PostData {
    pub title: Option<String>,
    pub subtitle: Option<String>,
    pub author: Option<String>,
    pub banner: Option<ImageField>,
    pub content: Vec<ContentGroup>,
}

#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct ImageField {
    pub url: Option<String>,
    pub alt: Option<String>,
}

#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct ContentGroup {
    pub heading: Option<String>,
    pub body: Vec<RichTextBlock>,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct RichTextBlock {
    #[serde(rename = "type")]
    pub kind: BlockKind,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub spans: Vec<Span>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub alt: Option<String>,
    #[serde(default)]
    pub oembed: Option<Embed>,
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    #[serde(rename = "paragraph")]
    Paragraph,
    #[serde(rename = "heading1")]
    Heading1,
    #[serde(rename = "heading2")]
    Heading2,
    #[serde(rename = "heading3")]
    Heading3,
    #[serde(rename = "heading4")]
    Heading4,
    #[serde(rename = "heading5")]
    Heading5,
    #[serde(rename = "heading6")]
    Heading6,
    #[serde(rename = "preformatted")]
    Preformatted,
    #[serde(rename = "list-item")]
    ListItem,
    #[serde(rename = "o-list-item")]
    OrderedListItem,
    #[serde(rename = "image")]
    Image,
    #[serde(rename = "embed")]
    Embed,
    #[serde(other)]
    Unknown,
}

#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct Embed {
    pub html: Option<String>,
    pub embed_url: Option<String>,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
    #[serde(rename = "type")]
    pub kind: SpanKind,
    #[serde(default)]
    pub data: Option<LinkData>,
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpanKind {
    #[serde(rename = "strong")]
    Strong,
    #[serde(rename = "em")]
    Em,
    #[serde(rename = "hyperlink")]
    Hyperlink,
    #[serde(other)]
    Unknown,
}

#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct LinkData {
    pub link_type: Option<String>,
    pub url: Option<String>,
    pub uid: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub target: Option<String>,
}
