//! Plain-text and HTML serialization of structured rich text.

use std::collections::BTreeSet;

use ammonia::{clean_text, Builder};

use crate::{
    content::link_resolver,
    model::network::{BlockKind, RichTextBlock, Span, SpanKind},
    page::Html,
};

pub fn as_text(blocks: &[RichTextBlock]) -> String {
    blocks
        .iter()
        .map(|block| block.text.as_str())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Markup for `blocks` with every text run and attribute entity-encoded.
/// [`render_body`] normalizes it through the sanitizer.
pub fn as_html(blocks: &[RichTextBlock]) -> String {
    let mut html = String::new();
    let mut open_list = None;

    for block in blocks {
        let list = match block.kind {
            BlockKind::ListItem => Some("ul"),
            BlockKind::OrderedListItem => Some("ol"),
            _ => None,
        };

        if open_list != list {
            if let Some(tag) = open_list {
                html.push_str(&format!("</{}>", tag));
            }
            if let Some(tag) = list {
                html.push_str(&format!("<{}>", tag));
            }
            open_list = list;
        }

        match block.kind {
            BlockKind::Heading1 => push_block(&mut html, "h1", block),
            BlockKind::Heading2 => push_block(&mut html, "h2", block),
            BlockKind::Heading3 => push_block(&mut html, "h3", block),
            BlockKind::Heading4 => push_block(&mut html, "h4", block),
            BlockKind::Heading5 => push_block(&mut html, "h5", block),
            BlockKind::Heading6 => push_block(&mut html, "h6", block),
            BlockKind::Preformatted => push_block(&mut html, "pre", block),
            BlockKind::ListItem | BlockKind::OrderedListItem => push_block(&mut html, "li", block),

            BlockKind::Image => {
                if let Some(url) = &block.url {
                    html.push_str(&format!(
                        "<p><img src=\"{}\" alt=\"{}\" /></p>",
                        clean_text(url),
                        clean_text(block.alt.as_deref().unwrap_or(""))
                    ));
                }
            }

            BlockKind::Embed => {
                let Some(embed) = &block.oembed else {
                    continue;
                };

                if let Some(embed_html) = &embed.html {
                    html.push_str(&format!("<div>{}</div>", embed_html));
                } else if let Some(url) = &embed.embed_url {
                    html.push_str(&format!(
                        "<div><a href=\"{}\">{}</a></div>",
                        clean_text(url),
                        clean_text(url)
                    ));
                }
            }

            BlockKind::Paragraph | BlockKind::Unknown => push_block(&mut html, "p", block),
        }
    }

    if let Some(tag) = open_list {
        html.push_str(&format!("</{}>", tag));
    }

    html
}

/// HTML allow-list for post bodies. Embeds may carry iframes.
pub fn sanitizer() -> Builder<'static> {
    let mut builder = Builder::default();
    builder
        .add_tags(&["iframe"])
        .add_tag_attributes("a", &["target"])
        .add_tag_attributes(
            "iframe",
            &["src", "title", "width", "height", "frameborder", "allowfullscreen"],
        );
    builder
}

pub fn render_body(blocks: &[RichTextBlock], sanitizer: &Builder<'_>) -> Html {
    Html(sanitizer.clean(&as_html(blocks)).to_string())
}

fn push_block(html: &mut String, tag: &str, block: &RichTextBlock) {
    html.push_str(&format!("<{}>", tag));
    push_spans(html, &block.text, &block.spans);
    html.push_str(&format!("</{}>", tag));
}

/// Span offsets count characters. Overlapping spans are closed and reopened
/// at every boundary so the output always nests.
fn push_spans(html: &mut String, text: &str, spans: &[Span]) {
    let chars: Vec<char> = text.chars().collect();
    let len = chars.len();

    let mut spans: Vec<&Span> = spans
        .iter()
        .filter(|span| span.start < span.end && span.start < len)
        .collect();
    spans.sort_by(|a, b| a.start.cmp(&b.start).then(b.end.cmp(&a.end)));

    let mut bounds = BTreeSet::from([0, len]);
    for span in &spans {
        bounds.insert(span.start);
        bounds.insert(span.end.min(len));
    }
    let bounds: Vec<usize> = bounds.into_iter().collect();

    for window in bounds.windows(2) {
        let (from, to) = (window[0], window[1]);
        let active: Vec<(String, &str)> = spans
            .iter()
            .filter(|span| span.start <= from && span.end >= to)
            .filter_map(|span| tags(span))
            .collect();

        for (open, _) in &active {
            html.push_str(open);
        }

        let segment: String = chars[from..to].iter().collect();
        let lines: Vec<String> = segment.split('\n').map(clean_text).collect();
        html.push_str(&lines.join("<br />"));

        for (_, close) in active.iter().rev() {
            html.push_str(close);
        }
    }
}

fn tags(span: &Span) -> Option<(String, &'static str)> {
    match span.kind {
        SpanKind::Strong => Some((String::from("<strong>"), "</strong>")),
        SpanKind::Em => Some((String::from("<em>"), "</em>")),
        SpanKind::Hyperlink => {
            let data = span.data.as_ref()?;
            let href = match data.link_type.as_deref() {
                Some("Document") => {
                    link_resolver(data.kind.as_deref().unwrap_or(""), data.uid.as_deref())
                }
                _ => data.url.clone()?,
            };

            let target = match data.target.as_deref() {
                Some(target) => format!(" target=\"{}\"", clean_text(target)),
                None => String::new(),
            };

            Some((format!("<a href=\"{}\"{}>", clean_text(&href), target), "</a>"))
        }
        SpanKind::Unknown => None,
    }
}
