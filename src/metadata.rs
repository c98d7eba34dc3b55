//! Article metadata resolution.
//!
//! One resolution call builds the full data set the presentation document
//! needs: language/finalization flags derived from category membership, a
//! description snippet, contributor count, a short modification date, and
//! the canonical image URL. The result is immutable and serves exactly one
//! render; nothing here is persisted.

use log::debug;
use serde::Serialize;
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::OffsetDateTime;

use crate::api::WikiClient;
use crate::image::select_canonical;
use crate::{Error, Result, ServiceConfig};

/// Everything the card document presents about one article.
#[derive(Debug, Clone, Serialize)]
pub struct PageMetadata {
    pub page_id: u64,
    pub title: String,
    /// URL-safe form of the title (spaces as underscores, percent-encoded)
    pub encoded_title: String,
    pub is_tamil_article: bool,
    pub is_english_article: bool,
    pub is_finalized: bool,
    pub content_length: u64,
    pub raw_content: String,
    pub contributors_count: usize,
    /// Short-form date of the page's last touch, empty when unknown
    pub last_modified_on: String,
    /// Description snippet shown on the card
    pub snippet: String,
    /// Chosen embedded image, if any qualified
    pub image_title: Option<String>,
    /// Direct URL of the card image (the default image on fallback)
    pub image_url: String,
}

/// Resolve an article title into [`PageMetadata`].
///
/// Fails with [`Error::PageNotFound`] when the content API marks the page
/// missing. A failing image-info lookup aborts the resolution; the default
/// image is only used when no embedded image qualifies in the first place.
pub async fn resolve_page(
    client: &WikiClient,
    config: &ServiceConfig,
    title: &str,
) -> Result<PageMetadata> {
    let page = client.page_query(title).await?;
    if page.missing {
        return Err(Error::PageNotFound(title.to_string()));
    }

    let categories: Vec<&str> = page.categories.iter().map(|c| c.title.as_str()).collect();
    let is_tamil_article = has_category(&categories, &config.tamil_category);
    let is_english_article = has_category(&categories, &config.english_category);
    let is_finalized = has_category(&categories, &config.finalized_category);

    let raw_content = page
        .revisions
        .first()
        .map(|rev| rev.slots.main.content.clone())
        .unwrap_or_default();

    let last_modified_on = match page.touched.as_deref() {
        Some(touched) => format_touched(touched)?,
        None => String::new(),
    };

    let image_titles: Vec<String> = page.images.iter().map(|img| img.title.clone()).collect();
    let (image_title, image_url) =
        match select_canonical(&raw_content, &image_titles, &config.sentinel_image) {
            Some(chosen) => {
                let url = client.image_url(chosen).await?;
                (Some(chosen.to_string()), url)
            }
            None => {
                debug!("No canonical image for {}, using the default image", title);
                (None, config.default_image_url.clone())
            }
        };

    Ok(PageMetadata {
        page_id: page.pageid,
        encoded_title: encode_title(&page.title),
        title: page.title,
        is_tamil_article,
        is_english_article,
        is_finalized,
        content_length: page.length,
        raw_content,
        contributors_count: page.contributors.len(),
        last_modified_on,
        snippet: extract_snippet(&page.extract, is_tamil_article),
        image_title,
        image_url,
    })
}

/// Exact-match category membership.
fn has_category(categories: &[&str], wanted: &str) -> bool {
    categories.iter().any(|category| *category == wanted)
}

/// Strip line breaks from the description and cut the snippet.
///
/// Only Tamil-flagged articles get a snippet: the scan records the first
/// character whose code point exceeds 127 and keeps everything from there.
/// Other articles yield an empty snippet.
fn extract_snippet(description: &str, is_tamil_article: bool) -> String {
    let stripped: String = description
        .chars()
        .filter(|c| *c != '\n' && *c != '\r')
        .collect();

    if !is_tamil_article {
        return String::new();
    }

    match stripped.char_indices().find(|(_, c)| *c as u32 > 127) {
        Some((start, _)) => stripped[start..].to_string(),
        None => stripped,
    }
}

/// `6 Mar 2024`-style rendering of the page's RFC 3339 `touched` timestamp.
fn format_touched(touched: &str) -> Result<String> {
    let parsed = OffsetDateTime::parse(touched, &Rfc3339).map_err(|e| {
        Error::UpstreamApi(format!("Unparseable touched timestamp '{}': {}", touched, e))
    })?;

    let format = format_description!("[day padding:none] [month repr:short] [year]");
    parsed
        .format(&format)
        .map_err(|e| Error::UpstreamApi(format!("Cannot format timestamp '{}': {}", touched, e)))
}

/// Title in the form usable inside the view-document URL.
fn encode_title(title: &str) -> String {
    let underscored = title.replace(' ', "_");
    url::form_urlencoded::byte_serialize(underscored.as_bytes()).collect()
}
