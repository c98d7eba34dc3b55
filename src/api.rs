//! Upstream wiki API client.
//!
//! All three upstream queries (page content, image info, category listing)
//! funnel through a single throttled `GET <base>/api.php` helper, so the
//! minimum-spacing policy applies process-wide regardless of which pipeline
//! path issues the request.

use std::time::{Duration, Instant};

use log::debug;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tokio::sync::Mutex;
use url::Url;

use crate::{Error, Result, ServiceConfig};

/// Throttled client for the wiki's `api.php` endpoint.
pub struct WikiClient {
    http: Client,
    base: Url,
    min_spacing: Duration,
    last_dispatch: Mutex<Option<Instant>>,
}

impl WikiClient {
    /// Build a client from the service configuration.
    pub fn new(config: &ServiceConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_millis(config.api_timeout_ms))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| Error::Init(format!("Failed to build HTTP client: {}", e)))?;

        let base = Url::parse(&config.api_base)
            .map_err(|e| Error::Config(format!("Invalid API base URL '{}': {}", config.api_base, e)))?;

        Ok(Self {
            http,
            base,
            min_spacing: Duration::from_millis(config.throttle_ms),
            last_dispatch: Mutex::new(None),
        })
    }

    /// Sleep until the minimum spacing since the previous dispatch has
    /// elapsed. The lock is held across the sleep so concurrent callers
    /// queue up behind one another.
    async fn throttle(&self) {
        let mut last = self.last_dispatch.lock().await;
        if let Some(prev) = *last {
            let ready_at = prev + self.min_spacing;
            let now = Instant::now();
            if ready_at > now {
                tokio::time::sleep(ready_at - now).await;
            }
        }
        *last = Some(Instant::now());
    }

    async fn query<T: DeserializeOwned>(&self, params: &[(&str, String)]) -> Result<T> {
        self.throttle().await;

        let url = self
            .base
            .join("api.php")
            .map_err(|e| Error::Config(format!("Cannot derive api.php endpoint: {}", e)))?;

        let response = self
            .http
            .get(url)
            .query(params)
            .send()
            .await
            .map_err(|e| Error::UpstreamApi(format!("Request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(Error::UpstreamApi(format!(
                "Unexpected status {} from api.php",
                response.status()
            )));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| Error::UpstreamApi(format!("Malformed response: {}", e)))
    }

    /// Fetch the full page record for an article title.
    pub async fn page_query(&self, title: &str) -> Result<ApiPage> {
        debug!("Requesting API data for {}", title);

        let params = [
            ("action", "query".to_string()),
            ("titles", title.to_string()),
            (
                "prop",
                "extracts|imageinfo|categories|contributors|images|info|pageprops|revisions"
                    .to_string(),
            ),
            ("rvslots", "*".to_string()),
            ("rvprop", "content".to_string()),
            ("format", "json".to_string()),
            ("formatversion", "2".to_string()),
            ("explaintext", "1".to_string()),
            ("exsectionformat", "plain".to_string()),
            ("exintro", "1".to_string()),
        ];

        let response: PageQueryResponse = self.query(&params).await?;
        response
            .query
            .pages
            .into_iter()
            .next()
            .ok_or_else(|| Error::UpstreamApi(format!("Empty page list for '{}'", title)))
    }

    /// Resolve an image title to its direct URL.
    pub async fn image_url(&self, image_title: &str) -> Result<String> {
        debug!("Requesting image API data for {}", image_title);

        let params = [
            ("action", "query".to_string()),
            ("titles", image_title.to_string()),
            ("prop", "imageinfo".to_string()),
            ("iiprop", "timestamp|user|url".to_string()),
            ("format", "json".to_string()),
            ("formatversion", "2".to_string()),
        ];

        let response: ImageQueryResponse = self.query(&params).await?;
        response
            .query
            .pages
            .into_iter()
            .next()
            .and_then(|page| page.imageinfo.into_iter().next())
            .map(|info| info.url)
            .ok_or_else(|| Error::UpstreamApi(format!("No image info for '{}'", image_title)))
    }

    /// Fetch one page of category members, newest first.
    pub async fn category_members(
        &self,
        category: &str,
        token: Option<&ContinueToken>,
    ) -> Result<ListingPage> {
        let mut params = vec![
            ("action", "query".to_string()),
            ("list", "categorymembers".to_string()),
            ("cmtitle", category.to_string()),
            ("cmprop", "ids|title|type|timestamp".to_string()),
            ("cmsort", "timestamp".to_string()),
            ("cmdir", "descending".to_string()),
            ("cmlimit", "500".to_string()),
            ("format", "json".to_string()),
            ("formatversion", "2".to_string()),
        ];
        if let Some(token) = token {
            params.push(("cmcontinue", token.cmcontinue.clone()));
            params.push(("continue", token.continue_.clone()));
        }

        let response: ListingResponse = self.query(&params).await?;
        Ok(ListingPage {
            members: response.query.members,
            continue_token: response.continue_,
        })
    }
}

/// One page object from the content API (`formatversion=2`).
#[derive(Debug, Clone, Deserialize)]
pub struct ApiPage {
    #[serde(default)]
    pub missing: bool,
    #[serde(default)]
    pub pageid: u64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub categories: Vec<Titled>,
    #[serde(default)]
    pub images: Vec<Titled>,
    #[serde(default)]
    pub contributors: Vec<Contributor>,
    /// Plain-text intro extract; the card description
    #[serde(default)]
    pub extract: String,
    #[serde(default)]
    pub revisions: Vec<Revision>,
    /// Last-touched timestamp, RFC 3339
    #[serde(default)]
    pub touched: Option<String>,
    #[serde(default)]
    pub length: u64,
}

/// A `{ "title": ... }` object (categories, embedded images)
#[derive(Debug, Clone, Deserialize)]
pub struct Titled {
    pub title: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Contributor {
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Revision {
    #[serde(default)]
    pub slots: Slots,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Slots {
    #[serde(default)]
    pub main: Slot,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Slot {
    #[serde(default)]
    pub content: String,
}

/// Opaque continuation cursor returned by the listing API. Both fields are
/// echoed back verbatim on the follow-up request.
#[derive(Debug, Clone, Deserialize)]
pub struct ContinueToken {
    pub cmcontinue: String,
    #[serde(rename = "continue")]
    pub continue_: String,
}

/// One item of a category listing page.
#[derive(Debug, Clone, Deserialize)]
pub struct ListedPage {
    pub pageid: u64,
    pub title: String,
    #[serde(default)]
    pub timestamp: String,
}

/// One page of category members plus the cursor for the next page, if any.
#[derive(Debug, Clone)]
pub struct ListingPage {
    pub members: Vec<ListedPage>,
    pub continue_token: Option<ContinueToken>,
}

#[derive(Debug, Deserialize)]
struct PageQueryResponse {
    query: PageQueryBody,
}

#[derive(Debug, Deserialize)]
struct PageQueryBody {
    #[serde(default)]
    pages: Vec<ApiPage>,
}

#[derive(Debug, Deserialize)]
struct ImageQueryResponse {
    query: ImageQueryBody,
}

#[derive(Debug, Deserialize)]
struct ImageQueryBody {
    #[serde(default)]
    pages: Vec<ImagePage>,
}

#[derive(Debug, Deserialize)]
struct ImagePage {
    #[serde(default)]
    imageinfo: Vec<ImageInfo>,
}

#[derive(Debug, Deserialize)]
struct ImageInfo {
    url: String,
}

#[derive(Debug, Deserialize)]
struct ListingResponse {
    #[serde(rename = "continue")]
    continue_: Option<ContinueToken>,
    query: ListingBody,
}

#[derive(Debug, Deserialize)]
struct ListingBody {
    #[serde(default, rename = "categorymembers")]
    members: Vec<ListedPage>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_response_shape() {
        let raw = r#"{
            "query": { "pages": [ {
                "pageid": 4242,
                "title": "Some Article",
                "categories": [{"title": "Category:Tamil Content"}],
                "images": [{"title": "File:Photo.jpg"}],
                "contributors": [{"name": "A"}, {"name": "B"}],
                "extract": "An article.",
                "revisions": [{"slots": {"main": {"content": "body text"}}}],
                "touched": "2024-03-01T09:30:00Z",
                "length": 1234
            } ] }
        }"#;

        let parsed: PageQueryResponse = serde_json::from_str(raw).unwrap();
        let page = &parsed.query.pages[0];
        assert!(!page.missing);
        assert_eq!(page.pageid, 4242);
        assert_eq!(page.contributors.len(), 2);
        assert_eq!(page.revisions[0].slots.main.content, "body text");
    }

    #[test]
    fn test_missing_page_shape() {
        let raw = r#"{"query":{"pages":[{"title":"Nope","missing":true}]}}"#;
        let parsed: PageQueryResponse = serde_json::from_str(raw).unwrap();
        assert!(parsed.query.pages[0].missing);
        assert!(parsed.query.pages[0].revisions.is_empty());
    }

    #[test]
    fn test_listing_continuation_shape() {
        let raw = r#"{
            "continue": {"cmcontinue": "ts|abc", "continue": "-||"},
            "query": {"categorymembers": [
                {"pageid": 1, "title": "One", "timestamp": "2024-03-01T00:00:00Z"}
            ]}
        }"#;
        let parsed: ListingResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.query.members.len(), 1);
        assert_eq!(parsed.continue_.unwrap().cmcontinue, "ts|abc");
    }

    #[tokio::test]
    async fn test_throttle_spaces_requests() {
        let server = tiny_http::Server::http("127.0.0.1:0").unwrap();
        let addr = server.server_addr();
        std::thread::spawn(move || {
            for request in server.incoming_requests() {
                let _ = request.respond(tiny_http::Response::from_string(
                    r#"{"query":{"pages":[]}}"#,
                ));
            }
        });

        let config = ServiceConfig {
            api_base: format!("http://{}/", addr),
            throttle_ms: 80,
            ..Default::default()
        };
        let client = WikiClient::new(&config).unwrap();

        let started = Instant::now();
        let _: serde_json::Value = client
            .query(&[("action", "query".to_string())])
            .await
            .unwrap();
        let _: serde_json::Value = client
            .query(&[("action", "query".to_string())])
            .await
            .unwrap();

        assert!(started.elapsed() >= Duration::from_millis(80));
    }
}
