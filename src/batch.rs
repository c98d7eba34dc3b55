//! Paginated category batch submission.
//!
//! Walks the category listing newest-first, one page per request, and hands
//! every matching item to the caller's enqueue function. The listing request
//! is an immutable value; each pagination step derives the next request from
//! the continuation token instead of mutating shared state. The walk ends
//! when a response carries no token. Each upstream item appears once, so
//! each page id is enqueued at most once per run.

use log::{info, warn};
use time::format_description::well_known::Rfc3339;
use time::{Date, OffsetDateTime};

use crate::api::{ContinueToken, WikiClient};
use crate::Result;

/// One step of the listing walk.
#[derive(Debug, Clone)]
pub struct ListingRequest {
    category: String,
    token: Option<ContinueToken>,
}

impl ListingRequest {
    /// First page of a category listing.
    pub fn new(category: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            token: None,
        }
    }

    /// The follow-up request for the next listing page.
    fn with_token(&self, token: ContinueToken) -> Self {
        Self {
            category: self.category.clone(),
            token: Some(token),
        }
    }

    pub fn category(&self) -> &str {
        &self.category
    }
}

/// Walk the full listing and enqueue every item whose timestamp falls on
/// `date_filter` (every item when no filter is given). Returns the number of
/// enqueued items.
pub async fn submit_paged<F>(
    client: &WikiClient,
    request: ListingRequest,
    date_filter: Option<Date>,
    mut enqueue: F,
) -> Result<usize>
where
    F: FnMut(u64, &str),
{
    let mut request = request;
    let mut submitted = 0;

    loop {
        let page = client
            .category_members(request.category(), request.token.as_ref())
            .await?;

        for member in &page.members {
            if matches_filter(&member.timestamp, date_filter) {
                info!("Submitting render for {} ({})", member.title, member.pageid);
                enqueue(member.pageid, &member.title);
                submitted += 1;
            }
        }

        match page.continue_token {
            Some(token) => request = request.with_token(token),
            None => break,
        }
    }

    Ok(submitted)
}

fn matches_filter(timestamp: &str, filter: Option<Date>) -> bool {
    let Some(wanted) = filter else {
        return true;
    };

    match OffsetDateTime::parse(timestamp, &Rfc3339) {
        Ok(parsed) => parsed.date() == wanted,
        Err(err) => {
            warn!(
                "Skipping listing item with unparseable timestamp '{}': {}",
                timestamp, err
            );
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    #[test]
    fn test_no_filter_matches_everything() {
        assert!(matches_filter("2024-03-01T23:59:59Z", None));
        assert!(matches_filter("not a timestamp", None));
    }

    #[test]
    fn test_filter_compares_calendar_dates() {
        let filter = Some(date!(2024 - 03 - 01));
        assert!(matches_filter("2024-03-01T00:00:01Z", filter));
        assert!(matches_filter("2024-03-01T23:59:59Z", filter));
        assert!(!matches_filter("2024-03-02T00:00:01Z", filter));
    }

    #[test]
    fn test_unparseable_timestamp_never_matches_a_filter() {
        assert!(!matches_filter("yesterday", Some(date!(2024 - 03 - 01))));
    }

    #[test]
    fn test_with_token_leaves_the_request_untouched() {
        let first = ListingRequest::new("Category:Finalised");
        let next = first.with_token(ContinueToken {
            cmcontinue: "ts|abc".to_string(),
            continue_: "-||".to_string(),
        });

        assert!(first.token.is_none());
        assert_eq!(next.category(), "Category:Finalised");
        assert_eq!(next.token.unwrap().cmcontinue, "ts|abc");
    }
}
