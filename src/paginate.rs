use crate::error::CrawlerError;
use crate::fetch::Fetch;
use std::collections::BTreeSet;
use tracing::{debug, warn};

/// Appends the page query parameter, respecting an existing query string.
pub fn page_url(base_url: &str, page: u32) -> String {
    if base_url.contains('?') {
        format!("{}&page={}", base_url, page)
    } else {
        format!("{}?page={}", base_url, page)
    }
}

/// Walks every page of a listing, accumulating extracted items into a set.
///
/// The first page doubles as the source of the pagination indicator; when the
/// indicator is absent or malformed the listing is treated as single-page and
/// whatever the first page yielded is returned. A fetch or extraction failure
/// on any one page skips that page and pagination continues - partial results
/// beat total failure for one malformed page.
pub async fn paginate<F, T, C, X>(
    fetcher: &F,
    base_url: &str,
    page_count: C,
    extract: X,
) -> BTreeSet<T>
where
    F: Fetch + ?Sized,
    T: Ord,
    C: Fn(&str) -> Option<u32>,
    X: Fn(&str) -> Result<BTreeSet<T>, CrawlerError>,
{
    let mut items = BTreeSet::new();

    let first = match fetcher.fetch(base_url).await {
        Ok(page) => page,
        Err(e) => {
            warn!("Skipping listing {}: {}", base_url, e);
            return items;
        }
    };

    match extract(&first) {
        Ok(found) => items.extend(found),
        Err(e) => warn!("Skipping page 1 of {}: {}", base_url, e),
    }

    let count = match page_count(&first) {
        Some(count) => count,
        None => {
            debug!("No pagination indicator on {}, single page", base_url);
            return items;
        }
    };

    for page in 2..=count {
        let url = page_url(base_url, page);
        let body = match fetcher.fetch(&url).await {
            Ok(body) => body,
            Err(e) => {
                warn!("Skipping page {} of {}: {}", page, base_url, e);
                continue;
            }
        };
        match extract(&body) {
            Ok(found) => items.extend(found),
            Err(e) => warn!("Skipping page {} of {}: {}", page, base_url, e),
        }
    }

    items
}
