use std::future::Future;

use tender_common::CrawlResult;

/// Hard cap on items collected by one paginated fetch.
pub const DEFAULT_HARD_CAP: usize = 500;

#[derive(Debug, Clone, Copy)]
pub struct PaginationPolicy {
    pub page_size: usize,
    pub hard_cap: usize,
}

impl PaginationPolicy {
    pub fn new(page_size: usize) -> Self {
        Self {
            page_size: page_size.max(1),
            hard_cap: DEFAULT_HARD_CAP,
        }
    }

    pub fn with_hard_cap(mut self, hard_cap: usize) -> Self {
        self.hard_cap = hard_cap;
        self
    }
}

/// Parameters for one page request. `number` is 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub number: usize,
    pub offset: usize,
    pub size: usize,
}

/// One decoded page, with the total the source declares if it declares one.
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub declared_total: Option<usize>,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, declared_total: Option<usize>) -> Self {
        Self {
            items,
            declared_total,
        }
    }
}

/// Fetch pages until a short page, the declared total, or the hard cap,
/// whichever comes first.
///
/// An error on the first page is returned so the caller's strategy fails and
/// the fallback chain can move on. An error on a later page stops pagination
/// and keeps what was collected.
pub async fn paginate<T, F, Fut>(
    source: &str,
    policy: PaginationPolicy,
    mut fetch_page: F,
) -> CrawlResult<Vec<T>>
where
    F: FnMut(PageRequest) -> Fut,
    Fut: Future<Output = CrawlResult<Page<T>>>,
{
    let mut collected: Vec<T> = Vec::new();
    let mut number = 1;

    loop {
        let request = PageRequest {
            number,
            offset: collected.len(),
            size: policy.page_size,
        };

        let page = match fetch_page(request).await {
            Ok(page) => page,
            Err(e) if number == 1 => return Err(e),
            Err(e) => {
                tracing::warn!(source, page = number, error = %e, "Page fetch failed, keeping earlier pages");
                break;
            }
        };

        let received = page.items.len();
        collected.extend(page.items);

        if collected.len() >= policy.hard_cap {
            tracing::info!(source, cap = policy.hard_cap, "Hit pagination hard cap, stopping");
            collected.truncate(policy.hard_cap);
            break;
        }
        if page
            .declared_total
            .is_some_and(|total| collected.len() >= total)
        {
            break;
        }
        if received < policy.page_size {
            break;
        }

        number += 1;
    }

    Ok(collected)
}
