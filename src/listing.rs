use serde::{Deserialize, Serialize};
use ts_rs::TS;
use utoipa::IntoParams;

use crate::models::{Campaign, CampaignStatus, User};

/// Fixed page size for every dashboard list view.
pub const PAGE_SIZE: usize = 20;

/// Page
///
/// One page of an already-filtered collection, with enough bookkeeping for
/// the dashboard to render its pager controls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// 1-based, clamped to the valid range.
    pub page: usize,
    pub total_pages: usize,
    pub total_items: usize,
}

/// text_matches
///
/// The text predicate: case-insensitive substring match, where an empty or
/// absent filter value is always true.
pub fn text_matches(haystack: &str, needle: Option<&str>) -> bool {
    match needle {
        None => true,
        Some(n) if n.trim().is_empty() => true,
        Some(n) => haystack.to_lowercase().contains(&n.trim().to_lowercase()),
    }
}

/// CampaignFilter
///
/// Query parameters of the campaign list view. Predicates are a conjunction:
/// substring match on the name, exact match on the status.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
pub struct CampaignFilter {
    /// Case-insensitive substring filter on the campaign name.
    pub search: Option<String>,
    /// Exact status filter.
    pub status: Option<CampaignStatus>,
    /// 1-based page number; defaults to the first page.
    pub page: Option<usize>,
}

impl CampaignFilter {
    pub fn matches(&self, campaign: &Campaign) -> bool {
        let text_ok = text_matches(&campaign.name, self.search.as_deref());
        let status_ok = self.status.is_none_or(|s| s == campaign.status);
        text_ok && status_ok
    }
}

/// UserFilter
///
/// Query parameters of the user list view: one substring filter applied to
/// name and email.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
pub struct UserFilter {
    /// Case-insensitive substring filter on user name or email.
    pub search: Option<String>,
    /// 1-based page number; defaults to the first page.
    pub page: Option<usize>,
}

impl UserFilter {
    pub fn matches(&self, user: &User) -> bool {
        match self.search.as_deref() {
            None => true,
            Some(s) => text_matches(&user.name, Some(s)) || text_matches(&user.email, Some(s)),
        }
    }
}

/// paginate
///
/// Pure function of (filtered collection, requested page): returns at most
/// PAGE_SIZE items, with the page number clamped into `[1, total_pages]` so
/// out-of-range navigation lands on a boundary page instead of an empty one.
pub fn paginate<T: Clone>(items: &[T], page: usize) -> Page<T> {
    let total_items = items.len();
    let total_pages = total_items.div_ceil(PAGE_SIZE);
    let page = page.clamp(1, total_pages.max(1));

    let start = (page - 1) * PAGE_SIZE;
    let page_items = items
        .iter()
        .skip(start)
        .take(PAGE_SIZE)
        .cloned()
        .collect();

    Page {
        items: page_items,
        page,
        total_pages,
        total_items,
    }
}
