//! Common API utilities and shared types
//!
//! Pagination query parsing and the relative next/previous links of paged
//! responses.

use serde::Deserialize;

use crate::models::{ArticleFilter, ListParams, PagedResult, DEFAULT_LIMIT};

// ============================================================================
// Pagination Defaults
// ============================================================================

pub fn default_limit() -> u32 {
    DEFAULT_LIMIT
}

// ============================================================================
// Pagination Query Types
// ============================================================================

/// Query string of an article list: limit/offset plus filters
#[derive(Debug, Default, Deserialize)]
pub struct ArticleListQuery {
    #[serde(default = "default_limit")]
    pub limit: u32,
    #[serde(default)]
    pub offset: u32,
    pub title: Option<String>,
    pub description: Option<String>,
    pub body: Option<String>,
    pub author: Option<String>,
    pub tag: Option<String>,
}

impl ArticleListQuery {
    pub fn params(&self) -> ListParams {
        ListParams::new(self.limit, self.offset)
    }

    pub fn filter(&self) -> ArticleFilter {
        ArticleFilter {
            title: self.title.clone(),
            description: self.description.clone(),
            body: self.body.clone(),
            author: self.author.clone(),
            tag: self.tag.clone(),
        }
    }
}

/// Relative URL of the page at `offset`, keeping the active filters
pub fn page_link(path: &str, filter: &ArticleFilter, limit: u32, offset: u32) -> String {
    let mut link = format!("{}?limit={}", path, limit);
    if offset > 0 {
        link.push_str(&format!("&offset={}", offset));
    }
    for (name, value) in filter.active() {
        link.push_str(&format!("&{}={}", name, urlencoding::encode(value)));
    }
    link
}

/// `(next, previous)` links of `page`
pub fn page_links<T>(
    path: &str,
    filter: &ArticleFilter,
    page: &PagedResult<T>,
) -> (Option<String>, Option<String>) {
    let next = page
        .next_offset()
        .map(|offset| page_link(path, filter, page.limit, offset));
    let previous = page
        .previous_offset()
        .map(|offset| page_link(path, filter, page.limit, offset));
    (next, previous)
}
