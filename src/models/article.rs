//! Article model
//!
//! This module provides:
//! - `Article` entity
//! - Input types for creating and updating articles
//! - Limit/offset pagination and list filters

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{RatingSummary, ReactionCounts, User};

/// Article entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Article {
    pub id: i64,
    /// Unique, derived from the title plus a random suffix
    pub slug: String,
    pub title: String,
    pub description: String,
    pub body: String,
    /// Image URLs attached to the article
    pub images: Vec<String>,
    pub tag_list: Vec<String>,
    pub author_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Article {
    pub fn new(slug: String, input: CreateArticleInput, author_id: i64) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            slug,
            title: input.title,
            description: input.description,
            body: input.body,
            images: input.images,
            tag_list: input.tag_list,
            author_id,
            created_at: now,
            updated_at: now,
        }
    }
}

/// An article loaded together with its author and aggregate counts
#[derive(Debug, Clone)]
pub struct ArticleRecord {
    pub article: Article,
    pub author: User,
    pub reactions: ReactionCounts,
    pub rating: RatingSummary,
}

/// Input for creating a new article. Missing fields arrive empty.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CreateArticleInput {
    pub title: String,
    pub description: String,
    pub body: String,
    pub images: Vec<String>,
    #[serde(rename = "tagList")]
    pub tag_list: Vec<String>,
}

impl CreateArticleInput {
    pub fn new(
        title: impl Into<String>,
        description: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            body: body.into(),
            images: Vec::new(),
            tag_list: Vec::new(),
        }
    }

    pub fn with_tags(mut self, tags: &[&str]) -> Self {
        self.tag_list = tags.iter().map(|t| t.to_string()).collect();
        self
    }
}

/// Partial update of an article. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateArticleInput {
    pub title: Option<String>,
    pub description: Option<String>,
    pub body: Option<String>,
    pub images: Option<Vec<String>>,
    #[serde(rename = "tagList")]
    pub tag_list: Option<Vec<String>>,
}

impl UpdateArticleInput {
    pub fn has_changes(&self) -> bool {
        self.title.is_some()
            || self.description.is_some()
            || self.body.is_some()
            || self.images.is_some()
            || self.tag_list.is_some()
    }
}

/// Case-insensitive substring filters for article lists
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ArticleFilter {
    pub title: Option<String>,
    pub description: Option<String>,
    pub body: Option<String>,
    /// Author username
    pub author: Option<String>,
    pub tag: Option<String>,
}

impl ArticleFilter {
    /// Non-empty filters as `(name, value)` pairs, in a stable order
    pub fn active(&self) -> Vec<(&'static str, &str)> {
        [
            ("title", &self.title),
            ("description", &self.description),
            ("body", &self.body),
            ("author", &self.author),
            ("tag", &self.tag),
        ]
        .into_iter()
        .filter_map(|(name, value)| {
            value
                .as_deref()
                .filter(|v| !v.trim().is_empty())
                .map(|v| (name, v))
        })
        .collect()
    }
}

/// Default number of items per page
pub const DEFAULT_LIMIT: u32 = 20;
/// Largest page a client may ask for
pub const MAX_LIMIT: u32 = 100;

/// Limit/offset pagination parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListParams {
    pub limit: u32,
    pub offset: u32,
}

impl Default for ListParams {
    fn default() -> Self {
        Self {
            limit: DEFAULT_LIMIT,
            offset: 0,
        }
    }
}

impl ListParams {
    /// Clamp the limit into `1..=MAX_LIMIT`
    pub fn new(limit: u32, offset: u32) -> Self {
        Self {
            limit: limit.clamp(1, MAX_LIMIT),
            offset,
        }
    }
}

/// One page of results plus the total match count
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PagedResult<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub limit: u32,
    pub offset: u32,
}

impl<T> PagedResult<T> {
    pub fn new(items: Vec<T>, total: i64, params: &ListParams) -> Self {
        Self {
            items,
            total,
            limit: params.limit,
            offset: params.offset,
        }
    }

    /// Offset of the following page, if there is one
    pub fn next_offset(&self) -> Option<u32> {
        let next = self.offset as i64 + self.limit as i64;
        (next < self.total).then_some(next as u32)
    }

    /// Offset of the preceding page, if there is one
    pub fn previous_offset(&self) -> Option<u32> {
        (self.offset > 0).then(|| self.offset.saturating_sub(self.limit))
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> PagedResult<U> {
        PagedResult {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            limit: self.limit,
            offset: self.offset,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_list_params_clamps_limit() {
        assert_eq!(ListParams::new(0, 5), ListParams { limit: 1, offset: 5 });
        assert_eq!(ListParams::new(1000, 0).limit, MAX_LIMIT);
        assert_eq!(ListParams::default().limit, DEFAULT_LIMIT);
    }

    #[test]
    fn test_paged_result_offsets() {
        let params = ListParams::new(10, 10);
        let page = PagedResult::new(vec![1, 2, 3], 25, &params);
        assert_eq!(page.next_offset(), Some(20));
        assert_eq!(page.previous_offset(), Some(0));

        let last = PagedResult::new(vec![1], 25, &ListParams::new(10, 20));
        assert_eq!(last.next_offset(), None);

        let first = PagedResult::new(vec![1], 25, &ListParams::new(10, 0));
        assert_eq!(first.previous_offset(), None);
    }

    #[test]
    fn test_filter_active_skips_blank_values() {
        let filter = ArticleFilter {
            title: Some("rust".to_string()),
            body: Some("  ".to_string()),
            tag: Some("async".to_string()),
            ..Default::default()
        };
        assert_eq!(filter.active(), vec![("title", "rust"), ("tag", "async")]);
    }

    #[test]
    fn test_update_input_has_changes() {
        assert!(!UpdateArticleInput::default().has_changes());
        let input = UpdateArticleInput {
            body: Some("new".to_string()),
            ..Default::default()
        };
        assert!(input.has_changes());
    }

    proptest! {
        /// Walking forward page by page visits every item exactly once.
        #[test]
        fn pages_cover_all_items(total in 0i64..500, limit in 1u32..50) {
            let mut offset = 0u32;
            let mut seen = 0i64;
            loop {
                let params = ListParams::new(limit, offset);
                let on_page = (total - offset as i64).clamp(0, params.limit as i64);
                let page = PagedResult::new(vec![(); on_page as usize], total, &params);
                seen += page.items.len() as i64;
                match page.next_offset() {
                    Some(next) => offset = next,
                    None => break,
                }
            }
            prop_assert_eq!(seen, total);
        }
    }
}
