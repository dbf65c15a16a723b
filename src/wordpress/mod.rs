pub mod rest;

use anyhow::Result;
use async_trait::async_trait;

/// A taxonomy term (category or tag) attached to a post.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Term {
    pub id: u64,
    pub name: String,
}

/// Lightweight post listing entry as returned by discovery queries.
#[derive(Debug, Clone)]
pub struct PostSummary {
    pub id: u64,
    pub title: String,
    pub author_id: u64,
}

/// Full post payload needed to rewrite a post. `id` is the sole identity key
/// for dedup and cursor purposes.
#[derive(Debug, Clone)]
pub struct PostDetail {
    pub id: u64,
    pub title: String,
    pub excerpt: String,
    pub body: String,
    pub author_id: u64,
    pub tags: Vec<Term>,
    pub categories: Vec<Term>,
}

#[async_trait]
pub trait ContentSource: Send + Sync {
    /// Probe the source; a false/Err result aborts the whole cycle.
    async fn test_connection(&self) -> Result<bool>;

    /// Most-recent published posts by `author_id`, descending id, up to
    /// `limit`. Implementations may pre-filter to ids above `since_id`, but
    /// discovery re-applies the cursor filter regardless.
    async fn fetch_posts_since(
        &self,
        author_id: u64,
        since_id: u64,
        limit: u32,
    ) -> Result<Vec<PostSummary>>;

    async fn fetch_post_detail(&self, id: u64) -> Result<PostDetail>;

    /// First half of the write-back: core title/excerpt/body fields.
    async fn update_post_content(
        &self,
        id: u64,
        title: &str,
        excerpt: &str,
        body: &str,
    ) -> Result<bool>;

    /// Second half of the write-back: SEO plugin meta fields. Runs after
    /// `update_post_content`; a failure here leaves the content update
    /// applied upstream (no rollback).
    async fn update_seo_meta(
        &self,
        id: u64,
        seo_title: &str,
        meta_description: &str,
        focus_keyword: &str,
    ) -> Result<bool>;

    /// Soft delete: move the post to trash, never a permanent delete.
    async fn trash_post(&self, id: u64) -> Result<bool>;
}
