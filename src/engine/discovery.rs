//! Post discovery and deduplication.
//!
//! Fetches recent posts past the processing cursor, collapses duplicates
//! that share a normalized title (keeping the highest id and trashing the
//! rest), and filters survivors down to the eligible categories.

use crate::store::{LogStatus, Store};
use crate::wordpress::{ContentSource, PostDetail, PostSummary};
use anyhow::Result;
use regex::Regex;
use std::collections::HashMap;
use std::sync::OnceLock;

fn numeric_entity_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"&#\d+;").expect("valid entity regex"))
}

fn non_word_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^\w\s]").expect("valid non-word regex"))
}

/// Category ids and fetch parameters for one discovery pass.
#[derive(Debug, Clone)]
pub struct DiscoveryParams {
    pub author_id: u64,
    pub fetch_limit: u32,
    pub movie_category_id: u64,
    pub series_category_id: u64,
}

/// Normalize a title for duplicate detection: numeric HTML character
/// references and all non-word/non-space characters are dropped, the rest is
/// lowercased and trimmed. Equality under this mapping defines a duplicate
/// group: punctuation-only differences collapse, inserted words do not.
pub fn normalize_title(title: &str) -> String {
    let no_entities = numeric_entity_re().replace_all(title, "");
    let words_only = non_word_re().replace_all(&no_entities, "");
    words_only.to_lowercase().trim().to_string()
}

/// Split candidates into canonical posts (the highest id per normalized
/// title) and the duplicates to trash.
fn partition_duplicates(candidates: Vec<PostSummary>) -> (Vec<PostSummary>, Vec<PostSummary>) {
    let mut groups: HashMap<String, Vec<PostSummary>> = HashMap::new();
    for post in candidates {
        groups.entry(normalize_title(&post.title)).or_default().push(post);
    }

    let mut canonical = Vec::new();
    let mut duplicates = Vec::new();
    for (_, mut group) in groups {
        group.sort_by(|a, b| b.id.cmp(&a.id));
        let mut members = group.into_iter();
        if let Some(winner) = members.next() {
            canonical.push(winner);
        }
        duplicates.extend(members);
    }
    (canonical, duplicates)
}

fn is_eligible(detail: &PostDetail, params: &DiscoveryParams) -> bool {
    detail.categories.iter().any(|c| {
        c.id == params.movie_category_id || c.id == params.series_category_id
    })
}

/// Discover eligible posts past the cursor. Duplicate posts are trashed
/// through the source; a failed trash is logged as a warning and the post is
/// excluded from this cycle either way. The returned set carries no order
/// guarantee beyond `id > cursor_id` and category eligibility.
pub async fn discover_eligible_posts(
    source: &dyn ContentSource,
    store: &Store,
    params: &DiscoveryParams,
    cursor_id: u64,
) -> Result<Vec<PostDetail>> {
    let summaries = source
        .fetch_posts_since(params.author_id, cursor_id, params.fetch_limit)
        .await?;

    // The adapter may return ids in any range; the cursor filter is ours.
    let fresh: Vec<PostSummary> = summaries.into_iter().filter(|p| p.id > cursor_id).collect();
    if fresh.is_empty() {
        tracing::info!(cursor_id, "no new posts past cursor");
        return Ok(Vec::new());
    }
    tracing::info!(cursor_id, count = fresh.len(), "candidate posts past cursor");

    let (canonical, duplicates) = partition_duplicates(fresh);

    for dup in &duplicates {
        match source.trash_post(dup.id).await {
            Ok(true) => {
                tracing::info!(post_id = dup.id, title = %dup.title, "duplicate trashed");
                store.log_processing(
                    dup.id,
                    &dup.title,
                    "duplicate_cleanup",
                    LogStatus::Success,
                    "duplicate title, moved to trash",
                    0.0,
                )?;
            }
            Ok(false) => {
                tracing::warn!(post_id = dup.id, title = %dup.title, "duplicate trash rejected");
                store.log_processing(
                    dup.id,
                    &dup.title,
                    "duplicate_cleanup",
                    LogStatus::Error,
                    "trash request rejected by source",
                    0.0,
                )?;
            }
            Err(e) => {
                // A failed delete never fails the batch.
                tracing::warn!(post_id = dup.id, error = %e, "duplicate trash failed");
                store.log_processing(
                    dup.id,
                    &dup.title,
                    "duplicate_cleanup",
                    LogStatus::Error,
                    &format!("trash failed: {e}"),
                    0.0,
                )?;
            }
        }
    }

    let mut eligible = Vec::new();
    for post in canonical {
        let detail = match source.fetch_post_detail(post.id).await {
            Ok(d) => d,
            Err(e) => {
                tracing::warn!(post_id = post.id, error = %e, "detail fetch failed, skipping");
                store.log_processing(
                    post.id,
                    &post.title,
                    "detail_fetch",
                    LogStatus::Error,
                    &format!("detail fetch failed: {e}"),
                    0.0,
                )?;
                continue;
            }
        };
        if is_eligible(&detail, params) {
            tracing::info!(post_id = detail.id, title = %detail.title, "eligible post found");
            eligible.push(detail);
        } else {
            tracing::debug!(post_id = detail.id, "post is not a movie/series, skipping");
        }
    }

    Ok(eligible)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wordpress::Term;
    use anyhow::Result;
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::sync::Mutex;

    struct FakeSource {
        posts: Vec<PostDetail>,
        trashed: Mutex<Vec<u64>>,
        failing_trash_ids: HashSet<u64>,
        failing_detail_ids: HashSet<u64>,
    }

    impl FakeSource {
        fn new(posts: Vec<PostDetail>) -> Self {
            Self {
                posts,
                trashed: Mutex::new(Vec::new()),
                failing_trash_ids: HashSet::new(),
                failing_detail_ids: HashSet::new(),
            }
        }
    }

    fn detail(id: u64, title: &str, category: u64) -> PostDetail {
        PostDetail {
            id,
            title: title.to_string(),
            excerpt: "resumo".to_string(),
            body: "<p>corpo</p>".to_string(),
            author_id: 6,
            tags: vec![],
            categories: vec![Term { id: category, name: "cat".into() }],
        }
    }

    #[async_trait]
    impl ContentSource for FakeSource {
        async fn test_connection(&self) -> Result<bool> {
            Ok(true)
        }

        async fn fetch_posts_since(
            &self,
            author_id: u64,
            since_id: u64,
            _limit: u32,
        ) -> Result<Vec<PostSummary>> {
            Ok(self
                .posts
                .iter()
                .filter(|p| p.author_id == author_id && p.id > since_id)
                .map(|p| PostSummary {
                    id: p.id,
                    title: p.title.clone(),
                    author_id: p.author_id,
                })
                .collect())
        }

        async fn fetch_post_detail(&self, id: u64) -> Result<PostDetail> {
            if self.failing_detail_ids.contains(&id) {
                anyhow::bail!("detail request for post {} timed out", id);
            }
            self.posts
                .iter()
                .find(|p| p.id == id)
                .cloned()
                .ok_or_else(|| anyhow::anyhow!("post {} not found", id))
        }

        async fn update_post_content(&self, _: u64, _: &str, _: &str, _: &str) -> Result<bool> {
            Ok(true)
        }

        async fn update_seo_meta(&self, _: u64, _: &str, _: &str, _: &str) -> Result<bool> {
            Ok(true)
        }

        async fn trash_post(&self, id: u64) -> Result<bool> {
            if self.failing_trash_ids.contains(&id) {
                return Ok(false);
            }
            self.trashed.lock().unwrap().push(id);
            Ok(true)
        }
    }

    fn params() -> DiscoveryParams {
        DiscoveryParams {
            author_id: 6,
            fetch_limit: 50,
            movie_category_id: 24,
            series_category_id: 21,
        }
    }

    #[test]
    fn test_normalize_title_collapses_punctuation_and_entities() {
        assert_eq!(normalize_title("Stranger Things 4!!"), "stranger things 4");
        assert_eq!(normalize_title("Stranger Things 4"), "stranger things 4");
        assert_eq!(normalize_title("Duna&#8217;s — Parte 2"), "dunas  parte 2");
        assert_ne!(
            normalize_title("Stranger Things 4"),
            normalize_title("Stranger Coisas Things 4")
        );
    }

    #[tokio::test]
    async fn test_dedup_keeps_highest_id_and_trashes_rest() {
        let source = FakeSource::new(vec![
            detail(5, "Stranger Things 4", 21),
            detail(7, "Stranger Things 4!!", 21),
            detail(3, "Other", 24),
        ]);
        let store = Store::open_in_memory().unwrap();

        let eligible = discover_eligible_posts(&source, &store, &params(), 0)
            .await
            .unwrap();

        let ids: HashSet<u64> = eligible.iter().map(|p| p.id).collect();
        assert_eq!(ids, HashSet::from([7, 3]));
        assert_eq!(*source.trashed.lock().unwrap(), vec![5]);

        // The delete attempt left a durable log entry.
        let logs = store.recent_logs(10).unwrap();
        assert!(logs.iter().any(|l| l.post_id == 5 && l.action == "duplicate_cleanup"));
    }

    #[tokio::test]
    async fn test_failed_trash_warns_and_excludes_duplicate() {
        let mut source = FakeSource::new(vec![
            detail(5, "Stranger Things 4", 21),
            detail(7, "Stranger Things 4!!", 21),
        ]);
        source.failing_trash_ids.insert(5);
        let store = Store::open_in_memory().unwrap();

        let eligible = discover_eligible_posts(&source, &store, &params(), 0)
            .await
            .unwrap();

        // Batch still succeeds; the undeleted duplicate is not a candidate.
        assert_eq!(eligible.len(), 1);
        assert_eq!(eligible[0].id, 7);
        let logs = store.recent_logs(10).unwrap();
        assert!(logs.iter().any(|l| l.post_id == 5 && l.status == "error"));
    }

    #[tokio::test]
    async fn test_cursor_filter_and_category_filter() {
        let mut uncategorized = detail(9, "No categories", 24);
        uncategorized.categories.clear();
        let source = FakeSource::new(vec![
            detail(4, "Old movie", 24),
            detail(8, "New movie", 24),
            detail(10, "Off topic", 99),
            uncategorized,
        ]);
        let store = Store::open_in_memory().unwrap();

        let eligible = discover_eligible_posts(&source, &store, &params(), 4)
            .await
            .unwrap();

        let ids: Vec<u64> = eligible.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![8]);
    }

    #[tokio::test]
    async fn test_failed_detail_fetch_is_logged_and_skipped() {
        let mut source = FakeSource::new(vec![
            detail(8, "New movie", 24),
            detail(9, "New series", 21),
        ]);
        source.failing_detail_ids.insert(8);
        let store = Store::open_in_memory().unwrap();

        let eligible = discover_eligible_posts(&source, &store, &params(), 0)
            .await
            .unwrap();

        // The unreadable post is skipped but the failure is durable.
        let ids: Vec<u64> = eligible.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![9]);
        let logs = store.recent_logs(10).unwrap();
        assert!(logs
            .iter()
            .any(|l| l.post_id == 8 && l.action == "detail_fetch" && l.status == "error"));
    }

    #[tokio::test]
    async fn test_empty_fetch_returns_empty_without_error() {
        let source = FakeSource::new(vec![]);
        let store = Store::open_in_memory().unwrap();
        let eligible = discover_eligible_posts(&source, &store, &params(), 0)
            .await
            .unwrap();
        assert!(eligible.is_empty());
    }

    #[tokio::test]
    async fn test_rerunning_discovery_is_idempotent() {
        let source = FakeSource::new(vec![
            detail(5, "Stranger Things 4", 21),
            detail(7, "Stranger Things 4!!", 21),
            detail(3, "Other", 24),
        ]);
        let store = Store::open_in_memory().unwrap();

        let first = discover_eligible_posts(&source, &store, &params(), 0).await.unwrap();
        let second = discover_eligible_posts(&source, &store, &params(), 0).await.unwrap();

        let first_ids: HashSet<u64> = first.iter().map(|p| p.id).collect();
        let second_ids: HashSet<u64> = second.iter().map(|p| p.id).collect();
        assert_eq!(first_ids, second_ids);
    }
}
