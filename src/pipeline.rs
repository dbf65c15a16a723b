//! Cycle orchestration: discovery, rewrite, write-back, and bookkeeping.
//!
//! One `run_cycle` call is the unit of work. Posts are processed one at a
//! time in ascending id order; the cursor advances only after a post has
//! been fully written back, so a failed post stays ahead of the cursor and
//! is retried on a later cycle.

use crate::engine::discovery::{discover_eligible_posts, DiscoveryParams};
use crate::engine::seo::{extract_focus_keyword, truncate_excerpt, META_DESCRIPTION_LIMIT};
use crate::rewrite::parse::parse_response;
use crate::rewrite::prompt::{build_prompt, tags_text, NO_MEDIA};
use crate::rewrite::rotation::RotatingRewriter;
use crate::rewrite::Rewriter;
use crate::store::{LogStatus, Store};
use crate::wordpress::{ContentSource, PostDetail};
use anyhow::Result;
use serde::Serialize;
use std::time::Instant;

/// Outcome of one optimization cycle, persisted as the `last_cycle_result`
/// statistic and printed by the one-shot mode.
#[derive(Debug, Serialize)]
pub struct CycleStats {
    pub found: usize,
    pub processed: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub elapsed_seconds: f64,
    pub errors: Vec<String>,
}

pub struct Optimizer<S: ContentSource, R: Rewriter> {
    source: S,
    rewriter: RotatingRewriter<R>,
    store: Store,
    domain: String,
    params: DiscoveryParams,
    max_posts_per_cycle: usize,
}

impl<S: ContentSource, R: Rewriter> Optimizer<S, R> {
    pub fn new(
        source: S,
        rewriter: RotatingRewriter<R>,
        store: Store,
        domain: String,
        params: DiscoveryParams,
        max_posts_per_cycle: usize,
    ) -> Self {
        Self {
            source,
            rewriter,
            store,
            domain,
            params,
            max_posts_per_cycle,
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Run one full cycle. Fails outright only when the content source is
    /// unreachable or the progress store breaks; individual post failures
    /// are collected into the stats instead.
    pub async fn run_cycle(&mut self) -> Result<CycleStats> {
        let started = Instant::now();

        // No write-backs are attempted against a site we cannot reach.
        if !self.source.test_connection().await? {
            anyhow::bail!("content source rejected credentials");
        }

        let cursor = self.store.last_processed_post_id()?;
        let mut eligible =
            discover_eligible_posts(&self.source, &self.store, &self.params, cursor).await?;
        eligible.sort_by_key(|p| p.id);

        let found = eligible.len();
        eligible.truncate(self.max_posts_per_cycle);
        if found > eligible.len() {
            tracing::info!(
                found,
                cap = self.max_posts_per_cycle,
                "cycle capped, remaining posts wait for the next cycle"
            );
        }

        let mut stats = CycleStats {
            found,
            processed: 0,
            succeeded: 0,
            failed: 0,
            elapsed_seconds: 0.0,
            errors: Vec::new(),
        };

        for post in &eligible {
            let post_started = Instant::now();
            stats.processed += 1;

            match self.process_post(post).await {
                Ok(seo_score) => {
                    let elapsed = post_started.elapsed().as_secs_f64();
                    self.store.log_processing(
                        post.id,
                        &post.title,
                        "optimization",
                        LogStatus::Success,
                        &format!("SEO Score: {}", seo_score),
                        elapsed,
                    )?;
                    self.store.advance_cursor(post.id)?;
                    stats.succeeded += 1;
                    tracing::info!(post_id = post.id, seo_score, "post optimized");
                }
                Err(e) => {
                    let elapsed = post_started.elapsed().as_secs_f64();
                    self.store.log_processing(
                        post.id,
                        &post.title,
                        "optimization",
                        LogStatus::Error,
                        &e.to_string(),
                        elapsed,
                    )?;
                    stats.failed += 1;
                    stats.errors.push(format!("post {}: {}", post.id, e));
                    tracing::error!(post_id = post.id, error = %e, "post optimization failed");
                }
            }
        }

        stats.elapsed_seconds = started.elapsed().as_secs_f64();
        tracing::info!(
            found = stats.found,
            succeeded = stats.succeeded,
            failed = stats.failed,
            elapsed_s = format!("{:.1}", stats.elapsed_seconds),
            "cycle complete"
        );
        Ok(stats)
    }

    /// Take one post through rewrite and write-back. Returns the model's
    /// self-reported SEO score on success.
    async fn process_post(&mut self, post: &PostDetail) -> Result<u32> {
        if post.title.trim().is_empty() || post.body.trim().is_empty() {
            anyhow::bail!("post has no content to optimize");
        }

        let tag_names: Vec<String> = post.tags.iter().map(|t| t.name.clone()).collect();
        let prompt = build_prompt(
            &self.domain,
            &post.title,
            &post.excerpt,
            &post.body,
            &tags_text(&tag_names),
            NO_MEDIA,
        );

        let raw = self.rewriter.rewrite(&self.store, &prompt).await?;
        let rewritten = parse_response(&raw)?;

        let focus_keyword = extract_focus_keyword(&rewritten.title, &rewritten.body);
        let meta_description = truncate_excerpt(&rewritten.excerpt, META_DESCRIPTION_LIMIT);

        // Content first, then SEO meta. Both must land for the post to count
        // as processed; a failure here leaves the post ahead of the cursor.
        if !self
            .source
            .update_post_content(post.id, &rewritten.title, &rewritten.excerpt, &rewritten.body)
            .await?
        {
            anyhow::bail!("content update rejected by source");
        }
        if !self
            .source
            .update_seo_meta(post.id, &rewritten.title, &meta_description, &focus_keyword)
            .await?
        {
            anyhow::bail!("seo meta update rejected by source");
        }

        Ok(rewritten.seo_score)
    }
}
