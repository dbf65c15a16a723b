use super::{ContentSource, PostDetail, PostSummary, Term};
use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::Engine;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Client;
use serde::Deserialize;

/// WordPress REST API client (wp-json/wp/v2) using Basic auth with an
/// application password.
pub struct WordPressRest {
    client: Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct WpRendered {
    #[serde(default)]
    rendered: String,
}

#[derive(Debug, Deserialize)]
struct WpPost {
    id: u64,
    #[serde(default)]
    author: u64,
    #[serde(default)]
    title: Option<WpRendered>,
    #[serde(default)]
    excerpt: Option<WpRendered>,
    #[serde(default)]
    content: Option<WpRendered>,
    #[serde(rename = "_embedded", default)]
    embedded: Option<WpEmbedded>,
}

#[derive(Debug, Deserialize)]
struct WpEmbedded {
    /// `wp:term` is a list of term lists: index 0 categories, index 1 tags.
    #[serde(rename = "wp:term", default)]
    terms: Vec<Vec<WpTerm>>,
}

#[derive(Debug, Deserialize)]
struct WpTerm {
    id: u64,
    #[serde(default)]
    name: String,
}

#[derive(Debug, Deserialize)]
struct WpUser {
    #[serde(default)]
    name: String,
}

impl WordPressRest {
    pub fn new(base_url: &str, username: &str, password: &str) -> Result<Self> {
        let credentials = format!("{}:{}", username, password);
        let encoded = base64::engine::general_purpose::STANDARD.encode(credentials);

        let mut headers = HeaderMap::new();
        let mut auth = HeaderValue::from_str(&format!("Basic {}", encoded))
            .context("invalid characters in WordPress credentials")?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .default_headers(headers)
            .build()
            .context("failed to build WordPress HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn posts_url(&self) -> String {
        format!("{}/wp-json/wp/v2/posts", self.base_url)
    }

    fn post_url(&self, id: u64) -> String {
        format!("{}/wp-json/wp/v2/posts/{}", self.base_url, id)
    }
}

fn post_to_detail(post: WpPost) -> PostDetail {
    let (categories, tags) = match &post.embedded {
        Some(embedded) => {
            let categories = embedded
                .terms
                .first()
                .map(|terms| terms.iter().map(to_term).collect())
                .unwrap_or_default();
            let tags = embedded
                .terms
                .get(1)
                .map(|terms| terms.iter().map(to_term).collect())
                .unwrap_or_default();
            (categories, tags)
        }
        None => (Vec::new(), Vec::new()),
    };

    PostDetail {
        id: post.id,
        title: post.title.map(|t| t.rendered).unwrap_or_default(),
        excerpt: post.excerpt.map(|t| t.rendered).unwrap_or_default(),
        body: post.content.map(|t| t.rendered).unwrap_or_default(),
        author_id: post.author,
        tags,
        categories,
    }
}

fn to_term(t: &WpTerm) -> Term {
    Term {
        id: t.id,
        name: t.name.clone(),
    }
}

#[async_trait]
impl ContentSource for WordPressRest {
    async fn test_connection(&self) -> Result<bool> {
        let url = format!("{}/wp-json/wp/v2/users/me", self.base_url);
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .context("failed to reach WordPress for connectivity check")?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            tracing::error!(%status, body = %body, "WordPress connectivity check failed");
            return Ok(false);
        }

        let user: WpUser = resp
            .json()
            .await
            .context("failed to parse WordPress user response")?;
        tracing::info!(user = %user.name, "connected to WordPress");
        Ok(true)
    }

    async fn fetch_posts_since(
        &self,
        author_id: u64,
        since_id: u64,
        limit: u32,
    ) -> Result<Vec<PostSummary>> {
        let resp = self
            .client
            .get(self.posts_url())
            .query(&[
                ("author", author_id.to_string()),
                ("per_page", limit.to_string()),
                ("status", "publish".to_string()),
                ("orderby", "id".to_string()),
                ("order", "desc".to_string()),
                ("_embed", "1".to_string()),
            ])
            .send()
            .await
            .context("WordPress post listing request failed")?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("WordPress post listing failed ({}): {}", status, body);
        }

        let posts: Vec<WpPost> = resp
            .json()
            .await
            .context("failed to parse WordPress post listing")?;

        // The API has no since-id filter; drop already-processed ids here.
        Ok(posts
            .into_iter()
            .filter(|p| p.id > since_id)
            .map(|p| PostSummary {
                id: p.id,
                title: p.title.map(|t| t.rendered).unwrap_or_default(),
                author_id: p.author,
            })
            .collect())
    }

    async fn fetch_post_detail(&self, id: u64) -> Result<PostDetail> {
        let resp = self
            .client
            .get(self.post_url(id))
            .query(&[("_embed", "1")])
            .send()
            .await
            .with_context(|| format!("WordPress detail request failed for post {}", id))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("WordPress detail fetch for post {} failed ({}): {}", id, status, body);
        }

        let post: WpPost = resp
            .json()
            .await
            .with_context(|| format!("failed to parse WordPress post {}", id))?;
        Ok(post_to_detail(post))
    }

    async fn update_post_content(
        &self,
        id: u64,
        title: &str,
        excerpt: &str,
        body: &str,
    ) -> Result<bool> {
        let payload = serde_json::json!({
            "title": title,
            "excerpt": excerpt,
            "content": body,
        });

        let resp = self
            .client
            .post(self.post_url(id))
            .json(&payload)
            .send()
            .await
            .with_context(|| format!("WordPress content update request failed for post {}", id))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            tracing::error!(post_id = id, %status, body = %body, "content update rejected");
            return Ok(false);
        }
        tracing::info!(post_id = id, "post content updated");
        Ok(true)
    }

    async fn update_seo_meta(
        &self,
        id: u64,
        seo_title: &str,
        meta_description: &str,
        focus_keyword: &str,
    ) -> Result<bool> {
        let payload = serde_json::json!({
            "meta": {
                "_yoast_wpseo_title": seo_title,
                "_yoast_wpseo_metadesc": meta_description,
                "_yoast_wpseo_focuskw": focus_keyword,
            }
        });

        let resp = self
            .client
            .post(self.post_url(id))
            .json(&payload)
            .send()
            .await
            .with_context(|| format!("WordPress meta update request failed for post {}", id))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            tracing::error!(post_id = id, %status, body = %body, "SEO meta update rejected");
            return Ok(false);
        }
        tracing::info!(post_id = id, "SEO meta updated");
        Ok(true)
    }

    async fn trash_post(&self, id: u64) -> Result<bool> {
        // No force=true: WordPress moves the post to trash instead of
        // deleting it permanently.
        let resp = self
            .client
            .delete(self.post_url(id))
            .send()
            .await
            .with_context(|| format!("WordPress trash request failed for post {}", id))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            tracing::warn!(post_id = id, %status, body = %body, "trash request rejected");
            return Ok(false);
        }
        tracing::info!(post_id = id, "post moved to trash");
        Ok(true)
    }
}
