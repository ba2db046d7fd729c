//! Third-party identity verification.
//!
//! A user proves control of a social-platform identity by posting a
//! generated code as a comment on a fixed project. The gateway checks the
//! recent comment feed for that code. The ledger only ever consumes the
//! boolean outcome.

use crate::config::VerificationConfig;
use anyhow::Result;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::info;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait VerificationGateway: Send + Sync {
    /// True iff `username` recently posted a comment containing `code`.
    async fn verify(&self, username: &str, code: &str) -> Result<bool>;

    /// The platform's internal id for `username`, if the user exists.
    async fn lookup_social_id(&self, username: &str) -> Result<Option<String>>;
}

/// Comment authorship match: author is compared case-insensitively, the code
/// must appear verbatim in the comment body.
pub fn comment_matches(author: &str, content: &str, username: &str, code: &str) -> bool {
    author.eq_ignore_ascii_case(username) && content.contains(code)
}

pub struct CommentFeedGateway {
    config: VerificationConfig,
    http_client: Client,
}

#[derive(Debug, Deserialize)]
struct Comment {
    content: String,
    author: CommentAuthor,
}

#[derive(Debug, Deserialize)]
struct CommentAuthor {
    username: String,
}

#[derive(Debug, Deserialize)]
struct UserProfile {
    id: u64,
}

impl CommentFeedGateway {
    pub fn new(config: VerificationConfig) -> Self {
        let http_client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_seconds))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            config,
            http_client,
        }
    }
}

#[async_trait]
impl VerificationGateway for CommentFeedGateway {
    async fn verify(&self, username: &str, code: &str) -> Result<bool> {
        let url = format!(
            "{}/projects/{}/comments?offset=0&limit={}",
            self.config.api_base, self.config.project_id, self.config.comment_limit
        );

        let response = self.http_client.get(&url).send().await?;

        if !response.status().is_success() {
            return Err(anyhow::anyhow!(
                "Comment feed returned error: {}",
                response.status()
            ));
        }

        let comments: Vec<Comment> = response.json().await?;

        let verified = comments
            .iter()
            .any(|c| comment_matches(&c.author.username, &c.content, username, code));

        info!(
            "Checked {} recent comments for {}: verified={}",
            comments.len(),
            username,
            verified
        );

        Ok(verified)
    }

    async fn lookup_social_id(&self, username: &str) -> Result<Option<String>> {
        let url = format!("{}/users/{}", self.config.api_base, username);

        let response = self.http_client.get(&url).send().await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        if !response.status().is_success() {
            return Err(anyhow::anyhow!(
                "User lookup returned error: {}",
                response.status()
            ));
        }

        let profile: UserProfile = response.json().await?;

        Ok(Some(profile.id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_author_match_is_case_insensitive() {
        assert!(comment_matches("AliceWonder", "code: XK42", "alicewonder", "XK42"));
    }

    #[test]
    fn test_code_must_appear_in_content() {
        assert!(!comment_matches("alice", "hello there", "alice", "XK42"));
        assert!(comment_matches("alice", "verifying with XK42 thanks", "alice", "XK42"));
    }

    #[test]
    fn test_other_authors_do_not_count() {
        assert!(!comment_matches("mallory", "XK42", "alice", "XK42"));
    }
}
