use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use reqwest::blocking::{Client as HttpClient, RequestBuilder, Response};
use reqwest::header::{AUTHORIZATION, USER_AGENT};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use url::Url;

pub const DEFAULT_BASE_URL: &str = "http://localhost:5000";

pub type PostId = i64;
pub type UserId = i64;
pub type CommentId = i64;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("api: unauthorized")]
    Unauthorized,
    #[error("api: forbidden")]
    Forbidden,
    #[error("api: {0} not found")]
    NotFound(String),
    #[error("api: error {status}: {body}")]
    Status { status: StatusCode, body: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CommentSort {
    #[default]
    Recent,
    Popular,
}

impl CommentSort {
    pub const ALL: [CommentSort; 2] = [CommentSort::Recent, CommentSort::Popular];

    pub fn as_str(&self) -> &'static str {
        match self {
            CommentSort::Recent => "recent",
            CommentSort::Popular => "popular",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            CommentSort::Recent => "Recent",
            CommentSort::Popular => "Popular",
        }
    }

    pub fn next(self) -> Self {
        match self {
            CommentSort::Recent => CommentSort::Popular,
            CommentSort::Popular => CommentSort::Recent,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    #[serde(default)]
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: PostId,
    #[serde(default)]
    pub user_id: Option<UserId>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub profile_picture: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub track: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub question: Option<String>,
    #[serde(default)]
    pub answer: Option<String>,
    #[serde(default)]
    pub likes: Option<i64>,
}

impl Post {
    pub fn empty(id: PostId) -> Self {
        Self {
            id,
            user_id: None,
            display_name: None,
            profile_picture: None,
            created_at: None,
            track: None,
            category: None,
            question: None,
            answer: None,
            likes: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: CommentId,
    #[serde(default)]
    pub post_id: Option<PostId>,
    #[serde(default)]
    pub user_id: Option<UserId>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub profile_picture: Option<String>,
    #[serde(default)]
    pub comment: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub likes: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LikedPost {
    pub post_id: PostId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LikedComment {
    pub comment_id: CommentId,
}

#[derive(Serialize)]
struct NewComment<'a> {
    user_id: UserId,
    post_id: PostId,
    comment: &'a str,
}

#[derive(Debug, Clone, Default)]
pub struct ClientConfig {
    pub base_url: Option<String>,
    pub user_agent: String,
    pub token: Option<String>,
    pub timeout: Option<Duration>,
    pub http_client: Option<HttpClient>,
}

pub struct Client {
    http: HttpClient,
    user_agent: String,
    base_url: Url,
    token: Option<String>,
}

impl Client {
    pub fn new(config: ClientConfig) -> Result<Self> {
        if config.user_agent.trim().is_empty() {
            bail!("api client user agent required");
        }
        let mut base = config
            .base_url
            .filter(|url| !url.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        if !base.ends_with('/') {
            base.push('/');
        }
        let base_url = Url::parse(&base).with_context(|| format!("api: parse base url {base}"))?;
        let http = match config.http_client {
            Some(client) => client,
            None => HttpClient::builder()
                .timeout(config.timeout.unwrap_or(Duration::from_secs(20)))
                .build()?,
        };

        Ok(Client {
            http,
            user_agent: config.user_agent,
            base_url,
            token: config.token.filter(|token| !token.trim().is_empty()),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn current_user(&self) -> Result<User> {
        let url = self.endpoint("api/users/me")?;
        let resp = self.execute(self.http.get(url), "current user")?;
        resp.json().context("api: decode current user")
    }

    pub fn post(&self, id: PostId) -> Result<Post> {
        let url = self.endpoint(&format!("api/posts/{id}"))?;
        let resp = self.execute(self.http.get(url), &format!("post {id}"))?;
        resp.json()
            .with_context(|| format!("api: decode post {id}"))
    }

    pub fn post_comments(&self, id: PostId, sort: CommentSort) -> Result<Vec<Comment>> {
        let url = self.endpoint(&format!("api/posts/{id}/comments"))?;
        let req = self.http.get(url).query(&[("sort", sort.as_str())]);
        let resp = self.execute(req, &format!("comments for post {id}"))?;
        resp.json()
            .with_context(|| format!("api: decode comments for post {id}"))
    }

    pub fn liked_posts(&self) -> Result<Vec<LikedPost>> {
        let url = self.endpoint("api/users/me/liked/posts")?;
        let resp = self.execute(self.http.get(url), "liked posts")?;
        resp.json().context("api: decode liked posts")
    }

    pub fn liked_comments(&self) -> Result<Vec<LikedComment>> {
        let url = self.endpoint("api/users/me/liked/comments")?;
        let resp = self.execute(self.http.get(url), "liked comments")?;
        resp.json().context("api: decode liked comments")
    }

    pub fn create_comment(&self, user_id: UserId, post_id: PostId, text: &str) -> Result<Comment> {
        if text.trim().is_empty() {
            bail!("api: comment text is required");
        }
        let url = self.endpoint("api/comments")?;
        let body = NewComment {
            user_id,
            post_id,
            comment: text,
        };
        let resp = self.execute(self.http.post(url).json(&body), &format!("post {post_id}"))?;
        resp.json().context("api: decode created comment")
    }

    pub fn like_post(&self, id: PostId) -> Result<()> {
        let url = self.endpoint(&format!("api/posts/{id}/like"))?;
        self.execute(self.http.post(url), &format!("post {id}"))?;
        Ok(())
    }

    pub fn unlike_post(&self, id: PostId) -> Result<()> {
        let url = self.endpoint(&format!("api/posts/{id}/like"))?;
        self.execute(self.http.delete(url), &format!("post {id}"))?;
        Ok(())
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .with_context(|| format!("api: build url for {path}"))
    }

    fn execute(&self, mut req: RequestBuilder, what: &str) -> Result<Response> {
        req = req.header(USER_AGENT, self.user_agent.clone());
        if let Some(token) = &self.token {
            req = req.header(AUTHORIZATION, format!("Bearer {token}"));
        }

        let resp = req.send().with_context(|| format!("api: request {what}"))?;
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        tracing::warn!(%status, what, "api request failed");
        let err = match status {
            StatusCode::UNAUTHORIZED => ApiError::Unauthorized,
            StatusCode::FORBIDDEN => ApiError::Forbidden,
            StatusCode::NOT_FOUND => ApiError::NotFound(what.to_string()),
            _ => ApiError::Status {
                status,
                body: resp.text().unwrap_or_default(),
            },
        };
        Err(err.into())
    }
}
