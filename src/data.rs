use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use chrono::{Duration as ChronoDuration, Utc};
use parking_lot::Mutex;

use crate::api::{self, Comment, CommentSort, LikedComment, LikedPost, Post, PostId, User};

pub trait PostService: Send + Sync {
    fn load_post(&self, id: PostId) -> Result<Post>;
}

pub trait CommentService: Send + Sync {
    fn load_comments(&self, post_id: PostId, sort: CommentSort) -> Result<Vec<Comment>>;
    fn create_comment(&self, user: Option<&User>, post_id: PostId, text: &str) -> Result<Comment>;
}

pub trait LikeService: Send + Sync {
    fn liked_posts(&self) -> Result<Vec<LikedPost>>;
    fn liked_comments(&self) -> Result<Vec<LikedComment>>;
    fn like(&self, post_id: PostId) -> Result<()>;
    fn unlike(&self, post_id: PostId) -> Result<()>;
}

pub trait UserService: Send + Sync {
    fn current_user(&self) -> Result<User>;
}

/// The backend seams the store talks to.
#[derive(Clone)]
pub struct Services {
    pub posts: Arc<dyn PostService>,
    pub comments: Arc<dyn CommentService>,
    pub likes: Arc<dyn LikeService>,
    pub users: Arc<dyn UserService>,
}

impl Services {
    pub fn api(client: Arc<api::Client>) -> Self {
        Self {
            posts: Arc::new(ApiPostService::new(client.clone())),
            comments: Arc::new(ApiCommentService::new(client.clone())),
            likes: Arc::new(ApiLikeService::new(client.clone())),
            users: Arc::new(ApiUserService::new(client)),
        }
    }

    pub fn offline() -> Self {
        let backend = Arc::new(MockBackend::default());
        Self {
            posts: backend.clone(),
            comments: backend.clone(),
            likes: backend.clone(),
            users: backend,
        }
    }
}

pub struct ApiPostService {
    client: Arc<api::Client>,
}

impl ApiPostService {
    pub fn new(client: Arc<api::Client>) -> Self {
        Self { client }
    }
}

impl PostService for ApiPostService {
    fn load_post(&self, id: PostId) -> Result<Post> {
        self.client.post(id).context("fetch post")
    }
}

pub struct ApiCommentService {
    client: Arc<api::Client>,
}

impl ApiCommentService {
    pub fn new(client: Arc<api::Client>) -> Self {
        Self { client }
    }
}

impl CommentService for ApiCommentService {
    fn load_comments(&self, post_id: PostId, sort: CommentSort) -> Result<Vec<Comment>> {
        self.client
            .post_comments(post_id, sort)
            .context("fetch comments")
    }

    fn create_comment(&self, user: Option<&User>, post_id: PostId, text: &str) -> Result<Comment> {
        let user = user.ok_or_else(|| anyhow!("sign in to comment"))?;
        self.client
            .create_comment(user.id, post_id, text)
            .context("post comment")
    }
}

pub struct ApiLikeService {
    client: Arc<api::Client>,
}

impl ApiLikeService {
    pub fn new(client: Arc<api::Client>) -> Self {
        Self { client }
    }
}

impl LikeService for ApiLikeService {
    fn liked_posts(&self) -> Result<Vec<LikedPost>> {
        self.client.liked_posts().context("fetch liked posts")
    }

    fn liked_comments(&self) -> Result<Vec<LikedComment>> {
        self.client.liked_comments().context("fetch liked comments")
    }

    fn like(&self, post_id: PostId) -> Result<()> {
        self.client.like_post(post_id).context("like post")
    }

    fn unlike(&self, post_id: PostId) -> Result<()> {
        self.client.unlike_post(post_id).context("unlike post")
    }
}

pub struct ApiUserService {
    client: Arc<api::Client>,
}

impl ApiUserService {
    pub fn new(client: Arc<api::Client>) -> Self {
        Self { client }
    }
}

impl UserService for ApiUserService {
    fn current_user(&self) -> Result<User> {
        self.client.current_user().context("fetch current user")
    }
}

struct MockState {
    posts: Vec<Post>,
    comments: Vec<Comment>,
    liked_posts: Vec<LikedPost>,
    next_comment_id: i64,
}

/// In-memory backend for `--offline` browsing. Likes and comments persist
/// for the lifetime of the process.
pub struct MockBackend {
    state: Mutex<MockState>,
}

impl Default for MockBackend {
    fn default() -> Self {
        let now = Utc::now();
        let post = |id: PostId, track: &str, category: &str, question: &str, answer: &str| Post {
            id,
            user_id: Some(100 + id),
            display_name: Some(format!("Coach {id}")),
            profile_picture: Some(format!("https://example.invalid/avatars/{id}.png")),
            created_at: Some(now - ChronoDuration::hours(3 * id)),
            track: Some(track.into()),
            category: Some(category.into()),
            question: Some(question.into()),
            answer: Some(answer.into()),
            likes: Some(4 * id),
        };
        let comment = |id: i64, post_id: PostId, text: &str, hours: i64, likes: i64| Comment {
            id,
            post_id: Some(post_id),
            user_id: Some(200 + id),
            display_name: Some(format!("Reader {id}")),
            profile_picture: None,
            comment: text.into(),
            created_at: Some(now - ChronoDuration::hours(hours)),
            likes: Some(likes),
        };

        Self {
            state: Mutex::new(MockState {
                posts: vec![
                    post(
                        1,
                        "Career Coach",
                        "Behavioral",
                        "Tell me about a time you disagreed with your manager.",
                        "Pick a concrete disagreement, explain the data you brought, and end with what you learned.",
                    ),
                    post(
                        2,
                        "Full Stack Web",
                        "Technical",
                        "How would you debounce a search input?",
                        "Wrap the handler so it only fires after the user stops typing for a short interval.",
                    ),
                ],
                comments: vec![
                    comment(1, 1, "Great framing, the lesson learned part matters most.", 1, 2),
                    comment(2, 1, "I would add how the relationship improved afterwards.", 5, 9),
                    comment(3, 1, "Keep it under two minutes.", 30, 4),
                    comment(4, 2, "Mention leading vs trailing edge.", 2, 1),
                ],
                liked_posts: vec![LikedPost { post_id: 2 }],
                next_comment_id: 5,
            }),
        }
    }
}

impl PostService for MockBackend {
    fn load_post(&self, id: PostId) -> Result<Post> {
        let state = self.state.lock();
        state
            .posts
            .iter()
            .find(|post| post.id == id)
            .cloned()
            .ok_or_else(|| anyhow!("post {id} not found"))
    }
}

impl CommentService for MockBackend {
    fn load_comments(&self, post_id: PostId, sort: CommentSort) -> Result<Vec<Comment>> {
        let state = self.state.lock();
        let mut comments: Vec<Comment> = state
            .comments
            .iter()
            .filter(|comment| comment.post_id == Some(post_id))
            .cloned()
            .collect();
        match sort {
            CommentSort::Recent => comments.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
            CommentSort::Popular => comments.sort_by(|a, b| b.likes.cmp(&a.likes)),
        }
        Ok(comments)
    }

    fn create_comment(&self, user: Option<&User>, post_id: PostId, text: &str) -> Result<Comment> {
        let mut state = self.state.lock();
        let id = state.next_comment_id;
        state.next_comment_id += 1;
        let comment = Comment {
            id,
            post_id: Some(post_id),
            user_id: user.map(|user| user.id),
            display_name: user.and_then(|user| user.display_name.clone()),
            profile_picture: None,
            comment: text.to_string(),
            created_at: Some(Utc::now()),
            likes: Some(0),
        };
        state.comments.push(comment.clone());
        Ok(comment)
    }
}

impl LikeService for MockBackend {
    fn liked_posts(&self) -> Result<Vec<LikedPost>> {
        Ok(self.state.lock().liked_posts.clone())
    }

    fn liked_comments(&self) -> Result<Vec<LikedComment>> {
        Ok(vec![LikedComment { comment_id: 2 }])
    }

    fn like(&self, post_id: PostId) -> Result<()> {
        let mut state = self.state.lock();
        if !state.liked_posts.iter().any(|entry| entry.post_id == post_id) {
            state.liked_posts.push(LikedPost { post_id });
            if let Some(post) = state.posts.iter_mut().find(|post| post.id == post_id) {
                post.likes = Some(post.likes.unwrap_or(0) + 1);
            }
        }
        Ok(())
    }

    fn unlike(&self, post_id: PostId) -> Result<()> {
        let mut state = self.state.lock();
        let before = state.liked_posts.len();
        state.liked_posts.retain(|entry| entry.post_id != post_id);
        if state.liked_posts.len() != before {
            if let Some(post) = state.posts.iter_mut().find(|post| post.id == post_id) {
                post.likes = Some(post.likes.unwrap_or(0) - 1);
            }
        }
        Ok(())
    }
}

impl UserService for MockBackend {
    fn current_user(&self) -> Result<User> {
        Ok(User {
            id: 1,
            display_name: Some("offline".into()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mock_sorts_comments_by_mode() {
        let backend = MockBackend::default();
        let recent = backend.load_comments(1, CommentSort::Recent).unwrap();
        let popular = backend.load_comments(1, CommentSort::Popular).unwrap();

        assert_eq!(recent.iter().map(|c| c.id).collect::<Vec<_>>(), vec![1, 2, 3]);
        assert_eq!(popular.iter().map(|c| c.id).collect::<Vec<_>>(), vec![2, 3, 1]);
    }

    #[test]
    fn mock_like_is_idempotent() {
        let backend = MockBackend::default();
        let before = backend.load_post(1).unwrap().likes.unwrap();
        backend.like(1).unwrap();
        backend.like(1).unwrap();
        assert_eq!(backend.load_post(1).unwrap().likes.unwrap(), before + 1);
        backend.unlike(1).unwrap();
        assert_eq!(backend.load_post(1).unwrap().likes.unwrap(), before);
        assert!(!backend
            .liked_posts()
            .unwrap()
            .iter()
            .any(|entry| entry.post_id == 1));
    }

    #[test]
    fn mock_created_comment_is_listed() {
        let backend = MockBackend::default();
        let user = backend.current_user().unwrap();
        let created = backend.create_comment(Some(&user), 2, "new").unwrap();
        let comments = backend.load_comments(2, CommentSort::Recent).unwrap();
        assert_eq!(comments[0].id, created.id);
        assert_eq!(created.user_id, Some(user.id));
    }

    #[test]
    fn missing_post_is_an_error() {
        assert!(MockBackend::default().load_post(99).is_err());
    }
}
