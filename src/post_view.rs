use crate::actions::Dispatcher;
use crate::api::{CommentSort, PostId, User};
use crate::route;
use crate::store::State;

pub const EMPTY_COMMENT_ERROR: &str = "Please enter a comment";

/// Transient state for a single post screen.
///
/// The view never owns post data. It mirrors two values from the store
/// (`liked` and `likes`) so they can be flipped optimistically, and it
/// re-derives both whenever the corresponding store slice changes.
#[derive(Debug)]
pub struct PostView {
    post_id: PostId,
    liked: bool,
    likes: i64,
    input: String,
    error: String,
    sort_order: CommentSort,
    seen_liked_posts: Option<u64>,
    seen_post: Option<u64>,
}

impl PostView {
    /// Creates the view and fires the initial requests without waiting on
    /// any of them.
    pub fn mount(post_id: PostId, dispatcher: &mut dyn Dispatcher) -> Self {
        tracing::info!(post_id, "mounting post view");
        dispatcher.fetch_post(post_id);
        dispatcher.fetch_post_comments_by_recent(post_id);
        dispatcher.fetch_users_liked_posts();
        dispatcher.fetch_users_liked_comments();
        Self {
            post_id,
            liked: false,
            likes: 0,
            input: String::new(),
            error: String::new(),
            sort_order: CommentSort::Recent,
            seen_liked_posts: None,
            seen_post: None,
        }
    }

    pub fn post_id(&self) -> PostId {
        self.post_id
    }

    pub fn liked(&self) -> bool {
        self.liked
    }

    pub fn likes(&self) -> i64 {
        self.likes
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn error(&self) -> &str {
        &self.error
    }

    pub fn sort_order(&self) -> CommentSort {
        self.sort_order
    }

    /// Re-derives `liked` and `likes` from whichever store slices changed
    /// since the last call. Returns true when either rule ran.
    pub fn sync(&mut self, state: &State) -> bool {
        let revisions = state.revisions();
        let mut ran = false;

        if self.seen_liked_posts != Some(revisions.users_liked_posts) {
            self.seen_liked_posts = Some(revisions.users_liked_posts);
            self.liked = state
                .users_liked_posts
                .iter()
                .any(|entry| entry.post_id == self.post_id);
            ran = true;
        }

        if self.seen_post != Some(revisions.current_post) {
            self.seen_post = Some(revisions.current_post);
            self.likes = state
                .current_post
                .as_ref()
                .and_then(|post| post.likes)
                .unwrap_or(0);
            ran = true;
        }

        ran
    }

    pub fn set_input(&mut self, text: impl Into<String>) {
        self.input = text.into();
    }

    pub fn push_char(&mut self, ch: char) {
        self.input.push(ch);
    }

    pub fn pop_char(&mut self) {
        self.input.pop();
    }

    /// Returns true when a comment was dispatched.
    pub fn submit(&mut self, user: Option<&User>, dispatcher: &mut dyn Dispatcher) -> bool {
        let text = self.input.trim();
        if text.is_empty() {
            self.error = EMPTY_COMMENT_ERROR.to_string();
            return false;
        }
        dispatcher.post_comment(user, self.post_id, text);
        self.input.clear();
        self.error.clear();
        true
    }

    pub fn like(&mut self, dispatcher: &mut dyn Dispatcher) {
        self.liked = true;
        self.likes += 1;
        dispatcher.like(self.post_id);
    }

    pub fn unlike(&mut self, dispatcher: &mut dyn Dispatcher) {
        self.liked = false;
        self.likes -= 1;
        dispatcher.unlike(self.post_id);
    }

    pub fn toggle_like(&mut self, dispatcher: &mut dyn Dispatcher) {
        if self.liked {
            self.unlike(dispatcher);
        } else {
            self.like(dispatcher);
        }
    }

    /// Returns false when `order` is already active.
    pub fn select_sort(&mut self, order: CommentSort, dispatcher: &mut dyn Dispatcher) -> bool {
        if self.sort_order == order {
            return false;
        }
        self.sort_order = order;
        match order {
            CommentSort::Recent => dispatcher.fetch_post_comments_by_recent(self.post_id),
            CommentSort::Popular => dispatcher.fetch_post_comments_by_popular(self.post_id),
        }
        true
    }

    /// Profile route for the post's author, if the post names one.
    pub fn author_route(&self, state: &State) -> Option<String> {
        state
            .current_post
            .as_ref()
            .and_then(|post| post.user_id)
            .map(route::user_profile_route)
    }
}
