use crate::api::{PostId, User};

/// Requests a view can make against the application store.
///
/// Every call returns immediately. Results land later in the store's state
/// and are picked up by the view on its next sync.
pub trait Dispatcher {
    fn fetch_post(&mut self, post_id: PostId);
    fn fetch_post_comments_by_recent(&mut self, post_id: PostId);
    fn fetch_post_comments_by_popular(&mut self, post_id: PostId);
    fn fetch_users_liked_posts(&mut self);
    fn fetch_users_liked_comments(&mut self);
    fn post_comment(&mut self, user: Option<&User>, post_id: PostId, text: &str);
    fn like(&mut self, post_id: PostId);
    fn unlike(&mut self, post_id: PostId);
}
