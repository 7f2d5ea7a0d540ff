use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use anyhow::Result;
use crossbeam_channel::{unbounded, Receiver, Sender};

use crate::actions::Dispatcher;
use crate::api::{Comment, CommentSort, LikedComment, LikedPost, Post, PostId, User};
use crate::data::Services;

/// Per-slice change counters. A slice's counter advances every time the
/// slice is replaced or mutated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Revisions {
    pub user: u64,
    pub current_post: u64,
    pub current_post_comments: u64,
    pub users_liked_posts: u64,
    pub users_liked_comments: u64,
}

#[derive(Debug, Default)]
pub struct State {
    pub user: Option<User>,
    pub current_post: Option<Post>,
    pub current_post_comments: Vec<Comment>,
    pub users_liked_posts: Vec<LikedPost>,
    pub users_liked_comments: Vec<LikedComment>,
    pub post_is_fetching: bool,
    pub comments_are_fetching: bool,
    pub last_error: Option<String>,
    revisions: Revisions,
}

impl State {
    pub fn revisions(&self) -> Revisions {
        self.revisions
    }

    pub(crate) fn set_user(&mut self, user: Option<User>) {
        self.user = user;
        self.revisions.user += 1;
    }

    pub(crate) fn set_current_post(&mut self, post: Option<Post>) {
        self.current_post = post;
        self.revisions.current_post += 1;
    }

    pub(crate) fn set_comments(&mut self, comments: Vec<Comment>) {
        self.current_post_comments = comments;
        self.revisions.current_post_comments += 1;
    }

    pub(crate) fn set_liked_posts(&mut self, liked: Vec<LikedPost>) {
        self.users_liked_posts = liked;
        self.revisions.users_liked_posts += 1;
    }

    pub(crate) fn set_liked_comments(&mut self, liked: Vec<LikedComment>) {
        self.users_liked_comments = liked;
        self.revisions.users_liked_comments += 1;
    }

    fn insert_comment(&mut self, comment: Comment, sort: CommentSort) {
        let belongs = match (&self.current_post, comment.post_id) {
            (Some(post), Some(post_id)) => post.id == post_id,
            (Some(_), None) => true,
            (None, _) => false,
        };
        if !belongs {
            return;
        }
        match sort {
            CommentSort::Recent => self.current_post_comments.insert(0, comment),
            CommentSort::Popular => self.current_post_comments.push(comment),
        }
        self.revisions.current_post_comments += 1;
    }

    fn apply_like(&mut self, post_id: PostId, liked: bool) {
        let listed = self
            .users_liked_posts
            .iter()
            .any(|entry| entry.post_id == post_id);
        if liked == listed {
            return;
        }
        if liked {
            self.users_liked_posts.push(LikedPost { post_id });
        } else {
            self.users_liked_posts.retain(|entry| entry.post_id != post_id);
        }
        self.revisions.users_liked_posts += 1;

        if let Some(post) = self.current_post.as_mut().filter(|post| post.id == post_id) {
            if let Some(likes) = post.likes.as_mut() {
                *likes += if liked { 1 } else { -1 };
                self.revisions.current_post += 1;
            }
        }
    }
}

enum Response {
    User {
        result: Result<User>,
    },
    Post {
        request_id: u64,
        post_id: PostId,
        result: Result<Post>,
    },
    Comments {
        request_id: u64,
        post_id: PostId,
        sort: CommentSort,
        result: Result<Vec<Comment>>,
    },
    LikedPosts {
        result: Result<Vec<LikedPost>>,
    },
    LikedComments {
        result: Result<Vec<LikedComment>>,
    },
    CommentPosted {
        post_id: PostId,
        result: Result<Comment>,
    },
    LikeResult {
        post_id: PostId,
        liked: bool,
        result: Result<()>,
    },
}

struct Envelope {
    generation: u64,
    response: Response,
}

struct PendingPost {
    request_id: u64,
    show_fetching: bool,
}

struct PendingComments {
    request_id: u64,
    sort: CommentSort,
}

/// Centralized application state plus the worker plumbing that fills it.
///
/// Requests run on background threads; their results queue on a channel and
/// are reduced into [`State`] only when the owner calls [`Store::poll`], so
/// reductions never overlap.
pub struct Store {
    state: State,
    services: Services,
    response_tx: Sender<Envelope>,
    response_rx: Receiver<Envelope>,
    cancel_flag: Arc<AtomicBool>,
    generation: u64,
    next_request_id: u64,
    pending_post: Option<PendingPost>,
    pending_comments: Option<PendingComments>,
    comments_sort: CommentSort,
}

impl Store {
    pub fn new(services: Services) -> Self {
        let (response_tx, response_rx) = unbounded();
        Self {
            state: State::default(),
            services,
            response_tx,
            response_rx,
            cancel_flag: Arc::new(AtomicBool::new(false)),
            generation: 0,
            next_request_id: 1,
            pending_post: None,
            pending_comments: None,
            comments_sort: CommentSort::Recent,
        }
    }

    pub fn state(&self) -> &State {
        &self.state
    }

    pub fn is_loading(&self) -> bool {
        self.state.post_is_fetching || self.state.comments_are_fetching
    }

    pub fn fetch_user(&mut self) {
        let service = self.services.users.clone();
        self.spawn("current user", move || Response::User {
            result: service.current_user(),
        });
    }

    /// Drops every in-flight request. Results that arrive afterwards are
    /// discarded without touching the state.
    pub fn cancel_pending(&mut self) {
        self.cancel_flag.store(true, Ordering::SeqCst);
        self.cancel_flag = Arc::new(AtomicBool::new(false));
        self.generation = self.generation.wrapping_add(1);
        self.pending_post = None;
        self.pending_comments = None;
        self.state.post_is_fetching = false;
        self.state.comments_are_fetching = false;
        tracing::debug!(generation = self.generation, "cancelled pending requests");
    }

    /// Reduces every queued result into the state. Returns true when
    /// anything was applied.
    pub fn poll(&mut self) -> bool {
        let mut changed = false;
        while let Ok(envelope) = self.response_rx.try_recv() {
            if envelope.generation != self.generation {
                continue;
            }
            self.handle_response(envelope.response);
            changed = true;
        }
        changed
    }

    fn next_request(&mut self) -> u64 {
        let id = self.next_request_id;
        self.next_request_id = self.next_request_id.wrapping_add(1);
        id
    }

    fn spawn<F>(&self, what: &'static str, job: F)
    where
        F: FnOnce() -> Response + Send + 'static,
    {
        let tx = self.response_tx.clone();
        let cancel_flag = self.cancel_flag.clone();
        let generation = self.generation;
        tracing::debug!(what, "dispatch");
        thread::spawn(move || {
            if cancel_flag.load(Ordering::SeqCst) {
                return;
            }
            let response = job();
            if cancel_flag.load(Ordering::SeqCst) {
                tracing::debug!(what, "dropping cancelled response");
                return;
            }
            let _ = tx.send(Envelope {
                generation,
                response,
            });
        });
    }

    /// Starts a post load. A replacement request inherits the fetching flag
    /// of the one it supersedes, so the flag is cleared by whichever lands.
    fn request_post(&mut self, post_id: PostId, show_fetching: bool) {
        let show_fetching = show_fetching
            || self
                .pending_post
                .as_ref()
                .is_some_and(|pending| pending.show_fetching);
        let request_id = self.next_request();
        self.pending_post = Some(PendingPost {
            request_id,
            show_fetching,
        });
        if show_fetching {
            self.state.post_is_fetching = true;
        }
        let service = self.services.posts.clone();
        self.spawn("post", move || Response::Post {
            request_id,
            post_id,
            result: service.load_post(post_id),
        });
    }

    fn request_comments(&mut self, post_id: PostId, sort: CommentSort) {
        let request_id = self.next_request();
        self.pending_comments = Some(PendingComments { request_id, sort });
        self.state.comments_are_fetching = true;
        let service = self.services.comments.clone();
        self.spawn("comments", move || Response::Comments {
            request_id,
            post_id,
            sort,
            result: service.load_comments(post_id, sort),
        });
    }

    fn request_like(&mut self, post_id: PostId, liked: bool) {
        let service = self.services.likes.clone();
        self.spawn(if liked { "like" } else { "unlike" }, move || {
            let result = if liked {
                service.like(post_id)
            } else {
                service.unlike(post_id)
            };
            Response::LikeResult {
                post_id,
                liked,
                result,
            }
        });
    }

    fn record_error(&mut self, what: &str, err: anyhow::Error) {
        tracing::warn!(error = %format!("{err:#}"), "{what} failed");
        self.state.last_error = Some(format!("Failed to {what}: {err}"));
    }

    fn handle_response(&mut self, response: Response) {
        match response {
            Response::User { result } => match result {
                Ok(user) => self.state.set_user(Some(user)),
                Err(err) => self.record_error("load current user", err),
            },
            Response::Post {
                request_id,
                post_id,
                result,
            } => {
                let Some(pending) = &self.pending_post else {
                    return;
                };
                if pending.request_id != request_id {
                    return;
                }
                if pending.show_fetching {
                    self.state.post_is_fetching = false;
                }
                self.pending_post = None;
                match result {
                    Ok(post) => {
                        tracing::debug!(post_id, "post loaded");
                        self.state.set_current_post(Some(post));
                    }
                    Err(err) => self.record_error("load post", err),
                }
            }
            Response::Comments {
                request_id,
                post_id,
                sort,
                result,
            } => {
                let Some(pending) = &self.pending_comments else {
                    return;
                };
                if pending.request_id != request_id {
                    tracing::debug!(post_id, sort = sort.as_str(), "stale comments discarded");
                    return;
                }
                self.comments_sort = pending.sort;
                self.pending_comments = None;
                self.state.comments_are_fetching = false;
                match result {
                    Ok(comments) => {
                        tracing::debug!(post_id, count = comments.len(), "comments loaded");
                        self.state.set_comments(comments);
                    }
                    Err(err) => self.record_error("load comments", err),
                }
            }
            Response::LikedPosts { result } => match result {
                Ok(liked) => self.state.set_liked_posts(liked),
                Err(err) => self.record_error("load liked posts", err),
            },
            Response::LikedComments { result } => match result {
                Ok(liked) => self.state.set_liked_comments(liked),
                Err(err) => self.record_error("load liked comments", err),
            },
            Response::CommentPosted { post_id, result } => match result {
                Ok(comment) => {
                    tracing::info!(post_id, comment_id = comment.id, "comment posted");
                    let sort = self
                        .pending_comments
                        .as_ref()
                        .map(|pending| pending.sort)
                        .unwrap_or(self.comments_sort);
                    self.state.insert_comment(comment, sort);
                }
                Err(err) => self.record_error("post comment", err),
            },
            Response::LikeResult {
                post_id,
                liked,
                result,
            } => match result {
                Ok(()) => self.state.apply_like(post_id, liked),
                Err(err) => {
                    self.record_error(if liked { "like post" } else { "unlike post" }, err);
                    self.request_post(post_id, false);
                    self.fetch_users_liked_posts();
                }
            },
        }
    }
}

impl Dispatcher for Store {
    fn fetch_post(&mut self, post_id: PostId) {
        self.request_post(post_id, true);
    }

    fn fetch_post_comments_by_recent(&mut self, post_id: PostId) {
        self.request_comments(post_id, CommentSort::Recent);
    }

    fn fetch_post_comments_by_popular(&mut self, post_id: PostId) {
        self.request_comments(post_id, CommentSort::Popular);
    }

    fn fetch_users_liked_posts(&mut self) {
        let service = self.services.likes.clone();
        self.spawn("liked posts", move || Response::LikedPosts {
            result: service.liked_posts(),
        });
    }

    fn fetch_users_liked_comments(&mut self) {
        let service = self.services.likes.clone();
        self.spawn("liked comments", move || Response::LikedComments {
            result: service.liked_comments(),
        });
    }

    fn post_comment(&mut self, user: Option<&User>, post_id: PostId, text: &str) {
        let service = self.services.comments.clone();
        let user = user.cloned();
        let text = text.to_string();
        self.spawn("post comment", move || Response::CommentPosted {
            post_id,
            result: service.create_comment(user.as_ref(), post_id, &text),
        });
    }

    fn like(&mut self, post_id: PostId) {
        self.request_like(post_id, true);
    }

    fn unlike(&mut self, post_id: PostId) {
        self.request_like(post_id, false);
    }
}
