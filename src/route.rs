use crate::api::{PostId, UserId};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RouteError {
    #[error("route: post id missing")]
    Missing,
    #[error("route: {0:?} is not a post id")]
    NotANumber(String),
}

/// Extracts the post id from `42`, `/post/42`, `post/42` or `/posts/42`.
pub fn parse_post_id(route: &str) -> Result<PostId, RouteError> {
    let trimmed = route.trim();
    let param = trimmed
        .strip_prefix("/post/")
        .or_else(|| trimmed.strip_prefix("post/"))
        .or_else(|| trimmed.strip_prefix("/posts/"))
        .or_else(|| trimmed.strip_prefix("posts/"))
        .unwrap_or(trimmed)
        .trim_end_matches('/')
        .trim();
    if param.is_empty() {
        return Err(RouteError::Missing);
    }
    param
        .parse::<PostId>()
        .map_err(|_| RouteError::NotANumber(param.to_string()))
}

pub fn post_route(post_id: PostId) -> String {
    format!("/post/{post_id}")
}

pub fn user_profile_route(user_id: UserId) -> String {
    format!("/user/{user_id}")
}

/// Visited routes, newest last.
#[derive(Debug, Clone, Default)]
pub struct History {
    entries: Vec<String>,
}

impl History {
    pub fn new(initial: impl Into<String>) -> Self {
        Self {
            entries: vec![initial.into()],
        }
    }

    pub fn push(&mut self, route: impl Into<String>) {
        let route = route.into();
        if self.current() == Some(route.as_str()) {
            return;
        }
        self.entries.push(route);
    }

    /// Steps back one entry. The first entry is never removed.
    pub fn back(&mut self) -> Option<&str> {
        if self.entries.len() > 1 {
            self.entries.pop();
        }
        self.current()
    }

    pub fn current(&self) -> Option<&str> {
        self.entries.last().map(String::as_str)
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_route_forms() {
        assert_eq!(parse_post_id("42"), Ok(42));
        assert_eq!(parse_post_id("/post/42"), Ok(42));
        assert_eq!(parse_post_id(" post/42/ "), Ok(42));
        assert_eq!(parse_post_id("/posts/7"), Ok(7));
    }

    #[test]
    fn rejects_malformed_routes() {
        assert_eq!(parse_post_id(""), Err(RouteError::Missing));
        assert_eq!(parse_post_id("/post/"), Err(RouteError::Missing));
        assert_eq!(
            parse_post_id("/post/abc"),
            Err(RouteError::NotANumber("abc".into()))
        );
    }

    #[test]
    fn history_tracks_navigation() {
        let mut history = History::new(post_route(42));
        history.push(user_profile_route(7));
        history.push(user_profile_route(7));
        assert_eq!(history.len(), 2);
        assert_eq!(history.current(), Some("/user/7"));
        assert_eq!(history.back(), Some("/post/42"));
        assert_eq!(history.back(), Some("/post/42"));
        assert!(!history.is_empty());
    }
}
