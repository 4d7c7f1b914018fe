use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use parking_lot::Mutex;
use tracing::warn;

use crate::api::{self, Comment, Post};
use crate::store;

pub trait FeedService: Send + Sync {
    fn load_posts(&self) -> Result<Vec<Post>>;
}

pub trait CommentService: Send + Sync {
    fn load_comments(&self, post_id: i64) -> Result<Vec<Comment>>;
}

pub trait InteractionService: Send + Sync {
    fn submit_comment(&self, post_id: i64, text: &str) -> Result<()>;
}

/// Result of a fetch that never fails: errors become an empty list and are
/// kept only so the caller can decide whether to mention them.
#[derive(Debug, Clone)]
pub struct Fetched<T> {
    pub items: Vec<T>,
    pub error: Option<String>,
}

impl<T> Fetched<T> {
    fn from_result(result: Result<Vec<T>>, what: &str) -> Self {
        match result {
            Ok(items) => Self { items, error: None },
            Err(err) => {
                warn!(error = ?err, "{what} failed; showing nothing");
                Self {
                    items: Vec::new(),
                    error: Some(format!("{err:#}")),
                }
            }
        }
    }

    pub fn failed(&self) -> bool {
        self.error.is_some()
    }
}

pub fn fetch_posts(service: &dyn FeedService) -> Fetched<Post> {
    Fetched::from_result(service.load_posts(), "fetch posts")
}

pub fn fetch_comments(service: &dyn CommentService, post_id: i64) -> Fetched<Comment> {
    Fetched::from_result(service.load_comments(post_id), "fetch comments")
}

/// Success is decided by the HTTP status alone.
pub fn submit_comment(service: &dyn InteractionService, post_id: i64, text: &str) -> bool {
    match service.submit_comment(post_id, text) {
        Ok(()) => true,
        Err(err) => {
            warn!(post_id, error = ?err, "submit comment failed");
            false
        }
    }
}

pub struct BoardFeedService {
    client: Arc<api::Client>,
}

impl BoardFeedService {
    pub fn new(client: Arc<api::Client>) -> Self {
        Self { client }
    }
}

impl FeedService for BoardFeedService {
    fn load_posts(&self) -> Result<Vec<Post>> {
        self.client.posts().context("load board posts")
    }
}

pub struct BoardCommentService {
    client: Arc<api::Client>,
}

impl BoardCommentService {
    pub fn new(client: Arc<api::Client>) -> Self {
        Self { client }
    }
}

impl CommentService for BoardCommentService {
    fn load_comments(&self, post_id: i64) -> Result<Vec<Comment>> {
        self.client.comments(post_id).context("load board comments")
    }
}

/// Posts comments to the board. Every comment is signed "Anonymous".
pub struct BoardInteractionService {
    client: Arc<api::Client>,
}

impl BoardInteractionService {
    pub fn new(client: Arc<api::Client>) -> Self {
        Self { client }
    }
}

impl InteractionService for BoardInteractionService {
    fn submit_comment(&self, post_id: i64, text: &str) -> Result<()> {
        self.client
            .create_comment(post_id, api::ANONYMOUS_AUTHOR, text)
    }
}

pub struct StoreFeedService {
    client: Arc<store::Client>,
}

impl StoreFeedService {
    pub fn new(client: Arc<store::Client>) -> Self {
        Self { client }
    }
}

impl FeedService for StoreFeedService {
    fn load_posts(&self) -> Result<Vec<Post>> {
        self.client.products().context("load store products")
    }
}

/// Session-only comments for back ends without a comment API.
#[derive(Default)]
pub struct LocalCommentStore {
    comments: Mutex<HashMap<i64, Vec<Comment>>>,
}

impl LocalCommentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CommentService for LocalCommentStore {
    fn load_comments(&self, post_id: i64) -> Result<Vec<Comment>> {
        Ok(self
            .comments
            .lock()
            .get(&post_id)
            .cloned()
            .unwrap_or_default())
    }
}

impl InteractionService for LocalCommentStore {
    fn submit_comment(&self, post_id: i64, text: &str) -> Result<()> {
        if text.trim().is_empty() {
            bail!("local comments: text is required");
        }
        self.comments
            .lock()
            .entry(post_id)
            .or_default()
            .push(Comment {
                post_id,
                author: api::ANONYMOUS_AUTHOR.to_string(),
                text: text.to_string(),
            });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    struct FailingFeed;

    impl FeedService for FailingFeed {
        fn load_posts(&self) -> Result<Vec<Post>> {
            Err(anyhow!("connection refused"))
        }
    }

    struct FailingInteraction;

    impl InteractionService for FailingInteraction {
        fn submit_comment(&self, _post_id: i64, _text: &str) -> Result<()> {
            Err(anyhow!("api error 500"))
        }
    }

    #[test]
    fn failed_fetch_is_empty_not_an_error() {
        let fetched = fetch_posts(&FailingFeed);
        assert!(fetched.items.is_empty());
        assert!(fetched.failed());
        assert!(fetched.error.unwrap().contains("connection refused"));
    }

    #[test]
    fn failed_submit_reports_false() {
        assert!(!submit_comment(&FailingInteraction, 1, "hi"));
    }

    #[test]
    fn local_store_keeps_comments_per_post() {
        let store = LocalCommentStore::new();
        assert!(store.submit_comment(1, "first").is_ok());
        assert!(store.submit_comment(2, "other").is_ok());
        assert!(store.submit_comment(1, "   ").is_err());
        let comments = fetch_comments(&store, 1);
        assert!(!comments.failed());
        assert_eq!(comments.items.len(), 1);
        assert_eq!(comments.items[0].author, api::ANONYMOUS_AUTHOR);
        assert_eq!(comments.items[0].text, "first");
        assert!(fetch_comments(&store, 3).items.is_empty());
    }

    #[test]
    fn board_comments_are_always_anonymous() {
        use std::io::Read;

        let server = tiny_http::Server::http("127.0.0.1:0").expect("bind test server");
        let addr = format!("http://{}", server.server_addr().to_ip().expect("ip addr"));
        let handle = std::thread::spawn(move || {
            let mut req = server.recv().expect("request");
            let mut body = String::new();
            let _ = req.as_reader().read_to_string(&mut body);
            let _ = req.respond(tiny_http::Response::from_string("{}").with_status_code(201));
            body
        });
        let client = api::Client::new(api::ClientConfig {
            base_url: addr,
            user_agent: "postboard-test".into(),
            timeout: std::time::Duration::from_secs(5),
            http_client: None,
        })
        .unwrap();
        let service = BoardInteractionService::new(Arc::new(client));
        assert!(submit_comment(&service, 12, "nice"));
        let body: serde_json::Value = serde_json::from_str(&handle.join().unwrap()).unwrap();
        assert_eq!(body["username"], "Anonymous");
        assert_eq!(body["post_id"], 12);
        assert_eq!(body["comentario"], "nice");
    }

    #[test]
    fn unreachable_board_yields_empty_posts() {
        let client = api::Client::new(api::ClientConfig {
            base_url: "http://127.0.0.1:9".into(),
            user_agent: "postboard-test".into(),
            timeout: std::time::Duration::from_secs(2),
            http_client: None,
        })
        .unwrap();
        let feed = BoardFeedService::new(Arc::new(client));
        let fetched = fetch_posts(&feed);
        assert!(fetched.items.is_empty());
        assert!(fetched.failed());
    }
}
