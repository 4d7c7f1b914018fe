use crate::api::{Comment, Post};
use crate::filter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ViewState {
    #[default]
    List,
    Detail {
        post_id: i64,
    },
}

/// Everything the screen is drawn from. Posts are only ever replaced as a
/// whole; `selected` indexes the filtered list, not `posts`.
#[derive(Debug, Clone, Default)]
pub struct AppState {
    pub posts: Vec<Post>,
    pub view: ViewState,
    pub search_input: String,
    pub search_term: String,
    pub selected: usize,
    pub comments: Vec<Comment>,
    pub selected_comment: usize,
    pub draft: String,
    pub banner: Option<String>,
}

impl AppState {
    pub fn replace_posts(&mut self, posts: Vec<Post>) {
        self.posts = posts;
        self.clamp_selection();
    }

    /// Copies the typed search text into the active filter. Returns whether
    /// the visible set may have changed.
    pub fn apply_search(&mut self) -> bool {
        if self.search_term == self.search_input {
            return false;
        }
        self.search_term = self.search_input.clone();
        self.selected = 0;
        true
    }

    pub fn visible_posts(&self) -> Vec<&Post> {
        filter::filter_posts(&self.posts, &self.search_term)
    }

    pub fn selected_post(&self) -> Option<&Post> {
        self.visible_posts().get(self.selected).copied()
    }

    pub fn post(&self, id: i64) -> Option<&Post> {
        self.posts.iter().find(|post| post.id == id)
    }

    pub fn move_selection(&mut self, delta: i32) {
        let len = self.visible_posts().len();
        self.selected = step(self.selected, delta, len);
    }

    pub fn open_detail(&mut self, post_id: i64) {
        self.view = ViewState::Detail { post_id };
        self.comments.clear();
        self.selected_comment = 0;
    }

    pub fn close_detail(&mut self) -> Option<i64> {
        let closed = self.detail_post_id();
        self.view = ViewState::List;
        self.comments.clear();
        self.selected_comment = 0;
        closed
    }

    pub fn detail_post_id(&self) -> Option<i64> {
        match self.view {
            ViewState::Detail { post_id } => Some(post_id),
            ViewState::List => None,
        }
    }

    pub fn set_comments(&mut self, comments: Vec<Comment>) {
        self.comments = comments;
        if self.selected_comment >= self.comments.len() {
            self.selected_comment = self.comments.len().saturating_sub(1);
        }
    }

    pub fn move_comment_selection(&mut self, delta: i32) {
        self.selected_comment = step(self.selected_comment, delta, self.comments.len());
    }

    fn clamp_selection(&mut self) {
        let len = self.visible_posts().len();
        if self.selected >= len {
            self.selected = len.saturating_sub(1);
        }
    }
}

fn step(current: usize, delta: i32, len: usize) -> usize {
    if len == 0 {
        return 0;
    }
    let next = current as i64 + delta as i64;
    next.clamp(0, len as i64 - 1) as usize
}
