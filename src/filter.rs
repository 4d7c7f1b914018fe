use std::time::{Duration, Instant};

use crate::api::Post;

/// Case-insensitive substring match over title and body.
pub fn matches(post: &Post, term: &str) -> bool {
    let needle = term.trim().to_lowercase();
    if needle.is_empty() {
        return true;
    }
    post.title.to_lowercase().contains(&needle) || post.body.to_lowercase().contains(&needle)
}

/// Recomputed from the full list every time; an empty term keeps everything.
pub fn filter_posts<'a>(posts: &'a [Post], term: &str) -> Vec<&'a Post> {
    posts.iter().filter(|post| matches(post, term)).collect()
}

/// Fires once, `delay` after the most recent input change.
#[derive(Debug, Clone)]
pub struct Debouncer {
    delay: Duration,
    last_input: Option<Instant>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            last_input: None,
        }
    }

    pub fn touch(&mut self, now: Instant) {
        self.last_input = Some(now);
    }

    pub fn is_pending(&self) -> bool {
        self.last_input.is_some()
    }

    pub fn ready(&mut self, now: Instant) -> bool {
        match self.last_input {
            Some(at) if now.saturating_duration_since(at) >= self.delay => {
                self.last_input = None;
                true
            }
            _ => false,
        }
    }

    pub fn cancel(&mut self) {
        self.last_input = None;
    }

    /// Time left before the pending input should be applied.
    pub fn remaining(&self, now: Instant) -> Option<Duration> {
        self.last_input
            .map(|at| self.delay.saturating_sub(now.saturating_duration_since(at)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn post(id: i64, title: &str, body: &str) -> Post {
        Post {
            id,
            title: title.into(),
            body: body.into(),
            image_url: None,
        }
    }

    fn titles(posts: &[&Post]) -> Vec<String> {
        posts.iter().map(|post| post.title.clone()).collect()
    }

    #[test]
    fn cat_keeps_only_category() {
        let posts = vec![post(1, "Category A", ""), post(2, "Dog toy", "")];
        assert_eq!(titles(&filter_posts(&posts, "cat")), vec!["Category A"]);
    }

    #[test]
    fn matches_body_case_insensitively() {
        let posts = vec![
            post(1, "Weekly thread", "Post your CATS here"),
            post(2, "Dog toy", "squeaky"),
        ];
        assert_eq!(titles(&filter_posts(&posts, "Cats")), vec!["Weekly thread"]);
    }

    #[test]
    fn filtering_is_idempotent() {
        let posts = vec![
            post(1, "Category A", "x"),
            post(2, "Dog toy", "cat nip"),
            post(3, "Bird", "seed"),
        ];
        let once: Vec<Post> = filter_posts(&posts, "cat").into_iter().cloned().collect();
        let twice: Vec<Post> = filter_posts(&once, "cat").into_iter().cloned().collect();
        assert_eq!(once, twice);
        assert_eq!(once.len(), 2);
    }

    #[test]
    fn empty_term_keeps_everything() {
        let posts = vec![post(1, "a", ""), post(2, "b", "")];
        assert_eq!(filter_posts(&posts, "   ").len(), 2);
        assert!(filter_posts(&[], "x").is_empty());
    }

    #[test]
    fn debouncer_waits_for_quiet_period() {
        let start = Instant::now();
        let mut debouncer = Debouncer::new(Duration::from_millis(300));
        assert!(!debouncer.ready(start));
        debouncer.touch(start);
        assert!(!debouncer.ready(start + Duration::from_millis(100)));
        debouncer.touch(start + Duration::from_millis(200));
        assert!(!debouncer.ready(start + Duration::from_millis(400)));
        assert_eq!(
            debouncer.remaining(start + Duration::from_millis(400)),
            Some(Duration::from_millis(100))
        );
        assert!(debouncer.ready(start + Duration::from_millis(500)));
        assert!(!debouncer.ready(start + Duration::from_millis(900)));
        assert!(!debouncer.is_pending());
    }
}
