use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, Sender};
use tracing::{debug, info};

use crate::api::Comment;
use crate::data::{self, CommentService, InteractionService};
use crate::poller::Poller;

enum Message {
    Comments {
        request_id: u64,
        post_id: i64,
        fetched: data::Fetched<Comment>,
    },
    Submitted {
        post_id: i64,
        ok: bool,
    },
}

/// Changes the UI should apply, already filtered against the open view.
#[derive(Debug, Clone, PartialEq)]
pub enum DetailUpdate {
    Comments { post_id: i64, comments: Vec<Comment> },
    Submitted { post_id: i64, ok: bool },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    Empty,
    Sent,
    NoDetail,
}

/// Owns everything a detail view keeps alive: the poll timer and the
/// in-flight comment requests for the open post.
pub struct DetailController {
    comment_service: Arc<dyn CommentService>,
    interaction_service: Arc<dyn InteractionService>,
    poller: Poller,
    open_post: Option<i64>,
    next_request_id: u64,
    latest_applied: u64,
    tx: Sender<Message>,
    rx: Receiver<Message>,
}

impl DetailController {
    pub fn new(
        comment_service: Arc<dyn CommentService>,
        interaction_service: Arc<dyn InteractionService>,
        poll_interval: Duration,
    ) -> Self {
        let (tx, rx) = unbounded();
        Self {
            comment_service,
            interaction_service,
            poller: Poller::new(poll_interval),
            open_post: None,
            next_request_id: 1,
            latest_applied: 0,
            tx,
            rx,
        }
    }

    pub fn open_post(&self) -> Option<i64> {
        self.open_post
    }

    pub fn is_polling(&self) -> bool {
        self.poller.is_active()
    }

    /// Opens `post_id`, cancelling any earlier view's timer, and fetches
    /// comments right away.
    pub fn open(&mut self, post_id: i64) {
        info!(post_id, "detail: open");
        self.open_post = Some(post_id);
        self.poller.start(post_id);
        self.refresh();
    }

    pub fn close(&mut self) -> Option<i64> {
        self.poller.stop();
        let closed = self.open_post.take();
        if let Some(post_id) = closed {
            info!(post_id, "detail: close");
        }
        closed
    }

    /// Refreshes the open post when the poll timer fired.
    pub fn tick(&mut self) -> bool {
        if self.poller.due().is_some() {
            self.refresh();
            true
        } else {
            false
        }
    }

    pub fn refresh(&mut self) {
        let Some(post_id) = self.open_post else {
            return;
        };
        let request_id = self.next_request_id;
        self.next_request_id = self.next_request_id.wrapping_add(1);
        let service = self.comment_service.clone();
        let tx = self.tx.clone();
        debug!(post_id, request_id, "detail: fetch comments");
        thread::spawn(move || {
            let fetched = data::fetch_comments(service.as_ref(), post_id);
            let _ = tx.send(Message::Comments {
                request_id,
                post_id,
                fetched,
            });
        });
    }

    pub fn submit(&mut self, text: &str) -> SubmitOutcome {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return SubmitOutcome::Empty;
        }
        let Some(post_id) = self.open_post else {
            return SubmitOutcome::NoDetail;
        };
        let service = self.interaction_service.clone();
        let tx = self.tx.clone();
        let text = trimmed.to_string();
        thread::spawn(move || {
            let ok = data::submit_comment(service.as_ref(), post_id, &text);
            let _ = tx.send(Message::Submitted { post_id, ok });
        });
        SubmitOutcome::Sent
    }

    /// Drains finished requests. Responses for a post that is no longer
    /// open, or older than one already applied, are dropped.
    pub fn poll(&mut self) -> Vec<DetailUpdate> {
        let messages: Vec<Message> = self.rx.try_iter().collect();
        let mut updates = Vec::new();
        for message in messages {
            match message {
                Message::Comments {
                    request_id,
                    post_id,
                    fetched,
                } => {
                    if self.open_post != Some(post_id) || request_id <= self.latest_applied {
                        debug!(post_id, request_id, "detail: stale comments dropped");
                        continue;
                    }
                    self.latest_applied = request_id;
                    updates.push(DetailUpdate::Comments {
                        post_id,
                        comments: fetched.items,
                    });
                }
                Message::Submitted { post_id, ok } => {
                    if ok && self.open_post == Some(post_id) {
                        self.refresh();
                    }
                    updates.push(DetailUpdate::Submitted { post_id, ok });
                }
            }
        }
        updates
    }
}

impl Drop for DetailController {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{anyhow, Result};
    use parking_lot::Mutex;
    use std::time::Instant;

    #[derive(Default)]
    struct Recorder {
        loads: Mutex<Vec<i64>>,
        submits: Mutex<Vec<(i64, String)>>,
        fail_loads: bool,
    }

    impl CommentService for Recorder {
        fn load_comments(&self, post_id: i64) -> Result<Vec<Comment>> {
            self.loads.lock().push(post_id);
            if self.fail_loads {
                return Err(anyhow!("offline"));
            }
            Ok(vec![Comment {
                post_id,
                author: "Anonymous".into(),
                text: format!("comment on {post_id}"),
            }])
        }
    }

    impl InteractionService for Recorder {
        fn submit_comment(&self, post_id: i64, text: &str) -> Result<()> {
            self.submits.lock().push((post_id, text.to_string()));
            Ok(())
        }
    }

    fn controller(recorder: &Arc<Recorder>, interval: Duration) -> DetailController {
        DetailController::new(recorder.clone(), recorder.clone(), interval)
    }

    fn wait_for_updates(controller: &mut DetailController, count: usize) -> Vec<DetailUpdate> {
        let deadline = Instant::now() + Duration::from_secs(2);
        let mut updates = Vec::new();
        while updates.len() < count && Instant::now() < deadline {
            updates.extend(controller.poll());
            thread::sleep(Duration::from_millis(5));
        }
        updates
    }

    #[test]
    fn open_fetches_comments_immediately() {
        let recorder = Arc::new(Recorder::default());
        let mut detail = controller(&recorder, Duration::from_secs(60));
        detail.open(3);
        let updates = wait_for_updates(&mut detail, 1);
        assert_eq!(
            updates,
            vec![DetailUpdate::Comments {
                post_id: 3,
                comments: vec![Comment {
                    post_id: 3,
                    author: "Anonymous".into(),
                    text: "comment on 3".into(),
                }],
            }]
        );
        assert!(detail.is_polling());
    }

    #[test]
    fn empty_comment_makes_no_call() {
        let recorder = Arc::new(Recorder::default());
        let mut detail = controller(&recorder, Duration::from_secs(60));
        detail.open(1);
        assert_eq!(detail.submit("   \n\t"), SubmitOutcome::Empty);
        assert_eq!(detail.submit(""), SubmitOutcome::Empty);
        thread::sleep(Duration::from_millis(50));
        assert!(recorder.submits.lock().is_empty());
    }

    #[test]
    fn submit_without_detail_is_rejected() {
        let recorder = Arc::new(Recorder::default());
        let mut detail = controller(&recorder, Duration::from_secs(60));
        assert_eq!(detail.submit("hello"), SubmitOutcome::NoDetail);
        thread::sleep(Duration::from_millis(20));
        assert!(recorder.submits.lock().is_empty());
    }

    #[test]
    fn successful_submit_refetches_comments() {
        let recorder = Arc::new(Recorder::default());
        let mut detail = controller(&recorder, Duration::from_secs(60));
        detail.open(5);
        let _ = wait_for_updates(&mut detail, 1);
        assert_eq!(detail.submit("  nice  "), SubmitOutcome::Sent);
        let updates = wait_for_updates(&mut detail, 2);
        assert!(updates.contains(&DetailUpdate::Submitted { post_id: 5, ok: true }));
        assert_eq!(recorder.submits.lock().as_slice(), &[(5, "nice".to_string())]);
        assert_eq!(recorder.loads.lock().as_slice(), &[5, 5]);
    }

    #[test]
    fn second_open_polls_only_the_new_post() {
        let recorder = Arc::new(Recorder::default());
        let mut detail = controller(&recorder, Duration::from_millis(20));
        detail.open(1);
        detail.open(2);
        thread::sleep(Duration::from_millis(70));
        detail.tick();
        thread::sleep(Duration::from_millis(30));
        detail.tick();
        let _ = wait_for_updates(&mut detail, 2);
        let loads = recorder.loads.lock().clone();
        assert_eq!(loads.iter().filter(|id| **id == 1).count(), 1);
        assert!(loads.iter().filter(|id| **id == 2).count() >= 2);
    }

    #[test]
    fn stale_responses_are_dropped_after_switching_posts() {
        let recorder = Arc::new(Recorder::default());
        let mut detail = controller(&recorder, Duration::from_secs(60));
        detail.open(1);
        thread::sleep(Duration::from_millis(50));
        detail.open(2);
        let updates = wait_for_updates(&mut detail, 1);
        assert!(updates
            .iter()
            .all(|update| matches!(update, DetailUpdate::Comments { post_id: 2, .. })));
    }

    #[test]
    fn close_stops_timer() {
        let recorder = Arc::new(Recorder::default());
        let mut detail = controller(&recorder, Duration::from_millis(10));
        detail.open(8);
        assert_eq!(detail.close(), Some(8));
        assert!(!detail.is_polling());
        thread::sleep(Duration::from_millis(40));
        assert!(!detail.tick());
        detail.refresh();
        thread::sleep(Duration::from_millis(20));
        assert!(detail.poll().is_empty());
        assert_eq!(recorder.loads.lock().as_slice(), &[8]);
    }

    #[test]
    fn failed_poll_renders_empty_list() {
        let recorder = Arc::new(Recorder {
            fail_loads: true,
            ..Recorder::default()
        });
        let mut detail = controller(&recorder, Duration::from_secs(60));
        detail.open(4);
        let updates = wait_for_updates(&mut detail, 1);
        assert_eq!(
            updates,
            vec![DetailUpdate::Comments {
                post_id: 4,
                comments: Vec::new(),
            }]
        );
    }
}
