//! View nodes: plain data describing what the screen shows. They are built
//! from state by pure functions and drawn by the terminal layer.

use std::collections::HashMap;

use crate::api::{Comment, Post};
use crate::filter;
use crate::media::{self, Classifier, ImageInfo, ImageStatus, MediaKind, Preview};

pub const EMPTY_POSTS: &str = "No posts found.";
pub const EMPTY_COMMENTS: &str = "No comments yet.";

/// Known image outcomes keyed by URL. `probing` says whether anything will
/// ever fill it; without probing, images are shown by name only.
#[derive(Debug, Clone, Default)]
pub struct ImageBook {
    statuses: HashMap<String, ImageStatus>,
    probing: bool,
}

impl ImageBook {
    pub fn new(probing: bool) -> Self {
        Self {
            statuses: HashMap::new(),
            probing,
        }
    }

    pub fn probing(&self) -> bool {
        self.probing
    }

    pub fn insert(&mut self, url: impl Into<String>, status: ImageStatus) {
        self.statuses.insert(url.into(), status);
    }

    pub fn get(&self, url: &str) -> Option<&ImageStatus> {
        self.statuses.get(url)
    }

    pub fn contains_key(&self, url: &str) -> bool {
        self.statuses.contains_key(url)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSlot {
    Absent,
    Pending { label: String },
    Unprobed { label: String },
    Loaded { label: String, info: ImageInfo },
    Placeholder { label: String },
}

impl ImageSlot {
    pub fn describe(&self) -> Option<String> {
        match self {
            ImageSlot::Absent => None,
            ImageSlot::Pending { label } => Some(format!("[image: {label}] loading…")),
            ImageSlot::Unprobed { label } => Some(format!("[image: {label}]")),
            ImageSlot::Loaded { label, info } => Some(format!(
                "[image: {label}] {}x{} {}",
                info.width, info.height, info.format
            )),
            ImageSlot::Placeholder { label } => Some(format!("[image unavailable: {label}]")),
        }
    }
}

pub fn image_slot(url: Option<&str>, images: &ImageBook) -> ImageSlot {
    let Some(url) = url.map(str::trim).filter(|url| !url.is_empty()) else {
        return ImageSlot::Absent;
    };
    let Some(parsed) = media::parse_lenient(url) else {
        return ImageSlot::Placeholder {
            label: url.to_string(),
        };
    };
    let label = parsed
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|segment| !segment.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| parsed.host_str().unwrap_or("image").to_string());
    match images.get(url) {
        Some(ImageStatus::Loaded(info)) => ImageSlot::Loaded {
            label,
            info: info.clone(),
        },
        Some(ImageStatus::Placeholder) => ImageSlot::Placeholder { label },
        None if images.probing() => ImageSlot::Pending { label },
        None => ImageSlot::Unprobed { label },
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostCard {
    pub id: i64,
    pub title: String,
    pub body: String,
    pub image: ImageSlot,
    pub selected: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListBody {
    Cards(Vec<PostCard>),
    Empty(&'static str),
    Banner(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListView {
    pub term: String,
    pub total: usize,
    pub body: ListBody,
}

impl ListView {
    pub fn cards(&self) -> &[PostCard] {
        match &self.body {
            ListBody::Cards(cards) => cards,
            _ => &[],
        }
    }
}

pub fn render_list(
    posts: &[Post],
    term: &str,
    selected: usize,
    banner: Option<&str>,
    images: &ImageBook,
) -> ListView {
    let visible = filter::filter_posts(posts, term);
    let body = if visible.is_empty() {
        match banner {
            Some(message) if posts.is_empty() => ListBody::Banner(message.to_string()),
            _ => ListBody::Empty(EMPTY_POSTS),
        }
    } else {
        ListBody::Cards(
            visible
                .into_iter()
                .enumerate()
                .map(|(index, post)| PostCard {
                    id: post.id,
                    title: post.title.clone(),
                    body: post.body.clone(),
                    image: image_slot(post.image_url.as_deref(), images),
                    selected: index == selected,
                })
                .collect(),
        )
    };
    ListView {
        term: term.to_string(),
        total: posts.len(),
        body,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub preview: Preview,
    pub image: ImageSlot,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentNode {
    pub author: String,
    pub text: String,
    pub attachments: Vec<Attachment>,
    pub selected: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetailView {
    pub post_id: i64,
    pub title: String,
    pub body: String,
    pub image: ImageSlot,
    pub comments: Vec<CommentNode>,
    pub empty: Option<&'static str>,
}

pub fn comment_attachments(
    classifier: &Classifier,
    text: &str,
    images: &ImageBook,
) -> Vec<Attachment> {
    classifier
        .attachments(text)
        .into_iter()
        .map(|preview| {
            let image = if preview.kind == MediaKind::Image {
                image_slot(Some(&preview.url), images)
            } else {
                ImageSlot::Absent
            };
            Attachment { preview, image }
        })
        .collect()
}

pub fn render_detail(
    post: &Post,
    comments: &[Comment],
    selected_comment: usize,
    classifier: &Classifier,
    images: &ImageBook,
) -> DetailView {
    let nodes: Vec<CommentNode> = comments
        .iter()
        .enumerate()
        .map(|(index, comment)| CommentNode {
            author: comment.author.clone(),
            text: comment.text.clone(),
            attachments: comment_attachments(classifier, &comment.text, images),
            selected: index == selected_comment,
        })
        .collect();
    DetailView {
        post_id: post.id,
        title: post.title.clone(),
        body: post.body.clone(),
        image: image_slot(post.image_url.as_deref(), images),
        empty: nodes.is_empty().then_some(EMPTY_COMMENTS),
        comments: nodes,
    }
}

pub fn attachment_line(attachment: &Attachment) -> String {
    match attachment.preview.kind {
        MediaKind::Image => attachment
            .image
            .describe()
            .unwrap_or_else(|| format!("[image: {}]", attachment.preview.label)),
        MediaKind::Article => format!("[article] {}", attachment.preview.host),
        MediaKind::Link => format!("[link] {}", attachment.preview.host),
        MediaKind::Text => attachment.preview.label.clone(),
    }
}

/// Plain-text rendering of the list, used by the headless print mode.
pub fn plain_text(view: &ListView) -> String {
    let mut out = String::new();
    match &view.body {
        ListBody::Empty(message) => {
            out.push_str(message);
            out.push('\n');
        }
        ListBody::Banner(message) => {
            out.push_str(message);
            out.push('\n');
        }
        ListBody::Cards(cards) => {
            for card in cards {
                out.push_str(&format!("#{} {}\n", card.id, card.title));
                for line in card.body.lines().filter(|line| !line.trim().is_empty()) {
                    out.push_str(&format!("    {}\n", line.trim()));
                }
                if let Some(image) = card.image.describe() {
                    out.push_str(&format!("    {image}\n"));
                }
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn post(id: i64, title: &str, image: Option<&str>) -> Post {
        Post {
            id,
            title: title.into(),
            body: format!("body of {title}"),
            image_url: image.map(str::to_string),
        }
    }

    #[test]
    fn list_filters_and_marks_selection() {
        let posts = vec![post(1, "Category A", None), post(2, "Dog toy", None)];
        let view = render_list(&posts, "CAT", 0, None, &ImageBook::new(true));
        assert_eq!(view.total, 2);
        assert_eq!(view.cards().len(), 1);
        assert_eq!(view.cards()[0].title, "Category A");
        assert!(view.cards()[0].selected);
    }

    #[test]
    fn empty_list_shows_message() {
        let view = render_list(&[], "", 0, None, &ImageBook::new(true));
        assert_eq!(view.body, ListBody::Empty(EMPTY_POSTS));
        let posts = vec![post(1, "Dog toy", None)];
        let view = render_list(&posts, "zebra", 0, Some("banner"), &ImageBook::new(true));
        assert_eq!(view.body, ListBody::Empty(EMPTY_POSTS));
    }

    #[test]
    fn banner_only_when_nothing_loaded() {
        let view = render_list(&[], "", 0, Some("Failed to load products."), &ImageBook::new(true));
        assert_eq!(view.body, ListBody::Banner("Failed to load products.".into()));
    }

    #[test]
    fn broken_image_urls_degrade_to_placeholder() {
        let mut images = ImageBook::new(true);
        images.insert("https://x.io/dead.png", ImageStatus::Placeholder);
        images.insert(
            "https://x.io/ok.png",
            ImageStatus::Loaded(ImageInfo {
                format: "png".into(),
                width: 10,
                height: 20,
            }),
        );
        assert!(matches!(
            image_slot(Some("not a url at all"), &images),
            ImageSlot::Placeholder { .. }
        ));
        assert_eq!(
            image_slot(Some("https://x.io/dead.png"), &images),
            ImageSlot::Placeholder {
                label: "dead.png".into()
            }
        );
        assert_eq!(
            image_slot(Some("https://x.io/ok.png"), &images)
                .describe()
                .unwrap(),
            "[image: ok.png] 10x20 png"
        );
        assert!(matches!(
            image_slot(Some("https://x.io/new.png"), &images),
            ImageSlot::Pending { .. }
        ));
        assert_eq!(image_slot(Some("  "), &images), ImageSlot::Absent);
    }

    #[test]
    fn images_without_probing_are_named_not_loading() {
        let images = ImageBook::new(false);
        assert_eq!(
            image_slot(Some("https://x.io/a.png"), &images),
            ImageSlot::Unprobed {
                label: "a.png".into()
            }
        );
        let posts = vec![post(1, "Cat tree", Some("https://x.io/a.png"))];
        let text = plain_text(&render_list(&posts, "", usize::MAX, None, &images));
        assert_eq!(text, "#1 Cat tree\n    body of Cat tree\n    [image: a.png]\n");
        assert!(!text.contains("loading"));
    }

    #[test]
    fn detail_builds_comment_attachments() {
        let classifier = Classifier::default();
        let comments = vec![
            Comment {
                post_id: 1,
                author: "Anonymous".into(),
                text: "see https://www.nytimes.com/a.html".into(),
            },
            Comment {
                post_id: 1,
                author: "Anonymous".into(),
                text: "plain words".into(),
            },
        ];
        let detail = render_detail(
            &post(1, "Cat tree", Some("https://x.io/tree.jpg")),
            &comments,
            1,
            &classifier,
            &ImageBook::new(true),
        );
        assert_eq!(detail.comments.len(), 2);
        assert_eq!(
            attachment_line(&detail.comments[0].attachments[0]),
            "[article] nytimes.com"
        );
        assert!(detail.comments[1].attachments.is_empty());
        assert!(detail.comments[1].selected);
        assert_eq!(detail.empty, None);
    }

    #[test]
    fn detail_without_comments_says_so() {
        let detail = render_detail(
            &post(1, "Lonely", None),
            &[],
            0,
            &Classifier::default(),
            &ImageBook::new(true),
        );
        assert_eq!(detail.empty, Some(EMPTY_COMMENTS));
        assert_eq!(detail.image, ImageSlot::Absent);
    }

    #[test]
    fn plain_text_lists_cards() {
        let posts = vec![post(7, "Category A", None)];
        let text = plain_text(&render_list(&posts, "", 0, None, &ImageBook::new(true)));
        assert_eq!(text, "#7 Category A\n    body of Category A\n");
    }
}
