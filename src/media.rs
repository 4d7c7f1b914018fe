use std::io::Read;
use std::thread;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use crossbeam_channel::{unbounded, Receiver, Sender};
use image::ImageFormat;
use once_cell::sync::Lazy;
use percent_encoding::percent_decode_str;
use reqwest::blocking::Client;
use regex::Regex;
use tracing::debug;
use url::Url;

pub const DEFAULT_IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp", "bmp", "svg"];
pub const DEFAULT_NEWS_KEYWORDS: &[&str] = &[
    "nytimes",
    "bbc",
    "cnn",
    "theguardian",
    "reuters",
    "washingtonpost",
    "bloomberg",
    "apnews",
    "npr",
    "elpais",
    "elmundo",
    "lemonde",
];

const MAX_IMAGE_BYTES: u64 = 16 * 1024 * 1024;

static URL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)\bhttps?://[^\s<>"']+"#).expect("valid url regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    Image,
    Article,
    Link,
    Text,
}

impl MediaKind {
    pub fn tag(&self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Article => "article",
            MediaKind::Link => "link",
            MediaKind::Text => "text",
        }
    }
}

/// What a comment or post shows in place of a bare URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Preview {
    pub kind: MediaKind,
    pub url: String,
    pub host: String,
    pub label: String,
}

#[derive(Debug, Clone)]
pub struct Classifier {
    image_extensions: Vec<String>,
    news_keywords: Vec<String>,
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new(
            DEFAULT_IMAGE_EXTENSIONS.iter().map(|s| s.to_string()),
            DEFAULT_NEWS_KEYWORDS.iter().map(|s| s.to_string()),
        )
    }
}

impl Classifier {
    pub fn new<E, K>(image_extensions: E, news_keywords: K) -> Self
    where
        E: IntoIterator<Item = String>,
        K: IntoIterator<Item = String>,
    {
        let image_extensions = image_extensions
            .into_iter()
            .map(|ext| ext.trim().trim_start_matches('.').to_ascii_lowercase())
            .filter(|ext| !ext.is_empty())
            .collect();
        let news_keywords = news_keywords
            .into_iter()
            .map(|keyword| keyword.trim().to_ascii_lowercase())
            .filter(|keyword| !keyword.is_empty())
            .collect();
        Self {
            image_extensions,
            news_keywords,
        }
    }

    pub fn classify(&self, input: &str) -> MediaKind {
        match parse_lenient(input) {
            Some(url) => self.classify_url(&url),
            None => MediaKind::Text,
        }
    }

    // Image before article: a png on a news host is still an image.
    fn classify_url(&self, url: &Url) -> MediaKind {
        let path = url.path().to_ascii_lowercase();
        if self
            .image_extensions
            .iter()
            .any(|ext| path.ends_with(&format!(".{ext}")))
        {
            return MediaKind::Image;
        }
        let host = url.host_str().unwrap_or_default().to_ascii_lowercase();
        if self
            .news_keywords
            .iter()
            .any(|keyword| host.contains(keyword.as_str()))
        {
            return MediaKind::Article;
        }
        MediaKind::Link
    }

    pub fn preview(&self, input: &str) -> Option<Preview> {
        let url = parse_lenient(input)?;
        let kind = self.classify_url(&url);
        let host = url
            .host_str()
            .unwrap_or_default()
            .trim_start_matches("www.")
            .to_string();
        let label = match kind {
            MediaKind::Image => image_label(&url),
            _ => host.clone(),
        };
        Some(Preview {
            kind,
            url: url.to_string(),
            host,
            label,
        })
    }

    /// Previews for every link in free text. Text that is itself a bare
    /// address without a scheme is treated as a single link.
    pub fn attachments(&self, text: &str) -> Vec<Preview> {
        let found = find_urls(text);
        if found.is_empty() {
            return self.preview(text).into_iter().collect();
        }
        found.iter().filter_map(|url| self.preview(url)).collect()
    }
}

/// Parses `input` as a URL, assuming `http://` when no scheme is given.
/// Any scheme is accepted as long as the URL has a host. Scheme-less input
/// must name a dotted host so plain words stay text.
pub fn parse_lenient(input: &str) -> Option<Url> {
    let trimmed = input.trim();
    if trimmed.is_empty() || trimmed.chars().any(char::is_whitespace) {
        return None;
    }
    let has_scheme = trimmed.contains("://");
    let candidate = if has_scheme {
        trimmed.to_string()
    } else {
        format!("http://{trimmed}")
    };
    let url = Url::parse(&candidate).ok()?;
    let host = url.host_str().filter(|host| !host.is_empty())?;
    if !has_scheme && !host.contains('.') && host != "localhost" {
        return None;
    }
    Some(url)
}

/// Whether the client itself may download or open `url`.
pub fn is_fetchable(url: &Url) -> bool {
    matches!(url.scheme(), "http" | "https")
}

pub fn find_urls(text: &str) -> Vec<String> {
    URL_RE
        .find_iter(text)
        .map(|m| {
            m.as_str()
                .trim_end_matches(['.', ',', ';', ':', '!', '?', ')'])
                .to_string()
        })
        .collect()
}

fn image_label(url: &Url) -> String {
    url.path_segments()
        .and_then(|mut segments| segments.next_back())
        .map(|segment| percent_decode_str(segment).decode_utf8_lossy().to_string())
        .filter(|label| !label.is_empty())
        .unwrap_or_else(|| "image".to_string())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageInfo {
    pub format: String,
    pub width: u32,
    pub height: u32,
}

/// Outcome of loading an image; anything that fails becomes a placeholder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageStatus {
    Loaded(ImageInfo),
    Placeholder,
}

pub fn probe_image(client: &Client, url: &str) -> Result<ImageInfo> {
    let url = parse_lenient(url).ok_or_else(|| anyhow!("media: invalid image url"))?;
    if !is_fetchable(&url) {
        bail!("media: unsupported scheme {}", url.scheme());
    }
    let response = client
        .get(url.as_str())
        .send()
        .with_context(|| format!("media: request {}", url))?;
    if !response.status().is_success() {
        bail!("media: image request returned status {}", response.status());
    }
    let mut bytes = Vec::with_capacity(64 * 1024);
    response
        .take(MAX_IMAGE_BYTES)
        .read_to_end(&mut bytes)
        .context("media: read image body")?;
    decode_image_info(&bytes)
}

pub fn decode_image_info(bytes: &[u8]) -> Result<ImageInfo> {
    if bytes.is_empty() {
        bail!("media: image had no bytes");
    }
    let format = image::guess_format(bytes).context("media: unknown image format")?;
    let decoded = image::load_from_memory_with_format(bytes, format).context("media: decode")?;
    Ok(ImageInfo {
        format: format_name(format),
        width: decoded.width(),
        height: decoded.height(),
    })
}

fn format_name(format: ImageFormat) -> String {
    format
        .extensions_str()
        .first()
        .map(|ext| ext.to_string())
        .unwrap_or_else(|| format!("{format:?}").to_ascii_lowercase())
}

#[derive(Debug, Clone)]
pub struct ProbeResult {
    pub url: String,
    pub status: ImageStatus,
}

/// Small worker pool that loads images off the UI thread. Workers are
/// detached; dropping the pool closes the job queue and each worker exits
/// after its current download.
pub struct Prober {
    jobs: Sender<String>,
    results: Receiver<ProbeResult>,
}

impl Prober {
    pub fn new(workers: usize, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(format!("postboard/{} (image-probe)", crate::VERSION))
            .build()
            .context("media: build http client")?;
        let (job_tx, job_rx) = unbounded::<String>();
        let (result_tx, result_rx) = unbounded();

        for _ in 0..workers.max(1) {
            let jobs = job_rx.clone();
            let results = result_tx.clone();
            let client = client.clone();
            thread::spawn(move || {
                for url in jobs.iter() {
                    let status = match probe_image(&client, &url) {
                        Ok(info) => ImageStatus::Loaded(info),
                        Err(err) => {
                            debug!(url = %url, error = %err, "media: image unavailable");
                            ImageStatus::Placeholder
                        }
                    };
                    if results.send(ProbeResult { url, status }).is_err() {
                        break;
                    }
                }
            });
        }

        Ok(Self {
            jobs: job_tx,
            results: result_rx,
        })
    }

    pub fn enqueue(&self, url: &str) {
        let _ = self.jobs.send(url.to_string());
    }

    pub fn drain(&self) -> Vec<ProbeResult> {
        self.results.try_iter().collect()
    }
}
