use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use reqwest::blocking::{Client as HttpClient, Response};
use reqwest::header::USER_AGENT;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Value};
use tracing::debug;

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:3000/api";
pub const ANONYMOUS_AUTHOR: &str = "Anonymous";

/// A post as the client sees it, whichever back end produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: i64,
    pub title: String,
    pub body: String,
    #[serde(default)]
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub post_id: i64,
    pub author: String,
    pub text: String,
}

#[derive(Debug, Clone, Default)]
pub struct ClientConfig {
    pub base_url: String,
    pub user_agent: String,
    pub timeout: Duration,
    pub http_client: Option<HttpClient>,
}

pub struct Client {
    http: HttpClient,
    user_agent: String,
    base_url: String,
}

impl Client {
    pub fn new(config: ClientConfig) -> Result<Self> {
        if config.user_agent.trim().is_empty() {
            bail!("board client user agent required");
        }
        let base_url = normalize_base_url(&config.base_url)?;
        let http = match config.http_client {
            Some(client) => client,
            None => build_http(config.timeout)?,
        };

        Ok(Client {
            http,
            user_agent: config.user_agent,
            base_url,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn posts(&self) -> Result<Vec<Post>> {
        let url = format!("{}/posts", self.base_url);
        let payload = self.get_json(&url).context("board: fetch posts")?;
        let envelope: PostsEnvelope =
            serde_json::from_value(payload).context("board: decode posts envelope")?;
        let posts: Vec<Post> = envelope
            .posts
            .into_iter()
            .filter_map(|value| match serde_json::from_value::<WirePost>(value) {
                Ok(wire) => Some(wire.into_post()),
                Err(err) => {
                    debug!(error = %err, "board: skipping malformed post");
                    None
                }
            })
            .collect();
        debug!(count = posts.len(), "board: posts decoded");
        Ok(posts)
    }

    pub fn comments(&self, post_id: i64) -> Result<Vec<Comment>> {
        let url = format!("{}/comments/{}", self.base_url, post_id);
        let payload = self
            .get_json(&url)
            .with_context(|| format!("board: fetch comments for post {post_id}"))?;
        let Value::Array(items) = payload else {
            bail!("board: comments payload is not an array");
        };
        Ok(items
            .into_iter()
            .filter_map(|value| serde_json::from_value::<WireComment>(value).ok())
            .filter_map(|wire| wire.into_comment(post_id))
            .collect())
    }

    pub fn create_comment(&self, post_id: i64, author: &str, text: &str) -> Result<()> {
        if text.trim().is_empty() {
            bail!("board: comment text is required");
        }
        let url = format!("{}/comment", self.base_url);
        let body = json!({
            "post_id": post_id,
            "username": author,
            "comentario": text,
        });
        let resp = self
            .http
            .post(&url)
            .header(USER_AGENT, &self.user_agent)
            .json(&body)
            .send()
            .context("board: send comment")?;
        check_status(resp).map(|_| ())
    }

    fn get_json(&self, url: &str) -> Result<Value> {
        debug!(url, "board: GET");
        let resp = self
            .http
            .get(url)
            .header(USER_AGENT, &self.user_agent)
            .send()?;
        let resp = check_status(resp)?;
        let value: Value = resp.json().context("board: decode json")?;
        Ok(value)
    }
}

pub(crate) fn build_http(timeout: Duration) -> Result<HttpClient> {
    let timeout = if timeout.is_zero() {
        Duration::from_secs(20)
    } else {
        timeout
    };
    HttpClient::builder()
        .timeout(timeout)
        .build()
        .context("build http client")
}

pub(crate) fn normalize_base_url(raw: &str) -> Result<String> {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        bail!("base url required");
    }
    url::Url::parse(trimmed).with_context(|| format!("invalid base url {trimmed:?}"))?;
    Ok(trimmed.to_string())
}

pub(crate) fn check_status(resp: Response) -> Result<Response> {
    if resp.status().is_success() {
        return Ok(resp);
    }
    let status = resp.status();
    let body = resp.text().unwrap_or_default();
    Err(anyhow!("api error {}: {}", status, body.trim()))
}

#[derive(Debug, Default, Deserialize)]
struct PostsEnvelope {
    #[serde(default)]
    posts: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct WirePost {
    #[serde(deserialize_with = "flexible_id")]
    id: i64,
    #[serde(default)]
    titulo: Option<String>,
    #[serde(default)]
    descripcion: Option<String>,
    #[serde(default)]
    imagen: Option<String>,
}

impl WirePost {
    fn into_post(self) -> Post {
        Post {
            id: self.id,
            title: self.titulo.unwrap_or_default(),
            body: self.descripcion.unwrap_or_default(),
            image_url: self
                .imagen
                .map(|url| url.trim().to_string())
                .filter(|url| !url.is_empty()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct WireComment {
    #[serde(default)]
    comentario: Option<String>,
    #[serde(default)]
    username: Option<String>,
}

impl WireComment {
    fn into_comment(self, post_id: i64) -> Option<Comment> {
        let text = self.comentario?;
        let author = self
            .username
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| ANONYMOUS_AUTHOR.to_string());
        Some(Comment {
            post_id,
            author,
            text,
        })
    }
}

/// Accepts ids sent either as JSON numbers or as numeric strings.
pub(crate) fn flexible_id<'de, D>(deserializer: D) -> std::result::Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    match &value {
        Value::Number(number) => number
            .as_i64()
            .or_else(|| number.as_f64().map(|f| f as i64))
            .ok_or_else(|| serde::de::Error::custom("id out of range")),
        Value::String(text) => text
            .trim()
            .parse::<i64>()
            .map_err(|_| serde::de::Error::custom(format!("invalid id {text:?}"))),
        _ => Err(serde::de::Error::custom("id must be a number")),
    }
}
