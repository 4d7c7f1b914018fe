use std::time::Duration;

use anyhow::{bail, Context, Result};
use reqwest::blocking::Client as HttpClient;
use reqwest::header::USER_AGENT;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::api::{self, Post};

pub const DEFAULT_STORE_URL: &str = "https://fakestoreapi.com";
pub const FAILURE_BANNER: &str = "Failed to load products. Try again.";

#[derive(Debug, Clone, Default)]
pub struct ClientConfig {
    pub base_url: String,
    pub user_agent: String,
    pub timeout: Duration,
    pub http_client: Option<HttpClient>,
}

/// Client for the placeholder store catalogue; products are presented as posts.
pub struct Client {
    http: HttpClient,
    user_agent: String,
    base_url: String,
}

impl Client {
    pub fn new(config: ClientConfig) -> Result<Self> {
        if config.user_agent.trim().is_empty() {
            bail!("store client user agent required");
        }
        let base_url = api::normalize_base_url(&config.base_url)?;
        let http = match config.http_client {
            Some(client) => client,
            None => api::build_http(config.timeout)?,
        };
        Ok(Client {
            http,
            user_agent: config.user_agent,
            base_url,
        })
    }

    pub fn products(&self) -> Result<Vec<Post>> {
        let url = format!("{}/products", self.base_url);
        debug!(url = %url, "store: GET");
        let resp = self
            .http
            .get(&url)
            .header(USER_AGENT, &self.user_agent)
            .send()
            .context("store: fetch products")?;
        let resp = api::check_status(resp)?;
        let payload: Value = resp.json().context("store: decode json")?;
        let Value::Array(items) = payload else {
            bail!("store: products payload is not an array");
        };
        Ok(items
            .into_iter()
            .filter_map(|value| serde_json::from_value::<Product>(value).ok())
            .map(Product::into_post)
            .collect())
    }
}

#[derive(Debug, Deserialize)]
struct Product {
    #[serde(deserialize_with = "api::flexible_id")]
    id: i64,
    #[serde(default)]
    title: String,
    #[serde(default)]
    price: Option<f64>,
    #[serde(default)]
    category: String,
    #[serde(default)]
    image: Option<String>,
}

impl Product {
    fn into_post(self) -> Post {
        let price = self
            .price
            .map(|price| price.to_string())
            .unwrap_or_else(|| "?".to_string());
        Post {
            id: self.id,
            title: self.title,
            body: format!("Price: ${} | Category: {}", price, self.category),
            image_url: self.image.filter(|url| !url.trim().is_empty()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn product_becomes_post_summary() {
        let product: Product = serde_json::from_str(
            r#"{"id":4,"title":"Backpack","price":109.95,"category":"men's clothing","image":"https://fakestoreapi.com/img/81fPKd-2AYL.jpg"}"#,
        )
        .unwrap();
        let post = product.into_post();
        assert_eq!(post.id, 4);
        assert_eq!(post.body, "Price: $109.95 | Category: men's clothing");
        assert!(post.image_url.unwrap().ends_with(".jpg"));
    }

    #[test]
    fn whole_prices_have_no_trailing_zeros() {
        let product: Product =
            serde_json::from_str(r#"{"id":1,"title":"Pin","price":7.0,"category":"misc"}"#)
                .unwrap();
        assert_eq!(product.into_post().body, "Price: $7 | Category: misc");
    }

    #[test]
    fn products_endpoint_is_fetched() {
        use std::thread;
        use tiny_http::{Response, Server};

        let server = Server::http("127.0.0.1:0").unwrap();
        let base = format!("http://{}", server.server_addr().to_ip().unwrap());
        let handle = thread::spawn(move || {
            let req = server.recv().unwrap();
            let url = req.url().to_string();
            let body = r#"[{"id":1,"title":"Cat bed","price":20,"category":"pets"},"junk"]"#;
            let _ = req.respond(Response::from_string(body));
            url
        });
        let client = Client::new(ClientConfig {
            base_url: format!("{base}/"),
            user_agent: "postboard-test".into(),
            timeout: Duration::from_secs(5),
            http_client: None,
        })
        .unwrap();
        let posts = client.products().unwrap();
        assert_eq!(handle.join().unwrap(), "/products");
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].title, "Cat bed");
    }
}
