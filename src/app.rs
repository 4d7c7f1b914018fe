use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::api;
use crate::config::{self, Config, Source};
use crate::data::{self, CommentService, FeedService, InteractionService};
use crate::logging;
use crate::media::{self, ImageStatus};
use crate::store;
use crate::ui;
use crate::view::{self, ImageBook};

const PROBE_WORKERS: usize = 2;

/// Overrides collected from the command line; anything left unset comes
/// from the config file and environment.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub config_file: Option<PathBuf>,
    pub source: Option<Source>,
    pub base_url: Option<String>,
}

struct Services {
    feed: Arc<dyn FeedService>,
    comments: Arc<dyn CommentService>,
    interactions: Arc<dyn InteractionService>,
}

pub fn run(options: RunOptions) -> Result<()> {
    let cfg = prepare_config(&options)?;
    let log_path = logging::init(&cfg.log).ok();
    let config_path = options.config_file.clone().or_else(config::default_path);
    info!(
        source = cfg.api.source.as_str(),
        base_url = cfg.api.active_base_url(),
        config = %friendly_path(config_path.as_ref()),
        "starting"
    );

    let services = build_services(&cfg)?;
    let classifier = media::Classifier::new(
        cfg.media.image_extensions.clone(),
        cfg.media.news_keywords.clone(),
    );
    let prober = if cfg.media.probe_images {
        match media::Prober::new(PROBE_WORKERS, cfg.api.timeout) {
            Ok(prober) => Some(prober),
            Err(err) => {
                warn!(error = ?err, "image probing disabled");
                None
            }
        }
    } else {
        None
    };

    let mut status = format!(
        "{} from {}",
        cfg.api.source.display_name(),
        cfg.api.active_base_url()
    );
    if let Some(path) = &log_path {
        status.push_str(&format!(" · log {}", friendly_path(Some(path))));
    }

    let mut model = ui::Model::new(ui::Options {
        status_message: status,
        source: cfg.api.source,
        feed_service: services.feed,
        comment_service: services.comments,
        interaction_service: services.interactions,
        classifier,
        search_debounce: cfg.ui.search_debounce,
        poll_interval: cfg.ui.poll_interval,
        prober,
    });
    model.run()
}

/// Fetches the feed once and renders it as text, optionally filtered by
/// `term`. Failures render the same empty or banner output the UI shows.
pub fn print_posts(options: &RunOptions, term: &str) -> Result<String> {
    let cfg = prepare_config(options)?;
    let _ = logging::init(&cfg.log);
    let services = build_services(&cfg)?;
    let fetched = data::fetch_posts(services.feed.as_ref());
    let banner = if fetched.failed() {
        cfg.api.source.failure_banner()
    } else {
        None
    };

    let mut images = ImageBook::new(cfg.media.probe_images);
    if cfg.media.probe_images {
        probe_all(&fetched.items, &mut images, cfg.api.timeout)?;
    }

    let list = view::render_list(&fetched.items, term, usize::MAX, banner, &images);
    Ok(view::plain_text(&list))
}

fn probe_all(posts: &[api::Post], images: &mut ImageBook, timeout: Duration) -> Result<()> {
    let client = reqwest::blocking::Client::builder()
        .timeout(timeout)
        .user_agent(format!("postboard/{} (image-probe)", crate::VERSION))
        .build()
        .context("media: build http client")?;
    for url in posts.iter().filter_map(|post| post.image_url.as_deref()) {
        let key = url.trim();
        if key.is_empty() || images.contains_key(key) {
            continue;
        }
        let status = match media::probe_image(&client, key) {
            Ok(info) => ImageStatus::Loaded(info),
            Err(err) => {
                warn!(url = key, error = %err, "image unavailable");
                ImageStatus::Placeholder
            }
        };
        images.insert(key.to_string(), status);
    }
    Ok(())
}

fn prepare_config(options: &RunOptions) -> Result<Config> {
    let mut cfg = config::load(config::LoadOptions {
        config_file: options.config_file.clone(),
        env_prefix: None,
    })
    .context("load config")?;
    if let Some(source) = options.source {
        cfg.api.source = source;
    }
    if let Some(url) = &options.base_url {
        cfg.api.set_active_base_url(url.clone());
    }
    Ok(cfg)
}

fn build_services(cfg: &Config) -> Result<Services> {
    match cfg.api.source {
        Source::Board => {
            let client = api::Client::new(api::ClientConfig {
                base_url: cfg.api.base_url.clone(),
                user_agent: cfg.api.user_agent.clone(),
                timeout: cfg.api.timeout,
                http_client: None,
            })
            .context("create board client")?;
            let client = Arc::new(client);
            Ok(Services {
                feed: Arc::new(data::BoardFeedService::new(client.clone())),
                comments: Arc::new(data::BoardCommentService::new(client.clone())),
                interactions: Arc::new(data::BoardInteractionService::new(client)),
            })
        }
        Source::Store => {
            let client = store::Client::new(store::ClientConfig {
                base_url: cfg.api.store_url.clone(),
                user_agent: cfg.api.user_agent.clone(),
                timeout: cfg.api.timeout,
                http_client: None,
            })
            .context("create store client")?;
            let local = Arc::new(data::LocalCommentStore::new());
            Ok(Services {
                feed: Arc::new(data::StoreFeedService::new(Arc::new(client))),
                comments: local.clone(),
                interactions: local,
            })
        }
    }
}

fn friendly_path(path: Option<&PathBuf>) -> String {
    if let Some(path) = path {
        if let Some(home) = dirs::home_dir() {
            if let Ok(stripped) = path.strip_prefix(&home) {
                let mut display = String::from("~");
                if !stripped.as_os_str().is_empty() {
                    display.push_str(&format!("/{}", stripped.display()));
                }
                return display;
            }
        }
        path.display().to_string()
    } else {
        "~/.config/postboard/config.yaml".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn friendly_path_falls_back_to_default_location() {
        assert_eq!(friendly_path(None), "~/.config/postboard/config.yaml");
        let absolute = PathBuf::from("/definitely/not/home/config.yaml");
        assert_eq!(
            friendly_path(Some(&absolute)),
            "/definitely/not/home/config.yaml"
        );
    }

    #[test]
    fn store_source_shares_local_comments() {
        let mut cfg = Config::default();
        cfg.api.source = Source::Store;
        let services = build_services(&cfg).unwrap();
        assert!(services.interactions.submit_comment(9, "hello").is_ok());
        let comments = services.comments.load_comments(9).unwrap();
        assert_eq!(comments.len(), 1);
        assert_eq!(comments[0].text, "hello");
    }

    #[test]
    fn overrides_replace_configured_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "api:\n  source: board\n").unwrap();
        let cfg = prepare_config(&RunOptions {
            config_file: Some(path),
            source: Some(Source::Store),
            base_url: Some("http://127.0.0.1:1/".into()),
        })
        .unwrap();
        assert_eq!(cfg.api.source, Source::Store);
        assert_eq!(cfg.api.active_base_url(), "http://127.0.0.1:1/");
    }
}
