//! Registry readiness.
//!
//! Function images are pushed to a local registry, so a deploy waits for its `/v2/` endpoint
//! before generating or prewarming anything. Any HTTP answer below 500 counts as ready: an
//! unauthenticated registry replies 401 but is up.

use std::net::IpAddr;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};
use thiserror::Error;
use tokio::time::{Instant, sleep};
use tracing::debug;

#[derive(Debug, Error)]
pub enum WaitError {
  #[error("registry not responding at {url}")]
  NotResponding { url: String },

  #[error("build registry client: {0}")]
  Client(#[from] reqwest::Error),
}

/// Blocks until a registry answers or a deadline passes.
#[async_trait]
pub trait RegistryWaiter: Send + Sync {
  async fn wait(&self, address: &str, timeout: Duration) -> Result<(), WaitError>;
}

fn host_of(authority: &str) -> &str {
  if let Some(rest) = authority.strip_prefix('[') {
    return rest.split(']').next().unwrap_or(rest);
  }
  match authority.rsplit_once(':') {
    Some((host, port)) if !host.contains(':') && port.chars().all(|c| c.is_ascii_digit()) => host,
    _ => authority,
  }
}

/// Whether the registry host is on this machine or the compose network.
pub fn is_local_host(authority: &str) -> bool {
  let host = host_of(authority.trim()).to_ascii_lowercase();
  matches!(host.as_str(), "localhost" | "127.0.0.1" | "registry" | "host.docker.internal")
    || host.parse::<IpAddr>().map(|ip| ip.is_loopback()).unwrap_or(false)
}

/// URLs probed for `address`, in order.
///
/// An address with a scheme is probed as given. Otherwise both schemes are tried, plain http
/// first for local hosts.
pub fn probe_urls(address: &str) -> Vec<String> {
  let trimmed = address.trim();
  if trimmed.is_empty() {
    return Vec::new();
  }
  if trimmed.contains("://") {
    return match Url::parse(trimmed) {
      Ok(mut url) => {
        url.set_path("/v2/");
        url.set_query(None);
        url.set_fragment(None);
        vec![url.to_string()]
      }
      Err(_) => vec![format!("{}/v2/", trimmed.trim_end_matches('/'))],
    };
  }

  let authority = trimmed.split('/').next().unwrap_or(trimmed);
  let schemes = if is_local_host(authority) {
    ["http", "https"]
  } else {
    ["https", "http"]
  };
  schemes
    .iter()
    .map(|scheme| format!("{}://{}/v2/", scheme, authority))
    .collect()
}

/// [`RegistryWaiter`] polling the registry over HTTP.
#[derive(Debug, Clone)]
pub struct HttpRegistryWaiter {
  poll_interval: Duration,
  request_timeout: Duration,
}

impl Default for HttpRegistryWaiter {
  fn default() -> Self {
    Self {
      poll_interval: Duration::from_secs(1),
      request_timeout: Duration::from_secs(2),
    }
  }
}

impl HttpRegistryWaiter {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with_poll_interval(mut self, interval: Duration) -> Self {
    self.poll_interval = interval;
    self
  }

  fn client(&self, url: &str) -> Result<Client, WaitError> {
    let local = Url::parse(url)
      .ok()
      .and_then(|u| u.host_str().map(is_local_host))
      .unwrap_or(false);
    let mut builder = Client::builder().timeout(self.request_timeout);
    if local {
      builder = builder.no_proxy();
    }
    Ok(builder.build()?)
  }
}

#[async_trait]
impl RegistryWaiter for HttpRegistryWaiter {
  async fn wait(&self, address: &str, timeout: Duration) -> Result<(), WaitError> {
    let urls = probe_urls(address);
    let Some(first) = urls.first().cloned() else {
      return Ok(());
    };
    let clients = urls
      .iter()
      .map(|url| Ok((url.as_str(), self.client(url)?)))
      .collect::<Result<Vec<_>, WaitError>>()?;

    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
      for (url, client) in &clients {
        match client.get(*url).send().await {
          Ok(response) if response.status().as_u16() < 500 => {
            debug!(url = %url, status = %response.status(), "registry is ready");
            return Ok(());
          }
          Ok(response) => debug!(url = %url, status = %response.status(), "registry not ready"),
          Err(e) => debug!(url = %url, error = %e, "registry probe failed"),
        }
      }
      sleep(self.poll_interval).await;
    }
    Err(WaitError::NotResponding { url: first })
  }
}
