// core/src/services/http.rs

use crate::config::CheckoutConfig;
use crate::error::{CheckoutError, Result};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

/// JSON-over-HTTP client for the storefront's API routes.
#[derive(Clone, Debug)]
pub struct ApiClient {
  client: reqwest::Client,
  base_url: String,
  access_token: Option<String>,
}

impl ApiClient {
  pub fn new(config: &CheckoutConfig) -> Result<Self> {
    let client = reqwest::Client::builder()
      .timeout(config.http_timeout)
      .user_agent("promo-checkout/0.1")
      .build()?;
    Ok(Self::with_client(client, &config.api_base_url))
  }

  pub fn with_client(client: reqwest::Client, base_url: &str) -> Self {
    Self {
      client,
      base_url: base_url.trim_end_matches('/').to_string(),
      access_token: None,
    }
  }

  /// Attaches the signed-in user's bearer token to every request.
  pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
    self.access_token = Some(token.into());
    self
  }

  pub fn endpoint(&self, path: &str) -> String {
    format!("{}/{}", self.base_url, path.trim_start_matches('/'))
  }

  fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
    let builder = self.client.request(method, self.endpoint(path));
    match &self.access_token {
      Some(token) => builder.bearer_auth(token),
      None => builder,
    }
  }

  /// POSTs `body` and decodes the response, failing on any non-2xx status.
  pub async fn post_json<B, R>(&self, path: &str, body: &B) -> Result<R>
  where
    B: Serialize + ?Sized,
    R: DeserializeOwned,
  {
    let (status, text) = self.send(reqwest::Method::POST, path, Some(body)).await?;
    if !status.is_success() {
      return Err(service_error(path, status, &text));
    }
    Ok(serde_json::from_str(&text)?)
  }

  /// POSTs `body` and decodes the response whatever the status, for endpoints that describe
  /// failures in a JSON body.
  pub async fn post_json_any_status<B, R>(&self, path: &str, body: &B) -> Result<(StatusCode, R)>
  where
    B: Serialize + ?Sized,
    R: DeserializeOwned,
  {
    let (status, text) = self.send(reqwest::Method::POST, path, Some(body)).await?;
    match serde_json::from_str(&text) {
      Ok(decoded) => Ok((status, decoded)),
      Err(e) if status.is_success() => Err(e.into()),
      Err(_) => Err(service_error(path, status, &text)),
    }
  }

  pub async fn get_json<R: DeserializeOwned>(&self, path: &str) -> Result<R> {
    let (status, text) = self.send::<()>(reqwest::Method::GET, path, None).await?;
    if !status.is_success() {
      return Err(service_error(path, status, &text));
    }
    Ok(serde_json::from_str(&text)?)
  }

  async fn send<B: Serialize + ?Sized>(
    &self,
    method: reqwest::Method,
    path: &str,
    body: Option<&B>,
  ) -> Result<(StatusCode, String)> {
    let mut builder = self.request(method, path);
    if let Some(body) = body {
      builder = builder.json(body);
    }
    let response = builder.send().await?;
    let status = response.status();
    let text = response.text().await?;
    debug!(%path, %status, "API response received.");
    Ok((status, text))
  }
}

fn service_error(path: &str, status: StatusCode, body: &str) -> CheckoutError {
  warn!(%path, %status, "API call failed.");
  let detail = serde_json::from_str::<serde_json::Value>(body)
    .ok()
    .and_then(|v| {
      v.get("error")
        .or_else(|| v.get("message"))
        .and_then(|m| m.as_str())
        .map(str::to_string)
    })
    .unwrap_or_else(|| status.to_string());
  CheckoutError::Service(format!("{} failed: {}", path, detail))
}
