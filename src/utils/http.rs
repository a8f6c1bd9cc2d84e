// src/utils/http.rs

//! HTTP client utilities.
//!
//! [`ReqwestSiteClient`] is a reference [`SiteHttpClient`] for hosts that do
//! not bring their own. It reuses an existing session cookie if one is
//! supplied and never logs in.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::COOKIE;
use url::Url;

use crate::client::{FetchRequest, HttpMethod, SiteHttpClient};
use crate::error::{AppError, Result};
use crate::models::{HttpConfig, IntelSiteProfile};

/// Create a configured asynchronous HTTP client.
pub fn create_async_client(config: &HttpConfig) -> Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .user_agent(&config.user_agent)
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()?;
    Ok(client)
}

/// Site client backed by `reqwest`, resolving relative paths against a base URL.
#[derive(Clone)]
pub struct ReqwestSiteClient {
    site: String,
    base: Url,
    client: reqwest::Client,
    cookie: Option<String>,
}

impl ReqwestSiteClient {
    pub fn new(site: impl Into<String>, base_url: &str, config: &HttpConfig) -> Result<Self> {
        let mut base = Url::parse(base_url)?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        Ok(Self {
            site: site.into(),
            base,
            client: create_async_client(config)?,
            cookie: None,
        })
    }

    /// Build a client for a profile that declares a `base_url`.
    pub fn for_profile(profile: &IntelSiteProfile, config: &HttpConfig) -> Result<Option<Self>> {
        profile
            .base_url
            .as_deref()
            .map(|base_url| Self::new(&profile.site, base_url, config))
            .transpose()
    }

    /// Send an existing session cookie with every request.
    pub fn with_cookie(mut self, cookie: impl Into<String>) -> Self {
        self.cookie = Some(cookie.into());
        self
    }

    /// Absolute URL of a page path.
    pub fn url_for(&self, path_or_url: &str) -> Result<Url> {
        Ok(self.base.join(path_or_url)?)
    }
}

#[async_trait]
impl SiteHttpClient for ReqwestSiteClient {
    async fn fetch(&self, path_or_url: &str, request: &FetchRequest) -> Result<String> {
        let url = self.url_for(path_or_url)?;
        log::debug!("[{}] {:?} {}", self.site, request.method, url);

        let mut builder = match request.method {
            HttpMethod::Get => self.client.get(url),
            HttpMethod::Post => self.client.post(url),
        };
        if !request.params.is_empty() {
            builder = builder.query(&request.params);
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }
        if let Some(cookie) = &self.cookie {
            builder = builder.header(COOKIE, cookie);
        }

        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(AppError::fetch(
                &self.site,
                format!("{} returned {}", path_or_url, status),
            ));
        }
        Ok(response.text().await?)
    }
}
