//! HTTP client boundary.
//!
//! The engine never builds HTTP clients. Whoever hosts it registers one
//! [`SiteHttpClient`] per site key in a [`HttpClientRegistry`]; watchers and
//! the indexer look the client up and skip the site when none is registered.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;

use crate::error::Result;
use crate::models::IntelSiteProfile;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
}

/// Request options passed alongside a path or URL.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FetchRequest {
    pub method: HttpMethod,
    pub params: Vec<(String, String)>,
    pub body: Option<String>,
}

impl FetchRequest {
    pub fn get() -> Self {
        Self::default()
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((key.into(), value.into()));
        self
    }
}

/// Read access to one site, supplied by the host application.
#[async_trait]
pub trait SiteHttpClient: Send + Sync {
    /// Fetch a page and return its HTML.
    async fn fetch(&self, path_or_url: &str, request: &FetchRequest) -> Result<String>;

    /// Fetch the site's HR listing.
    async fn fetch_hr_page(&self, profile: &IntelSiteProfile) -> Result<String> {
        self.fetch(&profile.hr.page_path, &FetchRequest::get()).await
    }

    /// Fetch one page of the private-message inbox (1-based).
    async fn fetch_inbox_page(&self, profile: &IntelSiteProfile, page: u32) -> Result<String> {
        let request = if page > 1 {
            FetchRequest::get().with_param("page", page.to_string())
        } else {
            FetchRequest::get()
        };
        self.fetch(&profile.inbox.page_path, &request).await
    }
}

/// Site key to client lookup.
#[derive(Default)]
pub struct HttpClientRegistry {
    clients: RwLock<HashMap<String, Arc<dyn SiteHttpClient>>>,
}

impl HttpClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, site: impl Into<String>, client: Arc<dyn SiteHttpClient>) {
        let mut clients = self.clients.write().unwrap_or_else(PoisonError::into_inner);
        clients.insert(site.into(), client);
    }

    pub fn unregister(&self, site: &str) -> Option<Arc<dyn SiteHttpClient>> {
        let mut clients = self.clients.write().unwrap_or_else(PoisonError::into_inner);
        clients.remove(site)
    }

    pub fn get(&self, site: &str) -> Option<Arc<dyn SiteHttpClient>> {
        let clients = self.clients.read().unwrap_or_else(PoisonError::into_inner);
        clients.get(site).cloned()
    }

    pub fn sites(&self) -> Vec<String> {
        let clients = self.clients.read().unwrap_or_else(PoisonError::into_inner);
        let mut sites: Vec<String> = clients.keys().cloned().collect();
        sites.sort();
        sites
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::{HashMap, HashSet};
    use std::sync::Mutex;

    use super::*;
    use crate::error::AppError;

    /// Serves canned HTML by path; unknown or failing paths return a fetch error.
    #[derive(Default)]
    pub struct StaticSiteClient {
        pages: Mutex<HashMap<String, String>>,
        failing: HashSet<String>,
        calls: Mutex<Vec<String>>,
    }

    impl StaticSiteClient {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn page(self, path: &str, html: impl Into<String>) -> Self {
            self.set_page(path, html);
            self
        }

        pub fn failing(mut self, path: &str) -> Self {
            self.failing.insert(path.to_string());
            self
        }

        /// Replace a page between polls.
        pub fn set_page(&self, path: &str, html: impl Into<String>) {
            self.pages
                .lock()
                .unwrap()
                .insert(path.to_string(), html.into());
        }

        pub fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn key(path: &str, request: &FetchRequest) -> String {
            if request.params.is_empty() {
                return path.to_string();
            }
            let query: Vec<String> = request
                .params
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect();
            format!("{}?{}", path, query.join("&"))
        }
    }

    #[async_trait]
    impl SiteHttpClient for StaticSiteClient {
        async fn fetch(&self, path_or_url: &str, request: &FetchRequest) -> Result<String> {
            let key = Self::key(path_or_url, request);
            self.calls.lock().unwrap().push(key.clone());
            if self.failing.contains(&key) {
                return Err(AppError::fetch("static", format!("{key} unavailable")));
            }
            self.pages
                .lock()
                .unwrap()
                .get(&key)
                .cloned()
                .ok_or_else(|| AppError::fetch("static", format!("no page for {key}")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::StaticSiteClient;
    use super::*;

    #[test]
    fn test_registry_register_and_lookup() {
        let registry = HttpClientRegistry::new();
        assert!(registry.get("hdsky").is_none());

        registry.register("hdsky", Arc::new(StaticSiteClient::new()));
        assert!(registry.get("hdsky").is_some());
        assert_eq!(registry.sites(), vec!["hdsky".to_string()]);

        assert!(registry.unregister("hdsky").is_some());
        assert!(registry.get("hdsky").is_none());
    }

    #[tokio::test]
    async fn test_default_page_helpers_use_profile_paths() {
        let client = StaticSiteClient::new()
            .page("hr.php", "<hr/>")
            .page("messages.php", "<p1/>")
            .page("messages.php?page=2", "<p2/>");
        let profile = IntelSiteProfile::new("s");

        assert_eq!(client.fetch_hr_page(&profile).await.unwrap(), "<hr/>");
        assert_eq!(client.fetch_inbox_page(&profile, 1).await.unwrap(), "<p1/>");
        assert_eq!(client.fetch_inbox_page(&profile, 2).await.unwrap(), "<p2/>");
        assert_eq!(
            client.calls(),
            vec!["hr.php", "messages.php", "messages.php?page=2"]
        );
    }
}
