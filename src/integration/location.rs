//! Navigation location
//!
//! Where the controller reads the provider redirect (`code`, `state`) from.

use parking_lot::Mutex;
use reqwest::Url;

pub trait Location: Send + Sync {
    /// First value of a query parameter
    fn query_param(&self, name: &str) -> Option<String>;

    /// Strip all query parameters so a reload cannot replay the redirect
    fn clear_query(&self);
}

/// Location over a parsed URL
pub struct UrlLocation {
    url: Mutex<Url>,
}

impl UrlLocation {
    pub fn new(url: Url) -> Self {
        Self {
            url: Mutex::new(url),
        }
    }

    pub fn parse(url: &str) -> anyhow::Result<Self> {
        Ok(Self::new(Url::parse(url)?))
    }

    /// Current URL
    #[cfg(test)]
    pub fn current(&self) -> Url {
        self.url.lock().clone()
    }
}

impl Location for UrlLocation {
    fn query_param(&self, name: &str) -> Option<String> {
        self.url
            .lock()
            .query_pairs()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.into_owned())
    }

    fn clear_query(&self) {
        self.url.lock().set_query(None);
    }
}
