//! # Callback URLs
//!
//! Builds the success/failure URLs providers redirect donors back to.
//! The site base URL comes from the environment with a localhost
//! default, so mock mode works with nothing set. Individual adapters
//! may override the composed URLs via their own env variables.

/// Site-relative callback URL configuration
#[derive(Debug, Clone)]
pub struct CallbackUrls {
    /// Base URL of the donation site (e.g. "https://sahayog.org.np")
    pub base_url: String,
    /// Success page path
    pub success_path: String,
    /// Failure/cancel page path
    pub failure_path: String,
}

impl CallbackUrls {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base = base_url.into();
        Self {
            base_url: base.trim_end_matches('/').to_string(),
            success_path: "/donate/success".to_string(),
            failure_path: "/donate/failure".to_string(),
        }
    }

    /// Read `SITE_BASE_URL`, defaulting to localhost for development
    /// and mock runs.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        let base =
            std::env::var("SITE_BASE_URL").unwrap_or_else(|_| "http://localhost:3000".to_string());
        Self::new(base)
    }

    /// Builder: set success path
    pub fn with_success_path(mut self, path: impl Into<String>) -> Self {
        self.success_path = path.into();
        self
    }

    /// Builder: set failure path
    pub fn with_failure_path(mut self, path: impl Into<String>) -> Self {
        self.failure_path = path.into();
        self
    }

    pub fn success_url(&self) -> String {
        format!("{}{}", self.base_url, self.success_path)
    }

    pub fn failure_url(&self) -> String {
        format!("{}{}", self.base_url, self.failure_path)
    }

    /// Success URL with a reference query parameter appended, keeping
    /// any query string already present.
    pub fn success_url_with(&self, key: &str, value: &str) -> String {
        append_query(&self.success_url(), key, value)
    }

    /// Failure URL with a reference query parameter appended.
    pub fn failure_url_with(&self, key: &str, value: &str) -> String {
        append_query(&self.failure_url(), key, value)
    }
}

impl Default for CallbackUrls {
    fn default() -> Self {
        Self::new("http://localhost:3000")
    }
}

fn append_query(url: &str, key: &str, value: &str) -> String {
    if url.contains('?') {
        format!("{url}&{key}={value}")
    } else {
        format!("{url}?{key}={value}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_urls_compose() {
        let urls = CallbackUrls::new("https://sahayog.org.np/");
        assert_eq!(urls.success_url(), "https://sahayog.org.np/donate/success");
        assert_eq!(urls.failure_url(), "https://sahayog.org.np/donate/failure");
    }

    #[test]
    fn test_query_append() {
        let urls = CallbackUrls::new("https://sahayog.org.np")
            .with_success_path("/donate/thanks?lang=np");
        assert_eq!(
            urls.success_url_with("pidx", "abc123"),
            "https://sahayog.org.np/donate/thanks?lang=np&pidx=abc123"
        );
        assert_eq!(
            urls.failure_url_with("refId", "r1"),
            "https://sahayog.org.np/donate/failure?refId=r1"
        );
    }

    #[test]
    fn test_default_is_localhost() {
        assert_eq!(
            CallbackUrls::default().success_url(),
            "http://localhost:3000/donate/success"
        );
    }
}
