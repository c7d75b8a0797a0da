//! HTTP-backed environment built on `reqwest`.
//!
//! Each context owns its own client and cookie store, so sessions never leak
//! between jobs.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use browserq_job_queue::{EnvironmentError, Navigation, Page};
use tracing::debug;

use super::{EnvironmentContext, EnvironmentLauncher, ExecutionEnvironment};

pub const DEFAULT_USER_AGENT: &str = concat!("browserq/", env!("CARGO_PKG_VERSION"));
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Client settings shared by every context of one environment.
#[derive(Debug, Clone)]
pub struct HttpLauncher {
    user_agent: String,
    request_timeout: Duration,
}

impl Default for HttpLauncher {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

impl HttpLauncher {
    pub fn new() -> Self {
        Self::default()
    }

    fn build_client(&self) -> Result<reqwest::Client, EnvironmentError> {
        reqwest::Client::builder()
            .user_agent(self.user_agent.as_str())
            .timeout(self.request_timeout)
            .cookie_store(true)
            .build()
            .map_err(|e| EnvironmentError::Launch(e.to_string()))
    }
}

#[async_trait]
impl EnvironmentLauncher for HttpLauncher {
    async fn launch(&self) -> Result<Arc<dyn ExecutionEnvironment>, EnvironmentError> {
        Ok(Arc::new(HttpEnvironment::new(self.clone())?))
    }
}

#[derive(Debug)]
pub struct HttpEnvironment {
    settings: HttpLauncher,
    closed: Arc<AtomicBool>,
    contexts_opened: AtomicU64,
}

impl HttpEnvironment {
    /// Validate the settings by building one client up front.
    pub fn new(settings: HttpLauncher) -> Result<Self, EnvironmentError> {
        settings.build_client()?;
        Ok(Self {
            settings,
            closed: Arc::new(AtomicBool::new(false)),
            contexts_opened: AtomicU64::new(0),
        })
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

#[async_trait]
impl ExecutionEnvironment for HttpEnvironment {
    async fn new_context(&self) -> Result<Box<dyn EnvironmentContext>, EnvironmentError> {
        if self.is_closed() {
            return Err(EnvironmentError::Closed);
        }
        let client = self.settings.build_client()?;
        let seq = self.contexts_opened.fetch_add(1, Ordering::Relaxed) + 1;
        debug!(context = seq, "opened http context");
        Ok(Box::new(HttpContext {
            client,
            environment_closed: self.closed.clone(),
            closed: Arc::new(AtomicBool::new(false)),
        }))
    }

    async fn close(&self) -> Result<(), EnvironmentError> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}

struct HttpContext {
    client: reqwest::Client,
    environment_closed: Arc<AtomicBool>,
    closed: Arc<AtomicBool>,
}

impl HttpContext {
    fn ensure_open(&self) -> Result<(), EnvironmentError> {
        if self.closed.load(Ordering::Acquire) || self.environment_closed.load(Ordering::Acquire) {
            return Err(EnvironmentError::Closed);
        }
        Ok(())
    }
}

#[async_trait]
impl EnvironmentContext for HttpContext {
    async fn new_page(&self) -> Result<Arc<dyn Page>, EnvironmentError> {
        self.ensure_open()?;
        Ok(Arc::new(HttpPage {
            client: self.client.clone(),
            context_closed: self.closed.clone(),
            environment_closed: self.environment_closed.clone(),
            closed: AtomicBool::new(false),
            document: Mutex::new(None),
        }))
    }

    async fn close(&self) -> Result<(), EnvironmentError> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}

#[derive(Debug, Clone)]
struct Document {
    url: String,
    body: String,
}

struct HttpPage {
    client: reqwest::Client,
    context_closed: Arc<AtomicBool>,
    environment_closed: Arc<AtomicBool>,
    closed: AtomicBool,
    document: Mutex<Option<Document>>,
}

impl HttpPage {
    fn ensure_open(&self) -> Result<(), EnvironmentError> {
        if self.closed.load(Ordering::Acquire)
            || self.context_closed.load(Ordering::Acquire)
            || self.environment_closed.load(Ordering::Acquire)
        {
            return Err(EnvironmentError::Closed);
        }
        Ok(())
    }

    fn document(&self) -> std::sync::MutexGuard<'_, Option<Document>> {
        self.document.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl Page for HttpPage {
    async fn goto(&self, url: &str) -> Result<Navigation, EnvironmentError> {
        self.ensure_open()?;

        let navigation_error = |e: reqwest::Error| EnvironmentError::Navigation {
            url: url.to_owned(),
            message: e.to_string(),
        };

        let response = self.client.get(url).send().await.map_err(navigation_error)?;
        let status = response.status().as_u16();
        let final_url = response.url().to_string();
        let body = response.text().await.map_err(navigation_error)?;

        debug!(url = %final_url, status, bytes = body.len(), "navigated");
        *self.document() = Some(Document {
            url: final_url.clone(),
            body,
        });

        Ok(Navigation {
            url: final_url,
            status,
        })
    }

    async fn content(&self) -> Result<String, EnvironmentError> {
        self.ensure_open()?;
        Ok(self
            .document()
            .as_ref()
            .map(|doc| doc.body.clone())
            .unwrap_or_default())
    }

    fn url(&self) -> Option<String> {
        self.document().as_ref().map(|doc| doc.url.clone())
    }

    async fn close(&self) -> Result<(), EnvironmentError> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_new_page_starts_empty() {
        let env = HttpLauncher::new().launch().await.expect("launch");
        let ctx = env.new_context().await.expect("context");
        let page = ctx.new_page().await.expect("page");

        assert_eq!(page.url(), None);
        assert_eq!(page.content().await.expect("content"), "");
    }

    #[tokio::test]
    async fn test_invalid_url_is_a_navigation_error() {
        let env = HttpLauncher::new().launch().await.expect("launch");
        let ctx = env.new_context().await.expect("context");
        let page = ctx.new_page().await.expect("page");

        let err = page.goto("not a url").await.unwrap_err();
        assert!(matches!(err, EnvironmentError::Navigation { ref url, .. } if url == "not a url"));
    }

    #[tokio::test]
    async fn test_closed_context_rejects_pages() {
        let env = HttpLauncher::new().launch().await.expect("launch");
        let ctx = env.new_context().await.expect("context");
        let page = ctx.new_page().await.expect("page");

        ctx.close().await.expect("close");
        assert_eq!(ctx.new_page().await.err(), Some(EnvironmentError::Closed));
        assert_eq!(page.goto("http://localhost/").await.err(), Some(EnvironmentError::Closed));
    }

    #[tokio::test]
    async fn test_closed_environment_rejects_contexts() {
        let env = HttpEnvironment::new(HttpLauncher::new()).expect("env");
        let ctx = env.new_context().await.expect("context");

        env.close().await.expect("close");
        assert!(env.is_closed());
        assert!(matches!(env.new_context().await, Err(EnvironmentError::Closed)));
        assert!(matches!(ctx.new_page().await, Err(EnvironmentError::Closed)));
    }
}
