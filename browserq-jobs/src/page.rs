//! Page-driven job implementations.

use browserq_job_queue::{async_trait, EnvironmentError, JobError, JobExecutor, Navigation, Page};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use tracing::{info, warn};

/// Matches the first `<title>` element of an HTML document.
static TITLE_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<title[^>]*>(.*?)</title>").expect("valid title regex"));

/// Navigate and turn unreachable URLs or error statuses into job-level failures.
///
/// Anything else the page reports (closed context, broken session) is left as
/// an environment error so the worker stops.
async fn navigate(page: &dyn Page, url: &str) -> Result<Navigation, JobError> {
    match page.goto(url).await {
        Ok(nav) if nav.is_success() => Ok(nav),
        Ok(nav) => Err(JobError::failed(format!(
            "{} responded with status {}",
            nav.url, nav.status
        ))),
        Err(EnvironmentError::Navigation { url, message }) => {
            warn!(%url, %message, "navigation failed");
            Err(JobError::failed(format!("navigation to {url} failed: {message}")))
        }
        Err(other) => Err(other.into()),
    }
}

/// Input for `page.fetch` jobs.
///
/// Loads `url` and returns the document body.
#[derive(Debug, Deserialize)]
pub struct FetchJob {
    pub url: String,
}

#[async_trait]
impl JobExecutor for FetchJob {
    async fn execute(&self, page: &dyn Page) -> Result<Option<Vec<u8>>, JobError> {
        let nav = navigate(page, &self.url).await?;
        let body = page.content().await?;
        info!(url = %nav.url, status = nav.status, bytes = body.len(), "fetched page");
        Ok(Some(body.into_bytes()))
    }
}

/// Input for `page.title` jobs.
#[derive(Debug, Deserialize)]
pub struct TitleJob {
    pub url: String,
}

#[async_trait]
impl JobExecutor for TitleJob {
    async fn execute(&self, page: &dyn Page) -> Result<Option<Vec<u8>>, JobError> {
        navigate(page, &self.url).await?;
        let body = page.content().await?;
        let title = extract_title(&body)
            .ok_or_else(|| JobError::failed(format!("{} has no <title>", self.url)))?;
        info!(url = %self.url, %title, "read page title");
        Ok(Some(title.into_bytes()))
    }
}

/// Text of the first `<title>` element with whitespace collapsed.
pub fn extract_title(html: &str) -> Option<String> {
    let raw = TITLE_REGEX.captures(html)?.get(1)?.as_str();
    let title = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    (!title.is_empty()).then_some(title)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Serves canned responses keyed by URL.
    struct StaticPage {
        routes: Vec<(&'static str, u16, &'static str)>,
        current: Mutex<Option<(String, String)>>,
        closed: bool,
    }

    impl StaticPage {
        fn new(routes: Vec<(&'static str, u16, &'static str)>) -> Self {
            Self {
                routes,
                current: Mutex::new(None),
                closed: false,
            }
        }
    }

    #[async_trait]
    impl Page for StaticPage {
        async fn goto(&self, url: &str) -> Result<Navigation, EnvironmentError> {
            if self.closed {
                return Err(EnvironmentError::Closed);
            }
            let Some((_, status, body)) = self.routes.iter().find(|(u, _, _)| *u == url) else {
                return Err(EnvironmentError::Navigation {
                    url: url.to_owned(),
                    message: "connection refused".into(),
                });
            };
            *self.current.lock().unwrap() = Some((url.to_owned(), (*body).to_owned()));
            Ok(Navigation {
                url: url.to_owned(),
                status: *status,
            })
        }

        async fn content(&self) -> Result<String, EnvironmentError> {
            Ok(self
                .current
                .lock()
                .unwrap()
                .as_ref()
                .map(|(_, body)| body.clone())
                .unwrap_or_default())
        }

        fn url(&self) -> Option<String> {
            self.current.lock().unwrap().as_ref().map(|(u, _)| u.clone())
        }

        async fn close(&self) -> Result<(), EnvironmentError> {
            Ok(())
        }
    }

    #[test]
    fn test_extract_title() {
        assert_eq!(
            extract_title("<html><head><TITLE>\n  Hello\n  World </TITLE></head></html>"),
            Some("Hello World".to_string())
        );
        assert_eq!(extract_title("<title lang=\"en\">Docs</title>"), Some("Docs".into()));
        assert_eq!(extract_title("<title>   </title>"), None);
        assert_eq!(extract_title("<p>no title</p>"), None);
    }

    #[tokio::test]
    async fn test_fetch_job_returns_body() {
        let page = StaticPage::new(vec![("https://example.com/", 200, "<p>hi</p>")]);
        let job = FetchJob {
            url: "https://example.com/".into(),
        };

        let output = job.execute(&page).await.expect("fetch");
        assert_eq!(output.as_deref(), Some(&b"<p>hi</p>"[..]));
        assert_eq!(page.url().as_deref(), Some("https://example.com/"));
    }

    #[tokio::test]
    async fn test_title_job_reads_title() {
        let page = StaticPage::new(vec![(
            "https://example.com/",
            200,
            "<html><title>Example Domain</title></html>",
        )]);
        let job = TitleJob {
            url: "https://example.com/".into(),
        };

        let output = job.execute(&page).await.expect("title");
        assert_eq!(output, Some(b"Example Domain".to_vec()));
    }

    #[tokio::test]
    async fn test_error_status_is_a_job_failure() {
        let page = StaticPage::new(vec![("https://example.com/missing", 404, "nope")]);
        let job = FetchJob {
            url: "https://example.com/missing".into(),
        };

        let err = job.execute(&page).await.unwrap_err();
        assert!(matches!(err, JobError::ExecutionFailed(_)));
    }

    #[tokio::test]
    async fn test_unreachable_url_is_a_job_failure() {
        let page = StaticPage::new(vec![]);
        let job = TitleJob {
            url: "https://unreachable.invalid/".into(),
        };

        let err = job.execute(&page).await.unwrap_err();
        assert!(!err.is_environment_fault());
    }

    #[tokio::test]
    async fn test_closed_page_is_an_environment_fault() {
        let mut page = StaticPage::new(vec![("https://example.com/", 200, "ok")]);
        page.closed = true;
        let job = FetchJob {
            url: "https://example.com/".into(),
        };

        let err = job.execute(&page).await.unwrap_err();
        assert!(err.is_environment_fault());
    }
}
