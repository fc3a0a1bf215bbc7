use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

pub mod webdriver;
#[cfg(test)]
pub(crate) mod testing;

const DEFAULT_LOAD_TIMEOUT_SECS: u64 = 30;
const DEFAULT_SETTLE_MS: u64 = 2_000;
const DEFAULT_MAX_SCROLLS: usize = 200;
const DEFAULT_ROW_MARKER: &str = "tr[data-slug]";

/// One exclusive browser session. Implementations do not retry.
#[async_trait]
pub trait BrowserSession: Send {
    async fn goto(&mut self, url: &str) -> Result<()>;
    /// Ok(false) when `css` did not appear within `timeout`.
    async fn wait_for(&mut self, css: &str, timeout: Duration) -> Result<bool>;
    async fn scroll_to_bottom(&mut self) -> Result<()>;
    async fn document_height(&mut self) -> Result<u64>;
    async fn page_source(&mut self) -> Result<String>;
    async fn close(self: Box<Self>) -> Result<()>;
}

#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    async fn launch(&self) -> Result<Box<dyn BrowserSession>>;
}

#[derive(Clone, Debug)]
pub struct DriverConfig {
    pub load_timeout: Duration,
    pub settle: Duration,
    pub max_scrolls: usize,
    /// Presence of this element means the first batch of rows rendered.
    pub row_marker: String,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            load_timeout: Duration::from_secs(DEFAULT_LOAD_TIMEOUT_SECS),
            settle: Duration::from_millis(DEFAULT_SETTLE_MS),
            max_scrolls: DEFAULT_MAX_SCROLLS,
            row_marker: DEFAULT_ROW_MARKER.to_string(),
        }
    }
}

impl DriverConfig {
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        if let Ok(v) = std::env::var("JOBS_LOAD_TIMEOUT_SECS") {
            if let Ok(parsed) = v.parse::<u64>() {
                cfg.load_timeout = Duration::from_secs(parsed);
            }
        }
        if let Ok(v) = std::env::var("JOBS_SETTLE_MS") {
            if let Ok(parsed) = v.parse::<u64>() {
                cfg.settle = Duration::from_millis(parsed);
            }
        }
        if let Ok(v) = std::env::var("JOBS_MAX_SCROLLS") {
            if let Ok(parsed) = v.parse::<usize>() {
                cfg.max_scrolls = parsed.max(1);
            }
        }
        cfg
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Stage {
    Idle,
    Navigating,
    WaitingForInitialContent,
    ScrollLoop,
    Loaded,
}

impl Stage {
    pub fn name(&self) -> &'static str {
        match self {
            Stage::Idle => "idle",
            Stage::Navigating => "navigating",
            Stage::WaitingForInitialContent => "waiting_for_initial_content",
            Stage::ScrollLoop => "scroll_loop",
            Stage::Loaded => "loaded",
        }
    }
}

/// Page-level failure. Each variant aborts the scrape for that URL.
#[derive(Debug)]
pub enum LoadError {
    /// The row marker never appeared: no listings, or the page structure changed.
    Timeout { url: String, waited: Duration },
    /// Page height kept changing after the scroll budget was spent.
    LoadIncomplete { url: String, rounds: usize },
    Unexpected { url: String, stage: Stage, source: anyhow::Error },
    Cancelled { url: String, stage: Stage },
}

impl LoadError {
    pub fn kind(&self) -> &'static str {
        match self {
            LoadError::Timeout { .. } => "timeout",
            LoadError::LoadIncomplete { .. } => "load_incomplete",
            LoadError::Unexpected { .. } => "unexpected",
            LoadError::Cancelled { .. } => "cancelled",
        }
    }
}

impl std::fmt::Display for LoadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoadError::Timeout { url, waited } => {
                write!(f, "timed out after {}s waiting for listings on {url}", waited.as_secs())
            }
            LoadError::LoadIncomplete { url, rounds } => {
                write!(f, "page height still changing after {rounds} scrolls on {url}")
            }
            LoadError::Unexpected { url, stage, source } => {
                write!(f, "browser error while {} on {url}: {source:#}", stage.name())
            }
            LoadError::Cancelled { url, stage } => {
                write!(f, "cancelled while {} on {url}", stage.name())
            }
        }
    }
}

impl std::error::Error for LoadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LoadError::Unexpected { source, .. } => Some(&**source),
            _ => None,
        }
    }
}

/// Owns the session and closes it exactly once: explicitly through `release`,
/// or from `Drop` when the owning future is dropped mid-flight.
pub struct SessionGuard {
    session: Option<Box<dyn BrowserSession>>,
}

impl SessionGuard {
    pub fn new(session: Box<dyn BrowserSession>) -> Self {
        Self { session: Some(session) }
    }

    fn session_mut(&mut self) -> Result<&mut Box<dyn BrowserSession>> {
        self.session.as_mut().ok_or_else(|| anyhow::anyhow!("browser session already released"))
    }

    pub async fn release(&mut self) {
        if let Some(session) = self.session.take() {
            match session.close().await {
                Ok(()) => debug!("browser session closed"),
                Err(e) => warn!("failed to close browser session: {e:#}"),
            }
        }
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        let Some(session) = self.session.take() else { return };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(e) = session.close().await {
                        warn!("failed to close abandoned browser session: {e:#}");
                    }
                });
            }
            Err(_) => warn!("browser session dropped outside a runtime; not closed"),
        }
    }
}

/// Drives one page to its fully scrolled state.
pub struct PageDriver {
    launcher: Box<dyn BrowserLauncher>,
    cfg: DriverConfig,
}

impl PageDriver {
    pub fn new(launcher: Box<dyn BrowserLauncher>, cfg: DriverConfig) -> Self {
        Self { launcher, cfg }
    }

    /// Load `url`, scroll until the page stops growing and return the markup.
    pub async fn load(&self, url: &str, cancel: &CancellationToken) -> Result<String, LoadError> {
        let mut stage = Stage::Idle;
        let session = tokio::select! {
            res = self.launcher.launch() => res.map_err(|source| LoadError::Unexpected { url: url.to_string(), stage, source })?,
            _ = cancel.cancelled() => return Err(LoadError::Cancelled { url: url.to_string(), stage }),
        };
        let mut guard = SessionGuard::new(session);

        let outcome = tokio::select! {
            res = self.drive(&mut guard, url, &mut stage) => res,
            _ = cancel.cancelled() => Err(LoadError::Cancelled { url: url.to_string(), stage }),
        };
        guard.release().await;
        outcome
    }

    async fn drive(&self, guard: &mut SessionGuard, url: &str, stage: &mut Stage) -> Result<String, LoadError> {
        let unexpected = |stage: Stage| move |source: anyhow::Error| LoadError::Unexpected { url: url.to_string(), stage, source };
        let session = guard.session_mut().map_err(unexpected(*stage))?;

        *stage = Stage::Navigating;
        debug!(url, stage = stage.name(), "page driver");
        session.goto(url).await.map_err(unexpected(*stage))?;

        *stage = Stage::WaitingForInitialContent;
        debug!(url, stage = stage.name(), "page driver");
        let found = session
            .wait_for(&self.cfg.row_marker, self.cfg.load_timeout)
            .await
            .map_err(unexpected(*stage))?;
        if !found {
            return Err(LoadError::Timeout { url: url.to_string(), waited: self.cfg.load_timeout });
        }

        *stage = Stage::ScrollLoop;
        debug!(url, stage = stage.name(), "page driver");
        let rounds = self
            .scroll_until_stable(session.as_mut())
            .await
            .map_err(unexpected(*stage))?
            .ok_or_else(|| LoadError::LoadIncomplete { url: url.to_string(), rounds: self.cfg.max_scrolls })?;

        let html = session.page_source().await.map_err(unexpected(*stage))?;
        *stage = Stage::Loaded;
        debug!(url, rounds, bytes = html.len(), "page fully loaded");
        Ok(html)
    }

    // Number of scrolls until the height repeated, or None when the budget ran out.
    async fn scroll_until_stable(&self, session: &mut dyn BrowserSession) -> Result<Option<usize>> {
        let mut last = session.document_height().await?;
        for round in 1..=self.cfg.max_scrolls {
            session.scroll_to_bottom().await?;
            tokio::time::sleep(self.cfg.settle).await;
            let height = session.document_height().await?;
            if height == last {
                return Ok(Some(round));
            }
            debug!(round, from = last, to = height, "page grew");
            last = height;
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::testing::{Script, ScriptedLauncher};

    fn fast_cfg() -> DriverConfig {
        DriverConfig { settle: Duration::ZERO, max_scrolls: 10, ..DriverConfig::default() }
    }

    #[tokio::test]
    async fn stops_when_height_repeats() {
        let launcher = ScriptedLauncher::new(Script::with_heights(&[100, 250, 250]));
        let probe = launcher.probe();
        let driver = PageDriver::new(Box::new(launcher), fast_cfg());

        let html = driver.load("https://example.test/jobs", &CancellationToken::new()).await.unwrap();

        assert!(html.contains("<html"));
        assert_eq!(probe.scrolls(), 2);
        assert_eq!(probe.closes(), 1);
        assert_eq!(probe.visited(), vec!["https://example.test/jobs".to_string()]);
    }

    #[tokio::test]
    async fn missing_marker_is_timeout_and_releases_once() {
        let launcher = ScriptedLauncher::new(Script { marker_present: false, ..Script::with_heights(&[100]) });
        let probe = launcher.probe();
        let driver = PageDriver::new(Box::new(launcher), fast_cfg());

        let err = driver.load("https://example.test/empty", &CancellationToken::new()).await.unwrap_err();

        assert!(matches!(err, LoadError::Timeout { .. }), "got {err}");
        assert_eq!(err.kind(), "timeout");
        assert_eq!(probe.scrolls(), 0);
        assert_eq!(probe.closes(), 1);
    }

    #[tokio::test]
    async fn ever_growing_page_is_load_incomplete() {
        let heights: Vec<u64> = (1..=50).map(|i| i * 100).collect();
        let launcher = ScriptedLauncher::new(Script::with_heights(&heights));
        let probe = launcher.probe();
        let cfg = DriverConfig { max_scrolls: 5, ..fast_cfg() };
        let driver = PageDriver::new(Box::new(launcher), cfg);

        let err = driver.load("https://example.test/jitter", &CancellationToken::new()).await.unwrap_err();

        assert!(matches!(err, LoadError::LoadIncomplete { rounds: 5, .. }), "got {err}");
        assert_eq!(probe.scrolls(), 5);
        assert_eq!(probe.closes(), 1);
    }

    #[tokio::test]
    async fn browser_failure_is_unexpected_with_stage() {
        let launcher = ScriptedLauncher::new(Script { fail_height: true, ..Script::with_heights(&[100]) });
        let probe = launcher.probe();
        let driver = PageDriver::new(Box::new(launcher), fast_cfg());

        let err = driver.load("https://example.test/broken", &CancellationToken::new()).await.unwrap_err();

        match &err {
            LoadError::Unexpected { stage, .. } => assert_eq!(*stage, Stage::ScrollLoop),
            other => panic!("expected unexpected error, got {other}"),
        }
        assert_eq!(probe.closes(), 1);
    }

    #[tokio::test]
    async fn launch_failure_is_unexpected_and_nothing_to_release() {
        let launcher = ScriptedLauncher::new(Script { fail_launch: true, ..Script::with_heights(&[100]) });
        let probe = launcher.probe();
        let driver = PageDriver::new(Box::new(launcher), fast_cfg());

        let err = driver.load("https://example.test/", &CancellationToken::new()).await.unwrap_err();

        assert!(matches!(err, LoadError::Unexpected { stage: Stage::Idle, .. }), "got {err}");
        assert_eq!(probe.closes(), 0);
    }

    #[tokio::test]
    async fn cancellation_releases_session() {
        let launcher = ScriptedLauncher::new(Script { hang_on_wait: true, ..Script::with_heights(&[100]) });
        let probe = launcher.probe();
        let driver = PageDriver::new(Box::new(launcher), fast_cfg());
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });
        let err = driver.load("https://example.test/slow", &cancel).await.unwrap_err();

        assert!(matches!(err, LoadError::Cancelled { .. }), "got {err}");
        assert_eq!(probe.closes(), 1);
    }

    #[tokio::test]
    async fn dropped_load_still_releases_session() {
        let launcher = ScriptedLauncher::new(Script { hang_on_wait: true, ..Script::with_heights(&[100]) });
        let probe = launcher.probe();
        let driver = PageDriver::new(Box::new(launcher), fast_cfg());

        let task = tokio::spawn(async move {
            let _ = driver.load("https://example.test/slow", &CancellationToken::new()).await;
        });
        while probe.visited().is_empty() {
            tokio::task::yield_now().await;
        }
        task.abort();
        let _ = task.await;
        for _ in 0..100 {
            if probe.closes() == 1 { break; }
            tokio::task::yield_now().await;
        }
        assert_eq!(probe.closes(), 1);
    }
}
