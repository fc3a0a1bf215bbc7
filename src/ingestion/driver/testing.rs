// Scripted browser doubles for driver, scraper and pipeline tests.
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;

use super::{BrowserLauncher, BrowserSession};

#[derive(Clone, Debug)]
pub(crate) struct Script {
    pub(crate) heights: Vec<u64>,
    pub(crate) marker_present: bool,
    pub(crate) hang_on_wait: bool,
    pub(crate) fail_launch: bool,
    pub(crate) fail_height: bool,
    pub(crate) html: String,
    /// URLs containing any of these never show the row marker.
    pub(crate) timeout_urls: Vec<String>,
}

impl Script {
    pub(crate) fn with_heights(heights: &[u64]) -> Self {
        Self {
            heights: heights.to_vec(),
            marker_present: true,
            hang_on_wait: false,
            fail_launch: false,
            fail_height: false,
            html: "<html><body><table></table></body></html>".to_string(),
            timeout_urls: Vec::new(),
        }
    }

    pub(crate) fn with_html(html: &str) -> Self {
        Self { html: html.to_string(), ..Self::with_heights(&[100, 100]) }
    }
}

#[derive(Clone, Default)]
pub(crate) struct Probe {
    scrolls: Arc<AtomicUsize>,
    closes: Arc<AtomicUsize>,
    visited: Arc<Mutex<Vec<String>>>,
}

impl Probe {
    pub(crate) fn scrolls(&self) -> usize { self.scrolls.load(Ordering::SeqCst) }
    pub(crate) fn closes(&self) -> usize { self.closes.load(Ordering::SeqCst) }
    pub(crate) fn visited(&self) -> Vec<String> { self.visited.lock().unwrap().clone() }
}

pub(crate) struct ScriptedLauncher {
    script: Script,
    probe: Probe,
}

impl ScriptedLauncher {
    pub(crate) fn new(script: Script) -> Self {
        Self { script, probe: Probe::default() }
    }

    pub(crate) fn probe(&self) -> Probe { self.probe.clone() }
}

#[async_trait]
impl BrowserLauncher for ScriptedLauncher {
    async fn launch(&self) -> Result<Box<dyn BrowserSession>> {
        if self.script.fail_launch {
            bail!("webdriver refused the session");
        }
        Ok(Box::new(ScriptedSession {
            script: self.script.clone(),
            heights: self.script.heights.iter().copied().collect(),
            last_height: 0,
            url: String::new(),
            probe: self.probe.clone(),
        }))
    }
}

struct ScriptedSession {
    script: Script,
    heights: VecDeque<u64>,
    last_height: u64,
    url: String,
    probe: Probe,
}

#[async_trait]
impl BrowserSession for ScriptedSession {
    async fn goto(&mut self, url: &str) -> Result<()> {
        self.url = url.to_string();
        self.probe.visited.lock().unwrap().push(url.to_string());
        Ok(())
    }

    async fn wait_for(&mut self, _css: &str, _timeout: Duration) -> Result<bool> {
        if self.script.hang_on_wait {
            std::future::pending::<()>().await;
        }
        let blocked = self.script.timeout_urls.iter().any(|u| self.url.contains(u.as_str()));
        Ok(self.script.marker_present && !blocked)
    }

    async fn scroll_to_bottom(&mut self) -> Result<()> {
        self.probe.scrolls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn document_height(&mut self) -> Result<u64> {
        if self.script.fail_height {
            bail!("javascript error: document.body is null");
        }
        if let Some(h) = self.heights.pop_front() {
            self.last_height = h;
        }
        Ok(self.last_height)
    }

    async fn page_source(&mut self) -> Result<String> {
        Ok(self.script.html.clone())
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.probe.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
