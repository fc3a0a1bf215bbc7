use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use fantoccini::error::CmdError;
use fantoccini::{Client, ClientBuilder, Locator};
use serde_json::{json, Map, Value};

use super::{BrowserLauncher, BrowserSession};

const DEFAULT_WEBDRIVER_URL: &str = "http://localhost:4444";

// Flags that keep headless Chrome stable in containers and CI runners.
const CHROME_ARGS: &[&str] = &[
    "--no-sandbox",
    "--disable-dev-shm-usage",
    "--disable-gpu",
    "start-maximized",
    "disable-infobars",
    "--disable-extensions",
];

#[derive(Clone, Debug)]
pub struct WebDriverConfig {
    pub webdriver_url: String,
    pub headless: bool,
}

impl Default for WebDriverConfig {
    fn default() -> Self {
        Self { webdriver_url: DEFAULT_WEBDRIVER_URL.to_string(), headless: true }
    }
}

impl WebDriverConfig {
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        if let Ok(url) = std::env::var("WEBDRIVER_URL") {
            cfg.webdriver_url = url;
        }
        if let Ok(v) = std::env::var("JOBS_HEADLESS") {
            cfg.headless = !matches!(v.as_str(), "0" | "false" | "FALSE" | "no" | "NO");
        }
        cfg
    }

    fn capabilities(&self) -> Map<String, Value> {
        let mut args: Vec<&str> = Vec::with_capacity(CHROME_ARGS.len() + 1);
        if self.headless { args.push("--headless"); }
        args.extend_from_slice(CHROME_ARGS);

        let mut caps = Map::new();
        caps.insert("browserName".to_string(), json!("chrome"));
        caps.insert("goog:chromeOptions".to_string(), json!({ "args": args }));
        caps
    }
}

/// Opens one chromedriver session per scrape.
pub struct WebDriverLauncher {
    cfg: WebDriverConfig,
}

impl WebDriverLauncher {
    pub fn new(cfg: WebDriverConfig) -> Self { Self { cfg } }
}

#[async_trait]
impl BrowserLauncher for WebDriverLauncher {
    async fn launch(&self) -> Result<Box<dyn BrowserSession>> {
        let mut builder = ClientBuilder::native();
        builder.capabilities(self.cfg.capabilities());
        let client = builder
            .connect(&self.cfg.webdriver_url)
            .await
            .with_context(|| format!("connect to webdriver at {}", self.cfg.webdriver_url))?;
        Ok(Box::new(WebDriverSession { client }))
    }
}

pub struct WebDriverSession {
    client: Client,
}

#[async_trait]
impl BrowserSession for WebDriverSession {
    async fn goto(&mut self, url: &str) -> Result<()> {
        self.client.goto(url).await.with_context(|| format!("navigate to {url}"))?;
        Ok(())
    }

    async fn wait_for(&mut self, css: &str, timeout: Duration) -> Result<bool> {
        match self.client.wait().at_most(timeout).for_element(Locator::Css(css)).await {
            Ok(_) => Ok(true),
            Err(CmdError::WaitTimeout) => Ok(false),
            Err(e) => Err(e).with_context(|| format!("wait for {css}")),
        }
    }

    async fn scroll_to_bottom(&mut self) -> Result<()> {
        self.client
            .execute("window.scrollTo(0, document.body.scrollHeight);", vec![])
            .await
            .context("scroll to bottom")?;
        Ok(())
    }

    async fn document_height(&mut self) -> Result<u64> {
        let v = self
            .client
            .execute("return document.body.scrollHeight", vec![])
            .await
            .context("read document height")?;
        // Some drivers report the height as a float.
        v.as_u64()
            .or_else(|| v.as_f64().map(|f| f.max(0.0) as u64))
            .with_context(|| format!("document height is not a number: {v}"))
    }

    async fn page_source(&mut self) -> Result<String> {
        self.client.source().await.context("read page source")
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.client.close().await.context("close webdriver session")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capabilities_carry_headless_flag() {
        let caps = WebDriverConfig { webdriver_url: DEFAULT_WEBDRIVER_URL.into(), headless: true }.capabilities();
        let args = caps["goog:chromeOptions"]["args"].as_array().unwrap();
        assert_eq!(args[0], "--headless");
        assert!(args.iter().any(|a| a == "--disable-dev-shm-usage"));

        let caps = WebDriverConfig { webdriver_url: DEFAULT_WEBDRIVER_URL.into(), headless: false }.capabilities();
        let args = caps["goog:chromeOptions"]["args"].as_array().unwrap();
        assert!(args.iter().all(|a| a != "--headless"));
    }
}
