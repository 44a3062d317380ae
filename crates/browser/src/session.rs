//! Browser session lifecycle.
//!
//! Exactly one session exists per run. The dispatch loop owns it exclusively:
//! it is created by start_browser, passed to every operation as a capability,
//! and torn down on every exit path.

use serde_json::{json, Value};
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::{Child, Command};
use tracing::{debug, info};

use webpilot_core::config::BrowserConfig;
use webpilot_core::{Error, Result};

use crate::cdp::CdpClient;

/// A single browser instance with its Chrome process and CDP connection.
pub struct BrowserSession {
    /// Remote debugging port used to discover the page WebSocket URL.
    pub debug_port: u16,
    /// Browser child process.
    chrome_process: Child,
    /// CDP WebSocket client, connected to the page target.
    pub cdp: CdpClient,
    /// User data directory (throwaway profile for this session).
    pub user_data_dir: PathBuf,
    /// Whether this is a headed (visible) session.
    pub headed: bool,
    /// Current page URL, updated on navigation.
    pub current_url: Option<String>,
}

impl BrowserSession {
    /// Launch a browser and connect via CDP.
    pub async fn launch(config: &BrowserConfig) -> Result<Self> {
        let browser_path = find_browser_binary()
            .ok_or_else(|| Error::Cdp("Chrome/Chromium not found. Please install it.".to_string()))?;

        let user_data_dir = std::env::temp_dir().join(format!("webpilot-{}", std::process::id()));
        std::fs::create_dir_all(&user_data_dir)?;

        let debug_port = find_free_port().await?;
        let args = build_browser_args(debug_port, &user_data_dir, config);

        info!(
            port = debug_port,
            headed = config.headed,
            browser = %browser_path,
            "Launching browser"
        );

        let child = Command::new(&browser_path)
            .args(&args)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::Cdp(format!("Failed to launch browser: {}", e)))?;

        wait_for_cdp_ready(debug_port, 15).await?;
        let page_ws_url = get_page_ws_url(debug_port).await?;

        let cdp = CdpClient::connect(&page_ws_url).await?;
        cdp.enable_domain("Page").await?;
        cdp.enable_domain("Runtime").await?;
        cdp.enable_domain("DOM").await?;

        cdp.set_viewport(config.window_width, config.window_height)
            .await?;

        info!(ws_url = %page_ws_url, "CDP connection established (page target)");

        Ok(BrowserSession {
            debug_port,
            chrome_process: child,
            cdp,
            user_data_dir,
            headed: config.headed,
            current_url: None,
        })
    }

    /// Close the browser session: graceful CDP close first, then kill.
    pub async fn close(&mut self) {
        if let Err(e) = self.cdp.send_command("Browser.close", json!({})).await {
            debug!("CDP Browser.close failed (may already be closed): {}", e);
        }
        let _ = self.chrome_process.kill().await;
    }
}

impl Drop for BrowserSession {
    fn drop(&mut self) {
        // Best-effort kill on drop
        let _ = self.chrome_process.start_kill();
    }
}

/// Build Chrome command line arguments for an automation session.
fn build_browser_args(
    debug_port: u16,
    user_data_dir: &std::path::Path,
    config: &BrowserConfig,
) -> Vec<String> {
    let mut args = vec![
        format!("--remote-debugging-port={}", debug_port),
        format!("--user-data-dir={}", user_data_dir.display()),
        "--no-first-run".to_string(),
        "--no-default-browser-check".to_string(),
        "--disable-background-networking".to_string(),
        "--disable-extensions".to_string(),
        "--disable-sync".to_string(),
        "--disable-translate".to_string(),
        "--metrics-recording-only".to_string(),
        "--password-store=basic".to_string(),
    ];
    if !config.headed {
        args.push("--headless=new".to_string());
    }
    args.push(format!(
        "--window-size={},{}",
        config.window_width, config.window_height
    ));
    args.push("about:blank".to_string());
    args
}

/// Find a Chrome/Chromium binary on the system.
pub fn find_browser_binary() -> Option<String> {
    let candidates = if cfg!(target_os = "macos") {
        vec![
            "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
            "/Applications/Chromium.app/Contents/MacOS/Chromium",
            "/Applications/Brave Browser.app/Contents/MacOS/Brave Browser",
        ]
    } else if cfg!(target_os = "linux") {
        vec![
            "google-chrome",
            "google-chrome-stable",
            "chromium",
            "chromium-browser",
            "/usr/bin/google-chrome",
            "/usr/bin/chromium",
        ]
    } else {
        vec![
            r"C:\Program Files\Google\Chrome\Application\chrome.exe",
            r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe",
        ]
    };

    for candidate in candidates {
        if std::path::Path::new(candidate).exists() {
            return Some(candidate.to_string());
        }
        if !candidate.contains('/') && !candidate.contains('\\') && which::which(candidate).is_ok() {
            return Some(candidate.to_string());
        }
    }
    None
}

/// Find a free TCP port.
async fn find_free_port() -> Result<u16> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .map_err(|e| Error::Cdp(format!("Failed to bind to find free port: {}", e)))?;
    let port = listener
        .local_addr()
        .map_err(|e| Error::Cdp(format!("Failed to get local addr: {}", e)))?
        .port();
    drop(listener);
    Ok(port)
}

/// Wait for Chrome's CDP endpoint to become available.
/// Polls /json/version until it responds, up to `timeout_secs`.
async fn wait_for_cdp_ready(port: u16, timeout_secs: u64) -> Result<String> {
    let start = std::time::Instant::now();
    let timeout = std::time::Duration::from_secs(timeout_secs);
    let url = format!("http://127.0.0.1:{}/json/version", port);

    loop {
        if start.elapsed() > timeout {
            return Err(Error::Cdp(format!(
                "Chrome CDP not ready after {}s on port {}",
                timeout_secs, port
            )));
        }

        if let Ok(resp) = reqwest::get(&url).await {
            if let Ok(body) = resp.json::<Value>().await {
                if let Some(ws_url) = body.get("webSocketDebuggerUrl").and_then(|v| v.as_str()) {
                    return Ok(ws_url.to_string());
                }
            }
        }

        tokio::time::sleep(std::time::Duration::from_millis(200)).await;
    }
}

/// Connect to the first page target's WebSocket URL via /json/list.
/// Retries a few times since the page target may not appear immediately.
async fn get_page_ws_url(port: u16) -> Result<String> {
    let url = format!("http://127.0.0.1:{}/json/list", port);

    for attempt in 0..10 {
        if attempt > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(300)).await;
        }

        let resp = match reqwest::get(&url).await {
            Ok(r) => r,
            Err(_) => continue,
        };
        let targets: Vec<Value> = match resp.json().await {
            Ok(t) => t,
            Err(_) => continue,
        };

        for target in &targets {
            if target.get("type").and_then(|v| v.as_str()) == Some("page") {
                if let Some(ws_url) = target.get("webSocketDebuggerUrl").and_then(|v| v.as_str()) {
                    return Ok(ws_url.to_string());
                }
            }
        }
    }

    Err(Error::Cdp("No page target found after retries".to_string()))
}
