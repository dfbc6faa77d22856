//! Playwright browser automation over a JSON-lines bridge.
//!
//! A small Node.js driver is run with `node -e` from the site's project directory,
//! so it picks up the project's own Playwright install. The driver launches
//! headless Chromium with a single context, then answers one JSON request per line
//! on stdin with one JSON response per line on stdout:
//!
//! ```text
//! -> {"id":3,"method":"goto","params":{"page":1,"url":"http://localhost:4173/#/"}}
//! <- {"id":3,"ok":true,"result":null}
//! ```
//!
//! Request `0` is implicit: the driver answers it once the browser is up.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::oneshot;

use crate::browser::{Browser, BrowserError, Page};

const DRIVER_SCRIPT: &str = r#"
const readline = require('readline');

const send = (msg) => process.stdout.write(JSON.stringify(msg) + '\n');
const headless = process.env.SITEBAKE_HEADLESS !== '0';
const navigationTimeout = Number(process.env.SITEBAKE_NAVIGATION_TIMEOUT_MS || 30000);

function loadChromium() {
  for (const name of ['playwright', '@playwright/test']) {
    try {
      return require(name).chromium;
    } catch (e) {}
  }
  throw new Error('Playwright not found. Install with: npm install -D @playwright/test && npx playwright install chromium');
}

(async () => {
  let browser, context;
  const pages = new Map();
  let nextPage = 1;

  try {
    browser = await loadChromium().launch({ headless });
    context = await browser.newContext();
  } catch (error) {
    send({ id: 0, ok: false, error: error.message });
    process.exit(1);
  }
  send({ id: 0, ok: true, result: null });

  const page = (id) => {
    const found = pages.get(id);
    if (!found) throw new Error(`unknown page ${id}`);
    return found;
  };

  const handlers = {
    async newPage() {
      const created = await context.newPage();
      created.setDefaultNavigationTimeout(navigationTimeout);
      const id = nextPage++;
      pages.set(id, created);
      return id;
    },
    async goto({ page: id, url }) {
      await page(id).goto(url, { waitUntil: 'networkidle' });
      return null;
    },
    async waitForEvent({ page: id, name }) {
      await page(id).evaluate((name) => new Promise((resolve) => {
        document.addEventListener(name, () => resolve(), { once: true });
      }), name);
      return null;
    },
    async content({ page: id }) {
      return await page(id).content();
    },
    async close() {
      await browser.close();
      return null;
    },
  };

  const rl = readline.createInterface({ input: process.stdin });
  rl.on('line', async (line) => {
    let request;
    try {
      request = JSON.parse(line);
    } catch (e) {
      return;
    }
    try {
      const handler = handlers[request.method];
      if (!handler) throw new Error(`unknown method ${request.method}`);
      const result = await handler(request.params || {});
      send({ id: request.id, ok: true, result });
    } catch (error) {
      send({ id: request.id, ok: false, error: error.message });
    }
    if (request.method === 'close') process.exit(0);
  });
  rl.on('close', async () => {
    await browser.close().catch(() => {});
    process.exit(0);
  });
})();
"#;

/// Configuration for the Playwright bridge.
#[derive(Debug, Clone)]
pub struct PlaywrightConfig {
    /// Node.js executable
    pub node: PathBuf,

    /// Directory whose `node_modules` provides Playwright
    pub project_dir: PathBuf,

    /// Run Chromium headless
    pub headless: bool,

    /// Per-navigation timeout inside the browser
    pub navigation_timeout: Duration,

    /// How long `close` waits for the driver to exit before killing it
    pub shutdown_grace: Duration,
}

impl Default for PlaywrightConfig {
    fn default() -> Self {
        Self {
            node: PathBuf::from("node"),
            project_dir: PathBuf::from("."),
            headless: true,
            navigation_timeout: Duration::from_secs(30),
            shutdown_grace: Duration::from_secs(5),
        }
    }
}

#[derive(Serialize)]
struct Request<'a> {
    id: u64,
    method: &'a str,
    params: Value,
}

#[derive(Deserialize)]
struct Response {
    id: u64,
    ok: bool,
    #[serde(default)]
    result: Value,
    #[serde(default)]
    error: Option<String>,
}

type Reply = Result<Value, String>;

/// Request/response multiplexing over the driver's stdio.
struct Connection {
    writer: tokio::sync::Mutex<Box<dyn AsyncWrite + Send + Unpin>>,
    pending: Mutex<HashMap<u64, oneshot::Sender<Reply>>>,
    next_id: AtomicU64,
    closed: AtomicBool,
}

/// Removes a pending call if its caller stops waiting.
struct PendingGuard<'a> {
    conn: &'a Connection,
    id: u64,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.conn.pending_calls().remove(&self.id);
    }
}

impl Connection {
    /// Create a connection writing requests to `writer`. Request ids start at `first_id`.
    fn new<W>(writer: W, first_id: u64) -> Arc<Self>
    where
        W: AsyncWrite + Send + Unpin + 'static,
    {
        Arc::new(Self {
            writer: tokio::sync::Mutex::new(Box::new(writer)),
            pending: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(first_id),
            closed: AtomicBool::new(false),
        })
    }

    /// Route responses read from `reader` until it closes.
    fn listen<R>(conn: &Arc<Self>, reader: R)
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        let reader_conn = Arc::clone(conn);
        tokio::spawn(async move {
            let mut lines = BufReader::new(reader).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => reader_conn.dispatch(&line),
                    Ok(None) => break,
                    Err(e) => {
                        tracing::warn!("Browser bridge read error: {}", e);
                        break;
                    }
                }
            }
            reader_conn.shutdown();
        });
    }

    fn pending_calls(&self) -> std::sync::MutexGuard<'_, HashMap<u64, oneshot::Sender<Reply>>> {
        self.pending.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Register interest in the response with id `id`.
    fn register(&self, id: u64) -> oneshot::Receiver<Reply> {
        let (tx, rx) = oneshot::channel();
        self.pending_calls().insert(id, tx);
        rx
    }

    fn dispatch(&self, line: &str) {
        let response: Response = match serde_json::from_str(line) {
            Ok(response) => response,
            Err(_) => {
                tracing::debug!("browser: {}", line);
                return;
            }
        };

        let Some(tx) = self.pending_calls().remove(&response.id) else {
            tracing::debug!("Dropping reply to abandoned request {}", response.id);
            return;
        };

        let reply = if response.ok {
            Ok(response.result)
        } else {
            Err(response.error.unwrap_or_else(|| "unknown error".to_string()))
        };
        let _ = tx.send(reply);
    }

    /// Fail every outstanding call and refuse new ones.
    fn shutdown(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.pending_calls().clear();
    }

    /// Wait for an already registered response.
    async fn wait(rx: oneshot::Receiver<Reply>) -> Result<Value, BrowserError> {
        match rx.await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(message)) => Err(BrowserError::Script(message)),
            Err(_) => Err(BrowserError::Closed),
        }
    }

    async fn call(&self, method: &str, params: Value) -> Result<Value, BrowserError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let rx = self.register(id);
        let _guard = PendingGuard { conn: self, id };

        if self.closed.load(Ordering::SeqCst) {
            return Err(BrowserError::Closed);
        }

        let mut line = serde_json::to_string(&Request { id, method, params })
            .map_err(|e| BrowserError::Protocol(e.to_string()))?;
        line.push('\n');

        {
            let mut writer = self.writer.lock().await;
            writer.write_all(line.as_bytes()).await.map_err(closed_on_pipe)?;
            writer.flush().await.map_err(closed_on_pipe)?;
        }

        Self::wait(rx).await
    }
}

fn closed_on_pipe(e: std::io::Error) -> BrowserError {
    if e.kind() == std::io::ErrorKind::BrokenPipe {
        BrowserError::Closed
    } else {
        BrowserError::Io(e)
    }
}

/// Headless Chromium driven through Playwright.
pub struct PlaywrightBrowser {
    child: Child,
    conn: Arc<Connection>,
    shutdown_grace: Duration,
}

impl PlaywrightBrowser {
    /// Start the driver and wait until the browser is up.
    pub async fn launch(config: PlaywrightConfig) -> Result<Self, BrowserError> {
        tracing::info!("Launching headless Chromium via Playwright");

        let mut child = Command::new(&config.node)
            .arg("-e")
            .arg(DRIVER_SCRIPT)
            .current_dir(&config.project_dir)
            .env("SITEBAKE_HEADLESS", if config.headless { "1" } else { "0" })
            .env(
                "SITEBAKE_NAVIGATION_TIMEOUT_MS",
                config.navigation_timeout.as_millis().to_string(),
            )
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                BrowserError::Launch(format!("Failed to spawn {}: {}", config.node.display(), e))
            })?;

        let (Some(stdin), Some(stdout)) = (child.stdin.take(), child.stdout.take()) else {
            return Err(BrowserError::Launch("driver stdio not captured".to_string()));
        };

        let conn = Connection::new(stdin, 1);
        let launched = conn.register(0);
        Connection::listen(&conn, stdout);

        match Connection::wait(launched).await {
            Ok(_) => {}
            Err(BrowserError::Script(message)) => return Err(BrowserError::Launch(message)),
            Err(BrowserError::Closed) => {
                return Err(BrowserError::Launch(
                    "Playwright driver exited during startup".to_string(),
                ))
            }
            Err(e) => return Err(e),
        }

        Ok(Self {
            child,
            conn,
            shutdown_grace: config.shutdown_grace,
        })
    }
}

#[async_trait]
impl Browser for PlaywrightBrowser {
    type Page = PlaywrightPage;

    async fn new_page(&mut self) -> Result<PlaywrightPage, BrowserError> {
        let id = self.conn.call("newPage", json!({})).await?;
        let id = id
            .as_u64()
            .ok_or_else(|| BrowserError::Protocol(format!("invalid page id {}", id)))?;

        Ok(PlaywrightPage {
            conn: Arc::clone(&self.conn),
            id,
        })
    }

    async fn close(mut self) -> Result<(), BrowserError> {
        match self.conn.call("close", json!({})).await {
            Ok(_) | Err(BrowserError::Closed) => {}
            Err(e) => tracing::warn!("Browser close failed: {}", e),
        }

        match tokio::time::timeout(self.shutdown_grace, self.child.wait()).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(BrowserError::Io(e)),
            Err(_) => {
                tracing::warn!("Playwright driver did not exit, killing it");
                self.child.kill().await?;
                Ok(())
            }
        }
    }
}

/// A page in a [`PlaywrightBrowser`].
pub struct PlaywrightPage {
    conn: Arc<Connection>,
    id: u64,
}

#[async_trait]
impl Page for PlaywrightPage {
    async fn goto(&mut self, url: &str) -> Result<(), BrowserError> {
        match self
            .conn
            .call("goto", json!({ "page": self.id, "url": url }))
            .await
        {
            Ok(_) => Ok(()),
            Err(BrowserError::Script(reason)) => Err(BrowserError::Navigation {
                url: url.to_string(),
                reason,
            }),
            Err(e) => Err(e),
        }
    }

    async fn wait_for_event(&mut self, name: &str) -> Result<(), BrowserError> {
        self.conn
            .call("waitForEvent", json!({ "page": self.id, "name": name }))
            .await?;
        Ok(())
    }

    async fn content(&mut self) -> Result<String, BrowserError> {
        match self.conn.call("content", json!({ "page": self.id })).await? {
            Value::String(html) => Ok(html),
            other => Err(BrowserError::Protocol(format!(
                "expected markup, got {}",
                other
            ))),
        }
    }
}
