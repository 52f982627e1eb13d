//! Web UI Module for the Robot Agent
//!
//! - Control page with press-and-hold drive buttons
//! - JSON command / response endpoints backed by the bridge
//! - Link status via SSE
//!
//! The bridge is injected as router state; handlers never reach for a global.

use anyhow::{Context, Result};
use axum::{
    extract::State,
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    response::Html,
    routing::{get, post},
    Json, Router,
};
use futures::Stream;
use robobridge_core::{Bridge, BridgeStatus, EntryKind, ResponseEntry};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// Interval between SSE status frames
const STATUS_INTERVAL: Duration = Duration::from_secs(1);

/// Request body for `POST /api/command`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandRequest {
    /// Missing is treated like empty
    #[serde(default)]
    pub command: String,
}

/// One drained response line
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResponseItem {
    pub timestamp_ms: u64,
    pub kind: EntryKind,
    pub text: String,
    /// Display form, e.g. `Robot: ok`
    pub line: String,
}

impl From<ResponseEntry> for ResponseItem {
    fn from(entry: ResponseEntry) -> Self {
        let line = entry.line();
        Self {
            timestamp_ms: entry.timestamp_ms,
            kind: entry.kind,
            text: entry.text,
            line,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponsesBody {
    pub responses: Vec<ResponseItem>,
}

impl ResponsesBody {
    fn from_entries(entries: Vec<ResponseEntry>) -> Self {
        Self {
            responses: entries.into_iter().map(ResponseItem::from).collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

/// State shared across handlers
pub type WebState = Arc<Bridge>;

/// HTML template renderer
pub struct HtmlTemplate;

impl HtmlTemplate {
    /// Render the control page
    pub fn render(status: &BridgeStatus) -> String {
        let (class, message) = if status.connected {
            (
                "connected",
                format!("Connected to {} at {} baud", status.port, status.baud_rate),
            )
        } else {
            ("disconnected", "Disconnected".to_string())
        };

        format!(
            r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Robot Controller</title>
    <style>
        :root {{
            --ctp-base: #1E1E2E;
            --ctp-surface: #313244;
            --ctp-primary: #CBA6F7;
            --ctp-text: #CDD6F4;
            --ctp-green: #A6E3A1;
            --ctp-red: #F38BA8;
            --ctp-overlay: #45475A;
        }}
        body {{
            background-color: var(--ctp-base);
            color: var(--ctp-text);
            font-family: -apple-system, BlinkMacSystemFont, "Segoe UI", Roboto, sans-serif;
            display: flex;
            justify-content: center;
            margin: 0;
            padding: 20px;
        }}
        .container {{
            background-color: var(--ctp-surface);
            padding: 2rem;
            border-radius: 12px;
            max-width: 560px;
            width: 90%;
        }}
        h1 {{ color: var(--ctp-primary); font-size: 1.6rem; }}
        .controls {{ display: flex; gap: 1rem; margin: 1.5rem 0; }}
        .controls button {{
            flex: 1;
            padding: 1.2rem 0;
            font-size: 1.1rem;
            border: none;
            border-radius: 8px;
            background-color: var(--ctp-overlay);
            color: var(--ctp-text);
            touch-action: none;
            user-select: none;
        }}
        .controls button.active {{ background-color: var(--ctp-primary); color: var(--ctp-base); }}
        .controls button.stop {{ background-color: var(--ctp-red); color: var(--ctp-base); }}
        .status {{ padding: 0.5rem; border-radius: 8px; background-color: var(--ctp-overlay); }}
        .status.connected {{ color: var(--ctp-green); }}
        .status.disconnected {{ color: var(--ctp-red); }}
        #log {{
            height: 240px;
            overflow-y: auto;
            font-family: monospace;
            font-size: 0.85rem;
            background-color: var(--ctp-base);
            padding: 0.5rem;
            border-radius: 8px;
        }}
        #log .error {{ color: var(--ctp-red); }}
    </style>
</head>
<body>
    <div class="container">
        <h1>Robot Controller</h1>
        <div id="status" class="status {class}">{message}</div>
        <div class="controls">
            <button id="forward" data-code="f">Forward</button>
            <button id="backward" data-code="b">Backward</button>
            <button id="stop" class="stop">Stop</button>
        </div>
        <h2>Robot Responses</h2>
        <div id="log"></div>
    </div>
    <script>
        const log = document.getElementById('log');

        function append(responses) {{
            for (const r of responses) {{
                const div = document.createElement('div');
                div.textContent = r.line;
                if (r.kind === 'error') div.className = 'error';
                log.appendChild(div);
            }}
            log.scrollTop = log.scrollHeight;
        }}

        async function send(code) {{
            try {{
                const res = await fetch('/api/command', {{
                    method: 'POST',
                    headers: {{ 'Content-Type': 'application/json' }},
                    body: JSON.stringify({{ command: code }})
                }});
                append((await res.json()).responses || []);
            }} catch (e) {{
                append([{{ kind: 'error', line: 'Error: ' + e }}]);
            }}
        }}

        // Press-and-hold: press drives, release stops
        for (const id of ['forward', 'backward']) {{
            const btn = document.getElementById(id);
            let held = false;
            btn.addEventListener('pointerdown', () => {{
                if (held) return;
                held = true;
                btn.classList.add('active');
                send(btn.dataset.code);
            }});
            const release = () => {{
                if (!held) return;
                held = false;
                btn.classList.remove('active');
                send('s');
            }};
            btn.addEventListener('pointerup', release);
            btn.addEventListener('pointerleave', release);
        }}
        document.getElementById('stop').addEventListener('click', () => send('s'));

        setInterval(async () => {{
            try {{
                const res = await fetch('/api/responses');
                append((await res.json()).responses || []);
            }} catch (e) {{}}
        }}, 1000);

        const evtSource = new EventSource('/api/status');
        evtSource.onmessage = (event) => {{
            const status = JSON.parse(event.data);
            const el = document.getElementById('status');
            el.className = 'status ' + (status.connected ? 'connected' : 'disconnected');
            el.textContent = status.connected
                ? `Connected to ${{status.port}} at ${{status.baud_rate}} baud`
                : 'Disconnected';
        }};
    </script>
</body>
</html>"#,
            class = class,
            message = escape_html(&message),
        )
    }
}

/// Escape text for interpolation into HTML
fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Control page route handler
pub async fn control_page(State(bridge): State<WebState>) -> Html<String> {
    let status = bridge.status();
    Html(HtmlTemplate::render(&status))
}

/// Resolve and send an operator command, returning drained responses
pub async fn send_command(
    State(bridge): State<WebState>,
    Json(request): Json<CommandRequest>,
) -> Result<Json<ResponsesBody>, (StatusCode, Json<ErrorBody>)> {
    let code = request.command.trim();
    if code.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorBody {
                error: "Missing command".to_string(),
            }),
        ));
    }

    let entries = bridge.send_command(code).await;
    Ok(Json(ResponsesBody::from_entries(entries)))
}

/// Drain responses without sending anything
pub async fn get_responses(State(bridge): State<WebState>) -> Json<ResponsesBody> {
    Json(ResponsesBody::from_entries(bridge.responses()))
}

/// SSE status stream handler
pub async fn status_stream(
    State(bridge): State<WebState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let stream = async_stream::stream! {
        loop {
            let status = bridge.status();
            match Event::default().json_data(&status) {
                Ok(event) => yield Ok(event),
                Err(e) => warn!("Failed to encode status event: {}", e),
            }
            tokio::time::sleep(STATUS_INTERVAL).await;
        }
    };

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(30))
            .text("keepalive"),
    )
}

/// Build the router with the bridge as state
pub fn router(bridge: WebState) -> Router {
    Router::new()
        .route("/", get(control_page))
        .route("/api/command", post(send_command))
        .route("/api/responses", get(get_responses))
        .route("/api/status", get(status_stream))
        .layer(TraceLayer::new_for_http())
        .with_state(bridge)
}

/// Web server for the control page
pub struct WebServer {
    state: WebState,
}

impl WebServer {
    pub fn new(bridge: WebState) -> Self {
        Self { state: bridge }
    }

    /// Bind `addr` and serve in a background task
    ///
    /// Returns the bound address and the server task.
    pub async fn start(&self, addr: SocketAddr) -> Result<(SocketAddr, JoinHandle<Result<()>>)> {
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind web server to {}", addr))?;
        let local_addr = listener.local_addr()?;
        info!("Web server listening on http://{}", local_addr);

        let app = router(self.state.clone());
        let handle = tokio::spawn(async move {
            axum::serve(listener, app.into_make_service())
                .await
                .context("Web server failed")
        });

        Ok((local_addr, handle))
    }
}
