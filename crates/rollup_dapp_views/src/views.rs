//! Home and hello views.

use rollup_dapp::chain::{format_chain_id, ChainId};
use rollup_dapp::{NoticeKeys, PollOutcome};

/// A page of the shell.
pub trait View {
    fn name(&self) -> &'static str;

    /// Full HTML document for `ctx`.
    fn render(&self, ctx: &ViewContext) -> String;
}

/// Data shared by all views.
#[derive(Clone, Debug, Default)]
pub struct ViewContext {
    pub chain_id: Option<ChainId>,
    pub dapp_address: Option<String>,
    pub submission: Option<SubmissionSummary>,
}

/// What the hello view shows about the last submitted input.
#[derive(Clone, Debug)]
pub struct SubmissionSummary {
    pub input: String,
    pub transaction_hash: String,
    pub keys: NoticeKeys,
    /// Decoded notice, once resolved.
    pub notice: Option<String>,
    pub status: String,
}

impl SubmissionSummary {
    pub fn pending(input: &str, transaction_hash: &str, keys: NoticeKeys) -> Self {
        Self {
            input: input.to_string(),
            transaction_hash: transaction_hash.to_string(),
            keys,
            notice: None,
            status: "polling".to_string(),
        }
    }

    pub fn with_outcome(mut self, outcome: &PollOutcome) -> Self {
        match outcome {
            PollOutcome::Resolved(text) => {
                self.notice = Some(text.clone());
                self.status = "resolved".to_string();
            }
            PollOutcome::TimedOut { attempts, .. } => {
                self.status = format!("timed out after {} queries", attempts);
            }
            PollOutcome::Cancelled => self.status = "cancelled".to_string(),
        }
        self
    }
}

pub struct HomeView;

impl View for HomeView {
    fn name(&self) -> &'static str {
        "home"
    }

    fn render(&self, ctx: &ViewContext) -> String {
        let body = format!(
            r#"<h1>Rollup dapp</h1>
<p>Send text inputs to the rollup and read back the notice it computes.</p>
{connection}
<p><a href="/hello">Say hello</a></p>"#,
            connection = connection_card(ctx),
        );
        page("Home", &body)
    }
}

pub struct HelloView;

impl View for HelloView {
    fn name(&self) -> &'static str {
        "hello"
    }

    fn render(&self, ctx: &ViewContext) -> String {
        let submission = match &ctx.submission {
            Some(s) => {
                let json = serde_json::json!({
                    "input": s.input,
                    "transaction_hash": s.transaction_hash,
                    "epoch_index": s.keys.epoch_index,
                    "input_index": s.keys.input_index,
                    "notice": s.notice,
                    "status": s.status,
                });
                format!(
                    r#"<h2>Last input</h2>
<div class="card">
  <div class="grid">
    <span class="label">Input</span><span>{input}</span>
    <span class="label">Transaction</span><span class="mono">{tx}</span>
    <span class="label">Epoch</span><span class="mono">{epoch}</span>
    <span class="label">Input index</span><span class="mono">{index}</span>
    <span class="label">Status</span><span>{status}</span>
    <span class="label">Notice</span><span>{notice}</span>
  </div>
  <script type="application/json" id="submission">{json}</script>
</div>"#,
                    input = escape_html(&s.input),
                    tx = escape_html(&s.transaction_hash),
                    epoch = escape_html(&s.keys.epoch_index),
                    index = escape_html(&s.keys.input_index),
                    status = escape_html(&s.status),
                    notice = s.notice.as_deref().map(escape_html).unwrap_or_else(|| "n/a".to_string()),
                    json = escape_html(&json.to_string()),
                )
            }
            None => r#"<p class="footer">No input sent yet. Use <code>rollup-dapp send --input &lt;text&gt;</code>.</p>"#
                .to_string(),
        };
        let body = format!(
            r#"<h1>Hello</h1>
{connection}
{submission}
<p><a href="/">Home</a></p>"#,
            connection = connection_card(ctx),
            submission = submission,
        );
        page("Hello", &body)
    }
}

fn connection_card(ctx: &ViewContext) -> String {
    let chain = ctx
        .chain_id
        .map(format_chain_id)
        .unwrap_or_else(|| "not connected".to_string());
    let address = ctx
        .dapp_address
        .as_deref()
        .map(escape_html)
        .unwrap_or_else(|| "n/a".to_string());
    format!(
        r#"<div class="card">
  <div class="grid">
    <span class="label">Chain</span><span class="mono">{chain}</span>
    <span class="label">Dapp</span><span class="mono">{address}</span>
  </div>
</div>"#,
        chain = escape_html(&chain),
        address = address,
    )
}

fn page(title: &str, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="UTF-8"/>
<meta name="viewport" content="width=device-width,initial-scale=1"/>
<title>{title} – Rollup dapp</title>
<style>
body {{ font: 15px/1.5 sans-serif; max-width: 40rem; margin: 2rem auto; padding: 0 1rem; }}
.card {{ border: 1px solid #ccc; border-radius: 4px; padding: 0.75rem; }}
.grid {{ display: grid; grid-template-columns: 8rem 1fr; }}
.label, .footer {{ color: #666; }}
.mono {{ font-family: monospace; overflow-wrap: anywhere; }}
</style>
</head>
<body>
{body}
</body>
</html>"#,
        title = escape_html(title),
        body = body,
    )
}

pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
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
