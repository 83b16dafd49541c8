use anyhow::{Context, Result};
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use crate::domain::message::SenderCount;

/// Renders a sender summary into some artifact.
pub trait Reporter {
    fn render(&self, summary: &[SenderCount]) -> Result<()>;
}

/// Static HTML table of `(count, sender)` rows, written to a fixed path.
pub struct HtmlReporter {
    output: PathBuf,
}

impl HtmlReporter {
    pub fn new(output: impl Into<PathBuf>) -> Self {
        Self {
            output: output.into(),
        }
    }

    pub fn output(&self) -> &Path {
        &self.output
    }
}

impl Reporter for HtmlReporter {
    fn render(&self, summary: &[SenderCount]) -> Result<()> {
        let html = render_html(summary);
        fs::write(&self.output, html)
            .with_context(|| format!("writing report to {}", self.output.display()))?;
        println!(
            "Email senders report written to '{}'",
            self.output.display()
        );
        Ok(())
    }
}

pub fn render_html(summary: &[SenderCount]) -> String {
    let total: u64 = summary.iter().map(|s| s.count).sum();

    let mut out = String::from(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n\
         <title>Email Senders</title>\n</head>\n<body>\n<h1>Email Senders</h1>\n",
    );
    let _ = writeln!(
        out,
        "<p>{total} messages from {} senders</p>",
        summary.len()
    );
    out.push_str("<table>\n<tr><th>Messages</th><th>Sender</th></tr>\n");
    for row in summary {
        let sender = row
            .sender_address
            .as_deref()
            .map(escape_html)
            .unwrap_or_else(|| "<em>(unresolved)</em>".to_string());
        let _ = writeln!(out, "<tr><td>{}</td><td>{}</td></tr>", row.count, sender);
    }
    out.push_str("</table>\n</body>\n</html>\n");
    out
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}
