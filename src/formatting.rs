// src/formatting.rs

use crate::core::{ProcessMetrics, SystemMetrics};
use chrono::{DateTime, Local};
use std::fmt::Write;

/// Timestamp layout used by the process log and the debug log.
pub const TIMESTAMP_FORMAT: &str = "%d-%m-%Y %H:%M:%S";

/// Alert logs shown in a recovery email before the rest are summarized.
const RECOVERY_ALERT_LOG_LIMIT: usize = 15;
/// Trailing recovery logs shown in a recovery email.
const RECOVERY_LOG_LIMIT: usize = 10;

/// Renders one snapshot as the banner block written to the process log.
///
/// Only processes with a metric above `floor` get a line. Every line,
/// including the closing banner, ends with a newline.
pub fn format_snapshot(
    at: DateTime<Local>,
    system: &SystemMetrics,
    processes: &[ProcessMetrics],
    floor: f64,
) -> String {
    let stamp = at.format(TIMESTAMP_FORMAT).to_string();
    let totals = format!(
        "[System CPU {:.2}%] [System RAM {:.2}%] [System Disk {:.2}%]",
        system.cpu_percent, system.ram_percent, system.disk_percent
    );

    let mut block = format!("===Start {} {}===\n", stamp, totals);
    for process in processes.iter().filter(|p| p.is_significant(floor)) {
        // Writing to a String cannot fail.
        let _ = writeln!(
            block,
            "{}, {}, {}, [CPU {:.2}%] [RAM {:.2}%] [Disk {:.2}%]",
            stamp,
            process.name,
            process.pid,
            process.cpu_percent,
            process.ram_percent,
            process.disk_percent
        );
    }
    let _ = writeln!(block, "===End  {} {}===", stamp, totals);
    block
}

/// Prefixes a debug log line with the local timestamp.
pub fn format_debug_line(at: DateTime<Local>, text: &str) -> String {
    format!("{} - {}", at.format(TIMESTAMP_FORMAT), text)
}

/// Values shown in alert and recovery emails.
#[derive(Debug, Clone)]
pub struct EmailContext {
    pub host: String,
    pub alert_duration_seconds: u64,
    pub cooldown_minutes: u64,
    pub recovery_duration_seconds: u64,
}

/// Builds the HTML body of an alert email.
pub fn alert_email_body(
    ctx: &EmailContext,
    channel: &str,
    logs: &[String],
    generated_at: DateTime<Local>,
) -> String {
    let mut body = String::from("<html><body style='font-family:Arial, sans-serif;'>");
    body.push_str("<h2 style='color:red;'>SystemMonitor Alert: Resource Thresholds Exceeded</h2>");
    let _ = write!(
        body,
        "<p><strong>Host:</strong> {}<br><strong>Resource:</strong> {}<br>\
         <strong>Alert Generated:</strong> {}<br>\
         <strong>Alert Duration:</strong> {} seconds<br>\
         <strong>Threshold Monitoring Period:</strong> {} log entries</p>",
        escape_html(&ctx.host),
        escape_html(channel),
        generated_at.format("%Y-%m-%d %H:%M:%S"),
        ctx.alert_duration_seconds,
        logs.len()
    );
    body.push_str("<hr><h3>DETAILED LOG ANALYSIS</h3>");
    if logs.is_empty() {
        body.push_str("<p>No detailed logs available for this alert period.</p>");
    } else {
        body.push_str("<p>System monitoring logs during the alert period:</p><ul>");
        for entry in logs {
            let _ = write!(body, "<li><pre>{}</pre></li>", escape_html(entry));
        }
        body.push_str("</ul>");
    }
    body.push_str(
        "<h3>RECOMMENDATIONS</h3>\
         <p>1. Check for resource-intensive processes<br>\
         2. Monitor disk I/O activity<br>\
         3. Verify system memory usage patterns<br>\
         4. Consider scaling resources if this is a recurring issue</p>",
    );
    let _ = write!(
        body,
        "<p>This alert was automatically generated by SystemMonitor.<br>\
         Next alert will be suppressed for {} minutes.</p>",
        ctx.cooldown_minutes
    );
    body.push_str("</body></html>");
    body
}

/// Builds the HTML body of a recovery email.
///
/// The first alert logs and the last recovery logs are included; the rest of
/// the alert logs are summarized as a count.
pub fn recovery_email_body(
    ctx: &EmailContext,
    channel: &str,
    alert_logs: &[String],
    recovery_logs: &[String],
    generated_at: DateTime<Local>,
) -> String {
    let mut body = String::from("<html><body style='font-family:Arial, sans-serif;'>");
    body.push_str("<h2 style='color:green;'>SystemMonitor Recovery: All Systems Normal</h2>");
    let _ = write!(
        body,
        "<p><strong>Host:</strong> {}<br><strong>Resource:</strong> {}<br>\
         <strong>Recovery Detected:</strong> {}<br>\
         <strong>Recovery Duration:</strong> {} seconds below thresholds<br>\
         <strong>Original Alert Period:</strong> {} log entries<br>\
         <strong>Recovery Period:</strong> {} log entries</p>",
        escape_html(&ctx.host),
        escape_html(channel),
        generated_at.format("%Y-%m-%d %H:%M:%S"),
        ctx.recovery_duration_seconds,
        alert_logs.len(),
        recovery_logs.len()
    );

    body.push_str("<hr><h3>RECOVERY SYSTEM ANALYSIS</h3>");
    if recovery_logs.is_empty() {
        body.push_str("<p>No detailed recovery logs available.</p>");
    } else {
        body.push_str("<p>Recent system state showing normal operation:</p><ul>");
        let start = recovery_logs.len().saturating_sub(RECOVERY_LOG_LIMIT);
        for entry in &recovery_logs[start..] {
            let _ = write!(body, "<li><pre>{}</pre></li>", escape_html(entry));
        }
        body.push_str("</ul>");
    }

    body.push_str("<h3>ORIGINAL ALERT SYSTEM ANALYSIS</h3><pre>");
    for entry in alert_logs.iter().take(RECOVERY_ALERT_LOG_LIMIT) {
        let _ = writeln!(body, "{}", escape_html(entry));
    }
    if alert_logs.len() > RECOVERY_ALERT_LOG_LIMIT {
        let _ = writeln!(
            body,
            "... ({} additional alert log entries) ...",
            alert_logs.len() - RECOVERY_ALERT_LOG_LIMIT
        );
    }
    body.push_str("</pre>");
    body.push_str("<p>This notice was automatically generated by SystemMonitor.</p>");
    body.push_str("</body></html>");
    body
}

/// Escapes text for inclusion in an HTML body.
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
