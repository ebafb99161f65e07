//! Fire-and-forget alert dispatch to a Postmark-style HTTP endpoint
//! (spec §4.3). Ingest must never block on alerting: the caller spawns
//! this as a detached task, and any failure here is logged and swallowed.

use serde::Serialize;

use crate::config::Config;

pub struct AlertContext<'a> {
    pub project: &'a str,
    pub environment: &'a str,
    pub exception_type: &'a str,
    pub message: &'a str,
    pub request_url: Option<&'a str>,
    pub request_method: Option<&'a str>,
    pub first_seen: &'a str,
    pub traceback: &'a str,
    pub error_id: i64,
}

#[derive(Serialize)]
struct PostmarkMessage {
    #[serde(rename = "From")]
    from: String,
    #[serde(rename = "To")]
    to: String,
    #[serde(rename = "Subject")]
    subject: String,
    #[serde(rename = "TextBody")]
    text_body: String,
}

fn truncate(s: &str, n: usize) -> &str {
    match s.char_indices().nth(n) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

pub async fn dispatch(config: &Config, ctx: AlertContext<'_>) {
    let (Some(token), Some(from)) = (&config.postmark_api_token, &config.postmark_from_email) else {
        tracing::debug!("alert dispatch skipped: POSTMARK_API_TOKEN or POSTMARK_FROM_EMAIL unset");
        return;
    };
    if config.alert_emails.is_empty() {
        tracing::debug!("alert dispatch skipped: ALERT_EMAILS is empty");
        return;
    }

    let subject = format!(
        "[{}] {}: {}",
        ctx.project,
        ctx.exception_type,
        truncate(ctx.message, 50)
    );
    let dashboard_link = format!("{}/errors/{}", config.base_url.trim_end_matches('/'), ctx.error_id);
    let text_body = format!(
        "Project: {}\nEnvironment: {}\nException: {}\nMessage: {}\nRequest: {} {}\nFirst seen: {}\n\nTraceback:\n{}\n\nDashboard: {}",
        ctx.project,
        ctx.environment,
        ctx.exception_type,
        ctx.message,
        ctx.request_method.unwrap_or("-"),
        ctx.request_url.unwrap_or("-"),
        ctx.first_seen,
        ctx.traceback,
        dashboard_link,
    );

    let client = reqwest::Client::new();
    for to in &config.alert_emails {
        let message = PostmarkMessage {
            from: from.clone(),
            to: to.clone(),
            subject: subject.clone(),
            text_body: text_body.clone(),
        };
        let result = client
            .post("https://api.postmarkapp.com/email")
            .header("X-Postmark-Server-Token", token)
            .header("Accept", "application/json")
            .json(&message)
            .send()
            .await;
        match result {
            Ok(resp) if resp.status().is_success() => {
                tracing::info!(to = %to, error_id = ctx.error_id, "alert dispatched");
            }
            Ok(resp) => {
                tracing::warn!(to = %to, status = %resp.status(), "alert dispatch rejected by Postmark");
            }
            Err(err) => {
                tracing::warn!(to = %to, error = %err, "alert dispatch failed");
            }
        }
    }
}
