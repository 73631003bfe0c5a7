//! 状态发布目标
//!
//! [`WebhookSurface`] 通过 webhook 维护同一条聊天消息。
//! 未配置 webhook 时使用 [`LogSurface`], 把快照写入日志。

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::info;

use tether_core::{PostHandle, StatusKind, StatusSnapshot, StatusSurface, SurfaceError};

const COLOR_GREEN: u32 = 0x2ecc71;
const COLOR_YELLOW: u32 = 0xf1c40f;
const COLOR_ORANGE: u32 = 0xe67e22;
const COLOR_RED: u32 = 0xe74c3c;
const COLOR_BLUE: u32 = 0x3498db;

/// 通过聊天 webhook 以 embed 形式发布状态
#[derive(Debug, Clone)]
pub struct WebhookSurface {
    client: reqwest::Client,
    url: String,
    title: String,
    timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct WebhookMessage {
    id: String,
}

impl WebhookSurface {
    /// 每个请求 (包括读取响应体) 必须在 `timeout` 内完成
    pub fn new(
        url: impl Into<String>,
        title: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, SurfaceError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SurfaceError::Request(e.to_string()))?;
        Ok(Self {
            client,
            url: url.into().trim_end_matches('/').to_string(),
            title: title.into(),
            timeout,
        })
    }

    fn request_error(&self, e: reqwest::Error) -> SurfaceError {
        if e.is_timeout() {
            SurfaceError::Timeout(self.timeout)
        } else {
            SurfaceError::Request(e.to_string())
        }
    }

    fn message_url(&self, post: &PostHandle) -> String {
        format!("{}/messages/{}", self.url, post.as_str())
    }

    fn body(&self, snapshot: &StatusSnapshot) -> Value {
        let mut fields = vec![
            field("Identity", &snapshot.identity),
            field("World", &snapshot.world),
            field("Position", &snapshot.position.to_string()),
        ];
        if snapshot.reconnect_attempts > 0 {
            fields.push(field(
                "Attempts",
                &format!(
                    "{}/{}",
                    snapshot.reconnect_attempts, snapshot.max_reconnect_attempts
                ),
            ));
        }
        if let Some(challenge) = &snapshot.challenge {
            if let Some(url) = &challenge.verification_url {
                fields.push(field("Sign in at", url));
            }
            if let Some(code) = &challenge.user_code {
                fields.push(field("Code", code));
            }
        }

        json!({
            "embeds": [{
                "title": self.title,
                "description": snapshot.text,
                "color": color(snapshot.kind),
                "fields": fields,
                "timestamp": snapshot.generated_at.to_rfc3339(),
            }]
        })
    }
}

fn field(name: &str, value: &str) -> Value {
    json!({ "name": name, "value": value, "inline": true })
}

fn color(kind: StatusKind) -> u32 {
    match kind {
        StatusKind::Connected => COLOR_GREEN,
        StatusKind::Connecting => COLOR_BLUE,
        StatusKind::Reconnecting => COLOR_ORANGE,
        StatusKind::AwaitingAuth => COLOR_YELLOW,
        StatusKind::Disconnected => COLOR_RED,
    }
}

async fn check(response: reqwest::Response) -> Result<reqwest::Response, SurfaceError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    if status == reqwest::StatusCode::NOT_FOUND {
        return Err(SurfaceError::NotFound(body));
    }
    Err(SurfaceError::Response(format!("HTTP {}: {}", status, body)))
}

#[async_trait]
impl StatusSurface for WebhookSurface {
    async fn create_post(&self, snapshot: &StatusSnapshot) -> Result<PostHandle, SurfaceError> {
        let response = self
            .client
            .post(&self.url)
            .query(&[("wait", "true")])
            .json(&self.body(snapshot))
            .send()
            .await
            .map_err(|e| self.request_error(e))?;

        let message: WebhookMessage = check(response).await?.json().await.map_err(|e| {
            if e.is_timeout() {
                SurfaceError::Timeout(self.timeout)
            } else {
                SurfaceError::Response(e.to_string())
            }
        })?;
        Ok(PostHandle::new(message.id))
    }

    async fn update_post(
        &self,
        post: &PostHandle,
        snapshot: &StatusSnapshot,
    ) -> Result<(), SurfaceError> {
        let response = self
            .client
            .patch(self.message_url(post))
            .json(&self.body(snapshot))
            .send()
            .await
            .map_err(|e| self.request_error(e))?;
        check(response).await?;
        Ok(())
    }

    async fn delete_post(&self, post: &PostHandle) -> Result<(), SurfaceError> {
        let response = self
            .client
            .delete(self.message_url(post))
            .send()
            .await
            .map_err(|e| self.request_error(e))?;
        check(response).await?;
        Ok(())
    }
}

/// 把每个快照写成一条结构化日志
#[derive(Debug, Default)]
pub struct LogSurface {
    next_id: AtomicU64,
}

impl LogSurface {
    pub fn new() -> Self {
        Self::default()
    }

    fn log(post: &PostHandle, snapshot: &StatusSnapshot) {
        info!(
            post = post.as_str(),
            kind = ?snapshot.kind,
            phase = %snapshot.phase,
            world = %snapshot.world,
            position = %snapshot.position,
            attempts = snapshot.reconnect_attempts,
            code = snapshot.challenge.as_ref().and_then(|c| c.user_code.as_deref()),
            "Status: {}",
            snapshot.text
        );
    }
}

#[async_trait]
impl StatusSurface for LogSurface {
    async fn create_post(&self, snapshot: &StatusSnapshot) -> Result<PostHandle, SurfaceError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let post = PostHandle::new(format!("log-{}", id));
        Self::log(&post, snapshot);
        Ok(post)
    }

    async fn update_post(
        &self,
        post: &PostHandle,
        snapshot: &StatusSnapshot,
    ) -> Result<(), SurfaceError> {
        Self::log(post, snapshot);
        Ok(())
    }

    async fn delete_post(&self, post: &PostHandle) -> Result<(), SurfaceError> {
        info!(post = post.as_str(), "Status post retired");
        Ok(())
    }
}
