//! Status projection and publication

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::auth::AuthChallenge;
use crate::error::SurfaceError;
use crate::surface::{PostHandle, StatusSurface};
use crate::types::{Phase, Position, SessionState};

/// Headline category of a snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusKind {
    AwaitingAuth,
    Connected,
    Reconnecting,
    Connecting,
    Disconnected,
}

/// Immutable view of the bridge at one point in time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub kind: StatusKind,
    /// Human-readable summary
    pub text: String,
    pub phase: Phase,
    pub should_join: bool,
    pub reconnect_attempts: u32,
    pub max_reconnect_attempts: u32,
    pub identity: String,
    pub world: String,
    pub position: Position,
    pub challenge: Option<AuthChallenge>,
    pub generated_at: DateTime<Utc>,
}

impl StatusSnapshot {
    /// Equal in everything but the generation time
    pub fn same_content(&self, other: &StatusSnapshot) -> bool {
        self.kind == other.kind
            && self.text == other.text
            && self.phase == other.phase
            && self.should_join == other.should_join
            && self.reconnect_attempts == other.reconnect_attempts
            && self.max_reconnect_attempts == other.max_reconnect_attempts
            && self.identity == other.identity
            && self.world == other.world
            && self.position == other.position
            && self.challenge == other.challenge
    }
}

/// How long one surface call may take before it counts as failed
pub const DEFAULT_SURFACE_TIMEOUT: Duration = Duration::from_secs(10);

/// Derives snapshots and mirrors them to a [`StatusSurface`]
pub struct StatusProjector {
    surface: Arc<dyn StatusSurface>,
    timeout: Duration,
    post: Option<PostHandle>,
    last_published: Option<StatusSnapshot>,
}

impl std::fmt::Debug for StatusProjector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatusProjector")
            .field("surface", &"<surface>")
            .field("timeout", &self.timeout)
            .field("post", &self.post)
            .field("last_published", &self.last_published)
            .finish()
    }
}

impl StatusProjector {
    pub fn new(surface: Arc<dyn StatusSurface>) -> Self {
        Self {
            surface,
            timeout: DEFAULT_SURFACE_TIMEOUT,
            post: None,
            last_published: None,
        }
    }

    /// Bound every surface call by `timeout`
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Build the snapshot for `state` and `challenge`. Pure.
    pub fn project(state: &SessionState, challenge: Option<&AuthChallenge>) -> StatusSnapshot {
        let (kind, text) = if challenge.is_some() {
            (StatusKind::AwaitingAuth, "awaiting authentication".to_string())
        } else if state.phase == Phase::Connected {
            (StatusKind::Connected, format!("connected as {}", state.identity))
        } else if state.should_join && state.reconnect_attempts > 0 {
            (
                StatusKind::Reconnecting,
                format!(
                    "reconnecting attempt {}/{}",
                    state.reconnect_attempts, state.max_reconnect_attempts
                ),
            )
        } else if state.should_join {
            (StatusKind::Connecting, "connecting".to_string())
        } else {
            (StatusKind::Disconnected, "disconnected".to_string())
        };

        StatusSnapshot {
            kind,
            text,
            phase: state.phase,
            should_join: state.should_join,
            reconnect_attempts: state.reconnect_attempts,
            max_reconnect_attempts: state.max_reconnect_attempts,
            identity: state.identity.clone(),
            world: state.world.clone(),
            position: state.position,
            challenge: challenge.cloned(),
            generated_at: Utc::now(),
        }
    }

    /// Push a snapshot to the surface.
    ///
    /// The first publication creates the post, later ones edit it. A snapshot
    /// equal to the last one the surface accepted is skipped, so a failed
    /// publication is retried by the next one. The post is only replaced when
    /// the surface reports it gone. Returns whether the surface was asked to
    /// do anything.
    pub async fn publish(&mut self, snapshot: StatusSnapshot) -> bool {
        if let Some(last) = &self.last_published {
            if last.same_content(&snapshot) {
                return false;
            }
        }

        let outcome = match self.post.clone() {
            Some(post) => {
                match bounded(self.timeout, self.surface.update_post(&post, &snapshot)).await {
                    Err(SurfaceError::NotFound(_)) => {
                        debug!("Status post {} is gone, creating a new one", post.as_str());
                        self.post = None;
                        self.create(&snapshot).await
                    }
                    other => other,
                }
            }
            None => self.create(&snapshot).await,
        };

        match outcome {
            Ok(()) => self.last_published = Some(snapshot),
            Err(e) => {
                warn!("Failed to publish status \"{}\": {}", snapshot.text, e);
                metrics::counter!("tether_status_publish_failures_total").increment(1);
            }
        }
        true
    }

    async fn create(&mut self, snapshot: &StatusSnapshot) -> Result<(), SurfaceError> {
        let post = bounded(self.timeout, self.surface.create_post(snapshot)).await?;
        debug!("Created status post {}", post.as_str());
        self.post = Some(post);
        Ok(())
    }

    /// Delete the status post, if one was created
    pub async fn retire(&mut self) {
        if let Some(post) = self.post.take() {
            if let Err(e) = bounded(self.timeout, self.surface.delete_post(&post)).await {
                warn!("Failed to delete status post {}: {}", post.as_str(), e);
            }
        }
        self.last_published = None;
    }

    /// The last snapshot handed to the surface
    pub fn last_published(&self) -> Option<&StatusSnapshot> {
        self.last_published.as_ref()
    }
}

async fn bounded<T>(
    limit: Duration,
    call: impl Future<Output = Result<T, SurfaceError>>,
) -> Result<T, SurfaceError> {
    tokio::time::timeout(limit, call)
        .await
        .unwrap_or(Err(SurfaceError::Timeout(limit)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSurface {
        calls: Mutex<Vec<String>>,
        created: AtomicU32,
        create_failure: Mutex<Option<SurfaceError>>,
        update_failure: Mutex<Option<SurfaceError>>,
        stall: AtomicBool,
    }

    impl RecordingSurface {
        async fn answer(&self, failure: &Mutex<Option<SurfaceError>>) -> Result<(), SurfaceError> {
            if self.stall.load(Ordering::SeqCst) {
                std::future::pending::<()>().await;
            }
            match failure.lock().unwrap().clone() {
                Some(e) => Err(e),
                None => Ok(()),
            }
        }
    }

    #[async_trait]
    impl StatusSurface for RecordingSurface {
        async fn create_post(&self, snapshot: &StatusSnapshot) -> Result<PostHandle, SurfaceError> {
            self.calls.lock().unwrap().push(format!("create:{}", snapshot.text));
            self.answer(&self.create_failure).await?;
            let id = self.created.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(PostHandle::new(format!("post-{}", id)))
        }

        async fn update_post(
            &self,
            post: &PostHandle,
            snapshot: &StatusSnapshot,
        ) -> Result<(), SurfaceError> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("update:{}:{}", post.as_str(), snapshot.text));
            self.answer(&self.update_failure).await
        }

        async fn delete_post(&self, post: &PostHandle) -> Result<(), SurfaceError> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("delete:{}", post.as_str()));
            Ok(())
        }
    }

    fn offline() -> Option<SurfaceError> {
        Some(SurfaceError::Request("offline".to_string()))
    }

    fn challenge() -> AuthChallenge {
        AuthChallenge {
            verification_url: Some("https://www.microsoft.com/link".to_string()),
            user_code: Some("AB12CD".to_string()),
            operator: None,
            detected_at: Utc::now(),
        }
    }

    #[test]
    fn test_status_text_precedence() {
        let mut state = SessionState::new("Steve", 3);
        assert_eq!(StatusProjector::project(&state, None).text, "disconnected");

        state.should_join = true;
        state.phase = Phase::Connecting;
        assert_eq!(StatusProjector::project(&state, None).text, "connecting");

        state.phase = Phase::Disconnected;
        state.reconnect_attempts = 2;
        let snapshot = StatusProjector::project(&state, None);
        assert_eq!(snapshot.kind, StatusKind::Reconnecting);
        assert_eq!(snapshot.text, "reconnecting attempt 2/3");

        state.phase = Phase::Connected;
        assert_eq!(StatusProjector::project(&state, None).text, "connected as Steve");

        let pending = challenge();
        let snapshot = StatusProjector::project(&state, Some(&pending));
        assert_eq!(snapshot.kind, StatusKind::AwaitingAuth);
        assert_eq!(snapshot.text, "awaiting authentication");
        assert_eq!(snapshot.challenge, Some(pending));
    }

    #[test]
    fn test_attempts_without_intent_read_disconnected() {
        let mut state = SessionState::new("Steve", 3);
        state.phase = Phase::Disconnected;
        state.reconnect_attempts = 3;
        assert_eq!(StatusProjector::project(&state, None).text, "disconnected");
    }

    #[tokio::test]
    async fn test_publish_creates_then_updates() {
        let surface = Arc::new(RecordingSurface::default());
        let mut projector = StatusProjector::new(surface.clone());
        let mut state = SessionState::new("Steve", 3);

        assert!(projector.publish(StatusProjector::project(&state, None)).await);
        state.should_join = true;
        assert!(projector.publish(StatusProjector::project(&state, None)).await);

        let calls = surface.calls.lock().unwrap().clone();
        assert_eq!(calls, vec!["create:disconnected", "update:post-1:connecting"]);
    }

    #[tokio::test]
    async fn test_publish_skips_identical_snapshot() {
        let surface = Arc::new(RecordingSurface::default());
        let mut projector = StatusProjector::new(surface.clone());
        let state = SessionState::new("Steve", 3);

        assert!(projector.publish(StatusProjector::project(&state, None)).await);
        assert!(!projector.publish(StatusProjector::project(&state, None)).await);
        assert_eq!(surface.calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_surface_failure_is_swallowed() {
        let surface = Arc::new(RecordingSurface::default());
        *surface.create_failure.lock().unwrap() = offline();
        let mut projector = StatusProjector::new(surface.clone());
        let state = SessionState::new("Steve", 3);

        assert!(projector.publish(StatusProjector::project(&state, None)).await);
        assert!(projector.last_published().is_none());

        // the same content is retried once the surface is back
        *surface.create_failure.lock().unwrap() = None;
        assert!(projector.publish(StatusProjector::project(&state, None)).await);
        assert_eq!(projector.last_published().unwrap().text, "disconnected");

        let calls = surface.calls.lock().unwrap().clone();
        assert_eq!(calls, vec!["create:disconnected", "create:disconnected"]);
    }

    #[tokio::test]
    async fn test_failed_update_keeps_post() {
        let surface = Arc::new(RecordingSurface::default());
        let mut projector = StatusProjector::new(surface.clone());
        let mut state = SessionState::new("Steve", 3);
        projector.publish(StatusProjector::project(&state, None)).await;

        *surface.update_failure.lock().unwrap() = offline();
        state.should_join = true;
        projector.publish(StatusProjector::project(&state, None)).await;
        assert_eq!(projector.last_published().unwrap().text, "disconnected");

        *surface.update_failure.lock().unwrap() = None;
        projector.publish(StatusProjector::project(&state, None)).await;

        let calls = surface.calls.lock().unwrap().clone();
        assert_eq!(
            calls,
            vec![
                "create:disconnected",
                "update:post-1:connecting",
                "update:post-1:connecting",
            ]
        );
        assert_eq!(projector.last_published().unwrap().text, "connecting");
    }

    #[tokio::test]
    async fn test_missing_post_is_recreated() {
        let surface = Arc::new(RecordingSurface::default());
        let mut projector = StatusProjector::new(surface.clone());
        let mut state = SessionState::new("Steve", 3);
        projector.publish(StatusProjector::project(&state, None)).await;

        *surface.update_failure.lock().unwrap() =
            Some(SurfaceError::NotFound("Unknown Message".to_string()));
        state.should_join = true;
        projector.publish(StatusProjector::project(&state, None)).await;
        assert_eq!(projector.last_published().unwrap().text, "connecting");

        *surface.update_failure.lock().unwrap() = None;
        state.should_join = false;
        projector.publish(StatusProjector::project(&state, None)).await;

        let calls = surface.calls.lock().unwrap().clone();
        assert_eq!(
            calls,
            vec![
                "create:disconnected",
                "update:post-1:connecting",
                "create:connecting",
                "update:post-2:disconnected",
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_surface_times_out() {
        let surface = Arc::new(RecordingSurface::default());
        surface.stall.store(true, Ordering::SeqCst);
        let mut projector =
            StatusProjector::new(surface.clone()).with_timeout(Duration::from_secs(2));
        let state = SessionState::new("Steve", 3);

        let started = tokio::time::Instant::now();
        assert!(projector.publish(StatusProjector::project(&state, None)).await);
        assert!(started.elapsed() >= Duration::from_secs(2));
        assert!(projector.last_published().is_none());

        surface.stall.store(false, Ordering::SeqCst);
        projector.publish(StatusProjector::project(&state, None)).await;
        assert_eq!(projector.last_published().unwrap().text, "disconnected");
        assert_eq!(surface.calls.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_retire_deletes_post() {
        let surface = Arc::new(RecordingSurface::default());
        let mut projector = StatusProjector::new(surface.clone());
        let state = SessionState::new("Steve", 3);

        projector.publish(StatusProjector::project(&state, None)).await;
        projector.retire().await;
        projector.retire().await;

        let calls = surface.calls.lock().unwrap().clone();
        assert_eq!(calls, vec!["create:disconnected", "delete:post-1"]);
    }
}
