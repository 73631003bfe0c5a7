//! Status surface interface
//!
//! The status surface is wherever humans look to see what the bridge is
//! doing: a chat message that gets edited in place, a log stream, a webhook.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::SurfaceError;
use crate::projector::StatusSnapshot;

/// Reference to a published status post
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PostHandle(String);

impl PostHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Destination for status snapshots
///
/// All operations are fallible. The bridge logs failures and carries on; it
/// never depends on the surface being reachable.
#[async_trait]
pub trait StatusSurface: Send + Sync {
    async fn create_post(&self, snapshot: &StatusSnapshot) -> Result<PostHandle, SurfaceError>;

    /// Edit an existing post. Returns [`SurfaceError::NotFound`] when the post
    /// was removed on the surface side.
    async fn update_post(
        &self,
        post: &PostHandle,
        snapshot: &StatusSnapshot,
    ) -> Result<(), SurfaceError>;

    async fn delete_post(&self, post: &PostHandle) -> Result<(), SurfaceError>;
}
