//! Backend traits

use async_trait::async_trait;

use crate::{
    ActivityKind, ActivityLogRecord, ApiResult, HomeData, NewActivityLog, NewGroup, ProfileUpdate,
};

/// Renews the session credentials after the server reported them expired
#[async_trait]
pub trait CredentialRefresher: Send + Sync {
    /// Obtain a fresh access token. An error here ends the session.
    async fn refresh_credentials(&self) -> ApiResult<()>;
}

/// Remote operations the client core needs, scoped to the signed-in user's group
///
/// `NotFound` from [`fetch_home`](PetLogBackend::fetch_home) means the user
/// has not joined a group yet.
#[async_trait]
pub trait PetLogBackend: CredentialRefresher {
    /// Fetch profile, schedules and invite code for the current group
    async fn fetch_home(&self) -> ApiResult<HomeData>;

    /// Record an activity
    async fn submit_log(
        &self,
        kind: ActivityKind,
        log: &NewActivityLog,
    ) -> ApiResult<ActivityLogRecord>;

    /// Apply a partial profile or schedule edit
    async fn update_profile(&self, update: &ProfileUpdate) -> ApiResult<()>;

    /// Join an existing group by invite code
    async fn join_group(&self, invite_code: &str) -> ApiResult<()>;

    /// Create a group around a new pet profile
    async fn create_group(&self, group: &NewGroup) -> ApiResult<()>;

    /// Invite code of the current group
    async fn invite_code(&self) -> ApiResult<String>;

    /// Shared note of the current group
    async fn fetch_note(&self) -> ApiResult<Option<String>>;

    /// Replace the shared note; `None` deletes it
    async fn update_note(&self, note: Option<&str>) -> ApiResult<()>;
}
