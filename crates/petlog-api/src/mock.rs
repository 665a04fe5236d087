//! Mock backend for testing
//!
//! Behaves like a tiny in-memory server: logs and profile edits update the
//! stored home bundle. Responses to `fetch_home` can also be scripted, and
//! fetches can be held behind a gate to exercise concurrent loads.

use async_trait::async_trait;
use chrono::{DateTime, Local};
use petlog_util::{Clock, GroupId, LogId, SystemClock};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::Semaphore;

use crate::{
    ActivityKind, ActivityLogRecord, ApiError, ApiResult, CredentialRefresher, HomeData,
    NewActivityLog, NewGroup, PetLogBackend, ProfileUpdate,
};

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// In-memory backend for unit/integration testing
pub struct MockBackend {
    clock: Arc<dyn Clock>,
    home: Mutex<Option<HomeData>>,
    scripted: Mutex<VecDeque<ApiResult<HomeData>>>,
    note: Mutex<Option<String>>,
    gate: Option<Arc<Semaphore>>,
    next_log_id: AtomicU64,

    fetch_calls: AtomicUsize,
    refresh_calls: AtomicUsize,
    submitted: Mutex<Vec<(ActivityKind, NewActivityLog)>>,
    profile_updates: Mutex<Vec<ProfileUpdate>>,
    joined_codes: Mutex<Vec<String>>,

    /// Result handed out by `refresh_credentials`
    refresh_result: Mutex<ApiResult<()>>,
    /// Error returned by the next write call
    next_write_error: Mutex<Option<ApiError>>,
}

impl MockBackend {
    /// Backend with no group joined yet
    pub fn new() -> Self {
        Self {
            clock: Arc::new(SystemClock),
            home: Mutex::new(None),
            scripted: Mutex::new(VecDeque::new()),
            note: Mutex::new(None),
            gate: None,
            next_log_id: AtomicU64::new(1),
            fetch_calls: AtomicUsize::new(0),
            refresh_calls: AtomicUsize::new(0),
            submitted: Mutex::new(Vec::new()),
            profile_updates: Mutex::new(Vec::new()),
            joined_codes: Mutex::new(Vec::new()),
            refresh_result: Mutex::new(Ok(())),
            next_write_error: Mutex::new(None),
        }
    }

    pub fn with_home(self, home: HomeData) -> Self {
        *lock(&self.home) = Some(home);
        self
    }

    /// Timestamps of submitted logs come from this clock
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Every `fetch_home` waits for a [`release`](Self::release) first
    pub fn gated(mut self) -> Self {
        self.gate = Some(Arc::new(Semaphore::new(0)));
        self
    }

    /// Let `n` gated fetches proceed
    pub fn release(&self, n: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(n);
        }
    }

    /// Queue a response; queued responses are served before the stored home
    pub fn push_response(&self, response: ApiResult<HomeData>) {
        lock(&self.scripted).push_back(response);
    }

    pub fn set_home(&self, home: Option<HomeData>) {
        *lock(&self.home) = home;
    }

    pub fn home(&self) -> Option<HomeData> {
        lock(&self.home).clone()
    }

    pub fn set_refresh_result(&self, result: ApiResult<()>) {
        *lock(&self.refresh_result) = result;
    }

    pub fn fail_next_write(&self, err: ApiError) {
        *lock(&self.next_write_error) = Some(err);
    }

    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    pub fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    pub fn submitted(&self) -> Vec<(ActivityKind, NewActivityLog)> {
        lock(&self.submitted).clone()
    }

    pub fn profile_updates(&self) -> Vec<ProfileUpdate> {
        lock(&self.profile_updates).clone()
    }

    pub fn joined_codes(&self) -> Vec<String> {
        lock(&self.joined_codes).clone()
    }

    fn take_write_failure(&self) -> ApiResult<()> {
        match lock(&self.next_write_error).take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn no_group() -> ApiError {
        ApiError::not_found("user has not joined a group")
    }

    fn record(&self, kind: ActivityKind, log: &NewActivityLog, at: DateTime<Local>) {
        let mut home = lock(&self.home);
        let Some(home) = home.as_mut() else {
            return;
        };
        let note = log.note.clone().unwrap_or_default();
        match kind {
            ActivityKind::Feeding => {
                home.feeding.last_event_time = at;
                home.feeding.last_actor_name = log.actor_name.clone();
                home.feeding.last_note = note;
            }
            ActivityKind::Watering => {
                home.watering.last_event_time = at;
                home.watering.last_actor_name = log.actor_name.clone();
                home.watering.last_note = note;
            }
            ActivityKind::Elimination => {
                home.elimination.count_today += 1;
                home.elimination.last_actor_name = log.actor_name.clone();
                home.elimination.last_note = note;
            }
        }
    }
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CredentialRefresher for MockBackend {
    async fn refresh_credentials(&self) -> ApiResult<()> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        lock(&self.refresh_result).clone()
    }
}

#[async_trait]
impl PetLogBackend for MockBackend {
    async fn fetch_home(&self) -> ApiResult<HomeData> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);

        if let Some(gate) = &self.gate {
            let permit = gate
                .acquire()
                .await
                .map_err(|_| ApiError::network("mock gate closed"))?;
            permit.forget();
        }

        if let Some(response) = lock(&self.scripted).pop_front() {
            return response;
        }
        lock(&self.home).clone().ok_or_else(Self::no_group)
    }

    async fn submit_log(
        &self,
        kind: ActivityKind,
        log: &NewActivityLog,
    ) -> ApiResult<ActivityLogRecord> {
        self.take_write_failure()?;
        if lock(&self.home).is_none() {
            return Err(Self::no_group());
        }

        let at = self.clock.now();
        self.record(kind, log, at);
        lock(&self.submitted).push((kind, log.clone()));

        let id = self.next_log_id.fetch_add(1, Ordering::SeqCst);
        Ok(ActivityLogRecord {
            id: LogId::new(id.to_string()),
            group_id: GroupId::new("mock-group"),
            actor_name: log.actor_name.clone(),
            note: log.note.clone(),
            recorded_at: Some(at),
        })
    }

    async fn update_profile(&self, update: &ProfileUpdate) -> ApiResult<()> {
        self.take_write_failure()?;
        let mut home = lock(&self.home);
        let home = home.as_mut().ok_or_else(Self::no_group)?;
        update.apply_to(home);
        lock(&self.profile_updates).push(update.clone());
        Ok(())
    }

    async fn join_group(&self, invite_code: &str) -> ApiResult<()> {
        self.take_write_failure()?;
        lock(&self.joined_codes).push(invite_code.to_string());
        Ok(())
    }

    async fn create_group(&self, group: &NewGroup) -> ApiResult<()> {
        self.take_write_failure()?;
        let home = HomeData {
            profile: group.profile.clone(),
            feeding: crate::ActivitySchedule::new(group.feeding_cycle_hours, group.last_feeding_time),
            watering: crate::ActivitySchedule::new(
                group.watering_cycle_hours,
                group.last_watering_time,
            ),
            elimination: Default::default(),
            invite_code: "MOCK01".into(),
        };
        *lock(&self.home) = Some(home);
        *lock(&self.note) = group.notice.clone();
        Ok(())
    }

    async fn invite_code(&self) -> ApiResult<String> {
        lock(&self.home)
            .as_ref()
            .map(|h| h.invite_code.clone())
            .ok_or_else(Self::no_group)
    }

    async fn fetch_note(&self) -> ApiResult<Option<String>> {
        if lock(&self.home).is_none() {
            return Err(Self::no_group());
        }
        Ok(lock(&self.note).clone())
    }

    async fn update_note(&self, note: Option<&str>) -> ApiResult<()> {
        self.take_write_failure()?;
        *lock(&self.note) = note.map(str::to_string);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ActivitySchedule, EliminationLog, Gender, Profile};
    use chrono::TimeZone;
    use petlog_util::ManualClock;

    fn home_at(at: DateTime<Local>) -> HomeData {
        HomeData {
            profile: Profile {
                image_url: String::new(),
                name: "여름".into(),
                age: "2개월".into(),
                weight_kg: 1.0,
                gender: Gender::Female,
            },
            feeding: ActivitySchedule::new(6, at),
            watering: ActivitySchedule::new(6, at),
            elimination: EliminationLog::default(),
            invite_code: "ABC123".into(),
        }
    }

    #[tokio::test]
    async fn fetch_without_group_is_not_found() {
        let backend = MockBackend::new();
        let err = backend.fetch_home().await.unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(backend.fetch_calls(), 1);
    }

    #[tokio::test]
    async fn scripted_responses_come_first() {
        let start = Local.with_ymd_and_hms(2025, 10, 31, 9, 0, 0).unwrap();
        let backend = MockBackend::new().with_home(home_at(start));
        backend.push_response(Err(ApiError::unauthorized("expired")));

        assert!(backend.fetch_home().await.unwrap_err().is_unauthorized());
        assert_eq!(backend.fetch_home().await.unwrap().invite_code, "ABC123");
    }

    #[tokio::test]
    async fn submitted_logs_update_the_stored_home() {
        let start = Local.with_ymd_and_hms(2025, 10, 31, 9, 0, 0).unwrap();
        let later = Local.with_ymd_and_hms(2025, 10, 31, 12, 0, 0).unwrap();
        let clock = Arc::new(ManualClock::new(later));
        let backend = MockBackend::new()
            .with_home(home_at(start))
            .with_clock(clock);

        let log = NewActivityLog::new("서은", Some("조금".into()));
        let record = backend.submit_log(ActivityKind::Feeding, &log).await.unwrap();
        assert_eq!(record.recorded_at, Some(later));

        backend
            .submit_log(ActivityKind::Elimination, &NewActivityLog::new("동하", None))
            .await
            .unwrap();

        let home = backend.home().unwrap();
        assert_eq!(home.feeding.last_event_time, later);
        assert_eq!(home.feeding.last_actor_name, "서은");
        assert_eq!(home.watering.last_event_time, start);
        assert_eq!(home.elimination.count_today, 1);
        assert_eq!(backend.submitted().len(), 2);
    }

    #[tokio::test]
    async fn write_failure_is_one_shot() {
        let start = Local.with_ymd_and_hms(2025, 10, 31, 9, 0, 0).unwrap();
        let backend = MockBackend::new().with_home(home_at(start));
        backend.fail_next_write(ApiError::network("offline"));

        assert!(backend.update_note(Some("hi")).await.is_err());
        backend.update_note(Some("hi")).await.unwrap();
        assert_eq!(backend.fetch_note().await.unwrap().as_deref(), Some("hi"));
    }

    #[tokio::test]
    async fn gated_fetch_waits_for_release() {
        let start = Local.with_ymd_and_hms(2025, 10, 31, 9, 0, 0).unwrap();
        let backend = Arc::new(MockBackend::new().with_home(home_at(start)).gated());

        let task = {
            let backend = backend.clone();
            tokio::spawn(async move { backend.fetch_home().await })
        };
        tokio::task::yield_now().await;
        assert!(!task.is_finished());

        backend.release(1);
        assert!(task.await.unwrap().is_ok());
    }
}
