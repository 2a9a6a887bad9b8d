// File: ./src/store.rs
// The application state: session plus one cached snapshot per remote entity.
// The whole store lives behind a single Arc<Mutex<_>> injected into the
// session manager, the controller and the UI actor; nothing else owns a copy.
use crate::model::{MealPlan, Profile, Program, User, WeeklySchedule};
use chrono::Utc;

/// Default staleness window: cached data older than this warrants a refetch.
pub const FRESHNESS_WINDOW_MS: i64 = 60 * 60 * 1000;

pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// Authentication state. `is_authenticated` is derived, never stored:
/// the invariant "token present AND user present" can not drift.
#[derive(Debug, Clone, Default)]
pub struct Session {
    pub access_token: Option<String>,
    pub user: Option<User>,
    pub auth_in_progress: bool,
}

impl Session {
    pub fn is_authenticated(&self) -> bool {
        self.access_token.is_some() && self.user.is_some()
    }

    /// Install token and user together; the pair is never set one-sided.
    pub fn install(&mut self, token: String, user: User) {
        self.access_token = Some(token);
        self.user = Some(user);
        self.auth_in_progress = false;
    }

    pub fn clear(&mut self) {
        self.access_token = None;
        self.user = None;
        self.auth_in_progress = false;
    }
}

/// One authoritative snapshot of a remote entity plus the staleness policy.
/// Mutated only by the controller / session manager; the UI reads clones.
#[derive(Debug, Clone)]
pub struct CachedCollection<T> {
    pub snapshot: Option<T>,
    pub last_fetch_ms: Option<i64>,
    pub is_loading: bool,
    pub last_error: Option<String>,
}

impl<T> Default for CachedCollection<T> {
    fn default() -> Self {
        Self {
            snapshot: None,
            last_fetch_ms: None,
            is_loading: false,
            last_error: None,
        }
    }
}

impl<T> CachedCollection<T> {
    /// Pure staleness check: true if never fetched, or the last fetch is
    /// older than the window. This is the only invalidation policy.
    pub fn should_refetch_within(&self, now_ms: i64, window_ms: i64) -> bool {
        match self.last_fetch_ms {
            None => true,
            Some(at) => now_ms - at > window_ms,
        }
    }

    pub fn should_refetch(&self, now_ms: i64) -> bool {
        self.should_refetch_within(now_ms, FRESHNESS_WINDOW_MS)
    }

    pub fn begin_load(&mut self) {
        self.is_loading = true;
        self.last_error = None;
    }

    /// Successful fetch: replace the snapshot wholesale, stamp freshness.
    pub fn complete(&mut self, snapshot: T, now_ms: i64) {
        self.snapshot = Some(snapshot);
        self.last_fetch_ms = Some(now_ms);
        self.is_loading = false;
        self.last_error = None;
    }

    /// Successful fetch that returned no entity (e.g. no plan assigned).
    /// Freshness is stamped so the empty answer is not refetched in a loop.
    pub fn complete_empty(&mut self, now_ms: i64) {
        self.snapshot = None;
        self.last_fetch_ms = Some(now_ms);
        self.is_loading = false;
        self.last_error = None;
    }

    /// Failed fetch: the previous snapshot stays visible, the error is
    /// recorded for the UI. No automatic retry.
    pub fn fail(&mut self, message: impl Into<String>) {
        self.is_loading = false;
        self.last_error = Some(message.into());
    }

    pub fn reset(&mut self) {
        self.snapshot = None;
        self.last_fetch_ms = None;
        self.is_loading = false;
        self.last_error = None;
    }
}

#[derive(Debug, Clone, Default)]
pub struct AppStore {
    pub session: Session,
    pub schedule: CachedCollection<WeeklySchedule>,
    pub programs: CachedCollection<Vec<Program>>,
    pub meal_plan: CachedCollection<MealPlan>,
    pub meal_plans: CachedCollection<Vec<MealPlan>>,
    pub profile: CachedCollection<Profile>,
}

impl AppStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Logout hygiene: no per-user data may survive into the next session.
    pub fn clear_user_data(&mut self) {
        self.schedule.reset();
        self.programs.reset();
        self.meal_plan.reset();
        self.meal_plans.reset();
        self.profile.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_refetch_when_never_fetched() {
        let cache: CachedCollection<u32> = CachedCollection::default();
        assert!(cache.should_refetch(now_ms()));
    }

    #[test]
    fn test_should_not_refetch_right_after_load() {
        let mut cache: CachedCollection<u32> = CachedCollection::default();
        let now = 1_000_000;
        cache.complete(42, now);
        assert!(!cache.should_refetch(now));
        assert!(!cache.should_refetch(now + FRESHNESS_WINDOW_MS));
    }

    #[test]
    fn test_should_refetch_past_the_window() {
        let mut cache: CachedCollection<u32> = CachedCollection::default();
        let now = 1_000_000;
        cache.complete(42, now);
        assert!(cache.should_refetch(now + FRESHNESS_WINDOW_MS + 1));
    }

    #[test]
    fn test_failure_preserves_snapshot() {
        let mut cache: CachedCollection<u32> = CachedCollection::default();
        cache.complete(42, 1_000);
        cache.begin_load();
        cache.fail("boom");
        assert_eq!(cache.snapshot, Some(42));
        assert_eq!(cache.last_error.as_deref(), Some("boom"));
        assert!(!cache.is_loading);
    }

    #[test]
    fn test_begin_load_clears_previous_error() {
        let mut cache: CachedCollection<u32> = CachedCollection::default();
        cache.fail("boom");
        cache.begin_load();
        assert!(cache.last_error.is_none());
        assert!(cache.is_loading);
    }

    #[test]
    fn test_complete_empty_stamps_freshness() {
        let mut cache: CachedCollection<u32> = CachedCollection::default();
        cache.complete_empty(5_000);
        assert!(cache.snapshot.is_none());
        assert!(!cache.should_refetch(5_000));
    }

    #[test]
    fn test_session_authenticated_is_derived() {
        let mut session = Session::default();
        assert!(!session.is_authenticated());

        session.install("tok".to_string(), crate::model::User {
            id: "u1".to_string(),
            email: "a@b.com".to_string(),
            display_name: "Ada".to_string(),
            avatar_url: None,
        });
        assert!(session.is_authenticated());

        session.clear();
        assert!(!session.is_authenticated());
        assert!(session.access_token.is_none());
        assert!(session.user.is_none());
    }

    #[test]
    fn test_clear_user_data_resets_every_cache() {
        let mut store = AppStore::new();
        store.schedule.fail("x");
        store.programs.complete(vec![], 1);
        store.meal_plans.complete(vec![], 1);
        store.meal_plan.complete_empty(1);
        store.profile.begin_load();

        store.clear_user_data();

        assert!(store.schedule.last_error.is_none());
        assert!(store.programs.last_fetch_ms.is_none());
        assert!(store.meal_plan.last_fetch_ms.is_none());
        assert!(store.meal_plans.snapshot.is_none());
        assert!(!store.profile.is_loading);
    }
}
