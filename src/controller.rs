// File: ./src/controller.rs
//! Orchestrates loads of the remote collections into the shared store.
//!
//! Every load follows the same shape: guard (authenticated, not already
//! loading), mark loading, drop the store lock, fetch, re-lock, record the
//! outcome. The store mutex is never held across network IO.
use crate::client::ApiClient;
use crate::model::ProfileUpdate;
use crate::store::{AppStore, CachedCollection, now_ms};
use std::sync::Arc;
use tokio::sync::Mutex;

pub struct PlanController {
    store: Arc<Mutex<AppStore>>,
    client: ApiClient,
    window_ms: i64,
}

/// Outcome of a guard check, decided under the store lock.
enum Gate {
    Go,
    Skip(&'static str),
}

impl PlanController {
    pub fn new(store: Arc<Mutex<AppStore>>, client: ApiClient, window_ms: i64) -> Self {
        Self {
            store,
            client,
            window_ms,
        }
    }

    /// Guard shared by every load: requires an authenticated session and no
    /// load already in flight for the collection (single-flight). On `Go`
    /// the collection is already marked loading.
    async fn gate<T>(
        &self,
        pick: impl Fn(&mut AppStore) -> &mut CachedCollection<T>,
        only_if_stale: bool,
    ) -> Gate {
        let mut store = self.store.lock().await;
        if !store.session.is_authenticated() {
            return Gate::Skip("not authenticated");
        }
        let cache = pick(&mut store);
        if cache.is_loading {
            return Gate::Skip("load already in flight");
        }
        if only_if_stale && !cache.should_refetch_within(now_ms(), self.window_ms) {
            return Gate::Skip("cache is fresh");
        }
        cache.begin_load();
        Gate::Go
    }

    /// Shared load path. `fetch` is lazy, so building it before the gate
    /// costs nothing when the load is skipped.
    async fn load_collection<T>(
        &self,
        name: &'static str,
        pick: impl Fn(&mut AppStore) -> &mut CachedCollection<T>,
        only_if_stale: bool,
        fetch: impl Future<Output = Result<T, String>>,
    ) -> Result<(), String> {
        if let Gate::Skip(why) = self.gate(&pick, only_if_stale).await {
            log::debug!("Skipping {} load: {}", name, why);
            return Ok(());
        }

        match fetch.await {
            Ok(snapshot) => {
                log::debug!("Loaded {}", name);
                pick(&mut *self.store.lock().await).complete(snapshot, now_ms());
                Ok(())
            }
            Err(e) => {
                log::warn!("Failed to load {}: {}", name, e);
                pick(&mut *self.store.lock().await).fail(e.clone());
                Err(e)
            }
        }
    }

    // --- WEEKLY SCHEDULE ---

    pub async fn load_schedule(&self) -> Result<(), String> {
        self.load_collection(
            "schedule",
            |s| &mut s.schedule,
            false,
            self.client.get_weekly_schedule(),
        )
        .await
    }

    pub async fn load_schedule_if_stale(&self) -> Result<(), String> {
        self.load_collection(
            "schedule",
            |s| &mut s.schedule,
            true,
            self.client.get_weekly_schedule(),
        )
        .await
    }

    // --- PROGRAMS ---

    pub async fn load_programs(&self) -> Result<(), String> {
        self.load_collection(
            "programs",
            |s| &mut s.programs,
            false,
            self.client.list_programs(),
        )
        .await
    }

    pub async fn load_programs_if_stale(&self) -> Result<(), String> {
        self.load_collection(
            "programs",
            |s| &mut s.programs,
            true,
            self.client.list_programs(),
        )
        .await
    }

    // --- MEAL PLANS ---

    /// The current plan endpoint may legitimately answer "no plan assigned";
    /// that is a successful, cacheable empty result, not an error.
    pub async fn load_meal_plan(&self) -> Result<(), String> {
        self.load_current_meal_plan(false).await
    }

    pub async fn load_meal_plan_if_stale(&self) -> Result<(), String> {
        self.load_current_meal_plan(true).await
    }

    async fn load_current_meal_plan(&self, only_if_stale: bool) -> Result<(), String> {
        if let Gate::Skip(why) = self.gate(|s| &mut s.meal_plan, only_if_stale).await {
            log::debug!("Skipping meal plan load: {}", why);
            return Ok(());
        }

        match self.client.get_current_meal_plan().await {
            Ok(Some(plan)) => {
                self.store.lock().await.meal_plan.complete(plan, now_ms());
                Ok(())
            }
            Ok(None) => {
                log::debug!("No meal plan currently assigned");
                self.store.lock().await.meal_plan.complete_empty(now_ms());
                Ok(())
            }
            Err(e) => {
                log::warn!("Failed to load meal plan: {}", e);
                self.store.lock().await.meal_plan.fail(e.clone());
                Err(e)
            }
        }
    }

    pub async fn load_meal_plans(&self) -> Result<(), String> {
        self.load_collection(
            "meal plans",
            |s| &mut s.meal_plans,
            false,
            self.client.list_meal_plans(),
        )
        .await
    }

    pub async fn load_meal_plans_if_stale(&self) -> Result<(), String> {
        self.load_collection(
            "meal plans",
            |s| &mut s.meal_plans,
            true,
            self.client.list_meal_plans(),
        )
        .await
    }

    // --- PROFILE ---

    pub async fn load_profile(&self) -> Result<(), String> {
        self.load_collection(
            "profile",
            |s| &mut s.profile,
            false,
            self.client.get_current_user(),
        )
        .await
    }

    pub async fn load_profile_if_stale(&self) -> Result<(), String> {
        self.load_collection(
            "profile",
            |s| &mut s.profile,
            true,
            self.client.get_current_user(),
        )
        .await
    }

    /// Push a partial profile update; the server's answer replaces the
    /// cached profile snapshot so the UI reflects the authoritative state.
    pub async fn update_profile(&self, update: ProfileUpdate) -> Result<(), String> {
        if update.is_empty() {
            log::debug!("Empty profile update; nothing to send");
            return Ok(());
        }
        if let Gate::Skip(why) = self.gate(|s| &mut s.profile, false).await {
            log::debug!("Skipping profile update: {}", why);
            return Ok(());
        }

        match self.client.update_profile(&update).await {
            Ok(profile) => {
                self.store.lock().await.profile.complete(profile, now_ms());
                Ok(())
            }
            Err(e) => {
                log::warn!("Failed to update profile: {}", e);
                self.store.lock().await.profile.fail(e.clone());
                Err(e)
            }
        }
    }

    /// Force-refresh everything the main views show. Errors are recorded in
    /// the respective caches; the first one is also surfaced to the caller.
    pub async fn refresh_all(&self) -> Result<(), String> {
        let mut first_err = None;
        for result in [
            self.load_schedule().await,
            self.load_meal_plan().await,
            self.load_profile().await,
        ] {
            if let Err(e) = result
                && first_err.is_none()
            {
                first_err = Some(e);
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
