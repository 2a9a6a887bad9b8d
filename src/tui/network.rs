// Manages background network operations for the TUI.
//
// Owns the authoritative store, the session manager and the controller;
// the UI talks to it over an action channel and receives cloned snapshots
// back as events.
use crate::client::{ApiClient, TokenHandle};
use crate::config::Config;
use crate::context::AppContext;
use crate::controller::PlanController;
use crate::session::{LoopbackPrompt, SessionManager};
use crate::store::AppStore;
use crate::tui::action::{Action, AppEvent};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::sync::mpsc::{Receiver, Sender};

pub async fn run_network_actor(
    config: Config,
    ctx: Arc<dyn AppContext>,
    mut action_rx: Receiver<Action>,
    event_tx: Sender<AppEvent>,
) {
    let store = Arc::new(Mutex::new(AppStore::new()));
    let tokens = TokenHandle::new();

    let client = match ApiClient::new(&config, tokens.clone()) {
        Ok(c) => c,
        Err(e) => {
            let _ = event_tx
                .send(AppEvent::Error(format!("Client setup failed: {}", e)))
                .await;
            return;
        }
    };

    let session = SessionManager::new(
        store.clone(),
        client.clone(),
        tokens,
        LoopbackPrompt,
        ctx,
        config.clone(),
    );
    let controller = PlanController::new(store.clone(), client, config.freshness_window_ms());

    // 1. Restore a persisted session and prime the main views.
    let mut was_authenticated = false;
    if session.restore().await {
        was_authenticated = true;
        send_session(&store, &event_tx).await;
        let _ = event_tx
            .send(AppEvent::Status("Loading your plan...".to_string()))
            .await;
        initial_load(&controller, &store, &event_tx).await;
        let _ = event_tx.send(AppEvent::Status("Ready.".to_string())).await;
    } else {
        send_session(&store, &event_tx).await;
        let _ = event_tx
            .send(AppEvent::Status("Not signed in.".to_string()))
            .await;
    }

    // 2. Action loop.
    while let Some(action) = action_rx.recv().await {
        match action {
            Action::Quit => break,

            Action::Login => {
                let _ = event_tx
                    .send(AppEvent::Status("Waiting for browser sign-in...".to_string()))
                    .await;
                match session.login().await {
                    Ok(true) => {
                        send_session(&store, &event_tx).await;
                        let _ = event_tx
                            .send(AppEvent::Status("Signed in.".to_string()))
                            .await;
                    }
                    Ok(false) => {
                        let _ = event_tx
                            .send(AppEvent::Status("Sign-in cancelled.".to_string()))
                            .await;
                    }
                    Err(e) => {
                        send_session(&store, &event_tx).await;
                        let _ = event_tx.send(AppEvent::Error(e)).await;
                    }
                }
            }

            Action::Logout => {
                session.logout().await;
                was_authenticated = false;
                send_session(&store, &event_tx).await;
                let _ = event_tx
                    .send(AppEvent::Status("Signed out.".to_string()))
                    .await;
            }

            Action::Refresh => {
                let _ = event_tx
                    .send(AppEvent::Status("Refreshing...".to_string()))
                    .await;
                if let Err(e) = controller.refresh_all().await {
                    let _ = event_tx.send(AppEvent::Error(e)).await;
                } else {
                    let _ = event_tx
                        .send(AppEvent::Status("Refreshed.".to_string()))
                        .await;
                }
                send_schedule(&store, &event_tx).await;
                send_meal_plan(&store, &event_tx).await;
                send_profile(&store, &event_tx).await;
            }

            Action::LoadPrograms => {
                if let Err(e) = controller.load_programs_if_stale().await {
                    let _ = event_tx.send(AppEvent::Error(e)).await;
                }
                send_programs(&store, &event_tx).await;
            }

            Action::LoadMealPlans => {
                if let Err(e) = controller.load_meal_plans_if_stale().await {
                    let _ = event_tx.send(AppEvent::Error(e)).await;
                }
                send_meal_plans(&store, &event_tx).await;
            }

            Action::LoadProfile => {
                if let Err(e) = controller.load_profile_if_stale().await {
                    let _ = event_tx.send(AppEvent::Error(e)).await;
                }
                send_profile(&store, &event_tx).await;
            }

            Action::UpdateProfile(update) => {
                match controller.update_profile(update).await {
                    Ok(()) => {
                        let _ = event_tx
                            .send(AppEvent::Status("Profile saved.".to_string()))
                            .await;
                    }
                    Err(e) => {
                        let _ = event_tx.send(AppEvent::Error(e)).await;
                    }
                }
                send_profile(&store, &event_tx).await;
            }
        }

        // Auto-load the main views once per transition to authenticated.
        let is_authenticated = store.lock().await.session.is_authenticated();
        if is_authenticated && !was_authenticated {
            initial_load(&controller, &store, &event_tx).await;
        }
        was_authenticated = is_authenticated;
    }
}

/// Stale-aware load of the two collections the landing views need.
async fn initial_load(
    controller: &PlanController,
    store: &Arc<Mutex<AppStore>>,
    event_tx: &Sender<AppEvent>,
) {
    if let Err(e) = controller.load_schedule_if_stale().await {
        let _ = event_tx.send(AppEvent::Error(e)).await;
    }
    send_schedule(store, event_tx).await;

    if let Err(e) = controller.load_meal_plan_if_stale().await {
        let _ = event_tx.send(AppEvent::Error(e)).await;
    }
    send_meal_plan(store, event_tx).await;
}

async fn send_session(store: &Arc<Mutex<AppStore>>, event_tx: &Sender<AppEvent>) {
    let user = store.lock().await.session.user.clone();
    let _ = event_tx.send(AppEvent::SessionChanged(user)).await;
}

async fn send_schedule(store: &Arc<Mutex<AppStore>>, event_tx: &Sender<AppEvent>) {
    if let Some(s) = store.lock().await.schedule.snapshot.clone() {
        let _ = event_tx.send(AppEvent::ScheduleLoaded(s)).await;
    }
}

async fn send_meal_plan(store: &Arc<Mutex<AppStore>>, event_tx: &Sender<AppEvent>) {
    let guard = store.lock().await;
    // Only report once the endpoint has actually answered; "no plan yet"
    // and "no plan assigned" render differently.
    if guard.meal_plan.last_fetch_ms.is_some() {
        let snapshot = guard.meal_plan.snapshot.clone();
        drop(guard);
        let _ = event_tx.send(AppEvent::MealPlanLoaded(snapshot)).await;
    }
}

async fn send_meal_plans(store: &Arc<Mutex<AppStore>>, event_tx: &Sender<AppEvent>) {
    if let Some(plans) = store.lock().await.meal_plans.snapshot.clone() {
        let _ = event_tx.send(AppEvent::MealPlansLoaded(plans)).await;
    }
}

async fn send_programs(store: &Arc<Mutex<AppStore>>, event_tx: &Sender<AppEvent>) {
    if let Some(programs) = store.lock().await.programs.snapshot.clone() {
        let _ = event_tx.send(AppEvent::ProgramsLoaded(programs)).await;
    }
}

async fn send_profile(store: &Arc<Mutex<AppStore>>, event_tx: &Sender<AppEvent>) {
    if let Some(profile) = store.lock().await.profile.snapshot.clone() {
        let _ = event_tx.send(AppEvent::ProfileLoaded(profile)).await;
    }
}
