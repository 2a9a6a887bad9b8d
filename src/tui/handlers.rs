// File: ./src/tui/handlers.rs
// Translates key presses into actions and applies network events to state.
use crate::model::ProfileUpdate;
use crate::tui::action::{Action, AppEvent};
use crate::tui::state::{AppState, InputMode, PROFILE_FIELDS, Tab};
use crossterm::event::{KeyCode, KeyEvent};

/// Apply one network event to the UI state.
pub fn handle_app_event(state: &mut AppState, event: AppEvent) {
    match event {
        AppEvent::SessionChanged(user) => {
            let logged_out = user.is_none();
            state.user = user;
            if logged_out {
                // Mirror the store: nothing user-scoped survives a logout.
                state.schedule = None;
                state.meal_plan = None;
                state.meal_plan_fetched = false;
                state.meal_plans.clear();
                state.programs.clear();
                state.profile = None;
                state.cancel_profile_edit();
            }
        }
        AppEvent::ScheduleLoaded(schedule) => {
            state.schedule = Some(schedule);
        }
        AppEvent::MealPlanLoaded(plan) => {
            state.meal_plan = plan;
            state.meal_plan_fetched = true;
        }
        AppEvent::MealPlansLoaded(plans) => {
            state.meal_plans = plans;
        }
        AppEvent::ProgramsLoaded(programs) => {
            state.programs = programs;
        }
        AppEvent::ProfileLoaded(profile) => {
            state.profile = Some(profile);
        }
        AppEvent::Error(e) => {
            state.loading = false;
            state.message = e;
        }
        AppEvent::Status(s) => {
            state.loading = s.ends_with("...");
            state.message = s;
        }
    }
}

/// Translate a key press into an optional action for the network actor.
pub fn handle_key_event(key: KeyEvent, state: &mut AppState) -> Option<Action> {
    if state.mode == InputMode::EditingProfile {
        return handle_edit_key(key, state);
    }

    match key.code {
        KeyCode::Char('q') => return Some(Action::Quit),
        KeyCode::Char('?') => state.show_help = !state.show_help,

        KeyCode::Tab => {
            state.tab = state.tab.next();
            state.list_state.select(None);
            return on_tab_entered(state);
        }
        KeyCode::Char('1') => {
            state.tab = Tab::Schedule;
        }
        KeyCode::Char('2') => {
            state.tab = Tab::Meals;
        }
        KeyCode::Char('3') => {
            state.tab = Tab::Account;
            return on_tab_entered(state);
        }

        KeyCode::Left | KeyCode::Char('h') => state.previous_day(),
        KeyCode::Right | KeyCode::Char('l') => state.next_day(),
        KeyCode::Char('[') => state.previous_week(),
        KeyCode::Char(']') => state.next_week(),

        KeyCode::Down | KeyCode::Char('j') => {
            let len = match state.tab {
                Tab::Account => state.programs.len(),
                Tab::Meals => state.meal_plans.len(),
                Tab::Schedule => 0,
            };
            state.next_item(len);
        }
        KeyCode::Up | KeyCode::Char('k') => state.previous_item(),

        KeyCode::Char('r') => return Some(Action::Refresh),
        KeyCode::Char('i') => {
            if !state.is_authenticated() {
                return Some(Action::Login);
            }
            state.message = "Already signed in.".to_string();
        }
        KeyCode::Char('o') => {
            if state.is_authenticated() {
                return Some(Action::Logout);
            }
        }
        KeyCode::Char('p') => return Some(Action::LoadPrograms),
        KeyCode::Char('m') => return Some(Action::LoadMealPlans),
        KeyCode::Char('e') => {
            if state.tab == Tab::Account && state.is_authenticated() {
                state.start_profile_edit();
            }
        }
        _ => {}
    }
    None
}

/// Entering a tab lazily tops up the data it shows.
fn on_tab_entered(state: &AppState) -> Option<Action> {
    if !state.is_authenticated() {
        return None;
    }
    match state.tab {
        Tab::Account => Some(Action::LoadProfile),
        Tab::Meals => Some(Action::LoadMealPlans),
        Tab::Schedule => None,
    }
}

fn handle_edit_key(key: KeyEvent, state: &mut AppState) -> Option<Action> {
    match key.code {
        KeyCode::Esc => state.cancel_profile_edit(),
        KeyCode::Backspace => {
            state.edit_buffers[state.edit_index].pop();
        }
        KeyCode::Char(c) => state.edit_buffers[state.edit_index].push(c),
        KeyCode::Tab | KeyCode::Down => {
            state.edit_index = (state.edit_index + 1) % PROFILE_FIELDS.len();
        }
        KeyCode::Up => {
            state.edit_index =
                (state.edit_index + PROFILE_FIELDS.len() - 1) % PROFILE_FIELDS.len();
        }
        KeyCode::Enter => {
            if state.edit_index + 1 < PROFILE_FIELDS.len() {
                state.edit_index += 1;
            } else {
                let update = build_profile_update(state);
                state.cancel_profile_edit();
                if update.is_empty() {
                    state.message = "No profile changes.".to_string();
                } else {
                    return Some(Action::UpdateProfile(update));
                }
            }
        }
        _ => {}
    }
    None
}

/// Only fields that differ from the cached profile go into the request.
fn build_profile_update(state: &AppState) -> ProfileUpdate {
    let current = state.profile.as_ref();
    let field = |i: usize, existing: Option<&str>| -> Option<String> {
        let edited = state.edit_buffers[i].trim();
        if edited == existing.unwrap_or_default() {
            None
        } else {
            Some(edited.to_string())
        }
    };

    ProfileUpdate {
        first_name: field(0, current.and_then(|p| p.first_name.as_deref())),
        last_name: field(1, current.and_then(|p| p.last_name.as_deref())),
        phone_number: field(2, current.and_then(|p| p.phone_number.as_deref())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Profile;
    use crossterm::event::KeyModifiers;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn profile() -> Profile {
        Profile {
            id: "u1".to_string(),
            username: "ada".to_string(),
            email: "a@b.com".to_string(),
            first_name: Some("Ada".to_string()),
            last_name: None,
            role: "client".to_string(),
            phone_number: None,
        }
    }

    #[test]
    fn test_quit_key() {
        let mut state = AppState::new();
        assert!(matches!(
            handle_key_event(key(KeyCode::Char('q')), &mut state),
            Some(Action::Quit)
        ));
    }

    #[test]
    fn test_login_only_when_logged_out() {
        let mut state = AppState::new();
        assert!(matches!(
            handle_key_event(key(KeyCode::Char('i')), &mut state),
            Some(Action::Login)
        ));

        state.user = Some(crate::model::User {
            id: "u1".to_string(),
            email: "a@b.com".to_string(),
            display_name: "Ada".to_string(),
            avatar_url: None,
        });
        assert!(handle_key_event(key(KeyCode::Char('i')), &mut state).is_none());
    }

    #[test]
    fn test_session_changed_to_logged_out_clears_views() {
        let mut state = AppState::new();
        state.profile = Some(profile());
        state.meal_plan_fetched = true;
        handle_app_event(&mut state, AppEvent::SessionChanged(None));
        assert!(state.profile.is_none());
        assert!(!state.meal_plan_fetched);
    }

    #[test]
    fn test_profile_edit_sends_only_changed_fields() {
        let mut state = AppState::new();
        state.user = Some(crate::model::User {
            id: "u1".to_string(),
            email: "a@b.com".to_string(),
            display_name: "Ada".to_string(),
            avatar_url: None,
        });
        state.profile = Some(profile());
        state.tab = Tab::Account;

        handle_key_event(key(KeyCode::Char('e')), &mut state);
        assert_eq!(state.mode, InputMode::EditingProfile);
        assert_eq!(state.edit_buffers[0], "Ada");

        // Leave first name untouched, set the last name, commit through the
        // remaining field.
        handle_key_event(key(KeyCode::Enter), &mut state);
        for c in "Lovelace".chars() {
            handle_key_event(key(KeyCode::Char(c)), &mut state);
        }
        handle_key_event(key(KeyCode::Enter), &mut state);
        let action = handle_key_event(key(KeyCode::Enter), &mut state);

        match action {
            Some(Action::UpdateProfile(update)) => {
                assert!(update.first_name.is_none());
                assert_eq!(update.last_name.as_deref(), Some("Lovelace"));
                assert!(update.phone_number.is_none());
            }
            other => panic!("expected profile update, got {:?}", other),
        }
        assert_eq!(state.mode, InputMode::Normal);
    }

    #[test]
    fn test_profile_edit_escape_cancels() {
        let mut state = AppState::new();
        state.profile = Some(profile());
        state.start_profile_edit();
        handle_key_event(key(KeyCode::Esc), &mut state);
        assert_eq!(state.mode, InputMode::Normal);
    }
}
