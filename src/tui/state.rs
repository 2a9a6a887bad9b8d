// File: ./src/tui/state.rs
// Manages the application state for the TUI.
use crate::model::{DAYS_OF_WEEK, MealPlan, Profile, Program, User, WeeklySchedule};
use chrono::{Datelike, Local};
use ratatui::widgets::ListState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tab {
    Schedule,
    Meals,
    Account,
}

impl Tab {
    pub fn next(self) -> Self {
        match self {
            Tab::Schedule => Tab::Meals,
            Tab::Meals => Tab::Account,
            Tab::Account => Tab::Schedule,
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Tab::Schedule => "Schedule",
            Tab::Meals => "Meals",
            Tab::Account => "Account",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    EditingProfile,
}

/// The three editable profile fields, in edit order.
pub const PROFILE_FIELDS: [&str; 3] = ["First name", "Last name", "Phone number"];

pub struct AppState {
    // Data mirrored from events; the network actor owns the authoritative
    // store, the UI renders these clones.
    pub user: Option<User>,
    pub schedule: Option<WeeklySchedule>,
    pub meal_plan: Option<MealPlan>,
    pub meal_plans: Vec<MealPlan>,
    pub programs: Vec<Program>,
    pub profile: Option<Profile>,
    /// Distinguishes "not fetched yet" from "fetched, nothing assigned".
    pub meal_plan_fetched: bool,

    // UI state
    pub tab: Tab,
    pub mode: InputMode,
    pub selected_day: usize,
    pub selected_week: u32,
    pub list_state: ListState,
    pub message: String,
    pub loading: bool,
    pub show_help: bool,

    // Profile edit buffers, one per PROFILE_FIELDS entry.
    pub edit_buffers: [String; 3],
    pub edit_index: usize,
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

impl AppState {
    pub fn new() -> Self {
        // Monday-first weekday index, so the picker opens on today.
        let today = Local::now().weekday().num_days_from_monday() as usize;
        Self {
            user: None,
            schedule: None,
            meal_plan: None,
            meal_plans: Vec::new(),
            programs: Vec::new(),
            profile: None,
            meal_plan_fetched: false,
            tab: Tab::Schedule,
            mode: InputMode::Normal,
            selected_day: today,
            selected_week: 1,
            list_state: ListState::default(),
            message: String::new(),
            loading: false,
            show_help: false,
            edit_buffers: Default::default(),
            edit_index: 0,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }

    pub fn selected_day_name(&self) -> &'static str {
        DAYS_OF_WEEK[self.selected_day % DAYS_OF_WEEK.len()]
    }

    pub fn next_day(&mut self) {
        self.selected_day = (self.selected_day + 1) % DAYS_OF_WEEK.len();
    }

    pub fn previous_day(&mut self) {
        self.selected_day = (self.selected_day + DAYS_OF_WEEK.len() - 1) % DAYS_OF_WEEK.len();
    }

    pub fn next_week(&mut self) {
        let max = self.max_week();
        if self.selected_week < max {
            self.selected_week += 1;
        }
    }

    pub fn previous_week(&mut self) {
        if self.selected_week > 1 {
            self.selected_week -= 1;
        }
    }

    fn max_week(&self) -> u32 {
        self.schedule
            .as_ref()
            .and_then(|s| s.weeks.iter().map(|w| w.week_number).max())
            .unwrap_or(1)
    }

    pub fn next_item(&mut self, len: usize) {
        if len == 0 {
            return;
        }
        let i = match self.list_state.selected() {
            Some(i) if i + 1 < len => i + 1,
            Some(i) => i,
            None => 0,
        };
        self.list_state.select(Some(i));
    }

    pub fn previous_item(&mut self) {
        if let Some(i) = self.list_state.selected()
            && i > 0
        {
            self.list_state.select(Some(i - 1));
        }
    }

    /// Enter profile editing with buffers seeded from the cached profile.
    pub fn start_profile_edit(&mut self) {
        if let Some(p) = &self.profile {
            self.edit_buffers = [
                p.first_name.clone().unwrap_or_default(),
                p.last_name.clone().unwrap_or_default(),
                p.phone_number.clone().unwrap_or_default(),
            ];
        } else {
            self.edit_buffers = Default::default();
        }
        self.edit_index = 0;
        self.mode = InputMode::EditingProfile;
    }

    pub fn cancel_profile_edit(&mut self) {
        self.mode = InputMode::Normal;
        self.edit_buffers = Default::default();
        self.edit_index = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_day_navigation_wraps() {
        let mut state = AppState::new();
        state.selected_day = 6;
        state.next_day();
        assert_eq!(state.selected_day_name(), "Monday");
        state.previous_day();
        assert_eq!(state.selected_day_name(), "Sunday");
    }

    #[test]
    fn test_week_navigation_stays_in_range() {
        let mut state = AppState::new();
        state.previous_week();
        assert_eq!(state.selected_week, 1);
        // No schedule loaded: only week 1 exists.
        state.next_week();
        assert_eq!(state.selected_week, 1);
    }

    #[test]
    fn test_tab_cycle() {
        assert_eq!(Tab::Schedule.next(), Tab::Meals);
        assert_eq!(Tab::Meals.next(), Tab::Account);
        assert_eq!(Tab::Account.next(), Tab::Schedule);
    }
}
