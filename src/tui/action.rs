// Defines actions and events for TUI interaction and state updates.
use crate::model::{MealPlan, Profile, ProfileUpdate, Program, User, WeeklySchedule};

#[derive(Debug)]
pub enum Action {
    Login,
    Logout,
    Refresh,
    LoadPrograms,
    LoadMealPlans,
    LoadProfile,
    UpdateProfile(ProfileUpdate),
    Quit,
}

#[derive(Debug)]
pub enum AppEvent {
    /// Session transition: `Some(user)` after login/restore, `None` after
    /// logout or a failed attempt.
    SessionChanged(Option<User>),
    ScheduleLoaded(WeeklySchedule),
    /// `None` means the fetch succeeded but no plan is currently assigned.
    MealPlanLoaded(Option<MealPlan>),
    MealPlansLoaded(Vec<MealPlan>),
    ProgramsLoaded(Vec<Program>),
    ProfileLoaded(Profile),
    Error(String),
    Status(String),
}
