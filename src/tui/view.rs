// File: src/tui/view.rs
use crate::model::{DAYS_OF_WEEK, Meal, MealType};
use crate::tui::state::{AppState, InputMode, PROFILE_FIELDS, Tab};
use strum::IntoEnumIterator;

use ratatui::{
    Frame,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, Paragraph, Tabs, Wrap},
};

pub fn draw(f: &mut Frame, state: &mut AppState) {
    let footer_height = if state.show_help {
        Constraint::Length(6)
    } else {
        Constraint::Length(3)
    };

    let v_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(0), footer_height])
        .split(f.area());

    draw_header(f, state, v_chunks[0]);

    match state.tab {
        Tab::Schedule => draw_schedule(f, state, v_chunks[1]),
        Tab::Meals => draw_meals(f, state, v_chunks[1]),
        Tab::Account => draw_account(f, state, v_chunks[1]),
    }

    draw_footer(f, state, v_chunks[2]);
}

fn draw_header(f: &mut Frame, state: &AppState, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Min(30), Constraint::Length(34)])
        .split(area);

    let titles: Vec<Line> = [Tab::Schedule, Tab::Meals, Tab::Account]
        .iter()
        .map(|t| Line::from(t.title()))
        .collect();
    let selected = match state.tab {
        Tab::Schedule => 0,
        Tab::Meals => 1,
        Tab::Account => 2,
    };
    let tabs = Tabs::new(titles)
        .select(selected)
        .highlight_style(
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        )
        .block(Block::default().borders(Borders::ALL));
    f.render_widget(tabs, chunks[0]);

    let who = match &state.user {
        Some(user) => Span::styled(
            format!(" {} ", user.display_name),
            Style::default().fg(Color::Green),
        ),
        None => Span::styled(" not signed in ", Style::default().fg(Color::DarkGray)),
    };
    let account = Paragraph::new(Line::from(who))
        .alignment(Alignment::Right)
        .block(Block::default().borders(Borders::ALL));
    f.render_widget(account, chunks[1]);
}

fn day_picker_line(state: &AppState) -> Line<'static> {
    let mut spans = Vec::new();
    for (i, day) in DAYS_OF_WEEK.iter().enumerate() {
        let style = if i == state.selected_day {
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::DarkGray)
        };
        spans.push(Span::styled(format!(" {} ", &day[..3]), style));
    }
    Line::from(spans)
}

fn draw_schedule(f: &mut Frame, state: &mut AppState, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(0)])
        .split(area);

    let picker_title = format!(" Week {} (←/→ day, [/] week) ", state.selected_week);
    let picker = Paragraph::new(day_picker_line(state))
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::ALL).title(picker_title));
    f.render_widget(picker, chunks[0]);

    let title = state
        .schedule
        .as_ref()
        .map(|s| format!(" {} ", s.name))
        .unwrap_or_else(|| " Training ".to_string());

    let body: Vec<Line> = match &state.schedule {
        None if !state.is_authenticated() => {
            vec![Line::from("Sign in (i) to see your training schedule.")]
        }
        None => vec![Line::from("No schedule loaded yet. Press r to refresh.")],
        Some(schedule) => {
            match schedule.day(state.selected_week, state.selected_day_name()) {
                None => vec![Line::from(format!(
                    "Rest day: nothing planned for {}.",
                    state.selected_day_name()
                ))],
                Some(day) if day.exercises.is_empty() => {
                    vec![Line::from(format!(
                        "Rest day: nothing planned for {}.",
                        state.selected_day_name()
                    ))]
                }
                Some(day) => day.exercises.iter().map(exercise_line).collect(),
            }
        }
    };

    let para = Paragraph::new(body)
        .wrap(Wrap { trim: true })
        .block(Block::default().borders(Borders::ALL).title(title));
    f.render_widget(para, chunks[1]);
}

fn exercise_line(slot: &crate::model::ExerciseSlot) -> Line<'static> {
    let mut spans = vec![Span::styled(
        format!("{}  ", slot.exercise_name),
        Style::default().add_modifier(Modifier::BOLD),
    )];
    if let (Some(sets), Some(reps)) = (slot.sets, slot.reps) {
        spans.push(Span::raw(format!("{}x{} ", sets, reps)));
    }
    if let Some(weight) = slot.weight {
        spans.push(Span::raw(format!("@ {}kg ", weight)));
    }
    if let Some(rest) = slot.rest_seconds {
        spans.push(Span::styled(
            format!("rest {}s ", rest),
            Style::default().fg(Color::DarkGray),
        ));
    }
    if let Some(notes) = &slot.notes {
        spans.push(Span::styled(
            format!("({})", notes),
            Style::default().fg(Color::DarkGray),
        ));
    }
    Line::from(spans)
}

fn draw_meals(f: &mut Frame, state: &mut AppState, area: Rect) {
    let history_height = if state.meal_plans.is_empty() {
        Constraint::Length(0)
    } else {
        Constraint::Length((state.meal_plans.len() as u16 + 2).min(8))
    };
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(0), history_height])
        .split(area);

    let picker = Paragraph::new(day_picker_line(state))
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::ALL).title(" Day "));
    f.render_widget(picker, chunks[0]);

    let (title, body) = match &state.meal_plan {
        None if !state.is_authenticated() => (
            " Meals ".to_string(),
            vec![Line::from("Sign in (i) to see your meal plan.")],
        ),
        None if !state.meal_plan_fetched => (
            " Meals ".to_string(),
            vec![Line::from("No meal plan loaded yet. Press r to refresh.")],
        ),
        None => (
            " Meals ".to_string(),
            vec![Line::from("No meal plan is currently assigned to you.")],
        ),
        Some(plan) => {
            let day = state.selected_day_name();
            let mut lines = Vec::new();
            for meal_type in MealType::iter() {
                let meals: Vec<&Meal> = plan
                    .meals_for_day(day)
                    .into_iter()
                    .filter(|m| m.meal_type == meal_type)
                    .collect();
                if meals.is_empty() {
                    continue;
                }
                lines.push(Line::from(Span::styled(
                    meal_type.to_string(),
                    Style::default()
                        .fg(Color::Yellow)
                        .add_modifier(Modifier::BOLD),
                )));
                for meal in meals {
                    lines.push(meal_line(meal));
                }
                lines.push(Line::from(""));
            }
            if lines.is_empty() {
                lines.push(Line::from(format!("No meals planned for {}.", day)));
            } else {
                lines.push(Line::from(Span::styled(
                    format!("Total: {} kcal", plan.total_calories_for_day(day)),
                    Style::default().add_modifier(Modifier::BOLD),
                )));
            }
            (format!(" {} ", plan.name), lines)
        }
    };

    let para = Paragraph::new(body)
        .wrap(Wrap { trim: true })
        .block(Block::default().borders(Borders::ALL).title(title));
    f.render_widget(para, chunks[1]);

    if !state.meal_plans.is_empty() {
        let items: Vec<ListItem> = state
            .meal_plans
            .iter()
            .map(|plan| {
                let mut spans = vec![Span::raw(plan.name.clone())];
                if let (Some(start), Some(end)) = (plan.start_date, plan.end_date) {
                    spans.push(Span::styled(
                        format!("  {} to {}", start, end),
                        Style::default().fg(Color::DarkGray),
                    ));
                }
                ListItem::new(Line::from(spans))
            })
            .collect();
        let list = List::new(items)
            .highlight_style(Style::default().add_modifier(Modifier::REVERSED))
            .block(Block::default().borders(Borders::ALL).title(" Plan history "));
        f.render_stateful_widget(list, chunks[2], &mut state.list_state);
    }
}

fn meal_line(meal: &Meal) -> Line<'static> {
    let mut spans = vec![Span::raw(format!("  {}", meal.recipe_name))];
    if let Some(kcal) = meal.calories {
        spans.push(Span::styled(
            format!("  {} kcal", kcal),
            Style::default().fg(Color::DarkGray),
        ));
    }
    if let (Some(p), Some(c), Some(fat)) = (meal.protein, meal.carbs, meal.fat) {
        spans.push(Span::styled(
            format!("  P{:.0} C{:.0} F{:.0}", p, c, fat),
            Style::default().fg(Color::DarkGray),
        ));
    }
    Line::from(spans)
}

fn draw_account(f: &mut Frame, state: &mut AppState, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(area);

    // Left: profile (or the edit form).
    if state.mode == InputMode::EditingProfile {
        let mut lines = Vec::new();
        for (i, label) in PROFILE_FIELDS.iter().enumerate() {
            let style = if i == state.edit_index {
                Style::default()
                    .fg(Color::Cyan)
                    .add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            };
            lines.push(Line::from(vec![
                Span::styled(format!("{:>14}: ", label), style),
                Span::raw(state.edit_buffers[i].clone()),
            ]));
        }
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            "Enter: next/save   Esc: cancel",
            Style::default().fg(Color::DarkGray),
        )));
        let form = Paragraph::new(lines)
            .block(Block::default().borders(Borders::ALL).title(" Edit profile "));
        f.render_widget(form, chunks[0]);
    } else {
        let lines: Vec<Line> = match &state.profile {
            None if !state.is_authenticated() => {
                vec![Line::from("Sign in (i) to manage your account.")]
            }
            None => vec![Line::from("Loading profile...")],
            Some(p) => {
                let field = |label: &str, value: Option<&str>| {
                    Line::from(vec![
                        Span::styled(
                            format!("{:>14}: ", label),
                            Style::default().fg(Color::DarkGray),
                        ),
                        Span::raw(value.unwrap_or("-").to_string()),
                    ])
                };
                vec![
                    field("Username", Some(&p.username)),
                    field("Email", Some(&p.email)),
                    field("First name", p.first_name.as_deref()),
                    field("Last name", p.last_name.as_deref()),
                    field("Phone", p.phone_number.as_deref()),
                    field("Role", Some(&p.role)),
                    Line::from(""),
                    Line::from(Span::styled(
                        "e: edit   o: sign out",
                        Style::default().fg(Color::DarkGray),
                    )),
                ]
            }
        };
        let profile = Paragraph::new(lines)
            .block(Block::default().borders(Borders::ALL).title(" Profile "));
        f.render_widget(profile, chunks[0]);
    }

    // Right: assigned programs.
    let items: Vec<ListItem> = state
        .programs
        .iter()
        .map(|p| {
            let mut spans = vec![Span::raw(p.name.clone())];
            if let Some(weeks) = p.duration {
                spans.push(Span::styled(
                    format!("  ({} weeks)", weeks),
                    Style::default().fg(Color::DarkGray),
                ));
            }
            ListItem::new(Line::from(spans))
        })
        .collect();
    let list = List::new(items)
        .highlight_style(Style::default().add_modifier(Modifier::REVERSED))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(" Programs (p to load) "),
        );
    f.render_stateful_widget(list, chunks[1], &mut state.list_state);
}

fn draw_footer(f: &mut Frame, state: &AppState, area: Rect) {
    if state.show_help {
        let help = vec![
            Line::from(vec![
                Span::styled(
                    " GLOBAL ",
                    Style::default()
                        .fg(Color::Cyan)
                        .add_modifier(Modifier::BOLD),
                ),
                Span::raw(" Tab/1/2/3:Tabs  ?:Help  q:Quit  r:Refresh"),
            ]),
            Line::from(vec![
                Span::styled(
                    " SESSION ",
                    Style::default()
                        .fg(Color::Green)
                        .add_modifier(Modifier::BOLD),
                ),
                Span::raw(" i:Sign in  o:Sign out"),
            ]),
            Line::from(vec![
                Span::styled(
                    " VIEWS ",
                    Style::default()
                        .fg(Color::Yellow)
                        .add_modifier(Modifier::BOLD),
                ),
                Span::raw(" ←/→:Day  [/]:Week  j/k:Select  p:Programs  m:Meal plans  e:Edit profile"),
            ]),
        ];
        let para = Paragraph::new(help).block(Block::default().borders(Borders::ALL));
        f.render_widget(para, area);
        return;
    }

    let style = if state.loading {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default()
    };
    let para = Paragraph::new(Line::from(Span::styled(state.message.clone(), style)))
        .block(Block::default().borders(Borders::ALL).title(" Status (?) "));
    f.render_widget(para, area);
}
