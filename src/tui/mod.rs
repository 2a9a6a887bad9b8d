// File: ./src/tui/mod.rs
// Entry point and main loop for the TUI application.
pub mod action;
pub mod handlers;
pub mod network;
pub mod state;
pub mod view;

use crate::config;
use crate::context::{AppContext, StandardContext};
use crate::tui::state::AppState;
use crate::tui::view::draw;

use anyhow::Result;
use crossterm::{
    event::{self, Event},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{Terminal, backend::CrosstermBackend};
use std::{
    env,
    io::{self, Write},
    sync::Arc,
    time::Duration,
};
use tokio::sync::mpsc;

pub async fn run() -> Result<()> {
    // --- 1. PREAMBLE & CONFIG ---
    let args: Vec<String> = env::args().collect();
    if args.len() > 1 && (args[1] == "--help" || args[1] == "-h") {
        println!(
            "Fitcoach v{} - Terminal client for your coaching plan",
            env!("CARGO_PKG_VERSION")
        );
        println!();
        println!("USAGE:");
        println!("    fitcoach");
        println!();
        println!("KEYBINDINGS:");
        println!("    Tab / 1 2 3       Switch between Schedule, Meals and Account");
        println!("    Left/Right        Previous / next weekday");
        println!("    [ ]               Previous / next training week");
        println!("    i / o             Sign in / sign out");
        println!("    r                 Refresh from the server");
        println!("    p / m             Load assigned programs / meal plan history");
        println!("    e                 Edit profile (Account tab)");
        println!("    ?                 Toggle help");
        println!("    q                 Quit");
        return Ok(());
    }

    let ctx: Arc<dyn AppContext> = Arc::new(StandardContext::new(None));

    let cfg = match config::Config::load(ctx.as_ref()) {
        Ok(c) => c,
        Err(e) => {
            // A syntax/permission error is reported as-is; only a genuinely
            // missing file triggers onboarding.
            if !config::Config::is_missing_config_error(&e) {
                eprintln!("Error loading configuration:\n{}", e);
                std::process::exit(1);
            }

            println!("Welcome to Fitcoach. No configuration file found.");
            println!("Enter the details your coaching provider gave you.\n");

            let mut new_config = config::Config::default();

            print!("API base URL (e.g. https://api.example.com): ");
            io::stdout().flush()?;
            let mut api_url = String::new();
            io::stdin().read_line(&mut api_url)?;
            new_config.api_url = api_url.trim().trim_end_matches('/').to_string();

            print!("Authorization server URL (e.g. https://tenant.auth0.com): ");
            io::stdout().flush()?;
            let mut issuer = String::new();
            io::stdin().read_line(&mut issuer)?;
            new_config.issuer_url = issuer.trim().trim_end_matches('/').to_string();

            print!("OAuth client id: ");
            io::stdout().flush()?;
            let mut client_id = String::new();
            io::stdin().read_line(&mut client_id)?;
            new_config.client_id = client_id.trim().to_string();

            print!("API audience [{}]: ", new_config.api_url);
            io::stdout().flush()?;
            let mut audience = String::new();
            io::stdin().read_line(&mut audience)?;
            new_config.audience = if audience.trim().is_empty() {
                new_config.api_url.clone()
            } else {
                audience.trim().to_string()
            };

            if let Err(e) = new_config.save(ctx.as_ref()) {
                eprintln!("Warning: Could not save config file: {}", e);
            } else if let Ok(path) = config::Config::get_path_string(ctx.as_ref()) {
                println!("Configuration saved to: {}", path);
            }

            println!("Starting...");
            std::thread::sleep(Duration::from_secs(1));
            new_config
        }
    };

    // --- 2. TERMINAL SETUP ---
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // --- 3. STATE & CHANNELS ---
    let mut app_state = AppState::new();
    let (action_tx, action_rx) = mpsc::channel(10);
    let (event_tx, mut event_rx) = mpsc::channel(10);

    // --- 4. NETWORK ACTOR ---
    tokio::spawn(network::run_network_actor(cfg, ctx, action_rx, event_tx));

    // --- 5. UI LOOP ---
    loop {
        terminal.draw(|f| draw(f, &mut app_state))?;

        // A. Network Events
        if let Ok(event) = event_rx.try_recv() {
            handlers::handle_app_event(&mut app_state, event);
        }

        // B. Input Events
        if crossterm::event::poll(Duration::from_millis(50))?
            && let Event::Key(key) = event::read()?
        {
            // Filter out KeyRelease events to prevent double input on Windows
            if key.kind == event::KeyEventKind::Release {
                continue;
            }

            if let Some(action) = handlers::handle_key_event(key, &mut app_state) {
                let quitting = matches!(action, action::Action::Quit);
                let _ = action_tx.send(action).await;
                if quitting {
                    break;
                }
            }
        }
    }

    // --- 6. CLEANUP ---
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}
