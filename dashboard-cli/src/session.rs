//! Interactive dashboard loop.
//!
//! The session task owns the [`Dashboard`]. Fetches run on spawned tasks
//! and their results come back through a `JoinSet`, so the dashboard is
//! only ever touched from this loop.

use std::{sync::Arc, time::Duration};

use anyhow::Context;
use dashboard_core::{
    Config, CycleReport, Dashboard, PositionOptions, PositionSource, RenderCycle, WeatherError,
    WeatherProvider, WeatherSnapshot, locate_weather,
};
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    task::{JoinError, JoinSet},
    time::{Instant, MissedTickBehavior},
};

use crate::view;

const HELP: &str = "\
Type a city name and press Enter to add it.
  /remove <city>   stop tracking a city
  /locate          add the city you are in
  /refresh         fetch everything again
  /list            show tracked cities
  /help            this text
  /quit            leave";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Input {
    Add(String),
    Remove(String),
    Locate,
    Refresh,
    List,
    Help,
    Quit,
    Unknown(String),
}

fn parse_input(line: &str) -> Input {
    let line = line.trim();
    let Some(command) = line.strip_prefix('/') else {
        return Input::Add(line.to_string());
    };

    let (name, arg) = match command.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, arg.trim()),
        None => (command, ""),
    };

    match (name.to_lowercase().as_str(), arg) {
        ("remove" | "rm", arg) if !arg.is_empty() => Input::Remove(arg.to_string()),
        ("locate" | "here", _) => Input::Locate,
        ("refresh", _) => Input::Refresh,
        ("list" | "ls", _) => Input::List,
        ("help" | "?", _) => Input::Help,
        ("quit" | "exit" | "q", _) => Input::Quit,
        _ => Input::Unknown(line.to_string()),
    }
}

enum TaskOutput {
    Cycle(CycleReport),
    Located(Result<WeatherSnapshot, WeatherError>),
}

pub struct Session {
    dashboard: Dashboard,
    provider: Arc<dyn WeatherProvider>,
    locator: Arc<dyn PositionSource>,
    position: PositionOptions,
    refresh_every: Duration,
    tasks: JoinSet<TaskOutput>,
    locating: bool,
    notice: Option<String>,
}

impl Session {
    pub fn new(
        dashboard: Dashboard,
        provider: Arc<dyn WeatherProvider>,
        locator: Arc<dyn PositionSource>,
        config: &Config,
    ) -> Self {
        Self {
            dashboard,
            provider,
            locator,
            position: config.geolocation.options(),
            refresh_every: config.refresh_interval(),
            tasks: JoinSet::new(),
            locating: false,
            notice: None,
        }
    }

    pub async fn run(mut self) -> anyhow::Result<()> {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();

        let mut refresh =
            tokio::time::interval_at(Instant::now() + self.refresh_every, self.refresh_every);
        refresh.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(
            provider = %self.provider.id(),
            cities = self.dashboard.cities().len(),
            "dashboard session started"
        );

        let initial = self.dashboard.begin_cycle();
        self.spawn_cycle(initial);
        self.redraw();

        loop {
            let banner_expiry = self.dashboard.next_banner_expiry();

            tokio::select! {
                line = lines.next_line() => {
                    let Some(line) = line.context("Failed to read from stdin")? else {
                        break;
                    };
                    if !self.handle(parse_input(&line)) {
                        break;
                    }
                }
                _ = refresh.tick() => {
                    tracing::debug!("scheduled refresh");
                    if let Some(cycle) = self.dashboard.refresh() {
                        self.spawn_cycle(cycle);
                    }
                }
                Some(joined) = self.tasks.join_next() => self.apply(joined),
                _ = tokio::time::sleep_until(banner_expiry.unwrap_or_else(Instant::now)),
                    if banner_expiry.is_some() => {}
            }

            self.redraw();
        }

        self.tasks.abort_all();
        tracing::info!("dashboard session ended");
        Ok(())
    }

    /// Returns `false` when the user asked to leave.
    fn handle(&mut self, input: Input) -> bool {
        let now = Instant::now();

        match input {
            Input::Add(name) => {
                if let Ok(cycle) = self.dashboard.add_city(&name, now) {
                    self.spawn_cycle(cycle);
                }
            }
            Input::Remove(name) => match self.dashboard.remove_city(&name) {
                Some(cycle) => self.spawn_cycle(cycle),
                None => self
                    .dashboard
                    .raise(format!("{name} is not in your dashboard"), now),
            },
            Input::Locate => self.spawn_locate(now),
            Input::Refresh => match self.dashboard.refresh() {
                Some(cycle) => self.spawn_cycle(cycle),
                None => self.dashboard.raise("Nothing to refresh yet", now),
            },
            Input::List => {
                let names: Vec<&str> = self.dashboard.cities().iter().collect();
                self.notice = Some(format!("Tracking: {}", names.join(", ")));
            }
            Input::Help => self.notice = Some(HELP.to_string()),
            Input::Quit => return false,
            Input::Unknown(line) => self
                .dashboard
                .raise(format!("Unknown command: {line} (try /help)"), now),
        }

        true
    }

    fn apply(&mut self, joined: Result<TaskOutput, JoinError>) {
        let now = Instant::now();

        match joined {
            Ok(TaskOutput::Cycle(report)) => {
                self.dashboard.finish_cycle(report, now);
            }
            Ok(TaskOutput::Located(result)) => {
                self.locating = false;
                match result {
                    Ok(snapshot) => {
                        if let Ok(cycle) = self.dashboard.track_located(&snapshot, now) {
                            self.spawn_cycle(cycle);
                        }
                    }
                    Err(WeatherError::Geolocation(e)) => self.dashboard.raise(e.to_string(), now),
                    Err(e) => self
                        .dashboard
                        .raise(format!("Location weather error: {e}"), now),
                }
            }
            Err(e) => {
                tracing::error!(error = %e, "background task failed");
                self.locating = false;
                self.dashboard.raise("A background fetch failed unexpectedly", now);
            }
        }
    }

    fn spawn_cycle(&mut self, cycle: RenderCycle) {
        let provider = Arc::clone(&self.provider);
        self.tasks.spawn(async move {
            TaskOutput::Cycle(cycle.run(provider.as_ref()).await)
        });
    }

    fn spawn_locate(&mut self, now: Instant) {
        if self.locating {
            self.dashboard.raise("Already looking up your location", now);
            return;
        }
        self.locating = true;

        let provider = Arc::clone(&self.provider);
        let locator = Arc::clone(&self.locator);
        let options = self.position;
        self.tasks.spawn(async move {
            TaskOutput::Located(
                locate_weather(locator.as_ref(), provider.as_ref(), &options).await,
            )
        });
    }

    fn redraw(&mut self) {
        let mut screen = String::from("\x1b[2J\x1b[H");
        screen.push_str(&view::draw(&mut self.dashboard, Instant::now()));
        if let Some(notice) = self.notice.take() {
            screen.push('\n');
            screen.push_str(&notice);
            screen.push('\n');
        }
        screen.push_str("\n> ");
        print!("{screen}");

        use std::io::Write as _;
        let _ = std::io::stdout().flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_adds_a_city() {
        assert_eq!(parse_input("  Paris "), Input::Add("Paris".into()));
        assert_eq!(parse_input(""), Input::Add(String::new()));
    }

    #[test]
    fn commands() {
        assert_eq!(parse_input("/remove New York"), Input::Remove("New York".into()));
        assert_eq!(parse_input("/rm   Tokyo  "), Input::Remove("Tokyo".into()));
        assert_eq!(parse_input("/locate"), Input::Locate);
        assert_eq!(parse_input("/REFRESH"), Input::Refresh);
        assert_eq!(parse_input("/list"), Input::List);
        assert_eq!(parse_input("/help"), Input::Help);
        assert_eq!(parse_input("/quit"), Input::Quit);
    }

    #[test]
    fn remove_needs_a_name() {
        assert_eq!(parse_input("/remove"), Input::Unknown("/remove".into()));
        assert_eq!(parse_input("/frobnicate"), Input::Unknown("/frobnicate".into()));
    }
}
