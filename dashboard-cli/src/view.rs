use std::fmt::Write;

use dashboard_core::{CycleState, Dashboard, ForecastDay, WeatherCard};
use tokio::time::Instant;

/// Full-screen text for the current dashboard state.
pub fn draw(dashboard: &mut Dashboard, now: Instant) -> String {
    let mut out = String::new();

    match dashboard.state() {
        CycleState::Loading => out.push_str("⟳ Loading weather...\n\n"),
        CycleState::Idle if dashboard.cities().is_empty() => {
            out.push_str("No cities yet. Type a city name to add it.\n\n")
        }
        _ => {}
    }

    for card in dashboard.cards() {
        out.push_str(&card_text(card));
        out.push('\n');
    }

    for banner in dashboard.active_banners(now) {
        let _ = writeln!(out, "⚠ {}", banner.message);
    }

    out
}

pub fn card_text(card: &WeatherCard) -> String {
    let s = &card.snapshot;
    let mut out = String::new();

    let _ = writeln!(out, "📍 {}  [{}]", s.display_name(), card.city);
    let _ = writeln!(
        out,
        "   {} {}°C  {}",
        s.icon.glyph(),
        round(s.temperature_c),
        s.condition_text
    );
    let pressure = s
        .pressure_hpa
        .map(|p| format!("{} hPa", round(p)))
        .unwrap_or_else(|| "N/A hPa".to_string());
    let _ = writeln!(
        out,
        "   Feels like {}°C · Humidity {}% · Wind {} km/h · {}",
        round(s.feels_like_c),
        s.humidity_pct,
        round(s.wind_kph),
        pressure
    );

    let days: Vec<String> = card.forecast.iter().map(forecast_text).collect();
    let _ = writeln!(out, "   {}", days.join("  |  "));

    out
}

fn forecast_text(day: &ForecastDay) -> String {
    let date = day
        .date()
        .map(|d| d.format("%a, %b %-d").to_string())
        .unwrap_or_else(|| "?".to_string());
    format!("{date} {} {}°C", day.icon.glyph(), round(day.temp_avg_c))
}

fn round(value: f64) -> i64 {
    value.round() as i64
}
