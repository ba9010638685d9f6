//! Dashboard state and render cycles.
//!
//! The [`Dashboard`] owns everything the surface draws: the tracked
//! cities, the cards from the last completed cycle, the transient banners
//! and the loading state. Fetching happens outside of it: a mutation hands
//! back a [`RenderCycle`], the caller runs it wherever it likes, and feeds
//! the [`CycleReport`] back through [`Dashboard::finish_cycle`]. Each cycle
//! carries a generation number; reports from a cycle that has since been
//! superseded are dropped.

use std::collections::HashMap;
use std::time::Duration;

use futures::future::join_all;
use serde::Serialize;
use tokio::time::Instant;

use crate::{
    CityList, Forecast, ValidationError, WeatherError, WeatherProvider, WeatherSnapshot,
};

pub const DEFAULT_BANNER_TTL: Duration = Duration::from_secs(5);
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(30 * 60);
pub const MAX_BANNER_TTL: Duration = Duration::from_secs(60 * 60);
pub const MAX_REFRESH_INTERVAL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Everything fetched for one city in one cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CityWeather {
    pub snapshot: WeatherSnapshot,
    pub forecast: Forecast,
}

/// One drawn card. `city` is the tracked name and the key for removal;
/// `snapshot.city_name` is whatever the provider resolved it to.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeatherCard {
    pub city: String,
    pub snapshot: WeatherSnapshot,
    pub forecast: Forecast,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CycleState {
    #[default]
    Idle,
    Loading,
    Rendered,
    PartialError {
        failed: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Banner {
    pub message: String,
    pub expires_at: Instant,
}

/// A pending fetch of every city tracked when it was started.
#[derive(Debug, Clone)]
#[must_use = "a render cycle does nothing until it is run"]
pub struct RenderCycle {
    generation: u64,
    cities: Vec<String>,
}

#[derive(Debug)]
pub struct CityOutcome {
    pub city: String,
    pub result: Result<CityWeather, WeatherError>,
}

#[derive(Debug)]
pub struct CycleReport {
    pub generation: u64,
    pub outcomes: Vec<CityOutcome>,
}

impl RenderCycle {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn cities(&self) -> &[String] {
        &self.cities
    }

    /// Fetch current conditions and forecast for every city concurrently.
    pub async fn run(self, provider: &dyn WeatherProvider) -> CycleReport {
        let generation = self.generation;
        let fetches = self.cities.into_iter().map(|city| async move {
            let result = tokio::try_join!(
                provider.fetch_current(&city),
                provider.fetch_forecast(&city)
            )
            .map(|(snapshot, forecast)| CityWeather { snapshot, forecast });

            if let Err(e) = &result {
                tracing::debug!(%city, error = %e, "city fetch failed");
            }
            CityOutcome { city, result }
        });

        CycleReport {
            generation,
            outcomes: join_all(fetches).await,
        }
    }
}

/// Cards for every tracked city that has a result, in list order.
pub fn render(cities: &CityList, results: &HashMap<String, CityWeather>) -> Vec<WeatherCard> {
    cities
        .iter()
        .filter_map(|city| {
            results.get(city).map(|weather| WeatherCard {
                city: city.to_string(),
                snapshot: weather.snapshot.clone(),
                forecast: weather.forecast.clone(),
            })
        })
        .collect()
}

#[derive(Debug)]
pub struct Dashboard {
    cities: CityList,
    state: CycleState,
    generation: u64,
    cards: Vec<WeatherCard>,
    banners: Vec<Banner>,
    banner_ttl: Duration,
}

impl Dashboard {
    pub fn new(cities: CityList) -> Self {
        Self::with_banner_ttl(cities, DEFAULT_BANNER_TTL)
    }

    /// `banner_ttl` is capped at [`MAX_BANNER_TTL`].
    pub fn with_banner_ttl(cities: CityList, banner_ttl: Duration) -> Self {
        Self {
            cities,
            state: CycleState::Idle,
            generation: 0,
            cards: Vec::new(),
            banners: Vec::new(),
            banner_ttl: banner_ttl.min(MAX_BANNER_TTL),
        }
    }

    pub fn cities(&self) -> &CityList {
        &self.cities
    }

    pub fn state(&self) -> CycleState {
        self.state
    }

    pub fn is_loading(&self) -> bool {
        self.state == CycleState::Loading
    }

    pub fn cards(&self) -> &[WeatherCard] {
        &self.cards
    }

    /// Start a new cycle over the current list. Any cycle still in flight
    /// becomes stale.
    pub fn begin_cycle(&mut self) -> RenderCycle {
        self.generation += 1;
        self.state = CycleState::Loading;
        self.cards.clear();

        tracing::debug!(generation = self.generation, cities = self.cities.len(), "render cycle started");
        RenderCycle {
            generation: self.generation,
            cities: self.cities.to_vec(),
        }
    }

    /// Apply a finished cycle. Returns `false` if it was stale and ignored.
    pub fn finish_cycle(&mut self, report: CycleReport, now: Instant) -> bool {
        if report.generation != self.generation {
            tracing::debug!(
                stale = report.generation,
                current = self.generation,
                "discarding superseded render cycle"
            );
            return false;
        }

        let mut results = HashMap::with_capacity(report.outcomes.len());
        let mut failed = 0;
        for outcome in report.outcomes {
            match outcome.result {
                Ok(weather) => {
                    results.insert(outcome.city, weather);
                }
                Err(e) => {
                    failed += 1;
                    self.raise(format!("Failed to fetch weather for {}: {e}", outcome.city), now);
                }
            }
        }

        self.cards = render(&self.cities, &results);
        self.state = if failed == 0 {
            CycleState::Rendered
        } else {
            CycleState::PartialError { failed }
        };

        tracing::info!(
            generation = report.generation,
            cards = self.cards.len(),
            failed,
            "render cycle finished"
        );
        true
    }

    pub fn add_city(&mut self, name: &str, now: Instant) -> Result<RenderCycle, ValidationError> {
        match self.cities.add(name) {
            Ok(added) => {
                tracing::info!(city = %added, "city added");
                Ok(self.begin_cycle())
            }
            Err(e) => {
                self.raise(e.to_string(), now);
                Err(e)
            }
        }
    }

    /// `None` when the city was not tracked.
    pub fn remove_city(&mut self, name: &str) -> Option<RenderCycle> {
        if !self.cities.remove(name) {
            return None;
        }
        tracing::info!(city = name, "city removed");
        Some(self.begin_cycle())
    }

    /// Put a geolocated city at the top of the list.
    pub fn track_located(
        &mut self,
        snapshot: &WeatherSnapshot,
        now: Instant,
    ) -> Result<RenderCycle, ValidationError> {
        match self.cities.prepend(&snapshot.city_name) {
            Ok(()) => {
                tracing::info!(city = %snapshot.city_name, "located city tracked");
                Ok(self.begin_cycle())
            }
            Err(e) => {
                self.raise(e.to_string(), now);
                Err(e)
            }
        }
    }

    /// Scheduled refresh; nothing to do while the list is empty.
    pub fn refresh(&mut self) -> Option<RenderCycle> {
        if self.cities.is_empty() {
            return None;
        }
        Some(self.begin_cycle())
    }

    /// Show a transient banner.
    pub fn raise(&mut self, message: impl Into<String>, now: Instant) {
        let message = message.into();
        tracing::warn!(%message, "banner raised");
        self.banners.push(Banner {
            message,
            expires_at: now + self.banner_ttl,
        });
    }

    /// Banners still on screen at `now`; expired ones are dropped.
    pub fn active_banners(&mut self, now: Instant) -> &[Banner] {
        self.banners.retain(|b| b.expires_at > now);
        &self.banners
    }

    pub fn next_banner_expiry(&self) -> Option<Instant> {
        self.banners.iter().map(|b| b.expires_at).min()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        Coordinates, ForecastDay, GeolocationError, IconCategory, PositionOptions, PositionSource,
        ProviderId, cities::DEFAULT_CITIES, locate_weather,
    };
    use async_trait::async_trait;
    use std::collections::HashSet;

    #[derive(Debug, Default)]
    struct StubProvider {
        unknown: HashSet<String>,
        delays: HashMap<String, Duration>,
    }

    impl StubProvider {
        fn unknown(cities: &[&str]) -> Self {
            Self {
                unknown: cities.iter().map(|c| c.to_string()).collect(),
                ..Self::default()
            }
        }

        async fn pause_for(&self, city: &str) -> Result<(), WeatherError> {
            if let Some(delay) = self.delays.get(city) {
                tokio::time::sleep(*delay).await;
            }
            if self.unknown.contains(city) {
                return Err(WeatherError::NotFound(city.to_string()));
            }
            Ok(())
        }
    }

    fn snapshot(city: &str) -> WeatherSnapshot {
        WeatherSnapshot {
            city_name: city.to_string(),
            country_name: "Testland".into(),
            temperature_c: 12.3,
            feels_like_c: 10.9,
            humidity_pct: 70,
            pressure_hpa: Some(1013.0),
            wind_kph: 14.4,
            condition_text: "Partly cloudy".into(),
            icon: IconCategory::PartlyCloudy,
        }
    }

    fn forecast_day(offset: i64) -> ForecastDay {
        ForecastDay {
            epoch_seconds: 1_709_251_200 + offset * 86_400,
            temp_max_c: 10.0,
            temp_min_c: 4.0,
            temp_avg_c: 7.0,
            condition_text: "Overcast".into(),
            icon: IconCategory::Cloudy,
        }
    }

    #[async_trait]
    impl WeatherProvider for StubProvider {
        fn id(&self) -> ProviderId {
            ProviderId::OpenMeteo
        }

        async fn fetch_current(&self, city: &str) -> Result<WeatherSnapshot, WeatherError> {
            self.pause_for(city).await?;
            Ok(snapshot(city))
        }

        async fn fetch_forecast(&self, city: &str) -> Result<Forecast, WeatherError> {
            self.pause_for(city).await?;
            Ok([forecast_day(1), forecast_day(2), forecast_day(3)])
        }

        async fn fetch_current_by_coordinates(
            &self,
            _coordinates: Coordinates,
        ) -> Result<WeatherSnapshot, WeatherError> {
            Ok(snapshot("Tokyo"))
        }
    }

    fn dashboard() -> Dashboard {
        Dashboard::new(CityList::from_names(DEFAULT_CITIES))
    }

    fn messages(dashboard: &mut Dashboard, now: Instant) -> Vec<String> {
        dashboard
            .active_banners(now)
            .iter()
            .map(|b| b.message.clone())
            .collect()
    }

    #[tokio::test]
    async fn cycle_renders_every_city_in_order() {
        let mut dash = dashboard();
        let cycle = dash.begin_cycle();
        assert!(dash.is_loading());

        let report = cycle.run(&StubProvider::default()).await;
        assert!(dash.finish_cycle(report, Instant::now()));

        let cities: Vec<&str> = dash.cards().iter().map(|c| c.city.as_str()).collect();
        assert_eq!(cities, vec!["London", "New York", "Tokyo"]);
        assert_eq!(dash.state(), CycleState::Rendered);
        assert!(!dash.is_loading());
    }

    #[tokio::test]
    async fn one_failing_city_does_not_block_the_others() {
        let mut dash = Dashboard::new(CityList::from_names(["London", "Atlantis", "Tokyo"]));
        let now = Instant::now();

        let report = dash.begin_cycle().run(&StubProvider::unknown(&["Atlantis"])).await;
        dash.finish_cycle(report, now);

        let cities: Vec<&str> = dash.cards().iter().map(|c| c.city.as_str()).collect();
        assert_eq!(cities, vec!["London", "Tokyo"]);
        assert_eq!(dash.state(), CycleState::PartialError { failed: 1 });
        assert_eq!(
            messages(&mut dash, now),
            vec!["Failed to fetch weather for Atlantis: City not found: Atlantis"]
        );
        // the failed city stays tracked for the next cycle
        assert!(dash.cities().contains("Atlantis"));
    }

    #[tokio::test(start_paused = true)]
    async fn out_of_order_results_are_attributed_by_city() {
        let provider = StubProvider {
            delays: HashMap::from([
                ("London".to_string(), Duration::from_secs(3)),
                ("New York".to_string(), Duration::from_secs(1)),
            ]),
            ..StubProvider::default()
        };

        let mut dash = dashboard();
        let report = dash.begin_cycle().run(&provider).await;
        for outcome in &report.outcomes {
            let weather = outcome.result.as_ref().expect("stub succeeds");
            assert_eq!(weather.snapshot.city_name, outcome.city);
        }

        dash.finish_cycle(report, Instant::now());
        let cities: Vec<&str> = dash.cards().iter().map(|c| c.city.as_str()).collect();
        assert_eq!(cities, vec!["London", "New York", "Tokyo"]);
    }

    #[tokio::test]
    async fn stale_cycle_is_discarded() {
        let mut dash = dashboard();
        let provider = StubProvider::default();

        let first = dash.begin_cycle();
        let second = dash.add_city("Paris", Instant::now()).expect("paris is new");
        assert!(second.generation() > first.generation());

        let stale = first.run(&provider).await;
        assert!(!dash.finish_cycle(stale, Instant::now()));
        assert!(dash.is_loading());
        assert!(dash.cards().is_empty());

        let fresh = second.run(&provider).await;
        assert!(dash.finish_cycle(fresh, Instant::now()));
        assert_eq!(dash.cards().len(), 4);
    }

    #[test]
    fn add_paris_twice() {
        let mut dash = dashboard();
        let now = Instant::now();

        let cycle = dash.add_city("Paris", now).expect("paris is new");
        assert_eq!(cycle.cities(), ["London", "New York", "Tokyo", "Paris"]);

        let err = dash.add_city("Paris", now).unwrap_err();
        assert_eq!(err, ValidationError::Duplicate("Paris".into()));
        assert_eq!(dash.cities().to_vec(), vec!["London", "New York", "Tokyo", "Paris"]);
        assert_eq!(messages(&mut dash, now), vec!["Paris is already in your dashboard"]);
    }

    #[test]
    fn blank_add_reports_and_keeps_list() {
        let mut dash = dashboard();
        let now = Instant::now();

        assert_eq!(dash.add_city("   ", now).unwrap_err(), ValidationError::Blank);
        assert_eq!(dash.cities().len(), 3);
        assert_eq!(dash.state(), CycleState::Idle);
        assert_eq!(messages(&mut dash, now), vec!["Please enter a city name"]);
    }

    #[test]
    fn remove_unknown_city_is_a_no_op() {
        let mut dash = dashboard();
        assert!(dash.remove_city("Paris").is_none());
        assert_eq!(dash.state(), CycleState::Idle);

        let cycle = dash.remove_city("Tokyo").expect("tokyo was tracked");
        assert_eq!(cycle.cities(), ["London", "New York"]);
    }

    #[test]
    fn banners_expire_independently() {
        let mut dash = dashboard();
        let t0 = Instant::now();

        dash.raise("first", t0);
        dash.raise("second", t0 + Duration::from_secs(3));
        assert_eq!(dash.next_banner_expiry(), Some(t0 + Duration::from_secs(5)));

        assert_eq!(messages(&mut dash, t0 + Duration::from_secs(4)), vec!["first", "second"]);
        assert_eq!(messages(&mut dash, t0 + Duration::from_secs(5)), vec!["second"]);
        assert_eq!(dash.next_banner_expiry(), Some(t0 + Duration::from_secs(8)));
        assert!(messages(&mut dash, t0 + Duration::from_secs(8)).is_empty());
        assert_eq!(dash.next_banner_expiry(), None);
    }

    #[test]
    fn huge_banner_ttl_is_capped() {
        let mut dash = Dashboard::with_banner_ttl(CityList::new(), Duration::MAX);
        let t0 = Instant::now();

        dash.raise("sticky", t0);
        assert_eq!(dash.next_banner_expiry(), Some(t0 + MAX_BANNER_TTL));
    }

    #[test]
    fn refresh_skips_empty_list() {
        let mut dash = Dashboard::new(CityList::new());
        assert!(dash.refresh().is_none());

        let mut dash = dashboard();
        assert!(dash.refresh().is_some());
    }

    #[test]
    fn render_is_a_projection_of_the_list() {
        let cities = CityList::from_names(["Oslo", "Rome", "Lima"]);
        let results = HashMap::from([
            (
                "Lima".to_string(),
                CityWeather {
                    snapshot: snapshot("Lima"),
                    forecast: [forecast_day(1), forecast_day(2), forecast_day(3)],
                },
            ),
            (
                "Oslo".to_string(),
                CityWeather {
                    snapshot: snapshot("Oslo"),
                    forecast: [forecast_day(1), forecast_day(2), forecast_day(3)],
                },
            ),
            (
                "Paris".to_string(),
                CityWeather {
                    snapshot: snapshot("Paris"),
                    forecast: [forecast_day(1), forecast_day(2), forecast_day(3)],
                },
            ),
        ]);

        let cards = render(&cities, &results);
        let names: Vec<&str> = cards.iter().map(|c| c.city.as_str()).collect();
        assert_eq!(names, vec!["Oslo", "Lima"]);
    }

    #[tokio::test]
    async fn located_duplicate_is_reported() {
        let mut dash = dashboard();
        let now = Instant::now();
        let provider = StubProvider::default();
        let here = crate::FixedPosition(Coordinates::new(35.68, 139.69));

        let located = locate_weather(&here, &provider, &PositionOptions::default())
            .await
            .expect("fixed position");
        let err = dash.track_located(&located, now).unwrap_err();

        assert_eq!(err, ValidationError::Duplicate("Tokyo".into()));
        assert_eq!(dash.cities().len(), 3);
        assert_eq!(messages(&mut dash, now), vec!["Tokyo is already in your dashboard"]);
    }

    #[test]
    fn located_city_goes_first() {
        let mut dash = dashboard();
        let cycle = dash
            .track_located(&snapshot("Berlin"), Instant::now())
            .expect("berlin is new");
        assert_eq!(cycle.cities()[0], "Berlin");
    }

    #[derive(Debug)]
    struct NeverAnswers;

    #[async_trait]
    impl PositionSource for NeverAnswers {
        async fn current_position(
            &self,
            _options: &PositionOptions,
        ) -> Result<Coordinates, GeolocationError> {
            std::future::pending().await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn geolocation_timeout_leaves_list_unchanged() {
        let mut dash = dashboard();
        let before = dash.cities().clone();

        let err = locate_weather(&NeverAnswers, &StubProvider::default(), &PositionOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, WeatherError::Geolocation(GeolocationError::Timeout)));

        let now = Instant::now();
        dash.raise(err.to_string(), now);
        assert_eq!(
            messages(&mut dash, now),
            vec!["Location request timed out. Please try again."]
        );
        assert_eq!(dash.cities(), &before);
    }
}
