use serde::Serialize;
use std::collections::HashMap;
use std::f64::consts::PI;
use thiserror::Error;
use tracing::{info, warn};

use skin_analysis::{AnalysisApi, AnalysisError, Category, DemographicEstimate, ProbabilityMap};

use crate::store::{KeyValueStore, CAPTURED_IMAGE_KEY, DEMOGRAPHICS_KEY};

pub const RACE_DISPLAY_ORDER: &[&str] = &[
    "white",
    "latino hispanic",
    "southeast asian",
    "south asian",
    "black",
    "east asian",
    "middle eastern",
];

pub const AGE_DISPLAY_ORDER: &[&str] = &[
    "0-2", "3-9", "10-19", "20-29", "30-39", "40-49", "50-59", "60-69", "70+",
];

pub const GENDER_DISPLAY_ORDER: &[&str] = &["female", "male"];

/// Radius of the progress ring inside its 100×100 viewbox
pub const RING_RADIUS: f64 = 49.15;

#[derive(Debug, Error)]
pub enum SummaryError {
    #[error("No captured image found.")]
    NoCapturedImage,
    #[error("Failed to fetch demographics")]
    FetchFailed(#[source] AnalysisError),
    #[error("Cached demographics are unreadable: {0}")]
    BadCache(#[from] serde_json::Error),
    #[error("Unknown {category:?} label: {key}")]
    UnknownLabel { category: Category, key: String },
}

pub fn display_order(category: Category) -> &'static [&'static str] {
    match category {
        Category::Race => RACE_DISPLAY_ORDER,
        Category::Age => AGE_DISPLAY_ORDER,
        Category::Gender => GENDER_DISPLAY_ORDER,
    }
}

pub fn header_label(category: Category) -> &'static str {
    match category {
        Category::Race => "Race",
        Category::Age => "Age",
        Category::Gender => "Sex",
    }
}

/// Whole percent, rounded independently per label. NaN and non-positive
/// values show as 0.
pub fn to_percent(probability: f64) -> u32 {
    if probability.is_nan() || probability <= 0.0 {
        return 0;
    }
    (probability * 100.0).round() as u32
}

/// "latino hispanic" -> "Latino Hispanic"
pub fn format_label(key: &str) -> String {
    key.split(' ')
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Label with the strictly greatest probability; the first one wins ties
pub fn best_guess(group: &ProbabilityMap) -> Option<&str> {
    let mut best: Option<(&str, f64)> = None;
    for (key, &p) in group {
        if p.is_nan() {
            continue;
        }
        match best {
            Some((_, best_p)) if p <= best_p => {}
            _ => best = Some((key.as_str(), p)),
        }
    }
    best.map(|(k, _)| k)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Row {
    pub key: String,
    pub label: String,
    pub percent: u32,
}

/// Known labels in display order, then unknown ones as received
pub fn rows(estimate: &DemographicEstimate, category: Category) -> Vec<Row> {
    let group = estimate.group(category);
    let order = display_order(category);

    let mut keys: Vec<&str> = order
        .iter()
        .copied()
        .filter(|k| group.contains_key(*k))
        .collect();
    keys.extend(group.keys().map(String::as_str).filter(|k| !order.contains(k)));

    keys.into_iter()
        .map(|key| Row {
            key: key.to_string(),
            label: match category {
                Category::Age => key.to_string(),
                _ => format_label(key),
            },
            percent: to_percent(group[key]),
        })
        .collect()
}

/// Stroke geometry for the circular percentage ring
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RadialIndicator {
    pub percent: u32,
    pub fraction: f64,
    pub circumference: f64,
    pub arc_length: f64,
    pub dash_offset: f64,
}

impl RadialIndicator {
    pub fn for_percent(percent: u32) -> Self {
        let circumference = 2.0 * PI * RING_RADIUS;
        let fraction = (percent as f64 / 100.0).min(1.0);
        let arc_length = circumference * fraction;
        Self {
            percent,
            fraction,
            circumference,
            arc_length,
            dash_offset: circumference - arc_length,
        }
    }

    pub fn has_arc(&self) -> bool {
        self.arc_length > 0.0
    }
}

/// The demographics screen once data is in hand
#[derive(Debug, Clone)]
pub struct SummaryView {
    estimate: DemographicEstimate,
    active: Category,
    selections: HashMap<Category, String>,
}

impl SummaryView {
    /// Starts on race, every category preselected with its best guess
    pub fn new(estimate: DemographicEstimate) -> Self {
        let selections = Category::ALL
            .iter()
            .filter_map(|&c| best_guess(estimate.group(c)).map(|k| (c, k.to_string())))
            .collect();
        Self {
            estimate,
            active: Category::Race,
            selections,
        }
    }

    pub fn estimate(&self) -> &DemographicEstimate {
        &self.estimate
    }

    pub fn active(&self) -> Category {
        self.active
    }

    pub fn set_active(&mut self, category: Category) {
        self.active = category;
    }

    pub fn selected(&self, category: Category) -> Option<&str> {
        self.selections.get(&category).map(|s| s.as_str())
    }

    pub fn best_guess(&self, category: Category) -> Option<&str> {
        best_guess(self.estimate.group(category))
    }

    /// A row click. Other categories keep their selection.
    pub fn select(&mut self, category: Category, key: &str) -> Result<(), SummaryError> {
        if !self.estimate.group(category).contains_key(key) {
            return Err(SummaryError::UnknownLabel {
                category,
                key: key.to_string(),
            });
        }
        self.selections.insert(category, key.to_string());
        Ok(())
    }

    pub fn rows(&self, category: Category) -> Vec<Row> {
        rows(&self.estimate, category)
    }

    /// The selected row of the active category, else its first row
    pub fn active_row(&self) -> Option<Row> {
        let rows = self.rows(self.active);
        let selected = self.selected(self.active);
        let found = selected.and_then(|key| rows.iter().position(|r| r.key == key));
        match found {
            Some(i) => rows.into_iter().nth(i),
            None => rows.into_iter().next(),
        }
    }

    pub fn indicator(&self) -> RadialIndicator {
        RadialIndicator::for_percent(self.active_row().map(|r| r.percent).unwrap_or(0))
    }

    /// Big label over the ring
    pub fn main_label(&self) -> String {
        match self.active_row() {
            None => "-".to_string(),
            Some(row) => match self.active {
                Category::Race => row.label,
                Category::Age => format!("{} y.o.", row.key),
                Category::Gender => row.label.to_uppercase(),
            },
        }
    }

    /// Text on the category buttons down the left side
    pub fn side_label(&self, category: Category) -> String {
        match self.selected(category) {
            Some(key) if category == Category::Age => key.to_string(),
            Some(key) => format_label(key),
            None => "-".to_string(),
        }
    }

    pub fn snapshot(&self) -> SummarySnapshot {
        SummarySnapshot {
            active: self.active,
            header: header_label(self.active),
            rows: self.rows(self.active),
            selected: self.selected(self.active).map(|s| s.to_string()),
            main_label: self.main_label(),
            indicator: self.indicator(),
            side_labels: Category::ALL
                .iter()
                .map(|&c| (c, self.side_label(c)))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SummarySnapshot {
    pub active: Category,
    pub header: &'static str,
    pub rows: Vec<Row>,
    pub selected: Option<String>,
    pub main_label: String,
    pub indicator: RadialIndicator,
    pub side_labels: Vec<(Category, String)>,
}

/// Lifecycle of the demographics screen
#[derive(Debug, Clone, Default)]
pub enum SummaryScreen {
    #[default]
    Loading,
    Ready(SummaryView),
    Failed(String),
}

impl SummaryScreen {
    pub fn side_label(&self, category: Category) -> String {
        match self {
            SummaryScreen::Loading => "Loading...".to_string(),
            SummaryScreen::Ready(view) => view.side_label(category),
            SummaryScreen::Failed(_) => "-".to_string(),
        }
    }

    pub fn view_mut(&mut self) -> Option<&mut SummaryView> {
        match self {
            SummaryScreen::Ready(view) => Some(view),
            _ => None,
        }
    }
}

/// Get the estimate for the demographics screen.
///
/// A stored photo is always re-submitted and the response cached. Without a
/// photo the cached estimate is used. With neither, nothing is sent.
pub async fn load_estimate(
    store: &dyn KeyValueStore,
    api: &dyn AnalysisApi,
) -> Result<DemographicEstimate, SummaryError> {
    let Some(image) = store.get(CAPTURED_IMAGE_KEY) else {
        return match store.get(DEMOGRAPHICS_KEY) {
            Some(cached) => {
                info!("Using cached demographics");
                Ok(serde_json::from_str(&cached)?)
            }
            None => Err(SummaryError::NoCapturedImage),
        };
    };

    let response = api.submit_image(&image).await.map_err(|e| {
        warn!("Demographics request failed: {}", e);
        SummaryError::FetchFailed(e)
    })?;

    let blob = serde_json::to_string(&response.data)?;
    if let Err(e) = store.set(DEMOGRAPHICS_KEY, &blob) {
        warn!("Failed to cache demographics: {}", e);
    }
    Ok(response.data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use async_trait::async_trait;
    use skin_analysis::{Acknowledgement, AnalysisResponse};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    fn example() -> DemographicEstimate {
        serde_json::from_str(
            r#"{
                "race": {"white": 0.62, "black": 0.38},
                "age": {"20-29": 0.81, "30-39": 0.19},
                "gender": {"female": 0.9, "male": 0.1}
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_default_selection_is_best_guess() {
        let view = SummaryView::new(example());
        assert_eq!(view.selected(Category::Race), Some("white"));
        assert_eq!(view.selected(Category::Age), Some("20-29"));
        assert_eq!(view.selected(Category::Gender), Some("female"));

        let mut view = view;
        assert_eq!(view.active_row().unwrap().percent, 62);
        view.set_active(Category::Age);
        assert_eq!(view.active_row().unwrap().percent, 81);
        view.set_active(Category::Gender);
        assert_eq!(view.active_row().unwrap().percent, 90);
        assert_eq!(view.main_label(), "FEMALE");
    }

    #[test]
    fn test_row_click_only_touches_its_category() {
        let mut view = SummaryView::new(example());
        view.set_active(Category::Age);
        view.select(Category::Age, "30-39").unwrap();

        assert_eq!(view.indicator().percent, 19);
        assert_eq!(view.main_label(), "30-39 y.o.");
        assert_eq!(view.selected(Category::Race), Some("white"));
        assert_eq!(view.selected(Category::Gender), Some("female"));

        view.set_active(Category::Race);
        assert_eq!(view.indicator().percent, 62);
        view.set_active(Category::Age);
        assert_eq!(view.selected(Category::Age), Some("30-39"));
        assert_eq!(view.indicator().percent, 19);
    }

    #[test]
    fn test_unknown_label_rejected() {
        let mut view = SummaryView::new(example());
        let err = view.select(Category::Race, "martian").unwrap_err();
        assert!(matches!(err, SummaryError::UnknownLabel { .. }));
        assert_eq!(view.selected(Category::Race), Some("white"));
    }

    #[test]
    fn test_canonical_order_then_unknown_in_arrival_order() {
        let estimate: DemographicEstimate = serde_json::from_str(
            r#"{"race": {"zeta": 0.01, "black": 0.3, "alpha": 0.02, "latino hispanic": 0.2, "white": 0.47}}"#,
        )
        .unwrap();
        let keys: Vec<String> = rows(&estimate, Category::Race)
            .into_iter()
            .map(|r| r.key)
            .collect();
        assert_eq!(keys, vec!["white", "latino hispanic", "black", "zeta", "alpha"]);
    }

    #[test]
    fn test_row_labels() {
        let estimate: DemographicEstimate = serde_json::from_str(
            r#"{"race": {"middle eastern": 1.0}, "age": {"70+": 1.0}, "gender": {"male": 1.0}}"#,
        )
        .unwrap();
        assert_eq!(rows(&estimate, Category::Race)[0].label, "Middle Eastern");
        assert_eq!(rows(&estimate, Category::Age)[0].label, "70+");
        assert_eq!(rows(&estimate, Category::Gender)[0].label, "Male");
    }

    #[test]
    fn test_percent_rounding() {
        assert_eq!(to_percent(0.5), 50);
        assert_eq!(to_percent(0.0), 0);
        assert_eq!(to_percent(f64::NAN), 0);
        assert_eq!(to_percent(0.004), 0);
        assert_eq!(to_percent(0.005), 1);
        assert_eq!(to_percent(0.999), 100);
    }

    #[test]
    fn test_percentages_not_renormalised() {
        let estimate: DemographicEstimate =
            serde_json::from_str(r#"{"gender": {"female": 0.333, "male": 0.333}}"#).unwrap();
        let total: u32 = rows(&estimate, Category::Gender).iter().map(|r| r.percent).sum();
        assert_eq!(total, 66);
    }

    #[test]
    fn test_best_guess_ties_keep_first() {
        let estimate: DemographicEstimate =
            serde_json::from_str(r#"{"race": {"black": 0.4, "white": 0.4, "east asian": 0.2}}"#)
                .unwrap();
        assert_eq!(best_guess(&estimate.race), Some("black"));
        assert_eq!(best_guess(&ProbabilityMap::new()), None);

        let mut with_nan = ProbabilityMap::new();
        with_nan.insert("white".into(), f64::NAN);
        with_nan.insert("black".into(), 0.1);
        assert_eq!(best_guess(&with_nan), Some("black"));
    }

    #[test]
    fn test_indicator_geometry() {
        let zero = RadialIndicator::for_percent(0);
        assert_eq!(zero.arc_length, 0.0);
        assert!(!zero.has_arc());
        assert!((zero.dash_offset - zero.circumference).abs() < 1e-9);

        let half = RadialIndicator::for_percent(50);
        assert!((half.fraction - 0.5).abs() < 1e-9);
        assert!((half.arc_length - PI * RING_RADIUS).abs() < 1e-9);

        let full = RadialIndicator::for_percent(100);
        assert!(full.dash_offset.abs() < 1e-9);
    }

    #[test]
    fn test_empty_category_shows_dash() {
        let estimate: DemographicEstimate =
            serde_json::from_str(r#"{"race": {"white": 1.0}}"#).unwrap();
        let mut view = SummaryView::new(estimate);
        view.set_active(Category::Age);
        assert!(view.active_row().is_none());
        assert_eq!(view.main_label(), "-");
        assert_eq!(view.indicator().percent, 0);
        assert_eq!(view.side_label(Category::Gender), "-");
        assert_eq!(view.side_label(Category::Race), "White");
    }

    #[test]
    fn test_screen_side_labels() {
        assert_eq!(SummaryScreen::Loading.side_label(Category::Race), "Loading...");
        assert_eq!(
            SummaryScreen::Failed("x".into()).side_label(Category::Age),
            "-"
        );
        let ready = SummaryScreen::Ready(SummaryView::new(example()));
        assert_eq!(ready.side_label(Category::Age), "20-29");
    }

    struct FakeApi {
        image_calls: AtomicUsize,
        last_image: Mutex<Option<String>>,
        fail_with: Option<u16>,
    }

    impl FakeApi {
        fn new(fail_with: Option<u16>) -> Self {
            Self {
                image_calls: AtomicUsize::new(0),
                last_image: Mutex::new(None),
                fail_with,
            }
        }
    }

    #[async_trait]
    impl AnalysisApi for FakeApi {
        async fn submit_identity(
            &self,
            _: &str,
            _: &str,
        ) -> Result<Acknowledgement, AnalysisError> {
            unreachable!("summary never submits identity")
        }

        async fn submit_image(&self, image: &str) -> Result<AnalysisResponse, AnalysisError> {
            self.image_calls.fetch_add(1, Ordering::SeqCst);
            *self.last_image.lock().unwrap() = Some(image.to_string());
            match self.fail_with {
                Some(status) => Err(AnalysisError::Status {
                    status,
                    body: String::new(),
                }),
                None => Ok(AnalysisResponse {
                    message: "ok".into(),
                    data: example(),
                }),
            }
        }
    }

    #[tokio::test]
    async fn test_no_image_no_cache_makes_no_request() {
        let store = MemoryStore::new();
        let api = FakeApi::new(None);
        let err = load_estimate(&store, &api).await.unwrap_err();
        assert!(matches!(err, SummaryError::NoCapturedImage));
        assert_eq!(err.to_string(), "No captured image found.");
        assert_eq!(api.image_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_cached_estimate_used_without_image() {
        let store = MemoryStore::new();
        store
            .set(DEMOGRAPHICS_KEY, &serde_json::to_string(&example()).unwrap())
            .unwrap();
        let api = FakeApi::new(None);
        let estimate = load_estimate(&store, &api).await.unwrap();
        assert_eq!(estimate, example());
        assert_eq!(api.image_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_image_is_submitted_and_cached() {
        let store = MemoryStore::new();
        store
            .set(CAPTURED_IMAGE_KEY, "data:image/jpeg;base64,QUJD")
            .unwrap();
        let api = FakeApi::new(None);

        let estimate = load_estimate(&store, &api).await.unwrap();
        assert_eq!(estimate, example());
        assert_eq!(api.image_calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            api.last_image.lock().unwrap().as_deref(),
            Some("data:image/jpeg;base64,QUJD")
        );

        let cached: DemographicEstimate =
            serde_json::from_str(&store.get(DEMOGRAPHICS_KEY).unwrap()).unwrap();
        assert_eq!(cached, example());
    }

    #[tokio::test]
    async fn test_failed_fetch_keeps_old_cache() {
        let store = MemoryStore::new();
        store.set(CAPTURED_IMAGE_KEY, "QUJD").unwrap();
        store.set(DEMOGRAPHICS_KEY, "{}").unwrap();
        let api = FakeApi::new(Some(503));

        let err = load_estimate(&store, &api).await.unwrap_err();
        assert_eq!(err.to_string(), "Failed to fetch demographics");
        assert_eq!(store.get(DEMOGRAPHICS_KEY).as_deref(), Some("{}"));
    }
}
