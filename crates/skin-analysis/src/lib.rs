pub mod client;
pub mod config;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

pub use client::{AnalysisApi, AnalysisClient, AnalysisError};
pub use config::ApiConfig;

/// Label → probability, kept in the order the service returned them
pub type ProbabilityMap = IndexMap<String, f64>;

/// The three demographic groups the analysis service predicts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Race,
    Age,
    Gender,
}

impl Category {
    pub const ALL: [Category; 3] = [Category::Race, Category::Age, Category::Gender];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Race => "race",
            Category::Age => "age",
            Category::Gender => "gender",
        }
    }
}

impl std::str::FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "race" => Ok(Category::Race),
            "age" => Ok(Category::Age),
            "gender" | "sex" => Ok(Category::Gender),
            other => Err(format!("Unknown category: {}", other)),
        }
    }
}

/// Race, age-bracket and gender probabilities for one photo
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DemographicEstimate {
    #[serde(default)]
    pub race: ProbabilityMap,
    #[serde(default)]
    pub age: ProbabilityMap,
    #[serde(default)]
    pub gender: ProbabilityMap,
}

impl DemographicEstimate {
    pub fn group(&self, category: Category) -> &ProbabilityMap {
        match category {
            Category::Race => &self.race,
            Category::Age => &self.age,
            Category::Gender => &self.gender,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.race.is_empty() && self.age.is_empty() && self.gender.is_empty()
    }
}

/// Body of the phase-one (identity) request
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IdentityRequest {
    pub name: String,
    pub location: String,
}

/// Body of the phase-two (image) request. `image` is bare base64.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ImageRequest {
    pub image: String,
}

/// Phase-two success body
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnalysisResponse {
    #[serde(default)]
    pub message: String,
    pub data: DemographicEstimate,
}

/// Whatever the phase-one endpoint answered with. Only logged.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Acknowledgement {
    pub status: u16,
    pub body: serde_json::Value,
}

/// Strip a `data:<mime>;base64,` prefix if present
pub fn strip_data_url(image: &str) -> &str {
    if image.starts_with("data:") {
        if let Some((_, payload)) = image.split_once(',') {
            return payload;
        }
    }
    image
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_keeps_label_order() {
        let body = r#"{
            "message": "ok",
            "data": {
                "race": {"black": 0.2, "white": 0.5, "martian": 0.3},
                "age": {"30-39": 0.6, "20-29": 0.4},
                "gender": {"male": 0.3, "female": 0.7}
            }
        }"#;
        let resp: AnalysisResponse = serde_json::from_str(body).unwrap();
        let race: Vec<&str> = resp.data.race.keys().map(|k| k.as_str()).collect();
        assert_eq!(race, vec!["black", "white", "martian"]);
        assert_eq!(resp.data.group(Category::Age)["30-39"], 0.6);
    }

    #[test]
    fn test_missing_group_defaults_empty() {
        let est: DemographicEstimate = serde_json::from_str(r#"{"race": {"white": 1.0}}"#).unwrap();
        assert!(est.age.is_empty());
        assert!(!est.is_empty());
    }

    #[test]
    fn test_strip_data_url() {
        assert_eq!(strip_data_url("data:image/jpeg;base64,AAAA"), "AAAA");
        assert_eq!(strip_data_url("AAAA"), "AAAA");
    }

    #[test]
    fn test_category_parse() {
        assert_eq!("Sex".parse::<Category>().unwrap(), Category::Gender);
        assert!("height".parse::<Category>().is_err());
    }
}
