use crate::error::AppError;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// Position in the location → crop → cost → analysis → report sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum Stage {
    Start,
    /// Location validated, yield forecast outstanding.
    LocationEntered,
    RecommendationsShown,
    CropSelected,
    CostModeChosen,
    AnalysisComputed,
    /// Prediction row written, insight report not yet received.
    Persisted,
    ReportReady,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CostMode {
    /// Backend's optimum costs per acre.
    Default,
    /// Farmer-entered labor, seed and fertilizer costs.
    Custom,
}

impl FromStr for CostMode {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "default" => Ok(Self::Default),
            "custom" => Ok(Self::Custom),
            other => Err(AppError::Validation(format!(
                "cost mode must be \"default\" or \"custom\", got {:?}",
                other
            ))),
        }
    }
}

impl fmt::Display for CostMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Default => "default",
            Self::Custom => "custom",
        })
    }
}
