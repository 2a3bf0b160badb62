//! Pipeline step identifiers and their fixed upstream dependencies.

use serde::{Deserialize, Serialize};

/// Generator steps of the pipeline, in dependency order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStep {
    Binning,
    Draws,
    Materialization,
    Hydro,
    Availability,
    TemporalScenario,
}

impl PipelineStep {
    pub const ALL: [PipelineStep; 6] = [
        PipelineStep::Binning,
        PipelineStep::Draws,
        PipelineStep::Materialization,
        PipelineStep::Hydro,
        PipelineStep::Availability,
        PipelineStep::TemporalScenario,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineStep::Binning => "binning",
            PipelineStep::Draws => "draws",
            PipelineStep::Materialization => "materialization",
            PipelineStep::Hydro => "hydro",
            PipelineStep::Availability => "availability",
            PipelineStep::TemporalScenario => "temporal_scenario",
        }
    }

    /// Steps whose output this step reads.
    pub fn dependencies(&self) -> &'static [PipelineStep] {
        match self {
            PipelineStep::Binning => &[],
            PipelineStep::Draws => &[PipelineStep::Binning],
            PipelineStep::Materialization | PipelineStep::Hydro | PipelineStep::Availability => {
                &[PipelineStep::Draws]
            }
            PipelineStep::TemporalScenario => &[
                PipelineStep::Draws,
                PipelineStep::Materialization,
                PipelineStep::Hydro,
                PipelineStep::Availability,
            ],
        }
    }
}

impl std::str::FromStr for PipelineStep {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PipelineStep::ALL
            .iter()
            .copied()
            .find(|step| step.as_str() == s.trim())
            .ok_or_else(|| {
                format!(
                    "unknown pipeline step '{s}'; expected one of binning, draws, \
                     materialization, hydro, availability, temporal_scenario"
                )
            })
    }
}

impl std::fmt::Display for PipelineStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
