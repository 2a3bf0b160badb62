//! # ra-ts: time series materializer
//!
//! Turns an iteration's day sequence into per-timepoint output series for
//! projects and load zones by weighted aggregation of unit-level hourly
//! profiles.
//!
//! Each output value at iteration-local timepoint `t = (draw - 1) * 24 +
//! hour + 1` reads every member unit's raw profile at the draw's historical
//! `study_date` and `hour`:
//!
//! ```text
//! weighted sum:  v = Σ wᵢ·xᵢ            (load zones)
//! weighted mean: v = Σ wᵢ·xᵢ / Σ wᵢ     (variable-generation capacity factors)
//! ```
//!
//! The summation walks units in mapping insertion order, so output is
//! reproducible bit for bit.

use std::collections::HashMap;

use rayon::prelude::*;
use ra_core::{
    HourlyStore, Iteration, IterationSet, LoadZoneUnit, RaError, RaResult, VarProjectUnit,
    HOURS_PER_DAY,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Aggregation {
    WeightedSum,
    WeightedMean,
}

#[derive(Debug, Clone)]
struct Member {
    series: String,
    weight: f64,
}

#[derive(Debug, Clone)]
struct Entity {
    name: String,
    members: Vec<Member>,
    total_weight: f64,
}

/// Validated unit-to-entity weighting map.
#[derive(Debug, Clone)]
pub struct UnitMapping {
    aggregation: Aggregation,
    entities: Vec<Entity>,
}

impl UnitMapping {
    /// Build from `(entity, series, weight)` triples. Entities keep the order
    /// in which they first appear; members keep insertion order.
    pub fn new<'a, I>(aggregation: Aggregation, pairs: I) -> RaResult<Self>
    where
        I: IntoIterator<Item = (&'a str, &'a str, f64)>,
    {
        let mut entities: Vec<Entity> = Vec::new();
        let mut slots: HashMap<String, usize> = HashMap::new();
        for (entity, series, weight) in pairs {
            if !weight.is_finite() || weight < 0.0 {
                return Err(RaError::WeightConfiguration {
                    entity: entity.to_string(),
                    reason: format!("unit {series} has weight {weight}"),
                });
            }
            let slot = *slots.entry(entity.to_string()).or_insert_with(|| {
                entities.push(Entity {
                    name: entity.to_string(),
                    members: Vec::new(),
                    total_weight: 0.0,
                });
                entities.len() - 1
            });
            entities[slot].members.push(Member {
                series: series.to_string(),
                weight,
            });
            entities[slot].total_weight += weight;
        }
        if entities.is_empty() {
            return Err(RaError::WeightConfiguration {
                entity: "<mapping>".into(),
                reason: "unit mapping is empty".into(),
            });
        }
        if let Some(bad) = entities.iter().find(|e| !(e.total_weight > 0.0)) {
            return Err(RaError::WeightConfiguration {
                entity: bad.name.clone(),
                reason: format!(
                    "{} unit weights sum to {}",
                    bad.members.len(),
                    bad.total_weight
                ),
            });
        }
        Ok(Self {
            aggregation,
            entities,
        })
    }

    /// Projects as weighted-mean capacity factors of their units' profiles.
    pub fn from_var_projects(units: &[VarProjectUnit]) -> RaResult<Self> {
        Self::new(
            Aggregation::WeightedMean,
            units.iter().map(|u| {
                (
                    u.project.as_str(),
                    u.timeseries_name.as_str(),
                    u.unit_weight,
                )
            }),
        )
    }

    /// Load zones as weighted sums of their component profiles.
    pub fn from_load_zones(units: &[LoadZoneUnit]) -> RaResult<Self> {
        Self::new(
            Aggregation::WeightedSum,
            units.iter().map(|u| {
                (
                    u.load_zone.as_str(),
                    u.load_zone_unit.as_str(),
                    u.unit_weight,
                )
            }),
        )
    }

    pub fn aggregation(&self) -> Aggregation {
        self.aggregation
    }

    pub fn entity_names(&self) -> impl Iterator<Item = &str> {
        self.entities.iter().map(|e| e.name.as_str())
    }

    /// Distinct raw series the mapping reads, in first-use order.
    pub fn series_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for member in self.entities.iter().flat_map(|e| &e.members) {
            if !names.contains(&member.series.as_str()) {
                names.push(member.series.as_str());
            }
        }
        names
    }

    fn value(&self, entity: &Entity, store: &HourlyStore, iteration: &Iteration, h: usize) -> RaResult<f64> {
        let date = iteration.study_date(h / HOURS_PER_DAY);
        let hour = (h % HOURS_PER_DAY) as u32;
        let mut sum = 0.0;
        for member in &entity.members {
            sum += member.weight * store.require(&member.series, date, hour)?;
        }
        Ok(match self.aggregation {
            Aggregation::WeightedSum => sum,
            Aggregation::WeightedMean => sum / entity.total_weight,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesRow {
    pub weather_iteration: u32,
    pub timepoint: u32,
    pub entity: String,
    pub value: f64,
}

fn materialize_iteration(
    iteration: &Iteration,
    mapping: &UnitMapping,
    store: &HourlyStore,
) -> RaResult<Vec<SeriesRow>> {
    let hours = iteration.hours();
    let mut rows = Vec::with_capacity(hours * mapping.entities.len());
    for h in 0..hours {
        let timepoint = Iteration::timepoint(h / HOURS_PER_DAY, h % HOURS_PER_DAY);
        for entity in &mapping.entities {
            rows.push(SeriesRow {
                weather_iteration: iteration.weather_iteration,
                timepoint,
                entity: entity.name.clone(),
                value: mapping.value(entity, store, iteration, h)?,
            });
        }
    }
    Ok(rows)
}

/// Materialize every iteration; rows are ordered by iteration, timepoint and
/// entity.
pub fn materialize(
    iterations: &IterationSet,
    mapping: &UnitMapping,
    store: &HourlyStore,
) -> RaResult<Vec<SeriesRow>> {
    let chunks: Vec<Vec<SeriesRow>> = iterations
        .iterations
        .par_iter()
        .map(|iteration| materialize_iteration(iteration, mapping, store))
        .collect::<RaResult<_>>()?;
    let rows: Vec<SeriesRow> = chunks.into_iter().flatten().collect();
    tracing::debug!(
        entities = mapping.entities.len(),
        iterations = iterations.len(),
        rows = rows.len(),
        "materialized series"
    );
    Ok(rows)
}
