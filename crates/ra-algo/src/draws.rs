//! Monte Carlo draw engine.
//!
//! Produces stratified, seeded resamples of historical days for one
//! `(weather_bins_id, weather_draws_id)` settings group.
//!
//! **Algorithm:**
//! 1. Build the synthetic calendar of `study_year`; draw number `k` is the
//!    k-th day of that calendar and inherits its `(month, day_type)` stratum.
//! 2. Bin sequence: with a generator seeded from `iterations_seed`, draw one
//!    target bin per draw number from the stratum's historical bin frequencies
//!    (or, in `markov` mode, from the observed day-to-day bin transitions into
//!    the stratum, conditioned on the previous draw's bin).
//! 3. Day selection: with a generator seeded from `seed`, for every draw
//!    number and then every iteration, pick a historical day of the stratum
//!    carrying the target bin, uniformly and with replacement.
//!
//! Separating the two streams decouples "which bin pattern occurs" from
//! "which historical day instantiates a bin": iterations of one group share
//! the bin pattern and differ in the days that realize it.
//!
//! A choice between a single candidate (one bin in a stratum, one day for a
//! bin) consumes no randomness, so seed advance only depends on choices that
//! are real.

use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;
use rand::Rng;
use ra_core::{
    stream_rng, study_calendar, BinSequence, RaError, RaResult, Stratum, WeatherBin,
    WeatherDrawSettings, WeatherIteration,
};

/// Historical days of one bin table, indexed by stratum and bin.
#[derive(Debug, Clone)]
pub struct BinIndex {
    weather_bins_id: u32,
    candidates: BTreeMap<Stratum, BTreeMap<u32, Vec<NaiveDate>>>,
    transitions: HashMap<(Stratum, u32), BTreeMap<u32, u64>>,
}

impl BinIndex {
    pub fn build(
        bins: &[WeatherBin],
        weather_bins_id: u32,
        consider_day_types: bool,
    ) -> RaResult<Self> {
        let mut by_date: BTreeMap<NaiveDate, (Stratum, u32)> = BTreeMap::new();
        for row in bins.iter().filter(|b| b.weather_bins_id == weather_bins_id) {
            let stratum = Stratum::new(row.month, row.day_type, consider_day_types);
            if by_date
                .insert(row.date()?, (stratum, row.weather_bin))
                .is_some()
            {
                return Err(RaError::Validation(format!(
                    "weather_bins_id {weather_bins_id} assigns {} more than one bin",
                    row.date()?
                )));
            }
        }
        if by_date.is_empty() {
            return Err(RaError::ClassificationGap {
                key: format!("weather_bins_id {weather_bins_id} has no binned days"),
            });
        }

        let mut candidates: BTreeMap<Stratum, BTreeMap<u32, Vec<NaiveDate>>> = BTreeMap::new();
        let mut transitions: HashMap<(Stratum, u32), BTreeMap<u32, u64>> = HashMap::new();
        for (date, (stratum, bin)) in &by_date {
            candidates
                .entry(*stratum)
                .or_default()
                .entry(*bin)
                .or_default()
                .push(*date);
            if let Some((next_stratum, next_bin)) = date.succ_opt().and_then(|d| by_date.get(&d)) {
                *transitions
                    .entry((*next_stratum, *bin))
                    .or_default()
                    .entry(*next_bin)
                    .or_default() += 1;
            }
        }
        Ok(Self {
            weather_bins_id,
            candidates,
            transitions,
        })
    }

    fn stratum(&self, stratum: Stratum) -> RaResult<&BTreeMap<u32, Vec<NaiveDate>>> {
        self.candidates
            .get(&stratum)
            .ok_or_else(|| RaError::ClassificationGap {
                key: format!(
                    "no historical days in stratum {stratum} of weather_bins_id {}",
                    self.weather_bins_id
                ),
            })
    }

    /// Historical bin frequencies of a stratum.
    pub fn marginal(&self, stratum: Stratum) -> RaResult<BTreeMap<u32, u64>> {
        Ok(self
            .stratum(stratum)?
            .iter()
            .map(|(bin, days)| (*bin, days.len() as u64))
            .collect())
    }

    /// Observed transitions from `previous_bin` into days of `stratum`.
    pub fn transitions_into(&self, stratum: Stratum, previous_bin: u32) -> Option<&BTreeMap<u32, u64>> {
        self.transitions
            .get(&(stratum, previous_bin))
            .filter(|counts| counts.values().any(|c| *c > 0))
    }

    pub fn days(&self, stratum: Stratum, bin: u32) -> RaResult<&[NaiveDate]> {
        self.stratum(stratum)?
            .get(&bin)
            .map(Vec::as_slice)
            .ok_or_else(|| RaError::ClassificationGap {
                key: format!(
                    "no historical day with bin {bin} in stratum {stratum} of weather_bins_id {}",
                    self.weather_bins_id
                ),
            })
    }
}

/// Draw a key proportionally to its weight; a single candidate is returned
/// without touching the generator.
fn pick_weighted<R: Rng>(weights: &BTreeMap<u32, u64>, rng: &mut R) -> Option<u32> {
    let mut live = weights.iter().filter(|(_, w)| **w > 0);
    let first = live.next()?;
    if live.next().is_none() {
        return Some(*first.0);
    }
    let total: u64 = weights.values().sum();
    let mut ticket = rng.gen_range(0..total);
    for (key, weight) in weights {
        if ticket < *weight {
            return Some(*key);
        }
        ticket -= *weight;
    }
    None
}

fn pick_day<R: Rng>(days: &[NaiveDate], rng: &mut R) -> NaiveDate {
    if days.len() == 1 {
        days[0]
    } else {
        days[rng.gen_range(0..days.len())]
    }
}

/// Generate the Monte Carlo iteration set of one settings group.
///
/// Rows are ordered by `(weather_iteration, draw_number)`.
pub fn generate_monte_carlo_iterations(
    settings: &WeatherDrawSettings,
    bins: &[WeatherBin],
) -> RaResult<Vec<WeatherIteration>> {
    let study_year = settings.study_year.ok_or_else(|| {
        RaError::Config(format!(
            "{}: monte_carlo mode needs a study_year",
            settings.group_label()
        ))
    })?;
    if settings.n_iterations == 0 {
        return Err(RaError::Config(format!(
            "{}: n_iterations must be at least 1",
            settings.group_label()
        )));
    }
    let calendar = study_calendar(study_year)?;
    let index = BinIndex::build(bins, settings.weather_bins_id, settings.consider_day_types)?;
    let stream = [
        settings.weather_bins_id as u64,
        settings.weather_draws_id as u64,
    ];

    let mut bin_rng = stream_rng(settings.iterations_seed, &stream);
    let mut target_bins = Vec::with_capacity(calendar.len());
    let mut previous: Option<u32> = None;
    for day in &calendar {
        let stratum = Stratum::new(day.month, day.day_type, settings.consider_day_types);
        let marginal = index.marginal(stratum)?;
        let weights = match (settings.bin_sequence, previous) {
            (BinSequence::Markov, Some(prev)) => {
                index.transitions_into(stratum, prev).unwrap_or(&marginal)
            }
            _ => &marginal,
        };
        let bin = pick_weighted(weights, &mut bin_rng).ok_or_else(|| {
            RaError::ClassificationGap {
                key: format!("stratum {stratum} has no bin to draw for {}", day.date),
            }
        })?;
        target_bins.push((stratum, bin));
        previous = Some(bin);
    }

    let mut day_rng = stream_rng(settings.seed, &stream);
    let n_iterations = settings.n_iterations as usize;
    let mut per_iteration: Vec<Vec<WeatherIteration>> =
        vec![Vec::with_capacity(calendar.len()); n_iterations];
    for (day, (stratum, bin)) in calendar.iter().zip(&target_bins) {
        let days = index.days(*stratum, *bin)?;
        for (iteration_idx, rows) in per_iteration.iter_mut().enumerate() {
            rows.push(WeatherIteration {
                weather_bins_id: settings.weather_bins_id,
                weather_draws_id: settings.weather_draws_id,
                weather_iteration: iteration_idx as u32 + 1,
                draw_number: day.position,
                month: stratum.month,
                day_type: stratum.day_type,
                weather_day_bin: Some(*bin),
                study_calendar_date: day.date,
                study_date: pick_day(days, &mut day_rng),
            });
        }
    }

    tracing::info!(
        group = %settings.group_label(),
        draws = calendar.len(),
        iterations = n_iterations,
        "generated monte carlo iterations"
    );
    Ok(per_iteration.into_iter().flatten().collect())
}
