use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use chrono::{Datelike, NaiveDate};
use ra_batch::{load_run_manifest, run_pipeline, step_files, GroupState, ITERATIONS_FILE};
use ra_core::{
    DailyObservation, HourlyValue, HydroMonthParams, HydroYearBin, IterationMode, OutageModelKind,
    PipelineStep, UnitAvailabilityParams, VarProjectUnit, WeatherDrawSettings,
};
use ra_io::write_table;
use ra_scenarios::{
    InputPaths, RunSection, RunSettings, SchemeSpec, TemporalSettings, WeatherBinningSpec,
};
use tempfile::tempdir;

const YEARS: [i32; 3] = [2001, 2002, 2003];

fn days_of(year: i32) -> Vec<NaiveDate> {
    let first = NaiveDate::from_ymd_opt(year, 1, 1).unwrap();
    first
        .iter_days()
        .take_while(|d| d.year() == year)
        .collect()
}

fn write_inputs(raw: &Path, hydro_min: f64) -> InputPaths {
    fs::create_dir_all(raw).unwrap();

    let mut daily = Vec::new();
    let mut hourly = Vec::new();
    for year in YEARS {
        for date in days_of(year) {
            daily.push(DailyObservation {
                year,
                month: date.month(),
                day_of_month: date.day(),
                day_type: None,
                value: ((year as u32 * 31 + date.ordinal() * 13) % 17) as f64,
            });
            for hour in 0..24 {
                hourly.push(HourlyValue {
                    timeseries_name: "wind_a".into(),
                    year,
                    month: date.month(),
                    day_of_month: date.day(),
                    hour_of_day: hour,
                    value: (hour + 1) as f64 / 24.0,
                });
            }
        }
    }
    write_table(&raw.join("daily.csv"), &daily).unwrap();
    write_table(&raw.join("var_profiles.csv"), &hourly).unwrap();
    write_table(
        &raw.join("var_units.csv"),
        &[VarProjectUnit {
            unit: "wa".into(),
            project: "wind_farm".into(),
            unit_weight: 1.0,
            timeseries_name: "wind_a".into(),
        }],
    )
    .unwrap();

    let mut year_bins = Vec::new();
    let mut params = Vec::new();
    for year in YEARS {
        for month in 1..=12 {
            year_bins.push(HydroYearBin {
                year,
                month,
                hydro_bin: 1,
            });
            params.push(HydroMonthParams {
                project: "dam".into(),
                year,
                month,
                average_power_fraction: 0.5,
                min_power_fraction: hydro_min,
                max_power_fraction: 0.9,
            });
        }
    }
    write_table(&raw.join("hydro_year_bins.csv"), &year_bins).unwrap();
    write_table(&raw.join("hydro_params.csv"), &params).unwrap();
    write_table(
        &raw.join("units.csv"),
        &[UnitAvailabilityParams {
            unit: "ct_1".into(),
            project: "peaker".into(),
            unit_weight: 1.0,
            n_units: 2,
            outage_model_kind: OutageModelKind::Markov,
            forced_outage_rate: 0.1,
            mean_time_to_repair: 24.0,
            timeseries_name: None,
            is_hybrid_storage: false,
        }],
    )
    .unwrap();

    InputPaths {
        daily_weather: Some(raw.join("daily.csv")),
        hydro_year_bins: Some(raw.join("hydro_year_bins.csv")),
        hydro_params: Some(raw.join("hydro_params.csv")),
        var_profiles: Some(raw.join("var_profiles.csv")),
        var_project_units: Some(raw.join("var_units.csv")),
        unit_availability: Some(raw.join("units.csv")),
        ..InputPaths::default()
    }
}

fn group(draws_id: u32, mode: IterationMode) -> WeatherDrawSettings {
    WeatherDrawSettings {
        weather_bins_id: 1,
        weather_draws_id: draws_id,
        mode,
        seed: 11,
        iterations_seed: 5,
        n_iterations: 3,
        consider_day_types: true,
        study_year: Some(2030),
        bin_sequence: Default::default(),
        sync_years: match mode {
            IterationMode::Sync => Some(vec![2001, 2002]),
            IterationMode::MonteCarlo => None,
        },
    }
}

fn settings(root: &Path, hydro_min: f64, threads: usize) -> RunSettings {
    RunSettings {
        run: RunSection {
            output_dir: root.join("out"),
            threads,
            verify_reproducibility: true,
            ..RunSection::default()
        },
        inputs: write_inputs(&root.join("raw"), hydro_min),
        weather_binning: vec![WeatherBinningSpec {
            weather_bins_id: 1,
            scheme: SchemeSpec::Quantiles { n_bins: 2 },
        }],
        hydro_binning: None,
        draws: vec![
            group(1, IterationMode::MonteCarlo),
            group(2, IterationMode::Sync),
        ],
        temporal: TemporalSettings::default(),
    }
}

fn all_steps() -> BTreeSet<PipelineStep> {
    PipelineStep::ALL.into_iter().collect()
}

fn steps(list: &[PipelineStep]) -> BTreeSet<PipelineStep> {
    list.iter().copied().collect()
}

fn data_rows(path: &Path) -> usize {
    fs::read_to_string(path).unwrap().lines().count() - 1
}

#[test]
fn full_run_writes_every_group_table() {
    let dir = tempdir().unwrap();
    let settings = settings(dir.path(), 0.2, 2);
    let summary = run_pipeline(&settings, &all_steps()).unwrap();
    summary.ensure_success().unwrap();
    assert_eq!(summary.success, 2);

    let out = dir.path().join("out");
    assert!(out.join("binning/weather_bins.csv").exists());
    for (label, iterations) in [("bins_1_draws_1", 3), ("bins_1_draws_2", 2)] {
        let group_dir = out.join(label);
        for file in [
            ITERATIONS_FILE,
            "var_series.csv",
            "hydro_iterations.csv",
            "availability.csv",
            "availability_summary.csv",
            "horizons.csv",
            "timepoints.csv",
            "temporal_scenario.json",
        ] {
            assert!(group_dir.join(file).exists(), "{label} is missing {file}");
        }
        assert_eq!(data_rows(&group_dir.join(ITERATIONS_FILE)), iterations * 365);
        assert_eq!(data_rows(&group_dir.join("var_series.csv")), iterations * 8760);
        assert_eq!(data_rows(&group_dir.join("timepoints.csv")), iterations * 8760);
        assert_eq!(data_rows(&group_dir.join("hydro_iterations.csv")), iterations * 12);
        let leftovers: Vec<_> = fs::read_dir(&group_dir)
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().starts_with(".staging"))
            .collect();
        assert!(leftovers.is_empty());
    }

    let manifest = load_run_manifest(&summary.manifest_path).unwrap();
    assert_eq!(manifest.success, 2);
    assert_eq!(manifest.steps.len(), 6);
    assert!(manifest.reused_steps.is_empty());
    assert!(manifest
        .groups
        .iter()
        .all(|g| g.iteration_fingerprint.is_some() && g.steps_completed.len() == 5));
}

#[test]
fn single_step_rerun_reuses_iterations() {
    let dir = tempdir().unwrap();
    let settings = settings(dir.path(), 0.2, 2);
    run_pipeline(&settings, &all_steps()).unwrap().ensure_success().unwrap();

    let iterations = dir.path().join("out/bins_1_draws_1").join(ITERATIONS_FILE);
    let before = fs::read(&iterations).unwrap();

    let hydro_only = [PipelineStep::Hydro].into_iter().collect();
    let summary = run_pipeline(&settings, &hydro_only).unwrap();
    summary.ensure_success().unwrap();
    assert_eq!(fs::read(&iterations).unwrap(), before);

    let manifest = load_run_manifest(&summary.manifest_path).unwrap();
    assert_eq!(manifest.reused_steps, vec!["draws".to_string()]);
    for group in &manifest.groups {
        assert_eq!(group.steps_completed, vec!["hydro".to_string()]);
        assert_eq!(group.files.len(), 1);
    }
}

#[test]
fn rerun_without_prior_iterations_fails_the_group() {
    let dir = tempdir().unwrap();
    let settings = settings(dir.path(), 0.2, 1);
    let hydro_only = [PipelineStep::Hydro].into_iter().collect();
    let summary = run_pipeline(&settings, &hydro_only).unwrap();
    assert_eq!(summary.failure, 2);
    assert!(summary.ensure_success().is_err());
    let first = &summary.groups[0];
    assert!(first.error.as_deref().unwrap().contains("previous run"));
}

#[test]
fn hydro_bounds_violation_fails_the_step_without_output() {
    let dir = tempdir().unwrap();
    let settings = settings(dir.path(), 0.6, 2);
    let summary = run_pipeline(&settings, &all_steps()).unwrap();
    assert_eq!(summary.failure, 2);

    for group in &summary.groups {
        assert_eq!(group.status, "error");
        assert_eq!(group.error_kind.as_deref(), Some("bounds_violation"));
        assert!(group.steps_completed.contains(&"draws".to_string()));
        assert!(!group.steps_completed.contains(&"hydro".to_string()));

        let group_dir = dir.path().join("out").join(&group.group);
        assert!(group_dir.join(ITERATIONS_FILE).exists());
        assert!(!group_dir.join("hydro_iterations.csv").exists());
        assert!(!group_dir.join("timepoints.csv").exists());
        assert!(!group_dir.join(".staging-hydro").exists());
    }
    let manifest = load_run_manifest(&summary.manifest_path).unwrap();
    assert_eq!(manifest.failure, 2);
}

#[test]
fn iteration_fingerprints_do_not_depend_on_thread_count() {
    let one = tempdir().unwrap();
    let four = tempdir().unwrap();
    let draws_only: BTreeSet<_> = [PipelineStep::Binning, PipelineStep::Draws]
        .into_iter()
        .collect();
    let a = run_pipeline(&settings(one.path(), 0.2, 1), &draws_only).unwrap();
    let b = run_pipeline(&settings(four.path(), 0.2, 4), &draws_only).unwrap();
    assert_eq!(a.success, 2);
    for (x, y) in a.groups.iter().zip(&b.groups) {
        assert_eq!(x.group, y.group);
        assert_eq!(x.iteration_fingerprint, y.iteration_fingerprint);
    }
}

#[test]
fn rerun_with_new_draws_drops_tables_of_the_old_iterations() {
    let dir = tempdir().unwrap();
    run_pipeline(&settings(dir.path(), 0.2, 2), &all_steps())
        .unwrap()
        .ensure_success()
        .unwrap();
    let mc_dir = dir.path().join("out/bins_1_draws_1");
    let old_iterations = fs::read(mc_dir.join(ITERATIONS_FILE)).unwrap();

    // new seeds redraw the Monte Carlo group, then hydro fails on its bounds
    let mut reseeded = settings(dir.path(), 0.6, 2);
    for group in &mut reseeded.draws {
        group.seed = 999;
        group.iterations_seed = 998;
    }
    let summary = run_pipeline(&reseeded, &all_steps()).unwrap();
    assert_eq!(summary.failure, 2);
    assert_ne!(fs::read(mc_dir.join(ITERATIONS_FILE)).unwrap(), old_iterations);

    for record in &summary.groups {
        assert_eq!(record.error_kind.as_deref(), Some("bounds_violation"));
        let group_dir = dir.path().join("out").join(&record.group);
        for file in [
            "hydro_iterations.csv",
            "horizons.csv",
            "timepoints.csv",
            "temporal_scenario.json",
        ] {
            assert!(!group_dir.join(file).exists(), "{} kept {file}", record.group);
        }

        let current = record.iteration_fingerprint.as_deref().unwrap();
        let state = GroupState::load(&group_dir).unwrap();
        for (step, entry) in &state.steps {
            assert_eq!(entry.iteration_fingerprint, current, "{step} describes other iterations");
        }
        for step in PipelineStep::ALL {
            for file in step_files(step) {
                if group_dir.join(file).exists() {
                    let owned = state
                        .get(step)
                        .is_some_and(|r| r.files.iter().any(|f| f == file));
                    assert!(owned, "{} holds {file} without a committed step", record.group);
                }
            }
        }
    }
}

#[test]
fn temporal_scenario_alone_needs_upstream_outputs_of_the_current_iterations() {
    use PipelineStep::*;
    let dir = tempdir().unwrap();
    let settings = settings(dir.path(), 0.2, 2);
    run_pipeline(&settings, &steps(&[Binning, Draws]))
        .unwrap()
        .ensure_success()
        .unwrap();

    let summary = run_pipeline(&settings, &steps(&[TemporalScenario])).unwrap();
    assert_eq!(summary.failure, 2);
    for record in &summary.groups {
        assert_eq!(record.error_kind.as_deref(), Some("stale_upstream"));
        assert!(record.files.is_empty());
        let group_dir = dir.path().join("out").join(&record.group);
        assert!(!group_dir.join("timepoints.csv").exists());
    }

    run_pipeline(&settings, &steps(&[Materialization, Hydro, Availability]))
        .unwrap()
        .ensure_success()
        .unwrap();
    let summary = run_pipeline(&settings, &steps(&[TemporalScenario])).unwrap();
    summary.ensure_success().unwrap();
    let manifest = load_run_manifest(&summary.manifest_path).unwrap();
    assert_eq!(
        manifest.reused_steps,
        vec!["draws", "materialization", "hydro", "availability"]
    );
    for record in &summary.groups {
        assert!(dir.path().join("out").join(&record.group).join("timepoints.csv").exists());
    }

    // a reused table that disappeared is not silently skipped
    fs::remove_file(dir.path().join("out/bins_1_draws_2/hydro_iterations.csv")).unwrap();
    let summary = run_pipeline(&settings, &steps(&[TemporalScenario])).unwrap();
    assert_eq!(summary.success, 1);
    let broken = summary
        .groups
        .iter()
        .find(|g| g.group == "bins_1_draws_2")
        .unwrap();
    assert!(broken.error.as_deref().unwrap().contains("hydro_iterations.csv"));

    // redrawn iterations leave the earlier upstream tables unusable
    let mut reseeded = settings.clone();
    reseeded.draws[0].seed = 999;
    reseeded.draws[0].iterations_seed = 998;
    run_pipeline(&reseeded, &steps(&[Draws])).unwrap().ensure_success().unwrap();
    let summary = run_pipeline(&reseeded, &steps(&[TemporalScenario])).unwrap();
    let redrawn = summary
        .groups
        .iter()
        .find(|g| g.group == "bins_1_draws_1")
        .unwrap();
    assert_eq!(redrawn.error_kind.as_deref(), Some("stale_upstream"));
    assert!(!dir.path().join("out/bins_1_draws_1/var_series.csv").exists());
}
