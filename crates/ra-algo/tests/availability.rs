use chrono::{Datelike, NaiveDate};
use ra_algo::generate_availability;
use ra_core::{
    dates_in_year, weekday_rule, HourlyStore, IterationMode, IterationSet, OutageModelKind,
    RaError, UnitAvailabilityParams, WeatherDrawSettings, WeatherIteration,
};

fn settings() -> WeatherDrawSettings {
    WeatherDrawSettings {
        weather_bins_id: 2,
        weather_draws_id: 5,
        mode: IterationMode::MonteCarlo,
        seed: 11,
        iterations_seed: 12,
        n_iterations: 2,
        consider_day_types: true,
        study_year: Some(2030),
        bin_sequence: Default::default(),
        sync_years: None,
    }
}

/// Iterations that replay 2001 day by day, `days` long.
fn iterations(count: u32, days: usize) -> IterationSet {
    let dates = dates_in_year(2001).unwrap();
    let mut rows = Vec::new();
    for iteration in 1..=count {
        for (idx, date) in dates.iter().take(days).enumerate() {
            rows.push(WeatherIteration {
                weather_bins_id: 2,
                weather_draws_id: 5,
                weather_iteration: iteration,
                draw_number: idx as u32 + 1,
                month: date.month(),
                day_type: weekday_rule(*date),
                weather_day_bin: Some(1),
                study_calendar_date: NaiveDate::from_ymd_opt(2030, date.month(), date.day())
                    .unwrap(),
                study_date: *date,
            });
        }
    }
    IterationSet::from_rows(&rows).unwrap()
}

fn unit(name: &str, project: &str, kind: OutageModelKind) -> UnitAvailabilityParams {
    UnitAvailabilityParams {
        unit: name.into(),
        project: project.into(),
        unit_weight: 1.0,
        n_units: 1,
        outage_model_kind: kind,
        forced_outage_rate: 0.0,
        mean_time_to_repair: 1.0,
        timeseries_name: None,
        is_hybrid_storage: false,
    }
}

fn flat_profile(name: &str, value: f64, days: usize) -> HourlyStore {
    let mut store = HourlyStore::new();
    for date in dates_in_year(2001).unwrap().into_iter().take(days) {
        for hour in 0..24 {
            store.insert(name, date, hour, value).unwrap();
        }
    }
    store
}

#[test]
fn fleet_outage_fraction_converges_to_forced_outage_rate() {
    let mut fleet = unit("ct_fleet", "ct", OutageModelKind::Markov);
    fleet.n_units = 200;
    fleet.forced_outage_rate = 0.05;
    fleet.mean_time_to_repair = 48.0;
    let out = generate_availability(&settings(), &iterations(1, 365), &[fleet], &HourlyStore::new())
        .unwrap();
    assert_eq!(out.rows.len(), 8760);
    assert!(out
        .rows
        .iter()
        .all(|r| (0.0..=1.0).contains(&r.availability_derate)));
    let mean = out.summary[0].mean_availability_derate;
    assert!((1.0 - mean - 0.05).abs() < 0.01, "outage fraction {}", 1.0 - mean);
}

#[test]
fn single_unit_year_matches_forced_outage_rate() {
    let mut unit = unit("ct_1", "ct", OutageModelKind::Markov);
    unit.forced_outage_rate = 0.05;
    unit.mean_time_to_repair = 48.0;
    // one 8,760-hour year per iteration, each on its own seeded stream
    let set = iterations(100, 365);
    let out = generate_availability(&settings(), &set, &[unit.clone()], &HourlyStore::new()).unwrap();
    assert_eq!(out.summary.len(), 100);
    assert!(out.summary.iter().all(|s| s.timepoints == 8760));
    assert!(out
        .rows
        .iter()
        .all(|r| r.availability_derate == 0.0 || r.availability_derate == 1.0));

    let outage = 1.0
        - out.summary.iter().map(|s| s.mean_availability_derate).sum::<f64>()
            / out.summary.len() as f64;
    assert!((outage - 0.05).abs() < 0.01, "outage fraction {outage}");

    let again = generate_availability(&settings(), &set, &[unit], &HourlyStore::new()).unwrap();
    assert_eq!(out.rows, again.rows);
}

#[test]
fn output_does_not_depend_on_thread_count() {
    let units: Vec<_> = (0..6)
        .map(|i| {
            let mut u = unit(&format!("u{i}"), &format!("p{}", i % 2), OutageModelKind::Markov);
            u.n_units = 3;
            u.forced_outage_rate = 0.1;
            u.mean_time_to_repair = 12.0;
            u
        })
        .collect();
    let set = iterations(2, 30);
    let run = |threads: usize| {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build()
            .unwrap()
            .install(|| generate_availability(&settings(), &set, &units, &HourlyStore::new()))
            .unwrap()
    };
    assert_eq!(run(1).rows, run(4).rows);
}

#[test]
fn iterations_get_distinct_outage_paths() {
    let mut u = unit("g", "p", OutageModelKind::Markov);
    u.n_units = 10;
    u.forced_outage_rate = 0.2;
    u.mean_time_to_repair = 10.0;
    let out = generate_availability(&settings(), &iterations(2, 60), &[u], &HourlyStore::new())
        .unwrap();
    let (first, second): (Vec<_>, Vec<_>) = out.rows.iter().partition(|r| r.weather_iteration == 1);
    assert_eq!(first.len(), second.len());
    assert!(first
        .iter()
        .zip(&second)
        .any(|(a, b)| a.availability_derate != b.availability_derate));
}

#[test]
fn hybrid_storage_is_gated_by_generation() {
    let mut solar = unit("solar_u", "hybrid", OutageModelKind::Derate);
    solar.timeseries_name = Some("solar_heat".into());
    let mut battery = unit("batt_u", "hybrid", OutageModelKind::Markov);
    battery.is_hybrid_storage = true;
    let plain = unit("wind_u", "wind", OutageModelKind::None);
    let mut standalone = unit("batt_only", "storage", OutageModelKind::None);
    standalone.is_hybrid_storage = true;

    let derates = flat_profile("solar_heat", 0.5, 2);
    let out = generate_availability(
        &settings(),
        &iterations(1, 2),
        &[solar, battery, plain, standalone],
        &derates,
    )
    .unwrap();

    let hybrid: Vec<_> = out.rows.iter().filter(|r| r.project == "hybrid").collect();
    assert_eq!(hybrid.len(), 48);
    assert!(hybrid.iter().all(|r| r.availability_derate == 0.5));
    assert!(hybrid
        .iter()
        .all(|r| r.hyb_stor_availability_derate == Some(0.5)));

    let wind: Vec<_> = out.rows.iter().filter(|r| r.project == "wind").collect();
    assert!(wind.iter().all(|r| r.availability_derate == 1.0));
    assert!(wind.iter().all(|r| r.hyb_stor_availability_derate.is_none()));

    let storage: Vec<_> = out.rows.iter().filter(|r| r.project == "storage").collect();
    assert!(storage
        .iter()
        .all(|r| r.hyb_stor_availability_derate == Some(r.availability_derate)));

    let order: Vec<&str> = out.summary.iter().map(|s| s.project.as_str()).collect();
    assert_eq!(order, vec!["hybrid", "wind", "storage"]);
}

#[test]
fn derate_profile_gaps_are_missing_data() {
    let mut solar = unit("solar_u", "solar", OutageModelKind::Derate);
    solar.timeseries_name = Some("solar_heat".into());
    let derates = flat_profile("solar_heat", 0.9, 1);
    let err = generate_availability(&settings(), &iterations(1, 2), &[solar], &derates).unwrap_err();
    match err {
        RaError::MissingData { series, key } => {
            assert_eq!(series, "solar_heat");
            assert!(key.contains("2001-01-02"));
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[test]
fn markov_units_without_a_profile_are_not_derated() {
    let mut u = unit("g", "p", OutageModelKind::Markov);
    u.timeseries_name = Some("not_in_table".into());
    let out = generate_availability(&settings(), &iterations(1, 1), &[u], &HourlyStore::new())
        .unwrap();
    assert!(out.rows.iter().all(|r| r.availability_derate == 1.0));
}

#[test]
fn always_out_unit_reports_zero() {
    let mut u = unit("g", "p", OutageModelKind::Markov);
    u.forced_outage_rate = 1.0;
    let out = generate_availability(&settings(), &iterations(1, 1), &[u], &HourlyStore::new())
        .unwrap();
    assert!(out.rows.iter().all(|r| r.availability_derate == 0.0));
}
