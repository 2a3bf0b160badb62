use chrono::NaiveDate;
use ra_core::WeatherIteration;
use ra_io::{load_weather_iterations, StagedOutput};
use std::fs;
use tempfile::tempdir;

fn row(iteration: u32, draw: u32, bin: Option<u32>) -> WeatherIteration {
    WeatherIteration {
        weather_bins_id: 1,
        weather_draws_id: 4,
        weather_iteration: iteration,
        draw_number: draw,
        month: 1,
        day_type: 1,
        weather_day_bin: bin,
        study_calendar_date: NaiveDate::from_ymd_opt(2030, 1, draw).unwrap(),
        study_date: NaiveDate::from_ymd_opt(1998, 1, 10 + draw).unwrap(),
    }
}

#[test]
fn staged_iteration_table_reloads_for_rerun_steps() {
    let dir = tempdir().unwrap();
    let rows = vec![row(1, 1, Some(2)), row(1, 2, None)];
    let mut stage = StagedOutput::begin(dir.path(), "draws").unwrap();
    stage.write_csv("weather_iterations.csv", &rows).unwrap();
    stage.commit().unwrap();

    let path = dir.path().join("weather_iterations.csv");
    let text = fs::read_to_string(&path).unwrap();
    assert!(text.contains("1998-01-11"));

    let back = load_weather_iterations(&path).unwrap();
    assert_eq!(back, rows);
}

#[test]
fn duplicate_iteration_days_are_rejected() {
    let dir = tempdir().unwrap();
    let rows = vec![row(1, 1, Some(2)), row(1, 1, Some(3))];
    let path = dir.path().join("weather_iterations.csv");
    ra_io::write_table(&path, &rows).unwrap();
    assert!(load_weather_iterations(&path).is_err());
}
