use std::path::Path;
use std::time::Instant;

use anyhow::{Context, Result};
use ra_algo::{bin_hydro_years, bin_weather_days, ClassificationScheme};
use ra_cli::cli::{BinsCommands, SchemeArgs};
use ra_io::{load_daily_weather, load_hydro_conditions, load_thresholds, write_table};

use crate::commands::telemetry::record_run_timed;

fn scheme(args: &SchemeArgs) -> Result<ClassificationScheme> {
    match (&args.thresholds, args.quantiles) {
        (Some(path), _) => Ok(ClassificationScheme::Thresholds(load_thresholds(path)?)),
        (None, Some(n_bins)) => Ok(ClassificationScheme::Quantiles { n_bins }),
        (None, None) => anyhow::bail!("give --thresholds or --quantiles"),
    }
}

fn scheme_param(args: &SchemeArgs) -> String {
    match (&args.thresholds, args.quantiles) {
        (Some(path), _) => format!("thresholds:{}", path.display()),
        (None, Some(n)) => format!("quantiles:{n}"),
        (None, None) => String::new(),
    }
}

fn weather(input: &Path, id: u32, args: &SchemeArgs, output: &Path) -> Result<usize> {
    let observations = load_daily_weather(input)?;
    let bins = bin_weather_days(id, &observations, &scheme(args)?)
        .with_context(|| format!("binning {}", input.display()))?;
    write_table(output, &bins)?;
    Ok(bins.len())
}

fn hydro(input: &Path, args: &SchemeArgs, output: &Path) -> Result<usize> {
    let observations = load_hydro_conditions(input)?;
    let bins = bin_hydro_years(&observations, &scheme(args)?)
        .with_context(|| format!("binning {}", input.display()))?;
    write_table(output, &bins)?;
    Ok(bins.len())
}

pub fn handle(command: &BinsCommands) -> Result<()> {
    let start = Instant::now();
    let (name, input, output, scheme_args, rows) = match command {
        BinsCommands::Weather {
            input,
            weather_bins_id,
            scheme,
            output,
        } => (
            "bins weather",
            input,
            output,
            scheme,
            weather(input, *weather_bins_id, scheme, output),
        ),
        BinsCommands::Hydro {
            input,
            scheme,
            output,
        } => ("bins hydro", input, output, scheme, hydro(input, scheme, output)),
    };
    let result = rows.as_ref().map(|_| ()).map_err(|e| anyhow::anyhow!("{e:#}"));
    let input_param = input.display().to_string();
    let scheme_param = scheme_param(scheme_args);
    record_run_timed(
        output,
        name,
        &[("input", input_param.as_str()), ("scheme", scheme_param.as_str())],
        start,
        &result,
    );
    let rows = rows?;
    println!("Wrote {rows} bin assignments to {}", output.display());
    Ok(())
}
