use std::path::Path;

use anyhow::Result;
use ra_batch::plan_steps;
use ra_scenarios::validate;

use crate::commands::util::load_with_steps;

pub fn handle_validate(path: &Path, steps: Option<&str>) -> Result<()> {
    let settings = load_with_steps(path, steps)?;
    let selected = settings.selected_steps()?;
    validate(&settings, &selected)?;
    println!(
        "Run settings validated: {} draw group(s), steps {}",
        settings.draws.len(),
        settings.run.steps.join(",")
    );
    Ok(())
}

pub fn handle_plan(path: &Path, steps: Option<&str>) -> Result<()> {
    let settings = load_with_steps(path, steps)?;
    let plan = plan_steps(&settings.selected_steps()?)?;
    for (idx, step) in plan.order().iter().enumerate() {
        println!("{}. {step}", idx + 1);
    }
    for step in plan.reused() {
        println!("reuses {step} output from a previous run");
    }
    for group in &settings.draws {
        println!("group {} -> {}", group.group_label(), settings.group_dir(group).display());
    }
    Ok(())
}
