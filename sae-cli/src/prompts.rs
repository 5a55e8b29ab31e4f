use anyhow::Result;
use colored::Colorize;
use inquire::{Confirm, MultiSelect, Select, Text};

use sae_core::models::INTEGRATION_KEYS;
use sae_core::{BuildingField, Connectivity, ProjectStore, Route};

/// Where to go after a screen is filled in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Next,
    Back,
    Finish,
}

impl std::fmt::Display for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Step::Next => write!(f, "Next"),
            Step::Back => write!(f, "Back"),
            Step::Finish => write!(f, "Finish"),
        }
    }
}

/// Runs the wizard from `start` until the user finishes. Every answer is saved as it is entered.
pub fn run_wizard(store: &mut ProjectStore, start: Route) -> Result<()> {
    let mut route = start;
    loop {
        println!();
        println!(
            "{} {}",
            format!("[{}/{}]", route.index() + 1, Route::ALL.len()).dimmed(),
            route.title().blue().bold()
        );

        match route {
            Route::Project => prompt_project(store)?,
            Route::Building => prompt_buildings(store)?,
            Route::Solution => prompt_solution(store)?,
        }

        let mut steps = Vec::new();
        if route.next().is_some() {
            steps.push(Step::Next);
        }
        if route.previous().is_some() {
            steps.push(Step::Back);
        }
        steps.push(Step::Finish);

        match Select::new("Continue:", steps).prompt()? {
            Step::Next => route = route.next().unwrap_or(route),
            Step::Back => route = route.previous().unwrap_or(route),
            Step::Finish => break,
        }
    }

    let summary = store.compute_summary();
    println!(
        "{} {} buildings, {} floors, {} devices",
        "Saved.".green(),
        summary.buildings,
        summary.total_floors,
        summary.total_devices
    );
    Ok(())
}

fn prompt_project(store: &mut ProjectStore) -> Result<()> {
    let project = store.document().project.clone();
    println!("{}: {}", "Project ID".blue(), project.project_auto_id);

    let integrator = Text::new("Systems integrator ID:")
        .with_initial_value(&project.systems_integrator_id)
        .prompt()?;
    store.set_field("project.systemsIntegratorId", &integrator)?;

    let name = Text::new("Project name:")
        .with_initial_value(&project.project_name)
        .prompt()?;
    store.set_field("project.projectName", &name)?;

    let count = Text::new("Number of buildings (1-50):")
        .with_initial_value(&project.buildings_count.to_string())
        .prompt()?;
    store.set_field("project.buildingsCount", &count)?;
    Ok(())
}

fn prompt_buildings(store: &mut ProjectStore) -> Result<()> {
    let items = store.document().building.items.clone();
    for (index, entry) in items.iter().enumerate() {
        println!("{}", format!("Building {}", index + 1).cyan());

        let name = Text::new("  Name:")
            .with_initial_value(&entry.name)
            .prompt()?;
        store.set_building_field(index, BuildingField::Name, &name)?;

        let floors = Text::new("  Floors (1-200):")
            .with_initial_value(&entry.floors.to_string())
            .prompt()?;
        store.set_building_field(index, BuildingField::Floors, &floors)?;

        let devices = Text::new("  Approx. devices (0-100000):")
            .with_initial_value(&entry.approx_devices.to_string())
            .prompt()?;
        store.set_building_field(index, BuildingField::ApproxDevices, &devices)?;
    }

    let summary = store.compute_summary();
    println!(
        "{} {} floors, {} devices",
        "Totals:".dimmed(),
        summary.total_floors,
        summary.total_devices
    );
    Ok(())
}

fn prompt_solution(store: &mut ProjectStore) -> Result<()> {
    let solution = store.document().solution.clone();

    let labels: Vec<&str> = Connectivity::ALL.iter().map(|c| c.label()).collect();
    let cursor = Connectivity::ALL
        .iter()
        .position(|c| *c == solution.connectivity)
        .unwrap_or(0);
    let choice = Select::new("Connectivity:", labels)
        .with_starting_cursor(cursor)
        .prompt()?;
    if let Some(connectivity) = Connectivity::ALL.iter().find(|c| c.label() == choice) {
        store.set_field("solution.connectivity", &connectivity.to_string())?;
    }

    let cloud = Confirm::new("Include cloud services?")
        .with_default(solution.includes_cloud)
        .prompt()?;
    store.set_field("solution.includesCloud", &cloud.to_string())?;

    let enabled: Vec<usize> = INTEGRATION_KEYS
        .iter()
        .enumerate()
        .filter(|(_, key)| solution.integration(key))
        .map(|(i, _)| i)
        .collect();
    let selected = MultiSelect::new("Integrations:", INTEGRATION_KEYS.to_vec())
        .with_default(&enabled)
        .prompt()?;
    for key in INTEGRATION_KEYS {
        let on = selected.contains(&key);
        store.set_field(&format!("solution.integrations.{}", key), &on.to_string())?;
    }
    Ok(())
}

/// Asks before discarding the current project
pub fn confirm_reset() -> Result<bool> {
    let confirm = Confirm::new("Discard the current project and start over?")
        .with_default(false)
        .prompt()?;
    Ok(confirm)
}
