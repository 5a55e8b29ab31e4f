use anyhow::Context;
use std::fs;
use std::path::{Path, PathBuf};

use crate::models::{ProjectDocument, INTEGRATION_KEYS};
use crate::store::{ProjectStore, StoreError};

/// File name used when exporting a document: `project-{projectAutoId}.json`
pub fn export_file_name(doc: &ProjectDocument) -> String {
    format!("project-{}.json", doc.project.project_auto_id)
}

/// Writes the exported document to `output`.
///
/// If `output` is an existing directory the conventional file name is used
/// inside it. Returns the path written.
pub fn export_to_path(store: &ProjectStore, output: &Path) -> Result<PathBuf, StoreError> {
    let target = if output.is_dir() {
        output.join(export_file_name(store.document()))
    } else {
        output.to_path_buf()
    };

    let json = store.export_document()?;
    fs::write(&target, json).with_context(|| format!("Failed to write export to {:?}", target))?;

    Ok(target)
}

/// Reads a UTF-8 JSON file and imports it into the store
pub fn import_from_path<'a>(
    store: &'a mut ProjectStore,
    path: &Path,
) -> Result<&'a ProjectDocument, StoreError> {
    let raw =
        fs::read_to_string(path).with_context(|| format!("Failed to read import file {:?}", path))?;
    store.import_document(&raw)
}

fn display_label(integration: &str) -> String {
    match integration {
        "bms" => "BMS".to_string(),
        "accessControl" => "Access Control".to_string(),
        "cctv" => "CCTV".to_string(),
        other => other.to_string(),
    }
}

fn or_placeholder(value: &str) -> &str {
    if value.trim().is_empty() {
        "-"
    } else {
        value
    }
}

/// Renders a markdown summary of the project: identity, buildings, totals and solution
pub fn summary_markdown(doc: &ProjectDocument) -> String {
    let mut output = String::new();
    let summary = doc.summary();

    let title = if doc.project.project_name.trim().is_empty() {
        "Untitled project"
    } else {
        doc.project.project_name.as_str()
    };
    output.push_str(&format!("# {}\n\n", title));

    output.push_str("## Project\n\n");
    output.push_str(&format!(
        "- **Project Auto-ID:** {}\n",
        doc.project.project_auto_id
    ));
    output.push_str(&format!(
        "- **Systems Integrator ID:** {}\n",
        or_placeholder(&doc.project.systems_integrator_id)
    ));
    output.push_str(&format!(
        "- **Number of buildings:** {}\n\n",
        doc.project.buildings_count
    ));

    output.push_str("## Buildings\n\n");
    output.push_str("| # | Name | Floors | Approx. devices |\n");
    output.push_str("|---|------|--------|-----------------|\n");
    for (idx, building) in doc.building.items.iter().enumerate() {
        output.push_str(&format!(
            "| {} | {} | {} | {} |\n",
            idx + 1,
            or_placeholder(&building.name).replace('|', "\\|"),
            building.floors,
            building.approx_devices
        ));
    }
    output.push('\n');

    output.push_str("## Summary\n\n");
    output.push_str(&format!("- Buildings: {}\n", summary.buildings));
    output.push_str(&format!("- Total floors: {}\n", summary.total_floors));
    output.push_str(&format!("- Approx. devices: {}\n\n", summary.total_devices));

    output.push_str("## Solution\n\n");
    output.push_str(&format!(
        "- **Connectivity:** {}\n",
        doc.solution.connectivity.label()
    ));
    output.push_str(&format!(
        "- **Cloud component:** {}\n",
        if doc.solution.includes_cloud { "yes" } else { "no" }
    ));

    // Known integrations first, then anything extra carried by imported documents
    let mut enabled: Vec<String> = INTEGRATION_KEYS
        .iter()
        .filter(|key| doc.solution.integration(key))
        .map(|key| display_label(key))
        .collect();
    enabled.extend(
        doc.solution
            .integrations
            .iter()
            .filter(|(key, on)| **on && !INTEGRATION_KEYS.contains(&key.as_str()))
            .map(|(key, _)| display_label(key)),
    );
    let integrations = if enabled.is_empty() {
        "none".to_string()
    } else {
        enabled.join(", ")
    };
    output.push_str(&format!("- **Integrations:** {}\n", integrations));

    output
}
