use anyhow::Result;
use kiln_project::load_config;
use kiln_store::status::{read_status, ProjectStatus};
use std::path::Path;

/// Execute `kiln status`: the latest snapshot of every project.
pub fn execute(config_path: &Path, json: bool) -> Result<()> {
    let config = load_config(config_path)?;

    let mut statuses: Vec<(String, Option<ProjectStatus>)> = Vec::new();
    for project in &config.projects {
        let status = read_status(&project.log_dir)?;
        statuses.push((project.name.clone(), status));
    }

    if json {
        let mut entries = Vec::new();
        for (name, status) in &statuses {
            match status {
                Some(s) => entries.push(serde_json::to_value(s)?),
                None => entries.push(serde_json::json!({ "project": name })),
            }
        }
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    println!(
        "{:<20} {:<26} {:<14} {:<10} {}",
        "PROJECT", "PHASE", "LABEL", "OUTCOME", "NEXT BUILD"
    );
    for (name, status) in &statuses {
        match status {
            Some(s) => {
                let phase = if s.paused {
                    format!("{} (paused)", s.phase)
                } else {
                    s.phase.clone()
                };
                println!(
                    "{:<20} {:<26} {:<14} {:<10} {}",
                    s.project,
                    phase,
                    s.label,
                    s.last_outcome.as_deref().unwrap_or("-"),
                    s.next_build_at.as_deref().unwrap_or("-")
                );
            }
            None => println!("{:<20} no status recorded", name),
        }
    }
    Ok(())
}
