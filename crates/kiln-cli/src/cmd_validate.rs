use anyhow::Result;
use kiln_project::{assemble_project, load_config};
use std::path::Path;

/// Execute `kiln validate`: parse the configuration and assemble every
/// project's plugins, so bad settings surface without running anything.
pub fn execute(config_path: &Path) -> Result<()> {
    let config = load_config(config_path)?;
    for project in &config.projects {
        assemble_project(project)?;
        println!("  \u{2713} {}", project.name);
    }
    println!("configuration OK ({} project(s))", config.projects.len());
    Ok(())
}
