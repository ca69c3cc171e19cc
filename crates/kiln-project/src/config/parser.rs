use crate::config::schema::KilnConfig;
use anyhow::{bail, Context, Result};
use std::path::Path;

/// Load and validate a configuration from a YAML file.
pub fn load_config(path: &Path) -> Result<KilnConfig> {
    let content =
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    parse_config(&content)
}

/// Parse and validate a configuration from a YAML string.
pub fn parse_config(yaml: &str) -> Result<KilnConfig> {
    let config: KilnConfig = serde_yml::from_str(yaml).context("invalid configuration")?;
    validate_config(&config)?;
    Ok(config)
}

/// Validate constraints that can't be expressed in serde. Plugin-level
/// settings are checked later, when each plugin spec is instantiated.
fn validate_config(config: &KilnConfig) -> Result<()> {
    if config.projects.is_empty() {
        bail!("configuration must declare at least one project");
    }

    if config.max_concurrent_builds == Some(0) {
        bail!("max_concurrent_builds must be at least 1 when set");
    }

    let mut seen_names = std::collections::HashSet::new();
    for project in &config.projects {
        if !is_kebab_case(&project.name) {
            bail!(
                "project name must be kebab-case (lowercase letters, digits, hyphens), got: \"{}\"",
                project.name
            );
        }
        if !seen_names.insert(project.name.as_str()) {
            bail!("duplicate project name: \"{}\"", project.name);
        }
        if project.interval == 0 {
            bail!("'interval' must be at least 1 second for project \"{}\"", project.name);
        }
        if project.log_dir.as_os_str().is_empty() {
            bail!("'log_dir' is required for project \"{}\"", project.name);
        }
        if project.source_controls.is_empty() {
            bail!(
                "project \"{}\" must declare at least one source control",
                project.name
            );
        }
    }

    Ok(())
}

fn is_kebab_case(s: &str) -> bool {
    if s.is_empty() {
        return false;
    }
    let first = s.as_bytes()[0];
    if !(first.is_ascii_lowercase() || first.is_ascii_digit()) {
        return false;
    }
    s.bytes()
        .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_minimal_config() {
        let yaml = r#"
projects:
  - name: web
    interval: 300
    log_dir: /var/kiln/web
    source_controls:
      - type: journal
        journal_file: /var/journal.txt
    builder:
      type: exec
      command: "make all"
"#;
        let config = parse_config(yaml).unwrap();
        assert_eq!(config.projects.len(), 1);
        assert_eq!(config.projects[0].name, "web");
        assert!(config.max_concurrent_builds.is_none());
    }

    #[test]
    fn reject_empty_projects() {
        let err = parse_config("projects: []\n").unwrap_err();
        assert!(err.to_string().contains("at least one project"));
    }

    #[test]
    fn reject_non_kebab_name() {
        let yaml = r#"
projects:
  - name: WebSite
    interval: 60
    log_dir: logs
    source_controls:
      - type: journal
        journal_file: j.txt
    builder:
      type: exec
      command: "true"
"#;
        let err = parse_config(yaml).unwrap_err();
        assert!(err.to_string().contains("kebab-case"));
    }

    #[test]
    fn reject_duplicate_names() {
        let yaml = r#"
projects:
  - name: web
    interval: 60
    log_dir: a
    source_controls:
      - type: journal
        journal_file: j.txt
    builder:
      type: exec
      command: "true"
  - name: web
    interval: 60
    log_dir: b
    source_controls:
      - type: journal
        journal_file: j.txt
    builder:
      type: exec
      command: "true"
"#;
        let err = parse_config(yaml).unwrap_err();
        assert!(err.to_string().contains("duplicate project name"));
    }

    #[test]
    fn reject_zero_interval() {
        let yaml = r#"
projects:
  - name: web
    interval: 0
    log_dir: logs
    source_controls:
      - type: journal
        journal_file: j.txt
    builder:
      type: exec
      command: "true"
"#;
        let err = parse_config(yaml).unwrap_err();
        assert!(err.to_string().contains("'interval'"));
    }

    #[test]
    fn reject_missing_source_controls() {
        let yaml = r#"
projects:
  - name: web
    interval: 60
    log_dir: logs
    source_controls: []
    builder:
      type: exec
      command: "true"
"#;
        let err = parse_config(yaml).unwrap_err();
        assert!(err.to_string().contains("at least one source control"));
    }

    #[test]
    fn reject_zero_build_limit() {
        let yaml = r#"
max_concurrent_builds: 0
projects:
  - name: web
    interval: 60
    log_dir: logs
    source_controls:
      - type: journal
        journal_file: j.txt
    builder:
      type: exec
      command: "true"
"#;
        let err = parse_config(yaml).unwrap_err();
        assert!(err.to_string().contains("max_concurrent_builds"));
    }

    #[test]
    fn unknown_builder_type_is_rejected() {
        let yaml = r#"
projects:
  - name: web
    interval: 60
    log_dir: logs
    source_controls:
      - type: journal
        journal_file: j.txt
    builder:
      type: ant
      command: "build.xml"
"#;
        assert!(parse_config(yaml).is_err());
    }
}
