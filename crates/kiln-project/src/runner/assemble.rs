use crate::config::ProjectConfig;
use anyhow::{Context, Result};
use kiln_build::{Bootstrapper, Builder};
use kiln_label::LabelIncrementer;
use kiln_publish::ConfiguredPublisher;
use kiln_scm::SourceControl;

/// Everything one project loop needs, instantiated once from
/// configuration and owned by the loop for its lifetime.
pub struct ProjectRuntime {
    pub config: ProjectConfig,
    pub source_controls: Vec<Box<dyn SourceControl>>,
    pub bootstrappers: Vec<Box<dyn Bootstrapper>>,
    pub builder: Box<dyn Builder>,
    pub label: Box<dyn LabelIncrementer>,
    pub publishers: Vec<ConfiguredPublisher>,
}

impl std::fmt::Debug for ProjectRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProjectRuntime")
            .field("config", &self.config)
            .field("source_controls", &self.source_controls.len())
            .field("bootstrappers", &self.bootstrappers.len())
            .field("publishers", &self.publishers.len())
            .finish_non_exhaustive()
    }
}

/// Instantiate every configured plugin, failing fast on the first bad
/// setting. Errors name the offending attribute and plugin.
pub fn assemble_project(config: &ProjectConfig) -> Result<ProjectRuntime> {
    let context = || format!("configuring project \"{}\"", config.name);

    let mut source_controls = Vec::with_capacity(config.source_controls.len());
    for spec in &config.source_controls {
        source_controls.push(spec.build().with_context(context)?);
    }

    let mut bootstrappers = Vec::with_capacity(config.bootstrappers.len());
    for spec in &config.bootstrappers {
        bootstrappers.push(spec.build().with_context(context)?);
    }

    let builder = config.builder.build().with_context(context)?;
    let label = config.label.build().with_context(context)?;

    let project_gate = config.gate();
    let mut publishers = Vec::with_capacity(config.publishers.len());
    for spec in &config.publishers {
        publishers.push(spec.build(project_gate).with_context(context)?);
    }

    Ok(ProjectRuntime {
        config: config.clone(),
        source_controls,
        bootstrappers,
        builder,
        label,
        publishers,
    })
}
