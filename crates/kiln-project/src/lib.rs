//! Project configuration, the build phase machine, and the cycle loop.
//!
//! A project is a YAML-declared pipeline: source control adaptors that
//! detect modifications, bootstrappers that prepare the workspace, one
//! builder that produces a classified result, a label series, and
//! publishers that announce outcomes. This crate parses that
//! declaration, assembles it into live plugins, and drives the
//! configured interval loop per project until shutdown.

pub mod config;
pub mod control;
pub mod runner;
pub mod schedule;
pub mod state;

pub use config::{load_config, parse_config, KilnConfig, ProjectConfig};
pub use control::ProjectControl;
pub use runner::{assemble_project, run_cycle, run_project, CycleOutcome, ProjectRuntime};
pub use state::{ProjectPhase, ProjectState};
