//! Project assembly and the build cycle loop.

pub mod assemble;
pub mod cycle;

pub use assemble::{assemble_project, ProjectRuntime};
pub use cycle::{run_cycle, run_project, CycleOutcome, LOCK_FILE};
