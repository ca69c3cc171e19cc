pub mod machine;
pub mod persist;

pub use machine::{transition, ProjectPhase, ProjectState};
pub use persist::{load_or_init, load_state, save_state, state_path};
