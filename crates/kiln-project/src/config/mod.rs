pub mod parser;
pub mod schema;

pub use parser::{load_config, parse_config};
pub use schema::{KilnConfig, ProjectConfig};
