//! Build execution for kiln: the bounded process runner, the output
//! classifier, and the builder and bootstrapper seams the project loop
//! drives.

pub mod bootstrap;
pub mod builder;
pub mod classify;
pub mod runner;

pub use bootstrap::{
    Bootstrapper, BootstrapperSettings, BootstrapperSpec, ExecBootstrapper, MockBootstrapper,
};
pub use builder::{Builder, BuilderSpec, ExecBuilder, ExecSettings, MockBuilder};
pub use classify::{classify, classify_lines, compile_recognizers, Recognizer, RecognizerSpec};
pub use runner::{run_command, RunSpec, RunStatus, RunTranscript};
