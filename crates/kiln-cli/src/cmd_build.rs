use anyhow::{bail, Context, Result};
use kiln_project::runner::LOCK_FILE;
use kiln_project::state::{load_or_init, save_state};
use kiln_project::{assemble_project, load_config, run_cycle, ProjectControl, ProjectPhase};
use std::path::Path;
use tokio_util::sync::CancellationToken;

/// Execute `kiln build <project>`: one forced cycle, then exit.
/// The process exits non-zero if the build did not succeed.
pub fn execute(config_path: &Path, project: &str) -> Result<()> {
    let config = load_config(config_path)?;
    let Some(project_config) = config.projects.iter().find(|p| p.name == project) else {
        let known: Vec<&str> = config.projects.iter().map(|p| p.name.as_str()).collect();
        bail!(
            "no project named \"{project}\" in {} (known: {})",
            config_path.display(),
            known.join(", ")
        );
    };
    let runtime = assemble_project(project_config)?;

    let log_dir = runtime.config.log_dir.clone();
    std::fs::create_dir_all(&log_dir)
        .with_context(|| format!("creating log dir {}", log_dir.display()))?;
    let _lock = kiln_store::lock_file(&log_dir.join(LOCK_FILE)).with_context(|| {
        format!(
            "locking {} (is a kiln daemon already running this project?)",
            log_dir.display()
        )
    })?;

    let mut state = load_or_init(&log_dir, project, &runtime.label.default_label())?;
    if state.phase != ProjectPhase::Waiting {
        println!("previous run stopped mid-cycle, resuming from waiting");
        state.phase = ProjectPhase::Waiting;
        save_state(&log_dir, &state)?;
    }

    let control = ProjectControl::new();
    control.force_build();
    let cancel = CancellationToken::new();
    ctrlc_cancel(cancel.clone());

    let rt = tokio::runtime::Runtime::new()?;
    let outcome = rt.block_on(run_cycle(&runtime, &mut state, &control, None, &cancel))?;

    match outcome.result {
        Some(result) if result.success => {
            println!(
                "build succeeded: {} is now {}",
                project,
                outcome.label.as_deref().unwrap_or_default()
            );
            Ok(())
        }
        Some(result) => {
            let what = if result.timed_out { "timed out" } else { "failed" };
            println!("build {what} ({} error(s))", result.error_count());
            if let Some(error) = &result.error {
                println!("  {error}");
            }
            std::process::exit(1);
        }
        None => {
            println!("nothing to build");
            Ok(())
        }
    }
}

fn ctrlc_cancel(cancel: CancellationToken) {
    let _ = ctrlc::set_handler(move || {
        cancel.cancel();
    });
}
