use anyhow::Result;
use kiln_project::{assemble_project, load_config, run_project, ProjectControl};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Execute `kiln run`: every configured loop until interrupted.
pub fn execute(config_path: &Path) -> Result<()> {
    let config = load_config(config_path)?;

    // Assemble every project up front so a bad plugin setting stops the
    // whole daemon before any loop starts.
    let mut runtimes = Vec::new();
    for project in &config.projects {
        runtimes.push(assemble_project(project)?);
    }

    let build_permits = config
        .max_concurrent_builds
        .map(|n| Arc::new(Semaphore::new(n)));
    let cancel = CancellationToken::new();
    ctrlc_cancel(cancel.clone());

    println!(
        "kiln: running {} project(s) from {} (Ctrl+C to stop)",
        runtimes.len(),
        config_path.display()
    );

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        let mut handles = Vec::new();
        for runtime in runtimes {
            let name = runtime.config.name.clone();
            let handle = tokio::spawn(run_project(
                runtime,
                ProjectControl::new(),
                build_permits.clone(),
                cancel.clone(),
            ));
            handles.push((name, handle));
        }

        let mut failed = 0usize;
        for (name, handle) in handles {
            match handle.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    failed += 1;
                    error!(project = %name, "project loop failed: {e:#}");
                }
                Err(e) => {
                    failed += 1;
                    error!(project = %name, "project task panicked: {e}");
                }
            }
        }

        info!("all project loops stopped");
        if failed > 0 {
            anyhow::bail!("{failed} project loop(s) ended with an error");
        }
        Ok(())
    })
}

fn ctrlc_cancel(cancel: CancellationToken) {
    let _ = ctrlc::set_handler(move || {
        cancel.cancel();
    });
}
