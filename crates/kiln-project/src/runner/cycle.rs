use crate::control::ProjectControl;
use crate::runner::assemble::ProjectRuntime;
use crate::schedule;
use crate::state::machine::{self, ProjectPhase, ProjectState};
use crate::state::persist;
use anyhow::{Context, Result};
use kiln_core::{BuildResult, LogEntry, PollWindow, Severity};
use kiln_publish::{publish_all, Announcement, GateInput};
use kiln_scm::poll_all;
use kiln_store::archive::{write_record, ArchivedModification, BuildRecord};
use kiln_store::status::{now_rfc3339, write_status, ProjectStatus};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Advisory lock taken by the owning loop; readers never take it.
pub const LOCK_FILE: &str = "kiln.lock";
/// Raw build output, overwritten by each build.
const LIVE_LOG: &str = "build.log";

/// What one pass of the loop body did.
#[derive(Debug)]
pub struct CycleOutcome {
    pub built: bool,
    /// Classified result, present iff `built`.
    pub result: Option<BuildResult>,
    /// Label applied to a successful build.
    pub label: Option<String>,
    /// Archive file written for this build.
    pub archive: Option<PathBuf>,
}

impl CycleOutcome {
    fn idle() -> Self {
        CycleOutcome {
            built: false,
            result: None,
            label: None,
            archive: None,
        }
    }
}

/// Drive one full cycle of a project loop.
///
/// Poll, build, and publish failures are absorbed: a failed build is
/// still labeled (unchanged), archived, and published. An error while
/// persisting state or the archive escapes to the caller and is fatal
/// to the loop, since an unpersisted window boundary risks
/// re-processing or skipping modifications.
pub async fn run_cycle(
    runtime: &ProjectRuntime,
    state: &mut ProjectState,
    control: &ProjectControl,
    build_permits: Option<&Semaphore>,
    cancel: &CancellationToken,
) -> Result<CycleOutcome> {
    let project = runtime.config.name.clone();
    let force = control.take_force();

    enter(runtime, state, control, ProjectPhase::CheckingModifications)?;

    let until = OffsetDateTime::now_utc();
    let since = state
        .last_build_time()?
        .unwrap_or(OffsetDateTime::UNIX_EPOCH);
    let report = poll_all(&runtime.source_controls, PollWindow::new(since, until)).await;

    let first_cycle = state.last_build.is_none();
    let necessary =
        report.build_necessary() || force || (first_cycle && runtime.config.initial_build);

    if !necessary {
        debug!(project = %project, "no modifications, nothing to build");
        if runtime.config.advance_on_idle {
            state.last_build = Some(rfc3339(until));
        }
        enter(runtime, state, control, ProjectPhase::Waiting)?;
        return Ok(CycleOutcome::idle());
    }

    // A build is decided; wait for a host-wide slot before starting it.
    let _permit = match build_permits {
        Some(slots) => {
            tokio::select! {
                permit = slots.acquire() => Some(permit.context("acquiring build slot")?),
                _ = cancel.cancelled() => {
                    info!(project = %project, "shutdown while waiting for a build slot");
                    enter(runtime, state, control, ProjectPhase::Waiting)?;
                    return Ok(CycleOutcome::idle());
                }
            }
        }
        None => None,
    };

    info!(
        project = %project,
        modifications = report.modifications.len(),
        forced = force,
        "starting build cycle"
    );
    let started = Instant::now();
    let started_at = rfc3339(until);

    enter(runtime, state, control, ProjectPhase::Bootstrapping)?;
    let mut bootstrap_error = None;
    for bootstrapper in &runtime.bootstrappers {
        if let Err(e) = bootstrapper.bootstrap(cancel).await {
            error!(
                project = %project,
                step = %bootstrapper.describe(),
                error = %e,
                "bootstrapper failed"
            );
            bootstrap_error = Some(format!("{e:#}"));
            break;
        }
    }

    let attempted = bootstrap_error.is_none();
    let result = match bootstrap_error {
        None => {
            enter(runtime, state, control, ProjectPhase::Building)?;
            let live_log = runtime.config.log_dir.join(LIVE_LOG);
            match runtime.builder.build(Some(live_log.as_path()), cancel).await {
                Ok(result) => result,
                Err(e) => {
                    error!(project = %project, error = %e, "build command could not run");
                    failure_result(format!("{e:#}"), started)
                }
            }
        }
        Some(message) => failure_result(message, started),
    };

    enter(runtime, state, control, ProjectPhase::Labeling)?;
    let label = if result.success {
        let applied = state.label.clone();
        state.label = runtime
            .label
            .increment_label(&applied)
            .with_context(|| format!("advancing label \"{applied}\""))?;
        Some(applied)
    } else {
        None
    };

    enter(runtime, state, control, ProjectPhase::Logging)?;
    let record = BuildRecord {
        project: project.clone(),
        started_at: started_at.clone(),
        label: label.clone(),
        forced: force,
        result: result.clone(),
        modifications: report
            .modifications
            .iter()
            .map(ArchivedModification::from)
            .collect(),
        properties: report.properties.clone(),
    };
    let archive = write_record(&runtime.config.log_dir, until, &record)?;

    enter(runtime, state, control, ProjectPhase::Publishing)?;
    let previously_successful = state.previously_successful();
    let announcement = Announcement {
        project: project.clone(),
        label: label.clone(),
        success: result.success,
        timed_out: result.timed_out,
        fixed: result.success && state.last_outcome.is_some() && !previously_successful,
        started_at,
        elapsed_ms: result.elapsed_ms,
        error_count: result.error_count(),
        error: result.error.clone(),
    };
    let gate_input = GateInput {
        build_successful: result.success,
        previously_successful,
        build_attempted: attempted,
    };
    publish_all(&runtime.publishers, gate_input, &announcement).await;

    state.last_build = Some(rfc3339(until));
    state.last_outcome = Some(outcome(&result).to_string());
    if result.success {
        state.last_successful_build = Some(rfc3339(until));
    }
    enter(runtime, state, control, ProjectPhase::Waiting)?;

    if result.success {
        info!(
            project = %project,
            label = label.as_deref().unwrap_or_default(),
            "build succeeded"
        );
    } else {
        warn!(project = %project, outcome = outcome(&result), "build did not succeed");
    }

    Ok(CycleOutcome {
        built: true,
        result: Some(result),
        label,
        archive: Some(archive),
    })
}

/// Run a project's timer loop until shutdown. Returns an error only for
/// conditions fatal to this project (state that cannot persist).
pub async fn run_project(
    runtime: ProjectRuntime,
    control: ProjectControl,
    build_permits: Option<Arc<Semaphore>>,
    cancel: CancellationToken,
) -> Result<()> {
    let project = runtime.config.name.clone();
    let log_dir = runtime.config.log_dir.clone();
    std::fs::create_dir_all(&log_dir)
        .with_context(|| format!("creating log dir {}", log_dir.display()))?;
    let _lock = kiln_store::lock_file(&log_dir.join(LOCK_FILE))
        .with_context(|| format!("locking {}", log_dir.display()))?;

    let mut state = persist::load_or_init(&log_dir, &project, &runtime.label.default_label())?;
    if state.phase != ProjectPhase::Waiting {
        warn!(
            project = %project,
            phase = state.phase.as_str(),
            "previous run stopped mid-cycle, resuming from waiting"
        );
        state.phase = ProjectPhase::Waiting;
        persist::save_state(&log_dir, &state)?;
    }
    info!(project = %project, label = %state.label, "project loop started");

    loop {
        let next = schedule::next_poll(
            runtime.config.absolute,
            OffsetDateTime::now_utc(),
            runtime.config.poll_interval(),
        );
        snapshot_status(&runtime, &state, &control, Some(next));

        if !wait_for_tick(&control, &cancel, next).await {
            break;
        }
        if !wait_while_paused(&project, &control, &cancel).await {
            break;
        }
        run_cycle(&runtime, &mut state, &control, build_permits.as_deref(), &cancel).await?;
    }

    snapshot_status(&runtime, &state, &control, None);
    info!(project = %project, "project loop stopped");
    Ok(())
}

/// Sleep until `next`, a force wake, or shutdown. False means shutdown.
async fn wait_for_tick(
    control: &ProjectControl,
    cancel: &CancellationToken,
    next: OffsetDateTime,
) -> bool {
    loop {
        if cancel.is_cancelled() {
            return false;
        }
        if control.force_pending() {
            return true;
        }
        let now = OffsetDateTime::now_utc();
        if now >= next {
            return true;
        }
        let remaining = Duration::try_from(next - now).unwrap_or(Duration::ZERO);
        tokio::select! {
            _ = tokio::time::sleep(remaining) => return true,
            _ = control.woken() => {}
            _ = cancel.cancelled() => return false,
        }
    }
}

/// Hold at the waiting boundary while paused. A latched force request
/// stays latched and fires after resume. False means shutdown.
async fn wait_while_paused(
    project: &str,
    control: &ProjectControl,
    cancel: &CancellationToken,
) -> bool {
    if control.is_paused() {
        info!(project = %project, "paused, holding at waiting boundary");
    }
    while control.is_paused() {
        tokio::select! {
            _ = control.woken() => {}
            _ = cancel.cancelled() => return false,
        }
    }
    true
}

/// Transition, persist, and refresh the status snapshot.
fn enter(
    runtime: &ProjectRuntime,
    state: &mut ProjectState,
    control: &ProjectControl,
    to: ProjectPhase,
) -> Result<()> {
    machine::transition(state, to)?;
    persist::save_state(&runtime.config.log_dir, state)?;
    snapshot_status(runtime, state, control, None);
    Ok(())
}

/// Best effort: a stale status file must never stop a build.
fn snapshot_status(
    runtime: &ProjectRuntime,
    state: &ProjectState,
    control: &ProjectControl,
    next_build_at: Option<OffsetDateTime>,
) {
    let now = now_rfc3339();
    let status = ProjectStatus {
        project: state.project.clone(),
        phase: state.phase.as_str().to_string(),
        since: now.clone(),
        label: state.label.clone(),
        paused: control.is_paused(),
        last_build: state.last_build.clone(),
        last_successful_build: state.last_successful_build.clone(),
        last_outcome: state.last_outcome.clone(),
        next_build_at: next_build_at.map(rfc3339),
        updated_at: now,
    };
    if let Err(e) = write_status(&runtime.config.log_dir, &status) {
        warn!(project = %state.project, error = %e, "status snapshot failed");
    }
}

/// A cycle that failed before producing classified output still records
/// a failed build.
fn failure_result(message: String, started: Instant) -> BuildResult {
    BuildResult {
        success: false,
        timed_out: false,
        elapsed_ms: started.elapsed().as_millis() as u64,
        exit_code: None,
        entries: vec![LogEntry::new(Severity::Error, message.clone())],
        error: Some(message),
    }
}

fn outcome(result: &BuildResult) -> &'static str {
    if result.timed_out {
        "timed_out"
    } else if result.success {
        "success"
    } else {
        "failed"
    }
}

fn rfc3339(t: OffsetDateTime) -> String {
    t.format(&Rfc3339).unwrap_or_default()
}
