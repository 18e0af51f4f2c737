//! Then steps for parallel orchestration BDD scenarios.

use super::world::OrchestrationWorld;
use chantier::orchestration::domain::{AssignmentStatus, CAPACITY_SKIP_REASON};
use chantier::task::domain::TaskId;
use eyre::{OptionExt, WrapErr};
use rstest_bdd_macros::then;

#[then("{count:usize} agents are spawned")]
fn agents_spawned(world: &OrchestrationWorld, count: usize) -> Result<(), eyre::Report> {
    let report = world.report()?;
    eyre::ensure!(
        report.spawned.len() == count,
        "expected {count} spawned agents, found {}",
        report.spawned.len()
    );
    let state = world.state()?;
    eyre::ensure!(
        state.spawned_count() == count,
        "expected {count} spawned assignments, found {}",
        state.spawned_count()
    );
    Ok(())
}

#[then("{count:usize} tasks are skipped for capacity")]
fn tasks_skipped(world: &OrchestrationWorld, count: usize) -> Result<(), eyre::Report> {
    let report = world.report()?;
    let skipped = report
        .skipped
        .iter()
        .filter(|entry| entry.reason == CAPACITY_SKIP_REASON)
        .count();
    eyre::ensure!(
        skipped == count,
        "expected {count} capacity skips, found {skipped}"
    );
    Ok(())
}

#[then(r#"task "{name}" is completed with commit "{sha}""#)]
fn task_completed(
    world: &OrchestrationWorld,
    name: String,
    sha: String,
) -> Result<(), eyre::Report> {
    let task_id = TaskId::new(name).wrap_err("task id")?;
    let poll = world.poll()?;
    let reported = poll
        .newly_completed
        .iter()
        .find(|agent| agent.task_id == task_id)
        .ok_or_eyre("completion was not reported")?;
    eyre::ensure!(
        reported.commit_sha.as_deref() == Some(sha.as_str()),
        "expected commit {sha}, found {:?}",
        reported.commit_sha
    );

    let state = world.state()?;
    let tracked = state
        .find_by_task(&task_id)
        .ok_or_eyre("completed task is not tracked")?;
    let outcome = tracked
        .completion()
        .ok_or_eyre("assignment is not completed")?;
    eyre::ensure!(
        outcome.commit_sha.as_deref() == Some(sha.as_str()),
        "persisted commit does not match"
    );
    Ok(())
}

#[then(r#"task "{name}" has a running agent"#)]
fn task_running(world: &OrchestrationWorld, name: String) -> Result<(), eyre::Report> {
    let task_id = TaskId::new(name).wrap_err("task id")?;
    let state = world.state()?;
    let tracked = state
        .find_by_task(&task_id)
        .ok_or_eyre("task is not tracked")?;
    eyre::ensure!(
        matches!(tracked.status(), AssignmentStatus::Spawned),
        "expected a running agent for {task_id}, found {}",
        tracked.status().as_str()
    );
    Ok(())
}

#[then(r#"task "{name}" is failed with reason "{reason}""#)]
fn task_failed(
    world: &OrchestrationWorld,
    name: String,
    reason: String,
) -> Result<(), eyre::Report> {
    let task_id = TaskId::new(name).wrap_err("task id")?;
    let state = world.state()?;
    let tracked = state
        .find_by_task(&task_id)
        .ok_or_eyre("failed task is not tracked")?;
    let failure = tracked.failure().ok_or_eyre("assignment is not failed")?;
    eyre::ensure!(
        failure.reason == reason,
        "expected failure reason {reason:?}, found {:?}",
        failure.reason
    );
    Ok(())
}

#[then(r#"task "{name}" is reported as a spawn error"#)]
fn task_spawn_error(world: &OrchestrationWorld, name: String) -> Result<(), eyre::Report> {
    let task_id = TaskId::new(name).wrap_err("task id")?;
    let report = world.report()?;
    eyre::ensure!(
        report.errors.iter().any(|failure| failure.task_id == task_id),
        "no spawn error reported for {task_id}"
    );
    let state = world.state()?;
    eyre::ensure!(
        state.find_by_task(&task_id).is_none(),
        "failed spawn must not be recorded"
    );
    Ok(())
}

#[then("{count:usize} agents are marked failed")]
fn agents_failed(world: &OrchestrationWorld, count: usize) -> Result<(), eyre::Report> {
    let poll = world.poll()?;
    eyre::ensure!(
        poll.newly_failed.len() == count,
        "expected {count} failures, found {}",
        poll.newly_failed.len()
    );
    eyre::ensure!(poll.all_done, "no agents should remain running");
    Ok(())
}
