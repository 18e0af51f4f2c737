//! Poll reconciliation: completion, crash detection and ambiguity.

use super::helpers::{OrchestrationHarness, harness};
use chantier::orchestration::{domain::EXITED_WITHOUT_COMPLETING, ports::IsolationProvider};
use rstest::rstest;

async fn spawn_one(harness: &OrchestrationHarness) -> Result<(), eyre::Report> {
    harness.add_child("T1", 1)?;
    let report = harness.orchestrate(1).await?;
    eyre::ensure!(report.spawned.len() == 1, "expected one spawn: {report:?}");
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn exited_agent_holding_its_claim_is_failed(
    harness: OrchestrationHarness,
) -> Result<(), eyre::Report> {
    spawn_one(&harness).await?;
    let session = harness.session_of("T1").await?;
    harness.execution.exit(session)?;

    let poll = harness.poll().await?;

    let failed = poll
        .newly_failed
        .first()
        .ok_or_else(|| eyre::eyre!("expected a failure: {poll:?}"))?;
    eyre::ensure!(failed.failure_reason == EXITED_WITHOUT_COMPLETING, "reason");
    eyre::ensure!(poll.all_done, "nothing left in flight");
    let state = harness.state().await?;
    let tracked = state
        .find_by_session(session)
        .ok_or_else(|| eyre::eyre!("assignment missing"))?;
    eyre::ensure!(harness.isolation.owner_of(&tracked.assignment().isolation_resource_id)?.is_none(), "claim should be released");
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn cleanly_exited_agent_stays_running(
    harness: OrchestrationHarness,
) -> Result<(), eyre::Report> {
    spawn_one(&harness).await?;
    let state = harness.state().await?;
    let tracked = state
        .spawned()
        .next()
        .ok_or_else(|| eyre::eyre!("assignment missing"))?;
    harness
        .isolation
        .release(&tracked.assignment().isolation_resource_id, tracked.session_id())
        .await?;
    harness.execution.exit(tracked.session_id())?;

    let poll = harness.poll().await?;

    eyre::ensure!(poll.newly_failed.is_empty(), "clean exit is not a crash");
    eyre::ensure!(poll.still_running.len() == 1, "assignment stays spawned");
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn closed_task_completes_even_if_agent_is_gone(
    harness: OrchestrationHarness,
) -> Result<(), eyre::Report> {
    spawn_one(&harness).await?;
    let session = harness.session_of("T1").await?;
    harness.close_task("T1", "abc123")?;
    harness.execution.exit(session)?;

    let poll = harness.poll().await?;

    eyre::ensure!(poll.newly_failed.is_empty(), "completion wins over crash");
    eyre::ensure!(poll.newly_completed.len() == 1, "poll: {poll:?}");
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn ambiguous_signals_never_fail_an_assignment(
    harness: OrchestrationHarness,
) -> Result<(), eyre::Report> {
    spawn_one(&harness).await?;
    let session = harness.session_of("T1").await?;
    harness.execution.exit(session)?;
    harness.isolation.set_lookups_unavailable(true)?;

    let claim_unknown = harness.poll().await?;
    eyre::ensure!(claim_unknown.newly_failed.is_empty(), "unknown claim is not a crash");

    harness.isolation.set_lookups_unavailable(false)?;
    harness.execution.set_registry_unavailable(true)?;
    let registry_down = harness.poll().await?;
    eyre::ensure!(registry_down.newly_failed.is_empty(), "registry error is not a crash");
    eyre::ensure!(registry_down.still_running.len() == 1, "assignment stays spawned");
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn failed_task_is_retried_in_its_existing_worktree(
    harness: OrchestrationHarness,
) -> Result<(), eyre::Report> {
    spawn_one(&harness).await?;
    let first_session = harness.session_of("T1").await?;
    let first_resource = harness
        .state()
        .await?
        .find_by_session(first_session)
        .map(|tracked| tracked.assignment().isolation_resource_id.clone())
        .ok_or_else(|| eyre::eyre!("assignment missing"))?;
    harness.execution.exit(first_session)?;
    harness.poll().await?;

    let retry = harness.orchestrate(1).await?;

    let agent = retry
        .spawned
        .first()
        .ok_or_else(|| eyre::eyre!("failed task should be retried: {retry:?}"))?;
    eyre::ensure!(agent.session_id != first_session, "retry uses a new session");
    eyre::ensure!(agent.isolation_resource_id == first_resource, "worktree is reused");
    let state = harness.state().await?;
    eyre::ensure!(state.failed_count() == 0, "failed record is superseded");
    eyre::ensure!(state.spawned_count() == 1, "one live assignment");
    harness.assert_invariants(1).await
}
