//! Behaviour across daemon restarts and stored-state upgrades.

use super::helpers::{OrchestrationHarness, harness, task_id};
use chantier::workflow::{domain::WorkflowState, ports::WorkflowStateRepository};
use mockable::DefaultClock;
use rstest::rstest;
use serde_json::json;

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn state_survives_restart_and_blocks_duplicates(
    harness: OrchestrationHarness,
) -> Result<(), eyre::Report> {
    harness.add_child("T1", 1)?;
    harness.add_child("T2", 2)?;
    harness.orchestrate(1).await?;

    let restarted = harness.restarted()?;
    restarted.close_task("T1", "abc123")?;
    let poll = restarted.poll().await?;
    eyre::ensure!(poll.newly_completed.len() == 1, "completion after restart: {poll:?}");

    let report = restarted.orchestrate(1).await?;
    eyre::ensure!(
        report.spawned.iter().map(|a| a.task_id.as_str()).collect::<Vec<_>>() == ["T2"],
        "only T2 remains: {report:?}"
    );
    restarted.assert_invariants(1).await
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn agents_lost_in_restart_are_detected_as_crashed(
    harness: OrchestrationHarness,
) -> Result<(), eyre::Report> {
    harness.add_child("T1", 1)?;
    harness.add_child("T2", 2)?;
    harness.orchestrate(2).await?;

    let restarted = harness.restarted()?;
    let poll = restarted.poll().await?;

    eyre::ensure!(poll.newly_failed.len() == 2, "both agents crashed: {poll:?}");
    eyre::ensure!(poll.all_done, "nothing left in flight");
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn legacy_state_is_honoured_and_rewritten(
    harness: OrchestrationHarness,
) -> Result<(), eyre::Report> {
    harness.add_child("T1", 1)?;
    harness.add_child("T2", 2)?;
    let mut workflow = WorkflowState::new(
        harness.parent_session,
        "parallel-orchestrator",
        "orchestrate",
        &DefaultClock,
    );
    workflow.set_variable(
        "completed_agents",
        json!([{ "session_id": chantier::workflow::domain::SessionId::new(), "task_id": "T1", "worktree_id": "wt-legacy", "commit_sha": "abc123" }]),
        &DefaultClock,
    );
    harness.workflows.save(&workflow).await?;

    let report = harness.orchestrate(3).await?;

    eyre::ensure!(
        report.spawned.iter().all(|agent| agent.task_id != task_id("T1")),
        "completed legacy task must not respawn"
    );
    eyre::ensure!(report.spawned.len() == 1, "T2 spawns: {report:?}");
    let stored = harness
        .workflows
        .find(harness.parent_session)
        .await?
        .ok_or_else(|| eyre::eyre!("workflow missing"))?;
    eyre::ensure!(stored.variable("completed_agents").is_none(), "legacy key removed");
    eyre::ensure!(harness.state().await?.completed_count() == 1, "legacy completion kept");
    Ok(())
}
