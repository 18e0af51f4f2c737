//! End-to-end spawn, complete and refill flows against in-memory
//! collaborators.

use super::helpers::{OrchestrationHarness, harness, spawned_tasks, task_id};
use chantier::task::domain::Task;
use mockable::DefaultClock;
use rstest::rstest;

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn completed_agent_frees_a_slot_for_the_next_task(
    harness: OrchestrationHarness,
) -> Result<(), eyre::Report> {
    for (task, priority) in [("T0", 0), ("T1", 1), ("T2", 2), ("T3", 3), ("T4", 4)] {
        harness.add_child(task, priority)?;
    }
    let first = harness.orchestrate(3).await?;
    eyre::ensure!(spawned_tasks(&first) == ["T0", "T1", "T2"], "first pass: {first:?}");
    eyre::ensure!(first.skipped.len() == 2, "expected two skipped tasks");

    harness.close_task("T0", "abc123")?;
    let poll = harness.poll().await?;
    eyre::ensure!(poll.newly_completed.len() == 1, "poll: {poll:?}");
    let completed = poll
        .newly_completed
        .first()
        .ok_or_else(|| eyre::eyre!("missing completion"))?;
    eyre::ensure!(completed.task_id == task_id("T0"), "wrong task completed");
    eyre::ensure!(completed.commit_sha.as_deref() == Some("abc123"), "sha not captured");
    eyre::ensure!(poll.still_running.len() == 2, "expected two running agents");
    eyre::ensure!(!poll.all_done, "agents remain in flight");

    let refill = harness.orchestrate(3).await?;
    eyre::ensure!(spawned_tasks(&refill) == ["T3"], "refill pass: {refill:?}");
    eyre::ensure!(
        refill.skipped.iter().map(|s| s.task_id.as_str()).collect::<Vec<_>>() == ["T4"],
        "T4 should wait for capacity"
    );
    harness.assert_invariants(3).await
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn repeated_calls_never_double_spawn(
    harness: OrchestrationHarness,
) -> Result<(), eyre::Report> {
    harness.add_child("T1", 1)?;
    harness.add_child("T2", 2)?;

    let first = harness.orchestrate(5).await?;
    let second = harness.orchestrate(5).await?;

    eyre::ensure!(first.spawned.len() == 2, "first pass: {first:?}");
    eyre::ensure!(second.spawned.is_empty(), "second pass spawned: {second:?}");
    eyre::ensure!(second.skipped.is_empty(), "nothing should be skipped");
    eyre::ensure!(
        harness.execution.running_sessions()?.len() == 2,
        "exactly two agents should run"
    );
    harness.assert_invariants(5).await
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn blocked_task_waits_for_its_blocker(
    harness: OrchestrationHarness,
) -> Result<(), eyre::Report> {
    harness.add_child("T1", 2)?;
    harness.add_task(
        Task::new(task_id("T2"), "Depends on T1", &DefaultClock)?
            .with_parent(task_id("root"))
            .with_priority(0)
            .blocked_by(task_id("T1")),
    )?;

    let first = harness.orchestrate(3).await?;
    eyre::ensure!(spawned_tasks(&first) == ["T1"], "first pass: {first:?}");

    harness.close_task("T1", "f00d")?;
    harness.poll().await?;
    let second = harness.orchestrate(3).await?;
    eyre::ensure!(spawned_tasks(&second) == ["T2"], "second pass: {second:?}");
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn only_the_requested_subtree_is_scheduled(
    harness: OrchestrationHarness,
) -> Result<(), eyre::Report> {
    harness.add_child("T1", 1)?;
    harness.add_task(Task::new(task_id("other"), "Unrelated", &DefaultClock)?)?;
    harness.add_task(
        Task::new(task_id("nested"), "Grandchild", &DefaultClock)?.with_parent(task_id("T1")),
    )?;

    let report = harness.orchestrate(5).await?;

    let mut spawned = spawned_tasks(&report);
    spawned.sort();
    eyre::ensure!(spawned == ["T1", "nested"], "spawned: {spawned:?}");
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn tree_drains_without_exceeding_the_cap(
    harness: OrchestrationHarness,
) -> Result<(), eyre::Report> {
    let names: Vec<String> = (0..7).map(|n| format!("T{n}")).collect();
    for name in &names {
        harness.add_child(name, 1)?;
    }

    let mut rounds = 0;
    loop {
        rounds += 1;
        eyre::ensure!(rounds <= 10, "tree did not drain");
        let report = harness.orchestrate(2).await?;
        harness.assert_invariants(2).await?;
        for agent in &report.spawned {
            harness.close_task(agent.task_id.as_str(), "c0ffee")?;
        }
        let poll = harness.poll().await?;
        if poll.all_done && report.spawned.is_empty() {
            break;
        }
    }

    let state = harness.state().await?;
    eyre::ensure!(state.completed_count() == names.len(), "all tasks should complete");
    Ok(())
}
