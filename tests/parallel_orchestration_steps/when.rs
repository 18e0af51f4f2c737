//! When steps for parallel orchestration BDD scenarios.

use super::world::{OrchestrationWorld, run_async};
use chantier::orchestration::ports::IsolationProvider;
use chantier::task::domain::TaskId;
use eyre::{OptionExt, WrapErr};
use mockable::DefaultClock;
use rstest_bdd_macros::when;

#[when("ready tasks are orchestrated with a cap of {cap:u32}")]
fn orchestrate_with_cap(world: &mut OrchestrationWorld, cap: u32) -> Result<(), eyre::Report> {
    let (parent, session) = world.parent()?;
    let result = run_async(
        world
            .orchestrator
            .orchestrate_ready_tasks(&parent, session, cap),
    );
    world.last_report = Some(result);
    Ok(())
}

#[when("agent status is polled")]
fn poll_status(world: &mut OrchestrationWorld) -> Result<(), eyre::Report> {
    let (_, session) = world.parent()?;
    world.last_poll = Some(run_async(world.orchestrator.poll_agent_status(session)));
    Ok(())
}

#[when(r#"the agent for "{name}" closes its task with commit "{sha}""#)]
fn agent_closes_task(
    world: &mut OrchestrationWorld,
    name: String,
    sha: String,
) -> Result<(), eyre::Report> {
    let task_id = TaskId::new(name).wrap_err("task id")?;
    world
        .tasks
        .close(&task_id, Some("completed"), Some(&sha), &DefaultClock)
        .wrap_err("close task")?;
    let state = world.state()?;
    let tracked = state
        .find_by_task(&task_id)
        .ok_or_eyre("closed task is not tracked")?;
    world
        .execution
        .exit(tracked.session_id())
        .wrap_err("exit agent")?;
    Ok(())
}

#[when(r#"the agent for "{name}" exits without closing its task"#)]
fn agent_crashes(world: &mut OrchestrationWorld, name: String) -> Result<(), eyre::Report> {
    let task_id = TaskId::new(name).wrap_err("task id")?;
    let state = world.state()?;
    let tracked = state
        .find_by_task(&task_id)
        .ok_or_eyre("crashing task is not tracked")?;
    let exited = world
        .execution
        .exit(tracked.session_id())
        .wrap_err("exit agent")?;
    eyre::ensure!(exited, "agent for {task_id} was not running");
    Ok(())
}

#[when(r#"the agent for "{name}" releases its claim and exits"#)]
fn agent_exits_cleanly(world: &mut OrchestrationWorld, name: String) -> Result<(), eyre::Report> {
    let task_id = TaskId::new(name).wrap_err("task id")?;
    let state = world.state()?;
    let tracked = state
        .find_by_task(&task_id)
        .ok_or_eyre("exiting task is not tracked")?;
    run_async(world.isolation.release(
        &tracked.assignment().isolation_resource_id,
        tracked.session_id(),
    ))
    .wrap_err("release claim")?;
    world
        .execution
        .exit(tracked.session_id())
        .wrap_err("exit agent")?;
    Ok(())
}

#[when("the daemon restarts")]
fn daemon_restarts(world: &mut OrchestrationWorld) -> Result<(), eyre::Report> {
    world.execution.restart().wrap_err("clear running registry")?;
    world.rebuild_orchestrator();
    Ok(())
}
