//! Given steps for parallel orchestration BDD scenarios.

use super::world::OrchestrationWorld;
use chantier::orchestration::adapters::memory::FailurePoint;
use chantier::task::domain::{Task, TaskId, TaskType};
use chantier::workflow::domain::SessionId;
use eyre::WrapErr;
use mockable::DefaultClock;
use rstest_bdd_macros::given;

#[given(r#"a parent epic with ready tasks "{names}""#)]
fn parent_with_ready_tasks(
    world: &mut OrchestrationWorld,
    names: String,
) -> Result<(), eyre::Report> {
    let parent = TaskId::new("epic").wrap_err("parent id")?;
    world
        .tasks
        .insert(
            Task::new(parent.clone(), "Scenario epic", &DefaultClock)
                .wrap_err("build parent")?
                .with_task_type(TaskType::Epic),
        )
        .wrap_err("insert parent")?;

    for name in names.split(',').map(str::trim) {
        let child = Task::new(
            TaskId::new(name).wrap_err("child id")?,
            format!("Task {name}"),
            &DefaultClock,
        )
        .wrap_err("build child")?
        .with_parent(parent.clone());
        world.tasks.insert(child).wrap_err("insert child")?;
    }

    world.parent_task = Some(parent);
    Ok(())
}

#[given("an orchestrating session")]
fn orchestrating_session(world: &mut OrchestrationWorld) {
    world.parent_session = Some(SessionId::new());
}

#[given(r#"spawning task "{name}" fails"#)]
fn spawning_fails(world: &mut OrchestrationWorld, name: String) -> Result<(), eyre::Report> {
    world
        .execution
        .fail_task_at(TaskId::new(name).wrap_err("task id")?, FailurePoint::Dispatch)
        .wrap_err("arm dispatch failure")
}
