use std::collections::BTreeSet;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::NaiveDate;
use gantry_core::draft::{EmployeeDraft, ProjectDraft, TaskDraft};
use gantry_core::error::{Operation, WizardError};
use gantry_core::frontend::{Frontend, Notice, Severity};
use gantry_core::gateway::{Gateway, GatewayError};
use gantry_core::session::SessionStore;
use gantry_core::wizard::{Action, RESET_PROMPT, Step, Wizard};
use gantry_shared::{
    Employee, ImportedProject, ProjectConfig, Schedule, ScheduledTask, Task, WorkPattern,
};
use tempfile::tempdir;

fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}

#[derive(Default)]
struct FakeGateway {
    calls: Mutex<Vec<String>>,
    failure: Mutex<Option<(&'static str, GatewayError)>>,
    submitted_employees: Mutex<Vec<Employee>>,
    imported: Option<ImportedProject>,
}

impl FakeGateway {
    fn fail_on(&self, call: &'static str, err: GatewayError) {
        *self.failure.lock().expect("failure lock") = Some((call, err));
    }

    fn heal(&self) {
        *self.failure.lock().expect("failure lock") = None;
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("calls lock").clone()
    }

    fn clear_calls(&self) {
        self.calls.lock().expect("calls lock").clear();
    }

    fn record(&self, call: &'static str, detail: Option<&str>) -> Result<(), GatewayError> {
        let entry = match detail {
            Some(detail) => format!("{call}:{detail}"),
            None => call.to_string(),
        };
        self.calls.lock().expect("calls lock").push(entry);
        match self.failure.lock().expect("failure lock").as_ref() {
            Some((failing, err)) if *failing == call => Err(err.clone()),
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl Gateway for FakeGateway {
    async fn create_project(&self, project: &ProjectConfig) -> Result<(), GatewayError> {
        self.record("create_project", Some(&project.name))
    }

    async fn replace_employees(&self, employees: &[Employee]) -> Result<(), GatewayError> {
        self.record("replace_employees", None)?;
        *self.submitted_employees.lock().expect("employees lock") = employees.to_vec();
        Ok(())
    }

    async fn replace_tasks(&self, _tasks: &[Task]) -> Result<(), GatewayError> {
        self.record("replace_tasks", None)
    }

    async fn compute_schedule(&self) -> Result<(), GatewayError> {
        self.record("compute_schedule", None)
    }

    async fn fetch_schedule(&self) -> Result<Schedule, GatewayError> {
        self.record("fetch_schedule", None)?;
        Ok(Schedule {
            project_name: Some("Big Launch".to_string()),
            start_date: ymd(2024, 1, 1),
            end_date: Some(ymd(2024, 1, 3)),
            tasks: vec![ScheduledTask {
                name: "Design".to_string(),
                assigned_to: "Ana".to_string(),
                estimated_duration: 2,
                actual_duration: 3,
                availability: Some(100),
                contingency_margin: Some(0),
                dependency: None,
                start_date: Some(ymd(2024, 1, 1)),
                end_date: Some(ymd(2024, 1, 3)),
                working_dates: [ymd(2024, 1, 1), ymd(2024, 1, 3)].into_iter().collect(),
                holiday_dates: [ymd(2024, 1, 2)].into_iter().collect(),
            }],
        })
    }

    async fn reset_project(&self) -> Result<(), GatewayError> {
        self.record("reset_project", None)
    }

    async fn export_schedule(&self, filename: &str) -> Result<Vec<u8>, GatewayError> {
        self.record("export_schedule", Some(filename))?;
        Ok(b"PK\x03\x04workbook".to_vec())
    }

    async fn import_project(
        &self,
        file_name: &str,
        _contents: Vec<u8>,
    ) -> Result<ImportedProject, GatewayError> {
        self.record("import_project", Some(file_name))?;
        self.imported
            .clone()
            .ok_or_else(|| GatewayError::rejected("No file provided"))
    }
}

struct ScriptedFrontend {
    answer: bool,
    prompts: Vec<String>,
    notices: Vec<Notice>,
}

impl ScriptedFrontend {
    fn answering(answer: bool) -> Self {
        Self {
            answer,
            prompts: Vec::new(),
            notices: Vec::new(),
        }
    }

    fn last(&self) -> &Notice {
        self.notices.last().expect("at least one notice")
    }
}

impl Frontend for ScriptedFrontend {
    fn confirm(&mut self, prompt: &str) -> bool {
        self.prompts.push(prompt.to_string());
        self.answer
    }

    fn notify(&mut self, notice: Notice) {
        self.notices.push(notice);
    }
}

type TestWizard = Wizard<FakeGateway, ScriptedFrontend>;

fn wizard() -> TestWizard {
    Wizard::new(FakeGateway::default(), ScriptedFrontend::answering(true))
}

fn project_draft() -> ProjectDraft {
    ProjectDraft {
        name: "Big Launch".to_string(),
        start_date: "2024-01-01".to_string(),
        global_holidays: "2024-01-02".to_string(),
    }
}

fn employee_draft(name: &str) -> EmployeeDraft {
    EmployeeDraft {
        name: name.to_string(),
        ..EmployeeDraft::default()
    }
}

fn task_draft(name: &str, assignee: &str) -> TaskDraft {
    TaskDraft {
        name: name.to_string(),
        assigned_to: assignee.to_string(),
        estimated_duration: 2,
        ..TaskDraft::default()
    }
}

fn imported() -> ImportedProject {
    let employee = |name: &str| Employee {
        name: name.to_string(),
        work_pattern: WorkPattern::weekdays(),
        holidays: BTreeSet::new(),
    };
    ImportedProject {
        project_info: ProjectConfig {
            name: "Imported".to_string(),
            start_date: ymd(2024, 2, 5),
            global_holidays: BTreeSet::new(),
        },
        employees: vec![employee("Ana"), employee("Bo")],
        tasks: vec![Task {
            name: "Design".to_string(),
            assigned_to: "Ana".to_string(),
            estimated_duration: 3,
            availability: 50,
            contingency_margin: 1,
            dependency: None,
            custom_start_date: None,
        }],
    }
}

/// Project created, one employee, on the task step.
async fn at_tasks() -> TestWizard {
    let mut wiz = wizard();
    wiz.create_or_update_project(project_draft())
        .await
        .expect("create project");
    wiz.add_employee(employee_draft("Ana")).expect("add Ana");
    wiz.proceed_to_tasks().expect("to tasks");
    wiz.add_task(task_draft("Design", "Ana")).expect("add Design");
    wiz
}

async fn at_schedule() -> TestWizard {
    let mut wiz = at_tasks().await;
    wiz.proceed_to_schedule().await.expect("schedule");
    wiz
}

#[tokio::test]
async fn walks_all_four_steps() {
    let mut wiz = wizard();
    assert_eq!(wiz.step(), Step::CreateProject);

    wiz.create_or_update_project(project_draft())
        .await
        .expect("create project");
    assert_eq!(wiz.step(), Step::ManageEmployees);
    assert!(wiz.tracker().project_exists());
    assert_eq!(wiz.frontend().last().text, "Project created successfully!");

    wiz.add_employee(employee_draft("Ana")).expect("add Ana");
    assert_eq!(wiz.employee_form(), &EmployeeDraft::default());
    wiz.proceed_to_tasks().expect("to tasks");
    wiz.add_task(task_draft("Design", "Ana")).expect("add Design");
    wiz.proceed_to_schedule().await.expect("schedule");

    assert_eq!(wiz.step(), Step::ViewSchedule);
    assert_eq!(
        wiz.gateway().calls(),
        [
            "create_project:Big Launch",
            "replace_employees",
            "replace_tasks",
            "compute_schedule",
            "fetch_schedule",
        ]
    );
    assert!(!wiz.tracker().needs_sync());
    let chart = wiz.chart().expect("chart rendered");
    assert_eq!(chart.days.len(), 3);
    assert_eq!(chart.rows[0].name(), "Design");
    assert_eq!(
        wiz.frontend().last(),
        &Notice::success("Schedule calculated successfully!")
    );
}

#[tokio::test]
async fn unchanged_lists_are_not_resubmitted() {
    let mut wiz = at_schedule().await;
    wiz.gateway().clear_calls();

    wiz.go_back();
    assert_eq!(wiz.step(), Step::ManageTasks);
    wiz.proceed_to_schedule().await.expect("schedule again");

    assert_eq!(wiz.gateway().calls(), ["compute_schedule", "fetch_schedule"]);
}

#[tokio::test]
async fn recompute_always_resubmits_and_stays_put() {
    let mut wiz = at_schedule().await;
    wiz.gateway().clear_calls();

    wiz.recompute().await.expect("recompute");

    assert_eq!(wiz.step(), Step::ViewSchedule);
    assert_eq!(
        wiz.gateway().calls(),
        [
            "replace_employees",
            "replace_tasks",
            "compute_schedule",
            "fetch_schedule",
        ]
    );
    assert!(!wiz.tracker().needs_sync());
}

#[tokio::test]
async fn employee_failure_keeps_step_and_dirty_flag() {
    let mut wiz = at_tasks().await;
    wiz.gateway()
        .fail_on("replace_employees", GatewayError::Network("connection refused".into()));

    let err = wiz
        .dispatch(Action::ProceedToSchedule)
        .await
        .expect_err("network failure");

    assert!(matches!(
        err,
        WizardError::Network {
            operation: Operation::ReplaceEmployees,
            ..
        }
    ));
    assert_eq!(wiz.step(), Step::ManageTasks);
    assert!(wiz.tracker().needs_sync());
    assert!(wiz.schedule().is_none());
    assert!(!wiz.gateway().calls().contains(&"compute_schedule".to_string()));
    assert_eq!(wiz.frontend().last().severity, Severity::Error);
    assert_eq!(wiz.frontend().last().text, "Network error: connection refused");

    wiz.gateway().heal();
    wiz.gateway().clear_calls();
    wiz.proceed_to_schedule().await.expect("retry");
    assert_eq!(wiz.gateway().calls()[0], "replace_employees");
}

#[tokio::test]
async fn task_failure_resubmits_employees_next_time() {
    let mut wiz = at_tasks().await;
    wiz.gateway()
        .fail_on("replace_tasks", GatewayError::rejected("Task references unknown employee"));

    let err = wiz.proceed_to_schedule().await.expect_err("rejected");
    assert_eq!(err.to_string(), "Task references unknown employee");
    assert!(wiz.tracker().needs_sync());

    wiz.gateway().heal();
    wiz.gateway().clear_calls();
    wiz.proceed_to_schedule().await.expect("retry");
    assert_eq!(
        &wiz.gateway().calls()[..2],
        ["replace_employees", "replace_tasks"]
    );
}

#[tokio::test]
async fn rejection_without_message_uses_default_text() {
    let mut wiz = at_tasks().await;
    wiz.gateway()
        .fail_on("compute_schedule", GatewayError::Rejected { message: None });

    let err = wiz.proceed_to_schedule().await.expect_err("rejected");
    assert_eq!(err.to_string(), "Error calculating schedule");
    assert_eq!(err.operation(), Some(Operation::ComputeSchedule));
    assert_eq!(wiz.step(), Step::ManageTasks);
}

#[tokio::test]
async fn schedule_needs_employees_and_tasks_before_any_call() {
    let mut wiz = wizard();
    wiz.create_or_update_project(project_draft())
        .await
        .expect("create project");
    wiz.add_employee(employee_draft("Ana")).expect("add Ana");
    wiz.proceed_to_tasks().expect("to tasks");
    wiz.gateway().clear_calls();

    let err = wiz.proceed_to_schedule().await.expect_err("no tasks");
    assert!(err.is_validation());
    assert_eq!(err.to_string(), "Please add at least one task");
    assert!(wiz.gateway().calls().is_empty());
    assert_eq!(wiz.step(), Step::ManageTasks);
}

#[tokio::test]
async fn actions_are_gated_by_step() {
    let mut wiz = wizard();

    let err = wiz.add_employee(employee_draft("Ana")).expect_err("wrong step");
    assert!(err.is_validation());
    assert!(!wiz.store().has_entities());

    wiz.create_or_update_project(project_draft())
        .await
        .expect("create project");
    assert!(wiz.add_task(task_draft("Design", "Ana")).is_err());
    assert!(wiz.proceed_to_tasks().is_err(), "no employees yet");
    assert!(wiz.export_schedule("plan").await.is_err());
    assert!(wiz.recompute().await.is_err());
    assert_eq!(wiz.step(), Step::ManageEmployees);
}

#[tokio::test]
async fn recreating_project_with_entities_forces_resubmission() {
    let mut wiz = at_schedule().await;
    assert!(!wiz.tracker().needs_sync());

    wiz.go_back();
    wiz.go_back();
    wiz.go_back();
    assert_eq!(wiz.step(), Step::CreateProject);
    wiz.go_back();
    assert_eq!(wiz.step(), Step::CreateProject);

    let mut draft = wiz.project_form().clone();
    draft.name = "Bigger Launch".to_string();
    wiz.create_or_update_project(draft).await.expect("update");

    assert_eq!(wiz.frontend().last().text, "Project updated successfully!");
    assert!(wiz.tracker().needs_sync());
    assert_eq!(wiz.store().project().map(|p| p.name.as_str()), Some("Bigger Launch"));
}

#[tokio::test]
async fn edit_then_resubmit_restores_the_list() {
    let mut wiz = wizard();
    wiz.create_or_update_project(project_draft())
        .await
        .expect("create project");
    wiz.add_employee(employee_draft("Ana")).expect("add Ana");
    wiz.add_employee(employee_draft("Bo")).expect("add Bo");
    let mut before: Vec<Employee> = wiz.store().employees().to_vec();
    before.sort();

    wiz.edit_employee(0).expect("edit Ana");
    assert_eq!(wiz.store().employees().len(), 1);
    assert_eq!(wiz.employee_form().name, "Ana");
    assert!(wiz.tracker().needs_sync());

    let form = wiz.employee_form().clone();
    wiz.add_employee(form).expect("re-add Ana");
    let mut after: Vec<Employee> = wiz.store().employees().to_vec();
    after.sort();
    assert_eq!(before, after);
    assert_eq!(wiz.store().employees()[1].name, "Ana");
}

#[tokio::test]
async fn positions_past_the_end_are_rejected() {
    let mut wiz = wizard();
    wiz.create_or_update_project(project_draft())
        .await
        .expect("create project");
    wiz.add_employee(employee_draft("Ana")).expect("add Ana");

    for action in [Action::DeleteEmployee(usize::MAX), Action::EditEmployee(usize::MAX)] {
        let err = wiz.dispatch(action).await.expect_err("no such employee");
        assert!(err.is_validation());
    }
    assert_eq!(wiz.store().employees().len(), 1);

    wiz.proceed_to_tasks().expect("to tasks");
    wiz.add_task(task_draft("Design", "Ana")).expect("add Design");
    let before = wiz.state().clone();
    for action in [Action::EditTask(usize::MAX), Action::DeleteTask(usize::MAX)] {
        let err = wiz.dispatch(action).await.expect_err("no such task");
        assert!(err.is_validation());
    }
    assert_eq!(wiz.state(), &before);
    assert!(wiz.frontend().prompts.is_empty());
}

#[tokio::test]
async fn added_task_after_sync_is_resubmitted() {
    let mut wiz = at_schedule().await;
    wiz.go_back();
    wiz.add_task(task_draft("Build", "Ana")).expect("add Build");
    assert!(wiz.tracker().needs_sync());

    wiz.gateway().clear_calls();
    wiz.proceed_to_schedule().await.expect("schedule again");
    assert_eq!(
        wiz.gateway().calls(),
        [
            "replace_employees",
            "replace_tasks",
            "compute_schedule",
            "fetch_schedule",
        ]
    );
    assert!(!wiz.tracker().needs_sync());
}

#[tokio::test]
async fn deleted_task_after_sync_is_resubmitted() {
    let mut wiz = at_tasks().await;
    wiz.add_task(task_draft("Build", "Ana")).expect("add Build");
    wiz.proceed_to_schedule().await.expect("schedule");
    assert!(!wiz.tracker().needs_sync());

    wiz.go_back();
    wiz.delete_task(1).expect("delete Build");
    assert!(wiz.tracker().needs_sync());
    assert_eq!(wiz.store().tasks().len(), 1);

    wiz.gateway().clear_calls();
    wiz.proceed_to_schedule().await.expect("schedule again");
    assert_eq!(
        wiz.gateway().calls(),
        [
            "replace_employees",
            "replace_tasks",
            "compute_schedule",
            "fetch_schedule",
        ]
    );
    assert!(!wiz.tracker().needs_sync());
}

#[tokio::test]
async fn edited_employee_after_sync_is_resubmitted() {
    let mut wiz = at_schedule().await;
    wiz.go_back();
    wiz.go_back();
    assert_eq!(wiz.step(), Step::ManageEmployees);

    wiz.edit_employee(0).expect("edit Ana");
    assert!(wiz.tracker().needs_sync());
    let form = wiz.employee_form().clone();
    wiz.add_employee(form).expect("re-add Ana");
    wiz.proceed_to_tasks().expect("to tasks");

    wiz.gateway().clear_calls();
    wiz.proceed_to_schedule().await.expect("schedule again");
    assert_eq!(
        wiz.gateway().calls(),
        [
            "replace_employees",
            "replace_tasks",
            "compute_schedule",
            "fetch_schedule",
        ]
    );
    assert!(!wiz.tracker().needs_sync());
}

#[tokio::test]
async fn declined_delete_changes_nothing() {
    let mut wiz = Wizard::new(FakeGateway::default(), ScriptedFrontend::answering(false));
    wiz.create_or_update_project(project_draft())
        .await
        .expect("create project");
    wiz.add_employee(employee_draft("Ana")).expect("add Ana");
    let before = wiz.state().clone();

    wiz.delete_employee(0).expect("declined delete is not an error");

    assert_eq!(wiz.state(), &before);
    assert_eq!(wiz.frontend().prompts, ["Delete employee \"Ana\"?"]);

    wiz.frontend_mut().answer = true;
    wiz.delete_employee(0).expect("delete");
    assert!(wiz.store().employees().is_empty());
    assert!(wiz.delete_employee(0).is_err());
}

#[tokio::test]
async fn import_lands_on_tasks_and_counts_as_synced() {
    let mut wiz = Wizard::new(
        FakeGateway {
            imported: Some(imported()),
            ..FakeGateway::default()
        },
        ScriptedFrontend::answering(true),
    );
    let temp = tempdir().expect("tempdir");
    let path = temp.path().join("plan.xlsx");
    std::fs::write(&path, b"workbook").expect("write workbook");

    wiz.dispatch(Action::ImportFile(path)).await.expect("import");

    assert_eq!(wiz.step(), Step::ManageTasks);
    assert!(wiz.tracker().project_exists());
    assert!(!wiz.tracker().needs_sync());
    assert_eq!(wiz.store().employees().len(), 2);
    assert_eq!(wiz.project_form().name, "Imported");
    assert_eq!(
        wiz.gateway().calls(),
        [
            "import_project:plan.xlsx",
            "create_project:Imported",
            "replace_employees",
            "replace_tasks",
        ]
    );

    wiz.gateway().clear_calls();
    wiz.proceed_to_schedule().await.expect("schedule");
    assert_eq!(wiz.gateway().calls(), ["compute_schedule", "fetch_schedule"]);
}

#[tokio::test]
async fn import_with_duplicates_is_rejected_locally() {
    let mut wiz = at_tasks().await;
    let before = wiz.store().clone();
    wiz.gateway().clear_calls();

    let mut bad = imported();
    bad.employees.push(bad.employees[0].clone());
    let err = wiz.import_bulk(bad).await.expect_err("duplicate");

    assert!(err.is_validation());
    assert_eq!(wiz.store(), &before);
    assert!(wiz.gateway().calls().is_empty());
}

#[tokio::test]
async fn partial_import_leaves_lists_dirty() {
    let mut wiz = wizard();
    wiz.gateway()
        .fail_on("replace_tasks", GatewayError::Network("timed out".into()));

    let err = wiz.import_bulk(imported()).await.expect_err("partial");
    assert_eq!(err.operation(), Some(Operation::ReplaceTasks));
    assert_eq!(wiz.step(), Step::CreateProject);
    assert!(wiz.tracker().needs_sync());
    assert_eq!(wiz.store().tasks().len(), 1);
}

#[tokio::test]
async fn export_writes_the_workbook() {
    let temp = tempdir().expect("tempdir");
    let mut wiz = at_schedule().await.with_export_dir(temp.path());

    let path = wiz.export_schedule("").await.expect("export");

    assert_eq!(path, temp.path().join("Big_Launch_gantt.xlsx"));
    assert_eq!(std::fs::read(&path).expect("read export"), b"PK\x03\x04workbook");
    assert!(
        wiz.gateway()
            .calls()
            .contains(&"export_schedule:Big_Launch_gantt.xlsx".to_string())
    );
}

#[tokio::test]
async fn reset_asks_first_and_survives_remote_failure() {
    let mut wiz = at_schedule().await;
    wiz.frontend_mut().answer = false;
    wiz.dispatch(Action::ResetAll).await.expect("declined");
    assert_eq!(wiz.step(), Step::ViewSchedule);
    assert!(!wiz.gateway().calls().contains(&"reset_project".to_string()));

    wiz.frontend_mut().answer = true;
    wiz.gateway()
        .fail_on("reset_project", GatewayError::Network("down".into()));
    wiz.dispatch(Action::ResetAll).await.expect("reset");

    assert_eq!(wiz.step(), Step::CreateProject);
    assert!(!wiz.store().has_entities());
    assert!(wiz.store().project().is_none());
    assert!(!wiz.tracker().project_exists());
    assert!(wiz.schedule().is_none());
    assert!(wiz.chart().is_none());
    assert_eq!(wiz.project_form(), &ProjectDraft::with_defaults());
    assert_eq!(wiz.frontend().prompts.last().map(String::as_str), Some(RESET_PROMPT));
}

#[tokio::test]
async fn session_survives_a_restart() {
    let temp = tempdir().expect("tempdir");
    let sessions = SessionStore::open(temp.path()).expect("open session");
    let wiz = at_schedule().await;
    sessions.save(wiz.state()).expect("save");

    let state = sessions.load().expect("load");
    let resumed = Wizard::restore(state, FakeGateway::default(), ScriptedFrontend::answering(true));

    assert_eq!(resumed.step(), Step::ViewSchedule);
    assert_eq!(resumed.store(), wiz.store());
    assert_eq!(resumed.tracker(), wiz.tracker());
    assert_eq!(resumed.chart(), wiz.chart());
}
