//! Dispatch behavior: executor selection, command shapes, and containment
//! of per-task failures.

use drover::agent::Agent;

use crate::fixtures::{has_flag_value, TestProject};

#[tokio::test]
async fn unknown_kind_is_dropped_without_launching_anything() {
    let project = TestProject::new(0);
    project.write_queue(r#"[{"type":"deploy","params":{"target":"prod"}}]"#);

    let mut agent = Agent::new(project.config());
    agent.merge_new_tasks().unwrap();
    assert_eq!(agent.pending_count(), 1);

    agent.dispatch_pending().await;

    assert_eq!(agent.pending_count(), 0);
    assert!(project.invocations().is_empty());
}

#[tokio::test]
async fn failed_task_is_discarded_not_retried() {
    let project = TestProject::new(1);
    project.write_queue(r#"[{"type":"compile","params":{}}]"#);

    let mut agent = Agent::new(project.config());
    agent.merge_new_tasks().unwrap();
    agent.dispatch_pending().await;
    assert_eq!(agent.pending_count(), 0);

    agent.merge_new_tasks().unwrap();
    agent.dispatch_pending().await;
    assert_eq!(project.invocations().len(), 1);
}

#[tokio::test]
async fn one_failing_task_does_not_abort_the_batch() {
    let project = TestProject::with_script(
        // Fail build invocations, succeed everything else.
        "echo \"$@\" >> \"$RECORD\"\ncase \"$*\" in *-buildTarget*) exit 1;; esac\nexit 0\n",
    );
    project.write_queue(
        r#"[
            {"type":"build","params":{}},
            {"type":"compile","params":{}},
            {"type":"test","params":{}}
        ]"#,
    );

    let mut agent = Agent::new(project.config());
    agent.merge_new_tasks().unwrap();
    agent.dispatch_pending().await;

    assert_eq!(agent.pending_count(), 0);
    assert_eq!(project.invocations().len(), 3);
}

#[tokio::test]
async fn compile_task_uses_project_path_and_fresh_log_file() {
    let project = TestProject::new(0);
    project.write_queue(r#"[{"type":"compile","params":{}}]"#);

    let mut agent = Agent::new(project.config());
    agent.merge_new_tasks().unwrap();
    agent.dispatch_pending().await;

    assert_eq!(agent.pending_count(), 0);
    let invocations = project.invocations();
    assert_eq!(invocations.len(), 1);

    let argv = &invocations[0];
    assert!(argv.contains("-batchmode"));
    assert!(argv.contains("-quit"));
    assert!(has_flag_value(argv, "-projectPath", &project.path.display().to_string()));
    assert!(argv.contains("-logFile"));
    assert!(argv.contains("/Logs/compile-"));
    assert!(argv.contains(".log"));
}

#[tokio::test]
async fn build_task_carries_target_and_output_flags() {
    let project = TestProject::new(0);
    project.write_queue(
        r#"[{"type":"build","params":{"platform":"Win64","build_path":"Dist"}}]"#,
    );

    let mut agent = Agent::new(project.config());
    agent.merge_new_tasks().unwrap();
    agent.dispatch_pending().await;

    let invocations = project.invocations();
    let argv = &invocations[0];
    assert!(has_flag_value(argv, "-buildTarget", "Win64"));
    assert!(argv.contains("-buildPath"));
    assert!(argv.contains("/Dist"));
}

#[tokio::test]
async fn build_task_defaults_apply_when_params_are_omitted() {
    let project = TestProject::new(0);
    project.write_queue(r#"[{"type":"build","params":{}}]"#);

    let mut agent = Agent::new(project.config());
    agent.merge_new_tasks().unwrap();
    agent.dispatch_pending().await;

    let invocations = project.invocations();
    let argv = &invocations[0];
    assert!(has_flag_value(argv, "-buildTarget", "Linux64"));
    assert!(argv.contains("/Builds"));
}

#[tokio::test]
async fn test_task_includes_filter_only_when_present() {
    let project = TestProject::new(0);
    project.write_queue(
        r#"[
            {"type":"test","params":{"filter":"My.Namespace"}},
            {"type":"test","params":{}}
        ]"#,
    );

    let mut agent = Agent::new(project.config());
    agent.merge_new_tasks().unwrap();
    agent.dispatch_pending().await;

    let invocations = project.invocations();
    assert_eq!(invocations.len(), 2);
    assert!(invocations[0].contains("-runTests"));
    assert!(has_flag_value(&invocations[0], "-testFilter", "My.Namespace"));
    assert!(!invocations[1].contains("-testFilter"));
}

#[tokio::test]
async fn import_task_passes_asset_path() {
    let project = TestProject::new(0);
    project.write_queue(
        r#"[{"type":"import","params":{"asset_path":"Assets/pack.unitypackage"}}]"#,
    );

    let mut agent = Agent::new(project.config());
    agent.merge_new_tasks().unwrap();
    agent.dispatch_pending().await;

    let invocations = project.invocations();
    assert!(has_flag_value(
        &invocations[0],
        "-importPackage",
        "Assets/pack.unitypackage"
    ));
}

#[tokio::test]
async fn repeated_kinds_get_distinct_log_files() {
    let project = TestProject::new(0);
    project.write_queue(
        r#"[
            {"type":"compile","params":{}},
            {"type":"compile","params":{"pass":"second"}}
        ]"#,
    );

    let mut agent = Agent::new(project.config());
    agent.merge_new_tasks().unwrap();
    agent.dispatch_pending().await;

    let invocations = project.invocations();
    assert_eq!(invocations.len(), 2);

    let log_of = |argv: &str| {
        argv.split_whitespace()
            .skip_while(|a| *a != "-logFile")
            .nth(1)
            .map(String::from)
            .unwrap()
    };
    assert_ne!(log_of(&invocations[0]), log_of(&invocations[1]));
}
