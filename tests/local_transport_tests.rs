use henchman::engine::{SilentReporter, TaskEngine};
use henchman::modules::{Module, ModuleSearchPath};
use henchman::plan::{Plan, Task};
use henchman::transport::{DestKind, LocalTransport, Transport, TransportError};
use henchman::types::VarsMap;
use henchman::Machine;
use serde_json::json;
use std::fs;
use std::sync::Arc;
use tempfile::TempDir;
use tokio_test::{assert_err, assert_ok};

fn transport(home: &TempDir) -> LocalTransport {
    LocalTransport::new().with_env("HOME", home.path().display().to_string())
}

#[tokio::test]
async fn test_exec_feeds_stdin_and_returns_stdout() {
    let home = TempDir::new().unwrap();
    let local = transport(&home);

    let out = local.exec("cat", b"hello", false).await.unwrap();
    assert_eq!(out, b"hello");

    let out = local.exec("echo $HOME", &[], false).await.unwrap();
    assert_eq!(
        String::from_utf8(out).unwrap().trim(),
        home.path().display().to_string()
    );
}

#[tokio::test]
async fn test_exec_non_zero_exit_carries_output() {
    let home = TempDir::new().unwrap();
    let err = assert_err!(
        transport(&home)
            .exec("echo out; echo err >&2; exit 3", &[], false)
            .await
    );

    match err {
        TransportError::CommandFailed {
            status,
            stdout,
            stderr,
            ..
        } => {
            assert_eq!(status, 3);
            assert_eq!(stdout.trim(), "out");
            assert_eq!(stderr.trim(), "err");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_put_file_and_tree() {
    let home = TempDir::new().unwrap();
    let local = transport(&home);
    let src = TempDir::new().unwrap();

    let file = src.path().join("motd");
    fs::write(&file, "welcome").unwrap();
    assert_ok!(local.exec("mkdir -p ${HOME}/.henchman/", &[], false).await);
    assert_ok!(
        local
            .put(&file, "${HOME}/.henchman/motd", DestKind::File)
            .await
    );
    assert_eq!(
        fs::read_to_string(home.path().join(".henchman/motd")).unwrap(),
        "welcome"
    );

    let bundle = src.path().join("bundle");
    fs::create_dir_all(bundle.join("lib")).unwrap();
    fs::write(bundle.join("exec"), "#!/bin/sh\n").unwrap();
    fs::write(bundle.join("lib").join("helper.sh"), "true\n").unwrap();
    assert_ok!(local.put(&bundle, "${HOME}/.henchman/", DestKind::Dir).await);
    assert!(home.path().join(".henchman/bundle/exec").is_file());
    assert!(home.path().join(".henchman/bundle/lib/helper.sh").is_file());
}

#[tokio::test]
async fn test_module_runs_end_to_end_on_localhost() {
    let home = TempDir::new().unwrap();
    let modules = TempDir::new().unwrap();
    fs::write(
        modules.path().join("counter"),
        "#!/bin/sh\nn=$(cat | wc -c | tr -d ' ')\nprintf '{\"status\":\"changed\",\"msg\":\"%s\"}' \"$n\"\n",
    )
    .unwrap();

    let engine = TaskEngine::new(
        ModuleSearchPath::new(vec![modules.path().to_path_buf()]),
        Arc::new(SilentReporter),
    );
    let m = Machine::new("localhost", VarsMap::new(), Arc::new(transport(&home)));

    let mut task = Task::new("count", Module::new("counter", r#"cmd="echo hi""#).unwrap());
    task.register = Some("out".to_string());
    let plan = Plan {
        name: "local".to_string(),
        hosts: Vec::new(),
        vars: VarsMap::new(),
        tasks: vec![task],
    };

    let registers = engine.run_machine(&plan, &m).await.unwrap();
    assert_eq!(registers["out"]["status"], json!("changed"));
    // {"cmd":"echo hi"} is 17 bytes
    assert_eq!(registers["out"]["msg"], json!("17"));
    assert!(home.path().join(".henchman/counter").is_file());
}
