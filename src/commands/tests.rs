//! Tests for the command layer.

use super::*;
use crate::cli::{
    ConfigAction, ConfigCommand, FilesArgs, ListArgs, RunIdArgs, ShowArgs, SubmitArgs,
};
use crate::config::{ConfigStore, keys};
use crate::context::GateContext;
use crate::exit_codes;
use crate::orchestrator::GateOrchestrator;
use crate::run::{RunStatus, RunType};
use crate::test_support::{DirGuard, create_test_repo};
use serial_test::serial;

fn submit_args(output_id: &str) -> SubmitArgs {
    SubmitArgs {
        output_id: output_id.to_string(),
        task: "add a sum helper".to_string(),
        manifest: "src/sum.ts:CREATE".to_string(),
        run_type: "contract".to_string(),
        contract_run_id: None,
        base_ref: "main".to_string(),
        target_ref: "HEAD".to_string(),
        project: None,
        no_execute: true,
        json: false,
    }
}

#[test]
fn test_init_creates_layout_and_is_idempotent() {
    let temp = create_test_repo();
    let ctx = GateContext::at(temp.path());

    assert_eq!(init::cmd_init(&ctx).unwrap(), exit_codes::SUCCESS);
    assert!(ctx.runs_dir.is_dir());
    assert!(ctx.events_dir.is_dir());
    assert!(ctx.artifacts_dir.is_dir());
    assert!(ctx.sandboxes_dir.is_dir());
    assert!(ctx.locks_dir.is_dir());
    assert!(ctx.agents_config_path().is_file());

    let store = ConfigStore::open(ctx.config_path()).unwrap();
    store.set(keys::AGENT_MAX_FIX_ATTEMPTS, "5").unwrap();

    let seeded = init::scaffold(&ctx).unwrap();
    assert!(seeded.is_empty());
    let store = ConfigStore::open(ctx.config_path()).unwrap();
    assert_eq!(store.get(keys::AGENT_MAX_FIX_ATTEMPTS).unwrap().value, "5");

    let exclude = std::fs::read_to_string(temp.path().join(".git/info/exclude")).unwrap();
    assert_eq!(exclude.matches(".gatekeep/").count(), 1);
}

#[test]
fn test_commands_require_init() {
    let temp = create_test_repo();
    let ctx = GateContext::at(temp.path());

    let err = runs::cmd_list(&ctx, ListArgs { json: false }).unwrap_err();
    assert_eq!(err.exit_code(), exit_codes::USER_ERROR);
    assert!(err.to_string().contains("gatekeep init"));
}

#[test]
fn test_submit_without_execute_records_pending_run() {
    let temp = create_test_repo();
    let ctx = GateContext::at(temp.path());
    init::scaffold(&ctx).unwrap();

    let code = runs::cmd_submit(&ctx, submit_args("sum-helper")).unwrap();
    assert_eq!(code, exit_codes::SUCCESS);

    let runs = GateOrchestrator::open(ctx.clone()).unwrap().list_runs().unwrap();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].status, RunStatus::Pending);
    assert_eq!(runs[0].run_type, RunType::Contract);
    assert_eq!(runs[0].output_id, "sum-helper");
    assert_eq!(runs[0].project_path, temp.path());
}

#[test]
fn test_submit_rejects_bad_input() {
    let temp = create_test_repo();
    let ctx = GateContext::at(temp.path());
    init::scaffold(&ctx).unwrap();

    let mut args = submit_args("sum-helper");
    args.manifest = "src/sum.ts:RENAME".to_string();
    assert!(runs::cmd_submit(&ctx, args).is_err());

    let mut args = submit_args("sum-helper");
    args.run_type = "execution".to_string();
    let err = runs::cmd_submit(&ctx, args).unwrap_err();
    assert_eq!(err.code(), "MISSING_CONTRACT_RUN");

    let err = runs::cmd_submit(&ctx, submit_args("../escape")).unwrap_err();
    assert_eq!(err.code(), "PATH_TRAVERSAL");
}

#[test]
fn test_files_and_abort_on_pending_run() {
    let temp = create_test_repo();
    let ctx = GateContext::at(temp.path());
    init::scaffold(&ctx).unwrap();
    runs::cmd_submit(&ctx, submit_args("sum-helper")).unwrap();

    let orchestrator = GateOrchestrator::open(ctx.clone()).unwrap();
    let run_id = orchestrator.list_runs().unwrap()[0].id.clone();

    let local = temp.path().join("sum.ts");
    std::fs::write(&local, "export const sum = 1;\n").unwrap();
    let code = runs::cmd_files(
        &ctx,
        FilesArgs {
            run_id: run_id.clone(),
            files: vec![format!("{}=src/sum.ts", local.display())],
        },
    )
    .unwrap();
    assert_eq!(code, exit_codes::SUCCESS);
    let uploads = orchestrator.artifacts().uploads("sum-helper").unwrap();
    assert_eq!(uploads.len(), 1);
    assert_eq!(uploads[0].0, "src/sum.ts");

    runs::cmd_abort(&ctx, RunIdArgs { run_id: run_id.clone() }).unwrap();
    assert_eq!(orchestrator.get_run(&run_id).unwrap().status, RunStatus::Aborted);

    assert_eq!(
        runs::cmd_abort(&ctx, RunIdArgs { run_id: run_id.clone() }).unwrap(),
        exit_codes::SUCCESS
    );

    let err = runs::cmd_files(
        &ctx,
        FilesArgs {
            run_id,
            files: vec![format!("{}=src/late.ts", local.display())],
        },
    )
    .unwrap_err();
    assert_eq!(err.code(), "RUN_TERMINAL");
}

#[test]
fn test_config_set_is_type_checked() {
    let temp = create_test_repo();
    let ctx = GateContext::at(temp.path());
    init::scaffold(&ctx).unwrap();

    let set = |key: &str, value: &str| {
        config::dispatch_config(
            &ctx,
            ConfigCommand {
                action: ConfigAction::Set {
                    key: key.to_string(),
                    value: value.to_string(),
                },
            },
        )
    };

    assert!(set(keys::AGENT_MAX_FIX_ATTEMPTS, "many").is_err());
    assert_eq!(set(keys::AGENT_MAX_FIX_ATTEMPTS, "2").unwrap(), exit_codes::SUCCESS);

    let store = ConfigStore::open(ctx.config_path()).unwrap();
    assert_eq!(store.snapshot().number(keys::AGENT_MAX_FIX_ATTEMPTS, 3), 2);

    let err = config::dispatch_config(
        &ctx,
        ConfigCommand {
            action: ConfigAction::Get {
                key: "NOT_A_KEY".to_string(),
            },
        },
    )
    .unwrap_err();
    assert_eq!(err.exit_code(), exit_codes::USER_ERROR);
}

#[test]
fn test_agent_providers_lists_builtin() {
    let temp = create_test_repo();
    let ctx = GateContext::at(temp.path());
    init::scaffold(&ctx).unwrap();

    assert_eq!(agent::cmd_agent_providers(&ctx).unwrap(), exit_codes::SUCCESS);
}

#[test]
#[serial]
fn test_dispatch_resolves_repo_from_subdirectory() {
    let temp = create_test_repo();
    let nested = temp.path().join("src").join("deep");
    std::fs::create_dir_all(&nested).unwrap();
    let _cwd = DirGuard::new(&nested);

    assert_eq!(dispatch(Command::Init).unwrap(), exit_codes::SUCCESS);
    assert!(temp.path().join(".gatekeep").join("config.yaml").is_file());
    assert!(!nested.join(".gatekeep").exists());

    let mut args = submit_args("from-subdir");
    args.json = true;
    assert_eq!(dispatch(Command::Submit(args)).unwrap(), exit_codes::SUCCESS);

    let ctx = GateContext::resolve().unwrap();
    let run = GateOrchestrator::open(ctx).unwrap().list_runs().unwrap().remove(0);
    let code = dispatch(Command::Show(ShowArgs {
        run_id: run.id,
        json: false,
    }))
    .unwrap();
    assert_eq!(code, exit_codes::SUCCESS);
}

#[test]
#[serial]
fn test_dispatch_outside_repository_is_user_error() {
    let temp = tempfile::TempDir::new().unwrap();
    let _cwd = DirGuard::new(temp.path());

    let err = dispatch(Command::Init).unwrap_err();
    assert_eq!(err.exit_code(), exit_codes::USER_ERROR);
}
