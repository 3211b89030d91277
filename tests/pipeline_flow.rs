//! 单条记录流水线（重试 + 重复检测 + 查阅流程）的集成测试

mod common;

use common::{companies, test_config, FakeSurface, ScriptedPrompt, PRIMARY};

use iros_batch::config::FlowKind;
use iros_batch::infrastructure::{Checkpoint, Intent, SurfaceId};
use iros_batch::models::{AttemptLog, AttemptOutcome, RecordField, RecordInput, RecordOutcome};
use iros_batch::orchestrator::{BatchCheckpointManager, DUPLICATE_CONFLICT_REASON};
use iros_batch::workflow::{
    execute_with_retry, CheckpointRecovery, CommitResult, RecordCtx, RecordRun, RetryError,
    RetryPolicy, StageName, StagePipeline,
};

fn ctx_for(name: &str, flow: FlowKind) -> RecordCtx {
    RecordCtx::new(RecordInput::named(name), 1, 0, 1, true, true, flow)
}

#[tokio::test]
async fn test_purchase_flow_runs_all_stages() {
    let config = test_config(FlowKind::Purchase);
    let surface = FakeSurface::new();
    let pipeline = StagePipeline::from_config(&config);
    let ctx = ctx_for("한빛상사", FlowKind::Purchase);
    let mut log = AttemptLog::new();

    let result = pipeline.run(&surface, &ctx, 1, 3, &mut log).await;

    assert_eq!(result, CommitResult::Success);
    let stages: Vec<StageName> = log.for_record("한빛상사").map(|e| e.stage).collect();
    assert_eq!(stages, StageName::PIPELINE.to_vec());
    assert!(log
        .for_record("한빛상사")
        .all(|e| e.outcome == AttemptOutcome::Success));
    assert_eq!(surface.state().selected, vec![0]);
    assert_eq!(surface.clicks_of(&Intent::PayButton), 1);
}

#[tokio::test]
async fn test_duplicate_conflict_never_reaches_commit() {
    let config = test_config(FlowKind::Purchase);
    let surface = FakeSurface::with(|state| {
        state.duplicates.insert("회사01".to_string());
    });
    let prompt = ScriptedPrompt::new([]);
    let pipeline = StagePipeline::from_config(&config);

    let mut manager = BatchCheckpointManager::new(
        &surface,
        &pipeline,
        &prompt,
        RetryPolicy::from_config(&config),
        FlowKind::Purchase,
    );
    let summary = manager.run_batches(companies(1), 10).await;
    let log = manager.into_attempt_log();

    assert_eq!(
        summary.outcome_of("회사01"),
        Some(&RecordOutcome::SkippedError(
            DUPLICATE_CONFLICT_REASON.to_string()
        ))
    );
    assert_eq!(surface.clicks_of(&Intent::AddButton), 0);
    assert_eq!(surface.clicks_of(&Intent::PayButton), 0);
    assert!(surface.state().navigations.contains(&Checkpoint::Home));

    // 不参与普通重试，也没有 Commit 条目
    assert!(log.for_record("회사01").all(|e| e.attempt == 1));
    assert!(log
        .for_record("회사01")
        .all(|e| e.stage != StageName::Commit));
    let terminal: Vec<_> = log.terminal_for("회사01").collect();
    assert_eq!(terminal.len(), 1);
    assert_eq!(terminal[0].stage, StageName::Recovery);
    assert_eq!(terminal[0].outcome, AttemptOutcome::DuplicateConflict);
}

#[tokio::test]
async fn test_duplicate_phrase_in_page_text_is_detected() {
    let config = test_config(FlowKind::Purchase);
    let surface = FakeSurface::with(|state| {
        state.body_text = "일괄결제대상에 이미 입력된 등기기록입니다.".to_string();
    });
    let pipeline = StagePipeline::from_config(&config);
    let ctx = ctx_for("한빛상사", FlowKind::Purchase);
    let mut log = AttemptLog::new();

    let result = pipeline.run(&surface, &ctx, 1, 3, &mut log).await;

    assert_eq!(result, CommitResult::DuplicateConflict);
    assert_eq!(surface.clicks_of(&Intent::PayButton), 0);
}

#[tokio::test]
async fn test_retry_is_bounded_by_max_retries() {
    let config = test_config(FlowKind::Purchase);
    let surface = FakeSurface::with(|state| {
        state
            .submit_failures
            .insert("불안정상사".to_string(), u32::MAX);
    });
    let pipeline = StagePipeline::from_config(&config);
    let ctx = ctx_for("불안정상사", FlowKind::Purchase);
    let mut log = AttemptLog::new();
    let policy = RetryPolicy::from_config(&config);

    let result = {
        let mut run = RecordRun::new(&pipeline, &surface, &ctx, &mut log);
        let recovery = CheckpointRecovery::new(&surface, Checkpoint::Search);
        execute_with_retry(&mut run, &policy, &recovery).await
    };

    let err = result.unwrap_err();
    assert!(matches!(err, RetryError::Exhausted { attempts: 3, .. }));
    assert!(err.last_reason().contains("검색 버튼 없음"));

    let failures: Vec<_> = log
        .for_record("불안정상사")
        .filter(|e| matches!(e.outcome, AttemptOutcome::TransientFailure(_)))
        .collect();
    assert_eq!(failures.len(), 3);
    assert_eq!(
        failures.iter().map(|e| e.attempt).collect::<Vec<_>>(),
        vec![1, 2, 3]
    );
    assert_eq!(log.terminal_for("불안정상사").count(), 1);
    assert!(log.terminal_for("불안정상사").all(|e| e.attempt == 3));

    // 每次失败后都回到检索页面
    let searches = surface
        .state()
        .navigations
        .iter()
        .filter(|cp| **cp == Checkpoint::Search)
        .count();
    assert_eq!(searches, 3);
}

#[tokio::test]
async fn test_transient_failure_then_success() {
    let config = test_config(FlowKind::Purchase);
    let surface = FakeSurface::with(|state| {
        state.submit_failures.insert("한빛상사".to_string(), 1);
    });
    let pipeline = StagePipeline::from_config(&config);
    let ctx = ctx_for("한빛상사", FlowKind::Purchase);
    let mut log = AttemptLog::new();
    let policy = RetryPolicy::from_config(&config);

    let result = {
        let mut run = RecordRun::new(&pipeline, &surface, &ctx, &mut log);
        let recovery = CheckpointRecovery::new(&surface, Checkpoint::Search);
        execute_with_retry(&mut run, &policy, &recovery).await
    };

    assert_eq!(result, Ok(CommitResult::Success));
    let terminal: Vec<_> = log.terminal_for("한빛상사").collect();
    assert_eq!(terminal.len(), 1);
    assert_eq!(terminal[0].attempt, 2);
    assert_eq!(terminal[0].stage, StageName::Commit);
}

#[tokio::test]
async fn test_unknown_filter_option_still_searches() {
    let config = test_config(FlowKind::Purchase);
    let surface = FakeSurface::with(|state| {
        state.rejected_options.insert("없는상태".to_string());
    });
    let pipeline = StagePipeline::from_config(&config);
    let record = RecordInput::new("한빛상사", [(RecordField::Status, "없는상태")]);
    let ctx = RecordCtx::new(record, 1, 0, 1, true, true, FlowKind::Purchase);
    let mut log = AttemptLog::new();
    let policy = RetryPolicy::from_config(&config);

    let result = {
        let mut run = RecordRun::new(&pipeline, &surface, &ctx, &mut log);
        let recovery = CheckpointRecovery::new(&surface, Checkpoint::Search);
        execute_with_retry(&mut run, &policy, &recovery).await
    };

    // 设置失败的条件保留默认值，检索照常进行且不消耗重试
    assert_eq!(result, Ok(CommitResult::Success));
    assert_eq!(surface.clicks_of(&Intent::SearchSubmit), 1);
    let terminal: Vec<_> = log.terminal_for("한빛상사").collect();
    assert_eq!(terminal.len(), 1);
    assert_eq!(terminal[0].attempt, 1);
    assert!(log
        .for_record("한빛상사")
        .all(|e| !matches!(e.outcome, AttemptOutcome::TransientFailure(_))));

    let state = surface.state();
    assert!(!state
        .fills
        .iter()
        .any(|(intent, _)| *intent == Intent::Filter(RecordField::Status)));
    assert!(state
        .fills
        .iter()
        .any(|(intent, _)| *intent == Intent::Filter(RecordField::RegistryOffice)));
}

#[tokio::test]
async fn test_no_results_is_terminal_without_retry() {
    let config = test_config(FlowKind::Purchase);
    let surface = FakeSurface::with(|state| {
        state.no_results.insert("없는회사".to_string());
    });
    let pipeline = StagePipeline::from_config(&config);
    let ctx = ctx_for("없는회사", FlowKind::Purchase);
    let mut log = AttemptLog::new();
    let policy = RetryPolicy::from_config(&config);

    let result = {
        let mut run = RecordRun::new(&pipeline, &surface, &ctx, &mut log);
        let recovery = CheckpointRecovery::new(&surface, Checkpoint::Search);
        execute_with_retry(&mut run, &policy, &recovery).await
    };

    assert!(matches!(result, Ok(CommitResult::NoMatch(_))));
    assert_eq!(log.len(), 1);
    let entry = &log.entries()[0];
    assert_eq!(entry.stage, StageName::Locate);
    assert!(entry.terminal);
    assert!(matches!(entry.outcome, AttemptOutcome::TerminalNoMatch(_)));
}

#[tokio::test]
async fn test_unmatched_rows_end_in_select() {
    let config = test_config(FlowKind::Purchase);
    let surface = FakeSurface::with(|state| {
        state.missing.insert("숨은회사".to_string());
    });
    let pipeline = StagePipeline::from_config(&config);
    let ctx = ctx_for("숨은회사", FlowKind::Purchase);
    let mut log = AttemptLog::new();

    let result = pipeline.run(&surface, &ctx, 1, 3, &mut log).await;

    assert!(matches!(result, CommitResult::NoMatch(_)));
    let terminal: Vec<_> = log.terminal_for("숨은회사").collect();
    assert_eq!(terminal.len(), 1);
    assert_eq!(terminal[0].stage, StageName::Select);
    assert!(surface.state().selected.is_empty());
}

#[tokio::test]
async fn test_lookup_flow_skips_purchase_stages() {
    let config = test_config(FlowKind::Lookup);
    let surface = FakeSurface::with(|state| {
        state.popup_on.insert(Intent::ViewIssueButton);
    });
    let prompt = ScriptedPrompt::new([]);
    let pipeline = StagePipeline::from_config(&config);

    let mut manager = BatchCheckpointManager::new(
        &surface,
        &pipeline,
        &prompt,
        RetryPolicy::from_config(&config),
        FlowKind::Lookup,
    );
    let summary = manager.run_batches(companies(2), 10).await;
    let log = manager.into_attempt_log();

    assert_eq!(summary.total_committed(), 2);

    let skipped: Vec<StageName> = log
        .for_record("회사01")
        .filter(|e| e.outcome == AttemptOutcome::SkippedByPrecondition)
        .map(|e| e.stage)
        .collect();
    assert_eq!(
        skipped,
        vec![
            StageName::ConfigureOptions,
            StageName::ConfirmItems,
            StageName::SetDisclosure,
            StageName::FinalReview,
        ]
    );

    let state = surface.state();
    // 非最后一条关闭弹窗并取消勾选；最后一条保持打开
    assert_eq!(state.closed, vec![SurfaceId("popup-1".to_string())]);
    assert_eq!(state.unselect_calls, 1);
    assert!(state.surfaces.contains(&SurfaceId("popup-2".to_string())));
    assert_eq!(state.focused, SurfaceId(PRIMARY.to_string()));
    assert!(!state.clicks.contains(&Intent::NextButton));
}
