// SPDX-License-Identifier: MIT

use super::*;
use crate::emitter::FakeEmitter;
use crate::test_support::shell_definition;
use crate::when::AllFlagsEnabled;
use isup_core::WhenCondition;
use std::time::Duration;
use tokio::time::timeout;

#[tokio::test]
async fn single_shot_run_emits_one_payload() {
    let mut def = shell_definition("emits", "echo hello");
    def.interval = Duration::ZERO;
    let emitter = Arc::new(FakeEmitter::new());
    let runner = Runner::new(def, None, emitter.clone(), Arc::new(AllFlagsEnabled));

    timeout(Duration::from_secs(5), runner.run_loop(CancellationToken::new())).await.unwrap();

    let payloads = emitter.payloads();
    assert_eq!(payloads.len(), 1);
    assert_eq!(payloads[0].name, "emits");
    assert_eq!(payloads[0].payload, b"hello\n");
}

#[tokio::test]
async fn failed_when_condition_skips_the_run() {
    let mut def = shell_definition("gated", "echo should-not-run");
    def.interval = Duration::ZERO;
    def.when_conditions = vec![WhenCondition::FileExists("/nonexistent/definitely-not-there".into())];
    let emitter = Arc::new(FakeEmitter::new());
    let runner = Runner::new(def, None, emitter.clone(), Arc::new(AllFlagsEnabled));

    timeout(Duration::from_secs(5), runner.run_loop(CancellationToken::new())).await.unwrap();

    assert!(emitter.payloads().is_empty());
}

#[tokio::test]
async fn cancelling_the_loop_stops_future_runs() {
    let mut def = shell_definition("periodic", "echo tick");
    def.interval = Duration::from_secs(3600);
    let emitter = Arc::new(FakeEmitter::new());
    let runner = Runner::new(def, None, emitter.clone(), Arc::new(AllFlagsEnabled));

    let ctx = CancellationToken::new();
    let ctx2 = ctx.clone();
    let handle = tokio::spawn(async move { runner.run_loop(ctx2).await });

    tokio::time::sleep(Duration::from_millis(50)).await;
    ctx.cancel();
    timeout(Duration::from_secs(5), handle).await.unwrap().unwrap();

    // One run happens immediately before the first interval sleep.
    assert_eq!(emitter.payloads().len(), 1);
}

#[tokio::test]
async fn run_single_forwards_pid_to_the_caller() {
    let def = shell_definition("adhoc", "echo hi");
    let emitter = Arc::new(FakeEmitter::new());
    let runner = Runner::new(def, None, emitter, Arc::new(AllFlagsEnabled));

    let (pid_tx, pid_rx) = tokio::sync::oneshot::channel();
    timeout(Duration::from_secs(5), runner.run_single(CancellationToken::new(), Some(pid_tx), None))
        .await
        .unwrap();

    assert!(pid_rx.await.is_ok());
}

#[tokio::test]
async fn timeout_cancels_a_long_running_command() {
    let mut def = shell_definition("slow", "sleep 30; echo too-late");
    def.interval = Duration::ZERO;
    def.timeout = Some(Duration::from_millis(100));
    let emitter = Arc::new(FakeEmitter::new());
    let runner = Runner::new(def, None, emitter.clone(), Arc::new(AllFlagsEnabled));

    timeout(Duration::from_secs(5), runner.run_loop(CancellationToken::new())).await.unwrap();

    // The child was killed before it could print, so nothing was emitted.
    assert!(emitter.payloads().is_empty());
}
