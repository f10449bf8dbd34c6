// SPDX-License-Identifier: MIT

use super::*;
use crate::binder::{DiscoveryMatch, StaticBinder};
use crate::test_support::shell_definition;
use isup_core::{FakeTempFileFactory, Runnable};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

async fn drain_one(recv: OutputReceive) -> Vec<String> {
    let mut recv = recv;
    let mut lines = Vec::new();
    while let Some(line) = recv.stdout.recv().await {
        lines.push(String::from_utf8_lossy(&line).into_owned());
    }
    let _ = recv.done.await;
    lines
}

async fn drain_matched(matched: MatchedOutput) -> Vec<String> {
    drain_one(matched.receive).await
}

#[tokio::test]
async fn no_binder_spawns_exactly_one_execution() {
    let def = shell_definition("one-shot", "echo hi");
    let receives = run(&def, CancellationToken::new(), None, RunOptions::default()).unwrap();
    assert_eq!(receives.len(), 1);
    let matched = receives.into_iter().next().unwrap();
    assert!(matched.labels.is_empty());
    assert!(matched.entity_rewrite.is_none());
    assert_eq!(drain_matched(matched).await, vec!["hi"]);
}

#[tokio::test]
async fn binder_match_labels_and_entity_rewrite_propagate_to_the_output() {
    let def = shell_definition("labeled", "echo hi");

    let mut m = DiscoveryMatch::default();
    m.extra_labels.insert("region".to_string(), "us-east".to_string());
    m.entity_rewrite = Some("host:alpha".to_string());
    let binder = StaticBinder::new(vec![m]);

    let receives = run(&def, CancellationToken::new(), Some(&binder), RunOptions::default()).unwrap();
    assert_eq!(receives.len(), 1);
    let matched = receives.into_iter().next().unwrap();
    assert_eq!(matched.labels.get("region").map(String::as_str), Some("us-east"));
    assert_eq!(matched.entity_rewrite.as_deref(), Some("host:alpha"));
}

#[tokio::test]
async fn zero_matches_returns_empty_list() {
    let def = shell_definition("discovered", "echo hi");
    let binder = StaticBinder::empty();
    let receives = run(&def, CancellationToken::new(), Some(&binder), RunOptions::default()).unwrap();
    assert!(receives.is_empty());
}

#[tokio::test]
async fn binder_fans_out_and_substitutes_values() {
    let mut def = shell_definition("fan-out", "echo host=${host}");
    def.runnable = Runnable::new(
        "/bin/sh",
        vec!["-c".to_string(), "echo host=${host}".to_string()],
        def.executor_config.clone(),
    );

    let mut a = DiscoveryMatch::default();
    a.values.insert("host".to_string(), "alpha".to_string());
    let mut b = DiscoveryMatch::default();
    b.values.insert("host".to_string(), "beta".to_string());
    let binder = StaticBinder::new(vec![a, b]);

    let receives = run(&def, CancellationToken::new(), Some(&binder), RunOptions::default()).unwrap();
    assert_eq!(receives.len(), 2);

    let mut outputs = Vec::new();
    for matched in receives {
        outputs.push(drain_matched(matched).await);
    }
    // `${host}` never reaches the shell (substituted by the binder first).
    assert!(outputs.iter().any(|lines| lines == &vec!["host=alpha".to_string()]));
    assert!(outputs.iter().any(|lines| lines == &vec!["host=beta".to_string()]));
}

#[tokio::test]
async fn config_template_exports_config_path_when_unreferenced() {
    let mut def = shell_definition("templated", "echo \"$CONFIG_PATH\"");
    def.config_template = Some(b"value=${value}".to_vec());
    let factory = Arc::new(FakeTempFileFactory::new());
    def.temp_file_factory = factory.clone();

    let mut m = DiscoveryMatch::default();
    m.values.insert("value".to_string(), "42".to_string());
    let binder = StaticBinder::new(vec![m]);

    let receives = run(&def, CancellationToken::new(), Some(&binder), RunOptions::default()).unwrap();
    assert_eq!(receives.len(), 1);
    let lines = drain_matched(receives.into_iter().next().unwrap()).await;
    assert_eq!(lines.len(), 1);
    assert!(lines[0].starts_with("/fake-tmp/"));

    // The temp file is removed once the run's `done` signal has fired.
    assert_eq!(factory.live_count(), 0);
}

#[tokio::test]
async fn config_path_placeholder_is_substituted_when_referenced_directly() {
    let mut def = shell_definition("templated-direct", "echo MARK:${config.path}:MARK");
    def.config_template = Some(b"value=${value}".to_vec());
    let factory = Arc::new(FakeTempFileFactory::new());
    def.temp_file_factory = factory.clone();

    let mut m = DiscoveryMatch::default();
    m.values.insert("value".to_string(), "7".to_string());
    let binder = StaticBinder::new(vec![m]);

    let receives = run(&def, CancellationToken::new(), Some(&binder), RunOptions::default()).unwrap();
    let lines = drain_matched(receives.into_iter().next().unwrap()).await;
    assert_eq!(lines.len(), 1);
    assert!(lines[0].starts_with("MARK:/fake-tmp/"));
    assert!(lines[0].ends_with(":MARK"));
    assert_eq!(factory.live_count(), 0);
}

#[tokio::test]
async fn config_template_round_trips_through_a_real_temp_file() {
    let dir = tempfile::tempdir().unwrap();
    let mut def = shell_definition("templated-real", "cat \"$CONFIG_PATH\"");
    def.config_template = Some(b"value=${value}".to_vec());
    def.temp_file_factory = Arc::new(isup_adapters::OsTempFileFactory::new(dir.path()));

    let mut m = DiscoveryMatch::default();
    m.values.insert("value".to_string(), "99".to_string());
    let binder = StaticBinder::new(vec![m]);

    let receives = run(&def, CancellationToken::new(), Some(&binder), RunOptions::default()).unwrap();
    let lines = drain_matched(receives.into_iter().next().unwrap()).await;
    assert_eq!(lines, vec!["value=99".to_string()]);

    // Cleanup ran once `done` fired.
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}
