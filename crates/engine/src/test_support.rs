// SPDX-License-Identifier: MIT

//! Test fixtures shared across this crate's test modules and downstream
//! crates that exercise the engine with `test-support` enabled.

use isup_core::{Definition, ExecutorConfig, FakeTempFileFactory, Runnable};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

pub fn definition(name: &str) -> Definition {
    Definition {
        name: name.to_string(),
        labels: HashMap::new(),
        executor_config: ExecutorConfig::default(),
        interval: Duration::from_secs(60),
        timeout: Some(Duration::from_secs(30)),
        config_template: None,
        inventory_source: None,
        when_conditions: vec![],
        command_channel_request: None,
        runnable: Runnable::new("/bin/sh", vec!["-c".to_string(), "exit 0".to_string()], ExecutorConfig::default()),
        temp_file_factory: Arc::new(FakeTempFileFactory::new()),
    }
}

pub fn shell_definition(name: &str, script: &str) -> Definition {
    let mut def = definition(name);
    def.runnable = Runnable::new("/bin/sh", vec!["-c".to_string(), script.to_string()], ExecutorConfig::default());
    def
}
