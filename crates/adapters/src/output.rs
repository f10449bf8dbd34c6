// SPDX-License-Identifier: MIT

//! Output channel group: the stdout/stderr/errors/done quadruple that an
//! `Execute` call returns (SPEC_FULL.md §3 "Output channels", §4.1 Lifetime).

use crate::ExecError;
use tokio::sync::{mpsc, oneshot};

/// Sender-side handles, owned by the Executor's background tasks.
pub(crate) struct OutputSend {
    pub stdout: mpsc::UnboundedSender<Vec<u8>>,
    pub stderr: mpsc::UnboundedSender<Vec<u8>>,
    pub errors: mpsc::UnboundedSender<ExecError>,
    pub done: oneshot::Sender<()>,
}

/// Receiver-side handles returned to the caller of `execute`.
///
/// All four channels close together when the command ends: the stdout and
/// stderr `mpsc` channels close as soon as their reader tasks finish (EOF or
/// error), `errors` closes once the coordinator task drops its sender, and
/// `done` fires strictly after all three have closed (SPEC_FULL.md §5
/// Ordering guarantees).
pub struct OutputReceive {
    pub stdout: mpsc::UnboundedReceiver<Vec<u8>>,
    pub stderr: mpsc::UnboundedReceiver<Vec<u8>>,
    pub errors: mpsc::UnboundedReceiver<ExecError>,
    pub done: oneshot::Receiver<()>,
}

pub(crate) fn output_channels() -> (OutputSend, OutputReceive) {
    let (stdout_tx, stdout_rx) = mpsc::unbounded_channel();
    let (stderr_tx, stderr_rx) = mpsc::unbounded_channel();
    let (errors_tx, errors_rx) = mpsc::unbounded_channel();
    let (done_tx, done_rx) = oneshot::channel();

    (
        OutputSend { stdout: stdout_tx, stderr: stderr_tx, errors: errors_tx, done: done_tx },
        OutputReceive { stdout: stdout_rx, stderr: stderr_rx, errors: errors_rx, done: done_rx },
    )
}
