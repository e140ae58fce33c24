use std::sync::mpsc;
use std::thread;

use serde_json::Value;
use tabfocus_logging::{focus_debug, focus_error};
use thiserror::Error;

use crate::commands::{Command, FocusEngine};

enum EngineCommand {
    Dispatch {
        command: Command,
        reply_tx: mpsc::Sender<Value>,
    },
    DispatchRaw {
        raw: Value,
        reply_tx: mpsc::Sender<Value>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("engine worker has stopped")]
pub struct EngineStopped;

/// Runs a [`FocusEngine`] on its own thread and async runtime.
///
/// Commands are handled strictly in submission order, one at a time, so every
/// read-then-write on the store completes before the next command starts.
/// Dropping the handle stops the worker once queued commands are done.
pub struct EngineHandle {
    cmd_tx: mpsc::Sender<EngineCommand>,
}

impl EngineHandle {
    pub fn new(engine: FocusEngine) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel::<EngineCommand>();

        thread::spawn(move || {
            let runtime = match tokio::runtime::Runtime::new() {
                Ok(runtime) => runtime,
                Err(err) => {
                    focus_error!("Could not start engine runtime: {}", err);
                    return;
                }
            };
            let mut engine = engine;
            while let Ok(command) = cmd_rx.recv() {
                let (reply, reply_tx) = match command {
                    EngineCommand::Dispatch { command, reply_tx } => {
                        (runtime.block_on(engine.handle(command)), reply_tx)
                    }
                    EngineCommand::DispatchRaw { raw, reply_tx } => {
                        (runtime.block_on(engine.handle_value(raw)), reply_tx)
                    }
                };
                if reply_tx.send(reply).is_err() {
                    focus_debug!("Reply dropped; caller went away");
                }
            }
            focus_debug!("Engine worker stopped");
        });

        Self { cmd_tx }
    }

    /// Queue `command`; the reply arrives on the returned receiver.
    pub fn submit(&self, command: Command) -> Result<mpsc::Receiver<Value>, EngineStopped> {
        let (reply_tx, reply_rx) = mpsc::channel();
        self.cmd_tx
            .send(EngineCommand::Dispatch { command, reply_tx })
            .map_err(|_| EngineStopped)?;
        Ok(reply_rx)
    }

    /// Queue a raw JSON command as received from a front end.
    pub fn submit_raw(&self, raw: Value) -> Result<mpsc::Receiver<Value>, EngineStopped> {
        let (reply_tx, reply_rx) = mpsc::channel();
        self.cmd_tx
            .send(EngineCommand::DispatchRaw { raw, reply_tx })
            .map_err(|_| EngineStopped)?;
        Ok(reply_rx)
    }

    /// Submit and block until the reply arrives.
    pub fn call(&self, command: Command) -> Result<Value, EngineStopped> {
        self.submit(command)?.recv().map_err(|_| EngineStopped)
    }
}
