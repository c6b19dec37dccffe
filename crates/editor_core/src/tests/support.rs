use std::{collections::VecDeque, sync::Mutex};

use async_trait::async_trait;
use serde_json::Value;
use shared::{error::RemoteError, protocol::Command};
use tokio::sync::{mpsc, oneshot};

use crate::CommandExecutor;

/// Records every command and answers from a queue of canned replies.
#[derive(Default)]
pub(crate) struct ScriptedExecutor {
    replies: Mutex<VecDeque<Result<Value, RemoteError>>>,
    calls: Mutex<Vec<Command>>,
}

impl ScriptedExecutor {
    pub(crate) fn replying(replies: impl IntoIterator<Item = Result<Value, RemoteError>>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().collect()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn calls(&self) -> Vec<Command> {
        self.calls.lock().expect("calls lock").clone()
    }
}

#[async_trait]
impl CommandExecutor for ScriptedExecutor {
    async fn invoke(&self, command: Command) -> Result<Value, RemoteError> {
        self.calls.lock().expect("calls lock").push(command.clone());
        self.replies
            .lock()
            .expect("replies lock")
            .pop_front()
            .unwrap_or_else(|| Err(RemoteError::internal(format!("no scripted reply for {}", command.name))))
    }
}

/// A call held by [`GatedExecutor`] until the test answers it.
pub(crate) struct GatedCall {
    pub(crate) command: Command,
    reply: oneshot::Sender<Result<Value, RemoteError>>,
}

impl GatedCall {
    pub(crate) fn resolve(self, reply: Value) {
        let _ = self.reply.send(Ok(reply));
    }

    pub(crate) fn reject(self, error: RemoteError) {
        let _ = self.reply.send(Err(error));
    }
}

/// Hands every invocation to the test and blocks it until released.
pub(crate) struct GatedExecutor {
    calls: mpsc::UnboundedSender<GatedCall>,
}

impl GatedExecutor {
    pub(crate) fn new() -> (Self, mpsc::UnboundedReceiver<GatedCall>) {
        let (calls, rx) = mpsc::unbounded_channel();
        (Self { calls }, rx)
    }
}

#[async_trait]
impl CommandExecutor for GatedExecutor {
    async fn invoke(&self, command: Command) -> Result<Value, RemoteError> {
        let (reply, wait) = oneshot::channel();
        self.calls
            .send(GatedCall { command, reply })
            .map_err(|_| RemoteError::transport("gate closed"))?;
        wait.await
            .unwrap_or_else(|_| Err(RemoteError::transport("gate dropped")))
    }
}
