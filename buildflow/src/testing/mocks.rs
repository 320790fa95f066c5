//! Scripted collaborators for testing pipelines.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;

use crate::context::RunContext;
use crate::core::RunStatus;
use crate::errors::{ChannelError, StageError, ToolInvocationError};
use crate::notify::{Channel, Message};
use crate::stages::Stage;
use crate::tools::{Platform, ToolCommand, ToolInvoker, ToolOutput};

/// A mock stage that records calls and either completes or fails.
#[derive(Debug)]
pub struct MockStage {
    name: String,
    failure: Mutex<Option<String>>,
    call_count: Mutex<usize>,
    observed: Mutex<Vec<RunStatus>>,
}

impl MockStage {
    /// Creates a mock stage that completes.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            failure: Mutex::new(None),
            call_count: Mutex::new(0),
            observed: Mutex::new(Vec::new()),
        }
    }

    /// Creates a mock stage that fails with `error`.
    #[must_use]
    pub fn failing(name: impl Into<String>, error: impl Into<String>) -> Self {
        let stage = Self::new(name);
        stage.set_failure(Some(error.into()));
        stage
    }

    /// Sets the failure to return, or `None` to complete.
    pub fn set_failure(&self, error: Option<String>) {
        *self.failure.lock() = error;
    }

    /// Returns the number of times the stage was called.
    #[must_use]
    pub fn call_count(&self) -> usize {
        *self.call_count.lock()
    }

    /// Returns true if the stage was called at least once.
    #[must_use]
    pub fn was_called(&self) -> bool {
        self.call_count() > 0
    }

    /// Returns the run status seen at the start of each call.
    #[must_use]
    pub fn observed_statuses(&self) -> Vec<RunStatus> {
        self.observed.lock().clone()
    }
}

#[async_trait]
impl Stage for MockStage {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, ctx: &mut RunContext) -> Result<(), StageError> {
        *self.call_count.lock() += 1;
        self.observed.lock().push(ctx.status());
        match self.failure.lock().clone() {
            Some(error) => Err(StageError::msg(&self.name, error)),
            None => Ok(()),
        }
    }
}

/// A channel that records every message it is given.
#[derive(Debug)]
pub struct RecordingChannel {
    name: String,
    fail: bool,
    messages: Mutex<Vec<Message>>,
}

impl RecordingChannel {
    /// Creates a channel that accepts every message.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fail: false,
            messages: Mutex::new(Vec::new()),
        }
    }

    /// Creates a channel that records and then rejects every message.
    #[must_use]
    pub fn failing(name: impl Into<String>) -> Self {
        Self {
            fail: true,
            ..Self::new(name)
        }
    }

    /// Returns the received messages.
    #[must_use]
    pub fn messages(&self) -> Vec<Message> {
        self.messages.lock().clone()
    }

    /// Returns the number of send calls.
    #[must_use]
    pub fn send_count(&self) -> usize {
        self.messages.lock().len()
    }

    /// Returns the received subjects.
    #[must_use]
    pub fn subjects(&self) -> Vec<String> {
        self.messages.lock().iter().map(|m| m.subject.clone()).collect()
    }

    /// Returns the statuses of the received messages.
    #[must_use]
    pub fn statuses(&self) -> Vec<RunStatus> {
        self.messages.lock().iter().map(|m| m.status).collect()
    }
}

#[async_trait]
impl Channel for RecordingChannel {
    fn name(&self) -> &str {
        &self.name
    }

    async fn send(&self, message: &Message) -> Result<(), ChannelError> {
        self.messages.lock().push(message.clone());
        if self.fail {
            Err(ChannelError::transport(&self.name, "scripted failure"))
        } else {
            Ok(())
        }
    }
}

/// An invoker answering commands from a script instead of the host.
///
/// Responses are matched by command-line prefix in registration order;
/// unmatched commands succeed with empty output.
#[derive(Debug)]
pub struct ScriptedInvoker {
    platform: Platform,
    responses: Mutex<VecDeque<(String, Result<ToolOutput, ToolInvocationError>)>>,
    invocations: Mutex<Vec<String>>,
}

impl Default for ScriptedInvoker {
    fn default() -> Self {
        Self::new(Platform::Posix)
    }
}

impl ScriptedInvoker {
    /// Creates an invoker posing as the given platform.
    #[must_use]
    pub fn new(platform: Platform) -> Self {
        Self {
            platform,
            responses: Mutex::new(VecDeque::new()),
            invocations: Mutex::new(Vec::new()),
        }
    }

    /// Answers the next command starting with `prefix`.
    #[must_use]
    pub fn respond(self, prefix: impl Into<String>, output: ToolOutput) -> Self {
        self.responses.lock().push_back((prefix.into(), Ok(output)));
        self
    }

    /// Fails the next command starting with `prefix` before it runs.
    #[must_use]
    pub fn fail_to_start(self, prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        let error = ToolInvocationError::spawn(&prefix, "scripted spawn failure");
        self.responses.lock().push_back((prefix, Err(error)));
        self
    }

    /// Returns the command lines invoked so far.
    #[must_use]
    pub fn invocations(&self) -> Vec<String> {
        self.invocations.lock().clone()
    }
}

#[async_trait]
impl ToolInvoker for ScriptedInvoker {
    fn platform(&self) -> Platform {
        self.platform
    }

    async fn invoke(&self, command: &ToolCommand) -> Result<ToolOutput, ToolInvocationError> {
        self.invocations.lock().push(command.line.clone());
        let mut responses = self.responses.lock();
        let matched = responses
            .iter()
            .position(|(prefix, _)| command.line.starts_with(prefix.as_str()));
        match matched.and_then(|idx| responses.remove(idx)) {
            Some((_, response)) => response,
            None => Ok(ToolOutput::success("")),
        }
    }
}
