//! In-memory stand-ins for the model, screen, input and operator boundaries.
use std::collections::VecDeque;
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::agent_engine::state::{FunctionCall, ScrollDirection};
use crate::errors::{DeskPilotError, DeskPilotResult};
use crate::executor::approval::{Approval, Operator};
use crate::executor::dispatcher::ExecutorTiming;
use crate::executor::input::{InputDriver, KeyCombo};
use crate::llm::provider::LlmProvider;
use crate::llm::types::{CallConfig, ChatMessage, LlmResponse};
use crate::perception::screenshot::ScreenCapture;
use crate::perception::types::ScreenPoint;

pub fn zero_timing() -> ExecutorTiming {
    ExecutorTiming {
        key_delay: Duration::ZERO,
        click_type_delay: Duration::ZERO,
        scroll_tick_delay: Duration::ZERO,
        scroll_clicks: 2,
    }
}

/// Replies from a fixed script; errors once the script runs out.
pub struct ScriptedProvider {
    replies: Mutex<VecDeque<Result<String, String>>>,
    requests: Mutex<Vec<Vec<ChatMessage>>>,
}

impl ScriptedProvider {
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_results(replies.into_iter().map(|r| Ok(r.into())))
    }

    pub fn with_results(replies: impl IntoIterator<Item = Result<String, String>>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().collect()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn call_config() -> CallConfig {
        CallConfig {
            model: "scripted".into(),
            stream: false,
            temperature: 0.0,
            max_tokens: Some(256),
        }
    }

    pub fn requests(&self) -> Vec<Vec<ChatMessage>> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn chat(&self, messages: Vec<ChatMessage>, _cfg: &CallConfig) -> DeskPilotResult<LlmResponse> {
        self.requests.lock().unwrap().push(messages);
        match self.replies.lock().unwrap().pop_front() {
            Some(Ok(content)) => Ok(LlmResponse { content }),
            Some(Err(e)) => Err(DeskPilotError::LlmProvider(e)),
            None => Err(DeskPilotError::LlmProvider("script exhausted".into())),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum InputEvent {
    Move(ScreenPoint),
    Click,
    Keys(KeyCombo),
    Text(String),
    Scroll(ScrollDirection),
}

/// Records every input call instead of touching the display.
#[derive(Default)]
pub struct RecordingInput {
    events: Mutex<Vec<InputEvent>>,
    fail: Mutex<Option<String>>,
}

impl RecordingInput {
    pub fn events(&self) -> Vec<InputEvent> {
        self.events.lock().unwrap().clone()
    }

    /// Makes the next input call fail with `message`.
    pub fn fail_next(&self, message: &str) {
        *self.fail.lock().unwrap() = Some(message.to_string());
    }

    fn record(&self, event: InputEvent) -> DeskPilotResult<()> {
        if let Some(message) = self.fail.lock().unwrap().take() {
            return Err(DeskPilotError::Executor(message));
        }
        self.events.lock().unwrap().push(event);
        Ok(())
    }
}

#[async_trait]
impl InputDriver for RecordingInput {
    async fn move_pointer(&self, to: ScreenPoint) -> DeskPilotResult<()> {
        self.record(InputEvent::Move(to))
    }

    async fn click_primary(&self) -> DeskPilotResult<()> {
        self.record(InputEvent::Click)
    }

    async fn press_keys(&self, combo: KeyCombo) -> DeskPilotResult<()> {
        self.record(InputEvent::Keys(combo))
    }

    async fn type_text(&self, text: &str) -> DeskPilotResult<()> {
        self.record(InputEvent::Text(text.to_string()))
    }

    async fn scroll_click(&self, direction: ScrollDirection) -> DeskPilotResult<()> {
        self.record(InputEvent::Scroll(direction))
    }
}

/// Answers approval and continue prompts from fixed scripts.
pub struct ScriptedOperator {
    reviews: Mutex<VecDeque<Approval>>,
    continues: Mutex<VecDeque<bool>>,
    reviewed: Mutex<Vec<FunctionCall>>,
    messages: Mutex<Vec<String>>,
}

impl ScriptedOperator {
    pub fn new(reviews: Vec<Approval>, continues: Vec<bool>) -> Self {
        Self {
            reviews: Mutex::new(reviews.into()),
            continues: Mutex::new(continues.into()),
            reviewed: Mutex::new(Vec::new()),
            messages: Mutex::new(Vec::new()),
        }
    }

    pub fn accepting(count: usize) -> Self {
        Self::new(vec![Approval::Accepted; count], Vec::new())
    }

    pub fn reviewed(&self) -> Vec<FunctionCall> {
        self.reviewed.lock().unwrap().clone()
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }
}

impl Operator for ScriptedOperator {
    fn review(&self, call: &FunctionCall) -> DeskPilotResult<Approval> {
        self.reviewed.lock().unwrap().push(call.clone());
        self.reviews
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| DeskPilotError::Approval("no scripted review left".into()))
    }

    fn confirm_continue(&self, message: &str, _is_login: bool) -> DeskPilotResult<bool> {
        self.messages.lock().unwrap().push(message.to_string());
        self.continues
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| DeskPilotError::Approval("no scripted answer left".into()))
    }
}

/// Writes a tiny placeholder file. Fails every capture when `broken`, or only
/// the first few when built with [`StaticCapture::failing_first`].
#[derive(Default)]
pub struct StaticCapture {
    pub broken: bool,
    failures_left: Mutex<u32>,
}

impl StaticCapture {
    pub fn broken() -> Self {
        Self {
            broken: true,
            ..Self::default()
        }
    }

    pub fn failing_first(count: u32) -> Self {
        Self {
            broken: false,
            failures_left: Mutex::new(count),
        }
    }
}

#[async_trait]
impl ScreenCapture for StaticCapture {
    async fn capture(&self, path: &Path) -> DeskPilotResult<()> {
        let transient = {
            let mut left = self.failures_left.lock().unwrap();
            let fail = *left > 0;
            *left = left.saturating_sub(1);
            fail
        };
        if self.broken || transient {
            return Err(DeskPilotError::Perception("display unavailable".into()));
        }
        std::fs::write(path, b"\x89PNG")?;
        Ok(())
    }
}
