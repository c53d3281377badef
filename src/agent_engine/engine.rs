use std::sync::Arc;
use std::time::Duration;

use crate::agent_engine::history::{EntryKind, RunRecord, Transcript};
use crate::agent_engine::loop_control::LoopController;
use crate::agent_engine::parser::{parse_reply, Payload};
use crate::agent_engine::state::{Action, ActionError, AgentState, Flow, StopReason};
use crate::errors::DeskPilotResult;
use crate::executor::approval::{Approval, Operator};
use crate::executor::dispatcher::ActionExecutor;
use crate::llm::provider::LlmProvider;
use crate::llm::types::{CallConfig, ChatMessage, ContentPart};
use crate::perception::screenshot::{check_dimensions, ScreenCapture, Screenshot};
use crate::perception::types::ScreenSize;

/// Everything the loop talks to, wired up by the caller.
pub struct EngineParts {
    pub reasoning: Arc<dyn LlmProvider>,
    pub reasoning_cfg: CallConfig,
    pub capture: Arc<dyn ScreenCapture>,
    pub operator: Arc<dyn Operator>,
    pub executor: ActionExecutor,
    pub screen: ScreenSize,
}

#[derive(Debug, Clone)]
pub struct LoopSettings {
    pub max_steps: u32,
    /// Pause between the end of one iteration and the next capture.
    pub iteration_delay: Duration,
}

/// Capture → reason → parse → approve → execute → record, until stopped.
pub struct AgentEngine {
    state: AgentState,
    loop_ctrl: LoopController,
    iteration_delay: Duration,
    transcript: Transcript,
    record: RunRecord,
    system_prompt: String,
    parts: EngineParts,
    /// Iteration whose capture was checked against the configured screen size.
    screen_checked_at: Option<u32>,
}

impl AgentEngine {
    pub fn new(
        task: impl Into<String>,
        system_prompt: String,
        record: RunRecord,
        settings: LoopSettings,
        parts: EngineParts,
    ) -> Self {
        Self {
            state: AgentState::Running,
            loop_ctrl: LoopController::new(settings.max_steps),
            iteration_delay: settings.iteration_delay,
            transcript: Transcript::new(task),
            record,
            system_prompt,
            parts,
            screen_checked_at: None,
        }
    }

    pub fn state(&self) -> &AgentState {
        &self.state
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn record(&self) -> &RunRecord {
        &self.record
    }

    /// Runs until the model stops, the operator stops, or the step budget is spent.
    pub async fn run(&mut self) -> StopReason {
        tracing::info!(
            task = %self.transcript.task(),
            max_steps = self.loop_ctrl.max_steps(),
            run_dir = %self.record.dir().display(),
            "agent run started"
        );

        let reason = loop {
            if self.loop_ctrl.should_stop() {
                let max_steps = self.loop_ctrl.max_steps();
                tracing::warn!(max_steps, "maximum iterations reached");
                self.transcript
                    .push(EntryKind::StepLimitReached { max_steps });
                self.persist();
                break StopReason::StepLimit { max_steps };
            }

            let iteration = self.loop_ctrl.begin_iteration();
            tracing::info!(iteration, "--- iteration {iteration} ---");

            let flow = match self.run_iteration(iteration).await {
                Ok(flow) => flow,
                Err(e) => {
                    self.loop_ctrl.record_failure();
                    tracing::error!(
                        iteration,
                        failures = self.loop_ctrl.failure_count(),
                        error = %e,
                        "iteration failed"
                    );
                    self.transcript.push(EntryKind::LoopError {
                        error: e.to_string(),
                    });
                    Flow::Continue
                }
            };
            self.state = AgentState::Running;
            self.persist();

            if let Flow::Stop(reason) = flow {
                break reason;
            }
            if !self.loop_ctrl.should_stop() && !self.iteration_delay.is_zero() {
                tracing::info!(
                    delay_ms = self.iteration_delay.as_millis() as u64,
                    "waiting before next iteration"
                );
                tokio::time::sleep(self.iteration_delay).await;
            }
        };

        tracing::info!(
            reason = %reason,
            iterations = self.loop_ctrl.iterations(),
            steps = self.transcript.last_step(),
            "agent run finished"
        );
        self.state = AgentState::Stopped {
            reason: reason.clone(),
        };
        reason
    }

    async fn run_iteration(&mut self, iteration: u32) -> DeskPilotResult<Flow> {
        let path = self.record.next_screenshot_path();
        self.parts.capture.capture(&path).await?;
        if self.screen_checked_at.is_none() {
            check_dimensions(&path, (self.parts.screen.width, self.parts.screen.height));
            self.screen_checked_at = Some(iteration);
        }
        let shot = Screenshot::load(&path)?;
        tracing::debug!(path = %shot.path.display(), "screenshot captured");

        let messages = self.build_messages(&shot);
        let reply = self
            .parts
            .reasoning
            .chat(messages, &self.parts.reasoning_cfg)
            .await?;
        tracing::info!(content = %reply.content, "reasoning reply received");

        self.handle_reply(&reply.content, &shot).await
    }

    fn build_messages(&self, shot: &Screenshot) -> Vec<ChatMessage> {
        vec![
            ChatMessage::system(self.system_prompt.clone()),
            ChatMessage::user_parts(vec![
                ContentPart::text(format!("User objective: {}", self.transcript.task())),
                shot.image_part(),
                ContentPart::text(format!(
                    "Interaction History:\n<interaction_history>\n{}</interaction_history>",
                    self.transcript.render_history()
                )),
            ]),
        ]
    }

    async fn handle_reply(&mut self, content: &str, shot: &Screenshot) -> DeskPilotResult<Flow> {
        let parsed = parse_reply(content);

        let call = match parsed.payload {
            Payload::Call(call) => call,
            other => {
                match parsed.summary {
                    Some(summary) => {
                        self.transcript.begin_step(summary);
                    }
                    None => self.transcript.push(EntryKind::Commentary {
                        content: content.trim().to_string(),
                    }),
                }
                if let Payload::Malformed { error } = other {
                    self.transcript.push(EntryKind::ParseError { error });
                } else {
                    tracing::info!("no function call in reply");
                }
                return Ok(Flow::Continue);
            }
        };

        let step = self.transcript.begin_step(parsed.narrative);
        tracing::info!(step, function = %call.name, params = ?call.parameters, "function call proposed");
        self.transcript.push(EntryKind::ProposedAction { call: call.clone() });

        let action = match Action::from_call(&call) {
            Ok(action) => action,
            Err(ActionError::Unsupported { name }) => {
                tracing::warn!(function = %name, "unsupported action skipped");
                self.transcript.push(EntryKind::UnsupportedAction { name });
                return Ok(Flow::Continue);
            }
            Err(ActionError::InvalidArguments { name, reason }) => {
                tracing::warn!(function = %name, reason = %reason, "invalid action parameters");
                self.transcript
                    .push(EntryKind::InvalidArguments { name, reason });
                return Ok(Flow::Continue);
            }
        };

        self.state = AgentState::AwaitingApproval { call: call.clone() };
        let decision = self.parts.operator.review(&call)?;
        self.state = AgentState::Running;

        match decision {
            Approval::Rejected { reason } => {
                tracing::info!(reason = %reason, "action rejected by operator");
                self.transcript.push(EntryKind::Rejected { reason });
                Ok(Flow::Continue)
            }
            Approval::Accepted => {
                self.parts
                    .executor
                    .execute(&action, shot, &mut self.transcript)
                    .await
            }
        }
    }

    fn persist(&mut self) {
        if let Err(e) = self.record.persist(&self.transcript) {
            tracing::error!(error = %e, path = %self.record.history_path().display(), "failed to persist run record");
        }
    }
}
