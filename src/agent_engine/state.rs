use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle states of one agent run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum AgentState {
    Running,
    AwaitingApproval { call: FunctionCall },
    Stopped { reason: StopReason },
}

impl AgentState {
    pub fn is_stopped(&self) -> bool {
        matches!(self, AgentState::Stopped { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StopReason {
    /// The model called `stop`.
    Completed { result: String },
    /// The operator declined to continue after a user message.
    StoppedByUser,
    /// The iteration budget ran out.
    StepLimit { max_steps: u32 },
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::Completed { result } => write!(f, "completed: {result}"),
            StopReason::StoppedByUser => f.write_str("stopped by user"),
            StopReason::StepLimit { max_steps } => {
                write!(f, "reached maximum iterations ({max_steps})")
            }
        }
    }
}

/// What the loop does after an action has been handled.
#[derive(Debug, Clone, PartialEq)]
pub enum Flow {
    Continue,
    Stop(StopReason),
}

/// A function call exactly as the reasoning model wrote it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    #[serde(rename = "function")]
    pub name: String,
    pub parameters: serde_json::Map<String, serde_json::Value>,
}

impl FunctionCall {
    pub fn to_pretty_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| format!("{self:?}"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScrollDirection {
    Up,
    Down,
}

impl fmt::Display for ScrollDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScrollDirection::Up => f.write_str("up"),
            ScrollDirection::Down => f.write_str("down"),
        }
    }
}

/// The closed action vocabulary offered to the reasoning model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "function", content = "parameters")]
pub enum Action {
    #[serde(rename = "computer_click", rename_all = "camelCase")]
    Click { element_description: String },

    #[serde(rename = "computer_type", rename_all = "camelCase")]
    Type { text: String, press_enter: bool },

    #[serde(rename = "computer_click_and_type", rename_all = "camelCase")]
    ClickAndType {
        element_description: String,
        text: String,
        press_enter: bool,
    },

    #[serde(rename = "computer_scroll", rename_all = "camelCase")]
    Scroll {
        element_description: String,
        direction: ScrollDirection,
    },

    #[serde(rename = "wait")]
    Wait { seconds: f64 },

    #[serde(rename = "stop")]
    Stop { result: String },

    #[serde(rename = "note")]
    Note { note: String },

    #[serde(rename = "user_message", rename_all = "camelCase")]
    UserMessage {
        message: String,
        #[serde(default)]
        is_login: bool,
    },
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ActionError {
    #[error("unsupported action \"{name}\"")]
    Unsupported { name: String },

    #[error("invalid parameters for \"{name}\": {reason}")]
    InvalidArguments { name: String, reason: String },
}

impl Action {
    pub const NAMES: [&'static str; 8] = [
        "computer_click",
        "computer_type",
        "computer_click_and_type",
        "computer_scroll",
        "wait",
        "stop",
        "note",
        "user_message",
    ];

    /// Decodes a raw call into a typed action, keeping unknown names apart from bad arguments.
    pub fn from_call(call: &FunctionCall) -> Result<Action, ActionError> {
        if !Self::NAMES.contains(&call.name.as_str()) {
            return Err(ActionError::Unsupported {
                name: call.name.clone(),
            });
        }
        let tagged = serde_json::json!({
            "function": call.name,
            "parameters": call.parameters,
        });
        serde_json::from_value(tagged).map_err(|e| ActionError::InvalidArguments {
            name: call.name.clone(),
            reason: e.to_string(),
        })
    }

    pub fn name(&self) -> &'static str {
        match self {
            Action::Click { .. } => "computer_click",
            Action::Type { .. } => "computer_type",
            Action::ClickAndType { .. } => "computer_click_and_type",
            Action::Scroll { .. } => "computer_scroll",
            Action::Wait { .. } => "wait",
            Action::Stop { .. } => "stop",
            Action::Note { .. } => "note",
            Action::UserMessage { .. } => "user_message",
        }
    }
}
