//! Human-in-the-loop approval on the operator console.
//!
//! The gate blocks the control loop while it waits for a line of input. There
//! is nothing else running concurrently, so this is a plain blocking read.
use std::io::{BufRead, Write};
use std::sync::Mutex;

use crate::agent_engine::state::FunctionCall;
use crate::errors::{DeskPilotError, DeskPilotResult};

const RULE: &str = "==================================================";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Approval {
    Accepted,
    Rejected { reason: String },
}

/// Decisions only a human can make during a run.
pub trait Operator: Send + Sync {
    /// Accept or reject a proposed action. Blocks until a decision is made.
    fn review(&self, call: &FunctionCall) -> DeskPilotResult<Approval>;

    /// Show a message from the model and ask whether the run should go on.
    fn confirm_continue(&self, message: &str, is_login: bool) -> DeskPilotResult<bool>;
}

pub struct ConsoleOperator<R, W> {
    input: Mutex<R>,
    output: Mutex<W>,
    accept_token: String,
}

impl ConsoleOperator<std::io::BufReader<std::io::Stdin>, std::io::Stdout> {
    pub fn stdio(accept_token: impl Into<String>) -> Self {
        Self::new(
            std::io::BufReader::new(std::io::stdin()),
            std::io::stdout(),
            accept_token,
        )
    }
}

impl<R, W> ConsoleOperator<R, W>
where
    R: BufRead + Send,
    W: Write + Send,
{
    pub fn new(input: R, output: W, accept_token: impl Into<String>) -> Self {
        Self {
            input: Mutex::new(input),
            output: Mutex::new(output),
            accept_token: accept_token.into(),
        }
    }

    fn say(&self, text: &str) -> DeskPilotResult<()> {
        let mut out = self
            .output
            .lock()
            .map_err(|_| DeskPilotError::Approval("console output lock poisoned".into()))?;
        out.write_all(text.as_bytes())?;
        out.flush()?;
        Ok(())
    }

    /// Prints `prompt` and reads one trimmed line. End of input is an error.
    fn ask(&self, prompt: &str) -> DeskPilotResult<String> {
        self.say(prompt)?;
        let mut line = String::new();
        let read = self
            .input
            .lock()
            .map_err(|_| DeskPilotError::Approval("console input lock poisoned".into()))?
            .read_line(&mut line)?;
        if read == 0 {
            return Err(DeskPilotError::Approval("operator input closed".into()));
        }
        Ok(line.trim().to_string())
    }

    /// Reads lines until `decide` returns an answer.
    fn ask_until<T>(&self, prompt: &str, decide: impl Fn(&str) -> Option<T>) -> DeskPilotResult<T> {
        loop {
            let answer = self.ask(prompt)?;
            if let Some(value) = decide(&answer) {
                return Ok(value);
            }
        }
    }

    /// Shows the safety notice and requires an explicit yes before the run starts.
    pub fn acknowledge_warning(&self, warning: &str) -> DeskPilotResult<bool> {
        self.say(&format!("\n{0}{0}\n{1}\n{0}{0}\n\n", RULE, warning.trim_end()))?;
        self.ask_until("I understand and want to continue (y/n): ", yes_no)
    }

    pub fn ask_task(&self) -> DeskPilotResult<String> {
        self.say("\nWhat would you like the agent to do?\n")?;
        self.ask_until("Enter task: ", |answer| {
            (!answer.is_empty()).then(|| answer.to_string())
        })
    }
}

fn yes_no(answer: &str) -> Option<bool> {
    match answer.to_lowercase().as_str() {
        "y" | "yes" => Some(true),
        "n" | "no" => Some(false),
        _ => None,
    }
}

impl<R, W> Operator for ConsoleOperator<R, W>
where
    R: BufRead + Send,
    W: Write + Send,
{
    fn review(&self, call: &FunctionCall) -> DeskPilotResult<Approval> {
        self.say(&format!(
            "\n{RULE}\nProposed Action:\nFunction: {}\nParameters:\n{}\n{RULE}\n",
            call.name,
            call.to_pretty_json()
        ))?;
        let prompt = format!(
            "\nAccept [press {}] / Reject (type reason): ",
            self.accept_token.to_uppercase()
        );
        let decision = self.ask_until(&prompt, |answer| {
            if answer.is_empty() {
                None
            } else if answer.eq_ignore_ascii_case(&self.accept_token) {
                Some(Approval::Accepted)
            } else {
                Some(Approval::Rejected {
                    reason: answer.to_string(),
                })
            }
        })?;
        tracing::info!(function = %call.name, ?decision, "operator reviewed action");
        Ok(decision)
    }

    fn confirm_continue(&self, message: &str, is_login: bool) -> DeskPilotResult<bool> {
        let hint = if is_login {
            "\n(Log in on the screen now, then answer.)"
        } else {
            ""
        };
        self.say(&format!("\n{RULE}\n{message}{hint}\n{RULE}\n"))?;
        let go_on = self.ask_until("\nContinue? (y/n): ", yes_no)?;
        tracing::info!(go_on, is_login, "operator answered user message");
        Ok(go_on)
    }
}
