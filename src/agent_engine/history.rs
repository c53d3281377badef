use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::agent_engine::state::FunctionCall;
use crate::errors::DeskPilotResult;

const HISTORY_HEADER: &str = "---\n\nINTERACTION HISTORY:\n";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EntryKind {
    /// One summarized model turn.
    Step { index: u32, narrative: String },
    ProposedAction { call: FunctionCall },
    Rejected { reason: String },
    Performed { description: String },
    ResolutionFailed { element: String },
    Note { note: String },
    UserMessage { message: String, continued: bool },
    Stopped { result: String },
    Commentary { content: String },
    ParseError { error: String },
    UnsupportedAction { name: String },
    InvalidArguments { name: String, reason: String },
    LoopError { error: String },
    StepLimitReached { max_steps: u32 },
}

impl EntryKind {
    fn render(&self, out: &mut String) {
        use std::fmt::Write as _;
        let _ = match self {
            EntryKind::Step { index, narrative } => writeln!(out, "Step {index}: {narrative}"),
            EntryKind::ProposedAction { call } => {
                write!(out, "Action: {}\n\n", call.to_pretty_json())
            }
            EntryKind::Rejected { reason } => write!(out, "Action rejected: {reason}\n\n"),
            EntryKind::Performed { description } => write!(out, "Action: {description}\n\n"),
            EntryKind::ResolutionFailed { element } => {
                write!(out, "Error: Unable to find coordinates for \"{element}\"\n\n")
            }
            EntryKind::Note { note } => write!(out, "Note: {note}\n\n"),
            EntryKind::UserMessage { message, continued } => write!(
                out,
                "Message to user: {message}\nOperator chose to {}.\n\n",
                if *continued { "continue" } else { "stop" }
            ),
            EntryKind::Stopped { result } => {
                write!(out, "Action: Stopped with result: {result}\n\n")
            }
            EntryKind::Commentary { content } => {
                write!(out, "Response without function call: {content}\n\n")
            }
            EntryKind::ParseError { error } => {
                write!(out, "Error: Could not parse function call JSON: {error}\n\n")
            }
            EntryKind::UnsupportedAction { name } => {
                write!(out, "Error: Unsupported action \"{name}\" was not executed\n\n")
            }
            EntryKind::InvalidArguments { name, reason } => {
                write!(out, "Error: Invalid parameters for \"{name}\": {reason}\n\n")
            }
            EntryKind::LoopError { error } => write!(out, "Error in agent loop: {error}\n\n"),
            EntryKind::StepLimitReached { max_steps } => write!(
                out,
                "Agent stopped after reaching maximum iterations ({max_steps}).\n\n"
            ),
        };
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptEntry {
    pub ts: i64,
    #[serde(flatten)]
    pub kind: EntryKind,
}

/// Ordered log of one run. Rendered to text only when sent to the model or persisted.
#[derive(Debug, Clone)]
pub struct Transcript {
    task: String,
    entries: Vec<TranscriptEntry>,
    next_step: u32,
}

impl Transcript {
    pub fn new(task: impl Into<String>) -> Self {
        Self {
            task: task.into(),
            entries: Vec::new(),
            next_step: 1,
        }
    }

    pub fn task(&self) -> &str {
        &self.task
    }

    pub fn entries(&self) -> &[TranscriptEntry] {
        &self.entries
    }

    /// Index of the most recent step, 0 before the first one.
    pub fn last_step(&self) -> u32 {
        self.next_step - 1
    }

    pub fn push(&mut self, kind: EntryKind) {
        self.entries.push(TranscriptEntry {
            ts: chrono::Utc::now().timestamp_millis(),
            kind,
        });
    }

    /// Records a summarized model turn and returns its index.
    pub fn begin_step(&mut self, narrative: impl Into<String>) -> u32 {
        let index = self.next_step;
        self.next_step += 1;
        self.push(EntryKind::Step {
            index,
            narrative: narrative.into(),
        });
        index
    }

    /// The interaction history as fed back to the reasoning model.
    pub fn render_history(&self) -> String {
        let mut out = String::from(HISTORY_HEADER);
        for entry in &self.entries {
            entry.kind.render(&mut out);
        }
        out
    }

    /// Full Run Record text: task header followed by the history.
    pub fn render_record(&self) -> String {
        format!("TASK: {}\n\n=====\n\n{}", self.task, self.render_history())
    }
}

/// Files of one run under `<runs_dir>/<start timestamp>/`.
pub struct RunRecord {
    dir: PathBuf,
    history_path: PathBuf,
    jsonl_path: PathBuf,
    flushed: usize,
    screenshot_counter: u32,
}

impl RunRecord {
    pub fn create(runs_dir: &Path) -> DeskPilotResult<Self> {
        let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S").to_string();
        let mut dir = runs_dir.join(&stamp);
        let mut suffix = 1;
        while dir.exists() {
            dir = runs_dir.join(format!("{stamp}_{suffix}"));
            suffix += 1;
        }
        std::fs::create_dir_all(&dir)?;
        tracing::info!(dir = %dir.display(), "run directory created");
        Ok(Self {
            history_path: dir.join("interaction_history.txt"),
            jsonl_path: dir.join("transcript.jsonl"),
            dir,
            flushed: 0,
            screenshot_counter: 1,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn history_path(&self) -> &Path {
        &self.history_path
    }

    pub fn jsonl_path(&self) -> &Path {
        &self.jsonl_path
    }

    /// Path for the next screenshot; earlier screenshots are kept.
    pub fn next_screenshot_path(&mut self) -> PathBuf {
        let path = self
            .dir
            .join(format!("screenshot_{:03}.png", self.screenshot_counter));
        self.screenshot_counter += 1;
        path
    }

    /// Rewrites the history file in full and appends unflushed entries to the JSONL log.
    pub fn persist(&mut self, transcript: &Transcript) -> DeskPilotResult<()> {
        let tmp = self.history_path.with_extension("txt.tmp");
        std::fs::write(&tmp, transcript.render_record())?;
        std::fs::rename(&tmp, &self.history_path)?;

        let pending = &transcript.entries()[self.flushed.min(transcript.entries().len())..];
        if !pending.is_empty() {
            let mut file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.jsonl_path)?;
            for entry in pending {
                writeln!(file, "{}", serde_json::to_string(entry)?)?;
            }
            self.flushed = transcript.entries().len();
        }
        tracing::debug!(
            path = %self.history_path.display(),
            entries = transcript.entries().len(),
            "run record persisted"
        );
        Ok(())
    }
}
