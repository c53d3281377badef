use async_trait::async_trait;

use crate::agent_engine::state::ScrollDirection;
use crate::errors::{DeskPilotError, DeskPilotResult};
use crate::executor::input::{InputDriver, KeyCombo};
use crate::perception::types::ScreenPoint;
use crate::process::run_tool;

/// Drives an X11 display through the `xdotool` command.
pub struct XdotoolDriver;

async fn xdotool(args: &[&str]) -> DeskPilotResult<()> {
    tracing::debug!(args = ?args, "xdotool");
    run_tool("xdotool", args)
        .await
        .map(|_| ())
        .map_err(DeskPilotError::Executor)
}

fn key_name(combo: KeyCombo) -> &'static str {
    match combo {
        KeyCombo::SelectAll => "ctrl+a",
        KeyCombo::Backspace => "BackSpace",
        KeyCombo::Enter => "Return",
    }
}

// xdotool uses button 4 for scroll up, button 5 for scroll down
fn wheel_button(direction: ScrollDirection) -> &'static str {
    match direction {
        ScrollDirection::Up => "4",
        ScrollDirection::Down => "5",
    }
}

#[async_trait]
impl InputDriver for XdotoolDriver {
    async fn move_pointer(&self, to: ScreenPoint) -> DeskPilotResult<()> {
        xdotool(&["mousemove", &to.x.to_string(), &to.y.to_string()]).await
    }

    async fn click_primary(&self) -> DeskPilotResult<()> {
        xdotool(&["click", "1"]).await
    }

    async fn press_keys(&self, combo: KeyCombo) -> DeskPilotResult<()> {
        xdotool(&["key", key_name(combo)]).await
    }

    async fn type_text(&self, text: &str) -> DeskPilotResult<()> {
        xdotool(&["type", "--", text]).await
    }

    async fn scroll_click(&self, direction: ScrollDirection) -> DeskPilotResult<()> {
        xdotool(&["click", wheel_button(direction)]).await
    }
}
