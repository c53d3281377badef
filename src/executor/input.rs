use async_trait::async_trait;
use enigo::{Axis, Button, Coordinate, Direction, Enigo, Key, Keyboard, Mouse, Settings};

use crate::agent_engine::state::ScrollDirection;
use crate::config::InputBackend;
use crate::errors::{DeskPilotError, DeskPilotResult};
use crate::executor::xdotool::XdotoolDriver;
use crate::perception::types::ScreenPoint;

/// Key combinations the executor sends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyCombo {
    SelectAll,
    Backspace,
    Enter,
}

/// OS input simulation. Every call blocks until the backend reports back;
/// a backend error fails the current action.
#[async_trait]
pub trait InputDriver: Send + Sync {
    async fn move_pointer(&self, to: ScreenPoint) -> DeskPilotResult<()>;
    async fn click_primary(&self) -> DeskPilotResult<()>;
    async fn press_keys(&self, combo: KeyCombo) -> DeskPilotResult<()>;
    async fn type_text(&self, text: &str) -> DeskPilotResult<()>;
    async fn scroll_click(&self, direction: ScrollDirection) -> DeskPilotResult<()>;
}

pub fn input_backend(backend: InputBackend) -> Box<dyn InputDriver> {
    match backend {
        InputBackend::Enigo => Box::new(EnigoDriver),
        InputBackend::Xdotool => Box::new(XdotoolDriver),
    }
}

/// Drives the local display through `enigo`. A fresh connection is opened per
/// call on the blocking pool.
pub struct EnigoDriver;

async fn run_enigo<F>(op: &'static str, f: F) -> DeskPilotResult<()>
where
    F: FnOnce(&mut Enigo) -> Result<(), enigo::InputError> + Send + 'static,
{
    tokio::task::spawn_blocking(move || {
        let mut enigo = Enigo::new(&Settings::default())
            .map_err(|e| DeskPilotError::Executor(format!("cannot connect to input backend: {e}")))?;
        f(&mut enigo).map_err(|e| DeskPilotError::Executor(format!("{op} failed: {e}")))
    })
    .await
    .map_err(|e| DeskPilotError::Executor(format!("{op} task failed: {e}")))?
}

#[cfg(target_os = "macos")]
const SELECT_ALL_MODIFIER: Key = Key::Meta;
#[cfg(not(target_os = "macos"))]
const SELECT_ALL_MODIFIER: Key = Key::Control;

#[async_trait]
impl InputDriver for EnigoDriver {
    async fn move_pointer(&self, to: ScreenPoint) -> DeskPilotResult<()> {
        run_enigo("pointer move", move |e| e.move_mouse(to.x, to.y, Coordinate::Abs)).await
    }

    async fn click_primary(&self) -> DeskPilotResult<()> {
        run_enigo("click", |e| e.button(Button::Left, Direction::Click)).await
    }

    async fn press_keys(&self, combo: KeyCombo) -> DeskPilotResult<()> {
        run_enigo("key press", move |e| match combo {
            KeyCombo::SelectAll => {
                e.key(SELECT_ALL_MODIFIER, Direction::Press)?;
                let pressed = e.key(Key::Unicode('a'), Direction::Click);
                e.key(SELECT_ALL_MODIFIER, Direction::Release)?;
                pressed
            }
            KeyCombo::Backspace => e.key(Key::Backspace, Direction::Click),
            KeyCombo::Enter => e.key(Key::Return, Direction::Click),
        })
        .await
    }

    async fn type_text(&self, text: &str) -> DeskPilotResult<()> {
        let text = text.to_string();
        run_enigo("typing", move |e| e.text(&text)).await
    }

    async fn scroll_click(&self, direction: ScrollDirection) -> DeskPilotResult<()> {
        let length = match direction {
            ScrollDirection::Up => -1,
            ScrollDirection::Down => 1,
        };
        run_enigo("scroll", move |e| e.scroll(length, Axis::Vertical)).await
    }
}
