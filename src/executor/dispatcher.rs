use std::sync::Arc;
use std::time::Duration;

use crate::agent_engine::history::{EntryKind, Transcript};
use crate::agent_engine::state::{Action, Flow, ScrollDirection, StopReason};
use crate::config::AgentConfig;
use crate::errors::DeskPilotResult;
use crate::executor::approval::Operator;
use crate::executor::input::{InputDriver, KeyCombo};
use crate::perception::grounding::{Grounding, GroundingResolver};
use crate::perception::screenshot::Screenshot;
use crate::perception::types::ScreenPoint;

/// Pauses between the individual input events of one action.
#[derive(Debug, Clone)]
pub struct ExecutorTiming {
    pub key_delay: Duration,
    pub click_type_delay: Duration,
    pub scroll_tick_delay: Duration,
    pub scroll_clicks: u32,
}

impl ExecutorTiming {
    pub fn from_config(cfg: &AgentConfig) -> Self {
        Self {
            key_delay: Duration::from_millis(cfg.key_delay_ms),
            click_type_delay: Duration::from_millis(cfg.click_type_delay_ms),
            scroll_tick_delay: Duration::from_millis(cfg.scroll_tick_delay_ms),
            scroll_clicks: cfg.scroll_clicks,
        }
    }
}

async fn pause(d: Duration) {
    if !d.is_zero() {
        tokio::time::sleep(d).await;
    }
}

/// Carries out approved actions and records their outcome.
pub struct ActionExecutor {
    input: Arc<dyn InputDriver>,
    resolver: GroundingResolver,
    operator: Arc<dyn Operator>,
    timing: ExecutorTiming,
}

impl ActionExecutor {
    pub fn new(
        input: Arc<dyn InputDriver>,
        resolver: GroundingResolver,
        operator: Arc<dyn Operator>,
        timing: ExecutorTiming,
    ) -> Self {
        Self {
            input,
            resolver,
            operator,
            timing,
        }
    }

    /// Runs one action. Input failures propagate; grounding misses are recorded
    /// and leave the loop running.
    pub async fn execute(
        &self,
        action: &Action,
        shot: &Screenshot,
        transcript: &mut Transcript,
    ) -> DeskPilotResult<Flow> {
        tracing::info!(action = action.name(), "executing action");
        match action {
            Action::Click {
                element_description,
            } => {
                let Some(point) = self.locate(element_description, shot, transcript).await? else {
                    return Ok(Flow::Continue);
                };
                self.click_at(point).await?;
                transcript.push(EntryKind::Performed {
                    description: format!(
                        "Clicked on element \"{element_description}\" at coordinates {point}"
                    ),
                });
            }

            Action::Type { text, press_enter } => {
                self.replace_text(text, *press_enter).await?;
                transcript.push(EntryKind::Performed {
                    description: format!(
                        "Typed \"{text}\"{}",
                        if *press_enter { " and pressed Enter" } else { "" }
                    ),
                });
            }

            Action::ClickAndType {
                element_description,
                text,
                press_enter,
            } => {
                let Some(point) = self.locate(element_description, shot, transcript).await? else {
                    return Ok(Flow::Continue);
                };
                self.click_at(point).await?;
                pause(self.timing.click_type_delay).await;
                self.replace_text(text, *press_enter).await?;
                transcript.push(EntryKind::Performed {
                    description: format!(
                        "Clicked on \"{element_description}\" and typed \"{text}\"{}",
                        if *press_enter { " with Enter" } else { "" }
                    ),
                });
            }

            Action::Scroll {
                element_description,
                direction,
            } => {
                let Some(point) = self.locate(element_description, shot, transcript).await? else {
                    return Ok(Flow::Continue);
                };
                self.scroll_at(point, *direction).await?;
                transcript.push(EntryKind::Performed {
                    description: format!(
                        "Scrolled {direction} {} times over \"{element_description}\" at coordinates {point}",
                        self.timing.scroll_clicks
                    ),
                });
            }

            Action::Wait { seconds } => match Duration::try_from_secs_f64(*seconds) {
                Ok(duration) => {
                    tracing::info!(seconds, "waiting");
                    pause(duration).await;
                    transcript.push(EntryKind::Performed {
                        description: format!("Waited for {seconds} seconds"),
                    });
                }
                Err(e) => transcript.push(EntryKind::InvalidArguments {
                    name: action.name().into(),
                    reason: format!("seconds = {seconds}: {e}"),
                }),
            },

            Action::Stop { result } => {
                tracing::info!(result = %result, "stop requested by model");
                transcript.push(EntryKind::Stopped {
                    result: result.clone(),
                });
                return Ok(Flow::Stop(StopReason::Completed {
                    result: result.clone(),
                }));
            }

            Action::Note { note } => {
                tracing::info!(note = %note, "model note");
                transcript.push(EntryKind::Note { note: note.clone() });
            }

            Action::UserMessage { message, is_login } => {
                let continued = self.operator.confirm_continue(message, *is_login)?;
                transcript.push(EntryKind::UserMessage {
                    message: message.clone(),
                    continued,
                });
                if !continued {
                    return Ok(Flow::Stop(StopReason::StoppedByUser));
                }
            }
        }
        Ok(Flow::Continue)
    }

    async fn locate(
        &self,
        description: &str,
        shot: &Screenshot,
        transcript: &mut Transcript,
    ) -> DeskPilotResult<Option<ScreenPoint>> {
        match self.resolver.resolve(description, shot).await? {
            Grounding::Located { point, .. } => Ok(Some(point)),
            Grounding::NotFound { .. } => {
                transcript.push(EntryKind::ResolutionFailed {
                    element: description.to_string(),
                });
                Ok(None)
            }
        }
    }

    async fn click_at(&self, point: ScreenPoint) -> DeskPilotResult<()> {
        tracing::info!(x = point.x, y = point.y, "clicking");
        self.input.move_pointer(point).await?;
        self.input.click_primary().await
    }

    /// Select-all, delete, type, and optionally Enter.
    async fn replace_text(&self, text: &str, press_enter: bool) -> DeskPilotResult<()> {
        self.input.press_keys(KeyCombo::SelectAll).await?;
        pause(self.timing.key_delay).await;
        self.input.press_keys(KeyCombo::Backspace).await?;
        pause(self.timing.key_delay).await;
        self.input.type_text(text).await?;
        if press_enter {
            pause(self.timing.key_delay).await;
            self.input.press_keys(KeyCombo::Enter).await?;
        }
        Ok(())
    }

    async fn scroll_at(&self, point: ScreenPoint, direction: ScrollDirection) -> DeskPilotResult<()> {
        tracing::info!(x = point.x, y = point.y, %direction, clicks = self.timing.scroll_clicks, "scrolling");
        self.input.move_pointer(point).await?;
        pause(self.timing.key_delay).await;
        for _ in 0..self.timing.scroll_clicks {
            self.input.scroll_click(direction).await?;
            pause(self.timing.scroll_tick_delay).await;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{zero_timing, InputEvent, RecordingInput, ScriptedOperator, ScriptedProvider};
    use crate::perception::types::ScreenSize;

    struct Fixture {
        input: Arc<RecordingInput>,
        operator: Arc<ScriptedOperator>,
        executor: ActionExecutor,
    }

    fn fixture(grounding_replies: &[&str], continue_answers: &[bool]) -> Fixture {
        let input = Arc::new(RecordingInput::default());
        let operator = Arc::new(ScriptedOperator::new(Vec::new(), continue_answers.to_vec()));
        let resolver = GroundingResolver::new(
            Arc::new(ScriptedProvider::new(grounding_replies.iter().copied())),
            ScriptedProvider::call_config(),
            ScreenSize {
                width: 1920,
                height: 1080,
            },
        );
        let executor = ActionExecutor::new(input.clone(), resolver, operator.clone(), zero_timing());
        Fixture {
            input,
            operator,
            executor,
        }
    }

    fn shot() -> Screenshot {
        Screenshot {
            path: "screenshot_001.png".into(),
            base64: "AAAA".into(),
        }
    }

    #[tokio::test]
    async fn click_moves_then_clicks_at_scaled_point() {
        let f = fixture(&["(500, 250)"], &[]);
        let mut t = Transcript::new("open settings");
        let flow = f
            .executor
            .execute(
                &Action::Click {
                    element_description: "settings icon".into(),
                },
                &shot(),
                &mut t,
            )
            .await
            .unwrap();
        assert_eq!(flow, Flow::Continue);
        assert_eq!(
            f.input.events(),
            vec![
                InputEvent::Move(ScreenPoint { x: 960, y: 270 }),
                InputEvent::Click
            ]
        );
        assert!(t
            .render_history()
            .contains("Clicked on element \"settings icon\" at coordinates (960, 270)"));
    }

    #[tokio::test]
    async fn unresolved_click_records_failure_without_input() {
        let f = fixture(&["sorry, not visible"], &[]);
        let mut t = Transcript::new("open settings");
        let flow = f
            .executor
            .execute(
                &Action::Click {
                    element_description: "settings icon".into(),
                },
                &shot(),
                &mut t,
            )
            .await
            .unwrap();
        assert_eq!(flow, Flow::Continue);
        assert!(f.input.events().is_empty());
        assert!(t
            .render_history()
            .contains("Error: Unable to find coordinates for \"settings icon\""));
    }

    #[tokio::test]
    async fn type_clears_field_first_and_presses_enter() {
        let f = fixture(&[], &[]);
        let mut t = Transcript::new("search");
        f.executor
            .execute(
                &Action::Type {
                    text: "rust".into(),
                    press_enter: true,
                },
                &shot(),
                &mut t,
            )
            .await
            .unwrap();
        assert_eq!(
            f.input.events(),
            vec![
                InputEvent::Keys(KeyCombo::SelectAll),
                InputEvent::Keys(KeyCombo::Backspace),
                InputEvent::Text("rust".into()),
                InputEvent::Keys(KeyCombo::Enter),
            ]
        );
        assert!(t.render_history().contains("Typed \"rust\" and pressed Enter"));
    }

    #[tokio::test]
    async fn click_and_type_clicks_before_typing() {
        let f = fixture(&["(100, 100)"], &[]);
        let mut t = Transcript::new("search");
        f.executor
            .execute(
                &Action::ClickAndType {
                    element_description: "search box".into(),
                    text: "rust".into(),
                    press_enter: false,
                },
                &shot(),
                &mut t,
            )
            .await
            .unwrap();
        let events = f.input.events();
        assert_eq!(events[0], InputEvent::Move(ScreenPoint { x: 192, y: 108 }));
        assert_eq!(events[1], InputEvent::Click);
        assert_eq!(events[4], InputEvent::Text("rust".into()));
        assert_eq!(events.len(), 5);
    }

    #[tokio::test]
    async fn scroll_uses_configured_click_count() {
        let f = fixture(&["(500, 500)"], &[]);
        let mut t = Transcript::new("read");
        f.executor
            .execute(
                &Action::Scroll {
                    element_description: "article".into(),
                    direction: ScrollDirection::Down,
                },
                &shot(),
                &mut t,
            )
            .await
            .unwrap();
        assert_eq!(
            f.input.events(),
            vec![
                InputEvent::Move(ScreenPoint { x: 960, y: 540 }),
                InputEvent::Scroll(ScrollDirection::Down),
                InputEvent::Scroll(ScrollDirection::Down),
            ]
        );
        assert!(t.render_history().contains("Scrolled down 2 times over \"article\""));
    }

    #[tokio::test]
    async fn input_failure_propagates() {
        let f = fixture(&[], &[]);
        f.input.fail_next("xdotool not running");
        let mut t = Transcript::new("x");
        let result = f
            .executor
            .execute(
                &Action::Type {
                    text: "a".into(),
                    press_enter: false,
                },
                &shot(),
                &mut t,
            )
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn negative_wait_is_recorded_as_invalid() {
        let f = fixture(&[], &[]);
        let mut t = Transcript::new("x");
        let flow = f
            .executor
            .execute(&Action::Wait { seconds: -1.0 }, &shot(), &mut t)
            .await
            .unwrap();
        assert_eq!(flow, Flow::Continue);
        assert!(t.render_history().contains("Invalid parameters for \"wait\""));
    }

    #[tokio::test]
    async fn stop_and_declined_message_end_the_run() {
        let f = fixture(&[], &[false]);
        let mut t = Transcript::new("x");
        let flow = f
            .executor
            .execute(&Action::Stop { result: "done".into() }, &shot(), &mut t)
            .await
            .unwrap();
        assert_eq!(
            flow,
            Flow::Stop(StopReason::Completed {
                result: "done".into()
            })
        );

        let flow = f
            .executor
            .execute(
                &Action::UserMessage {
                    message: "Please log in".into(),
                    is_login: true,
                },
                &shot(),
                &mut t,
            )
            .await
            .unwrap();
        assert_eq!(flow, Flow::Stop(StopReason::StoppedByUser));
        assert_eq!(f.operator.messages(), vec!["Please log in".to_string()]);
        assert!(t.render_history().contains("Operator chose to stop."));
        assert!(f.input.events().is_empty());
    }
}
