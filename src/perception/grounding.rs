use std::sync::{Arc, OnceLock};

use regex::Regex;

use crate::errors::DeskPilotResult;
use crate::llm::provider::LlmProvider;
use crate::llm::types::{CallConfig, ChatMessage, ContentPart};
use crate::perception::screenshot::Screenshot;
use crate::perception::types::{NormalizedPoint, ScreenPoint, ScreenSize};

pub const GROUNDING_INSTRUCTION: &str = "Assist the user in pointing out the specified UI element \
in the given image, being as accurate as possible. Your response will only comprise the \
coordinates in form (x,y). It is crucial that you select the correct UI element, and not \
necessarily anything else that may be 'nearby' or 'close'.";

#[derive(Debug, Clone, PartialEq)]
pub enum Grounding {
    Located {
        normalized: NormalizedPoint,
        point: ScreenPoint,
    },
    /// The reply held no usable coordinate pair.
    NotFound { reply: String },
}

fn coordinate_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\((\d+\.?\d*),\s*(\d+\.?\d*)\)").expect("static regex"))
}

/// First `(x, y)` pair in the reply, if any.
pub fn parse_coordinates(text: &str) -> Option<NormalizedPoint> {
    let caps = coordinate_regex().captures(text)?;
    let x = caps.get(1)?.as_str().parse().ok()?;
    let y = caps.get(2)?.as_str().parse().ok()?;
    Some(NormalizedPoint { x, y })
}

/// Localizes element descriptions with the grounding model.
pub struct GroundingResolver {
    provider: Arc<dyn LlmProvider>,
    cfg: CallConfig,
    screen: ScreenSize,
}

impl GroundingResolver {
    pub fn new(provider: Arc<dyn LlmProvider>, cfg: CallConfig, screen: ScreenSize) -> Self {
        Self {
            provider,
            cfg,
            screen,
        }
    }

    /// Asks for the element's position on `shot`. Transport errors propagate;
    /// an unusable reply comes back as `Grounding::NotFound`.
    pub async fn resolve(&self, description: &str, shot: &Screenshot) -> DeskPilotResult<Grounding> {
        let messages = vec![
            ChatMessage::system(GROUNDING_INSTRUCTION),
            ChatMessage::user_parts(vec![ContentPart::text(description), shot.image_part()]),
        ];
        let reply = self.provider.chat(messages, &self.cfg).await?.content;

        let Some(normalized) = parse_coordinates(&reply) else {
            tracing::warn!(element = %description, reply = %reply, "no coordinates in grounding reply");
            return Ok(Grounding::NotFound { reply });
        };
        if !normalized.in_range() {
            tracing::warn!(
                element = %description,
                x = normalized.x,
                y = normalized.y,
                "grounding coordinates outside [0, 1000]"
            );
            return Ok(Grounding::NotFound { reply });
        }

        let point = self.screen.scale(normalized);
        tracing::info!(
            element = %description,
            nx = normalized.x,
            ny = normalized.y,
            x = point.x,
            y = point.y,
            "element grounded"
        );
        Ok(Grounding::Located { normalized, point })
    }
}
