use serde::{Deserialize, Serialize};

use crate::config::ScreenConfig;

/// Upper bound of the grounding model's coordinate space on both axes.
pub const NORMALIZED_MAX: f64 = 1000.0;

/// Point in the grounding model's `[0, 1000]` space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormalizedPoint {
    pub x: f64,
    pub y: f64,
}

impl NormalizedPoint {
    pub fn in_range(&self) -> bool {
        (0.0..=NORMALIZED_MAX).contains(&self.x) && (0.0..=NORMALIZED_MAX).contains(&self.y)
    }
}

/// Physical pixel position on the real screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreenPoint {
    pub x: i32,
    pub y: i32,
}

impl std::fmt::Display for ScreenPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreenSize {
    pub width: u32,
    pub height: u32,
}

impl From<ScreenConfig> for ScreenSize {
    fn from(cfg: ScreenConfig) -> Self {
        Self {
            width: cfg.width,
            height: cfg.height,
        }
    }
}

impl ScreenSize {
    /// `round(n / 1000 * dimension)` independently per axis.
    pub fn scale(&self, p: NormalizedPoint) -> ScreenPoint {
        ScreenPoint {
            x: (p.x / NORMALIZED_MAX * self.width as f64).round() as i32,
            y: (p.y / NORMALIZED_MAX * self.height as f64).round() as i32,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scales_to_full_hd() {
        let screen = ScreenSize {
            width: 1920,
            height: 1080,
        };
        assert_eq!(
            screen.scale(NormalizedPoint { x: 500.0, y: 250.0 }),
            ScreenPoint { x: 960, y: 270 }
        );
        assert_eq!(
            screen.scale(NormalizedPoint {
                x: 1000.0,
                y: 1000.0
            }),
            ScreenPoint { x: 1920, y: 1080 }
        );
    }

    #[test]
    fn identity_screen_keeps_coordinates() {
        let screen = ScreenSize {
            width: 1000,
            height: 1000,
        };
        for (x, y) in [(0.0_f64, 0.0_f64), (123.0, 987.0), (1000.0, 1.0), (499.4, 500.6)] {
            let p = screen.scale(NormalizedPoint { x, y });
            assert_eq!(
                p,
                ScreenPoint {
                    x: x.round() as i32,
                    y: y.round() as i32
                }
            );
            assert!((p.x as f64 - x).abs() <= 0.5);
        }
    }

    #[test]
    fn range_check_is_inclusive() {
        assert!(NormalizedPoint { x: 0.0, y: 1000.0 }.in_range());
        assert!(!NormalizedPoint { x: 1000.5, y: 10.0 }.in_range());
    }
}
