//! Browser viewport used for every capture of a comparison.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Viewport size in CSS pixels.
///
/// Deserialization accepts any values, so requests and config files are
/// checked with [`Viewport::is_renderable`] before a capture starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
        }
    }
}

impl Viewport {
    /// A browser page cannot be opened with a zero-sized viewport.
    pub fn is_renderable(&self) -> bool {
        self.width > 0 && self.height > 0
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ViewportError {
    #[error("Invalid viewport '{0}': expected WIDTHxHEIGHT (e.g., 1920x1080)")]
    Format(String),
    #[error("Invalid viewport {axis} '{value}': expected a positive integer")]
    Dimension { axis: &'static str, value: String },
}

fn dimension(axis: &'static str, raw: &str) -> Result<u32, ViewportError> {
    match raw.trim().parse::<u32>() {
        Ok(value) if value > 0 => Ok(value),
        _ => Err(ViewportError::Dimension {
            axis,
            value: raw.trim().to_string(),
        }),
    }
}

/// Parses `WIDTHxHEIGHT`; the separator may be `x` or `X`.
impl FromStr for Viewport {
    type Err = ViewportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (width, height) = s
            .split_once(['x', 'X'])
            .ok_or_else(|| ViewportError::Format(s.to_string()))?;
        if height.contains(['x', 'X']) {
            return Err(ViewportError::Format(s.to_string()));
        }
        Ok(Viewport {
            width: dimension("width", width)?,
            height: dimension("height", height)?,
        })
    }
}

impl fmt::Display for Viewport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_mobile_and_desktop_sizes() {
        assert_eq!(
            "375x812".parse::<Viewport>().unwrap(),
            Viewport {
                width: 375,
                height: 812
            }
        );
        assert_eq!(" 1920 X 1080 ".parse::<Viewport>().unwrap(), Viewport::default());
    }

    #[test]
    fn rejects_malformed_sizes() {
        assert_eq!(
            "1920".parse::<Viewport>(),
            Err(ViewportError::Format("1920".into()))
        );
        assert!(matches!(
            "1x2x3".parse::<Viewport>(),
            Err(ViewportError::Format(_))
        ));
        assert_eq!(
            "widex900".parse::<Viewport>(),
            Err(ViewportError::Dimension {
                axis: "width",
                value: "wide".into()
            })
        );
        assert!(matches!(
            "1440x0".parse::<Viewport>(),
            Err(ViewportError::Dimension { axis: "height", .. })
        ));
    }

    #[test]
    fn zero_sized_viewports_are_not_renderable() {
        assert!(Viewport::default().is_renderable());
        assert!(!Viewport {
            width: 0,
            height: 900
        }
        .is_renderable());
    }

    #[test]
    fn request_shape_round_trips_through_display() {
        let vp: Viewport = serde_json::from_str(r#"{"width":375,"height":812}"#).unwrap();
        assert_eq!(vp.to_string(), "375x812");
        assert_eq!(vp.to_string().parse::<Viewport>().unwrap(), vp);
    }
}
