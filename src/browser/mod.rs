//! Page rendering for the comparison engine.
//!
//! # Module Structure
//!
//! - [`renderer`] - the [`Renderer`] seam and its request/error types
//! - [`manager`] - Playwright-backed renderer (one `node` helper per capture)
//! - `playwright` - inline capture script and error mapping
//! - [`fixture`] - on-disk fixture renderer for offline runs
//! - `snapshot` - raw output conversion shared by both renderers
//!
//! # Example
//!
//! ```no_run
//! use pageguard_lib::browser::{BrowserOptions, CaptureRequest, PlaywrightRenderer, Renderer};
//! use pageguard_lib::Viewport;
//!
//! # async fn example() -> Result<(), pageguard_lib::browser::RenderError> {
//! let renderer = PlaywrightRenderer::new(BrowserOptions::default());
//! let request = CaptureRequest {
//!     url: "https://example.com".into(),
//!     delay_ms: 3000,
//!     viewport: Viewport::default(),
//!     screenshot_path: "before.png".into(),
//! };
//! let snapshot = renderer.capture(&request).await?;
//! println!("{} elements", snapshot.elements.len());
//! # Ok(())
//! # }
//! ```

pub mod fixture;
pub mod manager;
mod playwright;
pub mod renderer;
mod snapshot;

pub use fixture::{fixture_key, FixtureRenderer, FIXTURE_DIR_ENV};
pub use manager::{BrowserOptions, PlaywrightRenderer, DEFAULT_NAVIGATION_TIMEOUT};
pub use renderer::{CaptureRequest, RenderError, Renderer};
