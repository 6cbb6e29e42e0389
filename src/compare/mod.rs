//! The page regression comparison engine.
//!
//! # Module Structure
//!
//! - [`capture`] - one before and up to three after captures per request
//! - [`visual`] - pixel diff of the before/primary-after screenshots
//! - [`matcher`] - greedy before/after element pairing
//! - [`classifier`] - severity-tagged regression issues
//! - [`aggregate`] - isBroken check and status cascade
//! - [`overlay`] - annotated screenshot of missing elements
//! - [`report`] - verdict mapping and report assembly
//! - [`stage`] - per-stage failure policy
//! - [`engine`] - request validation and orchestration
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use pageguard_lib::artifacts::ArtifactDir;
//! use pageguard_lib::browser::{BrowserOptions, PlaywrightRenderer};
//! use pageguard_lib::compare::{CompareRequest, ComparisonEngine};
//!
//! # async fn example() -> pageguard_lib::Result<()> {
//! let renderer = Arc::new(PlaywrightRenderer::new(BrowserOptions::default()));
//! let engine = ComparisonEngine::new(renderer, ArtifactDir::default())?;
//! let request = CompareRequest::new("https://example.com", "https://staging.example.com", "site-1")
//!     .with_delays(vec![1000, 3000]);
//! let report = engine.compare(request).await?;
//! println!("{} ({})", report.status, report.recommendation);
//! # Ok(())
//! # }
//! ```

pub mod aggregate;
pub mod capture;
pub mod classifier;
pub mod engine;
pub mod matcher;
pub mod overlay;
pub mod report;
pub mod stage;
pub mod visual;

pub use aggregate::{aggregate, differences, Verdict};
pub use capture::{plan_delays, CaptureOrchestrator, CaptureSet, DEFAULT_DELAY_MS};
pub use classifier::ChangeClassifier;
pub use engine::{CompareRequest, CompareResponse, ComparisonEngine, DelayInput};
pub use matcher::{GreedyMatcher, MatchingStrategy};
pub use overlay::{ImageCompositor, OverlayRenderer, RasterCompositor};
pub use report::verdict_outcome;
pub use stage::{Stage, StageOutcome, StagePolicy};
pub use visual::{PixelDiff, VisualDiffer, YiqPixelDiff};
