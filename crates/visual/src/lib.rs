//! PatternWatch visual regression engine
//!
//! Decides whether freshly captured screenshots still match the baseline
//! patterns stored for them:
//! - blind regions mask out pixels that are allowed to change
//! - a pure comparator produces the verdict and a highlighted diff image
//! - a runner checks every pattern of a category for one browser and records
//!   the outcome as a test session
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  PatternRunner                                              │
//! │    ├── Database::find_patterns_for_browser_in_category()    │
//! │    ├── BrowserCamera::capture(test case) -> Candidate       │
//! │    ├── Comparator::compare_pattern(candidate, pattern)      │
//! │    │     └── RegionMask (union of blind regions)            │
//! │    └── ArtifactStore::put(screenshot | diff image)          │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod camera;
pub mod compare;
pub mod error;
pub mod mask;
pub mod runner;

pub use camera::{BrowserCamera, Candidate, DirectoryCamera};
pub use compare::{Comparator, Comparison, ComparisonSettings};
pub use error::{VisualError, VisualResult};
pub use mask::RegionMask;
pub use runner::{PatternRunner, RunReport, RunnerConfig};
