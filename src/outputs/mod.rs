//! Output generation: JSON files on disk and the console digest.
//!
//! # Submodules
//!
//! - [`json`]: Writes discussions and reports as pretty JSON and reads them back
//! - [`digest`]: Renders a report (or an article listing) as plain text
//!
//! # Default file names
//!
//! ```text
//! comments_world_2024_mar_04_some-story.json           # fetch
//! comments_world_2024_mar_04_some-story_analysis.json  # analyze
//! ```

pub mod digest;
pub mod json;
