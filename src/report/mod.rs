//! Output: the published JSON artifacts and the console summary.

pub mod console;
pub mod publisher;

pub use publisher::{PublishedArtifacts, Publisher};
