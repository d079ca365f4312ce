//! Full-page capture engine.
//!
//! The normalizer measures and temporarily reshapes the live document, the
//! orchestrator drives one capture through the host, and delivery hands the result
//! to the clipboard and preview surfaces.

pub mod delivery;
pub mod normalizer;
pub mod orchestrator;
pub mod page_agent;
pub mod page_scripts;
pub mod resolution;
pub mod service;
pub mod surface;

#[cfg(test)]
mod test_support;

pub use delivery::ResultDelivery;
pub use normalizer::{Measurement, Normalizer};
pub use orchestrator::{CaptureLimits, Orchestrator};
pub use page_agent::{PageDom, ScriptedDom};
pub use resolution::{choose_resolution, clamp_capture_width, ResolutionPlan};
pub use service::{CaptureOutcome, CaptureService};
pub use surface::{PageClipboard, PageOverlay};
