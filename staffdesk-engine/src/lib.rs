pub mod campaign;
pub mod error;
pub mod fulfillment;
pub mod progress;
pub mod render;
pub mod types;

pub use error::ContractError;
pub use progress::{compute_progression, ProgressKind, ProgressionResult, Stage, Terminal};
pub use render::{StepMarker, StepState, Stepper};
pub use staffdesk_util::Amount;
