//! Application layer for Sentimental.
//!
//! [`ViewStateController`] owns the renderable state and coordinates the
//! auth gateway, content store, generation service, and session cache.

pub mod controller;
pub mod single_flight;
pub mod view_state;

pub use controller::{ControllerSettings, ViewStateController};
pub use single_flight::SingleFlight;
pub use view_state::{ControllerState, Notice, NoticeKind, SelectedFormat, ViewState};
