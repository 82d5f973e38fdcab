//! HTTP layer for the pharmacy directory.
//!
//! [`build_router`] returns a composable axum `Router`; [`serve`] binds it and
//! runs until ctrl-c.

mod endpoints;
mod envelope;
pub mod error;
mod guard;
mod router;
mod state;

pub use envelope::Envelope;
pub use error::{ApiError, ErrorBody};
pub use guard::{RunGuard, RunTicket};
pub use router::{build_router, serve};
pub use state::AppState;
