pub mod conversations;
pub mod error;
pub mod messages;
pub mod middleware;
pub mod presence;
pub mod settings;
pub mod state;

pub(crate) mod views;

pub use state::{AppState, AppStateInner, RuntimeConfig};
