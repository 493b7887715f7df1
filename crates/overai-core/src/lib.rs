pub mod autostart;
pub mod config;
pub mod error;
pub mod events;
pub mod hotkey;
pub mod lifecycle;
pub mod overlay;
pub mod paths;
pub mod persist;
pub mod state;

#[cfg(test)]
mod testing;

pub use autostart::*;
pub use config::*;
pub use error::*;
pub use events::*;
pub use hotkey::*;
pub use lifecycle::*;
pub use overlay::*;
pub use paths::*;
pub use state::*;
