//! Client-side update manager.
//!
//! Embeds in the application and drives the three-step update protocol
//! against a static update root: [`UpdateManager::check`] resolves which
//! artifacts this installation needs (incremental patch chain or full
//! archive), [`UpdateManager::download_async`] retrieves and reconciles
//! them into a staging directory while streaming progress over a channel,
//! and [`UpdateManager::install`] hands the staged tree to the standalone
//! helper process that performs the swap after the application exits.
//!
//! ```ignore
//! use update_core::Version;
//! use update_manager::{HttpSource, UpdateConfig, UpdateManager, UpdateState};
//!
//! # async fn demo() -> update_manager::Result<()> {
//! let source = HttpSource::new("https://updates.example.com/app/".parse().unwrap());
//! let config = UpdateConfig::new("/opt/app", Version::new(1, 0, 0, 0));
//! let (manager, mut events) = UpdateManager::new(source, config);
//!
//! if manager.check().await == UpdateState::UpdateAvailable {
//!     manager.download_async();
//!     while let Some(event) = events.recv().await {
//!         // Progress(pct) updates, then Finished(UpdateReady | Error).
//!     }
//!     manager.install(Some("app")).await;
//!     // Exit promptly; the helper waits at most ten seconds.
//! }
//! # Ok(())
//! # }
//! ```

mod cmdline;
mod error;
mod events;
mod manager;
mod platform;
mod source;
mod state;

pub use cmdline::QuoteStyle;
pub use error::{ManagerError, Result};
pub use events::{EventReceiver, UpdateEvent};
pub use manager::{UpdateConfig, UpdateManager};
pub use platform::Platform;
pub use source::{DirSource, HttpSource, UpdateSource};
pub use state::{UpdatePlan, UpdateState};
