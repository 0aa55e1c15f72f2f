//! Kiln State Management
//!
//! Persists the state of managed resources between runs, guarded by a lock
//! so only one apply works on a state at a time.
//!
//! - **StateFile**: all managed resources with their identifiers and attributes
//! - **StateBackend**: storage for the state file (currently a local JSON file)
//! - **LockInfo**: who holds the state lock and until when
//!
//! # Example
//!
//! ```ignore
//! use kiln_state::create_backend;
//!
//! let backend = create_backend(config.backend.as_ref())?;
//! let lock = backend.acquire_lock("apply").await?;
//! let mut state = backend.read_state().await?.unwrap_or_default();
//!
//! // ... apply changes ...
//!
//! state.increment_serial();
//! backend.write_state(&state).await?;
//! backend.release_lock(&lock).await?;
//! ```

pub mod backend;
pub mod backends;
pub mod lock;
pub mod state;

pub use backend::{BackendError, BackendResult, StateBackend};
pub use backends::{LocalBackend, create_backend};
pub use lock::LockInfo;
pub use state::{ResourceState, StateFile};
