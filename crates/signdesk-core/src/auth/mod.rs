//! Authentication: the session token codec, where the session is kept, and
//! the flows that write it.
//!
//! - `token`: decode claims and check expiry without verifying signatures
//! - `SessionStore`: the persisted token and user profile
//! - `StorageBackend`: file, keyring or in-memory persistence
//! - `Account`: login, logout and profile changes

pub mod account;
pub mod credentials;
pub mod session;
pub mod storage;
pub mod token;

pub use account::Account;
pub use credentials::KeyringStorage;
pub use session::{SessionStore, TOKEN_KEY, USER_KEY};
pub use storage::{FileStorage, MemoryStorage, StorageBackend};
