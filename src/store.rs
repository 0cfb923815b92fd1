//! Token persistence: the store contract, the file and memory backends, and the callback
//! adapter that saves every new token.

pub mod file;
pub mod memory;

pub use file::{DEFAULT_TOKEN_FILE_MODE, FileStore, load_token, save_token};
pub use memory::MemoryStore;

// self
use crate::{_prelude::*, auth::Token, principal::TokenCallback};

/// Storage backend contract for a single token.
pub trait TokenStore
where
	Self: Send + Sync,
{
	/// Persists `token`, replacing whatever was stored.
	fn save(&self, token: &Token) -> Result<(), StoreError>;

	/// Loads the stored token.
	fn load(&self) -> Result<Token, StoreError>;
}
impl<S> TokenStore for Arc<S>
where
	S: ?Sized + TokenStore,
{
	fn save(&self, token: &Token) -> Result<(), StoreError> {
		(**self).save(token)
	}

	fn load(&self) -> Result<Token, StoreError> {
		(**self).load()
	}
}

/// Error type produced by [`TokenStore`] implementations and the file helpers.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum StoreError {
	/// Nothing has been stored at the location yet.
	#[error("No token is stored at {location}.")]
	NotFound {
		/// File path or backend label.
		location: String,
	},
	/// Stored content is not a valid token.
	#[error("Stored token at {location} is corrupt: {message}.")]
	Corrupt {
		/// File path or backend label.
		location: String,
		/// Parser failure description.
		message: String,
	},
	/// Token could not be serialized.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Filesystem failure.
	#[error("I/O failure at {location}: {message}.")]
	Io {
		/// File path or backend label.
		location: String,
		/// Human-readable error payload.
		message: String,
	},
}

/// Adapts a [`TokenStore`] into a [`TokenCallback`] that saves every new token.
#[derive(Clone, Debug)]
pub struct PersistToken<S>(pub S);
impl<S> TokenCallback for PersistToken<S>
where
	S: TokenStore,
{
	fn on_token(&self, token: &Token) -> Result<(), BoxError> {
		self.0.save(token).map_err(Into::into)
	}
}
