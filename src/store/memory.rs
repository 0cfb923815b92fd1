//! Thread-safe in-memory [`TokenStore`] for tests and embedding hosts.

// self
use crate::{
	_prelude::*,
	auth::Token,
	store::{StoreError, TokenStore},
};

/// Keeps the last saved token in process memory.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore(Arc<RwLock<Option<Token>>>);
impl MemoryStore {
	/// Returns the stored token without treating absence as an error.
	pub fn get(&self) -> Option<Token> {
		self.0.read().clone()
	}
}
impl TokenStore for MemoryStore {
	fn save(&self, token: &Token) -> Result<(), StoreError> {
		*self.0.write() = Some(token.clone());

		Ok(())
	}

	fn load(&self) -> Result<Token, StoreError> {
		self.get().ok_or_else(|| StoreError::NotFound { location: "memory".into() })
	}
}
