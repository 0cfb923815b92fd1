//! Token change notifications.

// self
use crate::{_prelude::*, auth::Token};

/// Observer invoked after every successful acquisition or refresh.
///
/// Callbacks run synchronously, in registration order, on the task that performed the
/// refresh. A failing callback stops the chain; the controller keeps the new token.
pub trait TokenCallback: Send + Sync {
	/// Receives the token that was just installed.
	fn on_token(&self, token: &Token) -> Result<(), BoxError>;
}
impl<F, E> TokenCallback for F
where
	F: Fn(&Token) -> Result<(), E> + Send + Sync,
	E: Into<BoxError>,
{
	fn on_token(&self, token: &Token) -> Result<(), BoxError> {
		self(token).map_err(Into::into)
	}
}
