//! Acquire, refresh, and persist directory service-principal tokens through device-code,
//! client-secret, or client-certificate flows behind one token lifecycle.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod credential;
pub mod directory;
pub mod error;
pub mod flows;
pub mod http;
pub mod oauth;
pub mod obs;
pub mod principal;
pub mod provider;
pub mod store;

mod _prelude {
	pub use std::{
		collections::BTreeMap,
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		path::{Path, PathBuf},
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use parking_lot::{Mutex, RwLock};
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use tokio_util::sync::CancellationToken;
	pub use url::Url;

	pub use crate::error::{BoxError, Error, Result};
}

pub use reqwest;
pub use tokio_util;
pub use url;
#[cfg(feature = "cli")] use {clap as _, color_eyre as _, dirs as _, tracing_subscriber as _};
#[cfg(test)] use httpmock as _;
#[cfg(all(test, not(feature = "cli")))] use color_eyre as _;
