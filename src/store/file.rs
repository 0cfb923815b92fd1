//! JSON token cache on disk with atomic replacement and restricted permissions.
//!
//! A save writes to a temporary file in the target directory, created with the final
//! permission bits, then renames it over the destination. Readers see either the previous
//! complete file or the new one.

// std
use std::{fs, io::Write};
// self
use crate::{
	_prelude::*,
	auth::Token,
	store::{StoreError, TokenStore},
};

/// Permission bits applied to token files (owner read/write).
pub const DEFAULT_TOKEN_FILE_MODE: u32 = 0o600;

/// Atomically writes `token` to `path` as JSON, creating parent directories.
///
/// `mode` is applied on Unix when the temporary file is created; other platforms ignore it.
pub fn save_token(path: impl AsRef<Path>, mode: u32, token: &Token) -> Result<(), StoreError> {
	let path = path.as_ref();
	let location = path.display().to_string();
	let io_error = |err: std::io::Error| StoreError::Io {
		location: location.clone(),
		message: err.to_string(),
	};
	let serialized = serde_json::to_vec_pretty(token)
		.map_err(|e| StoreError::Serialization { message: e.to_string() })?;
	let dir = match path.parent().filter(|p| !p.as_os_str().is_empty()) {
		Some(parent) => parent,
		None => Path::new("."),
	};

	fs::create_dir_all(dir).map_err(io_error)?;

	let mut builder = tempfile::Builder::new();

	builder.prefix(".adal-token").suffix(".tmp");

	#[cfg(unix)]
	{
		use std::os::unix::fs::PermissionsExt;

		builder.permissions(fs::Permissions::from_mode(mode));
	}
	#[cfg(not(unix))]
	let _ = mode;

	let mut tmp = builder.tempfile_in(dir).map_err(io_error)?;

	tmp.write_all(&serialized).map_err(io_error)?;
	tmp.as_file().sync_all().map_err(io_error)?;
	tmp.persist(path).map_err(|err| io_error(err.error))?;

	Ok(())
}

/// Reads the token stored at `path`.
///
/// A missing file yields [`StoreError::NotFound`]; unparsable content, trailing bytes, or an
/// empty access token yield [`StoreError::Corrupt`].
pub fn load_token(path: impl AsRef<Path>) -> Result<Token, StoreError> {
	let path = path.as_ref();
	let location = path.display().to_string();
	let bytes = match fs::read(path) {
		Ok(bytes) => bytes,
		Err(e) if e.kind() == std::io::ErrorKind::NotFound =>
			return Err(StoreError::NotFound { location }),
		Err(e) => return Err(StoreError::Io { location, message: e.to_string() }),
	};
	let mut deserializer = serde_json::Deserializer::from_slice(&bytes);
	let token = serde_path_to_error::deserialize::<_, Token>(&mut deserializer)
		.map_err(|e| StoreError::Corrupt { location: location.clone(), message: e.to_string() })?;

	deserializer
		.end()
		.map_err(|e| StoreError::Corrupt { location, message: e.to_string() })?;

	Ok(token)
}

/// [`TokenStore`] backed by a single JSON file.
#[derive(Clone, Debug)]
pub struct FileStore {
	path: PathBuf,
	mode: u32,
}
impl FileStore {
	/// Targets `path` with [`DEFAULT_TOKEN_FILE_MODE`].
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into(), mode: DEFAULT_TOKEN_FILE_MODE }
	}

	/// Overrides the permission bits used for new files.
	pub fn with_mode(mut self, mode: u32) -> Self {
		self.mode = mode;

		self
	}

	/// Destination path.
	pub fn path(&self) -> &Path {
		&self.path
	}
}
impl TokenStore for FileStore {
	fn save(&self, token: &Token) -> Result<(), StoreError> {
		save_token(&self.path, self.mode, token)
	}

	fn load(&self) -> Result<Token, StoreError> {
		load_token(&self.path)
	}
}
