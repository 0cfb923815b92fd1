//! Token endpoint grant types.

// self
use crate::_prelude::*;

/// Token endpoint grants used by the credential flows.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantType {
	/// App-only grant used by the client-secret and client-certificate flows.
	ClientCredentials,
	/// Refresh token grant shared by every flow that received a refresh token.
	RefreshToken,
	/// Device authorization grant polled by the device-code flow.
	DeviceCode,
}
impl GrantType {
	/// Returns the `grant_type` form value the directory expects.
	pub fn as_str(self) -> &'static str {
		match self {
			GrantType::ClientCredentials => "client_credentials",
			GrantType::RefreshToken => "refresh_token",
			GrantType::DeviceCode => "device_code",
		}
	}
}
impl Display for GrantType {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
