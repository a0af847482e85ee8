//! Wire-level data model shared by both transports, the poller, and the callback receiver.
//!
//! JSON field names follow the service's snake_case encoding; the RPC transport converts to
//! and from these types at its boundary.

pub mod category;
pub mod dataset;
pub mod query;

pub use category::*;
pub use dataset::*;
pub use query::*;

// self
use crate::_prelude::*;

/// Status attached by the service to a request, a dataset, or a reply entry.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
	/// Numeric status code (gRPC code space).
	#[serde(default)]
	pub code: i32,
	/// Human-readable message.
	#[serde(default)]
	pub message: String,
}
impl Status {
	/// Builds a status.
	pub fn new(code: i32, message: impl Into<String>) -> Self {
		Self { code, message: message.into() }
	}
}
impl Display for Status {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "{} ({})", self.message, self.code)
	}
}
impl From<Status> for Error {
	fn from(status: Status) -> Self {
		Self::Service { code: status.code, message: status.message }
	}
}
