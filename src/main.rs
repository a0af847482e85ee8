//! `zvelo` executable.

// std
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
	zvelo_client::cli::run().await
}
