//! Test helpers shared across server modules.

use rstest::fixture;
use tempfile::TempDir;

use super::{Bound, RunnerServer};
use crate::{
    address::{LocalAddress, resolve},
    codec::RunnerFrameCodec,
};

/// Fresh directory to hold one test's socket files.
#[fixture]
pub fn socket_dir() -> TempDir { tempfile::tempdir().expect("create socket dir") }

/// Address of `runner.sock` inside `dir`, resolved through the `unix:` form.
pub fn socket_address(dir: &TempDir) -> LocalAddress {
    let configured = format!("unix:{}", dir.path().join("runner.sock").display());
    resolve(&configured).expect("valid socket address")
}

/// Bind a default server at `address`.
pub fn bind_server(address: &LocalAddress) -> RunnerServer<RunnerFrameCodec, Bound> {
    RunnerServer::new(RunnerFrameCodec::default())
        .bind(address)
        .expect("failed to bind")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn socket_address_is_inside_dir() {
        let dir = socket_dir();
        let address = socket_address(&dir);
        assert!(address.path().starts_with(dir.path()));
        assert!(!address.path().exists());
    }
}
