// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use anyhow::Context;
use nix::sys::socket::UnixAddr;
use std::path::Path;

/// Builds the unix socket address the daemon listens on and clients connect to.
///
/// Names starting with `.` or `/` are filesystem paths. Anything else lives in the Linux abstract
/// namespace, which needs no cleanup and no writable directory.
pub fn resolve_socket_address(socket_name: &str) -> anyhow::Result<UnixAddr> {
    anyhow::ensure!(!socket_name.is_empty(), "No socket name provided");
    if is_path_name(socket_name) {
        UnixAddr::new(Path::new(socket_name))
            .with_context(|| format!("Invalid socket path {socket_name:?}"))
    } else {
        UnixAddr::new_abstract(socket_name.as_bytes())
            .with_context(|| format!("Invalid abstract socket name {socket_name:?}"))
    }
}

pub(crate) fn is_path_name(socket_name: &str) -> bool {
    socket_name.starts_with(['.', '/'])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn abstract_name() {
        let addr = resolve_socket_address("crash-daemon-test").unwrap();
        assert_eq!(addr.as_abstract(), Some(&b"crash-daemon-test"[..]));
        assert!(addr.path().is_none());
    }

    #[test]
    fn path_name() {
        let addr = resolve_socket_address("/tmp/crash-daemon.sock").unwrap();
        assert_eq!(addr.path(), Some(Path::new("/tmp/crash-daemon.sock")));
        let addr = resolve_socket_address("./crash-daemon.sock").unwrap();
        assert_eq!(addr.path(), Some(Path::new("./crash-daemon.sock")));
    }

    #[test]
    fn empty_name_is_rejected() {
        assert!(resolve_socket_address("").is_err());
    }

    #[test]
    fn overlong_name_is_rejected() {
        let name = "x".repeat(200);
        assert!(resolve_socket_address(&name).is_err());
    }
}
