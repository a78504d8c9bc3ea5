//! Startup configuration: listen address and invite discovery
//!
//! The invite code comes from the CLI flag when given, otherwise from the
//! `REALM_INVITE` environment variable, otherwise from a `.realm-invite`
//! file next to the deployment or in the working directory.

use std::path::PathBuf;

use anyhow::anyhow;

/// Default bind address of the local listener.
pub const DEFAULT_LISTEN_ADDR: &str = ":19132";

/// Environment variable carrying the invite code.
pub const INVITE_ENV: &str = "REALM_INVITE";

/// Name of the invite file searched on disk.
pub const INVITE_FILE: &str = ".realm-invite";

/// Resolve the realm invite code: flag, then environment, then files.
pub fn find_realm_invite(cli_override: Option<&str>) -> anyhow::Result<String> {
    if let Some(code) = cli_override {
        if !code.trim().is_empty() {
            return Ok(code.trim().to_string());
        }
    }

    if let Ok(code) = std::env::var(INVITE_ENV) {
        if !code.trim().is_empty() {
            return Ok(code.trim().to_string());
        }
    }

    for path in invite_file_candidates() {
        if let Some(code) = read_invite_file(&path) {
            return Ok(code);
        }
    }

    Err(anyhow!(
        "no realm invite found; set {INVITE_ENV} or create a {INVITE_FILE} file"
    ))
}

/// Places the invite file may live: one directory above the executable's
/// directory, then the working directory.
fn invite_file_candidates() -> Vec<PathBuf> {
    let mut candidates = Vec::new();
    if let Ok(exe) = std::env::current_exe() {
        if let Some(dir) = exe.parent().and_then(|d| d.parent()) {
            candidates.push(dir.join(INVITE_FILE));
        }
    }
    candidates.push(PathBuf::from(INVITE_FILE));
    candidates
}

/// Read and trim one invite file; empty or unreadable files yield nothing.
fn read_invite_file(path: &std::path::Path) -> Option<String> {
    let contents = std::fs::read_to_string(path).ok()?;
    let code = contents.trim();
    if code.is_empty() {
        None
    } else {
        Some(code.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    #[test]
    fn test_cli_override_wins() {
        let code = find_realm_invite(Some("  ABC123  ")).unwrap();
        assert_eq!(code, "ABC123");
    }

    #[test]
    fn test_read_invite_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "  XYZ789  ").unwrap();
        assert_eq!(read_invite_file(file.path()), Some("XYZ789".to_string()));
    }

    #[test]
    fn test_read_invite_file_empty() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "   ").unwrap();
        assert_eq!(read_invite_file(file.path()), None);
    }

    #[test]
    fn test_read_invite_file_missing() {
        assert_eq!(
            read_invite_file(std::path::Path::new("/nonexistent/.realm-invite")),
            None
        );
    }
}
