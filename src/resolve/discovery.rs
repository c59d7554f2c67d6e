// src/resolve/discovery.rs

//! Dynamic IP discovery from log artifacts.
//!
//! Log filenames embed hyphen-delimited IPv4 addresses
//! (`AP01m_192-168-0-11_162.fbc`). When the inventory omits a node's
//! address, a scan of the log tree can recover it from artifacts written by
//! earlier sessions: every matching name yields a `(node, ip)` candidate,
//! and tokens that still carry the sentinel address are repaired in place.

use std::fs;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, info};

use crate::errors::Result;
use crate::logwriter::parse_log_filename;
use crate::resolve::resolver::TokenResolver;

/// Hyphen-delimited IPv4 embedded in a file or directory name.
static IP_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\d{1,3}-\d{1,3}-\d{1,3}-\d{1,3}")
        .expect("static IP pattern must compile")
});

/// Recursively scan `log_root` and repair unset token addresses.
///
/// Returns the number of tokens updated. Already-addressed tokens are left
/// untouched; names that do not map to a configured node are ignored.
pub fn scan_for_dynamic_ips(resolver: &TokenResolver, log_root: &Path) -> Result<usize> {
    let mut updated = 0;

    if !log_root.is_dir() {
        debug!(root = %log_root.display(), "log root missing; nothing to scan");
        return Ok(0);
    }

    scan_dir(resolver, log_root, &mut updated)?;

    if updated > 0 {
        info!(updated, root = %log_root.display(), "dynamic IP discovery updated tokens");
    }
    Ok(updated)
}

fn scan_dir(resolver: &TokenResolver, dir: &Path, updated: &mut usize) -> Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();

        let name = entry.file_name();
        let name = name.to_string_lossy();

        if let Some((node, ip)) = extract_candidate(&name, &path) {
            *updated += resolver.assign_discovered_ip(&node, &ip);
        }

        if path.is_dir() {
            scan_dir(resolver, &path, updated)?;
        }
    }
    Ok(())
}

/// Extract a `(node, ip)` candidate from one file or directory name.
///
/// Token log filenames carry the node name, underscores included, so they
/// are parsed with the same routine that names them. Other names (bare
/// directories, partial matches) take everything before the embedded IP,
/// falling back to the parent directory — log files live under
/// `{root}/{PROTOCOL}/{node}/`.
fn extract_candidate(name: &str, path: &Path) -> Option<(String, String)> {
    let m = IP_PATTERN.find(name)?;
    let ip = m.as_str().replace('-', ".");

    let node = match parse_log_filename(name) {
        Some(parsed) => parsed.node,
        None => {
            let prefix = name[..m.start()].trim_end_matches('_');
            if prefix.is_empty() {
                path.parent()
                    .and_then(|p| p.file_name())
                    .map(|n| n.to_string_lossy().into_owned())?
            } else {
                prefix.to_string()
            }
        }
    };

    debug!(node = %node, ip = %ip, name = %name, "log artifact yields address candidate");
    Some((node, ip))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Node, Protocol, Token};

    fn unaddressed_node(name: &str) -> Node {
        Node {
            name: name.to_string(),
            ip: String::new(),
            tokens: vec![Token {
                id: "162".to_string(),
                kind: Protocol::Fbc,
                node: name.to_string(),
                ip: String::new(),
                port: 23,
                transport: "telnet".to_string(),
            }],
        }
    }

    #[test]
    fn scan_repairs_unset_token_address() {
        let resolver = TokenResolver::from_nodes(vec![unaddressed_node("AP01m")]);

        let root = tempfile::tempdir().expect("tempdir");
        let dir = root.path().join("FBC").join("AP01m");
        fs::create_dir_all(&dir).expect("create log dirs");
        fs::write(dir.join("AP01m_192-168-0-11_162.fbc"), b"").expect("touch artifact");

        let updated = scan_for_dynamic_ips(&resolver, root.path()).expect("scan");
        assert_eq!(updated, 1);

        let token = resolver
            .resolve("AP01m", "162", Protocol::Fbc)
            .expect("node exists");
        assert_eq!(token.ip, "192.168.0.11");
    }

    #[test]
    fn scan_leaves_addressed_tokens_untouched() {
        let mut node = unaddressed_node("AP01m");
        node.ip = "10.0.0.9".to_string();
        node.tokens[0].ip = "10.0.0.9".to_string();
        let resolver = TokenResolver::from_nodes(vec![node]);

        let root = tempfile::tempdir().expect("tempdir");
        let dir = root.path().join("FBC").join("AP01m");
        fs::create_dir_all(&dir).expect("create log dirs");
        fs::write(dir.join("AP01m_192-168-0-11_162.fbc"), b"").expect("touch artifact");

        let updated = scan_for_dynamic_ips(&resolver, root.path()).expect("scan");
        assert_eq!(updated, 0);

        let token = resolver
            .resolve("AP01m", "162", Protocol::Fbc)
            .expect("node exists");
        assert_eq!(token.ip, "10.0.0.9");
    }

    #[test]
    fn underscored_node_names_survive_filename_parsing() {
        let resolver = TokenResolver::from_nodes(vec![unaddressed_node("AP_01_m")]);

        // The artifact sits at the root, so only the filename itself can
        // identify the node.
        let root = tempfile::tempdir().expect("tempdir");
        fs::write(root.path().join("AP_01_m_192-168-0-11_162.fbc"), b"")
            .expect("touch artifact");

        let updated = scan_for_dynamic_ips(&resolver, root.path()).expect("scan");
        assert_eq!(updated, 1);

        let token = resolver
            .resolve("AP_01_m", "162", Protocol::Fbc)
            .expect("node exists");
        assert_eq!(token.ip, "192.168.0.11");
    }

    #[test]
    fn unknown_node_names_are_ignored() {
        let resolver = TokenResolver::from_nodes(vec![unaddressed_node("AP01m")]);

        let root = tempfile::tempdir().expect("tempdir");
        fs::write(root.path().join("OTHER_10-0-0-1_001.fbc"), b"").expect("touch artifact");

        let updated = scan_for_dynamic_ips(&resolver, root.path()).expect("scan");
        assert_eq!(updated, 0);
    }

    #[test]
    fn missing_root_is_not_an_error() {
        let resolver = TokenResolver::from_nodes(vec![unaddressed_node("AP01m")]);
        let updated =
            scan_for_dynamic_ips(&resolver, Path::new("/nonexistent/logroot")).expect("scan");
        assert_eq!(updated, 0);
    }
}
