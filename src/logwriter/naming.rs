// src/logwriter/naming.rs

//! Log directory and filename layout.

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::resolve::normalize_token_id;
use crate::types::Token;

/// Dots are not filename-friendly on every target; IPs are embedded
/// hyphen-delimited and converted back by discovery.
pub fn ip_for_filename(ip: &str) -> String {
    ip.replace('.', "-")
}

/// Directory for a token's log file: `{root}/{PROTOCOL}/{node}/`.
pub fn token_dir(root: &Path, token: &Token) -> PathBuf {
    root.join(token.kind.dir_name()).join(&token.node)
}

/// Filename for a token's log file: `{node}_{ip}_{id}.{protocol}` with the
/// id normalized per protocol rules.
pub fn token_filename(token: &Token) -> String {
    format!(
        "{}_{}_{}.{}",
        token.node,
        ip_for_filename(&token.ip),
        normalize_token_id(&token.id, token.kind),
        token.kind.lowercase()
    )
}

/// Full path for a token's log file.
pub fn token_log_path(root: &Path, token: &Token) -> PathBuf {
    token_dir(root, token).join(token_filename(token))
}

/// Full path for a batch-level log: `{root}/{node}/{node}_{timestamp}_LOG.log`.
///
/// The timestamp is nanosecond-resolution so back-to-back batches for the
/// same node never share a file.
pub fn batch_log_path(root: &Path, node: &str) -> PathBuf {
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    root.join(node).join(format!("{node}_{timestamp}_LOG.log"))
}

/// Pieces of a `{node}_{ip}_{id}.{ext}` log filename.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedLogName {
    pub node: String,
    /// Dotted form, converted back from the hyphen-delimited embedding.
    pub ip: String,
    pub token_id: String,
    pub extension: String,
}

/// Parse a token log filename. Node names may contain underscores, so the
/// ip and id are taken from the right.
pub fn parse_log_filename(name: &str) -> Option<ParsedLogName> {
    let (stem, extension) = name.rsplit_once('.')?;

    let mut parts = stem.rsplitn(3, '_');
    let token_id = parts.next()?;
    let ip_hyphen = parts.next()?;
    let node = parts.next()?;

    if node.is_empty() || token_id.is_empty() {
        return None;
    }

    Some(ParsedLogName {
        node: node.to_string(),
        ip: ip_hyphen.replace('-', "."),
        token_id: token_id.to_string(),
        extension: extension.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Protocol;

    fn token() -> Token {
        Token {
            id: "162".to_string(),
            kind: Protocol::Fbc,
            node: "AP01m".to_string(),
            ip: "192.168.0.11".to_string(),
            port: 23,
            transport: "telnet".to_string(),
        }
    }

    #[test]
    fn filename_embeds_hyphenated_ip_and_normalized_id() {
        assert_eq!(token_filename(&token()), "AP01m_192-168-0-11_162.fbc");

        let mut short = token();
        short.id = "7".to_string();
        assert_eq!(token_filename(&short), "AP01m_192-168-0-11_007.fbc");
    }

    #[test]
    fn path_follows_protocol_node_layout() {
        let path = token_log_path(Path::new("/logs"), &token());
        assert_eq!(
            path,
            Path::new("/logs/FBC/AP01m/AP01m_192-168-0-11_162.fbc")
        );
    }

    #[test]
    fn parse_roundtrips_filename() {
        let parsed = parse_log_filename("AP01m_192-168-0-11_162.fbc").expect("parses");
        assert_eq!(parsed.node, "AP01m");
        assert_eq!(parsed.ip, "192.168.0.11");
        assert_eq!(parsed.token_id, "162");
        assert_eq!(parsed.extension, "fbc");
    }

    #[test]
    fn parse_keeps_underscored_node_names_intact() {
        let parsed = parse_log_filename("AP_01_m_10-0-0-1_007.rpc").expect("parses");
        assert_eq!(parsed.node, "AP_01_m");
        assert_eq!(parsed.ip, "10.0.0.1");
        assert_eq!(parsed.token_id, "007");
    }

    #[test]
    fn parse_rejects_garbage() {
        assert_eq!(parse_log_filename("not-a-log"), None);
        assert_eq!(parse_log_filename("onlynode.fbc"), None);
    }
}
