// Interface statistics collection

//! Live peer statistics collection from the tunnel interface
//!
//! Invokes `wg show <interface> dump` through the command runner and parses
//! the tabular output into per-identity records. The dump format is one
//! header line followed by one whitespace/tab-delimited record per peer:
//! `pubkey  psk-flag  endpoint  allowed-ips  latest-handshake  rx  tx [...]`.
//! Parsing is best-effort: the header and malformed lines are filtered by
//! the pubkey shape check instead of raising, numeric fields degrade to
//! defaults, and records for unregistered pubkeys are dropped with a warning.

use crate::config::validate_name;
use crate::registry::IdentityRegistry;
use crate::runner::CommandRunner;
use crate::types::{DumpRecord, Endpoint, PeerStats};
use anyhow::Result;
use std::collections::HashMap;
use std::sync::Arc;

/// Minimum token length before a token is plausibly a public key
const MIN_PUBKEY_LEN: usize = 20;

/// True when `token` plausibly is base64 key material: alphanumeric plus
/// `+/=`, at least [`MIN_PUBKEY_LEN`] characters. Filters the dump header
/// and garbage lines without erroring.
pub fn looks_like_pubkey(token: &str) -> bool {
    token.len() >= MIN_PUBKEY_LEN
        && token
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '+' || c == '/' || c == '=')
}

/// Normalize one endpoint token from the dump.
///
/// `"(none)"`, `"none"` and `"-"` mean no handshake has occurred yet.
/// Bracketed IPv6 `[host]:port` keeps the host unbracketed; `host:port`
/// splits on its colon when the port segment is numeric. A token with
/// multiple colons and no brackets is a bare IPv6 address and is kept
/// whole as the host, as is one with a non-numeric port segment.
pub fn parse_endpoint(token: &str) -> Option<Endpoint> {
    match token {
        "(none)" | "none" | "-" => return None,
        _ => {}
    }

    if let Some(rest) = token.strip_prefix('[') {
        if let Some((host, port)) = rest.split_once("]:") {
            return Some(Endpoint {
                host: host.to_string(),
                port: port.parse().ok(),
            });
        }
    }

    if let Some(idx) = token.rfind(':') {
        // More than one colon without brackets is a bare IPv6 address,
        // not host:port
        if !token[..idx].contains(':') {
            if let Ok(port) = token[idx + 1..].parse::<u16>() {
                return Some(Endpoint {
                    host: token[..idx].to_string(),
                    port: Some(port),
                });
            }
        }
    }

    Some(Endpoint {
        host: token.to_string(),
        port: None,
    })
}

/// Parse one dump line into a record; None for the header or malformed lines
fn parse_dump_line(line: &str) -> Option<DumpRecord> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    let pubkey = *fields.first()?;
    if !looks_like_pubkey(pubkey) {
        return None;
    }

    // Positional, tolerant of missing trailing columns. A handshake epoch
    // of 0 means none has occurred yet.
    let latest_handshake = fields
        .get(4)
        .and_then(|t| t.parse::<u64>().ok())
        .filter(|&ts| ts != 0);

    Some(DumpRecord {
        pubkey: pubkey.to_string(),
        endpoint: fields.get(2).and_then(|t| parse_endpoint(t)),
        allowed_ips: fields.get(3).unwrap_or(&"").to_string(),
        latest_handshake,
        received: fields.get(5).and_then(|t| t.parse().ok()).unwrap_or(0),
        sent: fields.get(6).and_then(|t| t.parse().ok()).unwrap_or(0),
    })
}

/// Parse a full dump into records, skipping the header and malformed lines
pub fn parse_dump(output: &str) -> Vec<DumpRecord> {
    output.lines().filter_map(parse_dump_line).collect()
}

/// Collects live per-peer statistics joined against the identity registry
pub struct StatsCollector {
    interface: String,
    registry: IdentityRegistry,
    runner: Arc<dyn CommandRunner>,
}

impl StatsCollector {
    /// Create a collector for the named interface
    pub fn new(
        interface: String,
        registry: IdentityRegistry,
        runner: Arc<dyn CommandRunner>,
    ) -> Result<Self> {
        validate_name(&interface, "Interface name")?;
        Ok(Self {
            interface,
            registry,
            runner,
        })
    }

    /// Dump live peer statistics and resolve each record's pubkey to its
    /// identity. Records are rebuilt fresh on every call, never cached.
    /// Records whose pubkey has no registered owner are dropped and logged.
    pub async fn collect(&self) -> Result<HashMap<String, PeerStats>> {
        let out = self
            .runner
            .run("wg", &["show", &self.interface, "dump"])
            .await?;

        if !out.success() {
            return Err(crate::error::GatewayError::ToolInvocation {
                tool: "wg".to_string(),
                message: out.failure_text().to_string(),
            }
            .into());
        }

        let by_pubkey = self.registry.identities_by_pubkey()?;

        let mut gathered = HashMap::new();
        for record in parse_dump(&out.stdout) {
            match by_pubkey.get(&record.pubkey) {
                Some(identity) => {
                    gathered.insert(identity.clone(), PeerStats::from(record));
                }
                None => {
                    log::warn!(
                        "Dropping stats record for unregistered pubkey {}",
                        record.pubkey
                    );
                }
            }
        }

        Ok(gathered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::fake::FakeRunner;

    const PK_ALICE: &str = "AliceAliceAliceAliceAlice+abc/def=";
    const PK_BOB: &str = "BobBobBobBobBobBobBob+ghi/jkl=";

    #[test]
    fn test_looks_like_pubkey() {
        assert!(looks_like_pubkey(PK_ALICE));
        assert!(looks_like_pubkey(&"A".repeat(20)));
        assert!(!looks_like_pubkey("short"));
        assert!(!looks_like_pubkey("private-key")); // header word, too short
        assert!(!looks_like_pubkey(&"key with space".repeat(3)));
    }

    #[test]
    fn test_parse_endpoint_ipv4() {
        let ep = parse_endpoint("192.0.2.1:51820").unwrap();
        assert_eq!(ep.host, "192.0.2.1");
        assert_eq!(ep.port, Some(51820));
    }

    #[test]
    fn test_parse_endpoint_ipv6_bracketed() {
        let ep = parse_endpoint("[2001:db8::1]:51820").unwrap();
        assert_eq!(ep.host, "2001:db8::1");
        assert_eq!(ep.port, Some(51820));
    }

    #[test]
    fn test_parse_endpoint_absent() {
        assert_eq!(parse_endpoint("(none)"), None);
        assert_eq!(parse_endpoint("none"), None);
        assert_eq!(parse_endpoint("-"), None);
    }

    #[test]
    fn test_parse_endpoint_bare_host() {
        let ep = parse_endpoint("vpn.example.org").unwrap();
        assert_eq!(ep.host, "vpn.example.org");
        assert_eq!(ep.port, None);
    }

    #[test]
    fn test_parse_endpoint_bare_ipv6_kept_whole() {
        // Unbracketed IPv6 must not be split at its last colon, even when
        // the final group happens to parse as a port number
        let ep = parse_endpoint("2001:db8::1").unwrap();
        assert_eq!(ep.host, "2001:db8::1");
        assert_eq!(ep.port, None);

        let ep = parse_endpoint("fe80::1:443").unwrap();
        assert_eq!(ep.host, "fe80::1:443");
        assert_eq!(ep.port, None);
    }

    #[test]
    fn test_parse_endpoint_nonnumeric_port_kept_whole() {
        let ep = parse_endpoint("host:notaport").unwrap();
        assert_eq!(ep.host, "host:notaport");
        assert_eq!(ep.port, None);
    }

    #[test]
    fn test_parse_dump_filters_header_and_garbage() {
        let dump = format!(
            "private-key\tpublic-key\tlisten-port\tfwmark\n\
             {pk}\t(none)\t192.0.2.1:51820\t10.8.0.2/32\t1700000000\t1024\t2048\n\
             garbage line that is not a record\n\
             {pk2}\t(none)\t(none)\t10.8.0.3/32\t0\t0\t0\n",
            pk = PK_ALICE,
            pk2 = PK_BOB,
        );

        let records = parse_dump(&dump);
        assert_eq!(records.len(), 2);

        assert_eq!(records[0].pubkey, PK_ALICE);
        assert_eq!(records[0].latest_handshake, Some(1_700_000_000));
        assert_eq!(records[0].received, 1024);
        assert_eq!(records[0].sent, 2048);

        // Zero handshake means none has occurred yet
        assert_eq!(records[1].latest_handshake, None);
        assert_eq!(records[1].endpoint, None);
    }

    #[test]
    fn test_parse_dump_malformed_numerics_default() {
        let dump = format!("{}\t(none)\t(none)\t10.8.0.2/32\tnever\tlots\tmany\n", PK_ALICE);
        let records = parse_dump(&dump);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].latest_handshake, None);
        assert_eq!(records[0].received, 0);
        assert_eq!(records[0].sent, 0);
    }

    #[test]
    fn test_parse_dump_missing_trailing_columns() {
        let dump = format!("{}\t(none)\t192.0.2.9:51820\n", PK_ALICE);
        let records = parse_dump(&dump);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].allowed_ips, "");
        assert_eq!(records[0].received, 0);
    }

    #[tokio::test]
    async fn test_collect_resolves_identities_and_drops_orphans() {
        let dir = tempfile::tempdir().unwrap();
        let registry = IdentityRegistry::open(dir.path().to_path_buf()).unwrap();
        registry.register("alice", PK_ALICE).unwrap();

        let runner = Arc::new(FakeRunner::new());
        runner.push(
            0,
            &format!(
                "private\tpublic\t51820\toff\n\
                 {pk}\t(none)\t192.0.2.1:51820\t10.8.0.2/32\t1700000000\t10\t20\n\
                 {orphan}\t(none)\t(none)\t10.8.0.3/32\t0\t0\t0\n",
                pk = PK_ALICE,
                orphan = PK_BOB,
            ),
            "",
        );

        let collector =
            StatsCollector::new("wg0".to_string(), registry, runner.clone()).unwrap();
        let stats = collector.collect().await.unwrap();

        // Orphan pubkey dropped, registered one resolved
        assert_eq!(stats.len(), 1);
        let alice = &stats["alice"];
        assert_eq!(alice.received, 10);
        assert_eq!(alice.sent, 20);
        assert_eq!(alice.endpoint.as_ref().unwrap().host, "192.0.2.1");

        assert_eq!(runner.calls()[0], vec!["wg", "show", "wg0", "dump"]);
    }

    #[tokio::test]
    async fn test_collect_surfaces_tool_failure() {
        let dir = tempfile::tempdir().unwrap();
        let registry = IdentityRegistry::open(dir.path().to_path_buf()).unwrap();

        let runner = Arc::new(FakeRunner::new());
        runner.push(1, "", "Unable to access interface: No such device");

        let collector = StatsCollector::new("wg0".to_string(), registry, runner).unwrap();
        let err = collector.collect().await.unwrap_err();
        assert!(err.to_string().contains("wg invocation failed"));
    }

    #[test]
    fn test_collector_rejects_unsafe_interface() {
        let dir = tempfile::tempdir().unwrap();
        let registry = IdentityRegistry::open(dir.path().to_path_buf()).unwrap();
        let runner = Arc::new(FakeRunner::new());
        assert!(StatsCollector::new("wg0; id".to_string(), registry, runner).is_err());
    }
}
