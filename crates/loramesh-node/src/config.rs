//! TOML configuration for nodes and the mesh simulator.
//!
//! Every field has a default, so an empty file is a valid configuration.
//! Raw serde sections are resolved into typed settings
//! ([`NodeSettings`], [`MediumConfig`]) before use.

use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use loramesh_core::NodeId;
use loramesh_core::constants::{ACK_TTL, DEFAULT_TTL};
use loramesh_interfaces::MediumConfig;
use loramesh_protocol::PreSharedKey;
use serde::Deserialize;

use crate::error::NodeError;

/// Top-level configuration file.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NodeConfig {
    #[serde(default)]
    pub node: NodeSection,
    #[serde(default)]
    pub logging: LoggingSection,
    #[serde(default)]
    pub medium: MediumSection,
    #[serde(default)]
    pub nodes: Vec<NodeEntry>,
    #[serde(default)]
    pub script: Vec<ScriptEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NodeSection {
    #[serde(default = "default_ttl")]
    pub default_ttl: u8,
    #[serde(default = "default_ack_ttl")]
    pub ack_ttl: u8,
    #[serde(default = "default_handshake_timeout_ms")]
    pub handshake_timeout_ms: u64,
    #[serde(default = "default_true")]
    pub require_session: bool,
    /// Base64 network key; the built-in key when absent.
    #[serde(default)]
    pub pre_shared_key: Option<String>,
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingSection {
    #[serde(default = "default_log_level")]
    pub level: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MediumSection {
    #[serde(default = "default_loss")]
    pub loss: f64,
    #[serde(default = "default_max_latency_ms")]
    pub max_latency_ms: u64,
    #[serde(default)]
    pub seed: Option<u64>,
    /// How long the simulator lets traffic drain after the script.
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,
}

/// A node attached to the simulated medium.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NodeEntry {
    pub id: u8,
    /// Nodes this one can hear. `None` means every other node.
    #[serde(default)]
    pub neighbors: Option<Vec<u8>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScriptKind {
    Chat,
    Cmd,
}

/// One scripted send performed by the simulator.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScriptEntry {
    pub from: u8,
    pub to: u8,
    #[serde(default = "default_script_kind")]
    pub kind: ScriptKind,
    pub text: String,
    #[serde(default)]
    pub private: bool,
    #[serde(default)]
    pub delay_ms: u64,
}

fn default_ttl() -> u8 {
    DEFAULT_TTL
}

fn default_ack_ttl() -> u8 {
    ACK_TTL
}

fn default_handshake_timeout_ms() -> u64 {
    2000
}

fn default_true() -> bool {
    true
}

fn default_event_buffer() -> usize {
    256
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_loss() -> f64 {
    0.1
}

fn default_max_latency_ms() -> u64 {
    100
}

fn default_settle_ms() -> u64 {
    2000
}

fn default_script_kind() -> ScriptKind {
    ScriptKind::Chat
}

impl Default for NodeSection {
    fn default() -> Self {
        Self {
            default_ttl: default_ttl(),
            ack_ttl: default_ack_ttl(),
            handshake_timeout_ms: default_handshake_timeout_ms(),
            require_session: true,
            pre_shared_key: None,
            event_buffer: default_event_buffer(),
        }
    }
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Default for MediumSection {
    fn default() -> Self {
        Self {
            loss: default_loss(),
            max_latency_ms: default_max_latency_ms(),
            seed: None,
            settle_ms: default_settle_ms(),
        }
    }
}

impl NodeConfig {
    /// Read and parse a configuration file.
    pub fn load(path: &Path) -> Result<Self, NodeError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, NodeError> {
        toml::from_str(content).map_err(|e| NodeError::Config(format!("failed to parse config: {e}")))
    }

    /// Cross-field checks that serde cannot express: unique node ids, and
    /// script entries and neighbor lists that only name configured nodes.
    pub fn validate(&self) -> Result<(), NodeError> {
        let mut ids = HashSet::new();
        for entry in &self.nodes {
            if !ids.insert(entry.id) {
                return Err(NodeError::Config(format!("duplicate node id {}", entry.id)));
            }
        }
        for entry in &self.nodes {
            for neighbor in entry.neighbors.iter().flatten() {
                if *neighbor == entry.id {
                    return Err(NodeError::Config(format!("node {} lists itself as a neighbor", entry.id)));
                }
                if !ids.contains(neighbor) {
                    return Err(NodeError::Config(format!(
                        "node {} lists unknown neighbor {neighbor}",
                        entry.id
                    )));
                }
            }
        }
        for (index, step) in self.script.iter().enumerate() {
            for id in [step.from, step.to] {
                if !ids.contains(&id) {
                    return Err(NodeError::Config(format!(
                        "script step {index} names unknown node {id}"
                    )));
                }
            }
        }
        self.node.settings()?;
        Ok(())
    }
}

/// Resolved per-node protocol settings.
#[derive(Debug, Clone)]
pub struct NodeSettings {
    pub default_ttl: u8,
    pub ack_ttl: u8,
    pub handshake_timeout: Duration,
    pub require_session: bool,
    pub pre_shared_key: PreSharedKey,
    pub event_buffer: usize,
}

impl Default for NodeSettings {
    fn default() -> Self {
        Self {
            default_ttl: DEFAULT_TTL,
            ack_ttl: ACK_TTL,
            handshake_timeout: Duration::from_millis(default_handshake_timeout_ms()),
            require_session: true,
            pre_shared_key: PreSharedKey::default(),
            event_buffer: default_event_buffer(),
        }
    }
}

impl NodeSection {
    /// Resolve into [`NodeSettings`], decoding the pre-shared key.
    pub fn settings(&self) -> Result<NodeSettings, NodeError> {
        let pre_shared_key = match &self.pre_shared_key {
            Some(encoded) => PreSharedKey::from_base64(encoded)?,
            None => PreSharedKey::default(),
        };
        Ok(NodeSettings {
            default_ttl: self.default_ttl,
            ack_ttl: self.ack_ttl,
            handshake_timeout: Duration::from_millis(self.handshake_timeout_ms),
            require_session: self.require_session,
            pre_shared_key,
            event_buffer: self.event_buffer.max(1),
        })
    }
}

impl MediumSection {
    pub fn medium_config(&self) -> MediumConfig {
        MediumConfig {
            loss: self.loss,
            max_latency: Duration::from_millis(self.max_latency_ms),
            seed: self.seed,
        }
    }

    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }
}

impl NodeEntry {
    pub fn node_id(&self) -> NodeId {
        NodeId::new(self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_minimal_config() {
        let config = NodeConfig::parse("").unwrap();
        assert_eq!(config.node.default_ttl, 5);
        assert_eq!(config.node.ack_ttl, 3);
        assert_eq!(config.node.handshake_timeout_ms, 2000);
        assert!(config.node.require_session);
        assert!(config.node.pre_shared_key.is_none());
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.medium.loss, 0.1);
        assert_eq!(config.medium.max_latency_ms, 100);
        assert!(config.nodes.is_empty());
        assert!(config.script.is_empty());
    }

    #[test]
    fn parse_full_config() {
        let toml = r#"
[node]
default_ttl = 4
ack_ttl = 2
handshake_timeout_ms = 500
require_session = false
pre_shared_key = "AAECAwQFBgcICQoLDA0ODxAREhMUFRYXGBkaGxwdHh8="
event_buffer = 16

[logging]
level = "debug"

[medium]
loss = 0.0
max_latency_ms = 0
seed = 42
settle_ms = 100

[[nodes]]
id = 1
neighbors = [2]

[[nodes]]
id = 2

[[script]]
from = 1
to = 2
text = "hello"
private = true
delay_ms = 10

[[script]]
from = 2
to = 1
kind = "cmd"
text = "PING"
"#;
        let config = NodeConfig::parse(toml).unwrap();
        assert_eq!(config.node.default_ttl, 4);
        assert!(!config.node.require_session);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.medium.seed, Some(42));
        assert_eq!(config.nodes.len(), 2);
        assert_eq!(config.nodes[0].neighbors.as_deref(), Some(&[2u8][..]));
        assert!(config.nodes[1].neighbors.is_none());
        assert_eq!(config.script[0].kind, ScriptKind::Chat);
        assert!(config.script[0].private);
        assert_eq!(config.script[1].kind, ScriptKind::Cmd);
        assert_eq!(config.script[1].delay_ms, 0);
        config.validate().unwrap();

        let settings = config.node.settings().unwrap();
        assert_eq!(settings.handshake_timeout, Duration::from_millis(500));
        let expected: [u8; 32] = core::array::from_fn(|i| i as u8);
        assert_eq!(settings.pre_shared_key.as_bytes(), &expected);

        let medium = config.medium.medium_config();
        assert_eq!(medium.loss, 0.0);
        assert_eq!(medium.max_latency, Duration::ZERO);
        assert_eq!(config.medium.settle(), Duration::from_millis(100));
    }

    #[test]
    fn test_default_settings_use_builtin_key() {
        let settings = NodeSection::default().settings().unwrap();
        assert_eq!(
            settings.pre_shared_key.as_bytes(),
            PreSharedKey::default().as_bytes()
        );
        assert_eq!(settings.default_ttl, DEFAULT_TTL);
        assert_eq!(settings.ack_ttl, ACK_TTL);
    }

    #[test]
    fn test_parse_malformed_toml() {
        assert!(NodeConfig::parse("[node").is_err());
        assert!(NodeConfig::parse("[node]\ndefault_ttl = ").is_err());
        assert!(NodeConfig::parse("= value").is_err());
    }

    #[test]
    fn test_parse_wrong_field_types() {
        assert!(NodeConfig::parse("[node]\nrequire_session = \"yes\"\n").is_err());
        assert!(NodeConfig::parse("[node]\ndefault_ttl = 300\n").is_err());
        assert!(NodeConfig::parse("[[nodes]]\nid = -1\n").is_err());
    }

    #[test]
    fn test_parse_unknown_script_kind() {
        let toml = "[[script]]\nfrom = 1\nto = 2\nkind = \"shout\"\ntext = \"x\"\n";
        assert!(NodeConfig::parse(toml).is_err());
    }

    #[test]
    fn test_parse_unknown_field_rejected() {
        assert!(NodeConfig::parse("[node]\nenable_transport = true\n").is_err());
    }

    #[test]
    fn test_bad_pre_shared_key_rejected() {
        let config = NodeConfig::parse("[node]\npre_shared_key = \"c2hvcnQ=\"\n").unwrap();
        let err = config.node.settings().unwrap_err();
        assert!(matches!(err, NodeError::Session(_)), "got {err:?}");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_duplicate_node_id() {
        let config = NodeConfig::parse("[[nodes]]\nid = 1\n[[nodes]]\nid = 1\n").unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("duplicate node id 1"));
    }

    #[test]
    fn test_validate_unknown_neighbor() {
        let config = NodeConfig::parse("[[nodes]]\nid = 1\nneighbors = [9]\n").unwrap();
        assert!(config.validate().is_err());

        let config = NodeConfig::parse("[[nodes]]\nid = 1\nneighbors = [1]\n").unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_script_names_unknown_node() {
        let toml = "[[nodes]]\nid = 1\n[[script]]\nfrom = 1\nto = 7\ntext = \"hi\"\n";
        let config = NodeConfig::parse(toml).unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("unknown node 7"));
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let err = NodeConfig::load(Path::new("/nonexistent/loramesh.toml")).unwrap_err();
        assert!(matches!(err, NodeError::Io(_)));
    }

    #[test]
    fn test_event_buffer_never_zero() {
        let config = NodeConfig::parse("[node]\nevent_buffer = 0\n").unwrap();
        assert_eq!(config.node.settings().unwrap().event_buffer, 1);
    }
}
