//! Configured nodes on a shared simulated medium, driven by a script.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use loramesh_core::NodeId;
use loramesh_interfaces::{MediumStats, ShutdownToken, SimMedium, SimRadio};
use tokio::sync::mpsc;

use crate::config::{NodeConfig, ScriptEntry, ScriptKind};
use crate::error::NodeError;
use crate::event::NodeEvent;
use crate::node::Node;
use crate::runtime::NodeHandle;

/// What a script run achieved.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ScriptReport {
    pub sent: usize,
    pub failed: usize,
}

pub struct Simulation {
    medium: SimMedium,
    handles: BTreeMap<NodeId, NodeHandle<SimRadio>>,
    observers: ShutdownToken,
}

impl Simulation {
    /// Attach every configured node to a fresh medium and start it.
    ///
    /// Each node's events are logged by a background observer.
    pub async fn start(config: &NodeConfig) -> Result<Self, NodeError> {
        config.validate()?;
        if config.nodes.is_empty() {
            return Err(NodeError::Config("no nodes configured".into()));
        }

        let settings = config.node.settings()?;
        let medium = SimMedium::new(config.medium.medium_config())?;
        for entry in &config.nodes {
            for neighbor in entry.neighbors.iter().flatten() {
                medium.link(entry.node_id(), NodeId::new(*neighbor));
            }
        }

        let observers = ShutdownToken::new();
        let mut handles = BTreeMap::new();
        for entry in &config.nodes {
            let id = entry.node_id();
            let node = Arc::new(Node::new(id, medium.attach(id), settings.clone()));
            if let Some(events) = node.events() {
                let task = tokio::spawn(observe(id, events, observers.subscribe()));
                observers.track(task).await;
            }
            handles.insert(id, node.spawn().await?);
        }

        tracing::info!(nodes = handles.len(), "simulation started");
        Ok(Self {
            medium,
            handles,
            observers,
        })
    }

    pub fn node(&self, id: NodeId) -> Option<&Arc<Node<SimRadio>>> {
        self.handles.get(&id).map(NodeHandle::node)
    }

    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.handles.keys().copied()
    }

    pub fn medium_stats(&self) -> MediumStats {
        self.medium.stats()
    }

    /// Perform each step in order. A failed send is logged and counted; it
    /// does not stop the script.
    pub async fn run_script(&self, script: &[ScriptEntry]) -> ScriptReport {
        let mut report = ScriptReport::default();
        for step in script {
            if step.delay_ms > 0 {
                tokio::time::sleep(Duration::from_millis(step.delay_ms)).await;
            }
            let (from, to) = (NodeId::new(step.from), NodeId::new(step.to));
            let Some(node) = self.node(from) else {
                tracing::warn!(from = %from, "script names a node that is not running");
                report.failed += 1;
                continue;
            };
            let result = match step.kind {
                ScriptKind::Chat => node.send_chat(to, &step.text, step.private).await,
                ScriptKind::Cmd => node.send_command(to, &step.text).await,
            };
            match result {
                Ok(_) => report.sent += 1,
                Err(e) => {
                    tracing::warn!(from = %from, to = %to, error = %e, "scripted send failed");
                    report.failed += 1;
                }
            }
        }
        report
    }

    /// Stop every node and observer.
    ///
    /// All nodes are stopped even if one fails; the first error is returned.
    pub async fn shutdown(self) -> Result<(), NodeError> {
        let mut first_error = None;
        for (id, handle) in &self.handles {
            let node = handle.node();
            let established = node.crypto().sessions().established_peers();
            tracing::info!(node = %id, ?established, "established sessions");
            for peer in self.handles.keys().filter(|peer| *peer != id) {
                tracing::info!(node = %id, stats = %node.stats(*peer), "session");
            }
            if let Err(e) = handle.stop().await {
                tracing::warn!(node = %id, error = %e, "node did not stop cleanly");
                if first_error.is_none() {
                    first_error = Some(e);
                }
            }
        }
        self.observers.stop_and_join().await;

        let stats = self.medium.stats();
        tracing::info!(
            transmissions = stats.transmissions,
            deliveries = stats.deliveries,
            losses = stats.losses,
            "simulation finished"
        );
        first_error.map_or(Ok(()), Err)
    }
}

async fn observe(
    id: NodeId,
    mut events: mpsc::Receiver<NodeEvent>,
    mut stop_rx: tokio::sync::watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            biased;
            _ = stop_rx.changed() => break,
            event = events.recv() => match event {
                Some(event) => tracing::debug!(node = %id, ?event, "event"),
                None => break,
            },
        }
    }
}
