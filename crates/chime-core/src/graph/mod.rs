//! Ordered connection graph for a single sound.
//!
//! Every sound owns one [`ConnectionGraph`]: a list of named
//! [`Connection`]s wired strictly in order,
//!
//! ```text
//! source → [extra connections...] → gain → pan → destination
//! ```
//!
//! The source always comes first and gain/pan always close the list; extra
//! connections are inserted in front of gain. Nodes are materialized lazily by
//! [`wire`](ConnectionGraph::wire):
//!
//! - persistent nodes are created once and reused
//! - `created_on_play` nodes (oscillators, buffer sources) are recreated on
//!   every wire, so a single-use source is never started twice
//! - attribute and parameter rules are re-applied each time
//!
//! Wiring the same graph twice without changes creates no persistent node
//! twice and issues no duplicate host connections.

mod connection;

pub use connection::{
    AttributeRule, Connection, NodeSource, ParamRule, ScheduledValue, SoundField, SoundSettings,
};

use crate::context::AudioContext;
use crate::error::{GraphError, Result};
use crate::host::{NodeHandle, NodeKind};

/// Named nodes wired in order, ending in gain → pan → destination.
#[derive(Debug, Clone)]
pub struct ConnectionGraph {
    connections: Vec<Connection>,
    wired: bool,
}

impl ConnectionGraph {
    /// Name of the source connection.
    pub const SOURCE: &'static str = "source";
    /// Name of the gain connection.
    pub const GAIN: &'static str = "gain";
    /// Name of the panner connection.
    pub const PAN: &'static str = "pan";

    /// A graph of `source → gain → pan`.
    pub fn new(source: NodeSource) -> Self {
        Self {
            connections: vec![
                Connection::new(Self::SOURCE).with_source(source),
                Connection::create(Self::GAIN, NodeKind::Gain),
                Connection::create(Self::PAN, NodeKind::StereoPanner),
            ],
            wired: false,
        }
    }

    fn is_fixed(name: &str) -> bool {
        matches!(name, Self::SOURCE | Self::GAIN | Self::PAN)
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.connections.iter().position(|c| c.name() == name)
    }

    /// Insert `connection` just before gain.
    pub fn add_connection(&mut self, connection: Connection) -> Result<(), GraphError> {
        if self.position(connection.name()).is_some() {
            return Err(GraphError::DuplicateConnection(connection.name().to_string()));
        }
        let index = self.connections.len() - 2;
        // The node before gain would otherwise keep feeding gain directly.
        self.connections[index - 1].detach();
        tracing::debug!(connection = connection.name(), index, "graph_add_connection");
        self.connections.insert(index, connection);
        Ok(())
    }

    /// Remove a non-fixed connection.
    pub fn remove_connection(&mut self, name: &str) -> Result<Connection, GraphError> {
        if Self::is_fixed(name) {
            return Err(GraphError::FixedConnection(name.to_string()));
        }
        let index = self
            .position(name)
            .ok_or_else(|| GraphError::ConnectionNotFound(name.to_string()))?;
        let removed = self.connections.remove(index);
        removed.detach();
        self.connections[index - 1].detach();
        tracing::debug!(connection = name, "graph_remove_connection");
        Ok(removed)
    }

    /// Look up a connection.
    pub fn get_connection(&self, name: &str) -> Option<&Connection> {
        self.connections.iter().find(|c| c.name() == name)
    }

    /// Look up a connection for editing. Changes take effect on the next wire.
    pub fn get_connection_mut(&mut self, name: &str) -> Option<&mut Connection> {
        self.connections.iter_mut().find(|c| c.name() == name)
    }

    /// Current node of a connection.
    pub fn get_node_from(&self, name: &str) -> Result<NodeHandle, GraphError> {
        self.get_connection(name)
            .ok_or_else(|| GraphError::ConnectionNotFound(name.to_string()))?
            .materialized()
            .cloned()
    }

    /// Current source node.
    pub fn source_node(&self) -> Result<NodeHandle, GraphError> {
        self.get_node_from(Self::SOURCE)
    }

    /// The source connection.
    pub fn source(&self) -> &Connection {
        &self.connections[0]
    }

    /// The source connection, for editing.
    pub fn source_mut(&mut self) -> &mut Connection {
        &mut self.connections[0]
    }

    /// Connection names in wiring order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.connections.iter().map(Connection::name)
    }

    /// Connections in wiring order.
    pub fn connections(&self) -> &[Connection] {
        &self.connections
    }

    /// Number of connections, including the fixed three.
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    /// Always `false`; a graph has at least source, gain and pan.
    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Whether [`wire`](Self::wire) has succeeded at least once.
    pub fn is_materialized(&self) -> bool {
        self.wired
    }

    /// Materialize nodes, apply attributes, connect in order and schedule
    /// parameter rules for a play at `at`.
    pub fn wire(
        &mut self,
        context: &AudioContext,
        settings: &SoundSettings,
        at: f64,
    ) -> Result<()> {
        let destination = context.destination()?;
        for connection in &mut self.connections {
            connection.materialize(context, settings)?;
        }
        for pair in self.connections.windows(2) {
            let from = pair[0].materialized()?;
            let to = pair[1].materialized()?;
            tracing::trace!(from = pair[0].name(), to = pair[1].name(), "graph_connect");
            from.connect(&**to)?;
        }
        if let Some(last) = self.connections.last() {
            last.materialized()?.connect(&*destination)?;
        }
        for connection in &self.connections {
            connection.schedule_params(at)?;
        }
        self.wired = true;
        tracing::debug!(connections = self.connections.len(), at, "graph wired");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::host::{NodeAttribute, ParamName};
    use crate::offline::OfflineHost;
    use std::rc::Rc;

    fn setup() -> (Rc<OfflineHost>, AudioContext) {
        let host = Rc::new(OfflineHost::new());
        let context = AudioContext::with_host(host.clone());
        (host, context)
    }

    fn oscillator_graph() -> ConnectionGraph {
        ConnectionGraph::new(NodeSource::Create(NodeKind::Oscillator))
    }

    #[test]
    fn default_order() {
        let graph = oscillator_graph();
        assert_eq!(graph.names().collect::<Vec<_>>(), ["source", "gain", "pan"]);
    }

    #[test]
    fn added_connections_go_before_gain() {
        let mut graph = oscillator_graph();
        graph
            .add_connection(Connection::create("filter", NodeKind::BiquadFilter))
            .unwrap();
        graph
            .add_connection(Connection::create("delay", NodeKind::Delay))
            .unwrap();
        assert_eq!(
            graph.names().collect::<Vec<_>>(),
            ["source", "filter", "delay", "gain", "pan"]
        );
    }

    #[test]
    fn duplicate_and_fixed_names_rejected() {
        let mut graph = oscillator_graph();
        assert_eq!(
            graph.add_connection(Connection::create("gain", NodeKind::Gain)),
            Err(GraphError::DuplicateConnection("gain".to_string()))
        );
        assert_eq!(
            graph.remove_connection("pan").unwrap_err(),
            GraphError::FixedConnection("pan".to_string())
        );
        assert_eq!(
            graph.remove_connection("reverb").unwrap_err(),
            GraphError::ConnectionNotFound("reverb".to_string())
        );
    }

    #[test]
    fn node_lookup_before_wire_fails() {
        let graph = oscillator_graph();
        assert_eq!(
            graph.source_node().err().unwrap(),
            GraphError::NotMaterialized("source".to_string())
        );
    }

    #[test]
    fn wire_connects_in_order_to_destination() {
        let (host, context) = setup();
        let mut graph = oscillator_graph();
        graph
            .add_connection(Connection::create("filter", NodeKind::BiquadFilter))
            .unwrap();
        graph.wire(&context, &SoundSettings::default(), 0.0).unwrap();

        let ids: Vec<_> = graph
            .connections()
            .iter()
            .map(|c| c.node().unwrap().id())
            .collect();
        for pair in ids.windows(2) {
            assert_eq!(host.outputs(pair[0]), vec![pair[1]]);
        }
        assert_eq!(host.outputs(ids[3]), vec![host.destination_id()]);
    }

    #[test]
    fn rewire_recreates_only_single_use_nodes() {
        let (host, context) = setup();
        let mut graph = oscillator_graph();
        let settings = SoundSettings::default();
        graph.wire(&context, &settings, 0.0).unwrap();
        let first_source = graph.source_node().unwrap().id();
        let first_gain = graph.get_node_from("gain").unwrap().id();
        graph.wire(&context, &settings, 1.0).unwrap();

        assert_ne!(graph.source_node().unwrap().id(), first_source);
        assert_eq!(graph.get_node_from("gain").unwrap().id(), first_gain);
        assert_eq!(host.created_count(NodeKind::Gain), 1);
        assert_eq!(host.created_count(NodeKind::StereoPanner), 1);
        assert_eq!(host.created_count(NodeKind::Oscillator), 2);
        assert_eq!(host.outputs(first_gain).len(), 1);
    }

    #[test]
    fn missing_node_source_is_configuration_error() {
        let (_host, context) = setup();
        let mut graph = oscillator_graph();
        graph.add_connection(Connection::new("reverb")).unwrap();
        let err = graph
            .wire(&context, &SoundSettings::default(), 0.0)
            .unwrap_err();
        assert_eq!(
            err,
            Error::Graph(GraphError::MissingNodeSource("reverb".to_string()))
        );
    }

    #[test]
    fn existing_node_cannot_be_recreated() {
        let (_host, context) = setup();
        let node = context.create_node(NodeKind::Delay).unwrap();
        let mut graph = oscillator_graph();
        graph
            .add_connection(Connection::existing("delay", node).created_on_play(true))
            .unwrap();
        let err = graph
            .wire(&context, &SoundSettings::default(), 0.0)
            .unwrap_err();
        assert!(matches!(err, Error::Graph(GraphError::CannotRecreate(_))));
    }

    #[test]
    fn existing_node_is_used_as_is() {
        let (_host, context) = setup();
        let node = context.create_node(NodeKind::Delay).unwrap();
        let id = node.id();
        let mut graph = oscillator_graph();
        graph
            .add_connection(Connection::existing("delay", node))
            .unwrap();
        graph.wire(&context, &SoundSettings::default(), 0.0).unwrap();
        assert_eq!(graph.get_node_from("delay").unwrap().id(), id);
    }

    #[test]
    fn attributes_and_param_rules_applied() {
        let (host, context) = setup();
        let mut graph = oscillator_graph();
        graph
            .source_mut()
            .add_attribute(AttributeRule::Field(SoundField::Waveform));
        graph
            .add_connection(
                Connection::create("filter", NodeKind::BiquadFilter)
                    .with_param(ParamName::Frequency, ScheduledValue::Set(1200.0))
                    .unwrap(),
            )
            .unwrap();
        let settings = SoundSettings {
            waveform: crate::host::Waveform::Square,
            ..SoundSettings::default()
        };
        graph.wire(&context, &settings, 0.5).unwrap();

        let source = graph.source_node().unwrap().id();
        assert_eq!(
            host.node(source).unwrap().attribute("type"),
            Some(NodeAttribute::Waveform(crate::host::Waveform::Square))
        );
        let filter = graph.get_node_from("filter").unwrap();
        let frequency = filter.param(ParamName::Frequency).unwrap();
        assert_eq!(host.param_value_at(filter.id(), ParamName::Frequency, 1.0), Some(1200.0));
        assert_eq!(frequency.value(), 350.0);
    }

    #[test]
    fn removing_connection_reroutes_on_next_wire() {
        let (host, context) = setup();
        let mut graph = oscillator_graph();
        graph
            .add_connection(Connection::create("filter", NodeKind::BiquadFilter))
            .unwrap();
        let settings = SoundSettings::default();
        graph.wire(&context, &settings, 0.0).unwrap();
        graph.remove_connection("filter").unwrap();
        graph.wire(&context, &settings, 1.0).unwrap();
        let source = graph.source_node().unwrap().id();
        let gain = graph.get_node_from("gain").unwrap().id();
        assert_eq!(host.outputs(source), vec![gain]);
    }
}
