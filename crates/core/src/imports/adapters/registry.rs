use super::{BrokerAdapter, HeaderIndex, HeuristicAdapter, StatementAdapter};

/// Ordered, immutable list of adapters consulted once per file.
///
/// Detection is first-match. The list always ends with the heuristic adapter,
/// which claims any headers. Built by the caller and passed into the import pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdapterRegistry {
    adapters: Vec<BrokerAdapter>,
}

impl AdapterRegistry {
    /// Builds a registry from `adapters` in priority order. A trailing
    /// heuristic fallback is appended if the list does not end with one.
    pub fn new(mut adapters: Vec<BrokerAdapter>) -> Self {
        if !matches!(adapters.last(), Some(BrokerAdapter::Heuristic(_))) {
            adapters.push(BrokerAdapter::Heuristic(HeuristicAdapter));
        }
        Self { adapters }
    }

    pub fn adapters(&self) -> &[BrokerAdapter] {
        &self.adapters
    }

    pub fn detect(&self, headers: &HeaderIndex) -> &BrokerAdapter {
        // `new` guarantees a trailing heuristic adapter, which claims any headers.
        let fallback = self.adapters.len() - 1;
        let position = self
            .adapters
            .iter()
            .position(|adapter| adapter.detect(headers))
            .unwrap_or(fallback);
        let adapter = &self.adapters[position];
        log::debug!(
            "Detected '{}' adapter for headers {:?}",
            adapter.name(),
            headers.names()
        );
        adapter
    }
}

impl Default for AdapterRegistry {
    fn default() -> Self {
        Self::new(vec![BrokerAdapter::Statement(StatementAdapter)])
    }
}
