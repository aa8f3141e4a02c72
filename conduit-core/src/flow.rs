use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// One of the two points in the request/response lifecycle a plugin can hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Flow {
    Request,
    Response,
}

/// The set of flows a plugin declared support for at handshake.
///
/// Wire tags outside `{FLOW_REQUEST, FLOW_RESPONSE}` are silently ignored
/// when normalising; the resulting set may end up empty, which the adapter
/// treats as a handshake failure.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Capabilities(HashSet<Flow>);

impl Capabilities {
    pub fn from_wire_flows(flows: &[String]) -> Self {
        let set = flows
            .iter()
            .filter_map(|tag| match tag.as_str() {
                "FLOW_REQUEST" => Some(Flow::Request),
                "FLOW_RESPONSE" => Some(Flow::Response),
                _ => None,
            })
            .collect();
        Self(set)
    }

    pub fn contains(&self, flow: Flow) -> bool {
        self.0.contains(&flow)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<Flow> for Capabilities {
    fn from_iter<T: IntoIterator<Item = Flow>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_tags_are_ignored() {
        let caps = Capabilities::from_wire_flows(&[
            "FLOW_REQUEST".into(),
            "FLOW_BOGUS".into(),
        ]);
        assert!(caps.contains(Flow::Request));
        assert!(!caps.contains(Flow::Response));
    }

    #[test]
    fn all_unknown_tags_yield_empty_set() {
        let caps = Capabilities::from_wire_flows(&["FLOW_BOGUS".into()]);
        assert!(caps.is_empty());
    }
}
