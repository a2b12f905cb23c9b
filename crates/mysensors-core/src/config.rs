use serde::{Deserialize, Serialize};

/// Reply behaviour for `Set` messages that carry the ack flag.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AckPolicy {
    /// The gateway radio acknowledges on its own; the registry stays silent.
    #[default]
    Disabled,
    /// Echo the message back to the sender with the ack flag set.
    Echo,
}

/// Units reported to nodes that send `I_CONFIG`.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitSystem {
    #[default]
    Metric,
    Imperial,
}

impl UnitSystem {
    pub fn code(self) -> &'static str {
        match self {
            UnitSystem::Metric => "M",
            UnitSystem::Imperial => "I",
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NetworkConfig {
    #[serde(default)]
    pub ack: AckPolicy,
    #[serde(default)]
    pub unit_system: UnitSystem,
}
