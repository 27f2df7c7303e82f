use serde::{Deserialize, Serialize};

/// Which unit/node set and validation policy apply to a run.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum CognitiveMode {
    /// Conversational mode with tool use available on demand.
    Dual,
    /// Autonomous tool-using mode.
    Agent,
    /// Replays a frozen, pre-vetted persona source.
    Emulation,
}

impl CognitiveMode {
    pub const ALL: [Self; 3] = [Self::Dual, Self::Agent, Self::Emulation];
}
