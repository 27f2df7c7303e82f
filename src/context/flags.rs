use serde::{Deserialize, Serialize};

/// Routing flag consulted by tool-use units and nodes.
pub const USE_TOOLS_FLAG: &str = "use_tools";

/// Tri-state routing switch.
///
/// `Unset` means the consumer infers the answer from its input; the two
/// explicit states let mutually exclusive strategies share one static unit
/// list or graph.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutingFlag {
    #[default]
    Unset,
    Enabled,
    Disabled,
}

impl RoutingFlag {
    pub const fn from_bool(value: bool) -> Self {
        if value { Self::Enabled } else { Self::Disabled }
    }

    pub const fn from_option(value: Option<bool>) -> Self {
        match value {
            Some(value) => Self::from_bool(value),
            None => Self::Unset,
        }
    }

    pub const fn as_option(self) -> Option<bool> {
        match self {
            Self::Unset => None,
            Self::Enabled => Some(true),
            Self::Disabled => Some(false),
        }
    }

    pub const fn is_set(self) -> bool {
        !matches!(self, Self::Unset)
    }

    /// Explicit value, or the inferred one when unset.
    pub fn resolve(self, infer: impl FnOnce() -> bool) -> bool {
        self.as_option().unwrap_or_else(infer)
    }

    /// Whether a branch playing `role` should stand down.
    ///
    /// A branch whose role is "tools enabled" is inactive when the flag is
    /// explicitly disabled, and the reverse. An unset flag never prunes.
    pub const fn contradicts(self, role: bool) -> bool {
        match self {
            Self::Unset => false,
            Self::Enabled => !role,
            Self::Disabled => role,
        }
    }
}
