use std::fmt;
use std::net::SocketAddr;

macro_rules! wire_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub u32);

        impl fmt::Display for $name {
            fn fmt(
                &self,
                f: &mut fmt::Formatter<'_>,
            ) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

wire_id!(
    /// Client-assigned channel id (the `cid` on the wire)
    ChannelId
);
wire_id!(
    /// Client-assigned IO operation id (the `ioid` on the wire)
    IoId
);
wire_id!(
    /// Local id of one virtual circuit
    CircuitId
);
wire_id!(
    /// Local id of one sync group
    GroupId
);

/// Lowest channel/circuit priority
pub const PRIORITY_MIN: u8 = 0;
/// Highest channel/circuit priority
pub const PRIORITY_MAX: u8 = 99;
pub const PRIORITY_DEFAULT: u8 = PRIORITY_MIN;

/// Identity of the server end of a virtual circuit.
///
/// Channels of different priority on the same server use separate circuits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ServerId {
    pub address: SocketAddr,
    pub priority: u8,
}

impl fmt::Display for ServerId {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "{} (priority {})", self.address, self.priority)
    }
}

/// Next priority band above `priority`, saturating at [`PRIORITY_MAX`]
pub fn lowest_priority_level_above(priority: u8) -> u8 {
    priority.saturating_add(1).min(PRIORITY_MAX)
}

/// Next priority band below `priority`, saturating at [`PRIORITY_MIN`]
pub fn highest_priority_level_below(priority: u8) -> u8 {
    priority.saturating_sub(1).min(PRIORITY_MAX)
}
