/// Minor protocol revision this client speaks
pub const CA_MINOR_PROTOCOL_REVISION: u16 = 13;

/// First revision that understands a zero element count as "whatever the
/// server currently holds"
pub const CA_MINOR_DYNAMIC_COUNT: u16 = 13;

/// Beacon steps this far behind the last one are treated as duplicates
/// arriving over a second route, not as a restart
pub(crate) const BEACON_DUPLICATE_WINDOW: u32 = 256;

/// Weight of the newest sample in a server's beacon period estimate
pub(crate) const BEACON_PERIOD_WEIGHT: f64 = 0.125;
