use std::fmt;
use std::ops::BitOr;

/// DBR payload type code.
///
/// The engine treats payloads as opaque, already serialized bytes; it only
/// needs to know which codes exist and the element size of the plain types
/// so that writes can be validated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DbrType(pub u16);

impl DbrType {
    pub const STRING: DbrType = DbrType(0);
    pub const SHORT: DbrType = DbrType(1);
    pub const FLOAT: DbrType = DbrType(2);
    pub const ENUM: DbrType = DbrType(3);
    pub const CHAR: DbrType = DbrType(4);
    pub const LONG: DbrType = DbrType(5);
    pub const DOUBLE: DbrType = DbrType(6);
    pub const STS_STRING: DbrType = DbrType(7);
    pub const TIME_STRING: DbrType = DbrType(14);
    pub const TIME_DOUBLE: DbrType = DbrType(20);
    pub const GR_STRING: DbrType = DbrType(21);
    pub const CTRL_STRING: DbrType = DbrType(28);
    pub const CTRL_DOUBLE: DbrType = DbrType(34);
    pub const PUT_ACKT: DbrType = DbrType(35);
    pub const PUT_ACKS: DbrType = DbrType(36);
    pub const STSACK_STRING: DbrType = DbrType(37);
    pub const CLASS_NAME: DbrType = DbrType(38);

    /// Fixed width of one DBR_STRING element
    pub const STRING_SIZE: usize = 40;

    pub fn is_valid(self) -> bool {
        self.0 <= Self::CLASS_NAME.0
    }

    /// Element width of the types a client may write
    pub fn element_size(self) -> Option<usize> {
        match self {
            Self::STRING => Some(Self::STRING_SIZE),
            Self::SHORT | Self::ENUM => Some(2),
            Self::FLOAT | Self::LONG => Some(4),
            Self::CHAR => Some(1),
            Self::DOUBLE => Some(8),
            Self::PUT_ACKT | Self::PUT_ACKS => Some(2),
            _ => None,
        }
    }

    pub fn is_writable(self) -> bool {
        self.element_size().is_some()
    }
}

impl fmt::Display for DbrType {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "DBR({})", self.0)
    }
}

/// Subscription event selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct EventMask(pub u16);

impl EventMask {
    pub const VALUE: EventMask = EventMask(1);
    pub const LOG: EventMask = EventMask(2);
    pub const ALARM: EventMask = EventMask(4);
    pub const PROPERTY: EventMask = EventMask(8);

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn contains(
        self,
        other: EventMask,
    ) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for EventMask {
    type Output = EventMask;

    fn bitor(
        self,
        rhs: EventMask,
    ) -> EventMask {
        EventMask(self.0 | rhs.0)
    }
}

/// Access rights granted by the server for one channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct AccessRights(pub u32);

impl AccessRights {
    pub const NONE: AccessRights = AccessRights(0);
    pub const READ: AccessRights = AccessRights(1);
    pub const WRITE: AccessRights = AccessRights(2);
    pub const READ_WRITE: AccessRights = AccessRights(3);

    pub fn read_permit(self) -> bool {
        self.0 & Self::READ.0 != 0
    }

    pub fn write_permit(self) -> bool {
        self.0 & Self::WRITE.0 != 0
    }
}
