/// Command codes carried in the first header field.
///
/// Only the codes this client sends or expects over a virtual circuit are
/// named; anything else decodes to `None` and is handled as a bad message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum Command {
    Version = 0,
    EventAdd = 1,
    EventCancel = 2,
    Read = 3,
    Write = 4,
    Search = 6,
    Error = 11,
    ClearChannel = 12,
    Beacon = 13,
    NotFound = 14,
    ReadNotify = 15,
    CreateChannel = 18,
    WriteNotify = 19,
    ClientName = 20,
    HostName = 21,
    AccessRights = 22,
    Echo = 23,
    CreateChannelFail = 26,
    ServerDisconnect = 27,
}

impl Command {
    pub fn from_code(code: u16) -> Option<Self> {
        let command = match code {
            0 => Command::Version,
            1 => Command::EventAdd,
            2 => Command::EventCancel,
            3 => Command::Read,
            4 => Command::Write,
            6 => Command::Search,
            11 => Command::Error,
            12 => Command::ClearChannel,
            13 => Command::Beacon,
            14 => Command::NotFound,
            15 => Command::ReadNotify,
            18 => Command::CreateChannel,
            19 => Command::WriteNotify,
            20 => Command::ClientName,
            21 => Command::HostName,
            22 => Command::AccessRights,
            23 => Command::Echo,
            26 => Command::CreateChannelFail,
            27 => Command::ServerDisconnect,
            _ => return None,
        };
        Some(command)
    }

    pub fn code(self) -> u16 {
        self as u16
    }
}
