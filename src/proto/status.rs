use std::fmt;

/// Severity packed into the low three bits of a wire status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Success,
    Error,
    Info,
    Severe,
}

impl Severity {
    fn bits(self) -> u32 {
        match self {
            Severity::Warning => 0,
            Severity::Success => 1,
            Severity::Error => 2,
            Severity::Info => 3,
            Severity::Severe => 4,
        }
    }
}

macro_rules! statuses {
    ($( $(#[$doc:meta])* $name:ident = ($severity:ident, $number:expr, $text:expr), )*) => {
        /// Typed outcome of an operation, as reported by servers and by the
        /// engine itself.
        ///
        /// The wire encoding is `message_number << 3 | severity`.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum Status {
            $( $(#[$doc])* $name, )*
            /// A code this client does not know by name
            Other(u32),
        }

        impl Status {
            pub fn code(self) -> u32 {
                match self {
                    $( Status::$name => ($number << 3) | Severity::$severity.bits(), )*
                    Status::Other(code) => code,
                }
            }

            pub fn from_code(code: u32) -> Self {
                $( if code == (($number << 3) | Severity::$severity.bits()) {
                    return Status::$name;
                } )*
                Status::Other(code)
            }

            pub fn message(self) -> &'static str {
                match self {
                    $( Status::$name => $text, )*
                    Status::Other(_) => "unrecognized status code",
                }
            }
        }
    };
}

statuses! {
    Normal = (Success, 0, "Normal successful completion"),
    AllocationFailed = (Warning, 6, "Unable to allocate additional dynamic memory"),
    TooLarge = (Warning, 9, "The requested transfer is greater than available memory or the max array size"),
    Timeout = (Warning, 10, "User specified timeout on IO operation expired"),
    BadType = (Error, 14, "The data type specified is invalid"),
    Internal = (Severe, 17, "Channel Access Internal Failure"),
    GetFailed = (Warning, 19, "Could not perform a database value get for that channel"),
    PutFailed = (Warning, 20, "Could not perform a database value put for that channel"),
    BadCount = (Warning, 22, "Invalid element count requested"),
    BadString = (Error, 23, "Invalid string"),
    /// The channel's virtual circuit went away
    Disconnected = (Warning, 24, "Virtual circuit disconnect"),
    /// The same channel name answered by more than one server
    DoubleChannel = (Warning, 25, "Identical process variable names on multiple servers"),
    EventsDisallowed = (Error, 26, "Request inappropriate within subscription (monitor) update callback"),
    BadMonitorId = (Error, 30, "Bad event subscription (monitor) identifier"),
    EmptyString = (Warning, 35, "The supplied string is empty"),
    BadMask = (Error, 41, "Invalid event selection mask"),
    IoDone = (Info, 42, "IO operations have completed"),
    IoInProgress = (Info, 43, "IO operations are in progress"),
    BadSyncGroup = (Error, 44, "Invalid synchronous group identifier"),
    NoReadAccess = (Warning, 46, "Read access denied"),
    NoWriteAccess = (Warning, 47, "Write access denied"),
    NoConvert = (Warning, 50, "Data conversion between client's type and the server's type failed"),
    BadChannelId = (Error, 51, "Invalid channel identifier"),
    Unavailable = (Warning, 54, "Unable to locate the channel in the server"),
    ChannelDestroyed = (Warning, 55, "Channel was destroyed"),
    BadPriority = (Error, 56, "Invalid channel priority"),
    ConnectTimeout = (Warning, 59, "Virtual circuit connection sequence aborted"),
    UnresponsiveTimeout = (Warning, 60, "Virtual circuit unresponsive"),
}

impl Status {
    pub fn severity(self) -> Option<Severity> {
        match self.code() & 0x7 {
            0 => Some(Severity::Warning),
            1 => Some(Severity::Success),
            2 => Some(Severity::Error),
            3 => Some(Severity::Info),
            4 => Some(Severity::Severe),
            _ => None,
        }
    }

    pub fn is_success(self) -> bool {
        self.code() & 0x1 == 1
    }
}

impl fmt::Display for Status {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "{} ({})", self.message(), self.code())
    }
}
