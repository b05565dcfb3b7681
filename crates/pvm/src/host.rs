//! Host-call identifiers and the reserved sentinel return codes a host call reports in place of
//! a register value.

/// Reserved `u64` sentinels a host call can return instead of a normal value. Encoded as
/// `u64::MAX - n`, matching the table below.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u64)]
pub enum ReturnCode {
    Ok = 0,
    None = u64::MAX,
    What = u64::MAX - 1,
    Oob = u64::MAX - 2,
    Who = u64::MAX - 3,
    Full = u64::MAX - 4,
    Core = u64::MAX - 5,
    Cash = u64::MAX - 6,
    Low = u64::MAX - 7,
    Huh = u64::MAX - 8,
}

impl ReturnCode {
    pub fn as_u64(self) -> u64 {
        self as u64
    }
}

impl From<ReturnCode> for u64 {
    fn from(code: ReturnCode) -> u64 {
        code.as_u64()
    }
}

/// Host calls reachable from the accumulation context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccumulateCall {
    Gas,
    Lookup,
    Read,
    Write,
    Info,
    Bless,
    Assign,
    Designate,
    Checkpoint,
    New,
    Upgrade,
    Transfer,
    Eject,
    Query,
    Solicit,
    Forget,
    Yield,
}

impl AccumulateCall {
    /// The `ecalli` immediate this call is dispatched under. Numbering is
    /// this crate's own convention (see DESIGN.md), not a claim about any
    /// external PVM's host-call indices.
    pub fn from_index(index: i64) -> Option<Self> {
        Some(match index {
            0 => Self::Gas,
            1 => Self::Lookup,
            2 => Self::Read,
            3 => Self::Write,
            4 => Self::Info,
            5 => Self::Bless,
            6 => Self::Assign,
            7 => Self::Designate,
            8 => Self::Checkpoint,
            9 => Self::New,
            10 => Self::Upgrade,
            11 => Self::Transfer,
            12 => Self::Eject,
            13 => Self::Query,
            14 => Self::Solicit,
            15 => Self::Forget,
            16 => Self::Yield,
            _ => return None,
        })
    }
}

/// Host calls reachable from the restricted on-transfer context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnTransferCall {
    Gas,
    Fetch,
    Lookup,
    Read,
    Write,
    Info,
    Log,
}

impl OnTransferCall {
    pub fn from_index(index: i64) -> Option<Self> {
        Some(match index {
            0 => Self::Gas,
            1 => Self::Fetch,
            2 => Self::Lookup,
            3 => Self::Read,
            4 => Self::Write,
            5 => Self::Info,
            6 => Self::Log,
            _ => return None,
        })
    }
}
