//! Motor phases and the switch commands the executor runs.

/// One motor phase, driven by a half-bridge
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Phase {
    A = 0,
    B = 1,
    C = 2,
}

impl Phase {
    pub const ALL: [Phase; 3] = [Phase::A, Phase::B, Phase::C];

    /// Index into per-phase arrays (0-2)
    pub fn index(self) -> usize {
        self as usize
    }
}

/// Switch action scheduled at one compare match.
///
/// The discriminants are the byte stored in a table entry. `OffX` must always be
/// immediately followed by its `LowX` in a table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Command {
    /// Cycle start: every high side on
    Start = 0,
    OffA = 1,
    LowA = 2,
    OffB = 3,
    LowB = 4,
    OffC = 5,
    LowC = 6,
    /// Cycle end: every low side off
    AllOff = 7,
}

impl Command {
    /// Decodes a table byte. `None` means the table is corrupt.
    pub fn from_raw(raw: u8) -> Option<Self> {
        match raw {
            0 => Some(Self::Start),
            1 => Some(Self::OffA),
            2 => Some(Self::LowA),
            3 => Some(Self::OffB),
            4 => Some(Self::LowB),
            5 => Some(Self::OffC),
            6 => Some(Self::LowC),
            7 => Some(Self::AllOff),
            _ => None,
        }
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// High-side off command for a phase
    pub fn off(phase: Phase) -> Self {
        match phase {
            Phase::A => Self::OffA,
            Phase::B => Self::OffB,
            Phase::C => Self::OffC,
        }
    }

    /// Low-side on command for a phase
    pub fn low(phase: Phase) -> Self {
        match phase {
            Phase::A => Self::LowA,
            Phase::B => Self::LowB,
            Phase::C => Self::LowC,
        }
    }

    /// The phase a per-phase command acts on
    pub fn phase(self) -> Option<Phase> {
        match self {
            Self::OffA | Self::LowA => Some(Phase::A),
            Self::OffB | Self::LowB => Some(Phase::B),
            Self::OffC | Self::LowC => Some(Phase::C),
            Self::Start | Self::AllOff => None,
        }
    }

    pub fn is_off(self) -> bool {
        matches!(self, Self::OffA | Self::OffB | Self::OffC)
    }

    pub fn is_low(self) -> bool {
        matches!(self, Self::LowA | Self::LowB | Self::LowC)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_encoding() {
        for raw in 0..=7u8 {
            let cmd = Command::from_raw(raw).unwrap();
            assert_eq!(cmd.as_u8(), raw);
        }
        assert_eq!(Command::from_raw(8), None);
        assert_eq!(Command::from_raw(0xFF), None);
    }

    #[test]
    fn test_pairs_share_phase() {
        for phase in Phase::ALL {
            let off = Command::off(phase);
            let low = Command::low(phase);
            assert!(off.is_off() && !off.is_low());
            assert!(low.is_low() && !low.is_off());
            assert_eq!(off.phase(), Some(phase));
            assert_eq!(low.phase(), Some(phase));
            // LOWx is encoded right after its OFFx
            assert_eq!(low.as_u8(), off.as_u8() + 1);
        }
        assert_eq!(Command::Start.phase(), None);
        assert_eq!(Command::AllOff.phase(), None);
    }
}
