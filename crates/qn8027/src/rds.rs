//! RDS group encoding for the two text services the transmitter carries.
//!
//! Every group is the 8 data bytes of one 4-block RDS group, ready for
//! RDSD0..RDSD7. The chip appends the check words itself.
//!
//! Block 1 is always the PI code. Block 2 carries the group type, the
//! traffic flags, the programme type and the text address:
//!
//! ```text
//! GTYPE(4) | B0(1) | TP(1) | PTY(5) | TA/AB(1) | MS/DI/ADDR(4)
//! ```

/// Program service name length in bytes.
pub const STATION_NAME_LEN: usize = 8;
/// Radio text length in bytes.
pub const RADIO_TEXT_LEN: usize = 64;

const GROUP_TYPE_2A: u8 = 0x20;
const MUSIC_SPEECH: u8 = 0x08;
/// Block 3 of a 0A group: "no alternative frequencies" followed by the filler code.
const NO_ALT_FREQ: [u8; 2] = [0xE0, 0xCD];

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum TextKind {
    /// Program service name, group type 0A, 2 characters per group.
    StationName,
    /// Radio text, group type 2A, 4 characters per group.
    RadioText,
}

impl TextKind {
    pub const fn max_len(self) -> usize {
        match self {
            TextKind::StationName => STATION_NAME_LEN,
            TextKind::RadioText => RADIO_TEXT_LEN,
        }
    }

    pub const fn chars_per_group(self) -> usize {
        match self {
            TextKind::StationName => 2,
            TextKind::RadioText => 4,
        }
    }

    /// Number of text address slots the receiver holds for this service.
    pub const fn max_groups(self) -> usize {
        self.max_len() / self.chars_per_group()
    }
}

/// One RDS group as written to RDSD0..RDSD7.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct RdsGroup(pub [u8; 8]);

impl RdsGroup {
    pub fn as_bytes(&self) -> &[u8; 8] {
        &self.0
    }

    pub fn block(&self, n: usize) -> [u8; 2] {
        [self.0[n * 2], self.0[n * 2 + 1]]
    }

    /// Text address carried in block 2.
    pub fn address(&self) -> u8 {
        if self.0[2] & 0xF0 == GROUP_TYPE_2A {
            self.0[3] & 0x0F
        } else {
            self.0[3] & 0x03
        }
    }

    /// The text bytes this group places on the receiver display.
    pub fn text(&self) -> &[u8] {
        if self.0[2] & 0xF0 == GROUP_TYPE_2A {
            &self.0[4..8]
        } else {
            &self.0[6..8]
        }
    }
}

/// Lazily produces the groups for one text.
///
/// The iterator owns a copy of the truncated, null padded text, so cloning
/// it restarts the transmission from address 0.
#[derive(Debug, Clone)]
pub struct RdsGroups {
    kind: TextKind,
    pi_code: u16,
    pty_code: u8,
    buffer: [u8; RADIO_TEXT_LEN],
    len: usize,
    next: usize,
    count: usize,
}

impl RdsGroups {
    /// Prepare the groups for `text`.
    ///
    /// Text longer than the service allows is cut to `kind.max_len()` bytes.
    /// One terminating null is sent after shorter text so the receiver stops
    /// decoding there; an empty text still yields a single group.
    pub fn new(kind: TextKind, pi_code: u16, pty_code: u8, text: &str) -> Self {
        let bytes = text.as_bytes();
        let len = bytes.len().min(kind.max_len());
        let mut buffer = [0u8; RADIO_TEXT_LEN];
        buffer[..len].copy_from_slice(&bytes[..len]);
        let count = (len + 1)
            .div_ceil(kind.chars_per_group())
            .min(kind.max_groups());
        Self {
            kind,
            pi_code,
            pty_code,
            buffer,
            len,
            next: 0,
            count,
        }
    }

    pub fn kind(&self) -> TextKind {
        self.kind
    }

    /// The text after truncation.
    pub fn payload(&self) -> &[u8] {
        &self.buffer[..self.len]
    }

    fn group(&self, index: usize) -> RdsGroup {
        let [pi_hi, pi_lo] = self.pi_code.to_be_bytes();
        // PTY straddles the block 2 bytes: two high bits low in the first,
        // three low bits high in the second.
        let pty_hi = (self.pty_code & 0x18) >> 3;
        let pty_lo = (self.pty_code << 5) & 0xE0;
        let step = self.kind.chars_per_group();
        let offset = index * step;
        let text = &self.buffer[offset..offset + step];
        let address = index as u8;

        match self.kind {
            TextKind::StationName => RdsGroup([
                pi_hi,
                pi_lo,
                pty_hi,
                pty_lo | MUSIC_SPEECH | address,
                NO_ALT_FREQ[0],
                NO_ALT_FREQ[1],
                text[0],
                text[1],
            ]),
            TextKind::RadioText => RdsGroup([
                pi_hi,
                pi_lo,
                GROUP_TYPE_2A | pty_hi,
                pty_lo | address,
                text[0],
                text[1],
                text[2],
                text[3],
            ]),
        }
    }
}

impl Iterator for RdsGroups {
    type Item = RdsGroup;

    fn next(&mut self) -> Option<RdsGroup> {
        if self.next >= self.count {
            return None;
        }
        let group = self.group(self.next);
        self.next += 1;
        Some(group)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.count - self.next;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for RdsGroups {}

pub fn station_name_groups(pi_code: u16, pty_code: u8, name: &str) -> RdsGroups {
    RdsGroups::new(TextKind::StationName, pi_code, pty_code, name)
}

pub fn radio_text_groups(pi_code: u16, pty_code: u8, text: &str) -> RdsGroups {
    RdsGroups::new(TextKind::RadioText, pi_code, pty_code, text)
}
