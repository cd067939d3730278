//! Generic ⇄ native sample format table
//!
//! The table is ordered and searched linearly in both directions. Native
//! formats that have no row (24-bit, A-law, 64-bit float, ...) are not
//! supported and are never approximated.

use pcm_core::AudioFormat;
use serde::{Deserialize, Serialize};

/// Native sample format code as used by the QSA channel blocks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NativeFormat(pub i32);

impl NativeFormat {
    pub const U8: Self = Self(0);
    pub const S8: Self = Self(1);
    pub const U16_LE: Self = Self(2);
    pub const U16_BE: Self = Self(3);
    pub const S16_LE: Self = Self(4);
    pub const S16_BE: Self = Self(5);
    pub const U24_LE: Self = Self(6);
    pub const U24_BE: Self = Self(7);
    pub const S24_LE: Self = Self(8);
    pub const S24_BE: Self = Self(9);
    pub const U32_LE: Self = Self(10);
    pub const U32_BE: Self = Self(11);
    pub const S32_LE: Self = Self(12);
    pub const S32_BE: Self = Self(13);
    pub const A_LAW: Self = Self(14);
    pub const MU_LAW: Self = Self(15);
    pub const IEC958_SUBFRAME_LE: Self = Self(16);
    pub const IEC958_SUBFRAME_BE: Self = Self(17);
    pub const FLOAT_LE: Self = Self(18);
    pub const FLOAT_BE: Self = Self(19);
    pub const FLOAT64_LE: Self = Self(20);
    pub const FLOAT64_BE: Self = Self(21);
    pub const IMA_ADPCM: Self = Self(22);
    pub const GSM: Self = Self(23);
    pub const MPEG: Self = Self(24);
    pub const SPECIAL: Self = Self(25);

    /// Raw code
    pub fn code(&self) -> i32 {
        self.0
    }
}

/// One row of the format table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatMapEntry {
    /// Host format
    pub generic: AudioFormat,
    /// Equivalent native format
    pub native: NativeFormat,
}

const fn entry(generic: AudioFormat, native: NativeFormat) -> FormatMapEntry {
    FormatMapEntry { generic, native }
}

const QSA_ENTRIES: [FormatMapEntry; 8] = [
    entry(AudioFormat::U8, NativeFormat::U8),
    entry(AudioFormat::S8, NativeFormat::S8),
    entry(AudioFormat::S16Le, NativeFormat::S16_LE),
    entry(AudioFormat::S16Be, NativeFormat::S16_BE),
    entry(AudioFormat::S32Le, NativeFormat::S32_LE),
    entry(AudioFormat::S32Be, NativeFormat::S32_BE),
    entry(AudioFormat::F32Le, NativeFormat::FLOAT_LE),
    entry(AudioFormat::F32Be, NativeFormat::FLOAT_BE),
];

/// Ordered bidirectional format mapping
#[derive(Debug, Clone, Copy)]
pub struct FormatTable {
    entries: &'static [FormatMapEntry],
}

impl FormatTable {
    /// The formats the QSA plugin layer accepts
    pub const QSA: Self = Self {
        entries: &QSA_ENTRIES,
    };

    /// A table over arbitrary rows
    pub const fn new(entries: &'static [FormatMapEntry]) -> Self {
        Self { entries }
    }

    /// Rows in precedence order
    pub fn entries(&self) -> &'static [FormatMapEntry] {
        self.entries
    }

    /// Native code for a host format
    pub fn native_of(&self, generic: AudioFormat) -> Option<NativeFormat> {
        self.entries
            .iter()
            .find(|e| e.generic == generic)
            .map(|e| e.native)
    }

    /// Host format for a native code
    pub fn generic_of(&self, native: NativeFormat) -> Option<AudioFormat> {
        self.entries
            .iter()
            .find(|e| e.native == native)
            .map(|e| e.generic)
    }

    /// First candidate that has a native mapping, in candidate order
    pub fn select(&self, candidates: &[AudioFormat]) -> Option<FormatMapEntry> {
        candidates.iter().find_map(|&generic| {
            self.native_of(generic)
                .map(|native| FormatMapEntry { generic, native })
        })
    }
}

impl Default for FormatTable {
    fn default() -> Self {
        Self::QSA
    }
}
