use std::fmt;
use std::str::FromStr;

/// Size every chunk is assumed to have when a manifest carries no explicit
/// chunk size list.
pub const LEGACY_CHUNK_SIZE: u64 = 1_048_576;

/// Number of download groups chunks are bucketed into.
pub const GROUP_COUNT: u8 = 100;

/// 128-bit identifier naming one immutable chunk of build data.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ChunkId {
    pub a: u32,
    pub b: u32,
    pub c: u32,
    pub d: u32,
}

impl ChunkId {
    pub const fn new(a: u32, b: u32, c: u32, d: u32) -> Self {
        Self { a, b, c, d }
    }

    /// In-memory byte layout: each word little-endian, in order.
    pub fn to_le_bytes(&self) -> [u8; 16] {
        let mut out = [0u8; 16];
        out[0..4].copy_from_slice(&self.a.to_le_bytes());
        out[4..8].copy_from_slice(&self.b.to_le_bytes());
        out[8..12].copy_from_slice(&self.c.to_le_bytes());
        out[12..16].copy_from_slice(&self.d.to_le_bytes());
        out
    }

    /// Group used by manifests that predate explicit group lists.
    pub fn legacy_group(&self) -> u8 {
        (crc32_bzip2(&self.to_le_bytes()) % u32::from(GROUP_COUNT)) as u8
    }
}

impl fmt::Display for ChunkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:08X}{:08X}{:08X}{:08X}", self.a, self.b, self.c, self.d)
    }
}

impl FromStr for ChunkId {
    type Err = String;

    /// Accepts 32 hex digits, or the hyphenated 8-4-4-4-12 form.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits: String = match s.len() {
            32 => s.to_string(),
            36 => {
                let b = s.as_bytes();
                if b[8] != b'-' || b[13] != b'-' || b[18] != b'-' || b[23] != b'-' {
                    return Err(format!("bad hyphen layout in {s:?}"));
                }
                s.chars().filter(|c| *c != '-').collect()
            }
            n => return Err(format!("expected 32 hex digits, got {n} characters")),
        };
        if !digits.bytes().all(|c| c.is_ascii_hexdigit()) {
            return Err(format!("non-hex character in {s:?}"));
        }
        let word = |i: usize| u32::from_str_radix(&digits[i * 8..i * 8 + 8], 16).map_err(|e| e.to_string());
        Ok(Self { a: word(0)?, b: word(1)?, c: word(2)?, d: word(3)? })
    }
}

/// A contiguous byte range within one chunk.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChunkPart {
    pub chunk_id: ChunkId,
    pub offset: u32,
    pub size: u32,
}

impl ChunkPart {
    pub fn new(chunk_id: ChunkId, offset: u32, size: u32) -> Self {
        Self { chunk_id, offset, size }
    }
}

/// Where a chunk part lives inside an installed file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileChunkPart {
    pub path: String,
    pub file_offset: u64,
    pub chunk_part: ChunkPart,
}

const CRC_POLY: u32 = 0x04C1_1DB7;

const fn crc_table() -> [u32; 256] {
    let mut table = [0u32; 256];
    let mut i = 0;
    while i < 256 {
        let mut c = (i as u32) << 24;
        let mut j = 0;
        while j < 8 {
            c = if c & 0x8000_0000 != 0 { (c << 1) ^ CRC_POLY } else { c << 1 };
            j += 1;
        }
        table[i] = c;
        i += 1;
    }
    table
}

static CRC_TABLE: [u32; 256] = crc_table();

/// MSB-first CRC-32 (BZIP2 parameters). Only used for legacy group numbers,
/// so it must stay bit-exact with manifests written before groups were stored.
pub fn crc32_bzip2(data: &[u8]) -> u32 {
    let mut crc = !0u32;
    for &b in data {
        crc = (crc << 8) ^ CRC_TABLE[((crc >> 24) ^ u32::from(b)) as usize];
    }
    !crc
}
