//! CRC-32C (Castagnoli), the canonical 32-bit hash for the consistent-hash ring.
//!
//! Polynomial `0x1EDC6F41`, reflected input/output, initial and final XOR
//! `0xFFFFFFFF`. Deliberately 32 bits rather than a 64-bit hash: a 64-bit
//! keyspace leaves most of the ring's bucket space unused and clusters
//! consecutive inputs instead of spreading them.

const POLY: u32 = 0x82F6_3B78; // 0x1EDC6F41 bit-reflected

fn build_table() -> [u32; 256] {
    let mut table = [0u32; 256];
    let mut i = 0u32;
    while i < 256 {
        let mut crc = i;
        let mut j = 0;
        while j < 8 {
            crc = if crc & 1 != 0 {
                (crc >> 1) ^ POLY
            } else {
                crc >> 1
            };
            j += 1;
        }
        table[i as usize] = crc;
        i += 1;
    }
    table
}

static TABLE: std::sync::OnceLock<[u32; 256]> = std::sync::OnceLock::new();

fn table() -> &'static [u32; 256] {
    TABLE.get_or_init(build_table)
}

/// Computes the CRC-32C checksum of `bytes`.
pub fn crc32c(bytes: &[u8]) -> u32 {
    let table = table();
    let mut crc = 0xFFFF_FFFFu32;
    for &b in bytes {
        let idx = ((crc ^ b as u32) & 0xFF) as usize;
        crc = table[idx] ^ (crc >> 8);
    }
    crc ^ 0xFFFF_FFFF
}

/// Hashes a value into the ring's 32-bit key space.
pub trait RingHash {
    fn ring_hash(&self) -> u32;
}

impl RingHash for str {
    fn ring_hash(&self) -> u32 {
        crc32c(self.as_bytes())
    }
}

impl RingHash for String {
    fn ring_hash(&self) -> u32 {
        crc32c(self.as_bytes())
    }
}

impl RingHash for [u8] {
    fn ring_hash(&self) -> u32 {
        crc32c(self)
    }
}

impl RingHash for std::net::Ipv4Addr {
    fn ring_hash(&self) -> u32 {
        crc32c(&self.octets())
    }
}

impl RingHash for u32 {
    fn ring_hash(&self) -> u32 {
        crc32c(&self.to_le_bytes())
    }
}

impl RingHash for u64 {
    fn ring_hash(&self) -> u32 {
        crc32c(&self.to_le_bytes())
    }
}
