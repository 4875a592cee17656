pub mod crc32c;
pub mod ring;

pub use crc32c::{crc32c, RingHash};
pub use ring::HashRing;
