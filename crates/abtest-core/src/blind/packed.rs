//! Packed permutation word
//!
//! ```text
//! bit  31..28  27..24  ...  7..4   3..0
//!      slot 7  slot 6  ...  slot 1 slot 0
//!
//! slot nibble:  1 i i i   valid, i = channel index (0..7)
//!               0 0 0 0   unused
//! ```
//!
//! This layout is what every observer of `/shuffle_indices` reads; keep it
//! bit-exact.

/// Number of slots in one word
pub const SLOT_COUNT: usize = 8;

/// Marks a used slot
pub const VALID_BIT: u32 = 0x8;

/// Channel index bits of a slot
pub const INDEX_MASK: u32 = 0x7;

const SLOT_BITS: usize = 4;

/// Pack an ordered channel list.
///
/// Only the first [`SLOT_COUNT`] entries are stored and indices are
/// truncated to 3 bits; remaining slots are left empty.
pub fn encode(order: &[usize]) -> u32 {
    order
        .iter()
        .take(SLOT_COUNT)
        .enumerate()
        .fold(0u32, |word, (slot, &index)| {
            let nibble = VALID_BIT | (index as u32 & INDEX_MASK);
            word | (nibble << (slot * SLOT_BITS))
        })
}

/// Unpack a word into an ordered channel list.
///
/// Empty slots, indices `>= channel_count` and repeated indices are skipped,
/// so a damaged word yields a shorter order instead of an error.
pub fn decode(word: u32, channel_count: usize) -> Vec<usize> {
    let mut order = Vec::with_capacity(SLOT_COUNT);
    for slot in 0..SLOT_COUNT {
        let nibble = (word >> (slot * SLOT_BITS)) & 0xF;
        if nibble & VALID_BIT == 0 {
            continue;
        }
        let index = (nibble & INDEX_MASK) as usize;
        if index >= channel_count || order.contains(&index) {
            continue;
        }
        order.push(index);
    }
    order
}
