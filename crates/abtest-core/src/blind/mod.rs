//! Blind test permutation engine
//!
//! When blind mode is switched on, the enabled input groups are put into a
//! random order and the result is packed into one `u32` under
//! `/shuffle_indices`. Every observer, the writer included, derives the grid
//! it shows from that word, so all of them agree on which button plays which
//! group.
//!
//! ```text
//! bte on / shuf ──► BlindShuffler::shuffle ──► ShuffleState ──► encode ──► KVT
//!                                                                          │
//!                       grid order ◄── decode ◄── KvtChange ◄──────────────┘
//! ```

pub mod packed;
mod shuffle;

pub use packed::{decode, encode, SLOT_COUNT};
pub use shuffle::{BlindShuffler, PermutationEntry, ShuffleState, MIN_BLIND_CHANNELS};
