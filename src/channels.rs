//! Deterministic channel-table generation: the pairing secret both peers
//! must derive identically.

use rand_core::{RngCore, SeedableRng};
use rand_xorshift::XorShiftRng;

/// Number of entries in a hop table.
pub const CHANNELS_PER_TABLE: usize = 40;

/// A fixed radio channel, always present at index 0 of every table.
const FIXED_CHANNEL: u8 = 125;

/// Generates the shared 40-entry channel table for a `(low, high, seed)`
/// pairing secret.
///
/// `table[0]` is always [`FIXED_CHANNEL`]; `table[1..40]` is a Fisher-Yates
/// shuffle of `[low, low + 1, .., high]`, truncated (or, if the range is
/// short, only partially filled beyond the populated prefix) to the
/// remaining 39 slots. Two calls with identical arguments always produce
/// byte-identical tables: this is the sole mechanism by which a Master and
/// a Slave agree on a hop sequence.
pub fn generate_channels(low: u8, high: u8, seed: u64) -> [u8; CHANNELS_PER_TABLE] {
    let mut rng = XorShiftRng::seed_from_u64(seed);

    let mut pool = [0u8; CHANNELS_PER_TABLE - 1];
    let mut count = 0;
    for channel in low..=high {
        if count >= pool.len() {
            break;
        }
        pool[count] = channel;
        count += 1;
    }

    // Fisher-Yates, iterating from the last populated element down to 1.
    for i in (1..count).rev() {
        let j = (rng.next_u32() as usize) % (i + 1);
        pool.swap(i, j);
    }

    let mut table = [0u8; CHANNELS_PER_TABLE];
    table[0] = FIXED_CHANNEL;
    table[1..=count].copy_from_slice(&pool[..count]);
    table
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_starts_with_fixed_channel() {
        let table = generate_channels(10, 50, 42);
        assert_eq!(table[0], FIXED_CHANNEL);
    }

    #[test]
    fn table_is_deterministic_across_independent_calls() {
        // S1.
        let a = generate_channels(10, 50, 42);
        let b = generate_channels(10, 50, 42);
        assert_eq!(a, b);
    }

    #[test]
    fn table_tail_is_a_permutation_of_the_input_range() {
        let table = generate_channels(10, 50, 42);
        let mut tail = table[1..40].to_vec();
        tail.sort_unstable();
        let expected: Vec<u8> = (10..=48).collect();
        assert_eq!(tail, expected);
    }

    #[test]
    fn different_seeds_usually_produce_different_tables() {
        let a = generate_channels(10, 50, 1);
        let b = generate_channels(10, 50, 2);
        assert_ne!(a, b);
    }
}
