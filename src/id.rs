//! Time-sortable event identifiers.
//!
//! Event ids are fixed-width strings that sort lexicographically in
//! generation order: a base-36 millisecond timestamp, a per-tick sequence
//! counter, and a random suffix. The counter breaks ties between ids
//! generated within the same millisecond, so ordering never depends on the
//! random component. Cross-process collisions are accepted as astronomically
//! unlikely given the suffix width; there is no detection or retry.

use parking_lot::Mutex;
use rand::Rng;

/// Width of the base-36 timestamp prefix. Nine digits of base-36 millis
/// cover timestamps past the year 5000.
const TS_WIDTH: usize = 9;

/// Width of the per-millisecond sequence counter.
const SEQ_WIDTH: usize = 4;

/// Width of the random suffix.
const RAND_WIDTH: usize = 8;

/// Total fixed width of an event id.
pub const EVENT_ID_WIDTH: usize = TS_WIDTH + SEQ_WIDTH + RAND_WIDTH;

const BASE36: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Generates unique, lexicographically sortable event identifiers.
///
/// One generator lives inside each [`Telemetry`](crate::Telemetry) handle.
/// Ids from a single generator are strictly increasing in call order, even
/// when several calls land in the same millisecond tick.
pub struct EventIdGenerator {
    state: Mutex<TickState>,
}

struct TickState {
    last_ms: i64,
    seq: u32,
}

impl EventIdGenerator {
    /// Create a generator with no observed ticks.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(TickState { last_ms: -1, seq: 0 }),
        }
    }

    /// Produce the next id.
    pub fn next_id(&self) -> String {
        let now_ms = chrono::Utc::now().timestamp_millis();
        let (ms, seq) = {
            let mut state = self.state.lock();
            if now_ms > state.last_ms {
                state.last_ms = now_ms;
                state.seq = 0;
            } else {
                // Same tick, or a clock that read backwards: stay on the
                // last observed tick and bump the counter.
                state.seq += 1;
            }
            (state.last_ms, state.seq)
        };

        let mut id = String::with_capacity(EVENT_ID_WIDTH);
        encode_base36(ms as u64, TS_WIDTH, &mut id);
        encode_base36(u64::from(seq), SEQ_WIDTH, &mut id);
        let mut rng = rand::thread_rng();
        for _ in 0..RAND_WIDTH {
            id.push(BASE36[rng.gen_range(0..36)] as char);
        }
        id
    }
}

impl Default for EventIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

/// Append `value` to `out` as zero-padded base-36, exactly `width` digits.
fn encode_base36(mut value: u64, width: usize, out: &mut String) {
    let mut digits = [b'0'; 16];
    let mut i = width;
    while i > 0 {
        i -= 1;
        digits[i] = BASE36[(value % 36) as usize];
        value /= 36;
    }
    for &d in &digits[..width] {
        out.push(d as char);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn ids_have_fixed_width() {
        let gen = EventIdGenerator::new();
        for _ in 0..100 {
            assert_eq!(gen.next_id().len(), EVENT_ID_WIDTH);
        }
    }

    #[test]
    fn ids_are_strictly_increasing() {
        let gen = EventIdGenerator::new();
        let mut prev = gen.next_id();
        // A tight loop produces many same-millisecond ids, exercising the
        // sequence-counter tie-break.
        for _ in 0..10_000 {
            let next = gen.next_id();
            assert!(next > prev, "{next} should sort after {prev}");
            prev = next;
        }
    }

    #[test]
    fn timestamp_prefix_is_sortable() {
        let mut early = String::new();
        let mut late = String::new();
        encode_base36(1_000, super::TS_WIDTH, &mut early);
        encode_base36(1_000_000, super::TS_WIDTH, &mut late);
        assert!(early < late);
    }

    #[test]
    fn encode_pads_to_width() {
        let mut out = String::new();
        encode_base36(35, 4, &mut out);
        assert_eq!(out, "000z");
    }

    proptest! {
        #[test]
        fn base36_encoding_preserves_order(a in 0u64..1_000_000_000, b in 0u64..1_000_000_000) {
            let mut ea = String::new();
            let mut eb = String::new();
            encode_base36(a, 9, &mut ea);
            encode_base36(b, 9, &mut eb);
            prop_assert_eq!(a.cmp(&b), ea.cmp(&eb));
        }

        #[test]
        fn generator_stays_monotonic(n in 1usize..500) {
            let gen = EventIdGenerator::new();
            let ids: Vec<_> = (0..n).map(|_| gen.next_id()).collect();
            for pair in ids.windows(2) {
                prop_assert!(pair[0] < pair[1]);
            }
        }
    }
}
