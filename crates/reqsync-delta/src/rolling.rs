/// Polynomial rolling hash over a fixed-width window.
///
/// All arithmetic wraps in `u64`; collisions are expected and callers
/// verify candidate matches byte for byte.
#[derive(Clone, Debug)]
pub struct RollingHash {
    width: usize,
    value: u64,
    /// `BASE^(width - 1)`, the weight of the byte leaving the window.
    high: u64,
}

const BASE: u64 = 0x0100_0000_01b3;

impl RollingHash {
    /// Hash the first `window.len()` bytes as a fresh window.
    pub fn new(window: &[u8]) -> Self {
        let width = window.len();
        let high = (1..width).fold(1u64, |acc, _| acc.wrapping_mul(BASE));
        Self {
            width,
            value: Self::hash(window),
            high,
        }
    }

    /// Hash of an arbitrary slice, equal to `RollingHash::new(slice).value()`.
    pub fn hash(data: &[u8]) -> u64 {
        data.iter()
            .fold(0u64, |acc, &b| acc.wrapping_mul(BASE).wrapping_add(u64::from(b) + 1))
    }

    pub fn value(&self) -> u64 {
        self.value
    }

    pub fn width(&self) -> usize {
        self.width
    }

    /// Slide the window one byte: drop `outgoing`, append `incoming`.
    pub fn roll(&mut self, outgoing: u8, incoming: u8) {
        let out = (u64::from(outgoing) + 1).wrapping_mul(self.high);
        self.value = self
            .value
            .wrapping_sub(out)
            .wrapping_mul(BASE)
            .wrapping_add(u64::from(incoming) + 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rolled_value_matches_fresh_hash() {
        let data = b"the quick brown fox jumps over the lazy dog";
        let width = 7;
        let mut rolling = RollingHash::new(&data[..width]);
        for start in 1..=data.len() - width {
            rolling.roll(data[start - 1], data[start + width - 1]);
            assert_eq!(
                rolling.value(),
                RollingHash::hash(&data[start..start + width]),
                "mismatch at window {start}"
            );
        }
    }

    #[test]
    fn zero_bytes_contribute() {
        assert_ne!(RollingHash::hash(&[0]), RollingHash::hash(&[0, 0]));
    }

    #[test]
    fn width_one_rolls() {
        let mut rolling = RollingHash::new(b"a");
        assert_eq!(rolling.width(), 1);
        rolling.roll(b'a', b'b');
        assert_eq!(rolling.value(), RollingHash::hash(b"b"));
    }
}
