//! IMAP command tag generator.
//!
//! Tags are used to match commands with their responses. A generator is
//! bound to one uppercase letter and yields `<letter><three digits>`,
//! wrapping after 999, which keeps at most a thousand tags distinct —
//! far more than the client ever has in flight.

use rand::Rng;

/// Highest counter value before the generator wraps to zero.
pub const MAX_TAG_INDEX: u16 = 999;

/// Tag generator for IMAP commands.
///
/// Generates sequential tags in the format "A000", "A001", etc.
#[derive(Debug, Clone)]
pub struct TagGenerator {
    letter: char,
    index: u16,
}

impl TagGenerator {
    /// Creates a new tag generator with the given prefix letter.
    #[must_use]
    pub const fn new(letter: char) -> Self {
        Self { letter, index: 0 }
    }

    /// Creates a new tag generator with a uniformly random prefix
    /// letter from `A..=Z`.
    #[must_use]
    pub fn random() -> Self {
        let letter = rand::thread_rng().gen_range(b'A'..=b'Z');
        Self::new(char::from(letter))
    }

    /// Generates the next tag and advances the counter.
    #[must_use]
    pub fn generate(&mut self) -> String {
        let index = self.index;
        self.index = if self.index >= MAX_TAG_INDEX {
            0
        } else {
            self.index + 1
        };
        format!("{}{:03}", self.letter, index)
    }

    /// Returns a human-readable label for this generator, e.g. `AXXX`.
    ///
    /// Useful for diagnostics that refer to a connection rather than a
    /// specific command.
    #[must_use]
    pub fn label(&self) -> String {
        format!("{}XXX", self.letter)
    }

    /// Returns the prefix letter.
    #[must_use]
    pub const fn letter(&self) -> char {
        self.letter
    }
}

impl Default for TagGenerator {
    fn default() -> Self {
        Self::random()
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::unreadable_literal
)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_generation() {
        let mut generator = TagGenerator::new('A');
        assert_eq!(generator.generate(), "A000");
        assert_eq!(generator.generate(), "A001");
        assert_eq!(generator.generate(), "A002");
    }

    #[test]
    fn test_zero_padding() {
        let mut generator = TagGenerator::new('T');
        for _ in 0..99 {
            let _ = generator.generate();
        }
        assert_eq!(generator.generate(), "T099");
        assert_eq!(generator.generate(), "T100");
    }

    #[test]
    fn test_wrap_at_max_index() {
        let mut generator = TagGenerator::new('L');
        for _ in 0..=MAX_TAG_INDEX {
            let _ = generator.generate();
        }
        // 1000 tags generated; the counter has wrapped.
        assert_eq!(generator.generate(), "L000");
    }

    #[test]
    fn test_full_sequence_is_exact() {
        let mut generator = TagGenerator::new('L');
        let tags: Vec<String> = (0..2000).map(|_| generator.generate()).collect();
        for (i, tag) in tags.iter().enumerate() {
            assert_eq!(*tag, format!("L{:03}", i % 1000));
        }
    }

    #[test]
    fn test_label() {
        let generator = TagGenerator::new('Q');
        assert_eq!(generator.label(), "QXXX");
    }

    #[test]
    fn test_random_letter_in_range() {
        for _ in 0..100 {
            let generator = TagGenerator::random();
            assert!(generator.letter().is_ascii_uppercase());
        }
    }
}
