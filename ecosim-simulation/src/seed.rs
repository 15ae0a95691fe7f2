use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;

/// Supplies seed strings when the host asks for an ecosystem without naming one.
pub trait SeedSource {
    fn next_seed(&mut self) -> String;
}

impl<F> SeedSource for F
where
    F: FnMut() -> String,
{
    fn next_seed(&mut self) -> String {
        self()
    }
}

const ONSETS: &[&str] = &[
    "b", "br", "c", "d", "dr", "f", "g", "gl", "k", "l", "m", "n", "p", "qu", "r", "s", "sh",
    "t", "th", "v", "z",
];
const VOWELS: &[&str] = &["a", "e", "i", "o", "u", "ae", "ia", "ou", "y"];
const CODAS: &[&str] = &["", "", "", "n", "r", "s", "l", "x", "th", "m"];

/// Builds short pronounceable names ("Thaelix", "Briamon") from syllable tables.
pub struct SyllableSeedSource {
    rng: Pcg32,
}

impl SyllableSeedSource {
    /// Seeded from the thread RNG, so names differ between runs.
    pub fn new() -> Self {
        Self::with_seed(rand::random())
    }

    pub fn with_seed(seed: u64) -> Self {
        Self { rng: Pcg32::seed_from_u64(seed) }
    }

    fn pick(&mut self, table: &[&'static str]) -> &'static str {
        table[self.rng.gen_range(0..table.len())]
    }
}

impl Default for SyllableSeedSource {
    fn default() -> Self {
        Self::new()
    }
}

impl SeedSource for SyllableSeedSource {
    fn next_seed(&mut self) -> String {
        let syllables = self.rng.gen_range(2..=3);
        let mut name = String::new();
        for index in 0..syllables {
            name.push_str(self.pick(ONSETS));
            name.push_str(self.pick(VOWELS));
            if index + 1 == syllables {
                name.push_str(self.pick(CODAS));
            }
        }

        let mut chars = name.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => name,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn syllable_names_are_reproducible_per_seed() {
        let mut a = SyllableSeedSource::with_seed(7);
        let mut b = SyllableSeedSource::with_seed(7);
        for _ in 0..5 {
            assert_eq!(a.next_seed(), b.next_seed());
        }
    }

    #[test]
    fn syllable_names_are_capitalized_words() {
        let mut source = SyllableSeedSource::with_seed(42);
        for _ in 0..20 {
            let name = source.next_seed();
            assert!(name.len() >= 4, "name too short: {name}");
            assert!(name.chars().next().unwrap().is_uppercase());
            assert!(name.chars().skip(1).all(|c| c.is_ascii_lowercase()));
        }
    }

    #[test]
    fn closures_are_seed_sources() {
        let mut counter = 0;
        let mut source = move || {
            counter += 1;
            format!("run-{counter}")
        };
        assert_eq!(SeedSource::next_seed(&mut source), "run-1");
        assert_eq!(SeedSource::next_seed(&mut source), "run-2");
    }
}
