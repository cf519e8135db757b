/// Direction symbols and the sequence generator.
///
/// A sequence is what the player has to reproduce, one symbol per key press.
/// Generation is gameplay randomness only: every symbol is an independent,
/// uniform draw from the four directions.

use rand::Rng;

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    pub const ALL: [Direction; 4] = [Direction::Up, Direction::Down, Direction::Left, Direction::Right];

    /// Arrow glyph used by the renderer.
    pub fn glyph(self) -> char {
        match self {
            Direction::Up => '↑',
            Direction::Down => '↓',
            Direction::Left => '←',
            Direction::Right => '→',
        }
    }
}

pub type Sequence = Vec<Direction>;

/// Produces fresh sequences on demand.
///
/// Generic over the RNG so tests can pin a seed.
pub struct SequenceGenerator<R: Rng> {
    rng: R,
}

impl SequenceGenerator<rand::rngs::ThreadRng> {
    pub fn from_entropy() -> Self {
        Self::new(rand::thread_rng())
    }
}

impl<R: Rng> SequenceGenerator<R> {
    pub fn new(rng: R) -> Self {
        SequenceGenerator { rng }
    }

    /// Exactly `length` symbols. Callers never ask for zero.
    pub fn generate(&mut self, length: usize) -> Sequence {
        debug_assert!(length >= 1, "sequence length must be positive");
        (0..length)
            .map(|_| Direction::ALL[self.rng.gen_range(0..Direction::ALL.len())])
            .collect()
    }
}
