use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;

/// Generator used everywhere randomness is needed.
pub type SimRng = Xoshiro256PlusPlus;

/// Owned, seedable source of independent random streams.
///
/// Worker streams are copies of the master taken `2^128` draws apart
/// (`jump`), so they never overlap each other or the master.
#[derive(Debug, Clone)]
pub struct RngStreams {
    master: SimRng,
}

impl RngStreams {
    pub fn new(seed: u64) -> Self {
        Self {
            master: SimRng::seed_from_u64(seed),
        }
    }

    /// Generator for serial work (emission, initial population).
    pub fn master(&mut self) -> &mut SimRng {
        &mut self.master
    }

    /// Takes `n` non-overlapping worker streams and advances the master past them.
    pub fn split(&mut self, n: usize) -> Vec<SimRng> {
        (0..n)
            .map(|_| {
                let stream = self.master.clone();
                self.master.jump();
                stream
            })
            .collect()
    }
}
