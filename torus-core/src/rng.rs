use serde::{Deserialize, Serialize};

const ZERO_SEED_REPLACEMENT: u32 = 0xDEAD_BEEF;

/// xorshift32. Client and oracle must agree on this bit for bit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SeededRng {
    state: u32,
}

impl SeededRng {
    pub fn new(seed: u32) -> Self {
        Self {
            state: if seed == 0 { ZERO_SEED_REPLACEMENT } else { seed },
        }
    }

    /// Restores a generator from an exported state. Zero is a fixed point of
    /// xorshift and is never produced by `new`, so it is rejected.
    pub fn from_state(state: u32) -> Option<Self> {
        (state != 0).then_some(Self { state })
    }

    pub fn state(&self) -> u32 {
        self.state
    }

    pub fn next(&mut self) -> u32 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        self.state = x;
        self.state
    }

    pub fn next_int(&mut self, max: u32) -> u32 {
        self.next() % max
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RngMode {
    /// Casual play, seeded from OS entropy.
    Default,
    /// Ranked/global/daily play; the seed travels in the replay proof.
    Seeded,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GameRng {
    mode: RngMode,
    inner: SeededRng,
}

impl GameRng {
    pub fn seeded(seed: u32) -> Self {
        Self {
            mode: RngMode::Seeded,
            inner: SeededRng::new(seed),
        }
    }

    pub fn unseeded() -> Self {
        Self {
            mode: RngMode::Default,
            inner: SeededRng::new(rand::random::<u32>()),
        }
    }

    pub fn from_parts(mode: RngMode, state: u32) -> Option<Self> {
        SeededRng::from_state(state).map(|inner| Self { mode, inner })
    }

    pub fn mode(&self) -> RngMode {
        self.mode
    }

    pub fn state(&self) -> u32 {
        self.inner.state()
    }

    pub fn next_color(&mut self, num_colors: u8) -> u8 {
        self.inner.next_int(u32::from(num_colors)) as u8
    }
}

/// Seed of a daily challenge: FNV-1a over the challenge id.
pub fn daily_seed(challenge_id: &str) -> u32 {
    let mut hash = 0x811C_9DC5u32;
    for byte in challenge_id.as_bytes() {
        hash ^= u32::from(*byte);
        hash = hash.wrapping_mul(0x0100_0193);
    }
    hash
}
