pub mod constants;
pub mod error;
pub mod replay;
pub mod rng;
pub mod session;
pub mod sim;
pub mod snapshot;
pub mod verify;

pub use error::{DecodeError, RejectedRun, Rejection, SnapshotError};
pub use replay::{
    decode_proof, encode_proof, InputEvent, ReplayProof, ReplayRecorder, WireInputEvent,
    WireReplayProof,
};
pub use rng::{daily_seed, GameRng, RngMode, SeededRng};
pub use session::{Session, SessionObserver, SessionSnapshot};
pub use sim::{
    simulate, Difficulty, Engine, GameOverPayload, Move, Phase, PoleCell, RunState, TickOutcome,
    Torus,
};
pub use snapshot::{EngineSnapshot, RngSnapshot};
pub use verify::{
    check, check_with_limits, verify, verify_with_limits, VerificationResult, VerifyLimits,
};
