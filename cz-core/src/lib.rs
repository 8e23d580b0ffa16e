//! cz-core: game contracts, chess rules, the move-index codec and configuration.

pub mod action;
pub mod config;
pub mod game;
pub mod policy;
pub mod position;

pub use action::{
    decode, encode, move_from_policy_index, move_to_policy_index, CodecError, MoveDelta,
    MOVES_PER_SQUARE, POLICY_SIZE,
};
pub use config::{Config, ConfigError, UcbVariant};
pub use game::{Game, Outcome};
pub use policy::{legal_policy_mask, mask_policy, sample_move};
pub use position::{parse_uci, uci, Chess, Position, PositionError, START_FEN};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_nonempty() {
        assert!(!VERSION.is_empty());
    }
}
