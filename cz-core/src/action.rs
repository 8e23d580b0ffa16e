//! Move-index codec: chess moves <-> the fixed 8×8×73 action space.
//!
//! Per origin square there are 73 slots:
//! - 0..=55  : sliding moves, 8 directions (N, NE, E, SE, S, SW, W, NW) × distance 1..=7
//! - 56..=63 : the eight knight shapes
//! - 64..=72 : underpromotions, 3 direction buckets (west-diagonal, straight, east-diagonal)
//!   × piece (knight, bishop, rook)
//!
//! Queen promotion shares the index of the plain slide with the same delta.
//! The flat policy index is `(row * 8 + col) * 73 + slot` with row 0 on rank 8.

use chess::{ChessMove, File, Piece, Rank, Square};
use thiserror::Error;

use crate::position::Position;

pub const BOARD_N: usize = 8;
pub const MOVES_PER_SQUARE: usize = 73;
pub const POLICY_SIZE: usize = BOARD_N * BOARD_N * MOVES_PER_SQUARE; // 4672

pub const N_OFFSET: u8 = 0;
pub const NE_OFFSET: u8 = 7;
pub const E_OFFSET: u8 = 14;
pub const SE_OFFSET: u8 = 21;
pub const S_OFFSET: u8 = 28;
pub const SW_OFFSET: u8 = 35;
pub const W_OFFSET: u8 = 42;
pub const NW_OFFSET: u8 = 49;

pub const KNIGHT_OFFSET: u8 = 56;
pub const KNIGHT_UP_RIGHT: u8 = 56;
pub const KNIGHT_RIGHT_UP: u8 = 57;
pub const KNIGHT_RIGHT_DOWN: u8 = 58;
pub const KNIGHT_DOWN_RIGHT: u8 = 59;
pub const KNIGHT_DOWN_LEFT: u8 = 60;
pub const KNIGHT_LEFT_DOWN: u8 = 61;
pub const KNIGHT_LEFT_UP: u8 = 62;
pub const KNIGHT_UP_LEFT: u8 = 63;

pub const PROMOTION_OFFSET: u8 = 64;
pub const PROMOTION_VW: u8 = 64;
pub const PROMOTION_V: u8 = 67;
pub const PROMOTION_VE: u8 = 70;

pub const PROMOTION_KNIGHT: u8 = 0;
pub const PROMOTION_BISHOP: u8 = 1;
pub const PROMOTION_ROOK: u8 = 2;

/// (rank delta, file delta) of each knight slot, in slot order.
const KNIGHT_DELTAS: [(i8, i8); 8] = [
    (2, 1),
    (1, 2),
    (-1, 2),
    (-2, 1),
    (-2, -1),
    (-1, -2),
    (1, -2),
    (2, -1),
];

/// Unit (rank, file) step of each sliding direction, in offset order.
const DIRECTIONS: [(i8, i8); 8] = [
    (1, 0),
    (1, 1),
    (0, 1),
    (-1, 1),
    (-1, 0),
    (-1, -1),
    (0, -1),
    (1, -1),
];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("action index {index} out of range (limit {limit})")]
    IndexOutOfRange { index: usize, limit: usize },
    #[error("move delta ({rank_delta}, {file_delta}) cannot be classified")]
    UnclassifiableDirection { rank_delta: i8, file_delta: i8 },
    #[error("invalid promotion piece {piece:?}")]
    InvalidPromotion { piece: Piece },
    #[error("underpromotion slot decoded from non-promotion rank {rank}")]
    NotPromotionRank { rank: usize },
    #[error("delta ({rank_delta}, {file_delta}) leaves the board from square index {from}")]
    OffBoard {
        from: usize,
        rank_delta: i8,
        file_delta: i8,
    },
    #[error("policy has {len} entries, expected {expected}")]
    PolicyLength { len: usize, expected: usize },
}

/// Decoded slot relative to an origin square.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoveDelta {
    pub rank_delta: i8,
    pub file_delta: i8,
    /// Set only for slots 64..=72.
    pub underpromotion: Option<Piece>,
}

impl MoveDelta {
    pub fn destination(&self, from: Square) -> Result<Square, CodecError> {
        let rank = from.get_rank().to_index() as i8 + self.rank_delta;
        let file = from.get_file().to_index() as i8 + self.file_delta;
        if !(0..8).contains(&rank) || !(0..8).contains(&file) {
            return Err(CodecError::OffBoard {
                from: from.to_index(),
                rank_delta: self.rank_delta,
                file_delta: self.file_delta,
            });
        }
        Ok(Square::make_square(
            Rank::from_index(rank as usize),
            File::from_index(file as usize),
        ))
    }
}

/// Board row/column: row 0 is rank 8, column 0 is file a.
pub fn square_to_row_col(sq: Square) -> (usize, usize) {
    (7 - sq.get_rank().to_index(), sq.get_file().to_index())
}

/// Inverse of [`square_to_row_col`]. Both coordinates must be below 8.
pub fn row_col_to_square(row: usize, col: usize) -> Square {
    debug_assert!(row < BOARD_N && col < BOARD_N);
    Square::make_square(Rank::from_index(7 - row), File::from_index(col))
}

pub fn encode(from: Square, to: Square, promotion: Option<Piece>) -> Result<u8, CodecError> {
    let rank_delta = to.get_rank().to_index() as i8 - from.get_rank().to_index() as i8;
    let file_delta = to.get_file().to_index() as i8 - from.get_file().to_index() as i8;
    encode_delta(rank_delta, file_delta, promotion)
}

/// Slot of a move given by its (rank, file) delta.
pub fn encode_delta(
    rank_delta: i8,
    file_delta: i8,
    promotion: Option<Piece>,
) -> Result<u8, CodecError> {
    let unclassifiable = CodecError::UnclassifiableDirection {
        rank_delta,
        file_delta,
    };
    let sliding = rank_delta == 0 || file_delta == 0 || rank_delta.abs() == file_delta.abs();

    let plain = if sliding {
        let dist = rank_delta.abs().max(file_delta.abs());
        if dist == 0 || dist > 7 {
            return Err(unclassifiable);
        }
        let step = (rank_delta.signum(), file_delta.signum());
        let dir = DIRECTIONS
            .iter()
            .position(|d| *d == step)
            .ok_or_else(|| unclassifiable.clone())?;
        dir as u8 * 7 + dist as u8 - 1
    } else {
        let shape = KNIGHT_DELTAS
            .iter()
            .position(|d| *d == (rank_delta, file_delta))
            .ok_or_else(|| unclassifiable.clone())?;
        KNIGHT_OFFSET + shape as u8
    };

    let piece_offset = match promotion {
        None | Some(Piece::Queen) => return Ok(plain),
        Some(Piece::Knight) => PROMOTION_KNIGHT,
        Some(Piece::Bishop) => PROMOTION_BISHOP,
        Some(Piece::Rook) => PROMOTION_ROOK,
        Some(piece) => return Err(CodecError::InvalidPromotion { piece }),
    };
    let bucket = match plain {
        p if p >= KNIGHT_OFFSET => return Err(unclassifiable),
        p => match p / 7 * 7 {
            NW_OFFSET | SW_OFFSET => PROMOTION_VW,
            N_OFFSET | S_OFFSET => PROMOTION_V,
            NE_OFFSET | SE_OFFSET => PROMOTION_VE,
            _ => return Err(unclassifiable),
        },
    };
    Ok(bucket + piece_offset)
}

pub fn decode(index: u8, from: Square) -> Result<MoveDelta, CodecError> {
    if index as usize >= MOVES_PER_SQUARE {
        return Err(CodecError::IndexOutOfRange {
            index: index as usize,
            limit: MOVES_PER_SQUARE,
        });
    }
    if index < KNIGHT_OFFSET {
        let dist = (index % 7 + 1) as i8;
        let (dr, df) = DIRECTIONS[(index / 7) as usize];
        return Ok(MoveDelta {
            rank_delta: dr * dist,
            file_delta: df * dist,
            underpromotion: None,
        });
    }
    if index < PROMOTION_OFFSET {
        let (rank_delta, file_delta) = KNIGHT_DELTAS[(index - KNIGHT_OFFSET) as usize];
        return Ok(MoveDelta {
            rank_delta,
            file_delta,
            underpromotion: None,
        });
    }

    let rank_delta = match from.get_rank() {
        Rank::Seventh => 1,
        Rank::Second => -1,
        rank => {
            return Err(CodecError::NotPromotionRank {
                rank: rank.to_index(),
            })
        }
    };
    let slot = index - PROMOTION_OFFSET;
    let file_delta = match slot / 3 {
        0 => -1,
        1 => 0,
        _ => 1,
    };
    let piece = match slot % 3 {
        PROMOTION_KNIGHT => Piece::Knight,
        PROMOTION_BISHOP => Piece::Bishop,
        _ => Piece::Rook,
    };
    Ok(MoveDelta {
        rank_delta,
        file_delta,
        underpromotion: Some(piece),
    })
}

pub fn flat_index(from: Square, slot: u8) -> usize {
    let (row, col) = square_to_row_col(from);
    (row * BOARD_N + col) * MOVES_PER_SQUARE + slot as usize
}

/// Splits a flat policy index into origin square and slot.
pub fn unflatten(flat: usize) -> Result<(Square, u8), CodecError> {
    if flat >= POLICY_SIZE {
        return Err(CodecError::IndexOutOfRange {
            index: flat,
            limit: POLICY_SIZE,
        });
    }
    let cell = flat / MOVES_PER_SQUARE;
    let slot = (flat % MOVES_PER_SQUARE) as u8;
    Ok((row_col_to_square(cell / BOARD_N, cell % BOARD_N), slot))
}

pub fn move_to_policy_index(mv: ChessMove) -> Result<usize, CodecError> {
    let slot = encode(mv.get_source(), mv.get_dest(), mv.get_promotion())?;
    Ok(flat_index(mv.get_source(), slot))
}

/// Materializes the move for `flat` in `position`.
///
/// A pawn landing on the last rank promotes to the decoded piece (queen for
/// plain slots); every other move carries no promotion. Legality is not checked.
pub fn move_from_policy_index(position: &Position, flat: usize) -> Result<ChessMove, CodecError> {
    let (from, slot) = unflatten(flat)?;
    let delta = decode(slot, from)?;
    let to = delta.destination(from)?;
    let promotes = position.board.piece_on(from) == Some(Piece::Pawn)
        && matches!(to.get_rank(), Rank::First | Rank::Eighth);
    let promotion = if promotes {
        Some(delta.underpromotion.unwrap_or(Piece::Queen))
    } else {
        None
    };
    Ok(ChessMove::new(from, to, promotion))
}
