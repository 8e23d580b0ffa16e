//! Chess positions and the [`Game`] adapter over the `chess` crate.
//!
//! The `chess` crate tracks board, side to move, castling rights and en passant.
//! Move clocks are kept here so the full six-field FEN can serve as the state key.

use std::fmt;
use std::str::FromStr;

use chess::{Board, BoardStatus, ChessMove, Color, File, MoveGen, Piece, Rank, Square};
use thiserror::Error;

use crate::game::{Game, Outcome};

pub const START_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

/// Plies without a capture or pawn move after which the game is drawn (75-move rule).
pub const SEVENTY_FIVE_MOVE_PLIES: u32 = 150;

const DARK_SQUARES: u64 = 0xAA55_AA55_AA55_AA55;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PositionError {
    #[error("FEN needs at least 4 fields: {fen:?}")]
    MissingFields { fen: String },
    #[error("invalid board in FEN {fen:?}")]
    Board { fen: String },
    #[error("invalid move counter {field:?}")]
    Counter { field: String },
    #[error("invalid move text {text:?}")]
    MoveText { text: String },
}

/// A chess position with move clocks.
#[derive(Clone, Copy)]
pub struct Position {
    pub board: Board,
    pub halfmove_clock: u32,
    pub fullmove_number: u32,
}

impl Position {
    pub fn startpos() -> Self {
        Self {
            board: Board::default(),
            halfmove_clock: 0,
            fullmove_number: 1,
        }
    }

    pub fn side_to_move(&self) -> Color {
        self.board.side_to_move()
    }

    pub fn legal_moves(&self) -> Vec<ChessMove> {
        MoveGen::new_legal(&self.board).collect()
    }

    /// Successor position. `mv` must be legal here.
    pub fn play(&self, mv: ChessMove) -> Position {
        let resets_clock = self.board.piece_on(mv.get_source()) == Some(Piece::Pawn)
            || self.board.piece_on(mv.get_dest()).is_some();
        let fullmove_number = match self.board.side_to_move() {
            Color::White => self.fullmove_number,
            Color::Black => self.fullmove_number + 1,
        };
        Position {
            board: self.board.make_move_new(mv),
            halfmove_clock: if resets_clock {
                0
            } else {
                self.halfmove_clock + 1
            },
            fullmove_number,
        }
    }

    pub fn outcome(&self) -> Outcome<Color> {
        match self.board.status() {
            BoardStatus::Checkmate => Outcome::win(opponent(self.board.side_to_move())),
            BoardStatus::Stalemate => Outcome::draw(),
            BoardStatus::Ongoing => {
                if self.halfmove_clock >= SEVENTY_FIVE_MOVE_PLIES
                    || self.is_insufficient_material()
                {
                    Outcome::draw()
                } else {
                    Outcome::ONGOING
                }
            }
        }
    }

    /// Neither side can possibly deliver mate.
    pub fn is_insufficient_material(&self) -> bool {
        self.has_insufficient_material(Color::White) && self.has_insufficient_material(Color::Black)
    }

    fn has_insufficient_material(&self, color: Color) -> bool {
        let b = &self.board;
        let ours = b.color_combined(color).0;
        let pawns = b.pieces(Piece::Pawn).0;
        let knights = b.pieces(Piece::Knight).0;
        let bishops = b.pieces(Piece::Bishop).0;
        let heavy = pawns | b.pieces(Piece::Rook).0 | b.pieces(Piece::Queen).0;

        if ours & heavy != 0 {
            return false;
        }
        if ours & knights != 0 {
            // A lone knight can only mate against a king boxed in by its own pieces.
            let theirs = b.color_combined(opponent(color)).0;
            let kings_and_queens = b.pieces(Piece::King).0 | b.pieces(Piece::Queen).0;
            return ours.count_ones() <= 2 && theirs & !kings_and_queens == 0;
        }
        if ours & bishops != 0 {
            let same_color = bishops & DARK_SQUARES == 0 || bishops & !DARK_SQUARES == 0;
            return same_color && pawns == 0 && knights == 0;
        }
        true
    }

    pub fn fen(&self) -> String {
        self.to_string()
    }
}

impl Default for Position {
    fn default() -> Self {
        Self::startpos()
    }
}

impl FromStr for Position {
    type Err = PositionError;

    fn from_str(fen: &str) -> Result<Self, Self::Err> {
        let fields: Vec<&str> = fen.split_whitespace().collect();
        if fields.len() < 4 {
            return Err(PositionError::MissingFields {
                fen: fen.to_string(),
            });
        }
        let halfmove_clock = parse_counter(fields.get(4).copied(), 0)?;
        let fullmove_number = parse_counter(fields.get(5).copied(), 1)?;
        let placement = format!("{} 0 1", fields[..4].join(" "));
        let board = Board::from_str(&placement).map_err(|_| PositionError::Board {
            fen: fen.to_string(),
        })?;
        Ok(Self {
            board,
            halfmove_clock,
            fullmove_number,
        })
    }
}

fn parse_counter(field: Option<&str>, default: u32) -> Result<u32, PositionError> {
    match field {
        None => Ok(default),
        Some(f) => f.parse().map_err(|_| PositionError::Counter {
            field: f.to_string(),
        }),
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Placement, side to move and castling come from the board. The board
        // reports en passant as the capturable pawn, FEN wants the square behind it.
        let board_fen = self.board.to_string();
        let fields: Vec<&str> = board_fen.split_whitespace().take(3).collect();
        write!(f, "{} ", fields.join(" "))?;
        match self.board.en_passant() {
            Some(pawn) => {
                let mut target = String::with_capacity(2);
                push_square(&mut target, pawn.uforward(self.board.side_to_move()));
                f.write_str(&target)?;
            }
            None => f.write_str("-")?,
        }
        write!(f, " {} {}", self.halfmove_clock, self.fullmove_number)
    }
}

impl fmt::Debug for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Position({self})")
    }
}

pub fn opponent(color: Color) -> Color {
    match color {
        Color::White => Color::Black,
        Color::Black => Color::White,
    }
}

/// Long algebraic notation, e.g. `e2e4` or `e7e8n`.
pub fn uci(mv: ChessMove) -> String {
    let mut out = String::with_capacity(5);
    push_square(&mut out, mv.get_source());
    push_square(&mut out, mv.get_dest());
    if let Some(p) = mv.get_promotion() {
        out.push(match p {
            Piece::Knight => 'n',
            Piece::Bishop => 'b',
            Piece::Rook => 'r',
            _ => 'q',
        });
    }
    out
}

fn push_square(out: &mut String, sq: Square) {
    out.push((b'a' + sq.get_file().to_index() as u8) as char);
    out.push((b'1' + sq.get_rank().to_index() as u8) as char);
}

pub fn parse_square(text: &str) -> Option<Square> {
    let bytes = text.as_bytes();
    if bytes.len() != 2 {
        return None;
    }
    let file = bytes[0].checked_sub(b'a').filter(|f| *f < 8)?;
    let rank = bytes[1].checked_sub(b'1').filter(|r| *r < 8)?;
    Some(Square::make_square(
        Rank::from_index(rank as usize),
        File::from_index(file as usize),
    ))
}

/// Parses long algebraic notation. Does not check legality.
pub fn parse_uci(text: &str) -> Result<ChessMove, PositionError> {
    let bad = || PositionError::MoveText {
        text: text.to_string(),
    };
    if !text.is_ascii() || !(4..=5).contains(&text.len()) {
        return Err(bad());
    }
    let from = parse_square(&text[0..2]).ok_or_else(bad)?;
    let to = parse_square(&text[2..4]).ok_or_else(bad)?;
    let promotion = match text.as_bytes().get(4) {
        None => None,
        Some(b'n') => Some(Piece::Knight),
        Some(b'b') => Some(Piece::Bishop),
        Some(b'r') => Some(Piece::Rook),
        Some(b'q') => Some(Piece::Queen),
        Some(_) => return Err(bad()),
    };
    Ok(ChessMove::new(from, to, promotion))
}

/// Standard chess as a [`Game`]; the state key is the full FEN.
#[derive(Debug, Clone, Copy, Default)]
pub struct Chess;

impl Game for Chess {
    type State = Position;
    type Key = String;
    type Action = ChessMove;
    type Player = Color;

    fn key(&self, state: &Position) -> String {
        state.fen()
    }

    fn legal_actions(&self, state: &Position, out: &mut Vec<ChessMove>) {
        out.extend(MoveGen::new_legal(&state.board));
    }

    fn apply(&self, state: &Position, action: &ChessMove) -> Position {
        state.play(*action)
    }

    fn outcome(&self, state: &Position) -> Outcome<Color> {
        state.outcome()
    }

    fn to_play(&self, state: &Position) -> Color {
        state.side_to_move()
    }
}
