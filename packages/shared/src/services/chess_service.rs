use chess::{Board, BoardStatus, ChessMove, MoveGen, Piece, Square, EMPTY};
use std::str::FromStr;

use crate::{
    models::{
        match_record::{Color, LastMove},
        requests::MoveRequest,
        snapshot::BoardFacts,
    },
    services::errors::chess_service_errors::ChessServiceError,
};

pub const STARTING_POSITION: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

/// Halfmove clock value at which the fifty-move rule ends the game.
const FIFTY_MOVE_HALFMOVES: u32 = 100;

/// A game-ending condition detected after a move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminalCondition {
    Checkmate { winner: Color },
    Stalemate,
    InsufficientMaterial,
    ThreefoldRepetition,
    FiftyMoveRule,
}

impl TerminalCondition {
    pub fn draw_reason(&self) -> Option<&'static str> {
        match self {
            TerminalCondition::Checkmate { .. } => None,
            TerminalCondition::Stalemate => Some("Draw by stalemate."),
            TerminalCondition::InsufficientMaterial => Some("Draw by insufficient material."),
            TerminalCondition::ThreefoldRepetition => Some("Draw by threefold repetition."),
            TerminalCondition::FiftyMoveRule => Some("Draw by fifty-move rule."),
        }
    }
}

/// Result of applying a legal move to a position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedMove {
    pub position: String,
    pub descriptor: LastMove,
}

/// Move legality and game-end detection for the match host. Positions are
/// FEN strings; `history` is the match's position history, newest last.
pub trait RulesEngine: Send + Sync {
    fn initial_position(&self) -> String;

    fn side_to_move(&self, position: &str) -> Result<Color, ChessServiceError>;

    fn apply_move(
        &self,
        position: &str,
        request: &MoveRequest,
    ) -> Result<AppliedMove, ChessServiceError>;

    /// Applies a move written in standard algebraic notation.
    fn apply_notation(
        &self,
        position: &str,
        notation: &str,
    ) -> Result<AppliedMove, ChessServiceError>;

    fn terminal_condition(
        &self,
        position: &str,
        history: &[String],
    ) -> Result<Option<TerminalCondition>, ChessServiceError>;

    fn board_facts(&self, position: &str, history: &[String])
        -> Result<BoardFacts, ChessServiceError>;

    /// Rebuilds the position history of a game from its move list.
    fn replay(&self, moves: &[String]) -> Result<Vec<String>, ChessServiceError> {
        let mut positions = vec![self.initial_position()];
        for notation in moves {
            let current = positions
                .last()
                .cloned()
                .unwrap_or_else(|| self.initial_position());
            let applied = self.apply_notation(&current, notation)?;
            positions.push(applied.position);
        }
        Ok(positions)
    }
}

/// `RulesEngine` backed by the `chess` crate.
#[derive(Clone, Default)]
pub struct ChessService;

impl ChessService {
    pub fn new() -> Self {
        ChessService
    }

    fn parse_board(position: &str) -> Result<Board, ChessServiceError> {
        Board::from_str(position)
            .map_err(|e| ChessServiceError::InvalidPosition(format!("Invalid FEN: {}", e)))
    }

    fn parse_square(value: &str, label: &str) -> Result<Square, ChessServiceError> {
        Square::from_str(&value.trim().to_lowercase())
            .map_err(|_| ChessServiceError::ValidationError(format!("Invalid {} square", label)))
    }

    fn parse_promotion(value: Option<&str>) -> Result<Piece, ChessServiceError> {
        match value.map(|p| p.trim().to_lowercase()).as_deref() {
            None | Some("") | Some("q") => Ok(Piece::Queen),
            Some("r") => Ok(Piece::Rook),
            Some("b") => Ok(Piece::Bishop),
            Some("n") => Ok(Piece::Knight),
            _ => Err(ChessServiceError::ValidationError(
                "Invalid promotion piece".to_string(),
            )),
        }
    }

    fn ensure_ongoing(board: &Board) -> Result<(), ChessServiceError> {
        if board.status() != BoardStatus::Ongoing {
            return Err(ChessServiceError::GameOver(
                "Game is already over".to_string(),
            ));
        }
        Ok(())
    }

    /// Plays `chess_move` and rebuilds the FEN, carrying the move counters
    /// the `chess` crate does not track.
    fn play(position: &str, board: &Board, chess_move: ChessMove) -> AppliedMove {
        let (halfmove, fullmove) = move_counters(position);
        let mover = board.side_to_move();
        let resets_halfmove =
            board.piece_on(chess_move.get_source()) == Some(Piece::Pawn) || is_capture(board, chess_move);
        let next_halfmove = if resets_halfmove { 0 } else { halfmove + 1 };
        let next_fullmove = if mover == chess::Color::Black {
            fullmove + 1
        } else {
            fullmove
        };

        let after = board.make_move_new(chess_move);
        let fen = format!(
            "{} {} {}",
            placement_key(&after),
            next_halfmove,
            next_fullmove
        );

        AppliedMove {
            position: fen,
            descriptor: LastMove {
                from: chess_move.get_source().to_string(),
                to: chess_move.get_dest().to_string(),
                notation: notation_for(board, chess_move),
                capture: is_capture(board, chess_move),
                check: *after.checkers() != EMPTY,
                promotion: chess_move
                    .get_promotion()
                    .map(|piece| piece_letter(piece).to_ascii_lowercase().to_string()),
            },
        }
    }
}

impl RulesEngine for ChessService {
    fn initial_position(&self) -> String {
        STARTING_POSITION.to_string()
    }

    fn side_to_move(&self, position: &str) -> Result<Color, ChessServiceError> {
        let board = Self::parse_board(position)?;
        Ok(to_color(board.side_to_move()))
    }

    fn apply_move(
        &self,
        position: &str,
        request: &MoveRequest,
    ) -> Result<AppliedMove, ChessServiceError> {
        let board = Self::parse_board(position)?;
        Self::ensure_ongoing(&board)?;

        let from_sq = Self::parse_square(&request.from, "from")?;
        let to_sq = Self::parse_square(&request.to, "to")?;
        let promotion = Self::parse_promotion(request.promotion.as_deref())?;

        // The promotion piece only matters when the pawn actually promotes.
        let chess_move = MoveGen::new_legal(&board)
            .find(|candidate| {
                candidate.get_source() == from_sq
                    && candidate.get_dest() == to_sq
                    && candidate
                        .get_promotion()
                        .map_or(true, |piece| piece == promotion)
            })
            .ok_or_else(|| ChessServiceError::IllegalMove("Move is not legal".to_string()))?;

        Ok(Self::play(position, &board, chess_move))
    }

    fn apply_notation(
        &self,
        position: &str,
        notation: &str,
    ) -> Result<AppliedMove, ChessServiceError> {
        let board = Self::parse_board(position)?;
        Self::ensure_ongoing(&board)?;

        let wanted = notation.trim().trim_end_matches(['+', '#']);
        let chess_move = MoveGen::new_legal(&board)
            .find(|candidate| notation_for(&board, *candidate).trim_end_matches(['+', '#']) == wanted)
            .ok_or_else(|| {
                ChessServiceError::IllegalMove(format!("No legal move matches {}", notation))
            })?;

        Ok(Self::play(position, &board, chess_move))
    }

    fn terminal_condition(
        &self,
        position: &str,
        history: &[String],
    ) -> Result<Option<TerminalCondition>, ChessServiceError> {
        let board = Self::parse_board(position)?;

        let condition = match board.status() {
            BoardStatus::Checkmate => Some(TerminalCondition::Checkmate {
                winner: to_color(board.side_to_move()).opponent(),
            }),
            BoardStatus::Stalemate => Some(TerminalCondition::Stalemate),
            BoardStatus::Ongoing => {
                if insufficient_material(&board) {
                    Some(TerminalCondition::InsufficientMaterial)
                } else if repetition_count(&board, history) >= 3 {
                    Some(TerminalCondition::ThreefoldRepetition)
                } else if move_counters(position).0 >= FIFTY_MOVE_HALFMOVES {
                    Some(TerminalCondition::FiftyMoveRule)
                } else {
                    None
                }
            }
        };

        Ok(condition)
    }

    fn board_facts(
        &self,
        position: &str,
        history: &[String],
    ) -> Result<BoardFacts, ChessServiceError> {
        let board = Self::parse_board(position)?;
        let condition = self.terminal_condition(position, history)?;
        let side = board.side_to_move();
        let in_check = *board.checkers() != EMPTY;

        Ok(BoardFacts {
            turn: Some(to_color(side)),
            in_check,
            check_square: in_check.then(|| board.king_square(side).to_string()),
            is_checkmate: matches!(condition, Some(TerminalCondition::Checkmate { .. })),
            is_stalemate: condition == Some(TerminalCondition::Stalemate),
            is_draw: condition.is_some_and(|c| c.draw_reason().is_some()),
            is_game_over: condition.is_some(),
        })
    }
}

fn to_color(color: chess::Color) -> Color {
    match color {
        chess::Color::White => Color::White,
        chess::Color::Black => Color::Black,
    }
}

/// First four FEN fields: placement, side to move, castling rights and en
/// passant target. The `chess` crate writes the capturable pawn's square in
/// the last field, so it is moved to the square behind that pawn. Parsing only
/// reads the file, so either form loads back to the same board.
fn placement_key(board: &Board) -> String {
    let written = board.to_string();
    let mut fields: Vec<&str> = written.split_whitespace().take(3).collect();
    let target = board
        .en_passant()
        .map(|pawn| pawn.uforward(board.side_to_move()).to_string());
    fields.push(target.as_deref().unwrap_or("-"));
    fields.join(" ")
}

fn move_counters(position: &str) -> (u32, u32) {
    let mut fields = position.split_whitespace().skip(4);
    let halfmove = fields.next().and_then(|f| f.parse().ok()).unwrap_or(0);
    let fullmove = fields.next().and_then(|f| f.parse().ok()).unwrap_or(1);
    (halfmove, fullmove)
}

fn repetition_count(board: &Board, history: &[String]) -> usize {
    let key = placement_key(board);
    history
        .iter()
        .filter_map(|fen| Board::from_str(fen).ok())
        .filter(|past| placement_key(past) == key)
        .count()
}

fn insufficient_material(board: &Board) -> bool {
    let decisive =
        *board.pieces(Piece::Pawn) | *board.pieces(Piece::Rook) | *board.pieces(Piece::Queen);
    if decisive.popcnt() > 0 {
        return false;
    }

    let knights = board.pieces(Piece::Knight).popcnt();
    let bishops = *board.pieces(Piece::Bishop);

    match (knights, bishops.popcnt()) {
        (0, 0) | (1, 0) => true,
        (0, _) => {
            let mut shades = bishops.map(square_shade);
            match shades.next() {
                Some(first) => shades.all(|shade| shade == first),
                None => true,
            }
        }
        _ => false,
    }
}

fn square_shade(square: Square) -> usize {
    (square.get_file().to_index() + square.get_rank().to_index()) % 2
}

fn is_capture(board: &Board, chess_move: ChessMove) -> bool {
    let source = chess_move.get_source();
    let dest = chess_move.get_dest();
    if board.piece_on(dest).is_some() {
        return true;
    }
    // En passant: a pawn changing file onto an empty square.
    board.piece_on(source) == Some(Piece::Pawn) && source.get_file() != dest.get_file()
}

fn piece_letter(piece: Piece) -> char {
    match piece {
        Piece::Pawn => 'P',
        Piece::Knight => 'N',
        Piece::Bishop => 'B',
        Piece::Rook => 'R',
        Piece::Queen => 'Q',
        Piece::King => 'K',
    }
}

fn file_char(square: Square) -> char {
    (b'a' + square.get_file().to_index() as u8) as char
}

fn rank_char(square: Square) -> char {
    (b'1' + square.get_rank().to_index() as u8) as char
}

/// Standard algebraic notation for a legal move of `board`.
fn notation_for(board: &Board, chess_move: ChessMove) -> String {
    let source = chess_move.get_source();
    let dest = chess_move.get_dest();
    let piece = board.piece_on(source).unwrap_or(Piece::Pawn);
    let after = board.make_move_new(chess_move);

    let suffix = match after.status() {
        BoardStatus::Checkmate => "#",
        _ if *after.checkers() != EMPTY => "+",
        _ => "",
    };

    if piece == Piece::King {
        let delta = dest.get_file().to_index() as i32 - source.get_file().to_index() as i32;
        if delta == 2 {
            return format!("O-O{}", suffix);
        }
        if delta == -2 {
            return format!("O-O-O{}", suffix);
        }
    }

    let capture = is_capture(board, chess_move);
    let mut notation = String::new();

    if piece == Piece::Pawn {
        if capture {
            notation.push(file_char(source));
            notation.push('x');
        }
        notation.push_str(&dest.to_string());
        if let Some(promotion) = chess_move.get_promotion() {
            notation.push('=');
            notation.push(piece_letter(promotion));
        }
    } else {
        notation.push(piece_letter(piece));
        notation.push_str(&disambiguation(board, chess_move, piece));
        if capture {
            notation.push('x');
        }
        notation.push_str(&dest.to_string());
    }

    notation.push_str(suffix);
    notation
}

fn disambiguation(board: &Board, chess_move: ChessMove, piece: Piece) -> String {
    let source = chess_move.get_source();
    let rivals: Vec<Square> = MoveGen::new_legal(board)
        .filter(|candidate| {
            candidate.get_dest() == chess_move.get_dest()
                && candidate.get_source() != source
                && board.piece_on(candidate.get_source()) == Some(piece)
        })
        .map(|candidate| candidate.get_source())
        .collect();

    if rivals.is_empty() {
        String::new()
    } else if rivals.iter().all(|s| s.get_file() != source.get_file()) {
        file_char(source).to_string()
    } else if rivals.iter().all(|s| s.get_rank() != source.get_rank()) {
        rank_char(source).to_string()
    } else {
        format!("{}{}", file_char(source), rank_char(source))
    }
}
