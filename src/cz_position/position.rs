// Copyright 2019 Karl Sundequist Blomdahl <karl.sundequist.blomdahl@gmail.com>
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! A self-contained `Position`: board state, legal move generation,
//! repetition-count bookkeeping and Zobrist hashing. This is the in-tree
//! stand-in for the chess rules engine -- the search core only ever
//! touches it through the handful of methods used below (`legal_moves`,
//! `make_move`, `hash`, `terminal`), so swapping in a real external rules
//! engine is a matter of re-implementing this file's public surface.

use std::fmt;

use crate::attacks::{self, BISHOP_DIRS, ROOK_DIRS};
use crate::color::Color;
use crate::hash::Hash;
use crate::mv::Move;
use crate::piece::{Piece, PieceType};
use crate::square::Square;
use crate::zobrist::{with_repetition_count, ZOBRIST};

/// The outcome of a position that admits no further play, from the point
/// of view of the side to move.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Terminal {
    Win,
    Draw,
    Loss
}

impl Terminal {
    /// The value backed up into the tree for this outcome, from the side
    /// to move's own perspective.
    pub fn value(self) -> f32 {
        match self {
            Terminal::Win => 1.0,
            Terminal::Draw => 0.0,
            Terminal::Loss => -1.0
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CastlingRights {
    pub white_king: bool,
    pub white_queen: bool,
    pub black_king: bool,
    pub black_queen: bool
}

/// A full board position, side to move, castling rights, en-passant
/// target and the two repetition-sensitive counters (halfmove clock and
/// an externally-maintained repetition count).
#[derive(Clone, Copy)]
pub struct Position {
    board: [Option<Piece>; 64],
    side_to_move: Color,
    castling: CastlingRights,
    en_passant: Option<Square>,
    halfmove_clock: u8,
    fullmove_number: u32,
    /// How many times this exact (board, side, castling, ep) state has
    /// been seen before in the current game, maintained by the caller
    /// (e.g. `Search`'s path or `SelfPlay`'s move history) and folded
    /// into `hash()`.
    repetitions: u8
}

impl Position {
    pub fn empty() -> Self {
        Self {
            board: [None; 64],
            side_to_move: Color::White,
            castling: CastlingRights::default(),
            en_passant: None,
            halfmove_clock: 0,
            fullmove_number: 1,
            repetitions: 0
        }
    }

    pub fn startpos() -> Self {
        Self::from_fen("rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1").expect("valid startpos FEN")
    }

    pub fn side_to_move(&self) -> Color {
        self.side_to_move
    }

    pub fn at(&self, sq: Square) -> Option<Piece> {
        self.board[sq.0 as usize]
    }

    pub fn castling(&self) -> CastlingRights {
        self.castling
    }

    pub fn en_passant(&self) -> Option<Square> {
        self.en_passant
    }

    pub fn halfmove_clock(&self) -> u8 {
        self.halfmove_clock
    }

    pub fn fullmove_number(&self) -> u32 {
        self.fullmove_number
    }

    pub fn repetitions(&self) -> u8 {
        self.repetitions
    }

    /// Returns a copy of this position with the externally-tracked
    /// repetition count overwritten. Called by whoever owns the move
    /// history (the search's path, or the self-play driver) once it has
    /// counted how many times this state has occurred before.
    pub fn with_repetitions(&self, repetitions: u8) -> Self {
        let mut out = *self;
        out.repetitions = repetitions;
        out
    }

    /// True if `self` and `other` are the same position for the purposes
    /// of threefold repetition: same board, side to move, castling rights
    /// and en-passant target. The halfmove clock, fullmove number and the
    /// repetition counter itself are deliberately excluded.
    pub fn same_for_repetition(&self, other: &Position) -> bool {
        self.board == other.board
            && self.side_to_move == other.side_to_move
            && self.castling == other.castling
            && self.en_passant == other.en_passant
    }

    fn king_square(&self, color: Color) -> Option<Square> {
        Square::all().find(|&sq| self.at(sq) == Some(Piece::new(color, PieceType::King)))
    }

    /// True if `by_color`'s pieces attack `sq` in the current position.
    pub fn is_attacked_by(&self, sq: Square, by_color: Color) -> bool {
        for target in attacks::knight_targets(sq) {
            if self.at(target) == Some(Piece::new(by_color, PieceType::Knight)) {
                return true;
            }
        }

        for target in attacks::king_targets(sq) {
            if self.at(target) == Some(Piece::new(by_color, PieceType::King)) {
                return true;
            }
        }

        // pawns attack "backwards" relative to their own push direction,
        // so a pawn of `by_color` attacks `sq` if it sits one rank behind
        // `sq` (from `by_color`'s push direction) on an adjacent file.
        let behind = match by_color {
            Color::White => -1,
            Color::Black => 1
        };

        for &df in &[-1i8, 1] {
            if let Some(origin) = sq.offset(df, behind) {
                if self.at(origin) == Some(Piece::new(by_color, PieceType::Pawn)) {
                    return true;
                }
            }
        }

        let rook_like = [PieceType::Rook, PieceType::Queen];
        let ray_hits_piece = |dirs: &[(i8, i8)], kinds: &[PieceType]| -> bool {
            for &(df, dr) in dirs {
                let mut current = sq;

                loop {
                    current = match current.offset(df, dr) {
                        Some(next) => next,
                        None => break
                    };

                    match self.at(current) {
                        None => continue,
                        Some(piece) if piece.color == by_color && kinds.contains(&piece.kind) => return true,
                        Some(_) => break
                    }
                }
            }

            false
        };

        ray_hits_piece(&ROOK_DIRS, &rook_like) || ray_hits_piece(&BISHOP_DIRS, &[PieceType::Bishop, PieceType::Queen])
    }

    pub fn is_in_check(&self, color: Color) -> bool {
        match self.king_square(color) {
            Some(king) => self.is_attacked_by(king, color.opposite()),
            None => false
        }
    }

    /// All moves that are legal in this position: pseudo-legal moves that
    /// do not leave the mover's own king in check.
    pub fn legal_moves(&self) -> Vec<Move> {
        self.pseudo_legal_moves()
            .into_iter()
            .filter(|&mv| !self.make_move(mv).is_in_check(self.side_to_move))
            .collect()
    }

    fn pseudo_legal_moves(&self) -> Vec<Move> {
        let mut moves = Vec::with_capacity(48);
        let us = self.side_to_move;

        for from in Square::all() {
            let piece = match self.at(from) {
                Some(piece) if piece.color == us => piece,
                _ => continue
            };

            match piece.kind {
                PieceType::Pawn => self.pawn_moves(from, us, &mut moves),
                PieceType::Knight => {
                    for to in attacks::knight_targets(from) {
                        self.push_if_destination_ok(from, to, us, &mut moves);
                    }
                },
                PieceType::King => {
                    for to in attacks::king_targets(from) {
                        self.push_if_destination_ok(from, to, us, &mut moves);
                    }
                    self.castling_moves(from, us, &mut moves);
                },
                PieceType::Bishop => self.sliding_moves(from, us, &BISHOP_DIRS, &mut moves),
                PieceType::Rook => self.sliding_moves(from, us, &ROOK_DIRS, &mut moves),
                PieceType::Queen => {
                    self.sliding_moves(from, us, &ROOK_DIRS, &mut moves);
                    self.sliding_moves(from, us, &BISHOP_DIRS, &mut moves);
                }
            }
        }

        moves
    }

    fn push_if_destination_ok(&self, from: Square, to: Square, us: Color, moves: &mut Vec<Move>) {
        match self.at(to) {
            Some(piece) if piece.color == us => {},
            _ => moves.push(Move::quiet(from, to))
        }
    }

    fn sliding_moves(&self, from: Square, us: Color, dirs: &[(i8, i8)], moves: &mut Vec<Move>) {
        for &(df, dr) in dirs {
            let mut current = from;

            loop {
                current = match current.offset(df, dr) {
                    Some(next) => next,
                    None => break
                };

                match self.at(current) {
                    None => moves.push(Move::quiet(from, current)),
                    Some(piece) if piece.color != us => {
                        moves.push(Move::quiet(from, current));
                        break;
                    },
                    Some(_) => break
                }
            }
        }
    }

    fn pawn_moves(&self, from: Square, us: Color, moves: &mut Vec<Move>) {
        let (forward, start_rank, promote_rank) = match us {
            Color::White => (1i8, 1i8, 7i8),
            Color::Black => (-1i8, 6i8, 0i8)
        };

        if let Some(one) = from.offset(0, forward) {
            if self.at(one).is_none() {
                self.push_pawn_destination(from, one, promote_rank, moves);

                if from.rank() == start_rank {
                    if let Some(two) = from.offset(0, 2 * forward) {
                        if self.at(two).is_none() {
                            moves.push(Move::quiet(from, two));
                        }
                    }
                }
            }
        }

        for &df in &[-1i8, 1] {
            let to = match from.offset(df, forward) {
                Some(sq) => sq,
                None => continue
            };

            let is_capture = matches!(self.at(to), Some(piece) if piece.color != us);
            let is_en_passant = self.en_passant == Some(to);

            if is_capture || is_en_passant {
                self.push_pawn_destination(from, to, promote_rank, moves);
            }
        }
    }

    fn push_pawn_destination(&self, from: Square, to: Square, promote_rank: i8, moves: &mut Vec<Move>) {
        if to.rank() == promote_rank {
            for &promotion in &[PieceType::Queen, PieceType::Knight, PieceType::Bishop, PieceType::Rook] {
                moves.push(Move::new(from, to, Some(promotion)));
            }
        } else {
            moves.push(Move::quiet(from, to));
        }
    }

    fn castling_moves(&self, from: Square, us: Color, moves: &mut Vec<Move>) {
        if self.is_in_check(us) {
            return;
        }

        let (king_flag, queen_flag, rank) = match us {
            Color::White => (self.castling.white_king, self.castling.white_queen, 0i8),
            Color::Black => (self.castling.black_king, self.castling.black_queen, 7i8)
        };
        let enemy = us.opposite();

        if king_flag {
            let f = Square::new(5, rank).unwrap();
            let g = Square::new(6, rank).unwrap();

            if self.at(f).is_none() && self.at(g).is_none()
                && !self.is_attacked_by(f, enemy) && !self.is_attacked_by(g, enemy)
            {
                moves.push(Move::quiet(from, g));
            }
        }

        if queen_flag {
            let d = Square::new(3, rank).unwrap();
            let c = Square::new(2, rank).unwrap();
            let b = Square::new(1, rank).unwrap();

            if self.at(d).is_none() && self.at(c).is_none() && self.at(b).is_none()
                && !self.is_attacked_by(d, enemy) && !self.is_attacked_by(c, enemy)
            {
                moves.push(Move::quiet(from, c));
            }
        }
    }

    /// Applies `mv` and returns the resulting position. The repetition
    /// counter is reset to zero; the caller re-derives it from its own
    /// move history via `with_repetitions`.
    pub fn make_move(&self, mv: Move) -> Position {
        let mut next = *self;
        let us = self.side_to_move;
        let moved = self.at(mv.from).expect("make_move called with a move whose origin is empty");

        next.en_passant = None;
        next.repetitions = 0;

        let is_capture = self.at(mv.to).is_some();
        let is_en_passant = moved.kind == PieceType::Pawn && Some(mv.to) == self.en_passant;

        if is_en_passant {
            let captured_rank = mv.from.rank();
            let captured_sq = Square::new(mv.to.file(), captured_rank).unwrap();
            next.board[captured_sq.0 as usize] = None;
        }

        // castling: move the rook along with the king.
        if moved.kind == PieceType::King && (mv.from.file() - mv.to.file()).abs() == 2 {
            let rank = mv.from.rank();

            if mv.to.file() == 6 {
                let rook_from = Square::new(7, rank).unwrap();
                let rook_to = Square::new(5, rank).unwrap();
                next.board[rook_to.0 as usize] = next.board[rook_from.0 as usize].take();
                next.board[rook_from.0 as usize] = None;
            } else if mv.to.file() == 2 {
                let rook_from = Square::new(0, rank).unwrap();
                let rook_to = Square::new(3, rank).unwrap();
                next.board[rook_to.0 as usize] = next.board[rook_from.0 as usize].take();
                next.board[rook_from.0 as usize] = None;
            }
        }

        next.board[mv.from.0 as usize] = None;
        next.board[mv.to.0 as usize] = match mv.promotion {
            Some(kind) => Some(Piece::new(us, kind)),
            None => Some(moved)
        };

        if moved.kind == PieceType::Pawn && (mv.from.rank() - mv.to.rank()).abs() == 2 {
            let mid = Square::new(mv.from.file(), (mv.from.rank() + mv.to.rank()) / 2).unwrap();
            next.en_passant = Some(mid);
        }

        next.update_castling_rights(mv.from, mv.to);

        next.halfmove_clock = if is_capture || is_en_passant || moved.kind == PieceType::Pawn {
            0
        } else {
            self.halfmove_clock.saturating_add(1)
        };

        if us == Color::Black {
            next.fullmove_number = self.fullmove_number + 1;
        }

        next.side_to_move = us.opposite();
        next
    }

    fn update_castling_rights(&mut self, from: Square, to: Square) {
        let touches = |sq: Square, expect_rank: i8, expect_file: i8| sq.rank() == expect_rank && sq.file() == expect_file;

        for sq in [from, to] {
            if touches(sq, 0, 4) { self.castling.white_king = false; self.castling.white_queen = false; }
            if touches(sq, 7, 4) { self.castling.black_king = false; self.castling.black_queen = false; }
            if touches(sq, 0, 0) { self.castling.white_queen = false; }
            if touches(sq, 0, 7) { self.castling.white_king = false; }
            if touches(sq, 7, 0) { self.castling.black_queen = false; }
            if touches(sq, 7, 7) { self.castling.black_king = false; }
        }
    }

    fn has_insufficient_material(&self) -> bool {
        let mut minors = Vec::with_capacity(2);

        for sq in Square::all() {
            if let Some(piece) = self.at(sq) {
                match piece.kind {
                    PieceType::King => {},
                    PieceType::Knight | PieceType::Bishop => minors.push((piece.color, piece.kind, sq)),
                    _ => return false
                }
            }
        }

        match minors.len() {
            0 => true,
            1 => true,
            2 => {
                let (c0, k0, s0) = minors[0];
                let (c1, k1, s1) = minors[1];

                c0 != c1 && k0 == PieceType::Bishop && k1 == PieceType::Bishop
                    && (s0.file() + s0.rank()) % 2 == (s1.file() + s1.rank()) % 2
            },
            _ => false
        }
    }

    /// Resolves the terminal status of this position, or `None` if play
    /// continues. Threefold repetition and the fifty-move rule are both
    /// treated as immediate draws (self-play mode per the design
    /// resolution in DESIGN.md); a match-mode caller that wants to defer
    /// 3-fold to an external rules engine should simply not advance
    /// `repetitions` past 1.
    pub fn terminal(&self) -> Option<Terminal> {
        if self.repetitions >= 2 || self.halfmove_clock >= 100 || self.has_insufficient_material() {
            return Some(Terminal::Draw);
        }

        if self.legal_moves().is_empty() {
            return Some(if self.is_in_check(self.side_to_move) { Terminal::Loss } else { Terminal::Draw });
        }

        None
    }

    /// A 64-bit hash stable across equivalent positions, folding in the
    /// externally-tracked repetition count.
    pub fn hash(&self) -> Hash {
        let mut h = 0u64;

        for sq in Square::all() {
            if let Some(piece) = self.at(sq) {
                h ^= ZOBRIST.pieces[piece.color.as_usize()][piece.kind.as_usize()][sq.0 as usize];
            }
        }

        if self.side_to_move == Color::Black {
            h ^= ZOBRIST.side_to_move;
        }

        if self.castling.white_king { h ^= ZOBRIST.castling[0]; }
        if self.castling.white_queen { h ^= ZOBRIST.castling[1]; }
        if self.castling.black_king { h ^= ZOBRIST.castling[2]; }
        if self.castling.black_queen { h ^= ZOBRIST.castling[3]; }

        if let Some(ep) = self.en_passant {
            h ^= ZOBRIST.en_passant_file[ep.file() as usize];
        }

        with_repetition_count(h, self.repetitions)
    }

    pub fn from_fen(fen: &str) -> Option<Position> {
        let mut fields = fen.split_whitespace();
        let placement = fields.next()?;
        let side = fields.next().unwrap_or("w");
        let castling = fields.next().unwrap_or("-");
        let ep = fields.next().unwrap_or("-");
        let halfmove = fields.next().unwrap_or("0");
        let fullmove = fields.next().unwrap_or("1");

        let mut board = [None; 64];

        for (rank_from_top, rank_str) in placement.split('/').enumerate() {
            if rank_from_top >= 8 {
                return None;
            }

            let rank = 7 - rank_from_top as i8;
            let mut file = 0i8;

            for ch in rank_str.chars() {
                if let Some(skip) = ch.to_digit(10) {
                    file += skip as i8;
                } else {
                    let sq = Square::new(file, rank)?;
                    board[sq.0 as usize] = Some(Piece::from_char(ch)?);
                    file += 1;
                }
            }
        }

        let side_to_move = match side {
            "w" => Color::White,
            "b" => Color::Black,
            _ => return None
        };

        let mut rights = CastlingRights::default();

        for ch in castling.chars() {
            match ch {
                'K' => rights.white_king = true,
                'Q' => rights.white_queen = true,
                'k' => rights.black_king = true,
                'q' => rights.black_queen = true,
                '-' => {},
                _ => return None
            }
        }

        let en_passant = if ep == "-" { None } else { Square::from_algebraic(ep) };

        Some(Position {
            board,
            side_to_move,
            castling: rights,
            en_passant,
            halfmove_clock: halfmove.parse().ok()?,
            fullmove_number: fullmove.parse().ok()?,
            repetitions: 0
        })
    }

    pub fn to_fen(&self) -> String {
        let mut placement = String::new();

        for rank_from_top in 0..8i8 {
            let rank = 7 - rank_from_top;
            let mut empty_run = 0;

            for file in 0..8i8 {
                let sq = Square::new(file, rank).unwrap();

                match self.at(sq) {
                    Some(piece) => {
                        if empty_run > 0 {
                            placement.push_str(&empty_run.to_string());
                            empty_run = 0;
                        }
                        placement.push(piece.to_char());
                    },
                    None => empty_run += 1
                }
            }

            if empty_run > 0 {
                placement.push_str(&empty_run.to_string());
            }

            if rank_from_top != 7 {
                placement.push('/');
            }
        }

        let side = match self.side_to_move { Color::White => "w", Color::Black => "b" };
        let mut castling = String::new();

        if self.castling.white_king { castling.push('K'); }
        if self.castling.white_queen { castling.push('Q'); }
        if self.castling.black_king { castling.push('k'); }
        if self.castling.black_queen { castling.push('q'); }
        if castling.is_empty() { castling.push('-'); }

        let ep = self.en_passant.map(|sq| sq.to_algebraic()).unwrap_or_else(|| "-".to_string());

        format!("{} {} {} {} {} {}", placement, side, castling, ep, self.halfmove_clock, self.fullmove_number)
    }

    /// Parses a long-algebraic move (`"e2e4"`, `"a7a8q"`) against this
    /// position's legal moves, returning `None` if it is not legal here.
    pub fn parse_move(&self, text: &str) -> Option<Move> {
        let from = Square::from_algebraic(&text[0..2])?;
        let to = Square::from_algebraic(&text[2..4])?;
        let promotion = text.chars().nth(4).and_then(PieceType::from_char);
        let candidate = Move::new(from, to, promotion);

        self.legal_moves().into_iter().find(|&mv| mv.from == candidate.from && mv.to == candidate.to
            && (mv.promotion == candidate.promotion || (promotion.is_none() && mv.promotion == Some(PieceType::Queen))))
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.to_fen())
    }
}

impl fmt::Debug for Position {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Position({})", self.to_fen())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn startpos_has_twenty_legal_moves() {
        let pos = Position::startpos();

        assert_eq!(pos.legal_moves().len(), 20);
    }

    #[test]
    fn fen_round_trips() {
        let pos = Position::startpos();

        assert_eq!(Position::from_fen(&pos.to_fen()).unwrap().to_fen(), pos.to_fen());
    }

    #[test]
    fn mate_in_one_is_found() {
        let pos = Position::from_fen("4k3/8/4K3/8/8/8/8/7R w - - 0 1").unwrap();
        let mv = pos.parse_move("h1h8").unwrap();
        let after = pos.make_move(mv);

        assert_eq!(after.terminal(), Some(Terminal::Loss));
    }

    #[test]
    fn stalemate_has_no_legal_moves_and_is_not_check() {
        let pos = Position::from_fen("7k/5Q2/6K1/8/8/8/8/8 b - - 0 1").unwrap();

        assert!(pos.legal_moves().is_empty());
        assert!(!pos.is_in_check(Color::Black));
        assert_eq!(pos.terminal(), Some(Terminal::Draw));
    }

    #[test]
    fn king_vs_king_is_insufficient_material() {
        let pos = Position::from_fen("4k3/8/4K3/8/8/8/8/8 w - - 0 1").unwrap();

        assert_eq!(pos.terminal(), Some(Terminal::Draw));
    }

    #[test]
    fn en_passant_capture_is_legal() {
        let pos = Position::from_fen("4k3/8/8/3pP3/8/8/8/4K3 w - d6 0 1").unwrap();
        let mv = pos.parse_move("e5d6").unwrap();
        let after = pos.make_move(mv);

        assert!(after.at(Square::from_algebraic("d5").unwrap()).is_none());
    }

    #[test]
    fn castling_moves_the_rook() {
        let pos = Position::from_fen("4k3/8/8/8/8/8/8/R3K3 w Q - 0 1").unwrap();
        let mv = pos.parse_move("e1c1").unwrap();
        let after = pos.make_move(mv);

        assert_eq!(after.at(Square::from_algebraic("d1").unwrap()), Some(Piece::new(Color::White, PieceType::Rook)));
        assert!(after.at(Square::from_algebraic("a1").unwrap()).is_none());
    }

    #[test]
    fn repetition_count_changes_the_hash() {
        let pos = Position::startpos();
        let once = pos.with_repetitions(0);
        let twice = pos.with_repetitions(1);

        assert_ne!(once.hash(), twice.hash());
    }
}
