//! Drop-gesture resolution.
//!
//! Drag sources and drop zones are identified by strings of the form
//! `card-{id}` and `column-{id}`. [`resolve`] turns a drag of one card onto
//! one of those zones into the `(column, position)` the backend should move
//! the card to:
//!
//! | Drop target      | Column               | Position                    |
//! |------------------|----------------------|-----------------------------|
//! | `column-{X}`     | `X`                  | cards already in `X` (append) |
//! | `card-{C}`       | column holding `C`   | index of `C` (insert before)  |
//! | anything else    | no move                                            |

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::models::{Board, CardId, ColumnId, MoveCardRequest};

pub const CARD_PREFIX: &str = "card-";
pub const COLUMN_PREFIX: &str = "column-";

/// A parsed drag/drop identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DragId {
    Card(CardId),
    Column(ColumnId),
}

impl FromStr for DragId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parse_id = |raw: &str| {
            raw.parse::<i64>()
                .map_err(|_| format!("Invalid drag id: {}", s))
        };
        if let Some(rest) = s.strip_prefix(CARD_PREFIX) {
            parse_id(rest).map(Self::Card)
        } else if let Some(rest) = s.strip_prefix(COLUMN_PREFIX) {
            parse_id(rest).map(Self::Column)
        } else {
            Err(format!("Invalid drag id: {}", s))
        }
    }
}

impl fmt::Display for DragId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Card(id) => write!(f, "{}{}", CARD_PREFIX, id),
            Self::Column(id) => write!(f, "{}{}", COLUMN_PREFIX, id),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveTarget {
    pub column_id: ColumnId,
    pub position: i32,
}

/// A resolved move: put `card_id` at `target`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveCommand {
    pub card_id: CardId,
    pub target: MoveTarget,
}

impl MoveCommand {
    pub fn request(&self) -> MoveCardRequest {
        MoveCardRequest {
            column_id: self.target.column_id,
            position: self.target.position,
        }
    }
}

/// Resolve where a drop on `over` lands within `board`.
///
/// One pass over the columns and, for a card target, one pass over the cards
/// of each column until the card is found.
pub fn resolve_target(over: DragId, board: &Board) -> Option<MoveTarget> {
    match over {
        DragId::Column(column_id) => {
            let column = board.column(column_id)?;
            Some(MoveTarget {
                column_id,
                position: i32::try_from(column.cards.len()).ok()?,
            })
        }
        DragId::Card(card_id) => {
            let location = board.find_card(card_id)?;
            Some(MoveTarget {
                column_id: location.column.id,
                position: i32::try_from(location.index).ok()?,
            })
        }
    }
}

/// Map a raw drag-end event to a move command, or `None` for a no-op drop.
///
/// `active` must name a card; dropping a card onto its own slot still yields
/// a command.
pub fn resolve(active: &str, over: &str, board: &Board) -> Option<MoveCommand> {
    let DragId::Card(card_id) = active.parse::<DragId>().ok()? else {
        return None;
    };
    let over = over.parse::<DragId>().ok()?;
    let target = resolve_target(over, board)?;
    Some(MoveCommand { card_id, target })
}
