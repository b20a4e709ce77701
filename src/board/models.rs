use std::fmt;

use serde::{Deserialize, Serialize};

pub type BoardId = i64;
pub type ColumnId = i64;
pub type CardId = i64;
pub type UserId = i64;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MemberRole {
    Owner,
    Editor,
    Viewer,
    #[serde(other)]
    Unknown,
}

impl MemberRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Owner => "owner",
            Self::Editor => "editor",
            Self::Viewer => "viewer",
            Self::Unknown => "unknown",
        }
    }

    /// Whether the backend accepts mutation commands from this role.
    pub fn can_edit(&self) -> bool {
        matches!(self, Self::Owner | Self::Editor)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Membership {
    pub user_id: UserId,
    pub role: MemberRole,
    #[serde(default)]
    pub display_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Card {
    pub id: CardId,
    pub column_id: ColumnId,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub position: i32,
    #[serde(default)]
    pub assigned_to: Option<UserId>,
    #[serde(default)]
    pub created_by: Option<UserId>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Column {
    pub id: ColumnId,
    pub title: String,
    pub position: i32,
    #[serde(default)]
    pub cards: Vec<Card>,
}

/// One board as returned by `GET /boards/{id}`: the unit of replacement.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Board {
    pub id: BoardId,
    pub title: String,
    pub owner_id: UserId,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub columns: Vec<Column>,
    #[serde(default)]
    pub members: Vec<Membership>,
}

/// A board list entry (`GET /boards/`), without columns or members.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BoardSummary {
    pub id: BoardId,
    pub title: String,
    pub owner_id: UserId,
    #[serde(default)]
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub display_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessToken {
    pub access_token: String,
    pub token_type: String,
}

// Request payloads

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CreateBoardRequest {
    pub title: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CreateColumnRequest {
    pub title: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UpdateColumnRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CreateCardRequest {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub column_id: ColumnId,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UpdateCardRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct MoveCardRequest {
    pub column_id: ColumnId,
    pub position: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub display_name: String,
}

// Snapshot queries

/// A structural problem found in a fetched snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnapshotViolation {
    ColumnPositions { expected: Vec<i32>, found: Vec<i32> },
    CardPositions {
        column_id: ColumnId,
        expected: Vec<i32>,
        found: Vec<i32>,
    },
    DanglingCard { card_id: CardId, column_id: ColumnId },
}

impl fmt::Display for SnapshotViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ColumnPositions { expected, found } => {
                write!(f, "column positions {:?}, expected {:?}", found, expected)
            }
            Self::CardPositions {
                column_id,
                expected,
                found,
            } => write!(
                f,
                "column {} card positions {:?}, expected {:?}",
                column_id, found, expected
            ),
            Self::DanglingCard { card_id, column_id } => write!(
                f,
                "card {} references column {} outside its parent",
                card_id, column_id
            ),
        }
    }
}

/// Where a card sits inside a snapshot.
#[derive(Debug, Clone, Copy)]
pub struct CardLocation<'a> {
    pub column: &'a Column,
    pub index: usize,
    pub card: &'a Card,
}

impl Board {
    pub fn column(&self, id: ColumnId) -> Option<&Column> {
        self.columns.iter().find(|c| c.id == id)
    }

    pub fn find_card(&self, id: CardId) -> Option<CardLocation<'_>> {
        self.columns.iter().find_map(|column| {
            column
                .cards
                .iter()
                .position(|c| c.id == id)
                .map(|index| CardLocation {
                    column,
                    index,
                    card: &column.cards[index],
                })
        })
    }

    pub fn card_count(&self) -> usize {
        self.columns.iter().map(|c| c.cards.len()).sum()
    }

    /// Check the ordering and ownership invariants.
    ///
    /// Positions must be exactly `0..n` in sequence order, for columns within
    /// the board and for cards within each column, and each card must point at
    /// the column that contains it.
    pub fn validate(&self) -> Vec<SnapshotViolation> {
        let mut violations = Vec::new();

        let found: Vec<i32> = self.columns.iter().map(|c| c.position).collect();
        let expected: Vec<i32> = (0..self.columns.len() as i32).collect();
        if found != expected {
            violations.push(SnapshotViolation::ColumnPositions { expected, found });
        }

        for column in &self.columns {
            let found: Vec<i32> = column.cards.iter().map(|c| c.position).collect();
            let expected: Vec<i32> = (0..column.cards.len() as i32).collect();
            if found != expected {
                violations.push(SnapshotViolation::CardPositions {
                    column_id: column.id,
                    expected,
                    found,
                });
            }
            for card in column.cards.iter().filter(|c| c.column_id != column.id) {
                violations.push(SnapshotViolation::DanglingCard {
                    card_id: card.id,
                    column_id: card.column_id,
                });
            }
        }

        violations
    }
}

impl Column {
    pub fn card_ids(&self) -> Vec<CardId> {
        self.cards.iter().map(|c| c.id).collect()
    }
}
