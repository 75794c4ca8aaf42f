//! Containers, items and the values that flow between client and server.

use crate::{ContainerId, ItemId, Position, Timestamp};
use serde::{Deserialize, Serialize};

/// What a container holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerKind {
    /// Holds columns.
    Board,
    /// Holds cards.
    Column,
}

impl ContainerKind {
    /// The kind of item this container holds.
    pub fn child_kind(self) -> ItemKind {
        match self {
            ContainerKind::Board => ItemKind::Column,
            ContainerKind::Column => ItemKind::Card,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ContainerKind::Board => "board",
            ContainerKind::Column => "column",
        }
    }
}

/// What an item is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    /// Lives in a board; is itself a container of cards.
    Column,
    /// Lives in a column.
    Card,
}

impl ItemKind {
    /// The only container kind this item may live in.
    pub fn parent_kind(self) -> ContainerKind {
        match self {
            ItemKind::Column => ContainerKind::Board,
            ItemKind::Card => ContainerKind::Column,
        }
    }

    /// Whether an item of this kind may be placed in `container`.
    pub fn fits(self, container: ContainerKind) -> bool {
        self.parent_kind() == container
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ItemKind::Column => "column",
            ItemKind::Card => "card",
        }
    }
}

/// A board or a column, seen as an ordered parent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Container {
    pub id: ContainerId,
    pub kind: ContainerKind,
}

impl Container {
    pub fn new(id: impl Into<ContainerId>, kind: ContainerKind) -> Self {
        Self {
            id: id.into(),
            kind,
        }
    }

    pub fn board(id: impl Into<ContainerId>) -> Self {
        Self::new(id, ContainerKind::Board)
    }

    pub fn column(id: impl Into<ContainerId>) -> Self {
        Self::new(id, ContainerKind::Column)
    }
}

/// A column or a card, seen as an ordered child.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub id: ItemId,
    pub kind: ItemKind,
    /// The single parent container.
    pub container_id: ContainerId,
    /// Ordering key among siblings.
    pub position: Position,
    /// Creation time, used as the repair tiebreak.
    pub created_at: Timestamp,
}

impl Item {
    pub fn new(
        id: impl Into<ItemId>,
        kind: ItemKind,
        container_id: impl Into<ContainerId>,
        position: Position,
        created_at: Timestamp,
    ) -> Self {
        Self {
            id: id.into(),
            kind,
            container_id: container_id.into(),
            position,
            created_at,
        }
    }
}

/// An item to be created at the end of its container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewItem {
    pub id: ItemId,
    pub kind: ItemKind,
    pub container_id: ContainerId,
}

impl NewItem {
    pub fn new(id: impl Into<ItemId>, kind: ItemKind, container_id: impl Into<ContainerId>) -> Self {
        Self {
            id: id.into(),
            kind,
            container_id: container_id.into(),
        }
    }
}

/// Where a moved item should land among the target's items.
///
/// On the wire this is an optional index: `null` or absent means append.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "Option<usize>", into = "Option<usize>")]
pub enum TargetIndex {
    At(usize),
    #[default]
    Append,
}

impl TargetIndex {
    /// Concrete insertion index for a list of `len` other items.
    /// Out-of-range indices clamp to the end.
    pub fn resolve(self, len: usize) -> usize {
        match self {
            TargetIndex::At(index) => index.min(len),
            TargetIndex::Append => len,
        }
    }
}

impl From<Option<usize>> for TargetIndex {
    fn from(value: Option<usize>) -> Self {
        value.map_or(TargetIndex::Append, TargetIndex::At)
    }
}

impl From<TargetIndex> for Option<usize> {
    fn from(value: TargetIndex) -> Self {
        match value {
            TargetIndex::At(index) => Some(index),
            TargetIndex::Append => None,
        }
    }
}

/// A drag-and-drop result, decoupled from whatever UI produced it.
///
/// The same value is applied to the client cache and sent to the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ReorderIntent {
    /// Full desired order of a container's items.
    #[serde(rename_all = "camelCase")]
    Reorder {
        container_id: ContainerId,
        ordered_ids: Vec<ItemId>,
    },
    /// Relocate one item, possibly within the same container.
    #[serde(rename_all = "camelCase")]
    Move {
        item_id: ItemId,
        source_id: ContainerId,
        target_id: ContainerId,
        #[serde(default)]
        index: TargetIndex,
    },
}

impl ReorderIntent {
    pub fn reorder(container_id: impl Into<ContainerId>, ordered_ids: Vec<ItemId>) -> Self {
        ReorderIntent::Reorder {
            container_id: container_id.into(),
            ordered_ids,
        }
    }

    pub fn move_item(
        item_id: impl Into<ItemId>,
        source_id: impl Into<ContainerId>,
        target_id: impl Into<ContainerId>,
        index: TargetIndex,
    ) -> Self {
        ReorderIntent::Move {
            item_id: item_id.into(),
            source_id: source_id.into(),
            target_id: target_id.into(),
            index,
        }
    }

    /// Containers whose order this intent changes, without duplicates.
    pub fn containers(&self) -> Vec<&ContainerId> {
        match self {
            ReorderIntent::Reorder { container_id, .. } => vec![container_id],
            ReorderIntent::Move {
                source_id,
                target_id,
                ..
            } if source_id == target_id => vec![source_id],
            ReorderIntent::Move {
                source_id,
                target_id,
                ..
            } => vec![source_id, target_id],
        }
    }
}

/// Successful completion of a reorder or move.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ack {
    /// Containers whose order was rewritten or whose membership changed.
    pub containers: Vec<ContainerId>,
    /// Number of position writes performed.
    pub written: usize,
}
