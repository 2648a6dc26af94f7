use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Orientation {
    Horizontal,
    Vertical,
}

#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum Direction {
    Left,
    Right,
    Up,
    Down,
}

impl Direction {
    pub const ALL: [Direction; 4] =
        [Direction::Left, Direction::Right, Direction::Up, Direction::Down];

    pub fn orientation(self) -> Orientation {
        match self {
            Direction::Left | Direction::Right => Orientation::Horizontal,
            Direction::Up | Direction::Down => Orientation::Vertical,
        }
    }

    pub fn opposite(self) -> Direction {
        match self {
            Direction::Left => Direction::Right,
            Direction::Right => Direction::Left,
            Direction::Up => Direction::Down,
            Direction::Down => Direction::Up,
        }
    }

    /// Whether moving in this direction increases the child index along its axis.
    pub fn is_forward(self) -> bool { matches!(self, Direction::Right | Direction::Down) }
}

/// The type of a tiling layout. Fixed for the lifetime of a layout; changing it
/// means building a new layout.
#[derive(
    Default, Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum LayoutKind {
    #[default]
    #[serde(alias = "split-h")]
    #[strum(to_string = "split-horizontal", serialize = "split-h")]
    SplitHorizontal,
    #[serde(alias = "split-v")]
    #[strum(to_string = "split-vertical", serialize = "split-v")]
    SplitVertical,
    Stacking,
}

impl LayoutKind {
    pub fn split(orientation: Orientation) -> Self {
        match orientation {
            Orientation::Horizontal => LayoutKind::SplitHorizontal,
            Orientation::Vertical => LayoutKind::SplitVertical,
        }
    }

    pub fn is_split(self) -> bool { !self.is_stacking() }

    pub fn is_stacking(self) -> bool { matches!(self, LayoutKind::Stacking) }

    /// The axis a split partitions. Stacking layouts have none.
    pub fn orientation(self) -> Option<Orientation> {
        match self {
            LayoutKind::SplitHorizontal => Some(Orientation::Horizontal),
            LayoutKind::SplitVertical => Some(Orientation::Vertical),
            LayoutKind::Stacking => None,
        }
    }

    /// Index delta for stepping towards `direction`, or `None` when the
    /// layout cannot navigate that way.
    ///
    /// Stacking layouts only cycle up and down through their z-order.
    pub fn index_delta(self, direction: Direction) -> Option<isize> {
        let supported = match self {
            LayoutKind::SplitHorizontal => direction.orientation() == Orientation::Horizontal,
            LayoutKind::SplitVertical | LayoutKind::Stacking => {
                direction.orientation() == Orientation::Vertical
            }
        };
        supported.then_some(if direction.is_forward() { 1 } else { -1 })
    }
}
