use enum_dispatch::enum_dispatch;

use super::error::LayoutError;
use super::graph::{Direction, LayoutKind, Orientation};
use crate::model::tree::NodeId;
use crate::sys::geometry::Rect;

/// Smallest share a slot keeps after an interactive resize.
const MIN_SHARE: f64 = 0.02;

/// Index reached by stepping `delta` from `index`, if it stays in bounds.
fn step(index: usize, len: usize, delta: Option<isize>) -> Option<usize> {
    let target = index.checked_add_signed(delta?)?;
    (target < len).then_some(target)
}

/// Capabilities shared by every layout variant.
///
/// Layouts only know their own children. Anything that needs the rest of the
/// tree lives on the root layout.
#[enum_dispatch]
pub trait LayoutOps {
    fn kind(&self) -> LayoutKind;
    fn rect(&self) -> Option<Rect>;
    fn set_rect(&mut self, rect: Rect);
    fn gap(&self) -> f64;
    fn set_gap(&mut self, gap: f64);
    fn children(&self) -> Vec<NodeId>;
    fn len(&self) -> usize;
    fn index_of(&self, node: NodeId) -> Option<usize>;

    /// Inserts `node` at `position`, or at the end.
    fn insert_child(&mut self, node: NodeId, position: Option<usize>);

    /// Removes `node` and returns the index it was at.
    fn remove_child(&mut self, node: NodeId) -> Result<usize, LayoutError>;

    /// Puts `new` in the slot held by `old`, keeping its share.
    fn replace_child(&mut self, old: NodeId, new: NodeId) -> Result<(), LayoutError>;

    /// Moves the slot at `from` so that it ends up at `to`.
    fn reorder_child(&mut self, from: usize, to: usize);

    /// Absolute rectangles for every child, computed from this layout's own
    /// rectangle and gap.
    fn child_rects(&self) -> Result<Vec<(NodeId, Rect)>, LayoutError>;

    fn is_empty(&self) -> bool { self.len() == 0 }

    fn child_at(&self, index: usize) -> Option<NodeId> { self.children().get(index).copied() }

    fn get_child_by_direction(
        &self,
        node: NodeId,
        direction: Direction,
    ) -> Result<Option<NodeId>, LayoutError> {
        let index = self.index_of(node).ok_or(LayoutError::ChildNotFound(node))?;
        let target = step(index, self.len(), self.kind().index_delta(direction));
        Ok(target.and_then(|i| self.child_at(i)))
    }

    fn move_child_in_place(
        &mut self,
        node: NodeId,
        direction: Direction,
    ) -> Result<bool, LayoutError> {
        let index = self.index_of(node).ok_or(LayoutError::ChildNotFound(node))?;
        let Some(target) = step(index, self.len(), self.kind().index_delta(direction)) else {
            return Ok(false);
        };
        self.reorder_child(index, target);
        Ok(true)
    }

    fn can_insert_at_direction(&self, direction: Direction) -> bool {
        self.kind().index_delta(direction).is_some()
    }

    fn insert_at_directional_end(
        &mut self,
        node: NodeId,
        direction: Direction,
    ) -> Result<(), LayoutError> {
        match self.kind().index_delta(direction) {
            Some(delta) if delta < 0 => self.insert_child(node, Some(0)),
            Some(_) => self.insert_child(node, None),
            None => {
                return Err(LayoutError::UnsupportedDirection { kind: self.kind(), direction });
            }
        }
        Ok(())
    }
}

#[enum_dispatch(LayoutOps)]
#[derive(Debug, Clone)]
pub enum TilingLayout {
    Split(SplitLayout),
    Stacking(StackingLayout),
}

impl TilingLayout {
    pub fn new(kind: LayoutKind, gap: f64, stack_offset: f64) -> Self {
        match kind.orientation() {
            Some(orientation) => SplitLayout::new(orientation, gap).into(),
            None => StackingLayout::new(gap, stack_offset).into(),
        }
    }

    pub fn as_split(&self) -> Option<&SplitLayout> {
        match self {
            TilingLayout::Split(split) => Some(split),
            TilingLayout::Stacking(_) => None,
        }
    }

    pub fn as_split_mut(&mut self) -> Option<&mut SplitLayout> {
        match self {
            TilingLayout::Split(split) => Some(split),
            TilingLayout::Stacking(_) => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SplitChild {
    pub node: NodeId,
    pub size: f64,
}

/// Partitions its rectangle along one axis in proportion to each child's size.
#[derive(Debug, Clone)]
pub struct SplitLayout {
    orientation: Orientation,
    rect: Option<Rect>,
    gap: f64,
    children: Vec<SplitChild>,
}

impl SplitLayout {
    pub fn new(orientation: Orientation, gap: f64) -> Self {
        SplitLayout { orientation, rect: None, gap, children: Vec::new() }
    }

    pub fn orientation(&self) -> Orientation { self.orientation }

    pub fn sizes(&self) -> Vec<f64> { self.children.iter().map(|c| c.size).collect() }

    pub fn size_of(&self, node: NodeId) -> Option<f64> {
        self.children.iter().find(|c| c.node == node).map(|c| c.size)
    }

    /// Rescales every size so they sum to one.
    pub fn normalize(&mut self) {
        let sum: f64 = self.children.iter().map(|c| c.size).sum();
        if sum > 0.0 && sum.is_finite() {
            for child in &mut self.children {
                child.size /= sum;
            }
        } else {
            let even = 1.0 / self.children.len().max(1) as f64;
            for child in &mut self.children {
                child.size = even;
            }
        }
    }

    /// Gives `node` exactly `share` of the layout and scales everyone else to
    /// fill the rest.
    pub fn set_share(&mut self, node: NodeId, share: f64) -> Result<(), LayoutError> {
        let index = self.index_of(node).ok_or(LayoutError::ChildNotFound(node))?;
        let share = share.clamp(MIN_SHARE, 1.0);
        let others: f64 = self
            .children
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != index)
            .map(|(_, c)| c.size)
            .sum();
        for (i, child) in self.children.iter_mut().enumerate() {
            if i == index {
                child.size = share;
            } else if others > 0.0 {
                child.size *= (1.0 - share) / others;
            }
        }
        self.normalize();
        Ok(())
    }

    /// Removes all slots, leaving an empty layout.
    pub fn take_slots(&mut self) -> Vec<SplitChild> { std::mem::take(&mut self.children) }

    /// Replaces the slot of `node` with `slots`, scaling their sizes by the
    /// share `node` had.
    pub fn splice(&mut self, node: NodeId, slots: Vec<SplitChild>) -> Result<(), LayoutError> {
        let index = self.index_of(node).ok_or(LayoutError::ChildNotFound(node))?;
        let share = self.children[index].size;
        let scaled = slots.into_iter().map(|c| SplitChild { node: c.node, size: c.size * share });
        self.children.splice(index..=index, scaled);
        self.normalize();
        Ok(())
    }

    fn usable_extent(&self, rect: Rect) -> f64 {
        let gaps = self.gap * self.children.len().saturating_sub(1) as f64;
        (rect.extent(self.orientation) - gaps).max(0.0)
    }

    /// Whether `child` can grow towards `direction` by taking space from its
    /// siblings on that side.
    pub fn can_resize_in_direction(&self, child: NodeId, direction: Direction) -> bool {
        if direction.orientation() != self.orientation {
            return false;
        }
        match self.index_of(child) {
            Some(index) if direction.is_forward() => index + 1 < self.children.len(),
            Some(index) => index > 0,
            None => false,
        }
    }

    /// Grows `child` by `pixel_delta` towards `direction`, taking the space in
    /// equal parts from every sibling on that side. A negative delta shrinks it.
    pub fn resize_in_direction(
        &mut self,
        child: NodeId,
        direction: Direction,
        pixel_delta: f64,
    ) -> Result<(), LayoutError> {
        if !self.can_resize_in_direction(child, direction) {
            return Err(LayoutError::UnsupportedDirection { kind: self.kind(), direction });
        }
        let index = self.index_of(child).ok_or(LayoutError::ChildNotFound(child))?;
        let rect = self.rect.ok_or(LayoutError::MissingGeometry)?;
        let usable = self.usable_extent(rect);
        if usable <= 0.0 {
            return Ok(());
        }
        let fraction = pixel_delta / usable;
        if !fraction.is_finite() {
            return Err(LayoutError::InvalidResize(pixel_delta));
        }

        let others = if direction.is_forward() {
            index + 1..self.children.len()
        } else {
            0..index
        };
        let share = fraction / others.len() as f64;
        self.children[index].size += fraction;
        for sibling in &mut self.children[others] {
            sibling.size -= share;
        }
        for slot in &mut self.children {
            slot.size = slot.size.max(MIN_SHARE);
        }
        self.normalize();
        Ok(())
    }
}

impl LayoutOps for SplitLayout {
    fn kind(&self) -> LayoutKind { LayoutKind::split(self.orientation) }

    fn rect(&self) -> Option<Rect> { self.rect }

    fn set_rect(&mut self, rect: Rect) { self.rect = Some(rect) }

    fn gap(&self) -> f64 { self.gap }

    fn set_gap(&mut self, gap: f64) { self.gap = gap }

    fn children(&self) -> Vec<NodeId> { self.children.iter().map(|c| c.node).collect() }

    fn len(&self) -> usize { self.children.len() }

    fn index_of(&self, node: NodeId) -> Option<usize> {
        self.children.iter().position(|c| c.node == node)
    }

    fn insert_child(&mut self, node: NodeId, position: Option<usize>) {
        let share = 1.0 / (self.children.len() + 1) as f64;
        for child in &mut self.children {
            child.size *= 1.0 - share;
        }
        let index = position.unwrap_or(self.children.len()).min(self.children.len());
        self.children.insert(index, SplitChild { node, size: share });
        self.normalize();
    }

    fn remove_child(&mut self, node: NodeId) -> Result<usize, LayoutError> {
        let index = self.index_of(node).ok_or(LayoutError::ChildNotFound(node))?;
        self.children.remove(index);
        if !self.children.is_empty() {
            self.normalize();
        }
        Ok(index)
    }

    fn replace_child(&mut self, old: NodeId, new: NodeId) -> Result<(), LayoutError> {
        let index = self.index_of(old).ok_or(LayoutError::ChildNotFound(old))?;
        self.children[index].node = new;
        Ok(())
    }

    fn reorder_child(&mut self, from: usize, to: usize) {
        let slot = self.children.remove(from);
        self.children.insert(to.min(self.children.len()), slot);
    }

    fn child_rects(&self) -> Result<Vec<(NodeId, Rect)>, LayoutError> {
        let rect = self.rect.ok_or(LayoutError::MissingGeometry)?;
        let orientation = self.orientation;
        let origin = rect.start(orientation);
        let usable = self.usable_extent(rect);
        let last = self.children.len().saturating_sub(1);

        let mut rects = Vec::with_capacity(self.children.len());
        let mut size_acc = 0.0;
        let mut start = 0.0;
        for (index, child) in self.children.iter().enumerate() {
            size_acc += child.size;
            // The last boundary is pinned so rounding never leaves a sliver.
            let boundary = if index == last { usable } else { (usable * size_acc).round() };
            let end = boundary + index as f64 * self.gap;
            let tile = rect.with_span(orientation, origin + start, (end - start).max(0.0));
            if !tile.is_finite() {
                return Err(LayoutError::InvalidGeometry(tile));
            }
            rects.push((child.node, tile));
            start = end + self.gap;
        }
        Ok(rects)
    }
}

/// Overlaps its windows, each shifted down by a fixed offset.
#[derive(Debug, Clone)]
pub struct StackingLayout {
    rect: Option<Rect>,
    gap: f64,
    offset: f64,
    children: Vec<NodeId>,
}

impl StackingLayout {
    pub fn new(gap: f64, offset: f64) -> Self {
        StackingLayout { rect: None, gap, offset, children: Vec::new() }
    }
}

impl LayoutOps for StackingLayout {
    fn kind(&self) -> LayoutKind { LayoutKind::Stacking }

    fn rect(&self) -> Option<Rect> { self.rect }

    fn set_rect(&mut self, rect: Rect) { self.rect = Some(rect) }

    fn gap(&self) -> f64 { self.gap }

    fn set_gap(&mut self, gap: f64) { self.gap = gap }

    fn children(&self) -> Vec<NodeId> { self.children.clone() }

    fn len(&self) -> usize { self.children.len() }

    fn index_of(&self, node: NodeId) -> Option<usize> {
        self.children.iter().position(|&c| c == node)
    }

    fn insert_child(&mut self, node: NodeId, position: Option<usize>) {
        let index = position.unwrap_or(self.children.len()).min(self.children.len());
        self.children.insert(index, node);
    }

    fn remove_child(&mut self, node: NodeId) -> Result<usize, LayoutError> {
        let index = self.index_of(node).ok_or(LayoutError::ChildNotFound(node))?;
        self.children.remove(index);
        Ok(index)
    }

    fn replace_child(&mut self, old: NodeId, new: NodeId) -> Result<(), LayoutError> {
        let index = self.index_of(old).ok_or(LayoutError::ChildNotFound(old))?;
        self.children[index] = new;
        Ok(())
    }

    fn reorder_child(&mut self, from: usize, to: usize) {
        let node = self.children.remove(from);
        self.children.insert(to.min(self.children.len()), node);
    }

    fn child_rects(&self) -> Result<Vec<(NodeId, Rect)>, LayoutError> {
        let rect = self.rect.ok_or(LayoutError::MissingGeometry)?;
        let shift = self.offset * self.children.len().saturating_sub(1) as f64;
        let height = (rect.height - shift).max(0.0);
        self.children
            .iter()
            .enumerate()
            .map(|(index, &node)| {
                let tile = Rect {
                    y: rect.y + index as f64 * self.offset,
                    height,
                    ..rect
                };
                if tile.is_finite() {
                    Ok((node, tile))
                } else {
                    Err(LayoutError::InvalidGeometry(tile))
                }
            })
            .collect()
    }
}
