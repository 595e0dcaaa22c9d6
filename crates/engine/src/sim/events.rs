use std::fmt;

use super::furniture::Furniture;
use super::tile::Tile;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    TileChanged,
    FurnitureCreated,
    FurnitureChanged,
    FurnitureRemoved,
}

/// Handle returned by a subscribe call; pass it back to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId {
    kind: EventKind,
    seq: u64,
}

impl SubscriptionId {
    pub fn kind(self) -> EventKind {
        self.kind
    }
}

type Subscriber<T> = Box<dyn FnMut(&T)>;

/// Multi-subscriber registry for one event stream. Delivery follows
/// subscription order.
pub struct Broadcast<T> {
    kind: EventKind,
    next_seq: u64,
    subscribers: Vec<(u64, Subscriber<T>)>,
}

impl<T> Broadcast<T> {
    fn new(kind: EventKind) -> Self {
        Self {
            kind,
            next_seq: 0,
            subscribers: Vec::new(),
        }
    }

    pub fn subscribe(&mut self, subscriber: impl FnMut(&T) + 'static) -> SubscriptionId {
        let seq = self.next_seq;
        self.next_seq = self.next_seq.saturating_add(1);
        self.subscribers.push((seq, Box::new(subscriber)));
        SubscriptionId {
            kind: self.kind,
            seq,
        }
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        if id.kind != self.kind {
            return false;
        }
        let before = self.subscribers.len();
        self.subscribers.retain(|(seq, _)| *seq != id.seq);
        self.subscribers.len() != before
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    fn publish(&mut self, value: &T) {
        for (_, subscriber) in &mut self.subscribers {
            subscriber(value);
        }
    }
}

impl<T> fmt::Debug for Broadcast<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Broadcast")
            .field("kind", &self.kind)
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorldEventCounts {
    pub tile_changed: u64,
    pub furniture_created: u64,
    pub furniture_changed: u64,
    pub furniture_removed: u64,
}

#[derive(Debug)]
pub struct WorldEvents {
    tile_changed: Broadcast<Tile>,
    furniture_created: Broadcast<Furniture>,
    furniture_changed: Broadcast<Furniture>,
    furniture_removed: Broadcast<Furniture>,
    counts: WorldEventCounts,
}

impl Default for WorldEvents {
    fn default() -> Self {
        Self {
            tile_changed: Broadcast::new(EventKind::TileChanged),
            furniture_created: Broadcast::new(EventKind::FurnitureCreated),
            furniture_changed: Broadcast::new(EventKind::FurnitureChanged),
            furniture_removed: Broadcast::new(EventKind::FurnitureRemoved),
            counts: WorldEventCounts::default(),
        }
    }
}

impl WorldEvents {
    pub fn tile_changed(&mut self) -> &mut Broadcast<Tile> {
        &mut self.tile_changed
    }

    pub fn furniture_created(&mut self) -> &mut Broadcast<Furniture> {
        &mut self.furniture_created
    }

    pub fn furniture_changed(&mut self) -> &mut Broadcast<Furniture> {
        &mut self.furniture_changed
    }

    pub fn furniture_removed(&mut self) -> &mut Broadcast<Furniture> {
        &mut self.furniture_removed
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        match id.kind {
            EventKind::TileChanged => self.tile_changed.unsubscribe(id),
            EventKind::FurnitureCreated => self.furniture_created.unsubscribe(id),
            EventKind::FurnitureChanged => self.furniture_changed.unsubscribe(id),
            EventKind::FurnitureRemoved => self.furniture_removed.unsubscribe(id),
        }
    }

    pub fn counts(&self) -> WorldEventCounts {
        self.counts
    }

    pub(crate) fn publish_tile_changed(&mut self, tile: &Tile) {
        self.counts.tile_changed = self.counts.tile_changed.saturating_add(1);
        self.tile_changed.publish(tile);
    }

    pub(crate) fn publish_furniture_created(&mut self, furniture: &Furniture) {
        self.counts.furniture_created = self.counts.furniture_created.saturating_add(1);
        self.furniture_created.publish(furniture);
    }

    pub(crate) fn publish_furniture_changed(&mut self, furniture: &Furniture) {
        self.counts.furniture_changed = self.counts.furniture_changed.saturating_add(1);
        self.furniture_changed.publish(furniture);
    }

    pub(crate) fn publish_furniture_removed(&mut self, furniture: &Furniture) {
        self.counts.furniture_removed = self.counts.furniture_removed.saturating_add(1);
        self.furniture_removed.publish(furniture);
    }
}
