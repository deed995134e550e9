use std::sync::RwLock;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;

use crate::config::cache_ttl;
use crate::error::Result;
use crate::live::ports::EventCache;
use crate::types::{EventCard, EventId, EventStatus, EventSummary};

#[derive(Debug, Clone)]
struct Entry<T> {
    value: T,
    expires_at: Instant,
}

impl<T: Clone> Entry<T> {
    fn new(value: T, ttl: Duration, now: Instant) -> Self {
        Self { value, expires_at: now + ttl }
    }

    fn fresh(&self, now: Instant) -> Option<T> {
        (now < self.expires_at).then(|| self.value.clone())
    }
}

/// One cache key. `generation` moves on every invalidation so a fill that
/// read the store before the invalidation can be told apart from one after.
#[derive(Debug)]
struct Slot<T> {
    generation: u64,
    entry: Option<Entry<T>>,
}

impl<T: Clone> Slot<T> {
    fn empty() -> Self {
        Self { generation: 0, entry: None }
    }

    fn lookup(&mut self, now: Instant) -> Option<T> {
        let hit = self.entry.as_ref().and_then(|e| e.fresh(now));
        if hit.is_none() {
            self.entry = None;
        }
        hit
    }

    fn fill(&mut self, value: T, generation: u64, ttl: Duration, now: Instant) -> bool {
        if self.generation != generation {
            return false;
        }
        self.entry = Some(Entry::new(value, ttl, now));
        true
    }

    fn invalidate(&mut self) {
        self.generation = self.generation.wrapping_add(1);
        self.entry = None;
    }
}

// ---------------------------------------------------------------------------
// MemoryEventCache
// ---------------------------------------------------------------------------

/// Read-through cache for the API. Event cards live for 20s while the event
/// is live and 120s otherwise; the events list lives for 60s.
///
/// The live monitor only ever invalidates, it never fills. Readers take the
/// key's generation before querying the store and hand it back on fill; a
/// fill whose generation is out of date is dropped.
pub struct MemoryEventCache {
    details: DashMap<EventId, Slot<EventCard>>,
    list: RwLock<Slot<Vec<EventSummary>>>,
}

impl MemoryEventCache {
    pub fn new() -> Self {
        Self {
            details: DashMap::new(),
            list: RwLock::new(Slot::empty()),
        }
    }

    pub fn detail_ttl(status: EventStatus) -> Duration {
        match status {
            EventStatus::Live => Duration::from_secs(cache_ttl::LIVE_DETAIL_SECS),
            _ => Duration::from_secs(cache_ttl::DETAIL_SECS),
        }
    }

    // ---- event detail ----

    pub fn get_event_card(&self, event_id: EventId) -> Option<EventCard> {
        self.get_event_card_at(event_id, Instant::now())
    }

    pub fn event_card_generation(&self, event_id: EventId) -> u64 {
        self.details.get(&event_id).map(|slot| slot.generation).unwrap_or(0)
    }

    /// Returns false when the card was invalidated since `generation` was read.
    pub fn put_event_card(&self, card: EventCard, generation: u64) -> bool {
        self.put_event_card_at(card, generation, Instant::now())
    }

    fn get_event_card_at(&self, event_id: EventId, now: Instant) -> Option<EventCard> {
        self.details.get_mut(&event_id)?.lookup(now)
    }

    fn put_event_card_at(&self, card: EventCard, generation: u64, now: Instant) -> bool {
        let ttl = Self::detail_ttl(card.event.status);
        let event_id = card.event.id;
        self.details
            .entry(event_id)
            .or_insert_with(Slot::empty)
            .fill(card, generation, ttl, now)
    }

    #[cfg(test)]
    fn cached_details(&self) -> usize {
        self.details.iter().filter(|slot| slot.entry.is_some()).count()
    }

    // ---- events list ----

    pub fn get_events_list(&self) -> Option<Vec<EventSummary>> {
        self.get_events_list_at(Instant::now())
    }

    pub fn events_list_generation(&self) -> u64 {
        self.list.read().map(|slot| slot.generation).unwrap_or(0)
    }

    pub fn put_events_list(&self, events: Vec<EventSummary>, generation: u64) -> bool {
        self.put_events_list_at(events, generation, Instant::now())
    }

    fn get_events_list_at(&self, now: Instant) -> Option<Vec<EventSummary>> {
        self.list.write().ok()?.lookup(now)
    }

    fn put_events_list_at(&self, events: Vec<EventSummary>, generation: u64, now: Instant) -> bool {
        let ttl = Duration::from_secs(cache_ttl::LIST_SECS);
        match self.list.write() {
            Ok(mut slot) => slot.fill(events, generation, ttl, now),
            Err(_) => false,
        }
    }
}

impl Default for MemoryEventCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventCache for MemoryEventCache {
    async fn invalidate_event_detail(&self, event_id: EventId) -> Result<()> {
        self.details.entry(event_id).or_insert_with(Slot::empty).invalidate();
        Ok(())
    }

    async fn invalidate_events_list(&self) -> Result<()> {
        if let Ok(mut slot) = self.list.write() {
            slot.invalidate();
        }
        Ok(())
    }
}
