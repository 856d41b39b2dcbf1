//! Window of message ids the bus has already handled.

use std::time::Duration;

use moka::sync::Cache;

/// Message ids already handled, bounded by count and by age
///
/// An id that has aged or been evicted out of the window and is then
/// redelivered is processed again.
#[derive(Clone)]
pub struct SeenWindow {
    ids: Cache<String, ()>,
}

impl std::fmt::Debug for SeenWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SeenWindow")
            .field("entries", &self.ids.entry_count())
            .finish()
    }
}

impl SeenWindow {
    pub const DEFAULT_CAPACITY: u64 = 10_000;
    pub const DEFAULT_MAX_AGE: Duration = Duration::from_secs(600);

    pub fn new(capacity: u64, max_age: Duration) -> Self {
        Self {
            ids: Cache::builder()
                .max_capacity(capacity)
                .time_to_live(max_age)
                .build(),
        }
    }

    /// Record `id`; true only for the caller that inserted it.
    pub fn first_sighting(&self, id: &str) -> bool {
        self.ids.entry(id.to_string()).or_insert(()).is_fresh()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains_key(id)
    }

    /// Number of ids in the window once pending evictions are applied.
    pub fn len(&self) -> u64 {
        self.ids.run_pending_tasks();
        self.ids.entry_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for SeenWindow {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY, Self::DEFAULT_MAX_AGE)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_second_sighting_is_rejected() {
        let seen = SeenWindow::default();
        assert!(seen.first_sighting("msg-1"));
        assert!(!seen.first_sighting("msg-1"));
        assert!(seen.first_sighting("msg-2"));
        assert!(seen.contains("msg-1"));
        assert_eq!(seen.len(), 2);
    }

    #[test]
    fn test_capacity_bounds_window() {
        let seen = SeenWindow::new(4, Duration::from_secs(60));
        for i in 0..64 {
            seen.first_sighting(&format!("msg-{}", i));
        }
        assert!(seen.len() <= 4);
    }

    #[test]
    fn test_aged_ids_leave_window() {
        let seen = SeenWindow::new(100, Duration::from_millis(50));
        assert!(seen.first_sighting("old"));
        std::thread::sleep(Duration::from_millis(120));
        assert!(!seen.contains("old"));
        assert!(seen.first_sighting("old"));
    }

    #[test]
    fn test_concurrent_sightings_single_winner() {
        let seen = SeenWindow::default();
        let winners = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| scope.spawn(|| seen.first_sighting("msg-1")))
                .collect();
            handles
                .into_iter()
                .map(|handle| handle.join().unwrap())
                .filter(|won| *won)
                .count()
        });
        assert_eq!(winners, 1);
    }
}
