// Results carousel view-model
//
// One card per event, advancing on a fixed interval and wrapping around.
// The carousel itself is plain state; timers live next to it and belong to
// whichever view instance owns the carousel.

use chrono::{DateTime, NaiveDate};
use serde::Serialize;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;

use crate::event::{Event, Winner, PLACEHOLDER_PHOTO};
use crate::house::House;

pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(5);

// ============================================================================
// PHOTO
// ============================================================================

/// Image source with a single fallback swap to the placeholder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PhotoSource {
    pub requested: Option<String>,
    pub current: String,
}

impl PhotoSource {
    pub fn new(requested: Option<&str>) -> Self {
        PhotoSource {
            requested: requested.map(str::to_string),
            current: requested.unwrap_or(PLACEHOLDER_PHOTO).to_string(),
        }
    }

    /// Handle a failed load. Returns whether the source changed; once on the
    /// placeholder, further failures are ignored.
    pub fn on_load_failure(&mut self) -> bool {
        if self.current == PLACEHOLDER_PHOTO {
            return false;
        }
        self.current = PLACEHOLDER_PHOTO.to_string();
        true
    }

    pub fn src(&self) -> &str {
        &self.current
    }

    pub fn is_placeholder(&self) -> bool {
        self.current == PLACEHOLDER_PHOTO
    }
}

// ============================================================================
// CARDS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WinnerCard {
    pub position: u8,
    pub ordinal: String,
    /// House name as stored; style is absent for unknown houses
    pub house: String,
    pub house_style: Option<&'static str>,
    pub photo: PhotoSource,
    pub name: String,
    pub points: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventCard {
    pub id: String,
    pub name: String,
    pub date_label: String,
    pub category: String,
    pub grade_level: String,
    pub winners: Vec<WinnerCard>,
}

impl EventCard {
    pub fn from_event(event: &Event) -> Self {
        EventCard {
            id: event.id.clone(),
            name: event.name.clone(),
            date_label: date_label(&event.date),
            category: event.category.clone(),
            grade_level: event.grade_level.clone(),
            winners: event.podium().into_iter().map(WinnerCard::from_winner).collect(),
        }
    }

    /// "14/08/2025 • Cultural • Senior"
    pub fn subtitle(&self) -> String {
        format!("{} • {} • {}", self.date_label, self.category, self.grade_level)
    }
}

impl WinnerCard {
    pub fn from_winner(winner: &Winner) -> Self {
        WinnerCard {
            position: winner.position,
            ordinal: ordinal(winner.position),
            house: winner.house.clone(),
            house_style: winner.house().map(|h: House| h.style_token()),
            photo: PhotoSource::new(winner.photo_uri()),
            name: winner.name.clone(),
            points: winner.points,
        }
    }
}

pub fn ordinal(position: u8) -> String {
    let suffix = match (position % 10, position % 100) {
        (_, 11..=13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    };
    format!("{}{}", position, suffix)
}

/// ISO dates render as dd/mm/yyyy; anything else is shown verbatim.
pub fn date_label(raw: &str) -> String {
    let trimmed = raw.trim();
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return date.format("%d/%m/%Y").to_string();
    }
    if let Ok(timestamp) = DateTime::parse_from_rfc3339(trimmed) {
        return timestamp.format("%d/%m/%Y").to_string();
    }
    trimmed.to_string()
}

// ============================================================================
// CAROUSEL
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct Carousel {
    cards: Vec<EventCard>,
    index: usize,
}

impl Carousel {
    pub fn new(events: &[Event]) -> Self {
        let mut carousel = Carousel::default();
        carousel.set_events(events);
        carousel
    }

    /// Replace the cards with a fresh snapshot, keeping the position in range.
    pub fn set_events(&mut self, events: &[Event]) {
        self.cards = events.iter().map(EventCard::from_event).collect();
        self.index = if self.cards.is_empty() {
            0
        } else {
            self.index % self.cards.len()
        };
    }

    /// Move to the next card, wrapping after the last one.
    pub fn advance(&mut self) -> usize {
        self.advance_by(1)
    }

    pub fn advance_by(&mut self, steps: usize) -> usize {
        if !self.cards.is_empty() {
            self.index = (self.index + steps % self.cards.len()) % self.cards.len();
        }
        self.index
    }

    pub fn current(&self) -> Option<&EventCard> {
        self.cards.get(self.index)
    }

    pub fn cards(&self) -> &[EventCard] {
        &self.cards
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }
}

// ============================================================================
// TIMERS
// ============================================================================

/// Deadline-based advancing for draw loops that poll.
#[derive(Debug, Clone)]
pub struct AutoAdvance {
    interval: Duration,
    next_due: Instant,
}

impl AutoAdvance {
    pub fn new(interval: Duration, now: Instant) -> Self {
        let interval = interval.max(Duration::from_millis(1));
        AutoAdvance {
            interval,
            next_due: now + interval,
        }
    }

    /// Number of whole intervals elapsed since the last call.
    pub fn due_ticks(&mut self, now: Instant) -> usize {
        let mut ticks = 0;
        while now >= self.next_due {
            ticks += 1;
            self.next_due += self.interval;
        }
        ticks
    }

    pub fn time_until_next(&self, now: Instant) -> Duration {
        self.next_due.saturating_duration_since(now)
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

/// Background ticker for push-style front ends. Aborted on drop so it can
/// never act on a torn-down view.
pub struct CarouselTicker {
    handle: JoinHandle<()>,
}

impl CarouselTicker {
    /// Must be called from within a tokio runtime.
    pub fn spawn<F>(interval: Duration, mut on_tick: F) -> Self
    where
        F: FnMut() + Send + 'static,
    {
        let interval = interval.max(Duration::from_millis(1));
        let handle = tokio::spawn(async move {
            let start = tokio::time::Instant::now() + interval;
            let mut ticker = tokio::time::interval_at(start, interval);
            loop {
                ticker.tick().await;
                on_tick();
            }
        });

        CarouselTicker { handle }
    }
}

impl Drop for CarouselTicker {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventDraft;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn events(count: usize) -> Vec<Event> {
        (0..count)
            .map(|i| {
                let draft = EventDraft::new(&format!("Event {}", i), "2025-08-14", "Cultural", "Senior")
                    .with_winner(Winner::new(2, House::Delany, "B", 5))
                    .with_winner(Winner::new(1, House::Tagore, "A", 10).with_photo("https://img/a.jpg"));
                Event::from_draft(format!("e{}", i), draft)
            })
            .collect()
    }

    #[test]
    fn test_advance_wraps_modulo_len() {
        let mut carousel = Carousel::new(&events(3));
        for n in 1..=10 {
            carousel.advance();
            assert_eq!(carousel.index(), n % 3);
        }

        let mut jumped = Carousel::new(&events(3));
        assert_eq!(jumped.advance_by(11), 11 % 3);
    }

    #[test]
    fn test_empty_carousel_never_panics() {
        let mut carousel = Carousel::new(&[]);
        assert_eq!(carousel.advance(), 0);
        assert!(carousel.current().is_none());
    }

    #[test]
    fn test_shrinking_snapshot_keeps_index_in_range() {
        let mut carousel = Carousel::new(&events(5));
        carousel.advance_by(4);
        carousel.set_events(&events(3));
        assert_eq!(carousel.index(), 1);
        assert!(carousel.current().is_some());
    }

    #[test]
    fn test_cards_sorted_by_position() {
        let carousel = Carousel::new(&events(1));
        let card = carousel.current().unwrap();

        let ordinals: Vec<&str> = card.winners.iter().map(|w| w.ordinal.as_str()).collect();
        assert_eq!(ordinals, vec!["1st", "2nd"]);
        assert_eq!(card.winners[0].house_style, Some("blue"));
        assert_eq!(card.subtitle(), "14/08/2025 • Cultural • Senior");
    }

    #[test]
    fn test_photo_falls_back_once() {
        let mut photo = PhotoSource::new(Some("https://img/broken.jpg"));
        assert_eq!(photo.src(), "https://img/broken.jpg");

        assert!(photo.on_load_failure());
        assert!(photo.is_placeholder());
        assert!(!photo.on_load_failure());
        assert_eq!(photo.requested.as_deref(), Some("https://img/broken.jpg"));

        let missing = PhotoSource::new(None);
        assert!(missing.is_placeholder());
    }

    #[test]
    fn test_ordinals() {
        assert_eq!(ordinal(1), "1st");
        assert_eq!(ordinal(2), "2nd");
        assert_eq!(ordinal(3), "3rd");
        assert_eq!(ordinal(4), "4th");
        assert_eq!(ordinal(11), "11th");
    }

    #[test]
    fn test_date_label_falls_back_to_raw() {
        assert_eq!(date_label("2025-08-14"), "14/08/2025");
        assert_eq!(date_label("2025-08-14T09:30:00Z"), "14/08/2025");
        assert_eq!(date_label("Day 2"), "Day 2");
    }

    #[test]
    fn test_auto_advance_counts_elapsed_intervals() {
        let start = Instant::now();
        let mut timer = AutoAdvance::new(DEFAULT_INTERVAL, start);

        assert_eq!(timer.due_ticks(start + Duration::from_secs(4)), 0);
        assert_eq!(timer.due_ticks(start + Duration::from_secs(5)), 1);
        assert_eq!(timer.due_ticks(start + Duration::from_secs(21)), 3);
        assert_eq!(
            timer.time_until_next(start + Duration::from_secs(21)),
            Duration::from_secs(4)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticker_stops_on_drop() {
        let ticks = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&ticks);
        let ticker = CarouselTicker::spawn(DEFAULT_INTERVAL, move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        tokio::time::sleep(Duration::from_millis(15_500)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 3);

        drop(ticker);
        tokio::time::sleep(Duration::from_secs(20)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 3);
    }
}
