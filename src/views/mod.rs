// Presentation view-models
//
// Pure shaping of standings and events for whichever front end renders them
// (terminal dashboard, JSON API).

pub mod carousel;
pub mod panel;

pub use carousel::{
    date_label, ordinal, AutoAdvance, Carousel, CarouselTicker, EventCard, PhotoSource, WinnerCard,
    DEFAULT_INTERVAL,
};
pub use panel::{PanelRow, RankIcon, StandingsPanel};
