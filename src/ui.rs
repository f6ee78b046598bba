// 🖥️ Terminal dashboard
//
// Two pages over the same live snapshot:
// - Standings: the four houses, ranked, with a bar against the leader
// - Carousel: one event card at a time, advancing on its own, with the
//   standings beside it
//
// Snapshots arrive on a channel fed by the subscription; the draw loop never
// touches the store.

use anyhow::Result;
use chrono::{DateTime, Local, Utc};
use crossterm::{
    event::{self, Event as TermEvent, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, Wrap},
    Frame, Terminal,
};
use std::io;
use std::sync::mpsc::{Receiver, TryRecvError};
use std::time::{Duration, Instant};
use tracing::{debug, info};

use crate::event::Event;
use crate::house::House;
use crate::standings::{compute_standings, Standings};
use crate::views::{AutoAdvance, Carousel, EventCard, StandingsPanel};
use crate::FESTIVAL_TITLE;

/// Upper bound on how long the loop blocks waiting for a key.
const REDRAW_EVERY: Duration = Duration::from_millis(250);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Page {
    Standings,
    Carousel,
}

impl Page {
    pub fn next(&self) -> Self {
        match self {
            Page::Standings => Page::Carousel,
            Page::Carousel => Page::Standings,
        }
    }

    pub fn previous(&self) -> Self {
        // Two pages: same as next
        self.next()
    }

    pub fn title(&self) -> &str {
        match self {
            Page::Standings => "House Standings",
            Page::Carousel => "Event Results",
        }
    }
}

pub struct App {
    pub events: Vec<Event>,
    pub standings: Standings,
    pub panel: Option<StandingsPanel>,
    pub carousel: Carousel,
    pub current_page: Page,
    auto: AutoAdvance,
}

impl App {
    pub fn new(carousel_interval: Duration, now: Instant) -> Self {
        Self {
            events: Vec::new(),
            standings: compute_standings(&[]),
            panel: None,
            carousel: Carousel::default(),
            current_page: Page::Carousel,
            auto: AutoAdvance::new(carousel_interval, now),
        }
    }

    /// No snapshot received yet
    pub fn is_loading(&self) -> bool {
        self.panel.is_none()
    }

    /// Replace everything derived from the previous snapshot.
    pub fn apply_snapshot(&mut self, events: Vec<Event>, at: DateTime<Utc>) {
        self.standings = compute_standings(&events);
        self.panel = Some(StandingsPanel::build(&self.standings, at));
        self.carousel.set_events(&events);
        self.events = events;
        debug!(events = self.events.len(), "dashboard snapshot applied");
    }

    /// Advance the carousel for every interval that has elapsed. Returns the
    /// number of cards moved.
    pub fn on_tick(&mut self, now: Instant) -> usize {
        let ticks = self.auto.due_ticks(now);
        if ticks > 0 {
            self.carousel.advance_by(ticks);
        }
        ticks
    }

    pub fn time_until_tick(&self, now: Instant) -> Duration {
        self.auto.time_until_next(now)
    }

    /// Manual step; restarts the interval so the new card gets its full time.
    pub fn next_card(&mut self, now: Instant) {
        self.carousel.advance();
        self.auto = AutoAdvance::new(self.auto.interval(), now);
    }

    pub fn previous_card(&mut self, now: Instant) {
        let len = self.carousel.len();
        if len > 0 {
            self.carousel.advance_by(len - 1);
        }
        self.auto = AutoAdvance::new(self.auto.interval(), now);
    }

    pub fn next_page(&mut self) {
        self.current_page = self.current_page.next();
    }

    pub fn previous_page(&mut self) {
        self.current_page = self.current_page.previous();
    }
}

pub fn run_ui(app: &mut App, updates: Receiver<Vec<Event>>) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Run the app
    let res = run_app(&mut terminal, app, &updates);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    res?;
    Ok(())
}

fn run_app<B: ratatui::backend::Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    updates: &Receiver<Vec<Event>>,
) -> io::Result<()> {
    loop {
        loop {
            match updates.try_recv() {
                Ok(events) => app.apply_snapshot(events, Utc::now()),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    info!("snapshot feed closed, leaving dashboard");
                    return Ok(());
                }
            }
        }

        terminal.draw(|f| ui(f, app))?;

        let timeout = app.time_until_tick(Instant::now()).min(REDRAW_EVERY);
        if event::poll(timeout)? {
            if let TermEvent::Key(key) = event::read()? {
                if key.kind != KeyEventKind::Press {
                    continue;
                }
                match key.code {
                    KeyCode::Char('q') | KeyCode::Esc => return Ok(()),
                    KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                        return Ok(())
                    }
                    KeyCode::Tab => app.next_page(),
                    KeyCode::BackTab => app.previous_page(),
                    KeyCode::Right | KeyCode::Char('l') => app.next_card(Instant::now()),
                    KeyCode::Left | KeyCode::Char('h') => app.previous_card(Instant::now()),
                    _ => {}
                }
            }
        }

        app.on_tick(Instant::now());
    }
}

fn ui(f: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Title + page tabs
            Constraint::Min(0),    // Content area
            Constraint::Length(3), // Status bar
        ])
        .split(f.size());

    render_header(f, chunks[0], app);

    if app.is_loading() {
        render_message(f, chunks[1], "Loading results...");
    } else {
        match app.current_page {
            Page::Standings => render_standings(f, chunks[1], app),
            Page::Carousel => {
                let content = Layout::default()
                    .direction(Direction::Horizontal)
                    .constraints([Constraint::Percentage(62), Constraint::Percentage(38)])
                    .split(chunks[1]);

                render_carousel(f, content[0], app);
                render_standings(f, content[1], app);
            }
        }
    }

    render_status_bar(f, chunks[2], app);
}

fn house_color(house: House) -> Color {
    let (r, g, b) = house.accent_rgb();
    Color::Rgb(r, g, b)
}

fn render_header(f: &mut Frame, area: Rect, app: &App) {
    let mut spans = vec![
        Span::styled(
            FESTIVAL_TITLE,
            Style::default()
                .fg(Color::Magenta)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw("  |  "),
    ];

    for (i, page) in [Page::Standings, Page::Carousel].iter().enumerate() {
        if i > 0 {
            spans.push(Span::raw(" │ "));
        }
        let style = if *page == app.current_page {
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD | Modifier::UNDERLINED)
        } else {
            Style::default().fg(Color::DarkGray)
        };
        spans.push(Span::styled(page.title(), style));
    }

    if let Some(panel) = &app.panel {
        spans.push(Span::raw("  |  "));
        spans.push(Span::styled(
            format!(
                "Updated {}",
                panel.last_updated.with_timezone(&Local).format("%H:%M:%S")
            ),
            Style::default().fg(Color::White),
        ));
    }

    let header = Paragraph::new(Line::from(spans)).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan)),
    );

    f.render_widget(header, area);
}

fn render_message(f: &mut Frame, area: Rect, text: &str) {
    let message = Paragraph::new(text)
        .alignment(Alignment::Center)
        .style(Style::default().fg(Color::DarkGray))
        .block(Block::default().borders(Borders::ALL));
    f.render_widget(message, area);
}

fn render_standings(f: &mut Frame, area: Rect, app: &App) {
    let Some(panel) = &app.panel else {
        return;
    };

    let header_cells = ["", "Rank", "House", "Points", ""].iter().map(|h| {
        Cell::from(*h).style(
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        )
    });
    let header = Row::new(header_cells)
        .style(Style::default().bg(Color::DarkGray))
        .height(1);

    // Bar width scales with the panel, leaving room for the fixed columns
    let bar_width = area.width.saturating_sub(34).max(4) as usize;

    let rows = panel.rows.iter().map(|row| {
        let color = house_color(row.house);
        let filled = bar_width * row.progress_percent as usize / 100;
        let bar = format!("{}{}", "█".repeat(filled), "░".repeat(bar_width - filled));

        let mut house = vec![Span::styled(
            row.house.name(),
            Style::default().fg(color).add_modifier(Modifier::BOLD),
        )];
        if row.leading {
            house.push(Span::styled(
                " LEADING",
                Style::default()
                    .fg(Color::Black)
                    .bg(Color::Yellow)
                    .add_modifier(Modifier::BOLD),
            ));
        }

        Row::new(vec![
            Cell::from(row.icon.glyph()),
            Cell::from(format!("#{}", row.rank)),
            Cell::from(Line::from(house)),
            Cell::from(row.score.to_string()).style(Style::default().fg(color)),
            Cell::from(bar).style(Style::default().fg(color)),
        ])
        .height(2)
    });

    let table = Table::new(
        rows,
        [
            Constraint::Length(3),
            Constraint::Length(5),
            Constraint::Length(18),
            Constraint::Length(7),
            Constraint::Min(4),
        ],
    )
    .header(header)
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White))
            .title(" House Standings "),
    );

    f.render_widget(table, area);
}

fn render_carousel(f: &mut Frame, area: Rect, app: &App) {
    let Some(card) = app.carousel.current() else {
        render_message(f, area, "No events yet");
        return;
    };

    let title = format!(
        " {} ({}/{}) ",
        card.name,
        app.carousel.index() + 1,
        app.carousel.len()
    );

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::White))
        .title(title);

    f.render_widget(Paragraph::new(card_lines(card)).block(block).wrap(Wrap { trim: false }), area);
}

fn card_lines(card: &EventCard) -> Vec<Line<'_>> {
    let mut lines = vec![
        Line::from(Span::styled(
            card.subtitle(),
            Style::default().fg(Color::DarkGray),
        )),
        Line::from(""),
    ];

    if card.winners.is_empty() {
        lines.push(Line::from(Span::styled(
            "Results pending",
            Style::default().fg(Color::DarkGray),
        )));
    }

    for winner in &card.winners {
        let color = House::parse(&winner.house)
            .map(house_color)
            .unwrap_or(Color::Gray);

        lines.push(Line::from(vec![
            Span::styled(
                format!("{:<5}", winner.ordinal),
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
            ),
            Span::styled(
                winner.name.as_str(),
                Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
            ),
            Span::raw("  "),
            Span::styled(winner.house.as_str(), Style::default().fg(color)),
            Span::raw("  "),
            Span::styled(
                format!("+{} pts", winner.points),
                Style::default().fg(Color::Green),
            ),
        ]));
        lines.push(Line::from(Span::styled(
            format!("     📷 {}", winner.photo.src()),
            Style::default().fg(Color::DarkGray),
        )));
    }

    lines
}

fn render_status_bar(f: &mut Frame, area: Rect, app: &App) {
    let mut spans = vec![Span::raw(
        "q: Quit | Tab: Page | ←/→: Card",
    )];

    spans.push(Span::raw("  |  "));
    spans.push(Span::raw(format!("{} events", app.events.len())));

    let status = Paragraph::new(Line::from(spans)).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::DarkGray)),
    );

    f.render_widget(status, area);
}
