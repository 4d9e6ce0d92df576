use climate_dash::{
    AmbientColor, Dashboard, DashboardConfig, DialPhase, Room, RoomControl, RoomId, StoreEvent,
    StoreReceiver, SyncStamp,
};
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap},
    Frame, Terminal,
};
use std::io;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

/// Simulated finger travel per key press, in pixels
const DRAG_STEP: f64 = 30.0;

#[derive(PartialEq)]
enum AppState {
    Rooms,
    RoomControl,
}

struct App {
    state: AppState,
    dashboard: Dashboard,
    selected_room_index: usize,
    control: Option<RoomControl>,
    drag_y: f64,
    status_message: String,
    events: StoreReceiver,
}

impl App {
    fn new(dashboard: Dashboard) -> Self {
        let events = dashboard.subscribe();
        Self {
            state: AppState::Rooms,
            dashboard,
            selected_room_index: 0,
            control: None,
            drag_y: 0.0,
            status_message: "Enter to open a room, r to refresh, q to quit".to_string(),
            events,
        }
    }

    fn rooms(&self) -> Vec<Room> {
        self.dashboard
            .store()
            .rooms()
            .iter()
            .map(|room| room.as_ref().clone())
            .collect()
    }

    fn selected_room_id(&self) -> Option<RoomId> {
        self.rooms().get(self.selected_room_index).map(|r| r.id)
    }

    fn select_next(&mut self) {
        let room_count = self.dashboard.store().room_count();
        if room_count > 0 {
            self.selected_room_index = (self.selected_room_index + 1) % room_count;
        }
    }

    fn select_previous(&mut self) {
        let room_count = self.dashboard.store().room_count();
        if room_count > 0 {
            if self.selected_room_index == 0 {
                self.selected_room_index = room_count - 1;
            } else {
                self.selected_room_index -= 1;
            }
        }
    }

    fn open_selected_room(&mut self) {
        let Some(id) = self.selected_room_id() else {
            self.status_message = "No rooms configured".to_string();
            return;
        };

        // A key press is a tap
        let now = Instant::now();
        self.dashboard.press_room(id, now);
        self.dashboard.release_room(id, now);

        match self.dashboard.control(id) {
            Ok(control) => {
                self.control = Some(control);
                self.state = AppState::RoomControl;
                self.status_message =
                    "Up/Down turn the dial, Enter to set, p power, r refresh, Esc back".to_string();
            }
            Err(e) => {
                self.status_message = format!("Failed to open room: {}", e);
            }
        }
    }

    fn go_back(&mut self) {
        if let Some(control) = &mut self.control {
            control.set_active(false);
        }
        self.control = None;
        self.dashboard.back();
        self.state = AppState::Rooms;
        self.status_message = "Enter to open a room, r to refresh, q to quit".to_string();
    }

    fn refresh(&mut self) {
        let id = match &self.control {
            Some(control) => Some(control.room_id()),
            None => self.selected_room_id(),
        };
        if let Some(id) = id {
            if let Err(e) = self.dashboard.refresh_in_background(id) {
                self.status_message = format!("Refresh failed: {}", e);
            }
        }
    }

    fn turn_dial(&mut self, steps: f64) {
        let Some(control) = &mut self.control else {
            return;
        };
        if !control.tracker().is_dragging() {
            self.drag_y = 0.0;
            control.touch_start(self.drag_y);
        }
        self.drag_y += steps * DRAG_STEP;
        if let Some(update) = control.touch_move(self.drag_y) {
            self.status_message = format!(
                "Dial at {:.0}°",
                control.tracker().codec().angle_to_temperature(update.major_angle)
            );
        }
    }

    fn commit_dial(&mut self) {
        let Some(control) = &mut self.control else {
            return;
        };
        let Some(commit) = control.touch_end() else {
            return;
        };

        self.status_message = format!("Setting {:.0}°", commit.temperature);
        let sync = control.sync();
        tokio::spawn(async move {
            if let Err(e) = sync.set_temperature(commit.temperature).await {
                tracing::warn!("Failed to set temperature: {}", e);
            }
        });
    }

    fn toggle_power(&mut self) {
        let Some(control) = &self.control else {
            return;
        };
        let Some(room) = self.dashboard.store().room(control.room_id()) else {
            return;
        };

        let sync = control.sync();
        let on = !room.thermostat.on;
        self.status_message = format!("Turning {}", if on { "on" } else { "off" });
        tokio::spawn(async move {
            if let Err(e) = sync.set_power(on).await {
                tracing::warn!("Failed to set power: {}", e);
            }
        });
    }

    fn handle_store_events(&mut self) {
        for event in self.events.drain() {
            if let (StoreEvent::RoomUpdated(id), Some(control)) = (event, &mut self.control) {
                if control.room_id() == id {
                    control.follow_store();
                }
            }
        }
        if let Some(control) = &mut self.control {
            control.tick(Instant::now());
        }
    }
}

fn ambient_color() -> Color {
    let (r, g, b) = AmbientColor::now().to_rgb();
    Color::Rgb(r, g, b)
}

fn stamp_style(stamp: SyncStamp) -> Style {
    if stamp.is_error() {
        Style::default().fg(Color::Red)
    } else {
        Style::default().fg(Color::Gray)
    }
}

fn ui(f: &mut Frame, app: &App) {
    let outer_chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(1)
        .constraints([
            Constraint::Min(0),
            Constraint::Length(3),
            Constraint::Length(3),
        ])
        .split(f.size());

    match app.state {
        AppState::Rooms => render_rooms(f, app, outer_chunks[0]),
        AppState::RoomControl => render_room_control(f, app, outer_chunks[0]),
    }

    render_footer(f, app, outer_chunks[1]);
    render_status(f, app, outer_chunks[2]);
}

fn render_rooms(f: &mut Frame, app: &App, area: Rect) {
    let block = Block::default()
        .title(" Home / Climate Control (j/k to select, Enter to open, q to quit) ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(ambient_color()));

    let rooms = app.rooms();
    let items: Vec<ListItem> = rooms
        .iter()
        .map(|room| {
            let stamp = app.dashboard.sync_stamp(room.id).unwrap_or_default();
            let spinner = if app.dashboard.is_syncing(room.id) { " ⟳" } else { "" };
            let reading = if room.has_reading() {
                format!("{}° {}%", room.temperature, room.humidity)
            } else {
                "--° --%".to_string()
            };

            let content = vec![
                Line::from(vec![
                    Span::styled(
                        room.name.clone(),
                        Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
                    ),
                    Span::raw(spinner),
                ]),
                Line::from(vec![
                    Span::styled(reading, Style::default().fg(Color::Cyan)),
                    Span::raw(format!(
                        "  thermostat {} at {}°",
                        if room.thermostat.on { "on" } else { "off" },
                        room.thermostat.target_temperature
                    )),
                ]),
                Line::from(vec![
                    Span::raw(format!(
                        "cpu: {}°  mem: {}%  updated: ",
                        room.cpu_temp, room.memory_used
                    )),
                    Span::styled(stamp.to_string(), stamp_style(stamp)),
                ]),
                Line::from(""),
            ];
            ListItem::new(content)
        })
        .collect();

    let mut state = ListState::default();
    state.select(Some(app.selected_room_index));

    let list = List::new(items)
        .block(block)
        .highlight_style(
            Style::default()
                .bg(Color::DarkGray)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol(">> ");

    f.render_stateful_widget(list, area, &mut state);
}

fn render_room_control(f: &mut Frame, app: &App, area: Rect) {
    let block = Block::default()
        .title(" Room (Up/Down dial, Enter set, p power, r refresh, Esc back, q quit) ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Green));

    let (Some(control), Some(room)) = (&app.control, app.dashboard.active_room()) else {
        let text = Paragraph::new("No room selected")
            .block(block)
            .wrap(Wrap { trim: true });
        f.render_widget(text, area);
        return;
    };

    let tracker = control.tracker();
    let stamp = app.dashboard.sync_stamp(room.id).unwrap_or_default();
    let emphasized = tracker.emphasized_temperature();
    let preview = tracker.preview_temperature();

    // The dial labels around the pointer
    let mut dial = Vec::new();
    for label in tracker.codec().labels() {
        if (label.angle - tracker.major_angle()).abs() > 45.0 {
            continue;
        }
        let text = format!(" {:.0} ", label.temperature);
        let style = if Some(label.temperature) == emphasized {
            Style::default().fg(Color::Black).bg(ambient_color()).add_modifier(Modifier::BOLD)
        } else if label.temperature == preview {
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::DarkGray)
        };
        dial.push(Span::styled(text, style));
    }

    let phase = match tracker.phase() {
        DialPhase::Idle => "idle",
        DialPhase::Dragging => "dragging",
        DialPhase::Settling => "settling",
    };

    let lines = vec![
        Line::from(vec![
            Span::styled("Room: ", Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)),
            Span::raw(room.name.clone()),
            Span::raw(if room.connected { "" } else { "  (disconnected)" }),
        ]),
        Line::from(""),
        Line::from(vec![
            Span::styled("Temperature: ", Style::default().fg(Color::Yellow)),
            Span::styled(
                format!("{}°", room.temperature),
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
            ),
        ]),
        Line::from(vec![
            Span::styled("Humidity: ", Style::default().fg(Color::Yellow)),
            Span::raw(format!("{}%", room.humidity)),
        ]),
        Line::from(""),
        Line::from(vec![
            Span::styled("Thermostat: ", Style::default().fg(Color::Yellow)),
            Span::styled(
                if room.thermostat.on { "ON" } else { "OFF" },
                if room.thermostat.on {
                    Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)
                } else {
                    Style::default().fg(Color::Red)
                },
            ),
        ]),
        Line::from(vec![
            Span::styled("Target: ", Style::default().fg(Color::Yellow)),
            Span::raw(format!("{}°", room.thermostat.target_temperature)),
        ]),
        Line::from(""),
        Line::from(Span::styled(
            format!("Dial ({}):", phase),
            Style::default().fg(Color::Yellow),
        )),
        Line::from(dial),
        Line::from(""),
        Line::from(vec![
            Span::raw(format!(
                "cpu: {}°  mem: {}%  updated: ",
                room.cpu_temp, room.memory_used
            )),
            Span::styled(stamp.to_string(), stamp_style(stamp)),
        ]),
    ];

    let text = Paragraph::new(lines).block(block).wrap(Wrap { trim: true });
    f.render_widget(text, area);
}

fn render_footer(f: &mut Frame, app: &App, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Gray));

    let weather = match app.dashboard.weather() {
        Some(reading) => format!(
            "Outside {}° {}%",
            reading.temperature, reading.relative_humidity
        ),
        None if app.dashboard.weather_loading() => "Outside ...".to_string(),
        None => "Outside --".to_string(),
    };
    let clock = chrono::Local::now().format("%a %d %b %H:%M").to_string();

    let line = Line::from(vec![
        Span::raw(weather),
        Span::raw("   "),
        Span::styled(clock, Style::default().add_modifier(Modifier::BOLD)),
        Span::raw("   "),
        Span::styled("  ", Style::default().bg(ambient_color())),
        Span::raw(format!(" {}", app.dashboard.ambient())),
    ]);

    f.render_widget(Paragraph::new(line).block(block), area);
}

fn render_status(f: &mut Frame, app: &App, area: Rect) {
    let block = Block::default()
        .title(" Status ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Gray));

    let text = Paragraph::new(app.status_message.clone())
        .block(block)
        .wrap(Wrap { trim: true });

    f.render_widget(text, area);
}

fn init_logging(level: &str) -> Result<(), Box<dyn std::error::Error>> {
    // The terminal belongs to the UI, so logs go to a file
    let file = std::fs::File::create("climate-dash.log")?;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(false)
        .with_writer(std::sync::Mutex::new(file))
        .init();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = match std::env::args().nth(1) {
        Some(path) => DashboardConfig::load(path)?,
        None => DashboardConfig::load_or_default(),
    };
    init_logging(&config.logging.level)?;

    let mut dashboard = Dashboard::new(config)?;
    dashboard.start().await;

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = App::new(dashboard);

    // Main loop
    let res = run_app(&mut terminal, &mut app).await;

    app.dashboard.stop().await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        println!("Error: {}", err);
    }

    Ok(())
}

async fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
) -> Result<(), Box<dyn std::error::Error>> {
    loop {
        app.handle_store_events();

        // Draw UI
        terminal.draw(|f| ui(f, app))?;

        // Handle input events (non-blocking)
        if event::poll(std::time::Duration::from_millis(100))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    match app.state {
                        AppState::Rooms => match key.code {
                            KeyCode::Char('q') => return Ok(()),
                            KeyCode::Char('j') | KeyCode::Down => app.select_next(),
                            KeyCode::Char('k') | KeyCode::Up => app.select_previous(),
                            KeyCode::Char('r') => app.refresh(),
                            KeyCode::Enter => app.open_selected_room(),
                            _ => {}
                        },
                        AppState::RoomControl => match key.code {
                            KeyCode::Char('q') => return Ok(()),
                            KeyCode::Esc => app.go_back(),
                            KeyCode::Up | KeyCode::Char('k') => app.turn_dial(1.0),
                            KeyCode::Down | KeyCode::Char('j') => app.turn_dial(-1.0),
                            KeyCode::Enter => app.commit_dial(),
                            KeyCode::Char('p') => app.toggle_power(),
                            KeyCode::Char('r') => app.refresh(),
                            _ => {}
                        },
                    }
                }
            }
        }
    }
}
