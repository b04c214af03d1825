//! TUI module - plan dashboard and workout timer screen with ratatui

use std::io::{Stdout, stdout};
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{Result, anyhow};
use crossterm::{
    ExecutableCommand,
    event::{self, Event, KeyCode, KeyEventKind},
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    prelude::*,
    widgets::{Block, Borders, Cell, Gauge, List, ListItem, Paragraph, Row, Table, TableState},
};

use crate::plans::{WorkoutPlan, WorkoutRecord, format_clock, format_duration};
use crate::settings::Settings;
use crate::store::PlanStore;
use crate::timer::{SessionCommand, SessionHandle, TimerSnapshot, TimerState};

type Tui = Terminal<CrosstermBackend<Stdout>>;

const RECENT_RECORDS: usize = 8;

/// Colors derived from the user's theme settings
#[derive(Debug, Clone, Copy)]
pub struct Theme {
    pub accent: Color,
    pub text: Color,
    pub muted: Color,
    pub background: Color,
    pub rest: Color,
}

impl From<&Settings> for Theme {
    fn from(settings: &Settings) -> Self {
        let (r, g, b) = settings.theme_rgb();
        if settings.is_dark_mode {
            Self {
                accent: Color::Rgb(r, g, b),
                text: Color::Gray,
                muted: Color::DarkGray,
                background: Color::Black,
                rest: Color::Green,
            }
        } else {
            Self {
                accent: Color::Rgb(r, g, b),
                text: Color::Reset,
                muted: Color::DarkGray,
                background: Color::Reset,
                rest: Color::Green,
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Screen {
    Plans,
    Workout,
}

/// App state for TUI
pub struct App {
    store: Arc<Mutex<PlanStore>>,
    session: SessionHandle,
    theme: Theme,
    screen: Screen,
    table_state: TableState,
    plans: Vec<WorkoutPlan>,
    today_plan_id: Option<String>,
    records: Vec<WorkoutRecord>,
    status: Option<String>,
    should_quit: bool,
}

impl App {
    pub fn new(store: Arc<Mutex<PlanStore>>, session: SessionHandle, theme: Theme) -> Result<Self> {
        let mut app = Self {
            store,
            session,
            theme,
            screen: Screen::Plans,
            table_state: TableState::default(),
            plans: Vec::new(),
            today_plan_id: None,
            records: Vec::new(),
            status: None,
            should_quit: false,
        };
        app.refresh()?;
        Ok(app)
    }

    /// Open directly on the workout screen for `plan_id`
    pub fn start_workout(&mut self, plan_id: &str) -> Result<()> {
        let plan = {
            let mut store = self.lock_store()?;
            let plan = store
                .find_plan(plan_id)
                .cloned()
                .ok_or_else(|| anyhow!("unknown workout plan: {}", plan_id))?;
            store.set_current_workout_plan(Some(plan.id.clone()));
            plan
        };
        self.status = None;
        self.session.send(SessionCommand::Start(plan));
        self.screen = Screen::Workout;
        Ok(())
    }

    /// Run the TUI application
    pub fn run(&mut self) -> Result<()> {
        let mut terminal = init_terminal()?;

        let result = self.event_loop(&mut terminal);

        restore_terminal()?;
        result
    }

    fn event_loop(&mut self, terminal: &mut Tui) -> Result<()> {
        while !self.should_quit {
            let snapshot = self.session.snapshot();
            terminal.draw(|frame| self.render(frame, &snapshot))?;
            self.handle_events(&snapshot)?;
        }
        // Leaving mid-workout abandons it
        self.session.send(SessionCommand::Reset);
        Ok(())
    }

    fn lock_store(&self) -> Result<MutexGuard<'_, PlanStore>> {
        self.store
            .lock()
            .map_err(|e| anyhow!("Failed to lock plan store: {}", e))
    }

    fn refresh(&mut self) -> Result<()> {
        let store = self.lock_store()?;
        let plans = store.workout_plans().to_vec();
        let today_plan_id = store.today_workout_plan().map(|p| p.id.clone());
        let records = store
            .recent_records(RECENT_RECORDS)
            .into_iter()
            .cloned()
            .collect();
        drop(store);

        self.plans = plans;
        self.today_plan_id = today_plan_id;
        self.records = records;

        let selected = match self.table_state.selected() {
            _ if self.plans.is_empty() => None,
            Some(i) => Some(i.min(self.plans.len() - 1)),
            None => Some(0),
        };
        self.table_state.select(selected);
        Ok(())
    }

    fn plan_name(&self, plan_id: &str) -> String {
        self.plans
            .iter()
            .find(|p| p.id == plan_id)
            .map(|p| p.name.clone())
            .unwrap_or_else(|| format!("(deleted {})", plan_id))
    }

    fn render(&mut self, frame: &mut Frame, snapshot: &TimerSnapshot) {
        let area = frame.area();
        let background = Block::default().style(Style::default().bg(self.theme.background));
        frame.render_widget(background, area);

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),
                Constraint::Min(10),
                Constraint::Length(3),
            ])
            .split(area);

        // Header
        let title = match (self.screen, &snapshot.plan_name) {
            (Screen::Workout, Some(name)) => format!("fitcycle - {}", name),
            _ => "fitcycle - Workout Plans".to_string(),
        };
        let header = Paragraph::new(title)
            .style(Style::default().fg(self.theme.accent).bold())
            .block(Block::default().borders(Borders::ALL));
        frame.render_widget(header, chunks[0]);

        match self.screen {
            Screen::Plans => self.render_plans(frame, chunks[1]),
            Screen::Workout => self.render_workout(frame, chunks[1], snapshot),
        }

        // Footer
        let keys = match self.screen {
            Screen::Plans => "q: quit | ↑/↓: select | enter: start | t: today's plan | r: refresh",
            Screen::Workout => "space: pause/resume | s: skip | r: reset | esc: back | q: quit",
        };
        let footer_text = match &self.status {
            Some(status) => format!("{} | {}", status, keys),
            None => keys.to_string(),
        };
        let footer = Paragraph::new(footer_text)
            .style(Style::default().fg(self.theme.muted))
            .block(Block::default().borders(Borders::ALL));
        frame.render_widget(footer, chunks[2]);
    }

    fn render_plans(&mut self, frame: &mut Frame, area: Rect) {
        let columns = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
            .split(area);

        // Plan table
        let rows: Vec<Row> = self
            .plans
            .iter()
            .map(|p| {
                let is_today = self.today_plan_id.as_deref() == Some(p.id.as_str());
                let marker = if is_today { "★" } else { "" };
                Row::new(vec![
                    Cell::from(marker),
                    Cell::from(format!("{} {}", p.workout_type.emoji(), p.name)),
                    Cell::from(p.workout_type.as_str()),
                    Cell::from(p.exercises.len().to_string()),
                    Cell::from(format_duration(p.estimated_duration())),
                ])
            })
            .collect();

        let table = Table::new(
            rows,
            [
                Constraint::Length(2),
                Constraint::Min(20),
                Constraint::Length(10),
                Constraint::Length(10),
                Constraint::Length(10),
            ],
        )
        .header(
            Row::new(vec!["", "Plan", "Type", "Exercises", "Duration"])
                .style(Style::default().bold()),
        )
        .row_highlight_style(Style::default().fg(Color::Black).bg(self.theme.accent))
        .block(Block::default().borders(Borders::ALL).title("Plans"));

        frame.render_stateful_widget(table, columns[0], &mut self.table_state);

        let side = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(4), Constraint::Min(4)])
            .split(columns[1]);

        // Today
        let today = match &self.today_plan_id {
            Some(id) => self.plan_name(id),
            None => "Rest day (no active cycle entry)".to_string(),
        };
        let today = Paragraph::new(today)
            .style(Style::default().fg(self.theme.text))
            .block(Block::default().borders(Borders::ALL).title("Today"));
        frame.render_widget(today, side[0]);

        // Recent records
        let items: Vec<ListItem> = self
            .records
            .iter()
            .map(|r| {
                ListItem::new(format!(
                    "{}  {}  {}",
                    r.date.with_timezone(&chrono::Local).format("%m-%d %H:%M"),
                    self.plan_name(&r.plan_id),
                    format_duration(r.duration)
                ))
            })
            .collect();
        let history = List::new(items)
            .style(Style::default().fg(self.theme.text))
            .block(Block::default().borders(Borders::ALL).title("Recent workouts"));
        frame.render_widget(history, side[1]);
    }

    fn render_workout(&self, frame: &mut Frame, area: Rect, snapshot: &TimerSnapshot) {
        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(5),
                Constraint::Length(3),
                Constraint::Min(5),
            ])
            .split(area);

        let phase_color = match snapshot.state {
            TimerState::Exercise => self.theme.accent,
            TimerState::Rest => self.theme.rest,
            TimerState::Idle | TimerState::Completed => self.theme.muted,
        };
        let phase = match (snapshot.state, snapshot.running) {
            (TimerState::Completed, _) => "WORKOUT COMPLETE".to_string(),
            (TimerState::Idle, _) => "GET READY".to_string(),
            (state, false) => format!("{} (paused)", state.label().to_uppercase()),
            (state, true) => state.label().to_uppercase(),
        };

        // Phase and countdown
        let clock = Paragraph::new(vec![
            Line::from(phase).style(Style::default().fg(phase_color).bold()),
            Line::from(""),
            Line::from(format_clock(snapshot.time_remaining)).style(Style::default().bold()),
        ])
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::ALL));
        frame.render_widget(clock, rows[0]);

        let gauge = Gauge::default()
            .block(Block::default().borders(Borders::ALL))
            .gauge_style(Style::default().fg(phase_color))
            .ratio(snapshot.progress.clamp(0.0, 1.0));
        frame.render_widget(gauge, rows[1]);

        let lines: Vec<Line> = session_lines(snapshot).into_iter().map(Line::from).collect();
        let details = Paragraph::new(lines)
            .style(Style::default().fg(self.theme.text))
            .block(Block::default().borders(Borders::ALL).title("Session"));
        frame.render_widget(details, rows[2]);
    }

    fn handle_events(&mut self, snapshot: &TimerSnapshot) -> Result<()> {
        if event::poll(std::time::Duration::from_millis(100))?
            && let Event::Key(key) = event::read()?
            && key.kind == KeyEventKind::Press
        {
            match self.screen {
                Screen::Plans => self.handle_plans_key(key.code)?,
                Screen::Workout => self.handle_workout_key(key.code, snapshot)?,
            }
        }
        Ok(())
    }

    fn handle_plans_key(&mut self, code: KeyCode) -> Result<()> {
        match code {
            KeyCode::Char('q') => self.should_quit = true,
            KeyCode::Char('r') => self.refresh()?,
            KeyCode::Down | KeyCode::Char('j') if !self.plans.is_empty() => {
                let next = self.table_state.selected().map_or(0, |i| (i + 1) % self.plans.len());
                self.table_state.select(Some(next));
            }
            KeyCode::Up | KeyCode::Char('k') if !self.plans.is_empty() => {
                let len = self.plans.len();
                let prev = self.table_state.selected().map_or(0, |i| (i + len - 1) % len);
                self.table_state.select(Some(prev));
            }
            KeyCode::Enter => {
                if let Some(plan) = self.table_state.selected().and_then(|i| self.plans.get(i)) {
                    let id = plan.id.clone();
                    self.start_workout(&id)?;
                }
            }
            KeyCode::Char('t') => match self.today_plan_id.clone() {
                Some(id) => self.start_workout(&id)?,
                None => self.status = Some("Nothing scheduled today".to_string()),
            },
            _ => {}
        }
        Ok(())
    }

    fn handle_workout_key(&mut self, code: KeyCode, snapshot: &TimerSnapshot) -> Result<()> {
        match code {
            KeyCode::Char('q') => self.should_quit = true,
            KeyCode::Char(' ') | KeyCode::Char('p') => {
                self.session.send(SessionCommand::TogglePause);
            }
            KeyCode::Char('s') => {
                self.session.send(SessionCommand::Skip);
            }
            KeyCode::Char('r') => {
                self.session.send(SessionCommand::Reset);
            }
            KeyCode::Esc | KeyCode::Backspace => {
                if snapshot.state != TimerState::Completed {
                    self.session.send(SessionCommand::Reset);
                }
                self.screen = Screen::Plans;
                self.refresh()?;
            }
            _ => {}
        }
        Ok(())
    }
}

/// Text of the workout detail panel
fn session_lines(snapshot: &TimerSnapshot) -> Vec<String> {
    let active = format!("Active time: {}", format_duration(snapshot.total_workout_time));
    match (&snapshot.exercise_name, snapshot.state) {
        (_, TimerState::Completed) => vec![
            active,
            "Workout finished. Press esc to see your history.".to_string(),
        ],
        (Some(name), _) => {
            let mut lines = vec![
                format!(
                    "Exercise {}/{}: {}",
                    snapshot.exercise_index + 1,
                    snapshot.exercise_count,
                    name
                ),
                format!("Set {}/{}", snapshot.set_index + 1, snapshot.total_sets),
            ];
            if let Some(next) = &snapshot.next_exercise_name {
                lines.push(format!("Next: {}", next));
            }
            lines.push(active);
            lines
        }
        (None, _) => vec!["No workout loaded".to_string()],
    }
}

fn init_terminal() -> Result<Tui> {
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let terminal = Terminal::new(CrosstermBackend::new(stdout()))?;
    Ok(terminal)
}

fn restore_terminal() -> Result<()> {
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_completed_panel_does_not_claim_saved_record() {
        let snapshot = TimerSnapshot {
            state: TimerState::Completed,
            total_workout_time: 120,
            ..Default::default()
        };
        let lines = session_lines(&snapshot);
        assert_eq!(lines[0], "Active time: 2m 0s");
        assert!(lines.iter().all(|l| !l.to_lowercase().contains("saved")));
    }

    #[test]
    fn test_running_panel_shows_counters() {
        let snapshot = TimerSnapshot {
            state: TimerState::Rest,
            running: true,
            exercise_name: Some("squats".to_string()),
            next_exercise_name: Some("lunges".to_string()),
            exercise_index: 0,
            exercise_count: 2,
            set_index: 1,
            total_sets: 3,
            ..Default::default()
        };
        let lines = session_lines(&snapshot);
        assert_eq!(lines[0], "Exercise 1/2: squats");
        assert_eq!(lines[1], "Set 2/3");
        assert_eq!(lines[2], "Next: lunges");
    }

    #[test]
    fn test_theme_follows_settings() {
        let mut settings = Settings::default();
        let light = Theme::from(&settings);
        assert_eq!(light.accent, Color::Rgb(0x19, 0x89, 0xfa));
        assert_eq!(light.background, Color::Reset);

        settings.is_dark_mode = true;
        settings.set_theme_color("#ff0000").unwrap();
        let dark = Theme::from(&settings);
        assert_eq!(dark.accent, Color::Rgb(0xff, 0, 0));
        assert_eq!(dark.background, Color::Black);
    }
}
