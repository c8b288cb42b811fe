use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::time::{Duration, Instant};

use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::Frame;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Paragraph};

use wdt::extract::PlanExtractor;
use wdt::model::config::AppConfig;
use wdt::tone::LogTone;
use wdt::{
    InstallPlan, RunHandle, RunOutcome, RunRequest, RunState, render_missing, render_plan,
    spawn_run,
};

use crate::mode::Mode;
use crate::msg::Msg;

const TITLE: &str = "Windows Dev Tools Installer (WDT)";
const MAX_NOTIFICATIONS: usize = 8;

pub struct App {
    pub mode: Mode,
    pub config: AppConfig,
    request: RunRequest,
    extractor: PlanExtractor,
    plan: InstallPlan,
    plan_text: String,
    plan_scroll: u16,
    log: VecDeque<String>,
    /// Lines scrolled up from the tail; zero follows new output.
    log_scroll: usize,
    page_size: usize,
    run: Option<RunHandle>,
    pub run_state: RunState,
    plan_stale: bool,
    command_input: String,
    pub notifications: VecDeque<String>,
    pub should_quit: bool,
    pub event_tx: mpsc::Sender<Msg>,
    quit_confirm_armed: bool,
    quit_confirm_until: Option<Instant>,
}

impl App {
    pub fn new(
        config: AppConfig,
        request: RunRequest,
        extractor: PlanExtractor,
        event_tx: mpsc::Sender<Msg>,
    ) -> Self {
        let mut app = Self {
            mode: Mode::Normal,
            config,
            request,
            extractor,
            plan: InstallPlan::missing(),
            plan_text: String::new(),
            plan_scroll: 0,
            log: VecDeque::new(),
            log_scroll: 0,
            page_size: 10,
            run: None,
            run_state: RunState::NotStarted,
            plan_stale: false,
            command_input: String::new(),
            notifications: VecDeque::new(),
            should_quit: false,
            event_tx,
            quit_confirm_armed: false,
            quit_confirm_until: None,
        };
        app.load_plan();
        app
    }

    pub fn script_path(&self) -> &Path {
        &self.request.script
    }

    pub fn plan(&self) -> &InstallPlan {
        &self.plan
    }

    pub fn plan_text(&self) -> &str {
        &self.plan_text
    }

    pub fn log_lines(&self) -> impl Iterator<Item = &str> {
        self.log.iter().map(String::as_str)
    }

    // ── MVU: Update ──────────────────────────────────────────────

    pub fn update(&mut self, msg: Msg) -> Result<()> {
        match msg {
            Msg::Key(key) => self.handle_key(key),
            Msg::Resize(_w, h) => {
                self.page_size = (h / 2).max(1) as usize;
            }
            Msg::StartRun => self.start_run(),
            Msg::ReloadPlan => self.reload_plan(),
            Msg::ClearLog => self.clear_log(),
            Msg::Command(command) => self.handle_command(command),
            Msg::ScriptChanged(path) => self.handle_script_changed(path),
            Msg::Tick => self.handle_tick(),
            Msg::Quit => self.should_quit = true,
        }
        Ok(())
    }

    fn handle_key(&mut self, key: KeyEvent) {
        match self.mode {
            Mode::Normal => self.handle_key_normal(key),
            Mode::Command => self.handle_key_command(key),
            Mode::Help => self.mode = Mode::Normal,
        }
    }

    fn handle_key_normal(&mut self, key: KeyEvent) {
        if key.code != KeyCode::Char('q') {
            self.quit_confirm_armed = false;
            self.quit_confirm_until = None;
        }

        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            self.request_quit();
            return;
        }

        match key.code {
            KeyCode::Char('q') => self.request_quit(),
            KeyCode::Char('Q') => self.should_quit = true,
            KeyCode::Char('s') => self.start_run(),
            KeyCode::Char('r') => self.reload_plan(),
            KeyCode::Char('c') => self.clear_log(),
            KeyCode::Char(':') => {
                self.mode = Mode::Command;
                self.command_input.clear();
            }
            KeyCode::Char('?') => self.mode = Mode::Help,
            KeyCode::Char('k') | KeyCode::Up => self.scroll_log_up(1),
            KeyCode::Char('j') | KeyCode::Down => self.scroll_log_down(1),
            KeyCode::PageUp => self.scroll_log_up(self.page_size),
            KeyCode::PageDown => self.scroll_log_down(self.page_size),
            KeyCode::Char('g') | KeyCode::Home => self.log_scroll = self.log.len(),
            KeyCode::Char('G') | KeyCode::End => self.log_scroll = 0,
            KeyCode::Char('K') => self.plan_scroll = self.plan_scroll.saturating_sub(1),
            KeyCode::Char('J') => {
                let max = self.plan_text.lines().count().saturating_sub(1) as u16;
                self.plan_scroll = (self.plan_scroll + 1).min(max);
            }
            _ => {}
        }
    }

    fn handle_key_command(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Esc => {
                self.mode = Mode::Normal;
                self.command_input.clear();
            }
            KeyCode::Enter => {
                let command = self.command_input.trim().to_string();
                self.mode = Mode::Normal;
                self.command_input.clear();

                if !command.is_empty() {
                    let _ = self.event_tx.send(Msg::Command(command));
                }
            }
            KeyCode::Backspace => {
                self.command_input.pop();
            }
            KeyCode::Char(ch)
                if key.modifiers.is_empty() || key.modifiers == KeyModifiers::SHIFT =>
            {
                self.command_input.push(ch);
            }
            _ => {}
        }
    }

    fn handle_command(&mut self, command: String) {
        let msg = match command.trim() {
            "start" | "s" => Msg::StartRun,
            "reload" | "r" => Msg::ReloadPlan,
            "clear" | "c" => Msg::ClearLog,
            "quit!" | "q!" => Msg::Quit,
            "quit" | "q" => {
                self.request_quit();
                return;
            }
            "help" | "h" => {
                self.push_notification(
                    "commands: start (s), reload (r), clear (c), quit (q), quit! (q!)".to_string(),
                );
                return;
            }
            other => {
                self.push_notification(format!("unknown command: {other}"));
                return;
            }
        };
        let _ = self.update(msg);
    }

    fn request_quit(&mut self) {
        if !self.run_state.is_running() || self.quit_confirm_armed {
            self.should_quit = true;
            return;
        }

        self.quit_confirm_armed = true;
        self.quit_confirm_until = Some(Instant::now() + Duration::from_secs(2));
    }

    fn handle_tick(&mut self) {
        if self
            .quit_confirm_until
            .is_some_and(|until| Instant::now() >= until)
        {
            self.quit_confirm_armed = false;
            self.quit_confirm_until = None;
        }

        self.poll_run();
    }

    // ── Run lifecycle ────────────────────────────────────────────

    fn start_run(&mut self) {
        if self.run_state.is_running() {
            self.push_notification("an installation is already running".to_string());
            return;
        }

        if !self.request.script.is_file() {
            self.push_notification(format!(
                "script not found: {}",
                self.request.script.display()
            ));
            return;
        }

        self.log.clear();
        self.log_scroll = 0;
        self.push_log("Starting installation...".to_string());

        match spawn_run(self.request.clone()) {
            Ok(handle) => {
                tracing::info!(script = %self.request.script.display(), "installation started");
                self.run = Some(handle);
                self.run_state = RunState::Running;
            }
            Err(err) => {
                tracing::error!("{err}");
                self.push_log(format!("Failed to start installer: {err}"));
                self.finish_run(RunOutcome::StartFailed);
            }
        }
    }

    fn poll_run(&mut self) {
        let (lines, outcome) = match self.run.as_ref() {
            Some(handle) => handle.poll(),
            None => return,
        };

        for line in lines {
            self.push_log(line);
        }

        if let Some(outcome) = outcome {
            self.run = None;
            self.finish_run(outcome);
        }
    }

    fn finish_run(&mut self, outcome: RunOutcome) {
        self.run_state = RunState::Finished(outcome);
        self.quit_confirm_armed = false;
        self.quit_confirm_until = None;
        self.push_log(String::new());
        self.push_log(outcome.summary());
        tracing::info!(code = outcome.exit_code(), "installation finished");

        if self.plan_stale {
            self.plan_stale = false;
            self.load_plan();
        }
    }

    fn push_log(&mut self, line: String) {
        self.log.push_back(line);
        while self.log.len() > self.config.ui.max_log_lines.max(1) {
            self.log.pop_front();
        }
        if self.log_scroll > 0 {
            self.log_scroll = (self.log_scroll + 1).min(self.log.len());
        }
    }

    fn clear_log(&mut self) {
        self.log.clear();
        self.log_scroll = 0;
    }

    fn scroll_log_up(&mut self, by: usize) {
        self.log_scroll = (self.log_scroll + by).min(self.log.len());
    }

    fn scroll_log_down(&mut self, by: usize) {
        self.log_scroll = self.log_scroll.saturating_sub(by);
    }

    // ── Plan ─────────────────────────────────────────────────────

    fn reload_plan(&mut self) {
        if self.run_state.is_running() {
            self.push_notification("plan reload is disabled while installing".to_string());
            return;
        }
        self.load_plan();
        self.push_notification("plan reloaded".to_string());
    }

    fn load_plan(&mut self) {
        let script = self.request.script.clone();
        match self.extractor.extract(&script) {
            Ok(plan) => {
                self.plan_text = if plan.is_found() {
                    render_plan(&plan)
                } else {
                    render_missing(&script)
                };
                self.plan = plan;
            }
            Err(err) => {
                tracing::error!("{err}");
                self.plan = InstallPlan::missing();
                self.plan_text = format!("Could not read the script:\n{err}");
                self.push_notification(err.to_string());
            }
        }
        self.plan_scroll = 0;
    }

    fn handle_script_changed(&mut self, path: PathBuf) {
        if !same_script(&path, &self.request.script) {
            return;
        }

        if self.run_state.is_running() {
            self.plan_stale = true;
            return;
        }

        tracing::debug!(path = %path.display(), "script changed on disk");
        self.load_plan();
        self.push_notification("script changed, plan reloaded".to_string());
    }

    fn push_notification(&mut self, message: String) {
        self.notifications.push_back(message);
        while self.notifications.len() > MAX_NOTIFICATIONS {
            self.notifications.pop_front();
        }
    }

    // ── MVU: View ────────────────────────────────────────────────

    pub fn view(&self, frame: &mut Frame) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(2),  // header
                Constraint::Length(12), // plan
                Constraint::Min(3),     // log
                Constraint::Length(1),  // status bar
            ])
            .split(frame.area());

        self.render_header(frame, chunks[0]);
        self.render_plan(frame, chunks[1]);
        self.render_log(frame, chunks[2]);
        self.render_status_bar(frame, chunks[3]);

        match self.mode {
            Mode::Command => self.render_command_overlay(frame),
            Mode::Help => self.render_help_overlay(frame),
            Mode::Normal => {}
        }
    }

    fn render_header(&self, frame: &mut Frame, area: Rect) {
        let lines = vec![
            Line::from(Span::styled(
                TITLE,
                Style::default()
                    .fg(Color::Rgb(0, 170, 255))
                    .add_modifier(Modifier::BOLD),
            )),
            Line::from(Span::styled(
                format!("Script: {}", self.script_path().display()),
                Style::default().fg(Color::Gray),
            )),
        ];
        frame.render_widget(Paragraph::new(lines), area);
    }

    fn render_plan(&self, frame: &mut Frame, area: Rect) {
        let title = if self.plan.is_found() {
            format!(" Planned Installations ({}) ", self.plan.total())
        } else {
            " Planned Installations ".to_string()
        };

        let plan = Paragraph::new(self.plan_text.as_str())
            .scroll((self.plan_scroll, 0))
            .block(
                Block::default()
                    .title(title)
                    .borders(Borders::ALL)
                    .style(Style::default().bg(Color::Rgb(24, 24, 24))),
            );
        frame.render_widget(plan, area);
    }

    fn render_log(&self, frame: &mut Frame, area: Rect) {
        let height = area.height.saturating_sub(2) as usize;
        let end = self.log.len() - self.log_scroll.min(self.log.len());
        let start = end.saturating_sub(height);

        let lines: Vec<Line> = self
            .log
            .range(start..end)
            .map(|line| Line::from(Span::styled(line.clone(), tone_style(LogTone::of(line)))))
            .collect();

        let title = if self.log_scroll > 0 {
            format!(" Installation Log [+{} below, G to follow] ", self.log_scroll)
        } else {
            " Installation Log ".to_string()
        };

        let log = Paragraph::new(lines).block(
            Block::default()
                .title(title)
                .borders(Borders::ALL)
                .style(Style::default().bg(Color::Rgb(18, 18, 18))),
        );
        frame.render_widget(log, area);
    }

    fn render_status_bar(&self, frame: &mut Frame, area: Rect) {
        let mode_style = match self.mode {
            Mode::Normal => Style::default()
                .fg(Color::Black)
                .bg(Color::Magenta)
                .add_modifier(Modifier::BOLD),
            _ => Style::default()
                .fg(Color::Black)
                .bg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        };
        let mode_span = Span::styled(format!(" {} ", self.mode.label()), mode_style);

        let state_style = match self.run_state {
            RunState::Running => Style::default().fg(Color::Black).bg(Color::Cyan),
            RunState::Finished(outcome) if outcome.succeeded() => {
                Style::default().fg(Color::Black).bg(Color::Green)
            }
            RunState::Finished(_) => Style::default().fg(Color::Black).bg(Color::Red),
            RunState::NotStarted => Style::default().fg(Color::Gray).bg(Color::DarkGray),
        };
        let state_span = Span::styled(format!(" {} ", self.run_state.label()), state_style);

        let mut suffix = match self.mode {
            Mode::Command => format!(" | :{}", self.command_input),
            _ => String::new(),
        };

        if self.quit_confirm_armed {
            suffix.push_str(" | installation still running, press q again to quit");
        } else if let Some(note) = self.notifications.back() {
            suffix.push_str(&format!(" | {note}"));
        }

        let hints = if self.run_state.is_running() {
            "c: Clear  j/k: Scroll  ?: Help  q: Quit"
        } else {
            "s: Start  r: Reload Plan  c: Clear  :: Command  ?: Help  q: Quit"
        };

        let info = Span::styled(
            format!(" {hints}{suffix} "),
            Style::default().fg(Color::Gray).bg(Color::DarkGray),
        );

        let bar = Line::from(vec![mode_span, state_span, info]);
        let status = Paragraph::new(bar).style(Style::default().bg(Color::DarkGray));
        frame.render_widget(status, area);
    }

    fn render_command_overlay(&self, frame: &mut Frame) {
        let area = centered_rect(70, 20, frame.area());
        frame.render_widget(Clear, area);

        let prompt = Paragraph::new(format!(":{}", self.command_input)).block(
            Block::default()
                .title(" Command ")
                .borders(Borders::ALL)
                .style(Style::default().bg(Color::Rgb(15, 15, 24))),
        );
        frame.render_widget(prompt, area);

        let cursor_x = area.x + 2 + self.command_input.len() as u16;
        let cursor_y = area.y + 1;
        frame.set_cursor_position((cursor_x, cursor_y));
    }

    fn render_help_overlay(&self, frame: &mut Frame) {
        let area = centered_rect(60, 60, frame.area());
        frame.render_widget(Clear, area);

        let rows = [
            ("s", "start installation"),
            ("r", "reload plan from disk"),
            ("c", "clear log"),
            ("j / k, Up / Down", "scroll log"),
            ("PgUp / PgDn", "scroll log by page"),
            ("g / G", "log top / follow tail"),
            ("J / K", "scroll plan"),
            (":", "command palette (help for commands)"),
            ("q", "quit (twice while installing)"),
            ("Q", "quit immediately"),
        ];
        let lines: Vec<Line> = rows
            .iter()
            .map(|(keys, action)| {
                Line::from(vec![
                    Span::styled(
                        format!("{keys:>18}  "),
                        Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
                    ),
                    Span::raw(*action),
                ])
            })
            .collect();

        let help = Paragraph::new(lines).block(
            Block::default()
                .title(" Keys (any key to close) ")
                .borders(Borders::ALL)
                .style(Style::default().bg(Color::Rgb(15, 15, 24))),
        );
        frame.render_widget(help, area);
    }
}

fn tone_style(tone: LogTone) -> Style {
    match tone {
        LogTone::Error => Style::default().fg(Color::Rgb(255, 85, 85)),
        LogTone::Success => Style::default().fg(Color::Rgb(85, 255, 85)),
        LogTone::Warning => Style::default().fg(Color::Rgb(255, 170, 0)),
        LogTone::Normal => Style::default().fg(Color::Rgb(224, 224, 224)),
    }
}

fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

/// Watcher events may name a file that no longer exists, so fall back to
/// comparing file names when canonical paths are unavailable.
fn same_script(changed: &Path, script: &Path) -> bool {
    if changed == script {
        return true;
    }

    match (std::fs::canonicalize(changed), std::fs::canonicalize(script)) {
        (Ok(a), Ok(b)) => a == b,
        _ => changed.file_name().is_some() && changed.file_name() == script.file_name(),
    }
}
