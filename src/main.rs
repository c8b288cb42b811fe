mod app;
mod cli;
mod logging;
mod mode;
mod msg;

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use crossterm::event::{self, Event};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;

use wdt::elevation::{Startup, SystemPrivileges, check_elevation, relaunch_args};
use wdt::extract::PlanExtractor;
use wdt::model::config::{AppConfig, base_dir};
use wdt::{RunRequest, render_missing, render_plan, run_script};

use app::App;
use cli::{Cli, Command};
use msg::Msg;

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // Keep the guard alive so buffered log lines are flushed on exit.
    let _guard = match logging::init() {
        Ok(guard) => Some(guard),
        Err(err) => {
            eprintln!("wdt: logging disabled: {err:#}");
            None
        }
    };

    tracing::info!("wdt starting");

    let config = AppConfig::load(cli.config.as_deref())?;
    let extractor = config.extractor()?;
    let mut request = config.run_request(&base_dir());
    if let Some(script) = &cli.script {
        request.script = script.clone();
    }
    if let Some(log_file) = &cli.log_file {
        request.log_path = log_file.clone();
    }

    if cli.command == Some(Command::Plan) {
        return print_plan(&extractor, &request.script);
    }

    let args = relaunch_args(std::env::args_os());
    let require_admin = config.general.require_admin && !cli.no_elevate;
    if check_elevation(&SystemPrivileges, require_admin, &args) == Startup::Relaunched {
        return Ok(ExitCode::SUCCESS);
    }

    match cli.command {
        Some(Command::Run) => run_headless(&request),
        _ => run_interface(config, request, extractor),
    }
}

fn print_plan(extractor: &PlanExtractor, script: &Path) -> Result<ExitCode> {
    let plan = extractor.extract(script)?;
    if !plan.is_found() {
        eprintln!("{}", render_missing(script));
        return Ok(ExitCode::FAILURE);
    }

    print!("{}", render_plan(&plan));
    io::stdout().flush()?;
    Ok(ExitCode::SUCCESS)
}

fn run_headless(request: &RunRequest) -> Result<ExitCode> {
    let mut stdout = io::stdout().lock();
    let outcome = run_script(
        request,
        |line| {
            let _ = writeln!(stdout, "{line}");
        },
        |code| tracing::info!(code, "headless run finished"),
    );
    writeln!(stdout)?;
    writeln!(stdout, "{}", outcome.summary())?;
    stdout.flush()?;

    let code = outcome.exit_code();
    Ok(match u8::try_from(code) {
        Ok(code) => ExitCode::from(code),
        Err(_) => ExitCode::FAILURE,
    })
}

fn run_interface(
    config: AppConfig,
    request: RunRequest,
    extractor: PlanExtractor,
) -> Result<ExitCode> {
    // Terminal setup
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run(&mut terminal, config, request, extractor);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(e) = &result {
        tracing::error!("{e:#}");
        eprintln!("wdt error: {e:?}");
        return Ok(ExitCode::FAILURE);
    }

    Ok(ExitCode::SUCCESS)
}

fn run(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    config: AppConfig,
    request: RunRequest,
    extractor: PlanExtractor,
) -> Result<()> {
    let (tx, rx) = mpsc::channel::<Msg>();
    let tick = Duration::from_millis(config.ui.tick_ms);
    let watch_script = config.general.watch_script;
    let script = request.script.clone();
    let mut app = App::new(config, request, extractor, tx.clone());

    // Input thread: terminal events become messages.
    let tx_input = tx.clone();
    thread::spawn(move || {
        loop {
            if let Ok(event) = event::read() {
                let msg = match event {
                    Event::Key(k) => Msg::Key(k),
                    Event::Resize(w, h) => Msg::Resize(w, h),
                    _ => continue,
                };
                if tx_input.send(msg).is_err() {
                    break;
                }
            }
        }
    });

    // Tick thread drives run polling and confirm timeouts.
    let tx_tick = tx.clone();
    thread::spawn(move || {
        loop {
            thread::sleep(tick);
            if tx_tick.send(Msg::Tick).is_err() {
                break;
            }
        }
    });

    if watch_script {
        spawn_script_watcher(script, tx.clone());
    }

    terminal
        .draw(|f| app.view(f))
        .context("draw first frame")?;

    // ── Main event loop ──
    loop {
        // Batch-drain all pending messages
        let first = rx.recv()?;
        app.update(first)?;

        while let Ok(msg) = rx.try_recv() {
            app.update(msg)?;
        }

        if app.should_quit {
            tracing::info!("wdt exiting");
            break;
        }

        terminal.draw(|f| app.view(f))?;
    }

    Ok(())
}

/// Watch the directory holding the script: editors often replace the file
/// rather than write it in place, which a watch on the file itself would miss.
fn spawn_script_watcher(script: PathBuf, tx: mpsc::Sender<Msg>) {
    let dir = match script.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let Some(file_name) = script.file_name().map(|n| n.to_os_string()) else {
        return;
    };

    thread::spawn(move || {
        let tx_watch = tx.clone();
        let mut watcher: RecommendedWatcher =
            match notify::recommended_watcher(move |res: notify::Result<notify::Event>| match res {
                Ok(event) => {
                    if !matches!(
                        event.kind,
                        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
                    ) {
                        return;
                    }
                    for path in event.paths {
                        if path.file_name() != Some(file_name.as_os_str()) {
                            continue;
                        }
                        if tx_watch.send(Msg::ScriptChanged(path)).is_err() {
                            return;
                        }
                    }
                }
                Err(err) => {
                    tracing::warn!("script watcher error: {err}");
                }
            }) {
                Ok(w) => w,
                Err(err) => {
                    tracing::warn!("failed to initialize script watcher: {err}");
                    return;
                }
            };

        if let Err(err) = watcher.watch(&dir, RecursiveMode::NonRecursive) {
            tracing::warn!("failed to watch {}: {err}", dir.display());
            return;
        }

        loop {
            thread::park();
        }
    });
}
