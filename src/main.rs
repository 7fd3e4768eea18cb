use std::io::{self, stdout, Stdout};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use clap::{Parser, Subcommand};
use crossbeam_channel::{Receiver, Sender, TryRecvError};
use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind, MouseButton,
    MouseEventKind,
};
use crossterm::execute;
use crossterm::terminal::{
    self as term, disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::layout::Rect;
use ratatui::{backend::CrosstermBackend, Terminal};

use handler_demo::app::{Demo, UiEvent};
use handler_demo::config::{Config, SubmitMode};
use handler_demo::render::{RenderState, StatePublisher, FRAME_DURATION};
use handler_demo::surface::Direction;
use handler_demo::{hlog, ui, Error, Result};

const INPUT_POLL: Duration = Duration::from_millis(50);

/// Handler demo - background workers posting UI updates to a single owner thread
#[derive(Parser, Debug)]
#[command(name = "handler-demo")]
#[command(version, about, long_about = None)]
#[command(
    after_help = "ENVIRONMENT:\n    HANDLER_DEMO_DEBUG=1        Enable debug logging (alternative to --debug)\n    HANDLER_DEMO_LOG=<level>    error|warn|info|debug|trace"
)]
pub struct Cli {
    /// Enable debug logging (writes to ~/.handler-demo/handler-demo.log)
    #[arg(short = 'd', long, global = true)]
    pub debug: bool,

    /// Config file (default: ~/.handler-demo/config.toml)
    #[arg(short = 'c', long, global = true)]
    pub config: Option<PathBuf>,

    /// Insert letters from the worker thread instead of the owner (racy)
    #[arg(long, global = true)]
    pub direct_insertion: bool,

    /// Recolour buttons from the worker thread instead of the owner (racy)
    #[arg(long, global = true)]
    pub direct_coloring: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Run the workers without a terminal UI and print a JSON report
    Headless {
        /// How long to run before shutting down
        #[arg(long, short = 's', default_value_t = 5)]
        seconds: u64,
    },

    /// Print the effective configuration as TOML
    Config,
}

/// What a terminal event means to the demo.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Input {
    Ui(UiEvent),
    Quit,
    Ignore,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    handler_demo::log::init(cli.debug);
    handler_demo::log::install_panic_hook();

    let config = effective_config(&cli)?;

    match cli.command {
        Some(Command::Config) => {
            print!("{}", config.to_toml()?);
            Ok(())
        }
        Some(Command::Headless { seconds }) => run_headless(&config, seconds),
        None => run_tui(&config),
    }
}

/// File config (or defaults) with CLI overrides applied.
fn effective_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(path) => {
            if !path.exists() {
                return Err(Error::Validation(format!(
                    "config file not found: {}",
                    path.display()
                )));
            }
            Config::load_from(path)?
        }
        None => Config::load()?,
    };
    if cli.direct_insertion {
        config.inserter.mode = SubmitMode::Direct;
    }
    if cli.direct_coloring {
        config.colorer.mode = SubmitMode::Direct;
    }
    Ok(config)
}

fn run_headless(config: &Config, seconds: u64) -> Result<()> {
    hlog!(
        "Headless run: {}s inserter={} colorer={}",
        seconds,
        config.inserter.mode.label(),
        config.colorer.mode.label()
    );

    let demo = Demo::start(config, crossbeam_channel::never(), None)?;
    thread::sleep(Duration::from_secs(seconds));
    let report = demo.shutdown()?;

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn run_tui(config: &Config) -> Result<()> {
    hlog!("handler-demo starting");

    let shutdown = Arc::new(AtomicBool::new(false));
    let (event_tx, event_rx) = crossbeam_channel::unbounded::<UiEvent>();
    let (publisher, state_rx) = StatePublisher::channel();

    let demo = Demo::start(config, event_rx, Some(publisher))?;

    let mut terminal = setup_terminal()?;
    let input = spawn_input_pump(event_tx, shutdown.clone())?;
    let result = render_loop(&mut terminal, state_rx, &shutdown);

    shutdown.store(true, Ordering::SeqCst);
    let input_result = input
        .join()
        .map_err(|_| Error::ThreadJoin("input pump panicked".to_string()));
    restore_terminal(&mut terminal)?;

    let report = demo.shutdown()?;
    hlog!(
        "handler-demo exiting: executed={} off_thread_writes={}",
        report.queue.executed,
        report.off_thread_writes
    );
    result?;
    input_result?
}

/// Translate terminal input into UI events on a dedicated thread.
///
/// Mouse clicks are hit-tested against the current terminal size with the
/// same layout the renderer uses.
fn spawn_input_pump(
    events: Sender<UiEvent>,
    shutdown: Arc<AtomicBool>,
) -> Result<JoinHandle<Result<()>>> {
    let handle = thread::Builder::new()
        .name("input-pump".to_string())
        .spawn(move || -> Result<()> {
            while !shutdown.load(Ordering::Relaxed) {
                if !event::poll(INPUT_POLL)? {
                    continue;
                }
                let (width, height) = term::size()?;
                let area = Rect::new(0, 0, width, height);
                match map_event(event::read()?, area) {
                    Input::Ui(ui_event) => {
                        if events.send(ui_event).is_err() {
                            break;
                        }
                    }
                    Input::Quit => {
                        hlog!("Quit requested");
                        shutdown.store(true, Ordering::SeqCst);
                    }
                    Input::Ignore => {}
                }
            }
            Ok(())
        })?;
    Ok(handle)
}

fn map_event(event: Event, area: Rect) -> Input {
    match event {
        Event::Key(key) if key.kind == KeyEventKind::Press => match key.code {
            KeyCode::Char('q') | KeyCode::Esc => Input::Quit,
            KeyCode::Up => Input::Ui(UiEvent::MoveFocus(Direction::Up)),
            KeyCode::Down => Input::Ui(UiEvent::MoveFocus(Direction::Down)),
            KeyCode::Left => Input::Ui(UiEvent::MoveFocus(Direction::Left)),
            KeyCode::Right => Input::Ui(UiEvent::MoveFocus(Direction::Right)),
            KeyCode::Enter | KeyCode::Char(' ') => Input::Ui(UiEvent::ActivateFocused),
            _ => Input::Ignore,
        },
        Event::Mouse(mouse) if mouse.kind == MouseEventKind::Down(MouseButton::Left) => {
            ui::hit_test(area, mouse.column, mouse.row)
                .map(|widget| Input::Ui(UiEvent::Click(widget)))
                .unwrap_or(Input::Ignore)
        }
        _ => Input::Ignore,
    }
}

fn render_loop(
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    state_rx: Receiver<RenderState>,
    shutdown: &AtomicBool,
) -> Result<()> {
    let mut state = RenderState::default();
    let mut last_version: u64 = 0;
    let mut last_frame = Instant::now();
    let mut dirty = true;

    loop {
        if shutdown.load(Ordering::Relaxed) {
            break;
        }

        match state_rx.try_recv() {
            Ok(s) => {
                dirty = dirty || s.version != last_version;
                state = s;
            }
            Err(TryRecvError::Empty) => {}
            Err(TryRecvError::Disconnected) => break,
        }

        if last_frame.elapsed() < FRAME_DURATION {
            thread::sleep(Duration::from_micros(500));
            continue;
        }
        last_frame = Instant::now();

        if dirty {
            terminal.draw(|f| ui::draw(f, &state))?;
            last_version = state.version;
            dirty = false;
        }
    }
    Ok(())
}

fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
    enable_raw_mode()?;
    execute!(io::stdout(), EnterAlternateScreen, EnableMouseCapture)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;
    terminal.hide_cursor()?;
    terminal.clear()?;
    Ok(terminal)
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
    terminal.show_cursor()?;
    execute!(io::stdout(), DisableMouseCapture, LeaveAlternateScreen)?;
    Ok(disable_raw_mode()?)
}
