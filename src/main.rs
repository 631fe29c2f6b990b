use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use anyhow::Context;
use crossterm::terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use beatbox::audio::{CpalBackend, CpalInput};
use beatbox::loader::{index_wav_in_dir, AssetStore, DirAssetStore};
use beatbox::pipeline::persistence::ProjectDir;
use beatbox::pipeline::store::PatternStore;
use beatbox::pipeline::transport::MonotonicClock;
use beatbox::shared::InputEvent;
use beatbox::{tui, Session, Settings};

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    let project_dir: PathBuf = match std::env::args().nth(1) {
        Some(dir) => PathBuf::from(dir),
        None => std::env::current_dir().context("no current directory")?,
    };
    let project = ProjectDir::new(&project_dir);
    init_logging(&project)?; // stderr belongs to the tui, so logs go to a file

    let settings = Settings::load(&project.config_file());
    let samples_root = settings.samples_root(&project_dir);
    let assets: Arc<dyn AssetStore> = Arc::new(DirAssetStore::new(&samples_root));

    // a saved project that doesn't hold together is ignored, not fatal
    let saved = project.load_project().filter(|snap| match PatternStore::from_snapshot(snap) {
        Ok(_) => true,
        Err(e) => {
            warn!(error = %e, "saved project rejected, starting fresh");
            false
        }
    });
    let backend = Box::new(CpalBackend);
    let clock = Box::new(MonotonicClock::new());
    let mut session = match &saved {
        Some(snap) => Session::from_snapshot(&settings, snap, backend, assets, clock)?,
        None => Session::new(&settings, backend, assets, clock)?,
    }
    .with_pattern_sink(Box::new(project.clone()))
    .with_beat_store(Box::new(project.clone()))
    .with_mic_input(Box::new(CpalInput));

    let wav_paths = index_wav_in_dir(&samples_root).unwrap_or_else(|e| {
        warn!(error = %e, "could not scan samples dir");
        Vec::new()
    });
    session.add_samples(&samples_root, &wav_paths);
    info!(
        project = %project_dir.display(),
        samples = wav_paths.len(),
        restored = saved.is_some(),
        "session ready"
    );

    terminal::enable_raw_mode()?;
    // Enable keyboard enhancement for real press/release detection.
    // Falls back gracefully if the terminal doesn't support it.
    let _ = crossterm::execute!(
        std::io::stdout(),
        crossterm::event::PushKeyboardEnhancementFlags(
            crossterm::event::KeyboardEnhancementFlags::REPORT_EVENT_TYPES
        )
    );
    let _guard = RawModeGuard; // auto drops when out of scope

    let backend = CrosstermBackend::new(std::io::stdout());
    let mut term = Terminal::new(backend)?;
    term.clear()?;

    let frame_interval = Duration::from_millis(settings.frame_interval_ms.max(1));
    let blink_start = Instant::now();
    let mut tui_state = tui::mode::TuiState::default();

    loop {
        session.tick();

        let blink_on = (blink_start.elapsed().as_millis() / 250) % 2 == 0;
        let ds = session.display_state();
        tui_state.sync(&ds);

        term.draw(|frame| {
            tui::view::render(frame, frame.area(), &ds, &tui_state, blink_on);
        })?;

        // wake up for the next step even if it lands mid-frame
        let timeout = session
            .until_next_step()
            .map_or(frame_interval, |d| d.min(frame_interval));
        let events = tui::input::poll_input(timeout, &mut tui_state)?;
        for event in events {
            if event == InputEvent::Quit {
                if session.is_recording() {
                    session.handle_input(InputEvent::ToggleRecord); // keep the take
                }
                if session.is_mic_recording() {
                    session.handle_input(InputEvent::ToggleMicRecord);
                }
                // save before quitting
                if let Err(e) = project.save_project(&session.snapshot()) {
                    error!(error = %format!("{e:#}"), "autosave failed");
                }
                drop(term);
                return Ok(());
            }
            session.handle_input(event);
        }
    }
}

fn init_logging(project: &ProjectDir) -> anyhow::Result<()> {
    std::fs::create_dir_all(project.state_dir())
        .with_context(|| format!("creating {}", project.state_dir().display()))?;
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(project.log_file())
        .context("opening log file")?;
    let filter = EnvFilter::try_from_env("BEATBOX_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}

struct RawModeGuard;
impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = crossterm::execute!(
            std::io::stdout(),
            crossterm::event::PopKeyboardEnhancementFlags
        );
        let _ = terminal::disable_raw_mode();
    }
}
