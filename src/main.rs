use std::{
    fs,
    io::{self, stdin},
    num::NonZeroUsize,
    path::PathBuf,
    time::{Duration, Instant},
};

use anyhow::{Context, Result};
use clap::{error::ErrorKind, CommandFactory, Parser};
use crossterm::{
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    tty::IsTty,
};
use flashread::{
    app::App,
    app_dirs::AppDirs,
    config::{Config, ConfigStore, FileConfigStore, Preset, MAX_GROUP_SIZE},
    document::Document,
    logging,
    runtime::{CrosstermEventSource, FixedTicker, Runner},
    session::Source,
};
use include_dir::{include_dir, Dir};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    Terminal,
};
use tracing::{error, info};

const TICK_RATE_MS: u64 = 100;

static PAGES: Dir = include_dir!("$CARGO_MANIFEST_DIR/pages");

/// paced word-group highlighting for faster reading in the terminal
#[derive(Parser, Debug, Clone)]
#[clap(
    version,
    about,
    long_about = "Highlights a page a few words at a time at a steady pace. Read an HTML page in place, or paste your own text into a dedicated reader."
)]
pub struct Cli {
    /// html page to read (defaults to a bundled welcome page)
    page: Option<PathBuf>,

    /// text to read in the reader, started with `p`
    #[clap(short = 't', long, conflicts_with = "text_file")]
    text: Option<String>,

    /// file whose contents are read in the reader
    #[clap(short = 'f', long)]
    text_file: Option<PathBuf>,

    /// reading speed in words per minute
    #[clap(short = 'w', long, value_parser = clap::value_parser!(u32).range(50..=1000))]
    wpm: Option<u32>,

    /// number of words highlighted at once
    #[clap(short = 'g', long)]
    group_size: Option<NonZeroUsize>,

    /// highlight color, e.g. "#add8e6" or "yellow"
    #[clap(short = 'c', long)]
    color: Option<String>,

    /// start from a pacing preset; --wpm and --group-size override it
    #[clap(short = 'p', long, value_enum)]
    preset: Option<Preset>,
}

impl Cli {
    /// Layer the flags over the stored settings for this run.
    fn apply_to(&self, config: &mut Config) {
        if let Some(preset) = self.preset {
            config.apply_preset(preset);
        }
        if let Some(wpm) = self.wpm {
            config.wpm = wpm;
            config.active_preset = None;
        }
        if let Some(size) = self.group_size {
            config.group_size = size.get().min(MAX_GROUP_SIZE);
            config.active_preset = None;
        }
        if let Some(color) = &self.color {
            config.highlight_color = color.trim().to_string();
        }
        if self.text.is_some() || self.text_file.is_some() {
            config.active_mode = Source::Pasted;
        }
    }

    fn pasted_text(&self) -> Result<Option<String>> {
        if let Some(path) = &self.text_file {
            let text = fs::read_to_string(path)
                .with_context(|| format!("reading text file {}", path.display()))?;
            return Ok(Some(text));
        }
        Ok(self.text.clone())
    }

    fn page(&self) -> Result<Document> {
        match &self.page {
            Some(path) => {
                let html = fs::read_to_string(path)
                    .with_context(|| format!("reading page {}", path.display()))?;
                Ok(Document::parse_html(&html))
            }
            None => welcome_page(),
        }
    }
}

fn welcome_page() -> Result<Document> {
    let html = PAGES
        .get_file("welcome.html")
        .and_then(|file| file.contents_utf8())
        .context("bundled welcome page is missing")?;
    Ok(Document::parse_html(html))
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if !stdin().is_tty() {
        let mut cmd = Cli::command();
        cmd.error(ErrorKind::Io, "stdin must be a tty").exit();
    }

    if let Some(path) = AppDirs::log_path() {
        if let Err(err) = logging::init_tracing(&path) {
            eprintln!("flashread: logging disabled: {err:#}");
        }
    }

    let store = FileConfigStore::new();
    let mut config = store.load();
    cli.apply_to(&mut config);
    let page = cli.page()?;
    let text = cli.pasted_text()?;
    info!(page = ?cli.page, wpm = config.wpm, group_size = config.group_size, "starting");

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = start_tui(&mut terminal, store, config, page, text);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(err) = &result {
        error!("{err:?}");
    }
    result
}

fn start_tui<B: Backend>(
    terminal: &mut Terminal<B>,
    store: FileConfigStore,
    config: Config,
    page: Document,
    text: Option<String>,
) -> Result<()> {
    let runner = Runner::new(
        CrosstermEventSource::new(),
        FixedTicker::new(Duration::from_millis(TICK_RATE_MS)),
    );
    let mut app = App::new(store, config, page, runner.sender());
    if let Some(text) = text {
        app.controller.set_pasted_text(text);
    }
    let size = terminal.size()?;
    app.resize(size.width, size.height);

    loop {
        terminal.draw(|f| f.render_widget(&app, f.area()))?;
        let event = runner.step(app.time_until_tick(Instant::now()));
        app.handle_event(event, Instant::now());
        if app.should_quit() {
            break;
        }
    }
    info!("quitting");
    Ok(())
}
