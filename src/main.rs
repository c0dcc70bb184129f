use std::io;
use std::path::PathBuf;

use clap::Parser;
use crossterm::{
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use log::info;
use ratatui::{backend::CrosstermBackend, Terminal};

use todo_list::app::App;
use todo_list::config::load_config;
use todo_list::logging::init_logging;
use todo_list::storage::FileStore;
use todo_list::store::TaskStore;
use todo_list::ui::run_app;
use todo_list::view::Filter;

#[derive(Parser)]
#[command(name = "todo", about = "A small to-do list for the terminal", version)]
struct Cli {
    /// Config file (default: $XDG_CONFIG_HOME/todo-list/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory holding tasks.json
    #[arg(short = 'd', long = "data-dir")]
    data_dir: Option<PathBuf>,

    /// Filter selected at startup
    #[arg(short, long, value_enum)]
    filter: Option<Filter>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,

    /// Directory for log files; logging is off without one
    #[arg(long)]
    log_dir: Option<PathBuf>,
}

fn main() {
    if let Err(e) = run(Cli::parse()) {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = load_config(cli.config.as_deref())?;
    if let Some(dir) = cli.data_dir {
        config.storage.dir = dir;
    }
    if let Some(filter) = cli.filter {
        config.ui.default_filter = filter;
    }
    if let Some(level) = cli.log_level {
        config.log.level = level;
    }
    if let Some(dir) = cli.log_dir {
        config.log.dir = Some(dir);
    }

    let _logger = match &config.log.dir {
        Some(dir) => Some(init_logging(&config.log.level, dir)?),
        None => None,
    };

    let store = TaskStore::load(FileStore::new(&config.storage.dir))?;
    info!(
        "event=session_start module=main data_dir={} filter={}",
        config.storage.dir.display(),
        config.ui.default_filter
    );
    let mut app = App::new(store, config.ui.default_filter);

    // Terminal setup
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Restore the terminal on panic
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
        original_hook(panic_info);
    }));

    let result = run_app(&mut terminal, &mut app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    info!("event=session_end module=main tasks={}", app.store.len());
    if let Some(notice) = &app.notice {
        eprintln!("warning: {}: {}", notice.title, notice.message);
    }
    result?;
    Ok(())
}
