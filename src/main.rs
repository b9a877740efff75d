//! Craftsim - Entry Point
//!
//! Loads configuration and catalog data, then runs the command shell over
//! stdin until `quit` or end of input.

use std::fs::OpenOptions;
use std::io::{self, BufRead, Write};
use std::path::Path;

use anyhow::Result;

use craftsim::config::{Config, CONFIG_FILE};
use craftsim::shell::{Outcome, Shell};
use craftsim::{DataManager, OfflineService};

fn main() -> Result<()> {
    init_logging();
    log::info!("Starting Craftsim v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::load_or_default(Path::new(CONFIG_FILE));
    let data = DataManager::load_from_dir(&config.data_dir);
    let service = OfflineService::new(&data, &config);
    let mut shell = Shell::new(service, data, config);

    let result = run(&mut shell);
    match &result {
        Ok(()) => log::info!("Craftsim shut down cleanly"),
        Err(e) => log::error!("Craftsim exited with error: {}", e),
    }
    result
}

/// Log to a file so output stays readable; fall back to stderr
fn init_logging() {
    let mut builder = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    match OpenOptions::new().create(true).write(true).truncate(true).open("craftsim.log") {
        Ok(file) => {
            builder.target(env_logger::Target::Pipe(Box::new(file)));
        }
        Err(e) => eprintln!("Warning: cannot open craftsim.log ({}), logging to stderr", e),
    }
    builder.init();
}

fn run<S>(shell: &mut Shell<S>) -> Result<()>
where
    S: craftsim::CraftingService + craftsim::crafting::CatalogService,
{
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    writeln!(stdout, "craftsim {} - type `help` for commands", env!("CARGO_PKG_VERSION"))?;

    loop {
        write!(stdout, "> ")?;
        stdout.flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        match shell.execute(&line) {
            Ok(Outcome::Quit) => break,
            Ok(Outcome::Continue(text)) if text.is_empty() => {}
            Ok(Outcome::Continue(text)) => writeln!(stdout, "{}", text)?,
            Err(e) => {
                log::warn!("{}: {}", line.trim(), e);
                writeln!(stdout, "error: {}", e)?;
            }
        }
    }
    Ok(())
}
