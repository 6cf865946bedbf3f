//! craft CLI: host for the element combination engine.

use std::io::BufRead;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result};

use craft_engine::autosave::spawn_autosave;
use craft_engine::config::CraftConfig;
use craft_engine::engine::{CraftEngine, LoadOrigin};
use craft_engine::event::{EventSink, JsonSink, TracingSink};
use craft_engine::paths::CraftPaths;

#[derive(Parser)]
#[command(name = "craft", version, about = "Element combination crafting engine")]
struct Cli {
    /// Data directory for persistent storage.
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Config file (defaults to the XDG config location).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Never call the external generator; use fallback rules only.
    #[arg(long, global = true)]
    no_llm: bool,

    /// Print engine events as JSON lines on stdout.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Combine two elements.
    Combine {
        first: String,
        second: String,
    },

    /// Interactive session: one `A + B` pair per line, autosaving.
    Play,

    /// List discovered elements.
    List {
        /// List the whole catalog instead of discoveries only.
        #[arg(long)]
        all: bool,
    },

    /// Show engine info and statistics.
    Info,

    /// Export the game state as JSON.
    Export {
        /// Output file (stdout if omitted).
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Replace the game state with an exported JSON file.
    Import {
        file: PathBuf,
    },

    /// Reset to the starting elements and seed recipes.
    Reset {
        /// Confirm the reset.
        #[arg(long)]
        yes: bool,
    },

    /// Restore the snapshot replaced by the last save.
    RestoreBackup,

    /// List archived corrupt snapshots.
    Archives,
}

fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(3)
                .build(),
        )
    }))
    .ok(); // Ignore error if hook already set (e.g., in tests)

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let paths = CraftPaths::resolve()?;
    let config_path = cli.config.clone().unwrap_or_else(|| paths.config_file());
    let file_config = CraftConfig::load_or_default(&config_path)?;

    let mut config = file_config.to_engine_config(Some(paths.data_dir.clone()));
    if let Some(dir) = cli.data_dir.clone() {
        config.data_dir = Some(dir);
    }
    if cli.no_llm {
        config.generator = None;
    }
    // Only generation-bound commands need the generator availability check.
    if !matches!(cli.command, Commands::Combine { .. } | Commands::Play) {
        config.generator = None;
    }

    let sink: Arc<dyn EventSink> = if cli.json {
        Arc::new(JsonSink)
    } else {
        Arc::new(TracingSink)
    };
    let engine = CraftEngine::new(config, sink)?;

    match engine.origin() {
        LoadOrigin::Recovered { archive_key } => {
            eprintln!("Saved state was unreadable; archived it as {archive_key}.");
        }
        LoadOrigin::Migrated { from } => {
            eprintln!("Migrated saved state from version {from}.");
        }
        LoadOrigin::Fresh | LoadOrigin::Restored => {}
    }

    match cli.command {
        Commands::Combine { first, second } => {
            let combo = engine.combine(&first, &second)?;
            if !cli.json {
                let marker = if combo.is_new { " (new!)" } else { "" };
                println!(
                    "{first} + {second} = {} {}{marker}",
                    combo.glyph, combo.result
                );
            }
        }

        Commands::Play => {
            let engine = Arc::new(engine);
            let autosave = (file_config.autosave_secs > 0).then(|| {
                spawn_autosave(&engine, Duration::from_secs(file_config.autosave_secs))
            });

            println!("{}", engine.info());
            println!("Enter pairs as `A + B`, blank line to quit.");
            for line in std::io::stdin().lock().lines() {
                let line = line.into_diagnostic()?;
                let line = line.trim();
                if line.is_empty() {
                    break;
                }
                let Some((first, second)) = line.split_once('+') else {
                    eprintln!("expected `A + B`");
                    continue;
                };
                match engine.combine(first, second) {
                    Ok(combo) => {
                        let marker = if combo.is_new { " (new!)" } else { "" };
                        println!(
                            "{} + {} = {} {}{marker}",
                            first.trim(),
                            second.trim(),
                            combo.glyph,
                            combo.result
                        );
                    }
                    Err(e) => eprintln!("{e}"),
                }
            }

            if let Some(handle) = autosave {
                handle.stop();
            }
            engine.save()?;
        }

        Commands::List { all } => {
            let elements = if all {
                engine.elements()
            } else {
                engine.discovered_elements()
            };
            println!("Elements ({}):", elements.len());
            for element in &elements {
                println!("  {element}");
            }
        }

        Commands::Info => {
            println!("{}", engine.info());
        }

        Commands::Export { out } => {
            let json = engine.export_json()?;
            match out {
                Some(path) => {
                    std::fs::write(&path, json).into_diagnostic()?;
                    println!("Exported to {}", path.display());
                }
                None => println!("{json}"),
            }
        }

        Commands::Import { file } => {
            let text = std::fs::read_to_string(&file).into_diagnostic()?;
            let report = engine.import_json(&text)?;
            println!(
                "Imported version {} save: {} elements, {} recipes, {} discovered",
                report.version, report.elements, report.recipes, report.discovered
            );
            if report.repaired > 0 {
                println!("  ({} discovered elements were missing from the catalog)", report.repaired);
            }
        }

        Commands::Reset { yes } => {
            if !yes {
                miette::bail!("reset discards all discoveries; pass --yes to confirm");
            }
            engine.reset_to_default()?;
            println!("Reset to default. The previous state is kept as the backup.");
        }

        Commands::RestoreBackup => {
            let taken_at = engine.restore_backup()?;
            println!("Restored backup taken at {taken_at}.");
        }

        Commands::Archives => {
            let archives = engine.corruption_archives()?;
            if archives.is_empty() {
                println!("No archived snapshots.");
            } else {
                println!("Archived snapshots ({}):", archives.len());
                for key in &archives {
                    println!("  {key}");
                }
            }
        }
    }

    Ok(())
}
