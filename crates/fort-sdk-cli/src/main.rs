use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "fortsdk")]
#[command(about = "Inspect mirrored layouts and property catalogs")]
#[command(version)]
struct Cli {
    /// Log at debug level (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the descriptor of one property
    Lookup {
        /// Property catalog (JSON)
        #[arg(short, long, env = "FORTSDK_CATALOG")]
        catalog: PathBuf,

        /// Owning class name
        class: String,

        /// Property name
        property: String,
    },
    /// List catalog classes, or the properties of one class
    Classes {
        /// Property catalog (JSON)
        #[arg(short, long, env = "FORTSDK_CATALOG")]
        catalog: PathBuf,

        /// Only list the properties of this class
        #[arg(long)]
        class: Option<String>,
    },
    /// Replay appends to an empty array and print each reallocation
    Growth {
        /// Element size in bytes
        #[arg(short, long)]
        element_size: usize,

        /// Number of elements to append
        #[arg(short = 'n', long)]
        count: i32,

        /// Allocation alignment in bytes, natural alignment of the element size by default
        #[arg(short, long)]
        alignment: Option<u32>,
    },
    /// Print offsets and sizes of the mirrored structures
    Layout,
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // The binary logs as `fortsdk`, the library as `fort_sdk`
    let level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive(format!("fortsdk={level}").parse()?)
                .add_directive(format!("fort_sdk={level}").parse()?),
        )
        .with_target(false)
        .init();

    let found = match cli.command {
        Command::Lookup {
            catalog,
            class,
            property,
        } => commands::lookup::run(&catalog, &class, &property)?,
        Command::Classes { catalog, class } => {
            commands::classes::run(&catalog, class.as_deref())?
        }
        Command::Growth {
            element_size,
            count,
            alignment,
        } => commands::growth::run(element_size, count, alignment)?,
        Command::Layout => commands::layout::run()?,
    };

    Ok(if found {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
