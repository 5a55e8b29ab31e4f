use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[clap(author, version, about = "Multi-building project wizard")]
pub struct Cli {
    /// Path to the config file (defaults to $SAE_CONFIG or the platform config dir)
    #[clap(long, global = true)]
    pub config: Option<PathBuf>,

    /// Slot location: a directory, or a .db file for SQLite
    #[clap(long, global = true)]
    pub data: Option<PathBuf>,

    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Show the current project document
    Show {
        /// Print the raw document as JSON
        #[clap(long)]
        json: bool,
    },

    /// Show building totals
    Summary {
        /// Print a full Markdown report
        #[clap(long)]
        markdown: bool,
    },

    /// Set a field by dotted path (e.g. project.projectName, solution.integrations.cctv)
    Set {
        path: String,
        value: String,
    },

    /// Set the number of buildings (clamped to 1..=50)
    Buildings {
        #[clap(allow_hyphen_values = true)]
        count: String,
    },

    /// Edit one building's field (name, floors or approxDevices)
    Building {
        /// Building number, starting at 1
        index: usize,
        field: String,
        value: String,
    },

    /// Replace the current project with a JSON file
    Import {
        file: PathBuf,
    },

    /// Export the current project as JSON
    Export {
        /// Output file or directory (prints to stdout when omitted)
        #[clap(long, short = 'o')]
        output: Option<PathBuf>,
    },

    /// Discard the current project and start over
    Reset {
        /// Skip the confirmation prompt
        #[clap(long, short = 'y')]
        yes: bool,
    },

    /// Walk through the wizard screens interactively
    Wizard {
        /// Screen to start on (project, building or solution)
        #[clap(long)]
        route: Option<String>,
    },

    /// Offline asset cache operations
    #[clap(subcommand)]
    Cache(CacheCommand),

    /// Durable storage operations
    #[clap(subcommand)]
    Db(DbCommand),

    /// Configuration file operations
    #[clap(subcommand)]
    Config(ConfigCommand),
}

#[derive(Subcommand, Debug)]
pub enum CacheCommand {
    /// Install the configured asset version and activate it
    Install,

    /// Activate the installed version, deleting all other caches
    Activate,

    /// List caches and their entries
    Status,

    /// Fetch a URL through the active cache
    Fetch {
        url: String,

        /// Treat the request as a page navigation
        #[clap(long)]
        navigate: bool,
    },
}

#[derive(Subcommand, Debug)]
pub enum DbCommand {
    /// Print the slot location and backend
    Path,

    /// Copy the stored project to another backend
    Migrate {
        /// Target location (a directory, or a .db file for SQLite)
        target: PathBuf,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Write a default config file if none exists
    Init,

    /// Print the effective configuration
    Show,
}
