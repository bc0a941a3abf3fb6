use clap::{Parser, Subcommand};

/// Command-line interface definition for attsync
/// Backup, retention and server sync for the attendance database
#[derive(Parser)]
#[command(
    name = "attsync",
    version = env!("CARGO_PKG_VERSION"),
    about = "Backup, retention and server-to-local sync for the attendance dashboard database",
    long_about = None
)]
pub struct Cli {
    /// Configuration file (default: ~/.attsync/attsync.conf or $ATTSYNC_CONFIG)
    #[arg(global = true, long = "config", value_name = "FILE")]
    pub config: Option<String>,

    /// Override the live working directory
    #[arg(global = true, long = "live-dir", value_name = "DIR")]
    pub live_dir: Option<String>,

    /// Override the backup directory
    #[arg(global = true, long = "backup-dir", value_name = "DIR")]
    pub backup_dir: Option<String>,

    /// Answer "yes" to every confirmation prompt
    #[arg(global = true, long = "yes", short = 'y')]
    pub yes: bool,

    /// Enable debug diagnostics on stderr
    #[arg(global = true, long = "verbose", short = 'v')]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write the default configuration file and create the backup directory
    Init,

    /// Show or validate the effective configuration
    Config {
        #[arg(long = "print", help = "Print the effective configuration")]
        print_config: bool,

        #[arg(long = "check", help = "Validate the configuration")]
        check: bool,
    },

    /// Snapshot the live database and apply the retention window
    Backup {
        #[arg(long = "no-sweep", help = "Do not delete expired snapshots")]
        no_sweep: bool,

        #[arg(long = "days", value_name = "N", help = "Retention window in days")]
        days: Option<u32>,
    },

    /// Delete snapshots older than the retention window
    Sweep {
        #[arg(long = "days", value_name = "N", help = "Retention window in days")]
        days: Option<u32>,

        #[arg(
            long = "pattern",
            value_name = "GLOB",
            help = "Only consider entries matching this glob"
        )]
        pattern: Option<String>,

        #[arg(long = "dry-run", help = "Only list what would be deleted")]
        dry_run: bool,
    },

    /// Pull the data files from the server and promote them to the live directory
    Sync {
        #[arg(long = "remote", value_name = "USER@HOST", help = "Remote connection target")]
        remote: Option<String>,

        #[arg(long = "remote-path", value_name = "PATH", help = "Remote base path")]
        remote_path: Option<String>,

        #[arg(long = "no-stats", help = "Skip the dataset statistics report")]
        no_stats: bool,
    },

    /// Show statistics about the live database
    Stats,

    /// List snapshots in the backup directory
    List,

    /// Remove stray files from the live directory
    Clean {
        #[arg(long = "dry-run", help = "Only list what would be deleted")]
        dry_run: bool,
    },

    /// Archive the live data files into a single tar.gz
    Bundle,
}
