use std::{net::SocketAddr, path::PathBuf, time::Duration};

use clap::{Args, Parser, Subcommand};

use tagmarks::config::{DEFAULT_DATA_FILE, ServerConfig};

#[derive(Parser)]
#[command(name = "tagmarks", about = "Tagged bookmark store", version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Debug-level logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Errors only
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Server base URL used by client commands
    #[arg(
        long,
        global = true,
        env = "TAGMARKS_SERVER",
        default_value = "http://localhost:4912"
    )]
    pub server: String,

    /// Client request timeout in seconds
    #[arg(long, global = true, default_value_t = 5)]
    pub timeout_secs: u64,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the bookmark server
    Serve(ServeArgs),
    /// Create a new bookmark
    New(NewArgs),
    /// List bookmarks by name or tags
    List(ListArgs),
    /// Delete a bookmark entry
    Delete(DeleteArgs),
    /// Dump all bookmark records
    Dump,
    /// Ask the server to persist its data now
    Save,
    /// List known tags
    Tags,
}

#[derive(Args)]
pub struct ServeArgs {
    /// Listen address
    #[arg(long, env = "TAGMARKS_BIND", default_value = "127.0.0.1:4912")]
    pub bind: SocketAddr,

    /// Snapshot file
    #[arg(long, env = "TAGMARKS_DATA", default_value = DEFAULT_DATA_FILE)]
    pub data: PathBuf,

    /// Snapshot metadata file [default: <data>.stat]
    #[arg(long, env = "TAGMARKS_STAT")]
    pub stat: Option<PathBuf>,

    /// Seconds between scheduled snapshots, 0 to disable
    #[arg(long, env = "TAGMARKS_INTERVAL_SECS", default_value_t = 59)]
    pub interval_secs: u64,

    /// Skip the snapshot after each create and delete
    #[arg(long)]
    pub no_save_on_mutation: bool,
}

impl ServeArgs {
    pub fn into_config(self) -> ServerConfig {
        ServerConfig {
            bind_addr: self.bind,
            data_path: self.data,
            stat_path: self.stat,
            snapshot_interval: Duration::from_secs(self.interval_secs),
            save_on_mutation: !self.no_save_on_mutation,
            ..ServerConfig::default()
        }
    }
}

#[derive(Args)]
pub struct NewArgs {
    /// A short name to refer the bookmark
    #[arg(long)]
    pub name: String,

    /// URL to save
    #[arg(long)]
    pub url: String,

    /// A comma separated list of tags for the given URL
    #[arg(long)]
    pub tags: String,
}

#[derive(Args)]
pub struct ListArgs {
    /// Short name to look up
    #[arg(long, conflicts_with = "tag", required_unless_present = "tag")]
    pub name: Option<String>,

    /// Tag (or comma-separated tags) to search for
    #[arg(long)]
    pub tag: Option<String>,

    /// Open every listed URL in the default browser
    #[arg(long)]
    pub open: bool,
}

#[derive(Args)]
pub struct DeleteArgs {
    /// Bookmark name to delete
    #[arg(long)]
    pub name: String,
}
