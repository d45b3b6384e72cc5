//! Command-line argument parsing for Cadence.

use std::path::PathBuf;

use cadence_core::RepeatMode;
use clap::{ Parser, Subcommand };


/// Cadence - A local music library indexer.
#[derive( Parser, Debug )]
#[command( name = "cadence" )]
#[command( version, about, long_about = None )]
pub struct Args {
    /// Use generated demo data instead of scanning the library.
    #[arg( long, global = true )]
    pub demo: bool,

    /// Config file to use instead of the default location.
    #[arg( long, global = true )]
    pub config: Option<PathBuf>,

    /// Directory for the song cache and playlists.
    #[arg( long, global = true )]
    pub data_dir: Option<PathBuf>,

    /// Log debug output.
    #[arg( short, long, global = true, conflicts_with = "quiet" )]
    pub verbose: bool,

    /// Only log warnings and errors.
    #[arg( short, long, global = true )]
    pub quiet: bool,

    #[command( subcommand )]
    pub command: Command,
}


#[derive( Subcommand, Debug )]
pub enum Command {
    /// Run a full scan of every library folder.
    Scan,

    /// Manage library folders.
    Folders {
        #[command( subcommand )]
        action: FolderAction,
    },

    /// List every song.
    Songs,

    /// List albums with song counts.
    Albums,

    /// List artists with album and song counts.
    Artists,

    /// Print the folder tree.
    Tree,

    /// List manual and file playlists.
    Playlists,

    /// Search titles, artists and albums.
    Search {
        /// Whitespace-separated terms; every term must match.
        #[arg( trailing_var_arg = true )]
        query: Vec<String>,
    },

    /// Print the play order of a queue built from a search.
    Queue {
        /// Shuffle the queue.
        #[arg( long )]
        shuffle: bool,

        /// Repeat mode: off, all or one.
        #[arg( long, default_value = "off" )]
        repeat: RepeatMode,

        /// Songs to queue; all songs if empty.
        #[arg( trailing_var_arg = true )]
        query: Vec<String>,
    },

    /// Keep the library in sync with the filesystem until Ctrl-C.
    Watch,
}


#[derive( Subcommand, Debug )]
pub enum FolderAction {
    /// List configured folders.
    List,

    /// Add a folder and scan it.
    Add {
        path: PathBuf,
    },

    /// Remove a folder.
    Remove {
        path: PathBuf,
    },
}
