//! Cadence CLI - Command-line front end for the music library

mod cli;

use std::path::{ Path, PathBuf };

use anyhow::{ Context, Result };
use clap::Parser;
use path_absolutize::Absolutize;
use tokio::runtime::Handle;
use tokio::sync::broadcast::error::RecvError;

use cadence_core::{
    FolderNode, Library, LibraryConfig, LibraryEvent, LibraryOptions, QueueController, RepeatMode, Song,
};

use cli::{ Args, Command, FolderAction };


#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging( &args );

    let config_path = args.config.clone().or_else( LibraryConfig::default_path );
    let config = config_path.as_deref().map( LibraryConfig::load_from ).unwrap_or_default();

    let data_dir = args.data_dir.clone()
        .or_else( LibraryConfig::default_data_dir )
        .context( "No data directory available, pass --data-dir" )?;
    let options = LibraryOptions {
        data_dir,
        persist_cache: !args.demo,
    };

    match args.command {
        Command::Folders { action } => run_folders( action, config, config_path.as_deref(), options ).await,
        Command::Scan => {
            let library = Library::new( config, options, Handle::current() );
            let stats = library.refresh().await?;
            println!(
                "Scanned {} songs and {} playlists ({} removed)",
                stats.songs, stats.playlists, stats.removed,
            );
            Ok(())
        }
        Command::Watch => run_watch( Library::new( config, options, Handle::current() ), args.demo ).await,
        command => {
            let library = Library::new( config, options, Handle::current() );
            load( &library, args.demo ).await?;
            run_view( &library, command ).await
        }
    }
}


fn init_logging( args: &Args ) {
    let level = if args.verbose {
        tracing::Level::DEBUG
    } else if args.quiet {
        tracing::Level::WARN
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level( level )
        .with_writer( std::io::stderr )
        .with_target( false )
        .init();
}


/// Fills the library from demo data, or from the cache plus a startup scan.
async fn load( library: &Library, demo: bool ) -> Result<()> {
    if demo {
        library.load_demo_data();
        return Ok(());
    }

    if let Some( scan ) = library.initialize().await? {
        scan.await.context( "Startup scan failed" )?;
    }
    Ok(())
}


async fn run_folders(
    action: FolderAction,
    mut config: LibraryConfig,
    config_path: Option<&Path>,
    options: LibraryOptions,
) -> Result<()> {
    match action {
        FolderAction::List => {
            if config.music_folders.is_empty() {
                println!( "No library folders configured" );
            }
            for folder in &config.music_folders {
                let marker = if folder.is_dir() { "" } else { " (missing)" };
                println!( "{}{}", folder.display(), marker );
            }
        }
        FolderAction::Add { path } => {
            let path = absolute( &path )?;
            if !config.add_folder( path.clone() ) {
                println!( "{} is already in the library", path.display() );
                return Ok(());
            }
            save_config( &config, config_path )?;

            let library = Library::new( config, options, Handle::current() );
            library.data().load_cache();
            let stats = library.scan_folder( &path ).await?;
            println!( "Added {} ({} songs, {} playlists)", path.display(), stats.songs, stats.playlists );
        }
        FolderAction::Remove { path } => {
            let path = absolute( &path )?;
            if !config.remove_folder( &path ) {
                println!( "{} is not in the library", path.display() );
                return Ok(());
            }
            save_config( &config, config_path )?;
            println!( "Removed {}; its songs are dropped on the next scan", path.display() );
        }
    }

    Ok(())
}


fn absolute( path: &Path ) -> Result<PathBuf> {
    let absolute = path.absolutize().with_context( || format!( "Invalid path {}", path.display() ) )?;
    Ok( absolute.into_owned() )
}


fn save_config( config: &LibraryConfig, path: Option<&Path> ) -> Result<()> {
    let path = path.context( "No config directory available, pass --config" )?;
    config.save_to( path ).with_context( || format!( "Failed to save config to {}", path.display() ) )
}


async fn run_view( library: &Library, command: Command ) -> Result<()> {
    match command {
        Command::Songs => {
            for song in library.all_songs() {
                print_song( &song );
            }
        }
        Command::Albums => {
            for album in library.all_albums() {
                println!( "{} - {} ({} songs)", album.title, album.artist, album.song_count );
            }
        }
        Command::Artists => {
            for artist in library.all_artists() {
                println!( "{} ({} albums, {} songs)", artist.name, artist.album_count, artist.song_count );
            }
        }
        Command::Tree => {
            for root in library.folder_root_nodes() {
                print_node( &root, 0 );
            }
        }
        Command::Playlists => {
            for playlist in library.all_playlists() {
                let source = playlist.file_path
                    .as_ref()
                    .map( |p| p.display().to_string() )
                    .unwrap_or_else( || playlist.id.to_string() );
                println!( "{} ({} songs) [{}]", playlist.name, playlist.song_file_paths.len(), source );
            }
        }
        Command::Search { query } => {
            for song in library.search( &query.join( " " ) ).await? {
                print_song( &song );
            }
        }
        Command::Queue { shuffle, repeat, query } => {
            let songs = library.search( &query.join( " " ) ).await?;
            print_queue( songs, shuffle, repeat );
        }
        Command::Scan | Command::Watch | Command::Folders { .. } => {}
    }

    Ok(())
}


/// Prints one pass of the queue in play order.
fn print_queue( songs: Vec<Song>, shuffle: bool, repeat: RepeatMode ) {
    let mut queue = QueueController::new();
    queue.set_context( songs, false );
    queue.set_modes( shuffle, repeat );

    if queue.current_index().is_none() && !queue.try_advance( false ) {
        println!( "Queue is empty" );
        return;
    }

    for position in 0..queue.len() {
        if position > 0 && !queue.try_advance( true ) {
            break;
        }
        if let Some( song ) = queue.current_song() {
            println!( "{:>4}. {} - {}", position + 1, song.artist, song.title );
        }
    }
}


fn print_song( song: &Song ) {
    println!( "{} - {} [{}] {}", song.artist, song.title, song.album, song.duration_string() );
}


fn print_node( node: &FolderNode, depth: usize ) {
    let indent = "  ".repeat( depth );
    println!( "{}{}/ ({} songs)", indent, node.name, node.total_songs() );

    for child in &node.children {
        print_node( child, depth + 1 );
    }
    for song in &node.songs {
        println!( "{}  {}", indent, song.title );
    }
}


async fn run_watch( library: Library, demo: bool ) -> Result<()> {
    let mut events = library.subscribe();
    load_for_watch( &library, demo ).await?;
    tracing::info!( "Watching library, press Ctrl-C to stop" );

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            event = events.recv() => match event {
                Ok( LibraryEvent::DataUpdated ) => {
                    let snapshot = library.data().snapshot();
                    tracing::info!(
                        "Library updated: {} songs, {} albums, {} artists",
                        snapshot.songs.len(),
                        snapshot.albums.len(),
                        snapshot.artists.len(),
                    );
                }
                Ok( LibraryEvent::PlaylistsChanged ) => {
                    tracing::info!( "Playlists changed: {}", library.all_playlists().len() );
                }
                Err( RecvError::Lagged( skipped ) ) => tracing::debug!( "Skipped {} library events", skipped ),
                Err( RecvError::Closed ) => break,
            },
        }
    }

    library.cancel_scan();
    Ok(())
}


/// Like [`load`], but the startup scan keeps running in the background.
async fn load_for_watch( library: &Library, demo: bool ) -> Result<()> {
    if demo {
        library.load_demo_data();
    } else {
        library.initialize().await?;
    }
    Ok(())
}
