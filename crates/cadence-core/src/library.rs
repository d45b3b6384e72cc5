//! Library facade
//!
//! Wires the data manager, scan coordinator, file monitor, event coordinator,
//! playlist store and tag source together. Every component receives its
//! collaborators explicitly; there is no global state.

use std::path::{ Path, PathBuf };
use std::sync::{ Arc, Mutex, RwLock };

use thiserror::Error;
use tokio::runtime::Handle;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::cache::LibraryCache;
use crate::cancel::CancelToken;
use crate::config::{ ConfigError, LibraryConfig };
use crate::data_manager::{ LibraryDataManager, LibraryEvent };
use crate::demo;
use crate::events::LibraryEventCoordinator;
use crate::model::{ AlbumGroup, ArtistGroup, FolderNode, Playlist, Song, SongMetadata };
use crate::monitor::FileMonitor;
use crate::playlists::{ PlaylistStore, PlaylistStoreError };
use crate::scan::{ ScanCoordinator, ScanStats };
use crate::scanner::FolderScanner;
use crate::search;
use crate::tags::{ FileTagSource, TagError, TagSource };


/// Errors that can occur during library operations.
#[derive( Debug, Error )]
pub enum LibraryError {
    #[error( "Playlist error: {0}" )]
    Playlist( #[from] PlaylistStoreError ),

    #[error( "Tag error: {0}" )]
    Tag( #[from] TagError ),

    #[error( "Config error: {0}" )]
    Config( #[from] ConfigError ),

    #[error( "Background task failed: {0}" )]
    Task( #[from] tokio::task::JoinError ),

    #[error( "Unknown playlist: {0}" )]
    UnknownPlaylist( Uuid ),
}


/// Where the library keeps its own files.
#[derive( Debug, Clone )]
pub struct LibraryOptions {
    /// Holds the song cache and the `playlists/` directory
    pub data_dir: PathBuf,

    /// Persist rebuilt snapshots to the song cache
    pub persist_cache: bool,
}


impl LibraryOptions {
    pub fn new( data_dir: impl Into<PathBuf> ) -> Self {
        Self {
            data_dir: data_dir.into(),
            persist_cache: true,
        }
    }
}


/// The music library.
pub struct Library {
    config: RwLock<LibraryConfig>,
    runtime: Handle,
    source: Arc<dyn TagSource>,
    data: Arc<LibraryDataManager>,
    scans: Arc<ScanCoordinator>,
    monitor: FileMonitor,
    store: PlaylistStore,
    manual_playlists: RwLock<Vec<Playlist>>,
    demo_playlists: RwLock<Option<Vec<Playlist>>>,
    scan_cancel: Mutex<CancelToken>,
    event_task: JoinHandle<()>,
}


impl Library {
    /// Creates a library reading tags from real files.
    pub fn new( config: LibraryConfig, options: LibraryOptions, runtime: Handle ) -> Self {
        Self::with_source( config, options, Arc::new( FileTagSource::new() ), runtime )
    }


    /// Creates a library with a custom tag source.
    pub fn with_source(
        config: LibraryConfig,
        options: LibraryOptions,
        source: Arc<dyn TagSource>,
        runtime: Handle,
    ) -> Self {
        let cache = options.persist_cache.then( || LibraryCache::new( &options.data_dir ) );
        let data = Arc::new( LibraryDataManager::new( &config, cache, runtime.clone() ) );

        let scanner = FolderScanner::new( Arc::clone( &source ), config.extension_set() );
        let scans = Arc::new( ScanCoordinator::new( scanner, Arc::clone( &data ), config.music_folders.clone() ) );

        let ( monitor, file_events ) = FileMonitor::new( &config, runtime.clone() );
        let coordinator = LibraryEventCoordinator::new( Arc::clone( &data ), Arc::clone( &source ) );
        let event_task = runtime.spawn( coordinator.run( file_events ) );

        Self {
            config: RwLock::new( config ),
            runtime,
            source,
            data,
            scans,
            monitor,
            store: PlaylistStore::new( &options.data_dir ),
            manual_playlists: RwLock::new( Vec::new() ),
            demo_playlists: RwLock::new( None ),
            scan_cancel: Mutex::new( CancelToken::new() ),
            event_task,
        }
    }


    /// Starts monitoring, loads the cache and manual playlists, and kicks off
    /// a background full scan if configured or if the cache was empty.
    ///
    /// @returns the background scan, if one was started
    pub async fn initialize( &self ) -> Result<Option<JoinHandle<ScanStats>>, LibraryError> {
        self.leave_demo();
        self.start_monitoring();
        self.reload_playlists();

        let data = Arc::clone( &self.data );
        let cached = tokio::task::spawn_blocking( move || data.load_cache() ).await?;

        let scan_on_startup = self.config().scan_on_startup;
        if !scan_on_startup && cached > 0 {
            return Ok( None );
        }

        let scans = Arc::clone( &self.scans );
        let cancel = self.fresh_cancel_token();
        Ok( Some( self.runtime.spawn_blocking( move || scans.scan_all( &cancel ) ) ) )
    }


    /// Restarts monitoring and runs a full rescan.
    pub async fn refresh( &self ) -> Result<ScanStats, LibraryError> {
        self.leave_demo();
        self.start_monitoring();

        let scans = Arc::clone( &self.scans );
        let cancel = self.fresh_cancel_token();
        Ok( tokio::task::spawn_blocking( move || scans.scan_all( &cancel ) ).await? )
    }


    /// Scans a single folder without removing anything.
    pub async fn scan_folder( &self, path: &Path ) -> Result<ScanStats, LibraryError> {
        self.leave_demo();
        self.start_monitoring();

        let scans = Arc::clone( &self.scans );
        let cancel = self.fresh_cancel_token();
        let path = path.to_path_buf();
        Ok( tokio::task::spawn_blocking( move || scans.scan_folder( &path, &cancel ) ).await? )
    }


    /// Cancels the scan in progress, if any.
    pub fn cancel_scan( &self ) {
        self.scan_cancel.lock().unwrap_or_else( |e| e.into_inner() ).cancel();
    }


    fn fresh_cancel_token( &self ) -> CancelToken {
        let token = CancelToken::new();
        *self.scan_cancel.lock().unwrap_or_else( |e| e.into_inner() ) = token.clone();
        token
    }


    /// Drops the demo playlists so manual and file playlists show again.
    fn leave_demo( &self ) {
        let was_demo = self.demo_playlists.write().unwrap_or_else( |e| e.into_inner() ).take().is_some();
        if was_demo {
            self.data.publish_playlists_changed();
        }
    }


    fn start_monitoring( &self ) {
        let roots = self.config().music_folders;
        let watched = self.monitor.start( &roots );
        tracing::debug!( "Monitoring {} of {} library folders", watched, roots.len() );
    }


    /// A copy of the current configuration.
    pub fn config( &self ) -> LibraryConfig {
        self.config.read().unwrap_or_else( |e| e.into_inner() ).clone()
    }


    /// Adds a library root. Call [`Library::scan_folder`] afterwards to index it.
    ///
    /// @returns true if the folder was not configured yet
    pub fn add_folder( &self, path: PathBuf ) -> bool {
        let added = self.config.write().unwrap_or_else( |e| e.into_inner() ).add_folder( path );
        if added {
            self.apply_roots();
        }
        added
    }


    /// Removes a library root. Its songs disappear on the next full scan.
    pub fn remove_folder( &self, path: &Path ) -> bool {
        let removed = self.config.write().unwrap_or_else( |e| e.into_inner() ).remove_folder( path );
        if removed {
            self.apply_roots();
        }
        removed
    }


    fn apply_roots( &self ) {
        let roots = self.config().music_folders;
        self.scans.set_roots( roots.clone() );
        self.data.set_roots( roots );
        self.start_monitoring();
    }


    /// Searches the current song snapshot off the async thread.
    pub async fn search( &self, query: &str ) -> Result<Vec<Song>, LibraryError> {
        let songs = self.data.snapshot();
        let query = query.to_string();
        Ok( tokio::task::spawn_blocking( move || search::search( &songs.songs, &query ) ).await? )
    }


    pub fn subscribe( &self ) -> broadcast::Receiver<LibraryEvent> {
        self.data.subscribe()
    }


    pub fn data( &self ) -> &Arc<LibraryDataManager> {
        &self.data
    }


    pub fn get_song( &self, path: &Path ) -> Option<Song> {
        self.data.get_song( path )
    }


    pub fn all_songs( &self ) -> Vec<Song> {
        self.data.all_songs()
    }


    pub fn all_albums( &self ) -> Vec<AlbumGroup> {
        self.data.all_albums()
    }


    pub fn all_artists( &self ) -> Vec<ArtistGroup> {
        self.data.all_artists()
    }


    pub fn folder_root_nodes( &self ) -> Vec<FolderNode> {
        self.data.folder_root_nodes()
    }


    pub fn file_playlists( &self ) -> Vec<Playlist> {
        self.data.file_playlists()
    }


    pub fn manual_playlists( &self ) -> Vec<Playlist> {
        self.manual_playlists.read().unwrap_or_else( |e| e.into_inner() ).clone()
    }


    /// Manual playlists followed by file-backed ones, or only the demo
    /// playlists while demo data is loaded.
    pub fn all_playlists( &self ) -> Vec<Playlist> {
        if let Some( demo ) = self.demo_playlists.read().unwrap_or_else( |e| e.into_inner() ).as_ref() {
            return demo.clone();
        }

        let mut playlists = self.manual_playlists();
        playlists.extend( self.file_playlists() );
        playlists
    }


    /// Reloads manual playlists from disk.
    pub fn reload_playlists( &self ) {
        let loaded = self.store.load_all();
        tracing::debug!( "Loaded {} manual playlists", loaded.len() );
        *self.manual_playlists.write().unwrap_or_else( |e| e.into_inner() ) = loaded;
        self.data.publish_playlists_changed();
    }


    pub fn create_playlist( &self, name: &str ) -> Result<Playlist, LibraryError> {
        let playlist = self.store.create( name )?;
        self.reload_playlists();
        Ok( playlist )
    }


    pub fn save_playlist( &self, playlist: &Playlist ) -> Result<(), LibraryError> {
        self.store.save( playlist )?;
        self.reload_playlists();
        Ok(())
    }


    pub fn delete_playlist( &self, id: Uuid ) -> Result<bool, LibraryError> {
        let deleted = self.store.delete( id )?;
        self.reload_playlists();
        Ok( deleted )
    }


    /// Adds a song to a manual playlist unless it already contains it.
    pub fn add_song_to_playlist( &self, id: Uuid, song_path: &Path ) -> Result<bool, LibraryError> {
        let mut playlist = self.manual_playlists()
            .into_iter()
            .find( |p| p.id == id )
            .ok_or( LibraryError::UnknownPlaylist( id ) )?;

        let added = self.store.add_song( &mut playlist, song_path )?;
        if added {
            self.reload_playlists();
        }
        Ok( added )
    }


    /// Reads the editable tags of a file.
    pub fn song_metadata( &self, path: &Path ) -> Option<SongMetadata> {
        self.source.metadata( path )
    }


    /// Writes tags to a file and, only if that succeeds, updates the indexed song.
    pub fn update_song_metadata( &self, path: &Path, metadata: &SongMetadata ) -> Result<(), LibraryError> {
        self.source.save_metadata( path, metadata )?;

        if let Some( mut song ) = self.data.get_song( path ) {
            song.title = metadata.title.clone();
            song.artist = metadata.artist.clone();
            song.album = metadata.album.clone();
            self.data.add_or_update_song( song );
        }

        tracing::info!( "Updated tags of {:?}", path );
        Ok(())
    }


    /// Replaces the library contents with generated demo songs and playlists.
    pub fn load_demo_data( &self ) {
        self.data.clear_data();

        let songs = demo::generate_songs( demo::DEFAULT_SONG_COUNT );
        let playlists = demo::generate_playlists( &songs );
        tracing::info!( "Loaded {} demo songs", songs.len() );

        *self.demo_playlists.write().unwrap_or_else( |e| e.into_inner() ) = Some( playlists );
        self.data.add_or_update_songs( songs );
        self.data.request_rebuild( true );
        self.data.publish_playlists_changed();
    }
}


impl Drop for Library {
    fn drop( &mut self ) {
        self.cancel_scan();
        self.monitor.stop();
        self.event_task.abort();
    }
}


#[cfg( test )]
mod tests {
    use std::fs;

    use super::*;


    fn library( dir: &Path, folders: Vec<PathBuf> ) -> Library {
        let config = LibraryConfig {
            music_folders: folders,
            supported_extensions: vec![ "mp3".into() ],
            rebuild_debounce_ms: 20,
            created_delay_ms: 20,
            ..LibraryConfig::default()
        };
        Library::new( config, LibraryOptions::new( dir.join( "data" ) ), Handle::current() )
    }


    #[tokio::test( flavor = "multi_thread" )]
    async fn test_refresh_indexes_and_reconciles() {
        let dir = tempfile::tempdir().unwrap();
        let music = dir.path().join( "music" );
        fs::create_dir_all( music.join( "sub" ) ).unwrap();
        fs::write( music.join( "a.mp3" ), b"x" ).unwrap();
        fs::write( music.join( "sub/b.mp3" ), b"x" ).unwrap();

        let library = library( dir.path(), vec![ music.clone() ] );
        let stats = library.refresh().await.unwrap();

        assert_eq!( stats.songs, 2 );
        assert_eq!( library.all_songs().len(), 2 );
        assert_eq!( library.folder_root_nodes()[ 0 ].total_songs(), 2 );

        library.monitor.stop();
        fs::remove_file( music.join( "a.mp3" ) ).unwrap();
        let stats = library.refresh().await.unwrap();
        assert_eq!( stats.removed, 1 );
        assert_eq!( library.all_songs().len(), 1 );
    }


    #[tokio::test( flavor = "multi_thread" )]
    async fn test_initialize_uses_cache_and_scans() {
        let dir = tempfile::tempdir().unwrap();
        let music = dir.path().join( "music" );
        fs::create_dir_all( &music ).unwrap();
        fs::write( music.join( "a.mp3" ), b"x" ).unwrap();

        {
            let first = library( dir.path(), vec![ music.clone() ] );
            first.refresh().await.unwrap();
        }

        let second = library( dir.path(), vec![ music.clone() ] );
        let scan = second.initialize().await.unwrap();
        assert_eq!( second.all_songs().len(), 1 );

        let stats = scan.expect( "scan on startup" ).await.unwrap();
        assert_eq!( stats.songs, 1 );
    }


    #[tokio::test( flavor = "multi_thread" )]
    async fn test_scan_folder_after_adding_it() {
        let dir = tempfile::tempdir().unwrap();
        let music = dir.path().join( "more" );
        fs::create_dir_all( &music ).unwrap();
        fs::write( music.join( "a.mp3" ), b"x" ).unwrap();

        let library = library( dir.path(), Vec::new() );
        assert!( library.add_folder( music.clone() ) );
        assert!( !library.add_folder( music.clone() ) );

        library.scan_folder( &music ).await.unwrap();
        assert_eq!( library.all_songs().len(), 1 );
    }


    #[tokio::test( flavor = "multi_thread" )]
    async fn test_search() {
        let dir = tempfile::tempdir().unwrap();
        let library = library( dir.path(), Vec::new() );
        library.load_demo_data();

        assert_eq!( library.search( "" ).await.unwrap().len(), library.all_songs().len() );
        let pink = library.search( "pink floyd" ).await.unwrap();
        assert!( pink.iter().all( |s| s.artist == "Pink Floyd" ) );
    }


    #[tokio::test( flavor = "multi_thread" )]
    async fn test_demo_data_survives_full_scan() {
        let dir = tempfile::tempdir().unwrap();
        let library = library( dir.path(), Vec::new() );
        library.load_demo_data();
        let count = library.all_songs().len();
        assert!( count > 0 );
        assert_eq!( library.all_playlists().len(), 5 );

        library.refresh().await.unwrap();
        assert_eq!( library.all_songs().len(), count );
        assert!( library.folder_root_nodes().is_empty() );
    }


    #[tokio::test( flavor = "multi_thread" )]
    async fn test_refresh_leaves_demo_playlists() {
        let dir = tempfile::tempdir().unwrap();
        let library = library( dir.path(), Vec::new() );
        library.load_demo_data();
        library.create_playlist( "Mix" ).unwrap();
        assert_eq!( library.all_playlists().len(), 5 );

        library.refresh().await.unwrap();
        let names: Vec<String> = library.all_playlists().into_iter().map( |p| p.name ).collect();
        assert_eq!( names, vec![ "Mix" ] );
    }


    #[tokio::test( flavor = "multi_thread" )]
    async fn test_manual_playlists() {
        let dir = tempfile::tempdir().unwrap();
        let library = library( dir.path(), Vec::new() );
        let mut events = library.subscribe();

        let playlist = library.create_playlist( "Mix" ).unwrap();
        assert_eq!( events.recv().await.unwrap(), LibraryEvent::PlaylistsChanged );

        assert!( library.add_song_to_playlist( playlist.id, Path::new( "/m/a.mp3" ) ).unwrap() );
        assert!( !library.add_song_to_playlist( playlist.id, Path::new( "/m/a.mp3" ) ).unwrap() );
        assert_eq!( library.all_playlists()[ 0 ].song_file_paths.len(), 1 );

        assert!( matches!(
            library.add_song_to_playlist( Uuid::new_v4(), Path::new( "/m/a.mp3" ) ),
            Err( LibraryError::UnknownPlaylist( _ ) )
        ));

        assert!( library.delete_playlist( playlist.id ).unwrap() );
        assert!( library.all_playlists().is_empty() );
    }


    #[tokio::test( flavor = "multi_thread" )]
    async fn test_failed_metadata_save_changes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let music = dir.path().join( "music" );
        fs::create_dir_all( &music ).unwrap();
        let path = music.join( "a.mp3" );
        fs::write( &path, b"not really audio" ).unwrap();

        let library = library( dir.path(), vec![ music ] );
        library.refresh().await.unwrap();

        let metadata = SongMetadata {
            title: "New Title".into(),
            ..SongMetadata::default()
        };
        assert!( library.update_song_metadata( &path, &metadata ).is_err() );
        assert_eq!( library.get_song( &path ).unwrap().title, "a" );
    }


    #[tokio::test( flavor = "multi_thread" )]
    async fn test_watcher_picks_up_new_files() {
        let dir = tempfile::tempdir().unwrap();
        let music = dir.path().join( "music" );
        fs::create_dir_all( &music ).unwrap();

        let library = library( dir.path(), vec![ music.clone() ] );
        library.refresh().await.unwrap();
        let mut events = library.subscribe();

        fs::write( music.join( "new.mp3" ), b"x" ).unwrap();

        let deadline = tokio::time::Instant::now() + std::time::Duration::from_secs( 5 );
        while library.all_songs().is_empty() {
            let remaining = deadline.saturating_duration_since( tokio::time::Instant::now() );
            assert!( !remaining.is_zero(), "new file was never indexed" );
            let _ = tokio::time::timeout( remaining, events.recv() ).await;
        }
        assert_eq!( library.all_songs()[ 0 ].title, "new" );
    }
}
