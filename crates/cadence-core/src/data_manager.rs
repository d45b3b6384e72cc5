//! Library data manager
//!
//! Sole owner of the canonical song map and the file-backed playlist list.
//! Mutations only touch the canonical map and schedule a rebuild; readers see
//! the last published [`LibrarySnapshot`], so they are eventually consistent
//! with the map. Each finished rebuild saves the cache and then broadcasts
//! [`LibraryEvent::DataUpdated`].

use std::collections::HashMap;
use std::path::{ Path, PathBuf };
use std::sync::{ Arc, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak };

use tokio::runtime::Handle;
use tokio::sync::broadcast;

use crate::aggregate::aggregate;
use crate::cache::LibraryCache;
use crate::config::LibraryConfig;
use crate::folder_tree::{ cmp_ignore_case, FolderTreeBuilder };
use crate::model::{ path_key, AlbumGroup, ArtistGroup, FolderNode, Playlist, Song };
use crate::playlist_sync::{ self, SyncMode };
use crate::scheduler::{ RebuildAction, RebuildScheduler };


const EVENT_CAPACITY: usize = 64;


/// "Library changed" notifications. Carry no payload; re-read the snapshots.
#[derive( Debug, Clone, Copy, PartialEq, Eq )]
pub enum LibraryEvent {
    /// A rebuild finished and a new snapshot is published.
    DataUpdated,
    /// The playlist set changed.
    PlaylistsChanged,
}


/// Derived views published by one rebuild.
#[derive( Debug, Clone, Default )]
pub struct LibrarySnapshot {
    pub songs: Vec<Song>,
    pub albums: Vec<AlbumGroup>,
    pub artists: Vec<ArtistGroup>,
    pub folder_roots: Vec<FolderNode>,
}


struct State {
    songs: RwLock<HashMap<String, Song>>,
    file_playlists: RwLock<Vec<Playlist>>,
    published: RwLock<Arc<LibrarySnapshot>>,
    tree: RwLock<FolderTreeBuilder>,
    cache: Option<LibraryCache>,
    events: broadcast::Sender<LibraryEvent>,
}


impl State {
    fn rebuild( &self ) {
        let mut songs: Vec<Song> = read( &self.songs ).values().cloned().collect();
        songs.sort_by( |a, b| {
            cmp_ignore_case( &a.title, &b.title ).then_with( || a.key().cmp( &b.key() ) )
        });

        let ( albums, artists ) = aggregate( &songs );
        let folder_roots = read( &self.tree ).build( &songs );

        let snapshot = Arc::new( LibrarySnapshot { songs, albums, artists, folder_roots } );
        *write( &self.published ) = Arc::clone( &snapshot );

        if let Some( cache ) = &self.cache {
            if let Err( e ) = cache.save( &snapshot.songs ) {
                tracing::warn!( "Failed to save cache {:?}: {}", cache.path(), e );
            }
        }

        tracing::debug!(
            "Rebuilt library: {} songs, {} albums, {} artists",
            snapshot.songs.len(),
            snapshot.albums.len(),
            snapshot.artists.len(),
        );

        let _ = self.events.send( LibraryEvent::DataUpdated );
    }
}


/// Owner of the canonical library state.
pub struct LibraryDataManager {
    state: Arc<State>,
    scheduler: RebuildScheduler,
}


impl LibraryDataManager {
    /// Creates an empty manager.
    ///
    /// @param config provides the library roots and the debounce window
    /// @param cache where rebuilt snapshots are persisted; `None` keeps everything in memory
    /// @param runtime runtime that runs debounced rebuilds
    pub fn new( config: &LibraryConfig, cache: Option<LibraryCache>, runtime: Handle ) -> Self {
        let ( events, _ ) = broadcast::channel( EVENT_CAPACITY );

        let state = Arc::new( State {
            songs: RwLock::new( HashMap::new() ),
            file_playlists: RwLock::new( Vec::new() ),
            published: RwLock::new( Arc::new( LibrarySnapshot::default() ) ),
            tree: RwLock::new( FolderTreeBuilder::new( config.music_folders.clone() ) ),
            cache,
            events,
        });

        let weak: Weak<State> = Arc::downgrade( &state );
        let action: RebuildAction = Arc::new( move || {
            if let Some( state ) = weak.upgrade() {
                state.rebuild();
            }
        });

        Self {
            scheduler: RebuildScheduler::new( runtime, config.rebuild_debounce(), action ),
            state,
        }
    }


    /// Subscribes to "library changed" notifications.
    pub fn subscribe( &self ) -> broadcast::Receiver<LibraryEvent> {
        self.state.events.subscribe()
    }


    /// Replaces the library roots used by the folder view.
    pub fn set_roots( &self, roots: Vec<PathBuf> ) {
        *write( &self.state.tree ) = FolderTreeBuilder::new( roots );
        self.request_rebuild( false );
    }


    /// Inserts or replaces a song, keyed by its path.
    pub fn add_or_update_song( &self, song: Song ) {
        write( &self.state.songs ).insert( song.key(), song );
        self.request_rebuild( false );
    }


    /// Inserts or replaces many songs with a single rebuild request.
    pub fn add_or_update_songs( &self, songs: impl IntoIterator<Item = Song> ) {
        {
            let mut map = write( &self.state.songs );
            for song in songs {
                map.insert( song.key(), song );
            }
        }
        self.request_rebuild( false );
    }


    /// Removes the song at `path`.
    ///
    /// @returns the removed song, if one was indexed
    pub fn remove_song( &self, path: &Path ) -> Option<Song> {
        let removed = write( &self.state.songs ).remove( &path_key( path ) );
        if removed.is_some() {
            self.request_rebuild( false );
        }
        removed
    }


    /// Drops every song and file playlist and rebuilds right away.
    pub fn clear_data( &self ) {
        write( &self.state.songs ).clear();
        write( &self.state.file_playlists ).clear();
        self.request_rebuild( true );
    }


    /// Merges `found` into the file-backed playlists.
    ///
    /// Incremental merges never drop playlists; full merges drop those that
    /// were not found again.
    pub fn update_file_playlists( &self, found: Vec<Playlist>, incremental: bool ) {
        let mode = if incremental { SyncMode::Incremental } else { SyncMode::Full };

        {
            let mut playlists = write( &self.state.file_playlists );
            let existing = std::mem::take( &mut *playlists );
            *playlists = playlist_sync::sync( existing, found, mode );
            tracing::debug!( "File playlists synced ({:?}): {}", mode, playlists.len() );
        }

        self.publish_playlists_changed();
    }


    /// Broadcasts [`LibraryEvent::PlaylistsChanged`].
    pub fn publish_playlists_changed( &self ) {
        let _ = self.state.events.send( LibraryEvent::PlaylistsChanged );
    }


    /// Looks a song up in the canonical map (not the published snapshot).
    pub fn get_song( &self, path: &Path ) -> Option<Song> {
        read( &self.state.songs ).get( &path_key( path ) ).cloned()
    }


    pub fn contains( &self, path: &Path ) -> bool {
        read( &self.state.songs ).contains_key( &path_key( path ) )
    }


    /// Paths of every song in the canonical map.
    pub fn song_paths( &self ) -> Vec<PathBuf> {
        read( &self.state.songs ).values().map( |s| s.file_path.clone() ).collect()
    }


    /// Number of songs in the canonical map.
    pub fn song_count( &self ) -> usize {
        read( &self.state.songs ).len()
    }


    /// Loads the on-disk cache into the canonical map and rebuilds immediately.
    ///
    /// @returns the number of cached songs
    pub fn load_cache( &self ) -> usize {
        let songs = self.state.cache.as_ref().map( LibraryCache::load ).unwrap_or_default();
        let count = songs.len();

        {
            let mut map = write( &self.state.songs );
            for song in songs {
                map.insert( song.key(), song );
            }
        }

        tracing::info!( "Loaded {} songs from cache", count );
        self.request_rebuild( true );
        count
    }


    pub fn request_rebuild( &self, immediate: bool ) {
        self.scheduler.schedule( immediate );
    }


    /// The last published snapshot.
    pub fn snapshot( &self ) -> Arc<LibrarySnapshot> {
        Arc::clone( &*read( &self.state.published ) )
    }


    pub fn all_songs( &self ) -> Vec<Song> {
        self.snapshot().songs.clone()
    }


    pub fn all_albums( &self ) -> Vec<AlbumGroup> {
        self.snapshot().albums.clone()
    }


    pub fn all_artists( &self ) -> Vec<ArtistGroup> {
        self.snapshot().artists.clone()
    }


    pub fn folder_root_nodes( &self ) -> Vec<FolderNode> {
        self.snapshot().folder_roots.clone()
    }


    pub fn file_playlists( &self ) -> Vec<Playlist> {
        read( &self.state.file_playlists ).clone()
    }
}


fn read<T>( lock: &RwLock<T> ) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else( |e| e.into_inner() )
}


fn write<T>( lock: &RwLock<T> ) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else( |e| e.into_inner() )
}


#[cfg( test )]
mod tests {
    use std::fs;
    use std::time::Duration;

    use super::*;


    fn song( path: &str, title: &str, artist: &str, album: &str ) -> Song {
        let mut song = Song::from_path( path );
        song.title = title.to_string();
        song.artist = artist.to_string();
        song.album = album.to_string();
        song
    }


    fn config( window_ms: u64 ) -> LibraryConfig {
        LibraryConfig {
            rebuild_debounce_ms: window_ms,
            ..LibraryConfig::default()
        }
    }


    #[tokio::test( flavor = "multi_thread" )]
    async fn test_reads_are_eventually_consistent() {
        let manager = LibraryDataManager::new( &config( 50 ), None, Handle::current() );
        let mut events = manager.subscribe();

        manager.add_or_update_song( song( "/m/a.mp3", "A", "X", "Y" ) );
        assert!( manager.all_songs().is_empty() );
        assert!( manager.get_song( Path::new( "/m/a.mp3" ) ).is_some() );

        let event = tokio::time::timeout( Duration::from_secs( 2 ), events.recv() ).await.unwrap().unwrap();
        assert_eq!( event, LibraryEvent::DataUpdated );
        assert_eq!( manager.all_songs().len(), 1 );
    }


    #[tokio::test( flavor = "multi_thread" )]
    async fn test_paths_are_unique_ignoring_case() {
        let manager = LibraryDataManager::new( &config( 10 ), None, Handle::current() );

        manager.add_or_update_song( song( "/m/a.mp3", "Old", "X", "Y" ) );
        manager.add_or_update_song( song( "/M/A.mp3", "New", "X", "Y" ) );
        manager.request_rebuild( true );

        let songs = manager.all_songs();
        assert_eq!( songs.len(), 1 );
        assert_eq!( songs[ 0 ].title, "New" );
    }


    #[tokio::test( flavor = "multi_thread" )]
    async fn test_rebuild_conserves_counts_and_sorts() {
        let manager = LibraryDataManager::new( &config( 10 ), None, Handle::current() );
        manager.add_or_update_songs( vec![
            song( "/m/1.mp3", "b", "Artist A", "Album 1" ),
            song( "/m/2.mp3", "A", "Artist A", "Album 1" ),
            song( "/m/3.mp3", "c", "Artist A", "Album 2" ),
            song( "/m/4.mp3", "d", "Artist B", "Album 1" ),
            song( "/m/5.mp3", "e", "Artist C", "Single" ),
        ]);
        manager.request_rebuild( true );

        let snapshot = manager.snapshot();
        let titles: Vec<&str> = snapshot.songs.iter().map( |s| s.title.as_str() ).collect();
        assert_eq!( titles, vec![ "A", "b", "c", "d", "e" ] );
        assert_eq!( snapshot.albums.len(), 4 );
        assert_eq!( snapshot.artists.len(), 3 );
        assert_eq!( snapshot.albums.iter().map( |a| a.song_count ).sum::<usize>(), 5 );
        assert_eq!( snapshot.artists.iter().map( |a| a.song_count ).sum::<usize>(), 5 );
    }


    #[tokio::test( flavor = "multi_thread" )]
    async fn test_rebuild_saves_cache_and_load_restores() {
        let dir = tempfile::tempdir().unwrap();
        let cache = LibraryCache::new( dir.path() );

        let manager = LibraryDataManager::new( &config( 10 ), Some( cache.clone() ), Handle::current() );
        manager.add_or_update_song( song( "/m/a.mp3", "A", "X", "Y" ) );
        manager.request_rebuild( true );
        assert_eq!( cache.load().len(), 1 );

        let restored = LibraryDataManager::new( &config( 10 ), Some( cache ), Handle::current() );
        assert_eq!( restored.load_cache(), 1 );
        assert_eq!( restored.all_songs().len(), 1 );
    }


    #[tokio::test( flavor = "multi_thread" )]
    async fn test_clear_data_is_immediate() {
        let manager = LibraryDataManager::new( &config( 10_000 ), None, Handle::current() );
        manager.add_or_update_song( song( "/m/a.mp3", "A", "X", "Y" ) );
        manager.request_rebuild( true );
        assert_eq!( manager.all_songs().len(), 1 );

        manager.clear_data();
        assert!( manager.all_songs().is_empty() );
        assert!( manager.all_albums().is_empty() );
    }


    #[tokio::test( flavor = "multi_thread" )]
    async fn test_remove_song() {
        let manager = LibraryDataManager::new( &config( 10 ), None, Handle::current() );
        manager.add_or_update_song( song( "/m/a.mp3", "A", "X", "Y" ) );

        assert!( manager.remove_song( Path::new( "/M/a.MP3" ) ).is_some() );
        assert!( manager.remove_song( Path::new( "/m/a.mp3" ) ).is_none() );
        assert!( !manager.contains( Path::new( "/m/a.mp3" ) ) );
    }


    #[tokio::test( flavor = "multi_thread" )]
    async fn test_update_file_playlists_publishes() {
        let manager = LibraryDataManager::new( &config( 10 ), None, Handle::current() );
        let mut events = manager.subscribe();

        let found = vec![ Playlist::from_file( PathBuf::from( "/m/a.m3u" ), "a", vec![ PathBuf::from( "/m/1.mp3" ) ] ) ];
        manager.update_file_playlists( found, false );

        assert_eq!( events.recv().await.unwrap(), LibraryEvent::PlaylistsChanged );
        assert_eq!( manager.file_playlists().len(), 1 );

        manager.update_file_playlists( Vec::new(), true );
        assert_eq!( manager.file_playlists().len(), 1 );

        manager.update_file_playlists( Vec::new(), false );
        assert!( manager.file_playlists().is_empty() );
    }


    #[tokio::test( flavor = "multi_thread" )]
    async fn test_folder_view_follows_roots() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join( "music" );
        fs::create_dir_all( &root ).unwrap();

        let manager = LibraryDataManager::new( &config( 10 ), None, Handle::current() );
        manager.add_or_update_song( song( &root.join( "a.mp3" ).to_string_lossy(), "A", "X", "Y" ) );
        manager.request_rebuild( true );
        assert!( manager.folder_root_nodes().is_empty() );

        manager.set_roots( vec![ root ] );
        manager.request_rebuild( true );
        assert_eq!( manager.folder_root_nodes()[ 0 ].total_songs(), 1 );
    }
}
