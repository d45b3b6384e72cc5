//! Scan coordinator
//!
//! Runs the folder scanner over the library roots and feeds the results to
//! the data manager. Only a full scan may conclude that a song is gone; a
//! single-folder scan never removes anything.

use std::collections::HashSet;
use std::path::{ Path, PathBuf };
use std::sync::{ Arc, RwLock };

use crate::cancel::CancelToken;
use crate::data_manager::LibraryDataManager;
use crate::model::{ is_virtual_path, path_key, ScanResult };
use crate::scanner::FolderScanner;


/// Outcome of a scan pass.
#[derive( Debug, Clone, Copy, Default, PartialEq, Eq )]
pub struct ScanStats {
    pub songs: usize,
    pub playlists: usize,
    pub removed: usize,
    pub cancelled: bool,
}


impl ScanStats {
    fn cancelled() -> Self {
        Self { cancelled: true, ..Self::default() }
    }
}


/// Drives full and single-folder scans.
pub struct ScanCoordinator {
    scanner: FolderScanner,
    data: Arc<LibraryDataManager>,
    roots: RwLock<Vec<PathBuf>>,
}


impl ScanCoordinator {
    pub fn new( scanner: FolderScanner, data: Arc<LibraryDataManager>, roots: Vec<PathBuf> ) -> Self {
        Self {
            scanner,
            data,
            roots: RwLock::new( roots ),
        }
    }


    pub fn set_roots( &self, roots: Vec<PathBuf> ) {
        *self.roots.write().unwrap_or_else( |e| e.into_inner() ) = roots;
    }


    pub fn roots( &self ) -> Vec<PathBuf> {
        self.roots.read().unwrap_or_else( |e| e.into_inner() ).clone()
    }


    /// Scans every library root and reconciles deletions.
    ///
    /// Songs that were indexed but not found again are removed, unless they
    /// live on the virtual scheme. File playlists are fully synced. A
    /// cancelled scan changes nothing.
    pub fn scan_all( &self, cancel: &CancelToken ) -> ScanStats {
        let mut result = ScanResult::default();
        for root in self.roots() {
            if cancel.is_cancelled() {
                break;
            }
            result.extend( self.scanner.scan( &root, cancel ) );
        }

        if cancel.is_cancelled() {
            tracing::info!( "Full scan cancelled" );
            return ScanStats::cancelled();
        }

        let found: HashSet<String> = result.songs.iter().map( |s| s.key() ).collect();
        let mut stats = ScanStats {
            songs: result.songs.len(),
            playlists: result.playlists.len(),
            ..ScanStats::default()
        };

        self.data.add_or_update_songs( result.songs );

        for path in self.data.song_paths() {
            if is_virtual_path( &path ) || found.contains( &path_key( &path ) ) {
                continue;
            }
            if self.data.remove_song( &path ).is_some() {
                tracing::debug!( "Removed missing song {:?}", path );
                stats.removed += 1;
            }
        }

        self.data.update_file_playlists( result.playlists, false );
        self.data.request_rebuild( true );

        tracing::info!(
            "Full scan finished: {} songs, {} playlists, {} removed",
            stats.songs,
            stats.playlists,
            stats.removed,
        );
        stats
    }


    /// Scans a single folder, adding and updating only.
    pub fn scan_folder( &self, path: &Path, cancel: &CancelToken ) -> ScanStats {
        let result = self.scanner.scan( path, cancel );

        if cancel.is_cancelled() {
            tracing::info!( "Scan of {:?} cancelled", path );
            return ScanStats::cancelled();
        }

        let stats = ScanStats {
            songs: result.songs.len(),
            playlists: result.playlists.len(),
            ..ScanStats::default()
        };

        self.data.add_or_update_songs( result.songs );
        self.data.update_file_playlists( result.playlists, true );
        self.data.request_rebuild( true );

        stats
    }
}


#[cfg( test )]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use tokio::runtime::Handle;

    use super::*;
    use crate::config::LibraryConfig;
    use crate::model::{ Playlist, Song, SongMetadata };
    use crate::tags::{ TagError, TagSource };


    /// In-memory tag source keyed by root folder.
    #[derive( Default )]
    struct FakeSource {
        folders: Mutex<HashMap<PathBuf, Vec<Song>>>,
    }


    impl FakeSource {
        fn put( &self, root: &str, songs: &[( &str, &str, &str )] ) {
            let songs = songs
                .iter()
                .map( |( file, artist, album )| {
                    let mut song = Song::from_path( Path::new( root ).join( file ) );
                    song.artist = artist.to_string();
                    song.album = album.to_string();
                    song
                })
                .collect();
            self.folders.lock().unwrap().insert( PathBuf::from( root ), songs );
        }
    }


    impl TagSource for FakeSource {
        fn load_songs_from_folder( &self, folder: &Path, _: &HashSet<String>, _: &CancelToken ) -> Vec<Song> {
            self.folders.lock().unwrap().get( folder ).cloned().unwrap_or_default()
        }

        fn load_playlists_from_folder( &self, _: &Path, _: &CancelToken ) -> Vec<Playlist> {
            Vec::new()
        }

        fn create_song_from_file( &self, path: &Path ) -> Option<Song> {
            Some( Song::from_path( path ) )
        }

        fn metadata( &self, _: &Path ) -> Option<SongMetadata> {
            None
        }

        fn save_metadata( &self, _: &Path, _: &SongMetadata ) -> Result<(), TagError> {
            Ok(())
        }
    }


    fn setup( roots: &[&str] ) -> ( Arc<FakeSource>, Arc<LibraryDataManager>, ScanCoordinator ) {
        let source = Arc::new( FakeSource::default() );
        let config = LibraryConfig {
            rebuild_debounce_ms: 10,
            ..LibraryConfig::default()
        };
        let data = Arc::new( LibraryDataManager::new( &config, None, Handle::current() ) );
        let scanner = FolderScanner::new( source.clone(), config.extension_set() );
        let roots = roots.iter().map( PathBuf::from ).collect();

        let coordinator = ScanCoordinator::new( scanner, Arc::clone( &data ), roots );
        ( source, data, coordinator )
    }


    #[tokio::test( flavor = "multi_thread" )]
    async fn test_full_scan_spans_all_roots() {
        let ( source, data, coordinator ) = setup( &[ "/a", "/b" ] );
        source.put( "/a", &[ ( "1.mp3", "X", "Y" ) ] );
        source.put( "/b", &[ ( "2.mp3", "X", "Y" ) ] );

        let stats = coordinator.scan_all( &CancelToken::new() );

        assert_eq!( stats.songs, 2 );
        assert_eq!( data.all_songs().len(), 2 );
    }


    #[tokio::test( flavor = "multi_thread" )]
    async fn test_full_scan_removes_missing_but_not_virtual() {
        let ( source, data, coordinator ) = setup( &[ "/a" ] );
        source.put( "/a", &[ ( "1.mp3", "X", "Y" ), ( "2.mp3", "X", "Y" ) ] );
        coordinator.scan_all( &CancelToken::new() );

        data.add_or_update_song( Song::from_path( "demo://Artist/Album/Song.mp3" ) );
        source.put( "/a", &[ ( "1.mp3", "X", "Y" ) ] );
        let stats = coordinator.scan_all( &CancelToken::new() );

        assert_eq!( stats.removed, 1 );
        let paths: Vec<PathBuf> = data.all_songs().into_iter().map( |s| s.file_path ).collect();
        assert_eq!( paths.len(), 2 );
        assert!( paths.contains( &PathBuf::from( "/a/1.mp3" ) ) );
        assert!( paths.contains( &PathBuf::from( "demo://Artist/Album/Song.mp3" ) ) );
    }


    #[tokio::test( flavor = "multi_thread" )]
    async fn test_single_folder_scan_never_removes() {
        let ( source, data, coordinator ) = setup( &[ "/a" ] );
        source.put( "/a", &[ ( "1.mp3", "X", "Y" ), ( "2.mp3", "X", "Y" ) ] );
        coordinator.scan_all( &CancelToken::new() );

        source.put( "/a", &[ ( "1.mp3", "X", "Y" ) ] );
        let stats = coordinator.scan_folder( Path::new( "/a" ), &CancelToken::new() );

        assert_eq!( stats.removed, 0 );
        assert_eq!( data.all_songs().len(), 2 );
    }


    #[tokio::test( flavor = "multi_thread" )]
    async fn test_repeated_full_scans_are_idempotent() {
        let ( source, data, coordinator ) = setup( &[ "/a" ] );
        source.put( "/a", &[
            ( "1.mp3", "Artist A", "Album 1" ),
            ( "2.mp3", "Artist A", "Album 1" ),
            ( "3.mp3", "Artist A", "Album 2" ),
            ( "4.mp3", "Artist B", "Album 1" ),
            ( "5.mp3", "Artist C", "Single" ),
        ]);

        coordinator.scan_all( &CancelToken::new() );
        let first = data.snapshot();
        coordinator.scan_all( &CancelToken::new() );
        let second = data.snapshot();

        assert_eq!( first.songs, second.songs );
        assert_eq!( first.albums, second.albums );
        assert_eq!( first.artists, second.artists );
        assert_eq!( second.albums.len(), 4 );
        assert_eq!( second.artists.len(), 3 );
    }


    #[tokio::test( flavor = "multi_thread" )]
    async fn test_cancelled_full_scan_keeps_library() {
        let ( source, data, coordinator ) = setup( &[ "/a" ] );
        source.put( "/a", &[ ( "1.mp3", "X", "Y" ) ] );
        coordinator.scan_all( &CancelToken::new() );

        let cancel = CancelToken::new();
        cancel.cancel();
        let stats = coordinator.scan_all( &cancel );

        assert!( stats.cancelled );
        assert_eq!( data.song_count(), 1 );
    }
}
