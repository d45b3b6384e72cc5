//! Single-root folder scanner.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use crate::cancel::CancelToken;
use crate::model::ScanResult;
use crate::tags::TagSource;


/// Collects the songs and playlists under one library root.
#[derive( Clone )]
pub struct FolderScanner {
    source: Arc<dyn TagSource>,
    extensions: HashSet<String>,
}


impl FolderScanner {
    pub fn new( source: Arc<dyn TagSource>, extensions: HashSet<String> ) -> Self {
        Self { source, extensions }
    }


    /// Scans `root` recursively.
    ///
    /// A cancelled scan yields an empty result, never a partial one.
    pub fn scan( &self, root: &Path, cancel: &CancelToken ) -> ScanResult {
        tracing::info!( "Scanning {:?}", root );

        let songs = self.source.load_songs_from_folder( root, &self.extensions, cancel );
        if cancel.is_cancelled() {
            return ScanResult::default();
        }

        let playlists = self.source.load_playlists_from_folder( root, cancel );
        if cancel.is_cancelled() {
            return ScanResult::default();
        }

        tracing::info!( "Found {} songs and {} playlists in {:?}", songs.len(), playlists.len(), root );
        ScanResult { songs, playlists }
    }
}


#[cfg( test )]
mod tests {
    use std::fs;

    use super::*;
    use crate::tags::FileTagSource;


    fn scanner() -> FolderScanner {
        let extensions = [ "mp3" ].iter().map( |e| e.to_string() ).collect();
        FolderScanner::new( Arc::new( FileTagSource::new() ), extensions )
    }


    #[test]
    fn test_scan_collects_songs_and_playlists() {
        let dir = tempfile::tempdir().unwrap();
        fs::write( dir.path().join( "a.mp3" ), b"x" ).unwrap();
        fs::write( dir.path().join( "notes.txt" ), b"x" ).unwrap();
        fs::write( dir.path().join( "list.m3u" ), "a.mp3\n" ).unwrap();

        let result = scanner().scan( dir.path(), &CancelToken::new() );

        assert_eq!( result.songs.len(), 1 );
        assert_eq!( result.playlists.len(), 1 );
    }


    #[test]
    fn test_cancelled_scan_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        fs::write( dir.path().join( "a.mp3" ), b"x" ).unwrap();
        fs::write( dir.path().join( "list.m3u" ), "a.mp3\n" ).unwrap();

        let cancel = CancelToken::new();
        cancel.cancel();
        let result = scanner().scan( dir.path(), &cancel );

        assert!( result.songs.is_empty() );
        assert!( result.playlists.is_empty() );
    }


    #[test]
    fn test_missing_root_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let result = scanner().scan( &dir.path().join( "gone" ), &CancelToken::new() );
        assert!( result.songs.is_empty() );
    }
}
