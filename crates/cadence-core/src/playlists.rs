//! Manual playlist storage
//!
//! One pretty-printed JSON file per playlist, named after its id.

use std::fs;
use std::path::{ Path, PathBuf };

use thiserror::Error;
use uuid::Uuid;

use crate::folder_tree::cmp_ignore_case;
use crate::model::{ path_key, Playlist, PlaylistKind };


/// Errors that can occur with playlist files.
#[derive( Debug, Error )]
pub enum PlaylistStoreError {
    #[error( "IO error: {0}" )]
    Io( #[from] std::io::Error ),

    #[error( "Serialization error: {0}" )]
    Json( #[from] serde_json::Error ),

    #[error( "Not a manual playlist: {0}" )]
    NotManual( String ),
}


/// Directory of manual playlist files.
#[derive( Debug, Clone )]
pub struct PlaylistStore {
    dir: PathBuf,
}


impl PlaylistStore {
    /// Creates a store rooted at `<data_dir>/playlists`.
    pub fn new( data_dir: impl AsRef<Path> ) -> Self {
        Self {
            dir: data_dir.as_ref().join( "playlists" ),
        }
    }


    pub fn dir( &self ) -> &Path {
        &self.dir
    }


    fn file_for( &self, id: Uuid ) -> PathBuf {
        self.dir.join( format!( "{}.json", id ) )
    }


    /// Loads every readable playlist, sorted by name.
    ///
    /// Unreadable or corrupt files are skipped.
    pub fn load_all( &self ) -> Vec<Playlist> {
        let entries = match fs::read_dir( &self.dir ) {
            Ok( entries ) => entries,
            Err( _ ) => return Vec::new(),
        };

        let mut playlists: Vec<Playlist> = entries
            .filter_map( Result::ok )
            .map( |entry| entry.path() )
            .filter( |path| path.extension().is_some_and( |e| e.eq_ignore_ascii_case( "json" ) ) )
            .filter_map( |path| match read_playlist( &path ) {
                Ok( playlist ) => Some( playlist ),
                Err( e ) => {
                    tracing::warn!( "Skipping playlist file {:?}: {}", path, e );
                    None
                }
            })
            .collect();

        playlists.sort_by( |a, b| cmp_ignore_case( &a.name, &b.name ) );
        playlists
    }


    /// Creates and saves an empty playlist.
    pub fn create( &self, name: &str ) -> Result<Playlist, PlaylistStoreError> {
        let playlist = Playlist::manual( name );
        self.save( &playlist )?;
        tracing::info!( "Created playlist {:?}", playlist.name );
        Ok( playlist )
    }


    /// Writes `playlist` wholesale.
    pub fn save( &self, playlist: &Playlist ) -> Result<(), PlaylistStoreError> {
        if playlist.kind != PlaylistKind::Manual {
            return Err( PlaylistStoreError::NotManual( playlist.name.clone() ) );
        }

        fs::create_dir_all( &self.dir )?;
        let json = serde_json::to_string_pretty( playlist )?;
        fs::write( self.file_for( playlist.id ), json )?;
        Ok(())
    }


    /// Deletes the playlist file, if any.
    ///
    /// @returns true if a file was removed
    pub fn delete( &self, id: Uuid ) -> Result<bool, PlaylistStoreError> {
        let path = self.file_for( id );
        if !path.exists() {
            return Ok( false );
        }

        fs::remove_file( path )?;
        Ok( true )
    }


    /// Appends a song to a playlist unless it is already there, then saves.
    ///
    /// @returns true if the song was added
    pub fn add_song( &self, playlist: &mut Playlist, song_path: &Path ) -> Result<bool, PlaylistStoreError> {
        let key = path_key( song_path );
        if playlist.song_file_paths.iter().any( |p| path_key( p ) == key ) {
            return Ok( false );
        }

        playlist.song_file_paths.push( song_path.to_path_buf() );
        self.save( playlist )?;
        Ok( true )
    }
}


fn read_playlist( path: &Path ) -> Result<Playlist, PlaylistStoreError> {
    let contents = fs::read_to_string( path )?;
    let mut playlist: Playlist = serde_json::from_str( &contents )?;
    playlist.kind = PlaylistKind::Manual;
    playlist.file_path = None;
    Ok( playlist )
}


#[cfg( test )]
mod tests {
    use super::*;


    #[test]
    fn test_create_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = PlaylistStore::new( dir.path() );

        let mut road = store.create( "road trip" ).unwrap();
        store.create( "Chill" ).unwrap();
        assert!( store.add_song( &mut road, Path::new( "/m/a.mp3" ) ).unwrap() );

        let loaded = store.load_all();
        let names: Vec<&str> = loaded.iter().map( |p| p.name.as_str() ).collect();
        assert_eq!( names, vec![ "Chill", "road trip" ] );
        assert_eq!( loaded[ 1 ].id, road.id );
        assert_eq!( loaded[ 1 ].song_file_paths, vec![ PathBuf::from( "/m/a.mp3" ) ] );
        assert!( store.dir().join( format!( "{}.json", road.id ) ).exists() );
    }


    #[test]
    fn test_add_song_skips_duplicates() {
        let dir = tempfile::tempdir().unwrap();
        let store = PlaylistStore::new( dir.path() );
        let mut playlist = store.create( "x" ).unwrap();

        assert!( store.add_song( &mut playlist, Path::new( "/m/a.mp3" ) ).unwrap() );
        assert!( !store.add_song( &mut playlist, Path::new( "/M/A.mp3" ) ).unwrap() );
        assert_eq!( playlist.song_file_paths.len(), 1 );
    }


    #[test]
    fn test_delete() {
        let dir = tempfile::tempdir().unwrap();
        let store = PlaylistStore::new( dir.path() );
        let playlist = store.create( "x" ).unwrap();

        assert!( store.delete( playlist.id ).unwrap() );
        assert!( !store.delete( playlist.id ).unwrap() );
        assert!( store.load_all().is_empty() );
    }


    #[test]
    fn test_corrupt_files_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let store = PlaylistStore::new( dir.path() );
        store.create( "good" ).unwrap();
        fs::write( store.dir().join( "bad.json" ), "{ nope" ).unwrap();

        let loaded = store.load_all();
        assert_eq!( loaded.len(), 1 );
        assert_eq!( loaded[ 0 ].name, "good" );
    }


    #[test]
    fn test_file_playlists_are_not_stored() {
        let dir = tempfile::tempdir().unwrap();
        let store = PlaylistStore::new( dir.path() );
        let file = Playlist::from_file( PathBuf::from( "/m/a.m3u" ), "a", Vec::new() );

        assert!( matches!( store.save( &file ), Err( PlaylistStoreError::NotManual( _ ) ) ) );
    }
}
