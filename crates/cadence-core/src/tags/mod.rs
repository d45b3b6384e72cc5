//! Tag source
//!
//! Turns files into [`Song`] and [`Playlist`] records. The library only talks
//! to files through the [`TagSource`] trait; [`FileTagSource`] is the real
//! implementation backed by Symphonia (read) and Lofty (write).

pub mod m3u;
pub mod read;
pub mod walk;
pub mod write;

use std::collections::HashSet;
use std::fs;
use std::path::{ Path, PathBuf };

use rayon::prelude::*;
use thiserror::Error;

use crate::cancel::CancelToken;
use crate::model::{ file_stem, Playlist, Song, SongMetadata, UNKNOWN_ALBUM, UNKNOWN_ARTIST };


/// Errors that can occur while reading or writing tags.
#[derive( Debug, Error )]
pub enum TagError {
    #[error( "IO error: {0}" )]
    Io( #[from] std::io::Error ),

    #[error( "Unsupported format: {0}" )]
    Unsupported( String ),

    #[error( "Tag write failed: {0}" )]
    Write( #[from] lofty::error::LoftyError ),

    #[error( "Missing or empty file: {0}" )]
    InvalidFile( PathBuf ),
}


/// Source of song and playlist records for the library.
pub trait TagSource: Send + Sync {
    /// Loads every supported audio file under `folder`.
    ///
    /// Returns an empty list if the scan was cancelled.
    fn load_songs_from_folder(
        &self,
        folder: &Path,
        extensions: &HashSet<String>,
        cancel: &CancelToken,
    ) -> Vec<Song>;

    /// Loads every `.m3u` / `.m3u8` playlist under `folder`.
    fn load_playlists_from_folder( &self, folder: &Path, cancel: &CancelToken ) -> Vec<Playlist>;

    /// Builds a song for a single file, or `None` if the file is missing or empty.
    fn create_song_from_file( &self, path: &Path ) -> Option<Song>;

    /// Reads the editable tag fields of a file.
    fn metadata( &self, path: &Path ) -> Option<SongMetadata>;

    /// Writes the editable tag fields of a file.
    fn save_metadata( &self, path: &Path, metadata: &SongMetadata ) -> Result<(), TagError>;
}


/// Filesystem-backed tag source.
#[derive( Debug, Default, Clone, Copy )]
pub struct FileTagSource;


impl FileTagSource {
    pub fn new() -> Self {
        Self
    }


    /// Reads one file into a song, falling back to its file name.
    fn read_song( path: &Path ) -> Song {
        match read::probe( path ) {
            Ok( tags ) => Song {
                title: tags.title.unwrap_or_else( || file_stem( path ) ),
                artist: tags.artist.unwrap_or_else( || UNKNOWN_ARTIST.to_string() ),
                album: tags.album.unwrap_or_else( || UNKNOWN_ALBUM.to_string() ),
                duration: tags.duration.unwrap_or_default(),
                has_art: tags.has_art,
                file_path: path.to_path_buf(),
            },
            Err( e ) => {
                tracing::debug!( "Falling back to file name for {:?}: {}", path, e );
                Song::from_path( path )
            }
        }
    }
}


impl TagSource for FileTagSource {
    fn load_songs_from_folder(
        &self,
        folder: &Path,
        extensions: &HashSet<String>,
        cancel: &CancelToken,
    ) -> Vec<Song> {
        let files = walk::files_with_extensions( folder, extensions, cancel );

        let songs: Vec<Song> = files
            .par_iter()
            .filter( |_| !cancel.is_cancelled() )
            .filter( |path| is_file_valid( path ) )
            .map( |path| Self::read_song( path ) )
            .collect();

        if cancel.is_cancelled() {
            tracing::info!( "Scan of {:?} cancelled", folder );
            return Vec::new();
        }

        tracing::debug!( "Loaded {} songs from {:?}", songs.len(), folder );
        songs
    }


    fn load_playlists_from_folder( &self, folder: &Path, cancel: &CancelToken ) -> Vec<Playlist> {
        let extensions: HashSet<String> = m3u::PLAYLIST_EXTENSIONS.iter().map( |e| e.to_string() ).collect();
        let mut playlists = Vec::new();

        for file in walk::files_with_extensions( folder, &extensions, cancel ) {
            if cancel.is_cancelled() {
                break;
            }
            if !is_file_valid( &file ) {
                continue;
            }

            match m3u::read_playlist( &file ) {
                Ok( Some( playlist ) ) => playlists.push( playlist ),
                Ok( None ) => {}
                Err( e ) => tracing::debug!( "Skipping playlist {:?}: {}", file, e ),
            }
        }

        playlists
    }


    fn create_song_from_file( &self, path: &Path ) -> Option<Song> {
        is_file_valid( path ).then( || Self::read_song( path ) )
    }


    fn metadata( &self, path: &Path ) -> Option<SongMetadata> {
        if !is_file_valid( path ) {
            return None;
        }

        match read::probe( path ) {
            Ok( tags ) => Some( SongMetadata {
                title: tags.title.unwrap_or_default(),
                artist: tags.artist.unwrap_or_default(),
                album: tags.album.unwrap_or_default(),
                album_artist: tags.album_artist.unwrap_or_default(),
                genre: tags.genre.unwrap_or_default(),
                year: tags.year.unwrap_or_default(),
                track: tags.track.unwrap_or_default(),
                disc: tags.disc.unwrap_or_default(),
            }),
            Err( e ) => {
                tracing::warn!( "Failed to read metadata for {:?}: {}", path, e );
                None
            }
        }
    }


    fn save_metadata( &self, path: &Path, metadata: &SongMetadata ) -> Result<(), TagError> {
        if !is_file_valid( path ) {
            return Err( TagError::InvalidFile( path.to_path_buf() ) );
        }
        write::save( path, metadata )
    }
}


/// A file is only handed to a parser if it exists and is non-empty.
pub fn is_file_valid( path: &Path ) -> bool {
    fs::metadata( path )
        .map( |m| m.is_file() && m.len() > 0 )
        .unwrap_or( false )
}


#[cfg( test )]
mod tests {
    use std::time::Duration;

    use super::*;


    fn exts() -> HashSet<String> {
        [ "mp3", "flac" ].iter().map( |e| e.to_string() ).collect()
    }


    #[test]
    fn test_unparseable_files_fall_back_to_file_name() {
        let dir = tempfile::tempdir().unwrap();
        fs::write( dir.path().join( "Broken Song.mp3" ), b"garbage bytes" ).unwrap();

        let songs = FileTagSource::new().load_songs_from_folder( dir.path(), &exts(), &CancelToken::new() );

        assert_eq!( songs.len(), 1 );
        assert_eq!( songs[ 0 ].title, "Broken Song" );
        assert_eq!( songs[ 0 ].artist, UNKNOWN_ARTIST );
        assert_eq!( songs[ 0 ].album, UNKNOWN_ALBUM );
        assert_eq!( songs[ 0 ].duration, Duration::ZERO );
    }


    #[test]
    fn test_empty_files_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        fs::write( dir.path().join( "empty.mp3" ), b"" ).unwrap();
        fs::write( dir.path().join( "full.mp3" ), b"x" ).unwrap();

        let source = FileTagSource::new();
        let songs = source.load_songs_from_folder( dir.path(), &exts(), &CancelToken::new() );

        assert_eq!( songs.len(), 1 );
        assert!( source.create_song_from_file( &dir.path().join( "empty.mp3" ) ).is_none() );
        assert!( source.create_song_from_file( &dir.path().join( "missing.mp3" ) ).is_none() );
    }


    #[test]
    fn test_cancelled_scan_returns_nothing() {
        let dir = tempfile::tempdir().unwrap();
        fs::write( dir.path().join( "a.mp3" ), b"x" ).unwrap();

        let cancel = CancelToken::new();
        cancel.cancel();

        assert!( FileTagSource::new().load_songs_from_folder( dir.path(), &exts(), &cancel ).is_empty() );
    }


    #[test]
    fn test_loads_playlists_recursively() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all( dir.path().join( "sub" ) ).unwrap();
        fs::write( dir.path().join( "sub/a.mp3" ), b"x" ).unwrap();
        fs::write( dir.path().join( "sub/mix.m3u" ), "a.mp3\n" ).unwrap();
        fs::write( dir.path().join( "dead.m3u8" ), "gone.mp3\n" ).unwrap();

        let playlists = FileTagSource::new().load_playlists_from_folder( dir.path(), &CancelToken::new() );

        assert_eq!( playlists.len(), 1 );
        assert_eq!( playlists[ 0 ].name, "mix" );
        assert_eq!( playlists[ 0 ].song_file_paths, vec![ dir.path().join( "sub/a.mp3" ) ] );
    }


    #[test]
    fn test_save_metadata_rejects_missing_file() {
        let result = FileTagSource::new().save_metadata( Path::new( "/nope.mp3" ), &SongMetadata::default() );
        assert!( matches!( result, Err( TagError::InvalidFile( _ ) ) ) );
    }
}
