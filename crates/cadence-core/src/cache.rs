//! On-disk song cache
//!
//! A flat JSON list of songs, overwritten wholesale after every rebuild and
//! read once at startup.

use std::fs;
use std::path::{ Path, PathBuf };

use thiserror::Error;

use crate::model::Song;


const CACHE_FILE: &str = "library_cache.json";


/// Errors that can occur while writing the cache.
#[derive( Debug, Error )]
pub enum CacheError {
    #[error( "IO error: {0}" )]
    Io( #[from] std::io::Error ),

    #[error( "Serialization error: {0}" )]
    Json( #[from] serde_json::Error ),
}


/// Song cache stored under the application data directory.
#[derive( Debug, Clone )]
pub struct LibraryCache {
    path: PathBuf,
}


impl LibraryCache {
    /// Creates a cache stored in `dir`.
    pub fn new( dir: impl AsRef<Path> ) -> Self {
        Self {
            path: dir.as_ref().join( CACHE_FILE ),
        }
    }


    pub fn path( &self ) -> &Path {
        &self.path
    }


    /// Reads the cached songs.
    ///
    /// A missing, unreadable or corrupt cache is treated as empty.
    pub fn load( &self ) -> Vec<Song> {
        if !self.path.exists() {
            return Vec::new();
        }

        let contents = match fs::read_to_string( &self.path ) {
            Ok( contents ) => contents,
            Err( e ) => {
                tracing::warn!( "Failed to read cache {:?}: {}", self.path, e );
                return Vec::new();
            }
        };

        match serde_json::from_str::<Vec<Song>>( &contents ) {
            Ok( songs ) => {
                tracing::debug!( "Loaded {} songs from cache", songs.len() );
                songs
            }
            Err( e ) => {
                tracing::warn!( "Ignoring corrupt cache {:?}: {}", self.path, e );
                Vec::new()
            }
        }
    }


    /// Replaces the cache with `songs`.
    pub fn save( &self, songs: &[Song] ) -> Result<(), CacheError> {
        if let Some( parent ) = self.path.parent() {
            fs::create_dir_all( parent )?;
        }

        let json = serde_json::to_string( songs )?;
        fs::write( &self.path, json )?;
        Ok(())
    }
}


#[cfg( test )]
mod tests {
    use std::time::Duration;

    use super::*;


    #[test]
    fn test_missing_cache_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!( LibraryCache::new( dir.path() ).load().is_empty() );
    }


    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let cache = LibraryCache::new( dir.path().join( "data" ) );

        let mut song = Song::from_path( "/m/a.mp3" );
        song.duration = Duration::from_secs( 200 );
        song.has_art = true;

        cache.save( &[ song.clone() ] ).unwrap();
        assert_eq!( cache.load(), vec![ song ] );
    }


    #[test]
    fn test_corrupt_cache_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let cache = LibraryCache::new( dir.path() );
        fs::write( cache.path(), "[{ broken" ).unwrap();

        assert!( cache.load().is_empty() );
    }
}
