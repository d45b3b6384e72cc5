//! Library configuration
//!
//! Library roots, supported extensions and timing windows, persisted as
//! JSON under the user's config directory.

use std::collections::HashSet;
use std::fs;
use std::path::{ Path, PathBuf };
use std::time::Duration;

use serde::{ Deserialize, Serialize };
use thiserror::Error;


/// Default audio file extensions.
const DEFAULT_EXTENSIONS: &[&str] = &[ "mp3", "flac", "m4a", "aac", "wav", "ogg" ];

const APP_DIR: &str = "cadence";


/// Errors that can occur while saving the configuration.
#[derive( Debug, Error )]
pub enum ConfigError {
    #[error( "IO error: {0}" )]
    Io( #[from] std::io::Error ),

    #[error( "Serialization error: {0}" )]
    Json( #[from] serde_json::Error ),

    #[error( "No config directory available" )]
    NoConfigDir,
}


/// Library settings, read-only from the indexer's perspective.
#[derive( Debug, Clone, PartialEq, Serialize, Deserialize )]
#[serde( default )]
pub struct LibraryConfig {
    /// Library root folders, in display order
    pub music_folders: Vec<PathBuf>,

    /// Audio file extensions, with or without the leading dot
    pub supported_extensions: Vec<String>,

    /// Run a full rescan on startup even if a cache exists
    pub scan_on_startup: bool,

    /// Quiet period before a debounced rebuild fires
    pub rebuild_debounce_ms: u64,

    /// Delay before a newly created file is reported as added
    pub created_delay_ms: u64,
}


impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            music_folders: Vec::new(),
            supported_extensions: DEFAULT_EXTENSIONS.iter().map( |e| e.to_string() ).collect(),
            scan_on_startup: true,
            rebuild_debounce_ms: 1000,
            created_delay_ms: 500,
        }
    }
}


impl LibraryConfig {
    /// Returns the default path of the config file.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map( |p| p.join( APP_DIR ).join( "config.json" ) )
    }


    /// Returns the default directory for the song cache and playlists.
    pub fn default_data_dir() -> Option<PathBuf> {
        dirs::data_local_dir().map( |p| p.join( APP_DIR ) )
    }


    /// Loads the config from the default location, or defaults if unavailable.
    pub fn load() -> Self {
        match Self::default_path() {
            Some( path ) => Self::load_from( &path ),
            None => Self::default(),
        }
    }


    /// Loads the config from `path`, or returns defaults if missing or corrupt.
    pub fn load_from( path: &Path ) -> Self {
        if !path.exists() {
            return Self::default();
        }

        match fs::read_to_string( path ) {
            Ok( contents ) => {
                serde_json::from_str( &contents ).unwrap_or_else( |e| {
                    tracing::warn!( "Ignoring malformed config {:?}: {}", path, e );
                    Self::default()
                })
            }
            Err( e ) => {
                tracing::warn!( "Failed to read config: {}", e );
                Self::default()
            }
        }
    }


    /// Saves the config to the default location.
    pub fn save( &self ) -> Result<(), ConfigError> {
        let path = Self::default_path().ok_or( ConfigError::NoConfigDir )?;
        self.save_to( &path )
    }


    /// Saves the config to `path`, creating parent directories as needed.
    pub fn save_to( &self, path: &Path ) -> Result<(), ConfigError> {
        if let Some( parent ) = path.parent() {
            fs::create_dir_all( parent )?;
        }

        let json = serde_json::to_string_pretty( self )?;
        fs::write( path, json )?;
        Ok(())
    }


    /// Adds a library root unless it is already configured.
    ///
    /// @returns true if the folder was added
    pub fn add_folder( &mut self, path: PathBuf ) -> bool {
        if self.music_folders.contains( &path ) {
            return false;
        }
        self.music_folders.push( path );
        true
    }


    /// Removes a library root.
    pub fn remove_folder( &mut self, path: &Path ) -> bool {
        let before = self.music_folders.len();
        self.music_folders.retain( |p| p != path );
        before != self.music_folders.len()
    }


    /// Normalized extension set (lowercase, no leading dot).
    pub fn extension_set( &self ) -> HashSet<String> {
        self.supported_extensions.iter().map( |e| normalize_extension( e ) ).collect()
    }


    /// Returns true if the file has a supported audio extension.
    pub fn is_supported( &self, path: &Path ) -> bool {
        has_extension( path, &self.extension_set() )
    }


    pub fn rebuild_debounce( &self ) -> Duration {
        Duration::from_millis( self.rebuild_debounce_ms )
    }


    pub fn created_delay( &self ) -> Duration {
        Duration::from_millis( self.created_delay_ms )
    }
}


/// Lowercases an extension and strips a leading dot.
pub fn normalize_extension( ext: &str ) -> String {
    ext.trim().trim_start_matches( '.' ).to_lowercase()
}


/// Checks a path's extension against a normalized extension set.
pub fn has_extension( path: &Path, extensions: &HashSet<String> ) -> bool {
    path.extension()
        .and_then( |e| e.to_str() )
        .map( |e| extensions.contains( &e.to_lowercase() ) )
        .unwrap_or( false )
}


#[cfg( test )]
mod tests {
    use super::*;


    #[test]
    fn test_extensions_accept_dot_and_case() {
        let config = LibraryConfig {
            supported_extensions: vec![ ".MP3".into(), "flac".into() ],
            ..LibraryConfig::default()
        };

        assert!( config.is_supported( Path::new( "/a/b.mp3" ) ) );
        assert!( config.is_supported( Path::new( "/a/b.FLAC" ) ) );
        assert!( !config.is_supported( Path::new( "/a/b.ogg" ) ) );
        assert!( !config.is_supported( Path::new( "/a/noext" ) ) );
    }


    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join( "nested" ).join( "config.json" );

        let mut config = LibraryConfig::default();
        config.add_folder( PathBuf::from( "/music" ) );
        config.scan_on_startup = false;
        config.save_to( &path ).unwrap();

        assert_eq!( LibraryConfig::load_from( &path ), config );
    }


    #[test]
    fn test_malformed_config_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join( "config.json" );
        fs::write( &path, "{ not json" ).unwrap();

        assert_eq!( LibraryConfig::load_from( &path ), LibraryConfig::default() );
    }


    #[test]
    fn test_partial_config_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join( "config.json" );
        fs::write( &path, r#"{ "music_folders": ["/m"] }"# ).unwrap();

        let config = LibraryConfig::load_from( &path );
        assert_eq!( config.music_folders, vec![ PathBuf::from( "/m" ) ] );
        assert_eq!( config.rebuild_debounce_ms, 1000 );
        assert_eq!( config.created_delay_ms, 500 );
    }


    #[test]
    fn test_add_folder_is_idempotent() {
        let mut config = LibraryConfig::default();
        assert!( config.add_folder( PathBuf::from( "/m" ) ) );
        assert!( !config.add_folder( PathBuf::from( "/m" ) ) );
        assert!( config.remove_folder( Path::new( "/m" ) ) );
        assert!( config.music_folders.is_empty() );
    }
}
