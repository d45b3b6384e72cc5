//! Library data model
//!
//! Songs, derived aggregates, folder nodes and playlists shared by every
//! other module of the crate.

use std::path::{ Path, PathBuf };
use std::time::Duration;

use serde::{ Deserialize, Serialize };
use uuid::Uuid;


/// Reserved scheme for songs that do not live on the filesystem (demo data).
pub const VIRTUAL_SCHEME: &str = "demo://";

/// Placeholder artist for files without a readable artist tag.
pub const UNKNOWN_ARTIST: &str = "Unknown Artist";

/// Placeholder album for files without a readable album tag.
pub const UNKNOWN_ALBUM: &str = "Unknown Album";


/// A single indexed track.
#[derive( Debug, Clone, PartialEq, Serialize, Deserialize )]
pub struct Song {
    #[serde( rename = "path" )]
    pub file_path: PathBuf,
    pub title: String,
    pub artist: String,
    pub album: String,
    #[serde( rename = "duration_secs", with = "duration_secs" )]
    pub duration: Duration,
    pub has_art: bool,
}


impl Song {
    /// Creates a song from its file name alone.
    ///
    /// Used when tags cannot be read: the title is the file stem, artist and
    /// album fall back to the unknown placeholders and the duration is zero.
    pub fn from_path( path: impl Into<PathBuf> ) -> Self {
        let file_path = path.into();
        let title = file_stem( &file_path );

        Self {
            file_path,
            title,
            artist: UNKNOWN_ARTIST.to_string(),
            album: UNKNOWN_ALBUM.to_string(),
            duration: Duration::ZERO,
            has_art: false,
        }
    }


    /// Case-insensitive identity key of this song.
    pub fn key( &self ) -> String {
        path_key( &self.file_path )
    }


    /// Returns true if the song lives on the reserved virtual scheme.
    pub fn is_virtual( &self ) -> bool {
        is_virtual_path( &self.file_path )
    }


    /// Formats the duration as `m:ss`.
    pub fn duration_string( &self ) -> String {
        let secs = self.duration.as_secs();
        format!( "{}:{:02}", secs / 60, secs % 60 )
    }
}


/// Editable tag fields of a file.
#[derive( Debug, Clone, Default, PartialEq, Eq )]
pub struct SongMetadata {
    pub title: String,
    pub artist: String,
    pub album: String,
    pub album_artist: String,
    pub genre: String,
    pub year: u32,
    pub track: u32,
    pub disc: u32,
}


/// Songs grouped by `(album, artist)`.
#[derive( Debug, Clone, PartialEq, Eq )]
pub struct AlbumGroup {
    pub title: String,
    pub artist: String,
    pub song_count: usize,
    pub representative_file_path: Option<PathBuf>,
}


/// Songs grouped by artist.
#[derive( Debug, Clone, PartialEq, Eq )]
pub struct ArtistGroup {
    pub name: String,
    pub album_count: usize,
    pub song_count: usize,
    pub representative_file_path: Option<PathBuf>,
}


/// A directory in the folder view.
#[derive( Debug, Clone, PartialEq )]
pub struct FolderNode {
    pub name: String,
    pub path: PathBuf,
    pub children: Vec<FolderNode>,
    pub songs: Vec<Song>,
}


impl FolderNode {
    pub fn new( name: impl Into<String>, path: impl Into<PathBuf> ) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            children: Vec::new(),
            songs: Vec::new(),
        }
    }


    /// Number of songs in this node and all of its descendants.
    pub fn total_songs( &self ) -> usize {
        self.songs.len() + self.children.iter().map( FolderNode::total_songs ).sum::<usize>()
    }
}


/// Where a playlist comes from.
#[derive( Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize )]
#[serde( rename_all = "lowercase" )]
pub enum PlaylistKind {
    #[default]
    Manual,
    File,
}


/// A named, ordered list of song paths.
///
/// Manual playlists are identified by `id`, file-backed ones by `file_path`.
#[derive( Debug, Clone, PartialEq, Serialize, Deserialize )]
pub struct Playlist {
    pub id: Uuid,
    pub name: String,
    pub song_file_paths: Vec<PathBuf>,
    #[serde( default )]
    pub kind: PlaylistKind,
    #[serde( skip )]
    pub file_path: Option<PathBuf>,
}


impl Playlist {
    /// Creates an empty manual playlist with a fresh id.
    pub fn manual( name: impl Into<String> ) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            song_file_paths: Vec::new(),
            kind: PlaylistKind::Manual,
            file_path: None,
        }
    }


    /// Creates a playlist backed by a playlist file on disk.
    pub fn from_file( file_path: PathBuf, name: impl Into<String>, songs: Vec<PathBuf> ) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            song_file_paths: songs,
            kind: PlaylistKind::File,
            file_path: Some( file_path ),
        }
    }


    /// Sync identity of a file-backed playlist, if it has one.
    pub fn file_key( &self ) -> Option<String> {
        self.file_path.as_deref().map( path_key )
    }
}


/// Songs and playlists found by one scan pass.
#[derive( Debug, Clone, Default )]
pub struct ScanResult {
    pub songs: Vec<Song>,
    pub playlists: Vec<Playlist>,
}


impl ScanResult {
    pub fn extend( &mut self, other: ScanResult ) {
        self.songs.extend( other.songs );
        self.playlists.extend( other.playlists );
    }
}


/// Case-insensitive comparison key for a path.
pub fn path_key( path: &Path ) -> String {
    path.to_string_lossy().to_lowercase()
}


/// Returns true if the path uses the reserved virtual scheme.
pub fn is_virtual_path( path: &Path ) -> bool {
    path.to_string_lossy()
        .get( ..VIRTUAL_SCHEME.len() )
        .map( |prefix| prefix.eq_ignore_ascii_case( VIRTUAL_SCHEME ) )
        .unwrap_or( false )
}


/// File name without extension, or the whole path if it has none.
pub fn file_stem( path: &Path ) -> String {
    path.file_stem()
        .map( |s| s.to_string_lossy().into_owned() )
        .unwrap_or_else( || path.to_string_lossy().into_owned() )
}


mod duration_secs {
    use std::time::Duration;

    use serde::{ Deserialize, Deserializer, Serializer };


    pub fn serialize<S: Serializer>( duration: &Duration, serializer: S ) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64( duration.as_secs_f64() )
    }


    pub fn deserialize<'de, D: Deserializer<'de>>( deserializer: D ) -> Result<Duration, D::Error> {
        let secs = f64::deserialize( deserializer )?;
        Ok( Duration::try_from_secs_f64( secs ).unwrap_or( Duration::ZERO ) )
    }
}


#[cfg( test )]
mod tests {
    use super::*;


    #[test]
    fn test_from_path_uses_file_stem() {
        let song = Song::from_path( "/music/Some Band/01 - Intro.flac" );
        assert_eq!( song.title, "01 - Intro" );
        assert_eq!( song.artist, UNKNOWN_ARTIST );
        assert_eq!( song.album, UNKNOWN_ALBUM );
        assert_eq!( song.duration, Duration::ZERO );
        assert!( !song.has_art );
    }


    #[test]
    fn test_virtual_path_detection() {
        assert!( is_virtual_path( Path::new( "demo://Artist/Album/Song.mp3" ) ) );
        assert!( is_virtual_path( Path::new( "DEMO://x" ) ) );
        assert!( !is_virtual_path( Path::new( "/home/demo/song.mp3" ) ) );
        assert!( !is_virtual_path( Path::new( "demo" ) ) );
    }


    #[test]
    fn test_path_key_ignores_case() {
        assert_eq!( path_key( Path::new( "/Music/A.mp3" ) ), path_key( Path::new( "/music/a.MP3" ) ) );
    }


    #[test]
    fn test_duration_string() {
        let mut song = Song::from_path( "a.mp3" );
        song.duration = Duration::from_secs( 125 );
        assert_eq!( song.duration_string(), "2:05" );
    }


    #[test]
    fn test_song_json_uses_seconds() {
        let mut song = Song::from_path( "/m/a.mp3" );
        song.duration = Duration::from_millis( 1500 );
        let json = serde_json::to_string( &song ).unwrap();
        assert!( json.contains( "\"duration_secs\":1.5" ) );
        assert!( json.contains( "\"path\":\"/m/a.mp3\"" ) );
    }
}
