//! M3U / M3U8 playlist files.

use std::fs;
use std::path::{ Path, PathBuf };

use path_absolutize::Absolutize;

use crate::model::{ file_stem, Playlist };

use super::TagError;


/// Playlist file extensions discovered during scans.
pub const PLAYLIST_EXTENSIONS: &[&str] = &[ "m3u", "m3u8" ];


/// Reads a playlist file into a file-backed [`Playlist`].
///
/// Blank lines and `#` directives are skipped, relative entries are resolved
/// against the playlist's directory and entries that do not exist are
/// dropped.
///
/// @returns `Ok(None)` if no entry resolved to an existing file
pub fn read_playlist( path: &Path ) -> Result<Option<Playlist>, TagError> {
    let bytes = fs::read( path )?;
    let contents = String::from_utf8_lossy( &bytes );
    let dir = path.parent().unwrap_or( Path::new( "" ) );

    let songs: Vec<PathBuf> = contents
        .lines()
        .map( |line| line.trim().trim_start_matches( '\u{feff}' ) )
        .filter( |line| !line.is_empty() && !line.starts_with( '#' ) )
        .filter_map( |entry| resolve_entry( dir, entry ) )
        .filter( |resolved| resolved.is_file() )
        .collect();

    if songs.is_empty() {
        tracing::debug!( "Discarding empty playlist {:?}", path );
        return Ok( None );
    }

    Ok( Some( Playlist::from_file( path.to_path_buf(), file_stem( path ), songs ) ) )
}


/// Resolves one playlist entry against the playlist's directory.
fn resolve_entry( dir: &Path, entry: &str ) -> Option<PathBuf> {
    Path::new( entry )
        .absolutize_from( dir )
        .ok()
        .map( |p| p.into_owned() )
}


#[cfg( test )]
mod tests {
    use super::*;
    use crate::model::PlaylistKind;


    #[test]
    fn test_reads_relative_and_absolute_entries() {
        let dir = tempfile::tempdir().unwrap();
        let music = dir.path().join( "music" );
        fs::create_dir_all( &music ).unwrap();
        fs::write( music.join( "a.mp3" ), b"x" ).unwrap();
        fs::write( music.join( "b.mp3" ), b"x" ).unwrap();

        let list = dir.path().join( "lists" );
        fs::create_dir_all( &list ).unwrap();
        let playlist_path = list.join( "Road Trip.m3u8" );
        let contents = format!(
            "#EXTM3U\n\n#EXTINF:123,Artist - A\n../music/a.mp3\n{}\nmissing.mp3\n",
            music.join( "b.mp3" ).display()
        );
        fs::write( &playlist_path, contents ).unwrap();

        let playlist = read_playlist( &playlist_path ).unwrap().unwrap();
        assert_eq!( playlist.name, "Road Trip" );
        assert_eq!( playlist.kind, PlaylistKind::File );
        assert_eq!( playlist.file_path.as_deref(), Some( playlist_path.as_path() ) );
        assert_eq!( playlist.song_file_paths, vec![ music.join( "a.mp3" ), music.join( "b.mp3" ) ] );
    }


    #[test]
    fn test_playlist_without_existing_entries_is_discarded() {
        let dir = tempfile::tempdir().unwrap();
        let playlist_path = dir.path().join( "empty.m3u" );
        fs::write( &playlist_path, "#EXTM3U\nnope.mp3\n\n" ).unwrap();

        assert!( read_playlist( &playlist_path ).unwrap().is_none() );
    }


    #[test]
    fn test_unreadable_playlist_is_error() {
        assert!( read_playlist( Path::new( "/definitely/not/here.m3u" ) ).is_err() );
    }
}
