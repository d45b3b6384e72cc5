//! Safe recursive file enumeration.

use std::collections::HashSet;
use std::path::{ Path, PathBuf };

use walkdir::WalkDir;

use crate::cancel::CancelToken;
use crate::config::has_extension;


/// Recursively lists files under `root` whose extension is in `extensions`.
///
/// Directories that cannot be read (permission denied, transient I/O) are
/// skipped and the walk continues into their siblings. A missing root yields
/// an empty list. Enumeration stops early once `cancel` is set.
pub fn files_with_extensions(
    root: &Path,
    extensions: &HashSet<String>,
    cancel: &CancelToken,
) -> Vec<PathBuf> {
    if !root.is_dir() {
        tracing::debug!( "Skipping missing folder: {:?}", root );
        return Vec::new();
    }

    let mut files = Vec::new();

    for entry in WalkDir::new( root ).follow_links( true ) {
        if cancel.is_cancelled() {
            break;
        }

        let entry = match entry {
            Ok( e ) => e,
            Err( e ) => {
                tracing::warn!( "Skipping inaccessible path under {:?}: {}", root, e );
                continue;
            }
        };

        if entry.file_type().is_file() && has_extension( entry.path(), extensions ) {
            files.push( entry.into_path() );
        }
    }

    files
}


#[cfg( test )]
mod tests {
    use std::fs;

    use super::*;


    fn exts( list: &[&str] ) -> HashSet<String> {
        list.iter().map( |e| e.to_string() ).collect()
    }


    #[test]
    fn test_finds_nested_matching_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all( dir.path().join( "a/b" ) ).unwrap();
        fs::write( dir.path().join( "one.mp3" ), b"x" ).unwrap();
        fs::write( dir.path().join( "a/b/two.FLAC" ), b"x" ).unwrap();
        fs::write( dir.path().join( "a/cover.jpg" ), b"x" ).unwrap();

        let mut found = files_with_extensions( dir.path(), &exts( &[ "mp3", "flac" ] ), &CancelToken::new() );
        found.sort();

        assert_eq!( found, vec![
            dir.path().join( "a/b/two.FLAC" ),
            dir.path().join( "one.mp3" ),
        ]);
    }


    #[test]
    fn test_missing_root_is_empty() {
        let found = files_with_extensions(
            Path::new( "/definitely/not/here" ),
            &exts( &[ "mp3" ] ),
            &CancelToken::new(),
        );
        assert!( found.is_empty() );
    }


    #[test]
    fn test_cancelled_walk_stops() {
        let dir = tempfile::tempdir().unwrap();
        fs::write( dir.path().join( "one.mp3" ), b"x" ).unwrap();

        let cancel = CancelToken::new();
        cancel.cancel();
        assert!( files_with_extensions( dir.path(), &exts( &[ "mp3" ] ), &cancel ).is_empty() );
    }
}
