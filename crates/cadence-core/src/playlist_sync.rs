//! Reconciliation of file-backed playlists between scans.

use std::collections::{ HashMap, HashSet };

use crate::model::Playlist;


/// How much a scan pass is allowed to conclude.
#[derive( Debug, Clone, Copy, PartialEq, Eq )]
pub enum SyncMode {
    /// Exhaustive pass: playlists not found again are dropped.
    Full,
    /// Partial pass: only adds and updates.
    Incremental,
}


/// Merges newly discovered playlists into the tracked ones.
///
/// Playlists are matched on their file path (case-insensitive); entries
/// without one are ignored. A matched playlist keeps the existing record,
/// and therefore its id, with the found name and song list applied.
pub fn sync( existing: Vec<Playlist>, found: Vec<Playlist>, mode: SyncMode ) -> Vec<Playlist> {
    match mode {
        SyncMode::Full => full_sync( existing, found ),
        SyncMode::Incremental => incremental_sync( existing, found ),
    }
}


fn full_sync( existing: Vec<Playlist>, found: Vec<Playlist> ) -> Vec<Playlist> {
    let mut existing_by_key: HashMap<String, Playlist> = existing
        .into_iter()
        .filter_map( |p| p.file_key().map( |k| ( k, p ) ) )
        .collect();

    let mut seen = HashSet::new();
    let mut result = Vec::with_capacity( found.len() );

    for playlist in found {
        let Some( key ) = playlist.file_key() else {
            continue;
        };
        if !seen.insert( key.clone() ) {
            continue;
        }

        match existing_by_key.remove( &key ) {
            Some( mut current ) => {
                update_from( &mut current, playlist );
                result.push( current );
            }
            None => result.push( playlist ),
        }
    }

    result
}


fn incremental_sync( mut existing: Vec<Playlist>, found: Vec<Playlist> ) -> Vec<Playlist> {
    let mut index: HashMap<String, usize> = existing
        .iter()
        .enumerate()
        .filter_map( |( i, p )| p.file_key().map( |k| ( k, i ) ) )
        .collect();

    for playlist in found {
        let Some( key ) = playlist.file_key() else {
            continue;
        };

        match index.get( &key ) {
            Some( &i ) => update_from( &mut existing[ i ], playlist ),
            None => {
                index.insert( key, existing.len() );
                existing.push( playlist );
            }
        }
    }

    existing
}


fn update_from( target: &mut Playlist, source: Playlist ) {
    target.name = source.name;
    target.song_file_paths = source.song_file_paths;
}


#[cfg( test )]
mod tests {
    use std::path::PathBuf;

    use super::*;


    fn file_playlist( path: &str, name: &str, songs: &[&str] ) -> Playlist {
        Playlist::from_file(
            PathBuf::from( path ),
            name,
            songs.iter().map( PathBuf::from ).collect(),
        )
    }


    #[test]
    fn test_full_sync_keeps_identity_and_drops_missing() {
        let kept = file_playlist( "/m/a.m3u", "A", &[ "/m/1.mp3" ] );
        let dropped = file_playlist( "/m/b.m3u", "B", &[ "/m/2.mp3" ] );
        let kept_id = kept.id;

        let found = vec![
            file_playlist( "/M/A.m3u", "A renamed", &[ "/m/3.mp3" ] ),
            file_playlist( "/m/c.m3u", "C", &[ "/m/4.mp3" ] ),
        ];

        let result = sync( vec![ kept, dropped ], found, SyncMode::Full );

        assert_eq!( result.len(), 2 );
        assert_eq!( result[ 0 ].id, kept_id );
        assert_eq!( result[ 0 ].name, "A renamed" );
        assert_eq!( result[ 0 ].song_file_paths, vec![ PathBuf::from( "/m/3.mp3" ) ] );
        assert_eq!( result[ 1 ].name, "C" );
        assert!( result.iter().all( |p| p.name != "B" ) );
    }


    #[test]
    fn test_incremental_sync_never_removes() {
        let a = file_playlist( "/m/a.m3u", "A", &[ "/m/1.mp3" ] );
        let b = file_playlist( "/m/b.m3u", "B", &[ "/m/2.mp3" ] );
        let a_id = a.id;

        let found = vec![
            file_playlist( "/m/a.m3u", "A2", &[ "/m/9.mp3" ] ),
            file_playlist( "/m/c.m3u", "C", &[ "/m/4.mp3" ] ),
        ];

        let result = sync( vec![ a, b ], found, SyncMode::Incremental );

        let names: Vec<&str> = result.iter().map( |p| p.name.as_str() ).collect();
        assert_eq!( names, vec![ "A2", "B", "C" ] );
        assert_eq!( result[ 0 ].id, a_id );
    }


    #[test]
    fn test_playlists_without_file_path_are_ignored() {
        let manual = Playlist::manual( "Mine" );
        let result = sync( Vec::new(), vec![ manual ], SyncMode::Full );
        assert!( result.is_empty() );

        let result = sync( Vec::new(), vec![ Playlist::manual( "Mine" ) ], SyncMode::Incremental );
        assert!( result.is_empty() );
    }


    #[test]
    fn test_full_sync_with_nothing_found_clears() {
        let existing = vec![ file_playlist( "/m/a.m3u", "A", &[ "/m/1.mp3" ] ) ];
        assert!( sync( existing, Vec::new(), SyncMode::Full ).is_empty() );
    }
}
