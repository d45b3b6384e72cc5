//! Folder hierarchy built from song paths.

use std::cmp::Ordering;
use std::ffi::OsStr;
use std::path::{ Component, Path, PathBuf };

use crate::model::{ FolderNode, Song };


/// Rebuilds the folder view, one root node per configured library folder.
#[derive( Debug, Clone, Default )]
pub struct FolderTreeBuilder {
    roots: Vec<PathBuf>,
}


impl FolderTreeBuilder {
    pub fn new( roots: Vec<PathBuf> ) -> Self {
        Self { roots }
    }


    /// Builds the tree for `songs`.
    ///
    /// Roots that do not exist on disk are omitted. Virtual songs and songs
    /// outside every root are left out of the tree. Children and songs are
    /// sorted case-insensitively at every level.
    pub fn build( &self, songs: &[Song] ) -> Vec<FolderNode> {
        let mut roots: Vec<FolderNode> = self.roots
            .iter()
            .filter( |root| root.is_dir() )
            .map( |root| FolderNode::new( display_name( root ), root.clone() ) )
            .collect();

        if roots.is_empty() {
            return roots;
        }

        for song in songs.iter().filter( |s| !s.is_virtual() ) {
            let Some( dir ) = song.file_path.parent().filter( |d| !d.as_os_str().is_empty() ) else {
                continue;
            };

            let Some(( root_index, segments )) = roots
                .iter()
                .enumerate()
                .find_map( |( i, root )| relative_segments( dir, &root.path ).map( |s| ( i, s ) ) )
            else {
                continue;
            };

            let mut node = &mut roots[ root_index ];
            for segment in &segments {
                node = child_mut( node, segment );
            }
            node.songs.push( song.clone() );
        }

        for root in &mut roots {
            sort_node( root );
        }
        roots.sort_by( |a, b| cmp_ignore_case( &a.name, &b.name ) );
        roots
    }
}


/// Finds or creates the child named `segment` (case-insensitive).
fn child_mut<'a>( parent: &'a mut FolderNode, segment: &str ) -> &'a mut FolderNode {
    let position = parent.children
        .iter()
        .position( |c| c.name.to_lowercase() == segment.to_lowercase() );

    let index = match position {
        Some( i ) => i,
        None => {
            let path = parent.path.join( segment );
            parent.children.push( FolderNode::new( segment, path ) );
            parent.children.len() - 1
        }
    };

    &mut parent.children[ index ]
}


fn sort_node( node: &mut FolderNode ) {
    node.children.sort_by( |a, b| cmp_ignore_case( &a.name, &b.name ) );
    node.songs.sort_by( |a, b| cmp_ignore_case( &a.title, &b.title ) );
    for child in &mut node.children {
        sort_node( child );
    }
}


/// Returns the segments of `dir` below `root`, comparing case-insensitively,
/// or `None` if `dir` is not inside `root`.
fn relative_segments( dir: &Path, root: &Path ) -> Option<Vec<String>> {
    let mut dir_components = dir.components();

    for root_component in root.components() {
        if matches!( root_component, Component::CurDir ) {
            continue;
        }
        let dir_component = dir_components.next()?;
        if !eq_ignore_case( root_component.as_os_str(), dir_component.as_os_str() ) {
            return None;
        }
    }

    // `..` or a prefix below the root would escape it.
    dir_components
        .map( |c| match c {
            Component::Normal( name ) => Some( name.to_string_lossy().into_owned() ),
            _ => None,
        })
        .collect()
}


fn display_name( path: &Path ) -> String {
    path.file_name()
        .map( |n| n.to_string_lossy().into_owned() )
        .unwrap_or_else( || path.display().to_string() )
}


fn eq_ignore_case( a: &OsStr, b: &OsStr ) -> bool {
    a.to_string_lossy().to_lowercase() == b.to_string_lossy().to_lowercase()
}


/// Case-insensitive ordering used by every sorted view.
pub fn cmp_ignore_case( a: &str, b: &str ) -> Ordering {
    a.to_lowercase().cmp( &b.to_lowercase() )
}


#[cfg( test )]
mod tests {
    use std::fs;

    use super::*;


    fn song_at( path: &Path, title: &str ) -> Song {
        let mut song = Song::from_path( path );
        song.title = title.to_string();
        song
    }


    #[test]
    fn test_builds_nested_sorted_tree() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join( "Music" );
        fs::create_dir_all( &root ).unwrap();

        let songs = vec![
            song_at( &root.join( "rock/Zeppelin/b.mp3" ), "b" ),
            song_at( &root.join( "rock/Zeppelin/a.mp3" ), "A" ),
            song_at( &root.join( "Jazz/c.mp3" ), "c" ),
            song_at( &root.join( "top.mp3" ), "top" ),
        ];

        let roots = FolderTreeBuilder::new( vec![ root.clone() ] ).build( &songs );
        assert_eq!( roots.len(), 1 );

        let music = &roots[ 0 ];
        assert_eq!( music.name, "Music" );
        assert_eq!( music.songs.len(), 1 );
        assert_eq!( music.total_songs(), 4 );

        let names: Vec<&str> = music.children.iter().map( |c| c.name.as_str() ).collect();
        assert_eq!( names, vec![ "Jazz", "rock" ] );

        let zeppelin = &music.children[ 1 ].children[ 0 ];
        assert_eq!( zeppelin.path, root.join( "rock" ).join( "Zeppelin" ) );
        let titles: Vec<&str> = zeppelin.songs.iter().map( |s| s.title.as_str() ).collect();
        assert_eq!( titles, vec![ "A", "b" ] );
    }


    #[test]
    fn test_songs_outside_roots_and_virtual_songs_are_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join( "music" );
        fs::create_dir_all( &root ).unwrap();

        let songs = vec![
            song_at( &root.join( "a.mp3" ), "a" ),
            song_at( &dir.path().join( "music2/b.mp3" ), "b" ),
            song_at( Path::new( "demo://Artist/Album/c.mp3" ), "c" ),
        ];

        let roots = FolderTreeBuilder::new( vec![ root ] ).build( &songs );
        assert_eq!( roots[ 0 ].total_songs(), 1 );
    }


    #[test]
    fn test_parent_components_do_not_match_root() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join( "music" );
        fs::create_dir_all( &root ).unwrap();

        let escaping = root.join( ".." ).join( "other" ).join( "x.mp3" );
        let roots = FolderTreeBuilder::new( vec![ root.clone() ] ).build( &[
            song_at( &escaping, "x" ),
            song_at( &root.join( "a.mp3" ), "a" ),
        ]);

        assert_eq!( roots[ 0 ].total_songs(), 1 );
        assert!( roots[ 0 ].children.is_empty() );
        assert_eq!( roots[ 0 ].songs[ 0 ].title, "a" );
    }


    #[test]
    fn test_missing_roots_are_omitted() {
        let dir = tempfile::tempdir().unwrap();
        let present = dir.path().join( "b" );
        fs::create_dir_all( &present ).unwrap();

        let builder = FolderTreeBuilder::new( vec![ dir.path().join( "missing" ), present ] );
        let roots = builder.build( &[] );

        assert_eq!( roots.len(), 1 );
        assert_eq!( roots[ 0 ].name, "b" );
    }


    #[test]
    fn test_root_match_ignores_case() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join( "Music" );
        fs::create_dir_all( &root ).unwrap();

        let song_path = dir.path().join( "MUSIC" ).join( "Sub" ).join( "a.mp3" );
        let roots = FolderTreeBuilder::new( vec![ root ] ).build( &[ song_at( &song_path, "a" ) ] );

        assert_eq!( roots[ 0 ].children.len(), 1 );
        assert_eq!( roots[ 0 ].children[ 0 ].songs.len(), 1 );
    }


    #[test]
    fn test_roots_sorted_by_name() {
        let dir = tempfile::tempdir().unwrap();
        for name in [ "zed", "Alpha" ] {
            fs::create_dir_all( dir.path().join( name ) ).unwrap();
        }

        let builder = FolderTreeBuilder::new( vec![ dir.path().join( "zed" ), dir.path().join( "Alpha" ) ] );
        let names: Vec<String> = builder.build( &[] ).into_iter().map( |n| n.name ).collect();

        assert_eq!( names, vec![ "Alpha", "zed" ] );
    }
}
