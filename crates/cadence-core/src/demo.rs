//! Deterministic demo library on the virtual `demo://` scheme.

use std::path::PathBuf;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{ Rng, SeedableRng };

use crate::model::{ Playlist, Song, VIRTUAL_SCHEME };


pub const DEFAULT_SONG_COUNT: usize = 100;

const SEED: u64 = 42;
const UNIQUE_TITLE_THRESHOLD: usize = 20;
const DURATION_SECS: std::ops::Range<u64> = 180..400;
const PLAYLIST_SIZE: std::ops::Range<usize> = 10..20;

const ARTISTS: &[( &str, &[&str] )] = &[
    ( "The Midnight", &[ "Endless Summer", "Nocturnal", "Monsters" ] ),
    ( "Daft Punk", &[ "Discovery", "Random Access Memories", "Homework" ] ),
    ( "Pink Floyd", &[ "The Dark Side of the Moon", "The Wall", "Animals" ] ),
    ( "Kendrick Lamar", &[ "DAMN.", "To Pimp a Butterfly", "good kid, m.A.A.d city" ] ),
    ( "Tame Impala", &[ "Currents", "The Slow Rush", "Innerspeaker" ] ),
    ( "Hans Zimmer", &[ "Inception", "Interstellar", "Dune" ] ),
    ( "Norah Jones", &[ "Come Away With Me", "Feels Like Home", "Day Breaks" ] ),
    ( "Foo Fighters", &[ "The Colour and the Shape", "Wasting Light", "Echoes, Silence, Patience & Grace" ] ),
];

const TITLES: &[&str] = &[
    "Midnight City", "Sunset Drive", "Neon Lights", "Deep Space", "Lost in Time",
    "Echoes of Yesterday", "Future Club", "Digital Love", "Harder Better Faster",
    "Time", "Money", "Us and Them", "DNA", "Humble", "Let It Happen", "The Less I Know",
    "Dreaming", "Sunrise", "Don't Know Why", "Everlong", "My Hero", "Walk",
];

const PLAYLIST_NAMES: &[&str] = &[ "Late Night Drive", "Coding Focus", "Workout", "Chill Vibes", "Favorites" ];


/// Generates `count` demo songs, sorted by artist, album and title.
///
/// The same count always yields the same songs.
pub fn generate_songs( count: usize ) -> Vec<Song> {
    let mut rng = StdRng::seed_from_u64( SEED );

    let mut songs: Vec<Song> = ( 0..count )
        .map( |i| {
            let ( artist, albums ) = ARTISTS[ rng.gen_range( 0..ARTISTS.len() ) ];
            let album = albums[ rng.gen_range( 0..albums.len() ) ];
            let base = TITLES[ rng.gen_range( 0..TITLES.len() ) ];
            let title = if i > UNIQUE_TITLE_THRESHOLD { format!( "{} {}", base, i ) } else { base.to_string() };

            Song {
                file_path: PathBuf::from( format!( "{}{}/{}/{}.mp3", VIRTUAL_SCHEME, artist, album, title ) ),
                title,
                artist: artist.to_string(),
                album: album.to_string(),
                duration: Duration::from_secs( rng.gen_range( DURATION_SECS ) ),
                has_art: true,
            }
        })
        .collect();

    songs.sort_by( |a, b| {
        a.artist.cmp( &b.artist )
            .then_with( || a.album.cmp( &b.album ) )
            .then_with( || a.title.cmp( &b.title ) )
    });
    songs
}


/// Builds the demo playlists from a set of demo songs.
pub fn generate_playlists( songs: &[Song] ) -> Vec<Playlist> {
    let mut rng = StdRng::seed_from_u64( SEED );

    PLAYLIST_NAMES
        .iter()
        .map( |name| {
            let size = rng.gen_range( PLAYLIST_SIZE ).min( songs.len() );
            let mut playlist = Playlist::manual( *name );
            playlist.song_file_paths = songs
                .choose_multiple( &mut rng, size )
                .map( |s| s.file_path.clone() )
                .collect();
            playlist
        })
        .collect()
}


#[cfg( test )]
mod tests {
    use super::*;


    #[test]
    fn test_songs_are_deterministic_and_virtual() {
        let first = generate_songs( 50 );
        let second = generate_songs( 50 );

        assert_eq!( first, second );
        assert_eq!( first.len(), 50 );
        assert!( first.iter().all( |s| s.is_virtual() && s.has_art ) );
        assert!( first.iter().all( |s| ( 180..400 ).contains( &s.duration.as_secs() ) ) );
    }


    #[test]
    fn test_songs_sorted_by_artist() {
        let songs = generate_songs( 30 );
        assert!( songs.windows( 2 ).all( |w| w[ 0 ].artist <= w[ 1 ].artist ) );
    }


    #[test]
    fn test_playlists_reference_demo_songs() {
        let songs = generate_songs( 100 );
        let playlists = generate_playlists( &songs );

        assert_eq!( playlists.len(), 5 );
        for playlist in &playlists {
            assert!( ( 10..20 ).contains( &playlist.song_file_paths.len() ) );
            assert!( playlist.song_file_paths.iter().all( |p| songs.iter().any( |s| &s.file_path == p ) ) );
        }
    }
}
