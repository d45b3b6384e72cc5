//! Album and artist aggregation.

use std::collections::{ HashMap, HashSet };

use crate::model::{ AlbumGroup, ArtistGroup, Song };


/// Groups a song snapshot into albums and artists.
///
/// Albums are keyed by `(album, artist)` so same-named albums by different
/// artists stay separate. Within a group the representative file is the
/// first song with art, else the first song in snapshot order. Both lists
/// are sorted by their display name (case-sensitive).
pub fn aggregate( songs: &[Song] ) -> ( Vec<AlbumGroup>, Vec<ArtistGroup> ) {
    ( group_albums( songs ), group_artists( songs ) )
}


fn group_albums( songs: &[Song] ) -> Vec<AlbumGroup> {
    let mut albums: Vec<AlbumGroup> = Vec::new();
    let mut art_found: Vec<bool> = Vec::new();
    let mut index: HashMap<( &str, &str ), usize> = HashMap::new();

    for song in songs {
        let slot = *index.entry(( song.album.as_str(), song.artist.as_str() )).or_insert_with( || {
            albums.push( AlbumGroup {
                title: song.album.clone(),
                artist: song.artist.clone(),
                song_count: 0,
                representative_file_path: Some( song.file_path.clone() ),
            });
            art_found.push( false );
            albums.len() - 1
        });

        let album = &mut albums[ slot ];
        album.song_count += 1;
        if song.has_art && !art_found[ slot ] {
            album.representative_file_path = Some( song.file_path.clone() );
            art_found[ slot ] = true;
        }
    }

    albums.sort_by( |a, b| a.title.cmp( &b.title ) );
    albums
}


fn group_artists( songs: &[Song] ) -> Vec<ArtistGroup> {
    struct Acc<'a> {
        group: ArtistGroup,
        albums: HashSet<&'a str>,
        has_art: bool,
    }

    let mut artists: Vec<Acc> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();

    for song in songs {
        let slot = *index.entry( song.artist.as_str() ).or_insert_with( || {
            artists.push( Acc {
                group: ArtistGroup {
                    name: song.artist.clone(),
                    album_count: 0,
                    song_count: 0,
                    representative_file_path: Some( song.file_path.clone() ),
                },
                albums: HashSet::new(),
                has_art: false,
            });
            artists.len() - 1
        });

        let acc = &mut artists[ slot ];
        acc.group.song_count += 1;
        acc.albums.insert( song.album.as_str() );
        if song.has_art && !acc.has_art {
            acc.group.representative_file_path = Some( song.file_path.clone() );
            acc.has_art = true;
        }
    }

    let mut groups: Vec<ArtistGroup> = artists
        .into_iter()
        .map( |acc| ArtistGroup { album_count: acc.albums.len(), ..acc.group } )
        .collect();

    groups.sort_by( |a, b| a.name.cmp( &b.name ) );
    groups
}


#[cfg( test )]
mod tests {
    use std::path::PathBuf;

    use super::*;


    fn song( path: &str, artist: &str, album: &str, has_art: bool ) -> Song {
        let mut song = Song::from_path( path );
        song.artist = artist.to_string();
        song.album = album.to_string();
        song.has_art = has_art;
        song
    }


    fn sample() -> Vec<Song> {
        vec![
            song( "1.mp3", "Artist A", "Album 1", false ),
            song( "2.mp3", "Artist A", "Album 1", true ),
            song( "3.mp3", "Artist A", "Album 2", false ),
            song( "4.mp3", "Artist B", "Album 1", false ),
            song( "5.mp3", "Artist C", "Single", false ),
        ]
    }


    #[test]
    fn test_album_and_artist_counts() {
        let ( albums, artists ) = aggregate( &sample() );

        assert_eq!( albums.len(), 4 );
        assert_eq!( artists.len(), 3 );

        let artist_a = artists.iter().find( |a| a.name == "Artist A" ).unwrap();
        assert_eq!( artist_a.song_count, 3 );
        assert_eq!( artist_a.album_count, 2 );

        let album_1_a = albums.iter().find( |a| a.title == "Album 1" && a.artist == "Artist A" ).unwrap();
        assert_eq!( album_1_a.song_count, 2 );
    }


    #[test]
    fn test_counts_are_conserved() {
        let songs = sample();
        let ( albums, artists ) = aggregate( &songs );

        assert_eq!( albums.iter().map( |a| a.song_count ).sum::<usize>(), songs.len() );
        assert_eq!( artists.iter().map( |a| a.song_count ).sum::<usize>(), songs.len() );
    }


    #[test]
    fn test_representative_prefers_art() {
        let ( albums, artists ) = aggregate( &sample() );

        let album_1_a = albums.iter().find( |a| a.title == "Album 1" && a.artist == "Artist A" ).unwrap();
        assert_eq!( album_1_a.representative_file_path, Some( PathBuf::from( "2.mp3" ) ) );

        let artist_b = artists.iter().find( |a| a.name == "Artist B" ).unwrap();
        assert_eq!( artist_b.representative_file_path, Some( PathBuf::from( "4.mp3" ) ) );
    }


    #[test]
    fn test_sorted_case_sensitive() {
        let songs = vec![
            song( "1.mp3", "beta", "zeta", false ),
            song( "2.mp3", "Alpha", "Zeta", false ),
            song( "3.mp3", "Gamma", "alpha", false ),
        ];
        let ( albums, artists ) = aggregate( &songs );

        let album_titles: Vec<&str> = albums.iter().map( |a| a.title.as_str() ).collect();
        assert_eq!( album_titles, vec![ "Zeta", "alpha", "zeta" ] );

        let artist_names: Vec<&str> = artists.iter().map( |a| a.name.as_str() ).collect();
        assert_eq!( artist_names, vec![ "Alpha", "Gamma", "beta" ] );
    }


    #[test]
    fn test_empty_snapshot() {
        let ( albums, artists ) = aggregate( &[] );
        assert!( albums.is_empty() );
        assert!( artists.is_empty() );
    }
}
