//! Tokenized song search.

use crate::model::Song;


/// Filters `songs` by a whitespace-tokenized query.
///
/// Every token must appear (case-insensitive) in the title, artist or album.
/// An empty or blank query returns every song.
pub fn search( songs: &[Song], query: &str ) -> Vec<Song> {
    let tokens: Vec<String> = query.split_whitespace().map( str::to_lowercase ).collect();

    if tokens.is_empty() {
        return songs.to_vec();
    }

    songs
        .iter()
        .filter( |song| {
            let fields = [
                song.title.to_lowercase(),
                song.artist.to_lowercase(),
                song.album.to_lowercase(),
            ];
            tokens.iter().all( |token| fields.iter().any( |field| field.contains( token.as_str() ) ) )
        })
        .cloned()
        .collect()
}


#[cfg( test )]
mod tests {
    use super::*;


    fn song( title: &str, artist: &str, album: &str ) -> Song {
        let mut song = Song::from_path( format!( "/m/{}.mp3", title ) );
        song.title = title.to_string();
        song.artist = artist.to_string();
        song.album = album.to_string();
        song
    }


    fn library() -> Vec<Song> {
        vec![
            song( "Time", "Pink Floyd", "The Dark Side of the Moon" ),
            song( "Money", "Pink Floyd", "The Dark Side of the Moon" ),
            song( "Lost in Time", "The Midnight", "Endless Summer" ),
            song( "Pinky Promise", "Someone", "Timeless" ),
        ]
    }


    #[test]
    fn test_empty_query_returns_everything() {
        assert_eq!( search( &library(), "" ), library() );
        assert_eq!( search( &library(), "   " ), library() );
    }


    #[test]
    fn test_all_tokens_must_match_some_field() {
        let titles: Vec<String> = search( &library(), "Pink Time" )
            .into_iter()
            .map( |s| s.title )
            .collect();

        assert_eq!( titles, vec![ "Time", "Pinky Promise" ] );
    }


    #[test]
    fn test_case_insensitive() {
        assert_eq!( search( &library(), "MIDNIGHT" ).len(), 1 );
        assert_eq!( search( &library(), "money pink" ).len(), 1 );
    }


    #[test]
    fn test_no_match() {
        assert!( search( &library(), "Beethoven" ).is_empty() );
    }
}
