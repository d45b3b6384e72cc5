//! Playback queue
//!
//! Handles song ordering, shuffle, repeat, and queue edits. The controller
//! has a single owner and no internal locking.

use std::fmt;
use std::str::FromStr;

use rand::seq::SliceRandom;

use crate::model::{ path_key, Song };


/// Repeat mode for the queue.
#[derive( Debug, Clone, Copy, PartialEq, Eq, Default )]
pub enum RepeatMode {
    #[default]
    Off,
    All,
    One,
}


impl RepeatMode {
    /// Next mode in the `Off -> All -> One -> Off` cycle.
    pub fn cycle( self ) -> Self {
        match self {
            RepeatMode::Off => RepeatMode::All,
            RepeatMode::All => RepeatMode::One,
            RepeatMode::One => RepeatMode::Off,
        }
    }
}


impl fmt::Display for RepeatMode {
    fn fmt( &self, f: &mut fmt::Formatter<'_> ) -> fmt::Result {
        f.write_str( match self {
            RepeatMode::Off => "off",
            RepeatMode::All => "all",
            RepeatMode::One => "one",
        })
    }
}


impl FromStr for RepeatMode {
    type Err = String;

    fn from_str( s: &str ) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "off" | "none" => Ok( RepeatMode::Off ),
            "all" => Ok( RepeatMode::All ),
            "one" => Ok( RepeatMode::One ),
            other => Err( format!( "unknown repeat mode '{}'", other ) ),
        }
    }
}


/// Queue state machine.
///
/// While shuffle is on, traversal follows the shuffle deck (a permutation of
/// queue indices) instead of queue order.
#[derive( Debug, Default )]
pub struct QueueController {
    songs: Vec<Song>,
    current_index: Option<usize>,
    shuffle: bool,
    repeat: RepeatMode,
    shuffle_deck: Vec<usize>,
    shuffle_pointer: Option<usize>,
}


impl QueueController {
    pub fn new() -> Self {
        Self::default()
    }


    /// Replaces the queue.
    ///
    /// @param songs - New queue contents
    /// @param keep_current - Keep the current index instead of clearing it
    pub fn set_context( &mut self, songs: Vec<Song>, keep_current: bool ) {
        self.songs = songs;

        if self.shuffle {
            self.rebuild_deck();
        }

        if keep_current {
            self.sync_shuffle_pointer();
        } else {
            self.current_index = None;
            self.shuffle_pointer = None;
        }
    }


    /// Selects a queue position, clamped to the queue. `None` clears the selection.
    pub fn set_index( &mut self, index: Option<usize> ) {
        self.current_index = match index {
            Some( i ) if !self.songs.is_empty() => Some( i.min( self.songs.len() - 1 ) ),
            _ => None,
        };
        self.sync_shuffle_pointer();
    }


    /// Selects the first queue entry with the same path as `song`.
    pub fn set_index_by_song( &mut self, song: &Song ) {
        let key = song.key();
        let index = self.songs.iter().position( |s| path_key( &s.file_path ) == key );
        self.set_index( index );
    }


    /// Moves to the next entry.
    ///
    /// An automatic advance only wraps past the end under repeat-all; a user
    /// initiated one always wraps. Repeat-one with `auto_advance` leaves the
    /// position alone and succeeds; replaying is up to the caller.
    ///
    /// @returns false if there is no next entry
    pub fn try_advance( &mut self, auto_advance: bool ) -> bool {
        if self.songs.is_empty() {
            return false;
        }

        if self.repeat == RepeatMode::One && auto_advance {
            return true;
        }

        self.step( true, auto_advance )
    }


    /// Moves to the previous entry, wrapping to the last one at the start.
    pub fn try_regress( &mut self ) -> bool {
        !self.songs.is_empty() && self.step( false, false )
    }


    pub fn toggle_shuffle( &mut self ) {
        self.shuffle = !self.shuffle;
        if self.shuffle {
            self.rebuild_deck();
            self.sync_shuffle_pointer();
        }
    }


    pub fn toggle_repeat( &mut self ) {
        self.repeat = self.repeat.cycle();
    }


    /// Sets both modes at once, reshuffling if shuffle is on.
    pub fn set_modes( &mut self, shuffle: bool, repeat: RepeatMode ) {
        self.shuffle = shuffle;
        self.repeat = repeat;
        if self.shuffle {
            self.rebuild_deck();
            self.sync_shuffle_pointer();
        }
    }


    /// Removes the entry at `index`.
    ///
    /// Removing the current entry keeps the same index, so the following
    /// entry becomes current; if it was the last entry the index wraps to 0.
    pub fn remove( &mut self, index: usize ) -> Option<Song> {
        if index >= self.songs.len() {
            return None;
        }

        let removing_current = self.current_index == Some( index );
        let removed = self.songs.remove( index );

        if self.shuffle {
            self.rebuild_deck();
        }

        if self.songs.is_empty() {
            self.current_index = None;
        } else if let Some( current ) = self.current_index {
            if removing_current {
                if current >= self.songs.len() {
                    self.current_index = Some( 0 );
                }
            } else if index < current {
                self.current_index = Some( current - 1 );
            }
        }

        self.sync_shuffle_pointer();
        Some( removed )
    }


    /// Moves an entry, keeping the current index on the same song.
    ///
    /// @param from - Source index
    /// @param to - Destination index
    ///
    /// @returns true if the move was successful
    pub fn reorder( &mut self, from: usize, to: usize ) -> bool {
        if from >= self.songs.len() || to >= self.songs.len() {
            return false;
        }

        if from == to {
            return true;
        }

        let song = self.songs.remove( from );
        self.songs.insert( to, song );

        if let Some( current ) = self.current_index {
            if current == from {
                self.current_index = Some( to );
            } else if from < current && current <= to {
                self.current_index = Some( current - 1 );
            } else if to <= current && current < from {
                self.current_index = Some( current + 1 );
            }
        }

        if self.shuffle {
            self.rebuild_deck();
            self.sync_shuffle_pointer();
        }
        true
    }


    pub fn songs( &self ) -> &[Song] {
        &self.songs
    }


    pub fn len( &self ) -> usize {
        self.songs.len()
    }


    pub fn is_empty( &self ) -> bool {
        self.songs.is_empty()
    }


    pub fn current_index( &self ) -> Option<usize> {
        self.current_index
    }


    pub fn current_song( &self ) -> Option<&Song> {
        self.current_index.and_then( |i| self.songs.get( i ) )
    }


    pub fn is_shuffle( &self ) -> bool {
        self.shuffle
    }


    pub fn repeat( &self ) -> RepeatMode {
        self.repeat
    }


    /// The current shuffle permutation (stale while shuffle is off).
    pub fn shuffle_deck( &self ) -> &[usize] {
        &self.shuffle_deck
    }


    /// Moves one position in queue order or deck order.
    fn step( &mut self, forward: bool, auto_advance: bool ) -> bool {
        if self.shuffle {
            let Some( pointer ) = self.next_position( self.shuffle_pointer, self.shuffle_deck.len(), forward, auto_advance ) else {
                return false;
            };
            self.shuffle_pointer = Some( pointer );
            self.current_index = Some( self.shuffle_deck[ pointer ] );
            true
        } else {
            match self.next_position( self.current_index, self.songs.len(), forward, auto_advance ) {
                Some( index ) => {
                    self.current_index = Some( index );
                    true
                }
                None => false,
            }
        }
    }


    fn next_position( &self, position: Option<usize>, len: usize, forward: bool, auto_advance: bool ) -> Option<usize> {
        if len == 0 {
            return None;
        }

        if forward {
            let next = position.map_or( 0, |p| p + 1 );
            if next < len {
                Some( next )
            } else if self.repeat == RepeatMode::All || !auto_advance {
                Some( 0 )
            } else {
                None
            }
        } else {
            match position {
                Some( p ) if p > 0 => Some( ( p - 1 ).min( len - 1 ) ),
                _ => Some( len - 1 ),
            }
        }
    }


    fn rebuild_deck( &mut self ) {
        self.shuffle_deck = ( 0..self.songs.len() ).collect();
        self.shuffle_deck.shuffle( &mut rand::thread_rng() );
    }


    /// Points the deck at the current index, or restarts the deck if the
    /// current index is not in it.
    fn sync_shuffle_pointer( &mut self ) {
        if !self.shuffle {
            return;
        }

        let found = self.current_index.and_then( |current| {
            self.shuffle_deck.iter().position( |&i| i == current )
        });

        match found {
            Some( pointer ) => self.shuffle_pointer = Some( pointer ),
            None => {
                if let Some( &first ) = self.shuffle_deck.first() {
                    self.shuffle_pointer = Some( 0 );
                    self.current_index = Some( first );
                }
            }
        }
    }
}


#[cfg( test )]
mod tests {
    use std::collections::HashSet;
    use std::path::PathBuf;

    use super::*;


    fn songs( n: usize ) -> Vec<Song> {
        ( 0..n ).map( |i| Song::from_path( song_path( i ) ) ).collect()
    }


    fn song_path( i: usize ) -> PathBuf {
        PathBuf::from( format!( "/m/s{}.mp3", i ) )
    }


    fn queue( n: usize ) -> QueueController {
        let mut queue = QueueController::new();
        queue.set_context( songs( n ), false );
        queue
    }


    #[test]
    fn test_auto_advance_wraps_under_repeat_all() {
        let mut queue = queue( 3 );
        queue.set_modes( false, RepeatMode::All );
        queue.set_index( Some( 2 ) );

        assert!( queue.try_advance( true ) );
        assert_eq!( queue.current_index(), Some( 0 ) );
    }


    #[test]
    fn test_auto_advance_stops_at_end_without_repeat() {
        let mut queue = queue( 3 );
        queue.set_index( Some( 2 ) );

        assert!( !queue.try_advance( true ) );
        assert_eq!( queue.current_index(), Some( 2 ) );
    }


    #[test]
    fn test_user_advance_always_wraps() {
        let mut queue = queue( 3 );
        queue.set_index( Some( 2 ) );

        assert!( queue.try_advance( false ) );
        assert_eq!( queue.current_index(), Some( 0 ) );
    }


    #[test]
    fn test_regress_wraps_to_last() {
        let mut queue = queue( 3 );
        queue.set_index( Some( 0 ) );
        assert!( queue.try_regress() );
        assert_eq!( queue.current_index(), Some( 2 ) );

        let mut fresh = self::queue( 3 );
        assert!( fresh.try_regress() );
        assert_eq!( fresh.current_index(), Some( 2 ) );
    }


    #[test]
    fn test_repeat_one_auto_advance_stays() {
        let mut queue = queue( 3 );
        queue.set_modes( false, RepeatMode::One );
        queue.set_index( Some( 1 ) );

        assert!( queue.try_advance( true ) );
        assert_eq!( queue.current_index(), Some( 1 ) );

        assert!( queue.try_advance( false ) );
        assert_eq!( queue.current_index(), Some( 2 ) );
    }


    #[test]
    fn test_empty_queue_never_moves() {
        let mut queue = QueueController::new();
        assert!( !queue.try_advance( false ) );
        assert!( !queue.try_regress() );
        assert_eq!( queue.current_index(), None );
    }


    #[test]
    fn test_set_index_clamps() {
        let mut queue = queue( 3 );
        queue.set_index( Some( 10 ) );
        assert_eq!( queue.current_index(), Some( 2 ) );

        queue.set_index( None );
        assert_eq!( queue.current_index(), None );
    }


    #[test]
    fn test_set_index_by_song_ignores_case() {
        let mut queue = queue( 3 );
        queue.set_index_by_song( &Song::from_path( "/M/S1.MP3" ) );
        assert_eq!( queue.current_index(), Some( 1 ) );

        queue.set_index_by_song( &Song::from_path( "/m/missing.mp3" ) );
        assert_eq!( queue.current_index(), None );
    }


    #[test]
    fn test_shuffle_deck_is_a_permutation_visited_once() {
        let n = 20;
        let mut queue = QueueController::new();
        queue.toggle_shuffle();
        queue.set_context( songs( n ), false );

        let deck: HashSet<usize> = queue.shuffle_deck().iter().copied().collect();
        assert_eq!( queue.shuffle_deck().len(), n );
        assert_eq!( deck, ( 0..n ).collect::<HashSet<usize>>() );

        let mut visited = Vec::new();
        for _ in 0..n {
            assert!( queue.try_advance( true ) );
            visited.push( queue.current_index().unwrap() );
        }
        assert_eq!( visited, queue.shuffle_deck() );
        assert!( !queue.try_advance( true ) );
    }


    #[test]
    fn test_enabling_shuffle_keeps_current_song() {
        let mut queue = queue( 10 );
        queue.set_index( Some( 4 ) );
        queue.toggle_shuffle();

        assert!( queue.is_shuffle() );
        assert_eq!( queue.current_index(), Some( 4 ) );
    }


    #[test]
    fn test_enabling_shuffle_without_selection_picks_deck_start() {
        let mut queue = queue( 5 );
        queue.toggle_shuffle();
        assert_eq!( queue.current_index(), Some( queue.shuffle_deck()[ 0 ] ) );
    }


    #[test]
    fn test_toggle_repeat_cycles() {
        let mut queue = QueueController::new();
        let mut seen = Vec::new();
        for _ in 0..3 {
            queue.toggle_repeat();
            seen.push( queue.repeat() );
        }
        assert_eq!( seen, vec![ RepeatMode::All, RepeatMode::One, RepeatMode::Off ] );
    }


    #[test]
    fn test_remove_before_current_tracks_song() {
        let mut queue = queue( 4 );
        queue.set_index( Some( 2 ) );

        queue.remove( 0 );
        assert_eq!( queue.current_index(), Some( 1 ) );
        assert_eq!( queue.current_song().unwrap().file_path, song_path( 2 ) );
    }


    #[test]
    fn test_remove_current_clamps_instead_of_clearing() {
        let mut queue = queue( 3 );
        queue.set_index( Some( 1 ) );
        queue.remove( 1 );
        assert_eq!( queue.current_index(), Some( 1 ) );
        assert_eq!( queue.current_song().unwrap().file_path, song_path( 2 ) );

        queue.remove( 1 );
        assert_eq!( queue.current_index(), Some( 0 ) );

        queue.remove( 0 );
        assert_eq!( queue.current_index(), None );
        assert!( queue.remove( 0 ).is_none() );
    }


    #[test]
    fn test_remove_rebuilds_deck() {
        let mut queue = queue( 5 );
        queue.toggle_shuffle();
        queue.remove( 0 );

        assert_eq!( queue.shuffle_deck().len(), 4 );
        let current = queue.current_index().unwrap();
        assert!( current < 4 );
        assert!( queue.shuffle_deck().contains( &current ) );
    }


    #[test]
    fn test_reorder_follows_current_song() {
        let mut queue = queue( 5 );
        queue.set_index( Some( 1 ) );

        assert!( queue.reorder( 0, 3 ) );
        assert_eq!( queue.current_index(), Some( 0 ) );
        assert_eq!( queue.current_song().unwrap().file_path, song_path( 1 ) );

        assert!( queue.reorder( 0, 4 ) );
        assert_eq!( queue.current_index(), Some( 4 ) );

        assert!( queue.reorder( 4, 0 ) );
        assert_eq!( queue.current_index(), Some( 0 ) );

        assert!( !queue.reorder( 0, 9 ) );
    }


    #[test]
    fn test_set_context_resets_unless_kept() {
        let mut queue = queue( 3 );
        queue.set_index( Some( 1 ) );

        queue.set_context( songs( 4 ), true );
        assert_eq!( queue.current_index(), Some( 1 ) );

        queue.set_context( songs( 4 ), false );
        assert_eq!( queue.current_index(), None );
    }


    #[test]
    fn test_repeat_mode_parse() {
        assert_eq!( "ALL".parse::<RepeatMode>(), Ok( RepeatMode::All ) );
        assert_eq!( "none".parse::<RepeatMode>(), Ok( RepeatMode::Off ) );
        assert!( "sometimes".parse::<RepeatMode>().is_err() );
        assert_eq!( RepeatMode::One.to_string(), "one" );
    }
}
