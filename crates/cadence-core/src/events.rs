//! Bridges filesystem events to the data manager.

use std::path::Path;
use std::sync::Arc;

use tokio::sync::mpsc::UnboundedReceiver;

use crate::data_manager::LibraryDataManager;
use crate::monitor::FileEvent;
use crate::tags::TagSource;


/// Applies [`FileEvent`]s to the canonical song map.
#[derive( Clone )]
pub struct LibraryEventCoordinator {
    data: Arc<LibraryDataManager>,
    source: Arc<dyn TagSource>,
}


impl LibraryEventCoordinator {
    pub fn new( data: Arc<LibraryDataManager>, source: Arc<dyn TagSource> ) -> Self {
        Self { data, source }
    }


    /// Applies one event. Tag reads happen on the calling thread.
    pub fn handle( &self, event: FileEvent ) {
        match event {
            FileEvent::Added( path ) => self.on_added( &path ),
            FileEvent::Removed( path ) => {
                if self.data.remove_song( &path ).is_some() {
                    tracing::info!( "Removed {:?}", path );
                }
            }
            FileEvent::Renamed { from, to } => self.on_renamed( &from, &to ),
        }
    }


    /// Consumes events until the channel closes.
    pub async fn run( self, mut events: UnboundedReceiver<FileEvent> ) {
        while let Some( event ) = events.recv().await {
            let this = self.clone();
            if let Err( e ) = tokio::task::spawn_blocking( move || this.handle( event ) ).await {
                tracing::error!( "File event handler failed: {}", e );
            }
        }
        tracing::debug!( "File event channel closed" );
    }


    fn on_added( &self, path: &Path ) {
        if self.data.contains( path ) {
            return;
        }

        match self.source.create_song_from_file( path ) {
            Some( song ) => {
                tracing::info!( "Added {:?}", path );
                self.data.add_or_update_song( song );
            }
            None => tracing::debug!( "Ignoring unreadable new file {:?}", path ),
        }
    }


    fn on_renamed( &self, from: &Path, to: &Path ) {
        match self.data.remove_song( from ) {
            Some( mut song ) => {
                tracing::info!( "Renamed {:?} -> {:?}", from, to );
                song.file_path = to.to_path_buf();
                self.data.add_or_update_song( song );
            }
            None => self.on_added( to ),
        }
    }
}


#[cfg( test )]
mod tests {
    use std::collections::HashSet;
    use std::path::PathBuf;
    use std::time::Duration;

    use tokio::runtime::Handle;
    use tokio::sync::mpsc;

    use super::*;
    use crate::cancel::CancelToken;
    use crate::config::LibraryConfig;
    use crate::model::{ Playlist, Song, SongMetadata };
    use crate::tags::TagError;


    /// Resolves every path except those containing "locked".
    struct FakeSource;


    impl TagSource for FakeSource {
        fn load_songs_from_folder( &self, _: &Path, _: &HashSet<String>, _: &CancelToken ) -> Vec<Song> {
            Vec::new()
        }

        fn load_playlists_from_folder( &self, _: &Path, _: &CancelToken ) -> Vec<Playlist> {
            Vec::new()
        }

        fn create_song_from_file( &self, path: &Path ) -> Option<Song> {
            let locked = path.to_string_lossy().contains( "locked" );
            ( !locked ).then( || Song::from_path( path ) )
        }

        fn metadata( &self, _: &Path ) -> Option<SongMetadata> {
            None
        }

        fn save_metadata( &self, _: &Path, _: &SongMetadata ) -> Result<(), TagError> {
            Ok(())
        }
    }


    fn coordinator() -> ( Arc<LibraryDataManager>, LibraryEventCoordinator ) {
        let config = LibraryConfig {
            rebuild_debounce_ms: 10,
            ..LibraryConfig::default()
        };
        let data = Arc::new( LibraryDataManager::new( &config, None, Handle::current() ) );
        let coordinator = LibraryEventCoordinator::new( Arc::clone( &data ), Arc::new( FakeSource ) );
        ( data, coordinator )
    }


    #[tokio::test( flavor = "multi_thread" )]
    async fn test_added_skips_known_and_unreadable_paths() {
        let ( data, coordinator ) = coordinator();

        let mut existing = Song::from_path( "/m/a.mp3" );
        existing.title = "Keep me".to_string();
        data.add_or_update_song( existing );

        coordinator.handle( FileEvent::Added( PathBuf::from( "/m/a.mp3" ) ) );
        coordinator.handle( FileEvent::Added( PathBuf::from( "/m/locked.mp3" ) ) );
        coordinator.handle( FileEvent::Added( PathBuf::from( "/m/b.mp3" ) ) );

        assert_eq!( data.song_count(), 2 );
        assert_eq!( data.get_song( Path::new( "/m/a.mp3" ) ).unwrap().title, "Keep me" );
    }


    #[tokio::test( flavor = "multi_thread" )]
    async fn test_removed() {
        let ( data, coordinator ) = coordinator();
        data.add_or_update_song( Song::from_path( "/m/a.mp3" ) );

        coordinator.handle( FileEvent::Removed( PathBuf::from( "/m/A.mp3" ) ) );
        assert_eq!( data.song_count(), 0 );
    }


    #[tokio::test( flavor = "multi_thread" )]
    async fn test_rename_of_known_song_keeps_record() {
        let ( data, coordinator ) = coordinator();
        let mut song = Song::from_path( "/m/a.mp3" );
        song.title = "Tagged Title".to_string();
        data.add_or_update_song( song );

        coordinator.handle( FileEvent::Renamed { from: PathBuf::from( "/m/a.mp3" ), to: PathBuf::from( "/m/b.mp3" ) } );

        assert!( data.get_song( Path::new( "/m/a.mp3" ) ).is_none() );
        let moved = data.get_song( Path::new( "/m/b.mp3" ) ).unwrap();
        assert_eq!( moved.title, "Tagged Title" );
        assert_eq!( moved.file_path, PathBuf::from( "/m/b.mp3" ) );
    }


    #[tokio::test( flavor = "multi_thread" )]
    async fn test_rename_of_unknown_song_is_an_add() {
        let ( data, coordinator ) = coordinator();

        coordinator.handle( FileEvent::Renamed { from: PathBuf::from( "/m/x.tmp" ), to: PathBuf::from( "/m/x.mp3" ) } );
        assert!( data.contains( Path::new( "/m/x.mp3" ) ) );
    }


    #[tokio::test( flavor = "multi_thread" )]
    async fn test_run_drains_channel() {
        let ( data, coordinator ) = coordinator();
        let ( tx, rx ) = mpsc::unbounded_channel();

        tx.send( FileEvent::Added( PathBuf::from( "/m/a.mp3" ) ) ).unwrap();
        tx.send( FileEvent::Added( PathBuf::from( "/m/b.mp3" ) ) ).unwrap();
        drop( tx );

        tokio::time::timeout( Duration::from_secs( 2 ), coordinator.run( rx ) ).await.unwrap();
        assert_eq!( data.song_count(), 2 );
    }
}
