//! Filesystem monitor
//!
//! One recursive watcher per library root. Raw notify events are filtered to
//! the supported extensions and forwarded as [`FileEvent`]s on an unbounded
//! channel. Created files are reported after a short delay so copies in
//! progress can finish. Files moved into or out of a root are reported as
//! added or removed.

use std::collections::HashSet;
use std::path::{ Path, PathBuf };
use std::sync::{ Arc, Mutex };
use std::time::Duration;

use notify::event::{ ModifyKind, RenameMode };
use notify::{ Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher };
use thiserror::Error;
use tokio::runtime::Handle;
use tokio::sync::mpsc::{ self, UnboundedReceiver, UnboundedSender };

use crate::config::{ has_extension, LibraryConfig };
use crate::model::path_key;


/// Errors that can occur while setting up a watcher.
#[derive( Debug, Error )]
pub enum MonitorError {
    #[error( "Watcher error: {0}" )]
    Notify( #[from] notify::Error ),

    #[error( "Not a directory: {0}" )]
    NotADirectory( PathBuf ),
}


/// A change to a supported file under a library root.
#[derive( Debug, Clone, PartialEq, Eq )]
pub enum FileEvent {
    Added( PathBuf ),
    Removed( PathBuf ),
    Renamed { from: PathBuf, to: PathBuf },
}


/// Watches the library roots and reports file changes.
pub struct FileMonitor {
    runtime: Handle,
    extensions: HashSet<String>,
    created_delay: Duration,
    sender: UnboundedSender<FileEvent>,
    watchers: Mutex<Vec<RecommendedWatcher>>,
}


impl FileMonitor {
    /// Creates a monitor and the receiving end of its event channel.
    pub fn new( config: &LibraryConfig, runtime: Handle ) -> ( Self, UnboundedReceiver<FileEvent> ) {
        let ( sender, receiver ) = mpsc::unbounded_channel();

        let monitor = Self {
            runtime,
            extensions: config.extension_set(),
            created_delay: config.created_delay(),
            sender,
            watchers: Mutex::new( Vec::new() ),
        };

        ( monitor, receiver )
    }


    /// Replaces all watchers with one per existing root in `roots`.
    ///
    /// A root that cannot be watched is logged and skipped.
    ///
    /// @returns the number of roots being watched
    pub fn start( &self, roots: &[PathBuf] ) -> usize {
        let mut watchers = self.watchers.lock().unwrap_or_else( |e| e.into_inner() );
        watchers.clear();

        for root in roots {
            match self.watch_root( root ) {
                Ok( watcher ) => {
                    tracing::info!( "Watching {:?}", root );
                    watchers.push( watcher );
                }
                Err( e ) => tracing::warn!( "Not watching {:?}: {}", root, e ),
            }
        }

        watchers.len()
    }


    /// Stops every watcher.
    pub fn stop( &self ) {
        self.watchers.lock().unwrap_or_else( |e| e.into_inner() ).clear();
    }


    fn watch_root( &self, root: &Path ) -> Result<RecommendedWatcher, MonitorError> {
        if !root.is_dir() {
            return Err( MonitorError::NotADirectory( root.to_path_buf() ) );
        }

        let dispatcher = Dispatcher::new( self.sender.clone(), self.extensions.clone(), self.runtime.clone(), self.created_delay );

        let mut watcher = RecommendedWatcher::new(
            move |result: Result<Event, notify::Error>| match result {
                Ok( event ) => dispatcher.dispatch( &event ),
                Err( e ) => tracing::warn!( "Watcher error: {}", e ),
            },
            Config::default(),
        )?;

        watcher.watch( root, RecursiveMode::Recursive )?;
        Ok( watcher )
    }
}


/// Forwards classified events of one watcher, applying the delays.
///
/// Additions wait for the settle delay. The source half of a move waits too,
/// and is dropped if the same move is reported as a complete rename in the
/// meantime; otherwise the file left the root and is reported as removed.
struct Dispatcher {
    sender: UnboundedSender<FileEvent>,
    extensions: HashSet<String>,
    runtime: Handle,
    delay: Duration,
    paired_sources: Arc<Mutex<HashSet<String>>>,
}


impl Dispatcher {
    fn new( sender: UnboundedSender<FileEvent>, extensions: HashSet<String>, runtime: Handle, delay: Duration ) -> Self {
        Self {
            sender,
            extensions,
            runtime,
            delay,
            paired_sources: Arc::new( Mutex::new( HashSet::new() ) ),
        }
    }


    fn dispatch( &self, event: &Event ) {
        let move_source = matches!( event.kind, EventKind::Modify( ModifyKind::Name( RenameMode::From ) ) );

        if let ( EventKind::Modify( ModifyKind::Name( RenameMode::Both ) ), Some( from ) ) = ( event.kind, event.paths.first() ) {
            if has_extension( from, &self.extensions ) {
                self.pair_source( path_key( from ) );
            }
        }

        for file_event in classify( event, &self.extensions ) {
            match file_event {
                FileEvent::Added( path ) => self.send_later( FileEvent::Added( path ) ),
                FileEvent::Removed( path ) if move_source => self.send_later( FileEvent::Removed( path ) ),
                other => {
                    let _ = self.sender.send( other );
                }
            }
        }
    }


    /// Marks `key` as the source of a complete rename. The mark expires once
    /// the lone source half would have been due.
    fn pair_source( &self, key: String ) {
        self.paired_sources.lock().unwrap_or_else( |e| e.into_inner() ).insert( key.clone() );

        let paired = Arc::clone( &self.paired_sources );
        let expiry = self.delay * 2;
        self.runtime.spawn( async move {
            tokio::time::sleep( expiry ).await;
            paired.lock().unwrap_or_else( |e| e.into_inner() ).remove( &key );
        });
    }


    fn send_later( &self, file_event: FileEvent ) {
        let sender = self.sender.clone();
        let paired = Arc::clone( &self.paired_sources );
        let delay = self.delay;

        self.runtime.spawn( async move {
            tokio::time::sleep( delay ).await;

            if let FileEvent::Removed( path ) = &file_event {
                if paired.lock().unwrap_or_else( |e| e.into_inner() ).remove( &path_key( path ) ) {
                    return;
                }
            }
            let _ = sender.send( file_event );
        });
    }
}


/// Maps a raw notify event to library file events.
///
/// Creations and removals must carry a supported extension. A complete rename
/// is only reported if its target is supported. The lone halves of a move
/// (a file moved into or out of a watched root, or a backend that reports the
/// two sides separately) become additions and removals; a rename of unknown
/// direction is resolved by checking whether the path still exists.
pub fn classify( event: &Event, extensions: &HashSet<String> ) -> Vec<FileEvent> {
    let supported = |p: &&PathBuf| has_extension( p, extensions );

    match event.kind {
        EventKind::Create( _ ) | EventKind::Modify( ModifyKind::Name( RenameMode::To ) ) => event.paths
            .iter()
            .filter( supported )
            .map( |p| FileEvent::Added( p.clone() ) )
            .collect(),

        EventKind::Remove( _ ) | EventKind::Modify( ModifyKind::Name( RenameMode::From ) ) => event.paths
            .iter()
            .filter( supported )
            .map( |p| FileEvent::Removed( p.clone() ) )
            .collect(),

        EventKind::Modify( ModifyKind::Name( RenameMode::Both ) ) => match event.paths.as_slice() {
            [ from, to ] if has_extension( to, extensions ) => vec![ FileEvent::Renamed {
                from: from.clone(),
                to: to.clone(),
            }],
            _ => Vec::new(),
        },

        EventKind::Modify( ModifyKind::Name( _ ) ) => event.paths
            .iter()
            .filter( supported )
            .map( |p| if p.exists() { FileEvent::Added( p.clone() ) } else { FileEvent::Removed( p.clone() ) } )
            .collect(),

        _ => Vec::new(),
    }
}


#[cfg( test )]
mod tests {
    use std::fs;

    use notify::event::{ CreateKind, RemoveKind };

    use super::*;


    fn exts() -> HashSet<String> {
        [ "mp3", "flac" ].iter().map( |e| e.to_string() ).collect()
    }


    fn event( kind: EventKind, paths: &[&str] ) -> Event {
        paths.iter().fold( Event::new( kind ), |e, p| e.add_path( PathBuf::from( p ) ) )
    }


    #[test]
    fn test_create_and_remove_are_filtered_by_extension() {
        let created = event( EventKind::Create( CreateKind::File ), &[ "/m/a.MP3", "/m/cover.jpg" ] );
        assert_eq!( classify( &created, &exts() ), vec![ FileEvent::Added( PathBuf::from( "/m/a.MP3" ) ) ] );

        let removed = event( EventKind::Remove( RemoveKind::File ), &[ "/m/a.flac" ] );
        assert_eq!( classify( &removed, &exts() ), vec![ FileEvent::Removed( PathBuf::from( "/m/a.flac" ) ) ] );
    }


    #[test]
    fn test_rename_requires_supported_target() {
        let kind = EventKind::Modify( ModifyKind::Name( RenameMode::Both ) );

        let renamed = event( kind, &[ "/m/a.tmp", "/m/a.mp3" ] );
        assert_eq!(
            classify( &renamed, &exts() ),
            vec![ FileEvent::Renamed { from: PathBuf::from( "/m/a.tmp" ), to: PathBuf::from( "/m/a.mp3" ) } ]
        );

        let unsupported = event( kind, &[ "/m/a.mp3", "/m/a.bak" ] );
        assert!( classify( &unsupported, &exts() ).is_empty() );
    }


    #[test]
    fn test_lone_rename_halves_become_add_and_remove() {
        let moved_in = event( EventKind::Modify( ModifyKind::Name( RenameMode::To ) ), &[ "/m/in.mp3", "/m/in.txt" ] );
        assert_eq!( classify( &moved_in, &exts() ), vec![ FileEvent::Added( PathBuf::from( "/m/in.mp3" ) ) ] );

        let moved_out = event( EventKind::Modify( ModifyKind::Name( RenameMode::From ) ), &[ "/m/out.flac" ] );
        assert_eq!( classify( &moved_out, &exts() ), vec![ FileEvent::Removed( PathBuf::from( "/m/out.flac" ) ) ] );
    }


    #[test]
    fn test_rename_of_unknown_direction_checks_existence() {
        let dir = tempfile::tempdir().unwrap();
        let present = dir.path().join( "here.mp3" );
        let gone = dir.path().join( "gone.mp3" );
        fs::write( &present, b"x" ).unwrap();

        let mut any = Event::new( EventKind::Modify( ModifyKind::Name( RenameMode::Any ) ) );
        any = any.add_path( present.clone() ).add_path( gone.clone() );

        assert_eq!(
            classify( &any, &exts() ),
            vec![ FileEvent::Added( present ), FileEvent::Removed( gone ) ]
        );
    }


    #[test]
    fn test_data_changes_are_ignored() {
        let any = event( EventKind::Modify( ModifyKind::Any ), &[ "/m/a.mp3" ] );
        let access = event( EventKind::Access( notify::event::AccessKind::Any ), &[ "/m/a.mp3" ] );

        assert!( classify( &any, &exts() ).is_empty() );
        assert!( classify( &access, &exts() ).is_empty() );
    }


    fn dispatcher() -> ( Dispatcher, UnboundedReceiver<FileEvent> ) {
        let ( sender, receiver ) = mpsc::unbounded_channel();
        let dispatcher = Dispatcher::new( sender, exts(), Handle::current(), Duration::from_millis( 50 ) );
        ( dispatcher, receiver )
    }


    async fn drain( rx: &mut UnboundedReceiver<FileEvent> ) -> Vec<FileEvent> {
        tokio::time::sleep( Duration::from_millis( 300 ) ).await;
        let mut events = Vec::new();
        while let Ok( e ) = rx.try_recv() {
            events.push( e );
        }
        events
    }


    #[tokio::test( flavor = "multi_thread" )]
    async fn test_source_half_of_complete_rename_is_dropped() {
        let ( dispatcher, mut rx ) = dispatcher();

        dispatcher.dispatch( &event( EventKind::Modify( ModifyKind::Name( RenameMode::From ) ), &[ "/m/a.mp3" ] ) );
        dispatcher.dispatch( &event( EventKind::Modify( ModifyKind::Name( RenameMode::Both ) ), &[ "/m/a.mp3", "/m/b.mp3" ] ) );

        assert_eq!(
            drain( &mut rx ).await,
            vec![ FileEvent::Renamed { from: PathBuf::from( "/m/a.mp3" ), to: PathBuf::from( "/m/b.mp3" ) } ]
        );
    }


    #[tokio::test( flavor = "multi_thread" )]
    async fn test_rename_to_unsupported_extension_is_not_a_removal() {
        let ( dispatcher, mut rx ) = dispatcher();

        dispatcher.dispatch( &event( EventKind::Modify( ModifyKind::Name( RenameMode::From ) ), &[ "/m/a.mp3" ] ) );
        dispatcher.dispatch( &event( EventKind::Modify( ModifyKind::Name( RenameMode::Both ) ), &[ "/m/a.mp3", "/m/a.bak" ] ) );

        assert!( drain( &mut rx ).await.is_empty() );
    }


    #[tokio::test( flavor = "multi_thread" )]
    async fn test_unpaired_source_half_is_a_removal() {
        let ( dispatcher, mut rx ) = dispatcher();

        dispatcher.dispatch( &event( EventKind::Modify( ModifyKind::Name( RenameMode::From ) ), &[ "/m/a.mp3" ] ) );
        dispatcher.dispatch( &event( EventKind::Remove( RemoveKind::File ), &[ "/m/c.mp3" ] ) );

        assert_eq!( rx.recv().await, Some( FileEvent::Removed( PathBuf::from( "/m/c.mp3" ) ) ) );
        assert_eq!( drain( &mut rx ).await, vec![ FileEvent::Removed( PathBuf::from( "/m/a.mp3" ) ) ] );
    }


    #[tokio::test( flavor = "multi_thread" )]
    async fn test_missing_roots_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let ( monitor, _rx ) = FileMonitor::new( &LibraryConfig::default(), Handle::current() );

        let watched = monitor.start( &[ dir.path().join( "missing" ), dir.path().to_path_buf() ] );
        assert_eq!( watched, 1 );

        monitor.stop();
    }


    #[tokio::test( flavor = "multi_thread" )]
    async fn test_created_file_is_reported_after_delay() {
        let dir = tempfile::tempdir().unwrap();
        let config = LibraryConfig {
            created_delay_ms: 50,
            ..LibraryConfig::default()
        };
        let ( monitor, mut rx ) = FileMonitor::new( &config, Handle::current() );
        assert_eq!( monitor.start( &[ dir.path().to_path_buf() ] ), 1 );

        let path = dir.path().join( "new.mp3" );
        fs::write( &path, b"x" ).unwrap();

        let received = tokio::time::timeout( Duration::from_secs( 5 ), rx.recv() ).await.unwrap().unwrap();
        let FileEvent::Added( added ) = received else {
            panic!( "unexpected event {:?}", received );
        };
        assert_eq!( added.file_name(), path.file_name() );
    }


    #[tokio::test( flavor = "multi_thread" )]
    async fn test_moves_into_and_out_of_root_are_reported() {
        let dir = tempfile::tempdir().unwrap();
        let library = dir.path().join( "library" );
        let outside = dir.path().join( "outside" );
        fs::create_dir_all( &library ).unwrap();
        fs::create_dir_all( &outside ).unwrap();
        fs::write( outside.join( "moved.mp3" ), b"x" ).unwrap();

        let config = LibraryConfig {
            created_delay_ms: 50,
            ..LibraryConfig::default()
        };
        let ( monitor, mut rx ) = FileMonitor::new( &config, Handle::current() );
        assert_eq!( monitor.start( &[ library.clone() ] ), 1 );

        fs::rename( outside.join( "moved.mp3" ), library.join( "moved.mp3" ) ).unwrap();
        let received = tokio::time::timeout( Duration::from_secs( 5 ), rx.recv() ).await.unwrap().unwrap();
        let FileEvent::Added( added ) = received else {
            panic!( "expected an addition, got {:?}", received );
        };
        assert_eq!( added.file_name(), Some( std::ffi::OsStr::new( "moved.mp3" ) ) );

        fs::rename( library.join( "moved.mp3" ), outside.join( "moved.mp3" ) ).unwrap();
        let received = tokio::time::timeout( Duration::from_secs( 5 ), rx.recv() ).await.unwrap().unwrap();
        let FileEvent::Removed( removed ) = received else {
            panic!( "expected a removal, got {:?}", received );
        };
        assert_eq!( removed.file_name(), Some( std::ffi::OsStr::new( "moved.mp3" ) ) );
    }
}
