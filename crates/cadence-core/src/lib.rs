//! Cadence Core - Music library engine
//!
//! This crate provides the core functionality of the Cadence library:
//! scanning and tag extraction, derived album/artist/folder views, debounced
//! rebuilds with an on-disk cache, filesystem monitoring, playlists and the
//! playback queue.

pub mod aggregate;
pub mod cache;
pub mod cancel;
pub mod config;
pub mod data_manager;
pub mod demo;
pub mod events;
pub mod folder_tree;
pub mod library;
pub mod model;
pub mod monitor;
pub mod playlist_sync;
pub mod playlists;
pub mod queue;
pub mod scan;
pub mod scanner;
pub mod scheduler;
pub mod search;
pub mod tags;

pub use cache::{ CacheError, LibraryCache };
pub use cancel::CancelToken;
pub use config::{ ConfigError, LibraryConfig };
pub use data_manager::{ LibraryDataManager, LibraryEvent, LibrarySnapshot };
pub use library::{ Library, LibraryError, LibraryOptions };
pub use model::{ AlbumGroup, ArtistGroup, FolderNode, Playlist, PlaylistKind, Song, SongMetadata };
pub use monitor::{ FileEvent, FileMonitor, MonitorError };
pub use playlists::{ PlaylistStore, PlaylistStoreError };
pub use queue::{ QueueController, RepeatMode };
pub use scan::{ ScanCoordinator, ScanStats };
pub use tags::{ FileTagSource, TagError, TagSource };
