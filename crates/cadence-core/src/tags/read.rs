//! Tag extraction via Symphonia.

use std::fs::File;
use std::path::Path;
use std::time::Duration;

use symphonia::core::codecs::CODEC_TYPE_NULL;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::{ MediaSourceStream, MediaSourceStreamOptions };
use symphonia::core::meta::{ MetadataOptions, MetadataRevision, StandardTagKey };
use symphonia::core::probe::Hint;

use super::TagError;


/// Everything the library reads from a file's container and tags.
#[derive( Debug, Clone, Default )]
pub struct ProbedTags {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub album_artist: Option<String>,
    pub genre: Option<String>,
    pub year: Option<u32>,
    pub track: Option<u32>,
    pub disc: Option<u32>,
    pub duration: Option<Duration>,
    pub has_art: bool,
}


impl ProbedTags {
    /// Fills unset fields from one metadata revision. Earlier revisions win.
    fn absorb( &mut self, revision: &MetadataRevision ) {
        if !revision.visuals().is_empty() {
            self.has_art = true;
        }

        for tag in revision.tags() {
            let Some( std_key ) = tag.std_key else {
                continue;
            };
            let value = tag.value.to_string();
            let value = value.trim();
            if value.is_empty() {
                continue;
            }

            match std_key {
                StandardTagKey::TrackTitle => set_once( &mut self.title, value.to_string() ),
                StandardTagKey::Artist => set_once( &mut self.artist, value.to_string() ),
                StandardTagKey::Album => set_once( &mut self.album, value.to_string() ),
                StandardTagKey::AlbumArtist => set_once( &mut self.album_artist, value.to_string() ),
                StandardTagKey::Genre => set_once( &mut self.genre, value.to_string() ),
                StandardTagKey::TrackNumber => {
                    if let Some( n ) = leading_number( value ) {
                        set_once( &mut self.track, n );
                    }
                }
                StandardTagKey::DiscNumber => {
                    if let Some( n ) = leading_number( value ) {
                        set_once( &mut self.disc, n );
                    }
                }
                StandardTagKey::Date | StandardTagKey::ReleaseDate => {
                    // "2023" or "2023-01-15"
                    if let Some( year ) = value.split( '-' ).next().and_then( |y| y.trim().parse().ok() ) {
                        set_once( &mut self.year, year );
                    }
                }
                _ => {}
            }
        }
    }
}


/// Probes a file and collects its tags, cover-art presence and duration.
pub fn probe( path: &Path ) -> Result<ProbedTags, TagError> {
    let file = File::open( path )?;
    let mss = MediaSourceStream::new( Box::new( file ), MediaSourceStreamOptions::default() );

    let mut hint = Hint::new();
    if let Some( ext ) = path.extension().and_then( |e| e.to_str() ) {
        hint.with_extension( ext );
    }

    let mut probed = symphonia::default::get_probe()
        .format( &hint, mss, &FormatOptions::default(), &MetadataOptions::default() )
        .map_err( |e| TagError::Unsupported( e.to_string() ) )?;

    let mut tags = ProbedTags::default();

    // Container-level tags (ID3 in front of the stream, etc.)
    if let Some( log ) = probed.metadata.get() {
        if let Some( revision ) = log.current() {
            tags.absorb( revision );
        }
    }

    if let Some( revision ) = probed.format.metadata().current() {
        tags.absorb( revision );
    }

    if let Some( track ) = probed.format
        .tracks()
        .iter()
        .find( |t| t.codec_params.codec != CODEC_TYPE_NULL )
    {
        let params = &track.codec_params;
        if let ( Some( frames ), Some( rate ) ) = ( params.n_frames, params.sample_rate ) {
            if rate > 0 {
                tags.duration = Some( Duration::from_secs_f64( frames as f64 / rate as f64 ) );
            }
        }
    }

    Ok( tags )
}


fn set_once<T>( slot: &mut Option<T>, value: T ) {
    if slot.is_none() {
        *slot = Some( value );
    }
}


/// Parses "3" or "3/12" into 3.
fn leading_number( value: &str ) -> Option<u32> {
    value.split( '/' ).next().and_then( |n| n.trim().parse().ok() )
}


#[cfg( test )]
mod tests {
    use std::fs;
    use std::path::PathBuf;

    use lofty::config::WriteOptions;
    use lofty::picture::{ MimeType, Picture, PictureType };
    use lofty::prelude::*;
    use lofty::probe::Probe;

    use super::*;
    use crate::model::SongMetadata;
    use crate::tags::write;


    /// Silent MPEG-1 Layer III stream: 128 kbps, 44.1 kHz, no padding.
    fn silent_mp3( dir: &Path ) -> PathBuf {
        let mut frame = vec![ 0u8; 417 ];
        frame[ ..4 ].copy_from_slice( &[ 0xFF, 0xFB, 0x90, 0x64 ] );

        let path = dir.join( "time.mp3" );
        fs::write( &path, frame.repeat( 20 ) ).unwrap();
        path
    }


    fn tag( path: &Path ) {
        let metadata = SongMetadata {
            title: "Time".into(),
            artist: "Pink Floyd".into(),
            album: "The Dark Side of the Moon".into(),
            album_artist: "Pink Floyd".into(),
            track: 4,
            ..SongMetadata::default()
        };
        write::save( path, &metadata ).unwrap();
    }


    fn add_cover( path: &Path ) {
        let mut tagged = Probe::open( path ).unwrap().read().unwrap();
        let tag = tagged.primary_tag_mut().unwrap();
        tag.push_picture( Picture::new_unchecked(
            PictureType::CoverFront,
            Some( MimeType::Png ),
            None,
            vec![ 0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A ],
        ));
        tagged.save_to_path( path, WriteOptions::default() ).unwrap();
    }


    #[test]
    fn test_tags_map_to_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = silent_mp3( dir.path() );
        tag( &path );

        let tags = probe( &path ).unwrap();
        assert_eq!( tags.title.as_deref(), Some( "Time" ) );
        assert_eq!( tags.artist.as_deref(), Some( "Pink Floyd" ) );
        assert_eq!( tags.album.as_deref(), Some( "The Dark Side of the Moon" ) );
        assert_eq!( tags.album_artist.as_deref(), Some( "Pink Floyd" ) );
        assert_eq!( tags.track, Some( 4 ) );
        assert!( !tags.has_art );
    }


    #[test]
    fn test_embedded_art_is_detected() {
        let dir = tempfile::tempdir().unwrap();
        let path = silent_mp3( dir.path() );
        tag( &path );
        add_cover( &path );

        let tags = probe( &path ).unwrap();
        assert!( tags.has_art );
        assert_eq!( tags.title.as_deref(), Some( "Time" ) );
    }


    #[test]
    fn test_leading_number() {
        assert_eq!( leading_number( "3" ), Some( 3 ) );
        assert_eq!( leading_number( "07/12" ), Some( 7 ) );
        assert_eq!( leading_number( "side A" ), None );
    }


    #[test]
    fn test_probe_rejects_non_audio() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join( "fake.mp3" );
        std::fs::write( &path, b"this is not audio" ).unwrap();

        assert!( probe( &path ).is_err() );
    }


    #[test]
    fn test_probe_missing_file_is_io_error() {
        let result = probe( Path::new( "/definitely/not/here.mp3" ) );
        assert!( matches!( result, Err( TagError::Io( _ ) ) ) );
    }
}
