//! Best-effort tag writing via Lofty.

use std::path::Path;

use lofty::config::WriteOptions;
use lofty::prelude::*;
use lofty::probe::Probe;
use lofty::tag::Tag;

use crate::model::SongMetadata;

use super::TagError;


/// Writes the editable fields of `metadata` into the file's primary tag.
///
/// Empty strings and zero numbers remove the corresponding field. A missing
/// primary tag is created.
pub fn save( path: &Path, metadata: &SongMetadata ) -> Result<(), TagError> {
    let mut tagged_file = Probe::open( path )?.read()?;

    let tag_type = tagged_file.primary_tag_type();
    if tagged_file.tag( tag_type ).is_none() {
        tagged_file.insert_tag( Tag::new( tag_type ) );
    }

    let tag = tagged_file
        .tag_mut( tag_type )
        .ok_or_else( || TagError::InvalidFile( path.to_path_buf() ) )?;

    match non_empty( &metadata.title ) {
        Some( v ) => tag.set_title( v ),
        None => tag.remove_title(),
    }
    match non_empty( &metadata.artist ) {
        Some( v ) => tag.set_artist( v ),
        None => tag.remove_artist(),
    }
    match non_empty( &metadata.album ) {
        Some( v ) => tag.set_album( v ),
        None => tag.remove_album(),
    }
    match non_empty( &metadata.genre ) {
        Some( v ) => tag.set_genre( v ),
        None => tag.remove_genre(),
    }
    match non_empty( &metadata.album_artist ) {
        Some( v ) => {
            tag.insert_text( ItemKey::AlbumArtist, v );
        }
        None => {
            tag.remove_key( &ItemKey::AlbumArtist );
        }
    }

    if metadata.year > 0 {
        tag.insert_text( ItemKey::Year, metadata.year.to_string() );
    } else {
        tag.remove_key( &ItemKey::Year );
    }
    if metadata.track > 0 { tag.set_track( metadata.track ) } else { tag.remove_track() }
    if metadata.disc > 0 { tag.set_disk( metadata.disc ) } else { tag.remove_disk() }

    tagged_file.save_to_path( path, WriteOptions::default() )?;

    tracing::info!( "Saved tags for {:?}", path );
    Ok(())
}


fn non_empty( value: &str ) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() { None } else { Some( trimmed.to_string() ) }
}


#[cfg( test )]
mod tests {
    use super::*;


    #[test]
    fn test_non_empty_trims() {
        assert_eq!( non_empty( "  Title " ), Some( "Title".to_string() ) );
        assert_eq!( non_empty( "   " ), None );
    }


    #[test]
    fn test_save_rejects_non_audio() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join( "fake.mp3" );
        std::fs::write( &path, b"not audio at all" ).unwrap();

        let result = save( &path, &SongMetadata::default() );
        assert!( result.is_err() );
        assert_eq!( std::fs::read( &path ).unwrap(), b"not audio at all" );
    }
}
