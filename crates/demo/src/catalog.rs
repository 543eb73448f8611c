//! Form types of the demo application: a music catalogue and an
//! organisation directory.

use std::sync::Arc;

use formtree_core::{FieldValues, FormResult, Record, Value};
use formtree_forms::{FormSchema, PropertyOptions, Rule};
use formtree_infra::{InMemoryRecordStore, StoreError};

/// Genres every demo store starts with.
pub const GENRES: [&str; 4] = ["Blues", "Jazz", "Metal", "Other"];

/// Insert the seed genres.
pub fn seed(store: &InMemoryRecordStore) -> Result<(), StoreError> {
    for name in GENRES {
        let mut attributes = FieldValues::new();
        attributes.insert("name".to_string(), Value::text(name));
        store.create("Genre", attributes)?;
    }
    Ok(())
}

pub fn track_form() -> FormResult<Arc<FormSchema>> {
    Ok(FormSchema::builder("TrackForm", "Track")
        .property("name", PropertyOptions::text().validates(Rule::presence()))?
        .property("trackno", PropertyOptions::integer().validates(Rule::range(1.0, 99.0)))?
        .build())
}

pub fn comment_form() -> FormResult<Arc<FormSchema>> {
    Ok(FormSchema::builder("CommentForm", "Comment")
        .property("body", PropertyOptions::text().validates(Rule::length(None, Some(500))))?
        .build())
}

pub fn album_form() -> FormResult<Arc<FormSchema>> {
    Ok(FormSchema::builder("AlbumForm", "Album")
        .property("name", PropertyOptions::text().validates(Rule::presence()))?
        .property("genre", PropertyOptions::record("Genre"))?
        .property("rating", PropertyOptions::integer().validates(Rule::range(0.0, 5.0)))?
        .property("release_date", PropertyOptions::date())?
        .property(
            "tracks",
            // Prebuilt tracks carry a number, so only the name counts.
            PropertyOptions::forms(&track_form()?)
                .reject_if(|values| values.get("name").is_none_or(Value::is_blank))
                .allow_destroy(),
        )?
        .property(
            "comment",
            PropertyOptions::form(&comment_form()?)
                .foreign_key_on_child("album_id")
                .reject_if_all_blank()
                .allow_destroy(),
        )?
        .defaults(|record| {
            if record.one("comment").is_none() {
                record.set_one("comment", Record::new("Comment"));
            }
        })
        .build())
}

/// Artists with their albums; a new artist starts with one album of two
/// numbered tracks.
pub fn artist_form() -> FormResult<Arc<FormSchema>> {
    Ok(FormSchema::builder("ArtistForm", "Artist")
        .property("name", PropertyOptions::text().validates(Rule::presence()))?
        .property(
            "albums",
            PropertyOptions::forms(&album_form()?)
                .reject_if_all_blank()
                .allow_destroy(),
        )?
        .defaults(|record| {
            if record.many("albums").is_empty() {
                let tracks = (1..=2_i64)
                    .map(|trackno| Record::new("Track").with_attr("trackno", trackno))
                    .collect();
                record
                    .many_mut("albums")
                    .push(Record::new("Album").with_many("tracks", tracks));
            }
        })
        .build())
}

pub fn address_form() -> FormResult<Arc<FormSchema>> {
    Ok(FormSchema::builder("OrganisationForm_Address", "Address")
        .properties(&["street", "number"], PropertyOptions::text().validates(Rule::presence()))?
        .build())
}

pub fn person_form() -> FormResult<Arc<FormSchema>> {
    Ok(FormSchema::builder("OrganisationForm_Person", "Person")
        .property("name", PropertyOptions::text().validates(Rule::presence()))?
        .property("birthdate", PropertyOptions::date().validates(Rule::presence()))?
        .build())
}

/// Organisations with one address and any number of people; a new
/// organisation starts with an address and two people.
pub fn organisation_form() -> FormResult<Arc<FormSchema>> {
    Ok(FormSchema::builder("OrganisationForm", "Organisation")
        .property("name", PropertyOptions::text().validates(Rule::presence()))?
        .property("active", PropertyOptions::boolean())?
        .property(
            "address",
            PropertyOptions::form(&address_form()?).foreign_key_on_child("organisation_id"),
        )?
        .property(
            "people",
            PropertyOptions::forms(&person_form()?)
                .reject_if_all_blank()
                .allow_destroy(),
        )?
        .defaults(|record| {
            if record.one("address").is_none() {
                record.set_one("address", Record::new("Address"));
            }
            if record.many("people").is_empty() {
                record.many_mut("people").extend([Record::new("Person"), Record::new("Person")]);
            }
        })
        .build())
}

/// Schema and model for a form name given on the command line.
pub fn lookup(name: &str) -> FormResult<Option<Arc<FormSchema>>> {
    match name {
        "artist" => artist_form().map(Some),
        "album" => album_form().map(Some),
        "organisation" => organisation_form().map(Some),
        _ => Ok(None),
    }
}
