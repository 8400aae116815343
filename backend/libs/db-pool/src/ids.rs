//! Identifier normalization
//!
//! Collections key documents by native `ObjectId`s. Everything above the
//! repository layer works with their 24-character hex form instead.

use mongodb::bson::oid::ObjectId;
use mongodb::bson::Bson;

/// Convert a string identifier back into the native key type
///
/// Strings that are not valid object ids cannot name any stored document, so
/// they yield `None` rather than an error.
pub fn parse_object_id(id: &str) -> Option<ObjectId> {
    ObjectId::parse_str(id.trim()).ok()
}

pub fn object_id_to_string(id: &ObjectId) -> String {
    id.to_hex()
}

/// Normalize the `inserted_id` returned by an insert
pub fn inserted_id_to_string(id: &Bson) -> Option<String> {
    match id {
        Bson::ObjectId(oid) => Some(oid.to_hex()),
        Bson::String(s) => Some(s.clone()),
        _ => None,
    }
}
