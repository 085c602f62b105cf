use serde::Serialize;
use uuid::Uuid;

use darkroom_objectstore::Key;

/// Photos are not held by the album record; they point back at it through
/// [`Photo::album_id`] and are listed with `PhotoService::list_album_photos`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Album {
    pub id: Uuid,
    pub name: String,
}

impl Album {
    /// Object store key of a photo in this album. The album name is the key namespace, which is
    /// why albums are never renamed.
    pub fn object_key(&self, hash: &str) -> darkroom_objectstore::Result<Key> {
        Key::namespaced(&self.name, hash)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Photo {
    pub id: Uuid,
    /// object name within the album namespace, eg `<uuid>.png`
    pub hash: String,
    pub album_id: Uuid,
}

/// An album that has not been saved yet; the store assigns its id.
#[derive(Clone, Debug)]
pub struct NewAlbum {
    pub name: String,
}

/// A photo record that has not been saved yet; the store assigns its id.
#[derive(Clone, Debug)]
pub struct NewPhoto {
    pub hash: String,
    pub album_id: Uuid,
}
