use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Identity a client presents when joining a room.
///
/// `name` is the only required field; any other display attributes (colour,
/// avatar, ...) are carried verbatim.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct UserInfo {
    pub name: String,
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

impl UserInfo {
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            attributes: Map::new(),
        }
    }

    /// Drops attributes that would collide with server-assigned presence fields.
    pub fn sanitized(mut self) -> Self {
        self.attributes.remove("id");
        self
    }
}

/// One presence entry: the connection id plus the user's info.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Participant {
    pub id: String,
    #[serde(flatten)]
    pub user: UserInfo,
}
