use serde::Serialize;

use crate::storage::models::UserId;

/// The authenticated principal a request runs as.
///
/// Issued by the upstream auth gateway; read-only here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Actor {
    pub id: UserId,
    pub roles: Vec<String>,
}

impl Actor {
    pub fn new(id: UserId) -> Self {
        Self {
            id,
            roles: Vec::new(),
        }
    }
}
