use uuid::Uuid;

use crate::errors::Result;

/// Globally unique name for one stored object.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Token(Uuid);

impl Token {
    pub fn uuid(&self) -> &Uuid {
        &self.0
    }
}

impl From<Uuid> for Token {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Produces collision-resistant tokens without any coordination between callers or processes.
///
/// A failure here is fatal to the operation that asked for the token; callers must not fall back
/// to a weaker generator.
pub trait IdGenerator: Clone + Send + Sync + 'static {
    fn new_id(&self) -> Result<Token>;
}

/// Random (v4) UUID tokens.
#[derive(Clone, Copy, Debug, Default)]
pub struct UuidV4Generator;

impl IdGenerator for UuidV4Generator {
    fn new_id(&self) -> Result<Token> {
        Ok(Uuid::new_v4().into())
    }
}
