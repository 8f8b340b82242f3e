use std::borrow::Borrow;
use std::fmt;
use std::sync::Arc;

/// Identifier of a store: its slot in the shared state tree and its cache key.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StoreId(Arc<str>);

impl StoreId {
    pub fn new(id: impl AsRef<str>) -> Self {
        Self(Arc::from(id.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for StoreId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for StoreId {
    fn from(id: String) -> Self {
        Self(Arc::from(id))
    }
}

impl From<&StoreId> for StoreId {
    fn from(id: &StoreId) -> Self {
        id.clone()
    }
}

impl AsRef<str> for StoreId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for StoreId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for StoreId {
    fn eq(&self, other: &str) -> bool {
        &*self.0 == other
    }
}

impl PartialEq<&str> for StoreId {
    fn eq(&self, other: &&str) -> bool {
        &*self.0 == *other
    }
}

impl fmt::Display for StoreId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for StoreId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.0, f)
    }
}
