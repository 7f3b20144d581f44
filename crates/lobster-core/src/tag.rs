use std::fmt::{Display, Formatter};
use thiserror::Error;

/// Why a tag could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TagError {
    #[error("tag '{0}' has no namespace")]
    MissingNamespace(String),
    #[error("tag has an empty namespace or name")]
    Empty,
    #[error("tag part '{0}' contains a space")]
    ContainsSpace(String),
    #[error("tag version '{0}' is not an integer")]
    InvalidVersion(String),
}

/// Namespaced identifier of a traced item.
///
/// Text form is `namespace name` with an optional `@version` suffix. The key
/// (`namespace name`) identifies the item; the version only matters when a
/// reference pins one.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Tag {
    namespace: String,
    name: String,
    version: Option<u32>,
}

impl Tag {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Result<Self, TagError> {
        let namespace = namespace.into();
        let name = name.into();
        if namespace.is_empty() || name.is_empty() {
            return Err(TagError::Empty);
        }
        for part in [&namespace, &name] {
            if part.contains(' ') {
                return Err(TagError::ContainsSpace(part.clone()));
            }
        }
        Ok(Self {
            namespace,
            name,
            version: None,
        })
    }

    /// Pin this tag to a version.
    pub fn with_version(mut self, version: Option<u32>) -> Self {
        self.version = version;
        self
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> Option<u32> {
        self.version
    }

    /// Identity of the tagged item, ignoring the version.
    pub fn key(&self) -> String {
        format!("{} {}", self.namespace, self.name)
    }

    /// Parse the full text form, `namespace name[@version]`.
    pub fn parse(text: &str) -> Result<Self, TagError> {
        let Some((namespace, rest)) = text.split_once(' ') else {
            return Err(TagError::MissingNamespace(text.to_string()));
        };
        Self::from_text(namespace, rest)
    }

    /// Parse `name[@version]` within a known namespace.
    pub fn from_text(namespace: &str, text: &str) -> Result<Self, TagError> {
        match text.split_once('@') {
            Some((name, version)) => {
                let version = version
                    .parse::<u32>()
                    .map_err(|_| TagError::InvalidVersion(version.to_string()))?;
                Ok(Self::new(namespace, name)?.with_version(Some(version)))
            }
            None => Self::new(namespace, text),
        }
    }
}

impl Display for Tag {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.namespace, self.name)?;
        if let Some(version) = self.version {
            write!(f, "@{version}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_unversioned() {
        let tag = Tag::parse("req brakes.abs").expect("must parse");
        assert_eq!(tag.namespace(), "req");
        assert_eq!(tag.name(), "brakes.abs");
        assert_eq!(tag.version(), None);
        assert_eq!(tag.key(), "req brakes.abs");
        assert_eq!(tag.to_string(), "req brakes.abs");
    }

    #[test]
    fn parse_versioned() {
        let tag = Tag::parse("req brakes.abs@3").expect("must parse");
        assert_eq!(tag.version(), Some(3));
        assert_eq!(tag.key(), "req brakes.abs");
        assert_eq!(tag.to_string(), "req brakes.abs@3");
    }

    #[test]
    fn parse_rejects_malformed() {
        assert_eq!(
            Tag::parse("nonamespace"),
            Err(TagError::MissingNamespace("nonamespace".into()))
        );
        assert_eq!(
            Tag::parse("req foo@bar"),
            Err(TagError::InvalidVersion("bar".into()))
        );
        assert_eq!(
            Tag::parse("req foo bar"),
            Err(TagError::ContainsSpace("foo bar".into()))
        );
        assert_eq!(Tag::parse("req "), Err(TagError::Empty));
    }
}
