use crate::utils::error::{FsError, Result};
use std::fmt;

/// An absolute path inside a container, already split into components.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContainerPath {
    components: Vec<String>,
}

impl ContainerPath {
    pub fn root() -> Self {
        Self {
            components: Vec::new(),
        }
    }

    pub fn parse(path: &str) -> Result<Self> {
        let invalid = |reason: &str| FsError::InvalidPath {
            path: path.to_string(),
            reason: reason.to_string(),
        };

        if !path.starts_with('/') {
            return Err(invalid("the path does not start with '/'"));
        }
        if path.contains('\0') {
            return Err(invalid("the path contains null bytes"));
        }

        let trimmed = &path[1..];
        let trimmed = trimmed.strip_suffix('/').unwrap_or(trimmed);
        if trimmed.is_empty() {
            return Ok(Self::root());
        }

        let components = trimmed
            .split('/')
            .map(|component| match component {
                "" => Err(invalid("empty path component")),
                "." | ".." => Err(invalid("'.' and '..' are not supported")),
                name => Ok(name.to_string()),
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { components })
    }

    pub fn is_root(&self) -> bool {
        self.components.is_empty()
    }

    pub fn components(&self) -> &[String] {
        &self.components
    }

    /// Parent components and final name; `None` for the root.
    pub fn split_last(&self) -> Option<(&[String], &str)> {
        self.components
            .split_last()
            .map(|(name, parent)| (parent, name.as_str()))
    }

    pub fn join(&self, name: &str) -> Result<Self> {
        validate_name(name)?;
        let mut components = self.components.clone();
        components.push(name.to_string());
        Ok(Self { components })
    }

    pub fn starts_with(&self, other: &ContainerPath) -> bool {
        self.components.starts_with(&other.components)
    }
}

impl fmt::Display for ContainerPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.components.is_empty() {
            return write!(f, "/");
        }
        for component in &self.components {
            write!(f, "/{}", component)?;
        }
        Ok(())
    }
}

pub fn validate_name(name: &str) -> Result<()> {
    let invalid = |reason: &str| FsError::InvalidName {
        name: name.to_string(),
        reason: reason.to_string(),
    };

    if name.is_empty() {
        return Err(invalid("name is empty"));
    }
    if name.contains('/') {
        return Err(invalid("contains '/'"));
    }
    if name.contains('\0') {
        return Err(invalid("contains null bytes"));
    }
    if name == "." || name == ".." {
        return Err(invalid("reserved name"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_root_and_nested() {
        assert!(ContainerPath::parse("/").unwrap().is_root());

        let path = ContainerPath::parse("/usr/bin").unwrap();
        assert_eq!(path.components(), ["usr", "bin"]);
        assert_eq!(path.to_string(), "/usr/bin");

        let (parent, name) = path.split_last().unwrap();
        assert_eq!(parent, ["usr"]);
        assert_eq!(name, "bin");
    }

    #[test]
    fn test_trailing_slash_is_ignored() {
        assert_eq!(
            ContainerPath::parse("/usr/").unwrap(),
            ContainerPath::parse("/usr").unwrap()
        );
    }

    #[test]
    fn test_rejects_bad_paths() {
        assert!(matches!(
            ContainerPath::parse("etc"),
            Err(FsError::InvalidPath { .. })
        ));
        assert!(ContainerPath::parse("").is_err());
        assert!(ContainerPath::parse("//etc").is_err());
        assert!(ContainerPath::parse("/usr//bin").is_err());
        assert!(ContainerPath::parse("/usr/../etc").is_err());
        assert!(ContainerPath::parse("/a\0b").is_err());
    }

    #[test]
    fn test_validate_name() {
        assert!(validate_name("a.txt").is_ok());
        assert!(validate_name("").is_err());
        assert!(validate_name("a/b").is_err());
        assert!(validate_name("..").is_err());
    }

    #[test]
    fn test_starts_with() {
        let etc = ContainerPath::parse("/etc").unwrap();
        let etc_bin = ContainerPath::parse("/etc/bin").unwrap();
        assert!(etc_bin.starts_with(&etc));
        assert!(etc.starts_with(&etc));
        assert!(!etc.starts_with(&etc_bin));
        assert!(etc.starts_with(&ContainerPath::root()));
    }
}
