// Copyright 2026 The opal developers
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Backslash-separated path handling. The root is the empty string or a
//! single `\`; components are matched case-insensitively by the engines.

use opal_err::{Error, FsError, Result};

pub const SEPARATOR: char = '\\';

/// Characters that may not appear in a file or directory name.
const INVALID_NAME_CHARS: &[char] = &['"', '*', '/', ':', '<', '>', '?', '\\', '|'];

pub fn is_root(path: &str) -> bool {
    path.is_empty() || path == "\\"
}

/// Split into components, rejecting empty or oversize ones.
pub fn split(path: &str) -> Result<Vec<&str>> {
    if is_root(path) {
        return Ok(Vec::new());
    }
    let trimmed = path.strip_prefix(SEPARATOR).unwrap_or(path);
    let trimmed = trimmed.strip_suffix(SEPARATOR).unwrap_or(trimmed);
    if trimmed.is_empty() {
        return Err(Error::Fs(FsError::InvalidPath));
    }
    let mut components = Vec::new();
    for component in trimmed.split(SEPARATOR) {
        if component.is_empty() || component.chars().count() > 255 {
            return Err(Error::Fs(FsError::InvalidPath));
        }
        components.push(component);
    }
    Ok(components)
}

pub fn join(dir: &str, name: &str) -> String {
    format!("{}\\{}", dir.trim_end_matches(SEPARATOR), name)
}

/// Split into the parent directory path and the final component. The root
/// itself has neither and is rejected.
pub fn parent_and_name(path: &str) -> Result<(String, &str)> {
    let components = split(path)?;
    let name = components.last().ok_or(Error::Fs(FsError::InvalidPath))?;
    let mut parent = String::from("\\");
    parent.push_str(&components[..components.len() - 1].join("\\"));
    Ok((parent, name))
}

/// Validate a name about to be created. Lookups of arbitrary strings just
/// miss; creation is where malformed names are rejected.
pub fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() || name.chars().count() > 255 || name == "." || name == ".." {
        return Err(Error::Fs(FsError::InvalidName));
    }
    if name.ends_with('.') || name.ends_with(' ') {
        return Err(Error::Fs(FsError::InvalidName));
    }
    if name
        .chars()
        .any(|c| c < ' ' || INVALID_NAME_CHARS.contains(&c))
    {
        return Err(Error::Fs(FsError::InvalidName));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_forms() {
        assert!(is_root(""));
        assert!(is_root("\\"));
        assert!(split("").unwrap().is_empty());
        assert!(split("\\").unwrap().is_empty());
    }

    #[test]
    fn split_components() {
        assert_eq!(split("\\a\\b\\c.txt").unwrap(), vec!["a", "b", "c.txt"]);
        assert_eq!(split("a\\b").unwrap(), vec!["a", "b"]);
        assert_eq!(split("\\a\\b\\").unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn split_rejects_empty_component() {
        assert!(split("\\a\\\\b").is_err());
        assert!(split("\\\\").is_err());
    }

    #[test]
    fn join_and_parent() {
        assert_eq!(join("\\", "a"), "\\a");
        assert_eq!(join("", "a"), "\\a");
        assert_eq!(join("\\a\\b", "c"), "\\a\\b\\c");
        assert_eq!(parent_and_name("\\a\\b\\c").unwrap(), ("\\a\\b".into(), "c"));
        assert_eq!(parent_and_name("\\a").unwrap(), ("\\".into(), "a"));
        assert!(parent_and_name("\\").is_err());
    }

    #[test]
    fn name_validation() {
        assert!(validate_name("hello.txt").is_ok());
        assert!(validate_name("").is_err());
        assert!(validate_name(".").is_err());
        assert!(validate_name("..").is_err());
        assert!(validate_name("a:b").is_err());
        assert!(validate_name("a*b").is_err());
        assert!(validate_name("trailing.").is_err());
        assert!(validate_name("trailing ").is_err());
    }
}
