//! `.containerinfo` descriptors and the `#!BuildTag` directives they are
//! derived from.
//!
//! A directive is a comment line in the Dockerfile:
//!
//! ```text
//! #!BuildTag opensuse/busybox opensuse/busybox:1.36
//! #!BuildTag: opensuse/busybox:%RELEASE%
//! ```
//!
//! Tokens are whitespace separated; a tag without an explicit version gets
//! `:latest`. Order and duplicates are preserved across all directives.

use std::path::Path;

use cbctest_common::constants::{
    BUILD_TAG_MARKER, DEFAULT_TAG_SUFFIX, DESCRIPTOR_RELEASE, DESCRIPTOR_VERSION,
    OBS_REPOSITORIES_URL,
};
use cbctest_common::error::{HarnessError, Result};
use cbctest_common::types::TestName;
use cbctest_plan::TestCase;
use nom::{
    IResult, Parser,
    bytes::complete::{tag, take_while1},
    character::complete::{char, space0},
    combinator::opt,
    multi::many0,
    sequence::preceded,
};
use serde::{Deserialize, Serialize};

/// Repository entry of a descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repository {
    /// Repository URL.
    pub url: String,
}

/// The metadata file the checker reads next to the image archive.
///
/// Field order is the on-disk key order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Descriptor {
    /// Distribution URL of the build.
    pub disturl: String,
    /// Archive file name, relative to the descriptor.
    pub file: String,
    /// Repositories the image was built from.
    pub repos: Vec<Repository>,
    /// Normalized tags from the build directives.
    pub tags: Vec<String>,
    /// Release string.
    pub release: String,
    /// Version string.
    pub version: String,
}

impl Descriptor {
    /// Descriptor for `test` with the given tags.
    #[must_use]
    pub fn new(test: &TestName, tags: Vec<String>) -> Self {
        Self {
            disturl: test.disturl(),
            file: test.archive_name(),
            repos: vec![Repository {
                url: OBS_REPOSITORIES_URL.to_string(),
            }],
            tags,
            release: DESCRIPTOR_RELEASE.to_string(),
            version: DESCRIPTOR_VERSION.to_string(),
        }
    }
}

/// Tokens following the marker on one directive line.
fn directive(input: &str) -> IResult<&str, Vec<&str>> {
    let (input, _) = tag(BUILD_TAG_MARKER).parse(input)?;
    let (input, _) = opt(char(':')).parse(input)?;
    let (input, tokens) =
        many0(preceded(space0, take_while1(|c: char| !c.is_whitespace()))).parse(input)?;
    let (input, _) = space0.parse(input)?;
    Ok((input, tokens))
}

/// Whether `line` starts with the marker as a whole word.
fn is_directive_line(line: &str) -> bool {
    line.strip_prefix(BUILD_TAG_MARKER)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with([':', ' ', '\t']))
}

/// Appends the default suffix to a tag without an explicit version.
///
/// The version is looked for in the last path segment only, so a registry
/// port (`registry:5000/foo`) does not count as one.
#[must_use]
pub fn normalize_tag(token: &str) -> String {
    let last_segment = token.rsplit('/').next().unwrap_or(token);
    if last_segment.contains(':') {
        token.to_string()
    } else {
        format!("{token}:{DEFAULT_TAG_SUFFIX}")
    }
}

/// Collects the normalized tags of every directive in `content`.
///
/// `path` is only used for error locations.
///
/// # Errors
///
/// Returns a `Directive` error for a marker line without any tag.
pub fn parse_build_tags(content: &str, path: &Path) -> Result<Vec<String>> {
    let mut tags = Vec::new();
    for (idx, raw) in content.lines().enumerate() {
        let line = raw.trim();
        if !is_directive_line(line) {
            continue;
        }
        let invalid = |message: &str| HarnessError::Directive {
            path: path.to_path_buf(),
            line: idx + 1,
            message: message.to_string(),
        };
        let (rest, tokens) = directive(line).map_err(|_| invalid("unparsable directive"))?;
        if !rest.is_empty() {
            return Err(invalid("unexpected trailing input"));
        }
        let before = tags.len();
        tags.extend(
            tokens
                .into_iter()
                .map(|t| t.trim_end_matches([',', ':']))
                .filter(|t| !t.is_empty())
                .map(normalize_tag),
        );
        if tags.len() == before {
            return Err(invalid(&format!("no tags after {BUILD_TAG_MARKER}")));
        }
    }
    Ok(tags)
}

/// Derives the descriptor of `case` from its Dockerfile.
///
/// # Errors
///
/// Returns an error if the Dockerfile cannot be read or holds an invalid
/// directive.
pub fn describe(case: &TestCase) -> Result<Descriptor> {
    let dockerfile = case.dockerfile();
    let content =
        std::fs::read_to_string(&dockerfile).map_err(|e| HarnessError::io(&dockerfile, e))?;
    let tags = parse_build_tags(&content, &dockerfile)?;
    Ok(Descriptor::new(&case.name, tags))
}

/// Writes `descriptor` as pretty JSON to the descriptor path of `case`,
/// replacing any previous one.
///
/// # Errors
///
/// Returns an error if the file cannot be written.
pub fn write_descriptor(case: &TestCase, descriptor: &Descriptor) -> Result<()> {
    let path = case.descriptor();
    let json = serde_json::to_string_pretty(descriptor)?;
    std::fs::write(&path, json + "\n").map_err(|e| HarnessError::io(&path, e))?;
    tracing::info!(test = %case.name, tags = descriptor.tags.len(), path = %path.display(), "wrote descriptor");
    Ok(())
}
