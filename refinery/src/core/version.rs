//! Version specifiers for remote filters and their mapping onto git refs.

use std::sync::LazyLock;

use regex::Regex;
use semver::Version;

/// What a remote filter's `version` property asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionSpec {
    /// Highest `<id>-<semver>` tag, or `HEAD` when none exists.
    Latest,
    /// Commit the remote `HEAD` points at.
    Head,
    /// Released version, published as the tag `<id>-<version>`.
    Release(Version),
    /// Any other ref (branch, tag or commit), used verbatim.
    Ref(String),
}

impl VersionSpec {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "latest" => VersionSpec::Latest,
            "HEAD" => VersionSpec::Head,
            _ => match Version::parse(raw) {
                Ok(version) => VersionSpec::Release(version),
                Err(_) => VersionSpec::Ref(raw.to_string()),
            },
        }
    }
}

pub fn release_tag(id: &str, version: &Version) -> String {
    format!("{id}-{version}")
}

/// One `<sha>\t<ref>` line of `git ls-remote`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteRef {
    pub sha: String,
    pub name: String,
}

pub fn parse_ls_remote(output: &str) -> Vec<RemoteRef> {
    output
        .lines()
        .filter_map(|line| {
            let (sha, name) = line.split_once('\t')?;
            Some(RemoteRef {
                sha: sha.trim().to_string(),
                name: name.trim().to_string(),
            })
        })
        .collect()
}

/// Highest released tag for `id` among the listed refs.
pub fn latest_release_tag(id: &str, refs: &[RemoteRef]) -> Option<String> {
    static TAG_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"^refs/tags/([^\^]+)(\^\{\})?$").unwrap());
    let prefix = format!("{id}-");
    refs.iter()
        .filter_map(|remote| TAG_RE.captures(&remote.name))
        .filter_map(|caps| {
            let tag = caps.get(1)?.as_str();
            let version = Version::parse(tag.strip_prefix(&prefix)?).ok()?;
            Some((version, tag.to_string()))
        })
        .max_by(|a, b| a.0.cmp(&b.0))
        .map(|(_, tag)| tag)
}

/// Sha of the remote `HEAD` ref, if listed.
pub fn head_sha(refs: &[RemoteRef]) -> Option<String> {
    refs.iter()
        .find(|remote| remote.name == "HEAD")
        .map(|remote| remote.sha.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    const LS_REMOTE: &str = "\
1111111111111111111111111111111111111111\tHEAD
2222222222222222222222222222222222222222\trefs/tags/json_cleaner-1.0.0
3333333333333333333333333333333333333333\trefs/tags/json_cleaner-1.10.0
4444444444444444444444444444444444444444\trefs/tags/json_cleaner-1.2.0
5555555555555555555555555555555555555555\trefs/tags/json_cleaner-1.2.0^{}
6666666666666666666666666666666666666666\trefs/tags/other-9.0.0
7777777777777777777777777777777777777777\trefs/tags/json_cleaner-beta
";

    #[test]
    fn parses_specifiers() {
        assert_eq!(VersionSpec::parse("latest"), VersionSpec::Latest);
        assert_eq!(VersionSpec::parse("HEAD"), VersionSpec::Head);
        assert_eq!(
            VersionSpec::parse("1.2.3"),
            VersionSpec::Release(Version::new(1, 2, 3))
        );
        assert_eq!(
            VersionSpec::parse("feature/x"),
            VersionSpec::Ref("feature/x".to_string())
        );
    }

    #[test]
    fn latest_tag_compares_semver_not_text() {
        let refs = parse_ls_remote(LS_REMOTE);
        assert_eq!(
            latest_release_tag("json_cleaner", &refs).as_deref(),
            Some("json_cleaner-1.10.0")
        );
    }

    #[test]
    fn latest_tag_none_without_releases() {
        let refs = parse_ls_remote(LS_REMOTE);
        assert_eq!(latest_release_tag("missing", &refs), None);
    }

    #[test]
    fn head_sha_is_found() {
        let refs = parse_ls_remote(LS_REMOTE);
        assert_eq!(
            head_sha(&refs).as_deref(),
            Some("1111111111111111111111111111111111111111")
        );
    }

    #[test]
    fn release_tag_joins_id_and_version() {
        assert_eq!(release_tag("x", &Version::new(0, 3, 1)), "x-0.3.1");
    }
}
