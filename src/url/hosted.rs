//! Recognizers for repositories on well-known code hosts
//!
//! Each recognizer accepts the shapes people actually write in package
//! manifests (`user/repo`, `github:user/repo`, `git@github.com:user/repo.git`,
//! `git+https://github.com/user/repo.git#branch`, browser URLs with
//! `/tree/<branch>`) and answers with the canonical `https://host/user/repo`
//! form. Branches other than `master` are kept as `/blob/<branch>`.

use crate::url::domain::extract_hostname;
use crate::{UrlError, UrlResult};
use url::Url;

/// Describes how a code host spells its repositories
struct Host {
    /// Canonical hostname
    name: &'static str,

    /// Shorthand prefix such as `github:`
    prefix: &'static str,

    /// Whether a bare `user/repo` means this host
    bare_shorthand: bool,
}

const GITHUB: Host = Host {
    name: "github.com",
    prefix: "github:",
    bare_shorthand: true,
};

const BITBUCKET: Host = Host {
    name: "bitbucket.org",
    prefix: "bitbucket:",
    bare_shorthand: false,
};

/// Recognizes GitHub repositories, including the bare `user/repo` shorthand
pub fn github(raw: &str) -> UrlResult<String> {
    recognize(&GITHUB, raw)
}

/// Recognizes Bitbucket repositories
pub fn bitbucket(raw: &str) -> UrlResult<String> {
    recognize(&BITBUCKET, raw)
}

fn recognize(host: &Host, raw: &str) -> UrlResult<String> {
    let raw = raw.trim();

    if let Some(short) = raw.strip_prefix(host.prefix) {
        return shorthand(host, short);
    }

    if host.bare_shorthand && !raw.contains(':') {
        return shorthand(host, raw);
    }

    if let Some(rest) = raw.strip_prefix("git@") {
        return scp_like(host, rest);
    }

    let candidate = raw.strip_prefix("git+").unwrap_or(raw);
    let url = Url::parse(candidate).map_err(|e| UrlError::Parse(e.to_string()))?;

    match extract_hostname(&url) {
        Some(found) if found == host.name => {}
        _ => return Err(UrlError::NotRecognized(raw.to_string())),
    }

    let mut segments = url
        .path_segments()
        .ok_or_else(|| UrlError::NotRecognized(raw.to_string()))?
        .filter(|s| !s.is_empty());

    let (user, repo) = match (segments.next(), segments.next()) {
        (Some(user), Some(repo)) => (user, repo),
        _ => return Err(UrlError::NotRecognized(raw.to_string())),
    };

    let branch = match (segments.next(), segments.next()) {
        (Some("tree" | "blob"), Some(branch)) => Some(branch),
        _ => url.fragment(),
    };

    build(host, user, repo, branch, raw)
}

/// `user/repo` with an optional `#branch`
fn shorthand(host: &Host, short: &str) -> UrlResult<String> {
    let (path, branch) = match short.split_once('#') {
        Some((path, branch)) => (path, Some(branch)),
        None => (short, None),
    };

    let (user, repo) = path
        .split_once('/')
        .ok_or_else(|| UrlError::NotRecognized(short.to_string()))?;

    build(host, user, repo, branch, short)
}

/// `git@host:user/repo.git`
fn scp_like(host: &Host, rest: &str) -> UrlResult<String> {
    let (name, path) = rest
        .split_once(':')
        .ok_or_else(|| UrlError::NotRecognized(rest.to_string()))?;

    if !name.eq_ignore_ascii_case(host.name) {
        return Err(UrlError::NotRecognized(rest.to_string()));
    }

    shorthand(host, path)
}

fn build(host: &Host, user: &str, repo: &str, branch: Option<&str>, raw: &str) -> UrlResult<String> {
    let repo = strip_git_suffix(repo);

    if !is_valid_name(user, false) || !is_valid_name(repo, true) {
        return Err(UrlError::NotRecognized(raw.to_string()));
    }

    let base = format!("https://{}/{}/{}", host.name, user, repo);

    Ok(match branch {
        Some(branch) if !branch.is_empty() && branch != "master" => {
            format!("{}/blob/{}", base, branch)
        }
        _ => base,
    })
}

fn strip_git_suffix(repo: &str) -> &str {
    if repo.len() > 4 && repo[repo.len() - 4..].eq_ignore_ascii_case(".git") {
        &repo[..repo.len() - 4]
    } else {
        repo
    }
}

fn is_valid_name(name: &str, allow_dot: bool) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || (allow_dot && c == '.'))
}
