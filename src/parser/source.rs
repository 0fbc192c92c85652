//! Classification of module call `source` strings.
//!
//! The module loader only needs to know whether a source lives on disk next
//! to the calling module or has to be fetched; remote sources are further
//! split by kind so identical sources map to the same cache key.

use crate::types::ModuleSource;
use regex::Regex;
use std::sync::LazyLock;

/// Default Terraform registry hostname.
const DEFAULT_REGISTRY: &str = "registry.terraform.io";

static REGISTRY_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    // [hostname/]namespace/name/provider
    Regex::new(r"^(?:([a-zA-Z0-9.-]+\.[a-zA-Z0-9-]+)/)?([a-zA-Z0-9_-]+)/([a-zA-Z0-9_-]+)/([a-zA-Z0-9_-]+)$")
        .expect("Invalid regex")
});

static GIT_PREFIXED_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    // git::<url>[?ref=<ref>][//<subdir>]
    Regex::new(r"^git::([a-z+]+://)?([^?]+?)(?://([^?]+))?(?:\?ref=(.+))?$").expect("Invalid regex")
});

static GIT_SSH_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^git@([^:]+):([^?]+?)(?://([^?]+))?(?:\?ref=(.+))?$").expect("Invalid regex")
});

static GITHUB_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^github\.com/([^/]+)/([^/?]+?)(?://([^?]+))?(?:\?ref=(.+))?$").expect("Invalid regex")
});

static S3_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^s3::https://s3(?:[.-]([a-z0-9-]+))?\.amazonaws\.com/([^/]+)/(.+)$").expect("Invalid regex")
});

static GCS_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^gcs::https://www\.googleapis\.com/storage/v1/([^/]+)/(.+)$").expect("Invalid regex")
});

/// Classify a module source string.
///
/// ```rust
/// use tfresolve::parser::parse_module_source;
/// use tfresolve::types::ModuleSource;
///
/// assert!(parse_module_source("./modules/vpc").is_local());
/// assert!(matches!(
///     parse_module_source("terraform-aws-modules/vpc/aws"),
///     ModuleSource::Registry { .. }
/// ));
/// assert!(matches!(
///     parse_module_source("git::https://example.com/vpc.git?ref=v1.2.0"),
///     ModuleSource::Git { .. }
/// ));
/// ```
#[must_use]
pub fn parse_module_source(source: &str) -> ModuleSource {
    let source = source.trim();

    if is_local_path(source) {
        return ModuleSource::Local {
            path: source.to_string(),
        };
    }

    let parsers: [fn(&str) -> Option<ModuleSource>; 5] = [
        parse_git,
        parse_s3,
        parse_gcs,
        parse_registry,
        parse_http,
    ];
    if let Some(parsed) = parsers.iter().find_map(|parse| parse(source)) {
        return parsed;
    }

    tracing::debug!(source = %source, "Unrecognized module source");
    ModuleSource::Unknown(source.to_string())
}

/// Local paths must start with `./` or `../`; absolute paths are accepted too.
fn is_local_path(source: &str) -> bool {
    source.starts_with("./") || source.starts_with("../") || source.starts_with('/')
}

fn git_source(host: String, url: String, caps: &regex::Captures<'_>, subdir: usize, ref_: usize) -> ModuleSource {
    ModuleSource::Git {
        host,
        url,
        ref_: caps.get(ref_).map(|m| m.as_str().to_string()),
        subdir: caps.get(subdir).map(|m| m.as_str().to_string()),
    }
}

fn parse_git(source: &str) -> Option<ModuleSource> {
    if let Some(caps) = GIT_PREFIXED_PATTERN.captures(source) {
        let scheme = caps.get(1).map_or("", |m| m.as_str());
        let rest = caps.get(2)?.as_str();
        return Some(git_source(rest.to_string(), format!("{scheme}{rest}"), &caps, 3, 4));
    }

    if let Some(caps) = GIT_SSH_PATTERN.captures(source) {
        let host = caps.get(1)?.as_str();
        let path = caps.get(2)?.as_str();
        return Some(git_source(
            format!("{host}/{path}"),
            format!("ssh://git@{host}/{path}"),
            &caps,
            3,
            4,
        ));
    }

    let caps = GITHUB_PATTERN.captures(source)?;
    let owner = caps.get(1)?.as_str();
    let repo = caps.get(2)?.as_str().trim_end_matches(".git");
    Some(git_source(
        format!("github.com/{owner}/{repo}.git"),
        format!("https://github.com/{owner}/{repo}.git"),
        &caps,
        3,
        4,
    ))
}

fn parse_s3(source: &str) -> Option<ModuleSource> {
    let caps = S3_PATTERN.captures(source)?;
    Some(ModuleSource::S3 {
        bucket: caps.get(2)?.as_str().to_string(),
        key: caps.get(3)?.as_str().to_string(),
        region: caps.get(1).map(|m| m.as_str().to_string()),
    })
}

fn parse_gcs(source: &str) -> Option<ModuleSource> {
    let caps = GCS_PATTERN.captures(source)?;
    Some(ModuleSource::Gcs {
        bucket: caps.get(1)?.as_str().to_string(),
        path: caps.get(2)?.as_str().to_string(),
    })
}

fn parse_registry(source: &str) -> Option<ModuleSource> {
    let caps = REGISTRY_PATTERN.captures(source)?;
    Some(ModuleSource::Registry {
        hostname: caps
            .get(1)
            .map_or_else(|| DEFAULT_REGISTRY.to_string(), |m| m.as_str().to_string()),
        namespace: caps.get(2)?.as_str().to_string(),
        name: caps.get(3)?.as_str().to_string(),
        provider: caps.get(4)?.as_str().to_string(),
    })
}

fn parse_http(source: &str) -> Option<ModuleSource> {
    let url = url::Url::parse(source).ok()?;
    matches!(url.scheme(), "http" | "https").then(|| ModuleSource::Http {
        url: source.to_string(),
    })
}
