use semver::Version;

/// Whether `latest` orders after `current`.
///
/// Both sides go through [`parse_semver`]. When either side is not a
/// version at all, any textual difference counts as newer.
#[must_use]
pub fn is_newer_version(latest: &str, current: &str) -> bool {
    match (parse_semver(latest), parse_semver(current)) {
        (Some(latest), Some(current)) => latest > current,
        _ => strip_prefix(latest) != strip_prefix(current),
    }
}

/// Lenient parse of a version as published to the update server.
///
/// Surrounding whitespace and a leading `v`/`V` are ignored, and `1` or
/// `1.2` are padded to `1.0.0` and `1.2.0` with any pre-release or build
/// suffix kept.
pub(crate) fn parse_semver(raw: &str) -> Option<Version> {
    let version = strip_prefix(raw);
    if let Ok(parsed) = Version::parse(version) {
        return Some(parsed);
    }

    let (core, extra) = version
        .find(['-', '+'])
        .map_or((version, ""), |idx| version.split_at(idx));
    let components = core
        .split('.')
        .map(|part| part.parse::<u64>().ok())
        .collect::<Option<Vec<_>>>()?;

    let padded = match components.as_slice() {
        [major] => format!("{major}.0.0{extra}"),
        [major, minor] => format!("{major}.{minor}.0{extra}"),
        _ => return None,
    };
    Version::parse(&padded).ok()
}

fn strip_prefix(raw: &str) -> &str {
    let trimmed = raw.trim();
    trimmed.strip_prefix(['v', 'V']).unwrap_or(trimmed)
}
