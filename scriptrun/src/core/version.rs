//! Loose version parsing and constraint matching for interpreter versions.
//!
//! Interpreters report versions in many shapes (`3.11.4`, `v20.11.1`, `17`,
//! `1.8.0_392`). Versions are normalised and padded to `major.minor.patch`
//! before comparison. Constraints follow the usual range syntax:
//!
//! - `""` / `*` match anything, `latest` / `stable` match any release
//! - `3` / `3.11` match every version with that prefix
//! - comparator sets such as `>=3.9 <3.13`, `~3.11`, `^18`, `3.x`, joined with `||`

use std::cmp::Ordering;
use std::fmt;

use anyhow::{Context, Result, anyhow, bail};

/// Strip decorations that commonly surround a version number.
pub fn normalize(version: &str) -> String {
    let mut version = version.trim();
    if version.is_empty() {
        return String::new();
    }

    for prefix in ["version-", "Version-", "release-", "Release-"] {
        if let Some(rest) = version.strip_prefix(prefix) {
            version = rest;
        }
    }
    if let Some(rest) = version.strip_prefix(['v', 'V']) {
        version = rest;
    }

    // Tool-name prefix such as `jq-1.7`.
    if let Some(idx) = version.find(['-', '_'])
        && idx > 0
        && !version.starts_with(|c: char| c.is_ascii_digit())
        && looks_like_version(&version[idx + 1..])
    {
        version = &version[idx + 1..];
        if let Some(rest) = version.strip_prefix(['v', 'V']) {
            version = rest;
        }
    }

    for suffix in ["-release", "-Release"] {
        if let Some(rest) = version.strip_suffix(suffix) {
            version = rest;
        }
    }
    version.to_string()
}

fn looks_like_version(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_digit() => true,
        Some('v' | 'V') => chars.next().is_some_and(|c| c.is_ascii_digit()),
        _ => false,
    }
}

/// A `major.minor.patch` version with optional pre-release and build metadata.
#[derive(Debug, Clone)]
pub struct Version {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
    pub pre: Option<String>,
    pub build: Option<String>,
}

impl Version {
    pub fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
            pre: None,
            build: None,
        }
    }

    /// Parse a (normalised) version. Missing minor/patch default to zero and
    /// components past the third are ignored.
    pub fn parse(input: &str) -> Result<Self> {
        let normalized = normalize(input);
        if normalized.is_empty() {
            bail!("empty version");
        }
        let (rest, build) = match normalized.split_once('+') {
            Some((rest, build)) => (rest, Some(build.to_string())),
            None => (normalized.as_str(), None),
        };
        let (core, pre) = match rest.split_once('-') {
            Some((core, pre)) if !pre.is_empty() => (core, Some(pre.to_string())),
            Some((core, _)) => (core, None),
            None => (rest, None),
        };

        let mut numbers = [0u64; 3];
        for (idx, part) in core.split('.').enumerate() {
            let value: u64 = part
                .parse()
                .with_context(|| format!("invalid version component {part:?} in {input:?}"))?;
            if idx < numbers.len() {
                numbers[idx] = value;
            }
        }

        Ok(Self {
            major: numbers[0],
            minor: numbers[1],
            patch: numbers[2],
            pre,
            build,
        })
    }

    pub fn is_prerelease(&self) -> bool {
        self.pre.is_some()
    }

    fn core(&self) -> (u64, u64, u64) {
        (self.major, self.minor, self.patch)
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Version {
    /// Build metadata does not take part in ordering.
    fn cmp(&self, other: &Self) -> Ordering {
        self.core()
            .cmp(&other.core())
            .then_with(|| match (&self.pre, &other.pre) {
                (None, None) => Ordering::Equal,
                (None, Some(_)) => Ordering::Greater,
                (Some(_), None) => Ordering::Less,
                (Some(a), Some(b)) => compare_prerelease(a, b),
            })
    }
}

fn compare_prerelease(a: &str, b: &str) -> Ordering {
    let mut left = a.split('.');
    let mut right = b.split('.');
    loop {
        match (left.next(), right.next()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) => {
                let ord = match (x.parse::<u64>(), y.parse::<u64>()) {
                    (Ok(x), Ok(y)) => x.cmp(&y),
                    (Ok(_), Err(_)) => Ordering::Less,
                    (Err(_), Ok(_)) => Ordering::Greater,
                    (Err(_), Err(_)) => x.cmp(y),
                };
                if ord != Ordering::Equal {
                    return ord;
                }
            }
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)?;
        if let Some(pre) = &self.pre {
            write!(f, "-{pre}")?;
        }
        if let Some(build) = &self.build {
            write!(f, "+{build}")?;
        }
        Ok(())
    }
}

/// True for `N` or `N.M` without any range operators.
pub fn is_partial_version(s: &str) -> bool {
    let s = s.trim();
    if s.is_empty() || s == "latest" {
        return false;
    }
    if s.contains(['>', '=', '<', '~', '^', '*']) {
        return false;
    }
    let normalized = normalize(s);
    let dots = normalized.matches('.').count();
    dots <= 1
        && !normalized.is_empty()
        && normalized
            .split('.')
            .all(|part| !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit()))
}

/// Comparison operator of a single range comparator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
}

/// One resolved bound of a range constraint.
#[derive(Debug, Clone)]
pub enum Comparator {
    Cmp(Op, Version),
    /// Matches versions outside `[lower, upper)`.
    Outside(Version, Version),
}

impl Comparator {
    fn matches(&self, version: &Version) -> bool {
        match self {
            Comparator::Cmp(op, bound) => {
                let ord = version.cmp(bound);
                match op {
                    Op::Eq => ord == Ordering::Equal,
                    Op::Ne => ord != Ordering::Equal,
                    Op::Gt => ord == Ordering::Greater,
                    Op::Ge => ord != Ordering::Less,
                    Op::Lt => ord == Ordering::Less,
                    Op::Le => ord != Ordering::Greater,
                }
            }
            Comparator::Outside(lower, upper) => version < lower || version >= upper,
        }
    }

    fn mentions_prerelease(&self) -> bool {
        match self {
            Comparator::Cmp(_, v) => v.is_prerelease(),
            Comparator::Outside(lower, upper) => lower.is_prerelease() || upper.is_prerelease(),
        }
    }
}

/// Version constraint parsed from user input.
#[derive(Debug, Clone)]
pub enum Constraint {
    /// Matches every version, pre-releases included.
    Any,
    /// Matches every version without a pre-release tag.
    Stable,
    /// `major` or `major.minor` prefix match.
    Partial {
        pattern: String,
        major: u64,
        minor: Option<u64>,
    },
    /// Alternatives (`||`) of comparator sets that must all hold.
    Range {
        original: String,
        alternatives: Vec<Vec<Comparator>>,
    },
}

impl Constraint {
    pub fn parse(input: &str) -> Result<Self> {
        let trimmed = input.trim();
        match trimmed {
            "" | "*" => return Ok(Constraint::Any),
            "latest" | "stable" => return Ok(Constraint::Stable),
            _ => {}
        }

        if is_partial_version(trimmed) {
            let pattern = normalize(trimmed);
            let mut parts = pattern.split('.').map(str::parse::<u64>);
            let major = parts
                .next()
                .transpose()
                .ok()
                .flatten()
                .ok_or_else(|| anyhow!("invalid version constraint {trimmed}"))?;
            let minor = parts
                .next()
                .transpose()
                .map_err(|e| anyhow!("invalid version constraint {trimmed}: {e}"))?;
            return Ok(Constraint::Partial {
                pattern,
                major,
                minor,
            });
        }

        let mut alternatives = Vec::new();
        for alternative in trimmed.split("||") {
            let comparators = parse_comparator_set(alternative)
                .with_context(|| format!("invalid version constraint {trimmed}"))?;
            alternatives.push(comparators);
        }
        Ok(Constraint::Range {
            original: trimmed.to_string(),
            alternatives,
        })
    }

    /// Whether `version` (raw interpreter output form) satisfies the constraint.
    pub fn check(&self, version: &str) -> bool {
        if let Constraint::Any = self {
            return true;
        }
        let Ok(parsed) = Version::parse(version) else {
            return false;
        };
        match self {
            Constraint::Any => true,
            Constraint::Stable => !parsed.is_prerelease(),
            Constraint::Partial { major, minor, .. } => {
                parsed.major == *major && minor.is_none_or(|minor| parsed.minor == minor)
            }
            Constraint::Range { alternatives, .. } => alternatives.iter().any(|set| {
                let prerelease_ok =
                    !parsed.is_prerelease() || set.iter().any(Comparator::mentions_prerelease);
                prerelease_ok && set.iter().all(|c| c.matches(&parsed))
            }),
        }
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constraint::Any => f.write_str("*"),
            Constraint::Stable => f.write_str("stable"),
            Constraint::Partial { pattern, .. } => f.write_str(pattern),
            Constraint::Range { original, .. } => f.write_str(original),
        }
    }
}

fn parse_comparator_set(input: &str) -> Result<Vec<Comparator>> {
    let mut tokens: Vec<String> = Vec::new();
    let mut pending_op: Option<&str> = None;
    for raw in input.split([',', ' ', '\t']).filter(|t| !t.is_empty()) {
        if matches!(raw, "=" | "!=" | ">" | ">=" | "<" | "<=" | "~" | "^") {
            if pending_op.is_some() {
                bail!("dangling operator before {raw:?}");
            }
            pending_op = Some(raw);
            continue;
        }
        match pending_op.take() {
            Some(op) => tokens.push(format!("{op}{raw}")),
            None => tokens.push(raw.to_string()),
        }
    }
    if let Some(op) = pending_op {
        bail!("operator {op:?} is missing a version");
    }
    if tokens.is_empty() {
        bail!("empty comparator set");
    }

    let mut comparators = Vec::new();
    for token in tokens {
        comparators.extend(parse_comparator(&token)?);
    }
    Ok(comparators)
}

/// Leading numeric components of a bound, stopping at the first wildcard.
struct Bound {
    parts: Vec<u64>,
    pre: Option<String>,
}

impl Bound {
    fn parse(text: &str) -> Result<Self> {
        let normalized = normalize(text);
        let (core, pre) = match normalized.split_once('-') {
            Some((core, pre)) if !pre.is_empty() => (core.to_string(), Some(pre.to_string())),
            _ => (normalized.clone(), None),
        };
        let core = core.split('+').next().unwrap_or_default();
        let mut parts = Vec::new();
        for part in core.split('.') {
            if matches!(part, "x" | "X" | "*") {
                break;
            }
            let value: u64 = part
                .parse()
                .map_err(|_| anyhow!("invalid version {text:?}"))?;
            if parts.len() < 3 {
                parts.push(value);
            }
        }
        if pre.is_some() && parts.len() < 3 {
            bail!("pre-release requires a full version in {text:?}");
        }
        Ok(Self { parts, pre })
    }

    fn given(&self) -> usize {
        self.parts.len()
    }

    fn part(&self, idx: usize) -> u64 {
        self.parts.get(idx).copied().unwrap_or(0)
    }

    /// Lowest version covered by the bound.
    fn floor(&self) -> Version {
        Version {
            major: self.part(0),
            minor: self.part(1),
            patch: self.part(2),
            pre: self.pre.clone(),
            build: None,
        }
    }

    /// First version above everything the (partial) bound covers.
    fn ceiling(&self) -> Result<Version> {
        Ok(match self.given() {
            1 => Version::new(bump(self.part(0))?, 0, 0),
            2 => Version::new(self.part(0), bump(self.part(1))?, 0),
            _ => Version::new(self.part(0), self.part(1), bump(self.part(2))?),
        })
    }
}

fn bump(component: u64) -> Result<u64> {
    component
        .checked_add(1)
        .ok_or_else(|| anyhow!("version component {component} is too large"))
}

fn parse_comparator(token: &str) -> Result<Vec<Comparator>> {
    let (op, rest) = split_operator(token);
    let bound = Bound::parse(rest)?;
    let given = bound.given();
    let exact = given == 3;

    let comparators = match op {
        "" | "=" | "==" => match given {
            0 => Vec::new(),
            3 => vec![Comparator::Cmp(Op::Eq, bound.floor())],
            _ => vec![
                Comparator::Cmp(Op::Ge, bound.floor()),
                Comparator::Cmp(Op::Lt, bound.ceiling()?),
            ],
        },
        "!=" => match given {
            0 => bail!("{token:?} excludes every version"),
            3 => vec![Comparator::Cmp(Op::Ne, bound.floor())],
            _ => vec![Comparator::Outside(bound.floor(), bound.ceiling()?)],
        },
        ">" if given == 0 => bail!("{token:?} excludes every version"),
        ">" if exact => vec![Comparator::Cmp(Op::Gt, bound.floor())],
        ">" => vec![Comparator::Cmp(Op::Ge, bound.ceiling()?)],
        ">=" => match given {
            0 => Vec::new(),
            _ => vec![Comparator::Cmp(Op::Ge, bound.floor())],
        },
        "<" if given == 0 => bail!("{token:?} excludes every version"),
        "<" => vec![Comparator::Cmp(Op::Lt, bound.floor())],
        "<=" => match given {
            0 => Vec::new(),
            3 => vec![Comparator::Cmp(Op::Le, bound.floor())],
            _ => vec![Comparator::Cmp(Op::Lt, bound.ceiling()?)],
        },
        "~" => match given {
            0 => Vec::new(),
            1 => vec![
                Comparator::Cmp(Op::Ge, bound.floor()),
                Comparator::Cmp(Op::Lt, Version::new(bump(bound.part(0))?, 0, 0)),
            ],
            _ => vec![
                Comparator::Cmp(Op::Ge, bound.floor()),
                Comparator::Cmp(Op::Lt, Version::new(bound.part(0), bump(bound.part(1))?, 0)),
            ],
        },
        "^" => {
            let upper = match (bound.part(0), bound.part(1), given) {
                (0, _, 0) => None,
                (major, _, _) if major > 0 => Some(Version::new(bump(major)?, 0, 0)),
                (0, _, 1) => Some(Version::new(1, 0, 0)),
                (0, minor, _) if minor > 0 => Some(Version::new(0, bump(minor)?, 0)),
                (0, 0, 2) => Some(Version::new(0, 1, 0)),
                _ => Some(Version::new(0, 0, bump(bound.part(2))?)),
            };
            match upper {
                None => Vec::new(),
                Some(upper) => vec![
                    Comparator::Cmp(Op::Ge, bound.floor()),
                    Comparator::Cmp(Op::Lt, upper),
                ],
            }
        }
        other => bail!("unknown operator {other:?}"),
    };
    Ok(comparators)
}

fn split_operator(token: &str) -> (&str, &str) {
    let end = token
        .find(|c: char| !matches!(c, '=' | '!' | '>' | '<' | '~' | '^'))
        .unwrap_or(token.len());
    (&token[..end], token[end..].trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check(constraint: &str, version: &str) -> bool {
        Constraint::parse(constraint)
            .unwrap_or_else(|e| panic!("parse {constraint}: {e:#}"))
            .check(version)
    }

    #[test]
    fn normalize_strips_common_decorations() {
        assert_eq!(normalize(" v1.2.3 "), "1.2.3");
        assert_eq!(normalize("release-2.0"), "2.0");
        assert_eq!(normalize("jq-1.7"), "1.7");
        assert_eq!(normalize("1.4.0-release"), "1.4.0");
        assert_eq!(normalize("1.0.0-rc1"), "1.0.0-rc1");
        assert_eq!(normalize(""), "");
    }

    #[test]
    fn parse_pads_missing_components() {
        let v = Version::parse("17").expect("parse");
        assert_eq!(v, Version::new(17, 0, 0));
        let v = Version::parse("3.11").expect("parse");
        assert_eq!(v, Version::new(3, 11, 0));
        let v = Version::parse("1.8.0.392").expect("parse");
        assert_eq!(v, Version::new(1, 8, 0));
        assert!(Version::parse("three").is_err());
    }

    #[test]
    fn prerelease_sorts_before_release() {
        let rc = Version::parse("1.0.0-rc.1").expect("parse");
        let beta = Version::parse("1.0.0-beta.2").expect("parse");
        let release = Version::parse("1.0.0").expect("parse");
        assert!(beta < rc);
        assert!(rc < release);
        assert_eq!(
            Version::parse("1.0.0+build5").expect("parse"),
            Version::new(1, 0, 0)
        );
    }

    #[test]
    fn partial_versions_are_detected() {
        assert!(is_partial_version("3"));
        assert!(is_partial_version("3.11"));
        assert!(is_partial_version("v18"));
        assert!(!is_partial_version("3.11.4"));
        assert!(!is_partial_version(">=3.9"));
        assert!(!is_partial_version("latest"));
        assert!(!is_partial_version("3.x"));
    }

    #[test]
    fn keyword_constraints() {
        assert!(check("", "1.0.0-alpha"));
        assert!(check("*", "0.0.1"));
        assert!(check("latest", "3.12.1"));
        assert!(!check("stable", "3.13.0-rc1"));
        assert!(!check("stable", "not-a-version"));
    }

    #[test]
    fn partial_constraints_match_prefix() {
        assert!(check("3", "3.11.4"));
        assert!(!check("3", "2.7.18"));
        assert!(check("3.11", "3.11.9"));
        assert!(!check("3.11", "3.12.0"));
        assert!(check("18", "v18.19.0"));
    }

    #[test]
    fn comparator_constraints() {
        assert!(check(">=3.9", "3.11.4"));
        assert!(!check(">=3.9", "3.8.10"));
        assert!(check(">=3.9, <3.12", "3.11.4"));
        assert!(check(">= 3.9 < 3.12", "3.11.4"));
        assert!(!check(">=3.9 <3.12", "3.12.0"));
        assert!(check(">3.11", "3.12.0"));
        assert!(!check(">3.11", "3.11.9"));
        assert!(check("<=3.11", "3.11.9"));
        assert!(check("!=3.10.1", "3.10.2"));
        assert!(!check("!=3.10", "3.10.2"));
        assert!(check("=7.4.6", "7.4.6"));
        assert!(check("7.4.6", "7.4.6"));
        assert!(!check("7.4.6", "7.4.7"));
    }

    #[test]
    fn tilde_and_caret_ranges() {
        assert!(check("~3.9", "3.9.18"));
        assert!(!check("~3.9", "3.10.0"));
        assert!(check("~3", "3.12.0"));
        assert!(check("^18", "18.20.1"));
        assert!(!check("^18", "20.0.0"));
        assert!(check("^0.2.3", "0.2.9"));
        assert!(!check("^0.2.3", "0.3.0"));
        assert!(check("^0.0.3", "0.0.3"));
        assert!(!check("^0.0.3", "0.0.4"));
    }

    #[test]
    fn wildcards_and_alternatives() {
        assert!(check("3.x", "3.7.1"));
        assert!(!check("3.x", "4.0.0"));
        assert!(check("3.11.*", "3.11.2"));
        assert!(check("^16 || ^18", "18.1.0"));
        assert!(!check("^16 || ^18", "17.0.0"));
    }

    #[test]
    fn prereleases_need_opt_in() {
        assert!(!check(">=3.12", "3.13.0-rc1"));
        assert!(check(">=3.13.0-rc0", "3.13.0-rc1"));
    }

    #[test]
    fn invalid_constraints_error() {
        for bad in [">=abc", ">=", "~>", "<*"] {
            let err = Constraint::parse(bad).unwrap_err();
            assert!(
                format!("{err:#}").contains("invalid version constraint"),
                "{bad}: {err:#}"
            );
        }
    }

    #[test]
    fn bounds_at_component_max_are_rejected() {
        let max = u64::MAX;
        for bad in [
            format!(">{max}"),
            format!("<=3.{max}"),
            format!("~{max}"),
            format!("~1.{max}"),
            format!("^{max}"),
            format!("^0.{max}"),
            format!("^0.0.{max}"),
            format!("1.{max}.x"),
        ] {
            let err = Constraint::parse(&bad).unwrap_err();
            let msg = format!("{err:#}");
            assert!(msg.contains("invalid version constraint"), "{bad}: {msg}");
            assert!(msg.contains("too large"), "{bad}: {msg}");
        }
        assert!(check(&format!(">={max}"), &format!("{max}.0.0")));
    }

    #[test]
    fn display_keeps_original_text() {
        assert_eq!(Constraint::parse(">=3.9").expect("parse").to_string(), ">=3.9");
        assert_eq!(Constraint::parse("v3.11").expect("parse").to_string(), "3.11");
        assert_eq!(Constraint::parse("").expect("parse").to_string(), "*");
        assert_eq!(Constraint::parse("latest").expect("parse").to_string(), "stable");
    }
}
