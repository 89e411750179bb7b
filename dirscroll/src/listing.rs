//! Built-in filter and sort policies for snapshot builds.
//!
//! Both are plain data so they can live in a [`crate::SessionConfig`]. Callers
//! that need something else can pass arbitrary closures to
//! [`SnapshotSource::build`](crate::SnapshotSource::build) instead.

use std::cmp::Ordering;

use regex::{Regex, RegexBuilder};

use crate::snapshot::EntryDescriptor;

/// Sort keys for snapshot ordering
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SortBy {
    /// Sort by name using natural (digit-aware) ordering
    #[default]
    Name,
    /// Sort by full extension (`.tar.gz`), then name
    Extension,
    /// Sort by file size
    Size,
    /// Sort by last modified time
    Modified,
}

/// Sort policy applied when a snapshot is built.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SortSpec {
    /// Sort key.
    pub by: SortBy,
    /// Sort order flag (true = ascending).
    pub ascending: bool,
    /// Put directories before files.
    pub dirs_first: bool,
}

impl Default for SortSpec {
    fn default() -> Self {
        Self {
            by: SortBy::Name,
            ascending: true,
            dirs_first: true,
        }
    }
}

impl SortSpec {
    /// Ascending, directories-first sort by `by`.
    pub fn new(by: SortBy) -> Self {
        Self {
            by,
            ..Self::default()
        }
    }

    /// Reverse the sort order.
    pub fn descending(mut self) -> Self {
        self.ascending = false;
        self
    }

    /// Enable or disable directories-first grouping.
    pub fn dirs_first(mut self, yes: bool) -> Self {
        self.dirs_first = yes;
        self
    }

    /// Total order over descriptors under this policy.
    pub fn compare(&self, a: &EntryDescriptor, b: &EntryDescriptor) -> Ordering {
        if self.dirs_first && a.is_dir != b.is_dir {
            return b.is_dir.cmp(&a.is_dir);
        }
        let ord = match self.by {
            SortBy::Name => natural_cmp(&a.name.to_lowercase(), &b.name.to_lowercase()),
            SortBy::Extension => {
                let al = a.name.to_lowercase();
                let bl = b.name.to_lowercase();
                natural_cmp(full_extension(&al), full_extension(&bl))
                    .then_with(|| natural_cmp(&al, &bl))
            }
            SortBy::Size => a.size.unwrap_or(0).cmp(&b.size.unwrap_or(0)),
            SortBy::Modified => a.modified.cmp(&b.modified),
        };
        if self.ascending { ord } else { ord.reverse() }
    }
}

/// Filter policy applied when a snapshot is built.
///
/// The default accepts every entry.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ListingFilter {
    /// Keep entries the platform reports as hidden.
    pub show_hidden: bool,
    /// File extension tokens; empty keeps every file. Directories always pass.
    ///
    /// Tokens are case-insensitive: `png` or `.png` (plain suffix, so
    /// `tar.gz` works), `*.jp?g` style globs over the full extension, `*` for
    /// anything, and `((regex))` matched against the whole name.
    pub extensions: Vec<String>,
    /// Case-insensitive substring the name must contain; empty keeps everything.
    pub search: String,
}

impl Default for ListingFilter {
    fn default() -> Self {
        Self {
            show_hidden: true,
            extensions: Vec::new(),
            search: String::new(),
        }
    }
}

impl ListingFilter {
    /// Show or hide hidden entries.
    pub fn show_hidden(mut self, yes: bool) -> Self {
        self.show_hidden = yes;
        self
    }

    /// Restrict files to the given extension tokens.
    pub fn extensions<I, S>(mut self, tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extensions = tokens.into_iter().map(Into::into).collect();
        self
    }

    /// Require names to contain `query`.
    pub fn search(mut self, query: impl Into<String>) -> Self {
        self.search = query.into();
        self
    }

    /// Whether this filter keeps every entry.
    pub fn accepts_all(&self) -> bool {
        self.show_hidden && self.extensions.is_empty() && self.search.is_empty()
    }

    /// Compile tokens into a reusable matcher.
    ///
    /// Invalid `((regex))` tokens are skipped.
    pub fn compile(&self) -> CompiledFilter {
        CompiledFilter {
            show_hidden: self.show_hidden,
            matchers: compile_matchers(&self.extensions),
            search_lower: (!self.search.is_empty()).then(|| self.search.to_lowercase()),
        }
    }
}

/// A [`ListingFilter`] with its tokens parsed.
#[derive(Clone, Debug)]
pub struct CompiledFilter {
    show_hidden: bool,
    matchers: Vec<NameMatcher>,
    search_lower: Option<String>,
}

impl CompiledFilter {
    /// Whether `entry` passes the filter.
    pub fn matches(&self, entry: &EntryDescriptor) -> bool {
        if !self.show_hidden && entry.is_hidden {
            return false;
        }
        let name_lower = entry.name.to_lowercase();
        if let Some(query) = &self.search_lower {
            if !name_lower.contains(query.as_str()) {
                return false;
            }
        }
        entry.is_dir || self.matches_name(&entry.name, &name_lower)
    }

    fn matches_name(&self, name: &str, name_lower: &str) -> bool {
        if self.matchers.is_empty() {
            return true;
        }
        let ext_full = full_extension(name_lower);
        self.matchers.iter().any(|m| match m {
            NameMatcher::Any => true,
            NameMatcher::Extension(ext) => has_extension_suffix(name_lower, ext),
            NameMatcher::ExtensionGlob(pat) => wildcard_match(pat, ext_full),
            NameMatcher::NameRegex(re) => re.is_match(name),
        })
    }
}

#[derive(Clone, Debug)]
enum NameMatcher {
    Any,
    Extension(String),
    ExtensionGlob(String),
    NameRegex(Regex),
}

fn compile_matchers(tokens: &[String]) -> Vec<NameMatcher> {
    let mut out = Vec::new();
    for token in tokens {
        let t = token.trim();
        if t.is_empty() {
            continue;
        }

        if let Some(re) = parse_regex_token(t) {
            if let Ok(re) = RegexBuilder::new(re).case_insensitive(true).build() {
                out.push(NameMatcher::NameRegex(re));
            }
            continue;
        }

        if t == "*" {
            out.push(NameMatcher::Any);
            continue;
        }

        if t.contains('*') || t.contains('?') {
            out.push(NameMatcher::ExtensionGlob(normalize_extension_glob(t)));
            continue;
        }

        let ext = t.trim_start_matches('.');
        if !ext.is_empty() {
            out.push(NameMatcher::Extension(ext.to_lowercase()));
        }
    }
    out
}

fn parse_regex_token(token: &str) -> Option<&str> {
    if token.starts_with("((") && token.ends_with("))") && token.len() >= 4 {
        Some(&token[2..token.len() - 2])
    } else {
        None
    }
}

fn normalize_extension_glob(token: &str) -> String {
    let t = token.to_lowercase();
    if t.starts_with('.') || t.starts_with('*') || t.starts_with('?') {
        t
    } else {
        format!(".{t}")
    }
}

fn full_extension(name_lower: &str) -> &str {
    name_lower.find('.').map(|i| &name_lower[i..]).unwrap_or("")
}

/// `*` matches any run (including empty), `?` any single byte.
fn wildcard_match(pattern: &str, text: &str) -> bool {
    let p = pattern.as_bytes();
    let t = text.as_bytes();
    let (mut pi, mut ti) = (0usize, 0usize);
    let mut star_pi: Option<usize> = None;
    let mut star_ti = 0usize;

    while ti < t.len() {
        if pi < p.len() && (p[pi] == b'?' || p[pi] == t[ti]) {
            pi += 1;
            ti += 1;
        } else if pi < p.len() && p[pi] == b'*' {
            star_pi = Some(pi);
            pi += 1;
            star_ti = ti;
        } else if let Some(sp) = star_pi {
            pi = sp + 1;
            star_ti += 1;
            ti = star_ti;
        } else {
            return false;
        }
    }

    while pi < p.len() && p[pi] == b'*' {
        pi += 1;
    }
    pi == p.len()
}

fn has_extension_suffix(name_lower: &str, ext: &str) -> bool {
    if ext.is_empty() || !name_lower.ends_with(ext) {
        return false;
    }
    let prefix_len = name_lower.len() - ext.len();
    prefix_len > 0 && name_lower.as_bytes()[prefix_len - 1] == b'.'
}

/// Natural ordering over already lower-cased names: digit runs compare by value.
fn natural_cmp(a: &str, b: &str) -> Ordering {
    let ab = a.as_bytes();
    let bb = b.as_bytes();
    let (mut i, mut j) = (0usize, 0usize);

    while i < ab.len() && j < bb.len() {
        let ca = ab[i];
        let cb = bb[j];

        if ca.is_ascii_digit() && cb.is_ascii_digit() {
            let (a_end, a_trim) = scan_number(ab, i);
            let (b_end, b_trim) = scan_number(bb, j);

            let ord = (a_end - a_trim)
                .cmp(&(b_end - b_trim))
                .then_with(|| ab[a_trim..a_end].cmp(&bb[b_trim..b_end]))
                // Same value: fewer leading zeros first.
                .then_with(|| (a_end - i).cmp(&(b_end - j)));
            if ord != Ordering::Equal {
                return ord;
            }

            i = a_end;
            j = b_end;
            continue;
        }

        if ca != cb {
            return ca.cmp(&cb);
        }
        i += 1;
        j += 1;
    }

    (ab.len() - i).cmp(&(bb.len() - j))
}

/// Returns `(end, first_significant_digit)` for the digit run starting at `start`.
fn scan_number(bytes: &[u8], start: usize) -> (usize, usize) {
    let mut end = start;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    let mut trim = start;
    while trim < end && bytes[trim] == b'0' {
        trim += 1;
    }
    (end, trim)
}
