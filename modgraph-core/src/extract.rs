// modgraph-core/src/extract.rs
// Static dependency extraction: find literal specifier strings passed
// to `require(...)` without evaluating the source.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use modgraph_common::error::Result;
use modgraph_common::module::ModuleId;

pub trait ExtractDeps: Send + Sync {
    fn extract(&self, source: &str) -> Result<Vec<String>>;
}

/// Default extractor: a lexical scanner that walks the source once,
/// skipping comments and string/template literals, and collects the
/// string-literal first argument of every `require(...)` call. Parse
/// trouble degrades to fewer (or no) specifiers, never an error.
#[derive(Debug, Default, Clone)]
pub struct RequireScanner;

impl ExtractDeps for RequireScanner {
    fn extract(&self, source: &str) -> Result<Vec<String>> {
        Ok(scan(source))
    }
}

fn scan(source: &str) -> Vec<String> {
    let bytes = source.as_bytes();
    let mut out = Vec::new();
    let mut seen = HashSet::new();
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'/' if bytes.get(i + 1) == Some(&b'/') => {
                while i < bytes.len() && bytes[i] != b'\n' {
                    i += 1;
                }
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                i += 2;
                while i + 1 < bytes.len() && !(bytes[i] == b'*' && bytes[i + 1] == b'/') {
                    i += 1;
                }
                i = (i + 2).min(bytes.len());
            }
            quote @ (b'\'' | b'"' | b'`') => {
                i = skip_string(bytes, i + 1, quote);
            }
            b'r' if at_require(bytes, i) => {
                if let Some((specifier, next)) = require_argument(source, bytes, i + "require".len())
                {
                    if seen.insert(specifier.clone()) {
                        out.push(specifier);
                    }
                    i = next;
                } else {
                    i += "require".len();
                }
            }
            _ => i += 1,
        }
    }
    out
}

fn at_require(bytes: &[u8], i: usize) -> bool {
    if !bytes[i..].starts_with(b"require") {
        return false;
    }
    // not part of a longer identifier or a property access
    if i > 0 {
        let prev = bytes[i - 1];
        if prev.is_ascii_alphanumeric() || prev == b'_' || prev == b'$' || prev == b'.' {
            return false;
        }
    }
    match bytes.get(i + "require".len()) {
        Some(next) => !(next.is_ascii_alphanumeric() || *next == b'_' || *next == b'$'),
        None => false,
    }
}

/// Match `( <ws> <string literal> <ws> )` starting after the
/// `require` keyword; only single-literal-argument calls count.
fn require_argument(source: &str, bytes: &[u8], mut i: usize) -> Option<(String, usize)> {
    i = skip_ws(bytes, i);
    if bytes.get(i) != Some(&b'(') {
        return None;
    }
    i = skip_ws(bytes, i + 1);
    let quote = match bytes.get(i) {
        Some(q @ (b'\'' | b'"')) => *q,
        _ => return None,
    };
    let start = i + 1;
    let end = find_string_end(bytes, start, quote)?;
    let mut i = skip_ws(bytes, end + 1);
    if bytes.get(i) != Some(&b')') {
        return None;
    }
    i += 1;
    let specifier = source.get(start..end)?.to_string();
    if specifier.is_empty() || specifier.contains('\\') {
        return None;
    }
    Some((specifier, i))
}

fn find_string_end(bytes: &[u8], mut i: usize, quote: u8) -> Option<usize> {
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b if b == quote => return Some(i),
            b'\n' => return None,
            _ => i += 1,
        }
    }
    None
}

fn skip_string(bytes: &[u8], mut i: usize, quote: u8) -> usize {
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b if b == quote => return i + 1,
            _ => i += 1,
        }
    }
    i
}

fn skip_ws(bytes: &[u8], mut i: usize) -> usize {
    while i < bytes.len() && bytes[i].is_ascii_whitespace() {
        i += 1;
    }
    i
}

/// Per-session policy disabling extraction for some (or all) modules.
/// A skipped module is treated as having no static dependencies.
#[derive(Clone, Default)]
pub enum NoParse {
    #[default]
    Off,
    All,
    Ids(HashSet<ModuleId>),
    Predicate(Arc<dyn Fn(&ModuleId) -> bool + Send + Sync>),
}

impl NoParse {
    pub fn ids<I: IntoIterator<Item = ModuleId>>(ids: I) -> Self {
        NoParse::Ids(ids.into_iter().collect())
    }

    pub fn predicate<F>(predicate: F) -> Self
    where
        F: Fn(&ModuleId) -> bool + Send + Sync + 'static,
    {
        NoParse::Predicate(Arc::new(predicate))
    }

    pub fn skips(&self, id: &ModuleId) -> bool {
        match self {
            NoParse::Off => false,
            NoParse::All => true,
            NoParse::Ids(ids) => ids.contains(id),
            NoParse::Predicate(predicate) => predicate(id),
        }
    }
}

impl fmt::Debug for NoParse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NoParse::Off => f.write_str("NoParse::Off"),
            NoParse::All => f.write_str("NoParse::All"),
            NoParse::Ids(ids) => f.debug_tuple("NoParse::Ids").field(ids).finish(),
            NoParse::Predicate(_) => f.write_str("NoParse::Predicate(..)"),
        }
    }
}
