// exemption.rs — Test/documentation allow-list for the AnalysisOnly ceiling.
//
// In a Critical domain running in AnalysisOnly mode the agent may still touch
// tests and documentation. Any other path is production code and trips the
// hard ceiling. The allow-list is a set of glob patterns. A pattern with a
// `/` is matched against the full path; a bare pattern such as `*.md` or
// `test_*` is matched against the file name only. `*` never crosses a `/`.

use glob::{MatchOptions, Pattern};

use crate::risk::{AutonomyMode, RiskLevel};

/// Default allow-list, one glob per line.
const DEFAULT_PATTERNS: &str = r#"# Test trees
tests/**
test/**
**/tests/**
**/test/**
__tests__/**
**/__tests__/**

# Test files by naming convention
test_*
*_test.*
*.test.*
*.spec.*
*_spec.*
conftest.py

# Documentation
docs/**
doc/**
**/docs/**
*.md
*.rst
*.adoc
"#;

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// One compiled allow-list entry.
#[derive(Debug, Clone)]
struct Entry {
    pattern: Pattern,
    /// Matched against the file name instead of the full path.
    name_only: bool,
}

impl Entry {
    fn new(raw: &str) -> Result<Self, glob::PatternError> {
        Ok(Self {
            pattern: Pattern::new(raw)?,
            name_only: !raw.contains('/'),
        })
    }

    fn matches(&self, path: &str) -> bool {
        let target = if self.name_only {
            path.rsplit('/').next().unwrap_or(path)
        } else {
            path
        };
        self.pattern.matches_with(target, MATCH_OPTIONS)
    }
}

/// A compiled set of test/documentation path patterns.
#[derive(Debug, Clone)]
pub struct AllowList {
    entries: Vec<Entry>,
    raw_patterns: Vec<String>,
}

impl AllowList {
    /// Compile explicit patterns. Returns `(pattern, reason)` for the first
    /// pattern that does not parse.
    pub fn from_patterns<S: AsRef<str>>(patterns: &[S]) -> Result<Self, (String, String)> {
        let mut compiled = Vec::with_capacity(patterns.len());
        let mut raw_patterns = Vec::with_capacity(patterns.len());
        for raw in patterns {
            let raw = raw.as_ref().trim();
            if raw.is_empty() {
                continue;
            }
            let entry = Entry::new(raw).map_err(|e| (raw.to_string(), e.to_string()))?;
            compiled.push(entry);
            raw_patterns.push(raw.to_string());
        }
        Ok(Self {
            entries: compiled,
            raw_patterns,
        })
    }

    /// Parse newline-separated patterns, skipping blanks and `#` comments.
    /// Unparseable lines are dropped.
    pub fn parse_content(content: &str) -> Self {
        let mut entries = Vec::new();
        let mut raw_patterns = Vec::new();

        for line in content.lines() {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            if let Ok(entry) = Entry::new(trimmed) {
                entries.push(entry);
                raw_patterns.push(trimmed.to_string());
            }
        }

        Self {
            entries,
            raw_patterns,
        }
    }

    /// The built-in allow-list.
    pub fn defaults() -> Self {
        Self::parse_content(DEFAULT_PATTERNS)
    }

    /// Whether a normalized repository path is a test or documentation file.
    pub fn is_allowed(&self, path: &str) -> bool {
        self.entries.iter().any(|e| e.matches(path))
    }

    /// Paths from `paths` that are production code (not on the allow-list).
    pub fn production_paths<'a, S: AsRef<str>>(&self, paths: &'a [S]) -> Vec<&'a str> {
        paths
            .iter()
            .map(|p| p.as_ref())
            .filter(|p| !self.is_allowed(p))
            .collect()
    }

    /// Production paths that breach the AnalysisOnly ceiling.
    ///
    /// Empty unless the risk is Critical and the mode is AnalysisOnly; in that
    /// case every path off the allow-list is returned.
    pub fn ceiling_breaches<'a, S: AsRef<str>>(
        &self,
        risk: RiskLevel,
        mode: AutonomyMode,
        paths: &'a [S],
    ) -> Vec<&'a str> {
        if risk == RiskLevel::Critical && mode == AutonomyMode::AnalysisOnly {
            self.production_paths(paths)
        } else {
            Vec::new()
        }
    }

    pub fn raw_patterns(&self) -> &[String] {
        &self.raw_patterns
    }
}

impl Default for AllowList {
    fn default() -> Self {
        Self::defaults()
    }
}
