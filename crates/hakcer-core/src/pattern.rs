//! Pattern compilation and budgeted replacement.
//!
//! Patterns use the `regex` crate syntax with JavaScript-style flag letters.
//! Matching is linear in the input size, so there is no catastrophic
//! backtracking to analyse; the [`ExecutionBudget`] still bounds each rule's
//! run so that a single rule over a very large input cannot stall a pass.

use std::fmt;
use std::time::{Duration, Instant};

use regex::{Regex, RegexBuilder};

use crate::errors::{MatcherError, ValidationError};
use crate::template;

/// Flags applied when a rule does not specify any.
pub const DEFAULT_FLAGS: &str = "gi";

/// Default ceiling on the compiled program size (bytes).
pub const DEFAULT_SIZE_LIMIT: usize = 1024 * 1024;

/// Parsed flag set.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PatternFlags {
    /// `g`: replace every match instead of the first.
    pub global: bool,
    /// `i`
    pub case_insensitive: bool,
    /// `m`: `^`/`$` match at line boundaries.
    pub multi_line: bool,
    /// `s`: `.` matches `\n`.
    pub dot_all: bool,
    /// `u`: accepted for compatibility, matching is always Unicode-aware.
    pub unicode: bool,
}

impl PatternFlags {
    /// Parse a flag string such as `"gi"`.
    ///
    /// Unknown, unsupported (`y`, `d`) and repeated flags are rejected.
    pub fn parse(flags: &str) -> Result<Self, ValidationError> {
        let invalid = |reason: String| ValidationError::InvalidFlags {
            flags: flags.to_string(),
            reason,
        };

        let mut parsed = Self::default();
        for c in flags.chars() {
            let slot = match c {
                'g' => &mut parsed.global,
                'i' => &mut parsed.case_insensitive,
                'm' => &mut parsed.multi_line,
                's' => &mut parsed.dot_all,
                'u' => &mut parsed.unicode,
                'y' | 'd' => return Err(invalid(format!("flag '{c}' is not supported"))),
                other => return Err(invalid(format!("unknown flag '{other}'"))),
            };
            if *slot {
                return Err(invalid(format!("flag '{c}' repeated")));
            }
            *slot = true;
        }
        Ok(parsed)
    }
}

impl fmt::Display for PatternFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (set, c) in [
            (self.global, 'g'),
            (self.case_insensitive, 'i'),
            (self.multi_line, 'm'),
            (self.dot_all, 's'),
            (self.unicode, 'u'),
        ] {
            if set {
                write!(f, "{c}")?;
            }
        }
        Ok(())
    }
}

/// Compile-time limits.
#[derive(Clone, Copy, Debug)]
pub struct CompileOptions {
    pub size_limit: usize,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            size_limit: DEFAULT_SIZE_LIMIT,
        }
    }
}

/// Per-rule run limits, checked between matches.
///
/// `max_matches` is the primary guard. It depends only on the input, so a
/// rule that trips it is skipped on every machine. `max_elapsed` is an
/// optional wall-clock backstop; with it set, whether a rule is skipped on a
/// large input depends on machine load, and analysis is no longer
/// reproducible for such inputs. It is off by default.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ExecutionBudget {
    pub max_elapsed: Option<Duration>,
    pub max_matches: usize,
}

impl Default for ExecutionBudget {
    fn default() -> Self {
        Self {
            max_elapsed: None,
            max_matches: 100_000,
        }
    }
}

/// Result of running a matcher that matched at least once.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Replacement {
    pub text: String,
    pub match_count: usize,
}

/// A validated, executable pattern.
#[derive(Clone, Debug)]
pub struct Matcher {
    regex: Regex,
    flags: PatternFlags,
    has_named_groups: bool,
}

/// Compile with default limits.
pub fn compile(pattern: &str, flags: &str) -> Result<Matcher, ValidationError> {
    compile_with(pattern, flags, &CompileOptions::default())
}

/// Validate and compile `pattern` under `flags`.
///
/// Parse failures carry the regex engine's own diagnostic as the reason.
pub fn compile_with(
    pattern: &str,
    flags: &str,
    options: &CompileOptions,
) -> Result<Matcher, ValidationError> {
    let parsed = PatternFlags::parse(flags)?;

    let regex = RegexBuilder::new(pattern)
        .case_insensitive(parsed.case_insensitive)
        .multi_line(parsed.multi_line)
        .dot_matches_new_line(parsed.dot_all)
        .unicode(true)
        .size_limit(options.size_limit)
        .build()
        .map_err(|e| ValidationError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: e.to_string(),
        })?;

    let has_named_groups = regex.capture_names().flatten().next().is_some();

    Ok(Matcher {
        regex,
        flags: parsed,
        has_named_groups,
    })
}

impl Matcher {
    pub fn flags(&self) -> PatternFlags {
        self.flags
    }

    pub fn as_str(&self) -> &str {
        self.regex.as_str()
    }

    pub fn is_match(&self, haystack: &str) -> bool {
        self.regex.is_match(haystack)
    }

    /// Replace matches of this pattern in `haystack` using a JS-style
    /// substitution `template`.
    ///
    /// Global patterns replace every match, others only the first.
    /// Returns `Ok(None)` when nothing matched.
    pub fn replace(
        &self,
        haystack: &str,
        template: &str,
        budget: &ExecutionBudget,
    ) -> Result<Option<Replacement>, MatcherError> {
        let start = Instant::now();
        let limit = if self.flags.global { usize::MAX } else { 1 };

        let mut out = String::with_capacity(haystack.len());
        let mut last = 0;
        let mut match_count = 0usize;

        for caps in self.regex.captures_iter(haystack) {
            let Some(whole) = caps.get(0) else {
                continue;
            };

            match_count += 1;
            if match_count > budget.max_matches {
                return Err(MatcherError::MatchLimit {
                    limit: budget.max_matches,
                });
            }
            if let Some(max_elapsed) = budget.max_elapsed {
                if start.elapsed() > max_elapsed {
                    return Err(MatcherError::BudgetExceeded {
                        budget: max_elapsed,
                        matches: match_count,
                    });
                }
            }

            out.push_str(&haystack[last..whole.start()]);
            template::expand(template, &caps, haystack, self.has_named_groups, &mut out);
            last = whole.end();

            if match_count >= limit {
                break;
            }
        }

        if match_count == 0 {
            return Ok(None);
        }

        out.push_str(&haystack[last..]);
        Ok(Some(Replacement {
            text: out,
            match_count,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(pattern: &str, flags: &str, input: &str, template: &str) -> Option<Replacement> {
        compile(pattern, flags)
            .unwrap()
            .replace(input, template, &ExecutionBudget::default())
            .unwrap()
    }

    #[test]
    fn parse_flags() {
        let f = PatternFlags::parse("gi").unwrap();
        assert!(f.global && f.case_insensitive);
        assert!(!f.multi_line && !f.dot_all);
        assert_eq!(PatternFlags::parse("").unwrap(), PatternFlags::default());
        assert_eq!(PatternFlags::parse("gimsu").unwrap().to_string(), "gimsu");
    }

    #[test]
    fn reject_bad_flags() {
        assert!(matches!(
            PatternFlags::parse("gx"),
            Err(ValidationError::InvalidFlags { .. })
        ));
        assert!(PatternFlags::parse("gg").is_err());
        assert!(PatternFlags::parse("y").is_err());
    }

    #[test]
    fn reject_unbalanced_group() {
        let err = compile("(please", "gi").unwrap_err();
        let ValidationError::InvalidPattern { pattern, reason } = err else {
            panic!("expected InvalidPattern");
        };
        assert_eq!(pattern, "(please");
        assert!(!reason.is_empty());
    }

    #[test]
    fn reject_lookaround() {
        assert!(compile(r"foo(?=bar)", "g").is_err());
    }

    #[test]
    fn size_limit_enforced() {
        let options = CompileOptions { size_limit: 16 };
        assert!(compile_with(r"\w{50}", "g", &options).is_err());
    }

    #[test]
    fn global_case_insensitive_removal() {
        let r = run(r"\bplease\b", "gi", "Please summarize this, please.", "").unwrap();
        assert_eq!(r.text, " summarize this, .");
        assert_eq!(r.match_count, 2);
    }

    #[test]
    fn non_global_replaces_first_only() {
        let r = run("a", "", "banana", "o").unwrap();
        assert_eq!(r.text, "bonana");
        assert_eq!(r.match_count, 1);
    }

    #[test]
    fn case_sensitive_without_i() {
        assert!(run("please", "g", "Please", "").is_none());
    }

    #[test]
    fn no_match_returns_none() {
        assert!(run("xyz", "gi", "hello", "").is_none());
    }

    #[test]
    fn multi_line_anchor() {
        let r = run(r"^\s+", "gm", "a\n   b\n  c", "").unwrap();
        assert_eq!(r.text, "a\nb\nc");
        assert_eq!(r.match_count, 2);
    }

    #[test]
    fn group_references() {
        let r = run(r"(\w+) (\w+)", "", "hello world", "$2 $1").unwrap();
        assert_eq!(r.text, "world hello");
    }

    #[test]
    fn match_limit_trips() {
        let m = compile("a", "g").unwrap();
        let budget = ExecutionBudget {
            max_elapsed: None,
            max_matches: 3,
        };
        let err = m.replace("aaaaa", "", &budget).unwrap_err();
        assert_eq!(err, MatcherError::MatchLimit { limit: 3 });
    }

    #[test]
    fn default_budget_outcome_depends_only_on_input() {
        let m = compile("a", "g").unwrap();
        let budget = ExecutionBudget {
            max_matches: 1000,
            ..ExecutionBudget::default()
        };
        assert_eq!(budget.max_elapsed, None);

        let within = "a".repeat(1000);
        let beyond = "a".repeat(1001);
        for _ in 0..3 {
            assert_eq!(m.replace(&within, "", &budget).unwrap().unwrap().match_count, 1000);
            assert_eq!(
                m.replace(&beyond, "", &budget),
                Err(MatcherError::MatchLimit { limit: 1000 })
            );
        }
    }

    #[test]
    fn time_budget_trips() {
        let m = compile("a", "g").unwrap();
        let budget = ExecutionBudget {
            max_elapsed: Some(Duration::ZERO),
            max_matches: usize::MAX,
        };
        let input = "a".repeat(10_000);
        assert!(matches!(
            m.replace(&input, "", &budget),
            Err(MatcherError::BudgetExceeded { .. })
        ));
    }

    #[test]
    fn unicode_text_preserved() {
        let r = run(r"\s+", "g", "héllo   wörld  ✓", " ").unwrap();
        assert_eq!(r.text, "héllo wörld ✓");
    }
}
