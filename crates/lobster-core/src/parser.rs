//! Recursive-descent parser for tracing policy files
//!
//! ```text
//! policy     := levelDecl*
//! levelDecl  := ("requirements"|"implementation"|"activity") STRING "{" body "}"
//! body       := (sourceDecl | traceDecl)*
//! sourceDecl := "source" ":" STRING ("with" filter+)? ";"
//! filter     := "prefix" STRING | "kind" STRING
//!             | "valid_status" "{" STRING ("," STRING)* "}"
//! traceDecl  := "trace" ("to"|"from") ":" STRING ("or" STRING)* ";"
//! ```
//!
//! One token of lookahead, no error recovery: the first fatal diagnostic
//! aborts the parse. Trace targets are checked against the full set of
//! levels once the whole file has been read.

use crate::config::{Config, Filter, FilterKind, Level, LevelKind, SourceSpec};
use crate::diagnostics::Diagnostics;
use crate::error::{Error, Result};
use crate::files::Files;
use crate::lexer::{Keyword, Lexer, Token, TokenKind};
use crate::location::{FileLocation, Location};
use tracing::debug;

const FILTER_PROPERTIES: [&str; 3] = ["prefix", "kind", "valid_status"];

/// Read and parse the policy file at `file_name`.
pub fn load_policy(
    file_name: &str,
    files: &dyn Files,
    diagnostics: &mut Diagnostics,
) -> Result<Config> {
    let text = files.read(file_name).map_err(|source| {
        diagnostics.fatal(Error::Io {
            location: FileLocation::file(file_name).into(),
            source,
        })
    })?;
    parse_policy(file_name, &text, files, diagnostics)
}

/// Parse policy text. `file_name` is only used for diagnostics; declared
/// source files are checked for existence through `files`.
pub fn parse_policy(
    file_name: &str,
    text: &str,
    files: &dyn Files,
    diagnostics: &mut Diagnostics,
) -> Result<Config> {
    let mut parser = Parser {
        lexer: Lexer::new(file_name, text),
        next: None,
        files,
        diagnostics,
        config: Config::new(),
        targets: Vec::new(),
    };
    parser.parse()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    To,
    From,
}

/// A level name used in a trace group, remembered for the post-pass.
struct TraceTarget {
    level: String,
    direction: Direction,
    name: String,
    location: Location,
}

struct Parser<'a> {
    lexer: Lexer<'a>,
    next: Option<Token>,
    files: &'a dyn Files,
    diagnostics: &'a mut Diagnostics,
    config: Config,
    targets: Vec<TraceTarget>,
}

impl Parser<'_> {
    fn parse(mut self) -> Result<Config> {
        self.next = self.pull()?;

        loop {
            let Some(token) = &self.next else { break };
            let kind = match token.kind {
                TokenKind::Keyword(Keyword::Requirements) => Some(LevelKind::Requirements),
                TokenKind::Keyword(Keyword::Implementation) => Some(LevelKind::Implementation),
                TokenKind::Keyword(Keyword::Activity) => Some(LevelKind::Activity),
                _ => None,
            };
            let Some(kind) = kind else {
                return Err(self.unexpected("requirements, implementation or activity"));
            };
            self.parse_level(kind)?;
        }

        self.check_trace_targets()?;
        self.config.derive_tracing();
        debug!(levels = self.config.len(), "parsed tracing policy");
        Ok(self.config)
    }

    fn pull(&mut self) -> Result<Option<Token>> {
        match self.lexer.next() {
            None => Ok(None),
            Some(Ok(token)) => Ok(Some(token)),
            Some(Err(err)) => Err(self.diagnostics.fatal(err)),
        }
    }

    /// Consume the lookahead token.
    fn bump(&mut self) -> Result<Option<Token>> {
        let token = self.next.take();
        self.next = self.pull()?;
        Ok(token)
    }

    fn fatal(&mut self, err: Error) -> Error {
        self.diagnostics.fatal(err)
    }

    fn unexpected(&mut self, expected: &str) -> Error {
        let err = match &self.next {
            Some(token) => Error::Syntax {
                location: token.location.clone(),
                message: format!("expected {expected}, found {}", token.kind),
            },
            None => Error::Syntax {
                location: self.lexer.location(),
                message: format!("expected {expected}, found EOF"),
            },
        };
        self.fatal(err)
    }

    fn peek(&self, kind: &TokenKind) -> bool {
        self.next.as_ref().is_some_and(|t| &t.kind == kind)
    }

    fn peek_keyword(&self, keyword: Keyword) -> bool {
        self.peek(&TokenKind::Keyword(keyword))
    }

    fn expect(&mut self, kind: TokenKind, expected: &str) -> Result<()> {
        if !self.peek(&kind) {
            return Err(self.unexpected(expected));
        }
        self.bump()?;
        Ok(())
    }

    fn expect_string(&mut self) -> Result<(String, Location)> {
        let found = match &self.next {
            Some(Token {
                kind: TokenKind::String(value),
                location,
            }) => Some((value.clone(), location.clone())),
            _ => None,
        };
        let Some(found) = found else {
            return Err(self.unexpected("string"));
        };
        self.bump()?;
        Ok(found)
    }

    fn parse_level(&mut self, kind: LevelKind) -> Result<()> {
        self.bump()?;
        let (name, name_location) = self.expect_string()?;
        if self.config.contains(&name) {
            return Err(self.duplicate_level(&name, &name_location));
        }

        let mut level = Level::new(&name, kind);
        self.expect(TokenKind::OpenBrace, "'{'")?;
        while !self.peek(&TokenKind::CloseBrace) {
            if self.peek_keyword(Keyword::Source) {
                self.parse_source(&mut level)?;
            } else if self.peek_keyword(Keyword::Trace) {
                self.parse_trace(&mut level)?;
            } else {
                return Err(self.unexpected("source, trace or '}'"));
            }
        }
        self.expect(TokenKind::CloseBrace, "'}'")?;

        debug!(level = %name, %kind, sources = level.source.len(), "parsed level");
        if let Err(level) = self.config.insert(level) {
            return Err(self.duplicate_level(&level.name, &name_location));
        }
        Ok(())
    }

    fn duplicate_level(&mut self, name: &str, location: &Location) -> Error {
        self.fatal(Error::semantic(
            location,
            format!("duplicate declaration of level '{name}'"),
        ))
    }

    fn parse_source(&mut self, level: &mut Level) -> Result<()> {
        self.bump()?;
        self.expect(TokenKind::Colon, "':'")?;
        let (file, file_location) = self.expect_string()?;
        if !self.files.exists(&file) {
            return Err(self.fatal(Error::semantic(
                &file_location,
                format!("cannot find file {file}"),
            )));
        }

        let mut source = SourceSpec::new(file);
        if self.peek_keyword(Keyword::With) {
            self.bump()?;
            loop {
                self.parse_filter(level.kind, &mut source)?;
                if self.peek(&TokenKind::Semi) {
                    break;
                }
            }
        }
        self.expect(TokenKind::Semi, "';'")?;

        level.source.push(source);
        Ok(())
    }

    fn parse_filter(&mut self, kind: LevelKind, source: &mut SourceSpec) -> Result<()> {
        let property = match &self.next {
            Some(Token {
                kind: TokenKind::Keyword(keyword),
                location,
            }) => Some((keyword.as_str().to_string(), location.clone())),
            Some(Token {
                kind: TokenKind::Identifier(word),
                location,
            }) => Some((word.clone(), location.clone())),
            _ => None,
        };
        let Some((property, location)) = property else {
            return Err(self.unexpected("property"));
        };
        self.bump()?;

        match property.as_str() {
            "prefix" => {
                let (value, _) = self.expect_string()?;
                source.filters.push(Filter(FilterKind::Prefix, value));
            }
            "kind" => {
                let (value, _) = self.expect_string()?;
                source.filters.push(Filter(FilterKind::Kind, value));
            }
            "valid_status" => {
                if kind != LevelKind::Requirements {
                    return Err(self.fatal(Error::semantic(
                        &location,
                        "property valid_status is only applicable for requirements",
                    )));
                }
                let mut statuses = source.valid_status.take().unwrap_or_default();
                self.expect(TokenKind::OpenBrace, "'{'")?;
                loop {
                    let (value, value_location) = self.expect_string()?;
                    if statuses.contains(&value) {
                        self.diagnostics
                            .warning(value_location, format!("duplicate status {value}"));
                    } else {
                        statuses.push(value);
                    }
                    if self.peek(&TokenKind::Comma) {
                        self.bump()?;
                    } else {
                        break;
                    }
                }
                self.expect(TokenKind::CloseBrace, "'}'")?;
                source.valid_status = Some(statuses);
            }
            other => {
                let hint = did_you_mean(other, FILTER_PROPERTIES);
                return Err(self.fatal(Error::semantic(
                    &location,
                    format!("unknown property '{other}'{hint}"),
                )));
            }
        }
        Ok(())
    }

    fn parse_trace(&mut self, level: &mut Level) -> Result<()> {
        self.bump()?;
        let direction = if self.peek_keyword(Keyword::To) {
            Direction::To
        } else if self.peek_keyword(Keyword::From) {
            Direction::From
        } else {
            return Err(self.unexpected("to or from"));
        };
        self.bump()?;
        self.expect(TokenKind::Colon, "':'")?;

        let mut group = Vec::new();
        loop {
            let (name, location) = self.expect_string()?;
            if direction == Direction::To && name == level.name {
                return Err(self.fatal(Error::semantic(&location, "cannot trace to yourself")));
            }
            self.targets.push(TraceTarget {
                level: level.name.clone(),
                direction,
                name: name.clone(),
                location,
            });
            group.push(name);

            if self.peek_keyword(Keyword::Or) {
                self.bump()?;
            } else {
                break;
            }
        }
        self.expect(TokenKind::Semi, "';'")?;

        match direction {
            Direction::To => level.trace_to.push(group),
            Direction::From => level.trace_from.push(group),
        }
        Ok(())
    }

    /// Every level named in a trace group must exist, and a `trace from`
    /// group may only name levels that trace to the declaring level.
    fn check_trace_targets(&mut self) -> Result<()> {
        let targets = std::mem::take(&mut self.targets);
        for target in &targets {
            let Some(named) = self.config.get(&target.name) else {
                let hint = did_you_mean(&target.name, self.config.names());
                return Err(self.fatal(Error::semantic(
                    &target.location,
                    format!("unknown trace target level '{}'{hint}", target.name),
                )));
            };
            if target.direction == Direction::From && !named.traces_to(&target.level) {
                return Err(self.fatal(Error::semantic(
                    &target.location,
                    format!("{} cannot trace to {} items", target.name, target.level),
                )));
            }
        }
        Ok(())
    }
}

/// `" (did you mean 'x'?)"` for the closest candidate, or nothing.
fn did_you_mean<'a>(word: &str, candidates: impl IntoIterator<Item = &'a str>) -> String {
    candidates
        .into_iter()
        .map(|candidate| (strsim::jaro_winkler(word, candidate), candidate))
        .filter(|(score, _)| *score > 0.8)
        .max_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, candidate)| format!(" (did you mean '{candidate}'?)"))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::Severity;
    use crate::files::MemoryFiles;
    use indoc::indoc;

    fn files() -> MemoryFiles {
        MemoryFiles::new()
            .add("reqs.lobster", "")
            .add("code.lobster", "")
            .add("tests.lobster", "")
    }

    fn parse(text: &str) -> (Result<Config>, Diagnostics) {
        let mut diagnostics = Diagnostics::new();
        let result = parse_policy("lobster.conf", text, &files(), &mut diagnostics);
        (result, diagnostics)
    }

    fn parse_err(text: &str) -> String {
        let (result, diagnostics) = parse(text);
        let err = result.expect_err("policy should be rejected");
        assert!(diagnostics.has_fatal());
        err.to_string()
    }

    const POLICY: &str = indoc! {r#"
        # three tier policy
        requirements "Requirements" {
          source: "reqs.lobster" with valid_status {"approved", "draft"};
        }

        implementation "Code" {
          source: "code.lobster" with prefix "src" kind "function";
          trace to: "Requirements";
        }

        activity "Tests" {
          source: "tests.lobster";
          trace to: "Requirements" or "Code";
        }
    "#};

    #[test]
    fn parses_levels_in_order() {
        let (config, diagnostics) = parse(POLICY);
        let config = config.expect("policy parses");
        assert!(diagnostics.is_empty());

        let names: Vec<&str> = config.names().collect();
        assert_eq!(names, ["Requirements", "Code", "Tests"]);

        let reqs = config.get("Requirements").unwrap();
        assert_eq!(reqs.kind, LevelKind::Requirements);
        assert_eq!(
            reqs.source[0].valid_status,
            Some(vec!["approved".to_string(), "draft".to_string()])
        );
        assert!(reqs.needs_tracing_down);
        assert_eq!(
            reqs.breakdown_requirements,
            vec![vec!["Code".to_string()], vec!["Tests".to_string()]]
        );

        let code = config.get("Code").unwrap();
        assert_eq!(
            code.source[0].filters,
            vec![
                Filter(FilterKind::Prefix, "src".into()),
                Filter(FilterKind::Kind, "function".into())
            ]
        );
        assert!(code.needs_tracing_up);
        assert!(code.needs_tracing_down);

        let tests = config.get("Tests").unwrap();
        assert_eq!(
            tests.trace_to,
            vec![vec!["Requirements".to_string(), "Code".to_string()]]
        );
        assert!(!tests.needs_tracing_down);
    }

    #[test]
    fn parsing_is_deterministic() {
        let (a, _) = parse(POLICY);
        let (b, _) = parse(POLICY);
        assert_eq!(a.unwrap(), b.unwrap());
    }

    #[test]
    fn empty_policy_is_empty_config() {
        let (config, _) = parse("# nothing here\n");
        assert!(config.unwrap().is_empty());
    }

    #[test]
    fn duplicate_level_is_fatal() {
        let err = parse_err(indoc! {r#"
            requirements "Req" {}
            activity "Req" {}
        "#});
        assert_eq!(
            err,
            "lobster.conf:2:10: lobster error: duplicate declaration of level 'Req'"
        );
    }

    #[test]
    fn unknown_property_suggests_closest() {
        let err = parse_err(indoc! {r#"
            requirements "Req" {
              source: "reqs.lobster" with prefx "x";
            }
        "#});
        assert!(err.contains("unknown property 'prefx' (did you mean 'prefix'?)"), "{err}");
    }

    #[test]
    fn valid_status_only_on_requirements() {
        let err = parse_err(indoc! {r#"
            implementation "Code" {
              source: "code.lobster" with valid_status {"ok"};
            }
        "#});
        assert!(
            err.ends_with("property valid_status is only applicable for requirements"),
            "{err}"
        );
    }

    #[test]
    fn missing_source_file_is_fatal() {
        let err = parse_err(indoc! {r#"
            requirements "Req" {
              source: "nowhere.lobster";
            }
        "#});
        assert!(err.ends_with("cannot find file nowhere.lobster"), "{err}");
    }

    #[test]
    fn duplicate_status_is_a_warning() {
        let (config, diagnostics) = parse(indoc! {r#"
            requirements "Req" {
              source: "reqs.lobster" with valid_status {"ok", "ok"};
            }
        "#});
        let config = config.expect("warnings do not abort");
        assert_eq!(
            config.get("Req").unwrap().source[0].valid_status,
            Some(vec!["ok".to_string()])
        );
        let warning = diagnostics.iter().next().unwrap();
        assert_eq!(warning.severity, Severity::Warning);
        assert_eq!(warning.message, "duplicate status ok");
        assert_eq!(warning.location.to_text(), "lobster.conf:2:51");
    }

    #[test]
    fn unknown_trace_target_is_fatal_with_location() {
        let err = parse_err(indoc! {r#"
            requirements "Requirements" {}
            implementation "Code" {
              trace to: "Requirement";
            }
        "#});
        assert_eq!(
            err,
            "lobster.conf:3:13: lobster error: unknown trace target level 'Requirement' \
             (did you mean 'Requirements'?)"
        );
    }

    #[test]
    fn trace_from_must_match_trace_to() {
        let err = parse_err(indoc! {r#"
            requirements "Req" {
              trace from: "Code";
            }
            implementation "Code" {}
        "#});
        assert!(err.ends_with("Code cannot trace to Req items"), "{err}");

        let (config, _) = parse(indoc! {r#"
            requirements "Req" {
              trace from: "Code" or "Tests";
            }
            implementation "Code" { trace to: "Req"; }
            activity "Tests" { trace to: "Req"; }
        "#});
        assert_eq!(
            config.unwrap().get("Req").unwrap().breakdown_requirements,
            vec![vec!["Code".to_string(), "Tests".to_string()]]
        );
    }

    #[test]
    fn cannot_trace_to_yourself() {
        let err = parse_err(r#"requirements "Req" { trace to: "Req"; }"#);
        assert!(err.ends_with("cannot trace to yourself"), "{err}");
    }

    #[test]
    fn syntax_errors() {
        assert_eq!(
            parse_err(r#"source "x""#),
            "lobster.conf:1:1: lobster error: expected requirements, implementation or activity, \
             found keyword source"
        );
        assert!(parse_err(r#"requirements "Req" {"#).ends_with("found EOF"));
        assert!(
            parse_err(r#"requirements "Req" { trace up: "X"; }"#)
                .ends_with("expected to or from, found identifier up")
        );
        assert!(
            parse_err(r#"requirements "Req" { source: "reqs.lobster" with ; }"#)
                .ends_with("expected property, found ';'")
        );
    }

    #[test]
    fn lex_errors_abort_the_parse() {
        let err = parse_err(r#"requirements "Req" { $ }"#);
        assert_eq!(err, "lobster.conf:1:22: lobster error: unexpected character: '$'");
    }
}
