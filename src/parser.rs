//! Recursive-descent parser for exported declarations.
//!
//! The accepted grammar is deliberately small:
//!
//! ```text
//! declaration := MARKER type-word+ NAME '(' params ')' ';'
//! params      := ε | 'void' | param (',' param)*
//! param       := type-word+ NAME
//! type-word   := IDENT | '*'
//! ```
//!
//! Anything outside of it is reported as [`Error::Parse`] rather than being
//! guessed at, with the exception of variadic declarations which are returned
//! as [`Declaration::Variadic`] so the caller can skip them.

use tracing::{debug, warn};

use crate::{
    error::{Error, Result},
    config::Naming,
    lexer::{Lexer, Token, tokenize},
    scanner::ScanRegion,
    signature::{ApiFunctionSignature, Parameter, SignatureSet},
};

/// A statement starting with the export marker, before parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Candidate<'a> {
    /// Header line the statement starts on.
    pub line: usize,
    /// Raw statement text, from the marker up to and including `;`.
    pub text: &'a str,
}

/// Result of parsing one candidate statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Declaration {
    /// A function that can be forwarded through the table.
    Function(ApiFunctionSignature),
    /// A variadic function. Forwarding `...` is impossible in C, so these are
    /// left out of every artifact.
    Variadic {
        /// Best-effort function name, for diagnostics.
        name: String,
        /// Header line the declaration starts on.
        line: usize,
    },
}

/// Collapses every whitespace run to a single space.
#[must_use]
pub fn flatten(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Finds every statement in `region` that starts with `marker` at the
/// beginning of a line (after optional indentation) and runs to the next `;`
/// outside a comment. Lines inside block comments never start a statement.
///
/// # Errors
///
/// Returns [`Error::Parse`] if a statement is never terminated.
pub fn find_candidates<'a>(region: &ScanRegion<'a>, marker: &str) -> Result<Vec<Candidate<'a>>> {
    let text = region.text;
    let mut candidates = Vec::new();
    let mut pos = 0;
    let mut in_comment = false;

    while pos < text.len() {
        let line_end = text[pos..].find('\n').map_or(text.len(), |i| pos + i);
        let line = &text[pos..line_end];
        let body = line.trim_start_matches([' ', '\t']);

        let starts_declaration = !in_comment
            && body
                .strip_prefix(marker)
                .is_some_and(|rest| rest.is_empty() || rest.starts_with(char::is_whitespace));
        if !starts_declaration {
            in_comment = comment_open_after(line, in_comment);
            pos = line_end + 1;
            continue;
        }

        let start = pos + (line.len() - body.len());
        let mut lexer = Lexer::new(&text[start..]);
        if !lexer.by_ref().any(|token| token == Token::Semi) {
            return Err(Error::Parse {
                line: region.line_at(start),
                text: flatten(body),
                reason: "unterminated declaration, expected `;`".into(),
            });
        }
        let end = start + lexer.offset();
        candidates.push(Candidate {
            line: region.line_at(start),
            text: &text[start..end],
        });

        let rest_end = text[end..].find('\n').map_or(text.len(), |i| end + i);
        in_comment = comment_open_after(&text[end..rest_end], false);
        pos = rest_end + 1;
    }

    Ok(candidates)
}

/// Whether a block comment is still open at the end of `line`, given
/// whether one was open at its start.
fn comment_open_after(mut line: &str, mut open: bool) -> bool {
    loop {
        if open {
            let Some(close) = line.find("*/") else {
                return true;
            };
            line = &line[close + 2..];
            open = false;
        } else {
            let line_comment = line.find("//");
            match line.find("/*") {
                Some(block) if line_comment.is_none_or(|c| block < c) => {
                    line = &line[block + 2..];
                    open = true;
                }
                _ => return false,
            }
        }
    }
}

/// Parses every exported declaration in `region` into an ordered signature
/// set. Variadic declarations are logged and skipped.
///
/// # Errors
///
/// Returns the first parse error encountered, or [`Error::DuplicateName`]
/// if two declarations share a name.
pub fn parse_region(region: &ScanRegion<'_>, naming: &Naming) -> Result<SignatureSet> {
    let mut set = SignatureSet::new();
    for candidate in find_candidates(region, &naming.export_marker)? {
        match parse_declaration(&candidate, &naming.export_marker)? {
            Declaration::Function(signature) => {
                check_parameter_names(&candidate, &signature, naming)?;
                debug!(line = signature.line, "parsed `{signature}`");
                set.push(signature)?;
            }
            Declaration::Variadic { name, line } => {
                warn!(line, "skipping variadic function `{name}`, it cannot be forwarded");
            }
        }
    }
    Ok(set)
}

/// Forwarders refer to the table instance by name, so a parameter with the
/// same name would hide it.
fn check_parameter_names(
    candidate: &Candidate<'_>,
    signature: &ApiFunctionSignature,
    naming: &Naming,
) -> Result<()> {
    let instance = &naming.table_instance;
    match signature.parameters.iter().find(|p| p.name == *instance) {
        Some(parameter) => Err(Error::Parse {
            line: candidate.line,
            text: flatten(candidate.text),
            reason: format!(
                "parameter `{}` shadows the table instance `{instance}`, rename it",
                parameter.name
            ),
        }),
        None => Ok(()),
    }
}

/// Parses a single candidate statement.
///
/// # Errors
///
/// Returns [`Error::Parse`] describing the first token that does not fit the
/// grammar.
pub fn parse_declaration(candidate: &Candidate<'_>, marker: &str) -> Result<Declaration> {
    let tokens = tokenize(candidate.text);

    if tokens.contains(&Token::Ellipsis) {
        let name = tokens
            .iter()
            .position(|t| *t == Token::LParen)
            .and_then(|i| i.checked_sub(1))
            .and_then(|i| match tokens[i] {
                Token::Ident(name) => Some(name.to_string()),
                _ => None,
            })
            .unwrap_or_else(|| "<unnamed>".into());
        return Ok(Declaration::Variadic {
            name,
            line: candidate.line,
        });
    }

    DeclParser {
        tokens: &tokens,
        pos: 0,
        candidate,
    }
    .declaration(marker)
    .map(Declaration::Function)
}

struct DeclParser<'t, 'a> {
    tokens: &'t [Token<'a>],
    pos: usize,
    candidate: &'t Candidate<'a>,
}

impl<'a> DeclParser<'_, 'a> {
    fn error(&self, reason: impl Into<String>) -> Error {
        Error::Parse {
            line: self.candidate.line,
            text: flatten(self.candidate.text),
            reason: reason.into(),
        }
    }

    fn peek(&self) -> Option<Token<'a>> {
        self.tokens.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<Token<'a>> {
        let token = self.peek();
        self.pos += 1;
        token
    }

    fn declaration(mut self, marker: &str) -> Result<ApiFunctionSignature> {
        match self.bump() {
            Some(Token::Ident(word)) if word == marker => {}
            _ => return Err(self.error(format!("expected `{marker}`"))),
        }

        let head = self.type_words("return type")?;
        if self.peek() != Some(Token::LParen) {
            return Err(self.error("expected `(` after the function name"));
        }
        let (return_type, name) = self.split_name(head, "function")?;

        self.bump();
        let parameters = self.parameters()?;

        match self.bump() {
            Some(Token::Semi) => {}
            Some(token) => {
                return Err(self.error(format!("unexpected `{token}` after the parameter list")));
            }
            None => return Err(self.error("expected `;`")),
        }
        if let Some(token) = self.peek() {
            return Err(self.error(format!("unexpected `{token}` after `;`")));
        }

        Ok(ApiFunctionSignature {
            name,
            parameters,
            return_type,
            line: self.candidate.line,
        })
    }

    /// Consumes identifiers and `*` up to the next delimiter.
    fn type_words(&mut self, context: &str) -> Result<Vec<Token<'a>>> {
        let mut words = Vec::new();
        while let Some(token) = self.peek() {
            match token {
                Token::Ident(_) | Token::Star => words.push(token),
                Token::LParen | Token::RParen | Token::Comma | Token::Semi => break,
                Token::LBracket => {
                    return Err(
                        self.error(format!("array declarators are not supported in {context}"))
                    );
                }
                other => return Err(self.error(format!("unexpected `{other}` in {context}"))),
            }
            self.pos += 1;
        }
        Ok(words)
    }

    /// Splits `type-word+ NAME` into its normalized type and name.
    fn split_name(&self, words: Vec<Token<'a>>, what: &str) -> Result<(String, String)> {
        let Some((Token::Ident(name), ty)) = words.split_last() else {
            return Err(self.error(format!("expected a {what} name")));
        };
        if !ty.iter().any(|t| matches!(t, Token::Ident(_))) {
            return Err(self.error(format!("{what} `{name}` has no type")));
        }
        Ok((render_type(ty), (*name).to_string()))
    }

    fn parameters(&mut self) -> Result<Vec<Parameter>> {
        match (self.peek(), self.tokens.get(self.pos + 1)) {
            (Some(Token::RParen), _) => {
                self.bump();
                return Ok(Vec::new());
            }
            (Some(Token::Ident("void")), Some(Token::RParen)) => {
                self.pos += 2;
                return Ok(Vec::new());
            }
            _ => {}
        }

        let mut parameters = Vec::new();
        loop {
            let index = parameters.len() + 1;
            let words = self.type_words(&format!("parameter {index}"))?;
            if self.peek() == Some(Token::LParen) {
                return Err(self.error(format!(
                    "function pointer declarator in parameter {index} is not supported, use a typedef"
                )));
            }
            let (ty, name) = self.split_name(words, &format!("parameter {index}"))?;
            parameters.push(Parameter { name, ty });

            match self.bump() {
                Some(Token::Comma) => {}
                Some(Token::RParen) => return Ok(parameters),
                _ => return Err(self.error("expected `,` or `)` in the parameter list")),
            }
        }
    }
}

/// Renders type tokens with one space between words and `*` attached to the
/// word on its left: `const char * const` becomes `const char* const`.
fn render_type(tokens: &[Token<'_>]) -> String {
    let mut out = String::new();
    for token in tokens {
        match token {
            Token::Star => out.push('*'),
            Token::Ident(word) => {
                if !out.is_empty() {
                    out.push(' ');
                }
                out.push_str(word);
            }
            other => out.push_str(&other.to_string()),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::scan;

    const MARKER: &str = "PK_PUBLIC";

    fn parse(text: &str) -> Result<Declaration> {
        parse_declaration(&Candidate { line: 1, text }, MARKER)
    }

    fn parse_fn(text: &str) -> ApiFunctionSignature {
        match parse(text).unwrap() {
            Declaration::Function(signature) => signature,
            other => panic!("expected a function, got {other:?}"),
        }
    }

    fn reason(text: &str) -> String {
        match parse(text).unwrap_err() {
            Error::Parse { reason, .. } => reason,
            other => panic!("expected a parse error, got {other:?}"),
        }
    }

    #[test]
    fn test_simple_declaration() {
        let s = parse_fn("PK_PUBLIC void pkSetGlobal(PKVM* vm, int val);");
        assert_eq!(s.name, "pkSetGlobal");
        assert_eq!(s.return_type, "void");
        assert_eq!(
            s.parameters,
            vec![Parameter::new("vm", "PKVM*"), Parameter::new("val", "int")]
        );
    }

    #[test]
    fn test_whitespace_is_normalized() {
        let a = parse_fn(
            "PK_PUBLIC PkHandle* pkGetFunction(PKVM* vm, PkHandle* module,\n                               const char* name);",
        );
        let b = parse_fn(
            "PK_PUBLIC PkHandle *pkGetFunction(PKVM *vm,PkHandle * module, const  char*name);",
        );
        assert_eq!(a, b);
        assert_eq!(a.return_type, "PkHandle*");
        assert_eq!(a.parameters[2], Parameter::new("name", "const char*"));
    }

    #[test]
    fn test_empty_parameter_lists() {
        assert!(
            parse_fn("PK_PUBLIC PkConfiguration pkNewConfiguration(void);")
                .parameters
                .is_empty()
        );
        assert!(parse_fn("PK_PUBLIC PkConfiguration pkNewConfiguration();").parameters.is_empty());
    }

    #[test]
    fn test_multi_word_and_qualified_types() {
        let s = parse_fn(
            "PK_PUBLIC unsigned long long pkHash(const char* const * names, unsigned int n);",
        );
        assert_eq!(s.return_type, "unsigned long long");
        assert_eq!(s.parameters[0].ty, "const char* const*");
        assert_eq!(s.parameters[1].ty, "unsigned int");
    }

    #[test]
    fn test_void_pointer_parameter_is_not_empty() {
        let s = parse_fn("PK_PUBLIC void pkSetUserData(void* user_data);");
        assert_eq!(s.parameters, vec![Parameter::new("user_data", "void*")]);
    }

    #[test]
    fn test_variadic_is_reported() {
        assert_eq!(
            parse("PK_PUBLIC int sum(int a, int b, ...);").unwrap(),
            Declaration::Variadic {
                name: "sum".into(),
                line: 1
            }
        );
    }

    #[test]
    fn test_malformed_declarations() {
        assert_eq!(reason("PK_PUBLIC int counter;"), "expected `(` after the function name");
        assert_eq!(reason("PK_PUBLIC pkNothing(int a);"), "function `pkNothing` has no type");
        assert_eq!(reason("PK_PUBLIC void f(int);"), "parameter 1 `int` has no type");
        assert_eq!(
            reason("PK_PUBLIC void f(int a[4]);"),
            "array declarators are not supported in parameter 1"
        );
        assert_eq!(
            reason("PK_PUBLIC void f(int a, void (*cb)(int));"),
            "function pointer declarator in parameter 2 is not supported, use a typedef"
        );
        assert_eq!(
            reason("PK_PUBLIC void f(int a) __attribute__((noreturn));"),
            "unexpected `__attribute__` after the parameter list"
        );
        assert_eq!(reason("PK_PUBLIC void f(int a, );"), "expected a parameter 2 name");
        assert_eq!(reason("PK_PUBLIC void f(int& a);"), "unexpected `&` in parameter 1");
    }

    #[test]
    fn test_candidates_span_lines_and_report_header_lines() {
        let header = "\
#define PK_PUBLIC
// POCKETLANG PUBLIC API
PK_PUBLIC void a(void);
  PK_PUBLIC int b(PKVM* vm,
                  int x);
int not_exported(void);
PK_PUBLIC
void c(void); PK_PUBLIC void ignored(void);
";
        let region = scan(header, "POCKETLANG PUBLIC API").unwrap();
        let found = find_candidates(&region, MARKER).unwrap();
        let lines: Vec<_> = found.iter().map(|c| c.line).collect();
        assert_eq!(lines, vec![3, 4, 7]);
        assert_eq!(found[1].text, "PK_PUBLIC int b(PKVM* vm,\n                  int x);");
        assert_eq!(found[2].text, "PK_PUBLIC\nvoid c(void);");
    }

    #[test]
    fn test_marker_prefix_is_not_a_match() {
        let region = scan("API\nPK_PUBLIC_DATA int x;\n", "API").unwrap();
        assert!(find_candidates(&region, MARKER).unwrap().is_empty());
    }

    #[test]
    fn test_unterminated_candidate() {
        let region = scan("API\n\nPK_PUBLIC void a(int x)\n", "API").unwrap();
        let err = find_candidates(&region, MARKER).unwrap_err();
        assert!(matches!(err, Error::Parse { line: 3, .. }));
    }

    #[test]
    fn test_block_commented_declarations_are_ignored() {
        let header = "\
API
/*
PK_PUBLIC void pkOld(void);
 */
PK_PUBLIC void pkNew(void); /* trailing
PK_PUBLIC void pkAlsoOld(void);
*/ PK_PUBLIC void pkSameLine(void);
/* one line */
PK_PUBLIC void pkLast(void);
// not a block /*
PK_PUBLIC void pkAfterLineComment(void);
";
        let region = scan(header, "API").unwrap();
        let names: Vec<_> = parse_region(&region, &Naming::default())
            .unwrap()
            .iter()
            .map(|s| s.name.clone())
            .collect();
        assert_eq!(names, vec!["pkNew", "pkLast", "pkAfterLineComment"]);
    }

    #[test]
    fn test_semicolon_in_comment_does_not_end_declaration() {
        let region = scan(
            "API\nPK_PUBLIC void pkA(int a /* units; ms */);\nPK_PUBLIC void pkB(int b // x;\n  );\n",
            "API",
        )
        .unwrap();
        let found = find_candidates(&region, MARKER).unwrap();
        assert_eq!(found[0].text, "PK_PUBLIC void pkA(int a /* units; ms */);");
        assert_eq!(found[1].text, "PK_PUBLIC void pkB(int b // x;\n  );");

        let set = parse_region(&region, &Naming::default()).unwrap();
        assert_eq!(set.len(), 2);
        let first = set.iter().next().unwrap();
        assert_eq!(first.parameters, vec![Parameter::new("a", "int")]);
    }

    #[test]
    fn test_parameter_named_like_table_instance() {
        let region = scan("API\n\nPK_PUBLIC void pkB(PKVM* pk_api);\n", "API").unwrap();
        match parse_region(&region, &Naming::default()).unwrap_err() {
            Error::Parse { line, text, reason } => {
                assert_eq!(line, 3);
                assert_eq!(text, "PK_PUBLIC void pkB(PKVM* pk_api);");
                assert_eq!(
                    reason,
                    "parameter `pk_api` shadows the table instance `pk_api`, rename it"
                );
            }
            other => panic!("expected a parse error, got {other:?}"),
        }

        let naming = Naming {
            table_instance: "host_api".into(),
            ..Naming::default()
        };
        assert_eq!(parse_region(&region, &naming).unwrap().len(), 1);
    }

    #[test]
    fn test_region_skips_variadic_and_rejects_duplicates() {
        let region = scan(
            "API\nPK_PUBLIC void a(void);\nPK_PUBLIC int sum(int a, ...);\nPK_PUBLIC int b(int x);\n",
            "API",
        )
        .unwrap();
        let set = parse_region(&region, &Naming::default()).unwrap();
        let names: Vec<_> = set.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);

        let region = scan(
            "API\nPK_PUBLIC void a(void);\nPK_PUBLIC void a(int x);\n",
            "API",
        )
        .unwrap();
        assert!(matches!(
            parse_region(&region, &Naming::default()).unwrap_err(),
            Error::DuplicateName { first_line: 2, line: 3, .. }
        ));
    }
}
