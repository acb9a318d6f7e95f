/// How the harness should reach the user's code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryPoint {
    /// Call the named top-level function.
    Function(String),
    /// Evaluate the whole fragment as an expression and call the result.
    Expression,
}

/// Finds the entry point: the first `function <name>` declared at top level,
/// else the first top-level `const`/`let`/`var <name> =` bound to a function
/// or arrow expression.
///
/// Top level means outside any braces, parentheses or brackets. A declaration
/// must also start a statement, so `(function add() {})` and
/// `x = function impl() {}` are expressions, not declarations. Strings,
/// template literals and comments are skipped.
pub fn discover_entry_point(code: &str) -> EntryPoint {
    let chars: Vec<char> = code.chars().collect();
    let mut depth = 0usize;
    let mut at_statement = true;
    let mut last: Option<char> = None;
    let mut binding: Option<String> = None;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            '/' if chars.get(i + 1) == Some(&'/') => {
                while i < chars.len() && chars[i] != '\n' {
                    i += 1;
                }
                continue;
            }
            '/' if chars.get(i + 1) == Some(&'*') => {
                i += 2;
                while i < chars.len() && !(chars[i] == '*' && chars.get(i + 1) == Some(&'/')) {
                    i += 1;
                }
                i += 2;
                continue;
            }
            '"' | '\'' | '`' => {
                i = skip_string(&chars, i);
                at_statement = false;
                last = Some(c);
                continue;
            }
            // Automatic semicolon insertion.
            '\n' if !last.is_some_and(continues_expression) => at_statement = true,
            c if c.is_whitespace() => {}
            c if is_ident(c) => {
                let start = i;
                while i < chars.len() && is_ident(chars[i]) {
                    i += 1;
                }
                let word: String = chars[start..i].iter().collect();
                if depth == 0 && at_statement {
                    match word.as_str() {
                        "function" => {
                            if let Some(name) = declared_name(&chars, i) {
                                return EntryPoint::Function(name);
                            }
                        }
                        "const" | "let" | "var" if binding.is_none() => {
                            binding = bound_function(&chars, i);
                        }
                        _ => {}
                    }
                }
                if !matches!(word.as_str(), "async" | "export" | "default") {
                    at_statement = false;
                }
                last = chars.get(i - 1).copied();
                continue;
            }
            '{' | '(' | '[' => {
                depth += 1;
                at_statement = false;
                last = Some(c);
            }
            '}' | ')' | ']' => {
                depth = depth.saturating_sub(1);
                at_statement = c == '}';
                last = Some(c);
            }
            ';' => {
                at_statement = true;
                last = Some(c);
            }
            _ => {
                at_statement = false;
                last = Some(c);
            }
        }
        i += 1;
    }

    binding.map_or(EntryPoint::Expression, EntryPoint::Function)
}

fn continues_expression(c: char) -> bool {
    matches!(
        c,
        '=' | '(' | '[' | '{' | ',' | ':' | '?' | '&' | '|' | '+' | '-' | '*' | '/' | '%' | '<'
            | '>' | '!' | '~' | '^' | '.'
    )
}

fn skip_string(chars: &[char], start: usize) -> usize {
    let quote = chars[start];
    let mut i = start + 1;
    while i < chars.len() {
        match chars[i] {
            '\\' => i += 2,
            c if c == quote => return i + 1,
            '\n' if quote != '`' => return i + 1,
            _ => i += 1,
        }
    }
    i
}

fn is_ident(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

fn skip_whitespace(chars: &[char], mut i: usize) -> usize {
    while i < chars.len() && chars[i].is_whitespace() {
        i += 1;
    }
    i
}

fn identifier(chars: &[char], i: usize) -> Option<(String, usize)> {
    let mut end = i;
    while end < chars.len() && is_ident(chars[end]) {
        end += 1;
    }
    if end == i || chars[i].is_ascii_digit() {
        return None;
    }
    Some((chars[i..end].iter().collect(), end))
}

/// Name after `function`, allowing whitespace and a generator `*`.
fn declared_name(chars: &[char], mut i: usize) -> Option<String> {
    while i < chars.len() && (chars[i].is_whitespace() || chars[i] == '*') {
        i += 1;
    }
    identifier(chars, i).map(|(name, _)| name)
}

/// Name bound by `const name = <function or arrow>`, starting after the keyword.
fn bound_function(chars: &[char], i: usize) -> Option<String> {
    let (name, i) = identifier(chars, skip_whitespace(chars, i))?;
    let i = skip_whitespace(chars, i);
    if chars.get(i) != Some(&'=') || matches!(chars.get(i + 1), Some(&'=') | Some(&'>')) {
        return None;
    }
    let mut i = skip_whitespace(chars, i + 1);
    if let Some((word, end)) = identifier(chars, i) {
        match word.as_str() {
            "function" => return Some(name),
            "async" => i = skip_whitespace(chars, end),
            _ => {}
        }
    }

    // `x => ...`, `async x => ...` or `(a, b) => ...`
    let after_params = match chars.get(i) {
        Some(&'(') => {
            let mut depth = 0usize;
            let mut j = i;
            loop {
                match *chars.get(j)? {
                    '(' => depth += 1,
                    ')' => {
                        depth -= 1;
                        if depth == 0 {
                            break j + 1;
                        }
                    }
                    _ => {}
                }
                j += 1;
            }
        }
        _ => match identifier(chars, i) {
            Some((word, _)) if word == "function" => return Some(name),
            Some((_, end)) => end,
            None => return None,
        },
    };
    let j = skip_whitespace(chars, after_params);
    (chars.get(j) == Some(&'=') && chars.get(j + 1) == Some(&'>')).then_some(name)
}
