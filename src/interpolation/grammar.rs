//! Parser for `${...}` reference expressions.

/// One piece of a parsed expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    /// Literal text, with escapes already removed.
    Text(String),
    Reference(Reference),
}

/// What a `${...}` block refers to.
#[derive(Debug, Clone, PartialEq)]
pub enum Reference {
    /// A node in the same tree. `up` is the number of leading dots: zero
    /// for an absolute path, one for a sibling, two for the parent's
    /// sibling and so on.
    Node { up: usize, path: String },
    /// A call to a registered resolver function. Arguments are raw strings
    /// that may themselves contain references.
    Resolver { name: String, args: Vec<String> },
}

/// Returns true if `s` needs evaluation: it holds a `${` block, possibly
/// escaped.
pub fn is_interpolation(s: &str) -> bool {
    s.contains("${")
}

/// Parses an expression into text and reference segments.
pub fn parse(expr: &str) -> Result<Vec<Segment>, String> {
    let chars: Vec<char> = expr.chars().collect();
    let mut segments = Vec::new();
    let mut text = String::new();
    let mut i = 0;

    while i < chars.len() {
        match chars[i] {
            '\\' if chars.get(i + 1) == Some(&'$') && chars.get(i + 2) == Some(&'{') => {
                text.push_str("${");
                i += 3;
            }
            '$' if chars.get(i + 1) == Some(&'{') => {
                let end = matching_brace(&chars, i + 2).ok_or_else(|| "unterminated '${'".to_string())?;
                let body: String = chars[i + 2..end].iter().collect();
                if !text.is_empty() {
                    segments.push(Segment::Text(std::mem::take(&mut text)));
                }
                segments.push(Segment::Reference(parse_body(body.trim())?));
                i = end + 1;
            }
            c => {
                text.push(c);
                i += 1;
            }
        }
    }
    if !text.is_empty() {
        segments.push(Segment::Text(text));
    }
    Ok(segments)
}

/// Finds the `}` closing a block whose body starts at `start`, skipping
/// nested blocks and quoted strings.
fn matching_brace(chars: &[char], start: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut i = start;
    while i < chars.len() {
        let c = chars[i];
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None => match c {
                '\'' | '"' => quote = Some(c),
                '$' if chars.get(i + 1) == Some(&'{') => {
                    depth += 1;
                    i += 1;
                }
                '}' if depth == 0 => return Some(i),
                '}' => depth -= 1,
                _ => {}
            },
        }
        i += 1;
    }
    None
}

fn parse_body(body: &str) -> Result<Reference, String> {
    if body.is_empty() {
        return Err("empty interpolation".to_string());
    }
    if let Some((name, args)) = split_resolver(body) {
        let name = name.trim();
        if name.is_empty() || !name.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '.') {
            return Err(format!("invalid resolver name '{}'", name));
        }
        return Ok(Reference::Resolver {
            name: name.to_string(),
            args: split_args(args)?,
        });
    }

    let up = body.chars().take_while(|&c| c == '.').count();
    let path = &body[up..];
    if up == 0 || !path.is_empty() {
        crate::fieldpath::Path::parse(path).map_err(|e| e.to_string())?;
    }
    Ok(Reference::Node {
        up,
        path: path.to_string(),
    })
}

/// Splits `name:args` at the first top-level colon.
fn split_resolver(body: &str) -> Option<(&str, &str)> {
    let mut depth = 0usize;
    let mut prev = '\0';
    for (i, c) in body.char_indices() {
        match c {
            '{' if prev == '$' => depth += 1,
            '}' if depth > 0 => depth -= 1,
            ':' if depth == 0 => return Some((&body[..i], &body[i + 1..])),
            _ => {}
        }
        prev = c;
    }
    None
}

fn split_args(args: &str) -> Result<Vec<String>, String> {
    if args.trim().is_empty() {
        return Ok(Vec::new());
    }
    let chars: Vec<char> = args.chars().collect();
    let mut out = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut quoted = false;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => current.push(c),
            None => match c {
                '\'' | '"' if current.trim().is_empty() => {
                    current.clear();
                    quote = Some(c);
                    quoted = true;
                }
                '$' if chars.get(i + 1) == Some(&'{') => {
                    depth += 1;
                    current.push_str("${");
                    i += 1;
                }
                '}' if depth > 0 => {
                    depth -= 1;
                    current.push(c);
                }
                ',' if depth == 0 => {
                    out.push(finish_arg(&current, quoted));
                    current.clear();
                    quoted = false;
                }
                _ => current.push(c),
            },
        }
        i += 1;
    }
    if quote.is_some() {
        return Err("unterminated quoted argument".to_string());
    }
    out.push(finish_arg(&current, quoted));
    Ok(out)
}

fn finish_arg(raw: &str, quoted: bool) -> String {
    if quoted {
        raw.to_string()
    } else {
        raw.trim().to_string()
    }
}
