//! Line Classifier
//!
//! Lightweight lexical scan of Lua source that decides, line by line, whether
//! a line holds executable code. It is a heuristic, not a parser: it errs on
//! the side of calling a line executable, because a missed executable line
//! would hide a real coverage gap while an extra one only shows up as
//! not-covered.

use super::data::{FileRecord, LineStatus};

/// Tokens that on their own only open or close a block
const SYNTAX_ONLY: &[&str] = &["end", "else", "do", "then", "repeat"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Carry {
    Code,
    LongComment(usize),
    LongString(usize),
}

/// Classify every line of `source`; `true` marks an executable line.
#[must_use]
pub fn classify_source(source: &str) -> Vec<bool> {
    let mut carry = Carry::Code;
    source
        .lines()
        .enumerate()
        .map(|(idx, line)| {
            if idx == 0 && line.starts_with("#!") {
                return false;
            }
            let (code, next) = strip_line(line, carry);
            carry = next;
            is_code(&code)
        })
        .collect()
}

/// Line ranges of every `function ... end` block in `source`, by a token
/// scan that pairs block openers with their closers.
#[must_use]
pub fn function_spans(source: &str) -> Vec<(u32, u32)> {
    let mut carry = Carry::Code;
    let mut blocks: Vec<Block> = Vec::new();
    let mut loop_header = false;
    let mut spans = Vec::new();

    for (idx, line) in source.lines().enumerate() {
        let line_number = idx as u32 + 1;
        if idx == 0 && line.starts_with("#!") {
            continue;
        }
        let (code, next) = strip_line(line, carry);
        carry = next;
        for token in tokens(&code) {
            match token {
                "function" => blocks.push(Block::Function(line_number)),
                "if" | "repeat" => blocks.push(Block::Other),
                "while" | "for" => {
                    blocks.push(Block::Other);
                    loop_header = true;
                }
                "do" if loop_header => loop_header = false,
                "do" => blocks.push(Block::Other),
                "end" | "until" => {
                    if let Some(Block::Function(start)) = blocks.pop() {
                        spans.push((start, line_number));
                    }
                }
                _ => {}
            }
        }
    }
    spans.sort_unstable();
    spans
}

#[derive(Debug, Clone, Copy)]
enum Block {
    Function(u32),
    Other,
}

/// Assign `is_executable` and `status` to every line of `file`.
///
/// Lua reports a function definition on the line of its closing `end`, so
/// when that syntax-only line ran the header line is credited as executed
/// too. Uses each line's `asserted` flag as the assertion signal. Running it
/// again on an unchanged record yields the same result.
pub fn classify_file(file: &mut FileRecord) {
    let executable = classify_source(&file.source);
    let mut spans = function_spans(&file.source);
    spans.extend(file.functions.values().map(|f| (f.start_line, f.end_line)));
    let closes_only = |line: u32| {
        (line as usize)
            .checked_sub(1)
            .and_then(|idx| executable.get(idx))
            .is_some_and(|e| !e)
    };
    for (start, end) in spans {
        if start < end && closes_only(end) && file.line(end).is_some_and(|l| l.executed) {
            if let Some(header) = file.line_mut(start) {
                header.executed = true;
            }
        }
    }

    for line in &mut file.lines {
        let is_executable = (line.line_number as usize)
            .checked_sub(1)
            .and_then(|idx| executable.get(idx))
            .copied()
            .unwrap_or(false);
        line.is_executable = Some(is_executable);
        line.status = Some(LineStatus::resolve(
            is_executable,
            line.executed,
            line.asserted,
        ));
    }
}

/// Remove comments and string contents from one line.
///
/// Strings are replaced by a placeholder so that `x = "end"` still reads as
/// code. Returns the remaining code and the state carried into the next line.
fn strip_line(line: &str, mut carry: Carry) -> (String, Carry) {
    let bytes = line.as_bytes();
    let mut code = String::new();
    let mut i = 0;

    while i < bytes.len() {
        match carry {
            Carry::LongComment(level) => match find_long_close(bytes, i, level) {
                Some(end) => {
                    i = end;
                    carry = Carry::Code;
                }
                None => return (code, carry),
            },
            Carry::LongString(level) => match find_long_close(bytes, i, level) {
                Some(end) => {
                    i = end;
                    carry = Carry::Code;
                }
                None => return (code, carry),
            },
            Carry::Code => {
                let b = bytes[i];
                if b == b'-' && bytes.get(i + 1) == Some(&b'-') {
                    if let Some((level, open_end)) = long_open(bytes, i + 2) {
                        carry = Carry::LongComment(level);
                        i = open_end;
                        continue;
                    }
                    return (code, Carry::Code);
                }
                if b == b'[' {
                    if let Some((level, open_end)) = long_open(bytes, i) {
                        code.push('"');
                        carry = Carry::LongString(level);
                        i = open_end;
                        continue;
                    }
                }
                if b == b'"' || b == b'\'' {
                    code.push('"');
                    i = skip_short_string(bytes, i + 1, b);
                    continue;
                }
                // push whole UTF-8 sequences
                let ch_len = utf8_len(b);
                let end = (i + ch_len).min(bytes.len());
                code.push_str(&String::from_utf8_lossy(&bytes[i..end]));
                i = end;
            }
        }
    }
    (code, carry)
}

fn utf8_len(first: u8) -> usize {
    match first {
        0x00..=0x7f => 1,
        0xc0..=0xdf => 2,
        0xe0..=0xef => 3,
        0xf0..=0xf7 => 4,
        _ => 1,
    }
}

/// `[`, `=`*, `[` starting at `start`; returns level and index past it
fn long_open(bytes: &[u8], start: usize) -> Option<(usize, usize)> {
    if bytes.get(start) != Some(&b'[') {
        return None;
    }
    let mut i = start + 1;
    let mut level = 0;
    while bytes.get(i) == Some(&b'=') {
        level += 1;
        i += 1;
    }
    (bytes.get(i) == Some(&b'[')).then_some((level, i + 1))
}

/// Index just past the `]`, `=`*level, `]` closing sequence at or after `from`
fn find_long_close(bytes: &[u8], from: usize, level: usize) -> Option<usize> {
    let mut i = from;
    while i < bytes.len() {
        if bytes[i] == b']' {
            let mut j = i + 1;
            let mut eq = 0;
            while bytes.get(j) == Some(&b'=') {
                eq += 1;
                j += 1;
            }
            if eq == level && bytes.get(j) == Some(&b']') {
                return Some(j + 1);
            }
        }
        i += 1;
    }
    None
}

/// Index just past the closing quote, or the end of the line
fn skip_short_string(bytes: &[u8], mut i: usize, quote: u8) -> usize {
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b if b == quote => return i + 1,
            _ => i += 1,
        }
    }
    bytes.len()
}

fn is_code(code: &str) -> bool {
    tokens(code).any(|token| {
        !SYNTAX_ONLY.contains(&token)
            && !token
                .chars()
                .all(|c| matches!(c, '(' | ')' | '{' | '}' | '[' | ']' | ',' | ';'))
    })
}

/// Split into identifier runs and individual punctuation
fn tokens(code: &str) -> impl Iterator<Item = &str> {
    let mut rest = code;
    std::iter::from_fn(move || {
        rest = rest.trim_start();
        let first = rest.chars().next()?;
        let len = if first.is_alphanumeric() || first == '_' {
            rest.find(|c: char| !(c.is_alphanumeric() || c == '_'))
                .unwrap_or(rest.len())
        } else {
            first.len_utf8()
        };
        let (token, tail) = rest.split_at(len);
        rest = tail;
        Some(token)
    })
}
