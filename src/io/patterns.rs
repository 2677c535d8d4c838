//! IO for input patterns
//!
//! One pattern per line, one character per input terminal: `0` or `1`.
//! Blank lines and lines starting with `#` are ignored.

use std::io::{BufRead, BufReader, Read, Write};

use crate::error::{CircuitError, Result};

/// Read input patterns
pub fn read_patterns<R: Read>(r: R) -> Result<Vec<Vec<bool>>> {
    let mut ret = Vec::new();
    for (i, line) in BufReader::new(r).lines().enumerate() {
        let line = line?;
        let t = line.trim();
        if t.is_empty() || t.starts_with('#') {
            continue;
        }
        let mut pattern = Vec::new();
        for c in t.chars().filter(|c| !c.is_whitespace()) {
            match c {
                '0' => pattern.push(false),
                '1' => pattern.push(true),
                _ => {
                    return Err(CircuitError::Pattern {
                        line: i + 1,
                        message: format!("unexpected character {c:?}"),
                    })
                }
            }
        }
        if let Some(first) = ret.first().map(Vec::len) {
            if first != pattern.len() {
                return Err(CircuitError::Pattern {
                    line: i + 1,
                    message: format!("expected {} values, got {}", first, pattern.len()),
                });
            }
        }
        ret.push(pattern);
    }
    Ok(ret)
}

/// Write input patterns
pub fn write_patterns<W: Write>(w: &mut W, patterns: &[Vec<bool>]) -> Result<()> {
    for p in patterns {
        let line: String = p.iter().map(|b| if *b { '1' } else { '0' }).collect();
        writeln!(w, "{line}")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_readwrite() {
        let text = "# a b\n01\n\n1 1\n00\n";
        let patterns = read_patterns(text.as_bytes()).unwrap();
        assert_eq!(
            patterns,
            vec![vec![false, true], vec![true, true], vec![false, false]]
        );
        let mut buf = Vec::new();
        write_patterns(&mut buf, &patterns).unwrap();
        assert_eq!(String::from_utf8(buf).unwrap(), "01\n11\n00\n");
    }

    #[test]
    fn test_errors() {
        assert!(matches!(
            read_patterns("01\n0x\n".as_bytes()),
            Err(CircuitError::Pattern { line: 2, .. })
        ));
        assert!(matches!(
            read_patterns("01\n\n011\n".as_bytes()),
            Err(CircuitError::Pattern { line: 3, .. })
        ));
    }
}
