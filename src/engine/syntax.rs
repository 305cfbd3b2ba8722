use rustpython_parser::{Mode, parse};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxIssue {
    pub message: String,
    pub line: usize,
}

/// Parse the submission without executing it. A parse failure carries the
/// failure kind and the 1-based line it was detected on.
pub fn check(source: &str) -> Result<(), SyntaxIssue> {
    match parse(source, Mode::Module, "<submission>") {
        Ok(_) => Ok(()),
        Err(err) => {
            let offset = err.offset.to_usize().min(source.len());
            let line = source.as_bytes()[..offset]
                .iter()
                .filter(|b| **b == b'\n')
                .count()
                + 1;
            Err(SyntaxIssue {
                message: format!("SyntaxError: {} (line {line})", err.error),
                line,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::check;

    #[test]
    fn valid_code_passes() {
        assert!(check("print(1 + 1)\n").is_ok());
        assert!(check("").is_ok());
    }

    #[test]
    fn missing_colon_reports_the_offending_line() {
        let source = "age = 16\nif age >= 18\n    print(\"Adult\")\n";
        let issue = check(source).unwrap_err();
        assert_eq!(issue.line, 2);
        assert!(issue.message.contains("SyntaxError"));
        assert!(issue.message.contains("line 2"));
    }

    #[test]
    fn assignment_in_condition_is_rejected() {
        let source = "score = 10\nif score = 10:\n    print(\"Win\")\n";
        assert!(check(source).is_err());
    }

    #[test]
    fn bad_indentation_is_rejected() {
        let source = "for i in range(1, 4):\nprint(i)\n";
        assert!(check(source).is_err());
    }
}
