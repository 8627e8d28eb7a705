#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use crate::{java::diagnostics::JavacDiagnostic, types::LineRef};

peg::parser! {
    /// includes some useful grammars for parsing javac output and java stack traces.
    pub grammar parser() for str {
        /// matches any sequence of 1 or more numbers
        rule number() -> u32
            = n:$(['0'..='9']+) {? n.parse().or(Err("u32")) }

        /// matches any number of whitespace characters
        rule whitespace() = quiet!{[' ' | '\n' | '\t' | '\r']+}

        /// matches any path separator, hopefully cross-platform
        rule path_separator() =
            whitespace()?
            "."?
            "/" / "\\" / "\\\\"
            whitespace()?

        /// matches any sequence of upper and lowercase alphabets
        rule word() -> String
            = whitespace()?
                w:[
                    'a'..='z' |
                    'A'..='Z' |
                    '0'..='9' |
                    '-' | '.' | ' ' |
                    '[' | ']' | '_'
                ]+
                whitespace()?
            { w.iter().collect::<String>() }

        /// matches any valid path, hopefully. Relative paths come back with a
        /// leading `./`, absolute ones with a leading `/`.
        rule path() -> String
            = whitespace()?
              lead:$(path_separator())?
              p:(word() ++ path_separator())
              whitespace()?
            {
                let joined = p.iter().fold(String::new(), |acc, w| format!("{acc}/{w}"));
                match lead {
                    Some(sep) if !sep.contains('.') => joined,
                    _ => format!(".{joined}"),
                }
            }

        /// matches line numbers (colon followed by numbers, eg. :23)
        rule line_number() -> u32
            = ":" n:number() ":" whitespace()? { n }

        /// matches "error" or "warning", returns true if error
        rule diag_type() -> bool
            = whitespace()?
              a:"error"? b:"warning"?
              ":"
              whitespace()?
            { a.is_some() }

        /// matches anything, placed where diagnostic should be
        rule diagnostic() -> String
            = a:([_]+)
            { a.iter().collect::<String>() }

        /// parses the first line of a javac diagnostic message and returns a `JavacDiagnostic`
        pub rule parse_diag() -> JavacDiagnostic
            = p:path() l:line_number() d:diag_type() m:diagnostic()
            {
                let name = std::path::Path::new(&p)
                    .file_name()
                    .map(|value| value.to_string_lossy().to_string())
                    .unwrap_or_else(|| p.clone());

                JavacDiagnostic::builder()
                    .path(p)
                    .file_name(name)
                    .severity(d)
                    .line_number(l)
                    .message(if d { format!("Error: {m}") } else { m })
                    .build()
            }

        /// Parses a word in a java stack trace frame
        rule stacktrace_word() -> String
            = whitespace()?
            w:[
                'a'..='z' |
                'A'..='Z' |
                '0'..='9' |
                '-' | '.' | ' ' |
                '[' | ']' | '/' |
                '>' | '=' | '$' | '<' | '_'
            ]+
            whitespace()?
        { w.iter().collect::<String>() }

        /// Parses a filename from a java stack trace frame
        rule stacktrace_filename() -> String
            = whitespace()?
            w:[
                'a'..='z' |
                'A'..='Z' |
                '0'..='9' |
                '-' | '_' | '$'
            ]+
            ".java:"
            whitespace()?
        { w.iter().collect::<String>() }

        /// Parses a LineRef from a java stack trace frame, e.g.
        /// `at Main.main(Main.java:3)`
        pub rule stacktrace_line_ref() -> LineRef
            = whitespace()?
            stacktrace_word()*
            whitespace()?
            "("
            c:stacktrace_filename()
            d:number()
            whitespace()?
            ")"
            whitespace()?
            {
                LineRef { line_number: d as usize, file_name: c }
            }
    }
}
