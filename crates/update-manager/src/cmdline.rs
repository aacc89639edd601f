use crate::platform::Platform;

/// Platform-specific argument quoting for the helper-process command line.
///
/// One capability, two variants, selected at the spawn boundary: POSIX
/// shells want metacharacters backslash-escaped, the Windows CRT wants the
/// double-quote/backslash dance. Paths containing spaces or shell
/// metacharacters must survive both intact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuoteStyle {
    Posix,
    Windows,
}

impl QuoteStyle {
    /// Style matching the given target platform.
    pub fn for_platform(platform: Platform) -> QuoteStyle {
        if platform.is_windows() {
            QuoteStyle::Windows
        } else {
            QuoteStyle::Posix
        }
    }

    /// Quote a single argument.
    pub fn quote(&self, arg: &str) -> String {
        match self {
            QuoteStyle::Posix => quote_posix(arg),
            QuoteStyle::Windows => quote_windows(arg),
        }
    }

    /// Join arguments into one command-line string.
    pub fn join<S: AsRef<str>>(&self, args: &[S]) -> String {
        args.iter()
            .map(|a| self.quote(a.as_ref()))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

fn quote_posix(arg: &str) -> String {
    let mut out = String::with_capacity(arg.len());
    for c in arg.chars() {
        if matches!(
            c,
            ' ' | '\t' | '\\' | '"' | '\'' | '<' | '>' | '|' | '@' | '&' | ';' | '(' | ')'
        ) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn quote_windows(arg: &str) -> String {
    let needs_quotes = arg.is_empty()
        || arg.chars().any(|c| {
            matches!(c, ' ' | '\t' | '"' | '|' | '@' | '^' | '<' | '>' | '&')
        });
    if !needs_quotes {
        // Backslashes only carry special meaning before a quote.
        return arg.to_string();
    }

    let mut out = String::with_capacity(arg.len() + 2);
    out.push('"');
    let mut backslashes = 0usize;
    for c in arg.chars() {
        if c == '\\' {
            backslashes += 1;
            continue;
        }
        if c == '"' {
            // Escape the run of backslashes plus the quote itself.
            out.extend(std::iter::repeat('\\').take(backslashes * 2 + 1));
            out.push('"');
        } else {
            out.extend(std::iter::repeat('\\').take(backslashes));
            out.push(c);
        }
        backslashes = 0;
    }
    // A trailing run of backslashes must not swallow the closing quote.
    out.extend(std::iter::repeat('\\').take(backslashes * 2));
    out.push('"');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn posix_escapes_metacharacters() {
        assert_eq!(QuoteStyle::Posix.quote("plain"), "plain");
        assert_eq!(
            QuoteStyle::Posix.quote("/opt/my app/bin"),
            "/opt/my\\ app/bin"
        );
        assert_eq!(QuoteStyle::Posix.quote("a&b|c"), "a\\&b\\|c");
        assert_eq!(QuoteStyle::Posix.quote("back\\slash"), "back\\\\slash");
    }

    #[test]
    fn windows_wraps_arguments_with_spaces() {
        assert_eq!(QuoteStyle::Windows.quote("plain"), "plain");
        assert_eq!(
            QuoteStyle::Windows.quote(r"C:\dir with space\app"),
            "\"C:\\dir with space\\app\""
        );
    }

    #[test]
    fn windows_escapes_quotes_and_trailing_backslashes() {
        assert_eq!(QuoteStyle::Windows.quote("say \"hi\""), "\"say \\\"hi\\\"\"");
        // Trailing backslash inside quotes doubles so it cannot escape the
        // closing quote.
        assert_eq!(
            QuoteStyle::Windows.quote(r"C:\trailing slash\"),
            "\"C:\\trailing slash\\\\\""
        );
    }

    #[test]
    fn join_produces_space_separated_line() {
        let args = ["12345", "/tmp/patch dir", "/opt/app"];
        assert_eq!(
            QuoteStyle::Posix.join(&args),
            "12345 /tmp/patch\\ dir /opt/app"
        );
    }

    #[test]
    fn style_follows_platform() {
        assert_eq!(
            QuoteStyle::for_platform(Platform::win_x64),
            QuoteStyle::Windows
        );
        assert_eq!(
            QuoteStyle::for_platform(Platform::linux_x64),
            QuoteStyle::Posix
        );
    }
}
