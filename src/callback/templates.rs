//! Callback page templates

const PAGE_HEAD: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>Linear webhook</title>
<style>
body { font-family: -apple-system, BlinkMacSystemFont, sans-serif; background: #f4f5f8; color: #1f2023; }
main { max-width: 28rem; margin: 6rem auto; padding: 2rem; background: #fff; border-radius: 8px; }
h1 { font-size: 1.25rem; }
.error { color: #c53030; }
</style>
</head>
<body>
<main>
"#;

const PAGE_TAIL: &str = "</main>\n</body>\n</html>\n";

/// Page shown once the redirect has been captured
pub fn render_received_page() -> String {
    format!(
        "{}<h1>Linear authorization received</h1>\n<p>You can close this tab and return to the terminal.</p>\n{}",
        PAGE_HEAD, PAGE_TAIL
    )
}

/// Page shown when the provider reports an error or the redirect is unusable
pub fn render_error_page(error: &str) -> String {
    format!(
        "{}<h1 class=\"error\">Linear authorization failed</h1>\n<p>{}</p>\n{}",
        PAGE_HEAD,
        escape_html(error),
        PAGE_TAIL
    )
}

fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
