//! Single-file component splitting and output minification.
//!
//! Template files may carry up to three top-level regions, Vue-style:
//! `<template>`, `<script>` and `<style>`. File rendering templates only the
//! template region and re-wraps the other two verbatim.

use std::sync::OnceLock;

use regex::Regex;

/// The three regions of a template file. A missing region is an empty
/// string.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FileRegions {
    pub template: String,
    pub script: String,
    pub style: String,
}

fn region_re(cell: &'static OnceLock<Regex>, pattern: &str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(pattern).unwrap_or_else(|_| unreachable!()))
}

fn template_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    region_re(&RE, r"(?s)<template>(.*?)</template>")
}

fn script_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    region_re(&RE, r"(?s)<script>(.*?)</script>")
}

fn style_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    region_re(&RE, r"(?s)<style>(.*?)</style>")
}

fn first_capture(re: &Regex, content: &str) -> String {
    re.captures(content)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim_matches([' ', '\t', '\r', '\n']).to_string())
        .unwrap_or_default()
}

/// Splits a file into its regions. Only the first occurrence of each tag
/// pair counts; nested or repeated regions are ignored.
pub fn split_regions(content: &str) -> FileRegions {
    FileRegions {
        template: first_capture(template_re(), content),
        script: first_capture(script_re(), content),
        style: first_capture(style_re(), content),
    }
}

/// The template region of a file, or the whole content when the file has no
/// `<template>` wrapper at all.
pub fn extract_template_region(content: &str) -> String {
    match template_re().captures(content).and_then(|c| c.get(1)) {
        Some(m) => m.as_str().trim_matches([' ', '\t', '\r', '\n']).to_string(),
        None => content.to_string(),
    }
}

/// Light HTML minification: trailing whitespace stripped per line and runs
/// of blank lines collapsed to a single one. Indentation is preserved.
pub fn minify(html: &str) -> String {
    let mut out: Vec<&str> = Vec::new();
    let mut prev_blank = false;
    for line in html.lines() {
        let line = line.trim_end_matches([' ', '\t', '\r']);
        let blank = line.is_empty();
        if blank && prev_blank {
            continue;
        }
        out.push(line);
        prev_blank = blank;
    }
    out.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_all_three_regions() {
        let src = "<template>\n<p>hi</p>\n</template>\n<script>\nlet x = 1;\n</script>\n<style>\np { color: red; }\n</style>";
        let regions = split_regions(src);
        assert_eq!(regions.template, "<p>hi</p>");
        assert_eq!(regions.script, "let x = 1;");
        assert_eq!(regions.style, "p { color: red; }");
    }

    #[test]
    fn missing_regions_are_empty() {
        let regions = split_regions("<template><p>solo</p></template>");
        assert_eq!(regions.template, "<p>solo</p>");
        assert_eq!(regions.script, "");
        assert_eq!(regions.style, "");
    }

    #[test]
    fn unwrapped_file_is_all_template() {
        assert_eq!(extract_template_region("<p>bare</p>"), "<p>bare</p>");
    }

    #[test]
    fn minify_collapses_blank_runs() {
        assert_eq!(minify("<p>a</p>  \n\n\n\n<p>b</p>\t"), "<p>a</p>\n\n<p>b</p>");
    }

    #[test]
    fn minify_keeps_indentation() {
        assert_eq!(minify("  <li>x</li>  "), "  <li>x</li>");
    }
}
