//! HTML Coverage Report Formatter
//!
//! Single self-contained page: an overall summary followed by one section per
//! file with its functions and annotated source.

use super::{escape_xml, sorted_functions};
use crate::coverage::data::{CoverageRun, FileRecord, LineRecord, LineStatus};

/// HTML report generator
#[derive(Debug)]
pub struct HtmlFormatter<'a> {
    run: &'a CoverageRun,
    title: String,
}

impl<'a> HtmlFormatter<'a> {
    /// Create a new HTML formatter
    #[must_use]
    pub fn new(run: &'a CoverageRun) -> Self {
        Self {
            run,
            title: "Firmo Coverage Report".to_string(),
        }
    }

    /// Set the page title
    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Render the whole page
    #[must_use]
    pub fn generate(&self) -> String {
        let mut html = String::new();
        let title = escape_xml(&self.title);

        html.push_str(&format!(
            r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="UTF-8">
    <title>{title}</title>
    <style>
        body {{ font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif; margin: 20px; }}
        .summary {{ background: #f5f5f5; padding: 20px; border-radius: 8px; margin-bottom: 20px; }}
        .progress-bar {{ background: #ddd; height: 20px; border-radius: 10px; overflow: hidden; }}
        .executed-bar {{ background: #4caf50; height: 100%; }}
        table.source {{ border-collapse: collapse; font-family: monospace; width: 100%; }}
        table.source td {{ padding: 0 8px; white-space: pre; }}
        td.num {{ color: #888; text-align: right; }}
        tr.covered {{ background: #c8e6c9; }}
        tr.executed {{ background: #e8f5e9; }}
        tr.not-covered {{ background: #ffebee; }}
        tr.not-executable {{ color: #777; }}
        .fn-hit {{ color: #2e7d32; }}
        .fn-miss {{ color: #c62828; }}
    </style>
</head>
<body>
"#
        ));

        let summary = &self.run.summary;
        html.push_str(&format!(
            r#"<div class="summary">
    <h1>{title}</h1>
    <h2>Lines: {}/{} executed ({:.1}%)</h2>
    <div class="progress-bar">
        <div class="executed-bar" style="width: {:.1}%"></div>
    </div>
    <p>Assertion coverage: {}/{} ({:.1}%)</p>
    <p>Functions: {}/{} called ({:.1}%)</p>
    <p>Files: {} tracked, {} executed</p>
</div>
"#,
            summary.executed_lines,
            summary.executable_lines,
            summary.line_coverage_percent,
            summary.line_coverage_percent,
            summary.covered_lines,
            summary.executable_lines,
            summary.assertion_coverage_percent,
            summary.executed_functions,
            summary.total_functions,
            summary.function_coverage_percent,
            summary.total_files,
            summary.executed_files,
        ));

        for file in self.run.files.values() {
            Self::render_file(&mut html, file);
        }

        html.push_str("</body>\n</html>\n");
        html
    }

    fn render_file(html: &mut String, file: &FileRecord) {
        html.push_str(&format!(
            "<h2 class=\"file\">{} <small>{}/{} lines ({:.1}%)</small></h2>\n",
            escape_xml(&file.path),
            file.summary.executed_lines,
            file.summary.executable_lines,
            file.summary.line_coverage_percent
        ));

        let functions = sorted_functions(file);
        if !functions.is_empty() {
            html.push_str("<ul class=\"functions\">\n");
            for function in functions {
                let class = if function.executed { "fn-hit" } else { "fn-miss" };
                html.push_str(&format!(
                    "    <li class=\"{class}\">{} (lines {}-{}, {} calls)</li>\n",
                    escape_xml(&function.name),
                    function.start_line,
                    function.end_line,
                    function.call_count
                ));
            }
            html.push_str("</ul>\n");
        }

        html.push_str("<table class=\"source\">\n");
        for line in &file.lines {
            html.push_str(&format!(
                "    <tr class=\"{}\"><td class=\"num\">{}</td><td>{}</td></tr>\n",
                row_class(line),
                line.line_number,
                escape_xml(&line.content)
            ));
        }
        html.push_str("</table>\n");
    }
}

/// CSS class for a source row; unclassified lines fall back to their flag
fn row_class(line: &LineRecord) -> &'static str {
    match line.status {
        Some(status) => status.label(),
        None if line.executed => LineStatus::Executed.label(),
        None => "unclassified",
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::coverage::formatters::fixtures::sample_run;

    #[test]
    fn test_empty_run_renders_page() {
        let run = CoverageRun::new();
        let output = HtmlFormatter::new(&run).generate();
        assert!(output.starts_with("<!DOCTYPE html>"));
        assert!(output.contains("Lines: 0/0 executed (0.0%)"));
        assert!(output.ends_with("</html>\n"));
    }

    #[test]
    fn test_custom_title_escaped() {
        let run = CoverageRun::new();
        let output = HtmlFormatter::new(&run).with_title("a <b>").generate();
        assert!(output.contains("<title>a &lt;b&gt;</title>"));
    }

    #[test]
    fn test_summary_figures() {
        let run = sample_run();
        let output = HtmlFormatter::new(&run).generate();
        assert!(output.contains("Lines: 4/6 executed (66.7%)"));
        assert!(output.contains("Assertion coverage: 1/6 (16.7%)"));
        assert!(output.contains("Functions: 1/2 called (50.0%)"));
    }

    #[test]
    fn test_rows_carry_status_classes() {
        let run = sample_run();
        let output = HtmlFormatter::new(&run).generate();
        assert!(output.contains(
            r#"<tr class="covered"><td class="num">3</td><td>  return a + b</td></tr>"#
        ));
        assert!(output.contains(
            r#"<tr class="not-covered"><td class="num">6</td><td>  return 0</td></tr>"#
        ));
        assert!(output.contains(r#"<tr class="not-executable"><td class="num">1</td>"#));
    }

    #[test]
    fn test_source_is_escaped() {
        let run = sample_run();
        let output = HtmlFormatter::new(&run).generate();
        assert!(output.contains("&quot;&lt;util&gt;&quot;"));
        assert!(!output.contains("\"<util>\""));
    }

    #[test]
    fn test_functions_listed() {
        let run = sample_run();
        let output = HtmlFormatter::new(&run).generate();
        assert!(output.contains(r#"<li class="fn-hit">add (lines 2-4, 2 calls)</li>"#));
        assert!(output.contains(r#"<li class="fn-miss">unused (lines 5-7, 0 calls)</li>"#));
    }

    #[test]
    fn test_unclassified_row_class() {
        let mut run = CoverageRun::new();
        run.initialize_file("/p/a.lua", "x()\ny()\n");
        run.mark_line_executed("/p/a.lua", 1);
        let file = run.file("/p/a.lua").unwrap();
        assert_eq!(row_class(&file.lines[0]), "executed");
        assert_eq!(row_class(&file.lines[1]), "unclassified");
    }
}
