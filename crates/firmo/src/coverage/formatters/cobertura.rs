//! Cobertura XML Coverage Report Formatter
//!
//! ```xml
//! <?xml version="1.0" encoding="UTF-8"?>
//! <!DOCTYPE coverage SYSTEM "http://cobertura.sourceforge.net/xml/coverage-04.dtd">
//! <coverage line-rate="0.8" branch-rate="0" version="0.4.0">
//!   <packages>
//!     <package name="/proj/src" line-rate="0.8" branch-rate="0" complexity="0">
//!       <classes>
//!         <class name="calc" filename="/proj/src/calc.lua" line-rate="0.6">
//!           <methods>
//!             <method name="add:2-4" signature="" line-rate="1" hits="2"/>
//!           </methods>
//!           <lines>
//!             <line number="2" hits="1"/>
//!           </lines>
//!         </class>
//!       </classes>
//!     </package>
//!   </packages>
//! </coverage>
//! ```

use super::{escape_xml, sorted_functions};
use crate::coverage::data::{CoverageRun, FileRecord};
use std::collections::BTreeMap;
use std::fmt::Write;

/// Files grouped by directory
type PackageMap<'a> = BTreeMap<&'a str, Vec<&'a FileRecord>>;

/// Cobertura XML format report generator
#[derive(Debug)]
pub struct CoberturaFormatter<'a> {
    run: &'a CoverageRun,
    version: String,
}

impl<'a> CoberturaFormatter<'a> {
    /// Create a new Cobertura formatter
    #[must_use]
    pub fn new(run: &'a CoverageRun) -> Self {
        Self {
            run,
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    /// Set the version string
    #[must_use]
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Generate Cobertura XML report as a string
    #[must_use]
    pub fn generate(&self) -> String {
        let summary = &self.run.summary;

        let mut xml = String::from(r#"<?xml version="1.0" encoding="UTF-8"?>"#);
        xml.push('\n');
        xml.push_str(
            r#"<!DOCTYPE coverage SYSTEM "http://cobertura.sourceforge.net/xml/coverage-04.dtd">"#,
        );
        xml.push('\n');
        let _ = writeln!(
            xml,
            r#"<coverage line-rate="{:.4}" branch-rate="0" lines-covered="{}" lines-valid="{}" version="{}">"#,
            rate(summary.executed_lines, summary.executable_lines),
            summary.executed_lines,
            summary.executable_lines,
            escape_xml(&self.version),
        );
        xml.push_str("  <packages>\n");

        for (package, files) in self.group_by_package() {
            let (hit, found) = files.iter().fold((0, 0), |(h, f), file| {
                (h + file.summary.executed_lines, f + file.summary.executable_lines)
            });
            let _ = writeln!(
                xml,
                r#"    <package name="{}" line-rate="{:.4}" branch-rate="0" complexity="0">"#,
                escape_xml(package),
                rate(hit, found)
            );
            xml.push_str("      <classes>\n");
            for file in files {
                Self::write_class(&mut xml, file);
            }
            xml.push_str("      </classes>\n");
            xml.push_str("    </package>\n");
        }

        xml.push_str("  </packages>\n");
        xml.push_str("</coverage>\n");
        xml
    }

    fn write_class(xml: &mut String, file: &FileRecord) {
        let _ = writeln!(
            xml,
            r#"        <class name="{}" filename="{}" line-rate="{:.4}" branch-rate="0" complexity="0">"#,
            escape_xml(class_name(&file.path)),
            escape_xml(&file.path),
            rate(file.summary.executed_lines, file.summary.executable_lines)
        );

        xml.push_str("          <methods>\n");
        for function in sorted_functions(file) {
            let _ = writeln!(
                xml,
                r#"            <method name="{}" signature="" line-rate="{}" hits="{}"/>"#,
                escape_xml(&function.id),
                u8::from(function.executed),
                function.call_count
            );
        }
        xml.push_str("          </methods>\n");

        xml.push_str("          <lines>\n");
        for line in file.lines.iter().filter(|l| l.counts_as_executable()) {
            let _ = writeln!(
                xml,
                r#"            <line number="{}" hits="{}"/>"#,
                line.line_number,
                u8::from(line.executed)
            );
        }
        xml.push_str("          </lines>\n");
        xml.push_str("        </class>\n");
    }

    /// Group files by parent directory
    fn group_by_package(&self) -> PackageMap<'a> {
        let mut packages: PackageMap<'a> = BTreeMap::new();
        for (path, file) in &self.run.files {
            let package = path.rsplit_once('/').map_or("default", |(dir, _)| {
                if dir.is_empty() {
                    "/"
                } else {
                    dir
                }
            });
            packages.entry(package).or_default().push(file);
        }
        packages
    }
}

/// File stem used as the class name
fn class_name(path: &str) -> &str {
    let name = path.rsplit_once('/').map_or(path, |(_, name)| name);
    name.strip_suffix(".lua").unwrap_or(name)
}

/// Ratio in `0..=1`; an empty denominator is zero, like the percentages
fn rate(hit: usize, found: usize) -> f64 {
    if found == 0 {
        0.0
    } else {
        hit as f64 / found as f64
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::coverage::formatters::fixtures::sample_run;

    #[test]
    fn test_default_version_is_crate_version() {
        let run = CoverageRun::new();
        let formatter = CoberturaFormatter::new(&run);
        assert_eq!(formatter.version, env!("CARGO_PKG_VERSION"));
        let formatter = formatter.with_version("2.0");
        assert_eq!(formatter.version, "2.0");
    }

    #[test]
    fn test_empty_run_is_well_formed() {
        let run = CoverageRun::new();
        let output = CoberturaFormatter::new(&run).generate();
        assert!(output.starts_with(r#"<?xml version="1.0" encoding="UTF-8"?>"#));
        assert!(output.contains("<!DOCTYPE coverage"));
        assert!(output.contains(r#"<coverage line-rate="0.0000""#));
        assert!(output.ends_with("</coverage>\n"));
    }

    #[test]
    fn test_overall_rate_from_summary() {
        let run = sample_run();
        let output = CoberturaFormatter::new(&run).generate();
        // calc 3/5 + util 1/1
        assert!(output.contains(r#"<coverage line-rate="0.6667""#));
        assert!(output.contains(r#"lines-covered="4" lines-valid="6""#));
    }

    #[test]
    fn test_single_package_for_shared_directory() {
        let run = sample_run();
        let output = CoberturaFormatter::new(&run).generate();
        assert_eq!(output.matches("<package ").count(), 1);
        assert!(output.contains(r#"<package name="/proj/src""#));
    }

    #[test]
    fn test_classes_methods_and_lines() {
        let run = sample_run();
        let output = CoberturaFormatter::new(&run).generate();
        assert!(output.contains(r#"<class name="calc" filename="/proj/src/calc.lua" line-rate="0.6000""#));
        assert!(output.contains(r#"<method name="add:2-4" signature="" line-rate="1" hits="2"/>"#));
        assert!(output.contains(r#"<method name="unused:5-7" signature="" line-rate="0" hits="0"/>"#));
        assert!(output.contains(r#"<line number="6" hits="0"/>"#));
        assert!(!output.contains(r#"<line number="4""#));
    }

    #[test]
    fn test_class_name() {
        assert_eq!(class_name("/proj/src/calc.lua"), "calc");
        assert_eq!(class_name("init.lua"), "init");
        assert_eq!(class_name("/proj/Makefile"), "Makefile");
    }

    #[test]
    fn test_rate() {
        assert!(rate(0, 0).abs() < f64::EPSILON);
        assert!((rate(1, 4) - 0.25).abs() < f64::EPSILON);
    }

    #[test]
    fn test_comment_only_file_has_zero_rate() {
        let mut run = CoverageRun::new();
        run.initialize_file("/p/notes.lua", "-- nothing to run\n\n");
        for file in run.files.values_mut() {
            crate::coverage::classifier::classify_file(file);
        }
        run.calculate_summary();
        let output = CoberturaFormatter::new(&run).generate();
        assert!(output.contains(r#"<coverage line-rate="0.0000" branch-rate="0" lines-covered="0" lines-valid="0""#));
        assert!(output.contains(r#"<package name="/p" line-rate="0.0000""#));
        assert!(output.contains(r#"<class name="notes" filename="/p/notes.lua" line-rate="0.0000""#));
    }

    #[test]
    fn test_anonymous_methods_are_distinct() {
        let mut run = CoverageRun::new();
        run.initialize_file("/p/cb.lua", "run(function() end)\nrun(function() end)\n");
        run.register_function("/p/cb.lua", "", 1, 1, crate::coverage::data::FunctionKind::Anonymous)
            .unwrap();
        run.register_function("/p/cb.lua", "", 2, 2, crate::coverage::data::FunctionKind::Anonymous)
            .unwrap();
        let output = CoberturaFormatter::new(&run).generate();
        assert!(output.contains(r#"<method name="anonymous:1-1""#));
        assert!(output.contains(r#"<method name="anonymous:2-2""#));
    }
}
