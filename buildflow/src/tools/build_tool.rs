//! Build tool conventions.

use super::{Platform, ReportSpec};
use serde::{Deserialize, Serialize};

/// A supported build tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildTool {
    /// Apache Maven, run in batch mode.
    Maven,
    /// Gradle through the project wrapper.
    Gradle,
}

impl BuildTool {
    /// Returns the command line running `goals` on the given platform.
    #[must_use]
    pub fn command(&self, platform: Platform, goals: &str) -> String {
        let program = match (self, platform) {
            (Self::Maven, _) => "mvn -B",
            (Self::Gradle, Platform::Posix) => "./gradlew",
            (Self::Gradle, Platform::Windows) => "gradlew.bat",
        };
        if goals.is_empty() {
            program.to_string()
        } else {
            format!("{program} {goals}")
        }
    }

    /// Returns the unit test report location.
    #[must_use]
    pub fn test_report(&self) -> ReportSpec {
        match self {
            Self::Maven => ReportSpec::new("tests", "target/surefire-reports", "testReport/"),
            Self::Gradle => ReportSpec::new("tests", "build/reports/tests/test", "testReport/"),
        }
    }

    /// Returns the coverage report location.
    #[must_use]
    pub fn coverage_report(&self) -> ReportSpec {
        match self {
            Self::Maven => ReportSpec::new("coverage", "target/site/jacoco", "jacoco/"),
            Self::Gradle => ReportSpec::new("coverage", "build/reports/jacoco/test/html", "jacoco/"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_per_platform() {
        assert_eq!(BuildTool::Maven.command(Platform::Posix, "clean package"), "mvn -B clean package");
        assert_eq!(BuildTool::Maven.command(Platform::Windows, "test"), "mvn -B test");
        assert_eq!(BuildTool::Gradle.command(Platform::Posix, "build"), "./gradlew build");
        assert_eq!(BuildTool::Gradle.command(Platform::Windows, "build"), "gradlew.bat build");
        assert_eq!(BuildTool::Gradle.command(Platform::Posix, ""), "./gradlew");
    }

    #[test]
    fn test_report_conventions() {
        let coverage = BuildTool::Maven.coverage_report();
        assert_eq!(coverage.name, "coverage");
        assert_eq!(coverage.directory.to_str(), Some("target/site/jacoco"));
        assert_eq!(coverage.url_path, "jacoco/");

        let tests = BuildTool::Gradle.test_report();
        assert_eq!(tests.directory.to_str(), Some("build/reports/tests/test"));
    }
}
