use chrono::Utc;
use serde::Serialize;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;

/// Which Maven phase the verification runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildMode {
    Test,
    CompileOnly,
}

impl BuildMode {
    pub fn goal(&self) -> &'static str {
        match self {
            BuildMode::Test => "test",
            BuildMode::CompileOnly => "compile",
        }
    }

    /// Bounded runtime: 300 s for the test phase, 120 s for compile-only.
    pub fn timeout(&self) -> Duration {
        match self {
            BuildMode::Test => Duration::from_secs(300),
            BuildMode::CompileOnly => Duration::from_secs(120),
        }
    }
}

/// Structured result of one Maven invocation.
#[derive(Debug, Clone, Serialize)]
pub struct BuildReport {
    pub success: bool,
    pub return_code: Option<i32>,
    pub timed_out: bool,
    /// First output line containing the `[ERROR]` marker, or the failure
    /// description when Maven never ran.
    pub error_line: Option<String>,
    pub stdout: String,
    pub stderr: String,
    /// Where Maven writes its detailed reports.
    pub reports_dir: Option<String>,
    pub timestamp: String,
}

impl BuildReport {
    fn not_run(detail: impl Into<String>) -> Self {
        Self {
            success: false,
            return_code: None,
            timed_out: false,
            error_line: Some(detail.into()),
            stdout: String::new(),
            stderr: String::new(),
            reports_dir: None,
            timestamp: now(),
        }
    }
}

fn now() -> String {
    Utc::now().to_rfc3339()
}

/// Verifies a previously written plugin project by running Maven in it.
pub struct MavenRunner {
    project_dir: PathBuf,
}

impl MavenRunner {
    pub fn new(project_dir: PathBuf) -> Self {
        Self { project_dir }
    }

    /// Runs `mvn clean <goal> -q` with a bounded timeout, capturing output.
    /// Precondition failures (missing directory, missing pom.xml) produce a
    /// structured report without spawning anything.
    pub async fn run(&self, mode: BuildMode) -> BuildReport {
        if !self.project_dir.is_dir() {
            return BuildReport::not_run(format!(
                "plugin project directory '{}' does not exist",
                self.project_dir.display()
            ));
        }
        if !self.project_dir.join("pom.xml").exists() {
            return BuildReport::not_run(format!(
                "no pom.xml found in '{}'",
                self.project_dir.display()
            ));
        }

        let mut command = Command::new("mvn");
        command
            .arg("clean")
            .arg(mode.goal())
            .arg("-q")
            .current_dir(&self.project_dir)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        match timeout(mode.timeout(), command.output()).await {
            Err(_) => BuildReport {
                success: false,
                return_code: None,
                timed_out: true,
                error_line: Some(format!(
                    "mvn clean {} exceeded the {} second timeout",
                    mode.goal(),
                    mode.timeout().as_secs()
                )),
                stdout: String::new(),
                stderr: String::new(),
                reports_dir: None,
                timestamp: now(),
            },
            Ok(Err(e)) => BuildReport::not_run(format!("failed to execute mvn: {}", e)),
            Ok(Ok(output)) => {
                let stdout = String::from_utf8_lossy(&output.stdout).to_string();
                let stderr = String::from_utf8_lossy(&output.stderr).to_string();
                BuildReport {
                    success: output.status.success(),
                    return_code: output.status.code(),
                    timed_out: false,
                    error_line: first_error_line(&stdout, &stderr),
                    reports_dir: Some(self.reports_dir(mode)),
                    stdout,
                    stderr,
                    timestamp: now(),
                }
            }
        }
    }

    fn reports_dir(&self, mode: BuildMode) -> String {
        let dir = match mode {
            BuildMode::Test => self.project_dir.join("target").join("surefire-reports"),
            BuildMode::CompileOnly => self.project_dir.join("target"),
        };
        dir.display().to_string()
    }
}

fn first_error_line(stdout: &str, stderr: &str) -> Option<String> {
    stdout
        .lines()
        .chain(stderr.lines())
        .find(|line| line.contains("[ERROR]"))
        .map(|line| line.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn build_modes_have_bounded_timeouts() {
        assert_eq!(BuildMode::Test.goal(), "test");
        assert_eq!(BuildMode::Test.timeout(), Duration::from_secs(300));
        assert_eq!(BuildMode::CompileOnly.goal(), "compile");
        assert_eq!(BuildMode::CompileOnly.timeout(), Duration::from_secs(120));
    }

    #[test]
    fn first_error_line_picks_the_first_marker() {
        let stdout = "[INFO] ok\n[ERROR] Failed to compile Foo.java\n[ERROR] second";
        let found = first_error_line(stdout, "");
        assert_eq!(found.as_deref(), Some("[ERROR] Failed to compile Foo.java"));
    }

    #[test]
    fn first_error_line_falls_back_to_stderr() {
        let found = first_error_line("[INFO] fine", "  [ERROR] boom  ");
        assert_eq!(found.as_deref(), Some("[ERROR] boom"));
        assert_eq!(first_error_line("[INFO] fine", "all good"), None);
    }

    #[tokio::test]
    async fn missing_directory_reports_without_spawning() {
        let runner = MavenRunner::new(PathBuf::from("/nonexistent/plugforge/project"));
        let report = runner.run(BuildMode::Test).await;

        assert!(!report.success);
        assert_eq!(report.return_code, None);
        assert!(!report.timed_out);
        assert!(report.error_line.as_deref().unwrap().contains("does not exist"));
    }

    #[tokio::test]
    async fn missing_pom_reports_without_spawning() {
        let dir = std::env::temp_dir().join(format!("plugforge_mvn_{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();

        let runner = MavenRunner::new(dir.clone());
        let report = runner.run(BuildMode::CompileOnly).await;

        assert!(!report.success);
        assert!(report.error_line.as_deref().unwrap().contains("no pom.xml"));

        let _ = fs::remove_dir_all(&dir);
    }
}
