//! Comparison runs over every pattern of a category for one browser

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use patternwatch_common::{
    encode_png, ArtifactStore, BrowserName, BrowserPattern, Category, Database, PatternScreenshot,
    TestResult, TestSession, Verdict,
};
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::camera::{BrowserCamera, Candidate};
use crate::compare::{Comparator, Comparison, ComparisonSettings};
use crate::error::{VisualError, VisualResult};

/// Configuration for comparison runs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    pub comparison: ComparisonSettings,

    /// Store captures that have no pattern yet as the new pattern
    pub auto_accept_missing: bool,

    /// Upper bound on comparisons running at once
    pub parallelism: usize,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            comparison: ComparisonSettings::default(),
            auto_accept_missing: false,
            parallelism: 4,
        }
    }
}

/// Result of running all patterns of a category
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub session: TestSession,
    pub passed: u32,
    pub failed: u32,
    pub missing: u32,
    pub duration_ms: u64,
    pub results: Vec<TestResult>,
}

impl RunReport {
    pub fn success(&self) -> bool {
        self.failed == 0
    }
}

/// What a blocking capture-and-compare job found for one pattern
enum Checked {
    NotCaptured,
    Unreadable(VisualError),
    Compared(Candidate, VisualResult<Comparison>),
}

/// Checks captured screenshots against the active patterns of a category
pub struct PatternRunner {
    db: Database,
    artifacts: ArtifactStore,
    config: RunnerConfig,
}

impl PatternRunner {
    pub fn new(db: Database, artifacts: ArtifactStore, config: RunnerConfig) -> Self {
        Self {
            db,
            artifacts,
            config,
        }
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Compare every capture the camera holds for `category` on `browser`.
    ///
    /// Patterns without a capture fail; captures without a pattern are
    /// reported as [`Verdict::NoPattern`]. Camera reads and comparisons run
    /// on the blocking pool. If the run stops on an error, its session is
    /// removed again.
    pub async fn run(
        &self,
        category: &Category,
        browser: &BrowserName,
        camera: Arc<dyn BrowserCamera>,
    ) -> VisualResult<RunReport> {
        let start = Instant::now();
        let patterns = self
            .db
            .find_patterns_for_browser_in_category(&category.id, browser)?;
        let session = self.db.create_session(&category.id, browser)?;

        info!(
            "Checking {} pattern(s) of '{}' on {} (session {})",
            patterns.len(),
            category.name,
            browser,
            session.id
        );

        let results = match self
            .check_all(&session, category, browser, patterns, camera)
            .await
        {
            Ok(results) => results,
            Err(e) => {
                error!("Run aborted: {}", e);
                if let Err(cleanup) = self.db.delete_session(&session.id) {
                    warn!("Could not remove session {}: {}", session.id, cleanup);
                }
                return Err(e);
            }
        };

        let mut passed = 0;
        let mut failed = 0;
        let mut missing = 0;
        for result in &results {
            match result.verdict {
                Verdict::Passed => {
                    passed += 1;
                    info!("✓ {}", result.test_case_name);
                }
                Verdict::Failed => {
                    failed += 1;
                    error!(
                        "✗ {} - {}",
                        result.test_case_name,
                        result.message.as_deref().unwrap_or("mismatch")
                    );
                }
                Verdict::NoPattern => {
                    missing += 1;
                    info!("? {} - no pattern", result.test_case_name);
                }
            }
        }

        let session = self.db.finish_session(&session.id, passed, failed, missing)?;
        let duration_ms = start.elapsed().as_millis() as u64;

        info!(
            "Results: {} passed, {} failed, {} without pattern ({} ms)",
            passed, failed, missing, duration_ms
        );

        Ok(RunReport {
            session,
            passed,
            failed,
            missing,
            duration_ms,
            results,
        })
    }

    /// Check, sort and record every result of a session
    async fn check_all(
        &self,
        session: &TestSession,
        category: &Category,
        browser: &BrowserName,
        patterns: Vec<BrowserPattern>,
        camera: Arc<dyn BrowserCamera>,
    ) -> VisualResult<Vec<TestResult>> {
        let covered: HashSet<String> = patterns.iter().map(|p| p.test_case_name.clone()).collect();
        let mut results = Vec::new();

        let comparator = Comparator::new(self.config.comparison);
        let permits = Arc::new(Semaphore::new(self.config.parallelism.max(1)));
        let mut jobs = JoinSet::new();

        for pattern in patterns {
            let permit = permits.clone().acquire_owned().await?;
            let camera = camera.clone();

            jobs.spawn_blocking(move || {
                let _permit = permit;
                let checked = match camera.capture(&pattern.test_case_name) {
                    Ok(Some(candidate)) => {
                        let outcome = comparator.compare_pattern(&candidate.image, &pattern);
                        Checked::Compared(candidate, outcome)
                    }
                    Ok(None) => Checked::NotCaptured,
                    Err(e) => Checked::Unreadable(e),
                };
                (pattern, checked)
            });
        }

        while let Some(joined) = jobs.join_next().await {
            let (pattern, checked) = joined?;
            let result = match checked {
                Checked::NotCaptured => {
                    let mut result = self.result_for(session, &pattern, Verdict::Failed);
                    result.message = Some("screenshot not captured".to_string());
                    result
                }
                Checked::Unreadable(e) => {
                    warn!("Could not read capture of '{}': {}", pattern.test_case_name, e);
                    let mut result = self.result_for(session, &pattern, Verdict::Failed);
                    result.message = Some(e.to_string());
                    result
                }
                Checked::Compared(candidate, outcome) => {
                    let screenshot_digest = self.artifacts.put(&candidate.png).await?;
                    match outcome {
                        Ok(comparison) => {
                            self.record_comparison(session, &pattern, screenshot_digest, comparison)
                                .await?
                        }
                        Err(e) => {
                            warn!("Could not compare '{}': {}", pattern.test_case_name, e);
                            let mut result = self.result_for(session, &pattern, Verdict::Failed);
                            result.screenshot_digest = Some(screenshot_digest);
                            result.message = Some(e.to_string());
                            result
                        }
                    }
                }
            };
            results.push(result);
        }

        let lister = camera.clone();
        let names = tokio::task::spawn_blocking(move || lister.list()).await??;
        for name in names {
            if covered.contains(&name) {
                continue;
            }
            results.push(
                self.handle_missing(session, category, browser, &camera, &name)
                    .await?,
            );
        }

        results.sort_by(|a, b| a.test_case_name.cmp(&b.test_case_name));
        for result in &results {
            self.db.record_result(result)?;
        }
        Ok(results)
    }

    fn result_for(&self, session: &TestSession, pattern: &BrowserPattern, verdict: Verdict) -> TestResult {
        let mut result = TestResult::new(
            &session.id,
            &pattern.test_case_name,
            &pattern.browser_name,
            verdict,
        );
        result.pattern_id = Some(pattern.id.clone());
        result
    }

    async fn record_comparison(
        &self,
        session: &TestSession,
        pattern: &BrowserPattern,
        screenshot_digest: String,
        comparison: Comparison,
    ) -> VisualResult<TestResult> {
        let verdict = if comparison.matches {
            Verdict::Passed
        } else {
            Verdict::Failed
        };
        let mut result = self.result_for(session, pattern, verdict);
        result.diff_percent = Some(comparison.diff_percent);
        result.screenshot_digest = Some(screenshot_digest);

        if let Some(diff) = &comparison.diff_image {
            let png = encode_png(diff)?;
            result.diff_digest = Some(self.artifacts.put(&png).await?);
            result.message = Some(if comparison.dimensions_match {
                format!("{:.2}% of compared pixels differ", comparison.diff_percent)
            } else {
                format!(
                    "{:.2}% of compared pixels differ (size differs from the {}x{} pattern)",
                    comparison.diff_percent, pattern.screenshot.width, pattern.screenshot.height
                )
            });
        }

        debug!(
            "'{}' compared: {} differing of {} pixels ({} masked)",
            pattern.test_case_name,
            comparison.diff_pixels,
            comparison.compared_pixels,
            comparison.masked_pixels
        );
        Ok(result)
    }

    async fn handle_missing(
        &self,
        session: &TestSession,
        category: &Category,
        browser: &BrowserName,
        camera: &Arc<dyn BrowserCamera>,
        name: &str,
    ) -> VisualResult<TestResult> {
        let mut result = TestResult::new(&session.id, name, browser, Verdict::NoPattern);

        let reader = camera.clone();
        let owned = name.to_string();
        let candidate = match tokio::task::spawn_blocking(move || reader.capture(&owned)).await? {
            Ok(Some(candidate)) => candidate,
            Ok(None) => return Ok(result),
            Err(e) => {
                warn!("Could not read capture of '{}': {}", name, e);
                result.verdict = Verdict::Failed;
                result.message = Some(e.to_string());
                return Ok(result);
            }
        };
        result.screenshot_digest = Some(self.artifacts.put(&candidate.png).await?);

        if self.config.auto_accept_missing {
            let pattern = self.accept(category, browser, &candidate)?;
            info!("Accepted capture of '{}' as pattern {}", name, pattern.id);
            result.pattern_id = Some(pattern.id);
            result.message = Some("accepted as new pattern".to_string());
        }

        Ok(result)
    }

    fn accept(
        &self,
        category: &Category,
        browser: &BrowserName,
        candidate: &Candidate,
    ) -> VisualResult<BrowserPattern> {
        let test_case = match self.db.find_test_case(&category.id, &candidate.name)? {
            Some(test_case) => test_case,
            None => self.db.create_test_case(&category.id, &candidate.name)?,
        };
        let screenshot = PatternScreenshot::from_png(candidate.png.clone())?;
        Ok(self.db.save_pattern(&test_case.id, browser, screenshot, &[])?)
    }

    /// Write a run report as pretty JSON
    pub fn write_report(report: &RunReport, path: &Path) -> VisualResult<PathBuf> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string_pretty(report)?;
        std::fs::write(path, json)?;

        info!("Report written to: {}", path.display());
        Ok(path.to_path_buf())
    }
}
