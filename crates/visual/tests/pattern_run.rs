//! End-to-end comparison runs against an in-memory pattern database

use std::collections::HashMap;
use std::sync::Arc;

use image::{Rgba, RgbaImage};
use patternwatch_common::{
    ArtifactStore, BlindRegion, BrowserName, Category, Database, PatternScreenshot, Verdict,
};
use patternwatch_visual::{
    BrowserCamera, Candidate, DirectoryCamera, PatternRunner, RunnerConfig, VisualError,
    VisualResult,
};
use tempfile::TempDir;

/// Camera backed by images held in memory
#[derive(Default)]
struct MemoryCamera {
    shots: HashMap<String, RgbaImage>,
}

impl MemoryCamera {
    fn with(mut self, name: &str, image: RgbaImage) -> Self {
        self.shots.insert(name.to_string(), image);
        self
    }
}

impl BrowserCamera for MemoryCamera {
    fn capture(&self, test_case: &str) -> VisualResult<Option<Candidate>> {
        match self.shots.get(test_case) {
            Some(image) => {
                let png = patternwatch_common::encode_png(image)?;
                Candidate::from_png(test_case, png).map(Some)
            }
            None => Ok(None),
        }
    }

    fn list(&self) -> VisualResult<Vec<String>> {
        let mut names: Vec<String> = self.shots.keys().cloned().collect();
        names.sort();
        Ok(names)
    }
}

fn solid(color: [u8; 4]) -> RgbaImage {
    RgbaImage::from_pixel(20, 10, Rgba(color))
}

fn with_banner(mut image: RgbaImage, color: [u8; 4]) -> RgbaImage {
    for y in 0..3 {
        for x in 0..20 {
            image.put_pixel(x, y, Rgba(color));
        }
    }
    image
}

fn chrome() -> BrowserName {
    BrowserName::new("chrome").unwrap()
}

struct Fixture {
    _tmp: TempDir,
    db: Database,
    artifacts: ArtifactStore,
    category: Category,
}

async fn fixture() -> Fixture {
    let tmp = TempDir::new().unwrap();
    let db = Database::open_memory().unwrap();
    let artifacts = ArtifactStore::new(tmp.path().join("artifacts")).await.unwrap();
    let category = db.create_category("storefront").unwrap();

    let banner = BlindRegion::new(0, 0, 20, 3).unwrap();
    for (name, regions) in [("home", vec![banner]), ("cart", vec![]), ("login", vec![])] {
        let case = db.create_test_case(&category.id, name).unwrap();
        let shot = PatternScreenshot::from_image(&solid([200, 200, 200, 255])).unwrap();
        db.save_pattern(&case.id, &chrome(), shot, &regions).unwrap();
    }

    // Same screen for another browser must not leak into chrome runs
    let case = db.find_test_case(&category.id, "cart").unwrap().unwrap();
    let shot = PatternScreenshot::from_image(&solid([0, 0, 0, 255])).unwrap();
    db.save_pattern(&case.id, &BrowserName::new("firefox").unwrap(), shot, &[])
        .unwrap();

    Fixture {
        _tmp: tmp,
        db,
        artifacts,
        category,
    }
}

#[tokio::test]
async fn test_run_reports_each_verdict() {
    let f = fixture().await;
    let camera = MemoryCamera::default()
        .with("home", with_banner(solid([200, 200, 200, 255]), [9, 9, 9, 255]))
        .with("cart", with_banner(solid([200, 200, 200, 255]), [9, 9, 9, 255]))
        .with("checkout", solid([1, 1, 1, 255]));

    let runner = PatternRunner::new(f.db.clone(), f.artifacts.clone(), RunnerConfig::default());
    let report = runner
        .run(&f.category, &chrome(), Arc::new(camera))
        .await
        .unwrap();

    let verdicts: Vec<(&str, Verdict)> = report
        .results
        .iter()
        .map(|r| (r.test_case_name.as_str(), r.verdict))
        .collect();
    assert_eq!(
        verdicts,
        vec![
            ("cart", Verdict::Failed),
            ("checkout", Verdict::NoPattern),
            ("home", Verdict::Passed),
            ("login", Verdict::Failed),
        ]
    );
    assert_eq!((report.passed, report.failed, report.missing), (1, 2, 1));
    assert!(!report.success());

    let cart = &report.results[0];
    assert_eq!(cart.diff_percent, Some(30.0));
    let diff_digest = cart.diff_digest.clone().expect("diff artifact stored");
    assert!(f.artifacts.verify(&diff_digest).await.unwrap());

    let login = &report.results[3];
    assert_eq!(login.message.as_deref(), Some("screenshot not captured"));
    assert!(login.screenshot_digest.is_none());

    let stored = f.db.list_results(&report.session.id).unwrap();
    assert_eq!(stored, report.results);
    let session = f.db.get_session(&report.session.id).unwrap().unwrap();
    assert!(session.finished_at.is_some());
    assert_eq!(session.failed, 2);
}

#[tokio::test]
async fn test_unknown_category_has_no_patterns() {
    let f = fixture().await;
    let other = f.db.create_category("empty").unwrap();
    let camera = MemoryCamera::default().with("home", solid([1, 2, 3, 255]));

    let runner = PatternRunner::new(f.db.clone(), f.artifacts.clone(), RunnerConfig::default());
    let report = runner.run(&other, &chrome(), Arc::new(camera)).await.unwrap();

    assert!(report.success());
    assert_eq!(report.missing, 1);
    assert_eq!(report.results[0].verdict, Verdict::NoPattern);
}

#[tokio::test]
async fn test_auto_accept_creates_pattern() {
    let f = fixture().await;
    let capture = solid([5, 6, 7, 255]);
    let camera: Arc<dyn BrowserCamera> =
        Arc::new(MemoryCamera::default().with("checkout", capture.clone()));

    let config = RunnerConfig {
        auto_accept_missing: true,
        ..Default::default()
    };
    let runner = PatternRunner::new(f.db.clone(), f.artifacts.clone(), config);
    let first = runner
        .run(&f.category, &chrome(), camera.clone())
        .await
        .unwrap();
    let accepted = first
        .results
        .iter()
        .find(|r| r.test_case_name == "checkout")
        .unwrap();
    assert_eq!(accepted.verdict, Verdict::NoPattern);
    let pattern_id = accepted.pattern_id.clone().expect("pattern created");

    let pattern = f.db.get_pattern(&pattern_id).unwrap().unwrap();
    assert_eq!(pattern.screenshot.decode().unwrap(), capture);

    let second = runner.run(&f.category, &chrome(), camera).await.unwrap();
    let rerun = second
        .results
        .iter()
        .find(|r| r.test_case_name == "checkout")
        .unwrap();
    assert_eq!(rerun.verdict, Verdict::Passed);
}

#[tokio::test]
async fn test_directory_camera_run_and_report() {
    let f = fixture().await;
    let shots = TempDir::new().unwrap();
    for name in ["home", "cart", "login"] {
        solid([200, 200, 200, 255])
            .save(shots.path().join(format!("chrome_{}.png", name)))
            .unwrap();
    }

    let camera = DirectoryCamera::new(shots.path()).with_prefix("chrome_");
    let runner = PatternRunner::new(
        f.db.clone(),
        f.artifacts.clone(),
        RunnerConfig {
            parallelism: 1,
            ..Default::default()
        },
    );
    let report = runner
        .run(&f.category, &chrome(), Arc::new(camera))
        .await
        .unwrap();
    assert!(report.success());
    assert_eq!(report.passed, 3);

    let path = PatternRunner::write_report(&report, &shots.path().join("out/report.json")).unwrap();
    let json: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
    assert_eq!(json["passed"], 3);
    assert_eq!(json["results"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn test_unreadable_capture_without_pattern_is_recorded() {
    let f = fixture().await;
    let shots = TempDir::new().unwrap();
    solid([200, 200, 200, 255])
        .save(shots.path().join("home.png"))
        .unwrap();
    std::fs::write(shots.path().join("extra.png"), b"not a png").unwrap();

    let runner = PatternRunner::new(f.db.clone(), f.artifacts.clone(), RunnerConfig::default());
    let camera = DirectoryCamera::new(shots.path());
    let report = runner
        .run(&f.category, &chrome(), Arc::new(camera))
        .await
        .unwrap();

    let extra = report
        .results
        .iter()
        .find(|r| r.test_case_name == "extra")
        .unwrap();
    assert_eq!(extra.verdict, Verdict::Failed);
    assert!(extra.message.as_deref().unwrap().contains("could not be read"));

    let home = report
        .results
        .iter()
        .find(|r| r.test_case_name == "home")
        .unwrap();
    assert_eq!(home.verdict, Verdict::Passed);

    let session = f.db.get_session(&report.session.id).unwrap().unwrap();
    assert!(session.finished_at.is_some());
    assert_eq!(f.db.list_results(&session.id).unwrap().len(), report.results.len());
}

/// Camera whose directory listing always fails
struct BrokenCamera;

impl BrowserCamera for BrokenCamera {
    fn capture(&self, _test_case: &str) -> VisualResult<Option<Candidate>> {
        Ok(None)
    }

    fn list(&self) -> VisualResult<Vec<String>> {
        Err(VisualError::Io(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "screenshot directory unreadable",
        )))
    }
}

#[tokio::test]
async fn test_aborted_run_leaves_no_session() {
    let f = fixture().await;
    let runner = PatternRunner::new(f.db.clone(), f.artifacts.clone(), RunnerConfig::default());

    let outcome = runner.run(&f.category, &chrome(), Arc::new(BrokenCamera)).await;
    assert!(matches!(outcome, Err(VisualError::Io(_))));
    assert!(f.db.list_sessions(10).unwrap().is_empty());
}
