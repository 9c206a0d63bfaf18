//! SQLite pattern repository
//!
//! Holds categories, test cases, browser patterns (with their blind regions
//! and reference screenshots) and the sessions/results of comparison runs.

use crate::types::{new_id, now};
use crate::{
    BlindRegion, BrowserName, BrowserPattern, Category, Error, PatternScreenshot, Result,
    TestCase, TestResult, TestSession,
};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, ToSql};
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Database wrapper for pattern and session persistence
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

const PATTERN_SELECT: &str = r#"
    SELECT p.id, p.test_case_id, t.name, t.category_id, p.browser_name, p.active, p.created_at,
           s.hash, s.width, s.height, s.png,
           r.x, r.y, r.width, r.height
    FROM browser_patterns p
    JOIN test_cases t ON t.id = p.test_case_id
    JOIN pattern_screenshots s ON s.pattern_id = p.id
    LEFT JOIN blind_regions r ON r.pattern_id = p.id
"#;

impl Database {
    /// Open or create database at path
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path.as_ref())?;

        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;

        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };

        db.init_schema()?;

        info!("Opened pattern database at {:?}", path.as_ref());
        Ok(db)
    }

    /// Open in-memory database (for testing)
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.init_schema()?;
        Ok(db)
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.conn.lock();

        conn.execute_batch(
            r#"
            PRAGMA foreign_keys = ON;

            CREATE TABLE IF NOT EXISTS categories (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL UNIQUE,
                created_at INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS test_cases (
                id TEXT PRIMARY KEY,
                category_id TEXT NOT NULL REFERENCES categories(id) ON DELETE CASCADE,
                name TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                UNIQUE (category_id, name)
            );
            CREATE INDEX IF NOT EXISTS idx_test_cases_category ON test_cases(category_id);

            CREATE TABLE IF NOT EXISTS browser_patterns (
                id TEXT PRIMARY KEY,
                test_case_id TEXT NOT NULL REFERENCES test_cases(id) ON DELETE CASCADE,
                browser_name TEXT NOT NULL,
                active INTEGER NOT NULL DEFAULT 1,
                created_at INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_patterns_browser ON browser_patterns(browser_name);
            -- At most one active pattern per (test case, browser)
            CREATE UNIQUE INDEX IF NOT EXISTS idx_patterns_active
                ON browser_patterns(test_case_id, browser_name) WHERE active = 1;

            CREATE TABLE IF NOT EXISTS pattern_screenshots (
                pattern_id TEXT PRIMARY KEY REFERENCES browser_patterns(id) ON DELETE CASCADE,
                hash TEXT NOT NULL,
                width INTEGER NOT NULL,
                height INTEGER NOT NULL,
                png BLOB NOT NULL
            );

            CREATE TABLE IF NOT EXISTS blind_regions (
                pattern_id TEXT NOT NULL REFERENCES browser_patterns(id) ON DELETE CASCADE,
                position INTEGER NOT NULL,
                x INTEGER NOT NULL,
                y INTEGER NOT NULL,
                width INTEGER NOT NULL,
                height INTEGER NOT NULL,
                PRIMARY KEY (pattern_id, position)
            );

            CREATE TABLE IF NOT EXISTS test_sessions (
                id TEXT PRIMARY KEY,
                category_id TEXT NOT NULL,
                browser_name TEXT NOT NULL,
                started_at INTEGER NOT NULL,
                finished_at INTEGER,
                passed INTEGER NOT NULL DEFAULT 0,
                failed INTEGER NOT NULL DEFAULT 0,
                missing INTEGER NOT NULL DEFAULT 0
            );

            CREATE TABLE IF NOT EXISTS test_results (
                id TEXT PRIMARY KEY,
                session_id TEXT NOT NULL REFERENCES test_sessions(id) ON DELETE CASCADE,
                test_case_name TEXT NOT NULL,
                browser_name TEXT NOT NULL,
                verdict TEXT NOT NULL,
                pattern_id TEXT,
                diff_percent REAL,
                screenshot_digest TEXT,
                diff_digest TEXT,
                message TEXT,
                created_at INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_test_results_session ON test_results(session_id);
            "#,
        )?;

        debug!("Database schema initialized");
        Ok(())
    }

    // ========================================================================
    // Categories and test cases
    // ========================================================================

    /// Create a category with a unique name
    pub fn create_category(&self, name: &str) -> Result<Category> {
        let conn = self.conn.lock();

        let taken: i64 = conn.query_row(
            "SELECT COUNT(*) FROM categories WHERE name = ?1",
            params![name],
            |row| row.get(0),
        )?;
        if taken > 0 {
            return Err(Error::already_exists("category", name));
        }

        let category = Category {
            id: new_id(),
            name: name.to_string(),
            created_at: now(),
        };
        conn.execute(
            "INSERT INTO categories (id, name, created_at) VALUES (?1, ?2, ?3)",
            params![category.id, category.name, category.created_at],
        )?;

        debug!("Created category {} ({})", category.name, category.id);
        Ok(category)
    }

    pub fn get_category(&self, id: &str) -> Result<Option<Category>> {
        let conn = self.conn.lock();
        let category = conn
            .query_row(
                "SELECT id, name, created_at FROM categories WHERE id = ?1",
                params![id],
                |row| {
                    Ok(Category {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        created_at: row.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(category)
    }

    pub fn find_category_by_name(&self, name: &str) -> Result<Option<Category>> {
        let conn = self.conn.lock();
        let category = conn
            .query_row(
                "SELECT id, name, created_at FROM categories WHERE name = ?1",
                params![name],
                |row| {
                    Ok(Category {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        created_at: row.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(category)
    }

    pub fn list_categories(&self) -> Result<Vec<Category>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare("SELECT id, name, created_at FROM categories ORDER BY name")?;
        let rows = stmt.query_map([], |row| {
            Ok(Category {
                id: row.get(0)?,
                name: row.get(1)?,
                created_at: row.get(2)?,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Create a test case inside an existing category
    pub fn create_test_case(&self, category_id: &str, name: &str) -> Result<TestCase> {
        let conn = self.conn.lock();

        let category_exists: i64 = conn.query_row(
            "SELECT COUNT(*) FROM categories WHERE id = ?1",
            params![category_id],
            |row| row.get(0),
        )?;
        if category_exists == 0 {
            return Err(Error::not_found("category", category_id));
        }

        let taken: i64 = conn.query_row(
            "SELECT COUNT(*) FROM test_cases WHERE category_id = ?1 AND name = ?2",
            params![category_id, name],
            |row| row.get(0),
        )?;
        if taken > 0 {
            return Err(Error::already_exists("test case", name));
        }

        let test_case = TestCase {
            id: new_id(),
            category_id: category_id.to_string(),
            name: name.to_string(),
            created_at: now(),
        };
        conn.execute(
            "INSERT INTO test_cases (id, category_id, name, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![
                test_case.id,
                test_case.category_id,
                test_case.name,
                test_case.created_at
            ],
        )?;

        debug!("Created test case {} in category {}", test_case.name, category_id);
        Ok(test_case)
    }

    pub fn get_test_case(&self, id: &str) -> Result<Option<TestCase>> {
        let conn = self.conn.lock();
        let test_case = conn
            .query_row(
                "SELECT id, category_id, name, created_at FROM test_cases WHERE id = ?1",
                params![id],
                map_test_case,
            )
            .optional()?;
        Ok(test_case)
    }

    pub fn find_test_case(&self, category_id: &str, name: &str) -> Result<Option<TestCase>> {
        let conn = self.conn.lock();
        let test_case = conn
            .query_row(
                "SELECT id, category_id, name, created_at FROM test_cases
                 WHERE category_id = ?1 AND name = ?2",
                params![category_id, name],
                map_test_case,
            )
            .optional()?;
        Ok(test_case)
    }

    pub fn list_test_cases(&self, category_id: &str) -> Result<Vec<TestCase>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, category_id, name, created_at FROM test_cases
             WHERE category_id = ?1 ORDER BY name",
        )?;
        let rows = stmt.query_map(params![category_id], map_test_case)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    // ========================================================================
    // Browser patterns
    // ========================================================================

    /// Store a new active pattern for a (test case, browser) pair.
    ///
    /// Any pattern that was active for the pair is deactivated in the same
    /// transaction. Every region must fit inside the screenshot.
    pub fn save_pattern(
        &self,
        test_case_id: &str,
        browser: &BrowserName,
        screenshot: PatternScreenshot,
        regions: &[BlindRegion],
    ) -> Result<BrowserPattern> {
        for region in regions {
            check_region_fits(region, &screenshot)?;
        }

        let test_case = self
            .get_test_case(test_case_id)?
            .ok_or_else(|| Error::not_found("test case", test_case_id))?;

        let pattern = BrowserPattern {
            id: new_id(),
            test_case_id: test_case.id.clone(),
            test_case_name: test_case.name.clone(),
            category_id: test_case.category_id.clone(),
            browser_name: browser.clone(),
            blind_regions: regions.to_vec(),
            screenshot,
            active: true,
            created_at: now(),
        };

        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;

        let replaced = tx.execute(
            "UPDATE browser_patterns SET active = 0
             WHERE test_case_id = ?1 AND browser_name = ?2 AND active = 1",
            params![pattern.test_case_id, browser.as_str()],
        )?;

        tx.execute(
            "INSERT INTO browser_patterns (id, test_case_id, browser_name, active, created_at)
             VALUES (?1, ?2, ?3, 1, ?4)",
            params![
                pattern.id,
                pattern.test_case_id,
                browser.as_str(),
                pattern.created_at
            ],
        )?;

        tx.execute(
            "INSERT INTO pattern_screenshots (pattern_id, hash, width, height, png)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                pattern.id,
                pattern.screenshot.hash,
                pattern.screenshot.width,
                pattern.screenshot.height,
                pattern.screenshot.png
            ],
        )?;

        for (position, region) in regions.iter().enumerate() {
            insert_region(&tx, &pattern.id, position as i64, region)?;
        }

        tx.commit()?;

        info!(
            "Saved pattern {} for '{}' on {} ({} blind regions, replaced {})",
            pattern.id,
            pattern.test_case_name,
            browser,
            regions.len(),
            replaced
        );
        Ok(pattern)
    }

    /// Append a blind region to an existing pattern
    pub fn add_blind_region(&self, pattern_id: &str, region: BlindRegion) -> Result<BrowserPattern> {
        let pattern = self
            .get_pattern(pattern_id)?
            .ok_or_else(|| Error::not_found("pattern", pattern_id))?;
        check_region_fits(&region, &pattern.screenshot)?;

        {
            let conn = self.conn.lock();
            let next: i64 = conn.query_row(
                "SELECT COALESCE(MAX(position) + 1, 0) FROM blind_regions WHERE pattern_id = ?1",
                params![pattern_id],
                |row| row.get(0),
            )?;
            insert_region(&conn, pattern_id, next, &region)?;
        }

        debug!("Added blind region {} to pattern {}", region, pattern_id);
        self.get_pattern(pattern_id)?
            .ok_or_else(|| Error::not_found("pattern", pattern_id))
    }

    /// Get a pattern (active or not) with regions and screenshot
    pub fn get_pattern(&self, id: &str) -> Result<Option<BrowserPattern>> {
        let patterns = self.query_patterns("WHERE p.id = ?1", params![id])?;
        Ok(patterns.into_iter().next())
    }

    /// The active pattern for a (test case, browser) pair, if any
    pub fn find_active_pattern(
        &self,
        test_case_id: &str,
        browser: &BrowserName,
    ) -> Result<Option<BrowserPattern>> {
        let patterns = self.query_patterns(
            "WHERE p.test_case_id = ?1 AND p.browser_name = ?2 AND p.active = 1",
            params![test_case_id, browser.as_str()],
        )?;
        Ok(patterns.into_iter().next())
    }

    /// All active patterns for a browser within a category.
    ///
    /// Blind regions and reference screenshots come back in the same joined
    /// query. An unknown category or browser yields an empty list.
    pub fn find_patterns_for_browser_in_category(
        &self,
        category_id: &str,
        browser: &BrowserName,
    ) -> Result<Vec<BrowserPattern>> {
        let patterns = self.query_patterns(
            "WHERE p.browser_name = ?1 AND t.category_id = ?2 AND p.active = 1",
            params![browser.as_str(), category_id],
        )?;
        debug!(
            "Found {} pattern(s) for {} in category {}",
            patterns.len(),
            browser,
            category_id
        );
        Ok(patterns)
    }

    /// Retire a pattern
    pub fn delete_pattern(&self, id: &str) -> Result<bool> {
        let conn = self.conn.lock();
        let rows = conn.execute("DELETE FROM browser_patterns WHERE id = ?1", params![id])?;

        if rows > 0 {
            debug!("Deleted pattern {}", id);
        }

        Ok(rows > 0)
    }

    fn query_patterns(&self, filter: &str, args: &[&dyn ToSql]) -> Result<Vec<BrowserPattern>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!(
            "{} {} ORDER BY t.name, p.browser_name, p.id, r.position",
            PATTERN_SELECT, filter
        ))?;

        let rows = stmt.query_map(args, |row| {
            Ok(RawPatternRow {
                id: row.get(0)?,
                test_case_id: row.get(1)?,
                test_case_name: row.get(2)?,
                category_id: row.get(3)?,
                browser_name: row.get(4)?,
                active: row.get(5)?,
                created_at: row.get(6)?,
                hash: row.get(7)?,
                width: row.get(8)?,
                height: row.get(9)?,
                png: row.get(10)?,
                region: match (
                    row.get::<_, Option<u32>>(11)?,
                    row.get::<_, Option<u32>>(12)?,
                    row.get::<_, Option<u32>>(13)?,
                    row.get::<_, Option<u32>>(14)?,
                ) {
                    (Some(x), Some(y), Some(w), Some(h)) => Some((x, y, w, h)),
                    _ => None,
                },
            })
        })?;

        let mut patterns: Vec<BrowserPattern> = Vec::new();
        for row in rows {
            let raw = row?;
            let region = raw.region.map(|(x, y, w, h)| BlindRegion::new(x, y, w, h)).transpose()?;

            let continues_last = patterns.last().map_or(false, |last| last.id == raw.id);
            if continues_last {
                if let Some(last) = patterns.last_mut() {
                    last.blind_regions.extend(region);
                }
            } else {
                let mut pattern = raw.into_pattern()?;
                pattern.blind_regions.extend(region);
                patterns.push(pattern);
            }
        }

        Ok(patterns)
    }

    // ========================================================================
    // Sessions and results
    // ========================================================================

    pub fn create_session(&self, category_id: &str, browser: &BrowserName) -> Result<TestSession> {
        let session = TestSession {
            id: new_id(),
            category_id: category_id.to_string(),
            browser_name: browser.clone(),
            started_at: now(),
            finished_at: None,
            passed: 0,
            failed: 0,
            missing: 0,
        };

        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO test_sessions (id, category_id, browser_name, started_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                session.id,
                session.category_id,
                browser.as_str(),
                session.started_at
            ],
        )?;

        debug!("Started session {}", session.id);
        Ok(session)
    }

    /// Close a session with its final tallies
    pub fn finish_session(
        &self,
        id: &str,
        passed: u32,
        failed: u32,
        missing: u32,
    ) -> Result<TestSession> {
        {
            let conn = self.conn.lock();
            let rows = conn.execute(
                "UPDATE test_sessions SET finished_at = ?1, passed = ?2, failed = ?3, missing = ?4
                 WHERE id = ?5",
                params![now(), passed, failed, missing, id],
            )?;
            if rows == 0 {
                return Err(Error::not_found("session", id));
            }
        }

        self.get_session(id)?
            .ok_or_else(|| Error::not_found("session", id))
    }

    pub fn get_session(&self, id: &str) -> Result<Option<TestSession>> {
        let conn = self.conn.lock();
        let raw = conn
            .query_row(
                "SELECT id, category_id, browser_name, started_at, finished_at, passed, failed, missing
                 FROM test_sessions WHERE id = ?1",
                params![id],
                map_session,
            )
            .optional()?;
        raw.map(RawSession::parse).transpose()
    }

    /// Sessions, newest first
    pub fn list_sessions(&self, limit: usize) -> Result<Vec<TestSession>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, category_id, browser_name, started_at, finished_at, passed, failed, missing
             FROM test_sessions ORDER BY started_at DESC, rowid DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit as i64], map_session)?;

        let mut sessions = Vec::new();
        for row in rows {
            sessions.push(row?.parse()?);
        }
        Ok(sessions)
    }

    pub fn record_result(&self, result: &TestResult) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO test_results (id, session_id, test_case_name, browser_name, verdict,
                pattern_id, diff_percent, screenshot_digest, diff_digest, message, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                result.id,
                result.session_id,
                result.test_case_name,
                result.browser_name.as_str(),
                result.verdict.as_str(),
                result.pattern_id,
                result.diff_percent,
                result.screenshot_digest,
                result.diff_digest,
                result.message,
                result.created_at,
            ],
        )?;

        debug!(
            "Recorded {} for '{}' in session {}",
            result.verdict, result.test_case_name, result.session_id
        );
        Ok(())
    }

    pub fn list_results(&self, session_id: &str) -> Result<Vec<TestResult>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, session_id, test_case_name, browser_name, verdict, pattern_id,
                    diff_percent, screenshot_digest, diff_digest, message, created_at
             FROM test_results WHERE session_id = ?1 ORDER BY test_case_name, rowid",
        )?;
        let rows = stmt.query_map(params![session_id], |row| {
            Ok(RawResult {
                id: row.get(0)?,
                session_id: row.get(1)?,
                test_case_name: row.get(2)?,
                browser_name: row.get(3)?,
                verdict: row.get(4)?,
                pattern_id: row.get(5)?,
                diff_percent: row.get(6)?,
                screenshot_digest: row.get(7)?,
                diff_digest: row.get(8)?,
                message: row.get(9)?,
                created_at: row.get(10)?,
            })
        })?;

        let mut results = Vec::new();
        for row in rows {
            results.push(row?.parse()?);
        }
        Ok(results)
    }

    /// Artifact digests still referenced by recorded results
    pub fn referenced_artifacts(&self) -> Result<HashSet<String>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT screenshot_digest FROM test_results WHERE screenshot_digest IS NOT NULL
             UNION
             SELECT diff_digest FROM test_results WHERE diff_digest IS NOT NULL",
        )?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        Ok(rows.collect::<rusqlite::Result<HashSet<_>>>()?)
    }

    /// Delete a session and its results
    pub fn delete_session(&self, id: &str) -> Result<bool> {
        let conn = self.conn.lock();
        let rows = conn.execute("DELETE FROM test_sessions WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }
}

fn check_region_fits(region: &BlindRegion, screenshot: &PatternScreenshot) -> Result<()> {
    if !region.fits_within(screenshot.width, screenshot.height) {
        return Err(Error::InvalidRegion(format!(
            "{} exceeds the {}x{} pattern image",
            region, screenshot.width, screenshot.height
        )));
    }
    Ok(())
}

fn insert_region(conn: &Connection, pattern_id: &str, position: i64, region: &BlindRegion) -> Result<()> {
    conn.execute(
        "INSERT INTO blind_regions (pattern_id, position, x, y, width, height)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            pattern_id,
            position,
            region.x(),
            region.y(),
            region.width(),
            region.height()
        ],
    )?;
    Ok(())
}

fn map_test_case(row: &rusqlite::Row<'_>) -> rusqlite::Result<TestCase> {
    Ok(TestCase {
        id: row.get(0)?,
        category_id: row.get(1)?,
        name: row.get(2)?,
        created_at: row.get(3)?,
    })
}

fn map_session(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawSession> {
    Ok(RawSession {
        id: row.get(0)?,
        category_id: row.get(1)?,
        browser_name: row.get(2)?,
        started_at: row.get(3)?,
        finished_at: row.get(4)?,
        passed: row.get(5)?,
        failed: row.get(6)?,
        missing: row.get(7)?,
    })
}

/// One row of the pattern join, before folding regions together
struct RawPatternRow {
    id: String,
    test_case_id: String,
    test_case_name: String,
    category_id: String,
    browser_name: String,
    active: bool,
    created_at: i64,
    hash: String,
    width: u32,
    height: u32,
    png: Vec<u8>,
    region: Option<(u32, u32, u32, u32)>,
}

impl RawPatternRow {
    fn into_pattern(self) -> Result<BrowserPattern> {
        Ok(BrowserPattern {
            id: self.id,
            test_case_id: self.test_case_id,
            test_case_name: self.test_case_name,
            category_id: self.category_id,
            browser_name: BrowserName::new(&self.browser_name)?,
            blind_regions: Vec::new(),
            screenshot: PatternScreenshot {
                hash: self.hash,
                width: self.width,
                height: self.height,
                png: self.png,
            },
            active: self.active,
            created_at: self.created_at,
        })
    }
}

struct RawSession {
    id: String,
    category_id: String,
    browser_name: String,
    started_at: i64,
    finished_at: Option<i64>,
    passed: u32,
    failed: u32,
    missing: u32,
}

impl RawSession {
    fn parse(self) -> Result<TestSession> {
        Ok(TestSession {
            id: self.id,
            category_id: self.category_id,
            browser_name: BrowserName::new(&self.browser_name)?,
            started_at: self.started_at,
            finished_at: self.finished_at,
            passed: self.passed,
            failed: self.failed,
            missing: self.missing,
        })
    }
}

struct RawResult {
    id: String,
    session_id: String,
    test_case_name: String,
    browser_name: String,
    verdict: String,
    pattern_id: Option<String>,
    diff_percent: Option<f64>,
    screenshot_digest: Option<String>,
    diff_digest: Option<String>,
    message: Option<String>,
    created_at: i64,
}

impl RawResult {
    fn parse(self) -> Result<TestResult> {
        Ok(TestResult {
            id: self.id,
            session_id: self.session_id,
            test_case_name: self.test_case_name,
            browser_name: BrowserName::new(&self.browser_name)?,
            verdict: self.verdict.parse()?,
            pattern_id: self.pattern_id,
            diff_percent: self.diff_percent,
            screenshot_digest: self.screenshot_digest,
            diff_digest: self.diff_digest,
            message: self.message,
            created_at: self.created_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Verdict;
    use image::{Rgba, RgbaImage};

    fn screenshot(width: u32, height: u32) -> PatternScreenshot {
        PatternScreenshot::from_image(&RgbaImage::from_pixel(width, height, Rgba([9, 9, 9, 255])))
            .unwrap()
    }

    fn chrome() -> BrowserName {
        BrowserName::new("chrome").unwrap()
    }

    #[test]
    fn test_category_and_cases() {
        let db = Database::open_memory().unwrap();
        let cat = db.create_category("checkout").unwrap();

        assert!(matches!(
            db.create_category("checkout"),
            Err(Error::AlreadyExists { .. })
        ));
        assert_eq!(db.find_category_by_name("checkout").unwrap(), Some(cat.clone()));

        db.create_test_case(&cat.id, "cart").unwrap();
        db.create_test_case(&cat.id, "address").unwrap();
        assert!(matches!(
            db.create_test_case(&cat.id, "cart"),
            Err(Error::AlreadyExists { .. })
        ));
        assert!(matches!(
            db.create_test_case("nope", "cart"),
            Err(Error::NotFound { .. })
        ));

        let names: Vec<String> = db
            .list_test_cases(&cat.id)
            .unwrap()
            .into_iter()
            .map(|t| t.name)
            .collect();
        assert_eq!(names, vec!["address", "cart"]);
    }

    #[test]
    fn test_save_pattern_keeps_region_order() {
        let db = Database::open_memory().unwrap();
        let cat = db.create_category("c").unwrap();
        let case = db.create_test_case(&cat.id, "home").unwrap();

        let regions = vec![
            BlindRegion::new(5, 5, 2, 2).unwrap(),
            BlindRegion::new(0, 0, 1, 1).unwrap(),
            BlindRegion::new(3, 1, 4, 1).unwrap(),
        ];
        let saved = db
            .save_pattern(&case.id, &chrome(), screenshot(10, 10), &regions)
            .unwrap();

        let loaded = db.get_pattern(&saved.id).unwrap().unwrap();
        assert_eq!(loaded.blind_regions, regions);
        assert_eq!(loaded.screenshot, saved.screenshot);
        assert_eq!(loaded.test_case_name, "home");
        assert!(loaded.active);
    }

    #[test]
    fn test_save_pattern_rejects_out_of_bounds_region() {
        let db = Database::open_memory().unwrap();
        let cat = db.create_category("c").unwrap();
        let case = db.create_test_case(&cat.id, "home").unwrap();

        let err = db
            .save_pattern(
                &case.id,
                &chrome(),
                screenshot(10, 10),
                &[BlindRegion::new(8, 0, 3, 1).unwrap()],
            )
            .unwrap_err();
        assert!(matches!(err, Error::InvalidRegion(_)));
        assert!(db.find_active_pattern(&case.id, &chrome()).unwrap().is_none());
    }

    #[test]
    fn test_new_pattern_replaces_active_one() {
        let db = Database::open_memory().unwrap();
        let cat = db.create_category("c").unwrap();
        let case = db.create_test_case(&cat.id, "home").unwrap();

        let first = db.save_pattern(&case.id, &chrome(), screenshot(4, 4), &[]).unwrap();
        let second = db.save_pattern(&case.id, &chrome(), screenshot(5, 5), &[]).unwrap();

        let active = db.find_active_pattern(&case.id, &chrome()).unwrap().unwrap();
        assert_eq!(active.id, second.id);
        assert!(!db.get_pattern(&first.id).unwrap().unwrap().active);

        let all = db.find_patterns_for_browser_in_category(&cat.id, &chrome()).unwrap();
        assert_eq!(all.len(), 1);
    }

    #[test]
    fn test_add_blind_region_appends() {
        let db = Database::open_memory().unwrap();
        let cat = db.create_category("c").unwrap();
        let case = db.create_test_case(&cat.id, "home").unwrap();
        let first = BlindRegion::new(0, 0, 2, 2).unwrap();
        let pattern = db
            .save_pattern(&case.id, &chrome(), screenshot(10, 10), &[first])
            .unwrap();

        let second = BlindRegion::new(4, 4, 6, 6).unwrap();
        let updated = db.add_blind_region(&pattern.id, second).unwrap();
        assert_eq!(updated.blind_regions, vec![first, second]);

        assert!(matches!(
            db.add_blind_region(&pattern.id, BlindRegion::new(9, 9, 2, 1).unwrap()),
            Err(Error::InvalidRegion(_))
        ));
        assert!(matches!(
            db.add_blind_region("missing", second),
            Err(Error::NotFound { .. })
        ));
    }

    #[test]
    fn test_delete_pattern_cascades() {
        let db = Database::open_memory().unwrap();
        let cat = db.create_category("c").unwrap();
        let case = db.create_test_case(&cat.id, "home").unwrap();
        let pattern = db
            .save_pattern(
                &case.id,
                &chrome(),
                screenshot(4, 4),
                &[BlindRegion::new(0, 0, 1, 1).unwrap()],
            )
            .unwrap();

        assert!(db.delete_pattern(&pattern.id).unwrap());
        assert!(!db.delete_pattern(&pattern.id).unwrap());
        assert!(db.get_pattern(&pattern.id).unwrap().is_none());

        let conn = db.conn.lock();
        let orphans: i64 = conn
            .query_row("SELECT COUNT(*) FROM blind_regions", [], |row| row.get(0))
            .unwrap();
        assert_eq!(orphans, 0);
    }

    #[test]
    fn test_sessions_and_results() {
        let db = Database::open_memory().unwrap();
        let session = db.create_session("cat", &chrome()).unwrap();
        assert!(session.finished_at.is_none());

        let mut result = TestResult::new(&session.id, "home", &chrome(), Verdict::Failed);
        result.diff_percent = Some(12.5);
        result.screenshot_digest = Some("aa11".to_string());
        result.diff_digest = Some("bb22".to_string());
        result.message = Some("pixels differ".to_string());
        db.record_result(&result).unwrap();
        db.record_result(&TestResult::new(&session.id, "about", &chrome(), Verdict::NoPattern))
            .unwrap();

        let finished = db.finish_session(&session.id, 0, 1, 1).unwrap();
        assert_eq!((finished.passed, finished.failed, finished.missing), (0, 1, 1));
        assert!(finished.finished_at.is_some());

        let results = db.list_results(&session.id).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].test_case_name, "about");
        assert_eq!(results[1], result);

        assert_eq!(db.list_sessions(10).unwrap().len(), 1);
        let referenced = db.referenced_artifacts().unwrap();
        assert!(referenced.contains("aa11") && referenced.contains("bb22"));
        assert_eq!(referenced.len(), 2);

        assert!(db.delete_session(&session.id).unwrap());
        assert!(db.list_results(&session.id).unwrap().is_empty());
        assert!(matches!(
            db.finish_session("missing", 0, 0, 0),
            Err(Error::NotFound { .. })
        ));
    }
}
