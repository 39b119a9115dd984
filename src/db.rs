use anyhow::Result;
use chrono::{NaiveDateTime, Utc};
use rusqlite::{Connection, OptionalExtension};

use crate::parser::{Semester, Subject, Transcript};

const DB_PATH: &str = "data/transcripts.sqlite";

/// Cached portal pages younger than this are served without refetching.
pub const CACHE_MAX_AGE_HOURS: i64 = 24;

pub fn connect() -> Result<Connection> {
    std::fs::create_dir_all("data")?;
    let conn = Connection::open(DB_PATH)?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS pins (
            id         INTEGER PRIMARY KEY,
            pin        TEXT UNIQUE NOT NULL,
            fetched    BOOLEAN NOT NULL DEFAULT 0,
            fetched_at TEXT,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS page_data (
            id         INTEGER PRIMARY KEY,
            pin_id     INTEGER NOT NULL REFERENCES pins(id),
            pin        TEXT NOT NULL,
            html       TEXT,
            status     INTEGER,
            error      TEXT,
            latency_ms INTEGER,
            fetched_at TEXT NOT NULL DEFAULT (datetime('now'))
        );
        CREATE INDEX IF NOT EXISTS idx_page_data_pin ON page_data(pin);

        -- Extracted structured data
        CREATE TABLE IF NOT EXISTS transcripts (
            pin          TEXT PRIMARY KEY,
            page_data_id INTEGER REFERENCES page_data(id),
            student_name TEXT,
            roll_number  TEXT,
            parsed_at    TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS semesters (
            id       INTEGER PRIMARY KEY,
            pin      TEXT NOT NULL REFERENCES transcripts(pin),
            label    TEXT NOT NULL,
            rank     INTEGER NOT NULL,
            sgpa     TEXT,
            cgpa     TEXT,
            position INTEGER NOT NULL,
            UNIQUE(pin, label)
        );
        CREATE INDEX IF NOT EXISTS idx_semesters_pin ON semesters(pin);

        CREATE TABLE IF NOT EXISTS subjects (
            id          INTEGER PRIMARY KEY,
            semester_id INTEGER NOT NULL REFERENCES semesters(id),
            code        TEXT,
            name        TEXT,
            grade       TEXT,
            grade_point TEXT,
            credit      TEXT,
            status      TEXT,
            points      TEXT,
            position    INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_subjects_semester ON subjects(semester_id);
        ",
    )?;
    Ok(())
}

// ── Fetching ──

pub fn upsert_pin(conn: &Connection, pin: &str) -> Result<i64> {
    conn.execute(
        "INSERT OR IGNORE INTO pins (pin) VALUES (?1)",
        rusqlite::params![pin],
    )?;
    let id = conn.query_row(
        "SELECT id FROM pins WHERE pin = ?1",
        rusqlite::params![pin],
        |row| row.get(0),
    )?;
    Ok(id)
}

pub struct CachedPage {
    pub id: i64,
    pub html: Option<String>,
    pub error: Option<String>,
    pub fetched_at: String,
}

/// Latest fetch attempt for a PIN, successful or not.
pub fn latest_page(conn: &Connection, pin: &str) -> Result<Option<CachedPage>> {
    let page = conn
        .query_row(
            "SELECT id, html, error, fetched_at FROM page_data
             WHERE pin = ?1 ORDER BY id DESC LIMIT 1",
            rusqlite::params![pin],
            |row| {
                Ok(CachedPage {
                    id: row.get(0)?,
                    html: row.get(1)?,
                    error: row.get(2)?,
                    fetched_at: row.get(3)?,
                })
            },
        )
        .optional()?;
    Ok(page)
}

/// True if a `datetime('now')`-formatted timestamp is younger than the
/// cache window.
pub fn is_fresh(fetched_at: &str) -> bool {
    let Ok(parsed) = NaiveDateTime::parse_from_str(fetched_at, "%Y-%m-%d %H:%M:%S") else {
        return false;
    };
    let age = Utc::now().naive_utc() - parsed;
    age.num_hours() < CACHE_MAX_AGE_HOURS
}

pub struct FetchRow {
    pub pin_id: i64,
    pub pin: String,
    pub html: Option<String>,
    pub status: Option<i32>,
    pub error: Option<String>,
    pub latency_ms: Option<i64>,
}

/// Record a fetch attempt and mark the PIN visited. Returns the page row id.
pub fn insert_page(conn: &Connection, row: &FetchRow) -> Result<i64> {
    conn.execute(
        "INSERT INTO page_data (pin_id, pin, html, status, error, latency_ms)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        rusqlite::params![
            row.pin_id,
            row.pin,
            row.html,
            row.status,
            row.error,
            row.latency_ms,
        ],
    )?;
    let page_id = conn.last_insert_rowid();
    conn.execute(
        "UPDATE pins SET fetched = 1, fetched_at = datetime('now') WHERE id = ?1",
        rusqlite::params![row.pin_id],
    )?;
    Ok(page_id)
}

// ── Parsing ──

pub struct StoredPage {
    pub id: i64,
    pub pin: String,
    pub html: String,
}

/// Latest successfully fetched page per PIN, for batch reparsing.
pub fn latest_pages(conn: &Connection, limit: Option<usize>) -> Result<Vec<StoredPage>> {
    let sql = match limit {
        Some(n) => format!(
            "SELECT p.id, p.pin, p.html FROM page_data p
             WHERE p.html IS NOT NULL
               AND p.id = (SELECT MAX(id) FROM page_data WHERE pin = p.pin AND html IS NOT NULL)
             ORDER BY p.id LIMIT {}",
            n
        ),
        None => "SELECT p.id, p.pin, p.html FROM page_data p
             WHERE p.html IS NOT NULL
               AND p.id = (SELECT MAX(id) FROM page_data WHERE pin = p.pin AND html IS NOT NULL)
             ORDER BY p.id"
            .to_string(),
    };
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([], |row| {
            Ok(StoredPage {
                id: row.get(0)?,
                pin: row.get(1)?,
                html: row.get(2)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Replace the stored transcript for a PIN with a freshly extracted one.
pub fn save_transcript(
    conn: &Connection,
    pin: &str,
    page_data_id: i64,
    transcript: &Transcript,
) -> Result<()> {
    let tx = conn.unchecked_transaction()?;
    tx.execute(
        "DELETE FROM subjects WHERE semester_id IN (SELECT id FROM semesters WHERE pin = ?1)",
        rusqlite::params![pin],
    )?;
    tx.execute(
        "DELETE FROM semesters WHERE pin = ?1",
        rusqlite::params![pin],
    )?;
    tx.execute(
        "INSERT OR REPLACE INTO transcripts (pin, page_data_id, student_name, roll_number)
         VALUES (?1, ?2, ?3, ?4)",
        rusqlite::params![
            pin,
            page_data_id,
            transcript.student_name,
            transcript.roll_number,
        ],
    )?;

    {
        let mut sem_stmt = tx.prepare(
            "INSERT INTO semesters (pin, label, rank, sgpa, cgpa, position)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )?;
        let mut sub_stmt = tx.prepare(
            "INSERT INTO subjects (semester_id, code, name, grade, grade_point, credit, status, points, position)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        )?;
        for (position, semester) in transcript.semesters.iter().enumerate() {
            sem_stmt.execute(rusqlite::params![
                pin,
                semester.semester,
                crate::parser::headings::rank_key(&semester.semester),
                semester.sgpa,
                semester.cgpa,
                position as i64,
            ])?;
            let semester_id = tx.last_insert_rowid();
            for (sub_pos, subject) in semester.subjects.iter().enumerate() {
                sub_stmt.execute(rusqlite::params![
                    semester_id,
                    subject.subject_code,
                    subject.subject_name,
                    subject.grade,
                    subject.grade_point,
                    subject.credit,
                    subject.status,
                    subject.points,
                    sub_pos as i64,
                ])?;
            }
        }
    }
    tx.commit()?;
    Ok(())
}

/// Reassemble a stored transcript in its persisted order.
pub fn load_transcript(conn: &Connection, pin: &str) -> Result<Option<Transcript>> {
    let header = conn
        .query_row(
            "SELECT student_name, roll_number FROM transcripts WHERE pin = ?1",
            rusqlite::params![pin],
            |row| {
                Ok((
                    row.get::<_, Option<String>>(0)?.unwrap_or_default(),
                    row.get::<_, Option<String>>(1)?.unwrap_or_default(),
                ))
            },
        )
        .optional()?;
    let Some((student_name, roll_number)) = header else {
        return Ok(None);
    };

    let mut sem_stmt = conn.prepare(
        "SELECT id, label, sgpa, cgpa FROM semesters WHERE pin = ?1 ORDER BY position",
    )?;
    let sem_rows = sem_stmt
        .query_map(rusqlite::params![pin], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, Option<String>>(2)?.unwrap_or_default(),
                row.get::<_, Option<String>>(3)?.unwrap_or_default(),
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let mut sub_stmt = conn.prepare(
        "SELECT code, name, grade, grade_point, credit, status, points
         FROM subjects WHERE semester_id = ?1 ORDER BY position",
    )?;

    let mut semesters = Vec::with_capacity(sem_rows.len());
    for (semester_id, label, sgpa, cgpa) in sem_rows {
        let subjects = sub_stmt
            .query_map(rusqlite::params![semester_id], |row| {
                let col = |i: usize| -> rusqlite::Result<String> {
                    Ok(row.get::<_, Option<String>>(i)?.unwrap_or_default())
                };
                Ok(Subject {
                    subject_code: col(0)?,
                    subject_name: col(1)?,
                    grade: col(2)?,
                    grade_point: col(3)?,
                    credit: col(4)?,
                    status: col(5)?,
                    points: col(6)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        semesters.push(Semester {
            semester: label,
            sgpa,
            cgpa,
            subjects,
        });
    }

    Ok(Some(Transcript {
        student_name,
        roll_number,
        semesters,
    }))
}

// ── Stats ──

pub struct Stats {
    pub pins: i64,
    pub fetched: i64,
    pub pages: i64,
    pub errors: i64,
    pub transcripts: i64,
}

pub fn get_stats(conn: &Connection) -> Result<Stats> {
    let count = |sql: &str| -> Result<i64> { Ok(conn.query_row(sql, [], |row| row.get(0))?) };
    Ok(Stats {
        pins: count("SELECT COUNT(*) FROM pins")?,
        fetched: count("SELECT COUNT(*) FROM pins WHERE fetched = 1")?,
        pages: count("SELECT COUNT(*) FROM page_data")?,
        errors: count("SELECT COUNT(*) FROM page_data WHERE error IS NOT NULL")?,
        transcripts: count("SELECT COUNT(*) FROM transcripts")?,
    })
}
