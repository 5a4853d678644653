use std::path::Path;

use rusqlite::{Connection, params};

use crate::error::Result;

/// Metadata and content for one generation attempt, written as a single
/// immutable run entry.
#[derive(Debug, Clone)]
pub struct NewRun<'a> {
    pub retriever_model: &'a str,
    pub model: &'a str,
    pub n_top_chunks: usize,
    pub query: &'a str,
    pub timestamp: String,
    pub elapsed_time: f64,
    pub retriever_query: &'a str,
    pub prompt: &'a str,
    pub answer: &'a str,
}

/// Append-only run log, one namespace per document id.
///
/// SQLite rendering of the per-document structured log: `runs` carries the
/// run attributes keyed `(doc_id, run_id)`; `run_contents` carries the
/// long-form text fields keyed one level deeper by query name, so a future
/// multi-query pass can attach several query groups to one run entry.
///
/// Run ids are determined by counting the existing entries for the document
/// inside the append transaction. Correct under the single-writer discipline;
/// concurrent writers must be serialized by the caller.
pub struct RunStore {
    conn: Connection,
}

impl RunStore {
    /// Open or create the run log database at the given path.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    /// Open an in-memory run log (for testing).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;

            CREATE TABLE IF NOT EXISTS runs (
                doc_id          TEXT NOT NULL,
                run_id          TEXT NOT NULL,
                retriever_model TEXT NOT NULL,
                model           TEXT NOT NULL,
                n_top_chunks    INTEGER NOT NULL,
                query           TEXT NOT NULL,
                timestamp       TEXT NOT NULL,
                elapsed_time    REAL NOT NULL,
                PRIMARY KEY (doc_id, run_id)
            );

            CREATE TABLE IF NOT EXISTS run_contents (
                doc_id  TEXT NOT NULL,
                run_id  TEXT NOT NULL,
                query   TEXT NOT NULL,
                kind    TEXT NOT NULL,
                content TEXT NOT NULL,
                PRIMARY KEY (doc_id, run_id, query, kind)
            );
            ",
        )?;
        Ok(())
    }

    /// Append one run record for a document and return the assigned run id
    /// (`run_0000`, `run_0001`, ...).
    pub fn append(&mut self, doc_id: &str, run: &NewRun<'_>) -> Result<String> {
        let tx = self.conn.transaction()?;

        let existing: i64 = tx.query_row(
            "SELECT COUNT(*) FROM runs WHERE doc_id = ?1",
            params![doc_id],
            |row| row.get(0),
        )?;
        let run_id = format!("run_{existing:04}");

        tx.execute(
            "INSERT INTO runs
                (doc_id, run_id, retriever_model, model, n_top_chunks, query, timestamp, elapsed_time)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                doc_id,
                run_id,
                run.retriever_model,
                run.model,
                run.n_top_chunks as i64,
                run.query,
                run.timestamp,
                run.elapsed_time,
            ],
        )?;

        for (kind, content) in [
            ("retriever_query", run.retriever_query),
            ("prompt", run.prompt),
            ("answer", run.answer),
        ] {
            tx.execute(
                "INSERT INTO run_contents (doc_id, run_id, query, kind, content)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![doc_id, run_id, run.query, kind, content],
            )?;
        }

        tx.commit()?;
        Ok(run_id)
    }

    /// Run ids recorded for a document, in append order.
    pub fn run_ids(&self, doc_id: &str) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT run_id FROM runs WHERE doc_id = ?1 ORDER BY run_id")?;
        let ids = stmt
            .query_map(params![doc_id], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(ids)
    }

    /// One stored content field of a run (`retriever_query`, `prompt`, `answer`).
    pub fn content(&self, doc_id: &str, run_id: &str, query: &str, kind: &str) -> Result<String> {
        let content = self.conn.query_row(
            "SELECT content FROM run_contents
             WHERE doc_id = ?1 AND run_id = ?2 AND query = ?3 AND kind = ?4",
            params![doc_id, run_id, query, kind],
            |row| row.get(0),
        )?;
        Ok(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_run<'a>(query: &'a str, answer: &'a str) -> NewRun<'a> {
        NewRun {
            retriever_model: "all-MiniLM-L6-v2",
            model: "gpt-oss:20b",
            n_top_chunks: 5,
            query,
            timestamp: "2026-01-01T00:00:00Z".to_string(),
            elapsed_time: 1.5,
            retriever_query: "find the material",
            prompt: "built prompt",
            answer,
        }
    }

    #[test]
    fn run_ids_increase_from_zero() {
        let mut store = RunStore::open_in_memory().unwrap();
        let a = store.append("2502.10309v1", &sample_run("material_formula", "SrVO3")).unwrap();
        let b = store.append("2502.10309v1", &sample_run("dft_params", "{}")).unwrap();
        let c = store.append("2502.10309v1", &sample_run("material_formula", "model")).unwrap();
        assert_eq!(a, "run_0000");
        assert_eq!(b, "run_0001");
        assert_eq!(c, "run_0002");
    }

    #[test]
    fn run_ids_are_scoped_per_document() {
        let mut store = RunStore::open_in_memory().unwrap();
        store.append("doc-a", &sample_run("material_formula", "x")).unwrap();
        let first_for_b = store.append("doc-b", &sample_run("material_formula", "y")).unwrap();
        assert_eq!(first_for_b, "run_0000");
        assert_eq!(store.run_ids("doc-a").unwrap(), vec!["run_0000"]);
    }

    #[test]
    fn contents_are_nested_under_the_query_name() {
        let mut store = RunStore::open_in_memory().unwrap();
        let run_id = store.append("doc", &sample_run("material_formula", "SrVO3")).unwrap();
        let answer = store
            .content("doc", &run_id, "material_formula", "answer")
            .unwrap();
        assert_eq!(answer, "SrVO3");
        let prompt = store
            .content("doc", &run_id, "material_formula", "prompt")
            .unwrap();
        assert_eq!(prompt, "built prompt");
    }

    #[test]
    fn reopen_preserves_the_counter() {
        let dir = tempfile::TempDir::new().unwrap();
        let db_path = dir.path().join("runs.db");
        {
            let mut store = RunStore::open(&db_path).unwrap();
            store.append("doc", &sample_run("material_formula", "a")).unwrap();
        }
        let mut store = RunStore::open(&db_path).unwrap();
        let next = store.append("doc", &sample_run("material_formula", "b")).unwrap();
        assert_eq!(next, "run_0001");
    }
}
