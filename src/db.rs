use crate::table::Song;
use anyhow::{Context, Result};
use rusqlite::{ffi, params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info};

/// A song with this `track_uri` is already stored. Surfaces inside the
/// `anyhow` chain; `downcast_ref::<DuplicateSong>()` to detect it.
#[derive(Debug, Error, PartialEq)]
#[error("Song already stored: {track_uri}")]
pub struct DuplicateSong {
    pub track_uri: String,
}

const SONG_COLUMNS: &str = "title, track_uri, cluster_id, danceability, energy, loudness, key, \
     speechiness, acousticness, instrumentalness, liveness, valence, tempo, duration";

/// Catalog persistence keyed by `track_uri`
pub struct SongStore {
    conn: Connection,
}

impl SongStore {
    /// Create a new in-memory database
    pub fn new_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to create in-memory database")?;
        let db = Self { conn };
        db.init_schema()?;
        Ok(db)
    }

    /// Open (or create) a database file
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path)
            .context(format!("Failed to open database at {}", path.display()))?;
        let db = Self { conn };
        db.init_schema()?;
        Ok(db)
    }

    fn init_schema(&self) -> Result<()> {
        self.conn
            .execute_batch(
                r#"
            CREATE TABLE IF NOT EXISTS songs (
                id INTEGER PRIMARY KEY,
                title TEXT NOT NULL,
                track_uri TEXT NOT NULL UNIQUE,
                cluster_id INTEGER,
                danceability REAL NOT NULL,
                energy REAL NOT NULL,
                loudness REAL NOT NULL,
                key INTEGER NOT NULL,
                speechiness REAL NOT NULL,
                acousticness REAL NOT NULL,
                instrumentalness REAL NOT NULL,
                liveness REAL NOT NULL,
                valence REAL NOT NULL,
                tempo REAL NOT NULL,
                duration INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_songs_cluster ON songs(cluster_id);

            CREATE TABLE IF NOT EXISTS meta (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
            "#,
            )
            .context("Failed to initialize database schema")?;
        Ok(())
    }

    /// Insert one song. An existing `track_uri` is rejected, never replaced.
    pub fn insert_song(&self, song: &Song) -> Result<()> {
        insert(&self.conn, song)?;
        info!(title = %song.title, "Song added to database");
        Ok(())
    }

    /// Insert all songs in one transaction. Any failure (e.g. a duplicate)
    /// leaves the store unchanged.
    pub fn insert_songs(&mut self, songs: &[Song]) -> Result<usize> {
        let tx = self
            .conn
            .transaction()
            .context("Failed to start transaction")?;
        for song in songs {
            insert(&tx, song)?;
        }
        tx.commit().context("Failed to commit songs")?;
        info!(count = songs.len(), "Songs added to database");
        Ok(songs.len())
    }

    /// All songs in insertion order
    pub fn get_all_songs(&self) -> Result<Vec<Song>> {
        self.query_songs(
            &format!("SELECT {} FROM songs ORDER BY id", SONG_COLUMNS),
            [],
        )
    }

    pub fn get_songs(&self, limit: usize) -> Result<Vec<Song>> {
        self.query_songs(
            &format!("SELECT {} FROM songs ORDER BY id LIMIT ?1", SONG_COLUMNS),
            params![limit as i64],
        )
    }

    pub fn get_songs_in_cluster(&self, cluster_id: u32) -> Result<Vec<Song>> {
        self.query_songs(
            &format!(
                "SELECT {} FROM songs WHERE cluster_id = ?1 ORDER BY id",
                SONG_COLUMNS
            ),
            params![cluster_id],
        )
    }

    fn query_songs(&self, sql: &str, args: impl rusqlite::Params) -> Result<Vec<Song>> {
        let mut stmt = self
            .conn
            .prepare(sql)
            .context("Failed to prepare statement")?;

        let songs = stmt
            .query_map(args, song_from_row)
            .context("Failed to query songs")?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to collect songs")?;

        Ok(songs)
    }

    /// Store the labels given by model `version`, by `track_uri`, in one
    /// transaction. Returns how many rows were updated.
    pub fn set_cluster_ids(&mut self, version: &str, labels: &[(String, u32)]) -> Result<usize> {
        let tx = self
            .conn
            .transaction()
            .context("Failed to start transaction")?;
        let mut updated = 0;
        {
            let mut stmt = tx
                .prepare("UPDATE songs SET cluster_id = ?1 WHERE track_uri = ?2")
                .context("Failed to prepare statement")?;
            for (uri, id) in labels {
                updated += stmt
                    .execute(params![id, uri])
                    .context(format!("Failed to label song: {}", uri))?;
            }
        }
        tx.execute(
            "INSERT INTO meta (key, value) VALUES ('label_version', ?1) \
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![version],
        )
        .context("Failed to record label version")?;
        tx.commit().context("Failed to commit cluster ids")?;
        debug!(updated, version, "Stored cluster ids");
        Ok(updated)
    }

    /// Model version whose labels the songs carry, if any
    pub fn label_version(&self) -> Result<Option<String>> {
        self.conn
            .query_row(
                "SELECT value FROM meta WHERE key = 'label_version'",
                [],
                |row| row.get(0),
            )
            .optional()
            .context("Failed to read label version")
    }

    /// Get statistics
    pub fn get_stats(&self) -> Result<SongStats> {
        let song_count: u32 = self
            .conn
            .query_row("SELECT COUNT(*) FROM songs", [], |row| row.get(0))
            .context("Failed to count songs")?;

        let labeled_count: u32 = self
            .conn
            .query_row(
                "SELECT COUNT(*) FROM songs WHERE cluster_id IS NOT NULL",
                [],
                |row| row.get(0),
            )
            .context("Failed to count labeled songs")?;

        let mut stmt = self
            .conn
            .prepare(
                "SELECT cluster_id, COUNT(*) FROM songs WHERE cluster_id IS NOT NULL \
                 GROUP BY cluster_id",
            )
            .context("Failed to prepare statement")?;
        let cluster_sizes = stmt
            .query_map([], |row| Ok((row.get::<_, u32>(0)?, row.get::<_, u32>(1)?)))
            .context("Failed to query cluster sizes")?
            .collect::<Result<BTreeMap<_, _>, _>>()
            .context("Failed to collect cluster sizes")?;

        Ok(SongStats {
            song_count,
            labeled_count,
            cluster_sizes,
        })
    }
}

fn insert(conn: &Connection, song: &Song) -> Result<()> {
    song.validate()
        .context(format!("Refusing to store song: {}", song.track_uri))?;

    let res = conn.execute(
        &format!(
            "INSERT INTO songs ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
            SONG_COLUMNS
        ),
        params![
            song.title,
            song.track_uri,
            song.cluster_id,
            song.danceability,
            song.energy,
            song.loudness,
            song.key,
            song.speechiness,
            song.acousticness,
            song.instrumentalness,
            song.liveness,
            song.valence,
            song.tempo,
            song.duration
        ],
    );

    match res {
        Ok(_) => Ok(()),
        Err(rusqlite::Error::SqliteFailure(e, _))
            if e.extended_code == ffi::SQLITE_CONSTRAINT_UNIQUE =>
        {
            Err(DuplicateSong {
                track_uri: song.track_uri.clone(),
            }
            .into())
        }
        Err(e) => Err(anyhow::Error::new(e).context(format!("Failed to insert song: {}", song.title))),
    }
}

fn song_from_row(row: &Row<'_>) -> rusqlite::Result<Song> {
    Ok(Song {
        title: row.get(0)?,
        track_uri: row.get(1)?,
        cluster_id: row.get(2)?,
        danceability: row.get(3)?,
        energy: row.get(4)?,
        loudness: row.get(5)?,
        key: row.get(6)?,
        speechiness: row.get(7)?,
        acousticness: row.get(8)?,
        instrumentalness: row.get(9)?,
        liveness: row.get(10)?,
        valence: row.get(11)?,
        tempo: row.get(12)?,
        duration: row.get(13)?,
    })
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SongStats {
    pub song_count: u32,
    pub labeled_count: u32,
    pub cluster_sizes: BTreeMap<u32, u32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn song(title: &str, uri: &str, energy: f64) -> Song {
        Song {
            title: title.to_string(),
            track_uri: uri.to_string(),
            cluster_id: None,
            danceability: 0.6,
            energy,
            loudness: -4.2,
            key: 5,
            speechiness: 0.05,
            acousticness: 0.01,
            instrumentalness: 0.0,
            liveness: 0.2,
            valence: 0.5,
            tempo: 130.0,
            duration: 210_000,
        }
    }

    #[test]
    fn test_insert_and_read_back() {
        let db = SongStore::new_in_memory().unwrap();
        let s = song("Gurenge", "spotify:track:1", 0.9);
        db.insert_song(&s).unwrap();

        let all = db.get_all_songs().unwrap();
        assert_eq!(all, vec![s]);
    }

    #[test]
    fn test_duplicate_is_rejected_not_replaced() {
        let db = SongStore::new_in_memory().unwrap();
        db.insert_song(&song("Gurenge", "spotify:track:1", 0.9)).unwrap();

        let err = db
            .insert_song(&song("Gurenge (TV size)", "spotify:track:1", 0.1))
            .unwrap_err();
        assert_eq!(
            err.downcast_ref::<DuplicateSong>(),
            Some(&DuplicateSong {
                track_uri: "spotify:track:1".into()
            })
        );

        let all = db.get_all_songs().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].energy, 0.9);
    }

    #[test]
    fn test_batch_insert_is_all_or_nothing() {
        let mut db = SongStore::new_in_memory().unwrap();
        let batch = vec![
            song("A", "u:a", 0.1),
            song("B", "u:b", 0.2),
            song("A again", "u:a", 0.3),
        ];
        assert!(db.insert_songs(&batch).is_err());
        assert_eq!(db.get_stats().unwrap().song_count, 0);

        assert_eq!(db.insert_songs(&batch[..2]).unwrap(), 2);
        assert_eq!(db.get_songs(1).unwrap()[0].title, "A");
    }

    #[test]
    fn test_cluster_ids_and_stats() {
        let mut db = SongStore::new_in_memory().unwrap();
        db.insert_songs(&[
            song("A", "u:a", 0.1),
            song("B", "u:b", 0.2),
            song("C", "u:c", 0.3),
        ])
        .unwrap();

        let updated = db
            .set_cluster_ids("v1", &[
                ("u:a".to_string(), 0),
                ("u:b".to_string(), 1),
                ("u:missing".to_string(), 1),
            ])
            .unwrap();
        assert_eq!(updated, 2);

        let in_one = db.get_songs_in_cluster(1).unwrap();
        assert_eq!(in_one.len(), 1);
        assert_eq!(in_one[0].cluster_id, Some(1));

        let stats = db.get_stats().unwrap();
        assert_eq!(stats.song_count, 3);
        assert_eq!(stats.labeled_count, 2);
        assert_eq!(stats.cluster_sizes.get(&0), Some(&1));
        assert_eq!(db.label_version().unwrap().as_deref(), Some("v1"));

        db.set_cluster_ids("v2", &[("u:c".to_string(), 0)]).unwrap();
        assert_eq!(db.label_version().unwrap().as_deref(), Some("v2"));
    }

    #[test]
    fn test_unlabeled_store_has_no_label_version() {
        let db = SongStore::new_in_memory().unwrap();
        assert_eq!(db.label_version().unwrap(), None);
    }

    #[test]
    fn test_invalid_song_is_not_a_duplicate() {
        let mut db = SongStore::new_in_memory().unwrap();
        let bad = song("A", "u:a", f64::NAN);

        let err = db.insert_song(&bad).unwrap_err();
        assert!(err.downcast_ref::<DuplicateSong>().is_none());
        assert!(err.to_string().contains("Refusing to store song"));

        assert!(db.insert_songs(&[song("B", "u:b", 0.2), bad]).is_err());
        assert_eq!(db.get_stats().unwrap().song_count, 0);
    }

    #[test]
    fn test_file_database_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("songs.db");
        {
            let db = SongStore::open(&path).unwrap();
            db.insert_song(&song("A", "u:a", 0.1)).unwrap();
        }
        let db = SongStore::open(&path).unwrap();
        assert_eq!(db.get_all_songs().unwrap().len(), 1);
    }
}
