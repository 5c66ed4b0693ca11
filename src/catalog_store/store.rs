//! SQLite-backed kara store.

use super::models::*;
use super::schema::KARA_VERSIONED_SCHEMAS;
use super::trait_def::{CatalogTransaction, KaraStore};
use crate::error::{storage_err, Result, SyncError};
use crate::sqlite_persistence::migrate_if_needed;
use crate::taxonomy::{AudioTag, MediaType, VideoTag};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::info;
use uuid::Uuid;

#[derive(Clone)]
pub struct SqliteKaraStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteKaraStore {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let mut conn = Connection::open_with_flags(
            db_path.as_ref(),
            rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
                | rusqlite::OpenFlags::SQLITE_OPEN_CREATE
                | rusqlite::OpenFlags::SQLITE_OPEN_URI
                | rusqlite::OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        Self::init(&mut conn)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;

        let kara_count: i64 = conn.query_row("SELECT COUNT(*) FROM karas", [], |r| r.get(0))?;
        info!(
            "Opened kara catalog at {}: {} karas",
            db_path.as_ref().display(),
            kara_count
        );

        Ok(SqliteKaraStore {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// In-memory store, used by tests and dry runs.
    pub fn in_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        Self::init(&mut conn)?;
        Ok(SqliteKaraStore {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn init(conn: &mut Connection) -> Result<()> {
        migrate_if_needed(conn, KARA_VERSIONED_SCHEMAS)?;
        conn.execute("PRAGMA foreign_keys = ON;", [])?;
        Ok(())
    }

    // =========================================================================
    // Internal Helper Methods
    // =========================================================================

    fn parse_uuid(value: &str) -> Result<Uuid> {
        Uuid::parse_str(value).map_err(|e| SyncError::decode("stored upstream id", e))
    }

    fn get_media(conn: &Connection, id: i64) -> Result<Media> {
        let (name, media_type): (String, String) = conn.query_row(
            "SELECT name, media_type FROM media WHERE id = ?1",
            params![id],
            |r| Ok((r.get(0)?, r.get(1)?)),
        )?;
        Ok(Media {
            id,
            name,
            media_type: media_type.parse()?,
        })
    }

    fn get_artist(conn: &Connection, id: i64) -> Result<Artist> {
        let name: String =
            conn.query_row("SELECT name FROM artists WHERE id = ?1", params![id], |r| {
                r.get(0)
            })?;
        let mut stmt = conn
            .prepare_cached("SELECT alias FROM artist_aliases WHERE artist_id = ?1 ORDER BY rowid")?;
        let aliases = stmt
            .query_map(params![id], |r| r.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(Artist { id, name, aliases })
    }

    fn get_timing_author(conn: &Connection, id: i64) -> Result<TimingAuthor> {
        let (name, upstream_id): (String, Option<String>) = conn.query_row(
            "SELECT name, upstream_id FROM timing_authors WHERE id = ?1",
            params![id],
            |r| Ok((r.get(0)?, r.get(1)?)),
        )?;
        Ok(TimingAuthor {
            id,
            name,
            upstream_id: upstream_id.as_deref().map(Self::parse_uuid).transpose()?,
        })
    }

    fn ids_of(conn: &Connection, sql: &str, kara_id: i64) -> Result<Vec<i64>> {
        let mut stmt = conn.prepare_cached(sql)?;
        let ids = stmt
            .query_map(params![kara_id], |r| r.get(0))?
            .collect::<Result<Vec<i64>, _>>()?;
        Ok(ids)
    }

    fn strings_of(conn: &Connection, sql: &str, kara_id: i64) -> Result<Vec<String>> {
        let mut stmt = conn.prepare_cached(sql)?;
        let values = stmt
            .query_map(params![kara_id], |r| r.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(values)
    }

    fn load_kara(conn: &Connection, id: i64) -> Result<Option<Kara>> {
        let row = conn
            .query_row(
                "SELECT title, version, language, comment, song_order, duration, source_media_id,
                        video_uploaded, instrumental_uploaded, subtitles_uploaded, hardsub,
                        edited, created, updated
                 FROM karas WHERE id = ?1",
                params![id],
                |r| {
                    Ok((
                        r.get::<_, String>(0)?,
                        r.get::<_, String>(1)?,
                        r.get::<_, String>(2)?,
                        r.get::<_, String>(3)?,
                        r.get::<_, u32>(4)?,
                        r.get::<_, u32>(5)?,
                        r.get::<_, Option<i64>>(6)?,
                        [
                            r.get::<_, bool>(7)?,
                            r.get::<_, bool>(8)?,
                            r.get::<_, bool>(9)?,
                            r.get::<_, bool>(10)?,
                            r.get::<_, bool>(11)?,
                        ],
                        r.get::<_, i64>(12)?,
                        r.get::<_, i64>(13)?,
                    ))
                },
            )
            .optional()?;

        let Some((
            title,
            version,
            language,
            comment,
            song_order,
            duration,
            source_media_id,
            [video_uploaded, instrumental_uploaded, subtitles_uploaded, hardsub, edited],
            created_at,
            updated_at,
        )) = row
        else {
            return Ok(None);
        };

        let extra_titles = Self::strings_of(
            conn,
            "SELECT title FROM kara_extra_titles WHERE kara_id = ?1 ORDER BY position",
            id,
        )?;
        let video_tags = Self::strings_of(
            conn,
            "SELECT tag FROM kara_video_tags WHERE kara_id = ?1 ORDER BY position",
            id,
        )?
        .iter()
        .map(|t| t.parse::<VideoTag>())
        .collect::<Result<Vec<_>>>()?;
        let audio_tags = Self::strings_of(
            conn,
            "SELECT tag FROM kara_audio_tags WHERE kara_id = ?1 ORDER BY position",
            id,
        )?
        .iter()
        .map(|t| t.parse::<AudioTag>())
        .collect::<Result<Vec<_>>>()?;

        let source_media = source_media_id
            .map(|media_id| Self::get_media(conn, media_id))
            .transpose()?;
        let medias = Self::ids_of(
            conn,
            "SELECT media_id FROM kara_medias WHERE kara_id = ?1 ORDER BY position",
            id,
        )?
        .into_iter()
        .map(|media_id| Self::get_media(conn, media_id))
        .collect::<Result<Vec<_>>>()?;
        let artists = Self::ids_of(
            conn,
            "SELECT artist_id FROM kara_artists WHERE kara_id = ?1 ORDER BY position",
            id,
        )?
        .into_iter()
        .map(|artist_id| Self::get_artist(conn, artist_id))
        .collect::<Result<Vec<_>>>()?;
        let authors = Self::ids_of(
            conn,
            "SELECT author_id FROM kara_authors WHERE kara_id = ?1 ORDER BY position",
            id,
        )?
        .into_iter()
        .map(|author_id| Self::get_timing_author(conn, author_id))
        .collect::<Result<Vec<_>>>()?;

        Ok(Some(Kara {
            id,
            title,
            extra_titles,
            version,
            language,
            comment,
            song_order,
            duration,
            video_tags,
            audio_tags,
            source_media,
            medias,
            artists,
            authors,
            video_uploaded,
            instrumental_uploaded,
            subtitles_uploaded,
            hardsub,
            edited,
            created_at,
            updated_at,
        }))
    }
}

/// Transaction handle over a connection that already ran `BEGIN IMMEDIATE`.
struct SqliteTransaction<'a> {
    conn: &'a Connection,
}

impl CatalogTransaction for SqliteTransaction<'_> {
    fn find_or_create_media(&self, name: &str, media_type: MediaType) -> Result<Media> {
        let existing: Option<i64> = self
            .conn
            .query_row(
                "SELECT id FROM media WHERE name = ?1 AND media_type = ?2",
                params![name, media_type.id()],
                |r| r.get(0),
            )
            .optional()?;

        let id = match existing {
            Some(id) => id,
            None => {
                self.conn
                    .execute(
                        "INSERT INTO media (name, media_type) VALUES (?1, ?2)",
                        params![name, media_type.id()],
                    )
                    .map_err(|e| storage_err("create media", e))?;
                self.conn.last_insert_rowid()
            }
        };

        Ok(Media {
            id,
            name: name.to_string(),
            media_type,
        })
    }

    fn find_artist(&self, names: &[&str]) -> Result<Option<Artist>> {
        for name in names {
            let found: Option<i64> = self
                .conn
                .query_row(
                    "SELECT id FROM artists WHERE name = ?1
                     UNION ALL
                     SELECT artist_id FROM artist_aliases WHERE alias = ?1
                     LIMIT 1",
                    params![name],
                    |r| r.get(0),
                )
                .optional()?;
            if let Some(id) = found {
                return SqliteKaraStore::get_artist(self.conn, id).map(Some);
            }
        }
        Ok(None)
    }

    fn create_artist(&self, name: &str, aliases: &[String]) -> Result<Artist> {
        self.conn
            .execute("INSERT INTO artists (name) VALUES (?1)", params![name])
            .map_err(|e| storage_err("create artist", e))?;
        let id = self.conn.last_insert_rowid();

        let mut stored_aliases: Vec<String> = Vec::with_capacity(aliases.len());
        for alias in aliases {
            if stored_aliases.contains(alias) {
                continue;
            }
            self.conn
                .execute(
                    "INSERT INTO artist_aliases (artist_id, alias) VALUES (?1, ?2)",
                    params![id, alias],
                )
                .map_err(|e| storage_err("create artist alias", e))?;
            stored_aliases.push(alias.clone());
        }

        Ok(Artist {
            id,
            name: name.to_string(),
            aliases: stored_aliases,
        })
    }

    fn find_timing_author(
        &self,
        upstream_id: Option<Uuid>,
        name: &str,
    ) -> Result<Option<TimingAuthor>> {
        if let Some(upstream_id) = upstream_id {
            let found: Option<i64> = self
                .conn
                .query_row(
                    "SELECT id FROM timing_authors WHERE upstream_id = ?1",
                    params![upstream_id.to_string()],
                    |r| r.get(0),
                )
                .optional()?;
            if let Some(id) = found {
                return SqliteKaraStore::get_timing_author(self.conn, id).map(Some);
            }
        }

        let found: Option<i64> = self
            .conn
            .query_row(
                "SELECT id FROM timing_authors WHERE name = ?1 ORDER BY id LIMIT 1",
                params![name],
                |r| r.get(0),
            )
            .optional()?;
        found
            .map(|id| SqliteKaraStore::get_timing_author(self.conn, id))
            .transpose()
    }

    fn create_timing_author(&self, name: &str, upstream_id: Option<Uuid>) -> Result<TimingAuthor> {
        self.conn
            .execute(
                "INSERT INTO timing_authors (name, upstream_id) VALUES (?1, ?2)",
                params![name, upstream_id.map(|u| u.to_string())],
            )
            .map_err(|e| storage_err("create timing author", e))?;
        Ok(TimingAuthor {
            id: self.conn.last_insert_rowid(),
            name: name.to_string(),
            upstream_id,
        })
    }

    fn create_kara(&self, kara: &NewKara) -> Result<i64> {
        self.conn
            .execute(
                "INSERT INTO karas (title, version, language, comment, song_order, duration,
                                    source_media_id, hardsub)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    &kara.title,
                    &kara.version,
                    &kara.language,
                    &kara.comment,
                    kara.song_order,
                    kara.duration,
                    kara.source_media_id,
                    kara.hardsub
                ],
            )
            .map_err(|e| storage_err("create kara", e))?;
        let kara_id = self.conn.last_insert_rowid();
        insert_associations(self.conn, kara_id, kara)?;

        Ok(kara_id)
    }

    fn update_kara(&self, kara_id: i64, kara: &NewKara) -> Result<()> {
        let updated = self
            .conn
            .execute(
                "UPDATE karas SET title = ?1, version = ?2, language = ?3, comment = ?4,
                                  song_order = ?5, duration = ?6, source_media_id = ?7,
                                  updated = cast(strftime('%s','now') as int)
                 WHERE id = ?8",
                params![
                    &kara.title,
                    &kara.version,
                    &kara.language,
                    &kara.comment,
                    kara.song_order,
                    kara.duration,
                    kara.source_media_id,
                    kara_id
                ],
            )
            .map_err(|e| storage_err("update kara", e))?;
        if updated == 0 {
            return Err(SyncError::NotFound(format!("kara {}", kara_id)));
        }

        for table in [
            "kara_extra_titles",
            "kara_video_tags",
            "kara_audio_tags",
            "kara_medias",
            "kara_artists",
            "kara_authors",
        ] {
            self.conn.execute(
                &format!("DELETE FROM {} WHERE kara_id = ?1", table),
                params![kara_id],
            )?;
        }
        insert_associations(self.conn, kara_id, kara)
    }

    fn find_import(&self, upstream_id: Uuid) -> Result<Option<UpstreamImport>> {
        find_import(self.conn, upstream_id)
    }

    fn create_import(&self, upstream_id: Uuid, kara_id: i64) -> Result<UpstreamImport> {
        self.conn
            .execute(
                "INSERT INTO upstream_imports (upstream_id, kara_id) VALUES (?1, ?2)",
                params![upstream_id.to_string(), kara_id],
            )
            .map_err(|e| storage_err("create upstream import", e))?;
        find_import(self.conn, upstream_id)?
            .ok_or_else(|| SyncError::NotFound(format!("upstream import {}", upstream_id)))
    }
}

/// Inserts the ordered association rows of `kara`.
fn insert_associations(conn: &Connection, kara_id: i64, kara: &NewKara) -> Result<()> {
    for (position, title) in kara.extra_titles.iter().enumerate() {
        conn.execute(
            "INSERT INTO kara_extra_titles (kara_id, position, title) VALUES (?1, ?2, ?3)",
            params![kara_id, position as i64, title],
        )?;
    }
    for (position, tag) in kara.video_tags.iter().enumerate() {
        conn.execute(
            "INSERT INTO kara_video_tags (kara_id, position, tag) VALUES (?1, ?2, ?3)",
            params![kara_id, position as i64, tag.id()],
        )
        .map_err(|e| storage_err("add video tag", e))?;
    }
    for (position, tag) in kara.audio_tags.iter().enumerate() {
        conn.execute(
            "INSERT INTO kara_audio_tags (kara_id, position, tag) VALUES (?1, ?2, ?3)",
            params![kara_id, position as i64, tag.id()],
        )
        .map_err(|e| storage_err("add audio tag", e))?;
    }
    for (position, media_id) in kara.media_ids.iter().enumerate() {
        conn.execute(
            "INSERT INTO kara_medias (kara_id, media_id, position) VALUES (?1, ?2, ?3)",
            params![kara_id, media_id, position as i64],
        )
        .map_err(|e| storage_err("add kara media", e))?;
    }
    for (position, artist_id) in kara.artist_ids.iter().enumerate() {
        conn.execute(
            "INSERT INTO kara_artists (kara_id, artist_id, position) VALUES (?1, ?2, ?3)",
            params![kara_id, artist_id, position as i64],
        )
        .map_err(|e| storage_err("add kara artist", e))?;
    }
    for (position, author_id) in kara.author_ids.iter().enumerate() {
        conn.execute(
            "INSERT INTO kara_authors (kara_id, author_id, position) VALUES (?1, ?2, ?3)",
            params![kara_id, author_id, position as i64],
        )
        .map_err(|e| storage_err("add kara author", e))?;
    }
    Ok(())
}

fn parse_import_row(row: &rusqlite::Row) -> rusqlite::Result<(String, i64, i64)> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?))
}

fn import_from_row((upstream_id, kara_id, imported_at): (String, i64, i64)) -> Result<UpstreamImport> {
    Ok(UpstreamImport {
        upstream_id: SqliteKaraStore::parse_uuid(&upstream_id)?,
        kara_id,
        imported_at,
    })
}

fn find_import(conn: &Connection, upstream_id: Uuid) -> Result<Option<UpstreamImport>> {
    conn.query_row(
        "SELECT upstream_id, kara_id, imported FROM upstream_imports WHERE upstream_id = ?1",
        params![upstream_id.to_string()],
        parse_import_row,
    )
    .optional()?
    .map(import_from_row)
    .transpose()
}

/// Commits when the body succeeded. Any failure, including one raised by
/// COMMIT itself, leaves the connection outside of a transaction.
fn finish_transaction(conn: &Connection, result: Result<()>) -> Result<()> {
    let result = result.and_then(|()| {
        conn.execute("COMMIT", [])?;
        Ok(())
    });
    if result.is_err() && !conn.is_autocommit() {
        let _ = conn.execute("ROLLBACK", []);
    }
    result
}

impl KaraStore for SqliteKaraStore {
    fn run_in_transaction(
        &self,
        f: &mut dyn FnMut(&dyn CatalogTransaction) -> Result<()>,
    ) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute("BEGIN IMMEDIATE", [])?;

        let result = f(&SqliteTransaction { conn: &conn });
        finish_transaction(&conn, result)
    }

    fn get_kara(&self, id: i64) -> Result<Option<Kara>> {
        let conn = self.conn.lock().unwrap();
        Self::load_kara(&conn, id)
    }

    fn list_publishable_karas(&self) -> Result<Vec<Kara>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id FROM karas
             WHERE video_uploaded = 1 AND (subtitles_uploaded = 1 OR hardsub = 1)
             ORDER BY id",
        )?;
        let ids = stmt
            .query_map([], |r| r.get(0))?
            .collect::<Result<Vec<i64>, _>>()?;

        let mut karas = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(kara) = Self::load_kara(&conn, id)? {
                karas.push(kara);
            }
        }
        Ok(karas)
    }

    fn set_asset_uploaded(&self, kara_id: i64, kind: AssetKind, uploaded: bool) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let updated = conn.execute(
            &format!(
                "UPDATE karas SET {} = ?1, updated = cast(strftime('%s','now') as int) WHERE id = ?2",
                kind.flag_column()
            ),
            params![uploaded, kara_id],
        )?;
        if updated == 0 {
            return Err(SyncError::NotFound(format!("kara {}", kara_id)));
        }
        Ok(())
    }

    fn set_hardsub(&self, kara_id: i64, hardsub: bool) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let updated = conn.execute(
            "UPDATE karas SET hardsub = ?1, updated = cast(strftime('%s','now') as int) WHERE id = ?2",
            params![hardsub, kara_id],
        )?;
        if updated == 0 {
            return Err(SyncError::NotFound(format!("kara {}", kara_id)));
        }
        Ok(())
    }

    fn set_edited(&self, kara_id: i64, edited: bool) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let updated = conn.execute(
            "UPDATE karas SET edited = ?1, updated = cast(strftime('%s','now') as int) WHERE id = ?2",
            params![edited, kara_id],
        )?;
        if updated == 0 {
            return Err(SyncError::NotFound(format!("kara {}", kara_id)));
        }
        Ok(())
    }

    fn get_import(&self, upstream_id: Uuid) -> Result<Option<UpstreamImport>> {
        let conn = self.conn.lock().unwrap();
        find_import(&conn, upstream_id)
    }

    fn list_imports(&self) -> Result<Vec<UpstreamImport>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT upstream_id, kara_id, imported FROM upstream_imports ORDER BY kara_id",
        )?;
        let rows = stmt
            .query_map([], parse_import_row)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(import_from_row).collect()
    }

    fn get_karas_count(&self) -> usize {
        let conn = self.conn.lock().unwrap();
        conn.query_row("SELECT COUNT(*) FROM karas", [], |r| r.get::<_, i64>(0))
            .unwrap_or(0) as usize
    }
}
