//! SQLite schema for the local kara catalog.
//!
//! Rowids are the local IDs; the kara rowid is also what ends up in the
//! downstream song filename.

use crate::sqlite_column;
use crate::sqlite_persistence::{
    Column, ForeignKey, ForeignKeyOnChange, SqlType, Table, VersionedSchema, DEFAULT_TIMESTAMP,
};

const MEDIA_FK: ForeignKey = ForeignKey {
    foreign_table: "media",
    foreign_column: "id",
    on_delete: ForeignKeyOnChange::Cascade,
};

const SOURCE_MEDIA_FK: ForeignKey = ForeignKey {
    foreign_table: "media",
    foreign_column: "id",
    on_delete: ForeignKeyOnChange::SetNull,
};

const ARTIST_FK: ForeignKey = ForeignKey {
    foreign_table: "artists",
    foreign_column: "id",
    on_delete: ForeignKeyOnChange::Cascade,
};

const AUTHOR_FK: ForeignKey = ForeignKey {
    foreign_table: "timing_authors",
    foreign_column: "id",
    on_delete: ForeignKeyOnChange::Cascade,
};

const KARA_FK: ForeignKey = ForeignKey {
    foreign_table: "karas",
    foreign_column: "id",
    on_delete: ForeignKeyOnChange::Cascade,
};

const MEDIA_TABLE: Table = Table {
    name: "media",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!("name", &SqlType::Text, non_null = true),
        sqlite_column!("media_type", &SqlType::Text, non_null = true), // MediaType::id()
    ],
    indices: &[],
    unique_constraints: &[&["name", "media_type"]],
};

const ARTISTS_TABLE: Table = Table {
    name: "artists",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!("name", &SqlType::Text, non_null = true),
    ],
    indices: &[],
    unique_constraints: &[&["name"]],
};

const ARTIST_ALIASES_TABLE: Table = Table {
    name: "artist_aliases",
    columns: &[
        sqlite_column!(
            "artist_id",
            &SqlType::Integer,
            non_null = true,
            foreign_key = Some(&ARTIST_FK)
        ),
        sqlite_column!("alias", &SqlType::Text, non_null = true),
    ],
    indices: &[("idx_artist_aliases_alias", "alias")],
    unique_constraints: &[&["artist_id", "alias"]],
};

const TIMING_AUTHORS_TABLE: Table = Table {
    name: "timing_authors",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!("name", &SqlType::Text, non_null = true),
        sqlite_column!("upstream_id", &SqlType::Text),
    ],
    indices: &[("idx_timing_authors_name", "name")],
    unique_constraints: &[&["upstream_id"]],
};

const KARAS_TABLE: Table = Table {
    name: "karas",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!("title", &SqlType::Text, non_null = true),
        sqlite_column!(
            "version",
            &SqlType::Text,
            non_null = true,
            default_value = Some("''")
        ),
        sqlite_column!(
            "language",
            &SqlType::Text,
            non_null = true,
            default_value = Some("''")
        ),
        sqlite_column!(
            "comment",
            &SqlType::Text,
            non_null = true,
            default_value = Some("''")
        ),
        sqlite_column!(
            "song_order",
            &SqlType::Integer,
            non_null = true,
            default_value = Some("0")
        ),
        sqlite_column!(
            "duration",
            &SqlType::Integer,
            non_null = true,
            default_value = Some("0")
        ),
        sqlite_column!(
            "source_media_id",
            &SqlType::Integer,
            foreign_key = Some(&SOURCE_MEDIA_FK)
        ),
        sqlite_column!(
            "video_uploaded",
            &SqlType::Integer,
            non_null = true,
            default_value = Some("0")
        ),
        sqlite_column!(
            "instrumental_uploaded",
            &SqlType::Integer,
            non_null = true,
            default_value = Some("0")
        ),
        sqlite_column!(
            "subtitles_uploaded",
            &SqlType::Integer,
            non_null = true,
            default_value = Some("0")
        ),
        sqlite_column!(
            "hardsub",
            &SqlType::Integer,
            non_null = true,
            default_value = Some("0")
        ),
        sqlite_column!(
            "edited",
            &SqlType::Integer,
            non_null = true,
            default_value = Some("0")
        ),
        sqlite_column!(
            "created",
            &SqlType::Integer,
            non_null = true,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
        sqlite_column!(
            "updated",
            &SqlType::Integer,
            non_null = true,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
    ],
    indices: &[("idx_karas_video_uploaded", "video_uploaded")],
    unique_constraints: &[],
};

const KARA_EXTRA_TITLES_TABLE: Table = Table {
    name: "kara_extra_titles",
    columns: &[
        sqlite_column!(
            "kara_id",
            &SqlType::Integer,
            non_null = true,
            foreign_key = Some(&KARA_FK)
        ),
        sqlite_column!("position", &SqlType::Integer, non_null = true),
        sqlite_column!("title", &SqlType::Text, non_null = true),
    ],
    indices: &[],
    unique_constraints: &[&["kara_id", "position"]],
};

const KARA_VIDEO_TAGS_TABLE: Table = Table {
    name: "kara_video_tags",
    columns: &[
        sqlite_column!(
            "kara_id",
            &SqlType::Integer,
            non_null = true,
            foreign_key = Some(&KARA_FK)
        ),
        sqlite_column!("position", &SqlType::Integer, non_null = true),
        sqlite_column!("tag", &SqlType::Text, non_null = true), // VideoTag::id()
    ],
    indices: &[],
    unique_constraints: &[&["kara_id", "tag"]],
};

const KARA_AUDIO_TAGS_TABLE: Table = Table {
    name: "kara_audio_tags",
    columns: &[
        sqlite_column!(
            "kara_id",
            &SqlType::Integer,
            non_null = true,
            foreign_key = Some(&KARA_FK)
        ),
        sqlite_column!("position", &SqlType::Integer, non_null = true),
        sqlite_column!("tag", &SqlType::Text, non_null = true), // AudioTag::id()
    ],
    indices: &[],
    unique_constraints: &[&["kara_id", "tag"]],
};

const KARA_MEDIAS_TABLE: Table = Table {
    name: "kara_medias",
    columns: &[
        sqlite_column!(
            "kara_id",
            &SqlType::Integer,
            non_null = true,
            foreign_key = Some(&KARA_FK)
        ),
        sqlite_column!(
            "media_id",
            &SqlType::Integer,
            non_null = true,
            foreign_key = Some(&MEDIA_FK)
        ),
        sqlite_column!("position", &SqlType::Integer, non_null = true),
    ],
    indices: &[("idx_kara_medias_media", "media_id")],
    unique_constraints: &[&["kara_id", "media_id"]],
};

const KARA_ARTISTS_TABLE: Table = Table {
    name: "kara_artists",
    columns: &[
        sqlite_column!(
            "kara_id",
            &SqlType::Integer,
            non_null = true,
            foreign_key = Some(&KARA_FK)
        ),
        sqlite_column!(
            "artist_id",
            &SqlType::Integer,
            non_null = true,
            foreign_key = Some(&ARTIST_FK)
        ),
        sqlite_column!("position", &SqlType::Integer, non_null = true),
    ],
    indices: &[("idx_kara_artists_artist", "artist_id")],
    unique_constraints: &[&["kara_id", "artist_id"]],
};

const KARA_AUTHORS_TABLE: Table = Table {
    name: "kara_authors",
    columns: &[
        sqlite_column!(
            "kara_id",
            &SqlType::Integer,
            non_null = true,
            foreign_key = Some(&KARA_FK)
        ),
        sqlite_column!(
            "author_id",
            &SqlType::Integer,
            non_null = true,
            foreign_key = Some(&AUTHOR_FK)
        ),
        sqlite_column!("position", &SqlType::Integer, non_null = true),
    ],
    indices: &[],
    unique_constraints: &[&["kara_id", "author_id"]],
};

const UPSTREAM_IMPORTS_TABLE: Table = Table {
    name: "upstream_imports",
    columns: &[
        sqlite_column!("upstream_id", &SqlType::Text, is_primary_key = true),
        sqlite_column!(
            "kara_id",
            &SqlType::Integer,
            non_null = true,
            foreign_key = Some(&KARA_FK)
        ),
        sqlite_column!(
            "imported",
            &SqlType::Integer,
            non_null = true,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
    ],
    indices: &[("idx_upstream_imports_kara", "kara_id")],
    unique_constraints: &[],
};

pub const KARA_VERSIONED_SCHEMAS: &[VersionedSchema] = &[VersionedSchema {
    version: 0,
    tables: &[
        MEDIA_TABLE,
        ARTISTS_TABLE,
        ARTIST_ALIASES_TABLE,
        TIMING_AUTHORS_TABLE,
        KARAS_TABLE,
        KARA_EXTRA_TITLES_TABLE,
        KARA_VIDEO_TAGS_TABLE,
        KARA_AUDIO_TAGS_TABLE,
        KARA_MEDIAS_TABLE,
        KARA_ARTISTS_TABLE,
        KARA_AUTHORS_TABLE,
        UPSTREAM_IMPORTS_TABLE,
    ],
    migration: None,
}];
