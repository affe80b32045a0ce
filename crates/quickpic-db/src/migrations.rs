use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?;

    if version < 1 {
        info!("Running migration v1 (initial schema)");
        conn.execute_batch(
            "
            BEGIN;

            CREATE TABLE users (
                id              TEXT PRIMARY KEY,
                user_number     INTEGER NOT NULL UNIQUE,
                username        TEXT NOT NULL UNIQUE,
                password_hash   TEXT NOT NULL,
                public_key      TEXT NOT NULL,
                signing_key     TEXT,
                created_at      TEXT NOT NULL
            );

            CREATE TABLE refresh_tokens (
                token_hash  TEXT PRIMARY KEY,
                user_id     TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                expires_at  TEXT NOT NULL
            );

            CREATE INDEX idx_refresh_tokens_user ON refresh_tokens(user_id);

            CREATE TABLE friend_requests (
                id              TEXT PRIMARY KEY,
                from_user_id    TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                to_user_id      TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                status          TEXT NOT NULL CHECK (status IN ('pending', 'accepted', 'rejected')),
                created_at      TEXT NOT NULL,
                CHECK (from_user_id <> to_user_id)
            );

            -- At most one pending request per unordered pair.
            CREATE UNIQUE INDEX idx_friend_requests_pending_pair
                ON friend_requests(min(from_user_id, to_user_id), max(from_user_id, to_user_id))
                WHERE status = 'pending';

            CREATE INDEX idx_friend_requests_to ON friend_requests(to_user_id, status);

            CREATE TABLE friendships (
                id          TEXT PRIMARY KEY,
                user_a_id   TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                user_b_id   TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                created_at  TEXT NOT NULL,
                UNIQUE (user_a_id, user_b_id),
                CHECK (user_a_id < user_b_id)
            );

            CREATE INDEX idx_friendships_b ON friendships(user_b_id);

            CREATE TABLE messages (
                id                  TEXT PRIMARY KEY,
                from_user_id        TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                to_user_id          TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                encrypted_content   BLOB NOT NULL,
                content_type        TEXT NOT NULL CHECK (content_type IN ('text', 'image')),
                signature           TEXT NOT NULL,
                created_at          TEXT NOT NULL
            );

            CREATE INDEX idx_messages_recipient ON messages(to_user_id, created_at);
            CREATE INDEX idx_messages_created ON messages(created_at);

            INSERT INTO schema_version (version) VALUES (1);

            COMMIT;
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
