//! Table definitions. Every statement is idempotent so `migrate` can run on
//! each deploy.

pub const STATEMENTS: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id                       UUID PRIMARY KEY,
        email                    TEXT UNIQUE,
        unverified_email         TEXT,
        email_verification_token TEXT,
        name                     TEXT NOT NULL,
        password_hash            TEXT NOT NULL,
        created                  TIMESTAMPTZ NOT NULL,
        last_seen                TIMESTAMPTZ NOT NULL,
        birthdate                DATE,
        description              TEXT NOT NULL DEFAULT '',
        icon                     TEXT,
        site                     TEXT,
        perms                    INTEGER NOT NULL DEFAULT 0,
        perm_level               INTEGER,
        unread_message_count     INTEGER NOT NULL DEFAULT 0,
        settings                 JSONB NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS users_unverified_email_idx ON users (unverified_email)",
    r#"
    CREATE TABLE IF NOT EXISTS messages (
        id             UUID PRIMARY KEY,
        reply_to       UUID,
        sent           TIMESTAMPTZ NOT NULL,
        edited         TIMESTAMPTZ,
        from_user      UUID NOT NULL,
        to_users       UUID[] NOT NULL,
        not_deleted_by UUID[] NOT NULL,
        not_read_by    UUID[] NOT NULL,
        subject        TEXT NOT NULL,
        content        TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS messages_not_deleted_by_idx ON messages USING GIN (not_deleted_by)",
    "CREATE INDEX IF NOT EXISTS messages_not_read_by_idx ON messages USING GIN (not_read_by)",
    r#"
    CREATE TABLE IF NOT EXISTS comics (
        id                 BIGSERIAL PRIMARY KEY,
        created            TIMESTAMPTZ NOT NULL,
        updated            TIMESTAMPTZ NOT NULL,
        title              TEXT NOT NULL,
        status             SMALLINT NOT NULL,
        owner              UUID NOT NULL,
        editors            UUID[] NOT NULL,
        author             JSONB,
        pages              JSONB NOT NULL,
        drafts             JSONB NOT NULL,
        description        TEXT NOT NULL,
        icon               TEXT,
        banner             TEXT,
        style              TEXT NOT NULL,
        disable_user_theme BOOLEAN NOT NULL,
        script             JSONB NOT NULL,
        tags               TEXT[] NOT NULL,
        comments_enabled   BOOLEAN NOT NULL,
        comments           JSONB NOT NULL,
        editor_settings    JSONB NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS comics_owner_idx ON comics (owner)",
    "CREATE INDEX IF NOT EXISTS comics_editors_idx ON comics USING GIN (editors)",
];
