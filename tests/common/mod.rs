//! Common test utilities

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use uuid::Uuid;

pub const PATRON_TOKEN: &str = "patron_token_123";
pub const OTHER_PATRON_TOKEN: &str = "other_patron_token_123";
pub const LIBRARIAN_TOKEN: &str = "librarian_token_123";
pub const ADMIN_TOKEN: &str = "admin_token_123";

/// Seeded identities and catalog rows available to every test.
pub struct TestFixture {
    pub pool: PgPool,
    pub patron_id: Uuid,
    pub other_patron_id: Uuid,
    pub librarian_id: Uuid,
    pub admin_id: Uuid,
    pub book_id: Uuid,
    pub genre_id: Uuid,
}

/// Setup test database - apply schema, truncate tables and seed test data
pub async fn setup_test_db() -> TestFixture {
    dotenvy::dotenv().ok();
    let database_url =
        std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for tests");

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .expect("Failed to connect to DB");

    sqlx::raw_sql(include_str!("../../migrations/0001_schema.sql"))
        .execute(&pool)
        .await
        .expect("Failed to apply schema");

    let mut tx = pool.begin().await.expect("Failed to begin transaction");

    // Clean up DB for fresh state
    sqlx::query(
        "TRUNCATE TABLE rentals, book_authors, books, genres, authors, auth_tokens, user_groups, users CASCADE",
    )
    .execute(&mut *tx)
    .await
    .expect("Failed to clean up DB");

    let patron_id = Uuid::new_v4();
    let other_patron_id = Uuid::new_v4();
    let librarian_id = Uuid::new_v4();
    let admin_id = Uuid::new_v4();

    for (id, email, is_staff) in [
        (patron_id, "patron@example.com", false),
        (other_patron_id, "other@example.com", false),
        (librarian_id, "librarian@example.com", false),
        (admin_id, "admin@example.com", true),
    ] {
        sqlx::query(
            r#"
            INSERT INTO users (id, email, is_active, is_staff, is_superuser)
            VALUES ($1, $2, true, $3, false)
            "#,
        )
        .bind(id)
        .bind(email)
        .bind(is_staff)
        .execute(&mut *tx)
        .await
        .expect("Failed to seed user");
    }

    sqlx::query("INSERT INTO user_groups (user_id, group_name) VALUES ($1, 'librarians')")
        .bind(librarian_id)
        .execute(&mut *tx)
        .await
        .expect("Failed to seed librarian group");

    // Token digests computed the same way the auth middleware compares them
    for (token, user_id) in [
        (PATRON_TOKEN, patron_id),
        (OTHER_PATRON_TOKEN, other_patron_id),
        (LIBRARIAN_TOKEN, librarian_id),
        (ADMIN_TOKEN, admin_id),
    ] {
        sqlx::query(
            r#"
            INSERT INTO auth_tokens (token_hash, user_id, expires_at)
            VALUES (encode(sha256($1::bytea), 'hex'), $2, NULL)
            "#,
        )
        .bind(token.as_bytes())
        .bind(user_id)
        .execute(&mut *tx)
        .await
        .expect("Failed to seed token");
    }

    let genre_id = Uuid::new_v4();
    sqlx::query("INSERT INTO genres (id, title) VALUES ($1, 'Science Fiction')")
        .bind(genre_id)
        .execute(&mut *tx)
        .await
        .expect("Failed to seed genre");

    let book_id = Uuid::new_v4();
    sqlx::query(
        r#"
        INSERT INTO books (id, title, description, year_of_publication, genre_id, is_available)
        VALUES ($1, 'Dune', 'Desert planet epic', '1965', $2, true)
        "#,
    )
    .bind(book_id)
    .bind(genre_id)
    .execute(&mut *tx)
    .await
    .expect("Failed to seed book");

    tx.commit().await.expect("Failed to commit transaction");

    TestFixture {
        pool,
        patron_id,
        other_patron_id,
        librarian_id,
        admin_id,
        book_id,
        genre_id,
    }
}
