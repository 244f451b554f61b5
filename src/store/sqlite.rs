use async_trait::async_trait;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{LocalStore, StoreError};
use crate::db::models::{FavoriteMovie, Genre, Movie, MovieId, User};
use crate::db::DbPool;

const MOVIE_COLUMNS: &str = "id, title, overview, poster_path, release_date, vote_average, adult,
     genres, original_language, runtime, vote_count, revenue";

const FAVORITE_COLUMNS: &str = "movie_id, user_id, title, poster_path, release_date, vote_average,
     overview, adult, genres, original_language, runtime, vote_count, revenue";

/// SQLite implementation. Every call runs on the blocking worker pool.
#[derive(Clone)]
pub struct SqliteStore {
    pool: DbPool,
}

impl SqliteStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, StoreError> + Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let conn = pool.get()?;
            f(&conn)
        })
        .await?
    }
}

#[async_trait]
impl LocalStore for SqliteStore {
    async fn find_user(&self, user_id: &str) -> Result<Option<User>, StoreError> {
        let user_id = user_id.to_string();
        self.with_conn(move |conn| {
            let user = conn
                .query_row(
                    "SELECT user_id, password, preferred_name FROM users WHERE user_id = ?1",
                    params![user_id],
                    |row| {
                        Ok(User {
                            user_id: row.get(0)?,
                            password: row.get(1)?,
                            preferred_name: row.get(2)?,
                        })
                    },
                )
                .optional()?;
            Ok(user)
        })
        .await
    }

    async fn insert_user(&self, user: &User) -> Result<bool, StoreError> {
        let user = user.clone();
        self.with_conn(move |conn| {
            let rows = conn.execute(
                "INSERT INTO users (user_id, password, preferred_name)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT(user_id) DO NOTHING",
                params![user.user_id, user.password, user.preferred_name],
            )?;
            Ok(rows > 0)
        })
        .await
    }

    async fn cache_movies(&self, movies: &[Movie]) -> Result<(), StoreError> {
        if movies.is_empty() {
            return Ok(());
        }
        let movies = movies.to_vec();
        self.with_conn(move |conn| {
            let tx = conn.unchecked_transaction()?;
            {
                let mut stmt = tx.prepare(
                    "INSERT INTO movies (id, title, overview, poster_path, release_date,
                        vote_average, adult, genres, original_language, runtime, vote_count,
                        revenue, cached_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, datetime('now'))
                     ON CONFLICT(id) DO UPDATE SET
                       title = excluded.title,
                       overview = excluded.overview,
                       poster_path = excluded.poster_path,
                       release_date = excluded.release_date,
                       vote_average = excluded.vote_average,
                       adult = excluded.adult,
                       genres = excluded.genres,
                       original_language = excluded.original_language,
                       runtime = excluded.runtime,
                       vote_count = excluded.vote_count,
                       revenue = excluded.revenue,
                       cached_at = excluded.cached_at",
                )?;
                for movie in &movies {
                    stmt.execute(params![
                        movie.id.get(),
                        movie.title,
                        movie.overview,
                        movie.poster_path,
                        movie.release_date,
                        movie.vote_average,
                        movie.adult,
                        serde_json::to_string(&movie.genres)?,
                        movie.original_language,
                        movie.runtime,
                        movie.vote_count,
                        movie.revenue,
                    ])?;
                }
            }
            tx.commit()?;
            Ok(())
        })
        .await
    }

    async fn cached_movies(&self) -> Result<Vec<Movie>, StoreError> {
        self.with_conn(|conn| {
            let mut stmt =
                conn.prepare(&format!("SELECT {} FROM movies ORDER BY id", MOVIE_COLUMNS))?;
            let movies = stmt
                .query_map([], movie_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(movies)
        })
        .await
    }

    async fn cached_movie(&self, movie_id: MovieId) -> Result<Option<Movie>, StoreError> {
        self.with_conn(move |conn| {
            let movie = conn
                .query_row(
                    &format!("SELECT {} FROM movies WHERE id = ?1", MOVIE_COLUMNS),
                    params![movie_id.get()],
                    movie_from_row,
                )
                .optional()?;
            Ok(movie)
        })
        .await
    }

    async fn find_movies_by_title(&self, pattern: &str) -> Result<Vec<Movie>, StoreError> {
        let like = format!("%{}%", escape_like(pattern));
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM movies WHERE title LIKE ?1 ESCAPE '\\' ORDER BY id",
                MOVIE_COLUMNS
            ))?;
            let movies = stmt
                .query_map(params![like], movie_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(movies)
        })
        .await
    }

    async fn upsert_favorite(&self, favorite: &FavoriteMovie) -> Result<(), StoreError> {
        let fav = favorite.clone();
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO favorite_movies (movie_id, user_id, title, poster_path, release_date,
                    vote_average, overview, adult, genres, original_language, runtime,
                    vote_count, revenue)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
                 ON CONFLICT(user_id, movie_id) DO UPDATE SET
                   title = excluded.title,
                   poster_path = excluded.poster_path,
                   release_date = excluded.release_date,
                   vote_average = excluded.vote_average,
                   overview = excluded.overview,
                   adult = excluded.adult,
                   genres = excluded.genres,
                   original_language = excluded.original_language,
                   runtime = excluded.runtime,
                   vote_count = excluded.vote_count,
                   revenue = excluded.revenue",
                params![
                    fav.movie_id.get(),
                    fav.user_id,
                    fav.title,
                    fav.poster_path,
                    fav.release_date,
                    fav.vote_average,
                    fav.overview,
                    fav.adult,
                    serde_json::to_string(&fav.genres)?,
                    fav.original_language,
                    fav.runtime,
                    fav.vote_count,
                    fav.revenue,
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn delete_favorite(
        &self,
        user_id: &str,
        movie_id: MovieId,
    ) -> Result<bool, StoreError> {
        let user_id = user_id.to_string();
        self.with_conn(move |conn| {
            let rows = conn.execute(
                "DELETE FROM favorite_movies WHERE user_id = ?1 AND movie_id = ?2",
                params![user_id, movie_id.get()],
            )?;
            Ok(rows > 0)
        })
        .await
    }

    async fn is_favorite(&self, user_id: &str, movie_id: MovieId) -> Result<bool, StoreError> {
        let user_id = user_id.to_string();
        self.with_conn(move |conn| {
            let exists: bool = conn.query_row(
                "SELECT COUNT(*) > 0 FROM favorite_movies WHERE user_id = ?1 AND movie_id = ?2",
                params![user_id, movie_id.get()],
                |row| row.get(0),
            )?;
            Ok(exists)
        })
        .await
    }

    async fn favorites_for_user(&self, user_id: &str) -> Result<Vec<FavoriteMovie>, StoreError> {
        let user_id = user_id.to_string();
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM favorite_movies WHERE user_id = ?1 ORDER BY rowid",
                FAVORITE_COLUMNS
            ))?;
            let favorites = stmt
                .query_map(params![user_id], favorite_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(favorites)
        })
        .await
    }
}

fn escape_like(pattern: &str) -> String {
    let mut escaped = String::with_capacity(pattern.len());
    for c in pattern.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn genres_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<Vec<Genre>> {
    let json: String = row.get(idx)?;
    serde_json::from_str(&json)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn movie_from_row(row: &Row<'_>) -> rusqlite::Result<Movie> {
    Ok(Movie {
        id: MovieId(row.get(0)?),
        title: row.get(1)?,
        overview: row.get(2)?,
        poster_path: row.get(3)?,
        release_date: row.get(4)?,
        vote_average: row.get(5)?,
        adult: row.get(6)?,
        genres: genres_at(row, 7)?,
        original_language: row.get(8)?,
        runtime: row.get(9)?,
        vote_count: row.get(10)?,
        revenue: row.get(11)?,
    })
}

fn favorite_from_row(row: &Row<'_>) -> rusqlite::Result<FavoriteMovie> {
    Ok(FavoriteMovie {
        movie_id: MovieId(row.get(0)?),
        user_id: row.get(1)?,
        title: row.get(2)?,
        poster_path: row.get(3)?,
        release_date: row.get(4)?,
        vote_average: row.get(5)?,
        overview: row.get(6)?,
        adult: row.get(7)?,
        genres: genres_at(row, 8)?,
        original_language: row.get(9)?,
        runtime: row.get(10)?,
        vote_count: row.get(11)?,
        revenue: row.get(12)?,
    })
}
