use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

const IMAGE_BASE: &str = "https://image.tmdb.org/t/p";

/// Remote-assigned movie identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MovieId(pub i64);

impl MovieId {
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    pub fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for MovieId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for MovieId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Genre {
    pub id: i64,
    pub name: String,
}

/// A movie at either list or detail fidelity.
///
/// List endpoints fill the summary fields only; the detail endpoint adds
/// runtime, vote count, revenue and genres. Everything past `id` and `title`
/// is optional because the provider omits fields freely.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Movie {
    pub id: MovieId,
    pub title: String,
    #[serde(default)]
    pub overview: Option<String>,
    #[serde(default)]
    pub poster_path: Option<String>,
    #[serde(default)]
    pub release_date: Option<String>,
    #[serde(default)]
    pub vote_average: Option<f64>,
    #[serde(default)]
    pub adult: Option<bool>,
    #[serde(default)]
    pub genres: Vec<Genre>,
    #[serde(default)]
    pub original_language: Option<String>,
    #[serde(default)]
    pub runtime: Option<i64>,
    #[serde(default)]
    pub vote_count: Option<i64>,
    #[serde(default)]
    pub revenue: Option<i64>,
}

impl Movie {
    /// Minimal movie with only the required fields set.
    pub fn new(id: impl Into<MovieId>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            overview: None,
            poster_path: None,
            release_date: None,
            vote_average: None,
            adult: None,
            genres: Vec::new(),
            original_language: None,
            runtime: None,
            vote_count: None,
            revenue: None,
        }
    }

    pub fn poster_url(&self, size: PosterSize) -> Option<String> {
        poster_url(self.poster_path.as_deref(), size)
    }
}

/// One page of a paginated list endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoviePage {
    pub page: u32,
    pub results: Vec<Movie>,
    pub total_pages: u32,
    pub total_results: u32,
}

impl MoviePage {
    /// Wrap cached rows as a single page.
    pub fn single(results: Vec<Movie>) -> Self {
        let total = results.len() as u32;
        Self {
            page: 1,
            results,
            total_pages: 1,
            total_results: total,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
    pub id: String,
    pub author: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub user_id: String,
    pub password: String,
    pub preferred_name: String,
}

/// A user's favorite, with a snapshot of the movie taken when it was added.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FavoriteMovie {
    pub movie_id: MovieId,
    pub user_id: String,
    pub title: String,
    pub poster_path: Option<String>,
    pub release_date: Option<String>,
    pub vote_average: Option<f64>,
    pub overview: Option<String>,
    pub adult: Option<bool>,
    pub genres: Vec<Genre>,
    pub original_language: Option<String>,
    pub runtime: Option<i64>,
    pub vote_count: Option<i64>,
    pub revenue: Option<i64>,
}

impl FavoriteMovie {
    pub fn snapshot(user_id: impl Into<String>, movie: &Movie) -> Self {
        Self {
            movie_id: movie.id,
            user_id: user_id.into(),
            title: movie.title.clone(),
            poster_path: movie.poster_path.clone(),
            release_date: movie.release_date.clone(),
            vote_average: movie.vote_average,
            overview: movie.overview.clone(),
            adult: movie.adult,
            genres: movie.genres.clone(),
            original_language: movie.original_language.clone(),
            runtime: movie.runtime,
            vote_count: movie.vote_count,
            revenue: movie.revenue,
        }
    }

    pub fn to_movie(&self) -> Movie {
        Movie {
            id: self.movie_id,
            title: self.title.clone(),
            overview: self.overview.clone(),
            poster_path: self.poster_path.clone(),
            release_date: self.release_date.clone(),
            vote_average: self.vote_average,
            adult: self.adult,
            genres: self.genres.clone(),
            original_language: self.original_language.clone(),
            runtime: self.runtime,
            vote_count: self.vote_count,
            revenue: self.revenue,
        }
    }

    pub fn poster_url(&self, size: PosterSize) -> Option<String> {
        poster_url(self.poster_path.as_deref(), size)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PosterSize {
    W92,
    W185,
    W500,
    Original,
}

impl PosterSize {
    pub fn as_str(&self) -> &'static str {
        match self {
            PosterSize::W92 => "w92",
            PosterSize::W185 => "w185",
            PosterSize::W500 => "w500",
            PosterSize::Original => "original",
        }
    }
}

fn poster_url(path: Option<&str>, size: PosterSize) -> Option<String> {
    let path = path.filter(|p| !p.is_empty())?;
    Some(format!("{}/{}{}", IMAGE_BASE, size.as_str(), path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_result_decodes_with_missing_detail_fields() {
        let json = r#"{
            "id": 27205,
            "title": "Inception",
            "overview": "A thief who steals corporate secrets...",
            "poster_path": "/inception.jpg",
            "release_date": "2010-07-15",
            "vote_average": 8.4,
            "adult": false,
            "genre_ids": [28, 878]
        }"#;
        let movie: Movie = serde_json::from_str(json).unwrap();
        assert_eq!(movie.id, MovieId(27205));
        assert_eq!(movie.title, "Inception");
        assert!(movie.genres.is_empty());
        assert_eq!(movie.runtime, None);
        assert_eq!(movie.vote_average, Some(8.4));
    }

    #[test]
    fn detail_decodes_nested_genres() {
        let json = r#"{
            "id": 42,
            "title": "Inception",
            "runtime": 148,
            "vote_count": 35000,
            "revenue": 839030630,
            "original_language": "en",
            "genres": [{"id": 28, "name": "Action"}, {"id": 878, "name": "Science Fiction"}]
        }"#;
        let movie: Movie = serde_json::from_str(json).unwrap();
        assert_eq!(movie.genres.len(), 2);
        assert_eq!(movie.genres[1].name, "Science Fiction");
        assert_eq!(movie.runtime, Some(148));
        assert_eq!(movie.revenue, Some(839030630));
        assert_eq!(movie.poster_path, None);
    }

    #[test]
    fn null_fields_decode_as_none() {
        let json = r#"{"id": 1, "title": "Untitled", "poster_path": null, "vote_average": null}"#;
        let movie: Movie = serde_json::from_str(json).unwrap();
        assert_eq!(movie.poster_path, None);
        assert_eq!(movie.vote_average, None);
    }

    #[test]
    fn review_decodes_timestamp() {
        let json = r#"{
            "id": "58a231c5925141179e000674",
            "author": "Cat Ellington",
            "content": "Great film.",
            "created_at": "2017-02-13T23:16:19.538Z"
        }"#;
        let review: Review = serde_json::from_str(json).unwrap();
        assert_eq!(review.author, "Cat Ellington");
        assert_eq!(review.created_at.timestamp(), 1487027779);
    }

    #[test]
    fn poster_url_uses_size_segment() {
        let mut movie = Movie::new(1, "Heat");
        assert_eq!(movie.poster_url(PosterSize::W185), None);

        movie.poster_path = Some("/heat.jpg".into());
        assert_eq!(
            movie.poster_url(PosterSize::W185).as_deref(),
            Some("https://image.tmdb.org/t/p/w185/heat.jpg")
        );
        assert_eq!(
            movie.poster_url(PosterSize::Original).as_deref(),
            Some("https://image.tmdb.org/t/p/original/heat.jpg")
        );
    }

    #[test]
    fn empty_poster_path_has_no_url() {
        let mut movie = Movie::new(1, "Heat");
        movie.poster_path = Some(String::new());
        assert_eq!(movie.poster_url(PosterSize::W500), None);
    }

    #[test]
    fn favorite_snapshot_round_trips_to_movie() {
        let mut movie = Movie::new(42, "Inception");
        movie.runtime = Some(148);
        movie.genres = vec![Genre {
            id: 28,
            name: "Action".into(),
        }];

        let favorite = FavoriteMovie::snapshot("bob", &movie);
        assert_eq!(favorite.user_id, "bob");
        assert_eq!(favorite.movie_id, MovieId(42));
        assert_eq!(favorite.to_movie(), movie);
    }

    #[test]
    fn single_page_counts_results() {
        let page = MoviePage::single(vec![Movie::new(1, "A"), Movie::new(2, "B")]);
        assert_eq!(page.page, 1);
        assert_eq!(page.total_pages, 1);
        assert_eq!(page.total_results, 2);
    }
}
