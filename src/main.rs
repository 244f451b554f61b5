use std::sync::Arc;

use anyhow::bail;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use movieviewer::api::TmdbClient;
use movieviewer::config::{Cli, Command, Config};
use movieviewer::db;
use movieviewer::db::models::{Movie, MovieId, PosterSize};
use movieviewer::repository::{Connectivity, SyncRepository};
use movieviewer::state::{AppState, FetchStatus, ViewState};
use movieviewer::store::SqliteStore;
use movieviewer::validation::Registration;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging on stderr so command output stays clean
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    // Parse CLI args and load config
    let cli = Cli::parse();
    let data_dir = Config::data_dir(&cli);
    std::fs::create_dir_all(&data_dir)?;
    tracing::info!("Data directory: {}", data_dir.display());

    let config = Config::load(&cli)?;
    if config.api.api_key.is_empty() && !cli.offline {
        tracing::warn!(
            "No API key configured; set [api].api_key, --api-key or {}",
            movieviewer::config::API_KEY_ENV
        );
    }

    // Initialize database
    let pool = db::create_pool(&config.db_path())?;
    db::run_migrations(&pool)?;

    // One store, one client, one repository for the whole run
    let store = Arc::new(SqliteStore::new(pool));
    let api = Arc::new(TmdbClient::new(&config.api)?);
    let repo = Arc::new(SyncRepository::new(
        api,
        store,
        Connectivity::new(cli.offline),
    ));
    let state = AppState::new(repo.clone());

    let outcome = run(&state, cli.command).await;

    // Let cache writes from this run land before exiting
    repo.flush().await;
    outcome
}

async fn run(state: &AppState, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Movies { category } => {
            state.load_movies(category.into()).await;
            print_list(&state.snapshot())
        }
        Command::Search { query } => {
            state.search(&query).await;
            print_list(&state.snapshot())
        }
        Command::Show { id } => {
            state.open_movie(MovieId(id)).await;
            print_detail(&state.snapshot())
        }
        Command::Register {
            user_id,
            password,
            preferred_name,
            confirm,
        } => {
            let mut form = Registration::new(user_id, password, preferred_name);
            if let Some(confirm) = confirm {
                form.confirm_password = confirm;
            }
            if !state.register(&form).await {
                let view = state.snapshot();
                for error in &view.registration_errors {
                    eprintln!("{}: {}", error.field, error.message);
                }
                bail!(auth_failure(&view));
            }
            println!("Registered {}", form.user_id);
            Ok(())
        }
        Command::Favorites { user, password } => {
            login(state, &user, &password).await?;
            print_favorites(&state.snapshot());
            Ok(())
        }
        Command::Favorite { id, user, password } => {
            login(state, &user, &password).await?;
            state.open_movie(MovieId(id)).await;
            let view = state.snapshot();
            let Some(movie) = view.detail else {
                bail!("Movie {} is not available", id);
            };
            state.add_favorite(&movie).await;
            if let Some(error) = state.snapshot().error {
                bail!(error);
            }
            println!("Added \"{}\" to favorites", movie.title);
            print_favorites(&state.snapshot());
            Ok(())
        }
        Command::Unfavorite { id, user, password } => {
            login(state, &user, &password).await?;
            state.remove_favorite(MovieId(id)).await;
            if let Some(error) = state.snapshot().error {
                bail!(error);
            }
            print_favorites(&state.snapshot());
            Ok(())
        }
    }
}

async fn login(state: &AppState, user: &str, password: &str) -> anyhow::Result<()> {
    if !state.login(user, password).await {
        bail!(login_failure(&state.snapshot()));
    }
    Ok(())
}

/// Favorites commands log in first, and login needs the network.
fn login_failure(view: &ViewState) -> String {
    let message = auth_failure(view);
    if view.offline {
        format!(
            "{}. Favorites commands need a login, so run them without --offline",
            message
        )
    } else {
        message
    }
}

fn auth_failure(view: &ViewState) -> String {
    view.auth_error
        .clone()
        .unwrap_or_else(|| "Request failed".to_string())
}

fn print_list(view: &ViewState) -> anyhow::Result<()> {
    if let FetchStatus::Error(message) = &view.list_status {
        bail!(message.clone());
    }
    if view.offline {
        println!("[offline] showing cached movies");
    }
    if view.movies.is_empty() {
        println!("No movies found");
    }
    for movie in &view.movies {
        println!("{}", movie_line(movie));
    }
    Ok(())
}

fn movie_line(movie: &Movie) -> String {
    format!(
        "{:>8}  {}  ({})  {}",
        movie.id,
        movie.title,
        movie.release_date.as_deref().unwrap_or("unknown"),
        movie
            .vote_average
            .map(|v| format!("{:.1}", v))
            .unwrap_or_else(|| "-".to_string()),
    )
}

fn print_detail(view: &ViewState) -> anyhow::Result<()> {
    if let FetchStatus::Error(message) = &view.detail_status {
        bail!(message.clone());
    }
    let Some(movie) = &view.detail else {
        bail!("Movie details are not available offline");
    };

    println!("{} [{}]", movie.title, movie.id);
    if let Some(date) = &movie.release_date {
        println!("Released: {}", date);
    }
    if let Some(runtime) = movie.runtime {
        println!("Runtime: {} min", runtime);
    }
    if let Some(rating) = movie.vote_average {
        println!(
            "Rating: {:.1} ({} votes)",
            rating,
            movie.vote_count.unwrap_or(0)
        );
    }
    if !movie.genres.is_empty() {
        let names: Vec<_> = movie.genres.iter().map(|g| g.name.as_str()).collect();
        println!("Genres: {}", names.join(", "));
    }
    if let Some(url) = movie.poster_url(PosterSize::Original) {
        println!("Poster: {}", url);
    }
    if let Some(overview) = &movie.overview {
        println!("\n{}", overview);
    }

    if !view.offline {
        println!("\nReviews:");
        if view.reviews.is_empty() {
            println!("  No reviews available");
        }
        for review in &view.reviews {
            let excerpt: String = review.content.chars().take(160).collect();
            println!(
                "  {} ({}): {}",
                review.author,
                review.created_at.format("%Y-%m-%d"),
                excerpt
            );
        }

        println!("\nSimilar movies:");
        if view.similar.is_empty() {
            println!("  No similar movies found");
        }
        for similar in &view.similar {
            println!("  {:>8}  {}", similar.id, similar.title);
        }
    }
    Ok(())
}

fn print_favorites(view: &ViewState) {
    if let Some(session) = &view.session {
        println!("Favorites for {}:", session.preferred_name);
    }
    if view.favorites.is_empty() {
        println!("  No favorite movies yet");
    }
    for favorite in &view.favorites {
        println!("{}", movie_line(&favorite.to_movie()));
        if let Some(url) = favorite.poster_url(PosterSize::W185) {
            println!("          {}", url);
        }
    }
}
