// Reel Recap - CLI
// Analyze purchase-history exports, view stored recaps, inspect totals

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use reel_recap::{
    analytics::MovieAnalytics, count_films, count_screenings, count_sessions,
    latest_global_snapshot, load_exports, setup_database, submit, top_films, view,
    AnalyticsEngine, RecapConfig, SessionView, DEFAULT_DATABASE_PATH, DEFAULT_TARGET_YEAR,
};
use rusqlite::Connection;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "reel-recap",
    version,
    about = "Year-in-review analytics for cinema purchase histories",
    long_about = "Turns purchase-history exports into a year-in-review recap and ranks it\n\
                  against every recap stored so far.\n\
                  \n\
                  Examples:\n\
                    reel-recap analyze page1.json page2.json   # Analyze and store\n\
                    reel-recap view <SESSION_ID>               # Recap + ranking\n\
                    reel-recap stats                           # Global totals\n\
                    reel-recap top-films -n 5                  # Most-watched films\n\
                  \n\
                  Environment Variables:\n\
                    RECAP_DB                                   # SQLite file\n\
                    RECAP_YEAR                                 # Calendar year analysed\n\
                    RUST_LOG                                   # Log filter (default: info)"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// SQLite database file
    #[arg(long, env = "RECAP_DB", default_value = DEFAULT_DATABASE_PATH)]
    db: PathBuf,

    /// Calendar year to analyse (UTC showtimes)
    #[arg(long, env = "RECAP_YEAR", default_value_t = DEFAULT_TARGET_YEAR)]
    year: i32,
}

#[derive(Subcommand)]
enum Command {
    /// Analyze one or more export pages and store the recap
    Analyze {
        /// Export JSON files (pages are merged in order)
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show a stored recap with its ranking
    View {
        session_id: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print global totals
    Stats,
    /// Show the most-watched films across all recaps
    TopFilms {
        /// Max results
        #[arg(long, short = 'n', default_value = "10")]
        limit: usize,
    },
}

fn main() -> Result<()> {
    // Logs go to stderr so --json output stays clean
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = RecapConfig::default()
        .with_database_path(cli.db)
        .with_target_year(cli.year);

    let mut conn = open_database(&config)?;

    match cli.command {
        Command::Analyze { files, json } => run_analyze(&mut conn, &config, &files, json),
        Command::View { session_id, json } => run_view(&conn, &session_id, json),
        Command::Stats => run_stats(&conn),
        Command::TopFilms { limit } => run_top_films(&conn, limit),
    }
}

fn open_database(config: &RecapConfig) -> Result<Connection> {
    let conn = Connection::open(&config.database_path)
        .with_context(|| format!("Failed to open database {}", config.database_path.display()))?;
    setup_database(&conn)?;
    Ok(conn)
}

// ============================================================================
// Commands
// ============================================================================

fn run_analyze(
    conn: &mut Connection,
    config: &RecapConfig,
    files: &[PathBuf],
    json: bool,
) -> Result<()> {
    let purchases = load_exports(files)?;
    let engine = AnalyticsEngine::new(config.target_year);
    let submission = submit(conn, &engine, purchases)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&submission)?);
        return Ok(());
    }

    println!("🎬 Your {} at the movies", config.target_year);
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    print_analytics(&submission.analytics);
    println!("\n✓ Stored as session {}", submission.session_id);

    Ok(())
}

fn run_view(conn: &Connection, session_id: &str, json: bool) -> Result<()> {
    let Some(recap) = view(conn, session_id)? else {
        anyhow::bail!("Session not found: {}", session_id);
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&recap)?);
        return Ok(());
    }

    println!("🎬 Recap {}", recap.session_id);
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    print_analytics(&recap.analytics);
    print_comparative(&recap);

    Ok(())
}

fn run_stats(conn: &Connection) -> Result<()> {
    println!("📈 Global totals");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("Sessions:   {}", count_sessions(conn)?);
    println!("Screenings: {}", count_screenings(conn)?);
    println!("Films:      {}", count_films(conn)?);

    if let Some(snapshot) = latest_global_snapshot(conn)? {
        println!(
            "Average:    {:.1} movies per session (as of {})",
            snapshot.avg_movies_per_session,
            snapshot.created_at.format("%Y-%m-%d %H:%M UTC")
        );
    }

    Ok(())
}

fn run_top_films(conn: &Connection, limit: usize) -> Result<()> {
    let films = top_films(conn, limit)?;

    if films.is_empty() {
        println!("No films recorded yet.");
        return Ok(());
    }

    println!("🍿 Most-watched films");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    for (i, film) in films.iter().enumerate() {
        println!(
            "{:>3}. {} ({}) - {} views",
            i + 1,
            film.title,
            film.year.as_deref().unwrap_or("?"),
            film.total_views
        );
    }

    Ok(())
}

// ============================================================================
// Output
// ============================================================================

fn print_analytics(a: &MovieAnalytics) {
    println!("Movies:        {} ({} unique)", a.total_movies, a.unique_movies);
    println!("Time watched:  {} hours ({} min)", a.total_hours, a.total_minutes);
    println!("Avg runtime:   {} min", a.average_runtime);
    println!("Favorite:      {} ({}x)", a.favorite_movie.title, a.favorite_movie.view_count);
    println!("Longest:       {} ({} min)", a.longest_movie.title, a.longest_movie.runtime);
    println!("Oldest:        {} ({})", a.oldest_movie.title, a.oldest_movie.year);
    println!("Newest:        {} ({})", a.newest_movie.title, a.newest_movie.year);

    if let Some(market) = a.top_market() {
        println!("Top market:    {}", market);
    }
    if let Some(cinema) = a.top_cinema() {
        println!("Top cinema:    {}", cinema);
    }

    if !a.top_movies.is_empty() {
        println!("\n🏆 Top movies");
        for m in &a.top_movies {
            println!("   {:>3}x  {}", m.count, m.title);
        }
    }

    if let Some(busiest) = a.movies_by_day_of_week.iter().max_by_key(|d| d.count) {
        println!("\n📅 Busiest day: {} ({})", busiest.label, busiest.count);
    }

    let pass = &a.season_pass_stats;
    if pass.total_tickets > 0 {
        println!(
            "🎫 Season pass: {} of {} tickets ({}%)",
            pass.season_pass_tickets, pass.total_tickets, pass.season_pass_percentage
        );
    }
}

fn print_comparative(recap: &SessionView) {
    let c = &recap.comparative_stats;
    println!("\n🏅 Ranking");
    println!("   #{} of {} sessions (top {}%)", c.rank, c.total_users, c.percentile);
    println!("   More movies than {}% of sessions", c.more_movies_than);
    println!("   Average session: {} movies", c.average_movies);
}
