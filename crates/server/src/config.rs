use clap::{Args, Parser, Subcommand};

/// Command line for the course progress service.
///
/// Every flag can also come from the environment (or a `.env` file).
#[derive(Debug, Parser)]
#[command(name = "course-progress", version, about = "Course progress tracking service")]
pub struct Cli {
    #[command(flatten)]
    pub database: DatabaseArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Args)]
pub struct DatabaseArgs {
    /// `SQLite` connection URL
    #[arg(
        long = "db",
        env = "COURSE_DB_URL",
        default_value = "sqlite:course.sqlite3?mode=rwc",
        global = true
    )]
    pub db_url: String,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Serve the progress API over HTTP
    Serve(ServeConfig),
    /// Insert a demo course with modules and lessons
    Seed(SeedArgs),
}

#[derive(Debug, Clone, Args)]
pub struct ServeConfig {
    #[arg(short = 'H', long, env = "COURSE_HOST", default_value = "127.0.0.1")]
    pub host: String,

    #[arg(short, long, env = "COURSE_PORT", default_value_t = 8080)]
    pub port: u16,

    /// HMAC secret used to verify bearer tokens
    #[arg(long, env = "COURSE_JWT_SECRET", hide_env_values = true)]
    pub jwt_secret: String,
}

impl ServeConfig {
    #[must_use]
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, Args)]
pub struct SeedArgs {
    #[arg(long, default_value = "Getting Started")]
    pub title: String,

    #[arg(long, default_value_t = 2)]
    pub modules: u32,

    /// Lessons per module
    #[arg(long, default_value_t = 3)]
    pub lessons: u32,
}
