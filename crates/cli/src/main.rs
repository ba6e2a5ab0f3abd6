mod commands;

use anyhow::{bail, Context};
use bookstore_app::app;
use bookstore_app::books::models::{Author, Publisher};
use bookstore_app::books::repository::{
    AuthorRepository, PublisherRepository, SqliteAuthorRepository, SqlitePublisherRepository,
};
use bookstore_db::Database;
use bookstore_kernel::settings::Settings;

use commands::{AuthorCommand, CommandLine, Commands, PublisherCommand};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = CommandLine::parse_args();

    let mut settings =
        Settings::load().with_context(|| "failed to load bookstore settings")?;

    if let Commands::Serve = cli.command {
        bookstore_telemetry::init(&settings.telemetry)?;
        return app::run(settings).await;
    }

    // Keep stdout for command output.
    settings.telemetry.log_level = "warn".to_string();
    bookstore_telemetry::init(&settings.telemetry)?;

    if settings.database.is_in_memory() {
        bail!("'{}' does not persist between runs", settings.database.url);
    }

    let db = Database::connect(&settings.database).await?;
    let result = match cli.command {
        Commands::Serve => Ok(()),
        Commands::Migrate => migrate(&db).await,
        Commands::Author(command) => author(command, &db).await,
        Commands::Publisher(command) => publisher(command, &db).await,
    };
    db.close().await;
    if let Err(err) = &result {
        tracing::error!(error = %err, "command failed");
    }
    result
}

async fn migrate(db: &Database) -> anyhow::Result<()> {
    let registry = app::build_registry(db);
    let applied = app::migrate(db, &registry).await?;
    println!("applied {applied} migration(s)");
    Ok(())
}

async fn author(command: AuthorCommand, db: &Database) -> anyhow::Result<()> {
    match command {
        AuthorCommand::Add(new) => {
            let author = Author::new(new.name, new.nationality);
            let mut tx = db.begin_write().await?;
            SqliteAuthorRepository
                .save(&mut tx, &author)
                .await
                .with_context(|| format!("failed to add author '{}'", author.name))?;
            tx.commit().await?;
            tracing::info!(author_id = %author.id, name = %author.name, "author added");
            println!("{}", author.id);
        }
        AuthorCommand::List => {
            let mut conn = db.pool().acquire().await?;
            for author in SqliteAuthorRepository.find_all(&mut conn).await? {
                println!("{}\t{}\t{}", author.id, author.name, author.nationality);
            }
        }
    }
    Ok(())
}

async fn publisher(command: PublisherCommand, db: &Database) -> anyhow::Result<()> {
    match command {
        PublisherCommand::Add { name } => {
            let publisher = Publisher::new(name);
            let mut tx = db.begin_write().await?;
            SqlitePublisherRepository
                .save(&mut tx, &publisher)
                .await
                .with_context(|| format!("failed to add publisher '{}'", publisher.name))?;
            tx.commit().await?;
            tracing::info!(publisher_id = %publisher.id, name = %publisher.name, "publisher added");
            println!("{}", publisher.id);
        }
        PublisherCommand::List => {
            let mut conn = db.pool().acquire().await?;
            for publisher in SqlitePublisherRepository.find_all(&mut conn).await? {
                println!("{}\t{}", publisher.id, publisher.name);
            }
        }
    }
    Ok(())
}
