use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "bookstore-cli")]
#[command(about = "Operate the bookstore service and its reference data.")]
pub struct CommandLine {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the HTTP service
    Serve,
    /// Apply pending schema migrations
    Migrate,
    /// Manage authors
    #[command(subcommand)]
    Author(AuthorCommand),
    /// Manage publishers
    #[command(subcommand)]
    Publisher(PublisherCommand),
}

#[derive(Subcommand)]
pub enum AuthorCommand {
    /// Register an author and print its id
    Add(NewAuthor),
    /// List authors as `id<TAB>name<TAB>nationality`
    List,
}

#[derive(Args)]
pub struct NewAuthor {
    #[arg(long)]
    pub name: String,
    #[arg(long)]
    pub nationality: String,
}

#[derive(Subcommand)]
pub enum PublisherCommand {
    /// Register a publisher and print its id
    Add {
        #[arg(long)]
        name: String,
    },
    /// List publishers as `id<TAB>name`
    List,
}

impl CommandLine {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
