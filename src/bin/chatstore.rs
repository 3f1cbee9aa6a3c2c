use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::Level;

use chatstore::{
    room_collection_name, ChatStore, ChatStoreConfig, ConnectionManager, IndexManager, RoomIndexer,
};

#[derive(Parser)]
#[clap(author, version, about, long_about = None)]
#[clap(propagate_version = true)]
struct Cli {
    /// configuration file path, by default $HOME/.chatstore/chatstore.toml is used
    #[clap(short, long)]
    config: Option<String>,

    /// Print debug information
    #[clap(long)]
    debug: bool,

    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Bootstrap the chat store: connect, create collections, build all indexes
    Init,

    /// Drop and recreate the full index sets of the fixed collections
    ///
    /// Destructive rebuild: run only during startup or a maintenance
    /// window, never while queries depend on the indexes.
    Reindex,

    /// Additively ensure the index set of one room collection
    ReindexRoom {
        /// Room identifier (the collection is named room_<id>)
        room_id: String,
    },

    /// Drop a database
    DropDb {
        /// Database name to drop
        name: String,
    },

    /// Show the resolved configuration
    Config {
        /// Output as JSON
        #[clap(long)]
        json: bool,
    },
}

fn main() {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    if cli.debug {
        tracing_subscriber::fmt().with_max_level(Level::INFO).init();
    }

    let config = match ChatStoreConfig::new(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = run(cli.command, config) {
        eprintln!("{e}");
        std::process::exit(1);
    }
}

fn run(command: Commands, config: ChatStoreConfig) -> Result<()> {
    match command {
        Commands::Init => {
            let store = ChatStore::bootstrap(config)?;
            println!("chat store bootstrap completed");
            store.close();
        }
        Commands::Reindex => {
            let connection = ConnectionManager::new(config);
            IndexManager::new(&connection).ensure_indexes()?;
            println!("fixed index sets rebuilt");
            connection.close();
        }
        Commands::ReindexRoom { room_id } => {
            let connection = ConnectionManager::new(config);
            RoomIndexer::new(&connection).index_room(&room_id)?;
            println!("indexes ensured in {}", room_collection_name(&room_id));
            connection.close();
        }
        Commands::DropDb { name } => {
            let connection = ConnectionManager::new(config);
            connection.drop_database(&name)?;
            println!("database {name} dropped");
            connection.close();
        }
        Commands::Config { json } => {
            if json {
                println!("{}", serde_json::to_string_pretty(&config)?);
            } else {
                println!("{}", config.summary());
            }
        }
    }
    Ok(())
}
