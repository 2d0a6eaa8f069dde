use clap::Parser;
use provisioner::cli::{
    handle_completions, handle_config_init, patch, reconcile, status, Cli, Commands,
    ConfigCommands,
};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Reconcile(args) => reconcile::run_reconcile(args).await,
        Commands::Status(args) => status::handle_status(&args).await.map(|output| {
            println!("{}", output);
            0
        }),
        Commands::Patch(args) => patch::handle_patch(&args).map(|output| {
            println!("{}", output);
            0
        }),
        Commands::Config(config_cmd) => match config_cmd {
            ConfigCommands::Init(args) => handle_config_init(&args).map(|_| 0),
        },
        Commands::Completions(args) => {
            handle_completions(&args);
            Ok(0)
        }
    };

    match result {
        Ok(0) => {}
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}
