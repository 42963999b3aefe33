use base64::{engine::general_purpose::STANDARD, Engine as _};
use clap::{Parser, Subcommand};
use csrf_shield::{
    config::csrf::{CsrfConfig, MIN_PRODUCTION_SECRET_BYTES},
    token::{generate_token, validate_token},
};
use rand::{rngs::OsRng, RngCore};

#[derive(Parser)]
#[command(name = "csrf-shield-cli")]
#[command(about = "CLI tool for managing CSRF secrets and tokens", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Secret management commands
    Secret {
        #[command(subcommand)]
        command: SecretCommands,
    },

    /// Token commands (use CSRF_SECRET from the environment)
    Token {
        #[command(subcommand)]
        command: TokenCommands,
    },
}

#[derive(Subcommand)]
enum SecretCommands {
    /// Generate a random base64 secret suitable for CSRF_SECRET
    Generate {
        /// Number of random bytes
        #[arg(short, long, default_value_t = 64)]
        bytes: usize,
    },
}

#[derive(Subcommand)]
enum TokenCommands {
    /// Issue a token bound to a session id
    Issue {
        /// Session id (user id, session cookie value or anon-<ip>)
        #[arg(short, long)]
        session: String,
    },

    /// Check a token against a session id
    Verify {
        /// Session id the token should be bound to
        #[arg(short, long)]
        session: String,

        /// Token in <signature>.<nonce> form
        #[arg(short, long)]
        token: String,
    },
}

fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    match cli.command {
        Commands::Secret { command } => match command {
            SecretCommands::Generate { bytes } => {
                if bytes < MIN_PRODUCTION_SECRET_BYTES {
                    eprintln!(
                        "❌ Secrets must be at least {} bytes",
                        MIN_PRODUCTION_SECRET_BYTES
                    );
                    std::process::exit(1);
                }

                let mut secret = vec![0u8; bytes];
                OsRng.fill_bytes(&mut secret);
                println!("{}", STANDARD.encode(secret));
            }
        },

        Commands::Token { command } => {
            let config = CsrfConfig::from_env()?;

            match command {
                TokenCommands::Issue { session } => match generate_token(&session, &config) {
                    Ok(token) => println!("{}", token),
                    Err(err) => {
                        eprintln!("❌ Failed to issue token: {}", err);
                        std::process::exit(1);
                    }
                },

                TokenCommands::Verify { session, token } => {
                    let result = validate_token(&token, &session, &config)?;
                    if result.valid {
                        println!("✅ Token is valid for this session");
                    } else {
                        eprintln!(
                            "❌ {}",
                            result
                                .error
                                .map(|e| e.to_string())
                                .unwrap_or_else(|| "Invalid token".to_string())
                        );
                        std::process::exit(1);
                    }
                }
            }
        }
    }

    Ok(())
}
