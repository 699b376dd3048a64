//! Payments CLI
//!
//! Command-line interface for the Payment API.

use anyhow::Result;
use clap::{Parser, Subcommand};

use payments_client::PaymentsClient;
use payments_types::{ChargeRequest, OrderId, TokenizeRequest};

#[derive(Parser)]
#[command(name = "payments")]
#[command(author, version, about = "Payment API CLI client", long_about = None)]
struct Cli {
    /// Base URL of the Payment API
    #[arg(
        long,
        env = "PAYMENTS_API_URL",
        default_value = "http://localhost:3000"
    )]
    api_url: String,

    /// Caller identity sent as the x-user-id header
    #[arg(long, env = "PAYMENTS_CALLER_ID")]
    caller: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check API health
    Health,
    /// Encrypt a card into a payment token
    Tokenize {
        #[arg(long)]
        pan: String,
        #[arg(long)]
        exp_month: u8,
        #[arg(long)]
        exp_year: u16,
        #[arg(long)]
        cvc: String,
    },
    /// Charge a payment token directly, without an order
    Charge {
        #[arg(long)]
        token: String,
        /// Amount in minor units
        #[arg(long)]
        amount: i64,
        #[arg(long)]
        currency: Option<String>,
    },
    /// Pay an order with a payment token
    Pay {
        /// Order ID (UUID)
        #[arg(long)]
        order: String,
        #[arg(long)]
        token: String,
    },
    /// Sign a message with the service signing key
    Sign {
        message: String,
    },
    /// Print the public signing key (base64 DER)
    PublicKey,
}

fn parse_order_id(s: &str) -> Result<OrderId> {
    s.parse()
        .map_err(|_| anyhow::anyhow!("Invalid order ID: {}", s))
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let mut client = PaymentsClient::new(&cli.api_url);
    if let Some(caller) = cli.caller {
        client = client.with_caller(caller);
    }

    match cli.command {
        Commands::Health => match client.health().await {
            Ok(health) => println!("✓ API is healthy (provider: {})", health.provider),
            Err(e) => {
                println!("✗ API is not healthy: {}", e);
                std::process::exit(1);
            }
        },

        Commands::Tokenize {
            pan,
            exp_month,
            exp_year,
            cvc,
        } => {
            let token = client
                .tokenize(&TokenizeRequest {
                    pan,
                    exp_month,
                    exp_year,
                    cvc,
                })
                .await?;
            println!("{}", serde_json::to_string_pretty(&token)?);
        }

        Commands::Charge {
            token,
            amount,
            currency,
        } => {
            let charge = client
                .charge(&ChargeRequest {
                    token,
                    amount,
                    currency,
                    exp_month: None,
                    exp_year: None,
                    cvc: None,
                })
                .await?;
            println!("{}", serde_json::to_string_pretty(&charge)?);
        }

        Commands::Pay { order, token } => {
            let order_id = parse_order_id(&order)?;
            let payment = client.pay(order_id, &token).await?;
            println!("{}", serde_json::to_string_pretty(&payment)?);
            if !payment.settlement_queued {
                eprintln!("! receipt was not queued for reconciliation");
            }
        }

        Commands::Sign { message } => {
            let signed = client.sign(&message).await?;
            println!("{}", signed.signature);
        }

        Commands::PublicKey => {
            let key = client.public_key().await?;
            println!("{}", key.public_key);
        }
    }

    Ok(())
}
