use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE, COOKIE, SET_COOKIE};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "gate-cli")]
#[command(about = "Client for the preimage gate", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:5000")]
    url: String,

    /// Name of the secret cookie.
    #[arg(long, default_value = "secret")]
    cookie_name: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Submit a preimage and print the issued secret
    Submit { preimage: String },
    /// Call a protected path with a previously issued secret
    Call {
        path: String,
        #[arg(short, long)]
        secret: String,
        /// JSON request body
        #[arg(short, long, default_value = "{}")]
        body: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    match cli.command {
        Commands::Submit { preimage } => {
            let res = client
                .post(format!("{}/preimages", cli.url))
                .query(&[("preimage", preimage.as_str())])
                .send()
                .await?;

            if !res.status().is_success() {
                return print_error(res).await;
            }
            let prefix = format!("{}=", cli.cookie_name);
            let secret = res
                .headers()
                .get_all(SET_COOKIE)
                .iter()
                .filter_map(|v| v.to_str().ok())
                .filter_map(|v| v.split(';').next())
                .find_map(|pair| pair.strip_prefix(&prefix))
                .map(str::to_string);
            match secret {
                Some(secret) => println!("{}", secret),
                None => eprintln!("Error: response carried no {} cookie", cli.cookie_name),
            }
        }
        Commands::Call { path, secret, body } => {
            let mut headers = HeaderMap::new();
            headers.insert(
                COOKIE,
                HeaderValue::from_str(&format!("{}={}", cli.cookie_name, secret))?,
            );
            headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

            let res = client
                .post(format!("{}{}", cli.url, path))
                .headers(headers)
                .body(body)
                .send()
                .await?;

            if !res.status().is_success() {
                return print_error(res).await;
            }
            let text = res.text().await?;
            match serde_json::from_str::<Value>(&text) {
                Ok(json) => println!("{}", serde_json::to_string_pretty(&json)?),
                Err(_) => println!("{}", text),
            }
        }
    }

    Ok(())
}

async fn print_error(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("Error: gate returned status {}", res.status());
    if let Ok(text) = res.text().await {
        eprintln!("Response: {}", text);
    }
    Ok(())
}
