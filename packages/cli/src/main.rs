//! `keyhost`: command-line interface for public-key-addressed storage.
//!
//! Subcommands:
//!
//! - **`keygen`**: create a keypair and print its secret and identity.
//! - **`identity`**: print the identity for a secret.
//! - **`signup`**: create an account at a host and publish the identity's record.
//! - **`put`** / **`get`** / **`delete`**: work with a `pk://` address.
//! - **`list`**: print the child addresses of a directory.
//! - **`resolve`**: show an identity's endpoint record and its base URL.
//!
//! The network comes from the `KEYHOST_*` environment variables read by
//! `ClientConfig::from_env`. Commands that write sign in first with the secret
//! from `--secret` or `KEYHOST_KEY`; sessions are not kept between runs.

use std::fs;
use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use keyhost::{
    Client, ClientConfig, Credentials, Keypair, PublicIdentity, Request, ResourceAddress, Response,
    Target,
};

/// keyhost: public-key-addressed storage CLI
#[derive(Parser)]
#[command(name = "keyhost", version, about, long_about = None)]
struct Cli {
    /// Hex-encoded 32-byte secret key.
    #[arg(
        long,
        env = "KEYHOST_KEY",
        hide_env_values = true,
        global = true,
        value_name = "HEX"
    )]
    secret: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Generate a new keypair.
    ///
    /// Prints the hex secret on the first line and the identity on the second.
    /// Keep the secret; it cannot be recovered.
    Keygen,

    /// Print the public identity for --secret.
    Identity,

    /// Create an account for --secret at HOST.
    ///
    /// On success the identity's endpoint record is published so that other
    /// clients can find its data at HOST.
    Signup {
        /// Identity of the host.
        host: PublicIdentity,
    },

    /// Store a file at a pk:// address.
    ///
    /// Examples:
    ///   keyhost put pk://<id>/pub/example.com/demo.json demo.json -t application/json
    ///   echo hello | keyhost put pk://<id>/pub/hello.txt -
    Put {
        address: String,
        /// Path to a file, or `-` for stdin.
        file: PathBuf,
        /// Content type to store with the file.
        #[arg(short = 't', long, value_name = "MIME")]
        content_type: Option<String>,
    },

    /// Read a pk:// address and write the body to stdout.
    ///
    /// Reads anonymously unless --secret is given. Exits 1 on a non-success
    /// status.
    Get { address: String },

    /// Remove the file at a pk:// address.
    Delete { address: String },

    /// List the addresses under a pk:// directory.
    List { address: String },

    /// Show the endpoint record published for IDENTITY.
    Resolve { identity: PublicIdentity },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "keyhost=warn".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Keygen => {
            let keypair = Keypair::generate();
            println!("{}", hex::encode(keypair.secret()));
            println!("{}", keypair.public_identity());
        }

        Command::Identity => {
            println!("{}", keypair(cli.secret.as_deref()).public_identity());
        }

        Command::Signup { host } => {
            let keypair = keypair(cli.secret.as_deref());
            let client = client(config());
            let session = client
                .signup(&keypair, &host)
                .await
                .unwrap_or_else(|e| fatal(&format!("signup failed: {e}")));
            println!("signed up {} at {}", session.identity, session.host);
        }

        Command::Put {
            address,
            file,
            content_type,
        } => {
            let body = read_input(&file);
            let client = signed_in(cli.secret.as_deref()).await;
            let mut request = Request::put(&address, body).unwrap_or_else(|e| fatal(&e.to_string()));
            if let Some(content_type) = content_type {
                request = request.content_type(content_type);
            }
            let response = send(&client, request).await;
            exit_on_failure(&response);
        }

        Command::Get { address } => {
            let request = Request::get(&address).unwrap_or_else(|e| fatal(&e.to_string()));
            let (client, request) = match cli.secret.as_deref() {
                Some(secret) => (signed_in(Some(secret)).await, request),
                None => (anonymous(&address), request.credentials(Credentials::Omit)),
            };
            let response = send(&client, request).await;
            exit_on_failure(&response);
            io::stdout()
                .write_all(&response.body)
                .unwrap_or_else(|e| fatal(&format!("failed to write stdout: {e}")));
        }

        Command::Delete { address } => {
            let client = signed_in(cli.secret.as_deref()).await;
            let request = Request::delete(&address).unwrap_or_else(|e| fatal(&e.to_string()));
            let response = send(&client, request).await;
            exit_on_failure(&response);
        }

        Command::List { address } => {
            let client = match cli.secret.as_deref() {
                Some(secret) => signed_in(Some(secret)).await,
                None => anonymous(&address),
            };
            let children = client
                .list(&address)
                .await
                .unwrap_or_else(|e| fatal(&format!("list failed: {e}")));
            for child in children {
                println!("{child}");
            }
        }

        Command::Resolve { identity } => {
            let client = client(config());
            let record = client
                .resolver()
                .resolve(&identity)
                .await
                .unwrap_or_else(|e| fatal(&e.to_string()));
            for endpoint in record.ranked() {
                match &endpoint.target {
                    Target::Url(url) => println!("{:>5}  url   {url}", endpoint.priority),
                    Target::Host(host) => println!("{:>5}  host  {host}", endpoint.priority),
                }
            }
            match client.resolver().resolve_url(&identity).await {
                Ok(url) => println!("base url: {url}"),
                Err(e) => eprintln!("keyhost: {e}"),
            }
        }
    }
}

fn config() -> ClientConfig {
    ClientConfig::from_env().unwrap_or_else(|e| fatal(&e.to_string()))
}

fn client(config: ClientConfig) -> Client {
    Client::new(config).unwrap_or_else(|e| fatal(&e.to_string()))
}

fn keypair(secret: Option<&str>) -> Keypair {
    let secret = secret.unwrap_or_else(|| fatal("a secret is required (--secret or KEYHOST_KEY)"));
    Keypair::from_secret_hex(secret).unwrap_or_else(|e| fatal(&e.to_string()))
}

/// A client signed in at the host `keypair`'s record names.
///
/// On testnet the registry starts empty in every run, so the identity is
/// first pointed at the pinned testnet host.
async fn sign_in(config: ClientConfig, keypair: &Keypair) -> keyhost::Result<Client> {
    config.pin_testnet_home(keypair.public_identity());
    let client = Client::new(config)?;
    client.signin(keypair).await?;
    Ok(client)
}

async fn signed_in(secret: Option<&str>) -> Client {
    let keypair = keypair(secret);
    sign_in(config(), &keypair)
        .await
        .unwrap_or_else(|e| fatal(&format!("sign-in failed: {e}")))
}

/// An anonymous client able to resolve the identity in `address`.
fn anonymous(address: &str) -> Client {
    let config = config();
    if let Ok(address) = ResourceAddress::parse(address) {
        config.pin_testnet_home(address.identity);
    }
    client(config)
}

async fn send(client: &Client, request: Request) -> Response {
    client
        .fetch(request)
        .await
        .unwrap_or_else(|e| fatal(&e.to_string()))
}

/// Exit 1 with the host's status and error body when the request failed.
fn exit_on_failure(response: &Response) {
    if !response.ok {
        eprintln!("keyhost: host answered {}: {}", response.status, response.text());
        process::exit(1);
    }
}

/// Read the full contents of a file, or stdin when the path is `"-"`.
fn read_input(path: &PathBuf) -> Vec<u8> {
    if path.to_str() == Some("-") {
        let mut buf = Vec::new();
        io::stdin()
            .read_to_end(&mut buf)
            .unwrap_or_else(|e| fatal(&format!("failed to read stdin: {e}")));
        buf
    } else {
        fs::read(path).unwrap_or_else(|e| fatal(&format!("failed to read {}: {e}", path.display())))
    }
}

/// Print an error message to stderr and exit with code 2.
fn fatal(msg: &str) -> ! {
    eprintln!("keyhost: {msg}");
    process::exit(2);
}
