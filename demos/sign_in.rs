//! EchoCheck Sign-In Demo
//!
//! Demonstrates the email-verified sign-in flow:
//! 1. Check for a persisted session
//! 2. If none, prompt for email and password and begin sign-in
//! 3. Resolve the verification challenge with the emailed code
//! 4. The credential pair is persisted and restored on future runs
//!
//! Run with: cargo run --example sign_in
//!
//! The API base URL defaults to http://localhost:8000 and can be overridden
//! with the ECHOCHECK_API_URL environment variable.

use echocheck_client::{ClientOptions, EchoCheckClient, FileBackend, LoginOutcome};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing for debug output
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "echocheck_client=debug".parse().unwrap()),
        )
        .init();

    // Check command line args
    let args: Vec<String> = std::env::args().collect();

    if args.len() > 1 {
        match args[1].as_str() {
            "logout" | "--logout" => {
                return logout().await;
            }
            "status" | "--status" => {
                return status().await;
            }
            "help" | "--help" | "-h" => {
                print_help();
                return Ok(());
            }
            _ => {
                eprintln!("Unknown command: {}", args[1]);
                print_help();
                return Ok(());
            }
        }
    }

    let client = new_client()?;

    // A pair persisted by a previous run restores the session
    if let Some(user) = client.current_user().await {
        println!("✓ Already signed in as {}", user.email);
        println!();
        println!("To sign out: cargo run --example sign_in -- logout");
        return Ok(());
    }

    println!("No session found. Signing in...");
    println!();

    let email = prompt("Email")?;
    let password = prompt("Password")?;

    let user = match client.login(&email, &password).await? {
        LoginOutcome::Complete(auth) => auth.user,
        LoginOutcome::VerificationRequired(sent) => {
            println!();
            println!(
                "{} (expires in {} minutes)",
                sent.message, sent.expires_in_minutes
            );
            let code = prompt("Verification code")?;
            client.verify_login(&email, &code).await?
        }
    };

    println!();
    println!("✓ Signed in as {}", user.email);
    println!("Member since: {}", user.created_at.format("%Y-%m-%d"));
    println!();
    println!("The session is persisted and will be restored on the next run.");

    Ok(())
}

async fn logout() -> Result<(), Box<dyn std::error::Error>> {
    let client = new_client()?;

    if client.is_authenticated() {
        client.logout().await?;
        println!("Signed out.");
    } else {
        println!("Not currently signed in.");
    }

    Ok(())
}

async fn status() -> Result<(), Box<dyn std::error::Error>> {
    let client = new_client()?;

    match client.current_user().await {
        Some(user) => {
            println!("Status: Signed in ✓");
            println!();
            println!("  Email: {}", user.email);
            println!("  Verified: {}", user.is_verified);
            println!("  Member since: {}", user.created_at.format("%Y-%m-%d"));
        }
        None => {
            println!("Status: Signed out");
            println!();
            println!("Run 'cargo run --example sign_in' to sign in.");
        }
    }

    println!();
    println!("Credential storage: {}", FileBackend::new().path().display());

    Ok(())
}

fn new_client() -> Result<EchoCheckClient, Box<dyn std::error::Error>> {
    let base_url = std::env::var("ECHOCHECK_API_URL")
        .unwrap_or_else(|_| "http://localhost:8000".to_string());

    Ok(EchoCheckClient::new(
        ClientOptions::builder().base_url(base_url).build(),
    )?)
}

fn prompt(label: &str) -> Result<String, Box<dyn std::error::Error>> {
    use std::io::Write;

    print!("{label}: ");
    std::io::stdout().flush()?;

    let mut line = String::new();
    std::io::stdin().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

fn print_help() {
    println!("Usage: cargo run --example sign_in [COMMAND]");
    println!();
    println!("Commands:");
    println!("  (none)     Sign in, or show the restored session");
    println!("  status     Show current session status");
    println!("  logout     Sign out and clear stored credentials");
    println!("  help       Show this help message");
    println!();
    println!("Environment:");
    println!("  ECHOCHECK_API_URL   API base URL (default http://localhost:8000)");
    println!();
    println!("Credential storage:");
    println!("  {}", FileBackend::new().path().display());
}
