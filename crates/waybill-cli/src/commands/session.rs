//! `waybill session`

use crate::context::CliContext;
use anyhow::Result;
use clap::Subcommand;
use waybill_transport::{CredentialSource, Session};

#[derive(Subcommand)]
pub enum SessionCommand {
    /// Store a bearer token issued by the sign-in flow
    Set {
        /// Bearer token
        #[arg(long)]
        token: String,
        /// Recipient email
        #[arg(long)]
        email: Option<String>,
    },
    /// Show whether a session is stored
    Show,
    /// Forget the stored session
    Clear,
}

pub fn run(ctx: &CliContext, command: SessionCommand) -> Result<()> {
    let session = ctx.session_file()?;

    match command {
        SessionCommand::Set { token, email } => {
            session.store(Session { token, email })?;
            println!("Session stored in {}", session.path().display());
        }
        SessionCommand::Show => match session.session() {
            Some(s) => println!(
                "Signed in as {} ({})",
                s.email.as_deref().unwrap_or("unknown email"),
                session.path().display()
            ),
            None => println!("Signed out"),
        },
        SessionCommand::Clear => {
            session.invalidate();
            println!("Session cleared");
        }
    }
    Ok(())
}
