//! Account commands.

use clap::Subcommand;

#[derive(Subcommand)]
pub enum AuthAction {
    /// Create an account and sign in
    SignUp {
        /// Email address
        email: String,
        /// Password, at least 6 characters
        #[arg(long)]
        password: String,
        /// Display name
        #[arg(long)]
        name: Option<String>,
    },
    /// Sign in with email and password
    SignIn {
        email: String,
        #[arg(long)]
        password: String,
    },
    /// Start an anonymous guest session
    SignInAnonymous,
    /// Sign out of the current session
    SignOut,
    /// Print the signed-in user as JSON
    Whoami,
    /// Update display name and photo URL
    UpdateProfile {
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        photo_url: Option<String>,
    },
    /// Change the account password
    ChangePassword {
        /// Current password
        #[arg(long)]
        current: String,
        /// New password
        #[arg(long)]
        new: String,
    },
    /// Request a password reset code
    RequestReset { email: String },
    /// Redeem a reset code and set a new password
    ConfirmReset {
        email: String,
        #[arg(long)]
        code: String,
        #[arg(long)]
        password: String,
    },
    /// Delete the account and every session it recorded
    DeleteAccount {
        /// Password, required unless the account is anonymous
        #[arg(long)]
        password: Option<String>,
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
}

pub fn run(action: AuthAction) -> Result<(), Box<dyn std::error::Error>> {
    let (_store, auth, profile) = super::open_session()?;

    match action {
        AuthAction::SignUp {
            email,
            password,
            name,
        } => {
            let user = auth.sign_up(&email, &password, name.as_deref())?;
            println!("Signed up as {}", user.email.as_deref().unwrap_or(&user.id));
        }
        AuthAction::SignIn { email, password } => {
            let user = auth.sign_in(&email, &password)?;
            println!("Signed in as {}", user.email.as_deref().unwrap_or(&user.id));
        }
        AuthAction::SignInAnonymous => {
            let user = auth.sign_in_anonymous()?;
            println!("Signed in as guest {}", user.id);
        }
        AuthAction::SignOut => {
            auth.sign_out()?;
            println!("Signed out.");
        }
        AuthAction::Whoami => {
            let user = profile.ok_or(super::NOT_SIGNED_IN)?;
            println!("{}", serde_json::to_string_pretty(&user)?);
        }
        AuthAction::UpdateProfile { name, photo_url } => {
            let user = auth.update_profile(name.as_deref(), photo_url.as_deref())?;
            println!("{}", serde_json::to_string_pretty(&user)?);
        }
        AuthAction::ChangePassword { current, new } => {
            auth.update_password(&current, &new)?;
            println!("Password updated.");
        }
        AuthAction::RequestReset { email } => {
            let code = auth.request_password_reset(&email)?;
            println!("Reset code: {code} (valid for 60 minutes)");
        }
        AuthAction::ConfirmReset {
            email,
            code,
            password,
        } => {
            auth.confirm_password_reset(&email, &code, &password)?;
            println!("Password reset. Sign in with the new password.");
        }
        AuthAction::DeleteAccount { password, yes } => {
            if !yes && !super::confirm("Delete the account and all recorded sessions?")? {
                println!("Aborted.");
                return Ok(());
            }
            let removed = auth.delete_account(password.as_deref())?;
            println!("Account deleted ({removed} session records removed).");
        }
    }
    Ok(())
}
