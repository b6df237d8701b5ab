use clap::Subcommand;
use serde_json::json;

use crate::cli::utils::output_fields;
use crate::cli::{connect, OutputFormat};
use crate::services::users::get_user_by_unsafe_id;

#[derive(Subcommand)]
pub enum UserCommands {
    #[command(about = "Show a user's account and staff details")]
    Show {
        #[arg(help = "User ID")]
        user_id: String,
    },
}

pub async fn handle(cmd: UserCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    let (db, state) = connect().await?;

    match cmd {
        UserCommands::Show { user_id } => {
            let user = get_user_by_unsafe_id(state.users.as_ref(), &user_id).await?;
            let unread = state.messages.count_unread(user.id).await?;
            db.close().await;

            output_fields(
                &output_format,
                &[
                    ("id", json!(user.id)),
                    ("name", json!(user.name)),
                    ("email", json!(user.email)),
                    ("unverifiedEmail", json!(user.unverified_email)),
                    ("created", json!(user.created)),
                    ("lastSeen", json!(user.last_seen)),
                    ("perms", json!(user.perms.to_string())),
                    ("permLevel", json!(user.perm_level)),
                    ("unreadMessages", json!(unread)),
                ],
            )
        }
    }
}
