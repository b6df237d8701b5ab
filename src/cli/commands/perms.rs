use anyhow::{anyhow, bail};
use clap::Subcommand;
use serde_json::json;

use crate::cli::utils::output_success;
use crate::cli::{connect, OutputFormat};
use crate::perms::{Perm, PERM_LEVEL_MAX};
use crate::services::users::get_user_by_unsafe_id;

#[derive(Subcommand)]
pub enum PermsCommands {
    #[command(about = "Replace a user's perms, bypassing the level checks the API applies")]
    Grant {
        #[arg(help = "User ID")]
        user_id: String,
        #[arg(
            required = true,
            help = "Perm names (writePerms, sudoRead, sudoWrite, sudoDelete, verifyScripts, writeAchievements, all)"
        )]
        perms: Vec<String>,
        #[arg(long, help = "Permission level; lower outranks higher")]
        level: Option<u32>,
    },

    #[command(about = "Remove every perm and the permission level from a user")]
    Revoke {
        #[arg(help = "User ID")]
        user_id: String,
    },
}

/// Perm bit for a name as clients see it.
pub fn parse_perm(name: &str) -> anyhow::Result<Perm> {
    let perm = match name {
        "writePerms" => Perm::WRITE_PERMS,
        "sudoRead" => Perm::SUDO_READ,
        "sudoWrite" => Perm::SUDO_WRITE,
        "sudoDelete" => Perm::SUDO_DELETE,
        "verifyScripts" => Perm::VERIFY_SCRIPTS,
        "writeAchievements" => Perm::WRITE_ACHIEVEMENTS,
        "all" => Perm::ALL,
        other => return Err(anyhow!("Unknown perm {:?}", other)),
    };
    Ok(perm)
}

/// Level to store for granted perms. Staff without an explicit level rank
/// below everyone else.
pub fn grant_level(level: Option<u32>) -> anyhow::Result<u32> {
    match level {
        Some(0) => bail!("Permission level must be at least 1"),
        Some(level) if level > PERM_LEVEL_MAX => {
            bail!("Permission level cannot exceed {}", PERM_LEVEL_MAX)
        }
        Some(level) => Ok(level),
        None => Ok(PERM_LEVEL_MAX),
    }
}

pub async fn handle(cmd: PermsCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    let (db, state) = connect().await?;

    let (user, perms, level) = match cmd {
        PermsCommands::Grant { user_id, perms, level } => {
            let level = grant_level(level)?;
            let mut mask = Perm::NONE;
            for name in &perms {
                mask |= parse_perm(name)?;
            }
            let user = get_user_by_unsafe_id(state.users.as_ref(), &user_id).await?;
            (user, mask, Some(level))
        }
        PermsCommands::Revoke { user_id } => {
            let user = get_user_by_unsafe_id(state.users.as_ref(), &user_id).await?;
            (user, Perm::NONE, None)
        }
    };

    let level = if perms.is_empty() { None } else { level };
    let user = state.users.set_perms(user.id, perms, level).await?;
    db.close().await;

    tracing::info!(user_id = %user.id, perms = %user.perms, perm_level = ?user.perm_level, "Updated perms from CLI");

    output_success(
        &output_format,
        &format!("Updated perms for {}", user.name),
        Some(json!({
            "id": user.id,
            "perms": user.perms,
            "permLevel": user.perm_level,
        })),
    )
}
