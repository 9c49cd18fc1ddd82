use anyhow::{Context, bail};
use chrono::Utc;

use crate::api::validation::{validate_email, validate_required, validate_username};
use crate::config::Config;
use crate::db::{NewUser, Store};
use crate::domain::{Role, UserStatus};

pub struct CreateUserArgs {
    pub username: String,
    pub name: String,
    pub role: String,
    pub region: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

/// Operator path: bypasses the authorization guard but keeps the same
/// field validation as the API.
pub async fn cmd_create_user(config: &Config, args: CreateUserArgs) -> anyhow::Result<()> {
    let username = validate_username(&args.username)?.to_string();
    let name = validate_required(&args.name, "nom")?.to_string();
    let email = args
        .email
        .as_deref()
        .map(validate_email)
        .transpose()?
        .map(ToString::to_string);
    let role: Role = args.role.parse()?;

    let region = match (role.requires_region(), args.region) {
        (true, None) => bail!("--region is required for role {role}"),
        (true, Some(region)) if !config.is_known_region(&region) => {
            bail!("Unknown region: {region}")
        }
        (true, region) => region,
        (false, _) => None,
    };

    let password = match args.password {
        Some(password) => password,
        None => {
            println!("Password for {username}:");
            let mut input = String::new();
            std::io::stdin()
                .read_line(&mut input)
                .context("Failed to read password from stdin")?;
            input.trim_end_matches(['\r', '\n']).to_string()
        }
    };

    let min = config.security.min_password_length;
    if password.chars().count() < min {
        bail!("Password must be at least {min} characters");
    }

    let store = Store::new(&config.general.database_path).await?;

    if store.get_user_by_username(&username).await?.is_some() {
        println!("User '{username}' already exists.");
        return Ok(());
    }

    let user = store
        .create_user(
            NewUser {
                name,
                username,
                email,
                password,
                role,
                region,
                department: None,
                commune: None,
                status: UserStatus::Active,
            },
            &config.security,
            Utc::now(),
        )
        .await?;

    println!(
        "✓ Created {} '{}' (ID: {})",
        user.role, user.username, user.id
    );
    Ok(())
}

pub async fn cmd_unlock_user(config: &Config, username: &str) -> anyhow::Result<()> {
    let store = Store::new(&config.general.database_path).await?;

    if store.unlock_user(username, Utc::now()).await? {
        println!("✓ Unlocked: {username}");
    } else {
        println!("User '{username}' not found.");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(username: &str, email: Option<&str>) -> CreateUserArgs {
        CreateUserArgs {
            username: username.to_string(),
            name: "Awa Diop".to_string(),
            role: "agent".to_string(),
            region: Some("Dakar".to_string()),
            email: email.map(ToString::to_string),
            password: Some("password123".to_string()),
        }
    }

    fn unreachable_db() -> Config {
        let mut config = Config::default();
        config.general.database_path = "sqlite:/nonexistent-dir/vbg.db".to_string();
        config
    }

    #[tokio::test]
    async fn test_create_user_rejects_invalid_fields_before_opening_db() {
        let config = unreachable_db();

        let err = cmd_create_user(&config, args("awa diop", None))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("nom d'utilisateur"), "{err}");

        let err = cmd_create_user(&config, args("ad", None)).await.unwrap_err();
        assert!(err.to_string().contains("nom d'utilisateur"), "{err}");

        let err = cmd_create_user(&config, args("awa.diop", Some("awa.diop")))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("email"), "{err}");
    }
}
