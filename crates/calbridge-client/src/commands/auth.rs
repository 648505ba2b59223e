//! Session commands.

use std::path::Path;

use calbridge_providers::google::UserProfile;
use tracing::{info, warn};

use super::Context;
use crate::error::ClientResult;

/// Signs in with Google.
///
/// A client id given on the command line is saved to the active config file
/// after a successful sign-in.
pub async fn login(ctx: &Context, force: bool) -> ClientResult<()> {
    let manager = ctx.session_manager()?;

    if manager.is_authenticated() && !force {
        if let Some(user) = manager.session().user {
            println!("Already signed in as {}.", describe_user(&user));
        }
        println!("Use --force to sign in again.");
        return Ok(());
    }

    println!("Starting Google sign-in...");
    println!();
    println!("A browser window will open for you to grant calendar access.");
    println!("If the browser doesn't open, check the terminal for a URL to copy.");
    println!();

    let signed_in = manager.sign_in().await?;

    match remember_client_id(ctx) {
        Ok(Some(path)) => println!("Client id saved to {}", path.display()),
        Ok(None) => {}
        Err(e) => warn!("could not save client id: {}", e),
    }

    info!("Google sign-in successful");
    println!("Signed in as {}.", describe_user(&signed_in.user));
    Ok(())
}

/// Revokes the token and clears the session.
///
/// Without a client id the token cannot be revoked; the local session is
/// cleared anyway.
pub async fn logout(ctx: &Context) -> ClientResult<()> {
    match ctx.session_manager() {
        Ok(manager) => {
            if !manager.is_authenticated() {
                println!("Not signed in.");
                return Ok(());
            }
            manager.sign_out().await?;
        }
        Err(e) => {
            warn!("cannot revoke token: {}", e);
            ctx.credential_store().logout()?;
        }
    }

    println!("Signed out.");
    Ok(())
}

/// Shows the persisted session.
pub fn status(ctx: &Context) -> ClientResult<()> {
    let session = ctx.credential_store().session();

    match (&session.user, session.is_authenticated()) {
        (Some(user), true) => {
            println!("Signed in as {}.", describe_user(user));
            println!("user id: {}", user.id);
        }
        _ => println!("Not signed in."),
    }
    println!("session: {}", ctx.session_path().display());
    Ok(())
}

/// A one-line description of a user: name and email when both are known.
pub fn describe_user(user: &UserProfile) -> String {
    match (&user.display_name, &user.email) {
        (Some(name), Some(email)) => format!("{} <{}>", name, email),
        (Some(name), None) => name.clone(),
        (None, Some(email)) => email.clone(),
        (None, None) => user.id.clone(),
    }
}

/// Saves a command-line client id into the active config file unless that
/// file already has it. Returns the path written.
pub fn remember_client_id(ctx: &Context) -> Result<Option<&Path>, String> {
    let Some(ref client_id) = ctx.client_id else {
        return Ok(None);
    };
    if ctx.config.google.client_id.as_deref() == Some(client_id.as_str()) {
        return Ok(None);
    }
    save_client_id(&ctx.config_path, client_id)?;
    Ok(Some(&ctx.config_path))
}

/// Writes `client_id` into the `[google]` table of the config file at
/// `path`, keeping everything else in the file as it is.
pub fn save_client_id(path: &Path, client_id: &str) -> Result<(), String> {
    let content = if path.exists() {
        std::fs::read_to_string(path)
            .map_err(|e| format!("could not read {}: {}", path.display(), e))?
    } else {
        String::new()
    };

    let mut doc = content
        .parse::<toml_edit::DocumentMut>()
        .map_err(|e| format!("could not parse {}: {}", path.display(), e))?;

    if !doc.contains_key("google") {
        doc["google"] = toml_edit::Item::Table(toml_edit::Table::new());
    }
    let google = doc["google"]
        .as_table_mut()
        .ok_or_else(|| "`google` in config.toml is not a table".to_string())?;
    google["client_id"] = toml_edit::value(client_id);

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| format!("could not create {}: {}", parent.display(), e))?;
    }
    std::fs::write(path, doc.to_string())
        .map_err(|e| format!("could not write {}: {}", path.display(), e))?;

    info!("client id saved to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientConfig;

    fn user(name: Option<&str>, email: Option<&str>) -> UserProfile {
        UserProfile {
            id: "42".to_string(),
            display_name: name.map(String::from),
            email: email.map(String::from),
            avatar_url: None,
        }
    }

    #[test]
    fn describe_user_variants() {
        assert_eq!(
            describe_user(&user(Some("Ada"), Some("ada@example.com"))),
            "Ada <ada@example.com>"
        );
        assert_eq!(describe_user(&user(Some("Ada"), None)), "Ada");
        assert_eq!(describe_user(&user(None, Some("ada@example.com"))), "ada@example.com");
        assert_eq!(describe_user(&user(None, None)), "42");
    }

    #[test]
    fn save_client_id_creates_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("nested").join("config.toml");

        save_client_id(&path, "new.apps.googleusercontent.com").unwrap();

        let config = ClientConfig::load_from(&path).unwrap();
        assert_eq!(
            config.google.client_id.as_deref(),
            Some("new.apps.googleusercontent.com")
        );
    }

    #[test]
    fn save_client_id_preserves_other_settings() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(
            &path,
            "# my settings\ndebug = true\n\n[google]\ncalendar_id = \"team\"\nclient_id = \"old\"\n",
        )
        .unwrap();

        save_client_id(&path, "new.apps.googleusercontent.com").unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("# my settings"));
        let config = ClientConfig::load_from(&path).unwrap();
        assert!(config.debug);
        assert_eq!(config.google.calendar_id, "team");
        assert_eq!(
            config.google.client_id.as_deref(),
            Some("new.apps.googleusercontent.com")
        );
    }

    #[test]
    fn save_client_id_rejects_non_table_google() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(&path, "google = 1\n").unwrap();

        assert!(save_client_id(&path, "id").is_err());
    }

    #[test]
    fn remember_client_id_writes_active_config() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("work.toml");
        std::fs::write(&path, "[google]\ncalendar_id = \"team\"\n").unwrap();
        let config = ClientConfig::load_from(&path).unwrap();
        let ctx = Context::new(config, Some("cli.apps.googleusercontent.com".to_string()))
            .with_config_path(&path);

        assert_eq!(remember_client_id(&ctx).unwrap(), Some(path.as_path()));
        let saved = ClientConfig::load_from(&path).unwrap();
        assert_eq!(
            saved.google.client_id.as_deref(),
            Some("cli.apps.googleusercontent.com")
        );
        assert_eq!(saved.google.calendar_id, "team");
    }

    #[test]
    fn remember_client_id_skips_known_id() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("work.toml");
        std::fs::write(&path, "[google]\nclient_id = \"same\"\n").unwrap();
        let config = ClientConfig::load_from(&path).unwrap();

        let ctx = Context::new(config.clone(), Some("same".to_string())).with_config_path(&path);
        assert_eq!(remember_client_id(&ctx).unwrap(), None);

        let ctx = Context::new(config, None).with_config_path(&path);
        assert_eq!(remember_client_id(&ctx).unwrap(), None);
    }

    #[tokio::test]
    async fn logout_without_client_id_clears_local_session() {
        use calbridge_providers::google::AuthMethod;

        let tmp = tempfile::tempdir().unwrap();
        let mut config = ClientConfig::default();
        config.google.session_path = Some(tmp.path().join("session.json"));
        let ctx = Context::new(config, None);

        ctx.credential_store()
            .login(user(Some("Ada"), None), "ya29.token", AuthMethod::Provider)
            .unwrap();

        logout(&ctx).await.unwrap();
        assert!(!ctx.credential_store().is_authenticated());
        assert!(!ctx.session_path().exists());
    }
}
