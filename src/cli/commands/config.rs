use crate::config::Config;

pub fn cmd_init_config() -> anyhow::Result<()> {
    if Config::create_default_if_missing()? {
        println!(
            "✓ Config file created at {}.",
            Config::default_config_path().display()
        );
        println!("  Set session.secret (or VBG_SESSION_SECRET) before starting the server.");
    } else {
        println!(
            "Config file already exists: {}",
            Config::default_config_path().display()
        );
    }
    Ok(())
}
