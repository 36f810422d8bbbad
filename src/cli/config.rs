use crate::config::generate::generate_starter_config;
use std::fs;
use std::path::PathBuf;

pub fn init(stdout: bool) -> Result<(), Box<dyn std::error::Error>> {
    let config_content = generate_starter_config();
    write_config(&config_content, stdout)
}

fn write_config(config_content: &str, stdout: bool) -> Result<(), Box<dyn std::error::Error>> {
    if stdout {
        print!("{}", config_content);
        return Ok(());
    }

    // Try ~/.config/cubedash/config.yml first, fall back to /etc/cubedash
    let config_path = if let Some(home_dir) = dirs::home_dir() {
        let user_config = home_dir.join(".config/cubedash/config.yml");
        match user_config.parent() {
            Some(parent) if fs::create_dir_all(parent).is_ok() => Some(user_config),
            _ => {
                eprintln!("Warning: Could not create user config directory");
                eprintln!("Falling back to /etc/cubedash/config.yml");
                None
            }
        }
    } else {
        None
    };

    let config_path = config_path.unwrap_or_else(|| PathBuf::from("/etc/cubedash/config.yml"));

    if config_path.exists() {
        eprintln!(
            "Error: Config file already exists at {}",
            config_path.display()
        );
        eprintln!("Remove it first or use --stdout to print the config");
        std::process::exit(1);
    }

    if let Some(parent) = config_path.parent() {
        fs::create_dir_all(parent)?;
    }

    fs::write(&config_path, config_content)?;
    println!("Config file written to {}", config_path.display());
    Ok(())
}

pub fn validate(config_path: Option<PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
    let path = config_path.ok_or("No config file found. Use --config to specify a path.")?;

    println!("Validating config file: {}", path.display());

    match crate::config::load_config(&path) {
        Ok(_) => {
            println!("✓ Config is valid");
            Ok(())
        }
        Err(e) => {
            eprintln!("✗ Config validation failed:\n{}", e);
            std::process::exit(1);
        }
    }
}
