use std::path::Path;

/// Loads the dotenv files for the active profile and returns the ones that existed.
///
/// Runs before tracing is installed, so the caller logs the result.
pub fn load_environment() -> anyhow::Result<Vec<&'static str>> {
    let is_production =
        dotenvy::var("ROCKET_PROFILE").unwrap_or("development".to_string()) == "production";

    let env_files = if is_production {
        ["config/common.env", "config/prod.env", ".secrets.env"]
    } else {
        ["config/common.env", "config/dev.env", ".secrets.env"]
    };

    let mut loaded = Vec::new();
    for env_file in env_files {
        if load_env_file(env_file)? {
            loaded.push(env_file);
        }
    }

    Ok(loaded)
}

fn load_env_file(path: &str) -> anyhow::Result<bool> {
    if !Path::new(path).exists() {
        return Ok(false);
    }

    dotenvy::from_filename_override(path)?;
    Ok(true)
}
