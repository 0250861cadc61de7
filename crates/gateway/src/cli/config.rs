use sr_domain::config::{Config, ConfigError, ConfigSeverity};

/// Print every validation issue, errors first. Returns `false` when any
/// error was found.
pub fn validate(config: &Config, config_path: &str) -> bool {
    let (errors, warnings): (Vec<ConfigError>, Vec<ConfigError>) = config
        .validate()
        .into_iter()
        .partition(|i| i.severity == ConfigSeverity::Error);

    if errors.is_empty() && warnings.is_empty() {
        println!("{config_path}: OK");
        print_summary(config);
        return true;
    }

    for issue in errors.iter().chain(&warnings) {
        println!("{issue}");
    }
    println!(
        "\n{config_path}: {} error(s), {} warning(s)",
        errors.len(),
        warnings.len()
    );
    errors.is_empty()
}

fn print_summary(config: &Config) {
    println!("  listen     {}", config.server.bind_addr());
    println!("  bridge     {}", config.transport.bridge_url);
    println!("  state      {}", config.storage.state_path.display());
    println!(
        "  media      {} -> {}",
        config.messages.media_mount,
        config.storage.media_path.display()
    );
}

/// Dump the resolved config (with all defaults filled in) as TOML.
pub fn show(config: &Config) -> anyhow::Result<()> {
    print!("{}", toml::to_string_pretty(config)?);
    Ok(())
}
