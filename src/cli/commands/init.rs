//! Database initialization command.

use console::style;

use crate::config::Settings;

/// Create the database and schema.
pub async fn cmd_init(settings: &Settings) -> anyhow::Result<()> {
    if let Some(parent) = settings.database_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let ctx = super::context(settings);
    ctx.init_schema().await?;

    println!(
        "{} Initialized queue database at {}",
        style("✓").green(),
        settings.database_path.display()
    );
    Ok(())
}
