use anyhow::Context;
use tracing::Level;

#[rocket::main]
async fn main() -> anyhow::Result<()> {
    #[cfg(debug_assertions)]
    let level = Some(Level::DEBUG);
    #[cfg(not(debug_assertions))]
    let level = Some(Level::INFO);

    let rocket = tuition_backend::create(level)
        .await
        .context("unable to set up the backend")?;

    if let Err(e) = rocket.launch().await {
        tracing::error!("Error launching server: {}", e);
        return Err(e.into());
    }
    Ok(())
}
