use std::process::Stdio;

use crate::models::settings::VpnSettings;
use crate::ui::Presenter;

/// Bring the tunnel up before the first download. Failures are logged and
/// swallowed; the session simply runs without a VPN.
pub async fn connect(settings: &VpnSettings, ui: &dyn Presenter) {
    let Some(server) = settings.server.as_deref() else {
        return;
    };
    ui.log(&format!("Connecting VPN ({})", server));
    run_cli(&["connect", server]).await;
}

/// Tear the tunnel down after the last download, best effort.
pub async fn disconnect(settings: &VpnSettings, ui: &dyn Presenter) {
    if settings.server.is_none() {
        return;
    }
    ui.log("Disconnecting VPN");
    run_cli(&["disconnect"]).await;
}

async fn run_cli(args: &[&str]) {
    let result = tokio::process::Command::new("surfshark-vpn")
        .args(args)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await;
    match result {
        Ok(status) if !status.success() => {
            tracing::warn!("surfshark-vpn {:?} exited with {}", args, status);
        }
        Ok(_) => {}
        Err(e) => tracing::warn!("could not run surfshark-vpn: {}", e),
    }
}
