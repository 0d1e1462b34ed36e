//! WiFi station and network stack tasks

use embassy_net::Runner;
use embassy_time::Timer;
use esp_radio::wifi::{ClientConfig, ModeConfig, WifiController, WifiDevice};
use log::{info, warn};

/// Pause between reconnect attempts and link checks
const RECONNECT_DELAY_MS: u64 = 1000;

/// Keep the station associated, reconnecting whenever the link drops.
#[embassy_executor::task]
pub async fn connection_task(
    mut controller: WifiController<'static>,
    ssid: &'static str,
    password: &'static str,
) {
    let mode = ModeConfig::Client(
        ClientConfig::default()
            .with_ssid(ssid.into())
            .with_password(password.into()),
    );

    loop {
        if matches!(controller.is_connected(), Ok(true)) {
            Timer::after_millis(RECONNECT_DELAY_MS).await;
            continue;
        }

        if !matches!(controller.is_started(), Ok(true)) {
            if let Err(e) = controller.set_config(&mode) {
                warn!("WiFi station config failed: {:?}", e);
                Timer::after_millis(RECONNECT_DELAY_MS).await;
                continue;
            }
            info!("Starting WiFi");
            if let Err(e) = controller.start_async().await {
                warn!("WiFi start failed: {:?}", e);
                Timer::after_millis(RECONNECT_DELAY_MS).await;
                continue;
            }
        }

        info!("Connecting to WiFi network {}", ssid);
        match controller.connect_async().await {
            Ok(()) => info!("WiFi connected"),
            Err(e) => {
                warn!("WiFi connect failed: {:?}", e);
                Timer::after_millis(RECONNECT_DELAY_MS).await;
            }
        }
    }
}

#[embassy_executor::task]
pub async fn net_task(mut runner: Runner<'static, WifiDevice<'static>>) -> ! {
    runner.run().await
}
