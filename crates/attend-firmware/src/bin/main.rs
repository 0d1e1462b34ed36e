#![no_std]
#![no_main]
#![deny(
    clippy::mem_forget,
    reason = "mem::forget is generally not safe to do with esp_hal types, especially those \
    holding buffers for the duration of a data transfer."
)]
#![deny(clippy::large_stack_frames)]

use attend_core::display::{DISPLAY_HEIGHT_PX, DISPLAY_WIDTH_PX, StatusDisplay};
use attend_core::feedback::{
    ChannelFeedback, Feedback, Status, get_feedback_receiver, get_feedback_sender,
};
use attend_core::sensor::R30xSensor;
use attend_core::time::EmbassyClock;
use attend_core::AttendanceTerminal;
use attend_firmware::console::UartConsole;
use attend_firmware::net::TcpUplink;
use attend_firmware::serial_port::UartSensorPort;
use attend_firmware::{wifi, wifi_secrets};
use embassy_executor::Spawner;
use embassy_net::StackResources;
use embassy_time::Timer;
use esp_hal::Blocking;
use esp_hal::clock::CpuClock;
use esp_hal::gpio::{Level, Output, OutputConfig};
use esp_hal::rng::Rng;
use esp_hal::timer::timg::TimerGroup;
use esp_hal::uart::{self, Uart};
use log::{error, info};
use static_cell::StaticCell;

// Display-LCD panel specific imports
use embedded_hal_bus::spi::{ExclusiveDevice, NoDelay};
use esp_hal::spi::master::{Config as SpiConfig, Spi};
use mipidsi::interface::SpiInterface;
use mipidsi::{Builder as MipidsiBuilder, Display, NoResetPin, models::ILI9342CRgb565};

type PanelInterface =
    SpiInterface<'static, ExclusiveDevice<Spi<'static, Blocking>, Output<'static>, NoDelay>, Output<'static>>;
type Panel = Display<PanelInterface, ILI9342CRgb565, NoResetPin>;

#[panic_handler]
fn panic(info: &core::panic::PanicInfo) -> ! {
    rtt_target::rprintln!("PANIC: {}", info);
    loop {}
}

extern crate alloc;

// This creates a default app-descriptor required by the esp-idf bootloader.
// For more information see: <https://docs.espressif.com/projects/esp-idf/en/stable/esp32/api-reference/system/app_image_format.html#application-description>
esp_bootloader_esp_idf::esp_app_desc!();

#[embassy_executor::task]
async fn display_task(panel: Panel) -> ! {
    let mut display = StatusDisplay::new(panel, "Attendance");
    display.run(get_feedback_receiver()).await
}

#[allow(
    clippy::large_stack_frames,
    reason = "it's not unusual to allocate larger buffers etc. in main"
)]
#[esp_rtos::main]
async fn main(spawner: Spawner) -> ! {
    rtt_target::rtt_init_log!();

    let config = esp_hal::Config::default().with_cpu_clock(CpuClock::max());
    let peripherals = esp_hal::init(config);

    esp_alloc::heap_allocator!(#[esp_hal::ram(reclaimed)] size: 73744);

    let timg0 = TimerGroup::new(peripherals.TIMG0);
    esp_rtos::start(timg0.timer0);

    info!("Embassy initialized!");

    // Display on SPI2 with a software CS pin
    let spi_bus = Spi::new(peripherals.SPI2, SpiConfig::default())
        .expect("Failed to configure SPI")
        .with_sck(peripherals.GPIO36)
        .with_mosi(peripherals.GPIO37);
    let cs = Output::new(peripherals.GPIO35, Level::High, OutputConfig::default());
    let spi_device = ExclusiveDevice::new_no_delay(spi_bus, cs).expect("Failed to create SPI device");
    let dc = Output::new(peripherals.GPIO34, Level::Low, OutputConfig::default());

    static SPI_BUFFER: StaticCell<[u8; 512]> = StaticCell::new();
    let di = SpiInterface::new(spi_device, dc, SPI_BUFFER.init([0; 512]));

    let panel = MipidsiBuilder::new(ILI9342CRgb565, di)
        .display_size(DISPLAY_WIDTH_PX, DISPLAY_HEIGHT_PX)
        .init(&mut embassy_time::Delay)
        .expect("Failed to initialize display");
    spawner.spawn(display_task(panel).expect("display task already spawned"));

    let mut feedback = ChannelFeedback::new(get_feedback_sender());

    // Nothing can be reported with a broken configuration
    let device_config = wifi_secrets::device_config();
    let config_usable = match device_config.validate() {
        Err(e) => {
            error!("Invalid build configuration: {}", e);
            false
        }
        Ok(()) if device_config.uses_tls() => {
            error!("HTTPS endpoints need TLS, which this firmware does not include; use http://");
            false
        }
        Ok(()) => true,
    };
    if !config_usable {
        feedback.show(&Status::ConfigError);
        loop {
            Timer::after_secs(1).await;
        }
    }

    // WiFi station and network stack
    feedback.show(&Status::ConnectingWifi);
    static RADIO: StaticCell<esp_radio::Controller<'static>> = StaticCell::new();
    let radio = RADIO.init(esp_radio::init().expect("Failed to initialize Wi-Fi/BLE controller"));
    let (wifi_controller, interfaces) =
        esp_radio::wifi::new(radio, peripherals.WIFI, Default::default())
            .expect("Failed to initialize Wi-Fi controller");

    let rng = Rng::new();
    let seed = u64::from(rng.random()) << 32 | u64::from(rng.random());
    static NET_RESOURCES: StaticCell<StackResources<3>> = StaticCell::new();
    let (stack, runner) = embassy_net::new(
        interfaces.sta,
        embassy_net::Config::dhcpv4(Default::default()),
        NET_RESOURCES.init(StackResources::new()),
        seed,
    );
    spawner.spawn(
        wifi::connection_task(
            wifi_controller,
            device_config.internet.ssid,
            device_config.internet.password,
        )
        .expect("wifi task already spawned"),
    );
    spawner.spawn(wifi::net_task(runner).expect("net task already spawned"));

    // Fingerprint sensor on UART2, operator console on UART0
    let sensor_uart = Uart::new(
        peripherals.UART2,
        uart::Config::default().with_baudrate(device_config.sensor.baud_rate),
    )
    .expect("Failed to configure sensor UART")
    .with_rx(peripherals.GPIO16)
    .with_tx(peripherals.GPIO17)
    .into_async();
    let console_uart = Uart::new(peripherals.UART0, uart::Config::default())
        .expect("Failed to configure console UART")
        .with_rx(peripherals.GPIO44)
        .with_tx(peripherals.GPIO43)
        .into_async();
    let (console_rx, _console_tx) = console_uart.split();

    let sensor = R30xSensor::new(
        UartSensorPort::new(sensor_uart),
        EmbassyClock,
        &device_config.sensor,
    );

    let mut terminal = match AttendanceTerminal::start(
        sensor,
        TcpUplink::new(stack),
        feedback,
        EmbassyClock,
        &device_config,
    )
    .await
    {
        Ok(terminal) => terminal,
        Err(e) => {
            error!("{}; halting", e);
            loop {
                Timer::after_secs(1).await;
            }
        }
    };

    let mut console = UartConsole::new(console_rx);
    loop {
        terminal.serve(&mut console).await;
    }
}
