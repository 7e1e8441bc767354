// Ground-station receiver: keeps the link armed, prints every packet with
// its signal quality, and tallies corrupt frames separately so a noisy
// channel is visible as such. `--uart` swaps in the vendor-firmware modem.
use anyhow::{Context, Result};
use clap::Parser;
use mio_signals::{Signal, Signals};
use std::{fs::read_to_string, time::Duration};
use sx127x::bus::{SpiBus, RPI_PINS};
use sx127x::config::RadioConfig;
use sx127x::modem::{UartModem, RPI_MODEM_PINS};
use sx127x::{Error, Lora, RadioTransport};

#[derive(Parser, Debug)]
struct Args {
    #[arg(short, long, default_value = "/dev/spidev0.0")]
    spi: String,
    #[arg(short, long, default_value = "/dev/gpiochip0")]
    gpiochip: String,
    /// Radio settings TOML; both ends must match.
    #[arg(short, long)]
    config: Option<String>,
    /// Receive window per poll, in milliseconds.
    #[arg(short, long, default_value_t = 1000)]
    window: u64,
    /// Use the vendor-firmware UART modem on this port instead of the SPI
    /// register driver (e.g. /dev/ttyS0).
    #[arg(long)]
    uart: Option<String>,
}

fn load_config(path: &Option<String>) -> Result<RadioConfig> {
    match path {
        Some(path) => {
            let contents = read_to_string(path)?;
            toml::from_str(&contents).with_context(|| format!("bad radio config in {path}"))
        }
        None => Ok(RadioConfig::default()),
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    let config = load_config(&args.config)?;

    let mut radio: Box<dyn RadioTransport> = match &args.uart {
        Some(port) => Box::new(UartModem::open(port, &args.gpiochip, RPI_MODEM_PINS, config)?),
        None => {
            let bus = SpiBus::open(&args.spi, &args.gpiochip, RPI_PINS)?;
            Box::new(Lora::new(bus, config))
        }
    };
    radio.configure().context("radio bring-up failed")?;
    println!("listening...");

    let mut signals = Signals::new(Signal::Interrupt.into())?;
    let window = Duration::from_millis(args.window);
    let mut received: u32 = 0;
    let mut corrupted: u32 = 0;

    loop {
        if signals.receive()?.is_some() {
            break;
        }
        match radio.poll(window) {
            Ok(Some(packet)) => {
                received += 1;
                println!(
                    "{} (RSSI {} dBm, SNR {:.2} dB)",
                    String::from_utf8_lossy(&packet.payload),
                    packet.rssi_dbm,
                    packet.snr_db
                );
            }
            Ok(None) => {}
            Err(Error::Crc) => {
                corrupted += 1;
                eprintln!("dropped corrupt frame ({corrupted} so far)");
            }
            Err(e) => return Err(e.into()),
        }
    }

    println!("{received} packets received, {corrupted} corrupt");
    Ok(())
}
