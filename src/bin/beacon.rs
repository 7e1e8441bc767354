// Flight-side telemetry beacon: transmits a numbered packet on a fixed
// period until interrupted, then parks the radio.
use anyhow::{Context, Result};
use clap::Parser;
use mio::{unix::SourceFd, Events, Interest, Poll, Token};
use mio_signals::{Signal, Signals};
use std::{fs::read_to_string, os::fd::AsRawFd, time::Duration};
use sx127x::bus::{SpiBus, RPI_PINS};
use sx127x::config::RadioConfig;
use sx127x::registers::Mode;
use sx127x::{Error, Lora};
use timerfd::{SetTimeFlags, TimerFd, TimerState};

#[derive(Parser, Debug)]
struct Args {
    #[arg(short, long, default_value = "/dev/spidev0.0")]
    spi: String,
    #[arg(short, long, default_value = "/dev/gpiochip0")]
    gpiochip: String,
    /// Radio settings TOML; both ends must match.
    #[arg(short, long)]
    config: Option<String>,
    /// Seconds between packets.
    #[arg(short, long, default_value_t = 5)]
    interval: u64,
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

    let bus = SpiBus::open(&args.spi, &args.gpiochip, RPI_PINS)?;
    let mut radio = Lora::new(bus, config);
    radio.configure().context("radio bring-up failed")?;

    let mut poll = Poll::new()?;
    let registry = poll.registry();

    const CTRLC: Token = Token(0);
    let mut signals = Signals::new(Signal::Interrupt.into())?;
    registry.register(&mut signals, CTRLC, Interest::READABLE)?;

    let mut tfd = TimerFd::new()?;
    tfd.set_state(
        TimerState::Periodic {
            current: Duration::from_secs(1),
            interval: Duration::from_secs(args.interval),
        },
        SetTimeFlags::Default,
    );
    const BEACON: Token = Token(1);
    registry.register(&mut SourceFd(&tfd.as_raw_fd()), BEACON, Interest::READABLE)?;

    let mut count: u32 = 0;
    let mut events = Events::with_capacity(8);
    'outer: loop {
        poll.poll(&mut events, None)?;
        for event in events.iter() {
            match event.token() {
                BEACON => {
                    tfd.read();
                    let message = format!("Hello from CanSat! Packet: {count}");
                    match radio.send(message.as_bytes()) {
                        Ok(()) => println!("sent: {message}"),
                        // A dropped packet is a fact of flight, not a reason
                        // to stop transmitting.
                        Err(Error::TxTimeout(limit)) => {
                            eprintln!("packet {count}: no TX completion within {limit:?}");
                        }
                        Err(e) => return Err(e.into()),
                    }
                    count += 1;
                }
                CTRLC => break 'outer,
                _ => unreachable!(),
            }
        }
    }

    radio.set_mode(Mode::Sleep)?;
    println!("{count} packets transmitted");
    Ok(())
}
