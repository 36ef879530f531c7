use std::time::Duration;

use raspio_device::{Spi, SpiConfig, Transfer};

use crate::cmd::{SpiCommand, SpiTarget};
use crate::exit::{device_error, CliResult, SUCCESS};
use crate::output::{print_bytes, print_count, OutputFormat};

pub fn run(command: SpiCommand, format: OutputFormat) -> CliResult<i32> {
    match command {
        SpiCommand::Read(args) => {
            let spi = open(&args.target)?;
            let data = spi
                .read(args.size)
                .map_err(|err| device_error("spi read failed", err))?;
            print_bytes("spi.read", &data, format);
        }
        SpiCommand::Write(args) => {
            let spi = open(&args.target)?;
            let written = spi
                .write(&args.data.0)
                .map_err(|err| device_error("spi write failed", err))?;
            print_count("spi.write", written, format);
        }
        SpiCommand::Xfer(args) => {
            let spi = open(&args.target)?;
            let transfer = Transfer::new(args.data.0, args.read_size).with_delay(args.delay_us);
            let (operation, result) = if args.hold_cs {
                ("spi.xfer2", spi.xfer2(transfer))
            } else {
                ("spi.xfer", spi.xfer(transfer))
            };
            let data = result.map_err(|err| device_error("spi transfer failed", err))?;
            print_bytes(operation, &data, format);
        }
    }
    Ok(SUCCESS)
}

fn open(target: &SpiTarget) -> CliResult<Spi> {
    let config = target.connect.session_config(Duration::from_secs(1))?;
    let spi = SpiConfig {
        max_speed: target.speed_khz,
        mode: target.mode,
        ..SpiConfig::default()
    };
    Spi::open(
        &target.connect.resolver(),
        &target.connect.host,
        target.device.as_str(),
        spi,
        config,
    )
    .map_err(|err| device_error("spi open failed", err))
}
